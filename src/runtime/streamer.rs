// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 drover contributors

//! Step log streaming

use colored::Colorize;
use std::io::{self, Write};

use super::state::State;
use crate::errors::{RunnerError, RunnerResult};

/// Destination for one step's log output
pub trait LogSink: Write + Send {
    /// Flush anything buffered and release the sink
    fn close(&mut self) -> RunnerResult<()>;
}

/// Opens a log sink per step
pub trait Streamer: Send + Sync {
    fn stream(&self, state: &State, step: &str) -> Box<dyn LogSink>;
}

/// Streams step output to the terminal, one prefixed line at a time
#[derive(Debug, Clone, Default)]
pub struct ConsoleStreamer {
    pretty: bool,
}

impl ConsoleStreamer {
    pub fn new(pretty: bool) -> Self {
        Self { pretty }
    }
}

impl Streamer for ConsoleStreamer {
    fn stream(&self, _state: &State, step: &str) -> Box<dyn LogSink> {
        Box::new(LinePrefixer::new(io::stdout(), step, self.pretty))
    }
}

/// Splits output into lines and prefixes each with the step name
pub struct LinePrefixer<W: Write + Send> {
    out: W,
    step: String,
    pretty: bool,
    partial: Vec<u8>,
}

impl<W: Write + Send> LinePrefixer<W> {
    pub fn new(out: W, step: &str, pretty: bool) -> Self {
        Self {
            out,
            step: step.to_string(),
            pretty,
            partial: Vec::new(),
        }
    }

    fn prefix(&self) -> String {
        if self.pretty {
            format!("{} ", format!("[{}]", self.step).cyan().bold())
        } else {
            format!("[{}] ", self.step)
        }
    }

    /// Writes the whole line in one call so lines from steps running
    /// in parallel never interleave on a shared stdout.
    fn emit(&mut self, line: &[u8]) -> io::Result<()> {
        let prefix = self.prefix();
        let mut buf = Vec::with_capacity(prefix.len() + line.len() + 1);
        buf.extend_from_slice(prefix.as_bytes());
        buf.extend_from_slice(line);
        buf.push(b'\n');
        self.out.write_all(&buf)
    }

    /// Consume the prefixer, returning the underlying writer
    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write + Send> Write for LinePrefixer<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.partial.extend_from_slice(buf);
        while let Some(pos) = self.partial.iter().position(|b| *b == b'\n') {
            let mut line: Vec<u8> = self.partial.drain(..=pos).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            self.emit(&line)?;
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.out.flush()
    }
}

impl<W: Write + Send> LogSink for LinePrefixer<W> {
    fn close(&mut self) -> RunnerResult<()> {
        let step = self.step.clone();
        let close_error = move |e: io::Error| RunnerError::StreamFailed {
            step: step.clone(),
            error: e.to_string(),
        };
        if !self.partial.is_empty() {
            let line = std::mem::take(&mut self.partial);
            self.emit(&line).map_err(&close_error)?;
        }
        self.out.flush().map_err(&close_error)
    }
}
