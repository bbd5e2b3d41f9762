// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 drover contributors

//! Secret redaction for step logs
//!
//! `Replacer` wraps a [`LogSink`] and replaces every occurrence of a
//! masked secret value with [`MASK`] before bytes reach the sink. A
//! trailing fragment that could be the start of a secret is held back
//! until the next write (or close), so occurrences split across writes
//! are still redacted.

use std::io::{self, Write};

use super::streamer::LogSink;
use crate::engine::Secret;
use crate::errors::RunnerResult;

/// Replacement for redacted values
pub const MASK: &str = "********";

pub struct Replacer {
    inner: Box<dyn LogSink>,
    secrets: Vec<Vec<u8>>,
    pending: Vec<u8>,
}

impl Replacer {
    /// Wrap `inner`; without masked, non-empty secrets the sink is
    /// returned unchanged.
    pub fn wrap(inner: Box<dyn LogSink>, secrets: &[Secret]) -> Box<dyn LogSink> {
        let patterns = patterns(secrets);
        if patterns.is_empty() {
            return inner;
        }
        Box::new(Self {
            inner,
            secrets: patterns,
            pending: Vec::new(),
        })
    }

    /// Redact `pending` plus `data`. Unless `eof`, a tail that is a
    /// proper prefix of some secret stays pending.
    fn redact(&mut self, data: &[u8], eof: bool) -> Vec<u8> {
        let mut buf = std::mem::take(&mut self.pending);
        buf.extend_from_slice(data);

        let mut out = Vec::with_capacity(buf.len());
        let mut i = 0;
        while i < buf.len() {
            let rest = &buf[i..];
            if !eof && self.is_partial(rest) {
                self.pending = rest.to_vec();
                break;
            }
            match self.longest_match(rest) {
                Some(len) => {
                    out.extend_from_slice(MASK.as_bytes());
                    i += len;
                }
                None => {
                    out.push(buf[i]);
                    i += 1;
                }
            }
        }
        out
    }

    fn is_partial(&self, rest: &[u8]) -> bool {
        self.secrets
            .iter()
            .any(|s| s.len() > rest.len() && s.starts_with(rest))
    }

    fn longest_match(&self, rest: &[u8]) -> Option<usize> {
        self.secrets
            .iter()
            .filter(|s| rest.starts_with(s))
            .map(Vec::len)
            .max()
    }
}

/// Byte patterns to redact: each masked value, plus the individual
/// lines of multi-line values.
fn patterns(secrets: &[Secret]) -> Vec<Vec<u8>> {
    let mut out: Vec<Vec<u8>> = Vec::new();
    let mut add = |p: &[u8]| {
        if !p.is_empty() && !out.iter().any(|o| o == p) {
            out.push(p.to_vec());
        }
    };
    for secret in secrets.iter().filter(|s| s.mask) {
        let Some(data) = secret.data.as_deref() else {
            continue;
        };
        add(data);
        if data.contains(&b'\n') {
            for line in data.split(|b| *b == b'\n') {
                let line = line.strip_suffix(b"\r").unwrap_or(line);
                add(trim(line));
            }
        }
    }
    out
}

fn trim(mut bytes: &[u8]) -> &[u8] {
    while let [first, rest @ ..] = bytes {
        if first.is_ascii_whitespace() {
            bytes = rest;
        } else {
            break;
        }
    }
    while let [rest @ .., last] = bytes {
        if last.is_ascii_whitespace() {
            bytes = rest;
        } else {
            break;
        }
    }
    bytes
}

impl Write for Replacer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let out = self.redact(buf, false);
        if !out.is_empty() {
            self.inner.write_all(&out)?;
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

impl LogSink for Replacer {
    fn close(&mut self) -> RunnerResult<()> {
        let out = self.redact(&[], true);
        let written = if out.is_empty() {
            Ok(())
        } else {
            self.inner.write_all(&out)
        };
        let closed = self.inner.close();
        written?;
        closed
    }
}
