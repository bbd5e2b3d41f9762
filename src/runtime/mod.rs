// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 drover contributors

//! Pipeline runtime
//!
//! Executes a compiled spec: the dependency-graph scheduler, the shared
//! execution state, log streaming with secret redaction, and progress
//! reporting.

pub mod dag;
pub mod execer;
pub mod replacer;
pub mod reporter;
pub mod state;
pub mod streamer;

pub use dag::Dag;
pub use execer::Execer;
pub use replacer::{Replacer, MASK};
pub use reporter::{ConsoleReporter, NopReporter, Reporter};
pub use state::State;
pub use streamer::{ConsoleStreamer, LinePrefixer, LogSink, Streamer};

use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Exit code a step uses to skip the rest of the pipeline
pub const SKIP_ALL_EXIT_CODE: i32 = 78;

/// Child token that is cancelled with `parent` or once `timeout`
/// elapses, whichever comes first.
pub fn with_timeout(parent: &CancellationToken, timeout: Duration) -> CancellationToken {
    let child = parent.child_token();
    let token = child.clone();
    tokio::spawn(async move {
        tokio::select! {
            _ = tokio::time::sleep(timeout) => {
                warn!(timeout.secs = timeout.as_secs(), "pipeline timed out");
                token.cancel();
            }
            _ = token.cancelled() => {}
        }
    });
    child
}
