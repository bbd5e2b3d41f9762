// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 drover contributors

//! Execution engines
//!
//! An engine materializes the workspace described by a [`Spec`] and runs
//! individual steps as processes. The runner ships a single engine that
//! executes steps directly on the host.

mod host;
pub mod spec;

pub use host::HostEngine;
pub use spec::{File, Link, Platform, RunPolicy, Secret, Spec, Step};

use async_trait::async_trait;
use std::io::Write;
use tokio_util::sync::CancellationToken;

use crate::errors::RunnerResult;

/// Completion state of a step process
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProcessState {
    pub exit_code: i32,
    pub exited: bool,
}

impl ProcessState {
    pub fn exited(exit_code: i32) -> Self {
        Self {
            exit_code,
            exited: true,
        }
    }
}

/// Trait for pipeline execution engines
#[async_trait]
pub trait Engine: Send + Sync {
    /// Create the workspace root, spec files, step files and links
    async fn setup(&self, spec: &Spec) -> RunnerResult<()>;

    /// Run one step, streaming combined output into `output`.
    ///
    /// Returns the process state once it exits. Returns
    /// [`RunnerError::Cancelled`](crate::RunnerError::Cancelled) when
    /// `cancel` fires first; the process is killed in that case. Any
    /// other error means the process could not be started or observed.
    async fn run(
        &self,
        cancel: &CancellationToken,
        spec: &Spec,
        step: &Step,
        output: &mut (dyn Write + Send),
    ) -> RunnerResult<ProcessState>;

    /// Remove the workspace
    async fn destroy(&self, spec: &Spec) -> RunnerResult<()>;
}
