// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 drover contributors

//! Shared execution state
//!
//! One `State` exists per pipeline run and is shared by every step task.
//! All reads and writes go through a single mutex; the pipeline-level
//! flags (`failed`, `skip_all`, `cancelled`) only ever go from false to
//! true.

use std::sync::{Mutex, MutexGuard};

use crate::engine::{RunPolicy, Spec};
use crate::environ::{self, Environ};
use crate::metadata::{Build, Stage, Status, StepInfo};

#[derive(Debug)]
struct Inner {
    build: Build,
    stage: Stage,
    failed: bool,
    skip_all: bool,
    cancelled: bool,
}

/// Lock-guarded pipeline execution state
#[derive(Debug)]
pub struct State {
    inner: Mutex<Inner>,
}

fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

impl Inner {
    fn step(&mut self, name: &str) -> Option<&mut StepInfo> {
        self.stage.step_mut(name)
    }

    fn mark_failed(&mut self) {
        self.failed = true;
        self.stage.status = Status::Failure;
        self.build.status = Status::Failure;
    }

    fn start_stage(&mut self) {
        if self.stage.status == Status::Pending {
            self.stage.status = Status::Running;
        }
        if self.stage.started == 0 {
            self.stage.started = now();
        }
    }

    fn stop_stage(&mut self) {
        self.stage.stopped = now();
        if self.stage.started == 0 {
            self.stage.started = self.stage.stopped;
        }
    }
}

impl State {
    /// Register one pending record per step that can run
    pub fn new(build: Build, mut stage: Stage, spec: &Spec) -> Self {
        stage.steps = spec
            .steps
            .iter()
            .filter(|s| s.run_policy != RunPolicy::Never)
            .enumerate()
            .map(|(i, s)| StepInfo {
                number: i as i64 + 1,
                name: s.name.clone(),
                err_ignore: s.ignore_err,
                ..Default::default()
            })
            .collect();
        Self::from_parts(build, stage)
    }

    /// Wrap existing metadata without touching the step list
    pub fn from_parts(build: Build, stage: Stage) -> Self {
        let failed = stage.status == Status::Failure || build.status == Status::Failure;
        Self {
            inner: Mutex::new(Inner {
                build,
                stage,
                failed,
                skip_all: false,
                cancelled: false,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| {
            tracing::warn!("execution state mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Move a pending step to running. Refused once the run is
    /// cancelled or skipped, or when the step is not pending.
    pub fn start(&self, name: &str) -> bool {
        let mut inner = self.lock();
        if inner.cancelled || inner.skip_all {
            return false;
        }
        let started = match inner.step(name) {
            Some(step) if step.status == Status::Pending => {
                step.status = Status::Running;
                step.started = now();
                true
            }
            _ => false,
        };
        if started {
            inner.start_stage();
        }
        started
    }

    /// Record a process exit. Exit code 78 counts as success.
    pub fn finish(&self, name: &str, exit_code: i32) {
        let mut inner = self.lock();
        let mut failed = false;
        if let Some(step) = inner.step(name) {
            if step.status.is_done() {
                return;
            }
            step.exit_code = exit_code;
            step.stopped = now();
            step.status = match exit_code {
                0 | 78 => Status::Success,
                _ => Status::Failure,
            };
            failed = step.status == Status::Failure && !step.err_ignore;
        }
        if failed {
            inner.mark_failed();
        }
    }

    /// Record an infrastructure error for one step
    pub fn fail(&self, name: &str, error: &str) {
        let mut inner = self.lock();
        let mut failed = false;
        if let Some(step) = inner.step(name) {
            if step.status.is_done() {
                return;
            }
            step.status = Status::Failure;
            step.error = error.to_string();
            step.exit_code = 255;
            step.stopped = now();
            if step.started == 0 {
                step.started = step.stopped;
            }
            failed = !step.err_ignore;
        }
        if failed {
            inner.mark_failed();
        }
    }

    /// Skip one pending step
    pub fn skip(&self, name: &str) {
        let mut inner = self.lock();
        if let Some(step) = inner.step(name) {
            if step.status == Status::Pending {
                let ts = now();
                step.status = Status::Skipped;
                step.started = ts;
                step.stopped = ts;
            }
        }
    }

    /// Skip every step that has not started yet
    pub fn skip_all(&self) {
        let mut inner = self.lock();
        inner.skip_all = true;
        let ts = now();
        for step in inner.stage.steps.iter_mut() {
            if step.status == Status::Pending {
                step.status = Status::Skipped;
                step.started = ts;
                step.stopped = ts;
            }
        }
    }

    /// Cancel the run: pending and running steps become cancelled
    pub fn cancel(&self) {
        let mut inner = self.lock();
        inner.cancelled = true;
        let ts = now();
        for step in inner.stage.steps.iter_mut() {
            if !step.status.is_done() {
                step.status = Status::Cancelled;
                step.stopped = ts;
                if step.started == 0 {
                    step.started = ts;
                }
            }
        }
        inner.stage.status = Status::Cancelled;
        inner.stop_stage();
    }

    /// Fail every step without running any, e.g. when the workspace
    /// cannot be created.
    pub fn fail_all(&self, error: &str) {
        let mut inner = self.lock();
        let ts = now();
        for step in inner.stage.steps.iter_mut() {
            if !step.status.is_done() {
                step.status = Status::Failure;
                step.error = error.to_string();
                step.exit_code = 255;
                step.started = ts;
                step.stopped = ts;
            }
        }
        inner.mark_failed();
        inner.stage.error = error.to_string();
        inner.stop_stage();
    }

    /// Close out the run once the graph has completed
    pub fn finish_all(&self) {
        let mut inner = self.lock();
        let ts = now();
        for step in inner.stage.steps.iter_mut() {
            match step.status {
                Status::Pending => {
                    step.status = Status::Skipped;
                    step.started = ts;
                    step.stopped = ts;
                }
                Status::Running => {
                    step.status = Status::Cancelled;
                    step.stopped = ts;
                }
                _ => {}
            }
        }
        inner.stage.status = if inner.cancelled {
            Status::Cancelled
        } else if inner.failed {
            Status::Failure
        } else {
            Status::Success
        };
        if inner.build.status != Status::Failure {
            inner.build.status = inner.stage.status;
        }
        inner.stop_stage();
    }

    pub fn failed(&self) -> bool {
        self.lock().failed
    }

    pub fn skipped(&self) -> bool {
        self.lock().skip_all
    }

    pub fn cancelled(&self) -> bool {
        self.lock().cancelled
    }

    /// Build, stage and step variables reflecting the run so far
    pub fn environ(&self, name: &str) -> Environ {
        let inner = self.lock();
        let step = inner.stage.step(name).cloned().unwrap_or_else(|| StepInfo {
            name: name.to_string(),
            ..Default::default()
        });
        environ::combine([
            environ::build(&inner.build),
            environ::stage(&inner.stage),
            environ::step(&step),
        ])
    }

    pub fn step(&self, name: &str) -> Option<StepInfo> {
        self.lock().stage.step(name).cloned()
    }

    pub fn stage(&self) -> Stage {
        self.lock().stage.clone()
    }

    pub fn build(&self) -> Build {
        self.lock().build.clone()
    }
}
