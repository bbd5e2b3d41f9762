// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 drover contributors

//! Progress reporting
//!
//! The execer calls a [`Reporter`] at every step and stage transition.
//! A reporter error is surfaced to the caller but never stops the run.

use async_trait::async_trait;
use colored::Colorize;

use super::state::State;
use crate::errors::RunnerResult;
use crate::metadata::Status;
use crate::utils::colors;

#[async_trait]
pub trait Reporter: Send + Sync {
    async fn report_stage(&self, state: &State) -> RunnerResult<()>;
    async fn report_step(&self, state: &State, step: &str) -> RunnerResult<()>;
}

/// Discards every report
#[derive(Debug, Clone, Copy, Default)]
pub struct NopReporter;

#[async_trait]
impl Reporter for NopReporter {
    async fn report_stage(&self, _state: &State) -> RunnerResult<()> {
        Ok(())
    }

    async fn report_step(&self, _state: &State, _step: &str) -> RunnerResult<()> {
        Ok(())
    }
}

/// Prints transitions to the terminal
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleReporter;

impl ConsoleReporter {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Reporter for ConsoleReporter {
    async fn report_stage(&self, state: &State) -> RunnerResult<()> {
        let stage = state.stage();
        if !stage.status.is_done() {
            return Ok(());
        }

        println!();
        let done = stage
            .steps
            .iter()
            .filter(|s| s.status == Status::Success)
            .count();
        println!(
            "{} {} {} ({}/{} steps passed, {}s)",
            colors::glyph(stage.status),
            "Pipeline".bold(),
            colors::label(stage.status),
            done,
            stage.steps.len(),
            (stage.stopped - stage.started).max(0)
        );
        if !stage.error.is_empty() {
            println!("  {}", stage.error.red());
        }
        Ok(())
    }

    async fn report_step(&self, state: &State, step: &str) -> RunnerResult<()> {
        let Some(info) = state.step(step) else {
            return Ok(());
        };
        match info.status {
            Status::Running => println!("{} {}", colors::glyph(info.status), step.bold()),
            Status::Success | Status::Failure if info.error.is_empty() => println!(
                "{} {} {}",
                colors::glyph(info.status),
                step,
                format!("(exit code {})", info.exit_code).dimmed()
            ),
            Status::Failure => println!(
                "{} {} {}",
                colors::glyph(info.status),
                step,
                info.error.red()
            ),
            status => println!("{} {} {}", colors::glyph(status), step, colors::label(status)),
        }
        Ok(())
    }
}
