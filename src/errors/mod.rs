// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 drover contributors

//! Error types
//!
//! A single error enum covers the whole runner. Step runtime outcomes
//! (non-zero exit codes) are not errors; they are recorded in the
//! execution state instead.

use miette::Diagnostic;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for drover operations
pub type RunnerResult<T> = Result<T, RunnerError>;

/// Main error type for drover
#[derive(Error, Debug, Diagnostic)]
pub enum RunnerError {
    // ─────────────────────────────────────────────────────────────────────────
    // Pipeline Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("Pipeline file not found: {path}")]
    #[diagnostic(
        code(drover::pipeline_not_found),
        help("Pass the pipeline file explicitly or create .drone.yml")
    )]
    PipelineFileNotFound { path: PathBuf },

    #[error("Pipeline '{name}' not found in manifest")]
    #[diagnostic(
        code(drover::pipeline_lookup),
        help("Check the pipeline names declared in the manifest")
    )]
    PipelineNotFound { name: String },

    #[error("Invalid pipeline configuration: {reason}")]
    #[diagnostic(code(drover::invalid_pipeline))]
    InvalidPipeline {
        reason: String,
        #[help]
        help: Option<String>,
    },

    #[error("Invalid condition pattern '{pattern}': {message}")]
    #[diagnostic(code(drover::invalid_condition))]
    InvalidCondition { pattern: String, message: String },

    // ─────────────────────────────────────────────────────────────────────────
    // Engine Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("Cannot set up workspace at {path}: {error}")]
    #[diagnostic(code(drover::setup_failed))]
    SetupFailed { path: PathBuf, error: String },

    #[error("Command '{command}' not found")]
    #[diagnostic(
        code(drover::command_not_found),
        help("Ensure '{command}' is installed and present in PATH")
    )]
    CommandNotFound { command: String },

    #[error("Cannot start step '{step}': {error}")]
    #[diagnostic(code(drover::spawn_failed))]
    SpawnFailed { step: String, error: String },

    #[error("Cannot observe step '{step}': {error}")]
    #[diagnostic(code(drover::wait_failed))]
    WaitFailed { step: String, error: String },

    // ─────────────────────────────────────────────────────────────────────────
    // Execution Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("Execution cancelled")]
    #[diagnostic(code(drover::cancelled))]
    Cancelled,

    #[error("Report failed: {message}")]
    #[diagnostic(code(drover::report_failed))]
    ReportFailed { message: String },

    #[error("Log stream for step '{step}' failed: {error}")]
    #[diagnostic(code(drover::stream_failed))]
    StreamFailed { step: String, error: String },

    #[error("Execution failed: {message}")]
    #[diagnostic(code(drover::execution_failed))]
    ExecutionFailed {
        message: String,
        #[help]
        help: Option<String>,
    },

    #[error("{} errors occurred", errors.len())]
    #[diagnostic(code(drover::multiple))]
    Multiple {
        #[related]
        errors: Vec<RunnerError>,
    },

    // ─────────────────────────────────────────────────────────────────────────
    // Graph Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("Circular dependency detected")]
    #[diagnostic(
        code(drover::circular_dependency),
        help("Review your step dependencies to remove the cycle")
    )]
    CircularDependency { steps: Vec<String> },

    #[error("Step '{step}' depends on unknown step '{dependency}'")]
    #[diagnostic(
        code(drover::unknown_dependency),
        help("Check that '{dependency}' is defined in your pipeline")
    )]
    UnknownDependency { step: String, dependency: String },

    #[error("Step '{step}' is defined more than once")]
    #[diagnostic(
        code(drover::duplicate_step),
        help("Step names must be unique within a pipeline")
    )]
    DuplicateStep { step: String },

    #[error("Graph vertex '{vertex}' did not complete: {message}")]
    #[diagnostic(code(drover::graph_error))]
    Graph { vertex: String, message: String },

    // ─────────────────────────────────────────────────────────────────────────
    // IO/System Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("Failed to read file '{path}': {error}")]
    #[diagnostic(code(drover::file_read_error))]
    FileReadError { path: PathBuf, error: String },

    #[error("IO error: {message}")]
    #[diagnostic(code(drover::io_error))]
    Io { message: String },

    #[error("YAML parsing error: {message}")]
    #[diagnostic(code(drover::yaml_error))]
    Yaml { message: String },

    #[error("JSON error: {message}")]
    #[diagnostic(code(drover::json_error))]
    Json { message: String },
}

impl From<std::io::Error> for RunnerError {
    fn from(e: std::io::Error) -> Self {
        Self::Io { message: e.to_string() }
    }
}

impl From<serde_yaml::Error> for RunnerError {
    fn from(e: serde_yaml::Error) -> Self {
        Self::Yaml { message: e.to_string() }
    }
}

impl From<serde_json::Error> for RunnerError {
    fn from(e: serde_json::Error) -> Self {
        Self::Json { message: e.to_string() }
    }
}

impl From<glob::PatternError> for RunnerError {
    fn from(e: glob::PatternError) -> Self {
        Self::InvalidCondition {
            pattern: String::new(),
            message: e.to_string(),
        }
    }
}

impl RunnerError {
    /// Cancellation (explicit or by timeout) is a terminal outcome
    /// rather than a failure.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Create a report error from any displayable cause
    pub fn report(cause: impl std::fmt::Display) -> Self {
        Self::ReportFailed {
            message: cause.to_string(),
        }
    }
}

/// Accumulates errors from concurrent work and merges them into one.
#[derive(Debug, Default)]
pub struct ErrorList {
    errors: Vec<RunnerError>,
}

impl ErrorList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, err: RunnerError) {
        match err {
            RunnerError::Multiple { errors } => self.errors.extend(errors),
            other => self.errors.push(other),
        }
    }

    /// Record the error side of a result, if any
    pub fn absorb<T>(&mut self, result: RunnerResult<T>) {
        if let Err(e) = result {
            self.push(e);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// Collapse into `Ok`, the single error, or `Multiple`
    pub fn into_result(mut self) -> RunnerResult<()> {
        match self.errors.len() {
            0 => Ok(()),
            1 => Err(self.errors.remove(0)),
            _ => Err(RunnerError::Multiple {
                errors: self.errors,
            }),
        }
    }
}
