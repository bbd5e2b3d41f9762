// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 drover contributors

//! # drover - host-process CI pipeline runner
//!
//! `drover` compiles declarative `.drone.yml` pipelines into a
//! self-contained execution spec and runs the steps as plain processes
//! on the host, in dependency order.
//!
//! ## Features
//!
//! - **Compiler** - Lowers pipelines into scripts, environment and run policies
//! - **Graph scheduling** - Steps run concurrently as their dependencies finish
//! - **Run policies** - `on-success`, `on-failure`, `always` and `never` steps
//! - **Secret redaction** - Masked values never reach the step logs
//! - **Cancellation** - Ctrl-C and timeouts stop running processes
//!
//! ## Quick Start
//!
//! ```bash
//! # Check the pipeline
//! drover lint
//!
//! # Inspect the compiled spec
//! drover compile --branch main
//!
//! # Run it
//! drover exec --secret token=abc123
//! ```

pub mod cli;
pub mod compiler;
pub mod config;
pub mod engine;
pub mod environ;
pub mod errors;
pub mod metadata;
pub mod pipeline;
pub mod runtime;
pub mod secret;
pub mod utils;

// Re-export commonly used types
pub use compiler::{Compiler, CompilerArgs};
pub use engine::{Engine, HostEngine, Spec};
pub use errors::{RunnerError, RunnerResult};
pub use pipeline::{Manifest, Pipeline};
pub use runtime::{Execer, State};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
