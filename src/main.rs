// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 drover contributors

//! drover - host-process CI pipeline runner
//!
//! Compile and execute `.drone.yml` pipelines on the local machine.

use clap::Parser;
use miette::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use drover::cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let default_filter = if cli.verbose {
        "drover=debug"
    } else {
        "drover=info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    // Change to specified directory if provided
    if let Some(ref dir) = cli.directory {
        std::env::set_current_dir(dir).map_err(|e| {
            miette::miette!("Failed to change to directory '{}': {}", dir.display(), e)
        })?;
    }

    // Dispatch to command handlers
    match cli.command {
        Commands::Compile { args } => drover::cli::compile::run(args, cli.verbose).await,
        Commands::Exec { args, pretty } => {
            drover::cli::exec::run(args, pretty, cli.verbose).await
        }
        Commands::Graph { args, format } => {
            drover::cli::graph::run(args, format, cli.verbose).await
        }
        Commands::Lint { source } => drover::cli::lint::run(source, cli.verbose).await,
    }
}
