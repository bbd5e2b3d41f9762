// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 drover contributors

//! Exec command - run the pipeline on the host

use colored::Colorize;
use miette::Result;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::PipelineArgs;
use crate::engine::HostEngine;
use crate::metadata::Status;
use crate::runtime::{self, ConsoleReporter, ConsoleStreamer, Execer, NopReporter, Reporter, State};
use crate::utils::colors;

/// Run the exec command
pub async fn run(args: PipelineArgs, pretty: Option<bool>, verbose: bool) -> Result<()> {
    let loaded = args.load(verbose)?;
    let spec = Arc::new(loaded.compile().await);
    let state = Arc::new(State::new(loaded.build.clone(), loaded.stage.clone(), &spec));

    let timeout = loaded.config.timeout_for(loaded.repo.timeout);
    let cancel = CancellationToken::new();
    let token = runtime::with_timeout(&cancel, timeout);

    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("{}", "received signal, terminating process".yellow());
            interrupt.cancel();
        }
    });

    let pretty = pretty.unwrap_or_else(colors::should_use_colors);
    let reporter: Arc<dyn Reporter> = if pretty {
        Arc::new(ConsoleReporter::new())
    } else {
        Arc::new(NopReporter)
    };

    info!(
        stage.name = %loaded.stage.name,
        build.number = loaded.build.number,
        steps = spec.steps.len(),
        timeout.secs = timeout.as_secs(),
        "executing pipeline"
    );
    let result = Execer::new(
        Arc::new(HostEngine::new()),
        reporter,
        Arc::new(ConsoleStreamer::new(pretty)),
    )
    .exec(token, spec, state.clone())
    .await;

    // stop the timeout watcher
    cancel.cancel();

    if let Err(e) = result {
        warn!(error = %e, "pipeline finished with errors");
        return Err(e.into());
    }

    let stage = state.stage();
    match stage.status {
        Status::Failure => Err(miette::miette!("Pipeline '{}' failed", stage.name)),
        Status::Cancelled => Err(miette::miette!("Pipeline '{}' was cancelled", stage.name)),
        _ => Ok(()),
    }
}
