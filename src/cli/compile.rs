// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 drover contributors

//! Compile command - print the execution spec

use miette::{IntoDiagnostic, Result};
use tracing::debug;

use super::PipelineArgs;

/// Run the compile command
pub async fn run(args: PipelineArgs, verbose: bool) -> Result<()> {
    let loaded = args.load(verbose)?;
    let spec = loaded.compile().await;
    debug!(
        stage.name = %loaded.stage.name,
        steps = spec.steps.len(),
        "pipeline compiled"
    );

    let json = serde_json::to_string_pretty(&spec).into_diagnostic()?;
    println!("{}", json);
    Ok(())
}
