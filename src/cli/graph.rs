// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 drover contributors

//! Graph command - visualize the compiled steps as a graph

use miette::Result;

use super::{GraphFormat, PipelineArgs};
use crate::runtime::Dag;

/// Run the graph command
pub async fn run(args: PipelineArgs, format: GraphFormat, verbose: bool) -> Result<()> {
    let loaded = args.load(verbose)?;
    let spec = loaded.compile().await;
    let dag = Dag::from_spec(&spec)?;

    let output = match format {
        GraphFormat::Text => dag.to_text(),
        GraphFormat::Dot => dag.to_dot(),
        GraphFormat::Mermaid => dag.to_mermaid(),
    };

    println!("{}", output);

    Ok(())
}
