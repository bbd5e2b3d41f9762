// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 drover contributors

//! Lint command - check every pipeline in a manifest

use colored::Colorize;
use miette::Result;
use std::path::PathBuf;

use super::read_source;
use crate::pipeline::{Manifest, PipelineValidator};
use crate::utils::colors;

/// Run the lint command
pub async fn run(source: PathBuf, verbose: bool) -> Result<()> {
    colors::print_header(&format!("Linting {}", source.display()));

    let raw = read_source(&source)?;
    let manifest = match Manifest::from_yaml(&raw) {
        Ok(m) => m,
        Err(e) => {
            eprintln!("  {} Failed to parse pipeline", "✗".red());
            eprintln!();
            return Err(e.into());
        }
    };

    if manifest.resources.is_empty() {
        colors::print_error("No pipelines defined");
        return Err(miette::miette!("Pipeline validation failed"));
    }
    colors::print_success(&format!(
        "{} pipeline(s) parsed",
        manifest.resources.len()
    ));

    let mut failed = 0;
    for pipeline in &manifest.resources {
        let validation = PipelineValidator::validate(pipeline);

        println!();
        if validation.is_valid() {
            println!("{} {}", "✓".green(), pipeline.name.bold());
        } else {
            failed += 1;
            println!("{} {}", "✗".red(), pipeline.name.bold());
        }

        for error in &validation.errors {
            colors::print_error(error);
        }
        for warning in &validation.warnings {
            colors::print_warning(warning);
        }

        if verbose {
            for step in &pipeline.steps {
                let deps = if step.depends_on.is_empty() {
                    String::new()
                } else {
                    format!(" [depends: {}]", step.depends_on.join(", "))
                };
                println!(
                    "    - {} ({} commands){}",
                    step.name,
                    step.commands.len(),
                    deps.dimmed()
                );
            }
        }
    }

    println!();
    if failed > 0 {
        Err(miette::miette!(
            "{} of {} pipeline(s) failed validation",
            failed,
            manifest.resources.len()
        ))
    } else {
        println!("{}", "Pipeline is valid!".green().bold());
        Ok(())
    }
}
