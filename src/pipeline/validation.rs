// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 drover contributors

//! Pipeline validation
//!
//! Lints a pipeline before it is compiled. The compiler assumes a
//! structurally sound pipeline, so the CLI runs this pass first.

use std::collections::HashSet;

use glob::Pattern;

use super::conditions::{Condition, Conditions};
use super::definition::{Pipeline, Step};
use crate::compiler::CLONE_STEP;
use crate::errors::RunnerError;
use crate::runtime::Dag;

/// Pipeline validator
pub struct PipelineValidator;

impl PipelineValidator {
    /// Validate a pipeline definition
    pub fn validate(pipeline: &Pipeline) -> ValidationResult {
        let mut result = ValidationResult::new();

        if pipeline.kind != "pipeline" {
            result.add_error(&format!(
                "Unsupported resource kind '{}', expected 'pipeline'",
                pipeline.kind
            ));
        }
        if pipeline.kind_type != "exec" {
            result.add_warning(&format!(
                "Pipeline type '{}' is executed on the host like 'exec'",
                pipeline.kind_type
            ));
        }

        if pipeline.steps.is_empty() {
            result.add_error("Pipeline has no steps defined");
        }

        let mut seen_names = HashSet::new();
        for step in &pipeline.steps {
            if step.name.trim().is_empty() {
                result.add_error("Step name must not be empty");
                continue;
            }
            if !seen_names.insert(step.name.as_str()) {
                result.add_error(&format!("Duplicate step name: '{}'", step.name));
            }
            if !pipeline.clone.disable && step.name == CLONE_STEP {
                result.add_error(&format!(
                    "Step name '{}' is reserved while cloning is enabled",
                    CLONE_STEP
                ));
            }
        }

        Self::validate_graph(pipeline, &mut result);

        Self::validate_conditions("trigger", &pipeline.trigger, &mut result);
        for step in &pipeline.steps {
            Self::validate_step(step, &mut result);
        }

        result
    }

    /// Unknown dependencies and cycles. Steps may depend on the
    /// implicit clone step.
    fn validate_graph(pipeline: &Pipeline, result: &mut ValidationResult) {
        let no_deps: Vec<String> = Vec::new();
        let mut vertices: Vec<(&str, &[String])> = Vec::new();
        if !pipeline.clone.disable && pipeline.get_step(CLONE_STEP).is_none() {
            vertices.push((CLONE_STEP, no_deps.as_slice()));
        }
        vertices.extend(
            pipeline
                .steps
                .iter()
                .map(|s| (s.name.as_str(), s.depends_on.as_slice())),
        );

        match Dag::build(vertices) {
            Ok(_) => {}
            Err(RunnerError::CircularDependency { steps }) => {
                result.add_error(&format!("Circular dependency: {}", steps.join(" → ")));
            }
            Err(RunnerError::UnknownDependency { step, dependency }) => {
                result.add_error(&format!(
                    "Step '{}' depends on unknown step '{}'",
                    step, dependency
                ));
            }
            // already reported by the name check
            Err(RunnerError::DuplicateStep { .. }) => {}
            Err(e) => {
                result.add_error(&format!("Dependency graph error: {}", e));
            }
        }
    }

    fn validate_step(step: &Step, result: &mut ValidationResult) {
        if step.commands.is_empty() {
            result.add_warning(&format!("Step '{}': no commands to run", step.name));
        }
        for (name, value) in &step.environment {
            if value.secret().is_some_and(str::is_empty) {
                result.add_error(&format!(
                    "Step '{}': variable '{}' references an empty secret name",
                    step.name, name
                ));
            }
        }
        Self::validate_conditions(&format!("step '{}'", step.name), &step.when, result);
    }

    fn validate_conditions(owner: &str, when: &Conditions, result: &mut ValidationResult) {
        let fields: [(&str, &Condition); 9] = [
            ("action", &when.action),
            ("branch", &when.branch),
            ("cron", &when.cron),
            ("event", &when.event),
            ("instance", &when.instance),
            ("ref", &when.reference),
            ("repo", &when.repo),
            ("status", &when.status),
            ("target", &when.target),
        ];
        for (field, condition) in fields {
            for pattern in condition.include.iter().chain(&condition.exclude) {
                if let Err(e) = Pattern::new(pattern) {
                    result.add_warning(&format!(
                        "{}: {} pattern '{}' is not a valid glob ({}), matched literally",
                        owner, field, pattern, e.msg
                    ));
                }
            }
        }
    }
}

/// Result of pipeline validation
#[derive(Debug, Default)]
pub struct ValidationResult {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_error(&mut self, message: &str) {
        self.errors.push(message.to_string());
    }

    pub fn add_warning(&mut self, message: &str) {
        self.warnings.push(message.to_string());
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}
