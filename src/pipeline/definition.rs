// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 drover contributors

//! Pipeline definition structures
//!
//! Defines the schema for .drone.yml pipeline files. A file may hold
//! several YAML documents, one pipeline each.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

use super::conditions::Conditions;
use crate::errors::{RunnerError, RunnerResult};

/// All pipeline documents found in one configuration file
#[derive(Debug, Clone, Default)]
pub struct Manifest {
    pub resources: Vec<Pipeline>,
}

impl Manifest {
    /// Parse every YAML document in the string as a pipeline
    pub fn from_yaml(yaml: &str) -> RunnerResult<Self> {
        let mut resources = Vec::new();
        for document in serde_yaml::Deserializer::from_str(yaml) {
            let value = serde_yaml::Value::deserialize(document)?;
            if value.is_null() {
                continue;
            }
            resources.push(serde_yaml::from_value(value)?);
        }
        Ok(Self { resources })
    }

    /// Find the named pipeline; an empty name selects the first one
    pub fn lookup(&self, name: &str) -> RunnerResult<&Pipeline> {
        let found = if name.is_empty() {
            self.resources.first()
        } else {
            self.resources.iter().find(|p| p.name == name)
        };
        found.ok_or_else(|| RunnerError::PipelineNotFound {
            name: name.to_string(),
        })
    }
}

/// A single pipeline resource
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Pipeline {
    #[serde(default)]
    pub version: String,

    #[serde(default = "default_kind")]
    pub kind: String,

    #[serde(default = "default_type", rename = "type")]
    pub kind_type: String,

    #[serde(default = "default_name")]
    pub name: String,

    /// Pipeline-level dependencies on other pipelines
    #[serde(default)]
    pub depends_on: Vec<String>,

    #[serde(default)]
    pub clone: CloneConfig,

    #[serde(default)]
    pub platform: Platform,

    #[serde(default)]
    pub trigger: Conditions,

    /// Steps in declaration order
    #[serde(default)]
    pub steps: Vec<Step>,
}

fn default_kind() -> String {
    "pipeline".to_string()
}

fn default_type() -> String {
    "exec".to_string()
}

fn default_name() -> String {
    "default".to_string()
}

impl Pipeline {
    /// Parse a single pipeline from YAML
    pub fn from_yaml(yaml: &str) -> RunnerResult<Self> {
        serde_yaml::from_str(yaml).map_err(Into::into)
    }

    /// Get a step by name
    pub fn get_step(&self, name: &str) -> Option<&Step> {
        self.steps.iter().find(|s| s.name == name)
    }

    /// Get all step names
    pub fn step_names(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.name.as_str()).collect()
    }
}

/// A single pipeline step
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Step {
    /// Step name (must be unique within pipeline)
    pub name: String,

    /// Shell commands, run in order
    #[serde(default)]
    pub commands: Vec<String>,

    #[serde(default)]
    pub depends_on: Vec<String>,

    #[serde(default)]
    pub detach: bool,

    /// Environment overrides, plain values or secret references
    #[serde(default)]
    pub environment: BTreeMap<String, Variable>,

    /// Failure handling; `ignore` keeps the pipeline green
    #[serde(default)]
    pub failure: String,

    #[serde(default)]
    pub when: Conditions,
}

impl Step {
    pub fn ignores_failure(&self) -> bool {
        self.failure.eq_ignore_ascii_case("ignore")
    }
}

/// Environment variable value: either a literal or a secret reference
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Variable {
    Value(String),
    Secret { from_secret: String },
}

impl Variable {
    /// Name of the referenced secret, if this variable is one
    pub fn secret(&self) -> Option<&str> {
        match self {
            Self::Secret { from_secret } => Some(from_secret),
            Self::Value(_) => None,
        }
    }

    pub fn value(&self) -> Option<&str> {
        match self {
            Self::Value(v) => Some(v),
            Self::Secret { .. } => None,
        }
    }
}

impl<'de> Deserialize<'de> for Variable {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Secret { from_secret: String },
            Bool(bool),
            Int(i64),
            Float(f64),
            Str(String),
        }

        Ok(match Repr::deserialize(deserializer)? {
            Repr::Secret { from_secret } => Self::Secret { from_secret },
            Repr::Bool(b) => Self::Value(b.to_string()),
            Repr::Int(i) => Self::Value(i.to_string()),
            Repr::Float(f) => Self::Value(f.to_string()),
            Repr::Str(s) => Self::Value(s),
        })
    }
}

/// Clone configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CloneConfig {
    pub disable: bool,
    pub depth: u32,
    pub trace: bool,
    pub skip_verify: bool,
}

/// Target platform
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Platform {
    pub os: String,
    pub arch: String,
    pub variant: String,
    pub version: String,
}
