// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 drover contributors

//! Compiled pipeline specification
//!
//! A `Spec` is the self-contained execution plan produced by the
//! compiler. It is immutable once compiled; the execer clones a step's
//! environment before extending it.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::environ::Environ;

/// Execution plan for one pipeline run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Spec {
    #[serde(default)]
    pub platform: Platform,
    pub root: PathBuf,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<File>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub links: Vec<Link>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub steps: Vec<Step>,
}

impl Spec {
    pub fn step(&self, name: &str) -> Option<&Step> {
        self.steps.iter().find(|s| s.name == name)
    }

    /// True when at least one step declares a dependency
    pub fn is_graph(&self) -> bool {
        self.steps.iter().any(|s| !s.depends_on.is_empty())
    }
}

/// A compiled pipeline step
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    pub name: String,
    pub command: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
    #[serde(default)]
    pub detach: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
    #[serde(default, rename = "environment", skip_serializing_if = "Environ::is_empty")]
    pub envs: Environ,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<File>,
    #[serde(default)]
    pub ignore_err: bool,
    #[serde(default)]
    pub run_policy: RunPolicy,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub secrets: Vec<Secret>,
    pub working_dir: PathBuf,
}

/// A file or directory created before execution
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct File {
    pub path: PathBuf,
    pub mode: u32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub data: Vec<u8>,
    #[serde(default)]
    pub is_dir: bool,
}

impl File {
    pub fn dir(path: PathBuf) -> Self {
        Self {
            path,
            mode: 0o700,
            data: Vec::new(),
            is_dir: true,
        }
    }

    pub fn new(path: PathBuf, mode: u32, data: impl Into<Vec<u8>>) -> Self {
        Self {
            path,
            mode,
            data: data.into(),
            is_dir: false,
        }
    }
}

/// A symbolic link; `target` lives inside the workspace root
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub source: PathBuf,
    pub target: PathBuf,
}

/// Target platform, passed through for the engine
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Platform {
    #[serde(default)]
    pub os: String,
    #[serde(default)]
    pub arch: String,
    #[serde(default)]
    pub variant: String,
    #[serde(default)]
    pub version: String,
}

/// A secret injected into a step's environment
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Secret {
    pub name: String,
    pub env: String,
    /// Resolved value; `None` when no provider knew the name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Vec<u8>>,
    #[serde(default)]
    pub mask: bool,
}

impl Secret {
    /// Value as text, empty when unresolved
    pub fn value(&self) -> String {
        self.data
            .as_deref()
            .map(|d| String::from_utf8_lossy(d).into_owned())
            .unwrap_or_default()
    }
}

/// Whether a step starts given the pipeline's pass/fail state so far
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunPolicy {
    #[default]
    OnSuccess,
    OnFailure,
    Always,
    Never,
}

impl std::fmt::Display for RunPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OnSuccess => write!(f, "on-success"),
            Self::OnFailure => write!(f, "on-failure"),
            Self::Always => write!(f, "always"),
            Self::Never => write!(f, "never"),
        }
    }
}
