// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 drover contributors

//! Build metadata
//!
//! Describes the build, repository, stage and system a pipeline runs
//! for. These values feed the compiler (environment, clone arguments,
//! trigger matching) and are mutated by the execution state as steps
//! progress.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Lifecycle status of a step or stage
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    #[default]
    Pending,
    Running,
    Success,
    Failure,
    Skipped,
    Cancelled,
}

impl Status {
    /// Terminal states never transition again
    pub fn is_done(self) -> bool {
        !matches!(self, Self::Pending | Self::Running)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Success => "success",
            Self::Failure => "failure",
            Self::Skipped => "skipped",
            Self::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Build information
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Build {
    pub id: i64,
    pub number: i64,
    pub parent: i64,
    pub status: Status,
    pub event: String,
    pub action: String,
    pub link: String,
    pub cron: String,
    pub message: String,
    pub before: String,
    pub after: String,
    #[serde(rename = "ref")]
    pub reference: String,
    pub source_repo: String,
    pub source: String,
    pub target: String,
    pub author_login: String,
    pub author_name: String,
    pub author_email: String,
    pub author_avatar: String,
    pub sender: String,
    pub deploy_to: String,
    pub params: BTreeMap<String, String>,
    pub created: i64,
    pub started: i64,
    pub finished: i64,
}

/// Repository information
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Repo {
    pub id: i64,
    pub namespace: String,
    pub name: String,
    pub slug: String,
    pub scm: String,
    pub http_url: String,
    pub ssh_url: String,
    pub link: String,
    pub branch: String,
    pub private: bool,
    pub visibility: String,
    pub trusted: bool,
    /// Build timeout in minutes
    pub timeout: u64,
}

/// One scheduled execution attempt of a pipeline on this machine
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Stage {
    pub id: i64,
    pub number: i64,
    pub name: String,
    pub kind: String,
    #[serde(rename = "type")]
    pub kind_type: String,
    pub status: Status,
    pub error: String,
    pub exit_code: i32,
    pub machine: String,
    pub os: String,
    pub arch: String,
    pub variant: String,
    pub kernel: String,
    pub started: i64,
    pub stopped: i64,
    pub depends_on: Vec<String>,
    pub steps: Vec<StepInfo>,
}

/// Status record of a single step within a stage
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StepInfo {
    pub number: i64,
    pub name: String,
    pub status: Status,
    pub error: String,
    pub err_ignore: bool,
    pub exit_code: i32,
    pub started: i64,
    pub stopped: i64,
}

/// Information about the server the runner reports to
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct System {
    pub proto: String,
    pub host: String,
    pub link: String,
    pub version: String,
}

/// Credentials written to the workspace netrc file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Netrc {
    pub machine: String,
    pub login: String,
    pub password: String,
}

impl Stage {
    /// Find a step record by name
    pub fn step(&self, name: &str) -> Option<&StepInfo> {
        self.steps.iter().find(|s| s.name == name)
    }

    pub(crate) fn step_mut(&mut self, name: &str) -> Option<&mut StepInfo> {
        self.steps.iter_mut().find(|s| s.name == name)
    }
}
