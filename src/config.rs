// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 drover contributors

//! Runner configuration
//!
//! Loaded from `.drover.yaml`. Every field is optional:
//!
//! ```yaml
//! root: /var/lib/drover
//! timeout: 30
//! host_vars: [GOPATH]
//! symlinks:
//!   /var/cache/go: /drone/cache
//! environ:
//!   REGION: eu-west-1
//!   API_KEY:
//!     value: abc123
//!     masked: true
//! secrets:
//!   docker_password: hunter2
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::environ::EnvVar;
use crate::errors::{RunnerError, RunnerResult};

/// Default configuration file name
pub const DEFAULT_CONFIG_FILE: &str = ".drover.yaml";

/// Runner settings shared by every pipeline run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// Base directory for workspaces (temp directory when unset)
    pub root: Option<PathBuf>,

    /// Host path → path under the workspace root
    pub symlinks: BTreeMap<String, String>,

    /// Global variables for every step
    pub environ: BTreeMap<String, EnvironValue>,

    /// Secrets available to `from_secret`
    pub secrets: BTreeMap<String, String>,

    /// Pipeline timeout in minutes, used when the repository has none
    pub timeout: u64,

    /// Host variables passed through in addition to PATH and USER
    pub host_vars: Vec<String>,
}

/// A global variable, optionally masked in logs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EnvironValue {
    Plain(String),
    Detailed {
        value: String,
        #[serde(default)]
        masked: bool,
    },
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            root: None,
            symlinks: BTreeMap::new(),
            environ: BTreeMap::new(),
            secrets: BTreeMap::new(),
            timeout: 60,
            host_vars: Vec::new(),
        }
    }
}

impl RunnerConfig {
    /// Load from a file; a missing file yields the defaults.
    pub fn load(path: &Path) -> RunnerResult<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| RunnerError::FileReadError {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        // an empty file parses as null
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(&content).map_err(Into::into)
    }

    /// Global variables in name order
    pub fn environ_vars(&self) -> Vec<EnvVar> {
        self.environ
            .iter()
            .map(|(name, value)| match value {
                EnvironValue::Plain(data) => EnvVar {
                    name: name.clone(),
                    data: data.clone(),
                    mask: false,
                },
                EnvironValue::Detailed { value, masked } => EnvVar {
                    name: name.clone(),
                    data: value.clone(),
                    mask: *masked,
                },
            })
            .collect()
    }

    /// Effective timeout: the repository's when set, else this config's
    pub fn timeout_for(&self, repo_minutes: u64) -> Duration {
        let minutes = if repo_minutes > 0 {
            repo_minutes
        } else {
            self.timeout
        };
        Duration::from_secs(minutes.saturating_mul(60))
    }
}
