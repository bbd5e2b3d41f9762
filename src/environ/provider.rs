// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 drover contributors

//! Global environment providers
//!
//! Providers supply variables added to every step. Masked variables
//! are injected like any other but redacted from step logs.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::Environ;
use crate::errors::RunnerResult;
use crate::metadata::{Build, Repo};

/// A named variable supplied by a provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvVar {
    pub name: String,
    pub data: String,
    #[serde(default)]
    pub mask: bool,
}

/// Request context for listing variables
#[derive(Debug, Clone, Copy)]
pub struct EnvironRequest<'a> {
    pub build: &'a Build,
    pub repo: &'a Repo,
}

/// Source of global environment variables
#[async_trait]
pub trait EnvironProvider: Send + Sync {
    /// List variables in a stable order
    async fn list(&self, request: &EnvironRequest<'_>) -> RunnerResult<Vec<EnvVar>>;
}

/// Provider backed by a fixed list
#[derive(Debug, Clone, Default)]
pub struct StaticEnviron {
    vars: Vec<EnvVar>,
}

impl StaticEnviron {
    pub fn new(vars: Vec<EnvVar>) -> Self {
        Self { vars }
    }

    /// Unmasked variables from a plain mapping
    pub fn from_map(env: &Environ) -> Self {
        Self::new(
            env.iter()
                .map(|(name, data)| EnvVar {
                    name: name.clone(),
                    data: data.clone(),
                    mask: false,
                })
                .collect(),
        )
    }
}

#[async_trait]
impl EnvironProvider for StaticEnviron {
    async fn list(&self, _request: &EnvironRequest<'_>) -> RunnerResult<Vec<EnvVar>> {
        Ok(self.vars.clone())
    }
}

/// Unmasked variables as a mapping
pub fn unmasked_map(vars: &[EnvVar]) -> Environ {
    vars.iter()
        .filter(|v| !v.mask)
        .map(|v| (v.name.clone(), v.data.clone()))
        .collect()
}

/// Masked variables only
pub fn masked(vars: &[EnvVar]) -> Vec<&EnvVar> {
    vars.iter().filter(|v| v.mask).collect()
}
