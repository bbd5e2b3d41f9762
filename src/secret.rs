// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 drover contributors

//! Secret providers
//!
//! Secrets are looked up by name at compile time. Providers can be
//! chained; the first provider that knows a name wins.

use async_trait::async_trait;
use std::collections::BTreeMap;

use crate::errors::RunnerResult;
use crate::metadata::{Build, Repo};

/// Request context for a secret lookup
#[derive(Debug, Clone, Copy)]
pub struct SecretRequest<'a> {
    pub name: &'a str,
    pub build: &'a Build,
    pub repo: &'a Repo,
}

/// Source of named secret values
#[async_trait]
pub trait SecretProvider: Send + Sync {
    /// Returns `None` when the provider does not know the name
    async fn find(&self, request: &SecretRequest<'_>) -> RunnerResult<Option<String>>;
}

/// Provider backed by a fixed name → value mapping
#[derive(Debug, Clone, Default)]
pub struct StaticSecrets {
    values: BTreeMap<String, String>,
}

impl StaticSecrets {
    pub fn new(values: BTreeMap<String, String>) -> Self {
        Self { values }
    }
}

#[async_trait]
impl SecretProvider for StaticSecrets {
    async fn find(&self, request: &SecretRequest<'_>) -> RunnerResult<Option<String>> {
        Ok(self.values.get(request.name).cloned())
    }
}

/// Chains providers; the first match wins
pub struct CombinedSecrets<'p> {
    providers: Vec<&'p dyn SecretProvider>,
}

impl<'p> CombinedSecrets<'p> {
    pub fn new(providers: Vec<&'p dyn SecretProvider>) -> Self {
        Self { providers }
    }
}

#[async_trait]
impl SecretProvider for CombinedSecrets<'_> {
    async fn find(&self, request: &SecretRequest<'_>) -> RunnerResult<Option<String>> {
        for provider in &self.providers {
            if let Some(value) = provider.find(request).await? {
                return Ok(Some(value));
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secrets(pairs: &[(&str, &str)]) -> StaticSecrets {
        StaticSecrets::new(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }

    #[tokio::test]
    async fn test_combined_first_match_wins() {
        let request_scoped = secrets(&[("token", "from-request")]);
        let global = secrets(&[("token", "from-global"), ("password", "hunter2")]);
        let chain = CombinedSecrets::new(vec![&request_scoped as &dyn SecretProvider, &global]);

        let build = Build::default();
        let repo = Repo::default();
        let find = |name: &'static str| SecretRequest {
            name,
            build: &build,
            repo: &repo,
        };

        assert_eq!(
            chain.find(&find("token")).await.unwrap().as_deref(),
            Some("from-request")
        );
        assert_eq!(
            chain.find(&find("password")).await.unwrap().as_deref(),
            Some("hunter2")
        );
        assert_eq!(chain.find(&find("missing")).await.unwrap(), None);
    }
}
