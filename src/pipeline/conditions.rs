// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 drover contributors

//! Trigger conditions
//!
//! A step's `when` block restricts it to builds whose metadata match
//! include/exclude glob patterns. Each condition may be written as a
//! single string, a list, or an explicit `{include, exclude}` map.

use glob::Pattern;
use serde::{Deserialize, Deserializer, Serialize};

/// Include/exclude pattern lists for one build attribute
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Condition {
    pub include: Vec<String>,
    pub exclude: Vec<String>,
}

impl Condition {
    pub fn is_empty(&self) -> bool {
        self.include.is_empty() && self.exclude.is_empty()
    }

    /// Exclude patterns win; an empty include list accepts anything.
    pub fn matches(&self, value: &str) -> bool {
        if self.exclude.iter().any(|p| glob_match(p, value)) {
            return false;
        }
        self.include.is_empty() || self.include.iter().any(|p| glob_match(p, value))
    }
}

fn glob_match(pattern: &str, value: &str) -> bool {
    match Pattern::new(pattern) {
        Ok(p) => p.matches(value),
        // a malformed pattern can still match literally
        Err(_) => pattern == value,
    }
}

impl<'de> Deserialize<'de> for Condition {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            One(String),
            Many(Vec<String>),
            Explicit {
                #[serde(default)]
                include: Vec<String>,
                #[serde(default)]
                exclude: Vec<String>,
            },
        }

        Ok(match Repr::deserialize(deserializer)? {
            Repr::One(s) => Self {
                include: vec![s],
                exclude: vec![],
            },
            Repr::Many(include) => Self {
                include,
                exclude: vec![],
            },
            Repr::Explicit { include, exclude } => Self { include, exclude },
        })
    }
}

/// The `when` block of a step (or `trigger` of a pipeline)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Conditions {
    pub action: Condition,
    pub branch: Condition,
    pub cron: Condition,
    pub event: Condition,
    pub instance: Condition,
    #[serde(rename = "ref")]
    pub reference: Condition,
    pub repo: Condition,
    pub status: Condition,
    pub target: Condition,
}

/// Build attributes a `when` block is evaluated against
#[derive(Debug, Clone, Default)]
pub struct MatchContext<'a> {
    pub action: &'a str,
    pub branch: &'a str,
    pub cron: &'a str,
    pub event: &'a str,
    pub instance: &'a str,
    pub reference: &'a str,
    pub repo: &'a str,
    pub target: &'a str,
}

impl Conditions {
    /// Evaluate every attribute condition except `status`, which
    /// selects a run policy instead of gating the step.
    pub fn matches(&self, ctx: &MatchContext<'_>) -> bool {
        self.action.matches(ctx.action)
            && self.branch.matches(ctx.branch)
            && self.cron.matches(ctx.cron)
            && self.event.matches(ctx.event)
            && self.instance.matches(ctx.instance)
            && self.reference.matches(ctx.reference)
            && self.repo.matches(ctx.repo)
            && self.target.matches(ctx.target)
    }

    /// Status lists both outcomes, e.g. `status: [success, failure]`
    pub fn runs_always(&self) -> bool {
        !self.status.is_empty() && self.status.matches("success") && self.status.matches("failure")
    }

    /// Status admits the failure outcome
    pub fn runs_on_failure(&self) -> bool {
        !self.status.is_empty() && self.status.matches("failure")
    }
}
