// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 drover contributors

//! Environment variables
//!
//! Flattens build metadata into `DRONE_*` variables, merges variable
//! layers and expands `$VAR` references.

pub mod provider;

pub use provider::{EnvVar, EnvironProvider, EnvironRequest, StaticEnviron};

use regex::{Captures, Regex};
use std::collections::BTreeMap;
use std::sync::OnceLock;

use crate::metadata::{Build, Repo, Stage, StepInfo, Status, System};

/// Environment mapping; ordered so compiled output is deterministic.
pub type Environ = BTreeMap<String, String>;

/// Host variable lookup, swappable in tests
pub type Getenv = fn(&str) -> Option<String>;

/// Reads a variable from the runner's own process environment
pub fn host_getenv(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

/// Host variables passed through to child processes
pub const HOST_VARS: &[&str] = &["PATH", "USER"];

/// Merge layers; later layers win on key collision.
pub fn combine<I>(layers: I) -> Environ
where
    I: IntoIterator<Item = Environ>,
{
    let mut out = Environ::new();
    for layer in layers {
        out.extend(layer);
    }
    out
}

fn pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| {
            Regex::new(r"\$(?:(\$)|\{([A-Za-z_][A-Za-z0-9_]*)(?::-([^}]*))?\}|([A-Za-z_][A-Za-z0-9_]*))")
                .ok()
        })
        .as_ref()
}

/// Replace `$VAR`, `${VAR}` and `${VAR:-default}` using `lookup`.
/// Unknown variables become empty; `$$` yields a literal `$`.
pub fn substitute<F>(text: &str, lookup: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    let Some(pattern) = pattern() else {
        return text.to_string();
    };
    pattern
        .replace_all(text, |caps: &Captures<'_>| {
            if caps.get(1).is_some() {
                return "$".to_string();
            }
            let name = caps
                .get(2)
                .or_else(|| caps.get(4))
                .map(|m| m.as_str())
                .unwrap_or_default();
            match lookup(name) {
                Some(v) if !v.is_empty() => v,
                _ => caps.get(3).map(|m| m.as_str().to_string()).unwrap_or_default(),
            }
        })
        .into_owned()
}

/// Expand references in `env` values against the outer `scope`.
pub fn expand(env: &Environ, scope: &Environ) -> Environ {
    env.iter()
        .map(|(k, v)| (k.clone(), substitute(v, |name| scope.get(name).cloned())))
        .collect()
}

/// Allow-listed variables from the host
pub fn host(names: &[String], getenv: Getenv) -> Environ {
    names
        .iter()
        .filter_map(|name| {
            getenv(name)
                .filter(|v| !v.is_empty())
                .map(|v| (name.clone(), v))
        })
        .collect()
}

/// Proxy settings from the host, exported in both cases.
pub fn proxy(getenv: Getenv) -> Environ {
    let mut env = Environ::new();
    for name in ["http_proxy", "https_proxy", "no_proxy"] {
        let upper = name.to_uppercase();
        let value = getenv(name)
            .filter(|v| !v.is_empty())
            .or_else(|| getenv(&upper).filter(|v| !v.is_empty()));
        if let Some(value) = value {
            env.insert(name.to_string(), value.clone());
            env.insert(upper, value);
        }
    }
    env
}

fn vars<const N: usize>(pairs: [(&str, String); N]) -> Environ {
    pairs
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
}

fn outcome(status: Status) -> String {
    if status == Status::Failure {
        "failure".to_string()
    } else {
        "success".to_string()
    }
}

pub fn system(system: &System) -> Environ {
    vars([
        ("CI", "true".to_string()),
        ("DRONE", "true".to_string()),
        ("DRONE_SYSTEM_PROTO", system.proto.clone()),
        ("DRONE_SYSTEM_HOST", system.host.clone()),
        ("DRONE_SYSTEM_HOSTNAME", system.host.clone()),
        ("DRONE_SYSTEM_VERSION", system.version.clone()),
    ])
}

pub fn repo(repo: &Repo) -> Environ {
    vars([
        ("DRONE_REPO", repo.slug.clone()),
        ("DRONE_REPO_SCM", repo.scm.clone()),
        ("DRONE_REPO_OWNER", repo.namespace.clone()),
        ("DRONE_REPO_NAMESPACE", repo.namespace.clone()),
        ("DRONE_REPO_NAME", repo.name.clone()),
        ("DRONE_REPO_LINK", repo.link.clone()),
        ("DRONE_REPO_BRANCH", repo.branch.clone()),
        ("DRONE_REMOTE_URL", repo.http_url.clone()),
        ("DRONE_GIT_HTTP_URL", repo.http_url.clone()),
        ("DRONE_GIT_SSH_URL", repo.ssh_url.clone()),
        ("DRONE_REPO_VISIBILITY", repo.visibility.clone()),
        ("DRONE_REPO_PRIVATE", repo.private.to_string()),
    ])
}

pub fn build(build: &Build) -> Environ {
    let mut env = vars([
        ("DRONE_BRANCH", build.target.clone()),
        ("DRONE_SOURCE_BRANCH", build.source.clone()),
        ("DRONE_TARGET_BRANCH", build.target.clone()),
        ("DRONE_COMMIT", build.after.clone()),
        ("DRONE_COMMIT_SHA", build.after.clone()),
        ("DRONE_COMMIT_BEFORE", build.before.clone()),
        ("DRONE_COMMIT_AFTER", build.after.clone()),
        ("DRONE_COMMIT_REF", build.reference.clone()),
        ("DRONE_COMMIT_BRANCH", build.target.clone()),
        ("DRONE_COMMIT_LINK", build.link.clone()),
        ("DRONE_COMMIT_MESSAGE", build.message.clone()),
        ("DRONE_COMMIT_AUTHOR", build.author_login.clone()),
        ("DRONE_COMMIT_AUTHOR_EMAIL", build.author_email.clone()),
        ("DRONE_COMMIT_AUTHOR_AVATAR", build.author_avatar.clone()),
        ("DRONE_COMMIT_AUTHOR_NAME", build.author_name.clone()),
        ("DRONE_BUILD_NUMBER", build.number.to_string()),
        ("DRONE_BUILD_PARENT", build.parent.to_string()),
        ("DRONE_BUILD_EVENT", build.event.clone()),
        ("DRONE_BUILD_ACTION", build.action.clone()),
        ("DRONE_BUILD_STATUS", outcome(build.status)),
        ("DRONE_BUILD_CREATED", build.created.to_string()),
        ("DRONE_BUILD_STARTED", build.started.to_string()),
        ("DRONE_BUILD_FINISHED", build.finished.to_string()),
        ("DRONE_DEPLOY_TO", build.deploy_to.clone()),
    ]);
    if let Some(tag) = build.reference.strip_prefix("refs/tags/") {
        env.insert("DRONE_TAG".into(), tag.to_string());
    }
    if let Some(rest) = build.reference.strip_prefix("refs/pull/") {
        if let Some(number) = rest.split('/').next() {
            env.insert("DRONE_PULL_REQUEST".into(), number.to_string());
        }
    }
    env
}

pub fn stage(stage: &Stage) -> Environ {
    let failed: Vec<&str> = stage
        .steps
        .iter()
        .filter(|s| s.status == Status::Failure)
        .map(|s| s.name.as_str())
        .collect();
    vars([
        ("DRONE_STAGE_KIND", stage.kind.clone()),
        ("DRONE_STAGE_TYPE", stage.kind_type.clone()),
        ("DRONE_STAGE_NAME", stage.name.clone()),
        ("DRONE_STAGE_NUMBER", stage.number.to_string()),
        ("DRONE_STAGE_MACHINE", stage.machine.clone()),
        ("DRONE_STAGE_OS", stage.os.clone()),
        ("DRONE_STAGE_ARCH", stage.arch.clone()),
        ("DRONE_STAGE_VARIANT", stage.variant.clone()),
        ("DRONE_STAGE_DEPENDS_ON", stage.depends_on.join(",")),
        ("DRONE_STAGE_STATUS", outcome(stage.status)),
        ("DRONE_STAGE_STARTED", stage.started.to_string()),
        ("DRONE_STAGE_FINISHED", stage.stopped.to_string()),
        ("DRONE_FAILED_STEPS", failed.join(",")),
    ])
}

pub fn step(step: &StepInfo) -> Environ {
    vars([
        ("DRONE_STEP_NAME", step.name.clone()),
        ("DRONE_STEP_NUMBER", step.number.to_string()),
    ])
}

/// Links back to the server's build page
pub fn link(repo: &Repo, build: &Build, system: &System) -> Environ {
    vars([(
        "DRONE_BUILD_LINK",
        format!(
            "{}://{}/{}/{}",
            system.proto, system.host, repo.slug, build.number
        ),
    )])
}
