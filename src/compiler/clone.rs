// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 drover contributors

//! Git clone commands and environment

use crate::environ::Environ;
use crate::pipeline::CloneConfig;

const PULL_REQUEST_PREFIXES: &[&str] = &["refs/pull/", "refs/pull-requests/", "refs/merge-requests/"];

/// What to clone
#[derive(Debug, Clone, Default)]
pub struct CloneArgs<'a> {
    pub remote: &'a str,
    pub branch: &'a str,
    pub commit: &'a str,
    pub reference: &'a str,
    pub depth: u32,
}

/// Shell commands that initialise the workspace repository and check
/// out the build revision. Every build-supplied value is single-quoted.
pub fn commands(args: &CloneArgs<'_>) -> Vec<String> {
    let mut cmds = vec![
        "git init".to_string(),
        format!("git remote add origin {}", quote(args.remote)),
    ];
    let depth = if args.depth > 0 {
        format!(" --depth={}", args.depth)
    } else {
        String::new()
    };

    if let Some(tag) = args.reference.strip_prefix("refs/tags/") {
        cmds.push(format!(
            "git fetch{} origin {}",
            depth,
            quote(&format!("+refs/tags/{}:", tag))
        ));
        cmds.push("git checkout -qf FETCH_HEAD".to_string());
    } else if PULL_REQUEST_PREFIXES
        .iter()
        .any(|p| args.reference.starts_with(p))
    {
        cmds.push(format!(
            "git fetch{} origin {}",
            depth,
            quote(&format!("+refs/heads/{}:", args.branch))
        ));
        cmds.push(format!("git checkout {}", quote(args.branch)));
        cmds.push(format!(
            "git fetch origin {}",
            quote(&format!("{}:", args.reference))
        ));
        cmds.push(format!("git merge {}", quote(args.commit)));
    } else {
        cmds.push(format!(
            "git fetch{} origin {}",
            depth,
            quote(&format!("+refs/heads/{}:", args.branch))
        ));
        cmds.push(format!(
            "git checkout {} -b {}",
            quote(args.commit),
            quote(args.branch)
        ));
    }
    cmds
}

/// Quote a value as a single posix shell word
fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "'\\''"))
}

/// Git identity and transport variables for the clone
pub fn environ(config: &CloneConfig, author_name: &str, author_email: &str) -> Environ {
    let name = if author_name.is_empty() { "drone" } else { author_name };
    let email = if author_email.is_empty() {
        "drone@localhost"
    } else {
        author_email
    };

    let mut env = Environ::new();
    env.insert("GIT_AUTHOR_NAME".into(), name.into());
    env.insert("GIT_AUTHOR_EMAIL".into(), email.into());
    env.insert("GIT_COMMITTER_NAME".into(), name.into());
    env.insert("GIT_COMMITTER_EMAIL".into(), email.into());
    if config.trace {
        env.insert("GIT_TRACE".into(), "true".into());
    }
    if config.skip_verify {
        env.insert("GIT_SSL_NO_VERIFY".into(), "true".into());
    }
    env
}
