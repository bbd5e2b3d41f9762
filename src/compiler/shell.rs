// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 drover contributors

//! Posix shell scripts for compiled steps

use std::collections::HashSet;

/// Interpreter used for every generated script
pub const SHELL: &str = "/bin/sh";

/// Command and leading arguments; the script path is appended last.
pub fn command() -> (String, Vec<String>) {
    (SHELL.to_string(), vec!["-e".to_string()])
}

/// Render commands as a script that echoes each command before
/// running it and stops at the first failure.
pub fn script(commands: &[String]) -> String {
    let mut buf = String::from("\nset -e\n");
    for cmd in commands {
        buf.push_str("\necho + ");
        buf.push_str(&trace(cmd));
        buf.push('\n');
        buf.push_str(cmd);
        buf.push('\n');
    }
    buf
}

/// Quoted copy of a command that the shell prints verbatim
fn trace(cmd: &str) -> String {
    format!("{:?}", cmd).replace('$', "\\$").replace('`', "\\`")
}

/// Lowercase ASCII alphanumerics separated by single dashes
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    if slug.is_empty() {
        slug.push_str("step");
    }
    slug
}

/// Hands out unique script slugs in declaration order.
///
/// A slug already handed out (or reserved) gets the first free
/// numeric suffix starting at `-2`.
#[derive(Debug, Default)]
pub struct Slugger {
    taken: HashSet<String>,
}

impl Slugger {
    pub fn new<'a>(reserved: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            taken: reserved.into_iter().map(str::to_string).collect(),
        }
    }

    pub fn slug(&mut self, name: &str) -> String {
        let base = slugify(name);
        let mut candidate = base.clone();
        let mut n = 2;
        while self.taken.contains(&candidate) {
            candidate = format!("{}-{}", base, n);
            n += 1;
        }
        self.taken.insert(candidate.clone());
        candidate
    }
}
