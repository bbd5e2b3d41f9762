// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 drover contributors

//! Terminal styling
//!
//! Glyphs and colors for step and stage statuses, shared by the
//! console reporter and the CLI.

use colored::{ColoredString, Colorize};

use crate::metadata::Status;

/// Check if colors should be used
pub fn should_use_colors() -> bool {
    if std::env::var_os("NO_COLOR").is_some() {
        return false;
    }
    std::env::var_os("TERM").is_some()
}

/// Glyph for a status
pub fn glyph(status: Status) -> ColoredString {
    match status {
        Status::Pending => "·".dimmed(),
        Status::Running => "→".blue(),
        Status::Success => "✓".green(),
        Status::Failure => "✗".red(),
        Status::Skipped => "○".dimmed(),
        Status::Cancelled => "⊘".yellow(),
    }
}

/// Status word, colored like its glyph
pub fn label(status: Status) -> ColoredString {
    let text = status.as_str();
    match status {
        Status::Pending | Status::Skipped => text.dimmed(),
        Status::Running => text.blue(),
        Status::Success => text.green(),
        Status::Failure => text.red(),
        Status::Cancelled => text.yellow(),
    }
}

/// Print a styled header
pub fn print_header(title: &str) {
    println!("{}", title.bold());
    println!("{}", "═".repeat(title.chars().count().max(40)));
}

/// Print a success check
pub fn print_success(msg: &str) {
    println!("  {} {}", "✓".green(), msg);
}

/// Print an error cross
pub fn print_error(msg: &str) {
    println!("  {} {}", "✗".red(), msg);
}

/// Print a warning
pub fn print_warning(msg: &str) {
    println!("  {} {}", "⚠".yellow(), msg);
}
