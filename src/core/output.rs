//! Terminal output helpers for the `git-conduit` binary.
//!
//! Red for errors, green for success, bright_black for secondary detail.
//! Status codes are coloured by kind so staged, unstaged and conflicted paths
//! are easy to tell apart.

use crate::core::status_code::StatusCode;
use crate::core::types::FileStatus;
use colored::*;

/// Prints `✕ Error: <message>` with a blank line on either side.
pub fn print_error(message: &str) {
    eprintln!("\n{} {}\n", "✕ Error:".red(), message.white());
}

pub fn print_success(message: &str) {
    println!("\n{} {}", "✓".green(), message.white());
}

pub fn print_info(message: &str) {
    println!("\n{}\n", message.white());
}

/// Prints `<header>:` followed by a blank line.
pub fn print_section_header(header: &str) {
    println!("\n{}:\n", header.white());
}

pub fn colorize_status(code: StatusCode, text: &str) -> ColoredString {
    match code {
        StatusCode::Modified => text.yellow(),
        StatusCode::Untracked => text.cyan(),
        StatusCode::Deleted => text.red(),
        StatusCode::Added => text.green(),
        StatusCode::Renamed | StatusCode::Copied => text.blue(),
        StatusCode::TypeChanged => text.magenta(),
        StatusCode::Unmerged => text.red().bold(),
        StatusCode::Ignored | StatusCode::Unmodified => text.bright_black(),
    }
}

/// One status line: two-letter code, then the path (with its origin for renames).
///
/// The colour follows the side that matters for the section the file is in.
pub fn format_file_line(file: &FileStatus, code: StatusCode) -> String {
    let codes = format!("{}{}", file.staging.as_char(), file.worktree.as_char());
    let path = match &file.orig_path {
        Some(orig) => format!("{} -> {}", orig.display(), file.path.display()),
        None => file.path.display().to_string(),
    };
    format!(
        "  {}  {}",
        colorize_status(code, &codes),
        colorize_status(code, &path)
    )
}

/// ` (+2/-1)` style suffix, or an empty string when in sync.
pub fn format_ahead_behind(ahead: usize, behind: usize) -> String {
    let counts = match (ahead, behind) {
        (0, 0) => return String::new(),
        (a, 0) => format!("+{a}"),
        (0, b) => format!("-{b}"),
        (a, b) => format!("+{a}/-{b}"),
    };
    format!(" {}{}{}", "(".bright_black(), counts.white(), ")".bright_black())
}
