//! Shared helpers for git-conduit integration tests.
//!
//! Tests run against real repositories in temporary directories. When no
//! `git` executable is available they return early instead of failing.

pub mod assertions;
pub mod repository;

/// Return early from a test when git is not installed.
#[macro_export]
macro_rules! require_git {
    () => {
        if !$crate::common::repository::git_available() {
            eprintln!("git not available, skipping");
            return Ok(());
        }
    };
}
