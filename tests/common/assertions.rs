//! Output predicates for binary tests.

#![allow(dead_code)]

use predicates::prelude::*;

pub fn not_in_git_repo() -> impl Predicate<str> {
    predicates::str::contains("Not in a git repository")
}

pub fn has_branch_info(branch: &str) -> impl Predicate<str> {
    predicates::str::contains(format!("# On branch: {branch}"))
}

pub fn has_section(title: &str) -> impl Predicate<str> {
    predicates::str::contains(title.to_string())
}
