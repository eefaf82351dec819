//! Typed records produced by the output parsers.
//!
//! These are plain values: the parsers build them, the cache clones them, and
//! callers own whatever they receive.
//!
//! # Public API
//! - [`Commit`], [`Ref`], [`RefKind`], [`GraphEntry`]: history
//! - [`FileStatus`], [`StatusResult`]: working tree and index state
//! - [`Branch`], [`StashEntry`], [`Remote`], [`Worktree`]: repository objects
//! - [`RepoInfo`]: one snapshot of the repository-level flags

use crate::core::status_code::StatusCode;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Classification of a decoration ref.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RefKind {
    /// `HEAD` itself, or the branch `HEAD` points at.
    Head,
    LocalBranch,
    RemoteBranch,
    Tag,
    Stash,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ref {
    pub name: String,
    pub kind: RefKind,
    /// Remote name, only for [`RefKind::RemoteBranch`].
    pub remote: Option<String>,
}

/// One commit. The full hash is the identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commit {
    pub hash: String,
    pub short_hash: String,
    pub author: String,
    pub author_email: String,
    /// Author time, seconds since the epoch.
    pub timestamp: i64,
    pub relative_date: String,
    pub subject: String,
    pub body: String,
    pub parents: Vec<String>,
    pub refs: Vec<Ref>,
}

impl Commit {
    pub fn authored_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.timestamp, 0)
    }

    pub fn is_merge(&self) -> bool {
        self.parents.len() > 1
    }
}

/// A line of `log --graph` output: the graph prefix and, for commit lines, the commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphEntry {
    pub graph: String,
    pub commit: Option<Commit>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileStatus {
    pub staging: StatusCode,
    pub worktree: StatusCode,
    /// Relative to the repository root, with git's bytes kept as they are.
    pub path: PathBuf,
    /// Source path of a rename or copy.
    pub orig_path: Option<PathBuf>,
    pub staged: bool,
}

/// Categorised status of the whole repository.
///
/// A partially staged path appears in both `staged` and `unstaged`. Conflicted
/// and untracked paths appear only in their own list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusResult {
    pub staged: Vec<FileStatus>,
    pub unstaged: Vec<FileStatus>,
    pub untracked: Vec<FileStatus>,
    pub conflicts: Vec<FileStatus>,
}

impl StatusResult {
    pub fn total_count(&self) -> usize {
        self.staged.len() + self.unstaged.len() + self.untracked.len() + self.conflicts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.total_count() == 0
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Branch {
    pub name: String,
    pub is_current: bool,
    pub is_remote: bool,
    pub short_hash: String,
    pub upstream: String,
    pub ahead: usize,
    pub behind: usize,
    pub subject: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StashEntry {
    pub index: usize,
    pub branch: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Remote {
    pub name: String,
    pub fetch_url: String,
    pub push_url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Worktree {
    pub path: PathBuf,
    pub head: String,
    /// Short branch name; empty when detached or bare.
    pub branch: String,
    pub bare: bool,
    pub detached: bool,
    pub locked: bool,
}

/// Repository-level flags gathered in one call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoInfo {
    pub root: PathBuf,
    pub git_dir: PathBuf,
    pub head: String,
    pub is_clean: bool,
    pub is_merging: bool,
    pub is_rebasing: bool,
    pub ahead: usize,
    pub behind: usize,
    pub upstream: Option<String>,
}
