//! The repository operation contract.
//!
//! [`GitService`] exposes one method per repository concept. The CLI-backed
//! [`CliService`](crate::core::git::CliService), the caching
//! [`CachedService`](crate::core::cache::CachedService) and test fakes all
//! implement it, so callers never care which layer they hold.
//!
//! Calls are synchronous and may block on a process slot and on git itself.
//! Callers that need responsiveness run them on worker threads.

use crate::core::error::Result;
use crate::core::types::{
    Branch, Commit, GraphEntry, RepoInfo, Remote, StashEntry, StatusResult, Worktree,
};
use std::path::{Path, PathBuf};

pub trait GitService: Send + Sync {
    // ── Repository info ──────────────────────────────────────────────

    fn repo_root(&self) -> &Path;
    fn git_dir(&self) -> &Path;
    /// Current branch name, or the short hash when detached.
    fn head(&self) -> Result<String>;
    /// True when tracked files have no staged or unstaged changes.
    fn is_clean(&self) -> Result<bool>;
    fn is_merging(&self) -> Result<bool>;
    fn is_rebasing(&self) -> Result<bool>;
    /// Commits ahead of and behind the upstream; `(0, 0)` without one.
    fn ahead_behind(&self) -> Result<(usize, usize)>;
    /// Upstream of the current branch, `None` when not configured.
    fn upstream(&self) -> Result<Option<String>>;

    /// All repository-level flags at once.
    fn repo_info(&self) -> Result<RepoInfo> {
        let (ahead, behind) = self.ahead_behind()?;
        Ok(RepoInfo {
            root: self.repo_root().to_path_buf(),
            git_dir: self.git_dir().to_path_buf(),
            head: self.head()?,
            is_clean: self.is_clean()?,
            is_merging: self.is_merging()?,
            is_rebasing: self.is_rebasing()?,
            ahead,
            behind,
            upstream: self.upstream()?,
        })
    }

    // ── Status & staging ─────────────────────────────────────────────

    fn status(&self) -> Result<StatusResult>;
    fn stage(&self, paths: &[PathBuf]) -> Result<()>;
    fn stage_all(&self) -> Result<()>;
    fn unstage(&self, paths: &[PathBuf]) -> Result<()>;
    fn unstage_all(&self) -> Result<()>;
    /// Throw away worktree changes to the given paths.
    fn discard(&self, paths: &[PathBuf]) -> Result<()>;

    // ── Commits ──────────────────────────────────────────────────────

    fn commit(&self, message: &str) -> Result<()>;
    fn commit_amend(&self, message: &str) -> Result<()>;
    /// At most `limit` commits; `args` are extra revision/path arguments.
    fn log(&self, limit: usize, args: &[&str]) -> Result<Vec<Commit>>;
    fn log_graph(&self, limit: usize) -> Result<Vec<GraphEntry>>;
    /// The commit and its patch.
    fn show(&self, hash: &str) -> Result<(Commit, String)>;

    // ── Diff ─────────────────────────────────────────────────────────

    fn diff(&self, staged: bool, path: Option<&Path>) -> Result<String>;
    fn diff_range(&self, from: &str, to: &str) -> Result<String>;

    // ── Branches ─────────────────────────────────────────────────────

    fn branches(&self) -> Result<Vec<Branch>>;
    fn create_branch(&self, name: &str) -> Result<()>;
    fn switch_branch(&self, name: &str) -> Result<()>;
    fn delete_branch(&self, name: &str, force: bool) -> Result<()>;
    fn merge_branch(&self, name: &str) -> Result<()>;
    fn rename_branch(&self, old_name: &str, new_name: &str) -> Result<()>;

    // ── Stash ────────────────────────────────────────────────────────

    fn stash_list(&self) -> Result<Vec<StashEntry>>;
    fn stash_save(&self, message: Option<&str>) -> Result<()>;
    fn stash_pop(&self, index: usize) -> Result<()>;
    fn stash_apply(&self, index: usize) -> Result<()>;
    fn stash_drop(&self, index: usize) -> Result<()>;
    fn stash_show(&self, index: usize) -> Result<String>;

    // ── Remotes ──────────────────────────────────────────────────────

    fn remotes(&self) -> Result<Vec<Remote>>;
    fn fetch(&self, remote: &str) -> Result<()>;
    fn pull(&self, remote: &str, branch: &str) -> Result<()>;
    fn push(&self, remote: &str, branch: &str, force: bool) -> Result<()>;

    // ── Worktrees ────────────────────────────────────────────────────

    fn worktrees(&self) -> Result<Vec<Worktree>>;
    /// Add a worktree at `path`, creating `branch` there when given.
    fn worktree_add(&self, path: &Path, branch: Option<&str>) -> Result<()>;
    fn worktree_remove(&self, path: &Path) -> Result<()>;

    // ── Rebase ───────────────────────────────────────────────────────

    fn rebase_interactive(&self, onto: &str) -> Result<()>;
    fn rebase_continue(&self) -> Result<()>;
    fn rebase_abort(&self) -> Result<()>;

    // ── Bisect ───────────────────────────────────────────────────────

    fn bisect_start(&self, bad: &str, good: &str) -> Result<()>;
    fn bisect_good(&self) -> Result<()>;
    fn bisect_bad(&self) -> Result<()>;
    fn bisect_reset(&self) -> Result<()>;
    fn bisect_log(&self) -> Result<String>;

    // ── Conflict resolution ──────────────────────────────────────────

    fn conflicted_files(&self) -> Result<Vec<PathBuf>>;
    fn mark_resolved(&self, path: &Path) -> Result<()>;
}
