//! TTL cache in front of a [`GitService`].
//!
//! A UI refresh fans out into many overlapping reads (status bar, file list,
//! branch panel). [`CachedService`] collapses those into one git invocation per
//! read within a short TTL. Only parameterless reads are cached; diff, log and
//! show always go through.
//!
//! Any successful write clears the whole cache before returning. Failed reads
//! are cached like successes so a locked or broken repository is not hammered.
//!
//! # Public API
//! - [`CachedService`]: the decorator
//! - [`CacheKey`]: one fixed key per cached read
//! - [`DEFAULT_TTL`], [`DEFAULT_MAX_ENTRIES`]

use crate::core::{
    error::Result,
    service::GitService,
    types::{Branch, Commit, GraphEntry, Remote, StashEntry, StatusResult, Worktree},
};
use log::debug;
use std::any::Any;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

pub const DEFAULT_TTL: Duration = Duration::from_secs(2);
pub const DEFAULT_MAX_ENTRIES: usize = 64;

/// Cached reads. Keys carry no parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheKey {
    Head,
    IsClean,
    IsMerging,
    IsRebasing,
    AheadBehind,
    Upstream,
    Status,
    Branches,
    StashList,
    Remotes,
    Worktrees,
    ConflictedFiles,
}

type Value = Arc<dyn Any + Send + Sync>;

struct Entry {
    value: Result<Value>,
    expires_at: Instant,
}

pub struct CachedService<S> {
    inner: S,
    ttl: Duration,
    max_entries: usize,
    entries: Mutex<HashMap<CacheKey, Entry>>,
    /// Bumped by every invalidation; a load that straddles one is not stored.
    generation: AtomicU64,
}

impl<S: GitService> CachedService<S> {
    pub fn new(inner: S, ttl: Duration) -> Self {
        Self::with_capacity(inner, ttl, DEFAULT_MAX_ENTRIES)
    }

    pub fn with_capacity(inner: S, ttl: Duration, max_entries: usize) -> Self {
        Self {
            inner,
            ttl,
            max_entries: max_entries.max(1),
            entries: Mutex::new(HashMap::with_capacity(16)),
            generation: AtomicU64::new(0),
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Number of stored entries, expired ones included.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every entry. Called after each successful write, and by refresh
    /// paths that must not see anything older than now.
    pub fn invalidate(&self) {
        let mut entries = self.lock();
        if !entries.is_empty() {
            debug!("cache invalidated ({} entries)", entries.len());
        }
        entries.clear();
        self.generation.fetch_add(1, Ordering::SeqCst);
    }

    fn cached<T, F>(&self, key: CacheKey, load: F) -> Result<T>
    where
        T: Clone + Send + Sync + 'static,
        F: FnOnce(&S) -> Result<T>,
    {
        if let Some(hit) = self.lookup::<T>(key) {
            debug!("cache hit {key:?}");
            return hit;
        }

        // The lock is not held here; concurrent misses each call through.
        debug!("cache miss {key:?}");
        let generation = self.generation.load(Ordering::SeqCst);
        let result = load(&self.inner);
        let stored = match &result {
            Ok(value) => Ok(Arc::new(value.clone()) as Value),
            Err(e) => Err(e.clone()),
        };
        self.store(key, stored, generation);
        result
    }

    fn lookup<T: Clone + 'static>(&self, key: CacheKey) -> Option<Result<T>> {
        let entries = self.lock();
        let entry = entries.get(&key)?;
        if Instant::now() >= entry.expires_at {
            return None;
        }
        match &entry.value {
            Ok(value) => value.downcast_ref::<T>().cloned().map(Ok),
            Err(e) => Some(Err(e.clone())),
        }
    }

    fn store(&self, key: CacheKey, value: Result<Value>, generation: u64) {
        let now = Instant::now();
        let mut entries = self.lock();
        if self.generation.load(Ordering::SeqCst) != generation {
            debug!("cache invalidated during {key:?} load, not storing");
            return;
        }
        if entries.len() >= self.max_entries {
            entries.retain(|_, entry| entry.expires_at > now);
            if entries.len() >= self.max_entries {
                debug!("cache full, flushing {} entries", entries.len());
                entries.clear();
            }
        }
        entries.insert(
            key,
            Entry {
                value,
                expires_at: now + self.ttl,
            },
        );
    }

    fn after_write(&self, result: Result<()>) -> Result<()> {
        if result.is_ok() {
            self.invalidate();
        }
        result
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<CacheKey, Entry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<S: GitService> GitService for CachedService<S> {
    fn repo_root(&self) -> &Path {
        self.inner.repo_root()
    }

    fn git_dir(&self) -> &Path {
        self.inner.git_dir()
    }

    fn head(&self) -> Result<String> {
        self.cached(CacheKey::Head, S::head)
    }

    fn is_clean(&self) -> Result<bool> {
        self.cached(CacheKey::IsClean, S::is_clean)
    }

    fn is_merging(&self) -> Result<bool> {
        self.cached(CacheKey::IsMerging, S::is_merging)
    }

    fn is_rebasing(&self) -> Result<bool> {
        self.cached(CacheKey::IsRebasing, S::is_rebasing)
    }

    fn ahead_behind(&self) -> Result<(usize, usize)> {
        self.cached(CacheKey::AheadBehind, S::ahead_behind)
    }

    fn upstream(&self) -> Result<Option<String>> {
        self.cached(CacheKey::Upstream, S::upstream)
    }

    fn status(&self) -> Result<StatusResult> {
        self.cached(CacheKey::Status, S::status)
    }

    fn stage(&self, paths: &[PathBuf]) -> Result<()> {
        self.after_write(self.inner.stage(paths))
    }

    fn stage_all(&self) -> Result<()> {
        self.after_write(self.inner.stage_all())
    }

    fn unstage(&self, paths: &[PathBuf]) -> Result<()> {
        self.after_write(self.inner.unstage(paths))
    }

    fn unstage_all(&self) -> Result<()> {
        self.after_write(self.inner.unstage_all())
    }

    fn discard(&self, paths: &[PathBuf]) -> Result<()> {
        self.after_write(self.inner.discard(paths))
    }

    fn commit(&self, message: &str) -> Result<()> {
        self.after_write(self.inner.commit(message))
    }

    fn commit_amend(&self, message: &str) -> Result<()> {
        self.after_write(self.inner.commit_amend(message))
    }

    fn log(&self, limit: usize, args: &[&str]) -> Result<Vec<Commit>> {
        self.inner.log(limit, args)
    }

    fn log_graph(&self, limit: usize) -> Result<Vec<GraphEntry>> {
        self.inner.log_graph(limit)
    }

    fn show(&self, hash: &str) -> Result<(Commit, String)> {
        self.inner.show(hash)
    }

    fn diff(&self, staged: bool, path: Option<&Path>) -> Result<String> {
        self.inner.diff(staged, path)
    }

    fn diff_range(&self, from: &str, to: &str) -> Result<String> {
        self.inner.diff_range(from, to)
    }

    fn branches(&self) -> Result<Vec<Branch>> {
        self.cached(CacheKey::Branches, S::branches)
    }

    fn create_branch(&self, name: &str) -> Result<()> {
        self.after_write(self.inner.create_branch(name))
    }

    fn switch_branch(&self, name: &str) -> Result<()> {
        self.after_write(self.inner.switch_branch(name))
    }

    fn delete_branch(&self, name: &str, force: bool) -> Result<()> {
        self.after_write(self.inner.delete_branch(name, force))
    }

    fn merge_branch(&self, name: &str) -> Result<()> {
        self.after_write(self.inner.merge_branch(name))
    }

    fn rename_branch(&self, old_name: &str, new_name: &str) -> Result<()> {
        self.after_write(self.inner.rename_branch(old_name, new_name))
    }

    fn stash_list(&self) -> Result<Vec<StashEntry>> {
        self.cached(CacheKey::StashList, S::stash_list)
    }

    fn stash_save(&self, message: Option<&str>) -> Result<()> {
        self.after_write(self.inner.stash_save(message))
    }

    fn stash_pop(&self, index: usize) -> Result<()> {
        self.after_write(self.inner.stash_pop(index))
    }

    fn stash_apply(&self, index: usize) -> Result<()> {
        self.after_write(self.inner.stash_apply(index))
    }

    fn stash_drop(&self, index: usize) -> Result<()> {
        self.after_write(self.inner.stash_drop(index))
    }

    fn stash_show(&self, index: usize) -> Result<String> {
        self.inner.stash_show(index)
    }

    fn remotes(&self) -> Result<Vec<Remote>> {
        self.cached(CacheKey::Remotes, S::remotes)
    }

    fn fetch(&self, remote: &str) -> Result<()> {
        self.after_write(self.inner.fetch(remote))
    }

    fn pull(&self, remote: &str, branch: &str) -> Result<()> {
        self.after_write(self.inner.pull(remote, branch))
    }

    fn push(&self, remote: &str, branch: &str, force: bool) -> Result<()> {
        self.after_write(self.inner.push(remote, branch, force))
    }

    fn worktrees(&self) -> Result<Vec<Worktree>> {
        self.cached(CacheKey::Worktrees, S::worktrees)
    }

    fn worktree_add(&self, path: &Path, branch: Option<&str>) -> Result<()> {
        self.after_write(self.inner.worktree_add(path, branch))
    }

    fn worktree_remove(&self, path: &Path) -> Result<()> {
        self.after_write(self.inner.worktree_remove(path))
    }

    fn rebase_interactive(&self, onto: &str) -> Result<()> {
        self.after_write(self.inner.rebase_interactive(onto))
    }

    fn rebase_continue(&self) -> Result<()> {
        self.after_write(self.inner.rebase_continue())
    }

    fn rebase_abort(&self) -> Result<()> {
        self.after_write(self.inner.rebase_abort())
    }

    fn bisect_start(&self, bad: &str, good: &str) -> Result<()> {
        self.after_write(self.inner.bisect_start(bad, good))
    }

    fn bisect_good(&self) -> Result<()> {
        self.after_write(self.inner.bisect_good())
    }

    fn bisect_bad(&self) -> Result<()> {
        self.after_write(self.inner.bisect_bad())
    }

    fn bisect_reset(&self) -> Result<()> {
        self.after_write(self.inner.bisect_reset())
    }

    fn bisect_log(&self) -> Result<String> {
        self.inner.bisect_log()
    }

    fn conflicted_files(&self) -> Result<Vec<PathBuf>> {
        self.cached(CacheKey::ConflictedFiles, S::conflicted_files)
    }

    fn mark_resolved(&self, path: &Path) -> Result<()> {
        self.after_write(self.inner.mark_resolved(path))
    }
}
