//! git-conduit - a mediation layer between an interactive git client and the git CLI.
//!
//! Every repository query and mutation goes through [`GitService`]. The
//! CLI-backed implementation runs git under a shared process cap with
//! per-class deadlines and parses machine-oriented output into typed records.
//! A TTL cache collapses the overlapping reads of a refresh cycle, and a
//! change watcher on git's own directory says when to refresh.
//!
//! # Public API
//! The main public interface is re-exported from the [`core`] module:
//! - [`Session`] for one-call wiring from a [`ConduitConfig`]
//! - [`GitService`], [`CliService`], [`CachedService`]
//! - [`ProcessRunner`], [`CliRunner`], [`ConcurrencyLimiter`]
//! - [`ChangeWatcher`] and [`Refresh`]
//! - [`ConduitError`] and [`Result`]

pub mod commands;
pub mod core;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use core::{
    // Service layers
    CacheKey,
    CachedService,
    // Change notification
    ChangeWatcher,
    CliRunner,
    CliService,
    // Process execution
    ConcurrencyLimiter,
    // Configuration
    ConduitConfig,
    // Error handling
    ConduitError,
    Debouncer,
    GitService,
    ProcessRunner,
    Refresh,
    Result,
    // Wiring
    Session,
    TimeoutClass,
    Timeouts,
};

// Data model
pub use core::{
    Branch, Commit, FileStatus, GraphEntry, Ref, RefKind, Remote, RepoInfo, StashEntry,
    StatusCode, StatusResult, Worktree,
};
