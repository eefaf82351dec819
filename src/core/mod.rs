//! Core building blocks of the git mediation layer.
//!
//! Bottom-up: [`limiter`] and [`runner`] execute git, [`parser`] turns its
//! output into [`types`], [`git`] exposes one call per operation through the
//! [`service`] trait, [`cache`] decorates it, and [`watcher`] reports when
//! git's state changes. [`bootstrap`] wires them for one repository.

pub mod bootstrap;
pub mod cache;
pub mod config;
pub mod dirs;
pub mod error;
pub mod git;
pub mod limiter;
pub mod output;
pub mod parser;
pub mod runner;
pub mod service;
pub mod status_code;
pub mod types;
pub mod watcher;

// === Error handling ===
pub use error::{ConduitError, Result, WaitStage};

// === Configuration ===
pub use config::ConduitConfig;

// === Process execution ===
// Shared process cap and the runner seam
pub use limiter::ConcurrencyLimiter;
pub use runner::{CliRunner, ProcessRunner, TimeoutClass, Timeouts};

// === Service layers ===
pub use cache::{CacheKey, CachedService};
pub use git::CliService;
pub use service::GitService;

// === Data model ===
pub use status_code::StatusCode;
pub use types::{
    Branch, Commit, FileStatus, GraphEntry, Ref, RefKind, Remote, RepoInfo, StashEntry,
    StatusResult, Worktree,
};

// === Change notification ===
pub use watcher::{ChangeWatcher, Debouncer, Refresh};

// === Wiring ===
pub use bootstrap::Session;

// === Output formatting ===
pub use output::{print_error, print_info, print_section_header, print_success};
