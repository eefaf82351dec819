//! Domain-specific error types and error handling utilities.
//!
//! This module defines [`ConduitError`] which covers every failure the mediation
//! layer can surface. It uses `thiserror` for ergonomic error definitions and
//! includes constructors for the common execution failures.
//!
//! # Public API
//! - [`ConduitError`]: Main error enum covering all failure modes
//! - [`Result<T>`]: Type alias for `std::result::Result<T, ConduitError>`
//!
//! # Error Categories
//! - **Repository**: the path did not resolve to a git repository at open time
//! - **Execution**: timeouts (slot or process exit), tool rejections, spawn failures
//! - **Configuration**: unreadable or malformed config file
//! - **Watching**: OS notification setup or delivery failures
//!
//! Errors are `Clone` because the cache hands the same failed read to every
//! caller inside one TTL window. Sources that are not `Clone` are held in `Arc`.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// What an invocation was waiting for when its deadline expired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitStage {
    /// Blocked on the concurrency limiter.
    Slot,
    /// The process was running and did not exit in time.
    Exit,
}

impl fmt::Display for WaitStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WaitStage::Slot => write!(f, "a free process slot"),
            WaitStage::Exit => write!(f, "process exit"),
        }
    }
}

/// Domain-specific error types for git-conduit
#[derive(Error, Debug, Clone)]
pub enum ConduitError {
    // Repository errors
    #[error("Not a git repository: {}", path.display())]
    NotARepository { path: PathBuf },

    // Execution errors
    #[error("git {command}: timed out after {}ms waiting for {waiting_for}", timeout.as_millis())]
    ExecutionTimeout {
        command: String,
        timeout: Duration,
        waiting_for: WaitStage,
    },

    #[error("git {command}: {detail}: {status}")]
    ExecutionFailed {
        command: String,
        detail: String,
        status: String,
    },

    #[error("git {command}: failed to launch: {source}")]
    Spawn {
        command: String,
        source: Arc<std::io::Error>,
    },

    // Configuration errors
    #[error("Could not find config directory")]
    ConfigDirectoryNotFound,

    #[error("Failed to read config file '{}': {source}", path.display())]
    ConfigRead {
        path: PathBuf,
        source: Arc<std::io::Error>,
    },

    #[error("Failed to parse config file '{}': {source}", path.display())]
    ConfigParse {
        path: PathBuf,
        source: Arc<serde_json::Error>,
    },

    // Watcher errors
    #[error("Failed to create filesystem watcher: {0}")]
    WatcherInit(Arc<notify::Error>),

    #[error("Failed to watch '{}': {source}", path.display())]
    Watch {
        path: PathBuf,
        source: Arc<notify::Error>,
    },

    #[error("IO error: {0}")]
    Io(Arc<std::io::Error>),
}

/// Convenience type alias for Results using ConduitError
pub type Result<T> = std::result::Result<T, ConduitError>;

impl From<std::io::Error> for ConduitError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(Arc::new(err))
    }
}

impl ConduitError {
    /// Create a not-a-repository error for the path that failed to resolve
    pub fn not_a_repository(path: impl Into<PathBuf>) -> Self {
        Self::NotARepository { path: path.into() }
    }

    /// Create a timeout error for a command line
    pub fn timeout(command: impl Into<String>, timeout: Duration, waiting_for: WaitStage) -> Self {
        Self::ExecutionTimeout {
            command: command.into(),
            timeout,
            waiting_for,
        }
    }

    /// Create a tool-rejected error carrying the diagnostic text verbatim
    pub fn execution_failed(
        command: impl Into<String>,
        detail: impl Into<String>,
        status: impl Into<String>,
    ) -> Self {
        Self::ExecutionFailed {
            command: command.into(),
            detail: detail.into(),
            status: status.into(),
        }
    }

    /// Create a spawn failure error
    pub fn spawn(command: impl Into<String>, source: std::io::Error) -> Self {
        Self::Spawn {
            command: command.into(),
            source: Arc::new(source),
        }
    }

    /// Create a config read error
    pub fn config_read(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::ConfigRead {
            path: path.into(),
            source: Arc::new(source),
        }
    }

    /// Create a config parse error
    pub fn config_parse(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        Self::ConfigParse {
            path: path.into(),
            source: Arc::new(source),
        }
    }

    /// Create a watch-path error
    pub fn watch(path: impl Into<PathBuf>, source: notify::Error) -> Self {
        Self::Watch {
            path: path.into(),
            source: Arc::new(source),
        }
    }

    /// True when a deadline expired, either waiting for a slot or for exit
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::ExecutionTimeout { .. })
    }

    /// True when the git tool itself rejected the command
    pub fn is_rejected(&self) -> bool {
        matches!(self, Self::ExecutionFailed { .. })
    }

    /// Whether retrying the same call could plausibly succeed.
    ///
    /// Timeouts usually mean lock contention or a slow remote and may clear up.
    /// A rejected command will be rejected again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ExecutionTimeout { .. } | Self::Io(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_a_repository_display() {
        let err = ConduitError::not_a_repository("/tmp/nowhere");
        assert_eq!(err.to_string(), "Not a git repository: /tmp/nowhere");
    }

    #[test]
    fn test_execution_failed_carries_command_and_detail() {
        let err = ConduitError::execution_failed(
            "switch nope",
            "fatal: invalid reference: nope",
            "exit status: 128",
        );
        let msg = err.to_string();
        assert!(msg.contains("git switch nope"));
        assert!(msg.contains("fatal: invalid reference: nope"));
        assert!(msg.contains("exit status: 128"));
        assert!(err.is_rejected());
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_timeout_is_distinguishable() {
        let err = ConduitError::timeout("status", Duration::from_secs(10), WaitStage::Exit);
        assert!(err.is_timeout());
        assert!(err.is_retryable());
        assert!(!err.is_rejected());
        assert_eq!(
            err.to_string(),
            "git status: timed out after 10000ms waiting for process exit"
        );

        let slot = ConduitError::timeout("log", Duration::from_millis(50), WaitStage::Slot);
        assert!(slot.to_string().contains("a free process slot"));
    }

    #[test]
    fn test_errors_clone_with_shared_source() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "git not found");
        let err = ConduitError::spawn("status", io_err);
        let cloned = err.clone();
        assert_eq!(err.to_string(), cloned.to_string());
        assert!(cloned.to_string().contains("git not found"));
    }

    #[test]
    fn test_config_parse_error() {
        let json_err = serde_json::from_str::<serde_json::Value>("{ nope").unwrap_err();
        let err = ConduitError::config_parse("/cfg/config.json", json_err);
        assert!(err.to_string().contains("/cfg/config.json"));
        assert!(err.to_string().contains("Failed to parse"));
    }

    #[test]
    fn test_io_from_conversion() {
        let err: ConduitError =
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied").into();
        assert!(matches!(err, ConduitError::Io(_)));
        assert!(err.to_string().contains("denied"));
    }
}
