//! Runtime configuration for the mediation layer.
//!
//! Values are read from `config.json` inside the git-conduit config directory.
//! A missing file is not an error; every field falls back to its default.

use crate::core::dirs::get_config_directory;
use crate::core::error::{ConduitError, Result};
use crate::core::runner::Timeouts;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_FILE_NAME: &str = "config.json";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ConduitConfig {
    /// Wrap the CLI service in the TTL cache.
    pub cache_enabled: bool,
    pub cache_ttl_ms: u64,
    pub cache_max_entries: usize,
    pub watch_debounce_ms: u64,
    /// Cap on git processes this instance runs at once.
    pub max_concurrent_processes: usize,
    pub read_timeout_secs: u64,
    pub write_timeout_secs: u64,
    pub network_timeout_secs: u64,
    /// Diff output past this many bytes is cut and a notice appended.
    pub max_diff_bytes: usize,
    pub max_log_entries: usize,
    pub git_program: String,
}

impl Default for ConduitConfig {
    fn default() -> Self {
        Self {
            cache_enabled: true,
            cache_ttl_ms: 2_000,
            cache_max_entries: 64,
            watch_debounce_ms: 500,
            max_concurrent_processes: 4,
            read_timeout_secs: 10,
            write_timeout_secs: 30,
            network_timeout_secs: 120,
            max_diff_bytes: 512 * 1024,
            max_log_entries: 200,
            git_program: "git".to_string(),
        }
    }
}

impl ConduitConfig {
    /// Load from the default config location, or defaults if no file exists.
    pub fn load() -> Result<Self> {
        let config_file = get_config_directory()?.join(CONFIG_FILE_NAME);
        Self::load_from(&config_file)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("no config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content =
            std::fs::read_to_string(path).map_err(|e| ConduitError::config_read(path, e))?;
        let config: Self =
            serde_json::from_str(&content).map_err(|e| ConduitError::config_parse(path, e))?;
        log::debug!("loaded config from {}", path.display());
        Ok(config.normalized())
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| ConduitError::config_parse(PathBuf::from(path), e))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Clamp values that would make the runtime unusable.
    fn normalized(mut self) -> Self {
        if self.max_concurrent_processes == 0 {
            log::warn!("max_concurrent_processes = 0 would block every call, using 1");
            self.max_concurrent_processes = 1;
        }
        if self.cache_max_entries == 0 {
            self.cache_max_entries = 1;
        }
        if self.git_program.trim().is_empty() {
            self.git_program = "git".to_string();
        }
        self
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_millis(self.cache_ttl_ms)
    }

    pub fn watch_debounce(&self) -> Duration {
        Duration::from_millis(self.watch_debounce_ms)
    }

    pub fn timeouts(&self) -> Timeouts {
        Timeouts {
            read: Duration::from_secs(self.read_timeout_secs),
            write: Duration::from_secs(self.write_timeout_secs),
            network: Duration::from_secs(self.network_timeout_secs),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let config = ConduitConfig::load_from(&dir.path().join("absent.json")).unwrap();
        assert_eq!(config, ConduitConfig::default());
        assert_eq!(config.cache_ttl(), Duration::from_secs(2));
        assert_eq!(config.timeouts().network, Duration::from_secs(120));
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, r#"{ "cache_ttl_ms": 750, "max_concurrent_processes": 2 }"#).unwrap();

        let config = ConduitConfig::load_from(&path).unwrap();
        assert_eq!(config.cache_ttl(), Duration::from_millis(750));
        assert_eq!(config.max_concurrent_processes, 2);
        assert_eq!(config.max_diff_bytes, 512 * 1024);
        assert!(config.cache_enabled);
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "{ not json").unwrap();

        let err = ConduitConfig::load_from(&path).unwrap_err();
        assert!(matches!(err, ConduitError::ConfigParse { .. }));
    }

    #[test]
    fn test_zero_concurrency_is_clamped() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, r#"{ "max_concurrent_processes": 0, "git_program": "" }"#).unwrap();

        let config = ConduitConfig::load_from(&path).unwrap();
        assert_eq!(config.max_concurrent_processes, 1);
        assert_eq!(config.git_program, "git");
    }

    #[test]
    fn test_save_then_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join(CONFIG_FILE_NAME);
        let config = ConduitConfig {
            watch_debounce_ms: 250,
            ..ConduitConfig::default()
        };
        config.save_to(&path).unwrap();
        assert_eq!(ConduitConfig::load_from(&path).unwrap(), config);
    }
}
