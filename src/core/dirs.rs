use crate::core::error::{ConduitError, Result};
use std::path::PathBuf;

/// `<config home>/git-conduit`. An empty `XDG_CONFIG_HOME` counts as unset.
pub fn get_config_directory() -> Result<PathBuf> {
    let base = match std::env::consts::OS {
        "linux" | "freebsd" | "netbsd" | "openbsd" => std::env::var_os("XDG_CONFIG_HOME")
            .filter(|value| !value.is_empty())
            .map(PathBuf::from)
            .or_else(|| dirs::home_dir().map(|home| home.join(".config")))
            .ok_or(ConduitError::ConfigDirectoryNotFound)?,
        "macos" => dirs::home_dir()
            .map(|home| home.join("Library/Application Support"))
            .ok_or(ConduitError::ConfigDirectoryNotFound)?,
        _ => dirs::config_dir().ok_or(ConduitError::ConfigDirectoryNotFound)?,
    };

    Ok(base.join("git-conduit"))
}
