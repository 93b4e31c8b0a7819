//! Path management for tokenwheel configuration files.
//!
//! ```text
//! ~/.config/tokenwheel/      # Config directory (platform config dir)
//! └── config.toml            # Application configuration
//! ```

use std::path::PathBuf;

/// Environment variable naming an alternative configuration file.
pub const CONFIG_ENV_VAR: &str = "TOKENWHEEL_CONFIG";

const APP_DIR: &str = "tokenwheel";
const CONFIG_FILE: &str = "config.toml";

/// Errors that can occur during path resolution.
#[derive(Debug)]
pub enum PathError {
    /// The platform config directory could not be determined.
    ConfigDirNotFound,
}

impl std::fmt::Display for PathError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PathError::ConfigDirNotFound => write!(f, "Cannot find configuration directory"),
        }
    }
}

impl std::error::Error for PathError {}

pub struct TokenWheelPaths;

impl TokenWheelPaths {
    /// Returns the tokenwheel configuration directory (e.g. `~/.config/tokenwheel/`).
    pub fn config_dir() -> Result<PathBuf, PathError> {
        dirs::config_dir()
            .map(|dir| dir.join(APP_DIR))
            .ok_or(PathError::ConfigDirNotFound)
    }

    /// Returns the path to the default configuration file.
    pub fn config_file() -> Result<PathBuf, PathError> {
        Ok(Self::config_dir()?.join(CONFIG_FILE))
    }

    /// Configuration file named by `$TOKENWHEEL_CONFIG`, if set and non-empty.
    pub fn config_file_from_env() -> Option<PathBuf> {
        std::env::var_os(CONFIG_ENV_VAR)
            .filter(|value| !value.is_empty())
            .map(PathBuf::from)
    }
}
