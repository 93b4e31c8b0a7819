//! Configuration service implementation.
//!
//! Resolves which `config.toml` applies, parses and validates it, and caches
//! the result. Lookup order:
//!
//! 1. the path passed on the command line (`--config`)
//! 2. `$TOKENWHEEL_CONFIG`
//! 3. `~/.config/tokenwheel/config.toml`, if it exists
//! 4. built-in defaults
//!
//! A file named explicitly (1 or 2) must exist.

use crate::paths::TokenWheelPaths;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};
use tokenwheel_core::config::WheelConfig;
use tokenwheel_core::error::{Result, WheelError};

/// Where the effective configuration came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    CommandLine(PathBuf),
    Environment(PathBuf),
    UserConfigDir(PathBuf),
    Defaults,
}

impl ConfigSource {
    pub fn path(&self) -> Option<&Path> {
        match self {
            ConfigSource::CommandLine(path)
            | ConfigSource::Environment(path)
            | ConfigSource::UserConfigDir(path) => Some(path),
            ConfigSource::Defaults => None,
        }
    }
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigSource::CommandLine(path) => write!(f, "{} (--config)", path.display()),
            ConfigSource::Environment(path) => write!(f, "{} ($TOKENWHEEL_CONFIG)", path.display()),
            ConfigSource::UserConfigDir(path) => write!(f, "{}", path.display()),
            ConfigSource::Defaults => write!(f, "built-in defaults"),
        }
    }
}

/// Loads and caches the [`WheelConfig`].
#[derive(Debug, Clone)]
pub struct ConfigService {
    explicit_path: Option<PathBuf>,
    /// Cached configuration; `None` until first load or after invalidation.
    config: Arc<RwLock<Option<WheelConfig>>>,
}

impl ConfigService {
    /// Creates a service; nothing is read until [`get_config`](Self::get_config).
    pub fn new(explicit_path: Option<PathBuf>) -> Self {
        Self {
            explicit_path,
            config: Arc::new(RwLock::new(None)),
        }
    }

    /// Determines which file (if any) supplies the configuration.
    pub fn source(&self) -> ConfigSource {
        let user_file = TokenWheelPaths::config_file().ok();
        resolve_source(
            self.explicit_path.as_deref(),
            TokenWheelPaths::config_file_from_env(),
            user_file,
        )
    }

    /// Gets the configuration, loading it if not cached.
    ///
    /// # Errors
    ///
    /// `Config` if an explicitly named file is missing, unreadable, malformed
    /// or fails validation.
    pub fn get_config(&self) -> Result<WheelConfig> {
        {
            let cached = self.config.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(ref config) = *cached {
                return Ok(config.clone());
            }
        }

        let source = self.source();
        let loaded = match source.path() {
            Some(path) => Self::load_from_path(path)?,
            None => {
                let config = WheelConfig::default();
                config.validate()?;
                config
            }
        };
        tracing::info!(source = %source, models = loaded.models.len(), "Configuration loaded");

        let mut write_lock = self.config.write().unwrap_or_else(PoisonError::into_inner);
        *write_lock = Some(loaded.clone());
        Ok(loaded)
    }

    /// Invalidates the cache, forcing a reload on next access.
    pub fn invalidate_cache(&self) {
        let mut write_lock = self.config.write().unwrap_or_else(PoisonError::into_inner);
        *write_lock = None;
    }

    /// Parses and validates one TOML file.
    pub fn load_from_path(path: &Path) -> Result<WheelConfig> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            WheelError::config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let config: WheelConfig = toml::from_str(&text).map_err(|e| {
            WheelError::config(format!("Failed to parse {}: {}", path.display(), e))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Renders a configuration as TOML.
    pub fn to_toml(config: &WheelConfig) -> Result<String> {
        Ok(toml::to_string_pretty(config)?)
    }
}

impl Default for ConfigService {
    fn default() -> Self {
        Self::new(None)
    }
}

fn resolve_source(
    explicit: Option<&Path>,
    from_env: Option<PathBuf>,
    user_file: Option<PathBuf>,
) -> ConfigSource {
    if let Some(path) = explicit {
        return ConfigSource::CommandLine(path.to_path_buf());
    }
    if let Some(path) = from_env {
        return ConfigSource::Environment(path);
    }
    match user_file {
        Some(path) if path.is_file() => ConfigSource::UserConfigDir(path),
        _ => ConfigSource::Defaults,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_config(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    const TOY: &str = r#"
        preload = ["toy"]

        [sessions]
        ttl_secs = 60

        [[model]]
        id = "toy"
        name = "Toy"
        backend = { kind = "fixed", vocabulary = ["a", "b"], logits = [0.0, 1.0] }
    "#;

    #[test]
    fn test_resolution_order() {
        let explicit = PathBuf::from("/tmp/explicit.toml");
        let env = PathBuf::from("/tmp/env.toml");

        assert_eq!(
            resolve_source(Some(&explicit), Some(env.clone()), None),
            ConfigSource::CommandLine(explicit)
        );
        assert_eq!(
            resolve_source(None, Some(env.clone()), None),
            ConfigSource::Environment(env)
        );
        assert_eq!(resolve_source(None, None, None), ConfigSource::Defaults);
        assert_eq!(
            resolve_source(None, None, Some(PathBuf::from("/nonexistent/config.toml"))),
            ConfigSource::Defaults
        );
    }

    #[test]
    fn test_user_config_used_when_present() {
        let file = write_config(TOY);
        assert_eq!(
            resolve_source(None, None, Some(file.path().to_path_buf())),
            ConfigSource::UserConfigDir(file.path().to_path_buf())
        );
    }

    #[test]
    fn test_load_explicit_file() {
        let file = write_config(TOY);
        let service = ConfigService::new(Some(file.path().to_path_buf()));

        let config = service.get_config().unwrap();
        assert_eq!(config.sessions.ttl_secs, 60);
        assert_eq!(config.sessions.sweep_interval_secs, 300);
        assert_eq!(config.default_model_id(), Some("toy"));
    }

    #[test]
    fn test_model_only_file_loads_without_preload() {
        let file = write_config(
            r#"
            [[model]]
            id = "toy"
            name = "Toy"
            backend = { kind = "fixed", vocabulary = ["a", "b"], logits = [0.0, 1.0] }
            "#,
        );

        let config = ConfigService::load_from_path(file.path()).unwrap();
        assert!(config.preload.is_empty());
        assert_eq!(config.default_model_id(), Some("toy"));
    }

    #[test]
    fn test_cache_and_invalidate() {
        let file = write_config(TOY);
        let service = ConfigService::new(Some(file.path().to_path_buf()));
        assert_eq!(service.get_config().unwrap().sessions.ttl_secs, 60);

        std::fs::write(file.path(), TOY.replace("ttl_secs = 60", "ttl_secs = 90")).unwrap();

        // Still cached.
        assert_eq!(service.get_config().unwrap().sessions.ttl_secs, 60);
        service.invalidate_cache();
        assert_eq!(service.get_config().unwrap().sessions.ttl_secs, 90);
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let service = ConfigService::new(Some(dir.path().join("absent.toml")));
        let err = service.get_config().unwrap_err();
        assert!(matches!(err, WheelError::Config(_)));
    }

    #[test]
    fn test_malformed_and_invalid_files() {
        let file = write_config("[server\nport = ");
        assert!(matches!(
            ConfigService::load_from_path(file.path()),
            Err(WheelError::Config(_))
        ));

        let file = write_config("[sampling]\ndefault_temperature = -1.0\n");
        let err = ConfigService::load_from_path(file.path()).unwrap_err();
        assert!(err.to_string().contains("default_temperature"));
    }

    #[test]
    fn test_to_toml_roundtrips() {
        let config = WheelConfig::default();
        let text = ConfigService::to_toml(&config).unwrap();
        let file = write_config(&text);
        assert_eq!(ConfigService::load_from_path(file.path()).unwrap(), config);
    }
}
