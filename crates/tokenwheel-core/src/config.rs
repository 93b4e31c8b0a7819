//! Configuration model.
//!
//! Every field has a default so a missing or partial `config.toml` still yields
//! a usable configuration. Loading from disk lives in the infrastructure crate.

use crate::error::{Result, WheelError};
use crate::oracle::ModelInfo;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct WheelConfig {
    /// Models loaded at startup. Failures are logged, not fatal.
    ///
    /// Empty when a file omits it, so a file with its own `[[model]]` list
    /// never inherits the built-in preload ids.
    #[serde(default)]
    pub preload: Vec<String>,
    pub server: ServerConfig,
    pub sessions: SessionConfig,
    pub sampling: SamplingConfig,
    pub logging: LoggingConfig,
    #[serde(rename = "model")]
    pub models: Vec<ModelConfig>,
}

impl Default for WheelConfig {
    fn default() -> Self {
        Self {
            preload: vec!["gpt2".to_string()],
            server: ServerConfig::default(),
            sessions: SessionConfig::default(),
            sampling: SamplingConfig::default(),
            logging: LoggingConfig::default(),
            models: vec![
                ModelConfig {
                    id: "gpt2".to_string(),
                    name: "GPT-2 (124M)".to_string(),
                    description: "Base GPT-2 model with 124M parameters".to_string(),
                    parameters: "124M".to_string(),
                    default: true,
                    backend: BackendConfig::Http {
                        base_url: "http://127.0.0.1:8001/models/gpt2".to_string(),
                        timeout_secs: default_timeout_secs(),
                    },
                },
                ModelConfig {
                    id: "gpt2-medium".to_string(),
                    name: "GPT-2 Medium (355M)".to_string(),
                    description: "Medium-sized GPT-2 model".to_string(),
                    parameters: "355M".to_string(),
                    default: false,
                    backend: BackendConfig::Http {
                        base_url: "http://127.0.0.1:8001/models/gpt2-medium".to_string(),
                        timeout_secs: default_timeout_secs(),
                    },
                },
            ],
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct SessionConfig {
    /// Idle time after which a session is swept.
    pub ttl_secs: u64,
    /// Period of the background sweep.
    pub sweep_interval_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 3600,
            sweep_interval_secs: 300,
        }
    }
}

impl SessionConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct SamplingConfig {
    pub default_threshold: f64,
    pub default_other_top_k: usize,
    pub default_temperature: f64,
    /// Fixed seed for Other-bucket sampling; random when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            default_threshold: 0.01,
            default_other_top_k: 10,
            default_temperature: 1.0,
            seed: None,
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub filter: String,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info,tokenwheel=debug".to_string(),
            json: false,
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct ModelConfig {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub parameters: String,
    #[serde(default)]
    pub default: bool,
    pub backend: BackendConfig,
}

/// Where a model's oracle lives.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BackendConfig {
    /// Remote scoring service speaking the `/score`, `/decode`, `/encode` protocol.
    Http {
        base_url: String,
        #[serde(default = "default_timeout_secs")]
        timeout_secs: u64,
    },
    /// Static vocabulary with fixed logits, independent of the input text.
    Fixed {
        vocabulary: Vec<String>,
        logits: Vec<f32>,
    },
}

fn default_timeout_secs() -> u64 {
    30
}

impl WheelConfig {
    /// Checks cross-field constraints serde cannot express.
    ///
    /// # Errors
    ///
    /// `Config` describing the first violated constraint.
    pub fn validate(&self) -> Result<()> {
        let sampling = &self.sampling;
        if !(0.0..=1.0).contains(&sampling.default_threshold) {
            return Err(WheelError::config(format!(
                "sampling.default_threshold must be within [0, 1], got {}",
                sampling.default_threshold
            )));
        }
        if !sampling.default_temperature.is_finite() || sampling.default_temperature <= 0.0 {
            return Err(WheelError::config(format!(
                "sampling.default_temperature must be greater than 0, got {}",
                sampling.default_temperature
            )));
        }
        if self.sessions.ttl_secs == 0 {
            return Err(WheelError::config("sessions.ttl_secs must be greater than 0"));
        }
        if self.sessions.sweep_interval_secs == 0 {
            return Err(WheelError::config(
                "sessions.sweep_interval_secs must be greater than 0",
            ));
        }

        if self.models.is_empty() {
            return Err(WheelError::config("at least one [[model]] must be configured"));
        }

        let mut seen = HashSet::new();
        for model in &self.models {
            if model.id.trim().is_empty() {
                return Err(WheelError::config("model id must not be empty"));
            }
            if !seen.insert(model.id.as_str()) {
                return Err(WheelError::config(format!("duplicate model id '{}'", model.id)));
            }
            match &model.backend {
                BackendConfig::Http { base_url, .. } if base_url.trim().is_empty() => {
                    return Err(WheelError::config(format!(
                        "model '{}': http backend needs a base_url",
                        model.id
                    )));
                }
                BackendConfig::Fixed { vocabulary, logits } => {
                    if vocabulary.is_empty() || vocabulary.len() != logits.len() {
                        return Err(WheelError::config(format!(
                            "model '{}': fixed backend needs one logit per vocabulary entry \
                             ({} entries, {} logits)",
                            model.id,
                            vocabulary.len(),
                            logits.len()
                        )));
                    }
                }
                BackendConfig::Http { .. } => {}
            }
        }

        let defaults = self.models.iter().filter(|m| m.default).count();
        if defaults > 1 {
            return Err(WheelError::config("more than one model is marked default"));
        }

        if let Some(unknown) = self.preload.iter().find(|id| !seen.contains(id.as_str())) {
            return Err(WheelError::config(format!(
                "preload references unknown model '{}'",
                unknown
            )));
        }

        Ok(())
    }

    /// Id of the default model: the one flagged `default`, else the first.
    pub fn default_model_id(&self) -> Option<&str> {
        self.models
            .iter()
            .find(|m| m.default)
            .or_else(|| self.models.first())
            .map(|m| m.id.as_str())
    }

    /// Model descriptions with the resolved default flag.
    pub fn model_infos(&self) -> Vec<ModelInfo> {
        let default_id = self.default_model_id();
        self.models
            .iter()
            .map(|m| ModelInfo {
                id: m.id.clone(),
                name: m.name.clone(),
                description: m.description.clone(),
                parameters: m.parameters.clone(),
                default: Some(m.id.as_str()) == default_id,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = WheelConfig::default();
        config.validate().unwrap();
        assert_eq!(config.default_model_id(), Some("gpt2"));
        assert_eq!(config.sessions.ttl(), Duration::from_secs(3600));
        assert_eq!(config.sessions.sweep_interval(), Duration::from_secs(300));
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: WheelConfig = toml::from_str(
            r#"
            [server]
            port = 9000

            [[model]]
            id = "toy"
            name = "Toy"
            backend = { kind = "fixed", vocabulary = ["a", "b"], logits = [1.0, 0.5] }
            "#,
        )
        .unwrap();

        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.sampling.default_threshold, 0.01);
        assert_eq!(config.models.len(), 1);
        assert_eq!(config.default_model_id(), Some("toy"));
        assert!(config.model_infos()[0].default);
        assert!(config.preload.is_empty());
        config.validate().unwrap();
    }

    #[test]
    fn test_http_backend_timeout_default() {
        let model: ModelConfig = toml::from_str(
            r#"
            id = "gpt2"
            name = "GPT-2"
            backend = { kind = "http", base_url = "http://localhost:8001" }
            "#,
        )
        .unwrap();
        assert_eq!(
            model.backend,
            BackendConfig::Http {
                base_url: "http://localhost:8001".to_string(),
                timeout_secs: 30
            }
        );
    }

    #[test]
    fn test_roundtrip_through_toml() {
        let config = WheelConfig::default();
        let text = toml::to_string(&config).unwrap();
        let parsed: WheelConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_validation_errors() {
        let mut config = WheelConfig::default();
        config.sampling.default_threshold = 1.5;
        assert!(config.validate().is_err());

        let mut config = WheelConfig::default();
        config.sampling.default_temperature = 0.0;
        assert!(config.validate().is_err());

        let mut config = WheelConfig::default();
        config.models[1].id = "gpt2".to_string();
        assert!(config.validate().is_err());

        let mut config = WheelConfig::default();
        config.models[1].default = true;
        assert!(config.validate().is_err());

        let mut config = WheelConfig::default();
        config.preload = vec!["missing".to_string()];
        assert!(config.validate().is_err());

        let mut config = WheelConfig::default();
        config.models[0].backend = BackendConfig::Fixed {
            vocabulary: vec!["a".to_string()],
            logits: vec![],
        };
        assert!(matches!(config.validate(), Err(WheelError::Config(_))));
    }
}
