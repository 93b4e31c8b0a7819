//! Oracle registry.
//!
//! Holds one lazily initialised slot per configured model. A model is loaded
//! the first time it is requested (or up front via [`OracleRegistry::preload`])
//! and kept for the life of the registry. Failed loads are not cached, so a
//! later request retries.

use super::{FixedOracle, HttpOracle};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokenwheel_core::config::{BackendConfig, ModelConfig, WheelConfig};
use tokenwheel_core::error::{Result, WheelError};
use tokenwheel_core::oracle::{ModelInfo, ModelOracle, OracleProvider};
use tokio::sync::OnceCell;

enum Loader {
    Config(BackendConfig),
    /// Already-built oracle (tests, embedding).
    Ready(Arc<dyn ModelOracle>),
}

struct Slot {
    info: ModelInfo,
    loader: Loader,
    oracle: OnceCell<Arc<dyn ModelOracle>>,
}

/// [`OracleProvider`] backed by the configured `[[model]]` entries.
pub struct OracleRegistry {
    slots: HashMap<String, Slot>,
    /// Configuration order, for stable listings.
    order: Vec<String>,
}

impl OracleRegistry {
    /// Creates a registry with one slot per configured model. Nothing is loaded yet.
    pub fn from_config(config: &WheelConfig) -> Self {
        let infos = config.model_infos();
        let mut registry = Self::empty();
        for (model, info) in config.models.iter().zip(infos) {
            registry.insert(info, Loader::Config(model.backend.clone()));
        }
        registry
    }

    /// Creates a registry with no models.
    pub fn empty() -> Self {
        Self {
            slots: HashMap::new(),
            order: Vec::new(),
        }
    }

    /// Registers an already-built oracle under `info.id`.
    pub fn with_oracle(mut self, info: ModelInfo, oracle: Arc<dyn ModelOracle>) -> Self {
        self.insert(info, Loader::Ready(oracle));
        self
    }

    /// Loads each listed model, logging (not propagating) failures.
    ///
    /// Returns how many models loaded.
    pub async fn preload(&self, model_names: &[String]) -> usize {
        let mut loaded = 0;
        for model_name in model_names {
            tracing::info!(model = %model_name, "Pre-loading model");
            match self.oracle(model_name).await {
                Ok(_) => {
                    tracing::info!(model = %model_name, "Model loaded successfully");
                    loaded += 1;
                }
                Err(e) => {
                    tracing::error!(model = %model_name, error = %e, "Failed to load model");
                }
            }
        }
        loaded
    }

    fn insert(&mut self, info: ModelInfo, loader: Loader) {
        let id = info.id.clone();
        if self.slots.contains_key(&id) {
            self.order.retain(|existing| existing != &id);
        }
        self.order.push(id.clone());
        self.slots.insert(
            id,
            Slot {
                info,
                loader,
                oracle: OnceCell::new(),
            },
        );
    }

    fn unknown_model(&self, model_name: &str) -> WheelError {
        WheelError::invalid_argument(format!(
            "Invalid model name '{}'. Available models: {:?}",
            model_name, self.order
        ))
    }
}

async fn load(model_name: &str, loader: &Loader) -> Result<Arc<dyn ModelOracle>> {
    match loader {
        Loader::Ready(oracle) => Ok(oracle.clone()),
        Loader::Config(BackendConfig::Http {
            base_url,
            timeout_secs,
        }) => {
            let oracle =
                HttpOracle::connect(model_name, base_url, Duration::from_secs(*timeout_secs))
                    .await?;
            Ok(Arc::new(oracle))
        }
        Loader::Config(BackendConfig::Fixed { vocabulary, logits }) => {
            let oracle = FixedOracle::new(model_name, vocabulary.clone(), logits.clone())
                .map_err(|e| WheelError::oracle_unavailable(e.to_string()))?;
            Ok(Arc::new(oracle))
        }
    }
}

#[async_trait]
impl OracleProvider for OracleRegistry {
    async fn oracle(&self, model_name: &str) -> Result<Arc<dyn ModelOracle>> {
        let slot = self
            .slots
            .get(model_name)
            .ok_or_else(|| self.unknown_model(model_name))?;

        slot.oracle
            .get_or_try_init(|| async {
                tracing::debug!(model = %model_name, "Loading model oracle");
                load(model_name, &slot.loader).await.map_err(|e| match e {
                    WheelError::OracleUnavailable(_) => e,
                    other => WheelError::oracle_unavailable(format!(
                        "Model '{}' failed to load: {}",
                        model_name, other
                    )),
                })
            })
            .await
            .cloned()
    }

    async fn is_loaded(&self, model_name: &str) -> bool {
        self.slots
            .get(model_name)
            .is_some_and(|slot| slot.oracle.initialized())
    }

    fn available_models(&self) -> Vec<ModelInfo> {
        self.order
            .iter()
            .filter_map(|id| self.slots.get(id))
            .map(|slot| slot.info.clone())
            .collect()
    }

    fn is_known(&self, model_name: &str) -> bool {
        self.slots.contains_key(model_name)
    }
}

/// Convenience used by tests and the server to describe a fixed model.
pub fn fixed_model_config(id: &str, entries: &[(&str, f64)]) -> ModelConfig {
    ModelConfig {
        id: id.to_string(),
        name: id.to_string(),
        description: format!("Fixed table with {} tokens", entries.len()),
        parameters: "n/a".to_string(),
        default: false,
        backend: BackendConfig::Fixed {
            vocabulary: entries.iter().map(|(t, _)| t.to_string()).collect(),
            logits: entries.iter().map(|(_, p)| p.ln() as f32).collect(),
        },
    }
}
