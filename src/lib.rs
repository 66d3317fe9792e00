//! keyrotor - API key and model rotation for multi-provider LLM dispatch
//!
//! Picks which credential to use next for a provider, keeping rate-limited
//! keys in exponential-backoff cooldown, and which model to use next for a
//! router role. All state is in memory and local to the process.
//!
//! ```no_run
//! use keyrotor::{Role, Rotator};
//!
//! let rotator = Rotator::from_path("keyrotor.json")?;
//! if let Some(route) = rotator.route(Role::Default)? {
//!     // call route.provider with route.api_key and route.model ...
//!     rotator.keys().report_success(&route.provider, &route.api_key);
//! }
//! # Ok::<(), keyrotor::RotationError>(())
//! ```

use parking_lot::RwLock;
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

pub mod config;
pub mod error;
pub mod router;

pub use config::{ConfigLoader, ModelSpec, ProviderEntry, Role, RotationConfig, RouterConfig};
pub use error::{Result, RotationError};
pub use router::{
    Clock, InitializedProvider, KeyPoolStats, KeyRegistry, KeyState, ManualClock, ModelRegistry,
    ModelTarget, SystemClock,
};

/// Key and model rotation for one configuration
#[derive(Debug)]
pub struct Rotator {
    /// Live configuration, read on every model pick
    config: RwLock<RotationConfig>,

    /// API key pools per provider
    keys: KeyRegistry,

    /// Model rotation per router role
    models: ModelRegistry,
}

/// Provider, model and key chosen for one outbound call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub provider: String,
    pub model: String,
    pub api_key: String,
}

impl Rotator {
    /// Create a rotator from a config object
    pub fn new(config: RotationConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Create a rotator whose cooldowns are measured against `clock`
    pub fn with_clock(config: RotationConfig, clock: Arc<dyn Clock>) -> Self {
        let keys = KeyRegistry::with_clock(clock);
        let models = ModelRegistry::new();
        keys.initialize(&config.providers);
        models.initialize(&config.router);

        Self {
            config: RwLock::new(config),
            keys,
            models,
        }
    }

    /// Create a rotator from the first config file found in default locations
    pub fn from_default_config() -> Result<Self> {
        Ok(Self::new(ConfigLoader::new()?.into_config()))
    }

    /// Create a rotator with a custom config path
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::new(ConfigLoader::from_path(path)?.into_config()))
    }

    pub fn keys(&self) -> &KeyRegistry {
        &self.keys
    }

    pub fn models(&self) -> &ModelRegistry {
        &self.models
    }

    /// Copy of the current configuration
    pub fn config(&self) -> RotationConfig {
        self.config.read().clone()
    }

    /// Next model for a role, read from the current configuration
    pub fn next_model(&self, role: Role) -> Option<String> {
        let config = self.config.read();
        self.models.next_model(role, config.router.get(role))
    }

    /// Swap in a new configuration.
    ///
    /// Model cursors start over. Key pools are rebuilt for every provider in
    /// the new configuration; pools of providers it no longer names keep
    /// their cooldowns.
    pub fn reload(&self, config: RotationConfig) -> Vec<InitializedProvider> {
        let mut current = self.config.write();
        self.models.reset_all();
        self.models.initialize(&config.router);
        let report = self.keys.initialize(&config.providers);
        *current = config;

        tracing::info!(providers = report.len(), "rotation config reloaded");
        report
    }

    /// Pick model and key for the next call in `role`.
    ///
    /// `Ok(None)` when no model is configured or the provider has no usable
    /// key. A model value not in `provider,model` form is an error.
    pub fn route(&self, role: Role) -> Result<Option<Route>> {
        let Some(model) = self.next_model(role) else {
            return Ok(None);
        };
        let target = ModelTarget::parse(&model)?;

        let Some(api_key) = self.keys.next_key(&target.provider) else {
            tracing::debug!(role = %role, provider = %target.provider, "no key available");
            return Ok(None);
        };

        Ok(Some(Route {
            provider: target.provider,
            model: target.model,
            api_key,
        }))
    }
}

/// Install a fmt subscriber filtered by `KEYROTOR_LOG` (default `info`).
///
/// Does nothing if a global subscriber is already set.
pub fn init_logging() {
    let filter = EnvFilter::try_from_env("KEYROTOR_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
