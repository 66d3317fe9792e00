//! Configuration Module
//!
//! Handles rotation configuration loading and normalization.

pub mod loader;
pub mod provider;
pub mod router;

pub use loader::ConfigLoader;
pub use provider::{interpolate_env, ApiKeySpec, NormalizedKeys, ProviderEntry, RotationConfig};
pub use router::{ModelSpec, Role, RouterConfig};
