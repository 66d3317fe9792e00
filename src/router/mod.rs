//! Router Module
//!
//! API key pools, model rotation and model target parsing.

pub mod clock;
pub mod key_pool;
pub mod model_pool;
pub mod strategy;

pub use clock::{Clock, ManualClock, SystemClock};
pub use key_pool::{
    cooldown_for, InitializedProvider, KeyPool, KeyPoolStats, KeyRegistry, KeyState,
    BASE_COOLDOWN_SECS,
};
pub use model_pool::{ModelPool, ModelRegistry};
pub use strategy::ModelTarget;
