//! Model Targets
//!
//! Parses router values of the form `provider,model`.

use crate::error::{Result, RotationError};

/// Parsed model target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelTarget {
    /// Provider name (e.g., "openrouter", "deepseek")
    pub provider: String,

    /// Model name as the provider knows it (e.g., "anthropic/claude-sonnet-4")
    pub model: String,
}

impl ModelTarget {
    /// Parse a target in the format "provider,model".
    ///
    /// Only the first comma separates; the model part may contain slashes.
    pub fn parse(target: &str) -> Result<Self> {
        let (provider, model) = target
            .split_once(',')
            .map(|(p, m)| (p.trim(), m.trim()))
            .filter(|(p, m)| !p.is_empty() && !m.is_empty())
            .ok_or_else(|| RotationError::InvalidTarget(target.to_string()))?;

        Ok(Self {
            provider: provider.to_string(),
            model: model.to_string(),
        })
    }
}

impl std::fmt::Display for ModelTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{},{}", self.provider, self.model)
    }
}
