//! Provider Configuration
//!
//! Defines the configuration schema for providers and their API keys.

use crate::config::router::RouterConfig;
use serde::{Deserialize, Serialize};

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RotationConfig {
    /// Upstream providers in configuration order
    #[serde(default, alias = "Providers")]
    pub providers: Vec<ProviderEntry>,

    /// Model candidates per router role
    #[serde(default, alias = "Router")]
    pub router: RouterConfig,
}

/// Configuration for a single upstream provider
///
/// Fields the rotation layer does not use (base URL, model lists, transformers)
/// are ignored during deserialization.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderEntry {
    /// Provider name, used as the key pool identifier
    pub name: String,

    /// A single key or a list of keys
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<ApiKeySpec>,

    /// Legacy list of keys
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_keys: Option<Vec<String>>,
}

/// An `api_key` value: either one key or several
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ApiKeySpec {
    One(String),
    Many(Vec<String>),
}

/// Canonical key list derived from a provider entry
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizedKeys {
    /// Usable keys in configuration order
    pub keys: Vec<String>,

    /// First usable key, for callers that only understand a single key
    pub primary_key: Option<String>,
}

impl ProviderEntry {
    /// Create an entry with a list of keys
    pub fn with_keys<I, S>(name: impl Into<String>, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            api_key: Some(ApiKeySpec::Many(keys.into_iter().map(Into::into).collect())),
            api_keys: None,
        }
    }

    /// Derive the canonical key list.
    ///
    /// `api_key` as a list wins, then the legacy `api_keys` list, then
    /// `api_key` as a single string. Blank entries and repeats are dropped.
    pub fn normalized_keys(&self) -> NormalizedKeys {
        let raw: Vec<&str> = match (&self.api_key, &self.api_keys) {
            (Some(ApiKeySpec::Many(list)), _) => list.iter().map(String::as_str).collect(),
            (_, Some(list)) => list.iter().map(String::as_str).collect(),
            (Some(ApiKeySpec::One(key)), None) => vec![key.as_str()],
            (None, None) => Vec::new(),
        };

        let mut keys: Vec<String> = Vec::with_capacity(raw.len());
        for key in raw.into_iter().map(str::trim) {
            if !key.is_empty() && !keys.iter().any(|k| k == key) {
                keys.push(key.to_string());
            }
        }

        let primary_key = keys.first().cloned();
        NormalizedKeys { keys, primary_key }
    }

    /// Replace `$NAME` / `${NAME}` key values with environment variables
    pub(crate) fn resolve_env(&mut self) {
        match &mut self.api_key {
            Some(ApiKeySpec::One(key)) => *key = interpolate_env(key),
            Some(ApiKeySpec::Many(list)) => list.iter_mut().for_each(|k| *k = interpolate_env(k)),
            None => {}
        }
        if let Some(list) = &mut self.api_keys {
            list.iter_mut().for_each(|k| *k = interpolate_env(k));
        }
    }
}

impl RotationConfig {
    /// Resolve environment references in every provider's keys
    pub(crate) fn resolve_env(&mut self) {
        self.providers.iter_mut().for_each(ProviderEntry::resolve_env);
    }
}

/// Expand a value that is entirely an environment reference.
///
/// Unset variables expand to an empty string, which key normalization drops.
pub fn interpolate_env(value: &str) -> String {
    let trimmed = value.trim();
    let name = if let Some(inner) = trimmed
        .strip_prefix("${")
        .and_then(|rest| rest.strip_suffix('}'))
    {
        inner
    } else if let Some(rest) = trimmed.strip_prefix('$') {
        rest
    } else {
        return value.to_string();
    };

    if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return value.to_string();
    }

    std::env::var(name).unwrap_or_default()
}
