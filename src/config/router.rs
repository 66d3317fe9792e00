//! Router Configuration
//!
//! Model candidates per logical role.

use crate::error::{Result, RotationError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A logical purpose for which models are configured independently
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Role {
    Default,
    LongContext,
    Background,
    Think,
    WebSearch,
}

impl Role {
    /// Every recognized role
    pub const ALL: [Role; 5] = [
        Role::Default,
        Role::LongContext,
        Role::Background,
        Role::Think,
        Role::WebSearch,
    ];

    /// Configuration field name for this role
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Default => "default",
            Role::LongContext => "longContext",
            Role::Background => "background",
            Role::Think => "think",
            Role::WebSearch => "webSearch",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = RotationError;

    fn from_str(s: &str) -> Result<Self> {
        Role::ALL
            .into_iter()
            .find(|role| role.as_str() == s)
            .ok_or_else(|| RotationError::UnknownRole(s.to_string()))
    }
}

/// A router value: one fixed model or a rotating list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ModelSpec {
    One(String),
    Many(Vec<String>),
}

impl ModelSpec {
    /// Build a list value
    pub fn many<I, S>(models: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ModelSpec::Many(models.into_iter().map(Into::into).collect())
    }
}

impl From<&str> for ModelSpec {
    fn from(model: &str) -> Self {
        ModelSpec::One(model.to_string())
    }
}

/// Router section of the configuration
///
/// Other router settings (thresholds and the like) are ignored.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouterConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<ModelSpec>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub long_context: Option<ModelSpec>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background: Option<ModelSpec>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub think: Option<ModelSpec>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub web_search: Option<ModelSpec>,
}

impl RouterConfig {
    /// Configured value for a role
    pub fn get(&self, role: Role) -> Option<&ModelSpec> {
        match role {
            Role::Default => self.default.as_ref(),
            Role::LongContext => self.long_context.as_ref(),
            Role::Background => self.background.as_ref(),
            Role::Think => self.think.as_ref(),
            Role::WebSearch => self.web_search.as_ref(),
        }
    }

    /// Set the value for a role
    pub fn set(&mut self, role: Role, spec: Option<ModelSpec>) {
        let slot = match role {
            Role::Default => &mut self.default,
            Role::LongContext => &mut self.long_context,
            Role::Background => &mut self.background,
            Role::Think => &mut self.think,
            Role::WebSearch => &mut self.web_search,
        };
        *slot = spec;
    }
}
