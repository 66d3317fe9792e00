//! Model Rotation
//!
//! Cycles through the candidate models configured for each router role.

use crate::config::{ModelSpec, Role, RouterConfig};
use parking_lot::Mutex;
use std::collections::hash_map::Entry;
use std::collections::HashMap;

/// Candidate models of one role with a rotation cursor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelPool {
    models: Vec<String>,
    cursor: usize,
}

impl ModelPool {
    /// `None` when `models` is empty
    pub fn new(models: Vec<String>) -> Option<Self> {
        if models.is_empty() {
            return None;
        }
        Some(Self { models, cursor: 0 })
    }

    pub fn models(&self) -> &[String] {
        &self.models
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Swap in a new candidate list, keeping the cursor if it still fits
    fn replace_models(&mut self, models: Vec<String>) {
        self.models = models;
        if self.cursor >= self.models.len() {
            self.cursor = 0;
        }
    }

    fn next_model(&mut self) -> String {
        let model = self.models[self.cursor].clone();
        self.cursor = (self.cursor + 1) % self.models.len();
        model
    }
}

/// Trim entries and drop blanks
fn clean_models(models: &[String]) -> Vec<String> {
    models
        .iter()
        .map(|m| m.trim())
        .filter(|m| !m.is_empty())
        .map(str::to_string)
        .collect()
}

/// Rotation state for every router role
#[derive(Debug, Default)]
pub struct ModelRegistry {
    pools: Mutex<HashMap<Role, ModelPool>>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a pool for every role configured with a non-empty list.
    ///
    /// Roles with a single model or no value are left as they are.
    pub fn initialize(&self, router: &RouterConfig) {
        let mut pools = self.pools.lock();

        for role in Role::ALL {
            if let Some(ModelSpec::Many(list)) = router.get(role) {
                if let Some(pool) = ModelPool::new(clean_models(list)) {
                    tracing::debug!(role = %role, models = pool.models.len(), "initialized model pool");
                    pools.insert(role, pool);
                }
            }
        }
    }

    /// Pick the model to use for `role`.
    ///
    /// A list rotates: the role's pool takes the fresh list and dispenses
    /// the model at its cursor. A single model is returned trimmed and
    /// leaves rotation state alone. Blank or absent values give `None`.
    pub fn next_model(&self, role: Role, configured: Option<&ModelSpec>) -> Option<String> {
        match configured? {
            ModelSpec::One(model) => {
                let model = model.trim();
                (!model.is_empty()).then(|| model.to_string())
            }
            ModelSpec::Many(list) => {
                let models = clean_models(list);
                if models.is_empty() {
                    return None;
                }

                let mut pools = self.pools.lock();
                let pool = match pools.entry(role) {
                    Entry::Occupied(entry) => {
                        let pool = entry.into_mut();
                        pool.replace_models(models);
                        pool
                    }
                    Entry::Vacant(entry) => entry.insert(ModelPool { models, cursor: 0 }),
                };

                let model = pool.next_model();
                tracing::trace!(role = %role, model = %model, "dispensed model");
                Some(model)
            }
        }
    }

    /// Drop every role's rotation state
    pub fn reset_all(&self) {
        self.pools.lock().clear();
    }

    /// Snapshot of one role's pool
    pub fn pool(&self, role: Role) -> Option<ModelPool> {
        self.pools.lock().get(&role).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list(models: &[&str]) -> ModelSpec {
        ModelSpec::many(models.iter().copied())
    }

    #[test]
    fn test_scalar_pass_through() {
        let registry = ModelRegistry::new();

        assert_eq!(
            registry.next_model(Role::Default, Some(&ModelSpec::from(" gpt-4 "))),
            Some("gpt-4".to_string())
        );
        assert_eq!(registry.next_model(Role::Default, Some(&ModelSpec::from("  "))), None);
        assert_eq!(registry.next_model(Role::Default, None), None);
        assert_eq!(registry.pool(Role::Default), None);
    }

    #[test]
    fn test_list_rotation() {
        let registry = ModelRegistry::new();
        let spec = list(&["a", "b", "c"]);

        let picked: Vec<_> = (0..4)
            .map(|_| registry.next_model(Role::Think, Some(&spec)).unwrap())
            .collect();
        assert_eq!(picked, vec!["a", "b", "c", "a"]);
    }

    #[test]
    fn test_list_shrink_keeps_in_range_cursor() {
        let registry = ModelRegistry::new();
        let long = list(&["a", "b", "c"]);
        for _ in 0..4 {
            registry.next_model(Role::Think, Some(&long));
        }

        let short = list(&["a", "b"]);
        let picked: Vec<_> = (0..3)
            .map(|_| registry.next_model(Role::Think, Some(&short)).unwrap())
            .collect();
        assert_eq!(picked, vec!["b", "a", "b"]);
    }

    #[test]
    fn test_list_shrink_resets_out_of_range_cursor() {
        let registry = ModelRegistry::new();
        let long = list(&["a", "b", "c"]);
        registry.next_model(Role::Think, Some(&long));
        registry.next_model(Role::Think, Some(&long));
        assert_eq!(registry.pool(Role::Think).unwrap().cursor(), 2);

        assert_eq!(
            registry.next_model(Role::Think, Some(&list(&["x", "y"]))),
            Some("x".to_string())
        );
    }

    #[test]
    fn test_list_entries_are_cleaned() {
        let registry = ModelRegistry::new();
        let spec = list(&["", " m1 ", "   ", "m2"]);

        assert_eq!(registry.next_model(Role::Background, Some(&spec)).as_deref(), Some("m1"));
        assert_eq!(registry.next_model(Role::Background, Some(&spec)).as_deref(), Some("m2"));
        assert_eq!(
            registry.pool(Role::Background).unwrap().models(),
            &["m1".to_string(), "m2".to_string()]
        );

        assert_eq!(registry.next_model(Role::WebSearch, Some(&list(&[" ", ""]))), None);
        assert_eq!(registry.pool(Role::WebSearch), None);
    }

    #[test]
    fn test_roles_rotate_independently() {
        let registry = ModelRegistry::new();
        let spec = list(&["a", "b"]);

        registry.next_model(Role::Default, Some(&spec));
        assert_eq!(registry.next_model(Role::LongContext, Some(&spec)).as_deref(), Some("a"));
        assert_eq!(registry.next_model(Role::Default, Some(&spec)).as_deref(), Some("b"));
    }

    #[test]
    fn test_initialize_only_seeds_lists() {
        let registry = ModelRegistry::new();
        let mut router = RouterConfig::default();
        router.set(Role::Default, Some("single".into()));
        router.set(Role::Think, Some(list(&["t1", "t2"])));
        router.set(Role::Background, Some(list(&["", " "])));

        registry.initialize(&router);

        assert_eq!(registry.pool(Role::Default), None);
        assert_eq!(registry.pool(Role::Background), None);
        let think = registry.pool(Role::Think).unwrap();
        assert_eq!(think.models(), &["t1".to_string(), "t2".to_string()]);
        assert_eq!(think.cursor(), 0);
    }

    #[test]
    fn test_initialize_resets_cursor() {
        let registry = ModelRegistry::new();
        let spec = list(&["a", "b", "c"]);
        registry.next_model(Role::Think, Some(&spec));

        let mut router = RouterConfig::default();
        router.set(Role::Think, Some(spec.clone()));
        registry.initialize(&router);

        assert_eq!(registry.next_model(Role::Think, Some(&spec)).as_deref(), Some("a"));
    }

    #[test]
    fn test_reset_all() {
        let registry = ModelRegistry::new();
        let spec = list(&["a", "b", "c"]);
        registry.next_model(Role::Think, Some(&spec));
        registry.next_model(Role::Default, Some(&spec));

        registry.reset_all();

        assert_eq!(registry.pool(Role::Think), None);
        assert_eq!(registry.next_model(Role::Think, Some(&spec)).as_deref(), Some("a"));
        assert_eq!(registry.next_model(Role::Default, Some(&spec)).as_deref(), Some("a"));
    }
}
