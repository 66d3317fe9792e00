//! API Key Pool Management
//!
//! Manages multiple API keys per provider with round-robin rotation and
//! per-key cooldown after rate limiting.

use crate::config::ProviderEntry;
use crate::router::clock::{Clock, SystemClock};
use chrono::{DateTime, TimeDelta, Utc};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Cooldown applied on the first rate limit; doubles on each consecutive one
pub const BASE_COOLDOWN_SECS: i64 = 60;

/// Rotation bookkeeping for a single key
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KeyState {
    /// Time until which this key is excluded from selection
    pub cooldown_until: Option<DateTime<Utc>>,

    /// Rate limits reported since the last success
    pub consecutive_failures: u32,
}

impl KeyState {
    /// Check if this key may be dispensed at `now`
    pub fn is_available_at(&self, now: DateTime<Utc>) -> bool {
        self.cooldown_until.is_none_or(|until| until <= now)
    }

    /// Get remaining cooldown at `now`
    pub fn cooldown_remaining(&self, now: DateTime<Utc>) -> Option<Duration> {
        self.cooldown_until
            .filter(|until| *until > now)
            .and_then(|until| (until - now).to_std().ok())
    }
}

/// Cooldown length after `failures` consecutive rate limits.
///
/// `60s * 2^(failures - 1)`, saturating at `TimeDelta::MAX`.
pub fn cooldown_for(failures: u32) -> TimeDelta {
    2i64.checked_pow(failures.saturating_sub(1))
        .and_then(|factor| BASE_COOLDOWN_SECS.checked_mul(factor))
        .and_then(TimeDelta::try_seconds)
        .unwrap_or(TimeDelta::MAX)
}

/// Keys of one provider with a rotation cursor
#[derive(Debug)]
pub struct KeyPool {
    /// Provider name this pool belongs to
    provider: String,

    /// Keys in configuration order
    keys: Vec<String>,

    /// Index of the next candidate
    cursor: usize,

    states: HashMap<String, KeyState>,
}

impl KeyPool {
    /// Create a new key pool with every key immediately available
    pub fn new(provider: String, keys: Vec<String>) -> Self {
        let states = keys
            .iter()
            .map(|key| (key.clone(), KeyState::default()))
            .collect();

        Self {
            provider,
            keys,
            cursor: 0,
            states,
        }
    }

    /// Get the provider name
    pub fn provider(&self) -> &str {
        &self.provider
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn state(&self, key: &str) -> Option<&KeyState> {
        self.states.get(key)
    }

    /// Index of the first available key at or after the cursor
    fn find_available(&self, now: DateTime<Utc>) -> Option<usize> {
        let len = self.keys.len();
        (0..len)
            .map(|offset| (self.cursor + offset) % len)
            .find(|&idx| {
                self.states
                    .get(&self.keys[idx])
                    .is_none_or(|state| state.is_available_at(now))
            })
    }

    /// Dispense the next available key and advance the cursor past it
    pub fn next_key(&mut self, now: DateTime<Utc>) -> Option<&str> {
        let idx = self.find_available(now)?;
        self.cursor = (idx + 1) % self.keys.len();
        Some(&self.keys[idx])
    }

    /// Return the key `next_key` would dispense, without advancing
    pub fn peek_key(&self, now: DateTime<Utc>) -> Option<&str> {
        self.find_available(now).map(|idx| self.keys[idx].as_str())
    }

    /// Record a rate limit and put the key into cooldown.
    ///
    /// Returns the state after the update.
    pub fn mark_rate_limited(&mut self, key: &str, now: DateTime<Utc>) -> KeyState {
        let state = self.states.entry(key.to_string()).or_default();
        state.consecutive_failures = state.consecutive_failures.saturating_add(1);
        let until = now
            .checked_add_signed(cooldown_for(state.consecutive_failures))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        state.cooldown_until = Some(until);
        *state
    }

    /// Clear cooldown and failure count. Returns false for an unknown key.
    pub fn mark_success(&mut self, key: &str) -> bool {
        match self.states.get_mut(key) {
            Some(state) => {
                *state = KeyState::default();
                true
            }
            None => false,
        }
    }

    /// Get the shortest wait until some key is available
    pub fn min_wait_time(&self, now: DateTime<Utc>) -> Option<Duration> {
        if self.keys.is_empty() {
            return None;
        }
        if self.find_available(now).is_some() {
            return Some(Duration::ZERO);
        }

        self.keys
            .iter()
            .filter_map(|key| self.states.get(key))
            .filter_map(|state| state.cooldown_remaining(now))
            .min()
    }

    /// Get statistics about the pool
    pub fn stats(&self, now: DateTime<Utc>) -> KeyPoolStats {
        let total = self.keys.len();
        let cooling = self
            .keys
            .iter()
            .filter(|key| {
                self.states
                    .get(*key)
                    .is_some_and(|state| !state.is_available_at(now))
            })
            .count();

        KeyPoolStats {
            total_keys: total,
            available_keys: total - cooling,
            cooling_keys: cooling,
        }
    }
}

/// Statistics about a key pool
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyPoolStats {
    pub total_keys: usize,
    pub available_keys: usize,
    pub cooling_keys: usize,
}

/// Outcome of initializing one provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitializedProvider {
    pub name: String,

    /// First usable key, for callers that expect a single `api_key`
    pub primary_key: Option<String>,

    pub key_count: usize,
}

/// Key pools for every configured provider
#[derive(Debug)]
pub struct KeyRegistry {
    pools: RwLock<HashMap<String, Mutex<KeyPool>>>,
    clock: Arc<dyn Clock>,
}

impl Default for KeyRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyRegistry {
    /// Create an empty registry using the system clock
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            pools: RwLock::new(HashMap::new()),
            clock,
        }
    }

    /// Build a fresh pool for every provider entry.
    ///
    /// Replaces any earlier pool of the same name, cooldowns included.
    /// Pools of providers not named in `providers` are left alone.
    pub fn initialize(&self, providers: &[ProviderEntry]) -> Vec<InitializedProvider> {
        let mut pools = self.pools.write();

        providers
            .iter()
            .map(|entry| {
                let normalized = entry.normalized_keys();
                let key_count = normalized.keys.len();
                tracing::debug!(provider = %entry.name, keys = key_count, "initialized key pool");

                pools.insert(
                    entry.name.clone(),
                    Mutex::new(KeyPool::new(entry.name.clone(), normalized.keys)),
                );

                InitializedProvider {
                    name: entry.name.clone(),
                    primary_key: normalized.primary_key,
                    key_count,
                }
            })
            .collect()
    }

    /// Dispense the next usable key for a provider.
    ///
    /// `None` if the provider is unknown, has no keys, or every key is
    /// cooling down.
    pub fn next_key(&self, provider: &str) -> Option<String> {
        let now = self.clock.now();
        let pools = self.pools.read();
        let mut pool = pools.get(provider)?.lock();
        let key = pool.next_key(now).map(str::to_string);

        if key.is_none() && !pool.is_empty() {
            tracing::debug!(provider, "all keys cooling down");
        }
        key
    }

    /// The key `next_key` would return, without consuming it
    pub fn peek_key(&self, provider: &str) -> Option<String> {
        let now = self.clock.now();
        let pools = self.pools.read();
        let pool = pools.get(provider)?.lock();
        pool.peek_key(now).map(str::to_string)
    }

    /// Put a key into exponential-backoff cooldown. Unknown providers are ignored.
    pub fn report_rate_limited(&self, provider: &str, key: &str) {
        let now = self.clock.now();
        let pools = self.pools.read();
        let Some(pool) = pools.get(provider) else {
            return;
        };

        let state = pool.lock().mark_rate_limited(key, now);
        tracing::warn!(
            provider,
            key = %mask_key(key),
            failures = state.consecutive_failures,
            cooldown_secs = cooldown_for(state.consecutive_failures).num_seconds(),
            "key rate limited"
        );
    }

    /// Make a key immediately available again and reset its backoff.
    ///
    /// Never creates state for a key the pool has not seen.
    pub fn report_success(&self, provider: &str, key: &str) {
        let pools = self.pools.read();
        if let Some(pool) = pools.get(provider) {
            if pool.lock().mark_success(key) {
                tracing::trace!(provider, key = %mask_key(key), "key backoff reset");
            }
        }
    }

    /// Current bookkeeping for one key
    pub fn key_state(&self, provider: &str, key: &str) -> Option<KeyState> {
        let pools = self.pools.read();
        let pool = pools.get(provider)?.lock();
        pool.state(key).copied()
    }

    /// Get statistics about a provider's pool
    pub fn stats(&self, provider: &str) -> Option<KeyPoolStats> {
        let now = self.clock.now();
        let pools = self.pools.read();
        let pool = pools.get(provider)?.lock();
        Some(pool.stats(now))
    }

    /// How long until a key is available; zero if one is available now
    pub fn next_available_in(&self, provider: &str) -> Option<Duration> {
        let now = self.clock.now();
        let pools = self.pools.read();
        let pool = pools.get(provider)?.lock();
        pool.min_wait_time(now)
    }

    /// Names of every initialized provider, sorted
    pub fn providers(&self) -> Vec<String> {
        let mut names: Vec<String> = self.pools.read().keys().cloned().collect();
        names.sort();
        names
    }
}

/// Shorten a key for logs
pub(crate) fn mask_key(key: &str) -> String {
    let prefix: String = key.chars().take(4).collect();
    format!("{}…", prefix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::router::clock::ManualClock;

    fn registry(providers: &[ProviderEntry]) -> (KeyRegistry, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::default());
        let registry = KeyRegistry::with_clock(clock.clone());
        registry.initialize(providers);
        (registry, clock)
    }

    fn three_keys() -> Vec<ProviderEntry> {
        vec![ProviderEntry::with_keys("test", ["key1", "key2", "key3"])]
    }

    #[test]
    fn test_cooldown_for() {
        assert_eq!(cooldown_for(1), TimeDelta::seconds(60));
        assert_eq!(cooldown_for(2), TimeDelta::seconds(120));
        assert_eq!(cooldown_for(3), TimeDelta::seconds(240));
        assert_eq!(cooldown_for(200), TimeDelta::MAX);
    }

    #[test]
    fn test_key_pool_round_robin() {
        let (registry, _) = registry(&three_keys());

        let keys: Vec<_> = (0..4).map(|_| registry.next_key("test").unwrap()).collect();
        assert_eq!(keys, vec!["key1", "key2", "key3", "key1"]);
    }

    #[test]
    fn test_peek_agrees_with_next() {
        let (registry, _) = registry(&three_keys());
        registry.next_key("test");

        let peeked = registry.peek_key("test");
        assert_eq!(registry.peek_key("test"), peeked);
        assert_eq!(registry.next_key("test"), peeked);
        assert_eq!(peeked.as_deref(), Some("key2"));
    }

    #[test]
    fn test_key_pool_skips_rate_limited() {
        let (registry, _) = registry(&three_keys());

        registry.report_rate_limited("test", "key1");

        let keys: Vec<_> = (0..4).map(|_| registry.next_key("test").unwrap()).collect();
        assert_eq!(keys, vec!["key2", "key3", "key2", "key3"]);
    }

    #[test]
    fn test_cooldown_expires() {
        let (registry, clock) = registry(&[ProviderEntry::with_keys("test", ["key1"])]);

        registry.report_rate_limited("test", "key1");
        assert_eq!(registry.next_key("test"), None);

        clock.advance(TimeDelta::seconds(59));
        assert_eq!(registry.next_key("test"), None);

        clock.advance(TimeDelta::seconds(1));
        assert_eq!(registry.next_key("test").as_deref(), Some("key1"));
    }

    #[test]
    fn test_backoff_doubles() {
        let (registry, clock) = registry(&three_keys());
        let start = clock.now();

        registry.report_rate_limited("test", "key2");
        let state = registry.key_state("test", "key2").unwrap();
        assert_eq!(state.consecutive_failures, 1);
        assert_eq!(state.cooldown_until, Some(start + TimeDelta::seconds(60)));

        registry.report_rate_limited("test", "key2");
        let state = registry.key_state("test", "key2").unwrap();
        assert_eq!(state.cooldown_until, Some(start + TimeDelta::seconds(120)));

        registry.report_rate_limited("test", "key2");
        let state = registry.key_state("test", "key2").unwrap();
        assert_eq!(state.consecutive_failures, 3);
        assert_eq!(state.cooldown_until, Some(start + TimeDelta::seconds(240)));
    }

    #[test]
    fn test_success_resets_backoff() {
        let (registry, clock) = registry(&three_keys());
        let start = clock.now();

        for _ in 0..4 {
            registry.report_rate_limited("test", "key1");
        }
        registry.report_success("test", "key1");
        assert_eq!(
            registry.key_state("test", "key1"),
            Some(KeyState::default())
        );
        assert_eq!(registry.peek_key("test").as_deref(), Some("key1"));

        registry.report_rate_limited("test", "key1");
        let state = registry.key_state("test", "key1").unwrap();
        assert_eq!(state.cooldown_until, Some(start + TimeDelta::seconds(60)));
    }

    #[test]
    fn test_all_cooling_leaves_cursor() {
        let (registry, _) = registry(&three_keys());
        registry.next_key("test");

        for key in ["key1", "key2", "key3"] {
            registry.report_rate_limited("test", key);
        }

        assert_eq!(registry.next_key("test"), None);
        assert_eq!(registry.peek_key("test"), None);

        registry.report_success("test", "key1");
        registry.report_success("test", "key2");
        // cursor still points at key2
        assert_eq!(registry.next_key("test").as_deref(), Some("key2"));
    }

    #[test]
    fn test_unknown_targets_are_ignored() {
        let (registry, _) = registry(&three_keys());

        assert_eq!(registry.next_key("missing"), None);
        assert_eq!(registry.peek_key("missing"), None);
        registry.report_rate_limited("missing", "key1");
        registry.report_success("missing", "key1");
        assert_eq!(registry.key_state("missing", "key1"), None);

        registry.report_success("test", "stray");
        assert_eq!(registry.key_state("test", "stray"), None);

        registry.report_rate_limited("test", "stray");
        assert_eq!(
            registry.key_state("test", "stray").map(|s| s.consecutive_failures),
            Some(1)
        );
    }

    #[test]
    fn test_provider_without_keys() {
        let (registry, _) = registry(&[ProviderEntry {
            name: "empty".to_string(),
            ..Default::default()
        }]);

        assert_eq!(registry.providers(), vec!["empty"]);
        assert_eq!(registry.next_key("empty"), None);
        assert_eq!(registry.next_available_in("empty"), None);
    }

    #[test]
    fn test_initialize_reports_primary_key() {
        let registry = KeyRegistry::new();
        let report = registry.initialize(&[
            ProviderEntry::with_keys("a", ["", "ka1", "ka2"]),
            ProviderEntry::with_keys("b", Vec::<String>::new()),
        ]);

        assert_eq!(
            report,
            vec![
                InitializedProvider {
                    name: "a".to_string(),
                    primary_key: Some("ka1".to_string()),
                    key_count: 2,
                },
                InitializedProvider {
                    name: "b".to_string(),
                    primary_key: None,
                    key_count: 0,
                },
            ]
        );
    }

    #[test]
    fn test_initialize_replaces_pool() {
        let (registry, _) = registry(&three_keys());
        registry.next_key("test");
        registry.report_rate_limited("test", "key2");

        registry.initialize(&three_keys());
        assert_eq!(registry.key_state("test", "key2"), Some(KeyState::default()));
        assert_eq!(registry.next_key("test").as_deref(), Some("key1"));
    }

    #[test]
    fn test_stats_and_wait_time() {
        let (registry, clock) = registry(&[ProviderEntry::with_keys("test", ["key1", "key2"])]);

        assert_eq!(registry.next_available_in("test"), Some(Duration::ZERO));

        registry.report_rate_limited("test", "key1");
        registry.report_rate_limited("test", "key2");
        registry.report_rate_limited("test", "key2");

        assert_eq!(
            registry.stats("test"),
            Some(KeyPoolStats {
                total_keys: 2,
                available_keys: 0,
                cooling_keys: 2,
            })
        );
        assert_eq!(
            registry.next_available_in("test"),
            Some(Duration::from_secs(60))
        );

        clock.advance(TimeDelta::seconds(60));
        assert_eq!(registry.stats("test").unwrap().available_keys, 1);
        assert_eq!(registry.next_available_in("test"), Some(Duration::ZERO));
    }

    #[test]
    fn test_concurrent_next_key_is_fair() {
        let registry = Arc::new(KeyRegistry::new());
        registry.initialize(&[ProviderEntry::with_keys("test", ["k1", "k2", "k3", "k4"])]);

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let registry = registry.clone();
                std::thread::spawn(move || {
                    (0..100)
                        .map(|_| registry.next_key("test").unwrap())
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut counts: HashMap<String, usize> = HashMap::new();
        for handle in handles {
            for key in handle.join().unwrap() {
                *counts.entry(key).or_default() += 1;
            }
        }

        assert_eq!(counts.len(), 4);
        assert!(counts.values().all(|&n| n == 100));
    }

    #[test]
    fn test_mask_key() {
        assert_eq!(mask_key("sk-abcdef"), "sk-a…");
        assert_eq!(mask_key("ab"), "ab…");
    }
}
