//! Time-bounded cache of upstream weather responses

use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use wxdash_core::TemperatureUnit;

/// Default time a cached response stays fresh
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(600);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestKind {
    Current,
    Forecast,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    kind: RequestKind,
    city: String,
    unit: TemperatureUnit,
}

impl CacheKey {
    /// City names are folded to lowercase, so "Paris" and "paris" share an entry
    pub fn new(kind: RequestKind, city: &str, unit: TemperatureUnit) -> Self {
        Self {
            kind,
            city: city.trim().to_lowercase(),
            unit,
        }
    }
}

/// Raw JSON responses keyed by request; a zero TTL disables caching
#[derive(Debug)]
pub struct ResponseCache {
    ttl: Duration,
    entries: Mutex<HashMap<CacheKey, (Instant, Value)>>,
}

impl ResponseCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn get(&self, key: &CacheKey) -> Option<Value> {
        self.get_at(key, Instant::now())
    }

    pub(crate) fn get_at(&self, key: &CacheKey, now: Instant) -> Option<Value> {
        let mut entries = self.entries();
        let fresh = entries
            .get(key)
            .map(|(stored, _)| now.saturating_duration_since(*stored) < self.ttl)?;
        if fresh {
            entries.get(key).map(|(_, value)| value.clone())
        } else {
            entries.remove(key);
            None
        }
    }

    pub fn insert(&self, key: CacheKey, value: Value) {
        if self.ttl.is_zero() {
            return;
        }
        self.entries().insert(key, (Instant::now(), value));
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.entries().clear();
    }

    // Entries are plain data, so a panic mid-update cannot leave them inconsistent
    fn entries(&self) -> MutexGuard<'_, HashMap<CacheKey, (Instant, Value)>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for ResponseCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_TTL)
    }
}
