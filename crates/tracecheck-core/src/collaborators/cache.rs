//! In-memory response cache for classifier calls.
//!
//! Requests are keyed by the SHA-256 of their JSON payload. `serde_json`
//! objects keep keys sorted, so equal requests always hash the same.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use super::{ClassificationRequest, Classifier};
use crate::domain::Result;

/// Default entry lifetime (one hour).
pub const DEFAULT_TTL: Duration = Duration::from_secs(3600);

/// Hex SHA-256 of the canonical JSON form of `request`.
pub fn cache_key<T: Serialize>(request: &T) -> Result<String> {
    let canonical = serde_json::to_string(&serde_json::to_value(request)?)?;
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    Ok(hex::encode(hasher.finalize()))
}

/// Thread-safe TTL cache from request key to JSON response.
#[derive(Debug)]
pub struct ResponseCache {
    ttl: Duration,
    entries: Mutex<HashMap<String, (Instant, Value)>>,
}

impl Default for ResponseCache {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}

impl ResponseCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Fresh entry for `key`, if any. Expired entries are evicted.
    pub fn get(&self, key: &str) -> Option<Value> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        match entries.get(key) {
            Some((stored, value)) if stored.elapsed() < self.ttl => Some(value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    pub fn set(&self, key: String, value: Value) {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.insert(key, (Instant::now(), value));
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Wraps a classifier so identical requests are answered from the cache.
pub struct CachedClassifier<C> {
    inner: C,
    cache: ResponseCache,
}

impl<C: Classifier> CachedClassifier<C> {
    pub fn new(inner: C, cache: ResponseCache) -> Self {
        Self { inner, cache }
    }

    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }
}

impl<C: Classifier> Classifier for CachedClassifier<C> {
    fn classify(&self, request: &ClassificationRequest) -> Result<String> {
        let key = cache_key(request)?;
        if let Some(Value::String(hit)) = self.cache.get(&key) {
            debug!(event = "classifier.cache_hit", key = %key);
            return Ok(hit);
        }
        info!(event = "classifier.cache_miss", key = %key, model = %request.model);
        let answer = self.inner.classify(request)?;
        self.cache.set(key, Value::String(answer.clone()));
        Ok(answer)
    }
}
