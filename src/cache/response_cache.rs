use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, warn};

use super::file_cache::FileCache;
use super::types::{CacheError, ResponseCacheStats, ResponseEntry};
use crate::utils::current_season;

/// TTL cache of stats API responses keyed by request shape.
///
/// Responses for closed seasons never change, so they are stored without an
/// expiry. Everything else lives for the configured current-season TTL.
#[derive(Debug)]
pub struct ResponseCache {
    store: FileCache,
    ttl: Duration,
}

impl ResponseCache {
    pub fn open(dir: PathBuf, ttl: Duration) -> Result<Self, CacheError> {
        Ok(Self {
            store: FileCache::new(dir, "resp")?,
            ttl,
        })
    }

    /// Key over the endpoint and the canonical (sorted) parameter set
    pub fn key_for(endpoint: &str, params: &BTreeMap<String, String>) -> String {
        FileCache::hash_key(&[endpoint, &canonical_params(params)])
    }

    /// Lifetime for a request; `None` means the entry never expires
    pub fn ttl_for(&self, params: &BTreeMap<String, String>, current: i32) -> Option<Duration> {
        let season = params
            .get("season")
            .and_then(|s| s.trim().parse::<i32>().ok());
        match season {
            Some(season) if season < current => None,
            _ => Some(self.ttl),
        }
    }

    pub fn get(&self, endpoint: &str, params: &BTreeMap<String, String>) -> Option<Value> {
        self.get_at(endpoint, params, Utc::now())
    }

    pub(crate) fn get_at(
        &self,
        endpoint: &str,
        params: &BTreeMap<String, String>,
        now: DateTime<Utc>,
    ) -> Option<Value> {
        let key = Self::key_for(endpoint, params);
        let entry = match self.store.load::<ResponseEntry>(&key) {
            Ok(Some(entry)) => entry,
            Ok(None) => {
                debug!("Response cache miss: {}", endpoint);
                return None;
            }
            Err(e) => {
                warn!("Evicting unreadable response cache entry for {}: {}", endpoint, e);
                self.evict(&key);
                return None;
            }
        };

        if entry.is_expired(now) {
            debug!("Response cache entry expired: {}", endpoint);
            self.evict(&key);
            return None;
        }

        match serde_json::from_str(&entry.payload) {
            Ok(payload) => {
                debug!("Response cache hit: {}", endpoint);
                Some(payload)
            }
            Err(e) => {
                warn!("Evicting response cache entry with bad payload for {}: {}", endpoint, e);
                self.evict(&key);
                None
            }
        }
    }

    pub fn put(&self, endpoint: &str, params: &BTreeMap<String, String>, payload: &Value) -> Result<(), CacheError> {
        self.put_at(endpoint, params, payload, Utc::now(), current_season())
    }

    pub(crate) fn put_at(
        &self,
        endpoint: &str,
        params: &BTreeMap<String, String>,
        payload: &Value,
        now: DateTime<Utc>,
        current: i32,
    ) -> Result<(), CacheError> {
        let key = Self::key_for(endpoint, params);
        let entry = ResponseEntry {
            key: key.clone(),
            endpoint: endpoint.to_string(),
            params: canonical_params(params),
            payload: serde_json::to_string(payload).map_err(|e| CacheError::Encode(e.to_string()))?,
            created_at: now,
            ttl_secs: self.ttl_for(params, current).map(|ttl| ttl.as_secs()),
        };
        self.store.save(&key, &entry)
    }

    fn evict(&self, key: &str) {
        if let Err(e) = self.store.remove(key) {
            warn!("Could not evict response cache entry {}: {}", key, e);
        }
    }

    pub fn clear(&self) -> Result<usize, CacheError> {
        self.store.clear()
    }

    pub fn stats(&self) -> Result<ResponseCacheStats, CacheError> {
        let now = Utc::now();
        let mut entries = 0;
        let mut expired_entries = 0;
        let mut permanent_entries = 0;
        for key in self.store.keys()? {
            let Ok(Some(entry)) = self.store.load::<ResponseEntry>(&key) else {
                continue;
            };
            entries += 1;
            if entry.ttl_secs.is_none() {
                permanent_entries += 1;
            } else if entry.is_expired(now) {
                expired_entries += 1;
            }
        }

        Ok(ResponseCacheStats {
            entries,
            expired_entries,
            permanent_entries,
            total_size_bytes: self.store.total_size()?,
            directory: self.store.directory().to_path_buf(),
        })
    }
}

fn canonical_params(params: &BTreeMap<String, String>) -> String {
    params
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&")
}
