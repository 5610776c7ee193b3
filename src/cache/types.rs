use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Failure reading or writing a cache file
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("cache IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Entry exists but cannot be decoded; callers evict it and treat it as a miss
    #[error("corrupted cache entry {key}: {reason}")]
    Corrupt { key: String, reason: String },

    #[error("cache encode error: {0}")]
    Encode(String),
}

/// Metadata for cache files
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheMetadata {
    pub written_at: DateTime<Utc>,
    pub original_size: u64,
    pub compressed_size: u64,
}

/// On-disk envelope: compressed bincode payload plus its key for integrity checks
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheFile {
    pub key: String,
    pub metadata: CacheMetadata,
    pub data: Vec<u8>,
}

/// Generated code snippet persisted by the code cache
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeCacheEntry {
    pub key: String,
    pub question: String,
    pub normalized_question: String,
    pub season: i32,
    pub code_text: String,
    pub created_at: DateTime<Utc>,
    /// Filled from the usage sidecar on read; zero in the stored entry
    pub last_used_at: DateTime<Utc>,
    pub hit_count: u64,
    pub last_execution_ms: u64,
}

/// Hit bookkeeping kept beside a code entry, never inside it.
///
/// `entry_created_at` ties the record to one stored snippet: usage left over
/// from an invalidated or replaced entry is ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeUsage {
    pub entry_created_at: DateTime<Utc>,
    pub hit_count: u64,
    pub last_used_at: DateTime<Utc>,
}

/// Stats API response persisted by the response cache
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseEntry {
    pub key: String,
    pub endpoint: String,
    /// Canonical parameter set as JSON text
    pub params: String,
    /// JSON text; bincode cannot carry self-describing values
    pub payload: String,
    pub created_at: DateTime<Utc>,
    /// None means the entry never expires (closed season)
    pub ttl_secs: Option<u64>,
}

impl ResponseEntry {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        match self.ttl_secs.and_then(|ttl| expiry_after(self.created_at, ttl)) {
            Some(expires_at) => now > expires_at,
            None => false,
        }
    }
}

/// Instant a TTL runs out; `None` when it lies beyond what chrono can represent
pub(crate) fn expiry_after(created_at: DateTime<Utc>, ttl_secs: u64) -> Option<DateTime<Utc>> {
    let ttl = i64::try_from(ttl_secs).ok().and_then(chrono::Duration::try_seconds)?;
    created_at.checked_add_signed(ttl)
}

/// Summary of one cached question, for stats listings
#[derive(Debug, Clone, Serialize)]
pub struct CachedQuestion {
    pub question: String,
    pub normalized_question: String,
    pub season: i32,
    pub hit_count: u64,
    pub last_used_at: DateTime<Utc>,
    pub last_execution_ms: u64,
}

/// Code cache statistics
#[derive(Debug, Clone, Serialize)]
pub struct CodeCacheStats {
    pub entries: usize,
    pub total_hits: u64,
    pub session_hits: u64,
    pub session_misses: u64,
    pub directory: PathBuf,
    pub top_questions: Vec<CachedQuestion>,
}

/// Response cache statistics
#[derive(Debug, Clone, Serialize)]
pub struct ResponseCacheStats {
    pub entries: usize,
    pub expired_entries: usize,
    pub permanent_entries: usize,
    pub total_size_bytes: u64,
    pub directory: PathBuf,
}

impl CodeCacheStats {
    /// Format cache stats for display
    pub fn format(&self) -> String {
        let mut out = format!(
            "Code cache: {} entries, {} lifetime hits ({} hits / {} misses this session)\n  Directory: {}",
            self.entries,
            self.total_hits,
            self.session_hits,
            self.session_misses,
            self.directory.display()
        );
        for cached in self.top_questions.iter().take(5) {
            out.push_str(&format!(
                "\n  {:>4} hits  {} ({})",
                cached.hit_count, cached.question, cached.season
            ));
        }
        out
    }
}

impl ResponseCacheStats {
    /// Format cache stats for display
    pub fn format(&self) -> String {
        format!(
            "Response cache: {} entries ({} expired, {} permanent), {:.2} MB\n  Directory: {}",
            self.entries,
            self.expired_entries,
            self.permanent_entries,
            self.total_size_bytes as f64 / 1_048_576.0,
            self.directory.display()
        )
    }
}
