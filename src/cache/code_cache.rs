use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::path::PathBuf;
use tracing::{debug, warn};

use super::file_cache::FileCache;
use super::types::{expiry_after, CacheError, CachedQuestion, CodeCacheEntry, CodeCacheStats, CodeUsage};
use crate::constants::CACHE_STATS_TOP_QUESTIONS;

/// Everything needed to persist a snippet that just executed successfully
#[derive(Debug, Clone)]
pub struct NewCodeEntry<'a> {
    pub key: &'a str,
    pub question: &'a str,
    pub normalized_question: &'a str,
    pub season: i32,
    pub code_text: &'a str,
    pub execution_ms: u64,
}

#[derive(Debug, Default)]
struct SessionCounters {
    hits: u64,
    misses: u64,
}

/// Persistent store of validated, successfully executed generated code.
///
/// Snippets are written once, by `record`/`put`, and only ever removed by
/// eviction or `invalidate`. Hit counts live in a separate `.usage` file per
/// key so that reading an entry never rewrites it.
#[derive(Debug)]
pub struct CodeCache {
    store: FileCache,
    usage: FileCache,
    ttl: std::time::Duration,
    counters: Mutex<SessionCounters>,
}

impl CodeCache {
    /// Open (or create) a code cache rooted at `dir`
    pub fn open(dir: PathBuf, ttl: std::time::Duration) -> Result<Self, CacheError> {
        Ok(Self {
            store: FileCache::new(dir.clone(), "code")?,
            usage: FileCache::new(dir, "usage")?,
            ttl,
            counters: Mutex::new(SessionCounters::default()),
        })
    }

    /// Cache key for a normalized question in a given season
    pub fn key_for(normalized_question: &str, season: i32) -> String {
        FileCache::hash_key(&[normalized_question, &season.to_string()])
    }

    /// Fetch a live entry, bumping its hit count
    pub fn get(&self, key: &str) -> Option<CodeCacheEntry> {
        self.get_at(key, Utc::now())
    }

    pub(crate) fn get_at(&self, key: &str, now: DateTime<Utc>) -> Option<CodeCacheEntry> {
        let loaded = match self.store.load::<CodeCacheEntry>(key) {
            Ok(entry) => entry,
            Err(CacheError::Corrupt { reason, .. }) => {
                warn!("Evicting corrupted code cache entry {}: {}", key, reason);
                self.evict(key);
                None
            }
            Err(e) => {
                warn!("Code cache read failed for {}: {}", key, e);
                None
            }
        };

        let Some(mut entry) = loaded else {
            self.counters.lock().misses += 1;
            debug!("Code cache miss: {}", key);
            return None;
        };

        // a TTL too large to represent never expires
        if let Some(expires_at) = expiry_after(entry.created_at, self.ttl.as_secs()) {
            if now > expires_at {
                debug!("Code cache entry expired: {}", key);
                self.evict(key);
                self.counters.lock().misses += 1;
                return None;
            }
        }

        let usage = self.bump_usage(&entry, now);
        entry.hit_count = usage.hit_count;
        entry.last_used_at = usage.last_used_at;
        debug!("Code cache hit: {} ({} hits)", key, entry.hit_count);
        Some(entry)
    }

    /// Increment the usage record of a live entry
    fn bump_usage(&self, entry: &CodeCacheEntry, now: DateTime<Utc>) -> CodeUsage {
        let mut counters = self.counters.lock();
        counters.hits += 1;

        let mut usage = self.usage_of(entry).unwrap_or(CodeUsage {
            entry_created_at: entry.created_at,
            hit_count: 0,
            last_used_at: entry.last_used_at,
        });
        usage.hit_count += 1;
        usage.last_used_at = now;
        if let Err(e) = self.usage.save(&entry.key, &usage) {
            warn!("Could not update hit count for {}: {}", entry.key, e);
        }
        usage
    }

    /// Usage recorded for this exact entry, ignoring leftovers of a previous one
    fn usage_of(&self, entry: &CodeCacheEntry) -> Option<CodeUsage> {
        self.usage
            .load::<CodeUsage>(&entry.key)
            .ok()
            .flatten()
            .filter(|usage| usage.entry_created_at == entry.created_at)
    }

    /// Store bare code text under a key
    pub fn put(&self, key: &str, code_text: &str) -> Result<(), CacheError> {
        self.put_at(key, code_text, Utc::now())
    }

    pub(crate) fn put_at(&self, key: &str, code_text: &str, now: DateTime<Utc>) -> Result<(), CacheError> {
        self.write_entry(
            NewCodeEntry {
                key,
                question: "",
                normalized_question: "",
                season: 0,
                code_text,
                execution_ms: 0,
            },
            now,
        )
    }

    /// Store code together with the question metadata it answered
    pub fn record(&self, new_entry: NewCodeEntry<'_>) -> Result<(), CacheError> {
        self.write_entry(new_entry, Utc::now())
    }

    fn write_entry(&self, new_entry: NewCodeEntry<'_>, now: DateTime<Utc>) -> Result<(), CacheError> {
        let entry = CodeCacheEntry {
            key: new_entry.key.to_string(),
            question: new_entry.question.to_string(),
            normalized_question: new_entry.normalized_question.to_string(),
            season: new_entry.season,
            code_text: new_entry.code_text.to_string(),
            created_at: now,
            last_used_at: now,
            hit_count: 0,
            last_execution_ms: new_entry.execution_ms,
        };
        self.store.save(new_entry.key, &entry)?;
        self.drop_usage(new_entry.key);
        debug!("Cached generated code under {}", new_entry.key);
        Ok(())
    }

    /// Drop an entry; returns whether one was present
    pub fn invalidate(&self, key: &str) -> bool {
        let removed = match self.store.remove(key) {
            Ok(removed) => removed,
            Err(e) => {
                warn!("Could not invalidate code cache entry {}: {}", key, e);
                false
            }
        };
        self.drop_usage(key);
        removed
    }

    fn evict(&self, key: &str) {
        if let Err(e) = self.store.remove(key) {
            warn!("Could not evict code cache entry {}: {}", key, e);
        }
        self.drop_usage(key);
    }

    fn drop_usage(&self, key: &str) {
        if let Err(e) = self.usage.remove(key) {
            debug!("Could not remove usage record {}: {}", key, e);
        }
    }

    /// Remove every cached snippet
    pub fn clear(&self) -> Result<usize, CacheError> {
        let removed = self.store.clear()?;
        self.usage.clear()?;
        let mut counters = self.counters.lock();
        counters.hits = 0;
        counters.misses = 0;
        Ok(removed)
    }

    /// Get cache statistics, most popular questions first
    pub fn stats(&self) -> Result<CodeCacheStats, CacheError> {
        let mut questions = Vec::new();
        for key in self.store.keys()? {
            // unreadable entries are skipped here; the next get() evicts them
            if let Ok(Some(entry)) = self.store.load::<CodeCacheEntry>(&key) {
                let usage = self.usage_of(&entry);
                questions.push(CachedQuestion {
                    hit_count: usage.as_ref().map_or(0, |u| u.hit_count),
                    last_used_at: usage.map_or(entry.last_used_at, |u| u.last_used_at),
                    question: entry.question,
                    normalized_question: entry.normalized_question,
                    season: entry.season,
                    last_execution_ms: entry.last_execution_ms,
                });
            }
        }

        questions.sort_by(|a, b| b.hit_count.cmp(&a.hit_count));
        let total_hits = questions.iter().map(|q| q.hit_count).sum();
        let entries = questions.len();
        questions.truncate(CACHE_STATS_TOP_QUESTIONS);

        let counters = self.counters.lock();
        Ok(CodeCacheStats {
            entries,
            total_hits,
            session_hits: counters.hits,
            session_misses: counters.misses,
            directory: self.store.directory().to_path_buf(),
            top_questions: questions,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use tempfile::TempDir;

    const SNIPPET: &str = "let result = #{ success: true, answer: \"ok\" };";

    fn open(dir: &TempDir) -> CodeCache {
        CodeCache::open(dir.path().join("code"), std::time::Duration::from_secs(30 * 86_400)).unwrap()
    }

    #[test]
    fn test_put_then_get_within_ttl() {
        let temp_dir = TempDir::new().unwrap();
        let cache = open(&temp_dir);
        let key = CodeCache::key_for("top home runs", 2024);

        cache.put(&key, SNIPPET).unwrap();
        let entry = cache.get(&key).unwrap();
        assert_eq!(entry.code_text, SNIPPET);
        assert_eq!(entry.hit_count, 1);

        let entry = cache.get(&key).unwrap();
        assert_eq!(entry.hit_count, 2);
    }

    #[test]
    fn test_expired_entry_is_absent() {
        let temp_dir = TempDir::new().unwrap();
        let cache = open(&temp_dir);
        let key = CodeCache::key_for("who had more steals", 2024);
        let created = Utc::now() - Duration::days(31);

        cache.put_at(&key, SNIPPET, created).unwrap();
        assert!(cache.get_at(&key, created + Duration::days(29)).is_some());
        assert!(cache.get_at(&key, created + Duration::days(31)).is_none());
        // expiry evicts, so even an earlier clock no longer sees it
        assert!(cache.get_at(&key, created).is_none());
    }

    #[test]
    fn test_invalidate_removes_entry() {
        let temp_dir = TempDir::new().unwrap();
        let cache = open(&temp_dir);
        let key = CodeCache::key_for("judge versus soto", 2024);

        cache.put(&key, SNIPPET).unwrap();
        assert!(cache.invalidate(&key));
        assert!(cache.get(&key).is_none());
        assert!(!cache.invalidate(&key));

        cache.put(&key, SNIPPET).unwrap();
        assert!(cache.get(&key).is_some());
    }

    #[test]
    fn test_seasons_do_not_share_keys() {
        assert_ne!(
            CodeCache::key_for("aaron judge home runs", 2023),
            CodeCache::key_for("aaron judge home runs", 2024)
        );
    }

    #[test]
    fn test_corrupted_entry_is_a_miss() {
        let temp_dir = TempDir::new().unwrap();
        let cache = open(&temp_dir);
        let key = CodeCache::key_for("corrupt me", 2024);
        cache.put(&key, SNIPPET).unwrap();

        let path = temp_dir
            .path()
            .join("code")
            .join(&key[..2])
            .join(format!("{}.code", key));
        std::fs::write(&path, b"\x00\x01garbage").unwrap();

        assert!(cache.get(&key).is_none());
        assert!(!path.exists());
    }

    #[test]
    fn test_stats_rank_by_hits() {
        let temp_dir = TempDir::new().unwrap();
        let cache = open(&temp_dir);
        let popular = CodeCache::key_for("popular", 2024);
        let rare = CodeCache::key_for("rare", 2024);

        for (key, question) in [(&popular, "popular"), (&rare, "rare")] {
            cache
                .record(NewCodeEntry {
                    key,
                    question,
                    normalized_question: question,
                    season: 2024,
                    code_text: SNIPPET,
                    execution_ms: 12,
                })
                .unwrap();
        }
        cache.get(&popular);
        cache.get(&popular);
        cache.get(&rare);

        let stats = cache.stats().unwrap();
        assert_eq!(stats.entries, 2);
        assert_eq!(stats.total_hits, 3);
        assert_eq!(stats.top_questions[0].question, "popular");
        assert_eq!(stats.session_hits, 3);

        assert_eq!(cache.clear().unwrap(), 2);
        assert_eq!(cache.stats().unwrap().entries, 0);
    }

    fn entry_path(dir: &TempDir, key: &str, extension: &str) -> std::path::PathBuf {
        dir.path()
            .join("code")
            .join(&key[..2])
            .join(format!("{}.{}", key, extension))
    }

    #[test]
    fn test_unrepresentable_ttl_never_expires() {
        let temp_dir = TempDir::new().unwrap();
        let cache = CodeCache::open(
            temp_dir.path().join("code"),
            std::time::Duration::from_secs(u64::MAX / 4),
        )
        .unwrap();
        let key = CodeCache::key_for("career home runs", 2024);

        cache.put(&key, SNIPPET).unwrap();
        assert!(cache.get(&key).is_some());
        assert!(cache.get_at(&key, Utc::now() + Duration::days(365 * 200)).is_some());
    }

    #[test]
    fn test_hit_does_not_rewrite_entry() {
        let temp_dir = TempDir::new().unwrap();
        let cache = open(&temp_dir);
        let key = CodeCache::key_for("most saves", 2024);
        cache.put(&key, SNIPPET).unwrap();

        let path = entry_path(&temp_dir, &key, "code");
        let before = std::fs::read(&path).unwrap();
        cache.get(&key).unwrap();
        cache.get(&key).unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), before);
        assert!(entry_path(&temp_dir, &key, "usage").exists());
    }

    #[test]
    fn test_late_usage_write_cannot_revive_entry() {
        let temp_dir = TempDir::new().unwrap();
        let cache = open(&temp_dir);
        let key = CodeCache::key_for("judge versus soto", 2024);
        let first = Utc::now() - Duration::hours(2);

        cache.put_at(&key, SNIPPET, first).unwrap();
        cache.get(&key).unwrap();
        cache.get(&key).unwrap();
        let usage_path = entry_path(&temp_dir, &key, "usage");
        let stale_usage = std::fs::read(&usage_path).unwrap();

        // a hit that loaded before the invalidate writes its usage afterwards
        assert!(cache.invalidate(&key));
        std::fs::write(&usage_path, &stale_usage).unwrap();
        assert!(cache.get(&key).is_none());

        cache.put_at(&key, "let result = #{ success: true, data: [2] };", first + Duration::hours(1)).unwrap();
        std::fs::write(&usage_path, &stale_usage).unwrap();
        let entry = cache.get(&key).unwrap();
        assert_eq!(entry.hit_count, 1);
        assert!(entry.code_text.contains("[2]"));
    }
}
