use chrono::Utc;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use super::types::{CacheError, CacheFile, CacheMetadata};

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Content-addressed file store shared by the response and code caches.
///
/// Every entry lives in its own file named by a SHA-256 key and sharded by the
/// first two hex characters. Payloads are bincode-encoded and lz4-compressed.
/// Writes go to a temp file in the same directory and are renamed into place,
/// so a reader sees either the previous entry or the new one.
#[derive(Debug)]
pub struct FileCache {
    cache_dir: PathBuf,
    extension: &'static str,
}

impl FileCache {
    /// Create a new file cache
    pub fn new(cache_dir: PathBuf, extension: &'static str) -> Result<Self, CacheError> {
        fs::create_dir_all(&cache_dir)?;
        Ok(Self {
            cache_dir,
            extension,
        })
    }

    pub fn directory(&self) -> &Path {
        &self.cache_dir
    }

    /// Compute a SHA256 key over the given parts
    pub fn hash_key(parts: &[&str]) -> String {
        let mut hasher = Sha256::new();
        for part in parts {
            hasher.update(part.as_bytes());
            // separator keeps ("ab","c") and ("a","bc") apart
            hasher.update([0x1f]);
        }
        format!("{:x}", hasher.finalize())
    }

    /// Save data to cache with compression
    pub fn save<T>(&self, key: &str, data: &T) -> Result<(), CacheError>
    where
        T: serde::Serialize,
    {
        let serialized = bincode::serialize(data).map_err(|e| CacheError::Encode(e.to_string()))?;
        let original_size = serialized.len();

        let compressed = lz4::block::compress(&serialized, None, true)?;

        let entry = CacheFile {
            key: key.to_string(),
            metadata: CacheMetadata {
                written_at: Utc::now(),
                original_size: original_size as u64,
                compressed_size: compressed.len() as u64,
            },
            data: compressed,
        };
        let entry_data = bincode::serialize(&entry).map_err(|e| CacheError::Encode(e.to_string()))?;

        let cache_path = self.cache_path(key);
        if let Some(parent) = cache_path.parent() {
            fs::create_dir_all(parent)?;
        }
        write_atomic(&cache_path, &entry_data)?;

        Ok(())
    }

    /// Load data from cache
    pub fn load<T>(&self, key: &str) -> Result<Option<T>, CacheError>
    where
        T: serde::de::DeserializeOwned,
    {
        let cache_path = self.cache_path(key);

        let entry_data = match fs::read(&cache_path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let corrupt = |reason: String| CacheError::Corrupt {
            key: key.to_string(),
            reason,
        };

        let entry: CacheFile = bincode::deserialize(&entry_data).map_err(|e| corrupt(e.to_string()))?;
        if entry.key != key {
            return Err(corrupt(format!("file holds key {}", entry.key)));
        }

        let decompressed = lz4::block::decompress(&entry.data, None).map_err(|e| corrupt(e.to_string()))?;
        if decompressed.len() as u64 != entry.metadata.original_size {
            return Err(corrupt("size mismatch after decompression".to_string()));
        }

        let data: T = bincode::deserialize(&decompressed).map_err(|e| corrupt(e.to_string()))?;
        Ok(Some(data))
    }

    /// Remove cache entry, reporting whether one existed
    pub fn remove(&self, key: &str) -> Result<bool, CacheError> {
        match fs::remove_file(self.cache_path(key)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// List the keys of every stored entry
    pub fn keys(&self) -> Result<Vec<String>, CacheError> {
        let mut keys = Vec::new();
        for shard in fs::read_dir(&self.cache_dir)? {
            let shard = shard?;
            if !shard.path().is_dir() {
                continue;
            }
            for cache_file in fs::read_dir(shard.path())? {
                let path = cache_file?.path();
                if path.extension().and_then(|e| e.to_str()) != Some(self.extension) {
                    continue;
                }
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    keys.push(stem.to_string());
                }
            }
        }
        keys.sort();
        Ok(keys)
    }

    /// Remove every entry, returning how many were deleted
    pub fn clear(&self) -> Result<usize, CacheError> {
        let mut removed = 0;
        for key in self.keys()? {
            if self.remove(&key)? {
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Total bytes on disk across all entries
    pub fn total_size(&self) -> Result<u64, CacheError> {
        let mut total = 0;
        for key in self.keys()? {
            if let Ok(metadata) = fs::metadata(self.cache_path(&key)) {
                total += metadata.len();
            }
        }
        Ok(total)
    }

    /// Generate cache file path for a key
    fn cache_path(&self, key: &str) -> PathBuf {
        // Use first 2 chars of the key for directory sharding
        let shard = key.get(..2).unwrap_or("00");
        self.cache_dir
            .join(shard)
            .join(format!("{}.{}", key, self.extension))
    }
}

/// Write content atomically by writing to a temp file first, then renaming.
fn write_atomic(path: &Path, content: &[u8]) -> std::io::Result<()> {
    let unique = TEMP_COUNTER.fetch_add(1, Ordering::Relaxed);
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("entry");
    let tmp_path = path.with_file_name(format!(
        ".{}.{}.{}.tmp",
        file_name,
        std::process::id(),
        unique
    ));

    fs::write(&tmp_path, content)?;
    if let Err(err) = fs::rename(&tmp_path, path) {
        let _ = fs::remove_file(&tmp_path);
        return Err(err);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};
    use tempfile::TempDir;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Sample {
        name: String,
        values: Vec<u32>,
    }

    fn sample() -> Sample {
        Sample {
            name: "leaders".to_string(),
            values: vec![58, 54, 44],
        }
    }

    #[test]
    fn test_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let cache = FileCache::new(temp_dir.path().to_path_buf(), "bin").unwrap();
        let key = FileCache::hash_key(&["stats/leaders", "season=2024"]);

        cache.save(&key, &sample()).unwrap();
        let loaded: Option<Sample> = cache.load(&key).unwrap();
        assert_eq!(loaded, Some(sample()));
        assert_eq!(cache.keys().unwrap(), vec![key.clone()]);

        assert!(cache.remove(&key).unwrap());
        assert!(!cache.remove(&key).unwrap());
        assert!(cache.load::<Sample>(&key).unwrap().is_none());
    }

    #[test]
    fn test_hash_key_separates_parts() {
        assert_ne!(FileCache::hash_key(&["ab", "c"]), FileCache::hash_key(&["a", "bc"]));
        assert_eq!(FileCache::hash_key(&["x"]), FileCache::hash_key(&["x"]));
    }

    #[test]
    fn test_garbage_is_reported_as_corruption() {
        let temp_dir = TempDir::new().unwrap();
        let cache = FileCache::new(temp_dir.path().to_path_buf(), "bin").unwrap();
        let key = FileCache::hash_key(&["broken"]);
        cache.save(&key, &sample()).unwrap();

        fs::write(cache.cache_path(&key), b"not a cache file").unwrap();
        match cache.load::<Sample>(&key) {
            Err(CacheError::Corrupt { key: k, .. }) => assert_eq!(k, key),
            other => panic!("expected corruption, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_overwrite_leaves_no_temp_files() {
        let temp_dir = TempDir::new().unwrap();
        let cache = FileCache::new(temp_dir.path().to_path_buf(), "bin").unwrap();
        let key = FileCache::hash_key(&["overwrite"]);

        for round in 0..5u32 {
            cache
                .save(&key, &Sample { name: format!("round {}", round), values: vec![round] })
                .unwrap();
        }
        let loaded: Sample = cache.load(&key).unwrap().unwrap();
        assert_eq!(loaded.values, vec![4]);

        let shard = cache.cache_path(&key).parent().unwrap().to_path_buf();
        let leftovers = fs::read_dir(shard)
            .unwrap()
            .filter(|e| e.as_ref().unwrap().path().extension().and_then(|x| x.to_str()) == Some("tmp"))
            .count();
        assert_eq!(leftovers, 0);
        assert_eq!(cache.clear().unwrap(), 1);
    }
}
