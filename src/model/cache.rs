//! On-disk cache of resolved track IDs
//!
//! The whole mapping lives in memory and is rewritten as a single JSON
//! snapshot after every change. A `null` value records a lookup that found
//! nothing, so it is never repeated.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Mapping from `artist|title` keys to a Spotify track ID, or `None` when
/// the lookup already failed once.
pub type CacheEntries = BTreeMap<String, Option<String>>;

/// Persistent (artist, title) -> track ID store
#[derive(Debug)]
pub struct TrackCache {
    path: PathBuf,
    entries: CacheEntries,
}

impl TrackCache {
    /// Open the cache backed by `path`, starting empty if the file is
    /// missing or unreadable.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = Self::load(&path);
        tracing::info!(path = %path.display(), entries = entries.len(), "Track cache loaded");
        Self { path, entries }
    }

    /// Read a snapshot from disk. Never fails: a missing, unreadable or
    /// malformed file yields an empty mapping.
    pub fn load(path: &Path) -> CacheEntries {
        if !path.exists() {
            return CacheEntries::new();
        }

        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Could not read track cache, starting empty");
                return CacheEntries::new();
            }
        };

        match serde_json::from_str(&content) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Track cache is corrupt, starting empty");
                CacheEntries::new()
            }
        }
    }

    /// Write the full mapping to disk, creating the parent directory if
    /// needed. The snapshot goes to a sibling temp file first and is then
    /// renamed over the old one.
    pub fn save(&self) -> Result<()> {
        let persistence = |source: std::io::Error| Error::Persistence {
            path: self.path.clone(),
            source,
        };

        if let Some(dir) = self.path.parent() {
            if !dir.as_os_str().is_empty() && !dir.exists() {
                fs::create_dir_all(dir).map_err(persistence)?;
            }
        }

        let content = serde_json::to_string_pretty(&self.entries)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, content).map_err(persistence)?;
        if let Err(e) = fs::rename(&tmp, &self.path) {
            let _ = fs::remove_file(&tmp);
            return Err(persistence(e));
        }

        tracing::trace!(path = %self.path.display(), entries = self.entries.len(), "Track cache saved");
        Ok(())
    }

    /// Cached outcome for `key`: `Some(None)` is a remembered miss.
    pub fn get(&self, key: &str) -> Option<&Option<String>> {
        self.entries.get(key)
    }

    /// Store an outcome and persist it before returning.
    ///
    /// If the snapshot cannot be written the in-memory mapping is rolled
    /// back, so nothing is ever served that is not also on disk.
    pub fn record(&mut self, key: String, value: Option<String>) -> Result<()> {
        let previous = self.entries.insert(key.clone(), value);

        if let Err(e) = self.save() {
            match previous {
                Some(old) => self.entries.insert(key, old),
                None => self.entries.remove(&key),
            };
            return Err(e);
        }
        Ok(())
    }

    pub fn entries(&self) -> &CacheEntries {
        &self.entries
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn cache_in(dir: &TempDir) -> TrackCache {
        TrackCache::open(dir.path().join("cache").join("track_cache.json"))
    }

    #[test]
    fn missing_file_starts_empty() {
        let dir = TempDir::new().unwrap();
        let cache = cache_in(&dir);
        assert!(cache.is_empty());
    }

    #[test]
    fn corrupt_file_starts_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("track_cache.json");
        fs::write(&path, "{ not json").unwrap();

        assert!(TrackCache::load(&path).is_empty());
    }

    #[test]
    fn wrong_shape_starts_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("track_cache.json");
        fs::write(&path, r#"["a", "b"]"#).unwrap();

        assert!(TrackCache::load(&path).is_empty());
    }

    #[test]
    fn record_creates_parent_dir_and_persists() {
        let dir = TempDir::new().unwrap();
        let mut cache = cache_in(&dir);

        cache
            .record("the beatles|let it be".to_string(), Some("abc123".to_string()))
            .unwrap();
        cache.record("nobody|nothing".to_string(), None).unwrap();

        let on_disk = TrackCache::load(cache.path());
        assert_eq!(on_disk.get("the beatles|let it be"), Some(&Some("abc123".to_string())));
        assert_eq!(on_disk.get("nobody|nothing"), Some(&None));
    }

    #[test]
    fn negative_entries_are_written_as_null() {
        let dir = TempDir::new().unwrap();
        let mut cache = cache_in(&dir);
        cache.record("unknown artist|unknown track".to_string(), None).unwrap();

        let raw = fs::read_to_string(cache.path()).unwrap();
        let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert!(json["unknown artist|unknown track"].is_null());
    }

    #[test]
    fn reopen_sees_previous_snapshot() {
        let dir = TempDir::new().unwrap();
        let mut cache = cache_in(&dir);
        cache.record("a|b".to_string(), Some("id1".to_string())).unwrap();
        cache.record("c|d".to_string(), None).unwrap();

        let reopened = cache_in(&dir);
        assert_eq!(reopened.entries(), cache.entries());
    }

    #[test]
    fn save_of_loaded_file_leaves_content_unchanged() {
        let dir = TempDir::new().unwrap();
        let mut cache = cache_in(&dir);
        cache.record("x|y".to_string(), Some("id".to_string())).unwrap();
        cache.record("p|q".to_string(), None).unwrap();
        let before = fs::read_to_string(cache.path()).unwrap();

        let reopened = cache_in(&dir);
        reopened.save().unwrap();
        let after = fs::read_to_string(reopened.path()).unwrap();

        assert_eq!(before, after);
    }

    #[test]
    fn failed_write_rolls_back_memory() {
        let dir = TempDir::new().unwrap();
        // A regular file where the cache directory should be makes
        // create_dir_all fail.
        let blocker = dir.path().join("blocked");
        fs::write(&blocker, "").unwrap();
        let mut cache = TrackCache::open(blocker.join("track_cache.json"));

        let result = cache.record("a|b".to_string(), Some("id".to_string()));

        assert!(matches!(result, Err(Error::Persistence { .. })));
        assert!(cache.get("a|b").is_none());
    }

    #[test]
    fn failed_rename_removes_temp_file() {
        let dir = TempDir::new().unwrap();
        // The snapshot path is a directory, so the temp file is written
        // but cannot replace it.
        let path = dir.path().join("track_cache.json");
        fs::create_dir(&path).unwrap();
        fs::write(path.join("keep"), "").unwrap();
        let mut cache = TrackCache::open(&path);

        let result = cache.record("a|b".to_string(), Some("id".to_string()));

        assert!(matches!(result, Err(Error::Persistence { .. })));
        assert!(!dir.path().join("track_cache.json.tmp").exists());
        assert!(cache.is_empty());
    }
}
