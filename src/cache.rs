//! On-disk document snapshot cache.
//!
//! One JSON file per document id under a scope-hashed subdirectory of
//! the configured cache root, plus a `documents.json` file for the
//! cheap document listing. Entries carry the normalized metadata and
//! block list — never the built tree, which is rebuilt on load.
//!
//! Freshness is the file's write timestamp compared against the
//! configured max age. An expired entry reads as a miss but stays on
//! disk; only an overwrite or an explicit clear removes files. Writes go
//! through a temp file and an atomic rename so a reader never observes a
//! half-written entry.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::CacheConfig;
use crate::error::Result;
use crate::models::{Block, Document, DocumentSummary};

const LIST_FILE: &str = "documents.json";

/// Snapshot envelope written to disk for one document.
#[derive(Debug, Serialize, Deserialize)]
struct DocumentEntry {
    metadata: EntryMetadata,
    blocks: Vec<Block>,
}

#[derive(Debug, Serialize, Deserialize)]
struct EntryMetadata {
    id: String,
    title: String,
    created_time: DateTime<Utc>,
    last_edited_time: DateTime<Utc>,
    #[serde(default)]
    last_fetched: Option<DateTime<Utc>>,
    #[serde(default)]
    source_id: Option<String>,
}

/// Envelope for the cached document listing.
#[derive(Debug, Serialize, Deserialize)]
struct ListEntry {
    last_fetched: DateTime<Utc>,
    documents: Vec<DocumentSummary>,
}

/// Observational cache report, no side effects.
#[derive(Debug, Clone, Serialize)]
pub struct CacheInfo {
    pub enabled: bool,
    pub directory: PathBuf,
    pub max_age_days: Option<f64>,
    pub file_count: usize,
    pub total_size_bytes: u64,
}

/// Manages the per-source snapshot cache directory.
pub struct CacheManager {
    enabled: bool,
    directory: PathBuf,
    max_age: Option<Duration>,
    max_age_days: Option<f64>,
}

impl CacheManager {
    /// Build a manager from the config snapshot and a scope label.
    ///
    /// The scope (typically the source name) is hashed into a
    /// subdirectory so caches for different sources never collide.
    pub fn new(config: &CacheConfig, scope: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(scope.as_bytes());
        let scope_hash = format!("{:x}", hasher.finalize());

        Self {
            enabled: config.enabled,
            directory: config.directory.join(&scope_hash[..8]),
            max_age: config
                .max_age_days
                .map(|days| Duration::from_secs_f64(days * 24.0 * 60.0 * 60.0)),
            max_age_days: config.max_age_days,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn document_path(&self, document_id: &str) -> PathBuf {
        self.directory.join(format!("{}.json", document_id))
    }

    fn ensure_directory(&self) -> Result<()> {
        if !self.directory.exists() {
            std::fs::create_dir_all(&self.directory)?;
            info!(directory = %self.directory.display(), "created cache directory");
        }
        Ok(())
    }

    /// Write a file atomically: temp file in the same directory, then
    /// rename into place.
    fn write_atomic(&self, path: &Path, bytes: &[u8]) -> Result<()> {
        let tmp = path.with_extension(format!("json.tmp-{}", Uuid::new_v4()));
        std::fs::write(&tmp, bytes)?;
        if let Err(e) = std::fs::rename(&tmp, path) {
            std::fs::remove_file(&tmp).ok();
            return Err(e.into());
        }
        Ok(())
    }

    /// True when the file at `path` is older than the configured max age.
    fn is_expired(&self, path: &Path) -> bool {
        let Some(max_age) = self.max_age else {
            return false;
        };
        let modified = std::fs::metadata(path)
            .and_then(|m| m.modified())
            .unwrap_or(SystemTime::UNIX_EPOCH);
        match modified.elapsed() {
            Ok(age) => age > max_age,
            // Clock skew puts the write in the future; treat as fresh.
            Err(_) => false,
        }
    }

    /// Persist a document snapshot. No-op when caching is disabled.
    /// Concurrent writers for the same id are last-write-wins.
    pub fn cache_document(&self, document: &Document) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }
        self.ensure_directory()?;

        let entry = DocumentEntry {
            metadata: EntryMetadata {
                id: document.id.clone(),
                title: document.title.clone(),
                created_time: document.created_time,
                last_edited_time: document.last_edited_time,
                last_fetched: document.last_fetched,
                source_id: document.source_id.clone(),
            },
            blocks: document.blocks.clone(),
        };

        let bytes = serde_json::to_vec_pretty(&entry)?;
        self.write_atomic(&self.document_path(&document.id), &bytes)?;
        debug!(document_id = %document.id, "cached document");
        Ok(())
    }

    /// Read a cached document. `Ok(None)` for absent, expired, or
    /// unreadable entries — a miss, not an error. Expired entries are
    /// not deleted here.
    pub fn get_cached_document(&self, document_id: &str) -> Result<Option<Document>> {
        if !self.enabled {
            return Ok(None);
        }

        let path = self.document_path(document_id);
        if !path.exists() {
            debug!(document_id, "cache miss");
            return Ok(None);
        }
        if self.is_expired(&path) {
            debug!(document_id, "cache entry expired");
            return Ok(None);
        }

        let bytes = std::fs::read(&path)?;
        let entry: DocumentEntry = match serde_json::from_slice(&bytes) {
            Ok(entry) => entry,
            Err(e) => {
                // A corrupt entry reads as a miss; the next write replaces it.
                warn!(document_id, error = %e, "unreadable cache entry");
                return Ok(None);
            }
        };

        debug!(document_id, "cache hit");
        Ok(Some(Document {
            id: entry.metadata.id,
            title: entry.metadata.title,
            created_time: entry.metadata.created_time,
            last_edited_time: entry.metadata.last_edited_time,
            last_fetched: entry.metadata.last_fetched,
            source_id: entry.metadata.source_id,
            blocks: entry.blocks,
        }))
    }

    /// Persist the cheap document listing.
    pub fn cache_document_list(&self, documents: &[DocumentSummary]) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }
        self.ensure_directory()?;

        let entry = ListEntry {
            last_fetched: Utc::now(),
            documents: documents.to_vec(),
        };
        let bytes = serde_json::to_vec_pretty(&entry)?;
        self.write_atomic(&self.directory.join(LIST_FILE), &bytes)?;
        debug!(count = documents.len(), "cached document list");
        Ok(())
    }

    /// Read the cached document listing, with the same freshness rules
    /// as per-document entries.
    pub fn get_cached_document_list(&self) -> Result<Option<Vec<DocumentSummary>>> {
        if !self.enabled {
            return Ok(None);
        }

        let path = self.directory.join(LIST_FILE);
        if !path.exists() || self.is_expired(&path) {
            return Ok(None);
        }

        let bytes = std::fs::read(&path)?;
        match serde_json::from_slice::<ListEntry>(&bytes) {
            Ok(entry) => Ok(Some(entry.documents)),
            Err(e) => {
                warn!(error = %e, "unreadable document list cache");
                Ok(None)
            }
        }
    }

    /// Remove one document's entry. Absent entries are fine.
    pub fn clear_document_cache(&self, document_id: &str) -> Result<()> {
        let path = self.document_path(document_id);
        match std::fs::remove_file(&path) {
            Ok(()) => {
                debug!(document_id, "cleared cache entry");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Delete every entry under the cache directory. Must not fail when
    /// the directory is empty or absent.
    pub fn clear_cache(&self) -> Result<()> {
        if !self.directory.exists() {
            return Ok(());
        }
        let mut removed = 0usize;
        for entry in std::fs::read_dir(&self.directory)? {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                std::fs::remove_file(entry.path())?;
                removed += 1;
            }
        }
        info!(removed, "cache cleared");
        Ok(())
    }

    /// Report cache state: purely observational.
    pub fn get_cache_info(&self) -> CacheInfo {
        let mut file_count = 0usize;
        let mut total_size_bytes = 0u64;

        if let Ok(entries) = std::fs::read_dir(&self.directory) {
            for entry in entries.flatten() {
                if let Ok(meta) = entry.metadata() {
                    if meta.is_file() {
                        file_count += 1;
                        total_size_bytes += meta.len();
                    }
                }
            }
        }

        CacheInfo {
            enabled: self.enabled,
            directory: self.directory.clone(),
            max_age_days: self.max_age_days,
            file_count,
            total_size_bytes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn test_config(dir: &Path, max_age_days: Option<f64>) -> CacheConfig {
        CacheConfig {
            enabled: true,
            directory: dir.to_path_buf(),
            max_age_days,
        }
    }

    fn sample_document(id: &str) -> Document {
        Document {
            id: id.to_string(),
            title: format!("Title of {}", id),
            created_time: Utc::now(),
            last_edited_time: Utc::now(),
            last_fetched: Some(Utc::now()),
            source_id: None,
            blocks: vec![Block {
                id: format!("{}-b1", id),
                block_type: "paragraph".to_string(),
                content: "cached content".to_string(),
                parent_id: None,
                has_children: false,
                indent_level: 0,
            }],
        }
    }

    #[test]
    fn test_roundtrip_before_expiry() {
        let tmp = TempDir::new().unwrap();
        let cache = CacheManager::new(&test_config(tmp.path(), Some(30.0)), "test");

        let doc = sample_document("d1");
        cache.cache_document(&doc).unwrap();

        let cached = cache.get_cached_document("d1").unwrap().unwrap();
        assert_eq!(cached.id, doc.id);
        assert_eq!(cached.title, doc.title);
        assert_eq!(cached.blocks, doc.blocks);
    }

    #[test]
    fn test_absent_is_miss() {
        let tmp = TempDir::new().unwrap();
        let cache = CacheManager::new(&test_config(tmp.path(), None), "test");
        assert!(cache.get_cached_document("nope").unwrap().is_none());
    }

    #[test]
    fn test_expired_is_miss_but_not_deleted() {
        let tmp = TempDir::new().unwrap();
        let doc = sample_document("d1");

        // Write with a permissive manager, read back with max age zero:
        // any nonzero entry age is past the cutoff.
        let writer = CacheManager::new(&test_config(tmp.path(), None), "test");
        writer.cache_document(&doc).unwrap();

        let reader = CacheManager::new(&test_config(tmp.path(), Some(0.0)), "test");
        std::thread::sleep(Duration::from_millis(20));
        assert!(reader.get_cached_document("d1").unwrap().is_none());

        // The entry file remains on disk after the expired read.
        assert_eq!(reader.get_cache_info().file_count, 1);
    }

    #[test]
    fn test_clear_cache_then_miss() {
        let tmp = TempDir::new().unwrap();
        let cache = CacheManager::new(&test_config(tmp.path(), None), "test");

        cache.cache_document(&sample_document("d1")).unwrap();
        cache.cache_document(&sample_document("d2")).unwrap();
        assert_eq!(cache.get_cache_info().file_count, 2);

        cache.clear_cache().unwrap();
        assert!(cache.get_cached_document("d1").unwrap().is_none());
        assert!(cache.get_cached_document("d2").unwrap().is_none());
        assert_eq!(cache.get_cache_info().file_count, 0);

        // Clearing an already-empty (or absent) directory succeeds.
        cache.clear_cache().unwrap();
    }

    #[test]
    fn test_overwrite_supersedes() {
        let tmp = TempDir::new().unwrap();
        let cache = CacheManager::new(&test_config(tmp.path(), None), "test");

        let mut doc = sample_document("d1");
        cache.cache_document(&doc).unwrap();

        doc.blocks[0].content = "revised content".to_string();
        cache.cache_document(&doc).unwrap();

        let cached = cache.get_cached_document("d1").unwrap().unwrap();
        assert_eq!(cached.blocks[0].content, "revised content");
        assert_eq!(cache.get_cache_info().file_count, 1);
    }

    #[test]
    fn test_disabled_cache_never_hits() {
        let tmp = TempDir::new().unwrap();
        let config = CacheConfig {
            enabled: false,
            directory: tmp.path().to_path_buf(),
            max_age_days: None,
        };
        let cache = CacheManager::new(&config, "test");

        cache.cache_document(&sample_document("d1")).unwrap();
        assert!(cache.get_cached_document("d1").unwrap().is_none());
        assert!(!cache.get_cache_info().enabled);
        assert_eq!(cache.get_cache_info().file_count, 0);
    }

    #[test]
    fn test_corrupt_entry_is_miss() {
        let tmp = TempDir::new().unwrap();
        let cache = CacheManager::new(&test_config(tmp.path(), None), "test");
        cache.cache_document(&sample_document("d1")).unwrap();

        let path = cache.document_path("d1");
        std::fs::write(&path, b"{ not json").unwrap();
        assert!(cache.get_cached_document("d1").unwrap().is_none());
    }

    #[test]
    fn test_document_list_roundtrip() {
        let tmp = TempDir::new().unwrap();
        let cache = CacheManager::new(&test_config(tmp.path(), None), "test");

        assert!(cache.get_cached_document_list().unwrap().is_none());

        let summaries = vec![DocumentSummary {
            id: "d1".to_string(),
            title: "One".to_string(),
            created_time: Utc::now(),
            last_edited_time: Utc::now(),
        }];
        cache.cache_document_list(&summaries).unwrap();

        let cached = cache.get_cached_document_list().unwrap().unwrap();
        assert_eq!(cached.len(), 1);
        assert_eq!(cached[0].id, "d1");
    }

    #[test]
    fn test_scopes_do_not_collide() {
        let tmp = TempDir::new().unwrap();
        let a = CacheManager::new(&test_config(tmp.path(), None), "alpha");
        let b = CacheManager::new(&test_config(tmp.path(), None), "beta");

        a.cache_document(&sample_document("d1")).unwrap();
        assert!(a.get_cached_document("d1").unwrap().is_some());
        assert!(b.get_cached_document("d1").unwrap().is_none());
    }
}
