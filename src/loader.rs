//! Cache-then-source document retrieval.
//!
//! [`DocumentLoader`] coordinates the full fetch flow: cache lookup →
//! rate-limited source call → normalization → cache write. It is written
//! against the [`DocumentSource`] trait only; the lazy layer and callers
//! share one loader per source.

use chrono::Utc;
use std::sync::Arc;
use tracing::debug;

use crate::cache::{CacheInfo, CacheManager};
use crate::config::Config;
use crate::error::Result;
use crate::models::{Document, DocumentSummary};
use crate::ratelimit::RateLimiter;
use crate::source::{normalize_blocks, DocumentSource};

pub struct DocumentLoader {
    source: Arc<dyn DocumentSource>,
    cache: CacheManager,
    rate_limiter: RateLimiter,
}

impl DocumentLoader {
    /// Build a loader for one source. The cache is scoped to the
    /// source's name so two sources never share entries.
    pub fn new(config: &Config, source: Arc<dyn DocumentSource>) -> Self {
        let cache = CacheManager::new(&config.cache, source.name());
        let rate_limiter = RateLimiter::new(&config.rate_limit);
        Self {
            source,
            cache,
            rate_limiter,
        }
    }

    pub fn source(&self) -> &Arc<dyn DocumentSource> {
        &self.source
    }

    pub fn cache_info(&self) -> CacheInfo {
        self.cache.get_cache_info()
    }

    /// Enumerate documents, serving the listing from cache when fresh.
    pub async fn list_documents(&self) -> Result<Vec<DocumentSummary>> {
        if let Some(cached) = self.cache.get_cached_document_list()? {
            debug!(count = cached.len(), "document list served from cache");
            return Ok(cached);
        }

        self.rate_limiter.wait_if_needed().await;
        let summaries = self.source.list_documents().await?;
        self.cache.cache_document_list(&summaries)?;
        Ok(summaries)
    }

    /// Retrieve a document with its normalized block list, consulting
    /// the cache first.
    pub async fn get_document(&self, document_id: &str) -> Result<Document> {
        if let Some(cached) = self.cache.get_cached_document(document_id)? {
            debug!(document_id, "document served from cache");
            return Ok(cached);
        }
        self.fetch_document(document_id).await
    }

    /// Retrieve a document from the source unconditionally, superseding
    /// any cached entry.
    pub async fn refresh_document(&self, document_id: &str) -> Result<Document> {
        self.fetch_document(document_id).await
    }

    async fn fetch_document(&self, document_id: &str) -> Result<Document> {
        // The listing supplies title and timestamps; a source that does
        // not know the id surfaces DocumentNotFound from fetch_blocks.
        let summary = self
            .list_documents()
            .await?
            .into_iter()
            .find(|s| s.id == document_id);

        self.rate_limiter.wait_if_needed().await;
        let raw = self.source.fetch_blocks(document_id).await?;
        let blocks = normalize_blocks(raw);
        debug!(document_id, blocks = blocks.len(), "fetched from source");

        let (title, created_time, last_edited_time) = match summary {
            Some(s) => (s.title, s.created_time, s.last_edited_time),
            None => (document_id.to_string(), Utc::now(), Utc::now()),
        };

        let document = Document {
            id: document_id.to_string(),
            title,
            created_time,
            last_edited_time,
            last_fetched: Some(Utc::now()),
            source_id: Some(self.source.name().to_string()),
            blocks,
        };

        self.cache.cache_document(&document)?;
        Ok(document)
    }

    /// Remove one document's cache entry.
    pub fn invalidate(&self, document_id: &str) -> Result<()> {
        self.cache.clear_document_cache(document_id)
    }

    /// Remove every cache entry for this source.
    pub fn clear_cache(&self) -> Result<()> {
        self.cache.clear_cache()
    }
}
