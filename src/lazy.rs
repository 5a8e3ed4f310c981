//! Lazy document handles and the collection managing them.
//!
//! A [`LazyDocument`] carries listing metadata from construction and
//! defers the block fetch until [`ensure_loaded`](LazyDocument::ensure_loaded)
//! runs — once. Metadata reads never trigger loading; every block-derived
//! accessor is async and loads explicitly, so the suspension points are
//! visible at the call site rather than hidden inside a getter.
//!
//! [`LazyDocumentCollection`] preloads metadata stubs for every listed
//! document and adds batch operations on top: search (content search
//! opts into the loading cost), concurrent preload with per-item
//! isolation, and content clearing to free memory.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::loader::DocumentLoader;
use crate::models::{Block, Document, DocumentSummary};
use crate::tree::Tree;

/// Observable load state of a [`LazyDocument`].
///
/// After [`LazyDocument::clear_content`] the state reads `Unloaded`
/// again while metadata stays populated — the metadata-only substate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    Unloaded,
    Loaded,
}

/// A document handle that fetches blocks on first content access.
pub struct LazyDocument {
    metadata: DocumentSummary,
    loader: Arc<DocumentLoader>,
    loaded: Option<Document>,
}

impl LazyDocument {
    /// Build a metadata-only handle. State starts `Unloaded`.
    pub fn from_summary(metadata: DocumentSummary, loader: Arc<DocumentLoader>) -> Self {
        Self {
            metadata,
            loader,
            loaded: None,
        }
    }

    fn from_document(document: Document, loader: Arc<DocumentLoader>) -> Self {
        Self {
            metadata: DocumentSummary {
                id: document.id.clone(),
                title: document.title.clone(),
                created_time: document.created_time,
                last_edited_time: document.last_edited_time,
            },
            loader,
            loaded: Some(document),
        }
    }

    // Metadata reads: never transition load state.

    pub fn id(&self) -> &str {
        &self.metadata.id
    }

    pub fn title(&self) -> &str {
        match &self.loaded {
            Some(doc) => &doc.title,
            None => &self.metadata.title,
        }
    }

    pub fn created_time(&self) -> chrono::DateTime<chrono::Utc> {
        self.metadata.created_time
    }

    pub fn last_edited_time(&self) -> chrono::DateTime<chrono::Utc> {
        self.metadata.last_edited_time
    }

    pub fn load_state(&self) -> LoadState {
        if self.loaded.is_some() {
            LoadState::Loaded
        } else {
            LoadState::Unloaded
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded.is_some()
    }

    /// The loaded blocks, or `None` while unloaded. Never fetches.
    pub fn blocks(&self) -> Option<&[Block]> {
        self.loaded.as_ref().map(|d| d.blocks.as_slice())
    }

    /// The loaded document, or `None` while unloaded. Never fetches.
    pub fn document(&self) -> Option<&Document> {
        self.loaded.as_ref()
    }

    /// Perform the cache-then-source load, exactly once.
    ///
    /// Subsequent calls are pure reads. On failure the state stays
    /// `Unloaded` and a later call may retry.
    pub async fn ensure_loaded(&mut self) -> Result<()> {
        if self.loaded.is_some() {
            return Ok(());
        }
        debug!(document_id = %self.metadata.id, "lazy loading blocks");
        let document = self.loader.get_document(&self.metadata.id).await?;
        self.loaded = Some(document);
        Ok(())
    }

    /// Blocks, loading first if needed.
    pub async fn content(&mut self) -> Result<&[Block]> {
        self.ensure_loaded().await?;
        Ok(self.loaded.as_ref().unwrap().blocks.as_slice())
    }

    /// Build the document tree, loading first if needed. The tree is
    /// rebuilt per call; it is never cached on the handle.
    pub async fn build_tree(&mut self) -> Result<Tree> {
        self.ensure_loaded().await?;
        Ok(self.loaded.as_ref().unwrap().build_tree())
    }

    /// First `n` blocks, loading first if needed.
    pub async fn preview_blocks(&mut self, n: usize) -> Result<&[Block]> {
        self.ensure_loaded().await?;
        Ok(self.loaded.as_ref().unwrap().preview_blocks(n))
    }

    /// First `n_chars` characters of content, loading first if needed.
    pub async fn preview_text(&mut self, n_chars: usize) -> Result<String> {
        self.ensure_loaded().await?;
        Ok(self.loaded.as_ref().unwrap().preview_text(n_chars))
    }

    /// First `n` sentences of content, loading first if needed.
    pub async fn preview_sentences(&mut self, n: usize) -> Result<String> {
        self.ensure_loaded().await?;
        Ok(self.loaded.as_ref().unwrap().preview_sentences(n))
    }

    /// Free the block storage, keeping metadata. State reads `Unloaded`
    /// again and the next content access reloads.
    pub fn clear_content(&mut self) {
        self.loaded = None;
    }
}

/// Per-id result of a [`LazyDocumentCollection::batch_preload`] call.
#[derive(Debug)]
pub struct PreloadOutcome {
    pub document_id: String,
    /// Number of blocks loaded, or the error for this id alone.
    pub result: Result<usize>,
}

/// Collection of lazy documents indexed by id.
pub struct LazyDocumentCollection {
    loader: Arc<DocumentLoader>,
    documents: HashMap<String, LazyDocument>,
}

impl LazyDocumentCollection {
    /// Build the collection, preloading a metadata stub for every
    /// document the source lists. No block content is fetched.
    pub async fn new(loader: Arc<DocumentLoader>) -> Result<Self> {
        let summaries = loader.list_documents().await?;
        let mut documents = HashMap::with_capacity(summaries.len());
        for summary in summaries {
            let id = summary.id.clone();
            documents.insert(id, LazyDocument::from_summary(summary, Arc::clone(&loader)));
        }
        debug!(count = documents.len(), "preloaded document metadata");
        Ok(Self { loader, documents })
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Ids of all indexed documents, sorted.
    pub fn document_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.documents.keys().map(|s| s.as_str()).collect();
        ids.sort_unstable();
        ids
    }

    /// Look up a document handle by id.
    ///
    /// An id the index has never seen is fetched from the source once;
    /// an id the source does not know yields `None`.
    pub async fn get_document(&mut self, document_id: &str) -> Result<Option<&mut LazyDocument>> {
        if !self.documents.contains_key(document_id) {
            match self.loader.get_document(document_id).await {
                Ok(document) => {
                    let lazy = LazyDocument::from_document(document, Arc::clone(&self.loader));
                    self.documents.insert(document_id.to_string(), lazy);
                }
                Err(e) if e.is_not_found() => return Ok(None),
                Err(e) => return Err(e),
            }
        }
        Ok(self.documents.get_mut(document_id))
    }

    /// Search documents by title and/or content.
    ///
    /// Title search never triggers loading. Content search loads every
    /// candidate — callers opting in accept that cost. Matching is
    /// case-insensitive substring. A document whose load fails is
    /// skipped, not fatal.
    pub async fn search_documents(
        &mut self,
        query: &str,
        search_titles: bool,
        search_content: bool,
    ) -> Result<Vec<&LazyDocument>> {
        let query = query.to_lowercase();
        let mut ids: Vec<String> = self.documents.keys().cloned().collect();
        ids.sort_unstable();

        let mut matched: Vec<String> = Vec::new();
        for id in ids {
            let doc = self.documents.get_mut(&id).unwrap();

            if search_titles && doc.title().to_lowercase().contains(&query) {
                matched.push(id);
                continue;
            }

            if search_content {
                if let Err(e) = doc.ensure_loaded().await {
                    warn!(document_id = %id, error = %e, "skipping unloadable document in content search");
                    continue;
                }
                let hit = doc
                    .blocks()
                    .unwrap_or_default()
                    .iter()
                    .any(|b| b.content.to_lowercase().contains(&query));
                if hit {
                    matched.push(id);
                }
            }
        }

        Ok(matched
            .iter()
            .filter_map(|id| self.documents.get(id.as_str()))
            .collect())
    }

    /// Load several documents concurrently, one task per id, each under
    /// its own timeout. A failing or timed-out id never aborts its
    /// siblings; outcomes are reported per id in input order.
    pub async fn batch_preload(
        &mut self,
        document_ids: &[String],
        per_item_timeout: Duration,
    ) -> Vec<PreloadOutcome> {
        let mut set: JoinSet<(String, Result<Document>)> = JoinSet::new();

        for id in document_ids {
            let id = id.clone();
            let loader = Arc::clone(&self.loader);
            set.spawn(async move {
                let result = match tokio::time::timeout(per_item_timeout, loader.get_document(&id))
                    .await
                {
                    Ok(result) => result,
                    Err(_) => Err(Error::transient(format!("preload timed out for {}", id))),
                };
                (id, result)
            });
        }

        let mut by_id: HashMap<String, Result<usize>> = HashMap::new();
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((id, Ok(document))) => {
                    let count = document.blocks.len();
                    let lazy = LazyDocument::from_document(document, Arc::clone(&self.loader));
                    self.documents.insert(id.clone(), lazy);
                    by_id.insert(id, Ok(count));
                }
                Ok((id, Err(e))) => {
                    warn!(document_id = %id, error = %e, "batch preload item failed");
                    by_id.insert(id, Err(e));
                }
                Err(join_error) => {
                    warn!(error = %join_error, "batch preload task panicked");
                }
            }
        }

        document_ids
            .iter()
            .filter_map(|id| {
                by_id.remove(id).map(|result| PreloadOutcome {
                    document_id: id.clone(),
                    result,
                })
            })
            .collect()
    }

    /// Free loaded block storage across the collection.
    ///
    /// With `keep_metadata` the handles stay indexed in the
    /// metadata-only substate; without it the collection empties.
    pub fn clear_loaded_content(&mut self, keep_metadata: bool) {
        if keep_metadata {
            for doc in self.documents.values_mut() {
                doc.clear_content();
            }
        } else {
            self.documents.clear();
        }
    }
}
