//! Document source abstraction.
//!
//! A [`DocumentSource`] is anything that can enumerate documents and
//! fetch their raw block lists: a remote API client, a local directory,
//! a vault. The loader and cache are written once against this trait and
//! never against a concrete source type.
//!
//! Implementations must surface a distinguishable "not found"
//! ([`crate::Error::DocumentNotFound`]) versus transient-failure
//! ([`crate::Error::Remote`] with `transient = true`) outcome from
//! [`fetch_blocks`](DocumentSource::fetch_blocks).

use async_trait::async_trait;
use std::collections::HashMap;

use crate::error::Result;
use crate::models::{Block, DocumentSummary, SourceKind};

/// Raw block record as produced by a source, before normalization.
#[derive(Debug, Clone)]
pub struct RawBlock {
    pub id: String,
    pub block_type: String,
    pub content: String,
    pub parent_id: Option<String>,
    pub has_children: bool,
}

/// A source of documents that the loader can pull block lists from.
#[async_trait]
pub trait DocumentSource: Send + Sync {
    /// Source instance name (e.g. `"notes"`, `"workspace"`). Used as the
    /// cache scope label.
    fn name(&self) -> &str;

    /// Which kind of origin this source is.
    fn kind(&self) -> SourceKind;

    /// Enumerate available documents with their metadata. Cheap relative
    /// to fetching blocks; must not require per-document content reads.
    async fn list_documents(&self) -> Result<Vec<DocumentSummary>>;

    /// Fetch the ordered raw block list for one document.
    async fn fetch_blocks(&self, document_id: &str) -> Result<Vec<RawBlock>>;
}

/// Normalize raw source records into [`Block`] value objects.
///
/// Derives `indent_level` as the block's depth along its parent chain.
/// A block whose parent id is absent from the list sits at depth 0, as
/// does anything past a reference cycle (defensive cap at the list
/// length; malformed linkage is the tree builder's concern, not ours).
pub fn normalize_blocks(raw: Vec<RawBlock>) -> Vec<Block> {
    let parents: HashMap<&str, Option<&str>> = raw
        .iter()
        .map(|r| (r.id.as_str(), r.parent_id.as_deref()))
        .collect();

    let depth_of = |id: &str| -> u32 {
        let mut depth = 0u32;
        let mut current = id;
        while let Some(pid) = parents.get(current).copied().flatten() {
            // A dangling parent reference makes this block root-level.
            if !parents.contains_key(pid) {
                break;
            }
            depth += 1;
            if depth as usize > raw.len() {
                return 0;
            }
            current = pid;
        }
        depth
    };

    raw.iter()
        .map(|r| Block {
            id: r.id.clone(),
            block_type: r.block_type.clone(),
            content: r.content.clone(),
            parent_id: r.parent_id.clone(),
            has_children: r.has_children,
            indent_level: depth_of(&r.id),
        })
        .collect()
}
