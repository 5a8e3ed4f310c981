//! Core data models.
//!
//! These types represent the blocks, documents, and sources that flow
//! through the loading and caching pipeline. Blocks are immutable value
//! objects once constructed; tree structure lives in [`crate::tree`],
//! never on the document itself.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Atomic content unit of a document.
///
/// `parent_id` references another block id within the same document (or
/// `None` for root-level blocks). `has_children` is a hint from the
/// source and may disagree with the children actually present in the
/// list; tree construction trusts the linkage, not the hint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub id: String,
    #[serde(rename = "type")]
    pub block_type: String,
    pub content: String,
    #[serde(default)]
    pub parent_id: Option<String>,
    #[serde(default)]
    pub has_children: bool,
    /// Depth derived from parent linkage, for flat rendering.
    #[serde(default)]
    pub indent_level: u32,
}

/// Cheap listing record returned by `DocumentSource::list_documents`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentSummary {
    pub id: String,
    pub title: String,
    pub created_time: DateTime<Utc>,
    pub last_edited_time: DateTime<Utc>,
}

/// A document with metadata and an ordered block sequence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub title: String,
    pub created_time: DateTime<Utc>,
    pub last_edited_time: DateTime<Utc>,
    /// When the blocks were last fetched from the source; used by the
    /// cache layer.
    #[serde(default)]
    pub last_fetched: Option<DateTime<Utc>>,
    #[serde(default)]
    pub source_id: Option<String>,
    #[serde(default)]
    pub blocks: Vec<Block>,
}

impl Document {
    /// Build the hierarchy for this document's blocks.
    ///
    /// Pure and idempotent given the block list; if blocks change, call
    /// again rather than patching the previous tree.
    pub fn build_tree(&self) -> crate::tree::Tree {
        crate::tree::build_tree(&self.blocks)
    }

    /// The first `n` blocks of the document.
    pub fn preview_blocks(&self, n: usize) -> &[Block] {
        &self.blocks[..n.min(self.blocks.len())]
    }

    /// The first `n_chars` characters of the concatenated block content.
    pub fn preview_text(&self, n_chars: usize) -> String {
        let text = self
            .blocks
            .iter()
            .map(|b| b.content.as_str())
            .collect::<Vec<_>>()
            .join(" ");

        if text.chars().count() > n_chars {
            let truncated: String = text.chars().take(n_chars).collect();
            format!("{}...", truncated)
        } else {
            text
        }
    }

    /// The first `n` sentences of the concatenated block content.
    pub fn preview_sentences(&self, n: usize) -> String {
        let text = self
            .blocks
            .iter()
            .map(|b| b.content.as_str())
            .collect::<Vec<_>>()
            .join(" ");

        static SENTENCE_REGEX: std::sync::OnceLock<regex::Regex> = std::sync::OnceLock::new();
        let splitter = SENTENCE_REGEX
            .get_or_init(|| regex::Regex::new(r"(?s)(.*?[.!?])(?:\s+|$)").unwrap());
        let sentences: Vec<&str> = splitter
            .captures_iter(&text)
            .map(|c| c.get(1).unwrap().as_str())
            .collect();

        if sentences.is_empty() {
            return text;
        }

        let preview = sentences[..n.min(sentences.len())].join(" ");
        if sentences.len() > n {
            format!("{}...", preview)
        } else {
            preview
        }
    }

}

/// Kind of origin a [`Source`] represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    RemoteApi,
    LocalDirectory,
    Vault,
}

/// A named collection grouping documents from one origin.
///
/// References documents by id only; removal from a source's list does
/// not affect the document's lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Source {
    pub id: String,
    pub name: String,
    pub kind: SourceKind,
    #[serde(default)]
    pub documents: Vec<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    #[serde(default)]
    pub last_synced: Option<DateTime<Utc>>,
}

impl Source {
    pub fn new(name: impl Into<String>, kind: SourceKind) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            kind,
            documents: Vec::new(),
            metadata: HashMap::new(),
            last_synced: None,
        }
    }

    /// Record a document id under this source. Duplicates are ignored.
    pub fn add_document(&mut self, document_id: impl Into<String>) {
        let id = document_id.into();
        if !self.documents.iter().any(|d| *d == id) {
            self.documents.push(id);
        }
    }

    pub fn remove_document(&mut self, document_id: &str) {
        self.documents.retain(|d| d != document_id);
    }
}
