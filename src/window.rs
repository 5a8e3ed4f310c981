//! Windowed navigation over a document's block sequence.
//!
//! A [`DocumentWindow`] is an immutable snapshot of a bounded sub-range
//! of blocks with boundary flags; the [`Windower`] carves documents into
//! windows, steps between them, and anchors windows on matching text or
//! a block id. Windows never mutate the document, and stepping past a
//! boundary yields `None` rather than an error.

use serde::Serialize;

use crate::config::WindowConfig;
use crate::models::{Block, Document};

/// A bounded view into a document's block sequence.
///
/// `offset` and `limit` define a half-open range clamped to the
/// document; `blocks` is the materialized slice for that range.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentWindow {
    pub document_id: String,
    pub document_title: String,
    pub offset: usize,
    pub limit: usize,
    pub total_blocks: usize,
    pub blocks: Vec<Block>,
    pub has_previous: bool,
    pub has_next: bool,
}

impl DocumentWindow {
    pub fn start_index(&self) -> usize {
        self.offset
    }

    /// Exclusive end of the range.
    pub fn end_index(&self) -> usize {
        (self.offset + self.limit).min(self.total_blocks)
    }

    pub fn is_first_window(&self) -> bool {
        self.offset == 0
    }

    pub fn is_last_window(&self) -> bool {
        self.offset + self.limit >= self.total_blocks
    }

    /// Flat Markdown rendering of the window content.
    pub fn to_markdown(&self) -> String {
        let mut lines = vec![format!(
            "# {} (blocks {}-{} of {})",
            self.document_title,
            self.start_index(),
            self.end_index(),
            self.total_blocks
        )];

        for block in &self.blocks {
            let line = match block.block_type.as_str() {
                t if t.starts_with("heading_") => {
                    let level: usize = t
                        .rsplit('_')
                        .next()
                        .and_then(|n| n.parse().ok())
                        .unwrap_or(1);
                    // One deeper than the window title.
                    format!("{} {}", "#".repeat(level + 1), block.content)
                }
                "bulleted_list_item" => format!("- {}", block.content),
                "numbered_list_item" => format!("1. {}", block.content),
                "code" => format!("```\n{}\n```", block.content),
                "quote" => format!("> {}", block.content),
                "divider" => "---".to_string(),
                _ => block.content.clone(),
            };
            lines.push(line);
        }

        if self.has_next {
            lines.push("\n---\n*More content available in next window*".to_string());
        }

        lines.join("\n")
    }
}

/// Creates and steps windows over documents.
pub struct Windower {
    default_window_size: usize,
}

impl Windower {
    pub fn new(config: &WindowConfig) -> Self {
        Self {
            default_window_size: config.default_size.max(1),
        }
    }

    pub fn default_window_size(&self) -> usize {
        self.default_window_size
    }

    fn resolve(&self, size: Option<usize>) -> usize {
        size.unwrap_or(self.default_window_size).max(1)
    }

    /// Window starting at `offset`, clamped into the document's range.
    pub fn create_window(
        &self,
        document: &Document,
        offset: usize,
        limit: Option<usize>,
    ) -> DocumentWindow {
        let limit = self.resolve(limit);
        let total = document.blocks.len();

        let offset = if offset >= total {
            total.saturating_sub(limit)
        } else {
            offset
        };

        let end = (offset + limit).min(total);

        DocumentWindow {
            document_id: document.id.clone(),
            document_title: document.title.clone(),
            offset,
            limit,
            total_blocks: total,
            blocks: document.blocks[offset..end].to_vec(),
            has_previous: offset > 0,
            has_next: end < total,
        }
    }

    /// The window after `current`, or `None` at the end boundary.
    pub fn next_window(
        &self,
        current: &DocumentWindow,
        document: &Document,
    ) -> Option<DocumentWindow> {
        if !current.has_next {
            return None;
        }
        Some(self.create_window(document, current.offset + current.limit, Some(current.limit)))
    }

    /// The window before `current`, or `None` at the start boundary.
    pub fn previous_window(
        &self,
        current: &DocumentWindow,
        document: &Document,
    ) -> Option<DocumentWindow> {
        if !current.has_previous {
            return None;
        }
        Some(self.create_window(
            document,
            current.offset.saturating_sub(current.limit),
            Some(current.limit),
        ))
    }

    /// All windows over the document, in order.
    pub fn windows<'a>(
        &'a self,
        document: &'a Document,
        size: Option<usize>,
    ) -> impl Iterator<Item = DocumentWindow> + 'a {
        let size = self.resolve(size);
        (0..document.blocks.len())
            .step_by(size)
            .map(move |offset| self.create_window(document, offset, Some(size)))
    }

    /// Window anchored on the first block whose content contains `text`,
    /// with `context_blocks` blocks of leading context (clamped).
    /// `None` when the text is absent from every block.
    pub fn find_text_window(
        &self,
        document: &Document,
        text: &str,
        window_size: Option<usize>,
        case_sensitive: bool,
        context_blocks: usize,
    ) -> Option<DocumentWindow> {
        let needle = if case_sensitive {
            text.to_string()
        } else {
            text.to_lowercase()
        };

        let index = document.blocks.iter().position(|b| {
            if case_sensitive {
                b.content.contains(&needle)
            } else {
                b.content.to_lowercase().contains(&needle)
            }
        })?;

        let offset = index.saturating_sub(context_blocks);
        Some(self.create_window(document, offset, window_size))
    }

    /// Window anchored on a block id, with leading context. `None` when
    /// the id is absent.
    pub fn find_block_window(
        &self,
        document: &Document,
        block_id: &str,
        window_size: Option<usize>,
        context_blocks: usize,
    ) -> Option<DocumentWindow> {
        let index = document.blocks.iter().position(|b| b.id == block_id)?;
        let offset = index.saturating_sub(context_blocks);
        Some(self.create_window(document, offset, window_size))
    }
}
