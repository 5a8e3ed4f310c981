//! Local-directory document source.
//!
//! Scans a root directory for Markdown and plain-text files and exposes
//! each file as a document whose raw blocks carry heading-scoped parent
//! linkage: blocks under a heading are its children, subheadings nest
//! under shallower headings, and nested list items nest under their
//! parent item. Listing is cheap (path + mtime only); file content is
//! read only by `fetch_blocks`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::config::DirectorySourceConfig;
use crate::error::{Error, Result};
use crate::models::{DocumentSummary, SourceKind};
use crate::source::{DocumentSource, RawBlock};

pub struct DirectorySource {
    name: String,
    config: DirectorySourceConfig,
}

struct ScannedFile {
    document_id: String,
    path: PathBuf,
    modified: DateTime<Utc>,
}

impl DirectorySource {
    pub fn new(name: impl Into<String>, config: DirectorySourceConfig) -> Self {
        Self {
            name: name.into(),
            config,
        }
    }

    fn scan(&self) -> Result<Vec<ScannedFile>> {
        let root = &self.config.root;
        if !root.exists() {
            return Err(Error::permanent(format!(
                "directory source root does not exist: {}",
                root.display()
            )));
        }

        let include_set = build_globset(&self.config.include_globs)?;
        let mut default_excludes = vec![
            "**/.git/**".to_string(),
            "**/target/**".to_string(),
            "**/node_modules/**".to_string(),
        ];
        default_excludes.extend(self.config.exclude_globs.clone());
        let exclude_set = build_globset(&default_excludes)?;

        let mut files = Vec::new();

        let walker = WalkDir::new(root).follow_links(self.config.follow_symlinks);
        for entry in walker {
            let entry = entry.map_err(|e| Error::permanent(format!("walk failed: {}", e)))?;
            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.path();
            let relative = path.strip_prefix(root).unwrap_or(path);
            let rel_str = relative.to_string_lossy().to_string();

            if exclude_set.is_match(&rel_str) || !include_set.is_match(&rel_str) {
                continue;
            }

            let metadata = std::fs::metadata(path)?;
            let modified = metadata
                .modified()
                .map(DateTime::<Utc>::from)
                .unwrap_or_else(|_| Utc::now());

            files.push(ScannedFile {
                document_id: document_id_for(relative),
                path: path.to_path_buf(),
                modified,
            });
        }

        // Sort for deterministic ordering
        files.sort_by(|a, b| a.document_id.cmp(&b.document_id));
        Ok(files)
    }

    fn find_file(&self, document_id: &str) -> Result<ScannedFile> {
        self.scan()?
            .into_iter()
            .find(|f| f.document_id == document_id)
            .ok_or_else(|| Error::DocumentNotFound {
                id: document_id.to_string(),
            })
    }
}

#[async_trait]
impl DocumentSource for DirectorySource {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> SourceKind {
        SourceKind::LocalDirectory
    }

    async fn list_documents(&self) -> Result<Vec<DocumentSummary>> {
        let files = self.scan()?;
        Ok(files
            .into_iter()
            .map(|f| DocumentSummary {
                title: title_for(&f.path, &f.document_id),
                id: f.document_id,
                created_time: f.modified,
                last_edited_time: f.modified,
            })
            .collect())
    }

    async fn fetch_blocks(&self, document_id: &str) -> Result<Vec<RawBlock>> {
        let file = self.find_file(document_id)?;
        let content = std::fs::read_to_string(&file.path)?;

        let extension = file
            .path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();

        let blocks = match extension.as_str() {
            "md" | "markdown" => parse_markdown(&content, document_id),
            _ => parse_text(&content, document_id),
        };
        Ok(blocks)
    }
}

/// Relative path, extension stripped, separators flattened.
fn document_id_for(relative: &Path) -> String {
    let without_ext = relative.with_extension("");
    without_ext
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("-")
}

fn title_for(path: &Path, fallback: &str) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| fallback.to_string())
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern)
            .map_err(|e| Error::Config(format!("invalid glob '{}': {}", pattern, e)))?;
        builder.add(glob);
    }
    builder
        .build()
        .map_err(|e| Error::Config(format!("invalid glob set: {}", e)))
}

/// Incremental block assembler keeping heading and list-nesting context.
struct BlockBuilder<'a> {
    document_id: &'a str,
    counter: usize,
    blocks: Vec<RawBlock>,
    /// Innermost heading per level: (level, block id).
    heading_stack: Vec<(usize, String)>,
    /// Open list items by indent: (indent, block id).
    list_stack: Vec<(usize, String)>,
}

impl<'a> BlockBuilder<'a> {
    fn new(document_id: &'a str) -> Self {
        Self {
            document_id,
            counter: 0,
            blocks: Vec::new(),
            heading_stack: Vec::new(),
            list_stack: Vec::new(),
        }
    }

    fn next_id(&mut self) -> String {
        self.counter += 1;
        format!("{}_{}", self.document_id, self.counter)
    }

    fn current_heading(&self) -> Option<String> {
        self.heading_stack.last().map(|(_, id)| id.clone())
    }

    fn push_heading(&mut self, level: usize, content: String) {
        while matches!(self.heading_stack.last(), Some((l, _)) if *l >= level) {
            self.heading_stack.pop();
        }
        let parent_id = self.current_heading();
        let id = self.next_id();
        self.blocks.push(RawBlock {
            id: id.clone(),
            block_type: format!("heading_{}", level),
            content,
            parent_id,
            has_children: false,
        });
        self.heading_stack.push((level, id));
        self.list_stack.clear();
    }

    fn push_list_item(&mut self, block_type: &str, indent: usize, content: String) {
        while matches!(self.list_stack.last(), Some((i, _)) if *i >= indent) {
            self.list_stack.pop();
        }
        let parent_id = self
            .list_stack
            .last()
            .map(|(_, id)| id.clone())
            .or_else(|| self.current_heading());
        let id = self.next_id();
        self.blocks.push(RawBlock {
            id: id.clone(),
            block_type: block_type.to_string(),
            content,
            parent_id,
            has_children: false,
        });
        self.list_stack.push((indent, id));
    }

    fn push_block(&mut self, block_type: &str, content: String) {
        let parent_id = self.current_heading();
        let id = self.next_id();
        self.blocks.push(RawBlock {
            id,
            block_type: block_type.to_string(),
            content,
            parent_id,
            has_children: false,
        });
        self.list_stack.clear();
    }

    fn finish(mut self) -> Vec<RawBlock> {
        // Fix up has_children from the linkage actually produced.
        let parent_ids: Vec<String> = self
            .blocks
            .iter()
            .filter_map(|b| b.parent_id.clone())
            .collect();
        for block in &mut self.blocks {
            if parent_ids.iter().any(|p| *p == block.id) {
                block.has_children = true;
            }
        }
        self.blocks
    }
}

fn parse_markdown(content: &str, document_id: &str) -> Vec<RawBlock> {
    let mut builder = BlockBuilder::new(document_id);
    let mut paragraph: Vec<&str> = Vec::new();
    let mut quote: Vec<&str> = Vec::new();
    let mut code: Option<Vec<&str>> = None;

    macro_rules! flush_paragraph {
        () => {
            if !paragraph.is_empty() {
                builder.push_block("paragraph", paragraph.join("\n").trim().to_string());
                paragraph.clear();
            }
        };
    }
    macro_rules! flush_quote {
        () => {
            if !quote.is_empty() {
                builder.push_block("quote", quote.join("\n").trim().to_string());
                quote.clear();
            }
        };
    }

    for line in content.lines() {
        // Inside a fenced code block everything is literal until the fence closes.
        if let Some(code_lines) = code.as_mut() {
            if line.trim() == "```" {
                builder.push_block("code", code_lines.join("\n"));
                code = None;
            } else {
                code_lines.push(line);
            }
            continue;
        }

        if line.trim().is_empty() {
            flush_paragraph!();
            flush_quote!();
            continue;
        }

        if let Some(rest) = line.strip_prefix(">") {
            flush_paragraph!();
            quote.push(rest.strip_prefix(' ').unwrap_or(rest));
            continue;
        }
        flush_quote!();

        if let Some((level, text)) = parse_heading(line) {
            flush_paragraph!();
            builder.push_heading(level, text.to_string());
            continue;
        }

        if line.trim_start().starts_with("```") {
            flush_paragraph!();
            code = Some(Vec::new());
            continue;
        }

        if let Some((indent, text)) = parse_bullet(line) {
            flush_paragraph!();
            builder.push_list_item("bulleted_list_item", indent, text.to_string());
            continue;
        }

        if let Some((indent, text)) = parse_numbered(line) {
            flush_paragraph!();
            builder.push_list_item("numbered_list_item", indent, text.to_string());
            continue;
        }

        if is_divider(line) {
            flush_paragraph!();
            builder.push_block("divider", String::new());
            continue;
        }

        paragraph.push(line);
    }

    // Unclosed fence: keep what was collected as a code block.
    if let Some(code_lines) = code {
        builder.push_block("code", code_lines.join("\n"));
    }
    flush_paragraph!();
    flush_quote!();

    builder.finish()
}

fn parse_text(content: &str, document_id: &str) -> Vec<RawBlock> {
    let mut builder = BlockBuilder::new(document_id);
    for paragraph in content.split("\n\n") {
        let trimmed = paragraph.trim();
        if !trimmed.is_empty() {
            builder.push_block("paragraph", trimmed.to_string());
        }
    }
    builder.finish()
}

fn parse_heading(line: &str) -> Option<(usize, &str)> {
    let hashes = line.bytes().take_while(|&b| b == b'#').count();
    if hashes == 0 || hashes > 6 {
        return None;
    }
    let rest = &line[hashes..];
    let text = rest.strip_prefix(' ')?;
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    Some((hashes, text))
}

fn parse_bullet(line: &str) -> Option<(usize, &str)> {
    let indent = line.len() - line.trim_start().len();
    let trimmed = line.trim_start();
    for marker in ["- ", "* ", "+ "] {
        if let Some(text) = trimmed.strip_prefix(marker) {
            return Some((indent / 2, text.trim()));
        }
    }
    None
}

fn parse_numbered(line: &str) -> Option<(usize, &str)> {
    let indent = line.len() - line.trim_start().len();
    let trimmed = line.trim_start();
    let digits = trimmed.bytes().take_while(|b| b.is_ascii_digit()).count();
    if digits == 0 {
        return None;
    }
    let rest = &trimmed[digits..];
    let text = rest.strip_prefix(". ").or_else(|| rest.strip_prefix(") "))?;
    Some((indent / 2, text.trim()))
}

fn is_divider(line: &str) -> bool {
    matches!(line.trim(), "---" | "***" | "___")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::normalize_blocks;
    use crate::tree::build_tree;
    use tempfile::TempDir;

    fn by_id<'a>(blocks: &'a [RawBlock], id: &str) -> &'a RawBlock {
        blocks.iter().find(|b| b.id == id).unwrap()
    }

    #[test]
    fn test_parse_markdown_headings_nest() {
        let md = "# Title\n\nIntro paragraph.\n\n## Section\n\nBody text.\n";
        let blocks = parse_markdown(md, "doc");

        assert_eq!(blocks.len(), 4);
        assert_eq!(blocks[0].block_type, "heading_1");
        assert_eq!(blocks[0].parent_id, None);
        assert!(blocks[0].has_children);

        // Intro hangs off the h1, the h2 nests under the h1, body under the h2.
        assert_eq!(blocks[1].block_type, "paragraph");
        assert_eq!(blocks[1].parent_id.as_deref(), Some("doc_1"));
        assert_eq!(blocks[2].block_type, "heading_2");
        assert_eq!(blocks[2].parent_id.as_deref(), Some("doc_1"));
        assert_eq!(blocks[3].parent_id.as_deref(), Some("doc_3"));
    }

    #[test]
    fn test_parse_markdown_nested_lists() {
        let md = "- top\n  - nested\n  - nested two\n- top two\n";
        let blocks = parse_markdown(md, "doc");

        assert_eq!(blocks.len(), 4);
        assert_eq!(blocks[0].parent_id, None);
        assert_eq!(by_id(&blocks, "doc_2").parent_id.as_deref(), Some("doc_1"));
        assert_eq!(by_id(&blocks, "doc_3").parent_id.as_deref(), Some("doc_1"));
        assert_eq!(by_id(&blocks, "doc_4").parent_id, None);
        assert!(by_id(&blocks, "doc_1").has_children);
    }

    #[test]
    fn test_parse_markdown_code_and_quote() {
        let md = "```rust\nfn main() {}\n```\n\n> a quote\n> continues\n";
        let blocks = parse_markdown(md, "doc");

        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].block_type, "code");
        assert_eq!(blocks[0].content, "fn main() {}");
        assert_eq!(blocks[1].block_type, "quote");
        assert_eq!(blocks[1].content, "a quote\ncontinues");
    }

    #[test]
    fn test_parse_markdown_divider() {
        let blocks = parse_markdown("before\n\n---\n\nafter\n", "doc");
        assert_eq!(blocks.len(), 3);
        assert_eq!(blocks[1].block_type, "divider");
    }

    #[test]
    fn test_parse_text_paragraphs() {
        let blocks = parse_text("first paragraph\n\nsecond paragraph\n\n\n", "doc");
        assert_eq!(blocks.len(), 2);
        assert!(blocks.iter().all(|b| b.block_type == "paragraph"));
        assert!(blocks.iter().all(|b| b.parent_id.is_none()));
    }

    #[test]
    fn test_parsed_blocks_build_a_tree() {
        let md = "# A\n\npara\n\n## B\n\n- item\n  - sub\n";
        let blocks = normalize_blocks(parse_markdown(md, "doc"));
        let tree = build_tree(&blocks);

        assert_eq!(tree.diagnostics().orphaned_blocks, 0);
        assert_eq!(tree.len(), 5);

        let item = tree.find_node_by_id("doc_4").unwrap();
        assert_eq!(item.block.indent_level, 2); // h2 -> item
        let sub = tree.find_node_by_id("doc_5").unwrap();
        assert_eq!(sub.block.indent_level, 3);
    }

    #[tokio::test]
    async fn test_directory_source_scan_and_fetch() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(
            tmp.path().join("alpha.md"),
            "# Alpha\n\nAbout Rust programming.\n",
        )
        .unwrap();
        std::fs::create_dir(tmp.path().join("guides")).unwrap();
        std::fs::write(tmp.path().join("guides/setup.md"), "# Setup\n\nSteps.\n").unwrap();
        std::fs::write(tmp.path().join("notes.txt"), "plain note\n").unwrap();
        std::fs::write(tmp.path().join("ignore.bin"), "binary").unwrap();

        let source = DirectorySource::new(
            "docs",
            DirectorySourceConfig {
                root: tmp.path().to_path_buf(),
                include_globs: vec!["**/*.md".to_string(), "**/*.txt".to_string()],
                exclude_globs: vec![],
                follow_symlinks: false,
            },
        );

        let listed = source.list_documents().await.unwrap();
        let ids: Vec<&str> = listed.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["alpha", "guides-setup", "notes"]);

        let blocks = source.fetch_blocks("alpha").await.unwrap();
        assert_eq!(blocks[0].block_type, "heading_1");
        assert_eq!(blocks[0].content, "Alpha");

        let err = source.fetch_blocks("missing").await.unwrap_err();
        assert!(err.is_not_found());
    }
}
