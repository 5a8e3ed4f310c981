//! # doctree
//!
//! A local-first document tree ingestion, caching, and navigation library.
//!
//! Doctree pulls flat block lists out of hierarchical-document sources
//! (a remote API, a local directory, a vault), normalizes them into
//! [`Block`](models::Block) sequences, rebuilds the hierarchy as a
//! navigable [`Tree`](tree::Tree), and keeps snapshots warm in an
//! on-disk cache with TTL-based freshness. Large documents are handled
//! through lazy handles that defer the fetch until content is touched,
//! and through bounded [`DocumentWindow`](window::DocumentWindow) views.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌──────────────┐   ┌───────────┐
//! │   Sources   │──▶│    Loader    │──▶│   Cache   │
//! │ API/Dir/... │   │ limit+fetch  │   │ JSON+TTL  │
//! └─────────────┘   └──────┬───────┘   └───────────┘
//!                          │
//!              ┌───────────┼───────────┐
//!              ▼           ▼           ▼
//!        ┌──────────┐ ┌─────────┐ ┌──────────┐
//!        │   Lazy   │ │  Tree   │ │ Windower │
//!        │ handles  │ │ builder │ │  views   │
//!        └──────────┘ └─────────┘ └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use doctree::config::Config;
//! use doctree::lazy::LazyDocumentCollection;
//! use doctree::loader::DocumentLoader;
//! use doctree::source_fs::DirectorySource;
//!
//! # async fn example() -> doctree::Result<()> {
//! let config = Config::default();
//! let source = DirectorySource::new("notes", config.sources.directory.clone().unwrap());
//! let loader = Arc::new(DocumentLoader::new(&config, Arc::new(source)));
//!
//! let mut collection = LazyDocumentCollection::new(loader).await?;
//! if let Some(doc) = collection.get_document("readme").await? {
//!     let tree = doc.build_tree().await?;
//!     println!("{} blocks", tree.len());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration snapshot |
//! | [`models`] | Core data types |
//! | [`tree`] | Hierarchy construction and lookup |
//! | [`cache`] | On-disk snapshot cache |
//! | [`source`] | Document source trait + normalization |
//! | [`source_fs`] | Local-directory source |
//! | [`ratelimit`] | Sliding-window rate limiter |
//! | [`loader`] | Cache-then-source retrieval |
//! | [`lazy`] | Lazy documents and collections |
//! | [`window`] | Windowed navigation |

pub mod cache;
pub mod config;
pub mod error;
pub mod lazy;
pub mod loader;
pub mod models;
pub mod ratelimit;
pub mod source;
pub mod source_fs;
pub mod tree;
pub mod window;

pub use error::{Error, Result};
pub use models::{Block, Document, DocumentSummary, Source, SourceKind};
