//! # quill-core
//!
//! Core engine for quill: an in-process document cache and
//! section-addressing layer over a tree of UTF-8 markdown files. Every tool
//! the server exposes is backed by the [`DocumentManager`] facade in this
//! crate.
//!
//! ## Architecture
//!
//! The crate is a small stack, leaves first:
//!
//! - **Paths** ([`paths`]): canonical document paths confined to the
//!   workspace root.
//! - **File I/O** ([`fsio`]): snapshot reads and mtime-guarded conditional
//!   writes; the crate's only suspension points.
//! - **Section engine** ([`parser`], [`slug`], [`section`]): tree-sitter
//!   heading extraction and pure structural edits over markdown text.
//! - **Cache** ([`cache`]): LRU of parsed documents with lazy section
//!   bodies, content hashes, keyword fingerprints, and per-path locks.
//! - **Manager** ([`manager`]): the facade that orchestrates
//!   read-snapshot-modify-write with cache invalidation.
//! - **Addressing** ([`address`]): `/ns/doc.md#a/b/c` parsing and
//!   resolution, including task classification.
//!
//! ## Quick start
//!
//! ```no_run
//! use quill_core::{DocumentManager, Result, UpdateMode};
//!
//! # async fn demo() -> Result<()> {
//! let manager = DocumentManager::with_root("/srv/knowledge".into(), 128);
//!
//! manager
//!     .create_document("/specs/auth", "Auth Spec", Some("Token flows."))
//!     .await?;
//! manager
//!     .update_section("/specs/auth.md", "auth-spec", "Updated overview.", UpdateMode::Replace)
//!     .await?;
//!
//! let doc = manager.get_document("/specs/auth.md").await?;
//! println!("{} headings", doc.map_or(0, |d| d.headings.len()));
//! # Ok(())
//! # }
//! ```
//!
//! ## Concurrency
//!
//! Single process, cooperative: operations on one document serialize
//! through a per-path lock, distinct documents interleave freely, and the
//! mtime precondition on every write is the only cross-process guard. A
//! reader that observes a newer mtime than its cached snapshot reloads
//! before returning.

/// Client-facing address parsing and resolution
pub mod address;
/// LRU document cache with lazy section entries
pub mod cache;
/// Workspace configuration
pub mod config;
/// Error types and result alias
pub mod error;
/// Snapshot reads and conditional writes
pub mod fsio;
/// Keyword fingerprints for relevance layers
pub mod keywords;
/// The document manager facade
pub mod manager;
/// Tree-sitter based heading extraction
pub mod parser;
/// Canonical document paths
pub mod paths;
/// Structural section edits
pub mod section;
/// Slug derivation
pub mod slug;
/// Task metadata conventions
pub mod tasks;
/// Core data types
pub mod types;

pub use address::{Address, Anchor, ResolvedSection, TASKS_SLUG};
pub use cache::{CacheStatsSnapshot, DocumentCache};
pub use config::{CacheConfig, Config, WorkspaceConfig};
pub use error::{Error, Result};
pub use fsio::FileSnapshot;
pub use manager::{
    ArchiveOutcome, AuditRecord, BulkEdit, BulkEditResult, BulkEditStatus, CreatedSection,
    DocumentManager,
};
pub use parser::{MarkdownParser, ParsedDocument};
pub use paths::DocPath;
pub use section::{InsertMode, UpdateMode};
pub use slug::slugify;
pub use tasks::{TaskField, TaskStatus, extract_field, parse_fields, status_of};
pub use types::{CachedDocument, DocumentMetadata, DocumentStats, Heading, SectionEntry, TocEntry};
