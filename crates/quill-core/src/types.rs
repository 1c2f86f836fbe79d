//! Core data structures for the quill document cache.
//!
//! This module defines the types shared across the parser, cache, and
//! manager: parsed headings, table-of-contents entries, document metadata,
//! and the cached-document record that backs every tool response.
//!
//! ## Serialization
//!
//! Most types implement `Serialize`/`Deserialize` so tool wrappers can embed
//! them in responses directly. Byte offsets into the parsed snapshot are
//! deliberately kept out of the serialized form; they are only meaningful
//! against the exact snapshot the parser saw.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One ATX heading extracted from a document.
///
/// `index` is the zero-based ordinal in document order; `parent` is the
/// index of the nearest earlier heading with smaller depth, or `None` for
/// depth-1 headings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Heading {
    /// Zero-based ordinal in document order.
    pub index: usize,
    /// Heading depth, 1 through 6.
    pub depth: u8,
    /// Heading text with markers stripped, case preserved.
    pub title: String,
    /// Deterministic lowercase identifier derived from the title.
    pub slug: String,
    /// Index of the nearest earlier, shallower heading.
    pub parent: Option<usize>,
    /// Byte offset of the start of the heading line in the parsed snapshot.
    #[serde(skip)]
    pub line_start: usize,
    /// Byte offset just past the heading line's newline (or end of file).
    #[serde(skip)]
    pub line_end: usize,
}

/// A nested table-of-contents entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TocEntry {
    /// Heading title, case preserved.
    pub title: String,
    /// Heading slug.
    pub slug: String,
    /// Heading depth, 1 through 6.
    pub depth: u8,
    /// Entries nested under this heading.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<TocEntry>,
}

/// Lightweight counts gathered during a parse.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentStats {
    /// Whitespace-separated word count over the whole file.
    pub word_count: usize,
    /// Number of inline markdown links.
    pub link_count: usize,
    /// Number of fenced code blocks.
    pub code_block_count: usize,
}

/// Metadata describing one cached document.
///
/// `last_modified` is the file mtime in milliseconds observed by the
/// snapshot this record was parsed from; any read that sees a newer mtime on
/// disk discards the record and reparses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentMetadata {
    /// Canonical document path (`/namespace/doc.md`).
    pub path: String,
    /// Title from the depth-1 heading.
    pub title: String,
    /// File mtime in milliseconds at snapshot time.
    pub last_modified: u64,
    /// SHA-256 hex digest of the file bytes.
    pub content_hash: String,
    /// Whitespace-separated word count.
    pub word_count: usize,
    /// Inline markdown link count.
    pub link_count: usize,
    /// Fenced code block count.
    pub code_block_count: usize,
    /// Directory segments joined by `/`, or `root` for top-level documents.
    pub namespace: String,
    /// Keyword fingerprint used by relevance layers above the core.
    pub keywords: Vec<String>,
    /// When the keyword fingerprint was computed.
    pub fingerprint_generated: DateTime<Utc>,
    /// Monotonic per-path generation; advances on every write.
    pub cache_generation: u64,
    /// Last cache access, drives LRU eviction.
    pub last_accessed: DateTime<Utc>,
}

/// A lazily materialized section body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionEntry {
    /// Section body, heading line excluded.
    pub content: String,
    /// Generation of the document the body was computed from. Entries with
    /// an older generation than the document are stale.
    pub generation: u64,
}

/// A parsed document held by the cache.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedDocument {
    /// Document metadata.
    pub metadata: DocumentMetadata,
    /// Headings in document order.
    pub headings: Vec<Heading>,
    /// Slug to heading-index map; every slug appears exactly once.
    pub slug_index: HashMap<String, usize>,
    /// Materialized section bodies, keyed by slug.
    pub sections: HashMap<String, SectionEntry>,
    /// Nested table of contents.
    pub toc: Vec<TocEntry>,
    /// The markdown snapshot the headings were parsed from. Kept so section
    /// bodies can be materialized without another read; byte offsets in
    /// `headings` index into this exact string.
    #[serde(skip)]
    pub text: String,
}

impl CachedDocument {
    /// Look up a heading by slug.
    #[must_use]
    pub fn heading(&self, slug: &str) -> Option<&Heading> {
        self.slug_index.get(slug).map(|&i| &self.headings[i])
    }

    /// Titles from the document title down to the given heading, in order.
    #[must_use]
    pub fn heading_path(&self, index: usize) -> Vec<String> {
        let mut titles = Vec::new();
        let mut cursor = Some(index);
        while let Some(i) = cursor {
            let heading = &self.headings[i];
            titles.push(heading.title.clone());
            cursor = heading.parent;
        }
        titles.reverse();
        titles
    }

    /// Overview text: everything between the title line and the first
    /// following heading (or end of file), trimmed.
    #[must_use]
    pub fn overview(&self) -> String {
        let Some(title) = self.headings.first() else {
            return String::new();
        };
        let end = self
            .headings
            .get(1)
            .map_or(self.text.len(), |next| next.line_start);
        self.text[title.line_end..end].trim().to_string()
    }
}
