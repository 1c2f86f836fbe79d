//! Response fragments shared across the quill tools.
//!
//! Every tool response carries `document_info` and an RFC-3339 `timestamp`;
//! section-shaped responses add `hierarchical_context` when the client
//! addressed the section hierarchically. All fields are snake_case on the
//! wire.

use quill_core::{CachedDocument, DocPath, ResolvedSection};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Identity of the document a response is about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct DocumentInfo {
    /// Document slug (file stem of the canonical path).
    pub slug: String,
    /// Title from the H1 heading.
    pub title: String,
    /// Namespace (directory part), or `root`.
    pub namespace: String,
}

impl DocumentInfo {
    /// Build from a cached document.
    #[must_use]
    pub fn from_doc(doc: &CachedDocument) -> Self {
        let slug = DocPath::parse(&doc.metadata.path)
            .map(|p| p.slug().to_string())
            .unwrap_or_else(|_| doc.metadata.path.clone());
        Self {
            slug,
            title: doc.metadata.title.clone(),
            namespace: doc.metadata.namespace.clone(),
        }
    }
}

/// Where a hierarchically-addressed section sits in its document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct HierarchicalContext {
    /// Titles from the document title to the section, joined by `" > "`.
    pub full_path: String,
    /// `full_path` minus the final segment.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_path: Option<String>,
    /// The section's own title.
    pub section_name: String,
    /// Heading depth.
    pub depth: u8,
}

impl HierarchicalContext {
    /// Build from a resolved section.
    #[must_use]
    pub fn from_resolved(section: &ResolvedSection) -> Self {
        Self {
            full_path: section.full_path.clone(),
            parent_path: section.parent_path.clone(),
            section_name: section.title.clone(),
            depth: section.depth,
        }
    }
}

/// RFC-3339 timestamp for response stamping.
#[must_use]
pub fn timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp_is_rfc3339() {
        let ts = timestamp();
        assert!(chrono::DateTime::parse_from_rfc3339(&ts).is_ok());
    }
}
