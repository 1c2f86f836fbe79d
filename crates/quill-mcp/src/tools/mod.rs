//! MCP tools for quill.
//!
//! Each tool is a free-function handler taking validated params plus the
//! shared [`DocumentManager`]; the transport layer turns results and
//! [`crate::error::McpError`]s into protocol frames.

pub mod create_document;
pub mod edit_section;
pub mod manage_document;
pub mod move_section;
pub mod remove_section;
pub mod task;
pub mod view_document;
pub mod view_section;

pub use create_document::{CreateDocumentParams, CreateDocumentOutput, handle_create_document};
pub use edit_section::{EditSectionParams, EditSectionOutput, handle_edit_section};
pub use manage_document::{ManageDocumentParams, ManageDocumentOutput, handle_manage_document};
pub use move_section::{MoveSectionParams, MoveSectionOutput, handle_move_section};
pub use remove_section::{RemoveSectionParams, RemoveSectionOutput, handle_remove_section};
pub use task::{
    CompleteTaskParams, CompleteTaskOutput, ViewTaskParams, ViewTaskOutput, handle_complete_task,
    handle_view_task,
};
pub use view_document::{ViewDocumentParams, ViewDocumentOutput, handle_view_document};
pub use view_section::{ViewSectionParams, ViewSectionOutput, handle_view_section};

use quill_core::{Address, Anchor, CachedDocument, DocumentManager, ResolvedSection};

use crate::error::{McpError, McpResult};
use crate::types::HierarchicalContext;

/// A fully resolved section address: the document it lives in plus the
/// located section (when the address carried a fragment).
pub(crate) struct Target {
    /// Canonical document path.
    pub path: String,
    /// The cached document.
    pub doc: CachedDocument,
    /// The resolved section, if the address had a `#fragment`.
    pub section: Option<ResolvedSection>,
    /// Whether the fragment was hierarchical (`#a/b/c`).
    pub hierarchical: bool,
}

impl Target {
    /// Hierarchical context for responses, present only for hierarchical
    /// addresses.
    pub fn context(&self) -> Option<HierarchicalContext> {
        if !self.hierarchical {
            return None;
        }
        self.section.as_ref().map(HierarchicalContext::from_resolved)
    }
}

/// Parse and resolve a client address against the live corpus.
pub(crate) async fn resolve_target(
    manager: &DocumentManager,
    address: &str,
) -> McpResult<Target> {
    let addr = Address::parse(address)?;
    let doc = manager.get_document(addr.doc.as_str()).await?.ok_or_else(|| {
        McpError::Core(quill_core::Error::DocNotFound(addr.doc.as_str().to_string()))
    })?;

    let (section, hierarchical) = match &addr.anchor {
        None => (None, false),
        Some(anchor) => {
            let hierarchical = matches!(anchor, Anchor::Hierarchy(_));
            let resolved = quill_core::address::resolve(&doc, anchor).ok_or_else(|| {
                McpError::Core(quill_core::Error::SectionNotFound(
                    anchor.target().to_string(),
                ))
            })?;
            (Some(resolved), hierarchical)
        },
    };

    Ok(Target {
        path: addr.doc.as_str().to_string(),
        doc,
        section,
        hierarchical,
    })
}

/// Resolve a section reference that appears inside tool params (a bare slug
/// or an `a/b/c` chain, no `#`).
pub(crate) fn resolve_section_ref(
    doc: &CachedDocument,
    reference: &str,
) -> McpResult<(String, Option<HierarchicalContext>)> {
    let reference = reference.trim();
    if reference.is_empty() {
        return Err(McpError::InvalidParams("empty section reference".into()));
    }
    if reference.contains('/') {
        let chain: Vec<String> = reference
            .split('/')
            .map(|s| s.trim().to_lowercase())
            .collect();
        let anchor = Anchor::Hierarchy(chain);
        let resolved = quill_core::address::resolve(doc, &anchor).ok_or_else(|| {
            McpError::Core(quill_core::Error::SectionNotFound(reference.to_string()))
        })?;
        let context = HierarchicalContext::from_resolved(&resolved);
        Ok((resolved.slug, Some(context)))
    } else {
        Ok((reference.to_lowercase(), None))
    }
}
