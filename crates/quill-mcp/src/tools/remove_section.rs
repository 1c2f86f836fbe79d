//! Remove-section tool: delete one section (and subtree) by address.

use quill_core::DocumentManager;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::{McpError, McpResult};
use crate::tools::resolve_target;
use crate::types::{DocumentInfo, HierarchicalContext, timestamp};

/// Parameters for the remove-section tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RemoveSectionParams {
    /// Section address, e.g. `/guide.md#setup`.
    pub section: String,
}

/// Output of the remove-section tool.
#[derive(Debug, Serialize)]
pub struct RemoveSectionOutput {
    /// Always `"remove_section"`.
    pub operation: &'static str,
    /// Document identity.
    pub document_info: DocumentInfo,
    /// Slug of the removed section.
    pub section: String,
    /// The removed markdown, heading line included.
    pub removed_content: String,
    /// Context when the address was hierarchical.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hierarchical_context: Option<HierarchicalContext>,
    /// Response timestamp (RFC-3339).
    pub timestamp: String,
}

/// Handler for the remove-section tool.
#[tracing::instrument(skip(manager))]
pub async fn handle_remove_section(
    params: RemoveSectionParams,
    manager: &DocumentManager,
) -> McpResult<RemoveSectionOutput> {
    let target = resolve_target(manager, &params.section).await?;
    let Some(section) = target.section.clone() else {
        return Err(McpError::InvalidParams(format!(
            "'{}' does not address a section",
            params.section
        )));
    };

    let removed_content = manager.delete_section(&target.path, &section.slug).await?;

    Ok(RemoveSectionOutput {
        operation: "remove_section",
        document_info: DocumentInfo::from_doc(&target.doc),
        section: section.slug,
        removed_content,
        hierarchical_context: target.context(),
        timestamp: timestamp(),
    })
}
