//! View-section tool: section bodies for one or more addresses.

use quill_core::DocumentManager;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::{McpError, McpResult};
use crate::tools::resolve_target;
use crate::types::{DocumentInfo, HierarchicalContext, timestamp};

/// Parameters for the view-section tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ViewSectionParams {
    /// Section addresses, e.g. `/guide.md#setup` or `/guide.md#api/delete`.
    pub sections: Vec<String>,
}

/// One per-address result. Addresses are processed independently; a bad one
/// never blocks the rest.
#[derive(Debug, Serialize)]
pub struct SectionView {
    /// The address as given.
    pub address: String,
    /// Section body when found.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Document identity when the document resolved.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_info: Option<DocumentInfo>,
    /// Context for hierarchical addresses.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hierarchical_context: Option<HierarchicalContext>,
    /// Whether the section is a task.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub is_task: bool,
    /// Error message (with wire code) when the address failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Output of the view-section tool.
#[derive(Debug, Serialize)]
pub struct ViewSectionOutput {
    /// Per-address results, in request order.
    pub sections: Vec<SectionView>,
    /// Response timestamp (RFC-3339).
    pub timestamp: String,
}

/// Handler for the view-section tool.
#[tracing::instrument(skip(manager))]
pub async fn handle_view_section(
    params: ViewSectionParams,
    manager: &DocumentManager,
) -> McpResult<ViewSectionOutput> {
    if params.sections.is_empty() {
        return Err(McpError::InvalidParams(
            "at least one section address is required".into(),
        ));
    }

    let mut views = Vec::with_capacity(params.sections.len());
    for address in &params.sections {
        views.push(view_one(manager, address).await);
    }

    Ok(ViewSectionOutput {
        sections: views,
        timestamp: timestamp(),
    })
}

async fn view_one(manager: &DocumentManager, address: &str) -> SectionView {
    let mut view = SectionView {
        address: address.to_string(),
        content: None,
        document_info: None,
        hierarchical_context: None,
        is_task: false,
        error: None,
    };

    let target = match resolve_target(manager, address).await {
        Ok(target) => target,
        Err(e) => {
            view.error = Some(describe(&e));
            return view;
        },
    };
    view.document_info = Some(DocumentInfo::from_doc(&target.doc));

    let Some(section) = &target.section else {
        view.error = Some("address has no section fragment (SECTION_NOT_FOUND)".to_string());
        return view;
    };
    view.hierarchical_context = target.context();
    view.is_task = section.is_task;

    match manager.get_section_content(&target.path, &section.slug).await {
        Ok(Some(content)) => view.content = Some(content),
        Ok(None) => {
            view.error = Some(format!("section '{}' vanished (SECTION_NOT_FOUND)", section.slug));
        },
        Err(e) => view.error = Some(describe(&McpError::Core(e))),
    }
    view
}

fn describe(error: &McpError) -> String {
    match error.core_code() {
        Some(code) => format!("{error} ({code})"),
        None => error.to_string(),
    }
}
