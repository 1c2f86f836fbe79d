//! Manage-document tool: whole-document operations (rename title, rename
//! section, rename/move on disk, archive, delete).

use quill_core::DocumentManager;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::{McpError, McpResult};
use crate::tools::{resolve_section_ref, resolve_target};
use crate::types::{DocumentInfo, timestamp};

/// Which whole-document operation to perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum DocumentAction {
    /// Rewrite the H1 title. Requires `new_title`.
    RenameTitle,
    /// Rewrite one section heading. Requires `section` and `new_title`.
    RenameSection,
    /// Rename the file in place. Requires `new_path`.
    Rename,
    /// Move the file to a new namespace. Requires `new_path`.
    Move,
    /// Move the file under `/archived` with an audit sidecar.
    Archive,
    /// Permanently delete the file.
    Delete,
}

/// Parameters for the manage-document tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ManageDocumentParams {
    /// The operation to perform.
    pub action: DocumentAction,
    /// Document path.
    pub document: String,
    /// New title for the rename actions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_title: Option<String>,
    /// Section reference (slug or `a/b/c`) for `rename_section`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
    /// Destination path for `move`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_path: Option<String>,
    /// Reason recorded in the audit sidecar for `archive`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Output of the manage-document tool.
#[derive(Debug, Serialize)]
pub struct ManageDocumentOutput {
    /// The action that ran, snake_case.
    pub operation: String,
    /// Identity of the document the action targeted. For `delete` and
    /// `archive` this is the identity before the action.
    pub document_info: DocumentInfo,
    /// New slug after `rename_section`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_section: Option<String>,
    /// Canonical destination after `move`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub moved_to: Option<String>,
    /// Canonical archive location after `archive`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub archived_path: Option<String>,
    /// Response timestamp (RFC-3339).
    pub timestamp: String,
}

fn require(value: Option<&str>, what: &str, action: DocumentAction) -> McpResult<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or_else(|| McpError::InvalidParams(format!("{action:?} requires {what}")))
}

/// Handler for the manage-document tool.
#[tracing::instrument(skip(manager))]
pub async fn handle_manage_document(
    params: ManageDocumentParams,
    manager: &DocumentManager,
) -> McpResult<ManageDocumentOutput> {
    let target = resolve_target(manager, &params.document).await?;
    let document_info = DocumentInfo::from_doc(&target.doc);

    let mut output = ManageDocumentOutput {
        operation: match params.action {
            DocumentAction::RenameTitle => "rename_title",
            DocumentAction::RenameSection => "rename_section",
            DocumentAction::Rename => "rename",
            DocumentAction::Move => "move",
            DocumentAction::Archive => "archive",
            DocumentAction::Delete => "delete",
        }
        .to_string(),
        document_info,
        new_section: None,
        moved_to: None,
        archived_path: None,
        timestamp: timestamp(),
    };

    match params.action {
        DocumentAction::RenameTitle => {
            let new_title = require(params.new_title.as_deref(), "new_title", params.action)?;
            manager.rename_title(&target.path, &new_title).await?;
            output.document_info.title = new_title;
        },
        DocumentAction::RenameSection => {
            let new_title = require(params.new_title.as_deref(), "new_title", params.action)?;
            let reference = require(params.section.as_deref(), "section", params.action)?;
            let (slug, _) = resolve_section_ref(&target.doc, &reference)?;
            let new_slug = manager.rename_section(&target.path, &slug, &new_title).await?;
            output.new_section = Some(new_slug);
        },
        DocumentAction::Rename | DocumentAction::Move => {
            let new_path = require(params.new_path.as_deref(), "new_path", params.action)?;
            manager.move_document(&target.path, &new_path).await?;
            let moved = manager.get_document(&new_path).await?.ok_or_else(|| {
                McpError::Internal(format!("document vanished after move to {new_path}"))
            })?;
            output.moved_to = Some(moved.metadata.path.clone());
            output.document_info = DocumentInfo::from_doc(&moved);
        },
        DocumentAction::Archive => {
            let outcome = manager
                .archive_document(&target.path, params.reason.as_deref())
                .await?;
            output.archived_path = Some(outcome.archived_path);
        },
        DocumentAction::Delete => {
            manager.delete_document(&target.path).await?;
        },
    }

    Ok(output)
}
