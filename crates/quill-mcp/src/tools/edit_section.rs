//! Edit-section tool: bulk section edits on one document.
//!
//! Edits are applied in the order given on a single snapshot of the file.
//! Items never short-circuit: a failing item reports `status: "error"` and
//! later items still run. The file is written once at the end.

use quill_core::{BulkEdit, BulkEditStatus, DocumentManager};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::{McpError, McpResult};
use crate::tools::{resolve_section_ref, resolve_target};
use crate::types::{DocumentInfo, HierarchicalContext, timestamp};

/// One requested edit.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct EditRequest {
    /// Target or reference section: a slug or an `a/b/c` chain.
    pub section: String,
    /// What to do.
    pub operation: EditOperation,
    /// Body content for the operation.
    #[serde(default)]
    pub content: String,
    /// Title for creation operations.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Optional explicit depth for creation operations.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub depth_hint: Option<u8>,
}

/// Supported section operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum EditOperation {
    /// Overwrite the section body.
    Replace,
    /// Append to the section body.
    Append,
    /// Prepend to the section body.
    Prepend,
    /// Create a new section before the reference.
    InsertBefore,
    /// Create a new section after the reference's subtree.
    InsertAfter,
    /// Create a new section as the reference's last child.
    AppendChild,
    /// Remove the section and its subtree.
    Remove,
}

/// Parameters for the edit-section tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct EditSectionParams {
    /// Document path.
    pub document: String,
    /// Edits to apply, in order.
    pub edits: Vec<EditRequest>,
}

/// Per-item result.
#[derive(Debug, Serialize)]
pub struct EditItemResult {
    /// `updated`, `created`, or `error`.
    pub status: BulkEditStatus,
    /// The slug the item addressed.
    pub section: String,
    /// Slug of the created section, for creation operations.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_section: Option<String>,
    /// Removed markdown for `remove` operations.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub removed_content: Option<String>,
    /// Context when the item addressed its section hierarchically.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hierarchical_context: Option<HierarchicalContext>,
    /// Error message when `status` is `error`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Output of the edit-section tool.
#[derive(Debug, Serialize)]
pub struct EditSectionOutput {
    /// Always `"edit_section"`.
    pub operation: &'static str,
    /// Document identity after the edits.
    pub document_info: DocumentInfo,
    /// Per-item results, in request order.
    pub results: Vec<EditItemResult>,
    /// Response timestamp (RFC-3339).
    pub timestamp: String,
}

enum Plan {
    Run {
        edit: BulkEdit,
        context: Option<HierarchicalContext>,
        creates: bool,
    },
    Failed(EditItemResult),
}

/// Handler for the edit-section tool.
#[tracing::instrument(skip(manager, params), fields(document = %params.document, edits = params.edits.len()))]
pub async fn handle_edit_section(
    params: EditSectionParams,
    manager: &DocumentManager,
) -> McpResult<EditSectionOutput> {
    if params.edits.is_empty() {
        return Err(McpError::InvalidParams("edits may not be empty".into()));
    }

    let target = resolve_target(manager, &params.document).await?;

    // Resolve references up front; items that fail resolution become error
    // results without stopping the batch.
    let mut plans = Vec::with_capacity(params.edits.len());
    for request in &params.edits {
        plans.push(plan_edit(&target.doc, request));
    }

    let to_run: Vec<BulkEdit> = plans
        .iter()
        .filter_map(|plan| match plan {
            Plan::Run { edit, .. } => Some(edit.clone()),
            Plan::Failed(_) => None,
        })
        .collect();

    let run_outcomes = if to_run.is_empty() {
        Vec::new()
    } else {
        manager.edit_sections(&target.path, to_run).await?
    };
    let mut run_results = run_outcomes.into_iter();

    let mut results = Vec::with_capacity(plans.len());
    for plan in plans {
        match plan {
            Plan::Failed(result) => results.push(result),
            Plan::Run { context, creates, .. } => {
                let Some(outcome) = run_results.next() else {
                    return Err(McpError::Internal("bulk result count mismatch".into()));
                };
                let new_section = (creates && outcome.status == BulkEditStatus::Created)
                    .then(|| outcome.section.clone());
                results.push(EditItemResult {
                    status: outcome.status,
                    section: outcome.section,
                    new_section,
                    removed_content: outcome.removed_content,
                    hierarchical_context: context,
                    error: outcome.error,
                });
            },
        }
    }

    // Re-read for post-edit identity (the title may have been edited).
    let document_info = manager
        .get_document(&target.path)
        .await?
        .map_or_else(|| DocumentInfo::from_doc(&target.doc), |d| DocumentInfo::from_doc(&d));

    Ok(EditSectionOutput {
        operation: "edit_section",
        document_info,
        results,
        timestamp: timestamp(),
    })
}

fn plan_edit(doc: &quill_core::CachedDocument, request: &EditRequest) -> Plan {
    let failed = |message: String| {
        Plan::Failed(EditItemResult {
            status: BulkEditStatus::Error,
            section: request.section.clone(),
            new_section: None,
            removed_content: None,
            hierarchical_context: None,
            error: Some(message),
        })
    };

    let (slug, context) = match resolve_section_ref(doc, &request.section) {
        Ok(resolved) => resolved,
        Err(e) => return failed(e.to_string()),
    };

    let creation_title = || -> Result<String, String> {
        request
            .title
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .ok_or_else(|| format!("operation {:?} requires a title", request.operation))
    };

    let edit = match request.operation {
        EditOperation::Replace => BulkEdit::Replace {
            section: slug,
            content: request.content.clone(),
        },
        EditOperation::Append => BulkEdit::Append {
            section: slug,
            content: request.content.clone(),
        },
        EditOperation::Prepend => BulkEdit::Prepend {
            section: slug,
            content: request.content.clone(),
        },
        EditOperation::InsertBefore => match creation_title() {
            Ok(title) => BulkEdit::InsertBefore {
                section: slug,
                title,
                content: request.content.clone(),
                depth_hint: request.depth_hint,
            },
            Err(message) => return failed(message),
        },
        EditOperation::InsertAfter => match creation_title() {
            Ok(title) => BulkEdit::InsertAfter {
                section: slug,
                title,
                content: request.content.clone(),
                depth_hint: request.depth_hint,
            },
            Err(message) => return failed(message),
        },
        EditOperation::AppendChild => match creation_title() {
            Ok(title) => BulkEdit::AppendChild {
                section: slug,
                title,
                content: request.content.clone(),
            },
            Err(message) => return failed(message),
        },
        EditOperation::Remove => BulkEdit::Remove { section: slug },
    };

    let creates = matches!(
        request.operation,
        EditOperation::InsertBefore | EditOperation::InsertAfter | EditOperation::AppendChild
    );
    Plan::Run {
        edit,
        context,
        creates,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn setup(content: &str) -> (DocumentManager, TempDir) {
        let dir = TempDir::new().unwrap();
        tokio::fs::write(dir.path().join("doc.md"), content).await.unwrap();
        (DocumentManager::with_root(dir.path().to_path_buf(), 8), dir)
    }

    fn edit(section: &str, operation: EditOperation, content: &str) -> EditRequest {
        EditRequest {
            section: section.into(),
            operation,
            content: content.into(),
            title: None,
            depth_hint: None,
        }
    }

    #[tokio::test]
    async fn test_mixed_batch_with_per_item_errors() {
        let (manager, _dir) =
            setup("# D\n\n## One\n\n1\n\n## Two\n\n2\n").await;

        let mut create = edit("two", EditOperation::InsertAfter, "3");
        create.title = Some("Three".into());

        let output = handle_edit_section(
            EditSectionParams {
                document: "/doc.md".into(),
                edits: vec![
                    edit("one", EditOperation::Replace, "first"),
                    edit("ghost", EditOperation::Replace, "x"),
                    create,
                    edit("one", EditOperation::Append, "more"),
                ],
            },
            &manager,
        )
        .await
        .unwrap();

        assert_eq!(output.operation, "edit_section");
        assert_eq!(output.results.len(), 4);
        assert_eq!(output.results[0].status, BulkEditStatus::Updated);
        assert_eq!(output.results[1].status, BulkEditStatus::Error);
        assert_eq!(output.results[2].status, BulkEditStatus::Created);
        assert_eq!(output.results[2].new_section.as_deref(), Some("three"));
        assert_eq!(output.results[3].status, BulkEditStatus::Updated);

        assert_eq!(
            manager.get_section_content("/doc.md", "one").await.unwrap().unwrap(),
            "first\n\nmore"
        );
    }

    #[tokio::test]
    async fn test_hierarchical_target_carries_context() {
        let (manager, _dir) =
            setup("# D\n\n## API\n\na\n\n### Delete\n\nd\n").await;

        let output = handle_edit_section(
            EditSectionParams {
                document: "/doc.md".into(),
                edits: vec![edit("api/delete", EditOperation::Replace, "updated")],
            },
            &manager,
        )
        .await
        .unwrap();

        let context = output.results[0].hierarchical_context.as_ref().unwrap();
        assert_eq!(context.full_path, "D > API > Delete");
        assert_eq!(
            manager.get_section_content("/doc.md", "delete").await.unwrap().unwrap(),
            "updated"
        );
    }

    #[tokio::test]
    async fn test_missing_title_on_creation_is_a_per_item_error() {
        let (manager, _dir) = setup("# D\n\n## One\n\n1\n").await;

        let output = handle_edit_section(
            EditSectionParams {
                document: "/doc.md".into(),
                edits: vec![
                    edit("one", EditOperation::AppendChild, "body"),
                    edit("one", EditOperation::Replace, "still runs"),
                ],
            },
            &manager,
        )
        .await
        .unwrap();

        assert_eq!(output.results[0].status, BulkEditStatus::Error);
        assert!(output.results[0].error.as_deref().unwrap().contains("title"));
        assert_eq!(output.results[1].status, BulkEditStatus::Updated);
    }

    #[tokio::test]
    async fn test_remove_returns_removed_content() {
        let (manager, _dir) = setup("# D\n\n## Gone\n\nbye\n\n## Stay\n\ns\n").await;

        let output = handle_edit_section(
            EditSectionParams {
                document: "/doc.md".into(),
                edits: vec![edit("gone", EditOperation::Remove, "")],
            },
            &manager,
        )
        .await
        .unwrap();

        assert!(
            output.results[0]
                .removed_content
                .as_deref()
                .unwrap()
                .contains("## Gone")
        );
    }

    #[tokio::test]
    async fn test_empty_edit_list_is_invalid_params() {
        let (manager, _dir) = setup("# D\n").await;
        let err = handle_edit_section(
            EditSectionParams {
                document: "/doc.md".into(),
                edits: vec![],
            },
            &manager,
        )
        .await
        .unwrap_err();
        assert_eq!(err.error_code(), -32602);
    }
}
