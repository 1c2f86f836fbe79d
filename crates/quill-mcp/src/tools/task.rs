//! Task tools: list tasks with their metadata fields, and flip status.
//!
//! Tasks are ordinary sections under the document's `Tasks` heading; these
//! tools only shape responses (and rewrite metadata lines) — storage and
//! editing stay identical to every other section.

use quill_core::{DocumentManager, TaskStatus, UpdateMode, tasks};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::{McpError, McpResult};
use crate::tools::resolve_target;
use crate::types::{DocumentInfo, timestamp};

/// Parameters for the view-task tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ViewTaskParams {
    /// Document path.
    pub document: String,
    /// A specific task slug; all tasks when omitted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task: Option<String>,
}

/// One task in a response.
#[derive(Debug, Serialize)]
pub struct TaskView {
    /// Task section slug.
    pub section: String,
    /// Task title.
    pub title: String,
    /// Parsed `Status` field (pending when absent).
    pub status: TaskStatus,
    /// `Priority` field, verbatim.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<String>,
    /// `Workflow` field, verbatim.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workflow: Option<String>,
    /// `Main-Workflow` field, verbatim.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub main_workflow: Option<String>,
    /// Full section body.
    pub content: String,
}

/// Output of the view-task tool.
#[derive(Debug, Serialize)]
pub struct ViewTaskOutput {
    /// Document identity.
    pub document_info: DocumentInfo,
    /// Tasks in document order.
    pub tasks: Vec<TaskView>,
    /// Response timestamp (RFC-3339).
    pub timestamp: String,
}

/// Parameters for the complete-task tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CompleteTaskParams {
    /// Document path.
    pub document: String,
    /// Task section slug.
    pub task: String,
}

/// Output of the complete-task tool.
#[derive(Debug, Serialize)]
pub struct CompleteTaskOutput {
    /// Always `"complete_task"`.
    pub operation: &'static str,
    /// Document identity.
    pub document_info: DocumentInfo,
    /// The completed task.
    pub task: TaskView,
    /// Response timestamp (RFC-3339).
    pub timestamp: String,
}

fn task_view(slug: &str, title: &str, body: String) -> TaskView {
    TaskView {
        section: slug.to_string(),
        title: title.to_string(),
        status: tasks::status_of(&body),
        priority: tasks::extract_field(&body, "Priority"),
        workflow: tasks::extract_field(&body, "Workflow"),
        main_workflow: tasks::extract_field(&body, "Main-Workflow"),
        content: body,
    }
}

/// Handler for the view-task tool.
#[tracing::instrument(skip(manager))]
pub async fn handle_view_task(
    params: ViewTaskParams,
    manager: &DocumentManager,
) -> McpResult<ViewTaskOutput> {
    let target = resolve_target(manager, &params.document).await?;
    let doc = &target.doc;

    let wanted: Option<String> = params.task.as_ref().map(|t| t.trim().to_lowercase());
    let mut views = Vec::new();
    for heading in &doc.headings {
        if !quill_core::address::is_task(doc, heading.index) {
            continue;
        }
        if let Some(wanted) = &wanted {
            if &heading.slug != wanted {
                continue;
            }
        }
        let body = manager
            .get_section_content(&target.path, &heading.slug)
            .await?
            .unwrap_or_default();
        views.push(task_view(&heading.slug, &heading.title, body));
    }

    if wanted.is_some() && views.is_empty() {
        return Err(McpError::Core(quill_core::Error::SectionNotFound(
            params.task.unwrap_or_default(),
        )));
    }

    Ok(ViewTaskOutput {
        document_info: DocumentInfo::from_doc(doc),
        tasks: views,
        timestamp: timestamp(),
    })
}

/// Handler for the complete-task tool: sets `Status` to `completed`.
#[tracing::instrument(skip(manager))]
pub async fn handle_complete_task(
    params: CompleteTaskParams,
    manager: &DocumentManager,
) -> McpResult<CompleteTaskOutput> {
    let target = resolve_target(manager, &params.document).await?;
    let doc = &target.doc;
    let slug = params.task.trim().to_lowercase();

    let heading = doc
        .heading(&slug)
        .ok_or_else(|| McpError::Core(quill_core::Error::SectionNotFound(slug.clone())))?;
    if !quill_core::address::is_task(doc, heading.index) {
        return Err(McpError::InvalidParams(format!(
            "section '{slug}' is not under the Tasks section"
        )));
    }
    let title = heading.title.clone();

    let body = manager
        .get_section_content(&target.path, &slug)
        .await?
        .ok_or_else(|| McpError::Core(quill_core::Error::SectionNotFound(slug.clone())))?;
    let updated = tasks::set_field(&body, "Status", &TaskStatus::Completed.to_string());
    manager
        .update_section(&target.path, &slug, &updated, UpdateMode::Replace)
        .await?;

    let fresh = manager
        .get_section_content(&target.path, &slug)
        .await?
        .unwrap_or(updated);

    Ok(CompleteTaskOutput {
        operation: "complete_task",
        document_info: DocumentInfo::from_doc(doc),
        task: task_view(&slug, &title, fresh),
        timestamp: timestamp(),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const TEXT: &str = "# Plan\n\nintro\n\n## Tasks\n\n### Ship Release\n\n* Status: in_progress\n* Priority: high\n* Workflow: release-checklist\n\nCut the tag.\n\n### Write Docs\n\n**Status:** pending\n\nDraft the guide.\n\n## Notes\n\n### Not A Task\n\ntext\n";

    async fn setup() -> (DocumentManager, TempDir) {
        let dir = TempDir::new().unwrap();
        tokio::fs::write(dir.path().join("plan.md"), TEXT).await.unwrap();
        (DocumentManager::with_root(dir.path().to_path_buf(), 8), dir)
    }

    #[tokio::test]
    async fn test_list_all_tasks_skips_non_tasks() {
        let (manager, _dir) = setup().await;
        let output = handle_view_task(
            ViewTaskParams {
                document: "/plan.md".into(),
                task: None,
            },
            &manager,
        )
        .await
        .unwrap();

        let slugs: Vec<&str> = output.tasks.iter().map(|t| t.section.as_str()).collect();
        assert_eq!(slugs, vec!["ship-release", "write-docs"]);
        assert_eq!(output.tasks[0].status, TaskStatus::InProgress);
        assert_eq!(output.tasks[0].priority.as_deref(), Some("high"));
        assert_eq!(output.tasks[0].workflow.as_deref(), Some("release-checklist"));
        assert_eq!(output.tasks[1].status, TaskStatus::Pending);
    }

    #[tokio::test]
    async fn test_single_task_lookup() {
        let (manager, _dir) = setup().await;
        let output = handle_view_task(
            ViewTaskParams {
                document: "/plan.md".into(),
                task: Some("write-docs".into()),
            },
            &manager,
        )
        .await
        .unwrap();
        assert_eq!(output.tasks.len(), 1);
        assert_eq!(output.tasks[0].title, "Write Docs");

        let err = handle_view_task(
            ViewTaskParams {
                document: "/plan.md".into(),
                task: Some("ghost".into()),
            },
            &manager,
        )
        .await
        .unwrap_err();
        assert_eq!(err.core_code(), Some("SECTION_NOT_FOUND"));
    }

    #[tokio::test]
    async fn test_complete_task_flips_status_in_place() {
        let (manager, _dir) = setup().await;
        let output = handle_complete_task(
            CompleteTaskParams {
                document: "/plan.md".into(),
                task: "write-docs".into(),
            },
            &manager,
        )
        .await
        .unwrap();

        assert_eq!(output.task.status, TaskStatus::Completed);
        // The bold form of the original line is preserved.
        assert!(output.task.content.contains("**Status:** completed"));
        assert!(output.task.content.contains("Draft the guide."));

        let body = manager
            .get_section_content("/plan.md", "write-docs")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(tasks::status_of(&body), TaskStatus::Completed);
    }

    #[tokio::test]
    async fn test_complete_non_task_is_refused() {
        let (manager, _dir) = setup().await;
        let err = handle_complete_task(
            CompleteTaskParams {
                document: "/plan.md".into(),
                task: "not-a-task".into(),
            },
            &manager,
        )
        .await
        .unwrap_err();
        assert_eq!(err.error_code(), -32602);
    }
}
