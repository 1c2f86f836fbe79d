//! Create-document tool: new file with a title, overview, and optional
//! initial sections, loaded through the manager.

use quill_core::{BulkEdit, BulkEditStatus, DocumentManager};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::{McpError, McpResult};
use crate::types::{DocumentInfo, timestamp};

/// One initial depth-2 section for a new document.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct InitialSection {
    /// Section title.
    pub title: String,
    /// Section body.
    #[serde(default)]
    pub content: String,
}

/// Parameters for the create-document tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CreateDocumentParams {
    /// Document path; `.md` is implied.
    pub path: String,
    /// The document title (its H1 heading).
    pub title: String,
    /// Text placed between the title and the first section.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overview: Option<String>,
    /// Sections created under the title, in order.
    #[serde(default)]
    pub sections: Vec<InitialSection>,
}

/// Output of the create-document tool.
#[derive(Debug, Serialize)]
pub struct CreateDocumentOutput {
    /// Always `"create_document"`.
    pub operation: &'static str,
    /// Identity of the new document.
    pub document_info: DocumentInfo,
    /// Canonical path of the new document.
    pub path: String,
    /// Slugs of the initial sections that were created.
    pub sections_created: Vec<String>,
    /// Response timestamp (RFC-3339).
    pub timestamp: String,
}

/// Handler for the create-document tool.
#[tracing::instrument(skip(manager, params), fields(path = %params.path))]
pub async fn handle_create_document(
    params: CreateDocumentParams,
    manager: &DocumentManager,
) -> McpResult<CreateDocumentOutput> {
    let doc = manager
        .create_document(&params.path, &params.title, params.overview.as_deref())
        .await?;
    let path = doc.metadata.path.clone();

    let mut sections_created = Vec::with_capacity(params.sections.len());
    if !params.sections.is_empty() {
        // Chain each new section after the previous one so document order
        // matches request order.
        let title_slug = quill_core::slugify(&params.title);
        let mut reference = title_slug;
        let mut edits = Vec::with_capacity(params.sections.len());
        for section in &params.sections {
            edits.push(BulkEdit::InsertAfter {
                section: reference.clone(),
                title: section.title.clone(),
                content: section.content.clone(),
                depth_hint: None,
            });
            reference = quill_core::slugify(&section.title);
        }

        let results = manager.edit_sections(&path, edits).await?;
        for result in results {
            if result.status == BulkEditStatus::Error {
                return Err(McpError::InvalidParams(format!(
                    "initial section '{}' could not be created: {}",
                    result.section,
                    result.error.unwrap_or_default()
                )));
            }
            sections_created.push(result.section);
        }
    }

    let document_info = manager
        .get_document(&path)
        .await?
        .map_or_else(|| DocumentInfo::from_doc(&doc), |d| DocumentInfo::from_doc(&d));

    Ok(CreateDocumentOutput {
        operation: "create_document",
        document_info,
        path,
        sections_created,
        timestamp: timestamp(),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn manager_in(dir: &TempDir) -> DocumentManager {
        DocumentManager::with_root(dir.path().to_path_buf(), 8)
    }

    #[tokio::test]
    async fn test_create_with_sections_in_order() {
        let dir = TempDir::new().unwrap();
        let manager = manager_in(&dir);

        let output = handle_create_document(
            CreateDocumentParams {
                path: "/specs/auth".into(),
                title: "Auth Spec".into(),
                overview: Some("Token flows.".into()),
                sections: vec![
                    InitialSection {
                        title: "Goals".into(),
                        content: "g".into(),
                    },
                    InitialSection {
                        title: "Non Goals".into(),
                        content: "ng".into(),
                    },
                ],
            },
            &manager,
        )
        .await
        .unwrap();

        assert_eq!(output.path, "/specs/auth.md");
        assert_eq!(output.sections_created, vec!["goals", "non-goals"]);

        let doc = manager.get_document("/specs/auth.md").await.unwrap().unwrap();
        let slugs: Vec<&str> = doc.headings.iter().map(|h| h.slug.as_str()).collect();
        assert_eq!(slugs, vec!["auth-spec", "goals", "non-goals"]);
        assert_eq!(doc.overview(), "Token flows.");
    }

    #[tokio::test]
    async fn test_create_existing_path_fails() {
        let dir = TempDir::new().unwrap();
        let manager = manager_in(&dir);

        let params = CreateDocumentParams {
            path: "/doc".into(),
            title: "Doc".into(),
            overview: None,
            sections: vec![],
        };
        handle_create_document(params.clone(), &manager).await.unwrap();
        let err = handle_create_document(params, &manager).await.unwrap_err();
        assert_eq!(err.core_code(), Some("DEST_EXISTS"));
    }

    #[tokio::test]
    async fn test_empty_title_is_rejected() {
        let dir = TempDir::new().unwrap();
        let manager = manager_in(&dir);

        let err = handle_create_document(
            CreateDocumentParams {
                path: "/doc".into(),
                title: "  ".into(),
                overview: None,
                sections: vec![],
            },
            &manager,
        )
        .await
        .unwrap_err();
        assert_eq!(err.core_code(), Some("EMPTY_CONTENT"));
    }
}
