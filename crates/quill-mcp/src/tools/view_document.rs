//! View-document tool: metadata, table of contents, and overview.

use quill_core::{DocumentManager, TocEntry};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::McpResult;
use crate::tools::resolve_target;
use crate::types::{DocumentInfo, timestamp};

/// Parameters for the view-document tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ViewDocumentParams {
    /// Document path, e.g. `/api/specs/auth.md`.
    pub document: String,
}

/// Output of the view-document tool.
#[derive(Debug, Serialize)]
pub struct ViewDocumentOutput {
    /// Document identity.
    pub document_info: DocumentInfo,
    /// Nested table of contents.
    pub toc: Vec<TocEntry>,
    /// Text between the title and the first section.
    pub overview: String,
    /// Slugs of every section, document order.
    pub sections: Vec<String>,
    /// Keyword fingerprint.
    pub keywords: Vec<String>,
    /// Word count.
    pub word_count: usize,
    /// Inline link count.
    pub link_count: usize,
    /// Fenced code block count.
    pub code_block_count: usize,
    /// SHA-256 of the file bytes.
    pub content_hash: String,
    /// File mtime in milliseconds.
    pub last_modified: u64,
    /// Response timestamp (RFC-3339).
    pub timestamp: String,
}

/// Handler for the view-document tool.
#[tracing::instrument(skip(manager))]
pub async fn handle_view_document(
    params: ViewDocumentParams,
    manager: &DocumentManager,
) -> McpResult<ViewDocumentOutput> {
    let target = resolve_target(manager, &params.document).await?;
    let doc = &target.doc;

    Ok(ViewDocumentOutput {
        document_info: DocumentInfo::from_doc(doc),
        toc: doc.toc.clone(),
        overview: doc.overview(),
        sections: doc.headings.iter().map(|h| h.slug.clone()).collect(),
        keywords: doc.metadata.keywords.clone(),
        word_count: doc.metadata.word_count,
        link_count: doc.metadata.link_count,
        code_block_count: doc.metadata.code_block_count,
        content_hash: doc.metadata.content_hash.clone(),
        last_modified: doc.metadata.last_modified,
        timestamp: timestamp(),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn setup(content: &str) -> (DocumentManager, TempDir) {
        let dir = TempDir::new().unwrap();
        tokio::fs::create_dir_all(dir.path().join("api")).await.unwrap();
        tokio::fs::write(dir.path().join("api/auth.md"), content)
            .await
            .unwrap();
        (DocumentManager::with_root(dir.path().to_path_buf(), 8), dir)
    }

    #[tokio::test]
    async fn test_view_document_shape() {
        let (manager, _dir) = setup(
            "# Auth Spec\n\nHow auth works.\n\n## Flows\n\nflow text\n\n### Refresh\n\nr\n",
        )
        .await;

        let output = handle_view_document(
            ViewDocumentParams {
                document: "/api/auth.md".into(),
            },
            &manager,
        )
        .await
        .unwrap();

        assert_eq!(output.document_info.slug, "auth");
        assert_eq!(output.document_info.title, "Auth Spec");
        assert_eq!(output.document_info.namespace, "api");
        assert_eq!(output.overview, "How auth works.");
        assert_eq!(output.sections, vec!["auth-spec", "flows", "refresh"]);
        assert_eq!(output.toc.len(), 1);
        assert!(!output.timestamp.is_empty());
    }

    #[tokio::test]
    async fn test_missing_document_fails_with_code() {
        let (manager, _dir) = setup("# A\n").await;
        let err = handle_view_document(
            ViewDocumentParams {
                document: "/api/ghost.md".into(),
            },
            &manager,
        )
        .await
        .unwrap_err();
        assert_eq!(err.core_code(), Some("DOC_NOT_FOUND"));
    }

    #[tokio::test]
    async fn test_snake_case_serialization() {
        let (manager, _dir) = setup("# A\n\n## B\n\nb\n").await;
        let output = handle_view_document(
            ViewDocumentParams {
                document: "api/auth".into(),
            },
            &manager,
        )
        .await
        .unwrap();

        let json = serde_json::to_value(&output).unwrap();
        assert!(json.get("document_info").is_some());
        assert!(json.get("content_hash").is_some());
        assert!(json["document_info"].get("namespace").is_some());
    }
}
