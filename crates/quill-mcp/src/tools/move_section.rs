//! Move-section tool: relocate a section within or across documents.

use quill_core::{DocumentManager, InsertMode};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::{McpError, McpResult};
use crate::tools::resolve_target;
use crate::types::{DocumentInfo, timestamp};

/// Placement of the moved section relative to the reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Position {
    /// Immediately before the reference section.
    InsertBefore,
    /// After the reference section's subtree.
    InsertAfter,
    /// As the reference's last child.
    AppendChild,
}

impl From<Position> for InsertMode {
    fn from(value: Position) -> Self {
        match value {
            Position::InsertBefore => Self::InsertBefore,
            Position::InsertAfter => Self::InsertAfter,
            Position::AppendChild => Self::AppendChild,
        }
    }
}

/// Parameters for the move-section tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct MoveSectionParams {
    /// Address of the section to move, e.g. `/a.md#setup`.
    pub from: String,
    /// Address of the reference section at the destination, e.g.
    /// `/b.md#anchor`. May be in the same document as `from`.
    pub to: String,
    /// Where to place the section relative to the reference.
    #[serde(default = "default_position")]
    pub position: Position,
    /// Optional explicit depth.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub depth_hint: Option<u8>,
}

const fn default_position() -> Position {
    Position::InsertAfter
}

/// Output of the move-section tool.
#[derive(Debug, Serialize)]
pub struct MoveSectionOutput {
    /// Always `"move_section"`.
    pub operation: &'static str,
    /// Destination document identity.
    pub document_info: DocumentInfo,
    /// Slug of the section at its new location.
    pub new_section: String,
    /// Depth at the new location.
    pub depth: u8,
    /// Response timestamp (RFC-3339).
    pub timestamp: String,
}

/// Handler for the move-section tool.
#[tracing::instrument(skip(manager))]
pub async fn handle_move_section(
    params: MoveSectionParams,
    manager: &DocumentManager,
) -> McpResult<MoveSectionOutput> {
    let source = resolve_target(manager, &params.from).await?;
    let Some(source_section) = source.section else {
        return Err(McpError::InvalidParams(format!(
            "'{}' does not address a section",
            params.from
        )));
    };

    let dest = resolve_target(manager, &params.to).await?;
    let Some(reference) = dest.section else {
        return Err(McpError::InvalidParams(format!(
            "'{}' does not address a reference section",
            params.to
        )));
    };

    let moved = manager
        .move_section(
            &source.path,
            &source_section.slug,
            &dest.path,
            &reference.slug,
            params.position.into(),
            params.depth_hint,
        )
        .await?;

    let document_info = manager
        .get_document(&dest.path)
        .await?
        .map_or_else(|| DocumentInfo::from_doc(&dest.doc), |d| DocumentInfo::from_doc(&d));

    Ok(MoveSectionOutput {
        operation: "move_section",
        document_info,
        new_section: moved.slug,
        depth: moved.depth,
        timestamp: timestamp(),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn setup() -> (DocumentManager, TempDir) {
        let dir = TempDir::new().unwrap();
        tokio::fs::write(
            dir.path().join("a.md"),
            "# A\n\n## Payload\n\np\n\n## Other\n\no\n",
        )
        .await
        .unwrap();
        tokio::fs::write(dir.path().join("b.md"), "# B\n\n## Anchor\n\nan\n")
            .await
            .unwrap();
        (DocumentManager::with_root(dir.path().to_path_buf(), 8), dir)
    }

    #[tokio::test]
    async fn test_cross_document_move() {
        let (manager, _dir) = setup().await;
        let output = handle_move_section(
            MoveSectionParams {
                from: "/a.md#payload".into(),
                to: "/b.md#anchor".into(),
                position: Position::AppendChild,
                depth_hint: None,
            },
            &manager,
        )
        .await
        .unwrap();

        assert_eq!(output.new_section, "payload");
        assert_eq!(output.depth, 3);
        assert_eq!(output.document_info.slug, "b");

        let a = manager.get_document("/a.md").await.unwrap().unwrap();
        assert!(!a.slug_index.contains_key("payload"));
        let b = manager.get_document("/b.md").await.unwrap().unwrap();
        assert!(b.slug_index.contains_key("payload"));
    }

    #[tokio::test]
    async fn test_same_document_move() {
        let (manager, _dir) = setup().await;
        let output = handle_move_section(
            MoveSectionParams {
                from: "/a.md#payload".into(),
                to: "/a.md#other".into(),
                position: Position::InsertAfter,
                depth_hint: None,
            },
            &manager,
        )
        .await
        .unwrap();
        assert_eq!(output.new_section, "payload");

        let a = manager.get_document("/a.md").await.unwrap().unwrap();
        let slugs: Vec<&str> = a.headings.iter().map(|h| h.slug.as_str()).collect();
        assert_eq!(slugs, vec!["a", "other", "payload"]);
    }

    #[tokio::test]
    async fn test_missing_fragment_is_invalid_params() {
        let (manager, _dir) = setup().await;
        let err = handle_move_section(
            MoveSectionParams {
                from: "/a.md".into(),
                to: "/b.md#anchor".into(),
                position: Position::InsertAfter,
                depth_hint: None,
            },
            &manager,
        )
        .await
        .unwrap_err();
        assert_eq!(err.error_code(), -32602);
    }
}
