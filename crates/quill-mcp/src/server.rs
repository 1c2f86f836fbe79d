//! MCP server implementation for quill.

use std::sync::Arc;

use quill_core::{Config, DocumentManager};
use rmcp::ServerHandler;
use rmcp::model::{Implementation, ProtocolVersion, ServerCapabilities, ServerInfo};

use crate::error::{McpError, McpResult};

/// MCP server wrapping a shared [`DocumentManager`].
#[derive(Clone)]
pub struct QuillServer {
    manager: Arc<DocumentManager>,
}

impl QuillServer {
    /// Create a server from loaded configuration.
    pub fn new() -> McpResult<Self> {
        let config = Config::load()?;
        Ok(Self::with_manager(DocumentManager::new(&config)))
    }

    /// Create a server over an existing manager.
    #[must_use]
    pub fn with_manager(manager: DocumentManager) -> Self {
        Self {
            manager: Arc::new(manager),
        }
    }

    /// The shared document manager the tool handlers run against.
    #[must_use]
    pub fn manager(&self) -> &Arc<DocumentManager> {
        &self.manager
    }

    /// Serve the MCP protocol over stdio.
    pub async fn serve_stdio(&self) -> McpResult<()> {
        tracing::info!(root = %self.manager.root().display(), "quill MCP server starting");

        let stdin = tokio::io::stdin();
        let stdout = tokio::io::stdout();

        let service = rmcp::serve_server(self.clone(), (stdin, stdout))
            .await
            .map_err(|e| {
                tracing::error!("server initialization error: {}", e);
                McpError::Protocol(e.to_string())
            })?;

        service.waiting().await.map_err(|e| {
            tracing::error!("server runtime error: {}", e);
            McpError::Protocol(e.to_string())
        })?;

        tracing::info!("quill MCP server stopped");
        Ok(())
    }
}

impl ServerHandler for QuillServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::default(),
            capabilities: ServerCapabilities::default(),
            server_info: Implementation {
                name: "quill-mcp".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                title: None,
                icons: None,
                website_url: None,
            },
            instructions: Some(
                "Section-addressable markdown knowledge base. Address documents as \
                 /namespace/doc.md and sections as /namespace/doc.md#slug or #a/b/c."
                    .to_string(),
            ),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_server_info_response() {
        let dir = TempDir::new().unwrap();
        let server = QuillServer::with_manager(DocumentManager::with_root(
            dir.path().to_path_buf(),
            8,
        ));
        let info = server.get_info();

        assert_eq!(info.server_info.name, "quill-mcp");
        assert!(!info.server_info.version.is_empty());
        assert_eq!(info.protocol_version, ProtocolVersion::default());
    }

    #[test]
    fn test_server_info_serialization_size() {
        let dir = TempDir::new().unwrap();
        let server = QuillServer::with_manager(DocumentManager::with_root(
            dir.path().to_path_buf(),
            8,
        ));
        let json = serde_json::to_string(&server.get_info()).unwrap();

        // Keep the handshake small.
        assert!(
            json.len() < 1024,
            "handshake response {} bytes exceeds 1KB",
            json.len()
        );
    }
}
