//! Quill MCP server.
//!
//! Exposes the quill document manager to LLM agents over the Model Context
//! Protocol: structured reads (documents, sections, tasks) and
//! section-addressed edits (replace/append/prepend, insert, remove, rename,
//! move, archive) with optimistic concurrency against the filesystem.

/// Error types with JSON-RPC code mapping
pub mod error;
/// The stdio server
pub mod server;
/// Per-tool handlers
pub mod tools;
/// Shared response fragments
pub mod types;

pub use error::{McpError, McpResult};
pub use server::QuillServer;

/// Run the MCP server over stdio.
///
/// # Errors
///
/// Returns an error if configuration cannot be loaded or the server fails
/// to initialize.
pub async fn serve_stdio() -> McpResult<()> {
    // Logs go to stderr; stdout belongs to the protocol.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    tracing::debug!("initializing quill MCP server");

    let server = QuillServer::new()?;
    server.serve_stdio().await
}
