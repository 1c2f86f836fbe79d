//! Binary entry point for the quill MCP server.

use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    quill_mcp::serve_stdio().await?;
    Ok(())
}
