//! Error types for the quill MCP server with JSON-RPC code mapping.

use thiserror::Error;

/// Errors that can occur in the MCP server.
#[derive(Debug, Error)]
pub enum McpError {
    /// A core operation failed; the wire code travels with it.
    #[error("{0}")]
    Core(#[from] quill_core::Error),

    /// Tool arguments failed validation before reaching the core.
    #[error("invalid params: {0}")]
    InvalidParams(String),

    /// JSON serialization/deserialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// Transport-level protocol error.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl McpError {
    /// The quill wire code (`INVALID_PATH`, `SECTION_NOT_FOUND`, …) when the
    /// error came from the core.
    #[must_use]
    pub fn core_code(&self) -> Option<&'static str> {
        match self {
            Self::Core(e) => Some(e.code()),
            _ => None,
        }
    }

    /// Map to a JSON-RPC error code.
    ///
    /// Validation and lookup failures are the caller's problem
    /// (`-32602`); I/O and concurrency failures are the server's
    /// (`-32603`).
    #[must_use]
    pub fn error_code(&self) -> i32 {
        match self {
            Self::Core(e) => match e.category() {
                "io" | "concurrency" | "move" => -32603,
                _ => -32602,
            },
            Self::InvalidParams(_) => -32602,
            Self::Json(_) => -32700,
            Self::Protocol(_) => -32600,
            Self::Internal(_) => -32603,
        }
    }
}

/// Result type alias for MCP operations.
pub type McpResult<T> = Result<T, McpError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_core_errors_keep_their_wire_code() {
        let err = McpError::Core(quill_core::Error::SectionNotFound("s".into()));
        assert_eq!(err.core_code(), Some("SECTION_NOT_FOUND"));
        assert_eq!(err.error_code(), -32602);
    }

    #[test]
    fn test_server_side_failures_map_to_internal() {
        let err = McpError::Core(quill_core::Error::ConcurrentModification);
        assert_eq!(err.error_code(), -32603);

        let err = McpError::Internal("boom".into());
        assert_eq!(err.error_code(), -32603);
        assert_eq!(err.core_code(), None);
    }

    #[test]
    fn test_param_validation_is_invalid_params() {
        let err = McpError::InvalidParams("missing path".into());
        assert_eq!(err.error_code(), -32602);
        assert!(err.to_string().contains("missing path"));
    }
}
