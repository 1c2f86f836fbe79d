//! Error types and handling for quill-core operations.
//!
//! Every fallible operation in quill-core returns [`Result<T, Error>`]. Each
//! variant carries a fixed wire code (see [`Error::code`]) that tool wrappers
//! surface verbatim to clients, so variants are added but never renamed.
//!
//! ## Error Categories
//!
//! - **Addressing**: `INVALID_PATH`, `DUPLICATE_SLUG`, `NO_TITLE`
//! - **Lookup**: `DOC_NOT_FOUND`, `SECTION_NOT_FOUND`
//! - **Edit policy**: `EMPTY_CONTENT`, `CANNOT_REMOVE_TITLE`, `CREATE_DEPTH_ESCAPE`
//! - **Concurrency**: `CONCURRENT_MODIFICATION`
//! - **Move**: `DEST_EXISTS`, `MOVE_PARTIAL`, `MOVE_ROLLBACK_FAILED`
//! - **I/O**: `PERMISSION_DENIED`, `DISK_FULL`, `IO_ERROR`
//!
//! ## Recovery Hints
//!
//! [`Error::is_recoverable`] reports whether retrying the operation may
//! succeed. Conflicting writes are the canonical recoverable case: the caller
//! re-reads the document and reapplies its edit on the fresh snapshot.

use std::path::Path;

use thiserror::Error;

/// The main error type for quill-core operations.
///
/// Variants map one-to-one onto the wire codes exposed by [`Error::code`].
/// `Display` gives the human-readable message that accompanies the code in
/// tool responses; the underlying I/O error chain is preserved where one
/// exists.
#[derive(Error, Debug)]
pub enum Error {
    /// The supplied document path failed validation or normalization.
    ///
    /// Covers absolute paths outside the workspace root, `..` traversal,
    /// empty base names, and byte sequences that cannot form a file name.
    #[error("invalid document path: {0}")]
    InvalidPath(String),

    /// Two headings in one document derive the same slug.
    ///
    /// The parser keeps the first occurrence and rejects the document; the
    /// author resolves the collision by renaming one of the headings.
    #[error("duplicate section slug '{slug}'; rename one of the conflicting headings")]
    DuplicateSlug {
        /// The slug both headings derive to.
        slug: String,
    },

    /// The document does not start with a level-1 title heading.
    #[error("document has no level-1 title heading")]
    NoTitle,

    /// No document exists at the requested path.
    #[error("document not found: {0}")]
    DocNotFound(String),

    /// The document exists but has no section with the requested slug.
    #[error("section not found: {0}")]
    SectionNotFound(String),

    /// A mutation was given an empty payload where content is required.
    #[error("section content may not be empty")]
    EmptyContent,

    /// An attempt to remove the document's depth-1 title section.
    #[error("cannot remove the document title section")]
    CannotRemoveTitle,

    /// New-section content contains a heading that would escape the subtree.
    ///
    /// Creation payloads may only contain headings strictly deeper than the
    /// section being created.
    #[error("content contains a heading at or above depth {depth}, which would escape the new section")]
    CreateDepthEscape {
        /// Depth of the section being created.
        depth: u8,
    },

    /// The file changed on disk between snapshot and conditional write.
    ///
    /// The write was abandoned and the original file is intact; re-reading
    /// and retrying the edit is the expected recovery.
    #[error("document was modified by another writer; re-read and retry")]
    ConcurrentModification,

    /// The destination of a move, rename, or create already exists.
    #[error("destination already exists: {0}")]
    DestExists(String),

    /// A cross-document section move copied the section but failed to remove
    /// the source, leaving duplicate content behind.
    #[error("section was copied to the destination but could not be removed from the source: {0}")]
    MovePartial(String),

    /// A same-document section move failed and the attempt to restore the
    /// original section also failed. Content may have been lost; the message
    /// carries the removed markdown so the caller can surface it.
    #[error("failed to restore section during move rollback: {0}")]
    MoveRollbackFailed(String),

    /// The operating system denied access to a file under the workspace.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// The disk filled up while writing.
    #[error("no space left on device while writing {0}")]
    DiskFull(String),

    /// Any other I/O failure, with the source error preserved.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Wrap an I/O error, promoting the kinds that have dedicated wire codes.
    pub fn from_io(err: std::io::Error, path: &Path) -> Self {
        match err.kind() {
            std::io::ErrorKind::PermissionDenied => {
                Self::PermissionDenied(path.display().to_string())
            },
            std::io::ErrorKind::StorageFull => Self::DiskFull(path.display().to_string()),
            _ => Self::Io(err),
        }
    }

    /// The fixed wire code for this error.
    ///
    /// Codes are part of the tool-facing contract and never change once
    /// published.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidPath(_) => "INVALID_PATH",
            Self::DuplicateSlug { .. } => "DUPLICATE_SLUG",
            Self::NoTitle => "NO_TITLE",
            Self::DocNotFound(_) => "DOC_NOT_FOUND",
            Self::SectionNotFound(_) => "SECTION_NOT_FOUND",
            Self::EmptyContent => "EMPTY_CONTENT",
            Self::CannotRemoveTitle => "CANNOT_REMOVE_TITLE",
            Self::CreateDepthEscape { .. } => "CREATE_DEPTH_ESCAPE",
            Self::ConcurrentModification => "CONCURRENT_MODIFICATION",
            Self::DestExists(_) => "DEST_EXISTS",
            Self::MovePartial(_) => "MOVE_PARTIAL",
            Self::MoveRollbackFailed(_) => "MOVE_ROLLBACK_FAILED",
            Self::PermissionDenied(_) => "PERMISSION_DENIED",
            Self::DiskFull(_) => "DISK_FULL",
            Self::Io(_) => "IO_ERROR",
        }
    }

    /// Get the error category as a string identifier.
    ///
    /// Useful for grouping in logs and metrics; coarser than [`Error::code`].
    #[must_use]
    pub const fn category(&self) -> &'static str {
        match self {
            Self::InvalidPath(_) | Self::DuplicateSlug { .. } | Self::NoTitle => "addressing",
            Self::DocNotFound(_) | Self::SectionNotFound(_) => "lookup",
            Self::EmptyContent | Self::CannotRemoveTitle | Self::CreateDepthEscape { .. } => {
                "edit_policy"
            },
            Self::ConcurrentModification => "concurrency",
            Self::DestExists(_) | Self::MovePartial(_) | Self::MoveRollbackFailed(_) => "move",
            Self::PermissionDenied(_) | Self::DiskFull(_) | Self::Io(_) => "io",
        }
    }

    /// Check if the error might be resolved by retrying the operation.
    ///
    /// A conflicting write is recoverable by re-reading the document and
    /// reapplying the edit; transient I/O interruptions are recoverable as
    /// they stand. Validation and policy errors are permanent until the
    /// caller changes its input.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::ConcurrentModification => true,
            Self::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::TimedOut | std::io::ErrorKind::Interrupted
            ),
            _ => false,
        }
    }
}

/// Convenience type alias for `std::result::Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_every_variant_has_a_stable_code() {
        let cases: Vec<(Error, &str)> = vec![
            (Error::InvalidPath("x".into()), "INVALID_PATH"),
            (Error::DuplicateSlug { slug: "a".into() }, "DUPLICATE_SLUG"),
            (Error::NoTitle, "NO_TITLE"),
            (Error::DocNotFound("/a.md".into()), "DOC_NOT_FOUND"),
            (Error::SectionNotFound("s".into()), "SECTION_NOT_FOUND"),
            (Error::EmptyContent, "EMPTY_CONTENT"),
            (Error::CannotRemoveTitle, "CANNOT_REMOVE_TITLE"),
            (Error::CreateDepthEscape { depth: 2 }, "CREATE_DEPTH_ESCAPE"),
            (Error::ConcurrentModification, "CONCURRENT_MODIFICATION"),
            (Error::DestExists("/b.md".into()), "DEST_EXISTS"),
            (Error::MovePartial("x".into()), "MOVE_PARTIAL"),
            (Error::MoveRollbackFailed("x".into()), "MOVE_ROLLBACK_FAILED"),
            (Error::PermissionDenied("/p".into()), "PERMISSION_DENIED"),
            (Error::DiskFull("/p".into()), "DISK_FULL"),
            (Error::Io(io::Error::other("boom")), "IO_ERROR"),
        ];

        for (error, expected) in cases {
            assert_eq!(error.code(), expected);
        }
    }

    #[test]
    fn test_display_contains_useful_context() {
        let error = Error::DuplicateSlug {
            slug: "overview".into(),
        };
        assert!(error.to_string().contains("overview"));

        let error = Error::CreateDepthEscape { depth: 3 };
        assert!(error.to_string().contains('3'));

        let error = Error::DocNotFound("/api/specs/auth.md".into());
        assert!(error.to_string().contains("/api/specs/auth.md"));
    }

    #[test]
    fn test_categories() {
        assert_eq!(Error::InvalidPath("x".into()).category(), "addressing");
        assert_eq!(Error::SectionNotFound("s".into()).category(), "lookup");
        assert_eq!(Error::EmptyContent.category(), "edit_policy");
        assert_eq!(Error::ConcurrentModification.category(), "concurrency");
        assert_eq!(Error::MovePartial("x".into()).category(), "move");
        assert_eq!(Error::DiskFull("/p".into()).category(), "io");
    }

    #[test]
    fn test_recoverability() {
        assert!(Error::ConcurrentModification.is_recoverable());
        assert!(Error::Io(io::Error::new(io::ErrorKind::TimedOut, "t")).is_recoverable());
        assert!(Error::Io(io::Error::new(io::ErrorKind::Interrupted, "i")).is_recoverable());

        assert!(!Error::NoTitle.is_recoverable());
        assert!(!Error::EmptyContent.is_recoverable());
        assert!(!Error::DuplicateSlug { slug: "a".into() }.is_recoverable());
        assert!(!Error::Io(io::Error::new(io::ErrorKind::NotFound, "n")).is_recoverable());
    }

    #[test]
    fn test_from_io_promotes_dedicated_kinds() {
        let path = Path::new("/ws/docs/a.md");

        let denied = Error::from_io(io::Error::new(io::ErrorKind::PermissionDenied, "d"), path);
        assert!(matches!(denied, Error::PermissionDenied(_)));
        assert_eq!(denied.code(), "PERMISSION_DENIED");

        let full = Error::from_io(io::Error::new(io::ErrorKind::StorageFull, "f"), path);
        assert!(matches!(full, Error::DiskFull(_)));

        let other = Error::from_io(io::Error::other("misc"), path);
        assert!(matches!(other, Error::Io(_)));
    }

    #[test]
    fn test_io_error_source_chain_preserved() {
        let io_error = io::Error::new(io::ErrorKind::PermissionDenied, "access denied");
        let error: Error = io_error.into();

        let source = std::error::Error::source(&error);
        assert!(source.is_some());
        assert!(source.unwrap().to_string().contains("access denied"));
    }
}
