//! Canonical document paths confined to the workspace root.
//!
//! Clients address documents with POSIX-style paths such as
//! `/api/specs/auth.md`. [`DocPath`] normalizes the accepted spellings
//! (leading `/` optional, `.md` extension implied) and rejects anything that
//! could resolve outside the configured workspace root. All filesystem
//! access in the crate goes through [`DocPath::resolve`], so the root
//! boundary is enforced in exactly one place.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// The namespace reported for documents that live directly under the root.
pub const ROOT_NAMESPACE: &str = "root";

/// A validated, canonical document path.
///
/// The canonical form always starts with `/`, uses `/` separators, and ends
/// in `.md`. Equality and hashing operate on the canonical string, so two
/// spellings of the same document compare equal after parsing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DocPath {
    canonical: String,
}

impl DocPath {
    /// Parse and normalize a client-supplied path.
    ///
    /// Accepted forms: `/a/b/doc.md`, `a/b/doc.md`, `a/b/doc`. Empty
    /// segments and `.` are collapsed; `..`, backslashes, and NUL bytes are
    /// rejected outright rather than resolved.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPath`] for traversal attempts, empty base
    /// names, and segments that cannot form a file name.
    pub fn parse(input: &str) -> Result<Self> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(Error::InvalidPath("path is empty".into()));
        }
        if trimmed.contains('\\') || trimmed.contains('\0') {
            return Err(Error::InvalidPath(format!(
                "'{input}' contains forbidden characters"
            )));
        }
        if trimmed.ends_with('/') {
            return Err(Error::InvalidPath(format!("'{input}' has no file name")));
        }

        let mut segments: Vec<&str> = Vec::new();
        for segment in trimmed.split('/') {
            match segment {
                "" | "." => {},
                ".." => {
                    return Err(Error::InvalidPath(format!(
                        "'{input}' escapes the workspace root"
                    )));
                },
                other => {
                    if other.starts_with('.') {
                        return Err(Error::InvalidPath(format!(
                            "'{input}' contains a hidden path segment"
                        )));
                    }
                    segments.push(other);
                },
            }
        }

        let Some(last) = segments.pop() else {
            return Err(Error::InvalidPath(format!("'{input}' has no file name")));
        };

        let file_name = if last.ends_with(".md") {
            last.to_string()
        } else {
            format!("{last}.md")
        };
        if file_name == ".md" || file_name.trim_end_matches(".md").is_empty() {
            return Err(Error::InvalidPath(format!("'{input}' has an empty base name")));
        }

        let mut canonical = String::with_capacity(trimmed.len() + 4);
        for segment in &segments {
            canonical.push('/');
            canonical.push_str(segment);
        }
        canonical.push('/');
        canonical.push_str(&file_name);

        Ok(Self { canonical })
    }

    /// The canonical path string, always `/…/name.md`.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.canonical
    }

    /// Directory segments joined by `/`, or [`ROOT_NAMESPACE`] when the
    /// document sits directly under the root.
    #[must_use]
    pub fn namespace(&self) -> String {
        match self.canonical.rfind('/') {
            Some(0) | None => ROOT_NAMESPACE.to_string(),
            Some(idx) => self.canonical[1..idx].to_string(),
        }
    }

    /// The document's file stem, used as its slug in responses.
    #[must_use]
    pub fn slug(&self) -> &str {
        let name = self.file_name();
        name.strip_suffix(".md").unwrap_or(name)
    }

    /// The file name component, extension included.
    #[must_use]
    pub fn file_name(&self) -> &str {
        self.canonical
            .rsplit('/')
            .next()
            .unwrap_or(&self.canonical)
    }

    /// Resolve the canonical path to an absolute filesystem path under the
    /// workspace root. Validation at parse time guarantees the result cannot
    /// escape `root`.
    #[must_use]
    pub fn resolve(&self, root: &Path) -> PathBuf {
        let mut abs = root.to_path_buf();
        for segment in self.canonical.split('/').filter(|s| !s.is_empty()) {
            abs.push(segment);
        }
        abs
    }

    /// The canonical path of this document's archived counterpart.
    #[must_use]
    pub fn archived(&self) -> Self {
        Self {
            canonical: format!("/archived{}", self.canonical),
        }
    }
}

impl fmt::Display for DocPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical)
    }
}

impl TryFrom<String> for DocPath {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<DocPath> for String {
    fn from(value: DocPath) -> Self {
        value.canonical
    }
}
