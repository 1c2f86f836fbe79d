//! The document manager: the facade every tool calls.
//!
//! Wraps the cache, the file I/O layer, and the section engine behind one
//! set of operations. Every mutation follows the same protocol:
//!
//! 1. acquire the per-path exclusive lock,
//! 2. snapshot the file (`content` + mtime),
//! 3. compute the new content with a pure section-engine function,
//! 4. conditionally write (fails `CONCURRENT_MODIFICATION` if the file
//!    changed since the snapshot),
//! 5. invalidate the cache entry,
//! 6. release the lock.
//!
//! On a conflict the cache is left untouched, so the next reader reloads the
//! winning content from disk. Reads take the same lock, which is what
//! coalesces concurrent loads of one document into a single parse.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::cache::DocumentCache;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::fsio;
use crate::paths::DocPath;
use crate::section::{self, InsertMode, UpdateMode};
use crate::types::CachedDocument;

/// Audit sidecar written next to an archived document.
///
/// Field names are part of the on-disk format.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditRecord {
    /// Canonical path the document lived at before archival.
    pub original_path: String,
    /// When the archive happened.
    pub archived_at: DateTime<Utc>,
    /// Caller-supplied reason, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Result of archiving a document.
#[derive(Debug, Clone)]
pub struct ArchiveOutcome {
    /// Canonical path of the archived copy.
    pub archived_path: String,
    /// The audit record that was written beside it.
    pub audit: AuditRecord,
}

/// Result of creating a section.
#[derive(Debug, Clone)]
pub struct CreatedSection {
    /// Slug of the new section.
    pub slug: String,
    /// Depth it was created at.
    pub depth: u8,
}

/// One entry in a bulk section edit.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "operation", rename_all = "snake_case")]
pub enum BulkEdit {
    /// Overwrite a section body.
    Replace {
        /// Target section slug.
        section: String,
        /// New body.
        content: String,
    },
    /// Append to a section body.
    Append {
        /// Target section slug.
        section: String,
        /// Appended content.
        content: String,
    },
    /// Prepend to a section body.
    Prepend {
        /// Target section slug.
        section: String,
        /// Prepended content.
        content: String,
    },
    /// Create a new section relative to a reference section.
    InsertBefore {
        /// Reference section slug.
        section: String,
        /// New section title.
        title: String,
        /// New section body.
        content: String,
        /// Optional explicit depth.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        depth_hint: Option<u8>,
    },
    /// As [`BulkEdit::InsertBefore`], placed after the reference subtree.
    InsertAfter {
        /// Reference section slug.
        section: String,
        /// New section title.
        title: String,
        /// New section body.
        content: String,
        /// Optional explicit depth.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        depth_hint: Option<u8>,
    },
    /// As [`BulkEdit::InsertBefore`], placed as the reference's last child.
    AppendChild {
        /// Reference section slug.
        section: String,
        /// New section title.
        title: String,
        /// New section body.
        content: String,
    },
    /// Remove a section and its subtree.
    Remove {
        /// Target section slug.
        section: String,
    },
}

impl BulkEdit {
    fn section(&self) -> &str {
        match self {
            Self::Replace { section, .. }
            | Self::Append { section, .. }
            | Self::Prepend { section, .. }
            | Self::InsertBefore { section, .. }
            | Self::InsertAfter { section, .. }
            | Self::AppendChild { section, .. }
            | Self::Remove { section } => section,
        }
    }
}

/// Per-item outcome of a bulk edit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkEditResult {
    /// `updated`, `created`, or `error`.
    pub status: BulkEditStatus,
    /// The slug the item addressed; for creations, the new section's slug.
    pub section: String,
    /// Error message when `status` is `error`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Removed markdown for `remove` items.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub removed_content: Option<String>,
}

/// Status of one bulk-edit item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BulkEditStatus {
    /// An existing section was modified or removed.
    Updated,
    /// A new section was created.
    Created,
    /// The item failed; later items were still attempted.
    Error,
}

/// Top-level facade over the cache, file I/O, and section engine.
pub struct DocumentManager {
    cache: DocumentCache,
}

impl DocumentManager {
    /// Build a manager from configuration.
    #[must_use]
    pub fn new(config: &Config) -> Self {
        Self::with_root(config.workspace.root.clone(), config.cache.max_documents)
    }

    /// Build a manager over an explicit workspace root.
    #[must_use]
    pub fn with_root(root: PathBuf, max_documents: usize) -> Self {
        Self {
            cache: DocumentCache::new(root, max_documents),
        }
    }

    /// The workspace root.
    #[must_use]
    pub fn root(&self) -> &Path {
        self.cache.root()
    }

    /// The underlying cache (stats and direct access for embedders).
    #[must_use]
    pub fn cache(&self) -> &DocumentCache {
        &self.cache
    }

    /// Fetch a document, or `None` if no file exists at the path.
    #[instrument(skip(self))]
    pub async fn get_document(&self, path: &str) -> Result<Option<CachedDocument>> {
        let path = DocPath::parse(path)?;
        let lock = self.cache.lock_for(path.as_str()).await;
        let _guard = lock.lock().await;
        self.cache.get(&path).await
    }

    /// Fetch a section body, or `None` if the document or slug is unknown.
    #[instrument(skip(self))]
    pub async fn get_section_content(&self, path: &str, slug: &str) -> Result<Option<String>> {
        let path = DocPath::parse(path)?;
        let lock = self.cache.lock_for(path.as_str()).await;
        let _guard = lock.lock().await;
        self.cache.section_content(&path, slug).await
    }

    /// Create a new document with a title heading and optional overview.
    #[instrument(skip(self, overview))]
    pub async fn create_document(
        &self,
        path: &str,
        title: &str,
        overview: Option<&str>,
    ) -> Result<CachedDocument> {
        let path = DocPath::parse(path)?;
        let title = title.trim();
        if title.is_empty() {
            return Err(Error::EmptyContent);
        }

        let lock = self.cache.lock_for(path.as_str()).await;
        let _guard = lock.lock().await;

        let mut content = format!("# {title}\n");
        if let Some(overview) = overview.map(str::trim).filter(|o| !o.is_empty()) {
            content.push('\n');
            content.push_str(overview);
            content.push('\n');
        }

        let abs = path.resolve(self.cache.root());
        fsio::write_new(&abs, &content).await.map_err(|e| match e {
            Error::DestExists(_) => Error::DestExists(path.as_str().to_string()),
            other => other,
        })?;
        info!(path = path.as_str(), "document created");

        self.cache
            .get(&path)
            .await?
            .ok_or_else(|| Error::DocNotFound(path.as_str().to_string()))
    }

    /// Overwrite, append to, or prepend to a section body.
    #[instrument(skip(self, body))]
    pub async fn update_section(
        &self,
        path: &str,
        slug: &str,
        body: &str,
        mode: UpdateMode,
    ) -> Result<()> {
        let path = DocPath::parse(path)?;
        self.mutate(&path, |content| {
            Ok((section::update_section(content, slug, body, mode)?, ()))
        })
        .await
    }

    /// Create a new section relative to `ref_slug` and return its identity.
    #[instrument(skip(self, body))]
    pub async fn insert_section(
        &self,
        path: &str,
        ref_slug: &str,
        mode: InsertMode,
        depth_hint: Option<u8>,
        title: &str,
        body: &str,
    ) -> Result<CreatedSection> {
        let path = DocPath::parse(path)?;
        self.mutate(&path, |content| {
            let outcome = section::insert_section(content, ref_slug, mode, depth_hint, title, body)?;
            Ok((
                outcome.content,
                CreatedSection {
                    slug: outcome.slug,
                    depth: outcome.depth,
                },
            ))
        })
        .await
    }

    /// Remove a section and its subtree; returns the removed markdown.
    #[instrument(skip(self))]
    pub async fn delete_section(&self, path: &str, slug: &str) -> Result<String> {
        let path = DocPath::parse(path)?;
        self.mutate(&path, |content| {
            let outcome = section::remove_section(content, slug)?;
            Ok((outcome.content, outcome.removed))
        })
        .await
    }

    /// Rewrite a section's heading line; returns the new slug.
    #[instrument(skip(self))]
    pub async fn rename_section(&self, path: &str, slug: &str, new_title: &str) -> Result<String> {
        let path = DocPath::parse(path)?;
        self.mutate(&path, |content| {
            let outcome = section::rename_heading(content, slug, new_title)?;
            Ok((outcome.content, outcome.new_slug))
        })
        .await
    }

    /// Rewrite the document's H1 title.
    #[instrument(skip(self))]
    pub async fn rename_title(&self, path: &str, new_title: &str) -> Result<()> {
        let path = DocPath::parse(path)?;
        self.mutate(&path, |content| {
            Ok((section::rename_title(content, new_title)?.content, ()))
        })
        .await
    }

    /// Rename a document, carrying its cache entry to the new path.
    #[instrument(skip(self))]
    pub async fn rename_document(&self, path: &str, new_path: &str) -> Result<()> {
        self.move_document(path, new_path).await
    }

    /// Move a document to a new path, creating missing directories.
    #[instrument(skip(self))]
    pub async fn move_document(&self, old_path: &str, new_path: &str) -> Result<()> {
        let old = DocPath::parse(old_path)?;
        let new = DocPath::parse(new_path)?;
        if old == new {
            return Err(Error::DestExists(new.as_str().to_string()));
        }

        let _guards = self.lock_pair(&old, &new).await;

        let from = old.resolve(self.cache.root());
        let to = new.resolve(self.cache.root());
        fsio::rename_file(&from, &to).await.map_err(|e| match e {
            Error::DocNotFound(_) => Error::DocNotFound(old.as_str().to_string()),
            Error::DestExists(_) => Error::DestExists(new.as_str().to_string()),
            other => other,
        })?;

        self.cache.carry(old.as_str(), &new).await;
        info!(from = old.as_str(), to = new.as_str(), "document moved");
        Ok(())
    }

    /// Move a document under `/archived` and write its audit sidecar.
    #[instrument(skip(self))]
    pub async fn archive_document(
        &self,
        path: &str,
        reason: Option<&str>,
    ) -> Result<ArchiveOutcome> {
        let source = DocPath::parse(path)?;
        let dest = source.archived();

        let _guards = self.lock_pair(&source, &dest).await;

        let from = source.resolve(self.cache.root());
        let to = dest.resolve(self.cache.root());
        fsio::rename_file(&from, &to).await.map_err(|e| match e {
            Error::DocNotFound(_) => Error::DocNotFound(source.as_str().to_string()),
            Error::DestExists(_) => Error::DestExists(dest.as_str().to_string()),
            other => other,
        })?;

        let audit = AuditRecord {
            original_path: source.as_str().to_string(),
            archived_at: Utc::now(),
            reason: reason.map(str::to_string),
        };
        let sidecar = to.with_file_name(format!("{}.audit", dest.file_name()));
        let json = serde_json::to_string_pretty(&audit)
            .map_err(|e| Error::Io(std::io::Error::other(e)))?;
        tokio::fs::write(&sidecar, json)
            .await
            .map_err(|e| Error::from_io(e, &sidecar))?;

        self.cache.invalidate(source.as_str()).await;
        info!(path = source.as_str(), to = dest.as_str(), "document archived");

        Ok(ArchiveOutcome {
            archived_path: dest.as_str().to_string(),
            audit,
        })
    }

    /// Permanently remove a document.
    #[instrument(skip(self))]
    pub async fn delete_document(&self, path: &str) -> Result<()> {
        let path = DocPath::parse(path)?;
        let lock = self.cache.lock_for(path.as_str()).await;
        let _guard = lock.lock().await;

        let abs = path.resolve(self.cache.root());
        fsio::remove_file(&abs).await.map_err(|e| match e {
            Error::DocNotFound(_) => Error::DocNotFound(path.as_str().to_string()),
            other => other,
        })?;
        self.cache.invalidate(path.as_str()).await;
        info!(path = path.as_str(), "document deleted");
        Ok(())
    }

    /// Move a section (and its subtree) to a new position, possibly in a
    /// different document.
    ///
    /// Same-document moves remove first and re-create, restoring the
    /// original section if creation fails (`MOVE_ROLLBACK_FAILED` when even
    /// that write fails). Cross-document moves create at the destination
    /// first and only then remove from the source; a failure on the source
    /// side leaves duplicate content and reports `MOVE_PARTIAL`.
    #[instrument(skip(self))]
    #[allow(clippy::too_many_arguments)]
    pub async fn move_section(
        &self,
        source_path: &str,
        source_slug: &str,
        dest_path: &str,
        ref_slug: &str,
        mode: InsertMode,
        depth_hint: Option<u8>,
    ) -> Result<CreatedSection> {
        let source = DocPath::parse(source_path)?;
        let dest = DocPath::parse(dest_path)?;

        if source == dest {
            self.move_section_same_doc(&source, source_slug, ref_slug, mode, depth_hint)
                .await
        } else {
            self.move_section_cross_doc(&source, source_slug, &dest, ref_slug, mode, depth_hint)
                .await
        }
    }

    /// Apply several section edits in order on one snapshot.
    ///
    /// Items never short-circuit: a failing item records an `error` status
    /// and later items still run against the last good content. The file is
    /// written once at the end, only if at least one item succeeded.
    #[instrument(skip(self, edits))]
    pub async fn edit_sections(
        &self,
        path: &str,
        edits: Vec<BulkEdit>,
    ) -> Result<Vec<BulkEditResult>> {
        let path = DocPath::parse(path)?;
        let lock = self.cache.lock_for(path.as_str()).await;
        let _guard = lock.lock().await;

        let abs = path.resolve(self.cache.root());
        let snapshot = fsio::read_snapshot(&abs).await.map_err(|e| match e {
            Error::DocNotFound(_) => Error::DocNotFound(path.as_str().to_string()),
            other => other,
        })?;

        let mut content = snapshot.content.clone();
        let mut results = Vec::with_capacity(edits.len());
        let mut changed = false;

        for edit in edits {
            match Self::apply_bulk_edit(&content, &edit) {
                Ok((new_content, result)) => {
                    content = new_content;
                    changed = true;
                    results.push(result);
                },
                Err(e) => {
                    warn!(path = path.as_str(), section = edit.section(), error = %e, "bulk edit item failed");
                    results.push(BulkEditResult {
                        status: BulkEditStatus::Error,
                        section: edit.section().to_string(),
                        error: Some(format!("{} ({})", e, e.code())),
                        removed_content: None,
                    });
                },
            }
        }

        if changed {
            fsio::write_if_unchanged(&abs, &content, snapshot.mtime_ms).await?;
            self.cache.invalidate(path.as_str()).await;
        }
        Ok(results)
    }

    fn apply_bulk_edit(content: &str, edit: &BulkEdit) -> Result<(String, BulkEditResult)> {
        let ok = |status: BulkEditStatus, section: String, removed: Option<String>| BulkEditResult {
            status,
            section,
            error: None,
            removed_content: removed,
        };

        match edit {
            BulkEdit::Replace { section, content: body } => {
                let new = section::update_section(content, section, body, UpdateMode::Replace)?;
                Ok((new, ok(BulkEditStatus::Updated, section.clone(), None)))
            },
            BulkEdit::Append { section, content: body } => {
                let new = section::update_section(content, section, body, UpdateMode::Append)?;
                Ok((new, ok(BulkEditStatus::Updated, section.clone(), None)))
            },
            BulkEdit::Prepend { section, content: body } => {
                let new = section::update_section(content, section, body, UpdateMode::Prepend)?;
                Ok((new, ok(BulkEditStatus::Updated, section.clone(), None)))
            },
            BulkEdit::InsertBefore { section, title, content: body, depth_hint } => {
                let outcome = section::insert_section(
                    content,
                    section,
                    InsertMode::InsertBefore,
                    *depth_hint,
                    title,
                    body,
                )?;
                Ok((outcome.content, ok(BulkEditStatus::Created, outcome.slug, None)))
            },
            BulkEdit::InsertAfter { section, title, content: body, depth_hint } => {
                let outcome = section::insert_section(
                    content,
                    section,
                    InsertMode::InsertAfter,
                    *depth_hint,
                    title,
                    body,
                )?;
                Ok((outcome.content, ok(BulkEditStatus::Created, outcome.slug, None)))
            },
            BulkEdit::AppendChild { section, title, content: body } => {
                let outcome = section::insert_section(
                    content,
                    section,
                    InsertMode::AppendChild,
                    None,
                    title,
                    body,
                )?;
                Ok((outcome.content, ok(BulkEditStatus::Created, outcome.slug, None)))
            },
            BulkEdit::Remove { section } => {
                let outcome = section::remove_section(content, section)?;
                Ok((
                    outcome.content,
                    ok(BulkEditStatus::Updated, section.clone(), Some(outcome.removed)),
                ))
            },
        }
    }

    /// Read-modify-write protocol shared by the single-edit operations.
    async fn mutate<T, F>(&self, path: &DocPath, edit: F) -> Result<T>
    where
        F: FnOnce(&str) -> Result<(String, T)>,
    {
        let lock = self.cache.lock_for(path.as_str()).await;
        let _guard = lock.lock().await;

        let abs = path.resolve(self.cache.root());
        let snapshot = fsio::read_snapshot(&abs).await.map_err(|e| match e {
            Error::DocNotFound(_) => Error::DocNotFound(path.as_str().to_string()),
            other => other,
        })?;

        let (new_content, out) = edit(&snapshot.content)?;
        fsio::write_if_unchanged(&abs, &new_content, snapshot.mtime_ms).await?;
        self.cache.invalidate(path.as_str()).await;
        Ok(out)
    }

    /// Lock two paths in canonical order so concurrent cross-document
    /// operations cannot deadlock.
    async fn lock_pair(
        &self,
        a: &DocPath,
        b: &DocPath,
    ) -> (tokio::sync::OwnedMutexGuard<()>, Option<tokio::sync::OwnedMutexGuard<()>>) {
        let (first, second) = if a.as_str() <= b.as_str() { (a, b) } else { (b, a) };
        let first_lock = self.cache.lock_for(first.as_str()).await;
        let first_guard = first_lock.lock_owned().await;
        if first.as_str() == second.as_str() {
            return (first_guard, None);
        }
        let second_lock = self.cache.lock_for(second.as_str()).await;
        let second_guard = second_lock.lock_owned().await;
        (first_guard, Some(second_guard))
    }

    async fn move_section_same_doc(
        &self,
        path: &DocPath,
        source_slug: &str,
        ref_slug: &str,
        mode: InsertMode,
        depth_hint: Option<u8>,
    ) -> Result<CreatedSection> {
        let lock = self.cache.lock_for(path.as_str()).await;
        let _guard = lock.lock().await;

        let abs = path.resolve(self.cache.root());
        let snapshot = fsio::read_snapshot(&abs).await.map_err(|e| match e {
            Error::DocNotFound(_) => Error::DocNotFound(path.as_str().to_string()),
            other => other,
        })?;

        let (title, body) = section_payload(&snapshot.content, source_slug)?;

        // Remove first; a same-document create-then-remove would collide on
        // the slug before the removal happened.
        let removal = section::remove_section(&snapshot.content, source_slug)?;
        let mtime_after_remove =
            fsio::write_if_unchanged(&abs, &removal.content, snapshot.mtime_ms).await?;

        let created = section::insert_section(
            &removal.content,
            ref_slug,
            mode,
            depth_hint,
            &title,
            &body,
        )
        .map(|outcome| (outcome.content, outcome.slug, outcome.depth));

        match created {
            Ok((new_content, slug, depth)) => {
                match fsio::write_if_unchanged(&abs, &new_content, mtime_after_remove).await {
                    Ok(_) => {
                        self.cache.invalidate(path.as_str()).await;
                        Ok(CreatedSection { slug, depth })
                    },
                    Err(write_err) => {
                        self.rollback_same_doc(path, &abs, &snapshot.content, mtime_after_remove, &removal.removed, write_err)
                            .await
                    },
                }
            },
            Err(create_err) => {
                self.rollback_same_doc(path, &abs, &snapshot.content, mtime_after_remove, &removal.removed, create_err)
                    .await
            },
        }
    }

    async fn rollback_same_doc(
        &self,
        path: &DocPath,
        abs: &Path,
        original: &str,
        expected_mtime: u64,
        removed: &str,
        cause: Error,
    ) -> Result<CreatedSection> {
        warn!(path = path.as_str(), error = %cause, "same-document move failed, rolling back");
        match fsio::write_if_unchanged(abs, original, expected_mtime).await {
            Ok(_) => {
                self.cache.invalidate(path.as_str()).await;
                Err(cause)
            },
            Err(rollback_err) => {
                // Content-loss risk: the removed section is gone from disk
                // and could not be restored. Carry it in the error message.
                self.cache.invalidate(path.as_str()).await;
                Err(Error::MoveRollbackFailed(format!(
                    "{cause}; rollback failed: {rollback_err}; removed content:\n{removed}"
                )))
            },
        }
    }

    async fn move_section_cross_doc(
        &self,
        source: &DocPath,
        source_slug: &str,
        dest: &DocPath,
        ref_slug: &str,
        mode: InsertMode,
        depth_hint: Option<u8>,
    ) -> Result<CreatedSection> {
        let _guards = self.lock_pair(source, dest).await;

        let source_abs = source.resolve(self.cache.root());
        let source_snapshot = fsio::read_snapshot(&source_abs).await.map_err(|e| match e {
            Error::DocNotFound(_) => Error::DocNotFound(source.as_str().to_string()),
            other => other,
        })?;
        let (title, body) = section_payload(&source_snapshot.content, source_slug)?;

        // Destination first: until the copy is durable, the source stays
        // intact.
        let dest_abs = dest.resolve(self.cache.root());
        let dest_snapshot = fsio::read_snapshot(&dest_abs).await.map_err(|e| match e {
            Error::DocNotFound(_) => Error::DocNotFound(dest.as_str().to_string()),
            other => other,
        })?;
        let inserted = section::insert_section(
            &dest_snapshot.content,
            ref_slug,
            mode,
            depth_hint,
            &title,
            &body,
        )?;
        fsio::write_if_unchanged(&dest_abs, &inserted.content, dest_snapshot.mtime_ms).await?;
        self.cache.invalidate(dest.as_str()).await;

        // Now remove from the source; failure here leaves duplicates.
        let source_result: Result<()> = async {
            let removal = section::remove_section(&source_snapshot.content, source_slug)?;
            fsio::write_if_unchanged(&source_abs, &removal.content, source_snapshot.mtime_ms)
                .await?;
            Ok(())
        }
        .await;

        match source_result {
            Ok(()) => {
                self.cache.invalidate(source.as_str()).await;
                Ok(CreatedSection {
                    slug: inserted.slug,
                    depth: inserted.depth,
                })
            },
            Err(e) => {
                warn!(
                    source = source.as_str(),
                    dest = dest.as_str(),
                    error = %e,
                    "cross-document move copied but failed to remove source"
                );
                Err(Error::MovePartial(format!(
                    "section '{source_slug}' was copied to {} but removing it from {} failed: {e}",
                    dest.as_str(),
                    source.as_str()
                )))
            },
        }
    }
}

/// Title and body of a section, as a creation payload for a move.
fn section_payload(content: &str, slug: &str) -> Result<(String, String)> {
    let headings = crate::parser::scan(content)?;
    let heading = headings
        .iter()
        .find(|h| h.slug == slug)
        .ok_or_else(|| Error::SectionNotFound(slug.to_string()))?;
    if heading.depth == 1 {
        return Err(Error::CannotRemoveTitle);
    }
    let title = heading.title.clone();
    let body = section::read_section(content, slug)?
        .ok_or_else(|| Error::SectionNotFound(slug.to_string()))?;
    Ok((title, body))
}
