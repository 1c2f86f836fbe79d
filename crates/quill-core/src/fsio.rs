//! Snapshot reads and conditional writes.
//!
//! This module is the only place quill-core touches the filesystem, and its
//! functions are the crate's only suspension points. The contract is small:
//! a read captures `(content, mtime)` as a snapshot, and a write commits
//! only if the file's mtime still equals the snapshot's. That mtime guard is
//! the sole cross-process concurrency control; in-process ordering is the
//! cache's per-path lock.
//!
//! Writes go to a temporary sibling file first and are committed with a
//! rename, so a failed precondition or a mid-write crash leaves the original
//! file intact.

use std::path::Path;
use std::time::UNIX_EPOCH;

use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::error::{Error, Result};

/// A single read of a document: its bytes plus the mtime observed at read
/// time. Used as the precondition for a later conditional write.
#[derive(Debug, Clone)]
pub struct FileSnapshot {
    /// The file content as UTF-8 text.
    pub content: String,
    /// File mtime in milliseconds at read time.
    pub mtime_ms: u64,
}

fn mtime_ms_of(meta: &std::fs::Metadata) -> Result<u64> {
    let modified = meta.modified().map_err(Error::Io)?;
    let since_epoch = modified
        .duration_since(UNIX_EPOCH)
        .map_err(|e| Error::Io(std::io::Error::other(e)))?;
    u64::try_from(since_epoch.as_millis())
        .map_err(|e| Error::Io(std::io::Error::other(e)))
}

/// Read a whole file together with its mtime.
///
/// # Errors
///
/// [`Error::DocNotFound`] when the file does not exist; I/O errors
/// otherwise.
pub async fn read_snapshot(path: &Path) -> Result<FileSnapshot> {
    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(Error::DocNotFound(path.display().to_string()));
        },
        Err(e) => return Err(Error::from_io(e, path)),
    };
    let meta = tokio::fs::metadata(path)
        .await
        .map_err(|e| Error::from_io(e, path))?;

    Ok(FileSnapshot {
        content,
        mtime_ms: mtime_ms_of(&meta)?,
    })
}

/// The file's current mtime in milliseconds, or `None` if it does not exist.
pub async fn stat_mtime_ms(path: &Path) -> Result<Option<u64>> {
    match tokio::fs::metadata(path).await {
        Ok(meta) => Ok(Some(mtime_ms_of(&meta)?)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(Error::from_io(e, path)),
    }
}

/// Write `content` iff the file's mtime still equals `expected_mtime_ms`.
///
/// The new content lands in a temporary sibling file that is renamed over
/// the original, so the original survives any failure before the rename.
/// Returns the committed file's mtime for callers that chain edits.
///
/// # Errors
///
/// [`Error::ConcurrentModification`] when the file changed (or vanished)
/// since the snapshot; I/O errors otherwise.
pub async fn write_if_unchanged(
    path: &Path,
    content: &str,
    expected_mtime_ms: u64,
) -> Result<u64> {
    match stat_mtime_ms(path).await? {
        Some(current) if current == expected_mtime_ms => {},
        _ => {
            debug!(path = %path.display(), "conditional write aborted; file changed on disk");
            return Err(Error::ConcurrentModification);
        },
    }

    commit(path, content).await?;
    stat_mtime_ms(path)
        .await?
        .ok_or(Error::ConcurrentModification)
}

/// Create a new file, failing if one already exists at the path.
///
/// Parent directories are created as needed; concurrent creation of the same
/// directory tree is benign.
pub async fn write_new(path: &Path, content: &str) -> Result<()> {
    if tokio::fs::try_exists(path)
        .await
        .map_err(|e| Error::from_io(e, path))?
    {
        return Err(Error::DestExists(path.display().to_string()));
    }
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| Error::from_io(e, parent))?;
    }
    commit(path, content).await
}

/// Remove a file.
///
/// # Errors
///
/// [`Error::DocNotFound`] when the file does not exist.
pub async fn remove_file(path: &Path) -> Result<()> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(Error::DocNotFound(path.display().to_string()))
        },
        Err(e) => Err(Error::from_io(e, path)),
    }
}

/// Rename a file, creating the destination's parent directories.
///
/// # Errors
///
/// [`Error::DocNotFound`] when the source is missing, [`Error::DestExists`]
/// when the destination is already occupied.
pub async fn rename_file(from: &Path, to: &Path) -> Result<()> {
    if !tokio::fs::try_exists(from)
        .await
        .map_err(|e| Error::from_io(e, from))?
    {
        return Err(Error::DocNotFound(from.display().to_string()));
    }
    if tokio::fs::try_exists(to)
        .await
        .map_err(|e| Error::from_io(e, to))?
    {
        return Err(Error::DestExists(to.display().to_string()));
    }
    if let Some(parent) = to.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| Error::from_io(e, parent))?;
    }
    tokio::fs::rename(from, to)
        .await
        .map_err(|e| Error::from_io(e, from))
}

/// Write to a temporary sibling and rename it over the target.
async fn commit(path: &Path, content: &str) -> Result<()> {
    let tmp_path = path.with_extension("md.tmp");

    {
        let mut file = tokio::fs::File::create(&tmp_path)
            .await
            .map_err(|e| Error::from_io(e, &tmp_path))?;
        file.write_all(content.as_bytes())
            .await
            .map_err(|e| Error::from_io(e, &tmp_path))?;
        file.flush()
            .await
            .map_err(|e| Error::from_io(e, &tmp_path))?;
    }

    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|e| Error::from_io(e, path))?;
    debug!(path = %path.display(), bytes = content.len(), "committed write");
    Ok(())
}
