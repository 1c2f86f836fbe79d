//! In-process document cache with LRU eviction and lazy section entries.
//!
//! The cache maps canonical paths to parsed documents. A lookup re-stats the
//! file and discards the entry the moment the on-disk mtime diverges from
//! the snapshot the entry was parsed from, so callers never observe content
//! older than the file. Section bodies are not materialized at parse time;
//! the first read computes and stores them, tagged with the document
//! generation so a write makes them stale wholesale.
//!
//! ## Locking
//!
//! The cache owns the per-path locks but does not take them itself: the
//! manager acquires [`DocumentCache::lock_for`] around every operation
//! (reads included) and holds it across read-snapshot-modify-write. That
//! gives load coalescing for free — a second reader blocks on the lock and
//! then hits the freshly inserted entry — and serializes mutations on the
//! same path without a second mechanism.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use sha2::{Digest, Sha256};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::fsio;
use crate::keywords;
use crate::parser::MarkdownParser;
use crate::paths::DocPath;
use crate::section;
use crate::types::{CachedDocument, DocumentMetadata, SectionEntry};

/// Counters for cache observability.
#[derive(Debug, Default)]
pub struct CacheStats {
    /// Lookups served from a fresh entry.
    pub hits: AtomicU64,
    /// Lookups that had to load from disk.
    pub misses: AtomicU64,
    /// Entries dropped to honor the size bound.
    pub evictions: AtomicU64,
    /// Entries dropped by explicit invalidation.
    pub invalidations: AtomicU64,
    /// Entries reloaded because the file changed under them.
    pub stale_reloads: AtomicU64,
}

/// Point-in-time view of [`CacheStats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStatsSnapshot {
    /// Lookups served from a fresh entry.
    pub hits: u64,
    /// Lookups that had to load from disk.
    pub misses: u64,
    /// Entries dropped to honor the size bound.
    pub evictions: u64,
    /// Entries dropped by explicit invalidation.
    pub invalidations: u64,
    /// Entries reloaded because the file changed under them.
    pub stale_reloads: u64,
}

/// LRU cache of parsed documents, keyed by canonical path.
pub struct DocumentCache {
    root: PathBuf,
    max_entries: usize,
    entries: RwLock<HashMap<String, CachedDocument>>,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
    /// Per-path generation counters. These survive invalidation so a
    /// document reloaded after a write always observes a larger generation
    /// than before it.
    generations: Mutex<HashMap<String, u64>>,
    stats: CacheStats,
}

impl DocumentCache {
    /// Create a cache over the given workspace root.
    #[must_use]
    pub fn new(root: PathBuf, max_entries: usize) -> Self {
        Self {
            root,
            max_entries: max_entries.max(1),
            entries: RwLock::new(HashMap::new()),
            locks: Mutex::new(HashMap::new()),
            generations: Mutex::new(HashMap::new()),
            stats: CacheStats::default(),
        }
    }

    /// The workspace root this cache resolves paths against.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The exclusive lock for a canonical path.
    ///
    /// Callers hold this across any sequence of cache and filesystem
    /// operations on the path; the cache itself never takes it.
    pub async fn lock_for(&self, path: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        Arc::clone(
            locks
                .entry(path.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(()))),
        )
    }

    /// Advance and return the generation for a path.
    async fn bump_generation(&self, path: &str) -> u64 {
        self.bump_generation_at_least(path, 0).await
    }

    /// Advance the generation for a path to at least `floor + 1`.
    ///
    /// A carried entry keeps its generation lineage: the destination path's
    /// counter may never have seen the document before, but the moved
    /// document must still observe a larger generation than it had.
    async fn bump_generation_at_least(&self, path: &str, floor: u64) -> u64 {
        let mut generations = self.generations.lock().await;
        let counter = generations.entry(path.to_string()).or_insert(0);
        *counter = (*counter).max(floor) + 1;
        *counter
    }

    /// Get a document, loading or reloading as needed.
    ///
    /// Returns `None` when no file exists at the path. The caller must hold
    /// the path lock from [`DocumentCache::lock_for`].
    pub async fn get(&self, path: &DocPath) -> Result<Option<CachedDocument>> {
        self.ensure_fresh(path).await
    }

    /// Get a section body, materializing and caching it on first read.
    ///
    /// Returns `None` when the document or the slug does not exist. The
    /// caller must hold the path lock.
    pub async fn section_content(&self, path: &DocPath, slug: &str) -> Result<Option<String>> {
        let Some(doc) = self.ensure_fresh(path).await? else {
            return Ok(None);
        };

        let generation = doc.metadata.cache_generation;
        if let Some(entry) = doc.sections.get(slug) {
            if entry.generation == generation {
                trace!(path = path.as_str(), slug, "section cache hit");
                return Ok(Some(entry.content.clone()));
            }
        }

        let Some(content) = section::body_with(&doc.text, &doc.headings, slug) else {
            return Ok(None);
        };

        // Memoize on the live entry; skip if eviction or a newer generation
        // got there first.
        let mut entries = self.entries.write().await;
        if let Some(live) = entries.get_mut(path.as_str()) {
            if live.metadata.cache_generation == generation {
                live.sections.insert(
                    slug.to_string(),
                    SectionEntry {
                        content: content.clone(),
                        generation,
                    },
                );
            }
        }
        Ok(Some(content))
    }

    /// Drop the cached entry for a path. The generation counter is kept.
    pub async fn invalidate(&self, path: &str) {
        let mut entries = self.entries.write().await;
        if entries.remove(path).is_some() {
            self.stats.invalidations.fetch_add(1, Ordering::Relaxed);
            debug!(path, "cache entry invalidated");
        }
    }

    /// Re-key a cached entry after a rename or move on disk.
    ///
    /// The file bytes (and mtime, on a plain rename) are unchanged, so the
    /// parsed structure is carried over instead of thrown away; only the
    /// path-derived metadata and the generation change.
    pub async fn carry(&self, from: &str, to: &DocPath) {
        let mut entries = self.entries.write().await;
        if let Some(mut doc) = entries.remove(from) {
            let generation = self
                .bump_generation_at_least(to.as_str(), doc.metadata.cache_generation)
                .await;
            doc.metadata.path = to.as_str().to_string();
            doc.metadata.namespace = to.namespace();
            doc.metadata.cache_generation = generation;
            for entry in doc.sections.values_mut() {
                entry.generation = generation;
            }
            entries.insert(to.as_str().to_string(), doc);
        }
    }

    /// Current stats counters.
    #[must_use]
    pub fn stats(&self) -> CacheStatsSnapshot {
        CacheStatsSnapshot {
            hits: self.stats.hits.load(Ordering::Relaxed),
            misses: self.stats.misses.load(Ordering::Relaxed),
            evictions: self.stats.evictions.load(Ordering::Relaxed),
            invalidations: self.stats.invalidations.load(Ordering::Relaxed),
            stale_reloads: self.stats.stale_reloads.load(Ordering::Relaxed),
        }
    }

    /// Make sure a fresh entry for `path` is resident and return a clone of
    /// it, or `None` when the file does not exist (any stale entry is
    /// dropped).
    async fn ensure_fresh(&self, path: &DocPath) -> Result<Option<CachedDocument>> {
        let abs = path.resolve(&self.root);
        let Some(mtime) = fsio::stat_mtime_ms(&abs).await? else {
            self.invalidate(path.as_str()).await;
            return Ok(None);
        };

        let had_entry = {
            let mut entries = self.entries.write().await;
            match entries.get_mut(path.as_str()) {
                Some(doc) if doc.metadata.last_modified == mtime => {
                    self.stats.hits.fetch_add(1, Ordering::Relaxed);
                    doc.metadata.last_accessed = Utc::now();
                    return Ok(Some(doc.clone()));
                },
                Some(_) => true,
                None => false,
            }
        };

        if had_entry {
            self.stats.stale_reloads.fetch_add(1, Ordering::Relaxed);
            debug!(path = path.as_str(), "file changed on disk, reloading");
        } else {
            self.stats.misses.fetch_add(1, Ordering::Relaxed);
        }
        self.load(path, &abs).await
    }

    async fn load(&self, path: &DocPath, abs: &Path) -> Result<Option<CachedDocument>> {
        let snapshot = match fsio::read_snapshot(abs).await {
            Ok(snapshot) => snapshot,
            // Deleted between stat and read.
            Err(Error::DocNotFound(_)) => {
                self.invalidate(path.as_str()).await;
                return Ok(None);
            },
            Err(e) => return Err(e),
        };

        let parsed = MarkdownParser::new()?.parse(&snapshot.content)?;
        let title = parsed.title()?.title.clone();

        let mut slug_index = HashMap::with_capacity(parsed.headings.len());
        for heading in &parsed.headings {
            slug_index.insert(heading.slug.clone(), heading.index);
        }

        let content_hash = format!("{:x}", Sha256::digest(snapshot.content.as_bytes()));
        let generation = self.bump_generation(path.as_str()).await;
        let now = Utc::now();

        let doc = CachedDocument {
            metadata: DocumentMetadata {
                path: path.as_str().to_string(),
                title: title.clone(),
                last_modified: snapshot.mtime_ms,
                content_hash,
                word_count: parsed.stats.word_count,
                link_count: parsed.stats.link_count,
                code_block_count: parsed.stats.code_block_count,
                namespace: path.namespace(),
                keywords: keywords::fingerprint(&title, &snapshot.content),
                fingerprint_generated: now,
                cache_generation: generation,
                last_accessed: now,
            },
            headings: parsed.headings,
            slug_index,
            sections: HashMap::new(),
            toc: parsed.toc,
            text: snapshot.content,
        };

        let mut entries = self.entries.write().await;
        entries.insert(path.as_str().to_string(), doc.clone());
        if entries.len() > self.max_entries {
            self.evict_lru(&mut entries, path.as_str());
        }
        Ok(Some(doc))
    }

    fn evict_lru(&self, entries: &mut HashMap<String, CachedDocument>, keep: &str) {
        let victim = entries
            .iter()
            .filter(|(key, _)| key.as_str() != keep)
            .min_by_key(|(_, doc)| doc.metadata.last_accessed)
            .map(|(key, _)| key.clone());
        if let Some(key) = victim {
            entries.remove(&key);
            self.stats.evictions.fetch_add(1, Ordering::Relaxed);
            debug!(path = %key, "evicted least recently used entry");
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn write_doc(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        tokio::fs::create_dir_all(path.parent().unwrap())
            .await
            .unwrap();
        tokio::fs::write(&path, content).await.unwrap();
    }

    fn doc_path(s: &str) -> DocPath {
        DocPath::parse(s).unwrap()
    }

    #[tokio::test]
    async fn test_load_builds_metadata_and_index() {
        let dir = TempDir::new().unwrap();
        write_doc(
            dir.path(),
            "api/auth.md",
            "# Auth Spec\n\noverview\n\n## Flows\n\nflows text\n",
        )
        .await;
        let cache = DocumentCache::new(dir.path().to_path_buf(), 8);

        let doc = cache.get(&doc_path("/api/auth.md")).await.unwrap().unwrap();
        assert_eq!(doc.metadata.title, "Auth Spec");
        assert_eq!(doc.metadata.namespace, "api");
        assert_eq!(doc.metadata.cache_generation, 1);
        assert_eq!(doc.slug_index.len(), 2);
        assert!(doc.slug_index.contains_key("flows"));
        assert_eq!(doc.metadata.content_hash.len(), 64);
        assert!(!doc.metadata.keywords.is_empty());
        assert_eq!(doc.toc.len(), 1);
    }

    #[tokio::test]
    async fn test_missing_document_is_none() {
        let dir = TempDir::new().unwrap();
        let cache = DocumentCache::new(dir.path().to_path_buf(), 8);
        assert!(cache.get(&doc_path("/nope.md")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_document_without_title_fails_no_title() {
        let dir = TempDir::new().unwrap();
        write_doc(dir.path(), "bad.md", "## Not A Title\n\ntext\n").await;
        let cache = DocumentCache::new(dir.path().to_path_buf(), 8);

        let err = cache.get(&doc_path("/bad.md")).await.unwrap_err();
        assert_eq!(err.code(), "NO_TITLE");
    }

    #[tokio::test]
    async fn test_second_get_is_a_hit_with_stable_hash() {
        let dir = TempDir::new().unwrap();
        write_doc(dir.path(), "a.md", "# A\n\ntext\n").await;
        let cache = DocumentCache::new(dir.path().to_path_buf(), 8);

        let first = cache.get(&doc_path("/a.md")).await.unwrap().unwrap();
        let second = cache.get(&doc_path("/a.md")).await.unwrap().unwrap();
        assert_eq!(first.metadata.content_hash, second.metadata.content_hash);
        assert_eq!(first.metadata.cache_generation, second.metadata.cache_generation);
        assert_eq!(cache.stats().hits, 1);
        assert_eq!(cache.stats().misses, 1);
    }

    #[tokio::test]
    async fn test_external_change_triggers_reload_and_new_generation() {
        let dir = TempDir::new().unwrap();
        write_doc(dir.path(), "a.md", "# A\n\nold\n").await;
        let cache = DocumentCache::new(dir.path().to_path_buf(), 8);

        let before = cache.get(&doc_path("/a.md")).await.unwrap().unwrap();

        // Simulate another process rewriting the file, with an mtime bump so
        // the test does not depend on timestamp granularity.
        let abs = dir.path().join("a.md");
        tokio::fs::write(&abs, "# A\n\nnew body\n").await.unwrap();
        let file = std::fs::File::options().write(true).open(&abs).unwrap();
        file.set_modified(std::time::SystemTime::now() + std::time::Duration::from_secs(2))
            .unwrap();
        drop(file);

        let after = cache.get(&doc_path("/a.md")).await.unwrap().unwrap();
        assert!(after.metadata.cache_generation > before.metadata.cache_generation);
        assert_ne!(after.metadata.content_hash, before.metadata.content_hash);
        assert!(after.text.contains("new body"));
        assert_eq!(cache.stats().stale_reloads, 1);
    }

    #[tokio::test]
    async fn test_section_content_is_lazy_and_cached() {
        let dir = TempDir::new().unwrap();
        write_doc(dir.path(), "a.md", "# A\n\nintro\n\n## S\n\nbody text\n").await;
        let cache = DocumentCache::new(dir.path().to_path_buf(), 8);
        let path = doc_path("/a.md");

        // Not materialized at load time.
        let doc = cache.get(&path).await.unwrap().unwrap();
        assert!(doc.sections.is_empty());

        let body = cache.section_content(&path, "s").await.unwrap().unwrap();
        assert_eq!(body, "body text");

        let doc = cache.get(&path).await.unwrap().unwrap();
        let entry = doc.sections.get("s").unwrap();
        assert_eq!(entry.content, "body text");
        assert_eq!(entry.generation, doc.metadata.cache_generation);

        assert!(
            cache
                .section_content(&path, "ghost")
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_invalidate_drops_entry_but_generation_advances() {
        let dir = TempDir::new().unwrap();
        write_doc(dir.path(), "a.md", "# A\n\ntext\n").await;
        let cache = DocumentCache::new(dir.path().to_path_buf(), 8);
        let path = doc_path("/a.md");

        let before = cache.get(&path).await.unwrap().unwrap();
        cache.invalidate(path.as_str()).await;
        let after = cache.get(&path).await.unwrap().unwrap();

        assert!(after.metadata.cache_generation > before.metadata.cache_generation);
        assert_eq!(cache.stats().invalidations, 1);
    }

    #[tokio::test]
    async fn test_lru_eviction_honors_bound() {
        let dir = TempDir::new().unwrap();
        for name in ["a.md", "b.md", "c.md"] {
            write_doc(dir.path(), name, &format!("# {name}\n\ntext\n")).await;
        }
        let cache = DocumentCache::new(dir.path().to_path_buf(), 2);

        cache.get(&doc_path("/a.md")).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        cache.get(&doc_path("/b.md")).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        cache.get(&doc_path("/c.md")).await.unwrap();

        assert_eq!(cache.stats().evictions, 1);
        let entries = cache.entries.read().await;
        assert_eq!(entries.len(), 2);
        assert!(!entries.contains_key("/a.md"), "oldest entry is evicted");
    }

    #[tokio::test]
    async fn test_carry_rekeys_entry_and_patches_metadata() {
        let dir = TempDir::new().unwrap();
        write_doc(dir.path(), "old.md", "# Doc\n\ntext\n").await;
        let cache = DocumentCache::new(dir.path().to_path_buf(), 8);

        let old = doc_path("/old.md");
        let loaded = cache.get(&old).await.unwrap().unwrap();
        cache.section_content(&old, "doc").await.unwrap();

        // Move the file, then carry the entry.
        tokio::fs::create_dir_all(dir.path().join("ns")).await.unwrap();
        tokio::fs::rename(dir.path().join("old.md"), dir.path().join("ns/new.md"))
            .await
            .unwrap();
        let new = doc_path("/ns/new.md");
        cache.carry(old.as_str(), &new).await;

        let carried = cache.get(&new).await.unwrap().unwrap();
        assert_eq!(carried.metadata.path, "/ns/new.md");
        assert_eq!(carried.metadata.namespace, "ns");
        assert!(carried.metadata.cache_generation > loaded.metadata.cache_generation);
        // Carried section entries are retagged, not stale.
        assert_eq!(
            carried.sections.get("doc").unwrap().generation,
            carried.metadata.cache_generation
        );
        assert!(cache.get(&old).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_materialized_section_matches_read_section() {
        let dir = TempDir::new().unwrap();
        let text = "# A\n\nintro\n\n## S\n\nbody\n\n### Sub\n\nnested\n\n## T\n\nlast\n";
        write_doc(dir.path(), "a.md", text).await;
        let cache = DocumentCache::new(dir.path().to_path_buf(), 8);
        let path = doc_path("/a.md");

        for slug in ["a", "s", "sub", "t"] {
            let via_cache = cache.section_content(&path, slug).await.unwrap().unwrap();
            let via_engine = crate::section::read_section(text, slug).unwrap().unwrap();
            assert_eq!(via_cache, via_engine, "slug: {slug}");
        }
    }
}
