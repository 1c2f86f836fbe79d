//! Client-facing address parsing and resolution.
//!
//! Tools receive strings like `/api/specs/auth.md#flows` or
//! `/guide.md#api/endpoints/delete`. The part before `#` is a document path
//! (§[`crate::paths`]); the fragment is either a bare slug or a hierarchical
//! chain whose last segment is the target and whose earlier segments must
//! appear, in order, on the target's ancestor chain. Hierarchical addresses
//! exist for readability and validation — slugs are already unique within a
//! document, so the chain never disambiguates, it only confirms.
//!
//! A resolved section is additionally classified as a task when its nearest
//! depth-2 ancestor carries the slug `tasks`. Tasks change nothing about
//! storage or editing; the flag only shapes responses.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::paths::DocPath;
use crate::types::CachedDocument;

/// The slug of the depth-2 section that marks its descendants as tasks.
pub const TASKS_SLUG: &str = "tasks";

/// The fragment part of a section address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Anchor {
    /// A bare slug: `#overview`.
    Slug(String),
    /// A parent→child chain: `#api/endpoints/delete`.
    Hierarchy(Vec<String>),
}

impl Anchor {
    /// The slug the anchor ultimately targets.
    #[must_use]
    pub fn target(&self) -> &str {
        match self {
            Self::Slug(slug) => slug,
            Self::Hierarchy(chain) => chain.last().map_or("", String::as_str),
        }
    }
}

/// A parsed address: a document, optionally narrowed to a section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Address {
    /// The document part.
    pub doc: DocPath,
    /// The section part, when a `#fragment` was present.
    pub anchor: Option<Anchor>,
}

impl Address {
    /// Parse `/ns/doc.md`, `/ns/doc.md#slug`, or `/ns/doc.md#a/b/c`.
    ///
    /// Slugs are lowercase by construction; the fragment is lowercased here
    /// so addresses typed from heading titles still resolve.
    pub fn parse(input: &str) -> Result<Self> {
        let (doc_part, fragment) = match input.split_once('#') {
            Some((doc, frag)) => (doc, Some(frag)),
            None => (input, None),
        };
        let doc = DocPath::parse(doc_part)?;

        let anchor = match fragment {
            None => None,
            Some(frag) => {
                let frag = frag.trim();
                if frag.is_empty() {
                    return Err(Error::InvalidPath(format!(
                        "'{input}' has an empty section fragment"
                    )));
                }
                let segments: Vec<String> = frag
                    .split('/')
                    .map(|s| s.trim().to_lowercase())
                    .collect();
                if segments.iter().any(String::is_empty) {
                    return Err(Error::InvalidPath(format!(
                        "'{input}' has an empty segment in its section fragment"
                    )));
                }
                if segments.len() == 1 {
                    Some(Anchor::Slug(segments.into_iter().next().unwrap_or_default()))
                } else {
                    Some(Anchor::Hierarchy(segments))
                }
            },
        };

        Ok(Self { doc, anchor })
    }
}

/// A section located in a specific document, with the context tool
/// responses are shaped from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedSection {
    /// Heading index in the document.
    pub index: usize,
    /// Section slug.
    pub slug: String,
    /// Heading title, case preserved.
    pub title: String,
    /// Heading depth.
    pub depth: u8,
    /// Titles from the document title to this section, joined by `" > "`.
    pub full_path: String,
    /// `full_path` minus the final segment; `None` at the top.
    pub parent_path: Option<String>,
    /// Whether the section's nearest depth-2 ancestor is the tasks section.
    pub is_task: bool,
}

/// Resolve an anchor against a cached document.
///
/// Returns `None` when the target slug does not exist or, for hierarchical
/// anchors, when the listed ancestors do not appear in order on the target's
/// parent chain.
#[must_use]
pub fn resolve(doc: &CachedDocument, anchor: &Anchor) -> Option<ResolvedSection> {
    let target_slug = anchor.target();
    let &index = doc.slug_index.get(target_slug)?;
    let heading = &doc.headings[index];

    if let Anchor::Hierarchy(chain) = anchor {
        if !ancestors_match(doc, index, &chain[..chain.len().saturating_sub(1)]) {
            return None;
        }
    }

    let titles = doc.heading_path(index);
    let full_path = titles.join(" > ");
    let parent_path = (titles.len() > 1).then(|| titles[..titles.len() - 1].join(" > "));

    Some(ResolvedSection {
        index,
        slug: heading.slug.clone(),
        title: heading.title.clone(),
        depth: heading.depth,
        full_path,
        parent_path,
        is_task: is_task(doc, index),
    })
}

/// Check that `expected` ancestors appear in order (gaps allowed) walking
/// from the document title down to — but excluding — the target.
fn ancestors_match(doc: &CachedDocument, index: usize, expected: &[String]) -> bool {
    // Collect the actual ancestor slugs root-first.
    let mut chain = Vec::new();
    let mut cursor = doc.headings[index].parent;
    while let Some(i) = cursor {
        chain.push(doc.headings[i].slug.as_str());
        cursor = doc.headings[i].parent;
    }
    chain.reverse();

    let mut expected_iter = expected.iter();
    let mut want = expected_iter.next();
    for actual in chain {
        match want {
            Some(w) if w == actual => want = expected_iter.next(),
            _ => {},
        }
    }
    want.is_none()
}

/// Whether the heading's nearest depth-2 ancestor (strictly above it) is the
/// tasks section.
#[must_use]
pub fn is_task(doc: &CachedDocument, index: usize) -> bool {
    let mut cursor = doc.headings[index].parent;
    while let Some(i) = cursor {
        let heading = &doc.headings[i];
        if heading.depth == 2 {
            return heading.slug == TASKS_SLUG;
        }
        cursor = heading.parent;
    }
    false
}
