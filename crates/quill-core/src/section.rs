//! Structural section edits over markdown source text.
//!
//! Pure functions: every operation takes the document text (plus a slug and
//! payload), reparses the heading structure, and returns new markdown. No
//! I/O happens here, which is what lets the manager treat
//! read-snapshot → edit → conditional-write as an atomic unit.
//!
//! A section spans from the end of its heading line to the start of the next
//! heading at the same or shallower depth, so it always includes its whole
//! subtree. Reads strip one surrounding blank line; writes re-establish the
//! local whitespace contract (one blank line between a heading and its body,
//! one blank line before the following heading, a single `\n` at EOF) for
//! the region they touch and leave the rest of the file byte-identical.

use std::collections::HashSet;
use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::parser;
use crate::slug::slugify;
use crate::types::Heading;

/// How `update_section` combines the payload with the existing body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateMode {
    /// Overwrite the whole body (subtree included).
    Replace,
    /// Add the payload after the existing body, one blank line between.
    Append,
    /// Add the payload before the existing body, one blank line between.
    Prepend,
}

/// Where `insert_section` places a newly created section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsertMode {
    /// Immediately before the reference section, at its depth.
    InsertBefore,
    /// After the reference section's entire subtree, at its depth.
    InsertAfter,
    /// As the last child of the reference, one level deeper (capped at 6).
    AppendChild,
}

/// Result of creating a section.
#[derive(Debug, Clone)]
pub struct InsertOutcome {
    /// The new document text.
    pub content: String,
    /// Slug derived for the created section.
    pub slug: String,
    /// Depth the section was created at.
    pub depth: u8,
}

/// Result of removing a section.
#[derive(Debug, Clone)]
pub struct RemoveOutcome {
    /// The new document text.
    pub content: String,
    /// The removed markdown (heading line plus subtree), for responses and
    /// for move rollback.
    pub removed: String,
}

/// Result of renaming a heading.
#[derive(Debug, Clone)]
pub struct RenameOutcome {
    /// The new document text.
    pub content: String,
    /// Slug derived from the new title.
    pub new_slug: String,
}

/// Parse the heading list, rejecting duplicate slugs.
fn headings_of(content: &str) -> Result<Vec<Heading>> {
    let headings = parser::scan(content)?;
    let mut seen = HashSet::new();
    for heading in &headings {
        if !seen.insert(heading.slug.as_str()) {
            return Err(Error::DuplicateSlug {
                slug: heading.slug.clone(),
            });
        }
    }
    Ok(headings)
}

fn find<'a>(headings: &'a [Heading], slug: &str) -> Option<&'a Heading> {
    headings.iter().find(|h| h.slug == slug)
}

/// Byte offset just past the end of a heading's subtree: the start of the
/// next heading with depth ≤ the given heading's, or end of file.
fn subtree_end(content: &str, headings: &[Heading], heading: &Heading) -> usize {
    headings
        .iter()
        .skip(heading.index + 1)
        .find(|next| next.depth <= heading.depth)
        .map_or(content.len(), |next| next.line_start)
}

/// The `[start, end)` byte range of a section body, heading line excluded.
///
/// Returns `None` when the slug is unknown.
pub fn locate(content: &str, slug: &str) -> Result<Option<Range<usize>>> {
    let headings = headings_of(content)?;
    Ok(find(&headings, slug).map(|h| h.line_end..subtree_end(content, &headings, h)))
}

fn body_text(content: &str, range: Range<usize>) -> String {
    let mut body = &content[range];
    // One surrounding blank line belongs to the section's framing, not its
    // content: strip the head blank, the final line terminator, and at most
    // one trailing blank line.
    if let Some(rest) = body.strip_prefix('\n') {
        body = rest;
    }
    if let Some(rest) = body.strip_suffix('\n') {
        body = rest;
    }
    if let Some(rest) = body.strip_suffix('\n') {
        body = rest;
    }
    body.to_string()
}

/// Section body computed against an already-parsed heading list.
///
/// The cache uses this to materialize section entries from its stored spans
/// without reparsing; trimming matches [`read_section`] exactly.
pub(crate) fn body_with(content: &str, headings: &[Heading], slug: &str) -> Option<String> {
    let heading = find(headings, slug)?;
    Some(body_text(
        content,
        heading.line_end..subtree_end(content, headings, heading),
    ))
}

/// Read a section body. `None` when the slug is unknown.
pub fn read_section(content: &str, slug: &str) -> Result<Option<String>> {
    let headings = headings_of(content)?;
    Ok(body_with(content, &headings, slug))
}

/// Trim trailing blank lines to a single final newline.
fn normalize_eof(out: &mut String) {
    while out.ends_with("\n\n") {
        out.pop();
    }
    if !out.is_empty() && !out.ends_with('\n') {
        out.push('\n');
    }
}

/// Rebuild a document with `new_body` as the body of `heading`.
fn write_body(content: &str, heading: &Heading, body_end: usize, new_body: &str) -> String {
    let mut out = String::with_capacity(content.len() + new_body.len() + 4);
    out.push_str(&content[..heading.line_end]);
    if !out.ends_with('\n') {
        out.push('\n');
    }
    out.push('\n');
    out.push_str(new_body);
    out.push('\n');

    let after = &content[body_end..];
    if !after.is_empty() {
        out.push('\n');
        out.push_str(after);
    }
    normalize_eof(&mut out);
    out
}

/// Overwrite, append to, or prepend to a section body.
///
/// # Errors
///
/// `SECTION_NOT_FOUND` for an unknown slug, `EMPTY_CONTENT` for a blank
/// payload (a mutation that changes nothing is forbidden).
pub fn update_section(
    content: &str,
    slug: &str,
    payload: &str,
    mode: UpdateMode,
) -> Result<String> {
    let payload = payload.trim();
    if payload.is_empty() {
        return Err(Error::EmptyContent);
    }

    let headings = headings_of(content)?;
    let heading = find(&headings, slug)
        .ok_or_else(|| Error::SectionNotFound(slug.to_string()))?;
    let end = subtree_end(content, &headings, heading);
    let existing = body_text(content, heading.line_end..end);

    let new_body = match mode {
        UpdateMode::Replace => payload.to_string(),
        // An empty section has nothing to separate the payload from, so no
        // leading blank line is emitted.
        UpdateMode::Append if existing.is_empty() => payload.to_string(),
        UpdateMode::Append => format!("{existing}\n\n{payload}"),
        UpdateMode::Prepend if existing.is_empty() => payload.to_string(),
        UpdateMode::Prepend => format!("{payload}\n\n{existing}"),
    };

    let out = write_body(content, heading, end, &new_body);
    // Payloads may carry sub-headings; the result must still parse with
    // unique slugs or the document would be unreadable afterwards.
    headings_of(&out)?;
    Ok(out)
}

fn validated_new_slug(headings: &[Heading], title: &str) -> Result<String> {
    let slug = slugify(title);
    if title.trim().is_empty() || slug.is_empty() {
        return Err(Error::EmptyContent);
    }
    if headings.iter().any(|h| h.slug == slug) {
        return Err(Error::DuplicateSlug { slug });
    }
    Ok(slug)
}

/// Shallowest heading depth appearing in an edit payload, if any.
fn payload_min_depth(payload: &str) -> Result<Option<u8>> {
    Ok(parser::scan(payload)?.iter().map(|h| h.depth).min())
}

/// Create a new section relative to a reference section.
///
/// The new heading's text comes from `title`; its slug is derived and must
/// not collide with any existing slug in the document. A reference at depth
/// 1 places the section at depth 2 unless `depth_hint` says otherwise
/// (`insert_before` the title lands after the document overview, never above
/// the title line).
///
/// # Errors
///
/// `SECTION_NOT_FOUND`, `DUPLICATE_SLUG`, `EMPTY_CONTENT` (blank title), and
/// `CREATE_DEPTH_ESCAPE` when `body` contains a heading at or above the new
/// section's depth.
pub fn insert_section(
    content: &str,
    ref_slug: &str,
    mode: InsertMode,
    depth_hint: Option<u8>,
    title: &str,
    body: &str,
) -> Result<InsertOutcome> {
    let headings = headings_of(content)?;
    let reference = find(&headings, ref_slug)
        .ok_or_else(|| Error::SectionNotFound(ref_slug.to_string()))?;
    let new_slug = validated_new_slug(&headings, title)?;

    let depth = match mode {
        InsertMode::InsertBefore | InsertMode::InsertAfter => {
            let default = if reference.depth == 1 { 2 } else { reference.depth };
            depth_hint.unwrap_or(default).clamp(2, 6)
        },
        InsertMode::AppendChild => (reference.depth + 1).min(6),
    };

    if let Some(min_depth) = payload_min_depth(body)? {
        if min_depth <= depth {
            return Err(Error::CreateDepthEscape { depth });
        }
    }

    let at = match mode {
        InsertMode::InsertBefore if reference.depth == 1 => headings
            .get(reference.index + 1)
            .map_or(content.len(), |next| next.line_start),
        InsertMode::InsertBefore => reference.line_start,
        InsertMode::InsertAfter | InsertMode::AppendChild => {
            subtree_end(content, &headings, reference)
        },
    };

    let mut out = String::with_capacity(content.len() + title.len() + body.len() + 16);
    let before = &content[..at];
    if !before.is_empty() {
        out.push_str(before.trim_end_matches('\n'));
        out.push_str("\n\n");
    }
    for _ in 0..depth {
        out.push('#');
    }
    out.push(' ');
    out.push_str(title.trim());
    out.push('\n');

    let body = body.trim();
    if !body.is_empty() {
        out.push('\n');
        out.push_str(body);
        out.push('\n');
    }

    let after = &content[at..];
    if !after.is_empty() {
        out.push('\n');
        out.push_str(after);
    }
    normalize_eof(&mut out);

    headings_of(&out)?;
    Ok(InsertOutcome {
        content: out,
        slug: new_slug,
        depth,
    })
}

/// Delete a section and its entire subtree.
///
/// # Errors
///
/// `SECTION_NOT_FOUND` for an unknown slug, `CANNOT_REMOVE_TITLE` for the
/// depth-1 heading.
pub fn remove_section(content: &str, slug: &str) -> Result<RemoveOutcome> {
    let headings = headings_of(content)?;
    let heading = find(&headings, slug)
        .ok_or_else(|| Error::SectionNotFound(slug.to_string()))?;
    if heading.depth == 1 {
        return Err(Error::CannotRemoveTitle);
    }

    let end = subtree_end(content, &headings, heading);
    let removed = content[heading.line_start..end].trim_end().to_string();

    let before = &content[..heading.line_start];
    let after = &content[end..];
    let mut out = String::with_capacity(before.len() + after.len() + 2);
    out.push_str(before.trim_end_matches('\n'));
    if after.is_empty() {
        out.push('\n');
    } else {
        out.push_str("\n\n");
        out.push_str(after);
    }
    normalize_eof(&mut out);

    Ok(RemoveOutcome {
        content: out,
        removed,
    })
}

fn rewrite_heading_line(content: &str, heading: &Heading, new_title: &str) -> String {
    let mut out = String::with_capacity(content.len() + new_title.len());
    out.push_str(&content[..heading.line_start]);
    for _ in 0..heading.depth {
        out.push('#');
    }
    out.push(' ');
    out.push_str(new_title);
    out.push('\n');
    out.push_str(&content[heading.line_end..]);
    out
}

/// Rewrite a heading line with a new title, leaving everything else
/// byte-identical.
///
/// # Errors
///
/// `SECTION_NOT_FOUND`, `EMPTY_CONTENT` (blank title), `DUPLICATE_SLUG` when
/// the derived slug collides with a different heading.
pub fn rename_heading(content: &str, slug: &str, new_title: &str) -> Result<RenameOutcome> {
    let headings = headings_of(content)?;
    let heading = find(&headings, slug)
        .ok_or_else(|| Error::SectionNotFound(slug.to_string()))?;

    let new_title = new_title.trim();
    let new_slug = slugify(new_title);
    if new_title.is_empty() || new_slug.is_empty() {
        return Err(Error::EmptyContent);
    }
    if new_slug != heading.slug && headings.iter().any(|h| h.slug == new_slug) {
        return Err(Error::DuplicateSlug { slug: new_slug });
    }

    Ok(RenameOutcome {
        content: rewrite_heading_line(content, heading, new_title),
        new_slug,
    })
}

/// Rewrite the document's depth-1 title heading.
///
/// # Errors
///
/// `NO_TITLE` when the document does not start with a depth-1 heading;
/// otherwise as [`rename_heading`].
pub fn rename_title(content: &str, new_title: &str) -> Result<RenameOutcome> {
    let headings = headings_of(content)?;
    let title_slug = headings
        .first()
        .filter(|h| h.depth == 1)
        .map(|h| h.slug.clone())
        .ok_or(Error::NoTitle)?;
    rename_heading(content, &title_slug, new_title)
}
