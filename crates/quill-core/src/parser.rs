//! Markdown heading extraction using tree-sitter.
//!
//! The section engine addresses documents by their ATX heading structure, so
//! the parser's job is narrow: produce the ordered heading list (with byte
//! spans, depths, slugs, and parent links), the nested table of contents,
//! and a few document stats, from a single pass over the syntax tree.
//!
//! Using the tree-sitter markdown grammar rather than a line scanner means
//! `#` lines inside fenced code blocks (``` or `~~~`) and indented code are
//! never mistaken for headings, and setext underlines are ignored: only
//! `atx_heading` nodes are visited.
//!
//! ## Structure rules
//!
//! - Depth is bounded to 1..=6 (the grammar guarantees this for ATX).
//! - A heading's parent is the nearest earlier heading with smaller depth.
//! - Slugs are derived per [`crate::slug::slugify`] and must be unique
//!   within a document; a collision fails the parse with `DUPLICATE_SLUG`
//!   rather than silently disambiguating.

use once_cell::sync::Lazy;
use regex::Regex;
use tree_sitter::{Node, Parser, TreeCursor};

use crate::error::{Error, Result};
use crate::slug::slugify;
use crate::types::{DocumentStats, Heading, TocEntry};

#[allow(clippy::expect_used)]
static LINK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[[^\]]*\]\(").expect("link pattern is valid"));

/// The result of parsing one markdown document.
#[derive(Debug, Clone)]
pub struct ParsedDocument {
    /// Headings in document order.
    pub headings: Vec<Heading>,
    /// Nested table of contents built from the headings.
    pub toc: Vec<TocEntry>,
    /// Word, link, and code-block counts.
    pub stats: DocumentStats,
}

impl ParsedDocument {
    /// The document's depth-1 title heading.
    ///
    /// # Errors
    ///
    /// [`Error::NoTitle`] when the document does not start with a level-1
    /// heading.
    pub fn title(&self) -> Result<&Heading> {
        self.headings
            .first()
            .filter(|h| h.depth == 1)
            .ok_or(Error::NoTitle)
    }
}

/// A tree-sitter based markdown heading parser.
///
/// Parser instances are cheap to reuse across documents but hold mutable
/// tree-sitter state, so they are not `Sync`; create one per task.
pub struct MarkdownParser {
    parser: Parser,
}

impl MarkdownParser {
    /// Create a parser configured with the markdown grammar.
    pub fn new() -> Result<Self> {
        let mut parser = Parser::new();
        parser
            .set_language(&tree_sitter_md::LANGUAGE.into())
            .map_err(|e| Error::Io(std::io::Error::other(format!(
                "failed to load markdown grammar: {e}"
            ))))?;
        Ok(Self { parser })
    }

    /// Parse a document, enforcing slug uniqueness.
    ///
    /// # Errors
    ///
    /// [`Error::DuplicateSlug`] when two headings derive the same slug.
    pub fn parse(&mut self, text: &str) -> Result<ParsedDocument> {
        let (headings, code_block_count) = self.extract(text)?;

        let mut seen = std::collections::HashSet::new();
        for heading in &headings {
            if !seen.insert(heading.slug.as_str()) {
                return Err(Error::DuplicateSlug {
                    slug: heading.slug.clone(),
                });
            }
        }

        let toc = build_toc(&headings);
        let stats = DocumentStats {
            word_count: text.split_whitespace().count(),
            link_count: LINK_RE.find_iter(text).count(),
            code_block_count,
        };

        Ok(ParsedDocument {
            headings,
            toc,
            stats,
        })
    }

    /// Extract the heading list without enforcing slug uniqueness.
    ///
    /// Used for scanning edit payloads, where collisions with the target
    /// document are checked separately.
    pub fn outline(&mut self, text: &str) -> Result<Vec<Heading>> {
        Ok(self.extract(text)?.0)
    }

    fn extract(&mut self, text: &str) -> Result<(Vec<Heading>, usize)> {
        let tree = self
            .parser
            .parse(text, None)
            .ok_or_else(|| Error::Io(std::io::Error::other("markdown parse failed")))?;

        let mut headings: Vec<Heading> = Vec::new();
        let mut code_block_count = 0usize;
        // Stack of indices into `headings`, shallowest depth at the bottom.
        let mut parents: Vec<usize> = Vec::new();

        let mut cursor = tree.root_node().walk();
        walk_tree(&mut cursor, |node| {
            match node.kind() {
                "atx_heading" => {
                    let depth = heading_depth(node);
                    let title = heading_title(node, text);
                    let line_start = line_start_of(text, node.start_byte());
                    let line_end = line_end_of(text, node.start_byte());

                    while parents
                        .last()
                        .is_some_and(|&i| headings[i].depth >= depth)
                    {
                        parents.pop();
                    }
                    let parent = parents.last().copied();

                    let index = headings.len();
                    headings.push(Heading {
                        index,
                        depth,
                        slug: slugify(&title),
                        title,
                        parent,
                        line_start,
                        line_end,
                    });
                    parents.push(index);
                },
                "fenced_code_block" => code_block_count += 1,
                _ => {},
            }
        });

        Ok((headings, code_block_count))
    }
}

/// Extract the heading list from `text` with a transient parser.
///
/// Convenience for the pure section-engine functions, which take markdown
/// strings and have no parser to thread through.
pub fn scan(text: &str) -> Result<Vec<Heading>> {
    MarkdownParser::new()?.outline(text)
}

fn walk_tree<F>(cursor: &mut TreeCursor, mut callback: F)
where
    F: FnMut(Node),
{
    loop {
        callback(cursor.node());

        if cursor.goto_first_child() {
            continue;
        }
        if cursor.goto_next_sibling() {
            continue;
        }
        loop {
            if !cursor.goto_parent() {
                return;
            }
            if cursor.goto_next_sibling() {
                break;
            }
        }
    }
}

fn heading_depth(node: Node) -> u8 {
    for child in node.children(&mut node.walk()) {
        match child.kind() {
            "atx_h1_marker" => return 1,
            "atx_h2_marker" => return 2,
            "atx_h3_marker" => return 3,
            "atx_h4_marker" => return 4,
            "atx_h5_marker" => return 5,
            "atx_h6_marker" => return 6,
            _ => {},
        }
    }
    1
}

fn heading_title(node: Node, text: &str) -> String {
    let raw = &text[node.byte_range()];
    let line = raw.split('\n').next().unwrap_or(raw);
    line.trim().trim_start_matches('#').trim().to_string()
}

fn line_start_of(text: &str, byte: usize) -> usize {
    text[..byte].rfind('\n').map_or(0, |i| i + 1)
}

fn line_end_of(text: &str, byte: usize) -> usize {
    text[byte..]
        .find('\n')
        .map_or(text.len(), |i| byte + i + 1)
}

fn build_toc(headings: &[Heading]) -> Vec<TocEntry> {
    fn attach(toc: &mut Vec<TocEntry>, entry: TocEntry) {
        if let Some(last) = toc.last_mut() {
            if entry.depth > last.depth {
                attach(&mut last.children, entry);
                return;
            }
        }
        toc.push(entry);
    }

    let mut toc = Vec::new();
    for heading in headings {
        attach(
            &mut toc,
            TocEntry {
                title: heading.title.clone(),
                slug: heading.slug.clone(),
                depth: heading.depth,
                children: Vec::new(),
            },
        );
    }
    toc
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn parse(text: &str) -> ParsedDocument {
        MarkdownParser::new().unwrap().parse(text).unwrap()
    }

    #[test]
    fn test_headings_with_depths_slugs_and_parents() {
        let doc = parse(
            "# Guide\n\nintro\n\n## Setup\n\ntext\n\n### Requirements\n\nmore\n\n## Usage\n\nend\n",
        );

        let view: Vec<(u8, &str, &str, Option<usize>)> = doc
            .headings
            .iter()
            .map(|h| (h.depth, h.title.as_str(), h.slug.as_str(), h.parent))
            .collect();
        assert_eq!(
            view,
            vec![
                (1, "Guide", "guide", None),
                (2, "Setup", "setup", Some(0)),
                (3, "Requirements", "requirements", Some(1)),
                (2, "Usage", "usage", Some(0)),
            ]
        );
    }

    #[test]
    fn test_line_spans_cover_exactly_the_heading_line() {
        let text = "# Title\n\nbody\n\n## Section\n\ntext\n";
        let doc = parse(text);

        let title = &doc.headings[0];
        assert_eq!(&text[title.line_start..title.line_end], "# Title\n");

        let section = &doc.headings[1];
        assert_eq!(&text[section.line_start..section.line_end], "## Section\n");
    }

    #[test]
    fn test_heading_byte_ranges_are_ordered_and_disjoint() {
        let doc = parse("# A\n\n## B\n\ntext\n\n## C\n\n### D\n");
        for pair in doc.headings.windows(2) {
            assert!(pair[0].line_end <= pair[1].line_start);
        }
    }

    #[test]
    fn test_hash_inside_fenced_code_is_not_a_heading() {
        let doc = parse("# Title\n\n```bash\n# not a heading\n## also not\n```\n\n## Real\n\ntext\n");
        let slugs: Vec<&str> = doc.headings.iter().map(|h| h.slug.as_str()).collect();
        assert_eq!(slugs, vec!["title", "real"]);
        assert_eq!(doc.stats.code_block_count, 1);
    }

    #[test]
    fn test_tilde_fences_are_respected_too() {
        let doc = parse("# Title\n\n~~~\n# shadowed\n~~~\n");
        assert_eq!(doc.headings.len(), 1);
    }

    #[test]
    fn test_indented_code_is_not_a_heading() {
        let doc = parse("# Title\n\n    # indented code line\n\n## Real\n\ntext\n");
        let slugs: Vec<&str> = doc.headings.iter().map(|h| h.slug.as_str()).collect();
        assert_eq!(slugs, vec!["title", "real"]);
    }

    #[test]
    fn test_setext_headings_are_ignored() {
        let doc = parse("# Title\n\nNot A Heading\n=============\n\n## Real\n\ntext\n");
        let slugs: Vec<&str> = doc.headings.iter().map(|h| h.slug.as_str()).collect();
        assert_eq!(slugs, vec!["title", "real"]);
    }

    #[test]
    fn test_all_six_depths() {
        let doc = parse("# A\n\n## B\n\n### C\n\n#### D\n\n##### E\n\n###### F\n");
        let depths: Vec<u8> = doc.headings.iter().map(|h| h.depth).collect();
        assert_eq!(depths, vec![1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn test_duplicate_slugs_are_rejected() {
        let err = MarkdownParser::new()
            .unwrap()
            .parse("# Doc\n\n## Setup\n\na\n\n## Setup\n\nb\n")
            .unwrap_err();
        match err {
            Error::DuplicateSlug { slug } => assert_eq!(slug, "setup"),
            other => panic!("expected DuplicateSlug, got {other:?}"),
        }
    }

    #[test]
    fn test_titles_colliding_after_slugification_are_rejected() {
        // Different spellings, same slug.
        let err = MarkdownParser::new()
            .unwrap()
            .parse("# Doc\n\n## Error Handling\n\n## error-handling\n")
            .unwrap_err();
        assert_eq!(err.code(), "DUPLICATE_SLUG");
    }

    #[test]
    fn test_outline_allows_duplicates() {
        let headings = MarkdownParser::new()
            .unwrap()
            .outline("## Same\n\n## Same\n")
            .unwrap();
        assert_eq!(headings.len(), 2);
    }

    #[test]
    fn test_title_accessor() {
        assert_eq!(parse("# Top\n\ntext\n").title().unwrap().slug, "top");

        let no_title = parse("## Only A Section\n");
        assert_eq!(no_title.title().unwrap_err().code(), "NO_TITLE");

        let empty = parse("just text\n");
        assert!(empty.title().is_err());
    }

    #[test]
    fn test_toc_nesting_follows_depths() {
        let doc = parse("# Top\n\n## A\n\n### A1\n\n### A2\n\n## B\n");
        assert_eq!(doc.toc.len(), 1);
        let top = &doc.toc[0];
        assert_eq!(top.slug, "top");
        assert_eq!(top.children.len(), 2);
        assert_eq!(top.children[0].slug, "a");
        assert_eq!(top.children[0].children.len(), 2);
        assert_eq!(top.children[1].slug, "b");
        assert!(top.children[1].children.is_empty());
    }

    #[test]
    fn test_stats_counts() {
        let doc = parse(
            "# Doc\n\nSee [the guide](guide.md) and [api](api.md).\n\n```rust\nfn main() {}\n```\n",
        );
        assert_eq!(doc.stats.link_count, 2);
        assert_eq!(doc.stats.code_block_count, 1);
        assert!(doc.stats.word_count > 5);
    }

    #[test]
    fn test_scan_matches_parser_outline() {
        let text = "# A\n\n## B\n";
        let scanned = scan(text).unwrap();
        let outlined = MarkdownParser::new().unwrap().outline(text).unwrap();
        assert_eq!(scanned, outlined);
    }

    #[test]
    fn test_empty_document_has_no_headings() {
        let doc = parse("");
        assert!(doc.headings.is_empty());
        assert!(doc.toc.is_empty());
    }

    proptest! {
        #[test]
        fn prop_parser_never_panics(text in r"[\s\S]{0,600}") {
            let mut parser = MarkdownParser::new().unwrap();
            let _ = parser.parse(&text);
        }

        #[test]
        fn prop_spans_are_in_bounds_and_ordered(text in r"[\s\S]{0,600}") {
            let mut parser = MarkdownParser::new().unwrap();
            if let Ok(headings) = parser.outline(&text) {
                for h in &headings {
                    prop_assert!(h.line_start <= h.line_end);
                    prop_assert!(h.line_end <= text.len());
                    prop_assert!((1..=6).contains(&h.depth));
                }
                for pair in headings.windows(2) {
                    prop_assert!(pair[0].line_start < pair[1].line_start);
                }
            }
        }

        #[test]
        fn prop_parents_are_earlier_and_shallower(text in r"[\s\S]{0,600}") {
            let mut parser = MarkdownParser::new().unwrap();
            if let Ok(headings) = parser.outline(&text) {
                for h in &headings {
                    if let Some(p) = h.parent {
                        prop_assert!(p < h.index);
                        prop_assert!(headings[p].depth < h.depth);
                    }
                }
            }
        }
    }
}
