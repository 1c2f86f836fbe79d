//! Deterministic keyword fingerprints.
//!
//! The fingerprint is a small, stable bag of keywords derived from a
//! document's title, body, and frontmatter `keywords:` list. Relevance
//! scoring above the core ranks documents by fingerprint overlap instead of
//! re-reading bodies, so the only hard requirement is determinism: identical
//! content must always produce the identical keyword list. Ranking is
//! frequency with a lexicographic tie-break; no hashing, no randomness.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;

/// Upper bound on fingerprint size.
const MAX_KEYWORDS: usize = 24;
/// Minimum token length considered a keyword.
const MIN_TOKEN_LEN: usize = 3;
/// Weight added to tokens from the title and frontmatter keyword list.
const BOOST: usize = 1_000;

/// Words too common to discriminate between documents.
const STOPWORDS: &[&str] = &[
    "and", "are", "but", "for", "from", "has", "have", "into", "not", "our",
    "that", "the", "their", "then", "these", "this", "was", "were", "will",
    "with", "you", "your",
];

#[allow(clippy::expect_used)]
static INLINE_LIST_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^keywords:\s*\[(.*)\]\s*$").expect("valid pattern")
});

fn is_stopword(token: &str) -> bool {
    STOPWORDS.contains(&token)
}

fn tokens_of(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.len() >= MIN_TOKEN_LEN)
        .map(str::to_lowercase)
        .filter(|t| !is_stopword(t))
}

/// Pull the `keywords:` list out of a leading frontmatter block, if any.
///
/// Both the inline form (`keywords: [cache, mcp]`) and the dash-list form
/// are understood:
///
/// ```yaml
/// keywords:
///   - cache
///   - mcp
/// ```
#[must_use]
pub fn frontmatter_keywords(content: &str) -> Vec<String> {
    let Some(rest) = content.strip_prefix("---\n") else {
        return Vec::new();
    };
    let Some(end) = rest.find("\n---") else {
        return Vec::new();
    };
    let block = &rest[..end];

    let mut keywords = Vec::new();
    let mut in_list = false;
    for line in block.lines() {
        if let Some(caps) = INLINE_LIST_RE.captures(line) {
            for item in caps[1].split(',') {
                let item = item.trim().trim_matches(|c| c == '"' || c == '\'');
                if !item.is_empty() {
                    keywords.push(item.to_lowercase());
                }
            }
            return keywords;
        }
        if line.trim_end() == "keywords:" {
            in_list = true;
            continue;
        }
        if in_list {
            if let Some(item) = line.trim_start().strip_prefix("- ") {
                let item = item.trim().trim_matches(|c| c == '"' || c == '\'');
                if !item.is_empty() {
                    keywords.push(item.to_lowercase());
                }
            } else {
                in_list = false;
            }
        }
    }
    keywords
}

/// Derive the keyword fingerprint for a document.
///
/// Frontmatter keywords and title tokens are boosted above body frequency so
/// author intent wins; ordering is `(weight desc, token asc)`, which makes
/// the result a pure function of the content.
#[must_use]
pub fn fingerprint(title: &str, content: &str) -> Vec<String> {
    let mut weights: HashMap<String, usize> = HashMap::new();

    for token in tokens_of(content) {
        *weights.entry(token).or_insert(0) += 1;
    }
    for token in tokens_of(title) {
        *weights.entry(token).or_insert(0) += BOOST;
    }
    for keyword in frontmatter_keywords(content) {
        *weights.entry(keyword).or_insert(0) += BOOST;
    }

    let mut ranked: Vec<(String, usize)> = weights.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked.truncate(MAX_KEYWORDS);
    ranked.into_iter().map(|(token, _)| token).collect()
}
