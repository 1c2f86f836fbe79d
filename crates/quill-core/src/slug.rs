//! Deterministic slug derivation for heading titles.
//!
//! A slug is the stable identifier of a heading within one document: the
//! title is NFKD-normalized with combining marks dropped (so `Café` and
//! `Cafe` collide rather than silently diverging), lowercased, and every run
//! of non-alphanumeric characters collapses to a single `-`. Slugs never
//! start or end with `-`. The derivation depends only on the title, so a
//! slug is stable across content edits and changes only on rename.

use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

/// Derive the slug for a heading title.
///
/// # Examples
///
/// ```
/// use quill_core::slug::slugify;
///
/// assert_eq!(slugify("Getting Started"), "getting-started");
/// assert_eq!(slugify("  API  --  v2.1!  "), "api-v2-1");
/// assert_eq!(slugify("Café"), "cafe");
/// ```
#[must_use]
pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut pending_dash = false;

    for ch in title.nfkd() {
        if is_combining_mark(ch) {
            continue;
        }
        for lower in ch.to_lowercase() {
            if lower.is_alphanumeric() {
                if pending_dash && !slug.is_empty() {
                    slug.push('-');
                }
                pending_dash = false;
                slug.push(lower);
            } else {
                pending_dash = true;
            }
        }
    }

    slug
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_basic_titles() {
        assert_eq!(slugify("Overview"), "overview");
        assert_eq!(slugify("Getting Started"), "getting-started");
        assert_eq!(slugify("Error Handling & Retries"), "error-handling-retries");
        assert_eq!(slugify("Main-Workflow"), "main-workflow");
    }

    #[test]
    fn test_collapses_and_trims_punctuation() {
        assert_eq!(slugify("  Hello,   World!  "), "hello-world");
        assert_eq!(slugify("a---b"), "a-b");
        assert_eq!(slugify("--edge--"), "edge");
        assert_eq!(slugify("v2.1.0"), "v2-1-0");
    }

    #[test]
    fn test_diacritics_fold_to_ascii() {
        assert_eq!(slugify("Café"), "cafe");
        assert_eq!(slugify("Über uns"), "uber-uns");
    }

    #[test]
    fn test_non_latin_text_is_preserved() {
        assert_eq!(slugify("日本語"), "日本語");
    }

    #[test]
    fn test_symbol_only_title_yields_empty_slug() {
        assert_eq!(slugify("!!!"), "");
        assert_eq!(slugify("---"), "");
    }

    proptest! {
        #[test]
        fn prop_deterministic(title in ".{0,80}") {
            prop_assert_eq!(slugify(&title), slugify(&title));
        }

        #[test]
        fn prop_no_leading_trailing_or_double_dash(title in ".{0,80}") {
            let slug = slugify(&title);
            prop_assert!(!slug.starts_with('-'));
            prop_assert!(!slug.ends_with('-'));
            prop_assert!(!slug.contains("--"));
        }

        #[test]
        fn prop_idempotent_on_own_output(title in ".{0,80}") {
            let slug = slugify(&title);
            prop_assert_eq!(slugify(&slug), slug);
        }

        #[test]
        fn prop_ascii_titles_yield_ascii_lowercase(title in "[ -~]{0,80}") {
            let slug = slugify(&title);
            prop_assert!(slug.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-'));
        }
    }
}
