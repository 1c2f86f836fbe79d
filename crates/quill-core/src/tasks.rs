//! Task metadata conventions.
//!
//! A task is a plain section whose nearest depth-2 ancestor is the `Tasks`
//! section; nothing about storage or editing changes. What tasks add is a
//! metadata convention: the first lines of the body carry fields in one of
//! three equivalent forms,
//!
//! ```markdown
//! * Status: in_progress
//! - Priority: high
//! **Workflow:** release-checklist
//! ```
//!
//! When the same key appears in more than one form, `*` wins over `-`, which
//! wins over `**…**`. Field scanning stops at the first line that is neither
//! blank nor a metadata field, so list items in the body proper are never
//! misread as fields.

use std::fmt;
use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

#[allow(clippy::expect_used)]
static STAR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\*\s+([A-Za-z][A-Za-z0-9 _-]*?)\s*:\s*(.+?)\s*$").expect("valid pattern")
});
#[allow(clippy::expect_used)]
static DASH_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^-\s+([A-Za-z][A-Za-z0-9 _-]*?)\s*:\s*(.+?)\s*$").expect("valid pattern")
});
#[allow(clippy::expect_used)]
static BOLD_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\*\*([A-Za-z][A-Za-z0-9 _-]*?)\s*:\*\*\s*(.+?)\s*$").expect("valid pattern")
});

/// The line form a field was written in; also its precedence, highest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum FieldForm {
    /// `* Key: value`
    Star,
    /// `- Key: value`
    Dash,
    /// `**Key:** value`
    Bold,
}

/// One metadata field from the head of a task body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskField {
    /// Field key, case preserved.
    pub key: String,
    /// Field value, trimmed.
    pub value: String,
    /// Which line form carried it.
    pub form: FieldForm,
}

/// Task lifecycle states for the `Status` field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Not started.
    #[default]
    Pending,
    /// Someone is on it.
    InProgress,
    /// Done.
    Completed,
    /// Waiting on something else.
    Blocked,
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Blocked => "blocked",
        };
        f.write_str(s)
    }
}

impl FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "pending" => Ok(Self::Pending),
            "in_progress" => Ok(Self::InProgress),
            "completed" => Ok(Self::Completed),
            "blocked" => Ok(Self::Blocked),
            other => Err(format!("unknown task status '{other}'")),
        }
    }
}

fn parse_line(line: &str) -> Option<TaskField> {
    // Bold first: `**Key:** v` also starts with `*` but never matches the
    // star form (which requires whitespace after a single `*`).
    for (re, form) in [
        (&*BOLD_RE, FieldForm::Bold),
        (&*STAR_RE, FieldForm::Star),
        (&*DASH_RE, FieldForm::Dash),
    ] {
        if let Some(caps) = re.captures(line) {
            return Some(TaskField {
                key: caps[1].trim().to_string(),
                value: caps[2].to_string(),
                form,
            });
        }
    }
    None
}

/// Parse the leading metadata run of a task body.
///
/// Scanning stops at the first line that is neither blank nor a field.
#[must_use]
pub fn parse_fields(body: &str) -> Vec<TaskField> {
    let mut fields = Vec::new();
    for line in body.lines() {
        if line.trim().is_empty() {
            continue;
        }
        match parse_line(line) {
            Some(field) => fields.push(field),
            None => break,
        }
    }
    fields
}

/// Extract one field by key (case-insensitive), honoring form precedence:
/// `*` over `-` over `**…**`, first occurrence within a form.
#[must_use]
pub fn extract_field(body: &str, key: &str) -> Option<String> {
    parse_fields(body)
        .into_iter()
        .filter(|f| f.key.eq_ignore_ascii_case(key))
        .min_by_key(|f| f.form)
        .map(|f| f.value)
}

/// The task's `Status` field, defaulting to pending when absent or
/// unparseable.
#[must_use]
pub fn status_of(body: &str) -> TaskStatus {
    extract_field(body, "Status")
        .and_then(|v| v.parse().ok())
        .unwrap_or_default()
}

fn render_field(form: FieldForm, key: &str, value: &str) -> String {
    match form {
        FieldForm::Star => format!("* {key}: {value}"),
        FieldForm::Dash => format!("- {key}: {value}"),
        FieldForm::Bold => format!("**{key}:** {value}"),
    }
}

/// Rewrite a field in a task body, preserving each matching line's form.
///
/// Every line in the leading metadata run that carries `key` (in any form)
/// gets the new value, so precedence cannot resurrect a stale one. When the
/// key is absent, a `* Key: value` line is inserted at the top of the body.
#[must_use]
pub fn set_field(body: &str, key: &str, value: &str) -> String {
    let mut lines: Vec<String> = Vec::new();
    let mut replaced = false;
    let mut in_metadata = true;

    for line in body.lines() {
        if in_metadata && !line.trim().is_empty() {
            match parse_line(line) {
                Some(field) if field.key.eq_ignore_ascii_case(key) => {
                    lines.push(render_field(field.form, &field.key, value));
                    replaced = true;
                    continue;
                },
                Some(_) => {},
                None => in_metadata = false,
            }
        }
        lines.push(line.to_string());
    }

    if !replaced {
        lines.insert(0, render_field(FieldForm::Star, key, value));
    }

    let mut out = lines.join("\n");
    if body.ends_with('\n') {
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_three_forms_are_equivalent() {
        assert_eq!(
            extract_field("* Status: pending\n", "Status").as_deref(),
            Some("pending")
        );
        assert_eq!(
            extract_field("- Status: pending\n", "Status").as_deref(),
            Some("pending")
        );
        assert_eq!(
            extract_field("**Status:** in_progress\n", "Status").as_deref(),
            Some("in_progress")
        );
    }

    #[test]
    fn test_star_beats_bold() {
        let body = "* Status: a\n**Status:** b\n";
        assert_eq!(extract_field(body, "Status").as_deref(), Some("a"));
    }

    #[test]
    fn test_star_beats_dash_beats_bold() {
        let body = "**Status:** c\n- Status: b\n* Status: a\n";
        assert_eq!(extract_field(body, "Status").as_deref(), Some("a"));

        let body = "**Status:** c\n- Status: b\n";
        assert_eq!(extract_field(body, "Status").as_deref(), Some("b"));
    }

    #[test]
    fn test_key_match_is_case_insensitive_and_value_preserved() {
        let body = "* Priority: High Priority!\n";
        assert_eq!(
            extract_field(body, "priority").as_deref(),
            Some("High Priority!")
        );
    }

    #[test]
    fn test_hyphenated_and_free_form_keys() {
        let body = "* Main-Workflow: release\n* Reviewer: sam\n";
        assert_eq!(extract_field(body, "Main-Workflow").as_deref(), Some("release"));
        assert_eq!(extract_field(body, "Reviewer").as_deref(), Some("sam"));
    }

    #[test]
    fn test_scanning_stops_at_first_content_line() {
        let body = "* Status: pending\n\nDescription of the task.\n\n* A list item: not metadata\n";
        let fields = parse_fields(body);
        assert_eq!(fields.len(), 1);
        assert_eq!(extract_field(body, "A list item"), None);
    }

    #[test]
    fn test_blank_lines_between_fields_are_allowed() {
        let body = "* Status: pending\n\n- Priority: low\n";
        assert_eq!(extract_field(body, "Priority").as_deref(), Some("low"));
    }

    #[test]
    fn test_value_containing_colon() {
        let body = "* Workflow: deploy: staged\n";
        assert_eq!(
            extract_field(body, "Workflow").as_deref(),
            Some("deploy: staged")
        );
    }

    #[test]
    fn test_plain_list_items_are_not_fields() {
        let body = "just prose first\n* Status: pending\n";
        assert!(parse_fields(body).is_empty());
    }

    #[test]
    fn test_status_parsing() {
        assert_eq!(status_of("**Status:** in_progress\n"), TaskStatus::InProgress);
        assert_eq!(status_of("* Status: blocked\n"), TaskStatus::Blocked);
        assert_eq!(status_of("no fields here\n"), TaskStatus::Pending);
        assert_eq!(status_of("* Status: bogus\n"), TaskStatus::Pending);
        assert_eq!(TaskStatus::Completed.to_string(), "completed");
    }

    #[test]
    fn test_set_field_preserves_form() {
        let body = "**Status:** pending\n\nDo the thing.\n";
        let updated = set_field(body, "Status", "completed");
        assert_eq!(updated, "**Status:** completed\n\nDo the thing.\n");
    }

    #[test]
    fn test_set_field_updates_every_form_so_none_goes_stale() {
        let body = "* Status: a\n**Status:** b\nrest\n";
        let updated = set_field(body, "status", "done");
        assert_eq!(extract_field(&updated, "Status").as_deref(), Some("done"));
        assert!(updated.contains("* Status: done"));
        assert!(updated.contains("**Status:** done"));
    }

    #[test]
    fn test_set_field_inserts_when_absent() {
        let body = "Just a description.\n";
        let updated = set_field(body, "Status", "pending");
        assert_eq!(updated, "* Status: pending\nJust a description.\n");
        assert_eq!(status_of(&updated), TaskStatus::Pending);
    }

    #[test]
    fn test_set_field_does_not_touch_body_list_items() {
        let body = "* Status: pending\n\nSteps:\n* Status: not metadata here\n";
        let updated = set_field(body, "Status", "blocked");
        assert!(updated.contains("* Status: blocked\n"));
        assert!(updated.contains("* Status: not metadata here"));
    }

    #[test]
    fn test_serde_snake_case() {
        let json = serde_json::to_string(&TaskStatus::InProgress).unwrap();
        assert_eq!(json, "\"in_progress\"");
        let back: TaskStatus = serde_json::from_str("\"blocked\"").unwrap();
        assert_eq!(back, TaskStatus::Blocked);
    }
}
