//! Cleanup of spreadsheet column artifacts in requirement text
//!
//! Rows exported from sheets without headers arrive as pipe-separated cells,
//! each prefixed with a generated label such as `Unnamed: 3: `.

use regex::Regex;
use std::sync::OnceLock;

const LEADING_LABEL: &str = r"^Unnamed:\s*\d+:\s*";
const ANY_LABEL: &str = r"Unnamed:\s*\d+:\s*";
const SEGMENT_LABELS: [&str; 4] = [
    "Requirement:",
    "Department/Category:",
    "Status:",
    "Details:",
];

static LEADING: OnceLock<Option<Regex>> = OnceLock::new();
static ANYWHERE: OnceLock<Option<Regex>> = OnceLock::new();

fn compiled(cell: &'static OnceLock<Option<Regex>>, pattern: &str) -> Option<&'static Regex> {
    cell.get_or_init(|| match Regex::new(pattern) {
        Ok(re) => Some(re),
        Err(e) => {
            tracing::warn!("Label pattern rejected: {}", e);
            None
        }
    })
    .as_ref()
}

fn strip_leading_labels(segment: &str) -> &str {
    let mut s = segment;
    if let Some(re) = compiled(&LEADING, LEADING_LABEL) {
        while let Some(m) = re.find(s) {
            s = &s[m.end()..];
        }
    }
    s.trim()
}

fn segments(text: &str) -> Vec<&str> {
    text.split('|')
        .map(|seg| strip_leading_labels(seg.trim()))
        .filter(|seg| !seg.is_empty())
        .collect()
}

/// Structured form used inside generation context
///
/// Several surviving segments are labelled by position and joined with
/// newlines; a single segment is returned bare. Text made only of labels
/// cleans to an empty string.
pub fn clean_requirement_text(text: &str) -> String {
    let parts = segments(text);
    if parts.len() <= 1 {
        return parts.first().map(|s| s.to_string()).unwrap_or_default();
    }

    parts
        .iter()
        .enumerate()
        .map(|(i, part)| match SEGMENT_LABELS.get(i) {
            Some(label) => format!("{} {}", label, part),
            None => part.to_string(),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Compact single-line form used for sources shown to users
pub fn clean_for_display(text: &str) -> String {
    segments(text).join(" | ")
}

/// Remove every `Unnamed: <n>:` label wherever it appears
pub fn strip_unnamed(text: &str) -> String {
    match compiled(&ANYWHERE, ANY_LABEL) {
        Some(re) => re.replace_all(text, "").into_owned(),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_two_segments_are_labelled() {
        assert_eq!(
            clean_requirement_text("Unnamed: 1: Foo | Unnamed: 2: Bar"),
            "Requirement: Foo\nDepartment/Category: Bar"
        );
    }

    #[test]
    fn test_labels_by_position() {
        let cleaned = clean_requirement_text("a | b | c | d | e");
        assert_eq!(
            cleaned,
            "Requirement: a\nDepartment/Category: b\nStatus: c\nDetails: d\ne"
        );
    }

    #[test]
    fn test_single_segment_is_bare() {
        assert_eq!(
            clean_requirement_text("Unnamed: 4:   Supports SMS alerts "),
            "Supports SMS alerts"
        );
        assert_eq!(clean_requirement_text("Plain text"), "Plain text");
    }

    #[test]
    fn test_label_shape_is_exact() {
        assert_eq!(clean_requirement_text("Unnamed:7:x"), "x");
        assert_eq!(clean_requirement_text("Unnamed: 1:Unnamed: 2: x"), "x");
        // no digits, so not a generated label
        assert_eq!(clean_requirement_text("Unnamed: a: x"), "Unnamed: a: x");
        assert_eq!(clean_requirement_text("Unnamed columns"), "Unnamed columns");
    }

    #[test]
    fn test_only_leading_labels_stripped_from_segments() {
        assert_eq!(clean_requirement_text("Unnamed:\t12:\tfoo"), "foo");
        assert_eq!(
            clean_requirement_text("Foo Unnamed: 2: bar"),
            "Foo Unnamed: 2: bar"
        );
    }

    #[test]
    fn test_empty_segments_dropped() {
        assert_eq!(
            clean_requirement_text("Unnamed: 1:  | Core banking | "),
            "Core banking"
        );
        assert_eq!(clean_requirement_text("Unnamed: 1: | Unnamed: 2:"), "");
        assert_eq!(clean_requirement_text(""), "");
    }

    #[test]
    fn test_cleaning_is_idempotent() {
        let inputs = [
            "Unnamed: 1: Foo | Unnamed: 2: Bar",
            "a | b | c | d | e | f",
            "Unnamed: 3: Only one",
            "Unnamed: 1: | Unnamed: 2:",
            "no artifacts here",
            "  padded | Unnamed: 9: tail  ",
        ];
        for input in inputs {
            let once = clean_requirement_text(input);
            assert_eq!(clean_requirement_text(&once), once, "input: {input}");

            let display = clean_for_display(input);
            assert_eq!(clean_for_display(&display), display, "input: {input}");
        }
    }

    #[test]
    fn test_display_form() {
        assert_eq!(
            clean_for_display("Unnamed: 1: Foo | Unnamed: 2: Bar"),
            "Foo | Bar"
        );
    }

    #[test]
    fn test_strip_unnamed_everywhere() {
        assert_eq!(
            strip_unnamed("...**SMS** alerts | Unnamed: 2: Retail..."),
            "...**SMS** alerts | Retail..."
        );
        assert_eq!(strip_unnamed("Unnamed: x stays"), "Unnamed: x stays");
    }
}
