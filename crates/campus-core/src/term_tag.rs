//! Curriculum tags embedded in term names.
//!
//! Terms carry no curriculum reference of their own. A term is scoped to a
//! curriculum by prefixing its name with a bracketed tag, e.g.
//! `"[BIO101] Term 2"`, where the tag is the curriculum's code or name.
//!
//! Malformed prefixes are treated as "no tag":
//!
//! | Input | Tag | Clean name |
//! |-------|-----|------------|
//! | `[BIO101] Term 2` | `BIO101` | `Term 2` |
//! | `Term 2` | none | `Term 2` |
//! | `[] Term 2` | none | `[] Term 2` |
//! | `[BIO Term 2` | none | `[BIO Term 2` |
//! | `[[BIO]] Term 2` | none | `[[BIO]] Term 2` |

use once_cell::sync::Lazy;
use regex::Regex;

static TAG_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^\[([^\[\]]*)\]\s*(.*)$").expect("valid term tag regex"));

/// A term name split into its tag and display part.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TermName<'a> {
    pub tag: Option<&'a str>,
    pub clean_name: &'a str,
}

impl TermName<'_> {
    pub fn has_prefix(&self) -> bool {
        self.tag.is_some()
    }
}

/// Split a term name into `(tag, clean name)`.
///
/// Without a well-formed, non-empty tag the clean name is the input verbatim.
pub fn parse_term_name(name: &str) -> TermName<'_> {
    let untagged = TermName {
        tag: None,
        clean_name: name,
    };

    let Some(caps) = TAG_PREFIX.captures(name) else {
        return untagged;
    };
    let (Some(tag), Some(rest)) = (caps.get(1), caps.get(2)) else {
        return untagged;
    };

    let tag = tag.as_str().trim();
    if tag.is_empty() {
        return untagged;
    }

    TermName {
        tag: Some(tag),
        clean_name: rest.as_str(),
    }
}

/// Build a curriculum-scoped term name: `"[TAG] name"`.
///
/// An existing tag on `name` is replaced rather than nested.
pub fn format_term_name(tag: &str, name: &str) -> String {
    let clean = parse_term_name(name).clean_name;
    format!("[{}] {}", tag.trim(), clean)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tagged_name() {
        let parsed = parse_term_name("[BIO101] Term 2");
        assert_eq!(parsed.tag, Some("BIO101"));
        assert_eq!(parsed.clean_name, "Term 2");
        assert!(parsed.has_prefix());
    }

    #[test]
    fn test_untagged_name_is_verbatim() {
        let parsed = parse_term_name("Semester 1");
        assert!(!parsed.has_prefix());
        assert_eq!(parsed.clean_name, "Semester 1");
    }

    #[test]
    fn test_untagged_name_keeps_surrounding_whitespace() {
        let parsed = parse_term_name("  Term 1 ");
        assert!(!parsed.has_prefix());
        assert_eq!(parsed.clean_name, "  Term 1 ");
    }

    #[test]
    fn test_empty_tag_is_no_tag() {
        let parsed = parse_term_name("[] Term 2");
        assert!(!parsed.has_prefix());
        assert_eq!(parsed.clean_name, "[] Term 2");

        let parsed = parse_term_name("[   ] Term 2");
        assert!(!parsed.has_prefix());
    }

    #[test]
    fn test_unterminated_bracket_is_no_tag() {
        let parsed = parse_term_name("[BIO Term 2");
        assert!(!parsed.has_prefix());
        assert_eq!(parsed.clean_name, "[BIO Term 2");
    }

    #[test]
    fn test_nested_brackets_are_no_tag() {
        assert!(!parse_term_name("[[BIO]] Term 2").has_prefix());
        assert!(!parse_term_name("[BIO [x]] Term 2").has_prefix());
    }

    #[test]
    fn test_tag_not_at_start_is_ignored() {
        let parsed = parse_term_name("Term 2 [BIO]");
        assert!(!parsed.has_prefix());
        assert_eq!(parsed.clean_name, "Term 2 [BIO]");
    }

    #[test]
    fn test_missing_space_after_tag() {
        let parsed = parse_term_name("[CHEM]Term 3");
        assert_eq!(parsed.tag, Some("CHEM"));
        assert_eq!(parsed.clean_name, "Term 3");
    }

    #[test]
    fn test_tag_whitespace_trimmed() {
        let parsed = parse_term_name("[ Grade 10 Science ] Term 1");
        assert_eq!(parsed.tag, Some("Grade 10 Science"));
        assert_eq!(parsed.clean_name, "Term 1");
    }

    #[test]
    fn test_tag_only() {
        let parsed = parse_term_name("[BIO]");
        assert_eq!(parsed.tag, Some("BIO"));
        assert_eq!(parsed.clean_name, "");
    }

    #[test]
    fn test_format_term_name() {
        assert_eq!(format_term_name("BIO101", "Term 2"), "[BIO101] Term 2");
    }

    #[test]
    fn test_format_term_name_replaces_existing_tag() {
        assert_eq!(format_term_name("CHEM", "[BIO] Term 2"), "[CHEM] Term 2");
    }

    #[test]
    fn test_format_then_parse() {
        let name = format_term_name("MATH", "Semester 1");
        let parsed = parse_term_name(&name);
        assert_eq!(parsed.tag, Some("MATH"));
        assert_eq!(parsed.clean_name, "Semester 1");
    }
}
