//! Collection and field name rules of the document store
//!
//! Collection names must begin with an underscore or a letter, must not
//! contain `$` or the NUL character, and must not use the reserved `system.`
//! prefix. Field names must not contain `$`, `.` or NUL.

use regex::Regex;
use std::sync::OnceLock;

// Both patterns are literals; compilation cannot fail.
#[allow(clippy::expect_used)]
fn collection_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[_a-zA-Z][^$\x00]*$").expect("collection name pattern"))
}

#[allow(clippy::expect_used)]
fn field_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[^$\x00.]+$").expect("field name pattern"))
}

/// Whether `name` can be used as a collection name as-is
pub fn valid_collection_name(name: &str) -> bool {
    collection_pattern().is_match(name) && !name.to_lowercase().starts_with("system")
}

/// Whether `name` can be used as a document field name as-is
pub fn valid_field_name(name: &str) -> bool {
    field_pattern().is_match(name)
}

/// Lower-case, trim, and replace characters the store (or a human) would
/// trip over with `_`.
pub fn sanitize_name(name: &str) -> String {
    name.trim()
        .to_lowercase()
        .chars()
        .map(|c| match c {
            ' ' | '\t' | '\n' | '\r' | '$' | '.' | '\0' => '_',
            '/' | '\\' | ':' | ';' | '|' | '-' | ',' | '#' => '_',
            other => other,
        })
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_valid_collection_names() {
        assert!(valid_collection_name("students"));
        assert!(valid_collection_name("_private"));
        assert!(valid_collection_name("Data2024"));
        assert!(!valid_collection_name(""));
        assert!(!valid_collection_name("2024data"));
        assert!(!valid_collection_name("price$"));
        assert!(!valid_collection_name("system.users"));
        assert!(!valid_collection_name("SYSTEM_logs"));
    }

    #[test]
    fn test_valid_field_names() {
        assert!(valid_field_name("name"));
        assert!(valid_field_name("first name"));
        assert!(!valid_field_name(""));
        assert!(!valid_field_name("a.b"));
        assert!(!valid_field_name("$set"));
    }

    #[test]
    fn test_sanitize_name() {
        assert_eq!(sanitize_name("  First Name "), "first_name");
        assert_eq!(sanitize_name("price.$usd"), "price__usd");
        assert_eq!(sanitize_name("data/2024-01"), "data_2024_01");
    }

    proptest! {
        #[test]
        fn sanitized_names_are_valid_fields(name in "[a-zA-Z][a-zA-Z0-9 .$-]{0,20}") {
            prop_assert!(valid_field_name(&sanitize_name(&name)));
        }
    }
}
