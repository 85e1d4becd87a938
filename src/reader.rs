//! Schema source reading: comment stripping, whitespace normalization,
//! and separation of top-level `enum`/`class` blocks.
//!
//! The reader only recognizes blocks; it never interprets their contents.
//! Unknown top-level tokens are silently dropped, matching the documented
//! behavior of the schema language.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::{ErrorKind, SchemaError};

/// Matches a complete top-level enum block (innermost braces only).
static ENUM_BLOCK_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)\benum\s+[A-Za-z_][A-Za-z0-9_]*\s*\{[^{}]*\}").unwrap()
});

/// Matches a complete top-level class block (innermost braces only).
static CLASS_BLOCK_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)\bclass\s+[A-Za-z_][A-Za-z0-9_]*\s*\{[^{}]*\}").unwrap()
});

/// Matches a line that opens a top-level block.
static BLOCK_HEADER_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^(enum|class)\b").unwrap());

/// Strip `//` comments and blank lines; collapse runs of whitespace within
/// each line to a single space.
pub fn clean_source(text: &str) -> String {
    let mut lines = Vec::new();

    for raw_line in text.lines() {
        let line = match raw_line.find("//") {
            Some(idx) => &raw_line[..idx],
            None => raw_line,
        };
        let collapsed = line.split_whitespace().collect::<Vec<_>>().join(" ");
        if !collapsed.is_empty() {
            lines.push(collapsed);
        }
    }

    lines.join("\n")
}

/// Separate cleaned source into enum text and class text.
///
/// Each returned string is the concatenation of complete blocks joined by
/// blank lines. Fails only when an `enum`/`class` keyword opens a line but
/// no matching block can be extracted for it.
pub fn separate(text: &str) -> Result<(String, String), SchemaError> {
    let cleaned = clean_source(text);
    if cleaned.trim().is_empty() {
        return Ok((String::new(), String::new()));
    }

    let enum_blocks: Vec<&str> = ENUM_BLOCK_REGEX
        .find_iter(&cleaned)
        .map(|m| m.as_str())
        .collect();
    let class_blocks: Vec<&str> = CLASS_BLOCK_REGEX
        .find_iter(&cleaned)
        .map(|m| m.as_str())
        .collect();

    let mut header_enum = 0usize;
    let mut header_class = 0usize;
    for m in BLOCK_HEADER_REGEX.find_iter(&cleaned) {
        match m.as_str() {
            "enum" => header_enum += 1,
            _ => header_class += 1,
        }
    }

    if header_enum > enum_blocks.len() {
        return Err(SchemaError::new(
            ErrorKind::InvalidSyntax,
            "found 'enum' keyword without an extractable block; expected 'enum Name { VALUE ... }'",
        ));
    }
    if header_class > class_blocks.len() {
        return Err(SchemaError::new(
            ErrorKind::InvalidSyntax,
            "found 'class' keyword without an extractable block; expected 'class Name { ... }'",
        ));
    }

    Ok((enum_blocks.join("\n\n"), class_blocks.join("\n\n")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_strips_comments_and_blanks() {
        let source = "  // header comment\nenum Role {   // trailing\n  USER\n\n  ADMIN\n}\n";
        let cleaned = clean_source(source);
        assert_eq!(cleaned, "enum Role {\nUSER\nADMIN\n}");
    }

    #[test]
    fn test_clean_collapses_internal_whitespace() {
        let cleaned = clean_source("id    Int\t@primaryKey");
        assert_eq!(cleaned, "id Int @primaryKey");
    }

    #[test]
    fn test_separate_splits_enums_and_classes() {
        let source = r#"
enum Role { USER ADMIN }

class User {
  id Int @primaryKey
  role Role
}
"#;
        let (enums, classes) = separate(source).unwrap();
        assert!(enums.starts_with("enum Role {"));
        assert!(classes.starts_with("class User {"));
        assert!(classes.contains("id Int @primaryKey"));
    }

    #[test]
    fn test_separate_multiple_blocks_joined_by_blank_lines() {
        let source = "enum A { X }\nenum B { Y }\nclass C { id Int @primaryKey }";
        let (enums, classes) = separate(source).unwrap();
        assert_eq!(enums, "enum A { X }\n\nenum B { Y }");
        assert_eq!(classes, "class C { id Int @primaryKey }");
    }

    #[test]
    fn test_separate_empty_source() {
        let (enums, classes) = separate("// nothing here\n").unwrap();
        assert!(enums.is_empty());
        assert!(classes.is_empty());
    }

    #[test]
    fn test_separate_unknown_tokens_dropped() {
        let source = "datasource db { provider }\nenum Role { USER }";
        let (enums, classes) = separate(source).unwrap();
        assert_eq!(enums, "enum Role { USER }");
        assert!(classes.is_empty());
    }

    #[test]
    fn test_separate_unclosed_block_fails() {
        let source = "class User {\n  id Int @primaryKey\n";
        let err = separate(source).unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidSyntax);
    }

    #[test]
    fn test_separate_keyword_without_block_fails() {
        let err = separate("enum Role\nclass User { id Int }").unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidSyntax);
    }
}
