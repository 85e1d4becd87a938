//! Enum block parsing and validation.
//!
//! An enum block is `enum Name { V1 V2 ... }`. Names and values must be
//! identifiers, non-reserved, not scalar-type names, and at most 64
//! characters. Values accept UPPERCASE, UPPER_SNAKE, or PascalCase naming
//! and must be unique case-insensitively. Ordinals are assigned 1..N in
//! source order.

use std::collections::HashSet;
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::constants::{is_identifier, is_reserved_word, ScalarType, MAX_ENUM_VALUES, MAX_IDENTIFIER_LEN};
use crate::error::{ErrorKind, SchemaError};

static ENUM_DEF_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)^enum\s+([A-Za-z_][A-Za-z0-9_]*)\s*\{(.*)\}$").unwrap()
});

/// A single enum member with its 1-based ordinal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnumValue {
    pub name: String,
    pub ordinal: usize,
}

/// A named enum with its ordered members.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnumDef {
    pub name: String,
    pub values: Vec<EnumValue>,
    /// Insertion order within the schema source.
    pub position: usize,
}

impl EnumDef {
    pub fn has_value(&self, name: &str) -> bool {
        self.values.iter().any(|v| v.name == name)
    }

    pub fn value_names(&self) -> impl Iterator<Item = &str> {
        self.values.iter().map(|v| v.name.as_str())
    }
}

impl fmt::Display for EnumDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "enum {} {{", self.name)?;
        for value in &self.values {
            writeln!(f, "  {}", value.name)?;
        }
        write!(f, "}}")
    }
}

/// Parse one enum block into a validated [`EnumDef`].
pub fn parse_enum(definition: &str, position: usize) -> Result<EnumDef, SchemaError> {
    let definition = definition.trim();

    let captures = ENUM_DEF_REGEX.captures(definition).ok_or_else(|| {
        SchemaError::new(
            ErrorKind::InvalidSyntax,
            "invalid enum definition; expected 'enum Name { VALUE1 VALUE2 ... }'",
        )
    })?;

    let name = captures[1].to_string();
    let body = captures[2].trim();

    validate_enum_name(&name)?;

    let mut values = Vec::new();
    for raw in body.split_whitespace() {
        values.push(EnumValue {
            name: raw.to_string(),
            ordinal: values.len() + 1,
        });
    }

    let def = EnumDef { name, values, position };
    validate_enum(&def)?;
    Ok(def)
}

/// Check an enum name against the identifier, reserved-word, scalar-conflict,
/// and length rules.
pub fn validate_enum_name(name: &str) -> Result<(), SchemaError> {
    if name.is_empty() {
        return Err(SchemaError::new(ErrorKind::EmptyName, "enum name cannot be empty"));
    }
    if !is_identifier(name) {
        return Err(SchemaError::new(
            ErrorKind::InvalidIdentifier,
            format!("invalid enum name '{}': must start with a letter or underscore", name),
        ));
    }
    if ScalarType::parse(name).is_some() {
        return Err(SchemaError::new(
            ErrorKind::ScalarConflict,
            format!("enum name '{}' conflicts with a scalar type", name),
        ));
    }
    if is_reserved_word(name) {
        return Err(SchemaError::new(
            ErrorKind::ReservedKeyword,
            format!("enum name '{}' is a reserved word", name),
        ));
    }
    if name.len() > MAX_IDENTIFIER_LEN {
        return Err(SchemaError::new(
            ErrorKind::TooLong,
            format!("enum name '{}' is too long (max {} characters)", name, MAX_IDENTIFIER_LEN),
        ));
    }
    Ok(())
}

fn validate_enum_value(value: &str, enum_name: &str) -> Result<(), SchemaError> {
    let location = format!("enum '{}'", enum_name);

    if value.is_empty() {
        return Err(SchemaError::located(
            ErrorKind::EmptyName,
            "enum value cannot be empty",
            location,
        ));
    }
    if !is_identifier(value) {
        return Err(SchemaError::located(
            ErrorKind::InvalidIdentifier,
            format!("invalid enum value '{}': must start with a letter or underscore", value),
            location,
        ));
    }
    if ScalarType::parse(value).is_some() {
        return Err(SchemaError::located(
            ErrorKind::ScalarConflict,
            format!("enum value '{}' conflicts with a scalar type", value),
            location,
        ));
    }
    if is_reserved_word(value) {
        return Err(SchemaError::located(
            ErrorKind::ReservedKeyword,
            format!("enum value '{}' is a reserved word", value),
            location,
        ));
    }
    if !acceptable_value_naming(value) {
        return Err(SchemaError::located(
            ErrorKind::NamingStyle,
            format!("enum value '{}' should be UPPERCASE, UPPER_SNAKE, or PascalCase", value),
            location,
        ));
    }
    if value.len() > MAX_IDENTIFIER_LEN {
        return Err(SchemaError::located(
            ErrorKind::TooLong,
            format!("enum value '{}' is too long (max {} characters)", value, MAX_IDENTIFIER_LEN),
            location,
        ));
    }
    Ok(())
}

/// Values may be fully uppercase (with or without underscores) or start
/// with an uppercase letter.
fn acceptable_value_naming(value: &str) -> bool {
    if value.to_uppercase() == value {
        return true;
    }
    value.chars().next().is_some_and(|c| c.is_ascii_uppercase())
}

fn validate_enum(def: &EnumDef) -> Result<(), SchemaError> {
    let location = format!("enum '{}'", def.name);

    if def.values.is_empty() {
        return Err(SchemaError::located(
            ErrorKind::NoValues,
            format!("enum '{}' must have at least one value", def.name),
            location,
        ));
    }
    if def.values.len() > MAX_ENUM_VALUES {
        return Err(SchemaError::located(
            ErrorKind::TooManyValues,
            format!(
                "enum '{}' has too many values ({}, max {})",
                def.name,
                def.values.len(),
                MAX_ENUM_VALUES
            ),
            location,
        ));
    }

    let mut seen = HashSet::new();
    for (idx, value) in def.values.iter().enumerate() {
        validate_enum_value(&value.name, &def.name)?;

        if !seen.insert(value.name.to_lowercase()) {
            return Err(SchemaError::located(
                ErrorKind::DuplicateValue,
                format!("duplicate enum value '{}'", value.name),
                location,
            ));
        }
        if value.ordinal != idx + 1 {
            return Err(SchemaError::located(
                ErrorKind::InvalidSyntax,
                format!("enum value '{}' has ordinal {} out of sequence", value.name, value.ordinal),
                location,
            ));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_basic_enum() {
        let def = parse_enum("enum Role { USER ADMIN }", 0).unwrap();
        assert_eq!(def.name, "Role");
        assert_eq!(def.values.len(), 2);
        assert_eq!(def.values[0].name, "USER");
        assert_eq!(def.values[0].ordinal, 1);
        assert_eq!(def.values[1].name, "ADMIN");
        assert_eq!(def.values[1].ordinal, 2);
    }

    #[test]
    fn test_parse_multiline_enum() {
        let def = parse_enum("enum Status {\nActive\nInactive\nARCHIVED_OLD\n}", 3).unwrap();
        assert_eq!(def.position, 3);
        assert_eq!(
            def.value_names().collect::<Vec<_>>(),
            vec!["Active", "Inactive", "ARCHIVED_OLD"]
        );
    }

    #[test]
    fn test_reject_reserved_name() {
        let err = parse_enum("enum Null { A }", 0).unwrap_err();
        assert_eq!(err.kind, ErrorKind::ReservedKeyword);
    }

    #[test]
    fn test_reject_scalar_conflict() {
        let err = parse_enum("enum Timestamp { A }", 0).unwrap_err();
        assert_eq!(err.kind, ErrorKind::ScalarConflict);
    }

    #[test]
    fn test_reject_empty_enum() {
        let err = parse_enum("enum Role { }", 0).unwrap_err();
        assert_eq!(err.kind, ErrorKind::NoValues);
    }

    #[test]
    fn test_reject_case_insensitive_duplicates() {
        let err = parse_enum("enum Role { Admin ADMIN }", 0).unwrap_err();
        assert_eq!(err.kind, ErrorKind::DuplicateValue);
    }

    #[test]
    fn test_reject_lowercase_value() {
        let err = parse_enum("enum Role { admin }", 0).unwrap_err();
        assert_eq!(err.kind, ErrorKind::NamingStyle);
    }

    #[test]
    fn test_reject_too_many_values() {
        let values: Vec<String> = (0..256).map(|i| format!("V{}", i)).collect();
        let block = format!("enum Big {{ {} }}", values.join(" "));
        let err = parse_enum(&block, 0).unwrap_err();
        assert_eq!(err.kind, ErrorKind::TooManyValues);
    }

    #[test]
    fn test_accept_255_values() {
        let values: Vec<String> = (0..255).map(|i| format!("V{}", i)).collect();
        let block = format!("enum Big {{ {} }}", values.join(" "));
        let def = parse_enum(&block, 0).unwrap();
        assert_eq!(def.values.len(), 255);
        assert_eq!(def.values[254].ordinal, 255);
    }

    #[test]
    fn test_display_roundtrip_shape() {
        let def = parse_enum("enum Role { USER ADMIN }", 0).unwrap();
        assert_eq!(def.to_string(), "enum Role {\n  USER\n  ADMIN\n}");
    }
}
