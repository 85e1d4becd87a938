//! `@relation(...)` argument parsing and validation.
//!
//! Syntax: `[fromField, ...], [Target.field, ...]` followed by optional
//! `onDelete:`, `onUpdate:`, and `name:` options. Every target field must
//! carry the same class prefix, which becomes the relation's target class.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::constants::{is_identifier, ReferentialAction};
use crate::error::{ErrorKind, SchemaError};

/// Captures the two bracketed field lists and the trailing option text.
static RELATION_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*\[([^\]]*)\]\s*,\s*\[([^\]]*)\]\s*(?:,\s*(.*))?$").unwrap()
});

/// Captures one `key: value` option; values may be quoted.
static OPTION_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(\w+)\s*:\s*([A-Za-z_]\w*|"[^"]*")"#).unwrap()
});

/// A foreign-key edge from the owning class to `to_class`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Relation {
    /// Source field names in the owning class.
    pub from: Vec<String>,
    /// Target field names in `to_class`, prefix already stripped.
    pub to: Vec<String>,
    pub to_class: String,
    pub on_delete: ReferentialAction,
    pub on_update: ReferentialAction,
    /// Explicit `name:` option; generated by the validator when absent.
    pub name: Option<String>,
}

impl Relation {
    pub fn is_composite(&self) -> bool {
        self.from.len() > 1
    }

    /// SetNull on either rule demands an optional source field.
    pub fn requires_optional_source(&self) -> bool {
        self.on_delete == ReferentialAction::SetNull || self.on_update == ReferentialAction::SetNull
    }
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let targets: Vec<String> = self
            .to
            .iter()
            .map(|field| format!("{}.{}", self.to_class, field))
            .collect();
        write!(f, "[{}], [{}]", self.from.join(", "), targets.join(", "))?;
        if self.on_delete != ReferentialAction::NoAction {
            write!(f, ", onDelete: {}", self.on_delete.name())?;
        }
        if self.on_update != ReferentialAction::NoAction {
            write!(f, ", onUpdate: {}", self.on_update.name())?;
        }
        if let Some(name) = &self.name {
            write!(f, ", name: \"{}\"", name)?;
        }
        Ok(())
    }
}

/// Parse and validate a raw `@relation` argument string.
pub fn parse_relation(definition: &str) -> Result<Relation, SchemaError> {
    let definition = definition.trim();
    if definition.is_empty() {
        return Err(SchemaError::new(
            ErrorKind::BadTargetFormat,
            "relation definition cannot be empty",
        ));
    }

    let captures = RELATION_REGEX.captures(definition).ok_or_else(|| {
        SchemaError::new(
            ErrorKind::BadTargetFormat,
            "invalid relation syntax; expected '[sourceFields], [Target.field, ...]'",
        )
    })?;

    let from = split_field_list(&captures[1]);
    if from.is_empty() {
        return Err(SchemaError::new(
            ErrorKind::BadTargetFormat,
            "relation source field list cannot be empty",
        ));
    }
    for field in &from {
        if !is_identifier(field) {
            return Err(SchemaError::new(
                ErrorKind::InvalidIdentifier,
                format!("invalid relation source field '{}'", field),
            ));
        }
    }

    let raw_targets = split_field_list(&captures[2]);
    if raw_targets.is_empty() {
        return Err(SchemaError::new(
            ErrorKind::BadTargetFormat,
            "relation target field list cannot be empty",
        ));
    }
    let (to_class, to) = extract_target_class(&raw_targets)?;

    if from.len() != to.len() {
        return Err(SchemaError::new(
            ErrorKind::FromToLengthMismatch,
            format!(
                "relation has {} source fields but {} target fields",
                from.len(),
                to.len()
            ),
        ));
    }

    let mut relation = Relation {
        from,
        to,
        to_class,
        on_delete: ReferentialAction::NoAction,
        on_update: ReferentialAction::NoAction,
        name: None,
    };

    if let Some(options) = captures.get(3) {
        parse_relation_options(options.as_str(), &mut relation)?;
    }

    Ok(relation)
}

/// All target fields must share one `Class.` prefix; the prefix is stripped.
fn extract_target_class(targets: &[String]) -> Result<(String, Vec<String>), SchemaError> {
    let mut to_class: Option<String> = None;
    let mut fields = Vec::with_capacity(targets.len());

    for target in targets {
        let (class_part, field_part) = target.split_once('.').ok_or_else(|| {
            SchemaError::new(
                ErrorKind::BadTargetFormat,
                format!("relation target '{}' must be in 'Class.field' format", target),
            )
        })?;

        if field_part.contains('.') {
            return Err(SchemaError::new(
                ErrorKind::BadTargetFormat,
                format!("relation target '{}' must have exactly one dot", target),
            ));
        }
        if !is_identifier(class_part) || !is_identifier(field_part) {
            return Err(SchemaError::new(
                ErrorKind::InvalidIdentifier,
                format!("relation target '{}' has an invalid class or field name", target),
            ));
        }

        match &to_class {
            None => to_class = Some(class_part.to_string()),
            Some(existing) if existing != class_part => {
                return Err(SchemaError::new(
                    ErrorKind::MultipleTargetClasses,
                    format!(
                        "relation targets must reference one class; found '{}' and '{}'",
                        existing, class_part
                    ),
                ));
            }
            Some(_) => {}
        }

        fields.push(field_part.to_string());
    }

    // raw_targets is non-empty, so the class is always set by now
    Ok((to_class.unwrap_or_default(), fields))
}

fn parse_relation_options(options: &str, relation: &mut Relation) -> Result<(), SchemaError> {
    for captures in OPTION_REGEX.captures_iter(options) {
        let key = &captures[1];
        let value = captures[2].trim_matches('"');

        match key {
            "onDelete" => {
                relation.on_delete = ReferentialAction::parse(value).ok_or_else(|| invalid_action(key, value))?;
            }
            "onUpdate" => {
                relation.on_update = ReferentialAction::parse(value).ok_or_else(|| invalid_action(key, value))?;
            }
            "name" => {
                if !is_identifier(value) {
                    return Err(SchemaError::new(
                        ErrorKind::InvalidIdentifier,
                        format!("invalid relation name '{}'", value),
                    ));
                }
                relation.name = Some(value.to_string());
            }
            other => {
                return Err(SchemaError::new(
                    ErrorKind::BadTargetFormat,
                    format!("unknown relation option '{}'", other),
                ));
            }
        }
    }
    Ok(())
}

fn invalid_action(key: &str, value: &str) -> SchemaError {
    SchemaError::new(
        ErrorKind::InvalidAction,
        format!(
            "invalid {} action '{}'; valid actions: Cascade, Restrict, SetNull, NoAction",
            key, value
        ),
    )
}

fn split_field_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(|part| part.trim().to_string())
        .filter(|part| !part.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_basic_relation() {
        let relation = parse_relation("[userId], [User.id]").unwrap();
        assert_eq!(relation.from, vec!["userId"]);
        assert_eq!(relation.to, vec!["id"]);
        assert_eq!(relation.to_class, "User");
        assert_eq!(relation.on_delete, ReferentialAction::NoAction);
        assert_eq!(relation.on_update, ReferentialAction::NoAction);
        assert!(relation.name.is_none());
        assert!(!relation.is_composite());
    }

    #[test]
    fn test_parse_composite_relation() {
        let relation = parse_relation("[orgId, teamId], [Team.orgId, Team.id]").unwrap();
        assert_eq!(relation.from, vec!["orgId", "teamId"]);
        assert_eq!(relation.to, vec!["orgId", "id"]);
        assert_eq!(relation.to_class, "Team");
        assert!(relation.is_composite());
    }

    #[test]
    fn test_parse_actions_and_name() {
        let relation =
            parse_relation("[userId], [User.id], onDelete: Cascade, onUpdate: SetNull, name: owner")
                .unwrap();
        assert_eq!(relation.on_delete, ReferentialAction::Cascade);
        assert_eq!(relation.on_update, ReferentialAction::SetNull);
        assert_eq!(relation.name.as_deref(), Some("owner"));
        assert!(relation.requires_optional_source());
    }

    #[test]
    fn test_quoted_name_option() {
        let relation = parse_relation("[userId], [User.id], name: \"authored\"").unwrap();
        assert_eq!(relation.name.as_deref(), Some("authored"));
    }

    #[test]
    fn test_length_mismatch() {
        let err = parse_relation("[a, b], [User.id]").unwrap_err();
        assert_eq!(err.kind, ErrorKind::FromToLengthMismatch);
    }

    #[test]
    fn test_target_without_prefix() {
        let err = parse_relation("[userId], [id]").unwrap_err();
        assert_eq!(err.kind, ErrorKind::BadTargetFormat);
    }

    #[test]
    fn test_mixed_target_classes() {
        let err = parse_relation("[a, b], [User.id, Team.id]").unwrap_err();
        assert_eq!(err.kind, ErrorKind::MultipleTargetClasses);
    }

    #[test]
    fn test_invalid_action() {
        let err = parse_relation("[userId], [User.id], onDelete: Destroy").unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidAction);
    }

    #[test]
    fn test_missing_bracket_lists() {
        let err = parse_relation("userId, User.id").unwrap_err();
        assert_eq!(err.kind, ErrorKind::BadTargetFormat);
    }

    #[test]
    fn test_display_roundtrip() {
        let relation =
            parse_relation("[userId], [User.id], onDelete: SetNull").unwrap();
        assert_eq!(relation.to_string(), "[userId], [User.id], onDelete: SetNull");
    }
}
