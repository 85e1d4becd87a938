//! Field line parsing: name, type spec, directives, and attributes.
//!
//! A field line is `name Type[][?] @directive @attribute(args) ...`.
//! The `[]` array marker precedes the `?` optional marker. Attribute
//! arguments are captured verbatim across a balanced parenthesis run and
//! handed to the default/relation sub-parsers.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::ast::defaults::{validate_default, DefaultValue};
use crate::ast::relation::{parse_relation, Relation};
use crate::ast::EnumRegistry;
use crate::constants::{
    is_identifier, ScalarType, ATTR_DEFAULT, ATTR_RELATION, DIRECTIVE_PRIMARY_KEY,
    DIRECTIVE_UNIQUE, DIRECTIVE_UPDATED_AT,
};
use crate::error::{ErrorKind, SchemaError};

/// Splits a field line into its name and the remaining definition.
static FIELD_LINE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([A-Za-z_]\w*)\s+(.+)$").unwrap());

/// Splits the definition into the type spec and the attribute text.
static TYPE_SPEC_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([A-Za-z_]\w*)(\[\])?(\?)?\s*(.*)$").unwrap());

/// How a field's base type resolves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FieldKind {
    Scalar,
    Enum,
    Object,
}

/// A parsed and locally-validated field.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Field {
    pub name: String,
    /// Base type name with array/optional markers stripped.
    pub data_type: String,
    pub kind: FieldKind,
    pub is_optional: bool,
    pub is_array: bool,
    pub is_primary_key: bool,
    pub is_unique: bool,
    /// System-managed timestamp flag; carries no nullability meaning.
    pub is_updated_at: bool,
    pub default: Option<DefaultValue>,
    pub relation: Option<Relation>,
    /// Insertion order within the class.
    pub position: usize,
}

impl Field {
    pub fn scalar_type(&self) -> Option<ScalarType> {
        ScalarType::parse(&self.data_type)
    }

    /// Object-kind field that carries the foreign key.
    pub fn is_foreign_key(&self) -> bool {
        self.kind == FieldKind::Object && self.relation.is_some()
    }

    /// Object-kind field without a relation; the key lives on the target.
    pub fn is_back_reference(&self) -> bool {
        self.kind == FieldKind::Object && self.relation.is_none()
    }

    /// Object fields are not columns; only scalar/enum fields are.
    pub fn is_column(&self) -> bool {
        self.kind != FieldKind::Object
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.name, self.data_type)?;
        if self.is_array {
            write!(f, "[]")?;
        }
        if self.is_optional {
            write!(f, "?")?;
        }
        if self.is_primary_key {
            write!(f, " @{}", DIRECTIVE_PRIMARY_KEY)?;
        }
        if self.is_unique {
            write!(f, " @{}", DIRECTIVE_UNIQUE)?;
        }
        if self.is_updated_at {
            write!(f, " @{}", DIRECTIVE_UPDATED_AT)?;
        }
        if let Some(default) = &self.default {
            write!(f, " @{}({})", ATTR_DEFAULT, default)?;
        }
        if let Some(relation) = &self.relation {
            write!(f, " @{}({})", ATTR_RELATION, relation)?;
        }
        Ok(())
    }
}

/// One scanned `@` annotation: a bare directive or an attribute with its
/// verbatim argument string.
#[derive(Debug)]
struct ScannedAttribute {
    name: String,
    args: Option<String>,
}

/// Parse one field line within `class_name`.
pub fn parse_field(
    line: &str,
    class_name: &str,
    position: usize,
    enums: &EnumRegistry,
) -> Result<Field, SchemaError> {
    let line = line.trim();
    let captures = FIELD_LINE_REGEX.captures(line).ok_or_else(|| {
        SchemaError::located(
            ErrorKind::InvalidSyntax,
            format!("invalid field syntax: '{}'", line),
            format!("class '{}'", class_name),
        )
    })?;

    let name = captures[1].to_string();
    let rest = captures[2].trim();
    let location = format!("class '{}', field '{}'", class_name, name);

    if !is_identifier(&name) {
        return Err(SchemaError::located(
            ErrorKind::InvalidIdentifier,
            format!("invalid field name '{}'", name),
            location,
        ));
    }

    let type_captures = TYPE_SPEC_REGEX.captures(rest).ok_or_else(|| {
        SchemaError::located(
            ErrorKind::InvalidSyntax,
            format!("invalid type specification: '{}'", rest),
            location.clone(),
        )
    })?;

    let data_type = type_captures[1].to_string();
    let is_array = type_captures.get(2).is_some();
    let is_optional = type_captures.get(3).is_some();
    let attribute_text = type_captures.get(4).map(|m| m.as_str()).unwrap_or("").trim();

    let kind = if ScalarType::parse(&data_type).is_some() {
        FieldKind::Scalar
    } else if enums.contains_key(&data_type) {
        FieldKind::Enum
    } else {
        FieldKind::Object
    };

    let mut field = Field {
        name,
        data_type,
        kind,
        is_optional,
        is_array,
        is_primary_key: false,
        is_unique: false,
        is_updated_at: false,
        default: None,
        relation: None,
        position,
    };

    let mut default_args: Option<String> = None;
    let mut relation_args: Option<String> = None;

    for scanned in scan_attributes(attribute_text).map_err(|e| e.at(location.clone()))? {
        apply_attribute(&mut field, scanned, &mut default_args, &mut relation_args)
            .map_err(|e| e.at(location.clone()))?;
    }

    validate_directives(&field).map_err(|e| e.at(location.clone()))?;

    if default_args.is_some() && relation_args.is_some() {
        return Err(SchemaError::located(
            ErrorKind::ConflictingDirectives,
            "@default cannot be combined with @relation; a relation field is not a column",
            location,
        ));
    }

    if let Some(args) = default_args {
        field.default = Some(
            validate_default(&args, &field.data_type, field.is_array, enums)
                .map_err(|e| e.at(location.clone()))?,
        );
    }

    if let Some(args) = relation_args {
        if field.kind != FieldKind::Object {
            return Err(SchemaError::located(
                ErrorKind::InvalidType,
                format!(
                    "@relation requires a class-typed field, but '{}' is {}",
                    field.name,
                    if field.kind == FieldKind::Enum { "an enum" } else { "a scalar" }
                ),
                location,
            ));
        }
        let relation = parse_relation(&args).map_err(|e| e.at(location.clone()))?;
        if relation.requires_optional_source() && !field.is_optional {
            return Err(SchemaError::located(
                ErrorKind::RequiresOptional,
                "onDelete/onUpdate SetNull requires the source field to be optional",
                location,
            ));
        }
        field.relation = Some(relation);
    }

    Ok(field)
}

/// Greedily scan `@name` / `@name(args)` tokens; args span a balanced
/// parenthesis run and are captured verbatim.
fn scan_attributes(text: &str) -> Result<Vec<ScannedAttribute>, SchemaError> {
    let bytes = text.as_bytes();
    let mut scanned = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'@' => {
                i += 1;
                let name_start = i;
                while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_') {
                    i += 1;
                }
                let name = &text[name_start..i];
                if name.is_empty() {
                    return Err(SchemaError::new(
                        ErrorKind::InvalidSyntax,
                        "'@' must be followed by an attribute name",
                    ));
                }

                let mut args = None;
                if i < bytes.len() && bytes[i] == b'(' {
                    i += 1;
                    let args_start = i;
                    let mut depth = 1;
                    while i < bytes.len() && depth > 0 {
                        match bytes[i] {
                            b'(' => depth += 1,
                            b')' => depth -= 1,
                            _ => {}
                        }
                        i += 1;
                    }
                    if depth != 0 {
                        return Err(SchemaError::new(
                            ErrorKind::UnbalancedParens,
                            format!("unbalanced parentheses in '@{}' arguments", name),
                        ));
                    }
                    args = Some(text[args_start..i - 1].trim().to_string());
                }

                scanned.push(ScannedAttribute {
                    name: name.to_string(),
                    args,
                });
            }
            b' ' | b'\t' => i += 1,
            _ => {
                return Err(SchemaError::new(
                    ErrorKind::InvalidSyntax,
                    format!("unexpected token in field definition: '{}'", &text[i..]),
                ));
            }
        }
    }

    Ok(scanned)
}

fn apply_attribute(
    field: &mut Field,
    scanned: ScannedAttribute,
    default_args: &mut Option<String>,
    relation_args: &mut Option<String>,
) -> Result<(), SchemaError> {
    let duplicate = |name: &str| {
        SchemaError::new(
            ErrorKind::DuplicateAttribute,
            format!("duplicate attribute '@{}'", name),
        )
    };
    let no_params = |name: &str| {
        SchemaError::new(
            ErrorKind::InvalidSyntax,
            format!("'@{}' does not accept parameters", name),
        )
    };
    let needs_params = |name: &str| {
        SchemaError::new(
            ErrorKind::InvalidSyntax,
            format!("'@{}' requires parameters", name),
        )
    };

    match scanned.name.as_str() {
        DIRECTIVE_PRIMARY_KEY => {
            if scanned.args.is_some() {
                return Err(no_params(DIRECTIVE_PRIMARY_KEY));
            }
            if field.is_primary_key {
                return Err(duplicate(DIRECTIVE_PRIMARY_KEY));
            }
            field.is_primary_key = true;
        }
        DIRECTIVE_UNIQUE => {
            if scanned.args.is_some() {
                return Err(no_params(DIRECTIVE_UNIQUE));
            }
            if field.is_unique {
                return Err(duplicate(DIRECTIVE_UNIQUE));
            }
            field.is_unique = true;
        }
        DIRECTIVE_UPDATED_AT => {
            if scanned.args.is_some() {
                return Err(no_params(DIRECTIVE_UPDATED_AT));
            }
            if field.is_updated_at {
                return Err(duplicate(DIRECTIVE_UPDATED_AT));
            }
            field.is_updated_at = true;
        }
        ATTR_DEFAULT => {
            let args = scanned.args.ok_or_else(|| needs_params(ATTR_DEFAULT))?;
            if args.is_empty() {
                return Err(needs_params(ATTR_DEFAULT));
            }
            if default_args.is_some() {
                return Err(duplicate(ATTR_DEFAULT));
            }
            *default_args = Some(args);
        }
        ATTR_RELATION => {
            let args = scanned.args.ok_or_else(|| needs_params(ATTR_RELATION))?;
            if args.is_empty() {
                return Err(needs_params(ATTR_RELATION));
            }
            if relation_args.is_some() {
                return Err(duplicate(ATTR_RELATION));
            }
            *relation_args = Some(args);
        }
        other => {
            return Err(SchemaError::new(
                ErrorKind::UnknownAttribute,
                format!("unknown field attribute '@{}'", other),
            ));
        }
    }

    Ok(())
}

fn validate_directives(field: &Field) -> Result<(), SchemaError> {
    if field.is_primary_key {
        if field.is_optional {
            return Err(SchemaError::new(
                ErrorKind::OptionalPkField,
                "@primaryKey field cannot be optional",
            ));
        }
        if field.is_array {
            return Err(SchemaError::new(
                ErrorKind::ArrayPkField,
                "@primaryKey field cannot be an array",
            ));
        }
        if field.is_unique {
            return Err(SchemaError::new(
                ErrorKind::ConflictingDirectives,
                "@primaryKey and @unique cannot be combined; a primary key is already unique",
            ));
        }
    }

    if field.is_unique && field.is_array {
        return Err(SchemaError::new(
            ErrorKind::InvalidType,
            "@unique cannot be applied to array fields",
        ));
    }

    if field.is_updated_at {
        let compatible = matches!(
            field.scalar_type(),
            Some(ScalarType::Timestamp) | Some(ScalarType::Date)
        );
        if !compatible {
            return Err(SchemaError::new(
                ErrorKind::InvalidType,
                format!("@updatedAt requires a Timestamp or Date field, got '{}'", field.data_type),
            ));
        }
        if field.is_array {
            return Err(SchemaError::new(
                ErrorKind::InvalidType,
                "@updatedAt cannot be applied to array fields",
            ));
        }
    }

    Ok(())
}
