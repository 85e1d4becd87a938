//! Class block parsing: fields, `@@` class directives, and the per-class
//! invariants (field count, primary-key coherence, directive references).

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::ast::field::{parse_field, Field};
use crate::ast::EnumRegistry;
use crate::constants::{
    is_identifier, CLASS_CHECK, CLASS_INDEX, CLASS_PRIMARY_KEY, CLASS_TEXT_INDEX, CLASS_UNIQUE,
    MAX_CLASS_FIELDS,
};
use crate::error::{ErrorKind, SchemaError};

static CLASS_DEF_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)^class\s+([A-Z][A-Za-z0-9_]{0,63})\s*\{(.*)\}$").unwrap()
});

/// A class-level directive.
///
/// Index and text-index directives carry a pseudo-name assigned by the
/// schema validator after parsing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ClassDirective {
    PrimaryKey(Vec<String>),
    Unique(Vec<String>),
    Index {
        fields: Vec<String>,
        pseudo_name: Option<String>,
    },
    TextIndex {
        fields: Vec<String>,
        pseudo_name: Option<String>,
    },
    Check(String),
}

impl ClassDirective {
    /// Dedup key: directive kind plus its value, ignoring assigned names.
    fn dedup_key(&self) -> (u8, String) {
        match self {
            ClassDirective::PrimaryKey(fields) => (0, fields.join(",")),
            ClassDirective::Unique(fields) => (1, fields.join(",")),
            ClassDirective::Index { fields, .. } => (2, fields.join(",")),
            ClassDirective::TextIndex { fields, .. } => (3, fields.join(",")),
            ClassDirective::Check(expr) => (4, expr.clone()),
        }
    }

    pub fn fields(&self) -> Option<&[String]> {
        match self {
            ClassDirective::PrimaryKey(fields)
            | ClassDirective::Unique(fields)
            | ClassDirective::Index { fields, .. }
            | ClassDirective::TextIndex { fields, .. } => Some(fields),
            ClassDirective::Check(_) => None,
        }
    }
}

impl fmt::Display for ClassDirective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClassDirective::PrimaryKey(fields) => {
                write!(f, "@@{}([{}])", CLASS_PRIMARY_KEY, fields.join(", "))
            }
            ClassDirective::Unique(fields) => {
                write!(f, "@@{}([{}])", CLASS_UNIQUE, fields.join(", "))
            }
            ClassDirective::Index { fields, .. } => {
                write!(f, "@@{}([{}])", CLASS_INDEX, fields.join(", "))
            }
            ClassDirective::TextIndex { fields, .. } => {
                write!(f, "@@{}([{}])", CLASS_TEXT_INDEX, fields.join(", "))
            }
            ClassDirective::Check(expr) => write!(f, "@@{}(\"{}\")", CLASS_CHECK, expr),
        }
    }
}

/// A parsed class with its fields and directives.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassDef {
    pub name: String,
    pub fields: Vec<Field>,
    pub directives: Vec<ClassDirective>,
    /// Insertion order within the schema source.
    pub position: usize,
}

impl ClassDef {
    pub fn find_field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.find_field(name).is_some()
    }

    /// The class-level `@@primaryKey` field list, if present.
    pub fn class_primary_key(&self) -> Option<&[String]> {
        self.directives.iter().find_map(|d| match d {
            ClassDirective::PrimaryKey(fields) => Some(fields.as_slice()),
            _ => None,
        })
    }

    /// The effective primary-key column set: the class directive if
    /// present, otherwise the field-level `@primaryKey` field.
    pub fn primary_key_fields(&self) -> Vec<String> {
        if let Some(fields) = self.class_primary_key() {
            return fields.to_vec();
        }
        self.fields
            .iter()
            .filter(|f| f.is_primary_key)
            .map(|f| f.name.clone())
            .collect()
    }

    pub fn unique_sets(&self) -> impl Iterator<Item = &[String]> {
        self.directives.iter().filter_map(|d| match d {
            ClassDirective::Unique(fields) => Some(fields.as_slice()),
            _ => None,
        })
    }

    pub fn check_expressions(&self) -> impl Iterator<Item = &str> {
        self.directives.iter().filter_map(|d| match d {
            ClassDirective::Check(expr) => Some(expr.as_str()),
            _ => None,
        })
    }

    pub fn has_text_index(&self) -> bool {
        self.directives
            .iter()
            .any(|d| matches!(d, ClassDirective::TextIndex { .. }))
    }

    /// Fields that become table columns (scalar and enum kinds).
    pub fn column_fields(&self) -> impl Iterator<Item = &Field> {
        self.fields.iter().filter(|f| f.is_column())
    }

    /// Fields that carry a relation attribute.
    pub fn relation_fields(&self) -> impl Iterator<Item = &Field> {
        self.fields.iter().filter(|f| f.relation.is_some())
    }
}

impl fmt::Display for ClassDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "class {} {{", self.name)?;
        for field in &self.fields {
            writeln!(f, "  {}", field)?;
        }
        for directive in &self.directives {
            writeln!(f, "  {}", directive)?;
        }
        write!(f, "}}")
    }
}

/// Parse one class block into a validated [`ClassDef`].
pub fn parse_class(
    definition: &str,
    position: usize,
    enums: &EnumRegistry,
) -> Result<ClassDef, SchemaError> {
    let definition = definition.trim();

    let captures = CLASS_DEF_REGEX.captures(definition).ok_or_else(|| {
        SchemaError::new(
            ErrorKind::InvalidSyntax,
            "invalid class definition; expected 'class Name { ... }' with an uppercase name",
        )
    })?;

    let name = captures[1].to_string();
    let body = captures[2].trim();
    let location = format!("class '{}'", name);

    check_balance(body).map_err(|e| e.at(location.clone()))?;

    let mut fields = Vec::new();
    let mut directives: Vec<ClassDirective> = Vec::new();

    for line in body.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(directive_text) = line.strip_prefix("@@") {
            let directive = parse_class_directive(directive_text).map_err(|e| e.at(location.clone()))?;
            let key = directive.dedup_key();
            if !directives.iter().any(|d| d.dedup_key() == key) {
                directives.push(directive);
            }
        } else {
            fields.push(parse_field(line, &name, fields.len(), enums)?);
        }
    }

    let class = ClassDef {
        name,
        fields,
        directives,
        position,
    };
    validate_class(&class)?;
    Ok(class)
}

/// Fast pre-check that braces and parentheses balance within a class body.
fn check_balance(body: &str) -> Result<(), SchemaError> {
    let mut braces = 0i32;
    let mut parens = 0i32;
    for c in body.chars() {
        match c {
            '{' => braces += 1,
            '}' => braces -= 1,
            '(' => parens += 1,
            ')' => parens -= 1,
            _ => {}
        }
        if braces < 0 {
            return Err(SchemaError::new(ErrorKind::UnbalancedBraces, "unmatched closing brace"));
        }
        if parens < 0 {
            return Err(SchemaError::new(ErrorKind::UnbalancedParens, "unmatched closing parenthesis"));
        }
    }
    if braces != 0 {
        return Err(SchemaError::new(ErrorKind::UnbalancedBraces, "unmatched opening brace"));
    }
    if parens != 0 {
        return Err(SchemaError::new(ErrorKind::UnbalancedParens, "unmatched opening parenthesis"));
    }
    Ok(())
}

fn parse_class_directive(text: &str) -> Result<ClassDirective, SchemaError> {
    let text = text.trim();

    let (name, params) = match text.find('(') {
        Some(paren_idx) => {
            if !text.ends_with(')') {
                return Err(SchemaError::new(
                    ErrorKind::UnbalancedParens,
                    "class directive parameters must be enclosed in parentheses",
                ));
            }
            (
                text[..paren_idx].trim(),
                text[paren_idx + 1..text.len() - 1].trim(),
            )
        }
        None => (text, ""),
    };

    match name {
        CLASS_PRIMARY_KEY => Ok(ClassDirective::PrimaryKey(parse_field_array(params, name)?)),
        CLASS_UNIQUE => Ok(ClassDirective::Unique(parse_field_array(params, name)?)),
        CLASS_INDEX => Ok(ClassDirective::Index {
            fields: parse_field_array(params, name)?,
            pseudo_name: None,
        }),
        CLASS_TEXT_INDEX => Ok(ClassDirective::TextIndex {
            fields: parse_field_array(params, name)?,
            pseudo_name: None,
        }),
        CLASS_CHECK => {
            let expr = params.trim().trim_matches(|c| c == '"' || c == '\'').trim();
            if expr.is_empty() {
                return Err(SchemaError::new(
                    ErrorKind::InvalidSyntax,
                    "@@check requires a non-empty constraint expression",
                ));
            }
            Ok(ClassDirective::Check(expr.to_string()))
        }
        other => Err(SchemaError::new(
            ErrorKind::UnknownDirective,
            format!("unknown class directive '@@{}'", other),
        )),
    }
}

/// Parse `[a, b]` (brackets optional) into at least one identifier.
fn parse_field_array(params: &str, directive: &str) -> Result<Vec<String>, SchemaError> {
    let mut params = params.trim();
    if params.starts_with('[') && params.ends_with(']') {
        params = params[1..params.len() - 1].trim();
    }
    if params.is_empty() {
        return Err(SchemaError::new(
            ErrorKind::InvalidSyntax,
            format!("@@{} requires at least one field", directive),
        ));
    }

    let mut fields = Vec::new();
    for part in params.split(',') {
        let field = part.trim();
        if field.is_empty() {
            continue;
        }
        if !is_identifier(field) {
            return Err(SchemaError::new(
                ErrorKind::InvalidIdentifier,
                format!("invalid field name '{}' in @@{}", field, directive),
            ));
        }
        fields.push(field.to_string());
    }

    if fields.is_empty() {
        return Err(SchemaError::new(
            ErrorKind::InvalidSyntax,
            format!("@@{} requires at least one field", directive),
        ));
    }
    Ok(fields)
}

fn validate_class(class: &ClassDef) -> Result<(), SchemaError> {
    let location = format!("class '{}'", class.name);

    if class.fields.is_empty() {
        return Err(SchemaError::located(
            ErrorKind::InvalidSyntax,
            format!("class '{}' must have at least one field", class.name),
            location,
        ));
    }
    if class.fields.len() > MAX_CLASS_FIELDS {
        return Err(SchemaError::located(
            ErrorKind::TooLong,
            format!(
                "class '{}' has too many fields ({}, max {})",
                class.name,
                class.fields.len(),
                MAX_CLASS_FIELDS
            ),
            location,
        ));
    }

    let field_pk_count = class.fields.iter().filter(|f| f.is_primary_key).count();
    let class_pk_count = class
        .directives
        .iter()
        .filter(|d| matches!(d, ClassDirective::PrimaryKey(_)))
        .count();

    if field_pk_count > 1 {
        return Err(SchemaError::located(
            ErrorKind::MultipleFieldPk,
            format!("class '{}' has multiple field-level primary keys", class.name),
            location,
        ));
    }
    if class_pk_count > 1 {
        return Err(SchemaError::located(
            ErrorKind::ConflictingPk,
            format!("class '{}' has multiple @@primaryKey directives", class.name),
            location,
        ));
    }
    if field_pk_count > 0 && class_pk_count > 0 {
        return Err(SchemaError::located(
            ErrorKind::ConflictingPk,
            format!(
                "class '{}' has both field-level and class-level primary keys",
                class.name
            ),
            location,
        ));
    }
    if field_pk_count == 0 && class_pk_count == 0 {
        return Err(SchemaError::located(
            ErrorKind::MissingPk,
            format!("class '{}' must have a primary key", class.name),
            location,
        ));
    }

    if let Some(pk_fields) = class.class_primary_key() {
        for field_name in pk_fields {
            match class.find_field(field_name) {
                None => {
                    return Err(SchemaError::located(
                        ErrorKind::InvalidPkField,
                        format!("@@primaryKey references non-existent field '{}'", field_name),
                        location,
                    ));
                }
                Some(field) if field.is_optional => {
                    return Err(SchemaError::located(
                        ErrorKind::OptionalPkField,
                        format!("primary key field '{}' cannot be optional", field_name),
                        location,
                    ));
                }
                Some(field) if field.is_array => {
                    return Err(SchemaError::located(
                        ErrorKind::ArrayPkField,
                        format!("primary key field '{}' cannot be an array", field_name),
                        location,
                    ));
                }
                Some(_) => {}
            }
        }
    }

    for directive in &class.directives {
        if matches!(directive, ClassDirective::PrimaryKey(_)) {
            continue;
        }
        if let Some(fields) = directive.fields() {
            for field_name in fields {
                if !class.has_field(field_name) {
                    return Err(SchemaError::located(
                        ErrorKind::TypeUnknown,
                        format!("{} references non-existent field '{}'", directive, field_name),
                        location,
                    ));
                }
            }
        }
    }

    Ok(())
}
