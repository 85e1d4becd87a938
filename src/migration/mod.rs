//! Forward migration engine: diffs two schema models into priority-ordered
//! PostgreSQL DDL.
//!
//! Every statement carries a priority; the final script is the stable
//! priority sort of all statements, `;`-terminated and separated by blank
//! lines. Given identical inputs the output is byte-identical.

mod constraints;
mod enums;
mod indexes;
mod tables;

use serde::Serialize;

use crate::ast::defaults::{DefaultValue, LiteralValue};
use crate::ast::{ClassDef, Field, FieldKind, SchemaAst};
use crate::constants::DefaultCallback;
use crate::error::SchemaError;

pub const PRIORITY_EXTENSION: u8 = 1;
pub const PRIORITY_ENUM_DROP: u8 = 2;
pub const PRIORITY_ENUM_CREATE: u8 = 3;
pub const PRIORITY_ENUM_ALTER: u8 = 4;
pub const PRIORITY_TABLE_DROP: u8 = 5;
pub const PRIORITY_TABLE_CREATE: u8 = 6;
pub const PRIORITY_COLUMN_ADD: u8 = 7;
pub const PRIORITY_COLUMN_DROP: u8 = 8;
pub const PRIORITY_COLUMN_TYPE: u8 = 9;
pub const PRIORITY_COLUMN_NULL: u8 = 10;
pub const PRIORITY_COLUMN_DEFAULT: u8 = 11;
pub const PRIORITY_INDEX_DROP: u8 = 12;
pub const PRIORITY_INDEX_CREATE: u8 = 13;
pub const PRIORITY_CONSTRAINT: u8 = 14;

/// What a statement does; used for ordering diagnostics and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StatementKind {
    Extension,
    EnumDrop,
    EnumCreate,
    EnumAlter,
    TableDrop,
    TableCreate,
    ColumnAdd,
    ColumnDrop,
    ColumnType,
    ColumnNull,
    ColumnDefault,
    IndexDrop,
    IndexCreate,
    ConstraintAdd,
    FkIndexCreate,
}

/// One emitted DDL statement with its ordering priority.
#[derive(Debug, Clone, Serialize)]
pub struct Statement {
    pub sql: String,
    pub kind: StatementKind,
    pub priority: u8,
}

impl Statement {
    fn new(sql: String, kind: StatementKind, priority: u8) -> Self {
        Statement { sql, kind, priority }
    }
}

/// Diffs an old model against a new one.
pub struct MigrationEngine<'a> {
    from: &'a SchemaAst,
    to: &'a SchemaAst,
}

impl<'a> MigrationEngine<'a> {
    pub fn new(from: &'a SchemaAst, to: &'a SchemaAst) -> Self {
        MigrationEngine { from, to }
    }

    /// All statements in stable priority order.
    pub fn statements(&self) -> Result<Vec<Statement>, SchemaError> {
        let mut statements = Vec::new();

        statements.extend(self.extension_statements());
        statements.extend(self.enum_statements());
        statements.extend(self.table_statements()?);
        statements.extend(self.index_statements());
        statements.extend(self.constraint_statements());

        statements.sort_by_key(|s| s.priority);
        Ok(statements)
    }

    /// The migration script: one statement per line, `;`-terminated,
    /// blank lines between statements. Empty when the models are equal.
    pub fn generate(&self) -> Result<String, SchemaError> {
        let statements = self.statements()?;
        if statements.is_empty() {
            return Ok(String::new());
        }
        let sql: Vec<&str> = statements.iter().map(|s| s.sql.as_str()).collect();
        Ok(format!("{};", sql.join(";\n\n")))
    }

    fn extension_statements(&self) -> Vec<Statement> {
        let mut statements = Vec::new();

        if self.to.classes.iter().any(|c| c.has_text_index()) {
            statements.push(Statement::new(
                "CREATE EXTENSION IF NOT EXISTS pg_trgm".to_string(),
                StatementKind::Extension,
                PRIORITY_EXTENSION,
            ));
        }

        let needs_pgcrypto = self.to.classes.iter().any(|c| {
            c.fields.iter().any(|f| {
                f.default.as_ref().and_then(|d| d.as_callback()) == Some(DefaultCallback::Uuid)
            })
        });
        if needs_pgcrypto {
            statements.push(Statement::new(
                "CREATE EXTENSION IF NOT EXISTS pgcrypto".to_string(),
                StatementKind::Extension,
                PRIORITY_EXTENSION,
            ));
        }

        statements
    }
}

/// Diff two models into a migration script.
pub fn diff(from: &SchemaAst, to: &SchemaAst) -> Result<String, SchemaError> {
    MigrationEngine::new(from, to).generate()
}

/// Double-quote an identifier to preserve case.
pub(crate) fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name)
}

pub(crate) fn quote_idents(names: &[String]) -> String {
    names
        .iter()
        .map(|n| quote_ident(n))
        .collect::<Vec<_>>()
        .join(", ")
}

/// The SQL type of a column field (enum types are quoted identifiers).
pub(crate) fn column_type_sql(field: &Field) -> String {
    let base = match field.kind {
        FieldKind::Enum => quote_ident(&field.data_type),
        _ => match field.scalar_type() {
            Some(scalar) => scalar.ddl_type().to_string(),
            None => quote_ident(&field.data_type),
        },
    };
    if field.is_array {
        format!("{}[]", base)
    } else {
        base
    }
}

/// Render a default as a SQL expression for DEFAULT clauses.
///
/// Returns None for `autoincrement()`, which is expressed as an identity
/// column instead of a DEFAULT.
pub(crate) fn default_sql(default: &DefaultValue) -> Option<String> {
    match default {
        DefaultValue::Callback(DefaultCallback::Now) => Some("CURRENT_TIMESTAMP".to_string()),
        DefaultValue::Callback(DefaultCallback::Uuid) => Some("gen_random_uuid()".to_string()),
        DefaultValue::Callback(DefaultCallback::Autoincrement) => None,
        DefaultValue::Literal(literal) => Some(literal_sql(literal)),
        DefaultValue::Array(items) => {
            if items.is_empty() {
                return Some("'{}'".to_string());
            }
            let elements: Vec<String> = items.iter().map(array_element_sql).collect();
            Some(format!("'{{{}}}'", elements.join(",")))
        }
    }
}

fn literal_sql(literal: &LiteralValue) -> String {
    match literal {
        LiteralValue::Int(v) => v.to_string(),
        LiteralValue::Float(v) => v.to_string(),
        LiteralValue::Bool(v) => v.to_string(),
        LiteralValue::Text(v) => quote_literal(v),
        LiteralValue::Char(v) => quote_literal(&v.to_string()),
        LiteralValue::Date(v) | LiteralValue::Timestamp(v) => quote_literal(v),
        LiteralValue::Json(v) => quote_literal(v),
        LiteralValue::Bytes(v) => format!("'{}'", v),
        LiteralValue::EnumMember(v) => quote_literal(v),
    }
}

/// Element rendering inside a PostgreSQL array literal `'{...}'`.
fn array_element_sql(literal: &LiteralValue) -> String {
    let body = match literal {
        LiteralValue::Int(v) => return v.to_string(),
        LiteralValue::Float(v) => return v.to_string(),
        LiteralValue::Bool(v) => return v.to_string(),
        LiteralValue::Text(v) => v.clone(),
        LiteralValue::Char(v) => v.to_string(),
        LiteralValue::Date(v) | LiteralValue::Timestamp(v) => v.clone(),
        LiteralValue::Json(v) => v.clone(),
        LiteralValue::Bytes(v) => v.clone(),
        LiteralValue::EnumMember(v) => v.clone(),
    };
    format!("\"{}\"", body.replace('\\', "\\\\").replace('"', "\\\""))
}

fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// A complete column definition for CREATE TABLE / ADD COLUMN.
///
/// Object-kind fields are not columns and yield None.
pub(crate) fn column_definition(field: &Field) -> Option<String> {
    if !field.is_column() {
        return None;
    }

    let mut parts = vec![quote_ident(&field.name), column_type_sql(field)];

    if !field.is_optional {
        parts.push("NOT NULL".to_string());
    }

    match &field.default {
        Some(DefaultValue::Callback(DefaultCallback::Autoincrement)) => {
            parts.push("GENERATED BY DEFAULT AS IDENTITY".to_string());
        }
        Some(default) => {
            if let Some(sql) = default_sql(default) {
                parts.push(format!("DEFAULT {}", sql));
            }
        }
        None => {}
    }

    Some(parts.join(" "))
}

/// `idx_<class>_<fields>_index` / `idx_<class>_<fields>_text_index`,
/// lowercased, built from unquoted field names.
pub(crate) fn index_sql_name(class_name: &str, fields: &[String], text_index: bool) -> String {
    let suffix = if text_index { "text_index" } else { "index" };
    format!(
        "idx_{}_{}_{}",
        class_name.to_lowercase(),
        fields.join("_").to_lowercase(),
        suffix
    )
}

/// Column lists are compared as sets when deciding whether an index or
/// constraint already covers a foreign key.
pub(crate) fn same_field_set(a: &[String], b: &[String]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().all(|field| b.contains(field))
}

pub(crate) fn class_has_index_on(class: &ClassDef, fields: &[String], text_index: bool) -> bool {
    use crate::ast::ClassDirective;
    class.directives.iter().any(|d| match d {
        ClassDirective::Index { fields: f, .. } if !text_index => f == fields,
        ClassDirective::TextIndex { fields: f, .. } if text_index => f == fields,
        _ => false,
    })
}
