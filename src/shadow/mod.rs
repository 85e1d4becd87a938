//! The SQL reverse parser: applies migration SQL to a schema model.
//!
//! Regex-gated recognizers classify each statement; statement splitting and
//! table bodies are scanned manually with quote and parenthesis awareness.
//! Statements no recognizer matches are silently skipped. The updated state
//! is rendered to schema source and re-parsed through the front end, so the
//! reconstructed model passes the same validation as a user-written schema.

pub mod apply;
pub mod state;

use std::sync::LazyLock;

use regex::Regex;

use crate::ast::SchemaAst;
use crate::constants::{ReferentialAction, ScalarType};
use crate::error::SchemaError;
use crate::validation;

pub use apply::{read_migration_files, replay_migrations, MigrationFile};
pub use state::{ShadowColumn, ShadowEnum, ShadowForeignKey, ShadowIndex, ShadowState, ShadowTable};

static CREATE_ENUM_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)^CREATE\s+TYPE\s+"([^"]+)"\s+AS\s+ENUM\s*\(([^)]*)\)$"#).unwrap()
});

static ALTER_ENUM_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)^ALTER\s+TYPE\s+"([^"]+)"\s+ADD\s+VALUE\s+'([^']+)'$"#).unwrap()
});

static DROP_ENUM_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)^DROP\s+TYPE\s+(?:IF\s+EXISTS\s+)?"([^"]+)"(?:\s+CASCADE)?$"#).unwrap()
});

static CREATE_TABLE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)^CREATE\s+TABLE\s+"([^"]+)"\s*\(\s*(.*?)\s*\)$"#).unwrap()
});

static DROP_TABLE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)^DROP\s+TABLE\s+(?:IF\s+EXISTS\s+)?"([^"]+)"(?:\s+CASCADE)?$"#).unwrap()
});

static ALTER_TABLE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)^ALTER\s+TABLE\s+"([^"]+)"\s+(.*)$"#).unwrap()
});

static ADD_COLUMN_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)^ADD\s+COLUMN\s+(.*)$"#).unwrap()
});

static DROP_COLUMN_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)^DROP\s+COLUMN\s+(?:IF\s+EXISTS\s+)?"([^"]+)"$"#).unwrap()
});

static ADD_CONSTRAINT_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)^ADD\s+CONSTRAINT\s+(\w+)\s+(.*)$"#).unwrap()
});

static ALTER_COLUMN_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)^ALTER\s+COLUMN\s+"([^"]+)"\s+(.*)$"#).unwrap()
});

static FOREIGN_KEY_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?is)FOREIGN\s+KEY\s*\(([^)]+)\)\s*REFERENCES\s+"([^"]+)"\s*\(([^)]+)\)(?:\s+ON\s+DELETE\s+(SET\s+NULL|CASCADE|RESTRICT|NO\s+ACTION))?(?:\s+ON\s+UPDATE\s+(SET\s+NULL|CASCADE|RESTRICT|NO\s+ACTION))?"#,
    )
    .unwrap()
});

static CREATE_INDEX_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?is)^CREATE\s+(?:UNIQUE\s+)?INDEX\s+(\w+)\s+ON\s+"([^"]+)"\s*(?:USING\s+(\w+))?\s*\((.*)\)$"#,
    )
    .unwrap()
});

static DROP_INDEX_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)^DROP\s+INDEX\s+(?:IF\s+EXISTS\s+)?(\w+)$"#).unwrap()
});

static DEFAULT_CLAUSE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)DEFAULT\s+('(?:[^']|'')*'|\S+)"#).unwrap()
});

static QUOTED_COLUMN_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""([^"]+)""#).unwrap());

static ENUM_VALUE_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"'([^']*)'").unwrap());

/// Apply one migration script to a model, producing the updated model.
pub fn apply_migration(prior: &SchemaAst, sql: &str) -> Result<SchemaAst, SchemaError> {
    let mut state = ShadowState::from_ast(prior);
    for statement in split_statements(sql) {
        apply_statement(&mut state, &statement);
    }

    let source = state.render();
    if source.trim().is_empty() {
        return Ok(SchemaAst::default());
    }
    let mut ast = SchemaAst::from_source(&source)?;
    validation::validate(&mut ast)?;
    Ok(ast)
}

/// Split a script into statements at `;`, with quote awareness.
/// `--` comment lines are dropped; remaining lines join into one stream.
pub fn split_statements(sql: &str) -> Vec<String> {
    let joined = sql
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with("--"))
        .collect::<Vec<_>>()
        .join(" ");

    let mut statements = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;

    for c in joined.chars() {
        match quote {
            Some(q) => {
                current.push(c);
                if c == q {
                    quote = None;
                }
            }
            None => match c {
                '\'' | '"' => {
                    quote = Some(c);
                    current.push(c);
                }
                ';' => {
                    let statement = current.trim().to_string();
                    if !statement.is_empty() {
                        statements.push(statement);
                    }
                    current.clear();
                }
                _ => current.push(c),
            },
        }
    }

    let statement = current.trim().to_string();
    if !statement.is_empty() {
        statements.push(statement);
    }

    statements
}

/// Apply one statement. Unrecognized statements are skipped.
fn apply_statement(state: &mut ShadowState, statement: &str) {
    if let Some(captures) = CREATE_ENUM_REGEX.captures(statement) {
        let values: Vec<String> = ENUM_VALUE_REGEX
            .captures_iter(&captures[2])
            .map(|c| c[1].to_string())
            .collect();
        state.upsert_enum(ShadowEnum {
            name: captures[1].to_string(),
            values,
        });
        return;
    }

    if let Some(captures) = ALTER_ENUM_REGEX.captures(statement) {
        if let Some(shadow_enum) = state.enum_mut(&captures[1]) {
            let value = captures[2].to_string();
            if !shadow_enum.values.contains(&value) {
                shadow_enum.values.push(value);
            }
        }
        return;
    }

    if let Some(captures) = DROP_ENUM_REGEX.captures(statement) {
        state.remove_enum(&captures[1]);
        return;
    }

    if let Some(captures) = CREATE_TABLE_REGEX.captures(statement) {
        let table = parse_create_table(&captures[1], &captures[2]);
        state.upsert_table(table);
        return;
    }

    if let Some(captures) = DROP_TABLE_REGEX.captures(statement) {
        state.remove_table(&captures[1]);
        return;
    }

    if let Some(captures) = ALTER_TABLE_REGEX.captures(statement) {
        let table_name = captures[1].to_string();
        let action = captures[2].to_string();
        apply_alter_table(state, &table_name, &action);
        return;
    }

    if let Some(captures) = CREATE_INDEX_REGEX.captures(statement) {
        let using = captures.get(3).map(|m| m.as_str().to_uppercase());
        let columns_text = &captures[4];
        let is_text = using.as_deref() == Some("GIN")
            || columns_text.to_uppercase().contains("GIN_TRGM_OPS")
            || columns_text.contains("||");

        let columns: Vec<String> = if is_text && columns_text.contains("||") {
            QUOTED_COLUMN_REGEX
                .captures_iter(columns_text)
                .map(|c| c[1].to_string())
                .collect()
        } else {
            split_column_list(columns_text)
        };

        state.upsert_index(ShadowIndex {
            name: captures[1].to_string(),
            table: captures[2].to_string(),
            columns,
            is_text,
        });
        return;
    }

    if let Some(captures) = DROP_INDEX_REGEX.captures(statement) {
        state.remove_index(&captures[1]);
    }
}

fn apply_alter_table(state: &mut ShadowState, table_name: &str, action: &str) {
    if let Some(captures) = ADD_COLUMN_REGEX.captures(action) {
        let definition = captures[1].to_string();
        if let Some(column) = parse_column_definition(&definition) {
            if let Some(table) = state.table_mut(table_name) {
                table.columns.retain(|c| c.name != column.name);
                table.columns.push(column);
            }
        }
        return;
    }

    if let Some(captures) = DROP_COLUMN_REGEX.captures(action) {
        if let Some(table) = state.table_mut(table_name) {
            table.remove_column(&captures[1]);
        }
        return;
    }

    if let Some(captures) = ADD_CONSTRAINT_REGEX.captures(action) {
        let constraint_name = captures[1].to_string();
        let body = captures[2].to_string();
        if let Some(fk) = parse_foreign_key(&body, Some(constraint_name)) {
            if let Some(table) = state.table_mut(table_name) {
                table.foreign_keys.retain(|existing| existing.from != fk.from);
                table.foreign_keys.push(fk);
            }
        }
        return;
    }

    if let Some(captures) = ALTER_COLUMN_REGEX.captures(action) {
        let column_name = captures[1].to_string();
        let change = captures[2].trim().to_string();
        if let Some(table) = state.table_mut(table_name) {
            apply_alter_column(table, &column_name, &change);
        }
    }
}

fn apply_alter_column(table: &mut ShadowTable, column_name: &str, change: &str) {
    let is_array_table = table
        .column(column_name)
        .map(|c| c.is_array)
        .unwrap_or(false);
    let Some(column) = table.columns.iter_mut().find(|c| c.name == column_name) else {
        return;
    };

    let upper = change.to_uppercase();
    if let Some(type_text) = change
        .strip_prefix("TYPE ")
        .or_else(|| change.strip_prefix("type "))
    {
        let (type_name, is_array) = map_sql_type(type_text.trim());
        column.type_name = type_name;
        column.is_array = is_array;
    } else if upper == "SET NOT NULL" {
        column.not_null = true;
    } else if upper == "DROP NOT NULL" {
        column.not_null = false;
    } else if upper == "DROP DEFAULT" {
        column.default = None;
    } else if let Some(expr) = change
        .strip_prefix("SET DEFAULT ")
        .or_else(|| change.strip_prefix("set default "))
    {
        column.default = Some(sql_default_to_schema(expr.trim(), is_array_table));
    }
}

fn parse_create_table(name: &str, body: &str) -> ShadowTable {
    let mut table = ShadowTable::new(name);

    for part in split_table_parts(body) {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }

        if is_constraint_part(part) {
            parse_table_constraint(part, &mut table);
        } else if let Some(column) = parse_column_definition(part) {
            table.columns.push(column);
        }
    }

    table
}

/// Split a CREATE TABLE body at top-level commas, quote- and paren-aware.
fn split_table_parts(body: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    let mut depth = 0i32;

    for c in body.chars() {
        match quote {
            Some(q) => {
                current.push(c);
                if c == q {
                    quote = None;
                }
            }
            None => match c {
                '\'' | '"' => {
                    quote = Some(c);
                    current.push(c);
                }
                '(' => {
                    depth += 1;
                    current.push(c);
                }
                ')' => {
                    depth -= 1;
                    current.push(c);
                }
                ',' if depth == 0 => {
                    parts.push(current.trim().to_string());
                    current.clear();
                }
                _ => current.push(c),
            },
        }
    }

    let last = current.trim().to_string();
    if !last.is_empty() {
        parts.push(last);
    }
    parts
}

fn is_constraint_part(part: &str) -> bool {
    let upper = part.to_uppercase();
    let head = upper
        .strip_prefix("CONSTRAINT")
        .map(|rest| rest.trim_start())
        .map(|rest| rest.split_whitespace().skip(1).collect::<Vec<_>>().join(" "))
        .unwrap_or(upper);
    head.starts_with("PRIMARY KEY")
        || head.starts_with("UNIQUE")
        || head.starts_with("CHECK")
        || head.starts_with("FOREIGN KEY")
}

fn parse_table_constraint(part: &str, table: &mut ShadowTable) {
    let upper = part.to_uppercase();

    if upper.contains("FOREIGN KEY") {
        if let Some(fk) = parse_foreign_key(part, None) {
            table.foreign_keys.push(fk);
        }
    } else if upper.contains("PRIMARY KEY") {
        if let Some(columns) = paren_column_list(part) {
            table.primary_key = columns;
        }
    } else if upper.contains("CHECK") {
        if let Some(start) = part.find('(') {
            if let Some(inner) = balanced_paren_content(part, start) {
                table.checks.push(inner.trim().to_string());
            }
        }
    } else if upper.contains("UNIQUE") {
        if let Some(columns) = paren_column_list(part) {
            table.uniques.push(columns);
        }
    }
}

fn parse_foreign_key(text: &str, name: Option<String>) -> Option<ShadowForeignKey> {
    let captures = FOREIGN_KEY_REGEX.captures(text)?;
    Some(ShadowForeignKey {
        name,
        from: split_column_list(&captures[1]),
        to_table: captures[2].to_string(),
        to: split_column_list(&captures[3]),
        on_delete: captures
            .get(4)
            .map(|m| ReferentialAction::from_sql(m.as_str()))
            .unwrap_or_default(),
        on_update: captures
            .get(5)
            .map(|m| ReferentialAction::from_sql(m.as_str()))
            .unwrap_or_default(),
    })
}

/// Parse a column definition: quoted name, type, then flags
/// (NOT NULL, UNIQUE, DEFAULT, identity).
fn parse_column_definition(part: &str) -> Option<ShadowColumn> {
    let part = part.trim();
    let rest = part.strip_prefix('"')?;
    let quote_end = rest.find('"')?;
    let name = &rest[..quote_end];
    let rest = rest[quote_end + 1..].trim_start();

    let (type_text, rest) = take_type_text(rest)?;
    let (type_name, is_array) = map_sql_type(&type_text);

    let upper = rest.to_uppercase();
    let mut column = ShadowColumn {
        name: name.to_string(),
        type_name,
        is_array,
        not_null: upper.contains("NOT NULL"),
        unique: upper.contains("UNIQUE"),
        default: None,
    };

    if upper.contains("GENERATED BY DEFAULT AS IDENTITY") {
        column.default = Some("autoincrement()".to_string());
    } else if let Some(captures) = DEFAULT_CLAUSE_REGEX.captures(&rest) {
        column.default = Some(sql_default_to_schema(&captures[1], column.is_array));
    }

    Some(column)
}

/// Consume the SQL type at the head of `rest`, returning it and the tail.
/// Handles quoted enum types, `DOUBLE PRECISION`, and `(n)` suffixes.
fn take_type_text(rest: &str) -> Option<(String, String)> {
    if let Some(inner) = rest.strip_prefix('"') {
        let end = inner.find('"')?;
        let mut type_text = format!("\"{}\"", &inner[..end]);
        let mut tail = &inner[end + 1..];
        if let Some(after) = tail.strip_prefix("[]") {
            type_text.push_str("[]");
            tail = after;
        }
        return Some((type_text, tail.trim_start().to_string()));
    }

    let upper = rest.to_uppercase();
    if upper.starts_with("DOUBLE PRECISION") {
        let tail = &rest["DOUBLE PRECISION".len()..];
        let (suffix, tail) = match tail.strip_prefix("[]") {
            Some(after) => ("[]", after),
            None => ("", tail),
        };
        return Some((
            format!("DOUBLE PRECISION{}", suffix),
            tail.trim_start().to_string(),
        ));
    }

    let mut end = 0;
    let bytes = rest.as_bytes();
    while end < bytes.len() && (bytes[end].is_ascii_alphanumeric() || bytes[end] == b'_') {
        end += 1;
    }
    if end == 0 {
        return None;
    }
    let mut type_end = end;
    if bytes.get(type_end) == Some(&b'(') {
        let close = rest[type_end..].find(')')?;
        type_end += close + 1;
    }
    if rest[type_end..].starts_with("[]") {
        type_end += 2;
    }
    Some((rest[..type_end].to_string(), rest[type_end..].trim_start().to_string()))
}

/// Map SQL type text to a schema type name plus array-ness.
/// Quoted types pass through as enum/class names; unknown types pass raw.
fn map_sql_type(type_text: &str) -> (String, bool) {
    let trimmed = type_text.trim();
    let (base, is_array) = match trimmed.strip_suffix("[]") {
        Some(base) => (base.trim(), true),
        None => (trimmed, false),
    };

    if let Some(inner) = base.strip_prefix('"').and_then(|s| s.strip_suffix('"')) {
        return (inner.to_string(), is_array);
    }

    match ScalarType::from_ddl(base) {
        Some(scalar) => (scalar.name().to_string(), is_array),
        None => (base.to_string(), is_array),
    }
}

/// Map a SQL default expression back to schema-source default text.
pub(crate) fn sql_default_to_schema(expression: &str, is_array: bool) -> String {
    let mut expr = expression.trim();

    // Strip a trailing cast such as `'USER'::"Role"`.
    if let Some(idx) = expr.find("::") {
        expr = expr[..idx].trim();
    }

    let lower = expr.to_lowercase();
    if lower.starts_with("current_timestamp") || lower == "now()" {
        return "now()".to_string();
    }
    if lower.contains("gen_random_uuid") {
        return "uuid()".to_string();
    }
    if lower.contains("nextval") || lower == "autoincrement()" {
        return "autoincrement()".to_string();
    }

    if is_array {
        let inner = expr.trim_matches('\'');
        if let Some(body) = inner.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
            if body.trim().is_empty() {
                return "[]".to_string();
            }
            let elements: Vec<String> = split_array_body(body)
                .into_iter()
                .map(|e| {
                    let e = e.trim();
                    match e.strip_prefix('"').and_then(|s| s.strip_suffix('"')) {
                        Some(inner) => format!("\"{}\"", inner.replace("\\\"", "\"")),
                        None => e.to_string(),
                    }
                })
                .collect();
            return format!("[{}]", elements.join(", "));
        }
    }

    expr.to_string()
}

/// Split a PostgreSQL array literal body at top-level commas.
fn split_array_body(body: &str) -> Vec<String> {
    let mut elements = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut escaped = false;

    for c in body.chars() {
        if escaped {
            current.push(c);
            escaped = false;
            continue;
        }
        match c {
            '\\' => {
                current.push(c);
                escaped = true;
            }
            '"' => {
                in_quotes = !in_quotes;
                current.push(c);
            }
            ',' if !in_quotes => {
                elements.push(current.clone());
                current.clear();
            }
            _ => current.push(c),
        }
    }
    if !current.is_empty() {
        elements.push(current);
    }
    elements
}

fn paren_column_list(part: &str) -> Option<Vec<String>> {
    let start = part.find('(')?;
    let inner = balanced_paren_content(part, start)?;
    Some(split_column_list(&inner))
}

/// The content of the parenthesis run opening at `start`.
fn balanced_paren_content(text: &str, start: usize) -> Option<String> {
    let bytes = text.as_bytes();
    debug_assert_eq!(bytes.get(start), Some(&b'('));
    let mut depth = 0i32;
    for (idx, c) in text[start..].char_indices() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(text[start + 1..start + idx].to_string());
                }
            }
            _ => {}
        }
    }
    None
}

fn split_column_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(|part| part.trim().trim_matches('"').to_string())
        .filter(|part| !part.is_empty())
        .collect()
}
