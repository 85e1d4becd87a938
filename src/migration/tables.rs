//! Table diffing: create/drop tables and per-column alterations.

use super::*;

impl MigrationEngine<'_> {
    pub(super) fn table_statements(&self) -> Result<Vec<Statement>, SchemaError> {
        let mut statements = Vec::new();

        for old_class in &self.from.classes {
            if self.to.class_by_name(&old_class.name).is_none() {
                statements.push(Statement::new(
                    format!("DROP TABLE IF EXISTS {} CASCADE", quote_ident(&old_class.name)),
                    StatementKind::TableDrop,
                    PRIORITY_TABLE_DROP,
                ));
            }
        }

        for new_class in &self.to.classes {
            match self.from.class_by_name(&new_class.name) {
                None => statements.push(Statement::new(
                    create_table_sql(new_class),
                    StatementKind::TableCreate,
                    PRIORITY_TABLE_CREATE,
                )),
                Some(old_class) => {
                    statements.extend(alter_table_statements(old_class, new_class));
                }
            }
        }

        Ok(statements)
    }
}

/// CREATE TABLE with all column fields followed by table constraints:
/// PRIMARY KEY, UNIQUE (field-level uniques then `@@unique` sets), CHECK.
fn create_table_sql(class: &ClassDef) -> String {
    let mut parts: Vec<String> = class.fields.iter().filter_map(column_definition).collect();

    let pk_fields = class.primary_key_fields();
    if !pk_fields.is_empty() {
        parts.push(format!("PRIMARY KEY ({})", quote_idents(&pk_fields)));
    }

    for field in &class.fields {
        if field.is_unique {
            parts.push(format!("UNIQUE ({})", quote_ident(&field.name)));
        }
    }
    for unique_set in class.unique_sets() {
        parts.push(format!("UNIQUE ({})", quote_idents(unique_set)));
    }

    for check in class.check_expressions() {
        parts.push(format!("CHECK ({})", check));
    }

    format!(
        "CREATE TABLE {} ( {} )",
        quote_ident(&class.name),
        parts.join(", ")
    )
}

fn alter_table_statements(old_class: &ClassDef, new_class: &ClassDef) -> Vec<Statement> {
    let mut statements = Vec::new();
    let table = quote_ident(&new_class.name);

    for new_field in &new_class.fields {
        if old_class.find_field(&new_field.name).is_none() {
            if let Some(definition) = column_definition(new_field) {
                statements.push(Statement::new(
                    format!("ALTER TABLE {} ADD COLUMN {}", table, definition),
                    StatementKind::ColumnAdd,
                    PRIORITY_COLUMN_ADD,
                ));
            }
        }
    }

    for old_field in &old_class.fields {
        if new_class.find_field(&old_field.name).is_none() && old_field.is_column() {
            statements.push(Statement::new(
                format!(
                    "ALTER TABLE {} DROP COLUMN IF EXISTS {}",
                    table,
                    quote_ident(&old_field.name)
                ),
                StatementKind::ColumnDrop,
                PRIORITY_COLUMN_DROP,
            ));
        }
    }

    for new_field in &new_class.fields {
        if let Some(old_field) = old_class.find_field(&new_field.name) {
            if old_field.is_column() && new_field.is_column() {
                statements.extend(alter_column_statements(&table, old_field, new_field));
            }
        }
    }

    statements
}

fn alter_column_statements(table: &str, old_field: &Field, new_field: &Field) -> Vec<Statement> {
    let mut statements = Vec::new();
    let column = quote_ident(&new_field.name);

    let old_type = column_type_sql(old_field);
    let new_type = column_type_sql(new_field);
    if old_type != new_type {
        statements.push(Statement::new(
            format!("ALTER TABLE {} ALTER COLUMN {} TYPE {}", table, column, new_type),
            StatementKind::ColumnType,
            PRIORITY_COLUMN_TYPE,
        ));
    }

    if old_field.is_optional != new_field.is_optional {
        let clause = if new_field.is_optional {
            "DROP NOT NULL"
        } else {
            "SET NOT NULL"
        };
        statements.push(Statement::new(
            format!("ALTER TABLE {} ALTER COLUMN {} {}", table, column, clause),
            StatementKind::ColumnNull,
            PRIORITY_COLUMN_NULL,
        ));
    }

    if old_field.default != new_field.default {
        match &new_field.default {
            None => statements.push(Statement::new(
                format!("ALTER TABLE {} ALTER COLUMN {} DROP DEFAULT", table, column),
                StatementKind::ColumnDefault,
                PRIORITY_COLUMN_DEFAULT,
            )),
            Some(default) => {
                // Identity changes are not expressible as a DEFAULT swap.
                if let Some(sql) = default_sql(default) {
                    statements.push(Statement::new(
                        format!(
                            "ALTER TABLE {} ALTER COLUMN {} SET DEFAULT {}",
                            table, column, sql
                        ),
                        StatementKind::ColumnDefault,
                        PRIORITY_COLUMN_DEFAULT,
                    ));
                }
            }
        }
    }

    statements
}
