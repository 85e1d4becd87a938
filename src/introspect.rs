//! Catalog introspection: build a schema model from a live database's
//! catalog rows.
//!
//! The engine never opens connections. A [`CatalogSource`] supplies row
//! vectors in the shapes the catalog queries below produce; the
//! introspector folds them into shadow state and re-enters the front end,
//! so the result passes the same validation as a user-written schema.
//! Either a complete model is returned or an error; the source is drained
//! to completion.

use std::error::Error;

use crate::ast::SchemaAst;
use crate::constants::{ReferentialAction, ScalarType, MIGRATION_TABLE_NAME};
use crate::shadow::{
    sql_default_to_schema, ShadowColumn, ShadowEnum, ShadowForeignKey, ShadowIndex, ShadowState,
    ShadowTable,
};
use crate::validation;

/// `(enum_name, enum_value, sort_order)`
#[derive(Debug, Clone)]
pub struct EnumRow {
    pub enum_name: String,
    pub enum_value: String,
    pub sort_order: i16,
}

/// `(column_name, udt_name, is_nullable YES|NO, column_default, ordinal_position)`
#[derive(Debug, Clone)]
pub struct ColumnRow {
    pub column_name: String,
    pub udt_name: String,
    pub is_nullable: String,
    pub column_default: Option<String>,
    pub ordinal_position: i16,
}

/// `(constraint_type PRIMARY KEY|UNIQUE, column_name, constraint_name)`
#[derive(Debug, Clone)]
pub struct ConstraintRow {
    pub constraint_type: String,
    pub column_name: String,
    pub constraint_name: String,
}

/// `(index_name, is_unique, is_primary, columns comma-separated)`
#[derive(Debug, Clone)]
pub struct IndexRow {
    pub index_name: String,
    pub is_unique: bool,
    pub is_primary: bool,
    pub columns: String,
}

/// `(fk_column, referenced_table, referenced_column, update_rule, delete_rule, constraint_name)`
#[derive(Debug, Clone)]
pub struct ForeignKeyRow {
    pub fk_column: String,
    pub referenced_table: String,
    pub referenced_column: String,
    pub update_rule: String,
    pub delete_rule: String,
    pub constraint_name: String,
}

/// Produces catalog rows. Implementations wrap a database connection (or a
/// fixture in tests); each method is drained exactly once per introspection.
pub trait CatalogSource {
    fn enums(&mut self) -> Result<Vec<EnumRow>, Box<dyn Error>>;
    fn tables(&mut self) -> Result<Vec<String>, Box<dyn Error>>;
    fn columns(&mut self, table: &str) -> Result<Vec<ColumnRow>, Box<dyn Error>>;
    fn constraints(&mut self, table: &str) -> Result<Vec<ConstraintRow>, Box<dyn Error>>;
    fn indexes(&mut self, table: &str) -> Result<Vec<IndexRow>, Box<dyn Error>>;
    fn foreign_keys(&mut self, table: &str) -> Result<Vec<ForeignKeyRow>, Box<dyn Error>>;
}

/// Introspect a catalog into a validated schema model.
pub fn introspect(source: &mut dyn CatalogSource) -> Result<SchemaAst, Box<dyn Error>> {
    let mut state = ShadowState::default();

    build_enums(&mut state, source.enums()?);
    let enum_names: Vec<String> = state.enums.iter().map(|e| e.name.clone()).collect();

    for table_name in source.tables()? {
        if table_name == MIGRATION_TABLE_NAME {
            continue;
        }
        let table = build_table(
            &table_name,
            &enum_names,
            source.columns(&table_name)?,
            source.constraints(&table_name)?,
            source.foreign_keys(&table_name)?,
        )?;
        build_indexes(&mut state, &table, source.indexes(&table_name)?);
        state.tables.push(table);
    }

    let rendered = state.render();
    if rendered.trim().is_empty() {
        return Ok(SchemaAst::default());
    }
    let mut ast = SchemaAst::from_source(&rendered)?;
    validation::validate(&mut ast)?;
    Ok(ast)
}

fn build_enums(state: &mut ShadowState, mut rows: Vec<EnumRow>) {
    rows.sort_by(|a, b| {
        a.enum_name
            .cmp(&b.enum_name)
            .then(a.sort_order.cmp(&b.sort_order))
    });

    for row in rows {
        match state.enums.iter_mut().find(|e| e.name == row.enum_name) {
            Some(shadow_enum) => shadow_enum.values.push(row.enum_value),
            None => state.enums.push(ShadowEnum {
                name: row.enum_name,
                values: vec![row.enum_value],
            }),
        }
    }
}

fn build_table(
    table_name: &str,
    enum_names: &[String],
    mut columns: Vec<ColumnRow>,
    constraints: Vec<ConstraintRow>,
    foreign_keys: Vec<ForeignKeyRow>,
) -> Result<ShadowTable, Box<dyn Error>> {
    let mut table = ShadowTable::new(table_name);

    columns.sort_by_key(|c| c.ordinal_position);
    for row in &columns {
        table.columns.push(build_column(row, enum_names)?);
    }

    fold_constraints(&mut table, constraints);
    fold_foreign_keys(&mut table, foreign_keys);

    Ok(table)
}

fn build_column(row: &ColumnRow, enum_names: &[String]) -> Result<ShadowColumn, Box<dyn Error>> {
    // PostgreSQL reports array types with a `_` udt prefix (`_int4`).
    let (udt, is_array) = match row.udt_name.strip_prefix('_') {
        Some(base) => (base, true),
        None => (row.udt_name.as_str(), false),
    };

    let type_name = if enum_names.iter().any(|e| e == udt) {
        udt.to_string()
    } else {
        ScalarType::from_udt(udt)
            .map(|s| s.name().to_string())
            .ok_or_else(|| format!("unsupported column type '{}' on table", row.udt_name))?
    };

    let default = row
        .column_default
        .as_deref()
        .filter(|d| !d.trim().is_empty() && d.trim() != "null" && d.trim() != "NULL")
        .map(|d| sql_default_to_schema(d, is_array));

    Ok(ShadowColumn {
        name: row.column_name.clone(),
        type_name,
        is_array,
        not_null: row.is_nullable.eq_ignore_ascii_case("NO"),
        unique: false,
        default,
    })
}

/// Fold multi-row constraints (one row per column) into the table:
/// PRIMARY KEY becomes the key set; single-column UNIQUE marks the column,
/// composite UNIQUE becomes a `@@unique` set.
fn fold_constraints(table: &mut ShadowTable, rows: Vec<ConstraintRow>) {
    let mut folded: Vec<(String, String, Vec<String>)> = Vec::new();
    for row in rows {
        match folded.iter_mut().find(|(name, _, _)| *name == row.constraint_name) {
            Some((_, _, columns)) => columns.push(row.column_name),
            None => folded.push((
                row.constraint_name,
                row.constraint_type,
                vec![row.column_name],
            )),
        }
    }

    for (_, constraint_type, columns) in folded {
        let normalized = constraint_type.replace('_', " ").to_uppercase();
        if normalized == "PRIMARY KEY" {
            table.primary_key = columns;
        } else if normalized == "UNIQUE" {
            if columns.len() == 1 {
                if let Some(column) = table.columns.iter_mut().find(|c| c.name == columns[0]) {
                    column.unique = true;
                }
            } else {
                table.uniques.push(columns);
            }
        }
    }
}

fn fold_foreign_keys(table: &mut ShadowTable, rows: Vec<ForeignKeyRow>) {
    for row in rows {
        match table
            .foreign_keys
            .iter_mut()
            .find(|fk| fk.name.as_deref() == Some(row.constraint_name.as_str()))
        {
            Some(fk) => {
                fk.from.push(row.fk_column);
                fk.to.push(row.referenced_column);
            }
            None => table.foreign_keys.push(ShadowForeignKey {
                name: Some(row.constraint_name),
                from: vec![row.fk_column],
                to_table: row.referenced_table,
                to: vec![row.referenced_column],
                on_delete: ReferentialAction::from_sql(&row.delete_rule),
                on_update: ReferentialAction::from_sql(&row.update_rule),
            }),
        }
    }
}

/// Record secondary indexes. Primary and unique indexes are skipped here:
/// the constraint rows already carry that uniqueness information.
fn build_indexes(state: &mut ShadowState, table: &ShadowTable, rows: Vec<IndexRow>) {
    for row in rows {
        if row.is_primary {
            continue;
        }

        let columns: Vec<String> = row
            .columns
            .split(',')
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .collect();
        if columns.is_empty() {
            continue;
        }

        if row.is_unique {
            continue;
        }

        let is_text = row.index_name.ends_with("_text_index");
        state.indexes.push(ShadowIndex {
            name: row.index_name,
            table: table.name.clone(),
            columns,
            is_text,
        });
    }
}

/// Catalog queries matching the row shapes above. Callers bind `$1` to the
/// table name where present.
pub mod queries {
    pub const ALL_ENUMS: &str = "\
SELECT t.typname AS enum_name, e.enumlabel AS enum_value, e.enumsortorder AS sort_order
FROM pg_type t
JOIN pg_enum e ON t.oid = e.enumtypid
JOIN pg_namespace n ON n.oid = t.typnamespace
WHERE n.nspname = 'public'
ORDER BY enum_name, e.enumsortorder";

    pub const ALL_TABLES: &str = "\
SELECT table_name
FROM information_schema.tables
WHERE table_schema = 'public' AND table_type = 'BASE TABLE'
ORDER BY table_name";

    pub const TABLE_COLUMNS: &str = "\
SELECT c.column_name, c.udt_name, c.is_nullable, c.column_default, c.ordinal_position
FROM information_schema.columns c
WHERE c.table_schema = 'public' AND c.table_name = $1
ORDER BY c.ordinal_position";

    pub const TABLE_CONSTRAINTS: &str = "\
SELECT tc.constraint_type, kcu.column_name, tc.constraint_name
FROM information_schema.table_constraints tc
JOIN information_schema.key_column_usage kcu
  ON tc.constraint_name = kcu.constraint_name
 AND tc.table_schema = kcu.table_schema
WHERE tc.table_schema = 'public'
  AND tc.table_name = $1
  AND tc.constraint_type IN ('PRIMARY KEY', 'UNIQUE')
ORDER BY tc.constraint_name, kcu.ordinal_position";

    pub const TABLE_INDEXES: &str = "\
SELECT i.relname AS index_name,
       ix.indisunique AS is_unique,
       ix.indisprimary AS is_primary,
       string_agg(a.attname, ',' ORDER BY array_position(ix.indkey, a.attnum)) AS columns
FROM pg_class t
JOIN pg_index ix ON t.oid = ix.indrelid
JOIN pg_class i ON i.oid = ix.indexrelid
JOIN pg_attribute a ON a.attrelid = t.oid AND a.attnum = ANY(ix.indkey)
JOIN pg_namespace n ON n.oid = t.relnamespace
WHERE n.nspname = 'public' AND t.relname = $1
GROUP BY i.relname, ix.indisunique, ix.indisprimary";

    pub const TABLE_FOREIGN_KEYS: &str = "\
SELECT kcu.column_name AS fk_column,
       ccu.table_name AS referenced_table,
       ccu.column_name AS referenced_column,
       rc.update_rule,
       rc.delete_rule,
       tc.constraint_name
FROM information_schema.table_constraints tc
JOIN information_schema.key_column_usage kcu
  ON tc.constraint_name = kcu.constraint_name
 AND tc.table_schema = kcu.table_schema
JOIN information_schema.referential_constraints rc
  ON tc.constraint_name = rc.constraint_name
 AND tc.table_schema = rc.constraint_schema
JOIN information_schema.constraint_column_usage ccu
  ON ccu.constraint_name = tc.constraint_name
 AND ccu.table_schema = tc.table_schema
WHERE tc.table_schema = 'public'
  AND tc.table_name = $1
  AND tc.constraint_type = 'FOREIGN KEY'
ORDER BY tc.constraint_name, kcu.ordinal_position";
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Fixture source backed by plain vectors.
    #[derive(Default)]
    struct FakeCatalog {
        enums: Vec<EnumRow>,
        tables: Vec<String>,
        columns: Vec<(String, Vec<ColumnRow>)>,
        constraints: Vec<(String, Vec<ConstraintRow>)>,
        indexes: Vec<(String, Vec<IndexRow>)>,
        foreign_keys: Vec<(String, Vec<ForeignKeyRow>)>,
    }

    impl FakeCatalog {
        fn lookup<T: Clone>(pairs: &[(String, Vec<T>)], table: &str) -> Vec<T> {
            pairs
                .iter()
                .find(|(name, _)| name == table)
                .map(|(_, rows)| rows.clone())
                .unwrap_or_default()
        }
    }

    impl CatalogSource for FakeCatalog {
        fn enums(&mut self) -> Result<Vec<EnumRow>, Box<dyn Error>> {
            Ok(self.enums.clone())
        }
        fn tables(&mut self) -> Result<Vec<String>, Box<dyn Error>> {
            Ok(self.tables.clone())
        }
        fn columns(&mut self, table: &str) -> Result<Vec<ColumnRow>, Box<dyn Error>> {
            Ok(Self::lookup(&self.columns, table))
        }
        fn constraints(&mut self, table: &str) -> Result<Vec<ConstraintRow>, Box<dyn Error>> {
            Ok(Self::lookup(&self.constraints, table))
        }
        fn indexes(&mut self, table: &str) -> Result<Vec<IndexRow>, Box<dyn Error>> {
            Ok(Self::lookup(&self.indexes, table))
        }
        fn foreign_keys(&mut self, table: &str) -> Result<Vec<ForeignKeyRow>, Box<dyn Error>> {
            Ok(Self::lookup(&self.foreign_keys, table))
        }
    }

    fn column(name: &str, udt: &str, nullable: bool, default: Option<&str>, ordinal: i16) -> ColumnRow {
        ColumnRow {
            column_name: name.to_string(),
            udt_name: udt.to_string(),
            is_nullable: if nullable { "YES" } else { "NO" }.to_string(),
            column_default: default.map(str::to_string),
            ordinal_position: ordinal,
        }
    }

    #[test]
    fn test_empty_catalog() {
        let mut catalog = FakeCatalog::default();
        let ast = introspect(&mut catalog).unwrap();
        assert!(ast.is_empty());
    }

    #[test]
    fn test_introspect_enums_sorted() {
        let mut catalog = FakeCatalog {
            enums: vec![
                EnumRow {
                    enum_name: "Role".into(),
                    enum_value: "ADMIN".into(),
                    sort_order: 2,
                },
                EnumRow {
                    enum_name: "Role".into(),
                    enum_value: "USER".into(),
                    sort_order: 1,
                },
            ],
            ..FakeCatalog::default()
        };
        let ast = introspect(&mut catalog).unwrap();
        let role = ast.enum_by_name("Role").unwrap();
        assert_eq!(role.value_names().collect::<Vec<_>>(), vec!["USER", "ADMIN"]);
    }

    #[test]
    fn test_introspect_table_with_defaults_and_pk() {
        let mut catalog = FakeCatalog {
            tables: vec!["User".into()],
            columns: vec![(
                "User".into(),
                vec![
                    column("id", "uuid", false, Some("gen_random_uuid()"), 1),
                    column("age", "int4", true, None, 2),
                    column("tags", "_text", true, None, 3),
                ],
            )],
            constraints: vec![(
                "User".into(),
                vec![ConstraintRow {
                    constraint_type: "PRIMARY KEY".into(),
                    column_name: "id".into(),
                    constraint_name: "User_pkey".into(),
                }],
            )],
            ..FakeCatalog::default()
        };
        let ast = introspect(&mut catalog).unwrap();
        let user = ast.class_by_name("User").unwrap();

        let id = user.find_field("id").unwrap();
        assert!(id.is_primary_key);
        assert_eq!(id.data_type, "String");
        assert!(matches!(
            id.default,
            Some(crate::ast::defaults::DefaultValue::Callback(
                crate::constants::DefaultCallback::Uuid
            ))
        ));

        let tags = user.find_field("tags").unwrap();
        assert!(tags.is_array);
        assert_eq!(tags.data_type, "String");
    }

    #[test]
    fn test_introspect_migration_table_skipped() {
        let mut catalog = FakeCatalog {
            tables: vec![MIGRATION_TABLE_NAME.to_string()],
            ..FakeCatalog::default()
        };
        let ast = introspect(&mut catalog).unwrap();
        assert!(ast.classes.is_empty());
    }

    #[test]
    fn test_introspect_enum_default_cast_stripped() {
        let mut catalog = FakeCatalog {
            enums: vec![EnumRow {
                enum_name: "Role".into(),
                enum_value: "USER".into(),
                sort_order: 1,
            }],
            tables: vec!["User".into()],
            columns: vec![(
                "User".into(),
                vec![
                    column("id", "int4", false, None, 1),
                    column("role", "Role", false, Some("'USER'::\"Role\""), 2),
                ],
            )],
            constraints: vec![(
                "User".into(),
                vec![ConstraintRow {
                    constraint_type: "PRIMARY KEY".into(),
                    column_name: "id".into(),
                    constraint_name: "User_pkey".into(),
                }],
            )],
            ..FakeCatalog::default()
        };
        let ast = introspect(&mut catalog).unwrap();
        let role = ast.class_by_name("User").unwrap().find_field("role").unwrap();
        assert_eq!(role.kind, crate::ast::FieldKind::Enum);
        assert!(role.default.is_some());
    }

    #[test]
    fn test_introspect_foreign_keys_folded() {
        let mut catalog = FakeCatalog {
            tables: vec!["Order".into(), "User".into()],
            columns: vec![
                (
                    "User".into(),
                    vec![column("id", "int4", false, None, 1)],
                ),
                (
                    "Order".into(),
                    vec![
                        column("id", "int4", false, None, 1),
                        column("userId", "int4", true, None, 2),
                    ],
                ),
            ],
            constraints: vec![
                (
                    "User".into(),
                    vec![ConstraintRow {
                        constraint_type: "PRIMARY KEY".into(),
                        column_name: "id".into(),
                        constraint_name: "User_pkey".into(),
                    }],
                ),
                (
                    "Order".into(),
                    vec![ConstraintRow {
                        constraint_type: "PRIMARY KEY".into(),
                        column_name: "id".into(),
                        constraint_name: "Order_pkey".into(),
                    }],
                ),
            ],
            foreign_keys: vec![(
                "Order".into(),
                vec![ForeignKeyRow {
                    fk_column: "userId".into(),
                    referenced_table: "User".into(),
                    referenced_column: "id".into(),
                    update_rule: "NO ACTION".into(),
                    delete_rule: "SET NULL".into(),
                    constraint_name: "fk_order_user".into(),
                }],
            )],
            ..FakeCatalog::default()
        };
        let ast = introspect(&mut catalog).unwrap();
        let order = ast.class_by_name("Order").unwrap();
        let user_field = order.find_field("user").unwrap();
        assert!(user_field.is_foreign_key());
        assert!(user_field.is_optional);
        assert_eq!(
            user_field.relation.as_ref().unwrap().on_delete,
            ReferentialAction::SetNull
        );
    }

    #[test]
    fn test_unsupported_type_is_an_error() {
        let mut catalog = FakeCatalog {
            tables: vec!["T".into()],
            columns: vec![(
                "T".into(),
                vec![column("v", "tsvector", false, None, 1)],
            )],
            ..FakeCatalog::default()
        };
        assert!(introspect(&mut catalog).is_err());
    }
}
