//! The shadow state: a textual table/enum/index model that SQL statements
//! are applied against, and its rendering back to schema source.
//!
//! Both the migration replayer and the catalog introspector funnel into
//! this state; the rendered source re-enters through the normal reader,
//! parser, and validator so reconstructed models are built by exactly the
//! code paths that build user models.

use crate::ast::{FieldKind, SchemaAst};
use crate::constants::ReferentialAction;

/// An enum type as seen by the database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShadowEnum {
    pub name: String,
    pub values: Vec<String>,
}

/// A table column. `type_name` is the schema-level type name (scalar,
/// enum, or class), with array-ness tracked separately.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ShadowColumn {
    pub name: String,
    pub type_name: String,
    pub is_array: bool,
    pub not_null: bool,
    pub unique: bool,
    /// Default in schema-source form (`uuid()`, `42`, `'USER'`, `[1, 2]`).
    pub default: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShadowForeignKey {
    /// Constraint name when known; used to recover the relation field name.
    pub name: Option<String>,
    pub from: Vec<String>,
    pub to_table: String,
    pub to: Vec<String>,
    pub on_delete: ReferentialAction,
    pub on_update: ReferentialAction,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ShadowTable {
    pub name: String,
    pub columns: Vec<ShadowColumn>,
    pub primary_key: Vec<String>,
    pub uniques: Vec<Vec<String>>,
    pub checks: Vec<String>,
    pub foreign_keys: Vec<ShadowForeignKey>,
}

impl ShadowTable {
    pub fn new(name: impl Into<String>) -> Self {
        ShadowTable {
            name: name.into(),
            ..ShadowTable::default()
        }
    }

    pub fn column(&self, name: &str) -> Option<&ShadowColumn> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn remove_column(&mut self, name: &str) {
        self.columns.retain(|c| c.name != name);
        // A foreign key whose source column is gone cannot be rendered.
        self.foreign_keys.retain(|fk| !fk.from.iter().any(|f| f == name));
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShadowIndex {
    pub name: String,
    pub table: String,
    pub columns: Vec<String>,
    pub is_text: bool,
}

/// The complete shadow model. Tables keep creation order so rendered
/// source mirrors the order migrations created them in.
#[derive(Debug, Clone, Default)]
pub struct ShadowState {
    pub enums: Vec<ShadowEnum>,
    pub tables: Vec<ShadowTable>,
    pub indexes: Vec<ShadowIndex>,
}

impl ShadowState {
    /// Project a schema model into shadow form.
    pub fn from_ast(ast: &SchemaAst) -> ShadowState {
        let mut state = ShadowState::default();

        for def in ast.enums.values() {
            state.enums.push(ShadowEnum {
                name: def.name.clone(),
                values: def.values.iter().map(|v| v.name.clone()).collect(),
            });
        }

        for class in &ast.classes {
            let mut table = ShadowTable::new(&class.name);
            let pk_fields = class.primary_key_fields();

            for field in &class.fields {
                match field.kind {
                    FieldKind::Object => {
                        if let Some(relation) = &field.relation {
                            table.foreign_keys.push(ShadowForeignKey {
                                name: Some(format!(
                                    "fk_{}_{}",
                                    class.name.to_lowercase(),
                                    field.name.to_lowercase()
                                )),
                                from: relation.from.clone(),
                                to_table: relation.to_class.clone(),
                                to: relation.to.clone(),
                                on_delete: relation.on_delete,
                                on_update: relation.on_update,
                            });
                        }
                    }
                    _ => {
                        table.columns.push(ShadowColumn {
                            name: field.name.clone(),
                            type_name: field.data_type.clone(),
                            is_array: field.is_array,
                            not_null: !field.is_optional,
                            unique: field.is_unique,
                            default: field.default.as_ref().map(|d| d.to_string()),
                        });
                    }
                }
            }

            table.primary_key = pk_fields;
            for unique_set in class.unique_sets() {
                table.uniques.push(unique_set.to_vec());
            }
            for check in class.check_expressions() {
                table.checks.push(check.to_string());
            }

            for directive in &class.directives {
                use crate::ast::ClassDirective;
                match directive {
                    ClassDirective::Index { fields, .. } => state.indexes.push(ShadowIndex {
                        name: crate::migration::index_sql_name(&class.name, fields, false),
                        table: class.name.clone(),
                        columns: fields.clone(),
                        is_text: false,
                    }),
                    ClassDirective::TextIndex { fields, .. } => state.indexes.push(ShadowIndex {
                        name: crate::migration::index_sql_name(&class.name, fields, true),
                        table: class.name.clone(),
                        columns: fields.clone(),
                        is_text: true,
                    }),
                    _ => {}
                }
            }

            state.tables.push(table);
        }

        state
    }

    pub fn table(&self, name: &str) -> Option<&ShadowTable> {
        self.tables.iter().find(|t| t.name == name)
    }

    pub fn table_mut(&mut self, name: &str) -> Option<&mut ShadowTable> {
        self.tables.iter_mut().find(|t| t.name == name)
    }

    pub fn enum_mut(&mut self, name: &str) -> Option<&mut ShadowEnum> {
        self.enums.iter_mut().find(|e| e.name == name)
    }

    pub fn upsert_table(&mut self, table: ShadowTable) {
        if let Some(existing) = self.tables.iter_mut().find(|t| t.name == table.name) {
            *existing = table;
        } else {
            self.tables.push(table);
        }
    }

    pub fn remove_table(&mut self, name: &str) {
        self.tables.retain(|t| t.name != name);
        self.indexes.retain(|i| i.table != name);
    }

    pub fn upsert_enum(&mut self, shadow_enum: ShadowEnum) {
        if let Some(existing) = self.enums.iter_mut().find(|e| e.name == shadow_enum.name) {
            *existing = shadow_enum;
        } else {
            self.enums.push(shadow_enum);
        }
    }

    pub fn remove_enum(&mut self, name: &str) {
        self.enums.retain(|e| e.name != name);
    }

    pub fn upsert_index(&mut self, index: ShadowIndex) {
        if let Some(existing) = self.indexes.iter_mut().find(|i| i.name == index.name) {
            *existing = index;
        } else {
            self.indexes.push(index);
        }
    }

    pub fn remove_index(&mut self, name: &str) {
        self.indexes.retain(|i| i.name != name);
    }

    /// Render the state back to schema source text.
    pub fn render(&self) -> String {
        let mut blocks = Vec::new();

        for shadow_enum in &self.enums {
            let mut block = format!("enum {} {{\n", shadow_enum.name);
            for value in &shadow_enum.values {
                block.push_str(&format!("  {}\n", value));
            }
            block.push('}');
            blocks.push(block);
        }

        for table in &self.tables {
            blocks.push(self.render_table(table));
        }

        blocks.join("\n\n")
    }

    fn render_table(&self, table: &ShadowTable) -> String {
        let mut lines = vec![format!("class {} {{", table.name)];
        let single_pk = table.primary_key.len() == 1;

        for column in &table.columns {
            let mut parts = vec![column.name.clone(), self.render_column_type(table, column)];

            if single_pk && table.primary_key[0] == column.name {
                parts.push("@primaryKey".to_string());
            }
            if self.column_is_unique(table, column) && !table.primary_key.contains(&column.name) {
                parts.push("@unique".to_string());
            }
            if let Some(default) = &column.default {
                parts.push(format!("@default({})", default));
            }

            lines.push(format!("  {}", parts.join(" ")));
        }

        for fk in &table.foreign_keys {
            lines.push(format!("  {}", self.render_relation_field(table, fk)));
        }

        if table.primary_key.len() > 1 {
            lines.push(format!("  @@primaryKey([{}])", table.primary_key.join(", ")));
        }
        for unique_set in &table.uniques {
            if unique_set.len() > 1 {
                lines.push(format!("  @@unique([{}])", unique_set.join(", ")));
            }
        }
        for index in &self.indexes {
            if index.table != table.name {
                continue;
            }
            if index.is_text {
                lines.push(format!("  @@textIndex([{}])", index.columns.join(", ")));
            } else if !self.index_is_system_generated(table, index) {
                lines.push(format!("  @@index([{}])", index.columns.join(", ")));
            }
        }
        for check in &table.checks {
            lines.push(format!("  @@check(\"{}\")", check));
        }

        lines.push("}".to_string());
        lines.join("\n")
    }

    fn render_column_type(&self, table: &ShadowTable, column: &ShadowColumn) -> String {
        let mut rendered = column.type_name.clone();
        if column.is_array {
            rendered.push_str("[]");
        }
        if !column.not_null && !table.primary_key.contains(&column.name) {
            rendered.push('?');
        }
        rendered
    }

    /// Inline-unique columns and single-column UNIQUE table constraints
    /// both render as a field-level `@unique`.
    fn column_is_unique(&self, table: &ShadowTable, column: &ShadowColumn) -> bool {
        if column.unique {
            return true;
        }
        table
            .uniques
            .iter()
            .any(|set| set.len() == 1 && set[0] == column.name)
    }

    /// `user User? @relation([userId], [User.id], onDelete: Cascade)`
    ///
    /// The field name comes from the `fk_<table>_<field>` constraint name
    /// when present, otherwise from the referenced table.
    fn render_relation_field(&self, table: &ShadowTable, fk: &ShadowForeignKey) -> String {
        let prefix = format!("fk_{}_", table.name.to_lowercase());
        let field_name = fk
            .name
            .as_deref()
            .and_then(|n| n.strip_prefix(&prefix))
            .filter(|suffix| !suffix.is_empty())
            .map(|suffix| suffix.to_string())
            .unwrap_or_else(|| fk.to_table.to_lowercase());

        let optional = fk.from.len() == 1
            && fk
                .from
                .first()
                .and_then(|c| table.column(c))
                .map(|c| !c.not_null)
                .unwrap_or(false);

        let mut rendered = format!(
            "{} {}{}",
            field_name,
            fk.to_table,
            if optional { "?" } else { "" }
        );

        let targets: Vec<String> = fk.to.iter().map(|f| format!("{}.{}", fk.to_table, f)).collect();
        let mut args = format!("[{}], [{}]", fk.from.join(", "), targets.join(", "));
        if fk.on_delete != ReferentialAction::NoAction {
            args.push_str(&format!(", onDelete: {}", fk.on_delete.name()));
        }
        if fk.on_update != ReferentialAction::NoAction {
            args.push_str(&format!(", onUpdate: {}", fk.on_update.name()));
        }

        rendered.push_str(&format!(" @relation({})", args));
        rendered
    }

    /// Primary-key, unique-backing, and FK-supporting indexes are not
    /// re-materialized as directives.
    fn index_is_system_generated(&self, table: &ShadowTable, index: &ShadowIndex) -> bool {
        if !table.primary_key.is_empty()
            && same_set(&index.columns, &table.primary_key)
        {
            return true;
        }
        for unique_set in &table.uniques {
            if same_set(&index.columns, unique_set) {
                return true;
            }
        }
        for column in &table.columns {
            if column.unique && index.columns.len() == 1 && index.columns[0] == column.name {
                return true;
            }
        }
        // FK-supporting indexes carry no `_index` suffix.
        let fk_prefix = format!("idx_{}_", table.name.to_lowercase());
        if index.name.starts_with(&fk_prefix)
            && !index.name.ends_with("_index")
            && !index.name.ends_with("_text_index")
        {
            return true;
        }
        false
    }
}

fn same_set(a: &[String], b: &[String]) -> bool {
    a.len() == b.len() && a.iter().all(|x| b.contains(x))
}
