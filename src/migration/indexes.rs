//! Index diffing: BTree indexes for `@@index`, trigram GIN indexes for
//! `@@textIndex`.

use super::*;
use crate::ast::ClassDirective;

impl MigrationEngine<'_> {
    pub(super) fn index_statements(&self) -> Vec<Statement> {
        let mut statements = Vec::new();

        // Indexes on dropped tables die with the table's CASCADE.
        for old_class in &self.from.classes {
            let Some(new_class) = self.to.class_by_name(&old_class.name) else {
                continue;
            };
            for directive in &old_class.directives {
                if let Some((fields, text_index)) = index_directive(directive) {
                    if !class_has_index_on(new_class, fields, text_index) {
                        statements.push(Statement::new(
                            format!(
                                "DROP INDEX IF EXISTS {}",
                                index_sql_name(&old_class.name, fields, text_index)
                            ),
                            StatementKind::IndexDrop,
                            PRIORITY_INDEX_DROP,
                        ));
                    }
                }
            }
        }

        for new_class in &self.to.classes {
            let old_class = self.from.class_by_name(&new_class.name);
            for directive in &new_class.directives {
                if let Some((fields, text_index)) = index_directive(directive) {
                    let already_present = old_class
                        .map(|old| class_has_index_on(old, fields, text_index))
                        .unwrap_or(false);
                    if !already_present {
                        statements.push(Statement::new(
                            create_index_sql(&new_class.name, fields, text_index),
                            StatementKind::IndexCreate,
                            PRIORITY_INDEX_CREATE,
                        ));
                    }
                }
            }
        }

        statements
    }
}

fn index_directive(directive: &ClassDirective) -> Option<(&Vec<String>, bool)> {
    match directive {
        ClassDirective::Index { fields, .. } => Some((fields, false)),
        ClassDirective::TextIndex { fields, .. } => Some((fields, true)),
        _ => None,
    }
}

/// Text indexes concatenate their columns with `' '` under trigram ops.
fn create_index_sql(class_name: &str, fields: &[String], text_index: bool) -> String {
    let index_name = index_sql_name(class_name, fields, text_index);
    let table = quote_ident(class_name);

    if text_index {
        let concatenated = fields
            .iter()
            .map(|f| quote_ident(f))
            .collect::<Vec<_>>()
            .join(" || ' ' || ");
        format!(
            "CREATE INDEX {} ON {} USING gin (({}) gin_trgm_ops)",
            index_name, table, concatenated
        )
    } else {
        format!(
            "CREATE INDEX {} ON {} ({})",
            index_name,
            table,
            quote_idents(fields)
        )
    }
}
