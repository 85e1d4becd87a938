//! Foreign-key constraints and their supporting indexes.
//!
//! Every relation-bearing field of the new model emits an
//! `ADD CONSTRAINT fk_<table>_<field>`; a plain index on the FK columns is
//! added alongside unless the primary key, a field-level unique, or a
//! `@@unique` set already guarantees one.

use super::*;

impl MigrationEngine<'_> {
    pub(super) fn constraint_statements(&self) -> Vec<Statement> {
        let mut statements = Vec::new();

        for class in &self.to.classes {
            for field in &class.fields {
                let Some(relation) = &field.relation else { continue };

                let fk_name = format!(
                    "fk_{}_{}",
                    class.name.to_lowercase(),
                    field.name.to_lowercase()
                );

                let mut clauses = vec![
                    format!("FOREIGN KEY ({})", quote_idents(&relation.from)),
                    format!(
                        "REFERENCES {} ({})",
                        quote_ident(&relation.to_class),
                        quote_idents(&relation.to)
                    ),
                ];
                if relation.on_delete != crate::constants::ReferentialAction::NoAction {
                    clauses.push(format!("ON DELETE {}", relation.on_delete.sql()));
                }
                if relation.on_update != crate::constants::ReferentialAction::NoAction {
                    clauses.push(format!("ON UPDATE {}", relation.on_update.sql()));
                }

                statements.push(Statement::new(
                    format!(
                        "ALTER TABLE {} ADD CONSTRAINT {} {}",
                        quote_ident(&class.name),
                        fk_name,
                        clauses.join(" ")
                    ),
                    StatementKind::ConstraintAdd,
                    PRIORITY_CONSTRAINT,
                ));

                if fk_needs_index(class, &relation.from) {
                    let index_name = format!(
                        "idx_{}_{}",
                        class.name.to_lowercase(),
                        relation.from.join("_").to_lowercase()
                    );
                    statements.push(Statement::new(
                        format!(
                            "CREATE INDEX {} ON {} ({})",
                            index_name,
                            quote_ident(&class.name),
                            quote_idents(&relation.from)
                        ),
                        StatementKind::FkIndexCreate,
                        PRIORITY_CONSTRAINT,
                    ));
                }
            }
        }

        statements
    }
}

/// A supporting index is skipped when the FK columns are exactly the
/// primary key, a single field-level unique column, or a `@@unique` set.
fn fk_needs_index(class: &ClassDef, fk_columns: &[String]) -> bool {
    let pk = class.primary_key_fields();
    if !pk.is_empty() && same_field_set(fk_columns, &pk) {
        return false;
    }

    if fk_columns.len() == 1 {
        if let Some(column_field) = class.find_field(&fk_columns[0]) {
            if column_field.is_unique {
                return false;
            }
        }
    }

    for unique_set in class.unique_sets() {
        if same_field_set(fk_columns, unique_set) {
            return false;
        }
    }

    true
}

#[cfg(test)]
mod tests {
    use super::super::tests::model;
    use super::*;
    use crate::ast::SchemaAst;

    fn order_schema(extra: &str) -> String {
        format!(
            r#"
class User {{
  id Int @primaryKey
  orders Order[]
}}

class Order {{
  id Int @primaryKey
  userId Int{}
  user User @relation([userId], [User.id], onDelete: Cascade)
}}
"#,
            extra
        )
    }

    #[test]
    fn test_fk_constraint_emitted() {
        let ast = model(&order_schema(""));
        let sql = diff(&SchemaAst::default(), &ast).unwrap();
        assert!(sql.contains(
            "ALTER TABLE \"Order\" ADD CONSTRAINT fk_order_user FOREIGN KEY (\"userId\") \
             REFERENCES \"User\" (\"id\") ON DELETE CASCADE"
        ));
    }

    #[test]
    fn test_fk_supporting_index_emitted() {
        let ast = model(&order_schema(""));
        let sql = diff(&SchemaAst::default(), &ast).unwrap();
        assert!(sql.contains("CREATE INDEX idx_order_userid ON \"Order\" (\"userId\")"));
    }

    #[test]
    fn test_fk_index_skipped_for_unique_column() {
        let ast = model(&order_schema(" @unique"));
        let sql = diff(&SchemaAst::default(), &ast).unwrap();
        assert!(!sql.contains("idx_order_userid"));
    }

    #[test]
    fn test_fk_index_skipped_when_columns_are_pk() {
        let ast = model(
            r#"
class User {
  id Int @primaryKey
  profile Profile?
}

class Profile {
  userId Int @primaryKey
  user User @relation([userId], [User.id])
}
"#,
        );
        let sql = diff(&SchemaAst::default(), &ast).unwrap();
        assert!(!sql.contains("CREATE INDEX idx_profile_userid"));
    }

    #[test]
    fn test_fk_index_skipped_for_class_unique_set() {
        let ast = model(
            r#"
class Team {
  id Int @primaryKey
  memberships Membership[]
}

class Membership {
  id Int @primaryKey
  teamId Int
  seat Int
  team Team @relation([teamId], [Team.id])
  @@unique([teamId])
}
"#,
        );
        let sql = diff(&SchemaAst::default(), &ast).unwrap();
        assert!(!sql.contains("CREATE INDEX idx_membership_teamid"));
    }

    #[test]
    fn test_fk_statements_reemitted_for_unchanged_model() {
        let ast = model(&order_schema(""));
        let sql = diff(&ast, &ast).unwrap();
        assert!(sql.contains("ADD CONSTRAINT fk_order_user"));
    }
}
