//! Enum type diffing: drop, create, and value additions.
//!
//! Value renames and reorders are not supported; only values added to an
//! existing enum produce `ALTER TYPE ... ADD VALUE`.

use super::*;

impl MigrationEngine<'_> {
    pub(super) fn enum_statements(&self) -> Vec<Statement> {
        let mut statements = Vec::new();

        for name in self.from.enums.keys() {
            if !self.to.enums.contains_key(name) {
                statements.push(Statement::new(
                    format!("DROP TYPE IF EXISTS {} CASCADE", quote_ident(name)),
                    StatementKind::EnumDrop,
                    PRIORITY_ENUM_DROP,
                ));
            }
        }

        for (name, def) in &self.to.enums {
            match self.from.enums.get(name) {
                None => {
                    let values: Vec<String> = def
                        .values
                        .iter()
                        .map(|v| format!("'{}'", v.name))
                        .collect();
                    statements.push(Statement::new(
                        format!(
                            "CREATE TYPE {} AS ENUM ({})",
                            quote_ident(name),
                            values.join(",")
                        ),
                        StatementKind::EnumCreate,
                        PRIORITY_ENUM_CREATE,
                    ));
                }
                Some(old) => {
                    for value in &def.values {
                        if !old.has_value(&value.name) {
                            statements.push(Statement::new(
                                format!(
                                    "ALTER TYPE {} ADD VALUE '{}'",
                                    quote_ident(name),
                                    value.name
                                ),
                                StatementKind::EnumAlter,
                                PRIORITY_ENUM_ALTER,
                            ));
                        }
                    }
                }
            }
        }

        statements
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::model;
    use super::*;
    use crate::ast::SchemaAst;

    #[test]
    fn test_enum_create() {
        let new = model("enum Role { USER ADMIN }\n\nclass U {\nid Int @primaryKey\nrole Role\n}");
        let sql = diff(&SchemaAst::default(), &new).unwrap();
        assert!(sql.contains("CREATE TYPE \"Role\" AS ENUM ('USER','ADMIN')"));
    }

    #[test]
    fn test_enum_drop_cascades() {
        let old = model("enum Role { USER }\n\nclass U {\nid Int @primaryKey\nrole Role\n}");
        let new = model("class U {\nid Int @primaryKey\n}");
        let sql = diff(&old, &new).unwrap();
        assert!(sql.contains("DROP TYPE IF EXISTS \"Role\" CASCADE"));
    }

    #[test]
    fn test_enum_value_added() {
        let old = model("enum Role { USER }\n\nclass U {\nid Int @primaryKey\nrole Role\n}");
        let new = model("enum Role { USER ADMIN }\n\nclass U {\nid Int @primaryKey\nrole Role\n}");
        let sql = diff(&old, &new).unwrap();
        assert!(sql.contains("ALTER TYPE \"Role\" ADD VALUE 'ADMIN'"));
        assert!(!sql.contains("CREATE TYPE"));
    }
}
