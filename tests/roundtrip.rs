//! Round-trip laws: a model survives translation to SQL and back, whether
//! the SQL is replayed through the reverse parser or reported back through
//! the catalog introspector.

use blaze::ast::SchemaAst;
use blaze::introspect::{
    introspect, CatalogSource, ColumnRow, ConstraintRow, EnumRow, ForeignKeyRow, IndexRow,
};
use blaze::migration::diff;
use blaze::shadow::apply_migration;
use blaze::validation::validate;
use std::error::Error;

fn model(source: &str) -> SchemaAst {
    let mut ast = SchemaAst::from_source(source).unwrap();
    validate(&mut ast).unwrap();
    ast
}

const FULL_SCHEMA: &str = r#"
enum Role { USER ADMIN }

class Org {
  id Int @primaryKey @default(autoincrement())
  slug String @unique
}

class User {
  id String @primaryKey @default(uuid())
  role Role @default(USER)
  age Int?
  born Date @default("1990-01-02")
  createdAt Timestamp @default(now())
  orgId Int?
  org Org? @relation([orgId], [Org.id], onDelete: SetNull)
  @@index([age])
}

class Doc {
  key String
  version Int
  title String
  body String
  @@primaryKey([key, version])
  @@textIndex([title, body])
  @@check("version > 0")
}
"#;

#[test]
fn test_parse_emit_roundtrip() {
    let original = model(FULL_SCHEMA);
    let sql = diff(&SchemaAst::default(), &original).unwrap();

    let reconstructed = apply_migration(&SchemaAst::default(), &sql).unwrap();
    assert_eq!(original, reconstructed);
}

#[test]
fn test_replay_chain_matches_final_model() {
    let step1 = model("class User {\n  id Int @primaryKey\n}");
    let step2 = model("class User {\n  id Int @primaryKey\n  email String?\n}");
    let step3 = model(
        "enum Role { USER ADMIN }\n\nclass User {\n  id Int @primaryKey\n  email String?\n  role Role @default(USER)\n}",
    );

    let d1 = diff(&SchemaAst::default(), &step1).unwrap();
    let d2 = diff(&step1, &step2).unwrap();
    let d3 = diff(&step2, &step3).unwrap();

    let mut current = SchemaAst::default();
    for migration_sql in [&d1, &d2, &d3] {
        current = apply_migration(&current, migration_sql).unwrap();
    }
    assert_eq!(current, step3);
}

#[test]
fn test_replay_handles_drops() {
    let step1 = model(
        "enum Role { USER }\n\nclass User {\n  id Int @primaryKey\n  role Role\n}\n\nclass Temp {\n  id Int @primaryKey\n}",
    );
    let step2 = model("class User {\n  id Int @primaryKey\n}");

    let d1 = diff(&SchemaAst::default(), &step1).unwrap();
    let d2 = diff(&step1, &step2).unwrap();

    let mut current = SchemaAst::default();
    current = apply_migration(&current, &d1).unwrap();
    current = apply_migration(&current, &d2).unwrap();
    assert_eq!(current, step2);
}

/// Simulates what the database catalog reports after `diff(empty, M)` for
/// `FULL_SCHEMA` has been applied.
struct SyntheticCatalog;

fn col(name: &str, udt: &str, nullable: bool, default: Option<&str>, ordinal: i16) -> ColumnRow {
    ColumnRow {
        column_name: name.to_string(),
        udt_name: udt.to_string(),
        is_nullable: if nullable { "YES" } else { "NO" }.to_string(),
        column_default: default.map(str::to_string),
        ordinal_position: ordinal,
    }
}

fn constraint(kind: &str, column: &str, name: &str) -> ConstraintRow {
    ConstraintRow {
        constraint_type: kind.to_string(),
        column_name: column.to_string(),
        constraint_name: name.to_string(),
    }
}

fn index(name: &str, unique: bool, primary: bool, columns: &str) -> IndexRow {
    IndexRow {
        index_name: name.to_string(),
        is_unique: unique,
        is_primary: primary,
        columns: columns.to_string(),
    }
}

impl CatalogSource for SyntheticCatalog {
    fn enums(&mut self) -> Result<Vec<EnumRow>, Box<dyn Error>> {
        Ok(vec![
            EnumRow {
                enum_name: "Role".into(),
                enum_value: "USER".into(),
                sort_order: 1,
            },
            EnumRow {
                enum_name: "Role".into(),
                enum_value: "ADMIN".into(),
                sort_order: 2,
            },
        ])
    }

    fn tables(&mut self) -> Result<Vec<String>, Box<dyn Error>> {
        Ok(vec!["Org".into(), "User".into(), "Doc".into()])
    }

    fn columns(&mut self, table: &str) -> Result<Vec<ColumnRow>, Box<dyn Error>> {
        Ok(match table {
            "Org" => vec![
                col("id", "int4", false, Some("nextval('\"Org_id_seq\"'::regclass)"), 1),
                col("slug", "text", false, None, 2),
            ],
            "User" => vec![
                col("id", "text", false, Some("gen_random_uuid()"), 1),
                col("role", "Role", false, Some("'USER'::\"Role\""), 2),
                col("age", "int4", true, None, 3),
                col("born", "date", false, Some("'1990-01-02'::date"), 4),
                col("createdAt", "timestamp", false, Some("CURRENT_TIMESTAMP"), 5),
                col("orgId", "int4", true, None, 6),
            ],
            "Doc" => vec![
                col("key", "text", false, None, 1),
                col("version", "int4", false, None, 2),
                col("title", "text", false, None, 3),
                col("body", "text", false, None, 4),
            ],
            _ => vec![],
        })
    }

    fn constraints(&mut self, table: &str) -> Result<Vec<ConstraintRow>, Box<dyn Error>> {
        Ok(match table {
            "Org" => vec![
                constraint("PRIMARY KEY", "id", "Org_pkey"),
                constraint("UNIQUE", "slug", "Org_slug_key"),
            ],
            "User" => vec![constraint("PRIMARY KEY", "id", "User_pkey")],
            "Doc" => vec![
                constraint("PRIMARY KEY", "key", "Doc_pkey"),
                constraint("PRIMARY KEY", "version", "Doc_pkey"),
            ],
            _ => vec![],
        })
    }

    fn indexes(&mut self, table: &str) -> Result<Vec<IndexRow>, Box<dyn Error>> {
        Ok(match table {
            "Org" => vec![
                index("Org_pkey", true, true, "id"),
                index("Org_slug_key", true, false, "slug"),
            ],
            "User" => vec![
                index("User_pkey", true, true, "id"),
                index("idx_user_age_index", false, false, "age"),
                index("idx_user_orgid", false, false, "orgId"),
            ],
            "Doc" => vec![
                index("Doc_pkey", true, true, "key,version"),
                index("idx_doc_title_body_text_index", false, false, "title,body"),
            ],
            _ => vec![],
        })
    }

    fn foreign_keys(&mut self, table: &str) -> Result<Vec<ForeignKeyRow>, Box<dyn Error>> {
        Ok(match table {
            "User" => vec![ForeignKeyRow {
                fk_column: "orgId".into(),
                referenced_table: "Org".into(),
                referenced_column: "id".into(),
                update_rule: "NO ACTION".into(),
                delete_rule: "SET NULL".into(),
                constraint_name: "fk_user_org".into(),
            }],
            _ => vec![],
        })
    }
}

#[test]
fn test_introspect_emit_roundtrip() {
    let original = model(FULL_SCHEMA);
    let introspected = introspect(&mut SyntheticCatalog).unwrap();
    assert_eq!(original, introspected);
}

#[test]
fn test_emission_is_deterministic() {
    let original = model(FULL_SCHEMA);
    let first = diff(&SchemaAst::default(), &original).unwrap();
    let second = diff(&SchemaAst::default(), &original).unwrap();
    assert_eq!(first, second);
}
