//! End-to-end scenarios over literal schema inputs.

use blaze::ast::SchemaAst;
use blaze::error::ErrorKind;
use blaze::migration::diff;
use blaze::validation::{validate, validate_all};

fn model(source: &str) -> SchemaAst {
    let mut ast = SchemaAst::from_source(source).unwrap();
    validate(&mut ast).unwrap();
    ast
}

#[test]
fn test_single_enum_schema() {
    let ast = model("enum Role { USER ADMIN }");
    assert_eq!(ast.enums.len(), 1);
    assert!(ast.classes.is_empty());

    let role = ast.enum_by_name("Role").unwrap();
    assert_eq!(role.values[0].name, "USER");
    assert_eq!(role.values[0].ordinal, 1);
    assert_eq!(role.values[1].name, "ADMIN");
    assert_eq!(role.values[1].ordinal, 2);
}

#[test]
fn test_user_table_emission() {
    let ast = model(
        r#"
class User {
  id String @primaryKey @default(uuid())
  name String @unique
  email String?
}
"#,
    );
    let sql = diff(&SchemaAst::default(), &ast).unwrap();

    assert!(sql.starts_with("CREATE EXTENSION IF NOT EXISTS pgcrypto;"));
    assert!(sql.contains(
        "CREATE TABLE \"User\" ( \
         \"id\" TEXT NOT NULL DEFAULT gen_random_uuid(), \
         \"name\" TEXT NOT NULL, \
         \"email\" TEXT, \
         PRIMARY KEY (\"id\"), \
         UNIQUE (\"name\") )"
    ));
}

#[test]
fn test_adding_enum_column_to_existing_table() {
    let old = model(
        r#"
class User {
  id String @primaryKey @default(uuid())
  name String @unique
  email String?
}
"#,
    );
    let new = model(
        r#"
enum Role { USER ADMIN }

class User {
  id String @primaryKey @default(uuid())
  name String @unique
  email String?
  role Role @default(USER)
}
"#,
    );
    let sql = diff(&old, &new).unwrap();

    let create_type = sql
        .find("CREATE TYPE \"Role\" AS ENUM ('USER','ADMIN')")
        .expect("enum creation missing");
    let add_column = sql
        .find("ALTER TABLE \"User\" ADD COLUMN \"role\" \"Role\" NOT NULL DEFAULT 'USER'")
        .expect("column addition missing");
    assert!(create_type < add_column);
    assert!(!sql.contains("CREATE TABLE"));
}

#[test]
fn test_required_cycle_rejected() {
    let mut ast = SchemaAst::from_source(
        r#"
class A {
  id Int @primaryKey
  bId Int @unique
  b B @relation([bId], [B.id])
}

class B {
  id Int @primaryKey
  aId Int @unique
  a A @relation([aId], [A.id])
}
"#,
    )
    .unwrap();
    let errors = validate_all(&mut ast);
    assert!(errors.iter().any(|e| e.kind == ErrorKind::CircularDependency));
}

#[test]
fn test_set_null_requires_optional_source() {
    let err = SchemaAst::from_source(
        r#"
class User {
  id Int @primaryKey
}

class Order {
  id Int @primaryKey
  userId Int
  user User @relation([userId], [User.id], onDelete: SetNull)
}
"#,
    )
    .unwrap_err();
    assert_eq!(err.kind, ErrorKind::RequiresOptional);
}

#[test]
fn test_text_index_emission() {
    let ast = model(
        r#"
class Article {
  id Int @primaryKey
  title String
  body String
  @@textIndex([title, body])
}
"#,
    );
    let sql = diff(&SchemaAst::default(), &ast).unwrap();

    assert!(sql.starts_with("CREATE EXTENSION IF NOT EXISTS pg_trgm;"));
    assert!(sql.contains(
        "CREATE INDEX idx_article_title_body_text_index ON \"Article\" \
         USING gin ((\"title\" || ' ' || \"body\") gin_trgm_ops)"
    ));
}

#[test]
fn test_statements_separated_by_blank_lines() {
    let ast = model(
        "enum Role { USER }\n\nclass User {\n  id Int @primaryKey\n  role Role\n}",
    );
    let sql = diff(&SchemaAst::default(), &ast).unwrap();
    assert!(sql.ends_with(";"));
    assert!(sql.contains(";\n\n"));
    // Priority 3 (enum) strictly precedes priority 6 (table).
    assert!(sql.find("CREATE TYPE").unwrap() < sql.find("CREATE TABLE").unwrap());
}
