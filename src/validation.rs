//! Cross-entity schema validation.
//!
//! Runs after assembly and batches every failure instead of stopping at the
//! first. The validator is also the only code that mutates a model after
//! parsing: it assigns generated relation names and index pseudo-names,
//! which are pure functions of the constituent class and field names.

use std::collections::{HashMap, HashSet};

use crate::ast::{ClassDirective, SchemaAst};
use crate::constants::ScalarType;
use crate::error::{join_errors, ErrorKind, SchemaError};

/// Validate a schema, returning a single joined error on failure.
pub fn validate(ast: &mut SchemaAst) -> Result<(), SchemaError> {
    let errors = validate_all(ast);
    if errors.is_empty() {
        Ok(())
    } else {
        Err(join_errors(&errors))
    }
}

/// Validate a schema, returning every failure found.
pub fn validate_all(ast: &mut SchemaAst) -> Vec<SchemaError> {
    let mut validator = SchemaValidator::new();
    validator.assign_generated_names(ast);
    validator.check_unique_names(ast);
    validator.check_name_conflicts(ast);
    validator.check_field_types(ast);
    validator.check_primary_keys(ast);
    validator.check_foreign_key_uniqueness(ast);
    validator.check_back_references(ast);
    validator.check_required_cycles(ast);
    validator.errors
}

struct SchemaValidator {
    errors: Vec<SchemaError>,
}

impl SchemaValidator {
    fn new() -> Self {
        SchemaValidator { errors: Vec::new() }
    }

    fn add(&mut self, kind: ErrorKind, message: String, location: String) {
        self.errors.push(SchemaError::located(kind, message, location));
    }

    /// Assign generated relation names and index pseudo-names.
    fn assign_generated_names(&mut self, ast: &mut SchemaAst) {
        for i in 0..ast.classes.len() {
            let class_name = ast.classes[i].name.clone();

            for field in &mut ast.classes[i].fields {
                if let Some(relation) = &mut field.relation {
                    if relation.name.is_none() {
                        relation.name = Some(generate_relation_name(
                            &class_name,
                            &relation.from,
                            &relation.to_class,
                            &relation.to,
                        ));
                    }
                }
            }

            for directive in &mut ast.classes[i].directives {
                match directive {
                    ClassDirective::Index { fields, pseudo_name }
                    | ClassDirective::TextIndex { fields, pseudo_name } => {
                        if pseudo_name.is_none() {
                            *pseudo_name = Some(generate_index_name(&class_name, fields));
                        }
                    }
                    _ => {}
                }
            }
        }
    }

    fn check_unique_names(&mut self, ast: &SchemaAst) {
        let mut class_positions: HashMap<&str, usize> = HashMap::new();
        for class in &ast.classes {
            if let Some(&existing) = class_positions.get(class.name.as_str()) {
                self.add(
                    ErrorKind::DuplicateClass,
                    format!(
                        "duplicate class name '{}' (conflicts with class at position {})",
                        class.name, existing
                    ),
                    format!("class '{}'", class.name),
                );
            } else {
                class_positions.insert(&class.name, class.position);
            }
        }

        for class in &ast.classes {
            let mut field_positions: HashMap<&str, usize> = HashMap::new();
            for field in &class.fields {
                if let Some(&existing) = field_positions.get(field.name.as_str()) {
                    self.add(
                        ErrorKind::DuplicateField,
                        format!(
                            "duplicate field name '{}' (conflicts with field at position {})",
                            field.name, existing
                        ),
                        format!("class '{}', field '{}'", class.name, field.name),
                    );
                } else {
                    field_positions.insert(&field.name, field.position);
                }
            }
        }
    }

    fn check_name_conflicts(&mut self, ast: &SchemaAst) {
        for class in &ast.classes {
            if ast.enums.contains_key(&class.name) {
                self.add(
                    ErrorKind::NameConflict,
                    format!("class name '{}' conflicts with an enum name", class.name),
                    format!("class '{}'", class.name),
                );
            }
        }
    }

    fn check_field_types(&mut self, ast: &SchemaAst) {
        for class in &ast.classes {
            for field in &class.fields {
                let base = field.data_type.as_str();
                if ScalarType::parse(base).is_some()
                    || ast.enums.contains_key(base)
                    || ast.class_by_name(base).is_some()
                {
                    continue;
                }
                self.add(
                    ErrorKind::TypeUnknown,
                    format!("unknown type '{}' for field '{}'", base, field.name),
                    format!("class '{}', field '{}'", class.name, field.name),
                );
            }
        }
    }

    fn check_primary_keys(&mut self, ast: &SchemaAst) {
        for class in &ast.classes {
            let location = format!("class '{}'", class.name);
            let field_pk_count = class.fields.iter().filter(|f| f.is_primary_key).count();
            let class_pk = class.class_primary_key();

            if field_pk_count > 1 {
                self.add(
                    ErrorKind::MultipleFieldPk,
                    format!("class '{}' has multiple field-level primary keys", class.name),
                    location.clone(),
                );
            }
            if field_pk_count > 0 && class_pk.is_some() {
                self.add(
                    ErrorKind::ConflictingPk,
                    format!(
                        "class '{}' has both field-level and class-level primary keys",
                        class.name
                    ),
                    location.clone(),
                );
            }
            if field_pk_count == 0 && class_pk.is_none() {
                self.add(
                    ErrorKind::MissingPk,
                    format!("class '{}' must have a primary key", class.name),
                    location.clone(),
                );
            }

            if let Some(pk_fields) = class_pk {
                for field_name in pk_fields {
                    match class.find_field(field_name) {
                        None => self.add(
                            ErrorKind::InvalidPkField,
                            format!("primary key references non-existent field '{}'", field_name),
                            location.clone(),
                        ),
                        Some(field) => {
                            if field.is_optional {
                                self.add(
                                    ErrorKind::OptionalPkField,
                                    format!("primary key field '{}' cannot be optional", field_name),
                                    format!("class '{}', field '{}'", class.name, field_name),
                                );
                            }
                            if field.is_array {
                                self.add(
                                    ErrorKind::ArrayPkField,
                                    format!("primary key field '{}' cannot be an array", field_name),
                                    format!("class '{}', field '{}'", class.name, field_name),
                                );
                            }
                        }
                    }
                }
            }
        }
    }

    /// Every relation's target field set must be covered by a uniqueness
    /// guarantee on the target class: a single `@primaryKey`/`@unique`
    /// field, the whole `@@primaryKey` set, or a whole `@@unique` set.
    /// A plain index never qualifies.
    fn check_foreign_key_uniqueness(&mut self, ast: &SchemaAst) {
        for class in &ast.classes {
            for field in &class.fields {
                let Some(relation) = &field.relation else { continue };
                let location = format!("class '{}', field '{}'", class.name, field.name);

                let Some(target) = ast.class_by_name(&relation.to_class) else {
                    self.add(
                        ErrorKind::TypeUnknown,
                        format!(
                            "field '{}' references non-existent class '{}'",
                            field.name, relation.to_class
                        ),
                        location,
                    );
                    continue;
                };

                let referenced: HashSet<&str> =
                    relation.to.iter().map(|s| s.as_str()).collect();

                if referenced.len() == 1 {
                    let name = relation.to[0].as_str();
                    if let Some(target_field) = target.find_field(name) {
                        if target_field.is_primary_key || target_field.is_unique {
                            continue;
                        }
                    }
                }

                let class_pk: Option<HashSet<&str>> = target
                    .class_primary_key()
                    .map(|fields| fields.iter().map(|s| s.as_str()).collect());
                if class_pk.is_some_and(|pk| pk == referenced) {
                    continue;
                }

                let covered_by_unique = target
                    .unique_sets()
                    .any(|set| set.iter().map(|s| s.as_str()).collect::<HashSet<_>>() == referenced);
                if covered_by_unique {
                    continue;
                }

                let mut fields: Vec<&str> = referenced.into_iter().collect();
                fields.sort_unstable();
                self.add(
                    ErrorKind::NonUniqueReference,
                    format!(
                        "foreign key references fields [{}] of class '{}' without a matching unique constraint",
                        fields.join(", "),
                        relation.to_class
                    ),
                    location,
                );
            }
        }
    }

    /// A back-reference must be paired with at least one foreign-key field
    /// on the target class that points back here.
    fn check_back_references(&mut self, ast: &SchemaAst) {
        for class in &ast.classes {
            for field in &class.fields {
                if !field.is_back_reference() {
                    continue;
                }
                let Some(target) = ast.class_by_name(&field.data_type) else {
                    continue;
                };

                let paired = target
                    .fields
                    .iter()
                    .any(|tf| tf.is_foreign_key() && tf.data_type == class.name);

                if !paired {
                    self.add(
                        ErrorKind::MissingForeignKey,
                        format!(
                            "back reference '{}' has no corresponding foreign key in class '{}'",
                            field.name, field.data_type
                        ),
                        format!("class '{}', field '{}'", class.name, field.name),
                    );
                }
            }
        }
    }

    /// Two classes may not require each other through non-optional relation
    /// fields; an optional side breaks the cycle.
    fn check_required_cycles(&mut self, ast: &SchemaAst) {
        for class in &ast.classes {
            for field in &class.fields {
                if field.relation.is_none() || field.is_optional {
                    continue;
                }
                let Some(target) = ast.class_by_name(&field.data_type) else {
                    continue;
                };

                let cycles_back = target.fields.iter().any(|tf| {
                    tf.is_foreign_key() && tf.data_type == class.name && !tf.is_optional
                });

                if cycles_back {
                    self.add(
                        ErrorKind::CircularDependency,
                        format!(
                            "circular required dependency between '{}' and '{}'",
                            class.name, field.data_type
                        ),
                        format!("class '{}', field '{}'", class.name, field.name),
                    );
                }
            }
        }
    }
}

/// `_relation_<FromClass>_<from...>_<ToClass>_<to...>`
pub fn generate_relation_name(
    from_class: &str,
    from: &[String],
    to_class: &str,
    to: &[String],
) -> String {
    let mut parts: Vec<&str> = Vec::with_capacity(2 + from.len() + to.len());
    parts.push(from_class);
    parts.extend(from.iter().map(|s| s.as_str()));
    parts.push(to_class);
    parts.extend(to.iter().map(|s| s.as_str()));
    format!("_relation_{}", parts.join("_"))
}

/// `_idx_<Class>_<field...>`
pub fn generate_index_name(class_name: &str, fields: &[String]) -> String {
    let mut parts: Vec<&str> = Vec::with_capacity(1 + fields.len());
    parts.push(class_name);
    parts.extend(fields.iter().map(|s| s.as_str()));
    format!("_idx_{}", parts.join("_"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::SchemaAst;

    fn build(source: &str) -> SchemaAst {
        SchemaAst::from_source(source).unwrap()
    }

    #[test]
    fn test_valid_schema_passes() {
        let mut ast = build(
            r#"
class User {
  id Int @primaryKey
  posts Post[]
}

class Post {
  id Int @primaryKey
  authorId Int
  author User @relation([authorId], [User.id])
}
"#,
        );
        assert!(validate(&mut ast).is_ok());
    }

    #[test]
    fn test_relation_names_generated() {
        let mut ast = build(
            r#"
class User {
  id Int @primaryKey
  posts Post[]
}

class Post {
  id Int @primaryKey
  authorId Int
  author User @relation([authorId], [User.id])
}
"#,
        );
        validate(&mut ast).unwrap();
        let post = ast.class_by_name("Post").unwrap();
        let relation = post.find_field("author").unwrap().relation.as_ref().unwrap();
        assert_eq!(
            relation.name.as_deref(),
            Some("_relation_Post_authorId_User_id")
        );
    }

    #[test]
    fn test_explicit_relation_name_kept() {
        let mut ast = build(
            r#"
class User {
  id Int @primaryKey
  posts Post[]
}

class Post {
  id Int @primaryKey
  authorId Int
  author User @relation([authorId], [User.id], name: authored)
}
"#,
        );
        validate(&mut ast).unwrap();
        let post = ast.class_by_name("Post").unwrap();
        let relation = post.find_field("author").unwrap().relation.as_ref().unwrap();
        assert_eq!(relation.name.as_deref(), Some("authored"));
    }

    #[test]
    fn test_index_pseudo_names_generated() {
        let mut ast = build(
            "class Doc {\nid Int @primaryKey\ntitle String\nbody String\n@@index([title])\n@@textIndex([title, body])\n}",
        );
        validate(&mut ast).unwrap();
        let doc = ast.class_by_name("Doc").unwrap();
        let names: Vec<Option<&str>> = doc
            .directives
            .iter()
            .filter_map(|d| match d {
                ClassDirective::Index { pseudo_name, .. }
                | ClassDirective::TextIndex { pseudo_name, .. } => {
                    Some(pseudo_name.as_deref())
                }
                _ => None,
            })
            .collect();
        assert_eq!(names, vec![Some("_idx_Doc_title"), Some("_idx_Doc_title_body")]);
    }

    #[test]
    fn test_duplicate_class_detected() {
        let mut ast = build("class A { id Int @primaryKey }");
        let copy = ast.classes[0].clone();
        ast.classes.push(copy);
        let errors = validate_all(&mut ast);
        assert!(errors.iter().any(|e| e.kind == ErrorKind::DuplicateClass));
    }

    #[test]
    fn test_class_enum_name_conflict() {
        let mut ast = build("enum Tag { A B }\nclass Tag { id Int @primaryKey }");
        let errors = validate_all(&mut ast);
        assert!(errors.iter().any(|e| e.kind == ErrorKind::NameConflict));
    }

    #[test]
    fn test_unknown_field_type() {
        let mut ast = build("class A {\nid Int @primaryKey\nwidget Widget\n}");
        let errors = validate_all(&mut ast);
        // Both the unresolved type and the unpaired back-reference surface.
        assert!(errors.iter().any(|e| e.kind == ErrorKind::TypeUnknown));
    }

    #[test]
    fn test_non_unique_reference() {
        let mut ast = build(
            r#"
class User {
  id Int @primaryKey
  age Int
  orders Order[]
}

class Order {
  id Int @primaryKey
  userAge Int
  user User @relation([userAge], [User.age])
}
"#,
        );
        let errors = validate_all(&mut ast);
        assert!(errors.iter().any(|e| e.kind == ErrorKind::NonUniqueReference));
    }

    #[test]
    fn test_composite_reference_against_class_unique() {
        let mut ast = build(
            r#"
class Team {
  id Int @primaryKey
  orgId Int
  slug String
  members Member[]
  @@unique([orgId, slug])
}

class Member {
  id Int @primaryKey
  teamOrg Int
  teamSlug String
  team Team @relation([teamOrg, teamSlug], [Team.orgId, Team.slug])
}
"#,
        );
        assert!(validate(&mut ast).is_ok());
    }

    #[test]
    fn test_plain_index_does_not_satisfy_uniqueness() {
        let mut ast = build(
            r#"
class User {
  id Int @primaryKey
  email String
  orders Order[]
  @@index([email])
}

class Order {
  id Int @primaryKey
  userEmail String
  user User @relation([userEmail], [User.email])
}
"#,
        );
        let errors = validate_all(&mut ast);
        assert!(errors.iter().any(|e| e.kind == ErrorKind::NonUniqueReference));
    }

    #[test]
    fn test_missing_back_reference_pair() {
        let mut ast = build(
            r#"
class User {
  id Int @primaryKey
  orders Order[]
}

class Order {
  id Int @primaryKey
}
"#,
        );
        let errors = validate_all(&mut ast);
        assert!(errors.iter().any(|e| e.kind == ErrorKind::MissingForeignKey));
    }

    #[test]
    fn test_required_cycle_detected() {
        let mut ast = build(
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
        );
        let errors = validate_all(&mut ast);
        assert!(errors.iter().any(|e| e.kind == ErrorKind::CircularDependency));
    }

    #[test]
    fn test_optional_side_breaks_cycle() {
        let mut ast = build(
            r#"
class A {
  id Int @primaryKey
  bId Int @unique
  b B @relation([bId], [B.id])
}

class B {
  id Int @primaryKey
  aId Int? @unique
  a A? @relation([aId], [A.id])
}
"#,
        );
        let errors = validate_all(&mut ast);
        assert!(!errors.iter().any(|e| e.kind == ErrorKind::CircularDependency));
    }

    #[test]
    fn test_validator_batches_errors() {
        let mut ast = build(
            r#"
class User {
  id Int @primaryKey
  gadget Gadget
  orders Order[]
}

class Order {
  id Int @primaryKey
}
"#,
        );
        let errors = validate_all(&mut ast);
        assert!(errors.len() >= 2);
        let err = validate(&mut ast).unwrap_err();
        assert!(err.message.contains("TYPE_UNKNOWN"));
        assert!(err.message.contains("MISSING_FOREIGN_KEY"));
    }
}
