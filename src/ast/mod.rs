//! The schema model and its two-pass assembly.
//!
//! Enums are parsed and registered first; the frozen registry then drives
//! field-kind resolution while classes parse. Dependency ordering over
//! class-to-class references uses Kahn's algorithm and is consumed by the
//! migration engine.

pub mod class;
pub mod defaults;
pub mod enums;
pub mod field;
pub mod relation;

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::error::{ErrorKind, SchemaError};

pub use class::{ClassDef, ClassDirective};
pub use enums::{EnumDef, EnumValue};
pub use field::{Field, FieldKind};

/// Enums by name. Ordered so every iteration is deterministic.
pub type EnumRegistry = BTreeMap<String, EnumDef>;

static ENUM_BLOCK_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)\benum\s+[A-Za-z_][A-Za-z0-9_]*\s*\{[^{}]*\}").unwrap()
});

static CLASS_BLOCK_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)\bclass\s+[A-Za-z_][A-Za-z0-9_]*\s*\{[^{}]*\}").unwrap()
});

/// The complete in-memory schema model.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SchemaAst {
    pub enums: EnumRegistry,
    pub classes: Vec<ClassDef>,
}

impl SchemaAst {
    /// Assemble a model from the separated enum and class texts
    /// produced by [`crate::reader::separate`].
    pub fn build(enum_text: &str, class_text: &str) -> Result<SchemaAst, SchemaError> {
        let mut ast = SchemaAst::default();

        if !enum_text.trim().is_empty() {
            for (position, block) in ENUM_BLOCK_REGEX
                .find_iter(enum_text)
                .map(|m| m.as_str())
                .enumerate()
            {
                let parsed = enums::parse_enum(block, position)?;
                if ast.enums.contains_key(&parsed.name) {
                    return Err(SchemaError::located(
                        ErrorKind::DuplicateEnum,
                        format!("duplicate enum name '{}'", parsed.name),
                        format!("enum '{}'", parsed.name),
                    ));
                }
                ast.enums.insert(parsed.name.clone(), parsed);
            }
        }

        if !class_text.trim().is_empty() {
            for (position, block) in CLASS_BLOCK_REGEX
                .find_iter(class_text)
                .map(|m| m.as_str())
                .enumerate()
            {
                let parsed = class::parse_class(block, position, &ast.enums)?;
                ast.classes.push(parsed);
            }
        }

        Ok(ast)
    }

    /// Parse raw schema source end to end (reader + assembly).
    pub fn from_source(source: &str) -> Result<SchemaAst, SchemaError> {
        let (enum_text, class_text) = crate::reader::separate(source)?;
        SchemaAst::build(&enum_text, &class_text)
    }

    pub fn class_by_name(&self, name: &str) -> Option<&ClassDef> {
        self.classes.iter().find(|c| c.name == name)
    }

    pub fn enum_by_name(&self, name: &str) -> Option<&EnumDef> {
        self.enums.get(name)
    }

    pub fn is_empty(&self) -> bool {
        self.enums.is_empty() && self.classes.is_empty()
    }

    /// Classes in dependency order: a class that other classes reference
    /// through object-kind fields emerges before its dependents.
    ///
    /// Reports [`ErrorKind::CircularClassDependency`] when the reference
    /// graph contains a cycle and not every class can be ordered.
    pub fn dependency_order(&self) -> Result<Vec<&ClassDef>, SchemaError> {
        let index_by_name: HashMap<&str, usize> = self
            .classes
            .iter()
            .enumerate()
            .map(|(idx, class)| (class.name.as_str(), idx))
            .collect();

        // Edge dependent -> dependency, tracked as in-degrees on dependencies.
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); self.classes.len()];
        let mut in_degree = vec![0usize; self.classes.len()];

        for (idx, class) in self.classes.iter().enumerate() {
            for field in &class.fields {
                if field.kind != FieldKind::Object {
                    continue;
                }
                if let Some(&target) = index_by_name.get(field.data_type.as_str()) {
                    if target != idx {
                        dependents[target].push(idx);
                        in_degree[idx] += 1;
                    }
                }
            }
        }

        let mut queue: VecDeque<usize> = (0..self.classes.len())
            .filter(|&idx| in_degree[idx] == 0)
            .collect();
        let mut ordered = Vec::with_capacity(self.classes.len());

        while let Some(idx) = queue.pop_front() {
            ordered.push(&self.classes[idx]);
            for &dependent in &dependents[idx] {
                in_degree[dependent] -= 1;
                if in_degree[dependent] == 0 {
                    queue.push_back(dependent);
                }
            }
        }

        if ordered.len() != self.classes.len() {
            return Err(SchemaError::new(
                ErrorKind::CircularClassDependency,
                "circular class dependency detected; classes cannot be ordered",
            ));
        }

        Ok(ordered)
    }

    /// Render the model back to schema source: enum blocks, then class
    /// blocks, separated by blank lines.
    pub fn to_schema_source(&self) -> String {
        let mut blocks: Vec<String> = Vec::new();
        for def in self.enums.values() {
            blocks.push(def.to_string());
        }
        for class in &self.classes {
            blocks.push(class.to_string());
        }
        blocks.join("\n\n")
    }
}

impl fmt::Display for SchemaAst {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "schema: {} enums, {} classes",
            self.enums.len(),
            self.classes.len()
        )?;
        for def in self.enums.values() {
            writeln!(f, "  enum {} ({} values)", def.name, def.values.len())?;
        }
        for class in &self.classes {
            writeln!(f, "  class {} ({} fields)", class.name, class.fields.len())?;
        }
        Ok(())
    }
}
