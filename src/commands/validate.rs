//! Parse and validate the schema file.

use std::error::Error;
use std::fs;

use clap::Args;
use serde::Serialize;

use super::{Execute, Workspace};
use crate::ast::SchemaAst;
use crate::output::Renderable;
use crate::validation;

/// Parse and validate the schema file
#[derive(Args, Debug, Default)]
#[command(after_help = "\
Examples:
  blaze validate                 # Validate blaze/blaze.schema
  blaze -o json validate         # Dump the validated model as JSON")]
pub struct ValidateCmd {}

/// The validated model plus summary counts.
#[derive(Debug, Serialize)]
pub struct ValidateOutput {
    pub schema_file: String,
    pub enums: usize,
    pub classes: usize,
    pub model: SchemaAst,
}

impl Execute for ValidateCmd {
    type Output = ValidateOutput;

    fn execute(self, workspace: &Workspace) -> Result<Self::Output, Box<dyn Error>> {
        let source = fs::read_to_string(workspace.schema_file).map_err(|e| {
            format!(
                "failed to read schema file '{}': {}",
                workspace.schema_file.display(),
                e
            )
        })?;

        let mut ast = SchemaAst::from_source(&source)?;
        let errors = validation::validate_all(&mut ast);
        if !errors.is_empty() {
            let lines: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
            return Err(format!("schema validation failed:\n{}", lines.join("\n")).into());
        }

        Ok(ValidateOutput {
            schema_file: workspace.schema_file.display().to_string(),
            enums: ast.enums.len(),
            classes: ast.classes.len(),
            model: ast,
        })
    }
}

impl Renderable for ValidateOutput {
    fn to_text(&self) -> String {
        let mut lines = vec![format!(
            "Schema '{}' is valid: {} enums, {} classes.",
            self.schema_file, self.enums, self.classes
        )];
        for def in self.model.enums.values() {
            lines.push(format!("  enum {} ({} values)", def.name, def.values.len()));
        }
        for class in &self.model.classes {
            lines.push(format!("  class {} ({} fields)", class.name, class.fields.len()));
        }
        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn workspace<'a>(schema: &'a Path, migrations: &'a Path) -> Workspace<'a> {
        Workspace {
            schema_file: schema,
            migration_dir: migrations,
        }
    }

    #[test]
    fn test_validate_valid_schema() {
        let temp = tempfile::tempdir().unwrap();
        let schema_path = temp.path().join("app.schema");
        fs::write(
            &schema_path,
            "enum Role { USER ADMIN }\n\nclass User {\n  id Int @primaryKey\n  role Role @default(USER)\n}\n",
        )
        .unwrap();

        let migrations = temp.path().join("migrations");
        let output = ValidateCmd::default()
            .execute(&workspace(&schema_path, &migrations))
            .unwrap();
        assert_eq!(output.enums, 1);
        assert_eq!(output.classes, 1);
        assert!(output.to_text().contains("is valid"));
    }

    #[test]
    fn test_validate_reports_all_errors() {
        let temp = tempfile::tempdir().unwrap();
        let schema_path = temp.path().join("app.schema");
        fs::write(
            &schema_path,
            "class User {\n  id Int @primaryKey\n  widget Widget\n  orders Order[]\n}\n\nclass Order {\n  id Int @primaryKey\n}\n",
        )
        .unwrap();

        let migrations = temp.path().join("migrations");
        let err = ValidateCmd::default()
            .execute(&workspace(&schema_path, &migrations))
            .unwrap_err();
        let message = err.to_string();
        assert!(message.contains("TYPE_UNKNOWN"));
        assert!(message.contains("MISSING_FOREIGN_KEY"));
    }

    #[test]
    fn test_validate_missing_file() {
        let temp = tempfile::tempdir().unwrap();
        let schema_path = temp.path().join("nope.schema");
        let migrations = temp.path().join("migrations");
        let err = ValidateCmd::default()
            .execute(&workspace(&schema_path, &migrations))
            .unwrap_err();
        assert!(err.to_string().contains("failed to read schema file"));
    }
}
