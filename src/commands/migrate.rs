//! Generate a migration by diffing the schema file against the model
//! reconstructed from the migration history.

use std::error::Error;
use std::fs;

use chrono::Local;
use clap::Args;
use serde::Serialize;

use super::{Execute, Workspace};
use crate::ast::SchemaAst;
use crate::constants::QUERY_FILE_NAME;
use crate::migration;
use crate::output::Renderable;
use crate::shadow;
use crate::validation;

/// Diff the schema against the migration history and write a migration
#[derive(Args, Debug)]
#[command(after_help = "\
Examples:
  blaze migrate init             # First migration for a fresh schema
  blaze migrate add_orders       # Captures schema changes since the last migration")]
pub struct MigrateCmd {
    /// Label for the migration folder (appended to the timestamp)
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct MigrateOutput {
    /// Folder name of the written migration, if any change was detected.
    pub migration: Option<String>,
    pub sql_file: Option<String>,
    pub statements: usize,
}

impl Execute for MigrateCmd {
    type Output = MigrateOutput;

    fn execute(self, workspace: &Workspace) -> Result<Self::Output, Box<dyn Error>> {
        if self.name.is_empty() || !self.name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(format!(
                "invalid migration name '{}': use letters, digits, and underscores",
                self.name
            )
            .into());
        }

        let source = fs::read_to_string(workspace.schema_file).map_err(|e| {
            format!(
                "failed to read schema file '{}': {}",
                workspace.schema_file.display(),
                e
            )
        })?;
        let mut target = SchemaAst::from_source(&source)?;
        validation::validate(&mut target)?;

        let current = shadow::replay_migrations(workspace.migration_dir)?;

        let engine = migration::MigrationEngine::new(&current, &target);
        let statements = engine.statements()?;
        let sql = engine.generate()?;
        if sql.is_empty() {
            return Ok(MigrateOutput {
                migration: None,
                sql_file: None,
                statements: 0,
            });
        }

        let timestamp = Local::now().format("%Y%m%d%H%M%S");
        let folder_name = format!("{}_{}", timestamp, self.name);
        let migration_path = workspace.migration_dir.join(&folder_name);
        fs::create_dir_all(&migration_path)?;

        let sql_path = migration_path.join(QUERY_FILE_NAME);
        fs::write(&sql_path, format!("{}\n", sql))?;

        Ok(MigrateOutput {
            migration: Some(folder_name),
            sql_file: Some(sql_path.display().to_string()),
            statements: statements.len(),
        })
    }
}

impl Renderable for MigrateOutput {
    fn to_text(&self) -> String {
        match (&self.migration, &self.sql_file) {
            (Some(migration), Some(sql_file)) => format!(
                "Migration created: {}\n  SQL file: {}\n  Statements: {}",
                migration, sql_file, self.statements
            ),
            _ => "No changes detected; nothing to migrate.".to_string(),
        }
    }
}
