//! Scaffold a new schema file.

use std::error::Error;
use std::fs;

use clap::Args;
use serde::Serialize;

use super::{Execute, Workspace};
use crate::output::Renderable;

const STARTER_SCHEMA: &str = "\
// Define enums and classes for your data model.
//
// enum Role {
//   USER
//   ADMIN
// }

class User {
  id String @primaryKey @default(uuid())
  email String @unique
  createdAt Timestamp @default(now())
}
";

/// Scaffold a new schema file
#[derive(Args, Debug, Default)]
pub struct InitCmd {}

#[derive(Debug, Serialize)]
pub struct InitOutput {
    pub schema_file: String,
}

impl Execute for InitCmd {
    type Output = InitOutput;

    fn execute(self, workspace: &Workspace) -> Result<Self::Output, Box<dyn Error>> {
        if workspace.schema_file.exists() {
            return Err(format!(
                "schema file '{}' already exists",
                workspace.schema_file.display()
            )
            .into());
        }

        if let Some(parent) = workspace.schema_file.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(workspace.schema_file, STARTER_SCHEMA)?;
        fs::create_dir_all(workspace.migration_dir)?;

        Ok(InitOutput {
            schema_file: workspace.schema_file.display().to_string(),
        })
    }
}

impl Renderable for InitOutput {
    fn to_text(&self) -> String {
        format!("Created schema file: {}", self.schema_file)
    }
}
