//! Command definitions and execution.
//!
//! Each command is a clap `Args` struct in its own module implementing
//! [`Execute`]; `Command::run` dispatches, executes, and formats the result.

mod init;
mod migrate;
mod validate;

use std::error::Error;
use std::path::Path;

use clap::Subcommand;

use crate::output::{OutputFormat, Renderable};

pub use init::InitCmd;
pub use migrate::MigrateCmd;
pub use validate::ValidateCmd;

/// Paths every command operates against.
#[derive(Debug, Clone)]
pub struct Workspace<'a> {
    /// The schema source file (`blaze/blaze.schema`).
    pub schema_file: &'a Path,
    /// The migration history directory (`blaze/migrations`).
    pub migration_dir: &'a Path,
}

/// Trait implemented by each command's argument struct.
pub trait Execute {
    type Output: Renderable;

    fn execute(self, workspace: &Workspace) -> Result<Self::Output, Box<dyn Error>>;
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Scaffold a new schema file
    Init(InitCmd),
    /// Parse and validate the schema file
    Validate(ValidateCmd),
    /// Diff the schema against the migration history and write a migration
    Migrate(MigrateCmd),
}

impl Command {
    pub fn run(self, workspace: &Workspace, format: OutputFormat) -> Result<String, Box<dyn Error>> {
        match self {
            Command::Init(cmd) => Ok(cmd.execute(workspace)?.render(format)),
            Command::Validate(cmd) => Ok(cmd.execute(workspace)?.render(format)),
            Command::Migrate(cmd) => Ok(cmd.execute(workspace)?.render(format)),
        }
    }
}
