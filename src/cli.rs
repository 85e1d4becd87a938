//! CLI argument definitions.
//!
//! This module contains the top-level CLI structure and shared flags.
//! Individual command definitions are in the `commands` module.

use clap::Parser;
use std::path::PathBuf;

use crate::commands::Command;
use crate::constants::{MIGRATION_DIR, SCHEMA_FILE};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to the schema source file
    #[arg(short, long, default_value = SCHEMA_FILE, global = true)]
    pub schema: PathBuf,

    /// Path to the migration history directory
    #[arg(short, long, default_value = MIGRATION_DIR, global = true)]
    pub migrations: PathBuf,

    /// Output format
    #[arg(short = 'o', long, value_enum, default_value_t = OutputFormat::Text, global = true)]
    pub format: OutputFormat,

    #[command(subcommand)]
    pub command: Command,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_validate_command() {
        let args = Args::try_parse_from(["blaze", "validate"]).unwrap();
        assert!(matches!(args.command, Command::Validate(_)));
        assert_eq!(args.schema, PathBuf::from(SCHEMA_FILE));
    }

    #[test]
    fn test_parse_migrate_with_overrides() {
        let args = Args::try_parse_from([
            "blaze",
            "--schema",
            "custom/app.schema",
            "-o",
            "json",
            "migrate",
            "add_users",
        ])
        .unwrap();
        assert_eq!(args.schema, PathBuf::from("custom/app.schema"));
        match args.command {
            Command::Migrate(cmd) => assert_eq!(cmd.name, "add_users"),
            other => panic!("expected migrate command, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_subcommand_fails() {
        assert!(Args::try_parse_from(["blaze"]).is_err());
    }
}
