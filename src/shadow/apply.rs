//! Migration history replay: discover `blaze/migrations/<ts>_<label>/query.sql`
//! files and fold them, in timestamp order, into a schema model.

use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};

use crate::ast::SchemaAst;
use crate::constants::QUERY_FILE_NAME;
use crate::shadow::apply_migration;

/// One discovered migration script.
#[derive(Debug, Clone)]
pub struct MigrationFile {
    pub name: String,
    pub path: PathBuf,
    pub timestamp: u64,
    pub sql: String,
}

/// Read every migration folder under `dir`, sorted by the 14-digit
/// timestamp prefix. Folders without a valid prefix are skipped.
pub fn read_migration_files(dir: &Path) -> Result<Vec<MigrationFile>, Box<dyn Error>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }

        let folder_name = entry.file_name().to_string_lossy().to_string();
        let Some(timestamp) = extract_timestamp(&folder_name) else {
            continue;
        };

        let sql_path = entry.path().join(QUERY_FILE_NAME);
        let sql = fs::read_to_string(&sql_path)
            .map_err(|e| format!("failed to read migration '{}': {}", folder_name, e))?;

        files.push(MigrationFile {
            name: folder_name,
            path: sql_path,
            timestamp,
            sql,
        });
    }

    files.sort_by_key(|f| f.timestamp);
    Ok(files)
}

/// Replay the whole migration history into a validated model.
/// An empty or missing directory yields the empty model.
pub fn replay_migrations(dir: &Path) -> Result<SchemaAst, Box<dyn Error>> {
    let mut current = SchemaAst::default();
    for file in read_migration_files(dir)? {
        current = apply_migration(&current, &file.sql)
            .map_err(|e| format!("failed to apply migration '{}': {}", file.name, e))?;
    }
    Ok(current)
}

/// The timestamp prefix must be exactly 14 digits before an underscore.
fn extract_timestamp(folder_name: &str) -> Option<u64> {
    let bytes = folder_name.as_bytes();
    if bytes.len() < 15 || bytes[14] != b'_' {
        return None;
    }
    let prefix = &folder_name[..14];
    if !prefix.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    prefix.parse().ok()
}
