//! Core lexical model: scalar types, directive keywords, referential
//! actions, default-value callbacks, and the schema/PostgreSQL type maps.
//!
//! Provides the closed vocabulary every other module resolves against.
//! The type maps run in both directions: schema type to emitted DDL type,
//! and catalog `udt_name`/DDL type back to schema type.

use serde::{Deserialize, Serialize};

pub const KEYWORD_ENUM: &str = "enum";
pub const KEYWORD_CLASS: &str = "class";

pub const PROJECT_DIR: &str = "blaze";
pub const SCHEMA_FILE: &str = "blaze/blaze.schema";
pub const MIGRATION_DIR: &str = "blaze/migrations";
pub const QUERY_FILE_NAME: &str = "query.sql";

/// History table maintained by the CLI; never introspected as a class.
pub const MIGRATION_TABLE_NAME: &str = "_blaze_migrations";

pub const MAX_IDENTIFIER_LEN: usize = 64;
pub const MAX_ENUM_VALUES: usize = 255;
pub const MAX_CLASS_FIELDS: usize = 1000;

/// Field directives that take no parameters.
pub const DIRECTIVE_PRIMARY_KEY: &str = "primaryKey";
pub const DIRECTIVE_UNIQUE: &str = "unique";
pub const DIRECTIVE_UPDATED_AT: &str = "updatedAt";

/// Field attributes that carry an argument string.
pub const ATTR_DEFAULT: &str = "default";
pub const ATTR_RELATION: &str = "relation";

/// Class directive names (the part after `@@`).
pub const CLASS_PRIMARY_KEY: &str = "primaryKey";
pub const CLASS_UNIQUE: &str = "unique";
pub const CLASS_INDEX: &str = "index";
pub const CLASS_TEXT_INDEX: &str = "textIndex";
pub const CLASS_CHECK: &str = "check";

/// The built-in primitive types of the schema language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScalarType {
    Int,
    BigInt,
    SmallInt,
    Float,
    Numeric,
    String,
    Boolean,
    Date,
    Timestamp,
    Json,
    Bytes,
    Char,
}

impl ScalarType {
    pub const ALL: [ScalarType; 12] = [
        ScalarType::Int,
        ScalarType::BigInt,
        ScalarType::SmallInt,
        ScalarType::Float,
        ScalarType::Numeric,
        ScalarType::String,
        ScalarType::Boolean,
        ScalarType::Date,
        ScalarType::Timestamp,
        ScalarType::Json,
        ScalarType::Bytes,
        ScalarType::Char,
    ];

    /// The name used in schema source, e.g. `BigInt`.
    pub fn name(self) -> &'static str {
        match self {
            ScalarType::Int => "Int",
            ScalarType::BigInt => "BigInt",
            ScalarType::SmallInt => "SmallInt",
            ScalarType::Float => "Float",
            ScalarType::Numeric => "Numeric",
            ScalarType::String => "String",
            ScalarType::Boolean => "Boolean",
            ScalarType::Date => "Date",
            ScalarType::Timestamp => "Timestamp",
            ScalarType::Json => "Json",
            ScalarType::Bytes => "Bytes",
            ScalarType::Char => "Char",
        }
    }

    /// Resolve a schema type name (exact case).
    pub fn parse(name: &str) -> Option<ScalarType> {
        ScalarType::ALL.iter().copied().find(|t| t.name() == name)
    }

    /// The type name written into emitted DDL.
    pub fn ddl_type(self) -> &'static str {
        match self {
            ScalarType::Int => "INTEGER",
            ScalarType::BigInt => "BIGINT",
            ScalarType::SmallInt => "SMALLINT",
            ScalarType::Float => "DOUBLE PRECISION",
            ScalarType::Numeric => "NUMERIC",
            ScalarType::String => "TEXT",
            ScalarType::Boolean => "BOOLEAN",
            ScalarType::Date => "DATE",
            ScalarType::Timestamp => "TIMESTAMP",
            ScalarType::Json => "JSONB",
            ScalarType::Bytes => "BYTEA",
            ScalarType::Char => "CHAR(1)",
        }
    }

    /// Map a catalog `udt_name` back to a schema type.
    ///
    /// `varchar` and `uuid` both collapse to String; `bpchar` is Char.
    pub fn from_udt(udt: &str) -> Option<ScalarType> {
        match udt {
            "int4" => Some(ScalarType::Int),
            "int8" => Some(ScalarType::BigInt),
            "int2" => Some(ScalarType::SmallInt),
            "float8" => Some(ScalarType::Float),
            "numeric" => Some(ScalarType::Numeric),
            "text" | "varchar" | "uuid" => Some(ScalarType::String),
            "bpchar" => Some(ScalarType::Char),
            "bool" => Some(ScalarType::Boolean),
            "date" => Some(ScalarType::Date),
            "timestamp" | "timestamptz" => Some(ScalarType::Timestamp),
            "jsonb" | "json" => Some(ScalarType::Json),
            "bytea" => Some(ScalarType::Bytes),
            _ => None,
        }
    }

    /// Map an emitted DDL type (as written by the migration engine, or as
    /// found in hand-written SQL) back to a schema type.
    ///
    /// `CHAR(1)` maps to Char; any wider `CHAR(n)` maps to String.
    pub fn from_ddl(sql_type: &str) -> Option<ScalarType> {
        let upper = sql_type.trim().to_uppercase();
        if upper.starts_with("DOUBLE PRECISION") || upper.starts_with("FLOAT8") {
            return Some(ScalarType::Float);
        }
        if upper.starts_with("CHAR(1)") {
            return Some(ScalarType::Char);
        }
        if upper.starts_with("CHAR(") || upper.starts_with("CHARACTER(") {
            return Some(ScalarType::String);
        }
        match upper.split(['(', ' ']).next().unwrap_or("") {
            "INTEGER" | "INT" | "INT4" => Some(ScalarType::Int),
            "BIGINT" | "INT8" => Some(ScalarType::BigInt),
            "SMALLINT" | "INT2" => Some(ScalarType::SmallInt),
            "NUMERIC" | "DECIMAL" => Some(ScalarType::Numeric),
            "TEXT" | "VARCHAR" | "UUID" => Some(ScalarType::String),
            "BOOLEAN" | "BOOL" => Some(ScalarType::Boolean),
            "DATE" => Some(ScalarType::Date),
            "TIMESTAMP" | "TIMESTAMPTZ" => Some(ScalarType::Timestamp),
            "JSONB" | "JSON" => Some(ScalarType::Json),
            "BYTEA" => Some(ScalarType::Bytes),
            _ => None,
        }
    }
}

/// Referential actions for foreign keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ReferentialAction {
    Cascade,
    Restrict,
    SetNull,
    #[default]
    NoAction,
}

impl ReferentialAction {
    /// The name used in schema source, e.g. `SetNull`.
    pub fn name(self) -> &'static str {
        match self {
            ReferentialAction::Cascade => "Cascade",
            ReferentialAction::Restrict => "Restrict",
            ReferentialAction::SetNull => "SetNull",
            ReferentialAction::NoAction => "NoAction",
        }
    }

    pub fn parse(name: &str) -> Option<ReferentialAction> {
        match name {
            "Cascade" => Some(ReferentialAction::Cascade),
            "Restrict" => Some(ReferentialAction::Restrict),
            "SetNull" => Some(ReferentialAction::SetNull),
            "NoAction" => Some(ReferentialAction::NoAction),
            _ => None,
        }
    }

    /// SQL spelling in ON DELETE / ON UPDATE clauses.
    pub fn sql(self) -> &'static str {
        match self {
            ReferentialAction::Cascade => "CASCADE",
            ReferentialAction::Restrict => "RESTRICT",
            ReferentialAction::SetNull => "SET NULL",
            ReferentialAction::NoAction => "NO ACTION",
        }
    }

    /// Parse the SQL or catalog spelling (`SET NULL`, `SET_NULL`, ...).
    /// Unknown or empty input defaults to NoAction.
    pub fn from_sql(action: &str) -> ReferentialAction {
        match action.trim().to_uppercase().replace('_', " ").as_str() {
            "CASCADE" => ReferentialAction::Cascade,
            "RESTRICT" => ReferentialAction::Restrict,
            "SET NULL" => ReferentialAction::SetNull,
            _ => ReferentialAction::NoAction,
        }
    }
}

/// Default-value callback functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DefaultCallback {
    Now,
    Uuid,
    Autoincrement,
}

impl DefaultCallback {
    pub const ALL: [DefaultCallback; 3] = [
        DefaultCallback::Now,
        DefaultCallback::Uuid,
        DefaultCallback::Autoincrement,
    ];

    /// The spelling in schema source, parentheses included.
    pub fn name(self) -> &'static str {
        match self {
            DefaultCallback::Now => "now()",
            DefaultCallback::Uuid => "uuid()",
            DefaultCallback::Autoincrement => "autoincrement()",
        }
    }

    pub fn parse(text: &str) -> Option<DefaultCallback> {
        DefaultCallback::ALL.iter().copied().find(|c| c.name() == text)
    }

    /// Scalar types this callback may default.
    pub fn compatible_types(self) -> &'static [ScalarType] {
        match self {
            DefaultCallback::Now => &[ScalarType::Timestamp, ScalarType::Date],
            DefaultCallback::Uuid => &[ScalarType::String],
            DefaultCallback::Autoincrement => {
                &[ScalarType::Int, ScalarType::BigInt, ScalarType::SmallInt]
            }
        }
    }

    pub fn supports(self, scalar: ScalarType) -> bool {
        self.compatible_types().contains(&scalar)
    }
}

/// True for `[A-Za-z_][A-Za-z0-9_]*`.
pub fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Reserved words may not be used as enum, class, field, or value names.
///
/// Covers the block keywords, boolean/null literals, and the lowercase form
/// of every scalar type name. The check is case-insensitive.
pub fn is_reserved_word(word: &str) -> bool {
    let lower = word.to_lowercase();
    if matches!(lower.as_str(), "enum" | "class" | "true" | "false" | "null") {
        return true;
    }
    ScalarType::ALL.iter().any(|t| t.name().to_lowercase() == lower)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_roundtrip_names() {
        for scalar in ScalarType::ALL {
            assert_eq!(ScalarType::parse(scalar.name()), Some(scalar));
        }
        assert_eq!(ScalarType::parse("int"), None);
        assert_eq!(ScalarType::parse("Uuid"), None);
    }

    #[test]
    fn test_scalar_ddl_mapping() {
        assert_eq!(ScalarType::Int.ddl_type(), "INTEGER");
        assert_eq!(ScalarType::String.ddl_type(), "TEXT");
        assert_eq!(ScalarType::Float.ddl_type(), "DOUBLE PRECISION");
        assert_eq!(ScalarType::Char.ddl_type(), "CHAR(1)");
    }

    #[test]
    fn test_udt_mapping() {
        assert_eq!(ScalarType::from_udt("int4"), Some(ScalarType::Int));
        assert_eq!(ScalarType::from_udt("uuid"), Some(ScalarType::String));
        assert_eq!(ScalarType::from_udt("bpchar"), Some(ScalarType::Char));
        assert_eq!(ScalarType::from_udt("tsvector"), None);
    }

    #[test]
    fn test_ddl_reverse_mapping() {
        assert_eq!(ScalarType::from_ddl("INTEGER"), Some(ScalarType::Int));
        assert_eq!(ScalarType::from_ddl("DOUBLE PRECISION"), Some(ScalarType::Float));
        assert_eq!(ScalarType::from_ddl("CHAR(1)"), Some(ScalarType::Char));
        // Wide char columns collapse to String rather than being dropped.
        assert_eq!(ScalarType::from_ddl("CHAR(8)"), Some(ScalarType::String));
        assert_eq!(ScalarType::from_ddl("timestamp"), Some(ScalarType::Timestamp));
    }

    #[test]
    fn test_referential_action_sql() {
        assert_eq!(ReferentialAction::SetNull.sql(), "SET NULL");
        assert_eq!(ReferentialAction::from_sql("SET_NULL"), ReferentialAction::SetNull);
        assert_eq!(ReferentialAction::from_sql("set null"), ReferentialAction::SetNull);
        assert_eq!(ReferentialAction::from_sql(""), ReferentialAction::NoAction);
        assert_eq!(ReferentialAction::from_sql("garbage"), ReferentialAction::NoAction);
    }

    #[test]
    fn test_callback_compatibility() {
        assert!(DefaultCallback::Now.supports(ScalarType::Date));
        assert!(DefaultCallback::Uuid.supports(ScalarType::String));
        assert!(!DefaultCallback::Uuid.supports(ScalarType::Int));
        assert!(DefaultCallback::Autoincrement.supports(ScalarType::SmallInt));
        assert_eq!(DefaultCallback::parse("now()"), Some(DefaultCallback::Now));
        assert_eq!(DefaultCallback::parse("now"), None);
    }

    #[test]
    fn test_reserved_words() {
        assert!(is_reserved_word("enum"));
        assert!(is_reserved_word("TRUE"));
        assert!(is_reserved_word("bigint"));
        assert!(is_reserved_word("BigInt"));
        assert!(!is_reserved_word("Role"));
    }

    #[test]
    fn test_identifier() {
        assert!(is_identifier("_private"));
        assert!(is_identifier("User2"));
        assert!(!is_identifier("2user"));
        assert!(!is_identifier("user-name"));
        assert!(!is_identifier(""));
    }
}
