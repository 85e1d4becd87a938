//! Error types for schema parsing, validation, and migration generation.
//!
//! Every failure in the compiler carries an [`ErrorKind`] code, a
//! human-readable message, and (where known) a location string such as
//! `class 'User', field 'email'`. Parsers return the earliest error per
//! entity; the schema validator accumulates errors and reports them as a
//! batch.

use std::fmt;

use thiserror::Error;

/// Machine-readable error categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    // Lexical
    InvalidSyntax,
    UnbalancedBraces,
    UnbalancedParens,

    // Naming
    EmptyName,
    InvalidIdentifier,
    ReservedKeyword,
    ScalarConflict,
    TooLong,
    NamingStyle,

    // Enum
    DuplicateValue,
    TooManyValues,
    NoValues,

    // Field
    UnknownAttribute,
    DuplicateAttribute,
    TypeUnknown,
    InvalidType,

    // Default values
    InvalidLiteral,
    OutOfRange,
    BadFormat,
    TypeMismatch,
    UnknownCallback,
    IncompatibleCallback,
    NestedArray,
    EnumValueUnknown,

    // Directives
    UnknownDirective,
    ConflictingDirectives,
    RequiresOptional,

    // Relations
    FromToLengthMismatch,
    BadTargetFormat,
    MultipleTargetClasses,
    InvalidAction,

    // Schema-level
    DuplicateClass,
    DuplicateEnum,
    NameConflict,
    DuplicateField,
    MultipleFieldPk,
    ConflictingPk,
    MissingPk,
    InvalidPkField,
    OptionalPkField,
    ArrayPkField,
    NonUniqueReference,
    MissingForeignKey,
    CircularDependency,
    CircularClassDependency,
}

impl ErrorKind {
    /// The stable code printed in error output, e.g. `NON_UNIQUE_REFERENCE`.
    pub fn code(self) -> &'static str {
        match self {
            ErrorKind::InvalidSyntax => "INVALID_SYNTAX",
            ErrorKind::UnbalancedBraces => "UNBALANCED_BRACES",
            ErrorKind::UnbalancedParens => "UNBALANCED_PARENS",
            ErrorKind::EmptyName => "EMPTY_NAME",
            ErrorKind::InvalidIdentifier => "INVALID_IDENTIFIER",
            ErrorKind::ReservedKeyword => "RESERVED_KEYWORD",
            ErrorKind::ScalarConflict => "SCALAR_CONFLICT",
            ErrorKind::TooLong => "TOO_LONG",
            ErrorKind::NamingStyle => "NAMING_STYLE",
            ErrorKind::DuplicateValue => "DUPLICATE_VALUE",
            ErrorKind::TooManyValues => "TOO_MANY_VALUES",
            ErrorKind::NoValues => "NO_VALUES",
            ErrorKind::UnknownAttribute => "UNKNOWN_ATTRIBUTE",
            ErrorKind::DuplicateAttribute => "DUPLICATE_ATTRIBUTE",
            ErrorKind::TypeUnknown => "TYPE_UNKNOWN",
            ErrorKind::InvalidType => "INVALID_TYPE",
            ErrorKind::InvalidLiteral => "INVALID_LITERAL",
            ErrorKind::OutOfRange => "OUT_OF_RANGE",
            ErrorKind::BadFormat => "BAD_FORMAT",
            ErrorKind::TypeMismatch => "TYPE_MISMATCH",
            ErrorKind::UnknownCallback => "UNKNOWN_CALLBACK",
            ErrorKind::IncompatibleCallback => "INCOMPATIBLE_CALLBACK",
            ErrorKind::NestedArray => "NESTED_ARRAY",
            ErrorKind::EnumValueUnknown => "ENUM_VALUE_UNKNOWN",
            ErrorKind::UnknownDirective => "UNKNOWN_DIRECTIVE",
            ErrorKind::ConflictingDirectives => "CONFLICTING_DIRECTIVES",
            ErrorKind::RequiresOptional => "REQUIRES_OPTIONAL",
            ErrorKind::FromToLengthMismatch => "FROM_TO_LENGTH_MISMATCH",
            ErrorKind::BadTargetFormat => "BAD_TARGET_FORMAT",
            ErrorKind::MultipleTargetClasses => "MULTIPLE_TARGET_CLASSES",
            ErrorKind::InvalidAction => "INVALID_ACTION",
            ErrorKind::DuplicateClass => "DUPLICATE_CLASS",
            ErrorKind::DuplicateEnum => "DUPLICATE_ENUM",
            ErrorKind::NameConflict => "NAME_CONFLICT",
            ErrorKind::DuplicateField => "DUPLICATE_FIELD",
            ErrorKind::MultipleFieldPk => "MULTIPLE_FIELD_PK",
            ErrorKind::ConflictingPk => "CONFLICTING_PK",
            ErrorKind::MissingPk => "MISSING_PK",
            ErrorKind::InvalidPkField => "INVALID_PK_FIELD",
            ErrorKind::OptionalPkField => "OPTIONAL_PK_FIELD",
            ErrorKind::ArrayPkField => "ARRAY_PK_FIELD",
            ErrorKind::NonUniqueReference => "NON_UNIQUE_REFERENCE",
            ErrorKind::MissingForeignKey => "MISSING_FOREIGN_KEY",
            ErrorKind::CircularDependency => "CIRCULAR_DEPENDENCY",
            ErrorKind::CircularClassDependency => "CIRCULAR_CLASS_DEPENDENCY",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// A single schema compiler error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}", render_error(.kind, .message, .location))]
pub struct SchemaError {
    pub kind: ErrorKind,
    pub message: String,
    /// Where the error occurred, e.g. `class 'User', field 'email'`.
    /// Empty when the error has no meaningful location.
    pub location: String,
}

impl SchemaError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        SchemaError {
            kind,
            message: message.into(),
            location: String::new(),
        }
    }

    pub fn located(kind: ErrorKind, message: impl Into<String>, location: impl Into<String>) -> Self {
        SchemaError {
            kind,
            message: message.into(),
            location: location.into(),
        }
    }

    /// Attach a location to an error that was raised without one.
    pub fn at(mut self, location: impl Into<String>) -> Self {
        if self.location.is_empty() {
            self.location = location.into();
        }
        self
    }
}

fn render_error(kind: &ErrorKind, message: &str, location: &str) -> String {
    if location.is_empty() {
        format!("[{}] {}", kind.code(), message)
    } else {
        format!("[{}] {} at {}", kind.code(), message, location)
    }
}

/// Join a batch of validation errors into a single error, one per line.
pub fn join_errors(errors: &[SchemaError]) -> SchemaError {
    let joined = errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("\n");
    SchemaError::new(
        errors.first().map(|e| e.kind).unwrap_or(ErrorKind::InvalidSyntax),
        format!("schema validation failed:\n{}", joined),
    )
}
