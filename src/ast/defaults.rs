//! `@default(...)` argument validation.
//!
//! A default is a callback (`now()`, `uuid()`, `autoincrement()`), a single
//! literal, or a one-dimensional array of literals. Literals are validated
//! against the field's base type and stored in canonical form: dates
//! normalize to `YYYY-MM-DD`, JSON is re-serialized, and byte strings are
//! stored as the canonical hex literal `\xHH...`.

use std::fmt;
use std::sync::LazyLock;

use base64::engine::general_purpose::{STANDARD, URL_SAFE};
use base64::Engine as _;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use regex::Regex;
use serde::Serialize;

use crate::ast::EnumRegistry;
use crate::constants::{DefaultCallback, ScalarType};
use crate::error::{ErrorKind, SchemaError};

/// Matches a no-argument callback such as `now()`.
static CALLBACK_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*\(\)$").unwrap());

const DATE_FORMATS: [&str; 4] = ["%Y-%m-%d", "%m/%d/%Y", "%d-%m-%Y", "%Y/%m/%d"];

const TIMESTAMP_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
];

/// A validated default value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum DefaultValue {
    Literal(LiteralValue),
    Array(Vec<LiteralValue>),
    Callback(DefaultCallback),
}

/// A validated literal, canonicalized for its scalar (or enum) type.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum LiteralValue {
    Int(i64),
    Float(f64),
    Bool(bool),
    Text(String),
    Char(char),
    /// Canonical `YYYY-MM-DD`.
    Date(String),
    /// Stored verbatim after format validation.
    Timestamp(String),
    /// Canonical serde_json serialization.
    Json(String),
    /// Canonical hex literal `\xHH...`.
    Bytes(String),
    EnumMember(String),
}

impl DefaultValue {
    pub fn is_callback(&self) -> bool {
        matches!(self, DefaultValue::Callback(_))
    }

    pub fn as_callback(&self) -> Option<DefaultCallback> {
        match self {
            DefaultValue::Callback(cb) => Some(*cb),
            _ => None,
        }
    }
}

impl fmt::Display for LiteralValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LiteralValue::Int(v) => write!(f, "{}", v),
            LiteralValue::Float(v) => write!(f, "{}", v),
            LiteralValue::Bool(v) => write!(f, "{}", v),
            LiteralValue::Text(v) => write!(f, "\"{}\"", v.replace('\\', "\\\\").replace('"', "\\\"")),
            LiteralValue::Char(v) => match v {
                '\n' => write!(f, "\"\\n\""),
                '\t' => write!(f, "\"\\t\""),
                '\r' => write!(f, "\"\\r\""),
                '\\' => write!(f, "\"\\\\\""),
                '"' => write!(f, "\"\\\"\""),
                _ => write!(f, "\"{}\"", v),
            },
            LiteralValue::Date(v) | LiteralValue::Timestamp(v) => write!(f, "\"{}\"", v),
            LiteralValue::Json(v) | LiteralValue::Bytes(v) => write!(f, "'{}'", v),
            LiteralValue::EnumMember(v) => write!(f, "{}", v),
        }
    }
}

impl fmt::Display for DefaultValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DefaultValue::Callback(cb) => f.write_str(cb.name()),
            DefaultValue::Literal(lit) => write!(f, "{}", lit),
            DefaultValue::Array(items) => {
                let rendered: Vec<String> = items.iter().map(|i| i.to_string()).collect();
                write!(f, "[{}]", rendered.join(", "))
            }
        }
    }
}

/// Validate a raw `@default` argument against a field's base type.
pub fn validate_default(
    raw: &str,
    base_type: &str,
    is_array: bool,
    enums: &EnumRegistry,
) -> Result<DefaultValue, SchemaError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(SchemaError::new(
            ErrorKind::InvalidLiteral,
            "default value cannot be empty",
        ));
    }

    let looks_like_array = raw.starts_with('[') && raw.ends_with(']');

    if is_array {
        if !looks_like_array {
            return Err(SchemaError::new(
                ErrorKind::BadFormat,
                format!("array field requires array default syntax [a, b, ...], got: {}", raw),
            ));
        }
        return validate_array_default(raw, base_type, enums);
    }

    if looks_like_array {
        return Err(SchemaError::new(
            ErrorKind::TypeMismatch,
            format!("non-array field cannot have an array default: {}", raw),
        ));
    }

    if CALLBACK_REGEX.is_match(raw) {
        return validate_callback(raw, base_type);
    }

    if enums.contains_key(base_type) {
        return validate_enum_default(raw, base_type, enums).map(DefaultValue::Literal);
    }

    match ScalarType::parse(base_type) {
        Some(scalar) => validate_scalar_default(raw, scalar).map(DefaultValue::Literal),
        None => Err(SchemaError::new(
            ErrorKind::TypeMismatch,
            format!("type '{}' does not support default values", base_type),
        )),
    }
}

fn validate_callback(raw: &str, base_type: &str) -> Result<DefaultValue, SchemaError> {
    let callback = DefaultCallback::parse(raw).ok_or_else(|| {
        let known: Vec<&str> = DefaultCallback::ALL.iter().map(|c| c.name()).collect();
        SchemaError::new(
            ErrorKind::UnknownCallback,
            format!("unknown callback '{}'; valid callbacks: {}", raw, known.join(", ")),
        )
    })?;

    let scalar = ScalarType::parse(base_type).ok_or_else(|| {
        SchemaError::new(
            ErrorKind::IncompatibleCallback,
            format!("callback '{}' cannot be used with non-scalar type '{}'", raw, base_type),
        )
    })?;

    if !callback.supports(scalar) {
        let compatible: Vec<&str> = callback.compatible_types().iter().map(|t| t.name()).collect();
        return Err(SchemaError::new(
            ErrorKind::IncompatibleCallback,
            format!(
                "callback '{}' is not compatible with type '{}'; compatible types: {}",
                raw,
                base_type,
                compatible.join(", ")
            ),
        ));
    }

    Ok(DefaultValue::Callback(callback))
}

fn validate_array_default(
    raw: &str,
    base_type: &str,
    enums: &EnumRegistry,
) -> Result<DefaultValue, SchemaError> {
    let inner = raw[1..raw.len() - 1].trim();
    if inner.is_empty() {
        return Ok(DefaultValue::Array(Vec::new()));
    }

    let elements = split_array_elements(inner)?;

    let mut validated = Vec::with_capacity(elements.len());
    for (idx, element) in elements.iter().enumerate() {
        let element = element.trim();
        if element.is_empty() {
            return Err(SchemaError::new(
                ErrorKind::BadFormat,
                format!("array element at index {} is empty", idx),
            ));
        }
        if CALLBACK_REGEX.is_match(strip_quotes(element).unwrap_or(element))
            && DefaultCallback::parse(strip_quotes(element).unwrap_or(element)).is_some()
        {
            return Err(SchemaError::new(
                ErrorKind::IncompatibleCallback,
                format!("callbacks are not allowed inside array defaults (element {})", idx),
            ));
        }

        let literal = if enums.contains_key(base_type) {
            validate_enum_default(element, base_type, enums)
        } else if let Some(scalar) = ScalarType::parse(base_type) {
            validate_scalar_default(element, scalar)
        } else {
            Err(SchemaError::new(
                ErrorKind::TypeMismatch,
                format!("unsupported array element type '{}'", base_type),
            ))
        };

        validated.push(literal.map_err(|e| {
            SchemaError::new(e.kind, format!("array element at index {}: {}", idx, e.message))
        })?);
    }

    Ok(DefaultValue::Array(validated))
}

/// Split a one-dimensional array body at top-level commas.
///
/// Quote-aware; rejects stray brackets (nested arrays) and unterminated
/// quotes rather than misreading them.
fn split_array_elements(inner: &str) -> Result<Vec<String>, SchemaError> {
    let mut elements = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for c in inner.chars() {
        match quote {
            Some(q) => {
                current.push(c);
                if escaped {
                    escaped = false;
                } else if c == '\\' {
                    escaped = true;
                } else if c == q {
                    quote = None;
                }
            }
            None => match c {
                '\'' | '"' => {
                    quote = Some(c);
                    current.push(c);
                }
                '[' | ']' => {
                    return Err(SchemaError::new(
                        ErrorKind::NestedArray,
                        "nested arrays are not supported in array defaults",
                    ));
                }
                ',' => {
                    elements.push(current.trim().to_string());
                    current.clear();
                }
                _ => current.push(c),
            },
        }
    }

    if quote.is_some() {
        return Err(SchemaError::new(
            ErrorKind::BadFormat,
            "unterminated quote in array default",
        ));
    }

    elements.push(current.trim().to_string());
    Ok(elements)
}

fn validate_enum_default(
    raw: &str,
    enum_name: &str,
    enums: &EnumRegistry,
) -> Result<LiteralValue, SchemaError> {
    let def = enums.get(enum_name).ok_or_else(|| {
        SchemaError::new(
            ErrorKind::TypeUnknown,
            format!("unknown enum type '{}'", enum_name),
        )
    })?;

    let clean = strip_quotes(raw).unwrap_or(raw);

    if !def.has_value(clean) {
        let known: Vec<&str> = def.value_names().collect();
        return Err(SchemaError::new(
            ErrorKind::EnumValueUnknown,
            format!(
                "'{}' is not a value of enum '{}'; valid values: {}",
                clean,
                enum_name,
                known.join(", ")
            ),
        ));
    }

    Ok(LiteralValue::EnumMember(clean.to_string()))
}

fn validate_scalar_default(raw: &str, scalar: ScalarType) -> Result<LiteralValue, SchemaError> {
    match scalar {
        ScalarType::Int | ScalarType::BigInt | ScalarType::SmallInt => {
            validate_int_default(raw, scalar)
        }
        ScalarType::Float | ScalarType::Numeric => validate_float_default(raw),
        ScalarType::String => Ok(LiteralValue::Text(unescape_text(strip_quotes(raw).unwrap_or(raw)))),
        ScalarType::Boolean => validate_bool_default(raw),
        ScalarType::Char => validate_char_default(raw),
        ScalarType::Date => validate_date_default(raw),
        ScalarType::Timestamp => validate_timestamp_default(raw),
        ScalarType::Json => validate_json_default(raw),
        ScalarType::Bytes => validate_bytes_default(raw),
    }
}

fn validate_int_default(raw: &str, scalar: ScalarType) -> Result<LiteralValue, SchemaError> {
    let clean = strip_quotes(raw).unwrap_or(raw).trim();
    let value: i64 = clean.parse().map_err(|_| {
        SchemaError::new(
            ErrorKind::InvalidLiteral,
            format!("invalid integer default '{}' for type {}", raw, scalar.name()),
        )
    })?;

    let in_range = match scalar {
        ScalarType::SmallInt => i16::try_from(value).is_ok(),
        ScalarType::Int => i32::try_from(value).is_ok(),
        _ => true,
    };
    if !in_range {
        return Err(SchemaError::new(
            ErrorKind::OutOfRange,
            format!("{} default value {} is out of range", scalar.name(), value),
        ));
    }

    Ok(LiteralValue::Int(value))
}

fn validate_float_default(raw: &str) -> Result<LiteralValue, SchemaError> {
    let clean = strip_quotes(raw).unwrap_or(raw).trim();
    let value: f64 = clean.parse().map_err(|_| {
        SchemaError::new(
            ErrorKind::InvalidLiteral,
            format!("invalid numeric default '{}'", raw),
        )
    })?;
    if !value.is_finite() {
        return Err(SchemaError::new(
            ErrorKind::InvalidLiteral,
            format!("numeric default '{}' must be finite", raw),
        ));
    }
    Ok(LiteralValue::Float(value))
}

fn validate_bool_default(raw: &str) -> Result<LiteralValue, SchemaError> {
    let clean = strip_quotes(raw).unwrap_or(raw).trim().to_lowercase();
    match clean.as_str() {
        "true" | "1" | "yes" | "on" => Ok(LiteralValue::Bool(true)),
        "false" | "0" | "no" | "off" => Ok(LiteralValue::Bool(false)),
        _ => Err(SchemaError::new(
            ErrorKind::InvalidLiteral,
            format!(
                "invalid boolean default '{}'; valid values: true, false, 1, 0, yes, no, on, off",
                raw
            ),
        )),
    }
}

fn validate_char_default(raw: &str) -> Result<LiteralValue, SchemaError> {
    let clean = strip_quotes(raw).unwrap_or(raw);

    let resolved = if clean.len() == 2 && clean.starts_with('\\') {
        match clean.as_bytes()[1] {
            b'n' => '\n',
            b't' => '\t',
            b'r' => '\r',
            b'\\' => '\\',
            b'\'' => '\'',
            b'"' => '"',
            _ => {
                return Err(SchemaError::new(
                    ErrorKind::BadFormat,
                    format!("invalid escape sequence in char default: {}", clean),
                ))
            }
        }
    } else {
        let mut chars = clean.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => c,
            _ => {
                return Err(SchemaError::new(
                    ErrorKind::InvalidLiteral,
                    format!("char default must be exactly one character, got '{}'", clean),
                ))
            }
        }
    };

    Ok(LiteralValue::Char(resolved))
}

fn validate_date_default(raw: &str) -> Result<LiteralValue, SchemaError> {
    let clean = strip_quotes(raw).unwrap_or(raw).trim();

    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(clean, format) {
            return Ok(LiteralValue::Date(date.format("%Y-%m-%d").to_string()));
        }
    }

    Err(SchemaError::new(
        ErrorKind::BadFormat,
        format!(
            "invalid date default '{}'; supported formats: YYYY-MM-DD, MM/DD/YYYY, DD-MM-YYYY, YYYY/MM/DD",
            raw
        ),
    ))
}

fn validate_timestamp_default(raw: &str) -> Result<LiteralValue, SchemaError> {
    let clean = strip_quotes(raw).unwrap_or(raw).trim();

    if DateTime::parse_from_rfc3339(clean).is_ok() {
        return Ok(LiteralValue::Timestamp(clean.to_string()));
    }
    for format in TIMESTAMP_FORMATS {
        if NaiveDateTime::parse_from_str(clean, format).is_ok() {
            return Ok(LiteralValue::Timestamp(clean.to_string()));
        }
    }

    Err(SchemaError::new(
        ErrorKind::BadFormat,
        format!(
            "invalid timestamp default '{}'; expected RFC3339 or YYYY-MM-DD[ T]HH:MM:SS[.fff]",
            raw
        ),
    ))
}

fn validate_json_default(raw: &str) -> Result<LiteralValue, SchemaError> {
    let clean = strip_quotes(raw).unwrap_or(raw).trim();
    let value: serde_json::Value = serde_json::from_str(clean).map_err(|e| {
        SchemaError::new(
            ErrorKind::InvalidLiteral,
            format!("invalid JSON default '{}': {}", raw, e),
        )
    })?;
    Ok(LiteralValue::Json(value.to_string()))
}

fn validate_bytes_default(raw: &str) -> Result<LiteralValue, SchemaError> {
    let clean = strip_quotes(raw.trim()).unwrap_or(raw.trim()).trim();

    // `\x...` is the canonical stored form; accept it back on re-parse.
    let bytes = if let Some(hex) = clean
        .strip_prefix("0x")
        .or_else(|| clean.strip_prefix("0X"))
        .or_else(|| clean.strip_prefix("\\x"))
    {
        if hex.len() % 2 != 0 {
            return Err(SchemaError::new(
                ErrorKind::BadFormat,
                format!("hex byte string must have even length: {}", clean),
            ));
        }
        decode_hex(hex).ok_or_else(|| {
            SchemaError::new(
                ErrorKind::InvalidLiteral,
                format!("invalid hex byte default '{}'", raw),
            )
        })?
    } else {
        STANDARD
            .decode(clean)
            .or_else(|_| URL_SAFE.decode(clean))
            .map_err(|_| {
                SchemaError::new(
                    ErrorKind::InvalidLiteral,
                    format!("invalid base64 byte default '{}'", raw),
                )
            })?
    };

    let mut literal = String::with_capacity(2 + bytes.len() * 2);
    literal.push_str("\\x");
    for b in bytes {
        literal.push_str(&format!("{:02x}", b));
    }
    Ok(LiteralValue::Bytes(literal))
}

fn decode_hex(hex: &str) -> Option<Vec<u8>> {
    (0..hex.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(hex.get(i..i + 2)?, 16).ok())
        .collect()
}

/// Return the body of a fully single- or double-quoted string, if any.
fn strip_quotes(s: &str) -> Option<&str> {
    let bytes = s.as_bytes();
    if bytes.len() >= 2 {
        let first = bytes[0];
        let last = bytes[bytes.len() - 1];
        if (first == b'"' && last == b'"') || (first == b'\'' && last == b'\'') {
            return Some(&s[1..s.len() - 1]);
        }
    }
    None
}

fn unescape_text(s: &str) -> String {
    s.replace("\\\"", "\"").replace("\\'", "'").replace("\\\\", "\\")
}
