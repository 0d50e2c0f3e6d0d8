//! Transpiler traits and utilities.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::ast::{DataType, Value};
use crate::error::{QueryError, QueryResult};
use crate::transpiler::Dialect;

/// Dialect-specific identifier and literal quoting.
pub trait Quoter {
    /// Encode `value` as `data_type` and quote it as a SQL literal.
    fn quote_literal(&self, data_type: &DataType, value: &Value) -> QueryResult<String>;
    /// Quote a table / model name (dotted names are quoted per part).
    fn quote_model(&self, name: &str) -> String;
    /// Quote a column name.
    fn quote_field(&self, name: &str) -> String;
}

/// Dialect-specific conversion between typed values and backend values.
pub trait TypeAdapter {
    fn encode(&self, data_type: &DataType, value: &Value) -> QueryResult<Value>;
    fn decode(&self, data_type: &DataType, value: &Value) -> QueryResult<Value>;
}

/// How a driver reads back a generated primary key after INSERT.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeyRetrieval {
    /// `... RETURNING "id"`, the key comes back as a row
    Returning,
    /// `OUTPUT INSERTED.[id]`, the key comes back as a row
    Output,
    /// Ask the connection for its last insert id
    LastInsertId,
}

/// Column to read back after an INSERT, and how.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedKey {
    pub column: String,
    pub retrieval: KeyRetrieval,
}

/// Trait for dialect-specific SQL generation.
pub trait SqlGenerator: Quoter + TypeAdapter {
    fn dialect(&self) -> Dialect;
    /// LIMIT/OFFSET tail; `ordered` tells whether an ORDER BY was emitted.
    fn limit_offset(&self, limit: Option<usize>, offset: usize, ordered: bool) -> String;
    /// Whether result column names must match schema fields exactly.
    fn case_sensitive_fields(&self) -> bool {
        true
    }
    fn key_retrieval(&self) -> KeyRetrieval {
        KeyRetrieval::LastInsertId
    }
    /// Whether UPDATE/DELETE accept ORDER BY ... LIMIT directly.
    fn supports_mutation_limit(&self) -> bool {
        false
    }
    /// Whether an aliased UPDATE/DELETE names its table in a FROM clause
    /// (`UPDATE a SET ... FROM t AS a`) instead of aliasing it in place.
    fn mutation_alias_in_from(&self) -> bool {
        false
    }
}

/// Quote `name` between `open`/`close`, doubling embedded closers.
pub fn quote_identifier(name: &str, open: char, close: char) -> String {
    let escaped = name.replace(close, &format!("{}{}", close, close));
    format!("{}{}{}", open, escaped, close)
}

/// Quote each dotted part of a model name.
pub fn quote_dotted(name: &str, open: char, close: char) -> String {
    name.split('.')
        .map(|part| quote_identifier(part, open, close))
        .collect::<Vec<_>>()
        .join(".")
}

/// Byte literal syntax.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BytesStyle {
    /// X'0a0b'
    HexString,
    /// '\x0a0b'::bytea
    Bytea,
    /// 0x0a0b
    HexNumber,
}

/// Literal quoting rules of a dialect.
#[derive(Debug, Clone, Copy)]
pub struct LiteralStyle {
    pub backslash_escapes: bool,
    pub bytes: BytesStyle,
}

/// Quote a string literal.
pub fn quote_string(s: &str, style: &LiteralStyle) -> String {
    let mut escaped = s.replace('\'', "''");
    if style.backslash_escapes {
        escaped = escaped.replace('\\', "\\\\");
    }
    format!("'{}'", escaped)
}

/// Quote an already-encoded backend value.
pub fn quote_encoded(value: &Value, style: &LiteralStyle) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Bool(b) => if *b { "TRUE" } else { "FALSE" }.to_string(),
        Value::Int(n) => n.to_string(),
        Value::Float(n) if n.is_finite() => format!("{:?}", n),
        Value::Float(_) => "NULL".to_string(),
        Value::String(s) => quote_string(s, style),
        Value::Bytes(b) => {
            let hex: String = b.iter().map(|byte| format!("{:02x}", byte)).collect();
            match style.bytes {
                BytesStyle::HexString => format!("X'{}'", hex),
                BytesStyle::Bytea => format!("'\\x{}'::bytea", hex),
                BytesStyle::HexNumber => format!("0x{}", hex),
            }
        }
        Value::Date(_) | Value::DateTime(_) => quote_string(&value.to_string(), style),
        Value::Array(items) => {
            let parts: Vec<String> = items.iter().map(|v| quote_encoded(v, style)).collect();
            format!("({})", parts.join(", "))
        }
        Value::Object(_) => quote_string(&value.to_json().to_string(), style),
    }
}

const DATE_FORMAT: &str = "%Y-%m-%d";
const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

fn mismatch(data_type: &DataType, value: &Value) -> QueryError {
    QueryError::invalid(format!("cannot represent {:?} as {}", value, data_type))
}

fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s.get(..10).unwrap_or(s), DATE_FORMAT).ok()
}

fn parse_datetime(s: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f"))
        .ok()
        .or_else(|| parse_date(s).and_then(|d| d.and_hms_opt(0, 0, 0)))
}

fn to_bool(data_type: &DataType, value: &Value) -> QueryResult<bool> {
    match value {
        Value::Bool(b) => Ok(*b),
        Value::Int(n) => Ok(*n != 0),
        Value::String(s) => match s.to_ascii_lowercase().as_str() {
            "1" | "t" | "true" | "y" | "yes" => Ok(true),
            "0" | "f" | "false" | "n" | "no" => Ok(false),
            _ => Err(mismatch(data_type, value)),
        },
        _ => Err(mismatch(data_type, value)),
    }
}

fn to_int(data_type: &DataType, value: &Value) -> QueryResult<i64> {
    match value {
        Value::Int(n) => Ok(*n),
        Value::Bool(b) => Ok(*b as i64),
        Value::Float(f) if f.fract() == 0.0 => Ok(*f as i64),
        Value::String(s) => s.trim().parse().map_err(|_| mismatch(data_type, value)),
        _ => Err(mismatch(data_type, value)),
    }
}

fn to_float(data_type: &DataType, value: &Value) -> QueryResult<f64> {
    match value {
        Value::Float(f) => Ok(*f),
        Value::Int(n) => Ok(*n as f64),
        Value::String(s) => s.trim().parse().map_err(|_| mismatch(data_type, value)),
        _ => Err(mismatch(data_type, value)),
    }
}

fn check_enum(data_type: &DataType, value: &Value) -> QueryResult<String> {
    let DataType::Enum(e) = data_type else {
        return Err(mismatch(data_type, value));
    };
    match value {
        Value::String(s) if e.variants.iter().any(|v| v == s) => Ok(s.clone()),
        _ => Err(QueryError::invalid(format!(
            "{} is not a variant of {}",
            value, e.name
        ))),
    }
}

/// Encoding shared by the SQL dialects. Booleans become 1/0 when
/// `bool_as_int`, dates become ISO strings, objects become JSON text.
pub fn encode_standard(data_type: &DataType, value: &Value, bool_as_int: bool) -> QueryResult<Value> {
    if value.is_null() {
        return Ok(Value::Null);
    }
    let encoded = match data_type {
        DataType::Boolean => {
            let b = to_bool(data_type, value)?;
            if bool_as_int { Value::Int(b as i64) } else { Value::Bool(b) }
        }
        DataType::Integer { signed, .. } => {
            let n = to_int(data_type, value)?;
            if !signed && n < 0 {
                return Err(QueryError::invalid(format!("{} is negative for an unsigned column", n)));
            }
            Value::Int(n)
        }
        DataType::Float => Value::Float(to_float(data_type, value)?),
        DataType::String { max_length } => {
            let s = value.to_text();
            if let Some(max) = max_length {
                if s.chars().count() > *max {
                    return Err(QueryError::invalid(format!(
                        "string of {} characters exceeds {}",
                        s.chars().count(),
                        max
                    )));
                }
            }
            Value::String(s)
        }
        DataType::Text { .. } => Value::String(value.to_text()),
        DataType::Date => match value {
            Value::Date(d) => Value::String(d.format(DATE_FORMAT).to_string()),
            Value::DateTime(d) => Value::String(d.date().format(DATE_FORMAT).to_string()),
            Value::String(s) => match parse_date(s) {
                Some(d) => Value::String(d.format(DATE_FORMAT).to_string()),
                None => return Err(mismatch(data_type, value)),
            },
            _ => return Err(mismatch(data_type, value)),
        },
        DataType::DateTime => {
            let dt = match value {
                Value::DateTime(d) => *d,
                Value::Date(d) => d.and_hms_opt(0, 0, 0).ok_or_else(|| mismatch(data_type, value))?,
                Value::String(s) => parse_datetime(s).ok_or_else(|| mismatch(data_type, value))?,
                _ => return Err(mismatch(data_type, value)),
            };
            Value::String(dt.format(DATETIME_FORMAT).to_string())
        }
        DataType::Binary => match value {
            Value::Bytes(b) => Value::Bytes(b.clone()),
            Value::String(s) => Value::Bytes(s.as_bytes().to_vec()),
            _ => return Err(mismatch(data_type, value)),
        },
        DataType::Object => Value::String(value.to_json().to_string()),
        DataType::Enum(_) => Value::String(check_enum(data_type, value)?),
    };
    Ok(encoded)
}

/// Decoding shared by the SQL dialects; accepts the loose shapes drivers return.
pub fn decode_standard(data_type: &DataType, value: &Value) -> QueryResult<Value> {
    if value.is_null() {
        return Ok(Value::Null);
    }
    let decoded = match data_type {
        DataType::Boolean => Value::Bool(to_bool(data_type, value)?),
        DataType::Integer { .. } => Value::Int(to_int(data_type, value)?),
        DataType::Float => Value::Float(to_float(data_type, value)?),
        DataType::String { .. } | DataType::Text { .. } => Value::String(value.to_text()),
        DataType::Date => match value {
            Value::Date(d) => Value::Date(*d),
            Value::DateTime(d) => Value::Date(d.date()),
            Value::String(s) => Value::Date(parse_date(s).ok_or_else(|| mismatch(data_type, value))?),
            _ => return Err(mismatch(data_type, value)),
        },
        DataType::DateTime => match value {
            Value::DateTime(d) => Value::DateTime(*d),
            Value::Date(d) => Value::DateTime(d.and_hms_opt(0, 0, 0).ok_or_else(|| mismatch(data_type, value))?),
            Value::String(s) => Value::DateTime(parse_datetime(s).ok_or_else(|| mismatch(data_type, value))?),
            _ => return Err(mismatch(data_type, value)),
        },
        DataType::Binary => match value {
            Value::Bytes(b) => Value::Bytes(b.clone()),
            Value::String(s) => Value::Bytes(s.as_bytes().to_vec()),
            _ => return Err(mismatch(data_type, value)),
        },
        DataType::Object => match value {
            Value::String(s) => {
                let json: serde_json::Value = serde_json::from_str(s)
                    .map_err(|e| QueryError::invalid(format!("bad JSON column: {}", e)))?;
                Value::from(json)
            }
            Value::Array(_) | Value::Object(_) => value.clone(),
            _ => return Err(mismatch(data_type, value)),
        },
        DataType::Enum(_) => Value::String(check_enum(data_type, &Value::String(value.to_text()))?),
    };
    Ok(decoded)
}

/// Adapter for values that never leave the process: decode coerces into
/// the declared type, encode is the identity for well-typed values.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeAdapter;

impl TypeAdapter for NativeAdapter {
    fn encode(&self, data_type: &DataType, value: &Value) -> QueryResult<Value> {
        self.decode(data_type, value)
    }

    fn decode(&self, data_type: &DataType, value: &Value) -> QueryResult<Value> {
        decode_standard(data_type, value)
    }
}
