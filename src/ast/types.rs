use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::ast::Value;

/// Storage width of an integer column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum IntWidth {
    Tiny,
    Small,
    #[default]
    Normal,
    Big,
}

/// A named enumeration and its allowed variants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnumType {
    pub name: String,
    pub variants: Vec<String>,
}

/// Column / literal data types.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataType {
    Boolean,
    Integer {
        signed: bool,
        width: IntWidth,
        /// Auto-incremented by the backend.
        serial: bool,
    },
    Float,
    String {
        max_length: Option<usize>,
    },
    Text {
        nullable: bool,
    },
    Date,
    DateTime,
    Binary,
    /// Aggregate value (arrays and nested objects), stored as JSON.
    Object,
    Enum(EnumType),
}

impl DataType {
    /// Signed, normal-width integer.
    pub fn int() -> Self {
        DataType::Integer {
            signed: true,
            width: IntWidth::Normal,
            serial: false,
        }
    }

    /// Auto-incrementing big integer, the usual primary key type.
    pub fn serial() -> Self {
        DataType::Integer {
            signed: true,
            width: IntWidth::Big,
            serial: true,
        }
    }

    pub fn string() -> Self {
        DataType::String { max_length: None }
    }

    pub fn text() -> Self {
        DataType::Text { nullable: false }
    }

    /// The canonical placeholder code, without the leading `%`.
    pub fn code(&self) -> &str {
        match self {
            DataType::Boolean => "b",
            DataType::Integer { .. } => "i",
            DataType::Float => "f",
            DataType::String { .. } => "s",
            DataType::Text { .. } => "t",
            DataType::Date => "date",
            DataType::DateTime => "d",
            DataType::Binary => "n",
            DataType::Object => "object",
            DataType::Enum(e) => &e.name,
        }
    }

    /// Resolve a placeholder code (`i`, `int`, `%s`, an enum name, ...).
    pub fn from_code(code: &str, registry: &TypeRegistry) -> Option<Self> {
        let code = code.strip_prefix('%').unwrap_or(code);
        let resolved = match code {
            "b" | "bool" | "boolean" => DataType::Boolean,
            "i" | "int" | "integer" => DataType::int(),
            "f" | "float" => DataType::Float,
            "s" | "str" | "string" => DataType::string(),
            "t" | "text" => DataType::text(),
            "date" => DataType::Date,
            "d" | "datetime" => DataType::DateTime,
            "n" | "bin" | "binary" => DataType::Binary,
            "object" => DataType::Object,
            other => return registry.get(other).cloned().map(DataType::Enum),
        };
        Some(resolved)
    }

    /// Type a bare `?` placeholder takes for a runtime value.
    pub fn infer(value: &Value) -> Self {
        match value {
            Value::Bool(_) => DataType::Boolean,
            Value::Int(_) => DataType::int(),
            Value::Float(_) => DataType::Float,
            Value::Array(_) | Value::Object(_) => DataType::Object,
            _ => DataType::text(),
        }
    }
}

impl std::fmt::Display for DataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "%{}", self.code())
    }
}

/// Enum descriptors available to `%EnumName` placeholders.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeRegistry {
    enums: BTreeMap<String, EnumType>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an enum under its name, replacing an earlier one.
    pub fn register_enum<I, S>(mut self, name: impl Into<String>, variants: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let name = name.into();
        let variants = variants.into_iter().map(Into::into).collect();
        self.enums.insert(name.clone(), EnumType { name, variants });
        self
    }

    pub fn get(&self, name: &str) -> Option<&EnumType> {
        self.enums.get(name)
    }
}
