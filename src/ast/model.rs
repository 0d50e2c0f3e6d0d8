use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::ast::DataType;

/// Identity of a storage backend (one connection, one in-memory store).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BackendId(pub u64);

static NEXT_BACKEND: AtomicU64 = AtomicU64::new(1);

impl BackendId {
    /// Allocate an id no other backend in this process holds.
    pub fn fresh() -> Self {
        BackendId(NEXT_BACKEND.fetch_add(1, Ordering::Relaxed))
    }
}

/// Schema of a record source: table name, typed fields, primary key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Model {
    pub name: String,
    pub fields: Vec<(String, DataType)>,
    #[serde(default)]
    pub primary_key: Option<String>,
}

impl Model {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
            primary_key: None,
        }
    }

    /// Add a field.
    pub fn field(mut self, name: impl Into<String>, data_type: DataType) -> Self {
        self.fields.push((name.into(), data_type));
        self
    }

    /// Add the primary key field.
    pub fn key(mut self, name: impl Into<String>, data_type: DataType) -> Self {
        let name = name.into();
        self.primary_key = Some(name.clone());
        self.fields.push((name, data_type));
        self
    }

    pub fn field_type(&self, name: &str) -> Option<&DataType> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, t)| t)
    }

    /// Field lookup ignoring ASCII case; returns the declared name.
    pub fn find_field(&self, name: &str, case_sensitive: bool) -> Option<(&str, &DataType)> {
        self.fields
            .iter()
            .find(|(n, _)| {
                if case_sensitive {
                    n == name
                } else {
                    n.eq_ignore_ascii_case(name)
                }
            })
            .map(|(n, t)| (n.as_str(), t))
    }

    /// The primary key when the backend generates it.
    pub fn serial_key(&self) -> Option<&str> {
        let key = self.primary_key.as_deref()?;
        match self.field_type(key) {
            Some(DataType::Integer { serial: true, .. }) => Some(key),
            _ => None,
        }
    }
}

/// Non-owning handle a selection keeps to the source it reads from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceRef {
    pub backend: BackendId,
    pub model: Model,
}

impl SourceRef {
    pub fn new(backend: BackendId, model: Model) -> Self {
        Self { backend, model }
    }

    pub fn name(&self) -> &str {
        &self.model.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_backends_differ() {
        assert_ne!(BackendId::fresh(), BackendId::fresh());
    }

    #[test]
    fn test_model_lookup() {
        let model = Model::new("users")
            .key("id", DataType::serial())
            .field("UserName", DataType::string());
        assert_eq!(model.serial_key(), Some("id"));
        assert_eq!(model.find_field("username", false).map(|(n, _)| n), Some("UserName"));
        assert!(model.find_field("username", true).is_none());
    }
}
