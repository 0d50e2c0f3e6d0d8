//! Transpiler test modules.
//!
//! Tests are organized by category:
//! - `core`: SELECT, COUNT, UPDATE, DELETE, INSERT on the default dialect
//! - `dialects`: quoting, literals and LIMIT forms per dialect

mod core;

use crate::ast::{BackendId, DataType, Model, Selection, SourceRef};

pub(super) fn users_model() -> Model {
    Model::new("users")
        .key("id", DataType::serial())
        .field("name", DataType::string())
        .field("age", DataType::int())
        .field("active", DataType::Boolean)
        .field("group", DataType::string())
}

pub(super) fn posts_model() -> Model {
    Model::new("posts")
        .key("id", DataType::serial())
        .field("user_id", DataType::int())
        .field("title", DataType::string())
}

pub(super) fn users() -> Selection {
    Selection::new(SourceRef::new(BackendId(1), users_model()))
}

pub(super) fn posts_source() -> SourceRef {
    SourceRef::new(BackendId(1), posts_model())
}
