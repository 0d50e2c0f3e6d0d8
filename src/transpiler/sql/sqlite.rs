use crate::ast::{DataType, Value};
use crate::error::QueryResult;
use crate::transpiler::Dialect;
use crate::transpiler::traits::{
    decode_standard, encode_standard, quote_dotted, quote_encoded, quote_identifier, BytesStyle,
    LiteralStyle, Quoter, SqlGenerator, TypeAdapter,
};

const STYLE: LiteralStyle = LiteralStyle {
    backslash_escapes: false,
    bytes: BytesStyle::HexString,
};

/// SQLite Generator.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteGenerator;

impl SqliteGenerator {
    pub fn new() -> Self {
        Self
    }
}

impl Quoter for SqliteGenerator {
    fn quote_literal(&self, data_type: &DataType, value: &Value) -> QueryResult<String> {
        Ok(quote_encoded(&self.encode(data_type, value)?, &STYLE))
    }

    fn quote_model(&self, name: &str) -> String {
        quote_dotted(name, '"', '"')
    }

    fn quote_field(&self, name: &str) -> String {
        quote_identifier(name, '"', '"')
    }
}

impl TypeAdapter for SqliteGenerator {
    fn encode(&self, data_type: &DataType, value: &Value) -> QueryResult<Value> {
        encode_standard(data_type, value, true)
    }

    fn decode(&self, data_type: &DataType, value: &Value) -> QueryResult<Value> {
        decode_standard(data_type, value)
    }
}

impl SqlGenerator for SqliteGenerator {
    fn dialect(&self) -> Dialect {
        Dialect::SQLite
    }

    fn limit_offset(&self, limit: Option<usize>, offset: usize, _ordered: bool) -> String {
        match (limit, offset) {
            (Some(n), 0) => format!(" LIMIT {}", n),
            (Some(n), o) => format!(" LIMIT {} OFFSET {}", n, o),
            (None, 0) => String::new(),
            (None, o) => format!(" LIMIT -1 OFFSET {}", o),
        }
    }
}
