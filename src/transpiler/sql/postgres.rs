use crate::ast::{DataType, Value};
use crate::error::QueryResult;
use crate::transpiler::Dialect;
use crate::transpiler::traits::{
    decode_standard, encode_standard, quote_dotted, quote_encoded, quote_identifier, BytesStyle,
    KeyRetrieval, LiteralStyle, Quoter, SqlGenerator, TypeAdapter,
};

const STYLE: LiteralStyle = LiteralStyle {
    backslash_escapes: false,
    bytes: BytesStyle::Bytea,
};

/// PostgreSQL Generator.
#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresGenerator;

impl PostgresGenerator {
    pub fn new() -> Self {
        Self
    }
}

impl Quoter for PostgresGenerator {
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

impl TypeAdapter for PostgresGenerator {
    fn encode(&self, data_type: &DataType, value: &Value) -> QueryResult<Value> {
        encode_standard(data_type, value, false)
    }

    fn decode(&self, data_type: &DataType, value: &Value) -> QueryResult<Value> {
        decode_standard(data_type, value)
    }
}

impl SqlGenerator for PostgresGenerator {
    fn dialect(&self) -> Dialect {
        Dialect::Postgres
    }

    fn limit_offset(&self, limit: Option<usize>, offset: usize, _ordered: bool) -> String {
        let mut sql = String::new();
        if let Some(n) = limit {
            sql.push_str(&format!(" LIMIT {}", n));
        }
        if offset > 0 {
            sql.push_str(&format!(" OFFSET {}", offset));
        }
        sql
    }

    fn key_retrieval(&self) -> KeyRetrieval {
        KeyRetrieval::Returning
    }
}
