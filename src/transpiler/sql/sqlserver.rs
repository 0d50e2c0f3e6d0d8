use crate::ast::{DataType, Value};
use crate::error::QueryResult;
use crate::transpiler::Dialect;
use crate::transpiler::traits::{
    decode_standard, encode_standard, quote_dotted, quote_encoded, quote_identifier, BytesStyle,
    KeyRetrieval, LiteralStyle, Quoter, SqlGenerator, TypeAdapter,
};

const STYLE: LiteralStyle = LiteralStyle {
    backslash_escapes: false,
    bytes: BytesStyle::HexNumber,
};

/// SQL Server Generator.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqlServerGenerator;

impl SqlServerGenerator {
    pub fn new() -> Self {
        Self
    }
}

impl Quoter for SqlServerGenerator {
    fn quote_literal(&self, data_type: &DataType, value: &Value) -> QueryResult<String> {
        let encoded = self.encode(data_type, value)?;
        Ok(match encoded {
            // N'' keeps non-latin text intact
            Value::String(_) => format!("N{}", quote_encoded(&encoded, &STYLE)),
            other => quote_encoded(&other, &STYLE),
        })
    }

    fn quote_model(&self, name: &str) -> String {
        quote_dotted(name, '[', ']')
    }

    fn quote_field(&self, name: &str) -> String {
        quote_identifier(name, '[', ']')
    }
}

impl TypeAdapter for SqlServerGenerator {
    fn encode(&self, data_type: &DataType, value: &Value) -> QueryResult<Value> {
        encode_standard(data_type, value, true)
    }

    fn decode(&self, data_type: &DataType, value: &Value) -> QueryResult<Value> {
        decode_standard(data_type, value)
    }
}

impl SqlGenerator for SqlServerGenerator {
    fn dialect(&self) -> Dialect {
        Dialect::SqlServer
    }

    fn limit_offset(&self, limit: Option<usize>, offset: usize, ordered: bool) -> String {
        if limit.is_none() && offset == 0 {
            return String::new();
        }
        // OFFSET/FETCH requires an ORDER BY
        let mut sql = if ordered {
            String::new()
        } else {
            " ORDER BY (SELECT NULL)".to_string()
        };
        sql.push_str(&format!(" OFFSET {} ROWS", offset));
        if let Some(n) = limit {
            sql.push_str(&format!(" FETCH NEXT {} ROWS ONLY", n));
        }
        sql
    }

    fn key_retrieval(&self) -> KeyRetrieval {
        KeyRetrieval::Output
    }

    fn mutation_alias_in_from(&self) -> bool {
        true
    }
}
