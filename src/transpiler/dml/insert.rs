//! INSERT / REPLACE SQL generation.

use crate::ast::*;
use crate::error::{QueryError, QueryResult};
use crate::transpiler::{Compiler, Dialect, GeneratedKey, KeyRetrieval};

/// A compiled INSERT and the key column the driver should read back.
#[derive(Debug, Clone, PartialEq)]
pub struct InsertStatement {
    pub sql: String,
    pub key: Option<GeneratedKey>,
}

/// Generate INSERT SQL. With `replace`, rows whose primary key exists are
/// overwritten (`REPLACE INTO`, or `ON CONFLICT ... DO UPDATE` on Postgres).
pub fn build_insert(
    source: &SourceRef,
    records: &[Record],
    replace: bool,
    compiler: &Compiler,
) -> QueryResult<InsertStatement> {
    let generator = compiler.generator();
    let model = &source.model;
    let dialect = compiler.dialect();

    let Some(first) = records.first() else {
        return Err(QueryError::invalid(format!("INSERT into {} without rows", model.name)));
    };
    let columns: Vec<&String> = first.keys().collect();
    for record in records {
        if record.len() != columns.len() || !columns.iter().all(|c| record.contains_key(c.as_str())) {
            return Err(QueryError::invalid(format!(
                "every row inserted into {} must set the same fields",
                model.name
            )));
        }
    }

    // key is only generated when the rows leave it out
    let key = model
        .serial_key()
        .filter(|k| !first.contains_key(*k))
        .map(|k| GeneratedKey {
            column: k.to_string(),
            retrieval: generator.key_retrieval(),
        });

    let verb = match (replace, dialect) {
        (false, _) | (true, Dialect::Postgres) => "INSERT INTO",
        (true, Dialect::MySQL) | (true, Dialect::SQLite) => "REPLACE INTO",
        (true, Dialect::SqlServer) => {
            return Err(QueryError::Unsupported("REPLACE on SQL Server".to_string()));
        }
    };

    let mut sql = format!("{} {}", verb, generator.quote_model(&model.name));

    let output = match &key {
        Some(GeneratedKey {
            column,
            retrieval: KeyRetrieval::Output,
        }) => format!(" OUTPUT INSERTED.{}", generator.quote_field(column)),
        _ => String::new(),
    };

    if columns.is_empty() {
        if records.len() > 1 {
            return Err(QueryError::invalid("several rows without fields".to_string()));
        }
        if dialect == Dialect::MySQL {
            sql.push_str(" () VALUES ()");
        } else {
            sql.push_str(&output);
            sql.push_str(" DEFAULT VALUES");
        }
    } else {
        let names: Vec<String> = columns.iter().map(|c| generator.quote_field(c)).collect();
        sql.push_str(&format!(" ({})", names.join(", ")));
        sql.push_str(&output);

        let rows = records
            .iter()
            .map(|record| {
                let values = columns
                    .iter()
                    .map(|c| {
                        let value = record.get(c.as_str()).unwrap_or(&Value::Null);
                        compiler.field_literal(model, c, value)
                    })
                    .collect::<QueryResult<Vec<_>>>()?;
                Ok(format!("({})", values.join(", ")))
            })
            .collect::<QueryResult<Vec<_>>>()?;
        sql.push_str(" VALUES ");
        sql.push_str(&rows.join(", "));
    }

    if replace && dialect == Dialect::Postgres {
        let pk = model.primary_key.as_deref().ok_or_else(|| {
            QueryError::Unsupported(format!("upsert into {} needs a primary key", model.name))
        })?;
        let updates: Vec<String> = columns
            .iter()
            .filter(|c| c.as_str() != pk)
            .map(|c| format!("{} = EXCLUDED.{}", generator.quote_field(c), generator.quote_field(c)))
            .collect();
        if updates.is_empty() {
            sql.push_str(&format!(" ON CONFLICT ({}) DO NOTHING", generator.quote_field(pk)));
        } else {
            sql.push_str(&format!(
                " ON CONFLICT ({}) DO UPDATE SET {}",
                generator.quote_field(pk),
                updates.join(", ")
            ));
        }
    }

    if let Some(GeneratedKey {
        column,
        retrieval: KeyRetrieval::Returning,
    }) = &key
    {
        sql.push_str(&format!(" RETURNING {}", generator.quote_field(column)));
    }

    Ok(InsertStatement { sql, key })
}
