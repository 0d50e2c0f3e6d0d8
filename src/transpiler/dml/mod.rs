//! DML (Data Manipulation Language) SQL generation.

pub mod delete;
pub mod insert;
pub mod select;
pub mod update;

use crate::ast::{Predicate, Shape};
use crate::error::{QueryError, QueryResult};
use crate::transpiler::{Compiler, SqlGenerator};

/// `<table> [AS <alias>]`.
pub(crate) fn aliased_table(shape: &Shape, generator: &dyn SqlGenerator) -> String {
    let table = generator.quote_model(shape.source.name());
    match &shape.alias {
        Some(alias) => format!("{} AS {}", table, generator.quote_model(alias)),
        None => table,
    }
}

/// WHERE / ORDER BY / LIMIT tail shared by UPDATE and DELETE.
///
/// Dialects that cannot bound a mutation directly get the rows picked by
/// primary key instead: `WHERE pk IN (SELECT pk FROM (...) AS subset)`.
pub(crate) fn mutation_tail(shape: &Shape, compiler: &Compiler) -> QueryResult<String> {
    let bounded = shape.limit.is_some() || shape.offset > 0;
    let generator = compiler.generator();

    if !bounded {
        let mut sql = compiler.where_sql(&shape.predicate)?;
        if generator.supports_mutation_limit() {
            sql.push_str(&compiler.order_sql(&shape.ordering)?);
        }
        return Ok(sql);
    }

    if generator.supports_mutation_limit() && shape.offset == 0 {
        let mut sql = compiler.where_sql(&shape.predicate)?;
        sql.push_str(&compiler.order_sql(&shape.ordering)?);
        sql.push_str(&generator.limit_offset(shape.limit, 0, !shape.ordering.is_empty()));
        return Ok(sql);
    }

    let model = &shape.source.model;
    let key = model.primary_key.as_deref().ok_or_else(|| {
        QueryError::Unsupported(format!(
            "bounded UPDATE/DELETE on {} needs a primary key for {}",
            model.name,
            compiler.dialect()
        ))
    })?;
    let key_sql = generator.quote_field(key);
    let mut inner = format!("SELECT {} FROM {}", key_sql, aliased_table(shape, generator));
    inner.push_str(&compiler.where_sql(&shape.predicate)?);
    inner.push_str(&compiler.order_sql(&shape.ordering)?);
    inner.push_str(&generator.limit_offset(shape.limit, shape.offset, !shape.ordering.is_empty()));

    let subset = generator.quote_model("subset");
    Ok(format!(
        " WHERE {} IN (SELECT {} FROM ({}) AS {})",
        key_sql, key_sql, inner, subset
    ))
}

/// True when nothing would be emitted for `predicate`.
pub(crate) fn is_unfiltered(predicate: &Predicate) -> bool {
    !predicate.has_clauses()
}
