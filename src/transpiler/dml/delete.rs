//! DELETE SQL generation.

use crate::ast::*;
use crate::error::QueryResult;
use crate::transpiler::Compiler;
use crate::transpiler::dml::{aliased_table, is_unfiltered, mutation_tail};

/// Generate DELETE SQL.
pub fn build_delete(selection: &DeleteSelection, compiler: &Compiler) -> QueryResult<String> {
    let generator = compiler.generator();
    let shape = &selection.shape;

    if is_unfiltered(&shape.predicate) && shape.limit.is_none() {
        tracing::warn!(table = %shape.source.name(), "DELETE without a filter removes every row");
    }

    let mut sql = match &shape.alias {
        Some(alias) if generator.mutation_alias_in_from() => {
            format!("DELETE {} FROM {}", generator.quote_model(alias), aliased_table(shape, generator))
        }
        _ => format!("DELETE FROM {}", aliased_table(shape, generator)),
    };
    sql.push_str(&mutation_tail(shape, compiler)?);
    Ok(sql)
}
