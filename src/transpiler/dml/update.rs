//! UPDATE SQL generation.

use crate::ast::*;
use crate::error::{QueryError, QueryResult};
use crate::transpiler::Compiler;
use crate::transpiler::dml::{aliased_table, mutation_tail};

/// Generate UPDATE SQL.
pub fn build_update(selection: &UpdateSelection, compiler: &Compiler) -> QueryResult<String> {
    let generator = compiler.generator();
    let shape = &selection.shape;
    let model = &shape.source.model;

    if selection.sets.is_empty() {
        return Err(QueryError::invalid(format!("UPDATE of {} assigns nothing", model.name)));
    }

    let mut sql = String::from("UPDATE ");
    let from = match &shape.alias {
        Some(alias) if generator.mutation_alias_in_from() => {
            sql.push_str(&generator.quote_model(alias));
            Some(aliased_table(shape, generator))
        }
        _ => {
            sql.push_str(&aliased_table(shape, generator));
            None
        }
    };

    // SET clause
    let assignments = selection
        .sets
        .iter()
        .map(|(field, value)| {
            let rhs = match value {
                SetValue::Value(v) => compiler.field_literal(model, field, v)?,
                SetValue::Raw(fragment) => compiler.fragment_sql(fragment)?,
            };
            Ok(format!("{} = {}", generator.quote_field(field), rhs))
        })
        .collect::<QueryResult<Vec<_>>>()?;
    sql.push_str(" SET ");
    sql.push_str(&assignments.join(", "));
    if let Some(from) = from {
        sql.push_str(" FROM ");
        sql.push_str(&from);
    }

    sql.push_str(&mutation_tail(shape, compiler)?);
    Ok(sql)
}
