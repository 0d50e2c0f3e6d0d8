//! SELECT SQL generation.

use crate::ast::*;
use crate::error::QueryResult;
use crate::transpiler::Compiler;

/// Generate SELECT SQL.
pub fn build_select(selection: &ReadSelection, compiler: &Compiler) -> QueryResult<String> {
    let columns = columns_sql(selection, compiler)?;
    build_with_columns(selection, compiler, &columns, true)
}

/// Generate a row count of `selection`.
///
/// Grouped, distinct or bounded selections are counted as a subquery;
/// otherwise the projection is replaced by `COUNT(*)`.
pub fn build_count(selection: &ReadSelection, compiler: &Compiler) -> QueryResult<String> {
    let generator = compiler.generator();
    let count = format!("COUNT(*) AS {}", generator.quote_field("count"));
    let bounded = selection.shape.limit.is_some() || selection.shape.offset > 0;

    if selection.is_grouped() || selection.distinct || bounded {
        // ordering only matters inside when it decides which rows are kept
        let inner = if bounded {
            build_select(selection, compiler)?
        } else {
            build_select(&selection.clear_order(), compiler)?
        };
        return Ok(format!(
            "SELECT {} FROM ({}) AS {}",
            count,
            inner,
            generator.quote_model("counted")
        ));
    }
    build_with_columns(selection, compiler, &count, false)
}

fn build_with_columns(
    selection: &ReadSelection,
    compiler: &Compiler,
    columns: &str,
    ordered: bool,
) -> QueryResult<String> {
    let generator = compiler.generator();
    let shape = &selection.shape;

    let mut sql = if selection.distinct {
        String::from("SELECT DISTINCT ")
    } else {
        String::from("SELECT ")
    };
    sql.push_str(columns);

    // FROM
    sql.push_str(" FROM ");
    sql.push_str(&generator.quote_model(shape.source.name()));
    if let Some(alias) = &shape.alias {
        sql.push_str(" AS ");
        sql.push_str(&generator.quote_model(alias));
    }
    for extra in &selection.extra_sources {
        compiler.check_backend(&shape.source, &extra.source)?;
        sql.push_str(&format!(
            ", {} AS {}",
            generator.quote_model(extra.source.name()),
            generator.quote_model(&extra.alias)
        ));
    }

    // JOINS
    for join in &selection.joins {
        compiler.check_backend(&shape.source, &join.source)?;
        let on = compiler.predicate_sql(&join.on)?;
        let target = format!(
            "{} AS {}",
            generator.quote_model(join.source.name()),
            generator.quote_model(&join.alias)
        );
        if on.is_empty() {
            match join.kind {
                JoinKind::Inner => sql.push_str(&format!(" CROSS JOIN {}", target)),
                kind => sql.push_str(&format!(" {} {}", kind.sql_keyword(), target)),
            }
        } else {
            sql.push_str(&format!(" {} {} ON {}", join.kind.sql_keyword(), target, on));
        }
    }

    sql.push_str(&compiler.where_sql(&shape.predicate)?);

    // GROUP BY
    if let Some(grouping) = &selection.grouping {
        let columns = grouping
            .columns
            .iter()
            .map(|c| c.render(generator))
            .collect::<QueryResult<Vec<_>>>()?;
        if !columns.is_empty() {
            sql.push_str(" GROUP BY ");
            sql.push_str(&columns.join(", "));
        }
        let having = compiler.predicate_sql(&grouping.having)?;
        if !having.is_empty() {
            sql.push_str(" HAVING ");
            sql.push_str(&having);
        }
    }

    if ordered {
        let order = compiler.order_sql(&shape.ordering)?;
        sql.push_str(&order);
        sql.push_str(&generator.limit_offset(shape.limit, shape.offset, !order.is_empty()));
    }
    Ok(sql)
}

/// Projection, or `<source>.*`, followed by the additional fields.
fn columns_sql(selection: &ReadSelection, compiler: &Compiler) -> QueryResult<String> {
    let generator = compiler.generator();
    let mut columns = Vec::new();

    if selection.projection.is_empty() {
        columns.push(format!("{}.*", generator.quote_model(selection.shape.reference())));
    } else {
        for item in &selection.projection {
            let sql = compiler.fragment_sql(&item.fragment)?;
            columns.push(match &item.alias {
                Some(alias) => format!("{} AS {}", sql, generator.quote_field(alias)),
                None => sql,
            });
        }
    }

    for field in &selection.additional {
        if let Some(model) = &field.record {
            // one column per related field, named "alias.field"
            for (name, _) in &model.fields {
                columns.push(format!(
                    "{}.{} AS {}",
                    generator.quote_model(&field.alias),
                    generator.quote_field(name),
                    generator.quote_field(&format!("{}.{}", field.alias, name))
                ));
            }
        } else if let Some(fragment) = &field.fragment {
            columns.push(format!(
                "{} AS {}",
                compiler.fragment_sql(fragment)?,
                generator.quote_field(&field.alias)
            ));
        }
    }
    Ok(columns.join(", "))
}
