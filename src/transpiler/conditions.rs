use crate::ast::*;
use crate::error::QueryResult;
use crate::parser;

use super::Compiler;

/// Whether a clause body needs parentheses next to other clauses.
fn is_logical(expr: &Expr) -> bool {
    matches!(
        expr,
        Expr::Infix {
            op: Operator::And | Operator::Or,
            ..
        }
    )
}

impl Compiler {
    /// Render a predicate; empty when it has no clauses, so the caller
    /// can leave out WHERE / ON / HAVING.
    pub fn predicate_sql(&self, predicate: &Predicate) -> QueryResult<String> {
        let inner = self.clauses_sql(predicate)?;
        if inner.is_empty() || !predicate.is_negated() {
            return Ok(inner);
        }
        Ok(format!("NOT ({})", inner))
    }

    fn clauses_sql(&self, predicate: &Predicate) -> QueryResult<String> {
        let live: Vec<&Clause> = predicate
            .clauses()
            .iter()
            .filter(|clause| !clause.body.is_blank())
            .collect();
        let several = live.len() > 1;

        let mut sql = String::new();
        for (i, clause) in live.iter().enumerate() {
            if i > 0 {
                sql.push(' ');
                sql.push_str(clause.glue.sql_symbol());
                sql.push(' ');
            }
            let part = match &clause.body {
                ClauseBody::Expr(expr) => {
                    let rendered = expr.render(self.generator())?;
                    if several && is_logical(expr) {
                        format!("({})", rendered)
                    } else {
                        rendered
                    }
                }
                ClauseBody::Sql { format, args } => {
                    let rendered = parser::interpolate_with(format, args, self.registry(), self.generator())?;
                    // raw SQL the grammar cannot read is wrapped to be safe
                    let bare = parser::parse_with(format, args, self.registry())
                        .map(|expr| !is_logical(&expr))
                        .unwrap_or(false);
                    if several && !bare {
                        format!("({})", rendered)
                    } else {
                        rendered
                    }
                }
                ClauseBody::Group(inner) => {
                    let rendered = self.clauses_sql(inner)?;
                    if inner.is_negated() {
                        format!("NOT ({})", rendered)
                    } else {
                        format!("({})", rendered)
                    }
                }
            };
            sql.push_str(&part);
        }
        Ok(sql)
    }

    /// Render a projection or computed-field fragment.
    pub fn fragment_sql(&self, fragment: &Fragment) -> QueryResult<String> {
        match fragment {
            Fragment::Expr(expr) => expr.render(self.generator()),
            Fragment::Sql { format, args } => {
                parser::interpolate_with(format, args, self.registry(), self.generator())
            }
        }
    }
}
