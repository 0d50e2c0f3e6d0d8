//! Placeholder mini-language parser.
//!
//! # Syntax Overview
//!
//! ```text
//! [group] = %s and {User}.[age] >= ? or id in %i() or name like "a%"
//! ───┬───   ─┬    ──────┬──────    ┬            ──┬─           ──┬──
//!    │       │          │          │              │              └── text literal
//!    │       │          │          │              └── typed tuple placeholder
//!    │       │          │          └── placeholder, type inferred from the value
//!    │       │          └── quoted model.field reference
//!    │       └── typed placeholder
//!    └── quoted field reference
//! ```

pub mod grammar;
pub mod tokens;

#[cfg(test)]
mod tests;

use crate::ast::{Expr, TypeRegistry, Value};
use crate::error::QueryResult;
use crate::transpiler::Quoter;
pub use grammar::Parser;
pub use tokens::{Spanned, Token, tokenize};

/// Parse a placeholder expression into an AST.
pub fn parse(format: &str, args: &[Value]) -> QueryResult<Expr> {
    parse_with(format, args, &TypeRegistry::default())
}

/// Parse with enum types resolved through `registry`.
pub fn parse_with(format: &str, args: &[Value], registry: &TypeRegistry) -> QueryResult<Expr> {
    let tokens = tokenize(format, args, registry)?;
    Parser::new(format, &tokens).parse()
}

/// Substitute placeholders and literal syntax into SQL text.
pub fn interpolate(format: &str, args: &[Value], quoter: &(impl Quoter + ?Sized)) -> QueryResult<String> {
    interpolate_with(format, args, &TypeRegistry::default(), quoter)
}

/// Raw text between and inside unsubstituted tokens is copied byte for
/// byte; substituted tokens are quoted through `quoter`.
pub fn interpolate_with(
    format: &str,
    args: &[Value],
    registry: &TypeRegistry,
    quoter: &(impl Quoter + ?Sized),
) -> QueryResult<String> {
    let tokens = tokenize(format, args, registry)?;
    let mut sql = String::with_capacity(format.len());
    let mut copied = 0;
    let mut i = 0;

    while i < tokens.len() {
        let spanned = &tokens[i];
        sql.push_str(&format[copied..spanned.span.start]);
        copied = spanned.span.end;
        i += 1;

        if !spanned.substituted {
            sql.push_str(&format[spanned.span.clone()]);
            continue;
        }
        match &spanned.token {
            Token::Literal(data_type, value) => sql.push_str(&quoter.quote_literal(data_type, value)?),
            Token::ModelRef { name, quoted } => sql.push_str(&quote_part(quoter, name, *quoted, true)),
            Token::FieldRef { name, quoted, model } => {
                if let Some((model, model_quoted)) = model {
                    sql.push_str(&quote_part(quoter, model, *model_quoted, true));
                    sql.push('.');
                }
                sql.push_str(&quote_part(quoter, name, *quoted, false));
            }
            Token::ArrayOpen(_) => {
                let mut items = Vec::new();
                while let Some(next) = tokens.get(i) {
                    i += 1;
                    match &next.token {
                        Token::Literal(data_type, value) => items.push(quoter.quote_literal(data_type, value)?),
                        _ => break,
                    }
                }
                if items.is_empty() {
                    sql.push_str("(NULL)");
                } else {
                    sql.push('(');
                    sql.push_str(&items.join(", "));
                    sql.push(')');
                }
            }
            _ => sql.push_str(&format[spanned.span.clone()]),
        }
    }
    sql.push_str(&format[copied..]);
    Ok(sql)
}

fn quote_part(quoter: &(impl Quoter + ?Sized), name: &str, quoted: bool, model: bool) -> String {
    match (quoted, model) {
        (false, _) => name.to_string(),
        (true, true) => quoter.quote_model(name),
        (true, false) => quoter.quote_field(name),
    }
}
