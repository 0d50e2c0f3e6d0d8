//! Operator-precedence parser over the token stream.
//!
//! `or` < `and` < `not` < comparison < atom. Comparisons do not chain.

use crate::ast::{DataType, Expr, Operator};
use crate::error::{QueryError, QueryResult};
use crate::parser::tokens::{Spanned, Token};

pub struct Parser<'a> {
    format: &'a str,
    tokens: &'a [Spanned],
    pos: usize,
}

impl<'a> Parser<'a> {
    pub fn new(format: &'a str, tokens: &'a [Spanned]) -> Self {
        Self { format, tokens, pos: 0 }
    }

    /// Parse the whole stream as one expression.
    pub fn parse(mut self) -> QueryResult<Expr> {
        if self.tokens.is_empty() {
            return Err(QueryError::parse(0, "", "empty expression"));
        }
        let expr = self.parse_or()?;
        if let Some(extra) = self.peek() {
            let message = match extra.token {
                Token::RParen => "unbalanced parenthesis",
                _ => "unexpected trailing input",
            };
            return Err(self.error_at(extra, message));
        }
        Ok(expr)
    }

    fn peek(&self) -> Option<&'a Spanned> {
        self.tokens.get(self.pos)
    }

    fn peek_at(&self, offset: usize) -> Option<&'a Spanned> {
        self.tokens.get(self.pos + offset)
    }

    fn advance(&mut self) -> Option<&'a Spanned> {
        let token = self.tokens.get(self.pos);
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn text(&self, spanned: &Spanned) -> &'a str {
        self.format.get(spanned.span.clone()).unwrap_or("")
    }

    fn error_at(&self, spanned: &Spanned, message: &str) -> QueryError {
        QueryError::parse(spanned.span.start, self.text(spanned), message)
    }

    fn error_at_end(&self, message: &str) -> QueryError {
        QueryError::parse(self.format.len(), "<end>", message)
    }

    fn keyword(&self, offset: usize, word: &str) -> bool {
        matches!(self.peek_at(offset), Some(Spanned { token: Token::Operator(op), .. }) if op == word)
    }

    fn parse_or(&mut self) -> QueryResult<Expr> {
        let mut left = self.parse_and()?;
        while self.keyword(0, "or") {
            self.advance();
            let right = self.parse_and()?;
            left = Expr::binary(left, Operator::Or, right);
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> QueryResult<Expr> {
        let mut left = self.parse_not()?;
        while self.keyword(0, "and") {
            self.advance();
            let right = self.parse_not()?;
            left = Expr::binary(left, Operator::And, right);
        }
        Ok(left)
    }

    fn parse_not(&mut self) -> QueryResult<Expr> {
        if self.keyword(0, "not") {
            self.advance();
            return Ok(Expr::not(self.parse_not()?));
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> QueryResult<Expr> {
        let left = self.parse_atom()?;
        let Some((op, negated)) = self.comparison_operator()? else {
            return Ok(left);
        };
        let right = match self.parse_atom()? {
            // `in (5)` is a one-item list, not a parenthesized literal
            Expr::Literal { data_type, value } if op == Operator::In => Expr::array(data_type, vec![value]),
            right => right,
        };
        let expr = Expr::binary(left, op, right);

        if let Some(next) = self.peek() {
            if let Token::Operator(symbol) = &next.token {
                if !matches!(symbol.as_str(), "and" | "or") {
                    return Err(self.error_at(next, "comparison operators do not chain"));
                }
            }
        }
        Ok(if negated { Expr::not(expr) } else { expr })
    }

    /// Consume a comparison operator if one follows; `not like` / `not in`
    /// come back as their positive form plus a negation flag.
    fn comparison_operator(&mut self) -> QueryResult<Option<(Operator, bool)>> {
        let Some(next) = self.peek() else {
            return Ok(None);
        };
        let Token::Operator(symbol) = &next.token else {
            return Ok(None);
        };
        match symbol.as_str() {
            "and" | "or" => Ok(None),
            "not" => {
                let negated = if self.keyword(1, "like") {
                    Operator::Like
                } else if self.keyword(1, "in") {
                    Operator::In
                } else {
                    return Err(self.error_at(next, "expected 'like' or 'in' after 'not'"));
                };
                self.pos += 2;
                Ok(Some((negated, true)))
            }
            "is" => {
                self.advance();
                if self.keyword(0, "not") {
                    self.advance();
                    return Ok(Some((Operator::IsNot, false)));
                }
                Ok(Some((Operator::Is, false)))
            }
            other => {
                let op = Operator::from_symbol(other)?;
                self.advance();
                Ok(Some((op, false)))
            }
        }
    }

    fn parse_atom(&mut self) -> QueryResult<Expr> {
        let Some(spanned) = self.advance() else {
            return Err(self.error_at_end("expected an operand"));
        };
        match &spanned.token {
            Token::Literal(data_type, value) => Ok(Expr::Literal {
                data_type: data_type.clone(),
                value: value.clone(),
            }),
            Token::Null => Ok(Expr::null()),
            Token::FieldRef { name, quoted, model } => {
                if matches!(self.peek(), Some(Spanned { token: Token::LParen, .. })) {
                    return Err(self.error_at(spanned, "function calls are not expressions"));
                }
                Ok(Expr::FieldAccess {
                    field: name.clone(),
                    quoted: *quoted,
                    model: model.as_ref().map(|(m, _)| m.clone()),
                    model_quoted: model.as_ref().is_some_and(|(_, q)| *q),
                })
            }
            Token::LParen => self.parse_group(spanned),
            Token::ArrayOpen(data_type) => {
                let mut values = Vec::new();
                loop {
                    match self.advance() {
                        Some(Spanned {
                            token: Token::Literal(_, value),
                            ..
                        }) => values.push(value.clone()),
                        Some(Spanned {
                            token: Token::ArrayClose,
                            ..
                        }) => break,
                        Some(other) => return Err(self.error_at(other, "malformed tuple")),
                        None => return Err(self.error_at_end("unterminated tuple")),
                    }
                }
                Ok(Expr::array(data_type.clone(), values))
            }
            Token::Operator(symbol) if !matches!(symbol.as_str(), "and" | "or" | "not" | "is" | "like" | "in") => {
                // an unknown symbol is an operator error before it is a syntax error
                Operator::from_symbol(symbol)?;
                Err(self.error_at(spanned, "dangling operator"))
            }
            Token::Operator(_) => Err(self.error_at(spanned, "dangling operator")),
            Token::RParen => Err(self.error_at(spanned, "unbalanced parenthesis")),
            Token::ModelRef { .. } => Err(self.error_at(spanned, "model reference without a field")),
            Token::Comma | Token::ArrayClose | Token::Raw(_) => Err(self.error_at(spanned, "unexpected token")),
        }
    }

    /// `( expr )` or a literal list `( a, b, ... )`.
    fn parse_group(&mut self, open: &Spanned) -> QueryResult<Expr> {
        let first = self.parse_or()?;
        let mut items = vec![first];
        loop {
            match self.advance() {
                Some(Spanned {
                    token: Token::RParen,
                    ..
                }) => break,
                Some(Spanned {
                    token: Token::Comma,
                    ..
                }) => items.push(self.parse_or()?),
                Some(other) => return Err(self.error_at(other, "expected ')'")),
                None => return Err(self.error_at(open, "unbalanced parenthesis")),
            }
        }

        if items.len() == 1 {
            return Ok(items.remove(0));
        }
        let mut data_type: Option<DataType> = None;
        let mut values = Vec::with_capacity(items.len());
        for item in items {
            match item {
                Expr::Literal { data_type: t, value } => {
                    if data_type.is_none() && !value.is_null() {
                        data_type = Some(t);
                    }
                    values.push(value);
                }
                _ => return Err(self.error_at(open, "lists may only contain literals")),
            }
        }
        Ok(Expr::array(data_type.unwrap_or_else(DataType::text), values))
    }
}
