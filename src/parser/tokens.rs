//! Token stream builder.
//!
//! Scans a placeholder format string left to right. Literal syntax
//! (`true`, `"text"`, `{Model}`, `[field]`) and placeholders (`?`, `%code`,
//! optionally followed by `()`) become substituted tokens; everything else
//! is raw text the expression parser understands.

use std::ops::Range;

use nom::{
    IResult, Parser,
    branch::alt,
    bytes::complete::{escaped_transform, is_not, tag, take_while, take_while1},
    character::complete::{char, digit1, multispace1, satisfy},
    combinator::{map, opt, recognize, value},
    multi::many0,
    sequence::{delimited, pair, preceded, tuple},
};
use serde::{Deserialize, Serialize};

use crate::ast::{DataType, TypeRegistry, Value};
use crate::error::{QueryError, QueryResult};
use crate::transpiler::NativeAdapter;
use crate::transpiler::TypeAdapter;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Token {
    Literal(DataType, Value),
    Null,
    /// Symbol or keyword, lowercased.
    Operator(String),
    FieldRef {
        name: String,
        quoted: bool,
        model: Option<(String, bool)>,
    },
    ModelRef {
        name: String,
        quoted: bool,
    },
    LParen,
    RParen,
    Comma,
    ArrayOpen(DataType),
    ArrayClose,
    /// Text outside the expression grammar (`*`, `+`, ...); kept for interpolation.
    Raw(String),
}

/// A token and the bytes of the format string it came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Spanned {
    pub token: Token,
    pub span: Range<usize>,
    /// Produced from a placeholder or literal syntax rather than copied.
    pub substituted: bool,
}

/// Lexical units recognized before values are bound.
#[derive(Debug, Clone, PartialEq)]
enum Lexeme<'a> {
    Space,
    SqlString(String),
    Text(String),
    Model(&'a str),
    Field(&'a str),
    Placeholder { code: Option<&'a str>, tuple: bool },
    Number(&'a str),
    Word(&'a str),
    Symbol(&'a str),
    Dot,
    LParen,
    RParen,
    Comma,
    Other(&'a str),
}

fn sql_string(input: &str) -> IResult<&str, Lexeme<'_>> {
    // '' is an escaped quote; content is never scanned for placeholders
    map(
        delimited(
            char('\''),
            recognize(many0(alt((is_not("'"), tag("''"))))),
            char('\''),
        ),
        |body: &str| Lexeme::SqlString(body.replace("''", "'")),
    )(input)
}

fn text_literal(input: &str) -> IResult<&str, Lexeme<'_>> {
    map(
        delimited(
            char('"'),
            opt(escaped_transform(
                is_not("\\\""),
                '\\',
                alt((value("\\", tag("\\")), value("\"", tag("\"")))),
            )),
            char('"'),
        ),
        |s: Option<String>| Lexeme::Text(s.unwrap_or_default()),
    )(input)
}

fn model_ref(input: &str) -> IResult<&str, Lexeme<'_>> {
    map(
        delimited(char('{'), take_while1(|c| c != '}'), char('}')),
        Lexeme::Model,
    )(input)
}

fn field_ref(input: &str) -> IResult<&str, Lexeme<'_>> {
    map(
        delimited(char('['), take_while1(|c| c != ']'), char(']')),
        Lexeme::Field,
    )(input)
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn placeholder(input: &str) -> IResult<&str, Lexeme<'_>> {
    let code = preceded(
        char('%'),
        map(recognize(pair(satisfy(is_word_char), take_while(is_word_char))), Some),
    );
    map(
        pair(alt((value(None, char('?')), code)), opt(tag("()"))),
        |(code, tuple)| Lexeme::Placeholder {
            code,
            tuple: tuple.is_some(),
        },
    )(input)
}

fn number(input: &str) -> IResult<&str, Lexeme<'_>> {
    map(
        recognize(tuple((opt(char('-')), digit1, opt(pair(char('.'), digit1))))),
        Lexeme::Number,
    )(input)
}

fn lexeme(input: &str) -> IResult<&str, Lexeme<'_>> {
    alt((
        value(Lexeme::Space, multispace1),
        sql_string,
        text_literal,
        model_ref,
        field_ref,
        placeholder,
        number,
        map(take_while1(is_word_char), Lexeme::Word),
        map(take_while1(|c| "=<>!".contains(c)), Lexeme::Symbol),
        value(Lexeme::Dot, char('.')),
        value(Lexeme::LParen, char('(')),
        value(Lexeme::RParen, char(')')),
        value(Lexeme::Comma, char(',')),
        map(recognize(satisfy(|_| true)), Lexeme::Other),
    ))
    .parse(input)
}

/// Positional value cursor; local to one tokenize call.
struct Cursor<'a> {
    args: &'a [Value],
    next: usize,
}

impl<'a> Cursor<'a> {
    fn take(&mut self) -> QueryResult<&'a Value> {
        let value = self.args.get(self.next).ok_or(QueryError::ArgumentCount {
            index: self.next,
            supplied: self.args.len(),
        })?;
        self.next += 1;
        Ok(value)
    }
}

/// Tokenize `format`, binding placeholders to `args` in order.
pub fn tokenize(format: &str, args: &[Value], registry: &TypeRegistry) -> QueryResult<Vec<Spanned>> {
    let mut cursor = Cursor { args, next: 0 };
    let mut tokens: Vec<Spanned> = Vec::new();
    let mut rest = format;

    while !rest.is_empty() {
        let start = format.len() - rest.len();
        let (remaining, lexed) = lexeme(rest).map_err(|_| {
            let near: String = rest.chars().take(1).collect();
            QueryError::parse(start, near, "unrecognized input")
        })?;
        let span = start..format.len() - remaining.len();
        rest = remaining;

        let raw = |token| Spanned {
            token,
            span: span.clone(),
            substituted: false,
        };
        let bound = |token| Spanned {
            token,
            span: span.clone(),
            substituted: true,
        };

        match lexed {
            Lexeme::Space => {}
            Lexeme::SqlString(s) => tokens.push(raw(Token::Literal(DataType::text(), Value::String(s)))),
            Lexeme::Text(s) => tokens.push(bound(Token::Literal(DataType::text(), Value::String(s)))),
            Lexeme::Model(name) => tokens.push(bound(Token::ModelRef {
                name: name.to_string(),
                quoted: true,
            })),
            Lexeme::Field(name) => tokens.push(bound(Token::FieldRef {
                name: name.to_string(),
                quoted: true,
                model: None,
            })),
            Lexeme::Placeholder { code, tuple } => {
                for token in bind_placeholder(code, tuple, &mut cursor, registry, start)? {
                    tokens.push(bound(token));
                }
            }
            Lexeme::Number(text) => {
                let literal = if text.contains('.') {
                    text.parse::<f64>().map(|f| Token::Literal(DataType::Float, Value::Float(f)))
                        .map_err(|_| QueryError::parse(start, text, "invalid number"))?
                } else {
                    text.parse::<i64>().map(|n| Token::Literal(DataType::int(), Value::Int(n)))
                        .map_err(|_| QueryError::parse(start, text, "integer out of range"))?
                };
                tokens.push(raw(literal));
            }
            Lexeme::Word(word) => {
                let lower = word.to_ascii_lowercase();
                match lower.as_str() {
                    "true" | "false" => {
                        tokens.push(bound(Token::Literal(DataType::Boolean, Value::Bool(lower == "true"))))
                    }
                    "null" => tokens.push(raw(Token::Null)),
                    "and" | "or" | "not" | "is" | "like" | "in" => tokens.push(raw(Token::Operator(lower))),
                    _ => tokens.push(raw(Token::FieldRef {
                        name: word.to_string(),
                        quoted: false,
                        model: None,
                    })),
                }
            }
            Lexeme::Symbol(symbol) => tokens.push(raw(Token::Operator(symbol.to_string()))),
            Lexeme::Dot => {
                if !qualify_previous(&mut tokens, &mut rest, format, &mut cursor)? {
                    tokens.push(raw(Token::Raw(".".to_string())));
                }
            }
            Lexeme::LParen => tokens.push(raw(Token::LParen)),
            Lexeme::RParen => tokens.push(raw(Token::RParen)),
            Lexeme::Comma => tokens.push(raw(Token::Comma)),
            Lexeme::Other(text) => tokens.push(raw(Token::Raw(text.to_string()))),
        }
    }

    if cursor.next < args.len() {
        tracing::warn!(
            used = cursor.next,
            supplied = args.len(),
            "unused placeholder values in '{}'",
            format
        );
    }
    tracing::trace!(?tokens, "tokenized '{}'", format);
    Ok(tokens)
}

/// Merge `model.field`: the token before the dot becomes the qualifier of
/// the field after it. Returns false when the dot does not qualify anything.
fn qualify_previous(
    tokens: &mut Vec<Spanned>,
    rest: &mut &str,
    format: &str,
    cursor: &mut Cursor<'_>,
) -> QueryResult<bool> {
    let model = match tokens.last() {
        Some(Spanned {
            token: Token::ModelRef { name, quoted },
            ..
        }) => (name.clone(), *quoted),
        Some(Spanned {
            token: Token::FieldRef {
                name,
                quoted,
                model: None,
            },
            ..
        }) => (name.clone(), *quoted),
        _ => return Ok(false),
    };

    let start = format.len() - rest.len();
    let Ok((remaining, next)) = lexeme(rest) else {
        return Ok(false);
    };
    let (name, quoted, substituted) = match next {
        Lexeme::Word(word) => (word.to_string(), false, false),
        Lexeme::Field(field) => (field.to_string(), true, true),
        Lexeme::Placeholder { code: Some(code), tuple: false }
            if matches!(code, "c" | "column" | "field") =>
        {
            (name_of(cursor.take()?, start)?, true, true)
        }
        _ => return Ok(false),
    };
    *rest = remaining;

    if let Some(previous) = tokens.last_mut() {
        previous.token = Token::FieldRef {
            name,
            quoted,
            model: Some(model),
        };
        previous.span.end = format.len() - remaining.len();
        previous.substituted |= substituted;
    }
    Ok(true)
}

/// Identifier carried by a `%m` / `%c` value.
fn name_of(value: &Value, position: usize) -> QueryResult<String> {
    match value {
        Value::String(s) if !s.is_empty() => Ok(s.clone()),
        Value::Object(record) => match record.get("name") {
            Some(Value::String(s)) => Ok(s.clone()),
            _ => Err(QueryError::parse(position, value.to_string(), "expected a name")),
        },
        other => Err(QueryError::parse(position, other.to_string(), "expected a name")),
    }
}

fn bind_placeholder(
    code: Option<&str>,
    tuple: bool,
    cursor: &mut Cursor<'_>,
    registry: &TypeRegistry,
    position: usize,
) -> QueryResult<Vec<Token>> {
    let (data_type, tuple) = match code {
        None => (None, tuple),
        Some("m") | Some("model") => {
            let name = name_of(cursor.take()?, position)?;
            return Ok(vec![Token::ModelRef { name, quoted: true }]);
        }
        Some("c") | Some("column") | Some("field") => {
            let name = name_of(cursor.take()?, position)?;
            let token = match name.rsplit_once('.') {
                Some((model, field)) => Token::FieldRef {
                    name: field.to_string(),
                    quoted: true,
                    model: Some((model.to_string(), true)),
                },
                None => Token::FieldRef {
                    name,
                    quoted: true,
                    model: None,
                },
            };
            return Ok(vec![token]);
        }
        Some("_") => {
            let code = match cursor.take()? {
                Value::String(s) => s.clone(),
                other => {
                    return Err(QueryError::parse(position, other.to_string(), "expected a type code"));
                }
            };
            let (code, dynamic_tuple) = match code.strip_suffix("()") {
                Some(stripped) => (stripped.to_string(), true),
                None => (code, false),
            };
            let resolved = DataType::from_code(&code, registry)
                .ok_or_else(|| QueryError::UnknownType(code.trim_start_matches('%').to_string()))?;
            (Some(resolved), tuple || dynamic_tuple)
        }
        Some(code) => {
            let resolved = DataType::from_code(code, registry)
                .ok_or_else(|| QueryError::UnknownType(code.to_string()))?;
            (Some(resolved), tuple)
        }
    };

    let value = cursor.take()?;
    if !tuple {
        let token = match data_type {
            Some(data_type) => {
                let coerced = coerce(&data_type, value)?;
                Token::Literal(data_type, coerced)
            }
            // bare `?` keeps the runtime value untouched
            None => Token::Literal(DataType::infer(value), value.clone()),
        };
        return Ok(vec![token]);
    }

    let Value::Array(items) = value else {
        return Err(QueryError::invalid(format!(
            "tuple placeholder at {} needs a list, got {}",
            position, value
        )));
    };
    let explicit = data_type.is_some();
    let data_type = data_type
        .unwrap_or_else(|| items.first().map(DataType::infer).unwrap_or_else(DataType::text));
    let mut tokens = Vec::with_capacity(items.len() + 2);
    tokens.push(Token::ArrayOpen(data_type.clone()));
    for item in items {
        let item = if explicit { coerce(&data_type, item)? } else { item.clone() };
        tokens.push(Token::Literal(data_type.clone(), item));
    }
    tokens.push(Token::ArrayClose);
    Ok(tokens)
}

/// Bring a bound value into its placeholder type.
fn coerce(data_type: &DataType, value: &Value) -> QueryResult<Value> {
    NativeAdapter.decode(data_type, value)
}
