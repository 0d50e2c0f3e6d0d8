use serde::{Deserialize, Serialize};

use crate::ast::{DataType, Fields, Operator, Value};
use crate::error::{QueryError, QueryResult};
use crate::transpiler::Quoter;

/// An expression node. Every node can be evaluated against a record and
/// rendered to SQL text; both interpretations share operator semantics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    /// A typed constant
    Literal { data_type: DataType, value: Value },
    /// A field, optionally qualified by a model (table or alias)
    FieldAccess {
        field: String,
        /// Unquoted fields are emitted verbatim.
        quoted: bool,
        model: Option<String>,
        model_quoted: bool,
    },
    /// Binary expression (left op right)
    Infix {
        left: Box<Expr>,
        op: Operator,
        right: Box<Expr>,
    },
    /// Prefix expression (not x)
    Prefix { op: Operator, operand: Box<Expr> },
    /// A typed tuple, the right side of `in`
    ArrayLiteral {
        data_type: DataType,
        values: Vec<Value>,
    },
}

impl Expr {
    pub fn literal(data_type: DataType, value: impl Into<Value>) -> Self {
        Expr::Literal {
            data_type,
            value: value.into(),
        }
    }

    /// Literal whose type follows the runtime value.
    pub fn value(value: impl Into<Value>) -> Self {
        let value = value.into();
        Expr::Literal {
            data_type: DataType::infer(&value),
            value,
        }
    }

    pub fn null() -> Self {
        Expr::Literal {
            data_type: DataType::Text { nullable: true },
            value: Value::Null,
        }
    }

    /// Quoted field reference.
    pub fn field(name: impl Into<String>) -> Self {
        Expr::FieldAccess {
            field: name.into(),
            quoted: true,
            model: None,
            model_quoted: false,
        }
    }

    /// Quoted `model.field` reference.
    pub fn qualified(model: impl Into<String>, name: impl Into<String>) -> Self {
        Expr::FieldAccess {
            field: name.into(),
            quoted: true,
            model: Some(model.into()),
            model_quoted: true,
        }
    }

    /// Unquoted identifier or SQL fragment.
    pub fn raw(sql: impl Into<String>) -> Self {
        Expr::FieldAccess {
            field: sql.into(),
            quoted: false,
            model: None,
            model_quoted: false,
        }
    }

    /// Build an infix node from an operator spelling.
    pub fn infix(left: Expr, symbol: &str, right: Expr) -> QueryResult<Self> {
        let op = Operator::from_symbol(symbol)?;
        if !op.is_infix() {
            return Err(QueryError::UnsupportedOperator(symbol.to_string()));
        }
        Ok(Expr::Infix {
            left: Box::new(left),
            op,
            right: Box::new(right),
        })
    }

    pub fn binary(left: Expr, op: Operator, right: Expr) -> Self {
        Expr::Infix {
            left: Box::new(left),
            op,
            right: Box::new(right),
        }
    }

    pub fn not(operand: Expr) -> Self {
        Expr::Prefix {
            op: Operator::Not,
            operand: Box::new(operand),
        }
    }

    pub fn array(data_type: DataType, values: Vec<Value>) -> Self {
        Expr::ArrayLiteral { data_type, values }
    }

    /// Infix or prefix node.
    pub fn is_compound(&self) -> bool {
        matches!(self, Expr::Infix { .. } | Expr::Prefix { .. })
    }

    fn precedence(&self) -> u8 {
        match self {
            Expr::Infix { op, .. } | Expr::Prefix { op, .. } => op.precedence(),
            _ => u8::MAX,
        }
    }

    /// Evaluate directly against a record.
    pub fn evaluate(&self, record: &dyn Fields) -> QueryResult<Value> {
        match self {
            Expr::Literal { value, .. } => Ok(value.clone()),
            Expr::FieldAccess { field, model, .. } => {
                let found = match model {
                    Some(model) => record.qualified_field(model, field),
                    None => record.field(field),
                };
                Ok(found.cloned().unwrap_or(Value::Null))
            }
            Expr::Infix { left, op, right } => evaluate_infix(left, *op, right, record),
            Expr::Prefix { op, operand } => match op {
                Operator::Not => Ok(Value::Bool(!operand.evaluate(record)?.truthy())),
                other => Err(QueryError::UnsupportedOperator(other.to_string())),
            },
            Expr::ArrayLiteral { values, .. } => Ok(Value::Array(values.clone())),
        }
    }

    /// Render to SQL text through a dialect quoter.
    pub fn render(&self, quoter: &(impl Quoter + ?Sized)) -> QueryResult<String> {
        match self {
            Expr::Literal { data_type, value } => quoter.quote_literal(data_type, value),
            Expr::FieldAccess {
                field,
                quoted,
                model,
                model_quoted,
            } => {
                let field = if *quoted {
                    quoter.quote_field(field)
                } else {
                    field.clone()
                };
                Ok(match model {
                    Some(m) if *model_quoted => format!("{}.{}", quoter.quote_model(m), field),
                    Some(m) => format!("{}.{}", m, field),
                    None => field,
                })
            }
            Expr::Infix { left, op, right } => {
                if !op.is_infix() {
                    return Err(QueryError::UnsupportedOperator(op.to_string()));
                }
                let lhs = left.render_operand(quoter, op.precedence(), false)?;
                let rhs = match (op, right.as_ref()) {
                    (
                        Operator::Is | Operator::IsNot,
                        Expr::Literal {
                            value: Value::Null, ..
                        },
                    ) => "NULL".to_string(),
                    (Operator::In, Expr::ArrayLiteral { .. }) => right.render(quoter)?,
                    (Operator::In, _) => format!("({})", right.render(quoter)?),
                    _ => right.render_operand(quoter, op.precedence(), op.is_comparison())?,
                };
                Ok(format!("{} {} {}", lhs, op.sql_symbol(), rhs))
            }
            Expr::Prefix { op, operand } => {
                if *op != Operator::Not {
                    return Err(QueryError::UnsupportedOperator(op.to_string()));
                }
                let inner = operand.render(quoter)?;
                if operand.is_compound() {
                    Ok(format!("NOT ({})", inner))
                } else {
                    Ok(format!("NOT {}", inner))
                }
            }
            Expr::ArrayLiteral { data_type, values } => {
                if values.is_empty() {
                    return Ok("(NULL)".to_string());
                }
                let items = values
                    .iter()
                    .map(|v| quoter.quote_literal(data_type, v))
                    .collect::<QueryResult<Vec<_>>>()?;
                Ok(format!("({})", items.join(", ")))
            }
        }
    }

    fn render_operand(
        &self,
        quoter: &(impl Quoter + ?Sized),
        parent: u8,
        strict: bool,
    ) -> QueryResult<String> {
        let sql = self.render(quoter)?;
        let own = self.precedence();
        if own < parent || (strict && own == parent) {
            Ok(format!("({})", sql))
        } else {
            Ok(sql)
        }
    }
}

fn evaluate_infix(left: &Expr, op: Operator, right: &Expr, record: &dyn Fields) -> QueryResult<Value> {
    // short-circuit before touching the right side
    match op {
        Operator::And => {
            if !left.evaluate(record)?.truthy() {
                return Ok(Value::Bool(false));
            }
            return Ok(Value::Bool(right.evaluate(record)?.truthy()));
        }
        Operator::Or => {
            if left.evaluate(record)?.truthy() {
                return Ok(Value::Bool(true));
            }
            return Ok(Value::Bool(right.evaluate(record)?.truthy()));
        }
        _ => {}
    }

    let lhs = left.evaluate(record)?;
    let rhs = right.evaluate(record)?;
    let result = match op {
        Operator::Eq => lhs.sql_eq(&rhs),
        Operator::Ne => !lhs.is_null() && !rhs.is_null() && !lhs.sql_eq(&rhs),
        Operator::Lt => lhs.sql_cmp(&rhs).is_some_and(|o| o.is_lt()),
        Operator::Gt => lhs.sql_cmp(&rhs).is_some_and(|o| o.is_gt()),
        Operator::Lte | Operator::NotGt => lhs.sql_cmp(&rhs).is_some_and(|o| o.is_le()),
        Operator::Gte | Operator::NotLt => lhs.sql_cmp(&rhs).is_some_and(|o| o.is_ge()),
        Operator::Is => identical(&lhs, &rhs),
        Operator::IsNot => !identical(&lhs, &rhs),
        Operator::Like => !lhs.is_null() && !rhs.is_null() && like(&lhs.to_text(), &rhs.to_text()),
        Operator::In => match &rhs {
            Value::Array(items) => items.iter().any(|item| lhs.sql_eq(item)),
            single => lhs.sql_eq(single),
        },
        Operator::Not | Operator::And | Operator::Or => {
            return Err(QueryError::UnsupportedOperator(op.to_string()));
        }
    };
    Ok(Value::Bool(result))
}

/// `IS` compares identity, so NULL IS NULL holds.
fn identical(lhs: &Value, rhs: &Value) -> bool {
    match (lhs, rhs) {
        (Value::Null, Value::Null) => true,
        (Value::Null, _) | (_, Value::Null) => false,
        (a, b) => a.sql_eq(b),
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum PatternItem {
    Any,
    One,
    Char(char),
}

/// SQL LIKE: `%` matches any run, `_` one character, `\` escapes either.
pub fn like(text: &str, pattern: &str) -> bool {
    let mut items = Vec::new();
    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        items.push(match c {
            '%' => PatternItem::Any,
            '_' => PatternItem::One,
            '\\' => PatternItem::Char(chars.next().unwrap_or('\\')),
            c => PatternItem::Char(c),
        });
    }

    let text: Vec<char> = text.chars().collect();
    // reachable[j]: pattern prefix matches text prefix of length j
    let mut reachable = vec![false; text.len() + 1];
    reachable[0] = true;
    for item in items {
        let mut next = vec![false; text.len() + 1];
        match item {
            PatternItem::Any => {
                let mut seen = false;
                for j in 0..=text.len() {
                    seen |= reachable[j];
                    next[j] = seen;
                }
            }
            PatternItem::One => {
                for j in 0..text.len() {
                    next[j + 1] = reachable[j];
                }
            }
            PatternItem::Char(c) => {
                for j in 0..text.len() {
                    next[j + 1] = reachable[j] && text[j] == c;
                }
            }
        }
        reachable = next;
    }
    reachable[text.len()]
}

impl std::fmt::Display for Expr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Expr::Literal { data_type, value } => write!(f, "{}({})", data_type, value),
            Expr::FieldAccess { field, model, .. } => match model {
                Some(m) => write!(f, "{}.{}", m, field),
                None => write!(f, "{}", field),
            },
            Expr::Infix { left, op, right } => write!(f, "({} {} {})", left, op, right),
            Expr::Prefix { op, operand } => write!(f, "{} {}", op, operand),
            Expr::ArrayLiteral { data_type, values } => {
                write!(f, "{}(", data_type)?;
                for (i, v) in values.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", v)?;
                }
                write!(f, ")")
            }
        }
    }
}
