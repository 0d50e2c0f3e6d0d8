use serde::{Deserialize, Serialize};

use crate::error::{QueryError, QueryResult};

/// Logical operator between clauses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum LogicalOp {
    #[default]
    And,
    Or,
}

impl LogicalOp {
    pub fn sql_symbol(&self) -> &'static str {
        match self {
            LogicalOp::And => "AND",
            LogicalOp::Or => "OR",
        }
    }
}

/// Join Type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JoinKind {
    Inner,
    Left,
    Right,
}

impl JoinKind {
    pub fn sql_keyword(&self) -> &'static str {
        match self {
            JoinKind::Inner => "INNER JOIN",
            JoinKind::Left => "LEFT JOIN",
            JoinKind::Right => "RIGHT JOIN",
        }
    }
}

/// Expression operators, in the order of the precedence table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operator {
    /// or
    Or,
    /// and
    And,
    /// not (prefix only)
    Not,
    /// Equal (=)
    Eq,
    /// Not equal (!=, <>)
    Ne,
    /// Less than (<)
    Lt,
    /// Greater than (>)
    Gt,
    /// Less than or equal (<=)
    Lte,
    /// Greater than or equal (>=)
    Gte,
    /// Not less than (!<), same as >=
    NotLt,
    /// Not greater than (!>), same as <=
    NotGt,
    /// IS (null identity)
    Is,
    /// IS NOT
    IsNot,
    /// LIKE pattern match
    Like,
    /// IN collection
    In,
}

impl Operator {
    /// Look up an operator by its spelling in the mini-language.
    pub fn from_symbol(symbol: &str) -> QueryResult<Self> {
        let op = match symbol.to_ascii_lowercase().as_str() {
            "or" => Operator::Or,
            "and" => Operator::And,
            "not" => Operator::Not,
            "=" => Operator::Eq,
            "!=" | "<>" => Operator::Ne,
            "<" => Operator::Lt,
            ">" => Operator::Gt,
            "<=" => Operator::Lte,
            ">=" => Operator::Gte,
            "!<" => Operator::NotLt,
            "!>" => Operator::NotGt,
            "is" => Operator::Is,
            "is not" => Operator::IsNot,
            "like" => Operator::Like,
            "in" => Operator::In,
            _ => return Err(QueryError::UnsupportedOperator(symbol.to_string())),
        };
        Ok(op)
    }

    /// Returns the SQL symbol/keyword for this operator.
    pub fn sql_symbol(&self) -> &'static str {
        match self {
            Operator::Or => "OR",
            Operator::And => "AND",
            Operator::Not => "NOT",
            Operator::Eq => "=",
            Operator::Ne => "!=",
            Operator::Lt => "<",
            Operator::Gt => ">",
            Operator::Lte => "<=",
            Operator::Gte => ">=",
            // `!<` and `!>` only parse on SQL Server
            Operator::NotLt => ">=",
            Operator::NotGt => "<=",
            Operator::Is => "IS",
            Operator::IsNot => "IS NOT",
            Operator::Like => "LIKE",
            Operator::In => "IN",
        }
    }

    /// Binding strength; higher binds tighter.
    pub fn precedence(&self) -> u8 {
        match self {
            Operator::Or => 1,
            Operator::And => 2,
            Operator::Not => 3,
            _ => 4,
        }
    }

    pub fn is_comparison(&self) -> bool {
        self.precedence() == 4
    }

    /// Operators valid between two operands.
    pub fn is_infix(&self) -> bool {
        !matches!(self, Operator::Not)
    }
}

impl std::fmt::Display for Operator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Operator::NotLt => f.write_str("!<"),
            Operator::NotGt => f.write_str("!>"),
            op => f.write_str(op.sql_symbol()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_symbol() {
        assert_eq!(Operator::from_symbol("<>").unwrap(), Operator::Ne);
        assert_eq!(Operator::from_symbol("LIKE").unwrap(), Operator::Like);
        assert_eq!(Operator::from_symbol("is not").unwrap(), Operator::IsNot);
        assert!(matches!(
            Operator::from_symbol("=="),
            Err(QueryError::UnsupportedOperator(op)) if op == "=="
        ));
    }

    #[test]
    fn test_negated_comparisons_render_portably() {
        assert_eq!(Operator::from_symbol("!<").unwrap().sql_symbol(), ">=");
        assert_eq!(Operator::from_symbol("!>").unwrap().sql_symbol(), "<=");
        assert_eq!(Operator::NotLt.to_string(), "!<");
    }

    #[test]
    fn test_precedence_order() {
        assert!(Operator::Or.precedence() < Operator::And.precedence());
        assert!(Operator::And.precedence() < Operator::Not.precedence());
        assert!(Operator::Not.precedence() < Operator::Like.precedence());
    }
}
