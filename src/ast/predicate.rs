use serde::{Deserialize, Serialize};

use crate::ast::{Expr, Fields, LogicalOp, TypeRegistry, Value};
use crate::error::QueryResult;
use crate::parser;

/// Body of one predicate clause.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ClauseBody {
    Expr(Expr),
    /// Placeholder format plus its positional values, parsed on use.
    Sql { format: String, args: Vec<Value> },
    Group(Predicate),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Clause {
    pub glue: LogicalOp,
    pub body: ClauseBody,
}

/// Anything that can be appended to a predicate.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Expr(Expr),
    Sql { format: String, args: Vec<Value> },
    Predicate(Predicate),
}

impl From<Expr> for Condition {
    fn from(expr: Expr) -> Self {
        Condition::Expr(expr)
    }
}

impl From<Predicate> for Condition {
    fn from(predicate: Predicate) -> Self {
        Condition::Predicate(predicate)
    }
}

impl From<&str> for Condition {
    fn from(format: &str) -> Self {
        Condition::Sql {
            format: format.to_string(),
            args: Vec::new(),
        }
    }
}

impl From<String> for Condition {
    fn from(format: String) -> Self {
        Condition::Sql { format, args: Vec::new() }
    }
}

impl<S: Into<String>> From<(S, Vec<Value>)> for Condition {
    fn from((format, args): (S, Vec<Value>)) -> Self {
        Condition::Sql {
            format: format.into(),
            args,
        }
    }
}

/// Ordered AND/OR combination of clauses, optionally negated as a whole.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Predicate {
    clauses: Vec<Clause>,
    #[serde(default)]
    negated: bool,
}

impl Predicate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Negate `predicate`; nested, it renders as `NOT (...)`.
    pub fn not(predicate: Predicate) -> Self {
        Self {
            negated: !predicate.negated,
            ..predicate
        }
    }

    pub fn has_clauses(&self) -> bool {
        self.clauses.iter().any(|clause| !clause.body.is_blank())
    }

    pub fn clauses(&self) -> &[Clause] {
        &self.clauses
    }

    pub fn is_negated(&self) -> bool {
        self.negated
    }

    /// Copy of this predicate with one more clause.
    pub fn push(&self, glue: LogicalOp, condition: impl Into<Condition>) -> Self {
        let body = match condition.into() {
            Condition::Expr(expr) => ClauseBody::Expr(expr),
            Condition::Sql { format, args } => ClauseBody::Sql { format, args },
            Condition::Predicate(p) => ClauseBody::Group(p),
        };
        let mut next = self.clone();
        next.clauses.push(Clause { glue, body });
        next
    }

    /// Evaluate against a record. AND binds tighter than OR; an empty
    /// predicate accepts everything.
    pub fn evaluate(&self, record: &dyn Fields, registry: &TypeRegistry) -> QueryResult<bool> {
        if !self.has_clauses() {
            return Ok(true);
        }
        let mut any = false;
        let mut run = true;
        let mut first = true;
        for clause in &self.clauses {
            if clause.body.is_blank() {
                continue;
            }
            if !first && clause.glue == LogicalOp::Or {
                any |= run;
                run = true;
            }
            first = false;
            if run {
                run = clause.body.evaluate(record, registry)?;
            }
        }
        let result = any || run;
        Ok(result != self.negated)
    }
}

impl ClauseBody {
    /// Blank placeholder text and empty groups contribute nothing.
    pub fn is_blank(&self) -> bool {
        match self {
            ClauseBody::Expr(_) => false,
            ClauseBody::Sql { format, .. } => format.trim().is_empty(),
            ClauseBody::Group(inner) => !inner.has_clauses(),
        }
    }

    /// Expression form of the body, parsing placeholder text if needed.
    pub fn to_expr(&self, registry: &TypeRegistry) -> QueryResult<Option<Expr>> {
        match self {
            ClauseBody::Expr(expr) => Ok(Some(expr.clone())),
            ClauseBody::Sql { format, args } => parser::parse_with(format, args, registry).map(Some),
            ClauseBody::Group(_) => Ok(None),
        }
    }

    fn evaluate(&self, record: &dyn Fields, registry: &TypeRegistry) -> QueryResult<bool> {
        match self {
            ClauseBody::Expr(expr) => Ok(expr.evaluate(record)?.truthy()),
            ClauseBody::Sql { format, args } => {
                Ok(parser::parse_with(format, args, registry)?.evaluate(record)?.truthy())
            }
            ClauseBody::Group(inner) => inner.evaluate(record, registry),
        }
    }
}

/// Clause accumulation shared by predicates and selections.
pub trait Conditional: Sized {
    fn predicate(&self) -> &Predicate;

    fn with_predicate(&self, predicate: Predicate) -> Self;

    /// Append an AND-glued condition.
    fn and(&self, condition: impl Into<Condition>) -> Self {
        self.with_predicate(self.predicate().push(LogicalOp::And, condition))
    }

    /// Append an OR-glued condition.
    fn or(&self, condition: impl Into<Condition>) -> Self {
        self.with_predicate(self.predicate().push(LogicalOp::Or, condition))
    }

    /// `where`: an AND-glued placeholder clause.
    fn filter(&self, format: &str, args: Vec<Value>) -> Self {
        self.and((format, args))
    }

    fn and_where(&self, format: &str, args: Vec<Value>) -> Self {
        self.and((format, args))
    }

    fn or_where(&self, format: &str, args: Vec<Value>) -> Self {
        self.or((format, args))
    }
}

impl Conditional for Predicate {
    fn predicate(&self) -> &Predicate {
        self
    }

    fn with_predicate(&self, predicate: Predicate) -> Self {
        predicate
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{args, record};

    #[test]
    fn test_and_binds_tighter_than_or() {
        let registry = TypeRegistry::default();
        // a = 1 OR b = 1 AND c = 1
        let p = Predicate::new()
            .filter("a = %i", args![1])
            .or_where("b = %i", args![1])
            .and_where("c = %i", args![1]);
        let only_a = record! { "a" => 1, "b" => 0, "c" => 0 };
        let only_b = record! { "a" => 0, "b" => 1, "c" => 0 };
        assert!(p.evaluate(&only_a, &registry).unwrap());
        assert!(!p.evaluate(&only_b, &registry).unwrap());
    }

    #[test]
    fn test_negated_group() {
        let registry = TypeRegistry::default();
        let inner = Predicate::new().filter("kind = %s", args!["spam"]);
        let p = Predicate::new().and(Predicate::not(inner));
        assert!(p.evaluate(&record! { "kind" => "mail" }, &registry).unwrap());
        assert!(!p.evaluate(&record! { "kind" => "spam" }, &registry).unwrap());
    }

    #[test]
    fn test_has_clauses_ignores_empty_groups() {
        let p = Predicate::new().and(Predicate::new());
        assert!(!p.has_clauses());
        assert!(p.evaluate(&record! {}, &TypeRegistry::default()).unwrap());
        assert!(Predicate::new().and("x = 1").has_clauses());
    }

    #[test]
    fn test_blank_clauses_are_ignored() {
        let registry = TypeRegistry::default();
        let blank = Predicate::new().filter("", args![]).or_where("   ", args![]);
        assert!(!blank.has_clauses());
        assert!(blank.evaluate(&record! {}, &registry).unwrap());

        let p = blank.and_where("a = %i", args![1]);
        assert!(p.has_clauses());
        assert!(p.evaluate(&record! { "a" => 1 }, &registry).unwrap());
        assert!(!p.evaluate(&record! { "a" => 2 }, &registry).unwrap());
    }

    #[test]
    fn test_push_is_copy_on_write() {
        let base = Predicate::new().filter("a = 1", args![]);
        let derived = base.or_where("b = 2", args![]);
        assert_eq!(base.clauses().len(), 1);
        assert_eq!(derived.clauses().len(), 2);
    }
}
