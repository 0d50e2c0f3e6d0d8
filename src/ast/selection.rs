//! Copy-on-write query shapes.
//!
//! A [`Selection`] starts undecided and specializes into a
//! [`ReadSelection`], [`UpdateSelection`] or [`DeleteSelection`] on the
//! first call only one of them supports. Every call takes `&self` and
//! returns a new value; a base selection can be reused freely.

use serde::{Deserialize, Serialize};

use crate::ast::{Condition, Conditional, DataType, Expr, JoinKind, Model, Predicate, SourceRef, Value};

/// A column expression given as an AST or as placeholder text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Fragment {
    Expr(Expr),
    Sql { format: String, args: Vec<Value> },
}

impl From<Expr> for Fragment {
    fn from(expr: Expr) -> Self {
        Fragment::Expr(expr)
    }
}

impl From<&str> for Fragment {
    fn from(format: &str) -> Self {
        Fragment::Sql {
            format: format.to_string(),
            args: Vec::new(),
        }
    }
}

impl<S: Into<String>> From<(S, Vec<Value>)> for Fragment {
    fn from((format, args): (S, Vec<Value>)) -> Self {
        Fragment::Sql {
            format: format.into(),
            args,
        }
    }
}

/// Field name to expression; `model.field` becomes a qualified reference.
pub fn field_expr(name: &str) -> Expr {
    match name.rsplit_once('.') {
        Some((model, field)) => Expr::qualified(model, field),
        None => Expr::field(name),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderTerm {
    pub expr: Expr,
    pub descending: bool,
}

/// State every selection kind carries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shape {
    pub source: SourceRef,
    pub predicate: Predicate,
    pub ordering: Vec<OrderTerm>,
    pub limit: Option<usize>,
    pub offset: usize,
    pub alias: Option<String>,
}

impl Shape {
    pub fn new(source: SourceRef) -> Self {
        Self {
            source,
            predicate: Predicate::new(),
            ordering: Vec::new(),
            limit: None,
            offset: 0,
            alias: None,
        }
    }

    /// Name rows of the main source are referenced by.
    pub fn reference(&self) -> &str {
        self.alias.as_deref().unwrap_or(self.source.name())
    }
}

/// Ordering and bounds, common to all selection kinds.
pub trait Refine: Sized {
    fn shape(&self) -> &Shape;

    fn with_shape(&self, shape: Shape) -> Self;

    fn order_by(&self, field: &str) -> Self {
        self.order_by_expr(field_expr(field), false)
    }

    fn order_by_descending(&self, field: &str) -> Self {
        self.order_by_expr(field_expr(field), true)
    }

    fn order_by_expr(&self, expr: Expr, descending: bool) -> Self {
        let mut shape = self.shape().clone();
        shape.ordering.push(OrderTerm { expr, descending });
        self.with_shape(shape)
    }

    /// `orderBy(null)`: drop every ordering entry.
    fn clear_order(&self) -> Self {
        let mut shape = self.shape().clone();
        shape.ordering.clear();
        self.with_shape(shape)
    }

    /// Flip the direction of every ordering entry.
    fn reverse_order(&self) -> Self {
        let mut shape = self.shape().clone();
        for term in &mut shape.ordering {
            term.descending = !term.descending;
        }
        self.with_shape(shape)
    }

    fn limit(&self, n: usize) -> Self {
        let mut shape = self.shape().clone();
        shape.limit = Some(n);
        self.with_shape(shape)
    }

    fn offset(&self, n: usize) -> Self {
        let mut shape = self.shape().clone();
        shape.offset = n;
        self.with_shape(shape)
    }

    fn alias(&self, name: &str) -> Self {
        let mut shape = self.shape().clone();
        shape.alias = Some(name.to_string());
        self.with_shape(shape)
    }
}

macro_rules! impl_shape_traits {
    ($ty:ty) => {
        impl Refine for $ty {
            fn shape(&self) -> &Shape {
                &self.shape
            }

            fn with_shape(&self, shape: Shape) -> Self {
                Self {
                    shape,
                    ..self.clone()
                }
            }
        }

        impl Conditional for $ty {
            fn predicate(&self) -> &Predicate {
                &self.shape.predicate
            }

            fn with_predicate(&self, predicate: Predicate) -> Self {
                let mut shape = self.shape.clone();
                shape.predicate = predicate;
                self.with_shape(shape)
            }
        }
    };
}

/// A selection whose statement kind is not decided yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Selection {
    pub shape: Shape,
}

impl_shape_traits!(Selection);

impl Selection {
    pub fn new(source: SourceRef) -> Self {
        Self { shape: Shape::new(source) }
    }

    /// Specialize into a read, keeping predicate, ordering and bounds.
    pub fn read(&self) -> ReadSelection {
        ReadSelection {
            shape: self.shape.clone(),
            projection: Vec::new(),
            additional: Vec::new(),
            extra_sources: Vec::new(),
            joins: Vec::new(),
            grouping: None,
            distinct: false,
        }
    }

    pub fn select(&self, fields: &[&str]) -> ReadSelection {
        self.read().select(fields)
    }

    pub fn select_expr(&self, fragment: impl Into<Fragment>, alias: Option<&str>) -> ReadSelection {
        self.read().select_expr(fragment, alias)
    }

    pub fn with(&self, alias: &str, fragment: impl Into<Fragment>) -> ReadSelection {
        self.read().with(alias, fragment)
    }

    pub fn with_typed(&self, alias: &str, fragment: impl Into<Fragment>, data_type: DataType) -> ReadSelection {
        self.read().with_typed(alias, fragment, data_type)
    }

    pub fn with_record(&self, alias: &str, model: Model) -> ReadSelection {
        self.read().with_record(alias, model)
    }

    pub fn group_by(&self, columns: &[&str]) -> ReadSelection {
        self.read().group_by(columns)
    }

    pub fn group_by_having(&self, columns: &[&str], having: impl Into<Condition>) -> ReadSelection {
        self.read().group_by_having(columns, having)
    }

    pub fn inner_join(&self, other: &SourceRef, alias: &str, on: impl Into<Condition>) -> ReadSelection {
        self.read().inner_join(other, alias, on)
    }

    pub fn left_join(&self, other: &SourceRef, alias: &str, on: impl Into<Condition>) -> ReadSelection {
        self.read().left_join(other, alias, on)
    }

    pub fn right_join(&self, other: &SourceRef, alias: &str, on: impl Into<Condition>) -> ReadSelection {
        self.read().right_join(other, alias, on)
    }

    pub fn also_from(&self, other: &SourceRef, alias: &str) -> ReadSelection {
        self.read().also_from(other, alias)
    }

    pub fn distinct(&self) -> ReadSelection {
        self.read().distinct()
    }

    pub fn first(&self) -> ReadSelection {
        self.read().first()
    }

    pub fn last(&self) -> ReadSelection {
        self.read().last()
    }

    /// Specialize into an UPDATE with its first assignment.
    pub fn set(&self, field: &str, value: impl Into<Value>) -> UpdateSelection {
        UpdateSelection {
            shape: self.shape.clone(),
            sets: Vec::new(),
        }
        .set(field, value)
    }

    pub fn set_raw(&self, field: &str, fragment: impl Into<Fragment>) -> UpdateSelection {
        UpdateSelection {
            shape: self.shape.clone(),
            sets: Vec::new(),
        }
        .set_raw(field, fragment)
    }

    /// Specialize into a DELETE.
    pub fn delete(&self) -> DeleteSelection {
        DeleteSelection {
            shape: self.shape.clone(),
        }
    }
}

impl From<&Selection> for ReadSelection {
    fn from(selection: &Selection) -> Self {
        selection.read()
    }
}

impl From<Selection> for ReadSelection {
    fn from(selection: Selection) -> Self {
        selection.read()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Projection {
    pub fragment: Fragment,
    pub alias: Option<String>,
}

/// Extra output column: a computed value, or the fields of a joined
/// model to regather into a sub-record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdditionalField {
    pub alias: String,
    pub fragment: Option<Fragment>,
    pub data_type: Option<DataType>,
    pub record: Option<Model>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Join {
    pub source: SourceRef,
    pub kind: JoinKind,
    pub alias: String,
    pub on: Predicate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtraSource {
    pub source: SourceRef,
    pub alias: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Grouping {
    pub columns: Vec<Expr>,
    pub having: Predicate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadSelection {
    pub shape: Shape,
    pub projection: Vec<Projection>,
    pub additional: Vec<AdditionalField>,
    pub extra_sources: Vec<ExtraSource>,
    pub joins: Vec<Join>,
    pub grouping: Option<Grouping>,
    pub distinct: bool,
}

impl_shape_traits!(ReadSelection);

impl ReadSelection {
    /// Replace the projection with plain fields.
    pub fn select(&self, fields: &[&str]) -> Self {
        let mut next = self.clone();
        next.projection = fields
            .iter()
            .map(|f| Projection {
                fragment: Fragment::Expr(field_expr(f)),
                alias: None,
            })
            .collect();
        next
    }

    /// Append a projected expression.
    pub fn select_expr(&self, fragment: impl Into<Fragment>, alias: Option<&str>) -> Self {
        let mut next = self.clone();
        next.projection.push(Projection {
            fragment: fragment.into(),
            alias: alias.map(str::to_string),
        });
        next
    }

    /// Computed column left as the backend returns it.
    pub fn with(&self, alias: &str, fragment: impl Into<Fragment>) -> Self {
        self.push_additional(AdditionalField {
            alias: alias.to_string(),
            fragment: Some(fragment.into()),
            data_type: None,
            record: None,
        })
    }

    /// Computed column decoded as `data_type`.
    pub fn with_typed(&self, alias: &str, fragment: impl Into<Fragment>, data_type: DataType) -> Self {
        self.push_additional(AdditionalField {
            alias: alias.to_string(),
            fragment: Some(fragment.into()),
            data_type: Some(data_type),
            record: None,
        })
    }

    /// Regather the `alias.field` columns of a joined `model` into a
    /// nested record under `alias`.
    pub fn with_record(&self, alias: &str, model: Model) -> Self {
        self.push_additional(AdditionalField {
            alias: alias.to_string(),
            fragment: None,
            data_type: None,
            record: Some(model),
        })
    }

    fn push_additional(&self, field: AdditionalField) -> Self {
        let mut next = self.clone();
        next.additional.push(field);
        next
    }

    pub fn group_by(&self, columns: &[&str]) -> Self {
        let mut next = self.clone();
        next.grouping = Some(Grouping {
            columns: columns.iter().map(|c| field_expr(c)).collect(),
            having: Predicate::new(),
        });
        next
    }

    pub fn group_by_having(&self, columns: &[&str], having: impl Into<Condition>) -> Self {
        let mut next = self.group_by(columns);
        if let Some(grouping) = &mut next.grouping {
            grouping.having = grouping.having.and(having);
        }
        next
    }

    pub fn join(&self, kind: JoinKind, other: &SourceRef, alias: &str, on: impl Into<Condition>) -> Self {
        let mut next = self.clone();
        next.joins.push(Join {
            source: other.clone(),
            kind,
            alias: alias.to_string(),
            on: Predicate::new().and(on),
        });
        next
    }

    pub fn inner_join(&self, other: &SourceRef, alias: &str, on: impl Into<Condition>) -> Self {
        self.join(JoinKind::Inner, other, alias, on)
    }

    pub fn left_join(&self, other: &SourceRef, alias: &str, on: impl Into<Condition>) -> Self {
        self.join(JoinKind::Left, other, alias, on)
    }

    pub fn right_join(&self, other: &SourceRef, alias: &str, on: impl Into<Condition>) -> Self {
        self.join(JoinKind::Right, other, alias, on)
    }

    /// Add a comma-joined source (cross product filtered by the predicate).
    pub fn also_from(&self, other: &SourceRef, alias: &str) -> Self {
        let mut next = self.clone();
        next.extra_sources.push(ExtraSource {
            source: other.clone(),
            alias: alias.to_string(),
        });
        next
    }

    pub fn distinct(&self) -> Self {
        let mut next = self.clone();
        next.distinct = true;
        next
    }

    pub fn first(&self) -> Self {
        self.limit(1)
    }

    /// Reverse the ordering and take one row. Without an ordering the
    /// primary key, descending, decides what "last" means.
    pub fn last(&self) -> Self {
        if self.shape.ordering.is_empty() {
            if let Some(key) = &self.shape.source.model.primary_key {
                let key = Expr::qualified(self.shape.reference(), key.as_str());
                return self.order_by_expr(key, true).limit(1);
            }
        }
        self.reverse_order().limit(1)
    }

    pub fn is_grouped(&self) -> bool {
        self.grouping.is_some()
    }
}

/// Right-hand side of an UPDATE assignment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SetValue {
    Value(Value),
    Raw(Fragment),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateSelection {
    pub shape: Shape,
    /// Assignments in first-set order; setting a field again replaces it.
    pub sets: Vec<(String, SetValue)>,
}

impl_shape_traits!(UpdateSelection);

impl UpdateSelection {
    pub fn set(&self, field: &str, value: impl Into<Value>) -> Self {
        self.assign(field, SetValue::Value(value.into()))
    }

    /// Assign an expression such as `hits + 1`, emitted without encoding.
    pub fn set_raw(&self, field: &str, fragment: impl Into<Fragment>) -> Self {
        self.assign(field, SetValue::Raw(fragment.into()))
    }

    fn assign(&self, field: &str, value: SetValue) -> Self {
        let mut next = self.clone();
        match next.sets.iter_mut().find(|(name, _)| name == field) {
            Some(slot) => slot.1 = value,
            None => next.sets.push((field.to_string(), value)),
        }
        next
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeleteSelection {
    pub shape: Shape,
}

impl_shape_traits!(DeleteSelection);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::args;
    use crate::ast::BackendId;

    fn users() -> Selection {
        let model = Model::new("users").key("id", DataType::serial());
        Selection::new(SourceRef::new(BackendId(1), model))
    }

    #[test]
    fn test_reverse_order_is_involution() {
        let s = users().order_by("name").order_by_descending("age");
        assert_eq!(s.reverse_order().reverse_order().shape.ordering, s.shape.ordering);
        let flipped: Vec<bool> = s.reverse_order().shape.ordering.iter().map(|t| t.descending).collect();
        assert_eq!(flipped, vec![true, false]);
    }

    #[test]
    fn test_derived_selections_do_not_alias() {
        let base = users().filter("age > %i", args![18]);
        let a = base.order_by("name").limit(5);
        let b = base.offset(3);
        assert!(base.shape.ordering.is_empty());
        assert_eq!(base.shape.limit, None);
        assert_eq!(a.shape.limit, Some(5));
        assert_eq!(b.shape.offset, 3);
        assert_eq!(b.shape.limit, None);
    }

    #[test]
    fn test_specialization_carries_shared_state() {
        let base = users().filter("age > %i", args![18]).order_by("id").limit(2).offset(1);
        let read = base.select(&["name"]);
        let update = base.set("name", "x");
        let delete = base.delete();
        for shape in [&read.shape, &update.shape, &delete.shape] {
            assert_eq!(shape, &base.shape);
        }
    }

    #[test]
    fn test_clear_order() {
        let s = users().order_by("a").clear_order();
        assert!(s.shape.ordering.is_empty());
    }

    #[test]
    fn test_last_falls_back_to_primary_key() {
        let last = users().last();
        assert_eq!(last.shape.limit, Some(1));
        assert_eq!(
            last.shape.ordering,
            vec![OrderTerm {
                expr: Expr::qualified("users", "id"),
                descending: true
            }]
        );
        let ordered = users().order_by("name").last();
        assert!(ordered.shape.ordering[0].descending);
    }

    #[test]
    fn test_set_replaces_earlier_assignment() {
        let u = users().set("a", 1).set("b", 2).set("a", 3);
        assert_eq!(
            u.sets,
            vec![
                ("a".to_string(), SetValue::Value(Value::Int(3))),
                ("b".to_string(), SetValue::Value(Value::Int(2)))
            ]
        );
    }
}
