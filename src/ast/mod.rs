pub mod expr;
pub mod model;
pub mod operators;
pub mod predicate;
pub mod selection;
pub mod types;
pub mod values;

pub use self::expr::Expr;
pub use self::model::{BackendId, Model, SourceRef};
pub use self::operators::{JoinKind, LogicalOp, Operator};
pub use self::predicate::{Clause, ClauseBody, Condition, Conditional, Predicate};
pub use self::selection::{
    AdditionalField, DeleteSelection, ExtraSource, Fragment, Grouping, Join, OrderTerm, Projection,
    ReadSelection, Refine, Selection, SetValue, Shape, UpdateSelection,
};
pub use self::types::{DataType, EnumType, IntWidth, TypeRegistry};
pub use self::values::{Fields, Record, Value};
