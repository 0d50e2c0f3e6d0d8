//! # quarry
//!
//! Build queries against records without writing raw SQL.
//!
//! Conditions are written in a small placeholder language, combined into
//! predicates, and carried by copy-on-write selections. A finished
//! selection is either compiled to one SQL statement for a dialect or
//! evaluated directly against in-memory records.
//!
//! ## Quick Example
//!
//! ```rust
//! use quarry::prelude::*;
//!
//! let users = Model::new("users")
//!     .key("id", DataType::serial())
//!     .field("name", DataType::string())
//!     .field("age", DataType::int());
//! let source = ArrayDataSource::new(users, vec![
//!     record! { "id" => 1, "name" => "ann", "age" => 31 },
//!     record! { "id" => 2, "name" => "bob", "age" => 17 },
//! ]);
//!
//! let adults = source.selection().filter("[age] >= %i", args![18]).read();
//! assert_eq!(
//!     adults.to_sql().unwrap(),
//!     "SELECT \"users\".* FROM \"users\" WHERE \"age\" >= 18"
//! );
//! assert_eq!(source.fetch(&adults).unwrap().len(), 1);
//! ```
//!
//! ## Placeholders
//!
//! | Placeholder   | Binds                              |
//! |---------------|------------------------------------|
//! | `?`           | value, type taken from the value   |
//! | `%i` `%s` ... | value coerced to the coded type    |
//! | `%_`          | type code, then value              |
//! | `%m`          | model (table) identifier           |
//! | `%c`          | field identifier, `model.field` ok |
//! | `%Enum`       | value of a registered enum type    |

pub mod ast;
pub mod config;
pub mod engine;
pub mod error;
pub mod parser;
pub mod transpiler;

pub mod prelude {
    pub use crate::ast::*;
    pub use crate::engine::{ArrayDataSource, DataSource, Driver, MemoryStore, SqlDataSource, SqlxDriver};
    pub use crate::error::*;
    pub use crate::parser::{interpolate, parse};
    pub use crate::transpiler::{Compiler, Dialect, ToSql};
    pub use crate::{args, record};
}

/// Parse a placeholder expression into an AST.
///
/// # Example
///
/// ```
/// use quarry::{args, parse};
///
/// let expr = parse("[age] > %i", &args![18]).unwrap();
/// assert_eq!(expr.evaluate(&quarry::record! { "age" => 20 }).unwrap(), quarry::ast::Value::Bool(true));
/// ```
pub fn parse(format: &str, args: &[ast::Value]) -> error::QueryResult<ast::Expr> {
    parser::parse(format, args)
}
