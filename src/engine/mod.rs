//! Execution of selections against a backend.
//!
//! A [`DataSource`] owns one model on one backend. Selections built from
//! [`DataSource::selection`] carry the source's [`SourceRef`]; handing a
//! selection to a source on another backend fails with
//! [`QueryError::IncompatibleSource`].

pub mod driver;
pub mod materialize;
pub mod memory;
pub mod sql;

use crate::ast::*;
use crate::error::{QueryError, QueryResult};

pub use driver::SqlxDriver;
pub use materialize::Materializer;
pub use memory::{ArrayDataSource, MemoryStore};
pub use sql::{Driver, SqlDataSource};

/// A decoded result row before materialization: columns in select order.
pub type RawRow = Vec<(String, Value)>;

/// One model's rows on one backend.
pub trait DataSource {
    fn source(&self) -> &SourceRef;

    fn model(&self) -> &Model {
        &self.source().model
    }

    /// An empty selection over this source.
    fn selection(&self) -> Selection {
        Selection::new(self.source().clone())
    }

    /// Materialized records of a read selection.
    fn fetch(&self, selection: &ReadSelection) -> QueryResult<Vec<Record>>;

    /// Number of records `fetch` would return.
    fn count(&self, selection: &ReadSelection) -> QueryResult<u64>;

    /// Apply the assignments; returns the number of affected records.
    fn update(&self, selection: &UpdateSelection) -> QueryResult<u64>;

    /// Delete matching records; returns the number of affected records.
    fn delete(&self, selection: &DeleteSelection) -> QueryResult<u64>;

    /// Insert `records`, overwriting rows with the same primary key when
    /// `replace` is set. Returns the generated key of the last row, if any.
    fn insert(&self, records: &[Record], replace: bool) -> QueryResult<Option<Value>>;

    /// First record of the selection.
    fn fetch_one(&self, selection: &ReadSelection) -> QueryResult<Option<Record>> {
        Ok(self.fetch(&selection.limit(1))?.into_iter().next())
    }
}

/// Fail unless `selection` was built over `owner`.
pub(crate) fn check_owner(owner: &SourceRef, shape: &Shape) -> QueryResult<()> {
    let other = &shape.source;
    if owner.backend != other.backend || owner.name() != other.name() {
        return Err(QueryError::IncompatibleSource {
            owner: owner.name().to_string(),
            other: other.name().to_string(),
        });
    }
    Ok(())
}
