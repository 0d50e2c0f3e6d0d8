//! SQL-backed data source: selections are compiled for the driver's
//! dialect and the returned rows materialized.

use crate::ast::*;
use crate::engine::{check_owner, DataSource, Materializer, RawRow};
use crate::error::{QueryError, QueryResult};
use crate::transpiler::{Compiler, Dialect, GeneratedKey};

/// A connection able to run compiled statements.
pub trait Driver {
    /// Identity shared by every source on this connection.
    fn backend_id(&self) -> BackendId;

    fn dialect(&self) -> Dialect;

    /// Run a statement returning rows.
    fn query(&self, sql: &str) -> QueryResult<Vec<RawRow>>;

    /// Run a statement; returns the number of affected rows.
    fn execute(&self, sql: &str) -> QueryResult<u64>;

    /// Run an INSERT and read back the generated key, if `key` names one.
    fn insert(&self, sql: &str, key: Option<&GeneratedKey>) -> QueryResult<Option<Value>>;
}

impl<T: Driver + ?Sized> Driver for &T {
    fn backend_id(&self) -> BackendId {
        (**self).backend_id()
    }

    fn dialect(&self) -> Dialect {
        (**self).dialect()
    }

    fn query(&self, sql: &str) -> QueryResult<Vec<RawRow>> {
        (**self).query(sql)
    }

    fn execute(&self, sql: &str) -> QueryResult<u64> {
        (**self).execute(sql)
    }

    fn insert(&self, sql: &str, key: Option<&GeneratedKey>) -> QueryResult<Option<Value>> {
        (**self).insert(sql, key)
    }
}

/// One model on a SQL connection.
pub struct SqlDataSource<D: Driver> {
    driver: D,
    source: SourceRef,
    compiler: Compiler,
    case_insensitive_fields: bool,
}

impl<D: Driver> SqlDataSource<D> {
    pub fn new(driver: D, model: Model) -> Self {
        let source = SourceRef::new(driver.backend_id(), model);
        let compiler = Compiler::new(driver.dialect());
        Self {
            driver,
            source,
            compiler,
            case_insensitive_fields: false,
        }
    }

    pub fn with_registry(mut self, registry: TypeRegistry) -> Self {
        self.compiler = self.compiler.with_registry(registry);
        self
    }

    /// Match result columns to fields ignoring case even when the dialect
    /// reports exact names.
    pub fn case_insensitive_fields(mut self, enabled: bool) -> Self {
        self.case_insensitive_fields = enabled;
        self
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    pub fn compiler(&self) -> &Compiler {
        &self.compiler
    }
}

impl<D: Driver> DataSource for SqlDataSource<D> {
    fn source(&self) -> &SourceRef {
        &self.source
    }

    fn fetch(&self, selection: &ReadSelection) -> QueryResult<Vec<Record>> {
        check_owner(&self.source, &selection.shape)?;
        let sql = self.compiler.select(selection)?;
        let rows = self.driver.query(&sql)?;
        let generator = self.compiler.generator();
        let case_sensitive = generator.case_sensitive_fields() && !self.case_insensitive_fields;
        Materializer::new(self.model(), &selection.additional, generator)
            .case_sensitive(case_sensitive)
            .materialize_all(rows)
    }

    fn count(&self, selection: &ReadSelection) -> QueryResult<u64> {
        check_owner(&self.source, &selection.shape)?;
        let sql = self.compiler.count(selection)?;
        let rows = self.driver.query(&sql)?;
        let value = rows
            .into_iter()
            .next()
            .and_then(|row| row.into_iter().next())
            .map(|(_, value)| value)
            .ok_or_else(|| QueryError::Query("count returned no rows".to_string()))?;
        match self.compiler.generator().decode(&DataType::int(), &value)? {
            Value::Int(n) if n >= 0 => Ok(n as u64),
            other => Err(QueryError::Query(format!("count returned {}", other))),
        }
    }

    fn update(&self, selection: &UpdateSelection) -> QueryResult<u64> {
        check_owner(&self.source, &selection.shape)?;
        let sql = self.compiler.update(selection)?;
        self.driver.execute(&sql)
    }

    fn delete(&self, selection: &DeleteSelection) -> QueryResult<u64> {
        check_owner(&self.source, &selection.shape)?;
        let sql = self.compiler.delete(selection)?;
        self.driver.execute(&sql)
    }

    fn insert(&self, records: &[Record], replace: bool) -> QueryResult<Option<Value>> {
        let statement = self.compiler.insert(&self.source, records, replace)?;
        self.driver.insert(&statement.sql, statement.key.as_ref())
    }
}
