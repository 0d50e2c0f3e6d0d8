//! SQL compiler for selections.
//!
//! Turns finished selections into one SQL statement per dialect.

pub mod conditions;
pub mod dialect;
pub mod dml;
pub mod sql;
pub mod traits;

#[cfg(test)]
mod tests;

use crate::ast::*;
use crate::error::{QueryError, QueryResult};
pub use dialect::Dialect;
pub use dml::insert::InsertStatement;
pub use traits::{GeneratedKey, KeyRetrieval, NativeAdapter, Quoter, SqlGenerator, TypeAdapter};

/// Trait for converting selections to SQL.
pub trait ToSql {
    /// Convert to SQL using the default dialect.
    fn to_sql(&self) -> QueryResult<String> {
        self.to_sql_with_dialect(Dialect::default())
    }
    /// Convert to SQL with a specific dialect.
    fn to_sql_with_dialect(&self, dialect: Dialect) -> QueryResult<String>;
}

impl ToSql for ReadSelection {
    fn to_sql_with_dialect(&self, dialect: Dialect) -> QueryResult<String> {
        Compiler::new(dialect).select(self)
    }
}

impl ToSql for UpdateSelection {
    fn to_sql_with_dialect(&self, dialect: Dialect) -> QueryResult<String> {
        Compiler::new(dialect).update(self)
    }
}

impl ToSql for DeleteSelection {
    fn to_sql_with_dialect(&self, dialect: Dialect) -> QueryResult<String> {
        Compiler::new(dialect).delete(self)
    }
}

/// A dialect generator plus the enum registry placeholders resolve against.
pub struct Compiler {
    generator: Box<dyn SqlGenerator>,
    registry: TypeRegistry,
}

impl Compiler {
    pub fn new(dialect: Dialect) -> Self {
        Self::with_generator(dialect.generator())
    }

    pub fn with_generator(generator: Box<dyn SqlGenerator>) -> Self {
        Self {
            generator,
            registry: TypeRegistry::default(),
        }
    }

    pub fn with_registry(mut self, registry: TypeRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn generator(&self) -> &dyn SqlGenerator {
        self.generator.as_ref()
    }

    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    pub fn dialect(&self) -> Dialect {
        self.generator.dialect()
    }

    pub fn select(&self, selection: &ReadSelection) -> QueryResult<String> {
        let sql = dml::select::build_select(selection, self)?;
        tracing::debug!(dialect = %self.dialect(), %sql, "compiled select");
        Ok(sql)
    }

    /// Statement returning the number of rows `selection` would yield in
    /// a single `count` column.
    pub fn count(&self, selection: &ReadSelection) -> QueryResult<String> {
        let sql = dml::select::build_count(selection, self)?;
        tracing::debug!(dialect = %self.dialect(), %sql, "compiled count");
        Ok(sql)
    }

    pub fn update(&self, selection: &UpdateSelection) -> QueryResult<String> {
        let sql = dml::update::build_update(selection, self)?;
        tracing::debug!(dialect = %self.dialect(), %sql, "compiled update");
        Ok(sql)
    }

    pub fn delete(&self, selection: &DeleteSelection) -> QueryResult<String> {
        let sql = dml::delete::build_delete(selection, self)?;
        tracing::debug!(dialect = %self.dialect(), %sql, "compiled delete");
        Ok(sql)
    }

    /// INSERT (or REPLACE / upsert when `replace`) of `records` into `source`.
    pub fn insert(&self, source: &SourceRef, records: &[Record], replace: bool) -> QueryResult<InsertStatement> {
        let statement = dml::insert::build_insert(source, records, replace, self)?;
        tracing::debug!(dialect = %self.dialect(), sql = %statement.sql, "compiled insert");
        Ok(statement)
    }

    /// Quote `value` for `field` of `model`, inferring the type of unknown fields.
    pub(crate) fn field_literal(&self, model: &Model, field: &str, value: &Value) -> QueryResult<String> {
        match model.field_type(field) {
            Some(data_type) => self.generator.quote_literal(data_type, value),
            None => self.generator.quote_literal(&DataType::infer(value), value),
        }
    }

    /// Fail unless `other` lives on the same backend as `owner`.
    pub(crate) fn check_backend(&self, owner: &SourceRef, other: &SourceRef) -> QueryResult<()> {
        if owner.backend != other.backend {
            return Err(QueryError::IncompatibleSource {
                owner: owner.name().to_string(),
                other: other.name().to_string(),
            });
        }
        Ok(())
    }

    /// ` ORDER BY ...`, or empty.
    pub(crate) fn order_sql(&self, ordering: &[OrderTerm]) -> QueryResult<String> {
        if ordering.is_empty() {
            return Ok(String::new());
        }
        let terms = ordering
            .iter()
            .map(|term| {
                let expr = term.expr.render(self.generator())?;
                Ok(if term.descending { format!("{} DESC", expr) } else { expr })
            })
            .collect::<QueryResult<Vec<_>>>()?;
        Ok(format!(" ORDER BY {}", terms.join(", ")))
    }

    /// ` WHERE ...`, or empty.
    pub(crate) fn where_sql(&self, predicate: &Predicate) -> QueryResult<String> {
        let sql = self.predicate_sql(predicate)?;
        if sql.is_empty() {
            Ok(sql)
        } else {
            Ok(format!(" WHERE {}", sql))
        }
    }
}
