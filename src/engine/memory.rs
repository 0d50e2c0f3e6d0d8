//! In-memory backend: selections are evaluated against stored records
//! with the same AST the SQL compiler renders.

use std::cell::RefCell;
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::rc::Rc;

use crate::ast::*;
use crate::engine::{check_owner, DataSource, Materializer, RawRow};
use crate::error::{QueryError, QueryResult};
use crate::parser;
use crate::transpiler::{Dialect, NativeAdapter, TypeAdapter};

struct Store {
    backend: BackendId,
    registry: TypeRegistry,
    tables: RefCell<BTreeMap<String, Vec<Record>>>,
}

/// Tables sharing one backend identity. Sources attached to the same
/// store can be joined with each other.
#[derive(Clone)]
pub struct MemoryStore {
    inner: Rc<Store>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_registry(TypeRegistry::default())
    }

    /// Store whose placeholder clauses resolve enum types through `registry`.
    pub fn with_registry(registry: TypeRegistry) -> Self {
        Self {
            inner: Rc::new(Store {
                backend: BackendId::fresh(),
                registry,
                tables: RefCell::new(BTreeMap::new()),
            }),
        }
    }

    pub fn backend(&self) -> BackendId {
        self.inner.backend
    }

    pub fn registry(&self) -> &TypeRegistry {
        &self.inner.registry
    }

    /// Register `model` with its initial rows, replacing any table of the
    /// same name.
    pub fn attach(&self, model: Model, rows: Vec<Record>) -> ArrayDataSource {
        self.inner.tables.borrow_mut().insert(model.name.clone(), rows);
        ArrayDataSource {
            store: self.clone(),
            source: SourceRef::new(self.backend(), model),
        }
    }

    fn table(&self, name: &str) -> QueryResult<Vec<Record>> {
        self.inner
            .tables
            .borrow()
            .get(name)
            .cloned()
            .ok_or_else(|| QueryError::Unsupported(format!("no table {} in this store", name)))
    }
}

/// A model's rows held in a [`MemoryStore`].
#[derive(Clone)]
pub struct ArrayDataSource {
    store: MemoryStore,
    source: SourceRef,
}

impl ArrayDataSource {
    /// Source over a store of its own.
    pub fn new(model: Model, rows: Vec<Record>) -> Self {
        MemoryStore::new().attach(model, rows)
    }

    pub fn store(&self) -> &MemoryStore {
        &self.store
    }

    /// Snapshot of the stored records.
    pub fn rows(&self) -> QueryResult<Vec<Record>> {
        self.store.table(self.source.name())
    }

    /// Rows of another source on this store.
    fn related(&self, other: &SourceRef) -> QueryResult<Vec<Record>> {
        if other.backend != self.store.backend() {
            return Err(QueryError::IncompatibleSource {
                owner: self.source.name().to_string(),
                other: other.name().to_string(),
            });
        }
        self.store.table(other.name())
    }

    /// Flat rows in the shape a compiled SELECT would return.
    fn read(&self, selection: &ReadSelection) -> QueryResult<Vec<RawRow>> {
        check_owner(&self.source, &selection.shape)?;
        let shape = &selection.shape;
        let registry = self.store.registry();
        let reference = shape.reference();
        let table = self.source.name();

        let mut rows: Vec<Joined> = self
            .store
            .table(table)?
            .into_iter()
            .map(|base| Joined::new(reference, table, base))
            .collect();
        let mut aliases = Vec::new();

        for extra in &selection.extra_sources {
            let others = self.related(&extra.source)?;
            let mut product = Vec::with_capacity(rows.len() * others.len());
            for row in &rows {
                for other in &others {
                    product.push(row.with(&extra.alias, Some(other.clone())));
                }
            }
            rows = product;
            aliases.push(extra.alias.clone());
        }

        for join in &selection.joins {
            let others = self.related(&join.source)?;
            let blank = Joined::blank(reference, table, self.model(), &aliases);
            rows = join_rows(rows, &others, join, registry, blank)?;
            aliases.push(join.alias.clone());
        }

        let mut kept = Vec::new();
        for row in rows {
            if shape.predicate.evaluate(&row, registry)? {
                kept.push(row);
            }
        }

        if let Some(grouping) = &selection.grouping {
            kept = group_rows(kept, grouping, registry)?;
        }

        for row in &mut kept {
            for field in &selection.additional {
                if let Some(fragment) = &field.fragment {
                    let value = evaluate_fragment(fragment, row, registry)?;
                    row.computed.insert(field.alias.clone(), value);
                }
            }
        }

        let mut keyed: Vec<(Vec<Value>, RawRow)> = Vec::with_capacity(kept.len());
        for row in &kept {
            let columns = project(selection, row, registry)?;
            if selection.distinct && keyed.iter().any(|(_, seen)| *seen == columns) {
                continue;
            }
            keyed.push((order_keys(row, &shape.ordering)?, columns));
        }
        sort_keyed(&mut keyed, &shape.ordering);

        let rows: Vec<RawRow> = keyed
            .into_iter()
            .map(|(_, columns)| columns)
            .skip(shape.offset)
            .take(shape.limit.unwrap_or(usize::MAX))
            .collect();
        tracing::debug!(source = table, rows = rows.len(), "evaluated selection in memory");
        Ok(rows)
    }

    /// Indices of the stored rows a mutation touches, in ordering order.
    fn matching(&self, shape: &Shape) -> QueryResult<Vec<usize>> {
        let registry = self.store.registry();
        let table = self.source.name();
        let mut hits = Vec::new();
        for (index, base) in self.store.table(table)?.into_iter().enumerate() {
            let row = Joined::new(shape.reference(), table, base);
            if shape.predicate.evaluate(&row, registry)? {
                hits.push((order_keys(&row, &shape.ordering)?, index));
            }
        }
        sort_keyed(&mut hits, &shape.ordering);
        Ok(hits
            .into_iter()
            .map(|(_, index)| index)
            .skip(shape.offset)
            .take(shape.limit.unwrap_or(usize::MAX))
            .collect())
    }

    /// Run `f` on the mutable table of this source.
    fn with_table<T>(&self, f: impl FnOnce(&mut Vec<Record>) -> QueryResult<T>) -> QueryResult<T> {
        let mut tables = self.store.inner.tables.borrow_mut();
        let table = tables
            .get_mut(self.source.name())
            .ok_or_else(|| QueryError::Unsupported(format!("no table {} in this store", self.source.name())))?;
        f(table)
    }

    /// Coerce `value` into the declared type of `field`.
    fn coerce(&self, field: &str, value: &Value) -> QueryResult<(String, Value)> {
        let model = self.model();
        match model.find_field(field, true) {
            Some((name, data_type)) => Ok((name.to_string(), NativeAdapter.decode(data_type, value)?)),
            None => Err(QueryError::invalid(format!("{} has no field {}", model.name, field))),
        }
    }
}

impl DataSource for ArrayDataSource {
    fn source(&self) -> &SourceRef {
        &self.source
    }

    fn fetch(&self, selection: &ReadSelection) -> QueryResult<Vec<Record>> {
        let rows = self.read(selection)?;
        Materializer::new(self.model(), &selection.additional, &NativeAdapter).materialize_all(rows)
    }

    fn count(&self, selection: &ReadSelection) -> QueryResult<u64> {
        Ok(self.read(selection)?.len() as u64)
    }

    fn update(&self, selection: &UpdateSelection) -> QueryResult<u64> {
        check_owner(&self.source, &selection.shape)?;
        if selection.sets.is_empty() {
            return Err(QueryError::invalid("UPDATE without assignments"));
        }
        let hits = self.matching(&selection.shape)?;
        let registry = self.store.registry();
        let reference = selection.shape.reference();

        // assignments see the row as it was before the update
        let mut changes = Vec::with_capacity(hits.len());
        let snapshot = self.rows()?;
        for &index in &hits {
            let current = Joined::new(reference, self.source.name(), snapshot[index].clone());
            let mut assigned = Vec::with_capacity(selection.sets.len());
            for (field, set) in &selection.sets {
                let value = match set {
                    SetValue::Value(value) => value.clone(),
                    SetValue::Raw(fragment) => evaluate_fragment(fragment, &current, registry)?,
                };
                assigned.push(self.coerce(field, &value)?);
            }
            changes.push((index, assigned));
        }

        self.with_table(|table| {
            for (index, assigned) in changes {
                if let Some(row) = table.get_mut(index) {
                    row.extend(assigned);
                }
            }
            Ok(())
        })?;
        tracing::debug!(source = self.source.name(), affected = hits.len(), "updated in memory");
        Ok(hits.len() as u64)
    }

    fn delete(&self, selection: &DeleteSelection) -> QueryResult<u64> {
        check_owner(&self.source, &selection.shape)?;
        let hits: BTreeSet<usize> = self.matching(&selection.shape)?.into_iter().collect();
        self.with_table(|table| {
            let mut index = 0;
            table.retain(|_| {
                let keep = !hits.contains(&index);
                index += 1;
                keep
            });
            Ok(())
        })?;
        tracing::debug!(source = self.source.name(), affected = hits.len(), "deleted in memory");
        Ok(hits.len() as u64)
    }

    fn insert(&self, records: &[Record], replace: bool) -> QueryResult<Option<Value>> {
        let model = self.model();
        let mut prepared = Vec::with_capacity(records.len());
        for record in records {
            let mut row: Record = model
                .fields
                .iter()
                .map(|(name, _)| (name.clone(), Value::Null))
                .collect();
            for (field, value) in record {
                let (name, value) = self.coerce(field, value)?;
                row.insert(name, value);
            }
            prepared.push(row);
        }

        self.with_table(|table| {
            // the batch lands whole or not at all
            let mut staged = table.clone();
            let mut generated = None;
            for mut row in prepared {
                if let Some(key) = model.serial_key() {
                    if row.get(key).is_none_or(Value::is_null) {
                        let next = staged
                            .iter()
                            .filter_map(|r| match r.get(key) {
                                Some(Value::Int(n)) => Some(*n),
                                _ => None,
                            })
                            .max()
                            .unwrap_or(0)
                            + 1;
                        row.insert(key.to_string(), Value::Int(next));
                        generated = Some(Value::Int(next));
                    }
                }

                let existing = model.primary_key.as_deref().and_then(|pk| {
                    let key = row.get(pk).filter(|v| !v.is_null())?;
                    staged
                        .iter()
                        .position(|r| r.get(pk).is_some_and(|other| other.sql_eq(key)))
                });
                match existing {
                    Some(index) if replace => staged[index] = row,
                    Some(_) => {
                        return Err(QueryError::invalid(format!("duplicate primary key in {}", model.name)));
                    }
                    None => staged.push(row),
                }
            }
            *table = staged;
            Ok(generated)
        })
    }
}

/// A row of the main source and the rows joined to it so far.
#[derive(Debug, Clone)]
struct Joined<'r> {
    reference: &'r str,
    table: &'r str,
    base: Record,
    /// Joined rows by alias; `None` when an outer join found nothing.
    others: Vec<(String, Option<Record>)>,
    computed: Record,
}

impl<'r> Joined<'r> {
    fn new(reference: &'r str, table: &'r str, base: Record) -> Self {
        Self {
            reference,
            table,
            base,
            others: Vec::new(),
            computed: Record::new(),
        }
    }

    /// Main-source side of a right join without a match.
    fn blank(reference: &'r str, table: &'r str, model: &Model, aliases: &[String]) -> Self {
        let base = model
            .fields
            .iter()
            .map(|(name, _)| (name.clone(), Value::Null))
            .collect();
        Self {
            others: aliases.iter().map(|a| (a.clone(), None)).collect(),
            ..Self::new(reference, table, base)
        }
    }

    fn with(&self, alias: &str, other: Option<Record>) -> Self {
        let mut next = self.clone();
        next.others.push((alias.to_string(), other));
        next
    }

    fn other(&self, alias: &str) -> Option<&Record> {
        self.others
            .iter()
            .find(|(a, _)| a == alias)
            .and_then(|(_, record)| record.as_ref())
    }
}

impl Fields for Joined<'_> {
    fn field(&self, name: &str) -> Option<&Value> {
        self.computed
            .get(name)
            .or_else(|| self.base.get(name))
            .or_else(|| self.others.iter().find_map(|(_, r)| r.as_ref()?.get(name)))
    }

    fn qualified_field(&self, model: &str, name: &str) -> Option<&Value> {
        if model == self.reference || model == self.table {
            return self.base.get(name);
        }
        if let Some((_, other)) = self.others.iter().find(|(alias, _)| alias == model) {
            return other.as_ref().and_then(|r| r.get(name));
        }
        self.base.qualified_field(model, name)
    }
}

fn join_rows<'r>(
    rows: Vec<Joined<'r>>,
    others: &[Record],
    join: &Join,
    registry: &TypeRegistry,
    blank: Joined<'r>,
) -> QueryResult<Vec<Joined<'r>>> {
    let mut out = Vec::new();
    match join.kind {
        JoinKind::Inner | JoinKind::Left => {
            for row in &rows {
                let mut matched = false;
                for other in others {
                    let candidate = row.with(&join.alias, Some(other.clone()));
                    if join.on.evaluate(&candidate, registry)? {
                        out.push(candidate);
                        matched = true;
                    }
                }
                if !matched && join.kind == JoinKind::Left {
                    out.push(row.with(&join.alias, None));
                }
            }
        }
        JoinKind::Right => {
            for other in others {
                let mut matched = false;
                for row in &rows {
                    let candidate = row.with(&join.alias, Some(other.clone()));
                    if join.on.evaluate(&candidate, registry)? {
                        out.push(candidate);
                        matched = true;
                    }
                }
                if !matched {
                    out.push(blank.with(&join.alias, Some(other.clone())));
                }
            }
        }
    }
    Ok(out)
}

/// One representative row per distinct key, in first-seen order, kept
/// when HAVING holds for it.
fn group_rows<'r>(rows: Vec<Joined<'r>>, grouping: &Grouping, registry: &TypeRegistry) -> QueryResult<Vec<Joined<'r>>> {
    let mut groups: Vec<(Vec<Value>, Joined<'r>)> = Vec::new();
    for row in rows {
        let key = grouping
            .columns
            .iter()
            .map(|column| column.evaluate(&row))
            .collect::<QueryResult<Vec<_>>>()?;
        if !groups.iter().any(|(seen, _)| *seen == key) {
            groups.push((key, row));
        }
    }
    let mut kept = Vec::with_capacity(groups.len());
    for (_, row) in groups {
        if grouping.having.evaluate(&row, registry)? {
            kept.push(row);
        }
    }
    Ok(kept)
}

fn evaluate_fragment(fragment: &Fragment, row: &Joined, registry: &TypeRegistry) -> QueryResult<Value> {
    match fragment {
        Fragment::Expr(expr) => expr.evaluate(row),
        Fragment::Sql { format, args } => parser::parse_with(format, args, registry)
            .map_err(|e| QueryError::Unsupported(format!("'{}' cannot be evaluated in memory: {}", format, e)))?
            .evaluate(row),
    }
}

/// Columns of one output row: the projection (or every main-source
/// field), then computed fields and `alias.field` sub-record columns.
fn project(selection: &ReadSelection, row: &Joined, registry: &TypeRegistry) -> QueryResult<RawRow> {
    let mut columns = RawRow::new();
    if selection.projection.is_empty() {
        columns.extend(row.base.iter().map(|(name, value)| (name.clone(), value.clone())));
    } else {
        for item in &selection.projection {
            let expr = match &item.fragment {
                Fragment::Expr(expr) => expr.clone(),
                Fragment::Sql { format, args } => parser::parse_with(format, args, registry)?,
            };
            let name = match &item.alias {
                Some(alias) => alias.clone(),
                None => column_name(&expr)?,
            };
            columns.push((name, expr.evaluate(row)?));
        }
    }

    for field in &selection.additional {
        match &field.record {
            Some(model) => {
                let nested = row.other(&field.alias);
                for (name, _) in &model.fields {
                    let value = nested.and_then(|r| r.get(name)).cloned().unwrap_or(Value::Null);
                    columns.push((format!("{}.{}", field.alias, name), value));
                }
            }
            None => {
                let value = row.computed.get(&field.alias).cloned().unwrap_or(Value::Null);
                columns.push((field.alias.clone(), value));
            }
        }
    }
    Ok(columns)
}

/// Name of an unaliased projected column.
fn column_name(expr: &Expr) -> QueryResult<String> {
    match expr {
        Expr::FieldAccess { field, .. } => Ok(field.clone()),
        other => other.render(Dialect::default().generator().as_ref()),
    }
}

fn order_keys(row: &Joined, ordering: &[OrderTerm]) -> QueryResult<Vec<Value>> {
    ordering.iter().map(|term| term.expr.evaluate(row)).collect()
}

/// Stable sort by precomputed keys. NULL sorts lowest.
fn sort_keyed<T>(items: &mut [(Vec<Value>, T)], ordering: &[OrderTerm]) {
    if ordering.is_empty() {
        return;
    }
    items.sort_by(|(a, _), (b, _)| {
        for ((x, y), term) in a.iter().zip(b).zip(ordering) {
            let ord = x.sort_cmp(y);
            let ord = if term.descending { ord.reverse() } else { ord };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    });
}
