//! Typed records from flat result rows.

use std::collections::BTreeMap;

use crate::ast::*;
use crate::engine::RawRow;
use crate::error::QueryResult;
use crate::transpiler::TypeAdapter;

/// Rebuilds records of one model from rows shaped like the compiled
/// SELECT: schema columns, computed fields, and `alias.field` columns of
/// sub-records.
pub struct Materializer<'a, A: TypeAdapter + ?Sized> {
    model: &'a Model,
    additional: &'a [AdditionalField],
    adapter: &'a A,
    case_sensitive: bool,
}

impl<'a, A: TypeAdapter + ?Sized> Materializer<'a, A> {
    pub fn new(model: &'a Model, additional: &'a [AdditionalField], adapter: &'a A) -> Self {
        Self {
            model,
            additional,
            adapter,
            case_sensitive: true,
        }
    }

    /// Match column names against the schema ignoring ASCII case.
    pub fn case_sensitive(mut self, case_sensitive: bool) -> Self {
        self.case_sensitive = case_sensitive;
        self
    }

    pub fn materialize_all(&self, rows: Vec<RawRow>) -> QueryResult<Vec<Record>> {
        rows.into_iter().map(|row| self.materialize(row)).collect()
    }

    pub fn materialize(&self, row: RawRow) -> QueryResult<Record> {
        let mut record = Record::new();
        let mut nested: BTreeMap<usize, Vec<(String, Value)>> = BTreeMap::new();

        for (column, value) in row {
            if let Some((index, field)) = self.sub_record_column(&column) {
                nested.entry(index).or_default().push((field.to_string(), value));
                continue;
            }
            if let Some(computed) = self.computed(&column) {
                let value = match &computed.data_type {
                    Some(data_type) => self.adapter.decode(data_type, &value)?,
                    None => value,
                };
                record.insert(computed.alias.clone(), value);
                continue;
            }
            match self.model.find_field(&column, self.case_sensitive) {
                Some((name, data_type)) => {
                    let value = self.adapter.decode(data_type, &value)?;
                    record.insert(name.to_string(), value);
                }
                None => {
                    record.insert(column, value);
                }
            }
        }

        for (index, columns) in nested {
            let field = &self.additional[index];
            let Some(model) = &field.record else { continue };
            record.insert(field.alias.clone(), self.sub_record(model, columns)?);
        }
        Ok(record)
    }

    /// All-null columns mean the outer join found nothing.
    fn sub_record(&self, model: &Model, columns: Vec<(String, Value)>) -> QueryResult<Value> {
        if columns.iter().all(|(_, value)| value.is_null()) {
            return Ok(Value::Null);
        }
        let mut record = Record::new();
        for (column, value) in columns {
            match model.find_field(&column, self.case_sensitive) {
                Some((name, data_type)) => {
                    record.insert(name.to_string(), self.adapter.decode(data_type, &value)?);
                }
                None => {
                    record.insert(column, value);
                }
            }
        }
        Ok(Value::Object(record))
    }

    fn sub_record_column<'c>(&self, column: &'c str) -> Option<(usize, &'c str)> {
        let (prefix, field) = column.split_once('.')?;
        self.additional
            .iter()
            .position(|f| f.record.is_some() && self.same_name(&f.alias, prefix))
            .map(|index| (index, field))
    }

    fn computed(&self, column: &str) -> Option<&AdditionalField> {
        self.additional
            .iter()
            .find(|f| f.record.is_none() && self.same_name(&f.alias, column))
    }

    fn same_name(&self, a: &str, b: &str) -> bool {
        if self.case_sensitive {
            a == b
        } else {
            a.eq_ignore_ascii_case(b)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transpiler::NativeAdapter;
    use crate::transpiler::sql::sqlite::SqliteGenerator;
    use pretty_assertions::assert_eq;

    fn users() -> Model {
        Model::new("users")
            .key("id", DataType::serial())
            .field("name", DataType::string())
            .field("active", DataType::Boolean)
    }

    fn posts() -> Model {
        Model::new("posts")
            .key("id", DataType::serial())
            .field("title", DataType::string())
    }

    fn row(columns: &[(&str, Value)]) -> RawRow {
        columns.iter().map(|(c, v)| (c.to_string(), v.clone())).collect()
    }

    #[test]
    fn test_schema_columns_decode() {
        let model = users();
        let materializer = Materializer::new(&model, &[], &SqliteGenerator);
        let record = materializer
            .materialize(row(&[
                ("id", Value::Int(3)),
                ("name", Value::from("ann")),
                ("active", Value::Int(1)),
            ]))
            .unwrap();
        assert_eq!(record, crate::record! { "id" => 3, "name" => "ann", "active" => true });
    }

    #[test]
    fn test_case_insensitive_columns() {
        let model = users();
        let materializer = Materializer::new(&model, &[], &NativeAdapter).case_sensitive(false);
        let record = materializer
            .materialize(row(&[("NAME", Value::from("ann")), ("Active", Value::from("yes"))]))
            .unwrap();
        assert_eq!(record, crate::record! { "name" => "ann", "active" => true });

        let strict = Materializer::new(&model, &[], &NativeAdapter);
        let record = strict.materialize(row(&[("NAME", Value::from("ann"))])).unwrap();
        assert_eq!(record.get("NAME"), Some(&Value::from("ann")));
    }

    #[test]
    fn test_computed_field_decodes_declared_type() {
        let model = users();
        let additional = vec![
            AdditionalField {
                alias: "total".to_string(),
                fragment: None,
                data_type: Some(DataType::int()),
                record: None,
            },
            AdditionalField {
                alias: "label".to_string(),
                fragment: None,
                data_type: None,
                record: None,
            },
        ];
        let materializer = Materializer::new(&model, &additional, &NativeAdapter);
        let record = materializer
            .materialize(row(&[("total", Value::from("12")), ("label", Value::from("12"))]))
            .unwrap();
        assert_eq!(record.get("total"), Some(&Value::Int(12)));
        assert_eq!(record.get("label"), Some(&Value::from("12")));
    }

    #[test]
    fn test_sub_record_grouping() {
        let model = users();
        let additional = vec![AdditionalField {
            alias: "post".to_string(),
            fragment: None,
            data_type: None,
            record: Some(posts()),
        }];
        let materializer = Materializer::new(&model, &additional, &NativeAdapter);

        let joined = materializer
            .materialize(row(&[
                ("id", Value::Int(1)),
                ("post.id", Value::from("9")),
                ("post.title", Value::from("hello")),
            ]))
            .unwrap();
        assert_eq!(
            joined.get("post"),
            Some(&Value::Object(crate::record! { "id" => 9, "title" => "hello" }))
        );

        let missing = materializer
            .materialize(row(&[
                ("id", Value::Int(2)),
                ("post.id", Value::Null),
                ("post.title", Value::Null),
            ]))
            .unwrap();
        assert_eq!(missing.get("post"), Some(&Value::Null));
    }

    #[test]
    fn test_bad_value_is_an_error() {
        let model = users();
        let materializer = Materializer::new(&model, &[], &NativeAdapter);
        assert!(materializer.materialize(row(&[("id", Value::from("x"))])).is_err());
    }
}
