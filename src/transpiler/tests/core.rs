//! Core SQL transpiler tests (SELECT, COUNT, UPDATE, DELETE, INSERT).

use super::*;
use crate::args;
use crate::ast::*;
use crate::error::QueryError;
use crate::record;
use crate::transpiler::{Compiler, Dialect, GeneratedKey, KeyRetrieval, ToSql};
use pretty_assertions::assert_eq;

#[test]
fn test_simple_select() {
    assert_eq!(users().read().to_sql().unwrap(), "SELECT \"users\".* FROM \"users\"");
}

#[test]
fn test_select_columns_filter_order_limit() {
    let sql = users()
        .filter("age >= %i", args![18])
        .order_by_descending("age")
        .limit(10)
        .select(&["id", "name"])
        .to_sql()
        .unwrap();
    assert_eq!(
        sql,
        "SELECT \"id\", \"name\" FROM \"users\" WHERE age >= 18 ORDER BY \"age\" DESC LIMIT 10"
    );
}

#[test]
fn test_clause_glue_and_parentheses() {
    let sql = users()
        .filter("[age] > %i", args![18])
        .or_where("[name] = %s", args!["root"])
        .and_where("a = 1 or b = 2", args![])
        .read()
        .to_sql()
        .unwrap();
    assert_eq!(
        sql,
        "SELECT \"users\".* FROM \"users\" WHERE \"age\" > 18 OR \"name\" = 'root' AND (a = 1 or b = 2)"
    );
}

#[test]
fn test_negated_group() {
    let inactive = Predicate::new().filter("[active] = %b", args![false]);
    let sql = users().and(Predicate::not(inactive)).read().to_sql().unwrap();
    assert_eq!(sql, "SELECT \"users\".* FROM \"users\" WHERE NOT (\"active\" = FALSE)");
}

#[test]
fn test_empty_predicate_omits_where() {
    let sql = users().and(Predicate::new()).read().to_sql().unwrap();
    assert_eq!(sql, "SELECT \"users\".* FROM \"users\"");

    let compiler = Compiler::new(Dialect::Postgres);
    assert_eq!(compiler.predicate_sql(&Predicate::new()).unwrap(), "");
}

#[test]
fn test_blank_clauses_render_nothing() {
    let sql = users().filter("", args![]).and_where("[age] = %i", args![1]).read().to_sql().unwrap();
    assert_eq!(sql, "SELECT \"users\".* FROM \"users\" WHERE \"age\" = 1");

    let blank = users().filter("  ", args![]);
    assert!(!blank.shape.predicate.has_clauses());
    assert_eq!(blank.read().to_sql().unwrap(), "SELECT \"users\".* FROM \"users\"");
}

#[test]
fn test_expression_clause() {
    let adult = Expr::binary(Expr::field("age"), Operator::Gte, Expr::value(18));
    let named = Expr::binary(Expr::field("name"), Operator::Like, Expr::value("a%"));
    let either = Expr::binary(adult.clone(), Operator::Or, named);
    let sql = users().and(either).and(adult).read().to_sql().unwrap();
    assert_eq!(
        sql,
        "SELECT \"users\".* FROM \"users\" WHERE (\"age\" >= 18 OR \"name\" LIKE 'a%') AND \"age\" >= 18"
    );
}

#[test]
fn test_join_with_record() {
    let sql = users()
        .alias("u")
        .left_join(&posts_source(), "p", "{p}.[user_id] = {u}.[id]")
        .with_record("p", posts_model())
        .to_sql()
        .unwrap();
    assert_eq!(
        sql,
        "SELECT \"u\".*, \"p\".\"id\" AS \"p.id\", \"p\".\"user_id\" AS \"p.user_id\", \"p\".\"title\" AS \"p.title\" \
         FROM \"users\" AS \"u\" LEFT JOIN \"posts\" AS \"p\" ON \"p\".\"user_id\" = \"u\".\"id\""
    );
}

#[test]
fn test_join_from_other_backend_fails() {
    let foreign = SourceRef::new(BackendId(2), posts_model());
    let err = users().inner_join(&foreign, "p", "1 = 1").to_sql().unwrap_err();
    assert!(matches!(err, QueryError::IncompatibleSource { ref owner, ref other } if owner == "users" && other == "posts"));

    let err = users().also_from(&foreign, "p").to_sql().unwrap_err();
    assert!(matches!(err, QueryError::IncompatibleSource { .. }));
}

#[test]
fn test_extra_source() {
    let sql = users()
        .also_from(&posts_source(), "p")
        .filter("{p}.[user_id] = {users}.[id]", args![])
        .to_sql()
        .unwrap();
    assert_eq!(
        sql,
        "SELECT \"users\".* FROM \"users\", \"posts\" AS \"p\" WHERE \"p\".\"user_id\" = \"users\".\"id\""
    );
}

#[test]
fn test_group_by_having_and_count() {
    let grouped = users()
        .select(&["group"])
        .with("total", "COUNT(*)")
        .group_by_having(&["group"], ("COUNT(*) > %i", args![1]));
    let compiler = Compiler::new(Dialect::Postgres);
    let select = compiler.select(&grouped).unwrap();
    assert_eq!(
        select,
        "SELECT \"group\", COUNT(*) AS \"total\" FROM \"users\" GROUP BY \"group\" HAVING COUNT(*) > 1"
    );
    assert_eq!(
        compiler.count(&grouped).unwrap(),
        format!("SELECT COUNT(*) AS \"count\" FROM ({}) AS \"counted\"", select)
    );
}

#[test]
fn test_count_replaces_projection() {
    let selection = users().filter("age > %i", args![1]).order_by("name").read();
    let sql = Compiler::new(Dialect::Postgres).count(&selection).unwrap();
    assert_eq!(sql, "SELECT COUNT(*) AS \"count\" FROM \"users\" WHERE age > 1");
}

#[test]
fn test_count_of_limited_selection_keeps_order() {
    let selection = users().order_by("age").limit(3).read();
    let sql = Compiler::new(Dialect::Postgres).count(&selection).unwrap();
    assert_eq!(
        sql,
        "SELECT COUNT(*) AS \"count\" FROM (SELECT \"users\".* FROM \"users\" ORDER BY \"age\" LIMIT 3) AS \"counted\""
    );
}

#[test]
fn test_computed_field_and_distinct() {
    let sql = users()
        .distinct()
        .with_typed("label", ("[name] || %s", args!["!"]), DataType::string())
        .offset(20)
        .to_sql()
        .unwrap();
    assert_eq!(
        sql,
        "SELECT DISTINCT \"users\".*, \"name\" || '!' AS \"label\" FROM \"users\" OFFSET 20"
    );
}

#[test]
fn test_first_and_last() {
    assert_eq!(
        users().order_by("name").last().to_sql().unwrap(),
        "SELECT \"users\".* FROM \"users\" ORDER BY \"name\" DESC LIMIT 1"
    );
    assert_eq!(
        users().last().to_sql().unwrap(),
        "SELECT \"users\".* FROM \"users\" ORDER BY \"users\".\"id\" DESC LIMIT 1"
    );
    assert_eq!(
        users().order_by("name").first().to_sql().unwrap(),
        "SELECT \"users\".* FROM \"users\" ORDER BY \"name\" LIMIT 1"
    );
}

#[test]
fn test_update() {
    let sql = users()
        .filter("[id] = %i", args![7])
        .set("name", "ann")
        .set_raw("age", "[age] + 1")
        .set("active", true)
        .to_sql()
        .unwrap();
    assert_eq!(
        sql,
        "UPDATE \"users\" SET \"name\" = 'ann', \"age\" = \"age\" + 1, \"active\" = TRUE WHERE \"id\" = 7"
    );
}

#[test]
fn test_update_without_assignments_fails() {
    let update = users().set("name", "x");
    let empty = UpdateSelection {
        sets: Vec::new(),
        ..update
    };
    assert!(matches!(empty.to_sql(), Err(QueryError::InvalidValue(_))));
}

#[test]
fn test_bounded_update_uses_key_subquery() {
    let sql = users().order_by("age").limit(2).set("active", false).to_sql().unwrap();
    assert_eq!(
        sql,
        "UPDATE \"users\" SET \"active\" = FALSE WHERE \"id\" IN \
         (SELECT \"id\" FROM (SELECT \"id\" FROM \"users\" ORDER BY \"age\" LIMIT 2) AS \"subset\")"
    );
}

#[test]
fn test_delete() {
    let sql = users().filter("[age] < %i", args![13]).delete().to_sql().unwrap();
    assert_eq!(sql, "DELETE FROM \"users\" WHERE \"age\" < 13");
}

#[test]
fn test_bounded_delete_without_key_fails() {
    let keyless = Model::new("logs").field("line", DataType::text());
    let selection = Selection::new(SourceRef::new(BackendId(1), keyless)).limit(5).delete();
    assert!(matches!(selection.to_sql(), Err(QueryError::Unsupported(_))));
}

#[test]
fn test_insert_returns_generated_key() {
    let compiler = Compiler::new(Dialect::Postgres);
    let source = users().shape.source;
    let statement = compiler
        .insert(&source, &[record! { "name" => "ann", "age" => 30 }], false)
        .unwrap();
    assert_eq!(
        statement.sql,
        "INSERT INTO \"users\" (\"age\", \"name\") VALUES (30, 'ann') RETURNING \"id\""
    );
    assert_eq!(
        statement.key,
        Some(GeneratedKey {
            column: "id".to_string(),
            retrieval: KeyRetrieval::Returning
        })
    );
}

#[test]
fn test_upsert_on_postgres() {
    let compiler = Compiler::new(Dialect::Postgres);
    let source = users().shape.source;
    let statement = compiler
        .insert(&source, &[record! { "id" => 1, "name" => "ann" }], true)
        .unwrap();
    assert_eq!(
        statement.sql,
        "INSERT INTO \"users\" (\"id\", \"name\") VALUES (1, 'ann') ON CONFLICT (\"id\") DO UPDATE SET \"name\" = EXCLUDED.\"name\""
    );
    assert_eq!(statement.key, None);
}

#[test]
fn test_insert_rows_must_share_fields() {
    let compiler = Compiler::new(Dialect::Postgres);
    let source = users().shape.source;
    let rows = [record! { "name" => "a" }, record! { "age" => 3 }];
    assert!(matches!(compiler.insert(&source, &rows, false), Err(QueryError::InvalidValue(_))));
    assert!(matches!(compiler.insert(&source, &[], false), Err(QueryError::InvalidValue(_))));
}

#[test]
fn test_insert_encodes_by_field_type() {
    let compiler = Compiler::new(Dialect::Postgres);
    let source = users().shape.source;
    // age is declared as an integer, so the text "41" is encoded as a number
    let statement = compiler.insert(&source, &[record! { "age" => "41" }], false).unwrap();
    assert_eq!(statement.sql, "INSERT INTO \"users\" (\"age\") VALUES (41) RETURNING \"id\"");
    assert!(compiler.insert(&source, &[record! { "age" => "old" }], false).is_err());
}

#[test]
fn test_enum_placeholder_through_registry() {
    let registry = TypeRegistry::new().register_enum("Mood", ["happy", "sad"]);
    let compiler = Compiler::new(Dialect::Postgres).with_registry(registry);
    let sql = compiler
        .select(&users().filter("[mood] = %Mood", args!["sad"]).read())
        .unwrap();
    assert_eq!(sql, "SELECT \"users\".* FROM \"users\" WHERE \"mood\" = 'sad'");
}
