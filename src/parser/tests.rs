use super::*;
use crate::args;
use crate::ast::{DataType, Operator};
use crate::error::QueryError;
use crate::record;
use crate::transpiler::Dialect;
use pretty_assertions::assert_eq;

/// Upper-cases string literals, leaves identifiers bare.
struct ShoutingQuoter;

impl Quoter for ShoutingQuoter {
    fn quote_literal(&self, _data_type: &DataType, value: &Value) -> QueryResult<String> {
        Ok(match value {
            Value::String(s) => format!("'{}'", s.to_uppercase()),
            other => other.to_string(),
        })
    }

    fn quote_model(&self, name: &str) -> String {
        format!("<{}>", name)
    }

    fn quote_field(&self, name: &str) -> String {
        format!("[{}]", name)
    }
}

// ========================================================================
// Interpolation
// ========================================================================

#[test]
fn test_interpolate_string_placeholder() {
    let sql = interpolate("username = %s", &args!["root"], &ShoutingQuoter).unwrap();
    assert_eq!(sql, "username = 'ROOT'");
}

#[test]
fn test_interpolate_keeps_raw_text() {
    let sql = interpolate("a  =\t%i AND  b LIKE 'x%'", &args![5], &ShoutingQuoter).unwrap();
    assert_eq!(sql, "a  =\t5 AND  b LIKE 'x%'");
}

#[test]
fn test_interpolate_literal_syntax() {
    let generator = Dialect::Postgres.generator();
    let sql = interpolate(
        "{User}.[name] = \"it's \\\"ok\\\"\" and active = true",
        &[],
        generator.as_ref(),
    )
    .unwrap();
    assert_eq!(sql, "\"User\".\"name\" = 'it''s \"ok\"' and active = TRUE");
}

#[test]
fn test_interpolate_model_and_column_placeholders() {
    let generator = Dialect::MySQL.generator();
    let sql = interpolate("%m.%c = %c", &args!["users", "id", "posts.user_id"], generator.as_ref()).unwrap();
    assert_eq!(sql, "`users`.`id` = `posts`.`user_id`");
}

#[test]
fn test_interpolate_dynamic_type() {
    let generator = Dialect::Postgres.generator();
    let sql = interpolate("x = %_ and y = %_", &args!["i", "42", DataType::Boolean, 1], generator.as_ref()).unwrap();
    assert_eq!(sql, "x = 42 and y = TRUE");
}

#[test]
fn test_interpolate_tuple_counts_elements() {
    let generator = Dialect::Postgres.generator();
    for n in [0usize, 1, 3, 7] {
        let values: Vec<i64> = (0..n as i64).collect();
        let sql = interpolate("id IN %i()", &args![values], generator.as_ref()).unwrap();
        let tuple = sql.trim_start_matches("id IN ");
        if n == 0 {
            assert_eq!(tuple, "(NULL)");
        } else {
            assert_eq!(tuple.split(", ").count(), n);
        }
    }
}

#[test]
fn test_interpolate_inferred_tuple() {
    let generator = Dialect::Postgres.generator();
    let sql = interpolate("name in ?()", &args![vec!["a", "b"]], generator.as_ref()).unwrap();
    assert_eq!(sql, "name in ('a', 'b')");
}

#[test]
fn test_single_quoted_strings_are_not_scanned() {
    let generator = Dialect::Postgres.generator();
    let sql = interpolate("note = '%s ? it''s'", &[], generator.as_ref()).unwrap();
    assert_eq!(sql, "note = '%s ? it''s'");
}

#[test]
fn test_missing_argument() {
    let err = interpolate("a = %s and b = %s", &args!["x"], &ShoutingQuoter).unwrap_err();
    assert!(matches!(err, QueryError::ArgumentCount { index: 1, supplied: 1 }));
}

#[test]
fn test_unknown_type_code() {
    let err = interpolate("a = %nope", &args![1], &ShoutingQuoter).unwrap_err();
    assert!(matches!(err, QueryError::UnknownType(code) if code == "nope"));
}

#[test]
fn test_enum_placeholder_uses_registry() {
    let registry = TypeRegistry::new().register_enum("Mood", ["happy", "sad"]);
    let generator = Dialect::Postgres.generator();
    let sql = interpolate_with("mood = %Mood", &args!["sad"], &registry, generator.as_ref()).unwrap();
    assert_eq!(sql, "mood = 'sad'");
    assert!(interpolate_with("mood = %Mood", &args!["angry"], &registry, generator.as_ref()).is_err());
}

// ========================================================================
// Parsing
// ========================================================================

#[test]
fn test_parse_literal_equality() {
    let expr = parse("3 = 3", &[]).unwrap();
    assert_eq!(expr, Expr::binary(Expr::literal(DataType::int(), 3), Operator::Eq, Expr::literal(DataType::int(), 3)));
    assert_eq!(expr.evaluate(&record! {}).unwrap(), Value::Bool(true));
}

#[test]
fn test_parse_precedence() {
    let expr = parse("a = 1 or b = 2 and not c = 3", &[]).unwrap();
    let Expr::Infix { op, right, .. } = &expr else {
        panic!("expected infix, got {:?}", expr);
    };
    assert_eq!(*op, Operator::Or);
    let Expr::Infix { op, right, .. } = right.as_ref() else {
        panic!("expected and");
    };
    assert_eq!(*op, Operator::And);
    assert!(matches!(right.as_ref(), Expr::Prefix { op: Operator::Not, .. }));
}

#[test]
fn test_parse_is_not_null() {
    let expr = parse("{users}.[deleted_at] is not null", &[]).unwrap();
    let generator = Dialect::Postgres.generator();
    assert_eq!(expr.render(generator.as_ref()).unwrap(), "\"users\".\"deleted_at\" IS NOT NULL");
}

#[test]
fn test_parse_qualified_raw_field() {
    let expr = parse("u.age >= ?", &args![18]).unwrap();
    assert_eq!(
        expr,
        Expr::binary(
            Expr::FieldAccess {
                field: "age".into(),
                quoted: false,
                model: Some("u".into()),
                model_quoted: false,
            },
            Operator::Gte,
            Expr::value(18),
        )
    );
}

#[test]
fn test_parse_in_forms() {
    let r = record! { "id" => 3, "name" => "bob" };
    assert_eq!(parse("id in (1, 2, 3)", &[]).unwrap().evaluate(&r).unwrap(), Value::Bool(true));
    assert_eq!(parse("id in %i()", &args![vec![4, 5]]).unwrap().evaluate(&r).unwrap(), Value::Bool(false));
    assert_eq!(parse("name not in ?()", &args![vec!["ann"]]).unwrap().evaluate(&r).unwrap(), Value::Bool(true));
    assert_eq!(parse("name not like 'b%'", &[]).unwrap().evaluate(&r).unwrap(), Value::Bool(false));
}

#[test]
fn test_single_item_list_stays_a_list() {
    let generator = Dialect::Postgres.generator();
    let r = record! { "id" => 5 };

    let one = parse("[id] in (5)", &[]).unwrap();
    assert_eq!(one.render(generator.as_ref()).unwrap(), "\"id\" IN (5)");
    assert_eq!(one.evaluate(&r).unwrap(), Value::Bool(true));

    let none = parse("[id] not in (5)", &[]).unwrap();
    assert_eq!(none.render(generator.as_ref()).unwrap(), "NOT (\"id\" IN (5))");
    assert_eq!(none.evaluate(&r).unwrap(), Value::Bool(false));

    let scalar = Expr::binary(Expr::field("id"), Operator::In, Expr::value(5));
    assert_eq!(scalar.render(generator.as_ref()).unwrap(), "\"id\" IN (5)");
}

#[test]
fn test_parse_unknown_operator() {
    let err = parse("3 == 3", &[]).unwrap_err();
    assert!(matches!(err, QueryError::UnsupportedOperator(op) if op == "=="));
}

#[test]
fn test_parse_errors_carry_position() {
    let cases = [
        ("(a = 1", 0, "unbalanced parenthesis"),
        ("a = 1)", 5, "unbalanced parenthesis"),
        ("a = ", 4, "expected an operand"),
        ("and a = 1", 0, "dangling operator"),
        ("a = 1 b", 6, "unexpected trailing input"),
        ("a < b < c", 6, "comparison operators do not chain"),
    ];
    for (input, expected_position, expected_message) in cases {
        match parse(input, &[]) {
            Err(QueryError::Parse { position, message, .. }) => {
                assert_eq!((position, message.as_str()), (expected_position, expected_message), "{}", input);
            }
            other => panic!("{}: expected parse error, got {:?}", input, other),
        }
    }
}

#[test]
fn test_parse_empty() {
    assert!(matches!(parse("   ", &[]), Err(QueryError::Parse { .. })));
}

#[test]
fn test_tokenize_spans() {
    let tokens = tokenize("[a] = %s", &args!["x"], &TypeRegistry::default()).unwrap();
    let spans: Vec<_> = tokens.iter().map(|t| (t.span.clone(), t.substituted)).collect();
    assert_eq!(spans, vec![(0..3, true), (4..5, false), (6..8, true)]);
}
