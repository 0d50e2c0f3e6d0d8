use quarry::prelude::*;
use pretty_assertions::assert_eq;

fn accounts_model() -> Model {
    Model::new("accounts")
        .key("id", DataType::serial())
        .field("name", DataType::string())
        .field("group", DataType::string())
        .field("score", DataType::int())
}

/// Six accounts: four in "user", two in "admin".
fn accounts() -> ArrayDataSource {
    ArrayDataSource::new(
        accounts_model(),
        vec![
            record! { "id" => 1, "name" => "ann", "group" => "user", "score" => 10 },
            record! { "id" => 2, "name" => "bob", "group" => "admin", "score" => 30 },
            record! { "id" => 3, "name" => "cy", "group" => "user", "score" => 20 },
            record! { "id" => 4, "name" => "dee", "group" => "user", "score" => Value::Null },
            record! { "id" => 5, "name" => "eve", "group" => "admin", "score" => 50 },
            record! { "id" => 6, "name" => "fay", "group" => "user", "score" => 40 },
        ],
    )
}

fn names(records: &[Record]) -> Vec<String> {
    records
        .iter()
        .map(|r| r.get("name").map(Value::to_text).unwrap_or_default())
        .collect()
}

#[test]
fn test_filter_by_group() {
    let source = accounts();
    let users = source.selection().filter("group = %s", args!["user"]).read();
    let records = source.fetch(&users).expect("fetch");
    assert_eq!(records.len(), 4);
    assert!(records.iter().all(|r| r.get("group") == Some(&Value::from("user"))));
    assert_eq!(source.count(&users).unwrap(), 4);
}

#[test]
fn test_order_then_limit() {
    let model = Model::new("numbers").field("a", DataType::int());
    let source = ArrayDataSource::new(
        model,
        vec![record! { "a" => 4 }, record! { "a" => 6 }, record! { "a" => 1 }],
    );
    let records = source.fetch(&source.selection().order_by("a").limit(1).read()).unwrap();
    assert_eq!(records, vec![record! { "a" => 1 }]);
}

#[test]
fn test_group_by() {
    let source = accounts();
    let grouped = source.selection().group_by(&["group"]);
    let groups = source.fetch(&grouped).unwrap();
    assert_eq!(groups.len(), 2);
    assert_eq!(source.count(&grouped).unwrap(), 2);

    let admins = source
        .selection()
        .group_by_having(&["group"], ("[group] = %s", args!["admin"]));
    assert_eq!(source.count(&admins).unwrap(), 1);
}

#[test]
fn test_or_and_not() {
    let source = accounts();
    let high_or_ann = source
        .selection()
        .filter("[score] > %i", args![35])
        .or_where("[name] = %s", args!["ann"])
        .order_by("id")
        .read();
    assert_eq!(names(&source.fetch(&high_or_ann).unwrap()), vec!["ann", "eve", "fay"]);

    let admins = Predicate::new().filter("[group] = %s", args!["admin"]);
    let not_admin = source.selection().and(Predicate::not(admins)).read();
    assert_eq!(source.count(&not_admin).unwrap(), 4);
}

#[test]
fn test_in_and_like() {
    let source = accounts();
    let picked = source
        .selection()
        .filter("[id] in %i()", args![Value::Array(vec![Value::Int(1), Value::Int(3)])])
        .read();
    assert_eq!(names(&source.fetch(&picked).unwrap()), vec!["ann", "cy"]);

    let with_e = source.selection().filter("[name] like %s", args!["%e%"]).read();
    assert_eq!(names(&source.fetch(&with_e).unwrap()), vec!["dee", "eve"]);
}

#[test]
fn test_ordering_offset_limit() {
    let source = accounts();
    let page = source.selection().order_by_descending("score").offset(1).limit(2).read();
    assert_eq!(names(&source.fetch(&page).unwrap()), vec!["fay", "bob"]);

    let last = source.selection().last();
    assert_eq!(names(&source.fetch(&last).unwrap()), vec!["fay"]);
}

#[test]
fn test_distinct_projection() {
    let source = accounts();
    let groups = source.selection().select(&["group"]).distinct();
    assert_eq!(
        source.fetch(&groups).unwrap(),
        vec![record! { "group" => "user" }, record! { "group" => "admin" }]
    );
}

#[test]
fn test_computed_field() {
    let source = accounts();
    let selection = source
        .selection()
        .filter("[id] = %i", args![2])
        .with_typed("senior", ("[score] >= %i", args![25]), DataType::Boolean);
    let records = source.fetch(&selection).unwrap();
    assert_eq!(records[0].get("senior"), Some(&Value::Bool(true)));
}

#[test]
fn test_update_delete_insert() {
    let source = accounts();
    let promoted = source
        .update(&source.selection().filter("[name] = %s", args!["ann"]).set("group", "admin"))
        .unwrap();
    assert_eq!(promoted, 1);
    let admins = source.selection().filter("[group] = %s", args!["admin"]).read();
    assert_eq!(source.count(&admins).unwrap(), 3);

    let removed = source.delete(&source.selection().filter("[score] is null", args![]).delete()).unwrap();
    assert_eq!(removed, 1);

    let key = source
        .insert(&[record! { "name" => "gus", "group" => "user", "score" => 5 }], false)
        .unwrap();
    assert_eq!(key, Some(Value::Int(7)));
    assert_eq!(source.count(&source.selection().read()).unwrap(), 6);
}

// ============================================================================
// Joins
// ============================================================================

fn users_model() -> Model {
    Model::new("users")
        .key("id", DataType::serial())
        .field("name", DataType::string())
}

fn posts_model() -> Model {
    Model::new("posts")
        .key("id", DataType::serial())
        .field("user_id", DataType::int())
        .field("title", DataType::string())
}

fn blog() -> (ArrayDataSource, ArrayDataSource) {
    let store = MemoryStore::new();
    let users = store.attach(
        users_model(),
        vec![record! { "id" => 1, "name" => "ann" }, record! { "id" => 2, "name" => "bob" }],
    );
    let posts = store.attach(
        posts_model(),
        vec![
            record! { "id" => 10, "user_id" => 1, "title" => "hello" },
            record! { "id" => 11, "user_id" => 1, "title" => "again" },
        ],
    );
    (users, posts)
}

#[test]
fn test_left_join_with_record() {
    let (users, posts) = blog();
    let selection = users
        .selection()
        .alias("u")
        .left_join(posts.source(), "p", "{p}.[user_id] = {u}.[id]")
        .with_record("p", posts_model());
    let records = users.fetch(&selection).unwrap();

    assert_eq!(records.len(), 3);
    assert_eq!(
        records[0],
        record! {
            "id" => 1,
            "name" => "ann",
            "p" => record! { "id" => 10, "user_id" => 1, "title" => "hello" }
        }
    );
    assert_eq!(records[2], record! { "id" => 2, "name" => "bob", "p" => Value::Null });
}

#[test]
fn test_inner_and_right_join() {
    let (users, posts) = blog();
    let inner = users
        .selection()
        .inner_join(posts.source(), "p", "{p}.[user_id] = {users}.[id]");
    assert_eq!(users.count(&inner).unwrap(), 2);

    let right = posts
        .selection()
        .right_join(users.source(), "u", "{u}.[id] = {posts}.[user_id]")
        .with_record("u", users_model());
    let records = posts.fetch(&right).unwrap();
    assert_eq!(records.len(), 3);
    assert_eq!(records[2].get("id"), Some(&Value::Null));
    assert_eq!(
        records[2].get("u"),
        Some(&Value::Object(record! { "id" => 2, "name" => "bob" }))
    );
}

#[test]
fn test_extra_source_cross_product() {
    let (users, posts) = blog();
    let selection = users
        .selection()
        .also_from(posts.source(), "p")
        .filter("{p}.[title] = %s", args!["again"]);
    assert_eq!(names(&users.fetch(&selection).unwrap()), vec!["ann", "bob"]);
}

#[test]
fn test_join_across_stores_fails() {
    let (users, _) = blog();
    let elsewhere = ArrayDataSource::new(posts_model(), Vec::new());
    let selection = users.selection().inner_join(elsewhere.source(), "p", "1 = 1");
    assert!(matches!(
        users.fetch(&selection),
        Err(QueryError::IncompatibleSource { .. })
    ));
}
