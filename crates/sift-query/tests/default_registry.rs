//! End-to-end tests for the default registry.

use serde_json::{json, Value};
use sift_query::{default_registry, Query, QueryConfig, QueryError, Registry};
use std::collections::BTreeMap;

fn sample_data() -> Vec<Value> {
    vec![
        json!({"id": "1", "name": "test_item"}),
        json!({"id": 2, "name": "another_item"}),
        json!({"id": "3", "name": "test_something"}),
        json!({"id": 4, "name": "completely_different"}),
    ]
}

fn registry() -> Registry {
    default_registry(&QueryConfig::default()).unwrap()
}

fn registry_with_expressions() -> Registry {
    default_registry(&QueryConfig {
        allow_expressions: true,
        ..QueryConfig::default()
    })
    .unwrap()
}

fn names<'a>(matched: &[&'a Value]) -> Vec<&'a str> {
    matched.iter().filter_map(|item| item["name"].as_str()).collect()
}

#[test]
fn test_id_matching() {
    let registry = registry();
    let data = sample_data();

    let result = registry.match_all(&Query::Int(2), &data).unwrap();
    assert_eq!(result, vec![&data[1]]);

    let result = registry.match_all(&Query::from("2"), &data).unwrap();
    assert_eq!(result, vec![&data[1]]);

    let result = registry.match_all(&Query::from("1"), &data).unwrap();
    assert_eq!(result.len(), 1);
    assert_eq!(result[0]["id"], json!("1"));
}

#[test]
fn test_name_exact_match() {
    let registry = registry();
    let data = sample_data();

    let result = registry.match_all(&Query::from("test_item"), &data).unwrap();
    assert_eq!(names(&result), ["test_item"]);
}

#[test]
fn test_regex_name_matching() {
    let registry = registry();
    let data = sample_data();

    let result = registry.match_all(&Query::from("test_*"), &data).unwrap();
    assert_eq!(names(&result), ["test_item", "test_something"]);

    let result = registry.match_all(&Query::from("different$"), &data).unwrap();
    assert_eq!(names(&result), ["completely_different"]);
}

#[test]
fn test_expression_query() {
    let registry = registry_with_expressions();
    let data = sample_data();

    let result = registry
        .match_all(&Query::from(r#"?x["name"].startswith("test")"#), &data)
        .unwrap();
    assert_eq!(names(&result), ["test_item", "test_something"]);
}

#[test]
fn test_or_query() {
    let registry = registry();
    let data = sample_data();

    let query = Query::list([Query::from("test_item"), Query::Int(2)]);
    let result = registry.match_all(&query, &data).unwrap();
    assert_eq!(names(&result), ["test_item", "another_item"]);

    // Same query as text
    let result = registry.match_all(&Query::from("['test_item', 2]"), &data).unwrap();
    assert_eq!(names(&result), ["test_item", "another_item"]);
}

#[test]
fn test_and_query() {
    let registry = registry_with_expressions();
    let data = sample_data();

    let query = Query::tuple([
        Query::from(r#"?x["name"].startswith("test")"#),
        Query::from(r#"?x["name"].endswith("item")"#),
    ]);
    let result = registry.match_all(&query, &data).unwrap();
    assert_eq!(names(&result), ["test_item"]);
}

#[test]
fn test_unparenthesized_tuple_is_and() {
    let registry = registry();
    let data = sample_data();

    let result = registry.match_all(&Query::from("'test_*', 1"), &data).unwrap();
    assert_eq!(names(&result), ["test_item"]);
}

#[test]
fn test_and_mixes_matcher_kinds() {
    let registry = registry_with_expressions();
    let data = sample_data();

    let query = Query::tuple([Query::from("test_*"), Query::from(r#"?x["id"] == "3""#)]);
    let result = registry.match_all(&query, &data).unwrap();
    assert_eq!(names(&result), ["test_something"]);
}

#[test]
fn test_invalid_queries() {
    let registry = registry();
    let data = sample_data();

    assert!(registry.match_all(&Query::None, &data).unwrap().is_empty());
    assert!(registry
        .match_all(&Query::Map(BTreeMap::new()), &data)
        .unwrap()
        .is_empty());
    assert!(registry.match_all(&Query::from("{}"), &data).unwrap().is_empty());
    assert!(registry.match_all(&Query::from("None"), &data).unwrap().is_empty());
}

#[test]
fn test_empty_data() {
    let registry = registry();
    let data: Vec<Value> = Vec::new();

    assert!(registry.match_all(&Query::from("test"), &data).unwrap().is_empty());
}

#[test]
fn test_candidates_without_fields_are_skipped() {
    let registry = registry();
    let data = vec![json!({"other": 1}), json!("loose string"), json!({"id": 2})];

    let result = registry.match_all(&Query::Int(2), &data).unwrap();
    assert_eq!(result, vec![&data[2]]);
}

#[test]
fn test_missing_path_can_abort() {
    let registry = default_registry(&QueryConfig {
        on_missing_path: sift_query::FailurePolicy::Abort,
        ..QueryConfig::default()
    })
    .unwrap();
    let data = vec![json!({"id": 2}), json!({"other": 1})];

    assert!(matches!(
        registry.match_all(&Query::Int(2), &data),
        Err(QueryError::PathNotFound { .. })
    ));
}

#[test]
fn test_expressions_disabled_by_default() {
    let registry = registry();
    assert!(registry.matchers().iter().all(|m| m.name() != "expression"));

    // Without the expression matcher the text falls through to the pattern
    // matcher, where a leading `?` is not a valid regex.
    let data = sample_data();
    assert!(matches!(
        registry.match_all(&Query::from(r#"?x["id"] == 2"#), &data),
        Err(QueryError::Pattern(_))
    ));
}

#[test]
fn test_results_reference_input() {
    let registry = registry();
    let data = sample_data();

    let result = registry.match_all(&Query::from("test_*"), &data).unwrap();
    assert!(std::ptr::eq(result[0], &data[0]));
    assert!(std::ptr::eq(result[1], &data[2]));
}
