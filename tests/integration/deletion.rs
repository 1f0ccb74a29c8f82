//! Deletion integration tests.
//!
//! Roots and their generated children can be deleted in any order; only a
//! repeated delete of a name that is already gone fails.

use taskweave::store::TaskDefinitionRepository;
use taskweave::Error;

use super::fixtures::TestEngine;

async fn composed_engine() -> TestEngine {
    let engine = TestEngine::new();
    engine.register_apps(&["a", "b", "c"]).await;
    engine.service.create("X", "t1: a && t2: b", None).await.unwrap();
    engine
}

/// Test: Child first, then root
/// Given root X with children X-t1 and X-t2
/// When X-t1 and then X are deleted
/// Then nothing tied to X remains and a re-delete is NotFound
#[tokio::test]
async fn test_delete_child_then_root() {
    let engine = composed_engine().await;

    let removed = engine.service.delete("X-t1").await.unwrap();
    assert_eq!(removed, vec!["X-t1"]);
    assert_eq!(engine.repository.count().await.unwrap(), 2);

    let removed = engine.service.delete("X").await.unwrap();
    assert_eq!(removed, vec!["X", "X-t2"]);
    assert_eq!(engine.repository.count().await.unwrap(), 0);

    let err = engine.service.delete("X").await.unwrap_err();
    assert!(matches!(err, Error::NotFound(ref n) if n == "X"));
    assert_eq!(err.status_code(), 404);
    assert_eq!(err.to_string(), "Could not find task definition named X");
}

/// Test: Root first, then child
/// Given root X with children
/// When X is deleted
/// Then its children go with it and deleting a child afterwards is NotFound
#[tokio::test]
async fn test_delete_root_then_child() {
    let engine = composed_engine().await;

    let removed = engine.service.delete("X").await.unwrap();
    assert_eq!(removed, vec!["X", "X-t1", "X-t2"]);

    let err = engine.service.delete("X-t1").await.unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
}

/// Test: Unrelated prefixed names survive
/// Given X plus a separately created X-other
/// When X is deleted
/// Then X-other stays because it is not one of X's labels
#[tokio::test]
async fn test_delete_root_keeps_unrelated_prefixed_names() {
    let engine = composed_engine().await;
    engine.service.create("X-other", "c", None).await.unwrap();

    engine.service.delete("X").await.unwrap();
    let remaining = engine.repository.find_by_name_prefix("X").await.unwrap();
    let names: Vec<_> = remaining.iter().map(|d| d.name.as_str()).collect();
    assert_eq!(names, vec!["X-other"]);
}

/// Test: Unknown name
/// Given some stored definitions
/// When an unknown name is deleted
/// Then NotFound is returned and nothing else is touched
#[tokio::test]
async fn test_delete_unknown_name() {
    let engine = composed_engine().await;
    let err = engine.service.delete("Y").await.unwrap_err();
    assert!(matches!(err, Error::NotFound(ref n) if n == "Y"));
    assert_eq!(engine.repository.count().await.unwrap(), 3);
}

/// Test: Destroy only after launch
/// Given one launched and one never launched definition
/// When everything is deleted
/// Then only the launched one is destroyed on the platform
#[tokio::test]
async fn test_destroy_only_launched_tasks() {
    let engine = TestEngine::new();
    engine.register_apps(&["a"]).await;
    engine.service.create("launched", "a", None).await.unwrap();
    engine.service.create("idle", "a", None).await.unwrap();
    engine.service.launch("launched", None, None).await.unwrap();

    let removed = engine.service.delete_all().await.unwrap();
    assert_eq!(removed, vec!["launched", "idle"]);
    assert_eq!(engine.repository.count().await.unwrap(), 0);
    assert_eq!(engine.launcher.destroyed(), vec!["launched"]);
}

/// Test: Deleting a never launched definition
/// Given a definition that was never launched
/// When it is deleted
/// Then the launcher is not asked to destroy anything
#[tokio::test]
async fn test_delete_without_launch_skips_destroy() {
    let engine = composed_engine().await;
    engine.service.delete("X").await.unwrap();
    assert!(engine.launcher.destroyed().is_empty());
}

/// Test: Concurrent deletes of the same root
/// Given root X
/// When two callers delete it at once
/// Then one removes it and the other sees NotFound
#[tokio::test]
async fn test_concurrent_delete_single_winner() {
    let engine = std::sync::Arc::new(composed_engine().await);

    let first = {
        let engine = engine.clone();
        tokio::spawn(async move { engine.service.delete("X").await })
    };
    let second = {
        let engine = engine.clone();
        tokio::spawn(async move { engine.service.delete("X").await })
    };

    let results = [first.await.unwrap(), second.await.unwrap()];
    let wins = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(wins, 1);
    assert!(results
        .iter()
        .any(|r| matches!(r, Err(Error::NotFound(_)))));
    assert_eq!(engine.repository.count().await.unwrap(), 0);
}

/// Test: Option values holding quotes
/// Given root X whose first element has a value with a quote and a space
/// When X is deleted
/// Then its stored DSL still parses and both children go with it
#[tokio::test]
async fn test_delete_root_with_quoted_option_value() {
    let engine = TestEngine::new();
    engine.register_apps(&["a", "b"]).await;
    engine
        .service
        .create("X", "t1: a --foo=x'y z' && t2: b", None)
        .await
        .unwrap();

    let root = engine.repository.find_by_name("X").await.unwrap().unwrap();
    assert!(root.graph().is_ok());
    assert_eq!(root.child_names(), vec!["X-t1", "X-t2"]);
    let child = engine.repository.find_by_name("X-t1").await.unwrap().unwrap();
    assert_eq!(child.properties["foo"], "x'y z'");
    assert!(engine.service.get("X-t1", false).await.unwrap().composed_task_element);

    let removed = engine.service.delete("X").await.unwrap();
    assert_eq!(removed, vec!["X", "X-t1", "X-t2"]);
    assert_eq!(engine.repository.count().await.unwrap(), 0);
}

/// Test: Recreated child name
/// Given root X whose child X-t1 was deleted and then recreated by a caller
/// with different content
/// When X is deleted
/// Then the caller's X-t1 survives and only X and X-t2 are removed
#[tokio::test]
async fn test_delete_root_keeps_recreated_child_name() {
    let engine = composed_engine().await;
    engine.service.delete("X-t1").await.unwrap();
    engine
        .service
        .create("X-t1", "b --unrelated=yes", Some("user owned"))
        .await
        .unwrap();
    let view = engine.service.get("X-t1", false).await.unwrap();
    assert!(!view.composed_task_element);

    let removed = engine.service.delete("X").await.unwrap();
    assert_eq!(removed, vec!["X", "X-t2"]);

    let kept = engine.repository.find_by_name("X-t1").await.unwrap().unwrap();
    assert_eq!(kept.description.as_deref(), Some("user owned"));
    assert_eq!(engine.repository.count().await.unwrap(), 1);
}

/// Test: Removal order
/// Given a root whose children were stored out of DSL order
/// When the root is deleted
/// Then the removed names list the root first and children in DSL order
#[tokio::test]
async fn test_delete_reports_children_in_dsl_order() {
    let engine = TestEngine::new();
    engine.register_apps(&["a", "b", "c"]).await;
    engine.service.create("Y", "t1: a && t2: b && t3: c", None).await.unwrap();
    // Recreate t1 so it is stored after its siblings
    engine.service.delete("Y-t1").await.unwrap();
    engine.service.create("Y-t1", "a", None).await.unwrap();

    let removed = engine.service.delete("Y").await.unwrap();
    assert_eq!(removed, vec!["Y", "Y-t1", "Y-t2", "Y-t3"]);
}
