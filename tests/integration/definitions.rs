//! Definition creation and listing integration tests.

use taskweave::core::{COMPOSED_TASK_RUNNER, TASK_NAME_PROPERTY};
use taskweave::store::{PageRequest, TaskDefinitionRepository};
use taskweave::service::TaskDefinitionView;
use taskweave::{Error, ListQuery};

use super::fixtures::TestEngine;

fn names(views: &[TaskDefinitionView]) -> Vec<&str> {
    views.iter().map(|v| v.name.as_str()).collect()
}

/// Test: Simple definition
/// Given a registered app
/// When a single unlabeled element is submitted
/// Then one definition holds its options plus the forced task name
#[tokio::test]
async fn test_create_simple_definition() {
    let engine = TestEngine::new();
    engine.register_apps(&["appA"]).await;

    let definition = engine.service.create("myTask", "appA --k=v", None).await.unwrap();
    assert_eq!(definition.name, "myTask");
    assert_eq!(definition.registered_app_name, "appA");
    assert_eq!(definition.properties["k"], "v");
    assert_eq!(definition.properties[TASK_NAME_PROPERTY], "myTask");
    assert_eq!(engine.repository.count().await.unwrap(), 1);

    let view = engine.service.get("myTask", false).await.unwrap();
    assert!(!view.composed);
    assert!(!view.composed_task_element);
}

/// Test: Composed definition with parameters
/// Given two registered apps
/// When a labeled composed DSL with quoted options is submitted
/// Then the root and one child per label are stored, each child with its
/// own fragment and options
#[tokio::test]
async fn test_create_composed_definition_with_parameters() {
    let engine = TestEngine::new();
    engine.register_apps(&["task1", "task2"]).await;

    let root = engine
        .service
        .create(
            "myTask",
            "t1: task1 --foo='bar rab' && t2: task2 --foo='one two'",
            Some("two steps"),
        )
        .await
        .unwrap();
    assert_eq!(root.registered_app_name, COMPOSED_TASK_RUNNER);
    assert_eq!(root.description.as_deref(), Some("two steps"));
    assert_eq!(engine.repository.count().await.unwrap(), 3);

    let first = engine.repository.find_by_name("myTask-t1").await.unwrap().unwrap();
    assert_eq!(first.dsl_text, "task1 --foo='bar rab'");
    assert_eq!(first.registered_app_name, "task1");
    assert_eq!(first.properties["foo"], "bar rab");
    assert_eq!(first.properties[TASK_NAME_PROPERTY], "myTask-t1");

    let second = engine.repository.find_by_name("myTask-t2").await.unwrap().unwrap();
    assert_eq!(second.properties["foo"], "one two");
}

/// Test: Composed element flags
/// Given a composed root X with children
/// When the definitions are listed
/// Then children are composed elements and the root is composed
#[tokio::test]
async fn test_composed_flags_in_listing() {
    let engine = TestEngine::new();
    engine.register_apps(&["a", "b"]).await;
    engine.service.create("X", "t1: a && t2: b", None).await.unwrap();

    let page = engine.service.list(&ListQuery::default()).await.unwrap();
    let flags: Vec<_> = page
        .content
        .iter()
        .map(|v| (v.name.as_str(), v.composed, v.composed_task_element))
        .collect();
    assert_eq!(
        flags,
        vec![("X", true, false), ("X-t1", false, true), ("X-t2", false, true)]
    );
}

/// Test: Unknown app at create
/// Given an empty registry
/// When a definition referencing an unregistered app is submitted
/// Then UnknownApp is returned and nothing is stored
#[tokio::test]
async fn test_unknown_app_leaves_count_unchanged() {
    let engine = TestEngine::new();
    engine.register_apps(&["a"]).await;
    engine.service.create("existing", "a", None).await.unwrap();

    let err = engine
        .service
        .create("composed", "t1: a && t2: ghost", None)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::UnknownApp(ref app) if app == "ghost"));
    assert_eq!(err.status_code(), 404);
    assert_eq!(engine.repository.count().await.unwrap(), 1);
}

/// Test: Duplicate names
/// Given an existing definition
/// When the same name is submitted again
/// Then DuplicateTaskName is returned with a conflict status
#[tokio::test]
async fn test_duplicate_name_is_conflict() {
    let engine = TestEngine::new();
    engine.register_apps(&["a"]).await;
    engine.service.create("dup", "a", None).await.unwrap();

    let err = engine.service.create("dup", "a --x=1", None).await.unwrap_err();
    assert!(matches!(err, Error::DuplicateTaskName(ref n) if n == "dup"));
    assert_eq!(err.status_code(), 409);

    let stored = engine.repository.find_by_name("dup").await.unwrap().unwrap();
    assert_eq!(stored.dsl_text, "a");
}

/// Test: Invalid DSL
/// Given a DSL with a duplicate label
/// When it is submitted
/// Then a parse error is returned before anything is stored
#[tokio::test]
async fn test_invalid_dsl_is_bad_request() {
    let engine = TestEngine::new();
    engine.register_apps(&["a", "b"]).await;

    let err = engine
        .service
        .create("bad", "t1: a && t1: b", None)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::DslParse { .. }));
    assert_eq!(err.status_code(), 400);
    assert_eq!(engine.repository.count().await.unwrap(), 0);
}

/// Test: Concurrent creates of the same name
/// Given many callers racing on one composed name
/// When they all submit at once
/// Then exactly one wins and the others see DuplicateTaskName
#[tokio::test]
async fn test_concurrent_create_single_winner() {
    let engine = std::sync::Arc::new(TestEngine::new());
    engine.register_apps(&["a", "b"]).await;

    let mut handles = Vec::new();
    for _ in 0..8 {
        let engine = engine.clone();
        handles.push(tokio::spawn(async move {
            engine.service.create("race", "t1: a && t2: b", None).await
        }));
    }

    let mut wins = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => wins += 1,
            Err(e) => assert!(matches!(e, Error::DuplicateTaskName(_))),
        }
    }
    assert_eq!(wins, 1);
    assert_eq!(engine.repository.count().await.unwrap(), 3);
}

/// Test: Listing filters
/// Given foo, foz and ooz
/// When listing by name, dsl or description
/// Then only the matching definitions come back in insertion order
#[tokio::test]
async fn test_list_filters() {
    let engine = TestEngine::new();
    engine.register_apps(&["task-foo", "task-foz", "task-ooz"]).await;
    for (name, description) in [("foo", "fooTask"), ("foz", "fozTask"), ("ooz", "oozTask")] {
        engine
            .service
            .create(name, &format!("task-{}", name), Some(description))
            .await
            .unwrap();
    }

    let query = |name: Option<&str>, dsl: Option<&str>, description: Option<&str>| ListQuery {
        name: name.map(str::to_string),
        dsl: dsl.map(str::to_string),
        description: description.map(str::to_string),
        ..Default::default()
    };

    let page = engine.service.list(&query(Some("f"), None, None)).await.unwrap();
    assert_eq!(names(&page.content), vec!["foo", "foz"]);

    let page = engine.service.list(&query(Some("oz"), None, None)).await.unwrap();
    assert_eq!(names(&page.content), vec!["foz", "ooz"]);

    let page = engine.service.list(&query(None, Some("task-o"), None)).await.unwrap();
    assert_eq!(names(&page.content), vec!["ooz"]);

    let page = engine.service.list(&query(None, None, Some("Task"))).await.unwrap();
    assert_eq!(page.total_elements, 3);

    let err = engine
        .service
        .list(&query(Some("f"), Some("task"), None))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::BadRequest(_)));
    assert_eq!(err.status_code(), 400);
}

/// Test: Pagination
/// Given five definitions
/// When listed two per page
/// Then pages split in insertion order and report totals
#[tokio::test]
async fn test_list_pagination() {
    let engine = TestEngine::new();
    engine.register_apps(&["a"]).await;
    for i in 0..5 {
        engine.service.create(&format!("t{}", i), "a", None).await.unwrap();
    }

    let query = ListQuery {
        page: PageRequest::new(2, 2),
        ..Default::default()
    };
    let page = engine.service.list(&query).await.unwrap();
    assert_eq!(names(&page.content), vec!["t4"]);
    assert_eq!(page.total_elements, 5);
    assert_eq!(page.total_pages, 3);
    assert_eq!(page.number, 2);
}

/// Test: Concurrent creates whose generated children collide
/// Given roots `a` with label `b-c` and `a-b` with label `c`, which both
/// generate `a-b-c`
/// When both are submitted at once
/// Then exactly one set is stored and the other submission leaves nothing
#[tokio::test]
async fn test_concurrent_create_overlapping_children() {
    let engine = std::sync::Arc::new(TestEngine::new());
    engine.register_apps(&["x"]).await;

    let first = {
        let engine = engine.clone();
        tokio::spawn(async move { engine.service.create("a", "b-c: x", None).await })
    };
    let second = {
        let engine = engine.clone();
        tokio::spawn(async move { engine.service.create("a-b", "c: x", None).await })
    };
    let results = [first.await.unwrap(), second.await.unwrap()];

    let wins: Vec<_> = results
        .iter()
        .filter_map(|r| r.as_ref().ok())
        .map(|root| root.name.clone())
        .collect();
    assert_eq!(wins.len(), 1);
    assert!(results
        .iter()
        .any(|r| matches!(r, Err(Error::DuplicateTaskName(n)) if n == "a-b-c")));

    let mut stored: Vec<_> = engine
        .repository
        .find_by_name_prefix("a")
        .await
        .unwrap()
        .into_iter()
        .map(|d| d.name)
        .collect();
    stored.sort();
    let mut expected = vec![wins[0].clone(), "a-b-c".to_string()];
    expected.sort();
    assert_eq!(stored, expected);

    let child = engine.service.get("a-b-c", false).await.unwrap();
    assert!(child.composed_task_element);
}
