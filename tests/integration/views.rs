//! View, validation and state snapshot integration tests.

use taskweave::core::ExecutionStatus;
use taskweave::service::validate::{INVALID, VALID};
use taskweave::store::{StateSnapshot, TaskDefinitionRepository};
use taskweave::Error;

use super::fixtures::TestEngine;

/// Test: Display a single task
/// Given a definition with a secret in its DSL, launched with a secret
/// argument
/// When it is viewed
/// Then DSL and arguments are masked and the status follows the execution
#[tokio::test]
async fn test_display_single_task_is_sanitized() {
    let engine = TestEngine::new();
    engine.register_apps(&["timestamp"]).await;
    engine
        .service
        .create("myTask", "timestamp --password=password", None)
        .await
        .unwrap();
    let execution = engine
        .service
        .launch("myTask", Some("--password=password --regular=value"), None)
        .await
        .unwrap();

    let view = engine.service.get("myTask", false).await.unwrap();
    assert_eq!(view.dsl_text, "timestamp --password='******'");
    assert_eq!(view.status, ExecutionStatus::Running);
    let last = view.last_task_execution.clone().unwrap();
    assert_eq!(
        last.arguments,
        vec![
            "--password=******",
            "--regular=value",
            "--spring.cloud.task.executionid=1"
        ]
    );
    assert!(last.start_time.unwrap().ends_with('Z'));
    assert!(last.deployment_properties.is_none());

    let json = serde_json::to_value(&view).unwrap();
    assert_eq!(json["status"], "RUNNING");
    assert!(json["last_task_execution"].get("deployment_properties").is_none());

    engine
        .executions
        .complete_execution(execution.execution_id, 0)
        .await
        .unwrap();
    let view = engine.service.get("myTask", false).await.unwrap();
    assert_eq!(view.status, ExecutionStatus::Complete);
    assert!(view.last_task_execution.unwrap().end_time.is_some());
}

/// Test: Status of a failed and a never launched task
/// Given one task whose execution exited non-zero and one never launched
/// When both are viewed
/// Then they report FAILED and UNKNOWN
#[tokio::test]
async fn test_failed_and_unknown_status() {
    let engine = TestEngine::new();
    engine.register_apps(&["timestamp"]).await;
    engine.service.create("broken", "timestamp", None).await.unwrap();
    engine.service.create("fresh", "timestamp", None).await.unwrap();

    let execution = engine.service.launch("broken", None, None).await.unwrap();
    engine
        .executions
        .complete_execution(execution.execution_id, 1)
        .await
        .unwrap();

    let broken = engine.service.get("broken", false).await.unwrap();
    assert_eq!(broken.status, ExecutionStatus::Failed);
    assert_eq!(broken.last_task_execution.unwrap().exit_code, Some(1));

    let fresh = engine.service.get("fresh", true).await.unwrap();
    assert_eq!(fresh.status, ExecutionStatus::Unknown);
    assert!(fresh.last_task_execution.is_none());
}

/// Test: Custom sensitive patterns
/// Given a configuration masking only `pin`
/// When a definition is viewed
/// Then `pin` is masked and `password` is not
#[tokio::test]
async fn test_configured_sensitive_keys() {
    let engine = TestEngine::with_config(|config, _| {
        config.sensitive_keys = vec!["^pin$".to_string()];
    });
    engine.register_apps(&["app"]).await;
    engine
        .service
        .create("t", "app --pin=1234 --password=x", None)
        .await
        .unwrap();

    let view = engine.service.get("t", false).await.unwrap();
    assert_eq!(view.dsl_text, "app --pin='******' --password=x");
}

/// Test: Validation
/// Given a composed root with one unregistered child app
/// When the root and a simple definition are validated
/// Then each element reports valid or invalid under its definition name
#[tokio::test]
async fn test_validate_definitions() {
    let engine = TestEngine::new();
    engine.register_apps(&["a", "b"]).await;
    engine
        .service
        .create("flow", "t1: a --token=abc && t2: b", None)
        .await
        .unwrap();
    engine.service.create("single", "a", None).await.unwrap();

    let status = engine.service.validate("single").await.unwrap();
    assert_eq!(status.app_statuses.len(), 1);
    assert_eq!(status.app_statuses["task:single"], VALID);
    assert!(status.is_valid());

    let status = engine.service.validate("flow").await.unwrap();
    assert_eq!(status.app_name, "flow");
    assert_eq!(status.dsl, "t1: a --token='******' && t2: b");
    assert_eq!(status.app_statuses["task:flow-t1"], VALID);
    assert_eq!(status.app_statuses["task:flow-t2"], VALID);

    engine
        .repository
        .save(taskweave::core::TaskDefinition::new("orphan", "ghost").unwrap())
        .await
        .unwrap();
    let status = engine.service.validate("orphan").await.unwrap();
    assert_eq!(status.app_statuses["task:orphan"], INVALID);
    assert!(!status.is_valid());

    let err = engine.service.validate("nope").await.unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
}

/// Test: State snapshot round trip
/// Given definitions, registrations and a launch
/// When the stores are captured, saved, loaded and rebuilt
/// Then a service over the rebuilt stores sees the same state
#[tokio::test]
async fn test_state_snapshot_round_trip() {
    let engine = TestEngine::new();
    engine.register_apps(&["a", "b"]).await;
    engine.service.create("X", "t1: a && t2: b", Some("flow")).await.unwrap();
    engine.service.launch("X-t1", Some("--n=1"), None).await.unwrap();

    let stores = taskweave::store::Stores {
        definitions: engine.repository.clone(),
        registry: engine.registry.clone(),
        executions: engine.executions.clone(),
    };
    let path = engine.path("state/state.json");
    StateSnapshot::capture(&stores).await.save(&path).await.unwrap();
    // Second save keeps a backup of the first
    StateSnapshot::capture(&stores).await.save(&path).await.unwrap();
    assert!(path.with_extension("json.bak").exists());

    let restored = StateSnapshot::load(&path).await.unwrap().into_stores().unwrap();
    assert_eq!(restored.definitions.count().await.unwrap(), 3);
    assert_eq!(restored.registry.registrations().await.len(), 2);

    let service = taskweave::TaskService::new(
        std::sync::Arc::new(restored.definitions.clone()),
        std::sync::Arc::new(restored.registry.clone()),
        engine.launcher.clone(),
        std::sync::Arc::new(restored.executions.clone()),
    );
    let view = service.get("X-t1", false).await.unwrap();
    assert!(view.composed_task_element);
    assert_eq!(view.status, ExecutionStatus::Running);

    // Execution ids keep counting after a reload
    let next = service.launch("X-t2", None, None).await.unwrap();
    assert_eq!(next.execution_id, 2);

    let removed = service.delete("X").await.unwrap();
    assert_eq!(removed, vec!["X", "X-t1", "X-t2"]);
    assert_eq!(engine.launcher.destroyed(), vec!["X-t1", "X-t2"]);
}
