//! Integration tests for registration, ordered activation and teardown.

mod helpers;

use std::sync::Arc;

use semver::{Version, VersionReq};

use entity_core::error::ErrorKind;
use entity_core::AppError;
use entity_plugin::{ActivationOutcome, HookPayload, HookPoint, LifecycleState, PluginError};
use entity_stdlib::{PassThroughPlugin, PromptPlugin, default_workflow};
use helpers::{Journal, RecordingPlugin, manager_for};

#[tokio::test]
async fn test_activation_and_teardown_order() {
    let journal = Journal::new();
    let manager = manager_for(vec![
        RecordingPlugin::new("a", &journal).depends_on("b").arc(),
        RecordingPlugin::new("b", &journal).arc(),
        RecordingPlugin::new("c", &journal).arc(),
    ])
    .await;

    let report = manager.activate_all().await.unwrap();
    assert_eq!(report.active(), vec!["b", "a", "c"]);
    assert_eq!(journal.entries("activate:"), vec!["b", "a", "c"]);

    let teardown = manager.deactivate_all().await;
    assert!(teardown.is_clean());
    assert_eq!(teardown.deactivated, vec!["c", "a", "b"]);
    assert_eq!(journal.entries("teardown:"), vec!["c", "a", "b"]);
}

#[tokio::test]
async fn test_failed_llm_only_takes_down_prompt() {
    let journal = Journal::new();
    let mut plugins = default_workflow();
    plugins.push(Arc::new(PromptPlugin::new()));
    plugins.push(
        RecordingPlugin::new("llm", &journal)
            .failing_activation()
            .arc(),
    );
    let manager = manager_for(plugins).await;

    let report = manager.activate_all().await.unwrap();

    assert!(matches!(
        report.outcome("llm"),
        Some(ActivationOutcome::Failed(PluginError::ActivationFailed { .. }))
    ));
    assert!(matches!(
        report.outcome("prompt"),
        Some(ActivationOutcome::Failed(PluginError::DependencyFailed { .. }))
    ));
    assert_eq!(report.active().len(), 6);

    let registry = manager.registry();
    for stage in HookPoint::STAGES {
        let identity = PassThroughPlugin::identity_for(stage);
        assert_eq!(registry.state_of(&identity).await, Some(LifecycleState::Activated));
    }
    assert_eq!(registry.state_of("prompt").await, Some(LifecycleState::Failed));

    // The think stage still runs without the prompt plugin.
    let outcome = manager
        .dispatcher()
        .run_chain(HookPayload::new(HookPoint::Think).with_message("q"))
        .await
        .unwrap();
    assert_eq!(outcome.invoked, vec!["passthrough-think"]);
}

#[tokio::test]
async fn test_version_requirement_is_enforced() {
    let journal = Journal::new();
    let manager = manager_for(vec![
        RecordingPlugin::new("llm", &journal)
            .version(Version::new(1, 4, 0))
            .arc(),
        RecordingPlugin::new("summarizer", &journal)
            .requires("llm", VersionReq::parse(">=2.0").unwrap())
            .arc(),
    ])
    .await;
    let err = manager.activate_all().await.unwrap_err();

    match &err {
        PluginError::MissingDependency {
            dependent,
            identity,
            range,
        } => {
            assert_eq!(dependent, "summarizer");
            assert_eq!(identity, "llm");
            assert_eq!(range.to_string(), ">=2.0");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(journal.entries("activate:").is_empty());

    let app: AppError = err.into();
    assert_eq!(app.kind, ErrorKind::Validation);
}

#[tokio::test]
async fn test_cycle_aborts_with_path() {
    let journal = Journal::new();
    let manager = manager_for(vec![
        RecordingPlugin::new("x", &journal).depends_on("y").arc(),
        RecordingPlugin::new("y", &journal).depends_on("z").arc(),
        RecordingPlugin::new("z", &journal).depends_on("x").arc(),
    ])
    .await;

    let err = manager.activate_all().await.unwrap_err();
    let PluginError::CycleDetected { cycle } = &err else {
        panic!("expected a cycle, got {err}");
    };
    assert_eq!(cycle.len(), 3);
    assert!(err.to_string().contains("->"));
    assert!(journal.entries("activate:").is_empty());
}

#[tokio::test]
async fn test_reset_after_deactivation() {
    let journal = Journal::new();
    let manager = manager_for(vec![RecordingPlugin::new("a", &journal).arc()]).await;

    manager.activate_all().await.unwrap();
    manager.deactivate_all().await;

    manager.reset("a").await.unwrap();
    let report = manager.activate_all().await.unwrap();
    assert!(report.is_complete());
    assert_eq!(journal.entries("activate:"), vec!["a", "a"]);
}

#[tokio::test]
async fn test_concurrent_dispatch_on_shared_manager() {
    let journal = Journal::new();
    let manager = Arc::new(
        manager_for(vec![
            RecordingPlugin::new("a", &journal).hooks(&[HookPoint::Parse]).arc(),
            RecordingPlugin::new("b", &journal).hooks(&[HookPoint::Parse]).arc(),
        ])
        .await,
    );
    manager.activate_all().await.unwrap();

    let mut handles = Vec::new();
    for i in 0..8 {
        let manager = Arc::clone(&manager);
        handles.push(tokio::spawn(async move {
            manager
                .dispatcher()
                .run_chain(HookPayload::new(HookPoint::Parse).with_message(format!("{i}")))
                .await
        }));
    }

    for (i, handle) in handles.into_iter().enumerate() {
        let outcome = handle.await.unwrap().unwrap();
        assert_eq!(outcome.payload.message, format!("{i}[a][b]"));
    }
    assert_eq!(journal.entries("parse:").len(), 16);
}
