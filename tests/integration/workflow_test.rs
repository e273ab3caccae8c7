//! Integration tests running whole workflows through the standard plugins.

mod helpers;

use std::sync::Arc;

use serde_json::json;

use entity_plugin::{DispatchOutcome, HookPayload, HookPoint, LifecycleManager, Plugin, PluginError};
use entity_stdlib::{EchoTool, InputAdapterPlugin, OutputAdapterPlugin, ToolPlugin, default_workflow};
use helpers::{Journal, Reaction, RecordingPlugin, manager_for};

/// Runs every stage in order, stopping when a plugin terminates the chain.
async fn run_stages(manager: &LifecycleManager, mut payload: HookPayload) -> Result<HookPayload, PluginError> {
    for stage in HookPoint::STAGES {
        let outcome = manager.dispatcher().run_chain(payload.retarget(stage)).await?;
        payload = outcome.payload;
        if outcome.terminated_by.is_some() {
            break;
        }
    }
    Ok(payload)
}

fn stdlib_plugins() -> Vec<Arc<dyn Plugin>> {
    let mut plugins = default_workflow();
    plugins.push(Arc::new(InputAdapterPlugin::new()));
    plugins.push(Arc::new(OutputAdapterPlugin::new()));
    plugins.push(Arc::new(ToolPlugin::new().with_tool(Arc::new(EchoTool))));
    plugins
}

#[tokio::test]
async fn test_message_flows_through_every_stage() {
    let manager = manager_for(stdlib_plugins()).await;
    assert!(manager.activate_all().await.unwrap().is_complete());

    let payload = HookPayload::new(HookPoint::Input)
        .with_string("raw_input", "  what is 2+2?  ")
        .with_data("tool_call", json!({ "name": "echo", "args": { "answer": 4 } }));
    let payload = run_stages(&manager, payload).await.unwrap();

    assert_eq!(payload.message, "what is 2+2?");
    assert_eq!(payload.get_data("tool_result"), Some(&json!({ "answer": 4 })));
    assert_eq!(payload.get_string("output"), Some("what is 2+2?"));
    // Said once by the output adapter and once by the output pass-through.
    assert_eq!(payload.responses.len(), 2);
}

#[tokio::test]
async fn test_terminating_stage_stops_the_workflow() {
    let journal = Journal::new();
    let mut plugins = default_workflow();
    plugins.push(
        RecordingPlugin::new("guard", &journal)
            .hooks(&[HookPoint::Think])
            .reaction(Reaction::Stop("off topic"))
            .arc(),
    );
    plugins.push(
        RecordingPlugin::new("auditor", &journal)
            .hooks(&[HookPoint::Do, HookPoint::Output])
            .arc(),
    );
    let manager = manager_for(plugins).await;
    manager.activate_all().await.unwrap();

    let payload = run_stages(&manager, HookPayload::new(HookPoint::Input).with_message("hi"))
        .await
        .unwrap();

    assert_eq!(journal.entries("think:"), vec!["guard"]);
    assert!(journal.entries("do:").is_empty());
    assert!(journal.entries("output:").is_empty());
    assert!(payload.responses.is_empty());
}

#[tokio::test]
async fn test_failing_stage_surfaces_error_and_notifies_observers() {
    let journal = Journal::new();
    let manager = manager_for(vec![
        RecordingPlugin::new("parser", &journal)
            .hooks(&[HookPoint::Parse])
            .reaction(Reaction::Fail)
            .arc(),
        RecordingPlugin::new("logger", &journal)
            .hooks(&[HookPoint::OnError])
            .arc(),
        RecordingPlugin::new("metrics", &journal)
            .hooks(&[HookPoint::OnError])
            .arc(),
    ])
    .await;
    manager.activate_all().await.unwrap();

    let err = run_stages(&manager, HookPayload::new(HookPoint::Input))
        .await
        .unwrap_err();
    assert!(matches!(&err, PluginError::HookFailed { identity, hook: HookPoint::Parse, .. } if identity == "parser"));

    let notice = HookPayload::new(HookPoint::OnError).with_string("error", &err.to_string());
    let DispatchOutcome::FanOut(outcome) = manager.dispatcher().dispatch(notice).await.unwrap() else {
        panic!("on_error is a fan-out hook");
    };
    assert!(outcome.is_clean());
    // Error hooks unwind in reverse activation order.
    assert_eq!(journal.entries("on_error:"), vec!["metrics", "logger"]);
}

#[tokio::test]
async fn test_post_step_fans_out_to_observers() {
    let journal = Journal::new();
    let manager = manager_for(vec![
        RecordingPlugin::new("first", &journal)
            .hooks(&[HookPoint::PostStep])
            .arc(),
        RecordingPlugin::new("second", &journal)
            .hooks(&[HookPoint::PostStep])
            .reaction(Reaction::Fail)
            .arc(),
        RecordingPlugin::new("third", &journal)
            .hooks(&[HookPoint::PostStep])
            .arc(),
    ])
    .await;
    manager.activate_all().await.unwrap();

    let outcome = manager
        .dispatcher()
        .run_fan_out(HookPayload::new(HookPoint::PostStep).with_message("step"))
        .await;

    assert_eq!(outcome.slots.len(), 3);
    assert_eq!(outcome.slots[0].result.as_ref().unwrap().message, "step[first]");
    assert!(outcome.slots[1].result.is_err());
    assert_eq!(outcome.slots[2].result.as_ref().unwrap().message, "step[third]");
}

#[tokio::test]
async fn test_shutdown_hook_then_teardown() {
    let journal = Journal::new();
    let manager = manager_for(vec![
        RecordingPlugin::new("store", &journal)
            .hooks(&[HookPoint::OnShutdown])
            .arc(),
        RecordingPlugin::new("cache", &journal)
            .depends_on("store")
            .hooks(&[HookPoint::OnShutdown])
            .arc(),
    ])
    .await;
    manager.activate_all().await.unwrap();

    manager
        .dispatcher()
        .dispatch(HookPayload::new(HookPoint::OnShutdown))
        .await
        .unwrap();
    manager.deactivate_all().await;

    assert_eq!(journal.entries("on_shutdown:"), vec!["cache", "store"]);
    assert_eq!(journal.entries("teardown:"), vec!["cache", "store"]);
}
