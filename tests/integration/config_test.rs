//! Integration tests wiring `AppConfig` into plugin registration and activation.

use std::io::Write;
use std::sync::Arc;

use entity_core::config::AppConfig;
use entity_core::error::ErrorKind;
use entity_plugin::{
    ActivationOutcome, HookPayload, HookPoint, LifecycleManager, Plugin, PluginError, PluginRegistry,
};
use entity_stdlib::{InputAdapterPlugin, default_workflow};

const CONFIG: &str = r#"
[logging]
level = "debug"
format = "json"

[plugins]
hook_timeout_seconds = 5
disabled = ["passthrough-review"]

[plugins.settings.passthrough-output]
enable_output_say = false

[plugins.settings.input-adapter]
max_length = 5
"#;

/// Registers the standard workflow and the input adapter the way the host does.
async fn host_manager(config: &AppConfig) -> LifecycleManager {
    let registry = Arc::new(PluginRegistry::new());
    let mut plugins = default_workflow();
    plugins.push(Arc::new(InputAdapterPlugin::new()));

    for plugin in plugins {
        let identity = plugin.descriptor().identity.clone();
        if config.plugins.is_disabled(&identity) {
            continue;
        }
        registry
            .register_with_config(plugin, config.plugins.settings_for(&identity))
            .await
            .unwrap();
    }

    LifecycleManager::with_config(registry, &config.plugins)
}

#[tokio::test]
async fn test_settings_reach_plugins() {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    file.write_all(CONFIG.as_bytes()).unwrap();

    let config = AppConfig::load_from_path(file.path()).unwrap();
    assert_eq!(config.logging.format, "json");
    assert_eq!(config.plugins.hook_timeout_seconds, 5);

    let manager = host_manager(&config).await;
    assert!(manager.activate_all().await.unwrap().is_complete());
    assert!(!manager.registry().contains("passthrough-review").await);

    let mut payload = HookPayload::new(HookPoint::Input).with_string("raw_input", "  abcdefgh ");
    for stage in HookPoint::STAGES {
        payload = manager
            .dispatcher()
            .run_chain(payload.retarget(stage))
            .await
            .unwrap()
            .payload;
    }

    assert_eq!(payload.message, "abcde");
    assert!(payload.responses.is_empty());
}

#[tokio::test]
async fn test_invalid_setting_fails_only_that_plugin() {
    let config = AppConfig::from_toml_str(
        r#"
        [plugins.settings.passthrough-output]
        enable_output_say = "loudly"
        "#,
    )
    .unwrap();

    let manager = host_manager(&config).await;
    let report = manager.activate_all().await.unwrap();

    let Some(ActivationOutcome::Failed(err)) = report.outcome("passthrough-output") else {
        panic!("passthrough-output should fail validation");
    };
    assert!(matches!(err, PluginError::InvalidConfig { violation, .. } if violation.option == "enable_output_say"));
    assert_eq!(report.active().len(), 6);
}

#[test]
fn test_out_of_range_timeouts_rejected() {
    let err = AppConfig::from_toml_str("[plugins]\nhook_timeout_seconds = 0\n").unwrap_err();
    assert_eq!(err.kind, ErrorKind::Validation);
}
