//! Entity stdlib host — runs one message through the standard workflow.
//!
//! Wires configuration, logging and the plugin lifecycle together: registers
//! the standard plugins, activates them in dependency order, fires every
//! workflow stage and shuts the plugin set down again.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{EnvFilter, fmt};

use entity_core::config::{AppConfig, PluginSystemConfig};
use entity_core::error::AppError;
use entity_plugin::{
    HookPayload, HookPoint, LifecycleManager, Plugin, PluginError, PluginRegistry,
};
use entity_stdlib::{EchoTool, InputAdapterPlugin, ToolPlugin, default_workflow};

/// Command-line arguments of the host.
#[derive(Debug, Parser)]
#[command(name = "entity-stdlib-host", version, about = "Run a message through the standard Entity workflow")]
struct Cli {
    /// Message fed into the `input` stage.
    #[arg(default_value = "Hello from Entity")]
    message: String,

    /// Configuration file; overrides the `config/` directory lookup.
    #[arg(long, env = "ENTITY_CONFIG")]
    config: Option<PathBuf>,

    /// Environment overlay loaded from `config/{env}.toml`.
    #[arg(long, env = "ENTITY_ENV", default_value = "development")]
    env: String,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match load_configuration(&cli) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    init_logging(&config);

    if let Err(e) = run(config, cli.message).await {
        tracing::error!(error = %e, "Host error");
        std::process::exit(1);
    }
}

/// Load configuration from file and environment
fn load_configuration(cli: &Cli) -> Result<AppConfig, AppError> {
    match &cli.config {
        Some(path) => AppConfig::load_from_path(path),
        None => AppConfig::load(&cli.env),
    }
}

/// Initialize tracing/logging
fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format.as_str() {
        "json" => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_thread_ids(true)
                .init();
        }
        _ => {
            fmt()
                .pretty()
                .with_env_filter(filter)
                .with_target(true)
                .init();
        }
    }
}

async fn run(config: AppConfig, message: String) -> Result<(), AppError> {
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Starting Entity stdlib host");

    // ── Step 1: Register plugins ─────────────────────────────────
    let registry = Arc::new(PluginRegistry::new());
    register_plugins(&registry, &config.plugins).await?;

    // ── Step 2: Activate in dependency order ─────────────────────
    let manager = LifecycleManager::with_config(Arc::clone(&registry), &config.plugins);
    let report = manager.activate_all().await?;
    for failure in report.failures() {
        tracing::warn!(error = %failure, "Plugin unavailable for this run");
    }

    // ── Step 3: Run the workflow, cancellable with Ctrl+C ────────
    let cancel = CancellationToken::new();
    let watcher = tokio::spawn(cancel_on_signal(cancel.clone()));

    let payload = HookPayload::new(HookPoint::PreStep).with_string("raw_input", &message);
    match run_workflow(&manager, payload, &cancel).await {
        Ok(responses) => {
            for response in responses {
                println!("{response}");
            }
        }
        Err(err) => {
            tracing::error!(error = %err, "Workflow failed");
            let notice = HookPayload::new(HookPoint::OnError).with_string("error", &err.to_string());
            manager.dispatcher().dispatch(notice).await?;
        }
    }
    watcher.abort();

    // ── Step 4: Shut down ────────────────────────────────────────
    manager
        .dispatcher()
        .dispatch(HookPayload::new(HookPoint::OnShutdown))
        .await?;

    let teardown = manager.deactivate_all().await;
    for failure in &teardown.failures {
        tracing::warn!(error = %failure, "Plugin teardown failed");
    }

    tracing::info!(deactivated = teardown.deactivated.len(), "Entity stdlib host stopped");
    Ok(())
}

/// Registers the standard plugins that are not disabled, with their settings.
async fn register_plugins(
    registry: &PluginRegistry,
    config: &PluginSystemConfig,
) -> Result<(), AppError> {
    let mut plugins: Vec<Arc<dyn Plugin>> = default_workflow();
    plugins.push(Arc::new(InputAdapterPlugin::new()));
    plugins.push(Arc::new(ToolPlugin::new().with_tool(Arc::new(EchoTool))));

    for plugin in plugins {
        let identity = plugin.descriptor().identity.clone();
        if config.is_disabled(&identity) {
            tracing::info!(plugin_id = %identity, "Plugin disabled by configuration");
            continue;
        }
        registry
            .register_with_config(plugin, config.settings_for(&identity))
            .await?;
    }

    Ok(())
}

/// Fires `pre_step`, every stage and `post_step`, returning the collected responses.
async fn run_workflow(
    manager: &LifecycleManager,
    payload: HookPayload,
    cancel: &CancellationToken,
) -> Result<Vec<String>, PluginError> {
    let dispatcher = manager.dispatcher();
    let mut payload = payload;

    for hook in std::iter::once(HookPoint::PreStep).chain(HookPoint::STAGES) {
        let outcome = dispatcher
            .run_chain_with_cancel(payload.retarget(hook), cancel)
            .await?;

        payload = outcome.payload;
        if let Some(plugin_id) = outcome.terminated_by {
            tracing::info!(
                hook = %hook,
                plugin_id = %plugin_id,
                reason = outcome.terminate_reason.as_deref().unwrap_or_default(),
                "Workflow terminated early"
            );
            break;
        }
    }

    let responses = payload.responses.clone();
    let observers = dispatcher
        .run_fan_out_with_cancel(payload.retarget(HookPoint::PostStep), cancel)
        .await;
    for failure in observers.failures() {
        tracing::warn!(error = %failure, "post_step observer failed");
    }

    Ok(responses)
}

/// Cancels in-flight dispatches on Ctrl+C.
async fn cancel_on_signal(cancel: CancellationToken) {
    if tokio::signal::ctrl_c().await.is_ok() {
        tracing::warn!("Interrupt received, cancelling workflow");
        cancel.cancel();
    }
}
