//! Hook dispatcher — fires hook points on activated plugins.
//!
//! For chain hooks (the workflow stages, `pre_step`):
//! - Plugins are called in activation order.
//! - Each plugin's output payload is the next plugin's input.
//! - `Terminate` stops the chain; the terminating plugin's payload is the result.
//! - A failing plugin aborts the chain and the error goes to the caller.
//!
//! For fan-out hooks (`post_step`, `on_error`, `on_shutdown`):
//! - Every plugin receives the same payload.
//! - Results are reported in visiting order, one slot per plugin, whether
//!   the siblings ran sequentially or concurrently.
//! - A failing plugin's slot holds the error; its siblings still run.
//!
//! Error and teardown-class hooks visit plugins in reverse activation order.
//! Plugins that do not declare a hook point are skipped. The registry read
//! lock is held for the whole dispatch.

use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use entity_core::config::PluginSystemConfig;
use futures::future::join_all;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::definitions::{DispatchMode, HookAction, HookPayload, HookPoint, HookResult};
use crate::error::PluginError;
use crate::registry::{LifecycleState, PluginRegistry, RegistryState};
use crate::safety::guarded;
use crate::traits::PluginInstance;

/// Result of a chain dispatch.
#[derive(Debug, Clone)]
pub struct ChainOutcome {
    /// Final payload: the last plugin's output, or the terminating plugin's.
    pub payload: HookPayload,
    /// Plugins invoked, in order.
    pub invoked: Vec<String>,
    /// Plugin that terminated the chain, if any.
    pub terminated_by: Option<String>,
    /// Reason given for terminating.
    pub terminate_reason: Option<String>,
}

impl ChainOutcome {
    /// Returns whether a plugin terminated the chain early.
    pub fn terminated(&self) -> bool {
        self.terminated_by.is_some()
    }
}

/// One plugin's result in a fan-out dispatch.
#[derive(Debug)]
pub struct FanOutSlot {
    /// Plugin identity.
    pub plugin_id: String,
    /// The plugin's output payload, or its failure.
    pub result: Result<HookPayload, PluginError>,
}

/// Result of a fan-out dispatch.
#[derive(Debug, Default)]
pub struct FanOutOutcome {
    /// One slot per invoked plugin, in visiting order.
    pub slots: Vec<FanOutSlot>,
}

impl FanOutOutcome {
    /// Failed slots, in visiting order.
    pub fn failures(&self) -> impl Iterator<Item = &PluginError> {
        self.slots.iter().filter_map(|slot| slot.result.as_ref().err())
    }

    /// Returns whether every plugin succeeded.
    pub fn is_clean(&self) -> bool {
        self.slots.iter().all(|slot| slot.result.is_ok())
    }
}

/// Result of [`HookDispatcher::dispatch`], shaped by the hook's mode.
#[derive(Debug)]
pub enum DispatchOutcome {
    /// A chain hook ran.
    Chain(ChainOutcome),
    /// A fan-out hook ran.
    FanOut(FanOutOutcome),
}

/// Dispatches hooks to activated plugins.
#[derive(Debug)]
pub struct HookDispatcher {
    /// Plugin registry.
    registry: Arc<PluginRegistry>,
    /// Upper bound for a single hook invocation.
    hook_timeout: Duration,
    /// Whether fan-out siblings run concurrently.
    concurrent_fan_out: bool,
}

impl HookDispatcher {
    /// Creates a new hook dispatcher with default settings.
    pub fn new(registry: Arc<PluginRegistry>) -> Self {
        Self::with_config(registry, &PluginSystemConfig::default())
    }

    /// Creates a hook dispatcher using the plugin configuration.
    pub fn with_config(registry: Arc<PluginRegistry>, config: &PluginSystemConfig) -> Self {
        Self {
            registry,
            hook_timeout: config.hook_timeout(),
            concurrent_fan_out: config.concurrent_fan_out,
        }
    }

    /// Dispatches a payload to its hook point using the hook's mode.
    ///
    /// Only chain hooks return `Err`; fan-out failures live in the slots.
    pub async fn dispatch(&self, payload: HookPayload) -> Result<DispatchOutcome, PluginError> {
        self.dispatch_inner(payload, None).await
    }

    /// Like [`dispatch`](Self::dispatch), honoring a cancellation signal.
    ///
    /// A cancelled invocation counts as a hook failure for that plugin.
    pub async fn dispatch_with_cancel(
        &self,
        payload: HookPayload,
        cancel: &CancellationToken,
    ) -> Result<DispatchOutcome, PluginError> {
        self.dispatch_inner(payload, Some(cancel)).await
    }

    async fn dispatch_inner(
        &self,
        payload: HookPayload,
        cancel: Option<&CancellationToken>,
    ) -> Result<DispatchOutcome, PluginError> {
        match payload.hook.mode() {
            DispatchMode::Chain => self
                .chain(payload, cancel)
                .await
                .map(DispatchOutcome::Chain),
            DispatchMode::FanOut => Ok(DispatchOutcome::FanOut(
                self.fan_out(payload, cancel).await,
            )),
        }
    }

    /// Runs the payload's hook point as a chain.
    pub async fn run_chain(&self, payload: HookPayload) -> Result<ChainOutcome, PluginError> {
        self.chain(payload, None).await
    }

    /// Runs the payload's hook point as a fan-out.
    pub async fn run_fan_out(&self, payload: HookPayload) -> FanOutOutcome {
        self.fan_out(payload, None).await
    }

    /// [`run_chain`](Self::run_chain) honoring a cancellation signal.
    pub async fn run_chain_with_cancel(
        &self,
        payload: HookPayload,
        cancel: &CancellationToken,
    ) -> Result<ChainOutcome, PluginError> {
        self.chain(payload, Some(cancel)).await
    }

    /// [`run_fan_out`](Self::run_fan_out) honoring a cancellation signal.
    pub async fn run_fan_out_with_cancel(
        &self,
        payload: HookPayload,
        cancel: &CancellationToken,
    ) -> FanOutOutcome {
        self.fan_out(payload, Some(cancel)).await
    }

    async fn chain(
        &self,
        payload: HookPayload,
        cancel: Option<&CancellationToken>,
    ) -> Result<ChainOutcome, PluginError> {
        let hook = payload.hook;
        let state = self.registry.read_state().await;
        let targets = targets(&state, hook);

        debug!(hook = %hook, handler_count = targets.len(), "Dispatching chain hook");

        let mut outcome = ChainOutcome {
            payload,
            invoked: Vec::with_capacity(targets.len()),
            terminated_by: None,
            terminate_reason: None,
        };

        for (plugin_id, instance) in targets {
            outcome.invoked.push(plugin_id.to_string());

            let input = outcome.payload.clone();
            let result = match self.invoke(plugin_id, instance, input, cancel).await {
                Ok(result) => result,
                Err(err) => {
                    warn!(hook = %hook, plugin_id = %plugin_id, error = %err, "Chain aborted");
                    return Err(err);
                }
            };

            outcome.payload = result.payload;
            if let HookAction::Terminate { reason } = result.action {
                info!(
                    hook = %hook,
                    plugin_id = %plugin_id,
                    reason = %reason,
                    "Plugin terminated chain"
                );
                outcome.terminated_by = Some(plugin_id.to_string());
                outcome.terminate_reason = Some(reason);
                break;
            }
        }

        Ok(outcome)
    }

    async fn fan_out(&self, payload: HookPayload, cancel: Option<&CancellationToken>) -> FanOutOutcome {
        let hook = payload.hook;
        let state = self.registry.read_state().await;
        let targets = targets(&state, hook);

        debug!(
            hook = %hook,
            handler_count = targets.len(),
            concurrent = self.concurrent_fan_out,
            "Dispatching fan-out hook"
        );

        let results = if self.concurrent_fan_out {
            join_all(
                targets
                    .iter()
                    .map(|(plugin_id, instance)| {
                        self.invoke(plugin_id, *instance, payload.clone(), cancel)
                    }),
            )
            .await
        } else {
            let mut results = Vec::with_capacity(targets.len());
            for (plugin_id, instance) in &targets {
                results.push(self.invoke(plugin_id, *instance, payload.clone(), cancel).await);
            }
            results
        };

        let slots = targets
            .iter()
            .zip(results)
            .map(|((plugin_id, _), result)| {
                let result = result.map(|r| {
                    if r.is_terminate() {
                        warn!(
                            hook = %hook,
                            plugin_id = %plugin_id,
                            "Plugin returned Terminate for fan-out hook, ignoring"
                        );
                    }
                    r.payload
                });
                if let Err(err) = &result {
                    warn!(hook = %hook, plugin_id = %plugin_id, error = %err, "Fan-out slot failed");
                }
                FanOutSlot {
                    plugin_id: plugin_id.to_string(),
                    result,
                }
            })
            .collect();

        FanOutOutcome { slots }
    }

    async fn invoke(
        &self,
        plugin_id: &str,
        instance: &dyn PluginInstance,
        payload: HookPayload,
        cancel: Option<&CancellationToken>,
    ) -> Result<HookResult, PluginError> {
        let hook = payload.hook;
        let call = guarded(self.hook_timeout, instance.on_hook(payload));

        let result = match cancel {
            Some(token) => {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => Err(anyhow!("cancelled")),
                    result = call => result,
                }
            }
            None => call.await,
        };

        result.map_err(|source| PluginError::HookFailed {
            identity: plugin_id.to_string(),
            hook,
            source,
        })
    }

    /// Returns a reference to the plugin registry.
    pub fn registry(&self) -> &Arc<PluginRegistry> {
        &self.registry
    }
}

/// Activated plugins declaring `hook`, in visiting order.
fn targets(state: &RegistryState, hook: HookPoint) -> Vec<(&str, &dyn PluginInstance)> {
    let mut targets: Vec<(&str, &dyn PluginInstance)> = state
        .active_order
        .iter()
        .filter_map(|id| {
            let entry = state.entries.get(id)?;
            if entry.state != LifecycleState::Activated || !entry.descriptor.supports(hook) {
                return None;
            }
            let instance = entry.instance.as_deref()?;
            Some((id.as_str(), instance))
        })
        .collect();

    if hook.is_reverse_ordered() {
        targets.reverse();
    }
    targets
}
