//! Lifecycle manager — drives plugins through activation, health checks and
//! teardown.
//!
//! Lifecycle passes are serialized by a mutex and run under the registry's
//! write lock, so no hook dispatch observes a half-finished transition.
//! Failures are isolated per plugin: a failing plugin and everything that
//! depends on it end up `Failed`, independent plugins keep going.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use entity_core::config::PluginSystemConfig;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::error::PluginError;
use crate::hooks::dispatcher::HookDispatcher;
use crate::registry::{LifecycleState, PluginRegistry, RegistryState};
use crate::report::{ActivationOutcome, ActivationReport, DeactivationReport, HealthReport};
use crate::safety::guarded;
use crate::traits::ActivationContext;

/// Manages the full lifecycle of registered plugins.
#[derive(Debug)]
pub struct LifecycleManager {
    /// Plugin registry.
    registry: Arc<PluginRegistry>,
    /// Hook dispatcher over the same registry.
    dispatcher: Arc<HookDispatcher>,
    /// Upper bound for a plugin's activation function.
    activation_timeout: Duration,
    /// Upper bound for a plugin's teardown function.
    teardown_timeout: Duration,
    /// Upper bound for a plugin's health check.
    health_timeout: Duration,
    /// Serializes lifecycle passes.
    transitions: Mutex<()>,
}

impl LifecycleManager {
    /// Creates a lifecycle manager with default timeouts.
    pub fn new(registry: Arc<PluginRegistry>) -> Self {
        Self::with_config(registry, &PluginSystemConfig::default())
    }

    /// Creates a lifecycle manager using the timeouts of the plugin configuration.
    pub fn with_config(registry: Arc<PluginRegistry>, config: &PluginSystemConfig) -> Self {
        let dispatcher = Arc::new(HookDispatcher::with_config(Arc::clone(&registry), config));

        Self {
            registry,
            dispatcher,
            activation_timeout: config.activation_timeout(),
            teardown_timeout: config.teardown_timeout(),
            health_timeout: config.hook_timeout(),
            transitions: Mutex::new(()),
        }
    }

    /// Activates every registered plugin in dependency order.
    ///
    /// Duplicate identities, cycles and missing dependencies abort the pass
    /// before any plugin is touched. Per-plugin failures are recorded in the
    /// report; dependents of a failed plugin are failed without activating.
    pub async fn activate_all(&self) -> Result<ActivationReport, PluginError> {
        let _serial = self.transitions.lock().await;
        let mut state = self.registry.write_state().await;

        let order = state.resolve_order().inspect_err(|e| {
            error!(error = %e, "Plugin activation aborted");
        })?;

        info!(plugins = order.len(), "Activating plugins");

        let mut report = ActivationReport::default();
        for identity in &order {
            let outcome = self.activate_one(&mut state, identity).await;
            report.push(identity, outcome);
        }

        state.rebuild_active_order(&order);

        info!(
            active = state.active_order.len(),
            failed = report.failures().count(),
            "Plugin activation complete"
        );

        Ok(report)
    }

    async fn activate_one(&self, state: &mut RegistryState, identity: &str) -> ActivationOutcome {
        let Some(entry) = state.entries.get(identity) else {
            return ActivationOutcome::Failed(PluginError::NotRegistered {
                identity: identity.to_string(),
            });
        };

        match entry.state {
            LifecycleState::Activated => return ActivationOutcome::AlreadyActive,
            terminal if terminal.is_terminal() => {
                debug!(plugin_id = %identity, state = %terminal, "Plugin needs a reset, skipping");
                return ActivationOutcome::Skipped(terminal);
            }
            _ => {}
        }

        let plugin = Arc::clone(&entry.plugin);
        let descriptor = Arc::clone(&entry.descriptor);
        let raw_config = entry.config.clone();

        let mut dependencies = BTreeMap::new();
        for dependency in descriptor.dependencies.keys() {
            match state.entries.get(dependency) {
                Some(dep) if dep.state == LifecycleState::Activated => {
                    dependencies.insert(dependency.clone(), dep.descriptor.version.clone());
                }
                _ => {
                    return fail(
                        state,
                        PluginError::DependencyFailed {
                            identity: identity.to_string(),
                            dependency: dependency.clone(),
                        },
                    );
                }
            }
        }

        let validated = descriptor
            .config_schema
            .validate(&raw_config)
            .and_then(|config| plugin.validate_config(&config).map(|()| config));
        let config = match validated {
            Ok(config) => config,
            Err(violation) => {
                return fail(
                    state,
                    PluginError::InvalidConfig {
                        identity: identity.to_string(),
                        violation,
                    },
                );
            }
        };

        if let Some(entry) = state.entries.get_mut(identity) {
            entry.state = LifecycleState::Validated;
        }
        debug!(plugin_id = %identity, "Plugin configuration validated");

        let ctx = ActivationContext {
            identity: identity.to_string(),
            config,
            dependencies,
        };

        match guarded(self.activation_timeout, plugin.activate(ctx)).await {
            Ok(instance) => {
                if let Some(entry) = state.entries.get_mut(identity) {
                    entry.instance = Some(instance);
                    entry.state = LifecycleState::Activated;
                    entry.failure = None;
                }
                info!(
                    plugin_id = %identity,
                    version = %descriptor.version,
                    hooks = descriptor.hooks.len(),
                    "Plugin activated"
                );
                ActivationOutcome::Activated
            }
            Err(source) => fail(
                state,
                PluginError::ActivationFailed {
                    identity: identity.to_string(),
                    source,
                },
            ),
        }
    }

    /// Tears down every active plugin in reverse activation order.
    ///
    /// Each instance is taken out of the registry, torn down and dropped
    /// whether or not its teardown succeeded; failures are collected, never
    /// raised, so one plugin cannot block the teardown of the others.
    pub async fn deactivate_all(&self) -> DeactivationReport {
        let _serial = self.transitions.lock().await;
        let mut state = self.registry.write_state().await;

        let order: Vec<String> = state.active_order.iter().rev().cloned().collect();
        info!(plugins = order.len(), "Deactivating plugins");

        let mut report = DeactivationReport::default();
        for identity in order {
            let Some(entry) = state.entries.get_mut(&identity) else {
                continue;
            };

            if let Some(instance) = entry.instance.take() {
                let result = guarded(self.teardown_timeout, instance.teardown()).await;
                drop(instance);

                if let Err(source) = result {
                    warn!(plugin_id = %identity, error = %source, "Plugin teardown returned error");
                    report.failures.push(PluginError::TeardownFailed {
                        identity: identity.clone(),
                        source,
                    });
                }
            }

            entry.state = LifecycleState::Deactivated;
            info!(plugin_id = %identity, "Plugin deactivated");
            report.deactivated.push(identity);
        }

        state.active_order.clear();

        info!(
            deactivated = report.deactivated.len(),
            failures = report.failures.len(),
            "All plugins deactivated"
        );

        report
    }

    /// Runs every active plugin's health check.
    ///
    /// An unhealthy plugin and every active plugin depending on it are torn
    /// down (dependents first) and moved to `Failed`.
    pub async fn health_check_all(&self) -> HealthReport {
        let _serial = self.transitions.lock().await;
        let mut state = self.registry.write_state().await;

        let order = state.active_order.clone();
        let mut report = HealthReport::default();
        let mut down: HashSet<String> = HashSet::new();
        let mut failures: Vec<(String, PluginError)> = Vec::new();

        for identity in &order {
            let Some(entry) = state.entries.get(identity) else {
                continue;
            };

            let failed_dependency = entry
                .descriptor
                .dependencies
                .keys()
                .find(|dep| down.contains(*dep))
                .cloned();
            if let Some(dependency) = failed_dependency {
                down.insert(identity.clone());
                failures.push((
                    identity.clone(),
                    PluginError::DependencyFailed {
                        identity: identity.clone(),
                        dependency,
                    },
                ));
                continue;
            }

            let Some(instance) = entry.instance.as_ref() else {
                continue;
            };
            match guarded(self.health_timeout, instance.health_check()).await {
                Ok(()) => report.healthy.push(identity.clone()),
                Err(source) => {
                    warn!(plugin_id = %identity, error = %source, "Plugin health check failed");
                    down.insert(identity.clone());
                    failures.push((
                        identity.clone(),
                        PluginError::HealthCheckFailed {
                            identity: identity.clone(),
                            source,
                        },
                    ));
                }
            }
        }

        let mut teardown_failures = Vec::new();
        for (identity, error) in failures.iter().rev() {
            let Some(entry) = state.entries.get_mut(identity) else {
                continue;
            };
            if let Some(instance) = entry.instance.take() {
                if let Err(source) = guarded(self.teardown_timeout, instance.teardown()).await {
                    teardown_failures.push(PluginError::TeardownFailed {
                        identity: identity.clone(),
                        source,
                    });
                }
            }
            entry.fail(error);
            warn!(plugin_id = %identity, error = %error, "Plugin removed from dispatch");
        }

        state.active_order.retain(|identity| !down.contains(identity));

        report.failures = failures
            .into_iter()
            .map(|(_, error)| error)
            .chain(teardown_failures)
            .collect();

        report
    }

    /// Returns a `Failed` or `Deactivated` plugin to `Discovered` so the next
    /// `activate_all` can activate it again.
    pub async fn reset(&self, identity: &str) -> Result<(), PluginError> {
        let _serial = self.transitions.lock().await;
        let mut state = self.registry.write_state().await;

        let entry = state
            .entries
            .get_mut(identity)
            .ok_or_else(|| PluginError::NotRegistered {
                identity: identity.to_string(),
            })?;

        match entry.state {
            LifecycleState::Activated => Err(PluginError::PluginActive {
                identity: identity.to_string(),
            }),
            state if state.is_terminal() => {
                entry.state = LifecycleState::Discovered;
                entry.failure = None;
                info!(plugin_id = %identity, "Plugin reset");
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// Returns the hook dispatcher for firing hooks.
    pub fn dispatcher(&self) -> &Arc<HookDispatcher> {
        &self.dispatcher
    }

    /// Returns the plugin registry.
    pub fn registry(&self) -> &Arc<PluginRegistry> {
        &self.registry
    }
}

fn fail(state: &mut RegistryState, error: PluginError) -> ActivationOutcome {
    if let Some(identity) = error.identity() {
        warn!(plugin_id = %identity, error = %error, "Plugin activation failed");
        if let Some(entry) = state.entries.get_mut(identity) {
            entry.fail(&error);
        }
    }
    ActivationOutcome::Failed(error)
}
