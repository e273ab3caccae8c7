//! Plugin registry — stores descriptors, configuration, lifecycle state and
//! active instances, keyed by identity.
//!
//! All state sits behind one readers-writer lock: hook dispatch holds the
//! read side for the duration of an event, registration and lifecycle
//! transitions take the write side.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info};

use crate::descriptor::PluginDescriptor;
use crate::error::PluginError;
use crate::resolver;
use crate::traits::{Plugin, PluginInstance};

/// Lifecycle state of a registered plugin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    /// Registered, not yet validated.
    Discovered,
    /// Configuration validated, activation in progress.
    Validated,
    /// Active and receiving hooks.
    Activated,
    /// Activation, dependency or health check failed. Needs a reset.
    Failed,
    /// Torn down. Needs a reset before it can activate again.
    Deactivated,
}

impl LifecycleState {
    /// Returns whether the state can only be left through a reset.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Failed | Self::Deactivated)
    }
}

impl std::fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Discovered => "discovered",
            Self::Validated => "validated",
            Self::Activated => "activated",
            Self::Failed => "failed",
            Self::Deactivated => "deactivated",
        };
        f.write_str(name)
    }
}

/// Read-only snapshot of a registry entry.
#[derive(Debug, Clone)]
pub struct PluginStatus {
    /// The plugin's descriptor.
    pub descriptor: Arc<PluginDescriptor>,
    /// Current lifecycle state.
    pub state: LifecycleState,
    /// Stored (unvalidated) configuration.
    pub config: Value,
    /// Message of the last failure, kept for diagnostics.
    pub failure: Option<String>,
}

impl PluginStatus {
    /// The plugin identity.
    pub fn identity(&self) -> &str {
        &self.descriptor.identity
    }
}

/// One registered plugin.
#[derive(Debug)]
pub(crate) struct PluginEntry {
    pub(crate) plugin: Arc<dyn Plugin>,
    pub(crate) descriptor: Arc<PluginDescriptor>,
    pub(crate) config: Value,
    pub(crate) state: LifecycleState,
    pub(crate) instance: Option<Box<dyn PluginInstance>>,
    pub(crate) failure: Option<String>,
}

impl PluginEntry {
    fn status(&self) -> PluginStatus {
        PluginStatus {
            descriptor: Arc::clone(&self.descriptor),
            state: self.state,
            config: self.config.clone(),
            failure: self.failure.clone(),
        }
    }

    /// Moves the entry to `Failed`. The instance, if any, must already be released.
    pub(crate) fn fail(&mut self, error: &PluginError) {
        self.state = LifecycleState::Failed;
        self.failure = Some(error.to_string());
    }
}

/// Everything guarded by the registry lock.
#[derive(Debug, Default)]
pub(crate) struct RegistryState {
    pub(crate) entries: BTreeMap<String, PluginEntry>,
    /// Cached resolver output; `None` after the descriptor set changed.
    pub(crate) activation_order: Option<Vec<String>>,
    /// Activated plugins in activation order. Dispatch walks this.
    pub(crate) active_order: Vec<String>,
}

impl RegistryState {
    /// Returns the cached activation order, resolving it if the plugin set changed.
    pub(crate) fn resolve_order(&mut self) -> Result<Vec<String>, PluginError> {
        if let Some(order) = &self.activation_order {
            return Ok(order.clone());
        }
        let order = resolver::resolve(self.entries.values().map(|e| e.descriptor.as_ref()))?;
        debug!(order = ?order, "Activation order resolved");
        self.activation_order = Some(order.clone());
        Ok(order)
    }

    /// Rebuilds the dispatch order from an activation order.
    pub(crate) fn rebuild_active_order(&mut self, order: &[String]) {
        self.active_order = order
            .iter()
            .filter(|id| {
                self.entries
                    .get(id.as_str())
                    .is_some_and(|e| e.state == LifecycleState::Activated)
            })
            .cloned()
            .collect();
    }
}

/// Registry of all discovered plugins.
#[derive(Debug, Default)]
pub struct PluginRegistry {
    state: RwLock<RegistryState>,
}

impl PluginRegistry {
    /// Creates a new empty plugin registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a plugin in the `Discovered` state with an empty configuration.
    pub async fn register(&self, plugin: Arc<dyn Plugin>) -> Result<(), PluginError> {
        self.register_with_config(plugin, Value::Object(serde_json::Map::new()))
            .await
    }

    /// Registers a plugin together with its configuration object.
    pub async fn register_with_config(
        &self,
        plugin: Arc<dyn Plugin>,
        config: Value,
    ) -> Result<(), PluginError> {
        let descriptor = Arc::new(plugin.descriptor().clone());
        descriptor.validate()?;
        let id = descriptor.identity.clone();

        let mut state = self.state.write().await;
        if state.entries.contains_key(&id) {
            return Err(PluginError::DuplicateIdentity { identity: id });
        }

        info!(
            plugin_id = %id,
            version = %descriptor.version,
            capabilities = descriptor.capabilities.len(),
            hooks = descriptor.hooks.len(),
            "Registering plugin"
        );

        state.entries.insert(
            id,
            PluginEntry {
                plugin,
                descriptor,
                config,
                state: LifecycleState::Discovered,
                instance: None,
                failure: None,
            },
        );
        state.activation_order = None;

        Ok(())
    }

    /// Replaces the stored configuration of a plugin that is not active.
    pub async fn configure(&self, identity: &str, config: Value) -> Result<(), PluginError> {
        let mut state = self.state.write().await;
        let entry = state
            .entries
            .get_mut(identity)
            .ok_or_else(|| PluginError::NotRegistered {
                identity: identity.to_string(),
            })?;

        if entry.state == LifecycleState::Activated {
            return Err(PluginError::PluginActive {
                identity: identity.to_string(),
            });
        }

        entry.config = config;
        debug!(plugin_id = %identity, "Plugin configuration replaced");
        Ok(())
    }

    /// Unregisters a plugin by identity.
    ///
    /// Returns the removed plugin, or `None` if the identity was unknown.
    pub async fn unregister(&self, identity: &str) -> Result<Option<Arc<dyn Plugin>>, PluginError> {
        let mut state = self.state.write().await;

        match state.entries.get(identity) {
            None => return Ok(None),
            Some(entry) if entry.state == LifecycleState::Activated => {
                return Err(PluginError::PluginActive {
                    identity: identity.to_string(),
                });
            }
            Some(_) => {}
        }

        let removed = state.entries.remove(identity).map(|entry| entry.plugin);
        state.activation_order = None;

        info!(plugin_id = %identity, "Plugin unregistered");

        Ok(removed)
    }

    /// Gets a snapshot of a plugin by identity.
    pub async fn lookup(&self, identity: &str) -> Option<PluginStatus> {
        let state = self.state.read().await;
        state.entries.get(identity).map(PluginEntry::status)
    }

    /// Gets snapshots of every plugin providing a capability, sorted by identity.
    pub async fn lookup_by_capability(&self, tag: &str) -> Vec<PluginStatus> {
        let state = self.state.read().await;
        state
            .entries
            .values()
            .filter(|entry| entry.descriptor.provides(tag))
            .map(PluginEntry::status)
            .collect()
    }

    /// Returns the lifecycle state of a plugin.
    pub async fn state_of(&self, identity: &str) -> Option<LifecycleState> {
        let state = self.state.read().await;
        state.entries.get(identity).map(|entry| entry.state)
    }

    /// Lists snapshots of all registered plugins, sorted by identity.
    pub async fn list(&self) -> Vec<PluginStatus> {
        let state = self.state.read().await;
        state.entries.values().map(PluginEntry::status).collect()
    }

    /// Returns the dependency-consistent activation order of all registered plugins.
    pub async fn activation_order(&self) -> Result<Vec<String>, PluginError> {
        let mut state = self.state.write().await;
        state.resolve_order()
    }

    /// Returns the identities of activated plugins in dispatch order.
    pub async fn active_order(&self) -> Vec<String> {
        let state = self.state.read().await;
        state.active_order.clone()
    }

    /// Returns plugin count.
    pub async fn len(&self) -> usize {
        let state = self.state.read().await;
        state.entries.len()
    }

    /// Returns whether no plugin is registered.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Checks whether a plugin is registered.
    pub async fn contains(&self, identity: &str) -> bool {
        let state = self.state.read().await;
        state.entries.contains_key(identity)
    }

    pub(crate) async fn read_state(&self) -> RwLockReadGuard<'_, RegistryState> {
        self.state.read().await
    }

    pub(crate) async fn write_state(&self) -> RwLockWriteGuard<'_, RegistryState> {
        self.state.write().await
    }
}
