//! The capability interface every plugin implements.
//!
//! A [`Plugin`] is the discoverable factory: it carries the descriptor,
//! validates configuration and builds a [`PluginInstance`] on activation.
//! The instance owns the plugin's private state and exposes hook and
//! teardown functions.

use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use semver::Version;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::descriptor::PluginDescriptor;
use crate::hooks::definitions::{HookPayload, HookResult};
use crate::schema::ConfigViolation;

/// Everything a plugin receives when it is activated.
#[derive(Debug, Clone)]
pub struct ActivationContext {
    /// Identity of the plugin being activated.
    pub identity: String,
    /// Configuration with schema defaults applied.
    pub config: Value,
    /// Identity → version of the (already active) dependencies.
    pub dependencies: BTreeMap<String, Version>,
}

impl ActivationContext {
    /// Deserializes the validated configuration into a typed struct.
    pub fn config_as<T: DeserializeOwned>(&self) -> anyhow::Result<T> {
        serde_json::from_value(self.config.clone()).map_err(|e| {
            anyhow::anyhow!("configuration for '{}' does not deserialize: {e}", self.identity)
        })
    }
}

/// Trait that all plugins must implement.
#[async_trait]
pub trait Plugin: Send + Sync + std::fmt::Debug {
    /// Returns the static plugin metadata.
    fn descriptor(&self) -> &PluginDescriptor;

    /// Plugin-specific validation, run after the schema check on the
    /// defaults-applied configuration.
    fn validate_config(&self, _config: &Value) -> Result<(), ConfigViolation> {
        Ok(())
    }

    /// Builds the active instance.
    async fn activate(&self, ctx: ActivationContext) -> anyhow::Result<Box<dyn PluginInstance>>;
}

/// An activated plugin.
#[async_trait]
pub trait PluginInstance: Send + Sync + std::fmt::Debug {
    /// Handles one of the hook points declared in the descriptor.
    async fn on_hook(&self, payload: HookPayload) -> anyhow::Result<HookResult>;

    /// Reports whether the instance can keep serving hooks.
    async fn health_check(&self) -> anyhow::Result<()> {
        Ok(())
    }

    /// Releases the instance's resources. Called once, before the instance is dropped.
    async fn teardown(&self) -> anyhow::Result<()> {
        Ok(())
    }
}

type HookFn = Arc<
    dyn Fn(HookPayload) -> Pin<Box<dyn Future<Output = anyhow::Result<HookResult>> + Send>>
        + Send
        + Sync,
>;

/// A closure-based instance for plugins whose only state is captured by the closure.
pub struct ClosureInstance {
    /// Label used in debug output.
    name: String,
    /// Hook function.
    handler: HookFn,
}

impl std::fmt::Debug for ClosureInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClosureInstance")
            .field("name", &self.name)
            .field("handler", &"<closure>")
            .finish()
    }
}

impl ClosureInstance {
    /// Creates a new closure-based instance.
    pub fn new<F, Fut>(name: &str, handler: F) -> Self
    where
        F: Fn(HookPayload) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<HookResult>> + Send + 'static,
    {
        Self {
            name: name.to_string(),
            handler: Arc::new(move |payload| Box::pin(handler(payload))),
        }
    }

    /// Boxes the instance for returning from [`Plugin::activate`].
    pub fn boxed(self) -> Box<dyn PluginInstance> {
        Box::new(self)
    }
}

#[async_trait]
impl PluginInstance for ClosureInstance {
    async fn on_hook(&self, payload: HookPayload) -> anyhow::Result<HookResult> {
        (self.handler)(payload).await
    }
}
