//! Shared test helpers for integration tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use semver::{Version, VersionReq};

use entity_plugin::prelude::*;
use entity_plugin::{LifecycleManager, PluginRegistry};

/// Ordered record of what the plugins under test did.
#[derive(Debug, Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<String>>>);

impl Journal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, entry: String) {
        self.0.lock().unwrap().push(entry);
    }

    /// Entries starting with `prefix`, with the prefix stripped.
    pub fn entries(&self, prefix: &str) -> Vec<String> {
        self.0
            .lock()
            .unwrap()
            .iter()
            .filter_map(|e| e.strip_prefix(prefix).map(str::to_string))
            .collect()
    }
}

/// What a [`RecordingPlugin`] does when one of its hooks fires.
#[derive(Debug, Clone)]
pub enum Reaction {
    /// Tags the message with the plugin identity.
    Tag,
    /// Terminates the chain.
    Stop(&'static str),
    /// Fails the hook.
    Fail,
}

/// A plugin that records activation, hooks and teardown into a [`Journal`].
#[derive(Debug)]
pub struct RecordingPlugin {
    descriptor: PluginDescriptor,
    journal: Journal,
    reaction: Reaction,
    fail_activation: bool,
}

impl RecordingPlugin {
    pub fn new(identity: &str, journal: &Journal) -> Self {
        Self {
            descriptor: PluginDescriptor::new(identity, Version::new(1, 0, 0)),
            journal: journal.clone(),
            reaction: Reaction::Tag,
            fail_activation: false,
        }
    }

    pub fn version(mut self, version: Version) -> Self {
        self.descriptor.version = version;
        self
    }

    pub fn depends_on(mut self, identity: &str) -> Self {
        self.descriptor = self.descriptor.depends_on(identity);
        self
    }

    pub fn requires(mut self, identity: &str, range: VersionReq) -> Self {
        self.descriptor = self.descriptor.with_dependency(identity, range);
        self
    }

    pub fn hooks(mut self, hooks: &[HookPoint]) -> Self {
        self.descriptor = self.descriptor.with_hooks(hooks.iter().copied());
        self
    }

    pub fn reaction(mut self, reaction: Reaction) -> Self {
        self.reaction = reaction;
        self
    }

    pub fn failing_activation(mut self) -> Self {
        self.fail_activation = true;
        self
    }

    pub fn arc(self) -> Arc<dyn Plugin> {
        Arc::new(self)
    }
}

#[async_trait]
impl Plugin for RecordingPlugin {
    fn descriptor(&self) -> &PluginDescriptor {
        &self.descriptor
    }

    async fn activate(&self, ctx: ActivationContext) -> anyhow::Result<Box<dyn PluginInstance>> {
        if self.fail_activation {
            anyhow::bail!("{} could not reach its backend", ctx.identity);
        }
        self.journal.record(format!("activate:{}", ctx.identity));
        Ok(Box::new(Recorder {
            identity: ctx.identity,
            journal: self.journal.clone(),
            reaction: self.reaction.clone(),
        }))
    }
}

#[derive(Debug)]
struct Recorder {
    identity: String,
    journal: Journal,
    reaction: Reaction,
}

#[async_trait]
impl PluginInstance for Recorder {
    async fn on_hook(&self, mut payload: HookPayload) -> anyhow::Result<HookResult> {
        self.journal
            .record(format!("{}:{}", payload.hook, self.identity));

        match &self.reaction {
            Reaction::Tag => {
                payload.message = format!("{}[{}]", payload.message, self.identity);
                Ok(HookResult::continue_with(payload))
            }
            Reaction::Stop(reason) => Ok(HookResult::terminate(payload, reason)),
            Reaction::Fail => anyhow::bail!("{} failed on {}", self.identity, payload.hook),
        }
    }

    async fn teardown(&self) -> anyhow::Result<()> {
        self.journal.record(format!("teardown:{}", self.identity));
        Ok(())
    }
}

/// Registers the plugins and returns a manager over them.
pub async fn manager_for(plugins: Vec<Arc<dyn Plugin>>) -> LifecycleManager {
    let registry = Arc::new(PluginRegistry::new());
    for plugin in plugins {
        registry.register(plugin).await.unwrap();
    }
    LifecycleManager::new(registry)
}
