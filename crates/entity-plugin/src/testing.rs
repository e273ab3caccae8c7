//! Scriptable plugins for unit tests.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use semver::Version;

use crate::descriptor::PluginDescriptor;
use crate::hooks::definitions::{HookPayload, HookPoint, HookResult};
use crate::traits::{ActivationContext, Plugin, PluginInstance};

/// Shared, ordered record of lifecycle events (`activate:a`, `hook:a`, `teardown:a`).
pub(crate) type EventLog = Arc<Mutex<Vec<String>>>;

pub(crate) fn event_log() -> EventLog {
    Arc::new(Mutex::new(Vec::new()))
}

pub(crate) fn events(log: &EventLog) -> Vec<String> {
    log.lock().unwrap().clone()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Activation {
    Succeed,
    Fail,
    Panic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum OnHook {
    /// Appends the identity to the message and responses.
    Append,
    /// Appends, then terminates the chain.
    Terminate,
    Fail,
    Panic,
    /// Never completes.
    Stall,
    /// Sleeps, logs `returned:x`, then appends.
    Delay(Duration),
}

#[derive(Debug)]
pub(crate) struct TestPlugin {
    descriptor: PluginDescriptor,
    activation: Activation,
    on_hook: OnHook,
    teardown_fails: bool,
    healthy: Arc<AtomicBool>,
    log: EventLog,
}

impl TestPlugin {
    pub(crate) fn new(identity: &str, log: &EventLog) -> Self {
        Self {
            descriptor: PluginDescriptor::new(identity, Version::new(1, 0, 0))
                .with_hooks(HookPoint::ALL),
            activation: Activation::Succeed,
            on_hook: OnHook::Append,
            teardown_fails: false,
            healthy: Arc::new(AtomicBool::new(true)),
            log: Arc::clone(log),
        }
    }

    pub(crate) fn depends_on(mut self, identity: &str) -> Self {
        self.descriptor = self.descriptor.depends_on(identity);
        self
    }

    pub(crate) fn map_descriptor(mut self, f: impl FnOnce(PluginDescriptor) -> PluginDescriptor) -> Self {
        self.descriptor = f(self.descriptor);
        self
    }

    pub(crate) fn only_hooks(mut self, hooks: &[HookPoint]) -> Self {
        self.descriptor.hooks = hooks.iter().copied().collect();
        self
    }

    pub(crate) fn activation(mut self, activation: Activation) -> Self {
        self.activation = activation;
        self
    }

    pub(crate) fn on_hook(mut self, on_hook: OnHook) -> Self {
        self.on_hook = on_hook;
        self
    }

    pub(crate) fn teardown_fails(mut self) -> Self {
        self.teardown_fails = true;
        self
    }

    /// Handle that flips the health of every instance this plugin creates.
    pub(crate) fn health_switch(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.healthy)
    }

    pub(crate) fn arc(self) -> Arc<dyn Plugin> {
        Arc::new(self)
    }
}

#[async_trait]
impl Plugin for TestPlugin {
    fn descriptor(&self) -> &PluginDescriptor {
        &self.descriptor
    }

    async fn activate(&self, ctx: ActivationContext) -> anyhow::Result<Box<dyn PluginInstance>> {
        self.log
            .lock()
            .unwrap()
            .push(format!("activate:{}", ctx.identity));

        match self.activation {
            Activation::Succeed => Ok(Box::new(TestInstance {
                identity: ctx.identity,
                on_hook: self.on_hook,
                teardown_fails: self.teardown_fails,
                healthy: Arc::clone(&self.healthy),
                log: Arc::clone(&self.log),
            })),
            Activation::Fail => anyhow::bail!("connection refused"),
            Activation::Panic => panic!("activation exploded"),
        }
    }
}

#[derive(Debug)]
struct TestInstance {
    identity: String,
    on_hook: OnHook,
    teardown_fails: bool,
    healthy: Arc<AtomicBool>,
    log: EventLog,
}

#[async_trait]
impl PluginInstance for TestInstance {
    async fn on_hook(&self, mut payload: HookPayload) -> anyhow::Result<HookResult> {
        self.log
            .lock()
            .unwrap()
            .push(format!("hook:{}", self.identity));

        match self.on_hook {
            OnHook::Append | OnHook::Terminate => {
                payload.message.push_str(&self.identity);
                payload.say(self.identity.clone());
                if self.on_hook == OnHook::Terminate {
                    Ok(HookResult::terminate(payload, "stop requested"))
                } else {
                    Ok(HookResult::continue_with(payload))
                }
            }
            OnHook::Fail => anyhow::bail!("{} refused the payload", self.identity),
            OnHook::Panic => panic!("{} exploded", self.identity),
            OnHook::Stall => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(HookResult::continue_with(payload))
            }
            OnHook::Delay(delay) => {
                tokio::time::sleep(delay).await;
                self.log
                    .lock()
                    .unwrap()
                    .push(format!("returned:{}", self.identity));
                payload.message.push_str(&self.identity);
                Ok(HookResult::continue_with(payload))
            }
        }
    }

    async fn health_check(&self) -> anyhow::Result<()> {
        if self.healthy.load(Ordering::SeqCst) {
            Ok(())
        } else {
            anyhow::bail!("{} lost its backend", self.identity)
        }
    }

    async fn teardown(&self) -> anyhow::Result<()> {
        self.log
            .lock()
            .unwrap()
            .push(format!("teardown:{}", self.identity));

        if self.teardown_fails {
            anyhow::bail!("{} could not flush", self.identity);
        }
        Ok(())
    }
}
