//! Pass-through stage plugins and the default workflow.

use std::sync::Arc;

use async_trait::async_trait;
use entity_plugin::prelude::*;
use serde_json::Value;
use tracing::debug;

use crate::STDLIB_VERSION;
use crate::config::{self, PassThroughConfig};

/// Returns the message unchanged. As the `output` stage it also says the
/// message, unless `enable_output_say` is off.
#[derive(Debug)]
pub struct PassThroughPlugin {
    stage: HookPoint,
    descriptor: PluginDescriptor,
}

impl PassThroughPlugin {
    /// Creates the pass-through plugin for a workflow stage.
    pub fn new(stage: HookPoint) -> Result<Self, PluginError> {
        if !HookPoint::STAGES.contains(&stage) {
            return Err(PluginError::InvalidDescriptor {
                identity: Self::identity_for(stage),
                reason: format!(
                    "'{stage}' is not a workflow stage, expected one of {:?}",
                    HookPoint::STAGES.map(|s| s.as_str())
                ),
            });
        }
        Ok(Self::for_stage(stage))
    }

    fn for_stage(stage: HookPoint) -> Self {
        let descriptor = PluginDescriptor::new(Self::identity_for(stage), STDLIB_VERSION)
            .with_description(format!("Passes the message through the {stage} stage"))
            .with_capability("passthrough")
            .with_capability(format!("stage:{stage}"))
            .with_hook(stage)
            .with_schema(PassThroughConfig::schema());

        Self { stage, descriptor }
    }

    /// Identity of the pass-through plugin for a stage, e.g. `passthrough-output`.
    pub fn identity_for(stage: HookPoint) -> String {
        format!("passthrough-{stage}")
    }

    /// Stage this plugin handles.
    pub fn stage(&self) -> HookPoint {
        self.stage
    }
}

#[async_trait]
impl Plugin for PassThroughPlugin {
    fn descriptor(&self) -> &PluginDescriptor {
        &self.descriptor
    }

    fn validate_config(&self, config: &Value) -> Result<(), ConfigViolation> {
        config::parse::<PassThroughConfig>(config).map(|_| ())
    }

    async fn activate(&self, ctx: ActivationContext) -> anyhow::Result<Box<dyn PluginInstance>> {
        let config: PassThroughConfig = ctx.config_as()?;
        Ok(Box::new(PassThrough {
            stage: self.stage,
            say: self.stage == HookPoint::Output && config.enable_output_say,
        }))
    }
}

#[derive(Debug)]
struct PassThrough {
    stage: HookPoint,
    say: bool,
}

#[async_trait]
impl PluginInstance for PassThrough {
    async fn on_hook(&self, mut payload: HookPayload) -> anyhow::Result<HookResult> {
        debug!(stage = %self.stage, say = self.say, "Passing message through");
        if self.say {
            let message = payload.message.clone();
            payload.say(message);
        }
        Ok(HookResult::continue_with(payload))
    }
}

/// The built-in workflow: one pass-through plugin per stage, in stage order.
pub fn default_workflow() -> Vec<Arc<dyn Plugin>> {
    HookPoint::STAGES
        .into_iter()
        .map(|stage| Arc::new(PassThroughPlugin::for_stage(stage)) as Arc<dyn Plugin>)
        .collect()
}
