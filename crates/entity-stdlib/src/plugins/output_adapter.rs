//! Converts the workflow result into an external representation.

use async_trait::async_trait;
use entity_plugin::prelude::*;
use serde_json::{Value, json};
use tracing::debug;

use crate::STDLIB_VERSION;
use crate::config::{self, OutputAdapterConfig, OutputFormat};

/// Key the rendered output is stored under.
pub const OUTPUT_KEY: &str = "output";

/// Output stage adapter.
#[derive(Debug)]
pub struct OutputAdapterPlugin {
    descriptor: PluginDescriptor,
}

impl OutputAdapterPlugin {
    /// Registry identity.
    pub const IDENTITY: &'static str = "output-adapter";

    /// Creates the adapter with its config schema.
    pub fn new() -> Self {
        Self {
            descriptor: PluginDescriptor::new(Self::IDENTITY, STDLIB_VERSION)
                .with_description("Convert workflow responses into external representations")
                .with_capability("adapter:output")
                .with_hook(HookPoint::Output)
                .with_schema(OutputAdapterConfig::schema()),
        }
    }
}

impl Default for OutputAdapterPlugin {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Plugin for OutputAdapterPlugin {
    fn descriptor(&self) -> &PluginDescriptor {
        &self.descriptor
    }

    fn validate_config(&self, config: &Value) -> Result<(), ConfigViolation> {
        config::parse::<OutputAdapterConfig>(config).map(|_| ())
    }

    async fn activate(&self, ctx: ActivationContext) -> anyhow::Result<Box<dyn PluginInstance>> {
        let config: OutputAdapterConfig = ctx.config_as()?;
        Ok(Box::new(OutputAdapter { config }))
    }
}

#[derive(Debug)]
struct OutputAdapter {
    config: OutputAdapterConfig,
}

impl OutputAdapter {
    fn render(&self, payload: &HookPayload) -> anyhow::Result<String> {
        match self.config.format {
            OutputFormat::Text => Ok(payload.message.clone()),
            OutputFormat::Json => {
                let document = json!({
                    "dispatch_id": payload.dispatch_id,
                    "message": payload.message,
                    "responses": payload.responses,
                });
                Ok(serde_json::to_string(&document)?)
            }
        }
    }
}

#[async_trait]
impl PluginInstance for OutputAdapter {
    async fn on_hook(&self, mut payload: HookPayload) -> anyhow::Result<HookResult> {
        let rendered = self.render(&payload)?;
        debug!(format = ?self.config.format, bytes = rendered.len(), "Output rendered");

        if self.config.say {
            payload.say(rendered.clone());
        }
        payload.insert(OUTPUT_KEY, Value::String(rendered));
        Ok(HookResult::continue_with(payload))
    }
}
