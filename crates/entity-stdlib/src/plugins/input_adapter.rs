//! Converts external input into the workflow message.

use async_trait::async_trait;
use entity_plugin::prelude::*;
use serde_json::Value;
use tracing::debug;

use crate::STDLIB_VERSION;
use crate::config::{self, InputAdapterConfig};

/// Key holding the raw external input in the payload data.
pub const RAW_INPUT_KEY: &str = "raw_input";

/// Input stage adapter.
///
/// Reads `raw_input` from the payload data (falling back to the current
/// message), normalizes it and stores it as the message.
#[derive(Debug)]
pub struct InputAdapterPlugin {
    descriptor: PluginDescriptor,
}

impl InputAdapterPlugin {
    /// Registry identity.
    pub const IDENTITY: &'static str = "input-adapter";

    /// Creates the adapter with its config schema.
    pub fn new() -> Self {
        Self {
            descriptor: PluginDescriptor::new(Self::IDENTITY, STDLIB_VERSION)
                .with_description("Convert external input into workflow messages")
                .with_capability("adapter:input")
                .with_hook(HookPoint::Input)
                .with_schema(InputAdapterConfig::schema()),
        }
    }
}

impl Default for InputAdapterPlugin {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Plugin for InputAdapterPlugin {
    fn descriptor(&self) -> &PluginDescriptor {
        &self.descriptor
    }

    fn validate_config(&self, config: &Value) -> Result<(), ConfigViolation> {
        config::parse::<InputAdapterConfig>(config).map(|_| ())
    }

    async fn activate(&self, ctx: ActivationContext) -> anyhow::Result<Box<dyn PluginInstance>> {
        let config: InputAdapterConfig = ctx.config_as()?;
        Ok(Box::new(InputAdapter { config }))
    }
}

#[derive(Debug)]
struct InputAdapter {
    config: InputAdapterConfig,
}

impl InputAdapter {
    fn normalize(&self, raw: &str) -> String {
        let text = if self.config.trim { raw.trim() } else { raw };
        match self.config.max_length {
            Some(max) if text.chars().count() > max => text.chars().take(max).collect(),
            _ => text.to_string(),
        }
    }
}

#[async_trait]
impl PluginInstance for InputAdapter {
    async fn on_hook(&self, mut payload: HookPayload) -> anyhow::Result<HookResult> {
        let raw = match payload.get_data(RAW_INPUT_KEY) {
            Some(Value::String(raw)) => raw.clone(),
            Some(Value::Null) | None => payload.message.clone(),
            Some(other) => other.to_string(),
        };

        payload.message = self.normalize(&raw);
        debug!(chars = payload.message.chars().count(), "Input adapted");
        Ok(HookResult::continue_with(payload))
    }
}
