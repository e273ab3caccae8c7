//! Tool execution for the `do` stage.
//!
//! A workflow requests a tool by putting a `tool_call` object
//! (`{"name": ..., "args": ...}`) into the payload data; the plugin runs it
//! and stores the tool's output under `tool_result`.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use entity_plugin::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::STDLIB_VERSION;
use crate::config::{self, ToolConfig};

/// Key of the requested call in the payload data.
pub const TOOL_CALL_KEY: &str = "tool_call";
/// Key of the tool's output in the payload data.
pub const TOOL_RESULT_KEY: &str = "tool_result";

/// An external action callable from a workflow.
#[async_trait]
pub trait Tool: Send + Sync + std::fmt::Debug {
    /// Name the workflow refers to the tool by.
    fn name(&self) -> &str;

    /// Runs the tool.
    async fn call(&self, args: Value) -> anyhow::Result<Value>;
}

/// A tool invocation requested by the workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub name: String,
    #[serde(default)]
    pub args: Value,
}

/// Returns its arguments unchanged.
#[derive(Debug, Default)]
pub struct EchoTool;

#[async_trait]
impl Tool for EchoTool {
    fn name(&self) -> &str {
        "echo"
    }

    async fn call(&self, args: Value) -> anyhow::Result<Value> {
        Ok(args)
    }
}

/// Plugin that executes registered tools.
#[derive(Debug)]
pub struct ToolPlugin {
    descriptor: PluginDescriptor,
    tools: BTreeMap<String, Arc<dyn Tool>>,
}

impl ToolPlugin {
    /// Registry identity.
    pub const IDENTITY: &'static str = "tool";

    /// Creates the plugin with no tools registered.
    pub fn new() -> Self {
        Self {
            descriptor: PluginDescriptor::new(Self::IDENTITY, STDLIB_VERSION)
                .with_description("Execute external actions")
                .with_capability("tool")
                .with_hook(HookPoint::Do)
                .with_schema(ToolConfig::schema()),
            tools: BTreeMap::new(),
        }
    }

    /// Registers a tool. A tool with the same name is replaced.
    pub fn with_tool(mut self, tool: Arc<dyn Tool>) -> Self {
        self.tools.insert(tool.name().to_string(), tool);
        self
    }

    /// Names of the registered tools, sorted.
    pub fn tool_names(&self) -> Vec<&str> {
        self.tools.keys().map(String::as_str).collect()
    }
}

impl Default for ToolPlugin {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Plugin for ToolPlugin {
    fn descriptor(&self) -> &PluginDescriptor {
        &self.descriptor
    }

    fn validate_config(&self, config: &Value) -> Result<(), ConfigViolation> {
        let parsed: ToolConfig = config::parse(config)?;
        if let Some(unknown) = parsed
            .allowed_tools
            .iter()
            .flatten()
            .find(|name| !self.tools.contains_key(*name))
        {
            return Err(ConfigViolation::new(
                "allowed_tools",
                format!("names unknown tool '{unknown}'"),
            ));
        }
        Ok(())
    }

    async fn activate(&self, ctx: ActivationContext) -> anyhow::Result<Box<dyn PluginInstance>> {
        let config: ToolConfig = ctx.config_as()?;
        let tools: BTreeMap<String, Arc<dyn Tool>> = self
            .tools
            .iter()
            .filter(|(name, _)| config.allows(name))
            .map(|(name, tool)| (name.clone(), Arc::clone(tool)))
            .collect();

        info!(tools = ?tools.keys().collect::<Vec<_>>(), "Tool plugin ready");
        Ok(Box::new(ToolRunner { tools }))
    }
}

#[derive(Debug)]
struct ToolRunner {
    tools: BTreeMap<String, Arc<dyn Tool>>,
}

#[async_trait]
impl PluginInstance for ToolRunner {
    async fn on_hook(&self, mut payload: HookPayload) -> anyhow::Result<HookResult> {
        let Some(request) = payload.get_data(TOOL_CALL_KEY) else {
            return Ok(HookResult::continue_with(payload));
        };
        let call: ToolCall = serde_json::from_value(request.clone())
            .map_err(|e| anyhow::anyhow!("malformed tool call: {e}"))?;

        let tool = self
            .tools
            .get(&call.name)
            .ok_or_else(|| anyhow::anyhow!("tool '{}' is not available", call.name))?;

        debug!(tool = %call.name, "Calling tool");
        let output = tool.call(call.args).await?;
        payload.insert(TOOL_RESULT_KEY, output);
        Ok(HookResult::continue_with(payload))
    }
}
