//! Typed configuration for the standard plugins.
//!
//! Each plugin declares a [`ConfigSchema`] in its descriptor (option names,
//! types, defaults) and deserializes the defaults-applied object into one
//! of these structs, whose `validator` rules cover the cross-field checks.

use entity_plugin::schema::{ConfigOption, ConfigSchema, ConfigViolation};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use validator::Validate;

/// Configuration for a pass-through stage plugin.
#[derive(Debug, Clone, Validate, Serialize, Deserialize)]
pub struct PassThroughConfig {
    /// Whether the `output` stage says the message back to the host.
    #[serde(default = "default_true")]
    pub enable_output_say: bool,
}

impl PassThroughConfig {
    /// Schema declared in the pass-through descriptors.
    pub fn schema() -> ConfigSchema {
        ConfigSchema::new().option(
            ConfigOption::boolean("enable_output_say")
                .default_value(true)
                .describe("Say the message when running as the output stage"),
        )
    }
}

/// Configuration for [`InputAdapterPlugin`](crate::InputAdapterPlugin).
#[derive(Debug, Clone, Validate, Serialize, Deserialize)]
pub struct InputAdapterConfig {
    /// Strip leading and trailing whitespace.
    #[serde(default = "default_true")]
    pub trim: bool,

    /// Truncate the message to this many characters.
    #[serde(default)]
    #[validate(range(min = 1, max = 1_000_000))]
    pub max_length: Option<usize>,
}

impl InputAdapterConfig {
    /// Schema declared in the plugin descriptor.
    pub fn schema() -> ConfigSchema {
        ConfigSchema::new()
            .option(ConfigOption::boolean("trim").default_value(true))
            .option(
                ConfigOption::integer("max_length")
                    .min(1.0)
                    .describe("Maximum message length in characters"),
            )
    }
}

/// Rendering used by [`OutputAdapterPlugin`](crate::OutputAdapterPlugin).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// The message as-is.
    #[default]
    Text,
    /// A JSON document with the message and the collected responses.
    Json,
}

/// Configuration for [`OutputAdapterPlugin`](crate::OutputAdapterPlugin).
#[derive(Debug, Clone, Validate, Serialize, Deserialize)]
pub struct OutputAdapterConfig {
    /// How the message is rendered.
    #[serde(default)]
    pub format: OutputFormat,

    /// Say the rendered output back to the host.
    #[serde(default = "default_true")]
    pub say: bool,
}

impl OutputAdapterConfig {
    /// Schema declared in the plugin descriptor.
    pub fn schema() -> ConfigSchema {
        ConfigSchema::new()
            .option(
                ConfigOption::string("format")
                    .default_value("text")
                    .one_of(["text", "json"]),
            )
            .option(ConfigOption::boolean("say").default_value(true))
    }
}

/// Configuration for [`PromptPlugin`](crate::PromptPlugin).
#[derive(Debug, Clone, Validate, Serialize, Deserialize)]
pub struct PromptConfig {
    /// Instructions prepended to the message in the `think` stage.
    #[serde(default = "default_system_prompt")]
    #[validate(length(min = 1, max = 16_384))]
    pub system_prompt: String,

    /// Instructions prepended to the message in the `review` stage.
    #[serde(default = "default_review_prompt")]
    #[validate(length(min = 1, max = 16_384))]
    pub review_prompt: String,
}

impl PromptConfig {
    /// Schema declared in the plugin descriptor.
    pub fn schema() -> ConfigSchema {
        ConfigSchema::new()
            .option(
                ConfigOption::string("system_prompt")
                    .default_value(default_system_prompt())
                    .min_length(1),
            )
            .option(
                ConfigOption::string("review_prompt")
                    .default_value(default_review_prompt())
                    .min_length(1),
            )
    }
}

/// Configuration for [`ToolPlugin`](crate::ToolPlugin).
#[derive(Debug, Clone, Default, Validate, Serialize, Deserialize)]
pub struct ToolConfig {
    /// Tools callable from the workflow. All registered tools when absent.
    #[serde(default)]
    pub allowed_tools: Option<Vec<String>>,
}

impl ToolConfig {
    /// Schema declared in the plugin descriptor.
    pub fn schema() -> ConfigSchema {
        ConfigSchema::new().option(
            ConfigOption::array("allowed_tools").describe("Names of the tools the workflow may call"),
        )
    }

    /// Returns whether the workflow may call the named tool.
    pub fn allows(&self, name: &str) -> bool {
        self.allowed_tools
            .as_ref()
            .is_none_or(|allowed| allowed.iter().any(|t| t == name))
    }
}

fn default_true() -> bool {
    true
}

fn default_system_prompt() -> String {
    "You are a helpful assistant.".to_string()
}

fn default_review_prompt() -> String {
    "Review the answer below for mistakes and omissions.".to_string()
}

/// Deserializes and validates a configuration object.
///
/// Failures are reported against the first offending field, in name order.
pub fn parse<T>(config: &Value) -> Result<T, ConfigViolation>
where
    T: DeserializeOwned + Validate,
{
    let parsed: T = serde_json::from_value(config.clone())
        .map_err(|e| ConfigViolation::new("$", format!("does not deserialize: {e}")))?;

    parsed.validate().map_err(|errors| {
        let mut fields: Vec<_> = errors.field_errors().into_iter().collect();
        fields.sort_by_key(|(field, _)| field.to_string());

        match fields.first() {
            Some((field, errs)) => {
                let rule = errs
                    .first()
                    .map(|e| match &e.message {
                        Some(message) => message.to_string(),
                        None => format!("failed the '{}' check", e.code),
                    })
                    .unwrap_or_else(|| "is invalid".to_string());
                ConfigViolation::new(field.to_string(), rule)
            }
            None => ConfigViolation::new("$", errors.to_string()),
        }
    })?;

    Ok(parsed)
}
