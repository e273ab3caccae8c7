//! Plugin runtime configuration.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Settings for the plugin lifecycle manager and hook dispatcher.
///
/// Per-plugin option tables live under `settings`, keyed by plugin identity:
///
/// ```toml
/// [plugins.settings.passthrough-output]
/// enable_output_say = false
/// ```
#[derive(Debug, Clone, Validate, Serialize, Deserialize)]
pub struct PluginSystemConfig {
    /// Upper bound for a single hook invocation.
    #[serde(default = "default_hook_timeout_seconds")]
    #[validate(range(min = 1, max = 3600))]
    pub hook_timeout_seconds: u64,

    /// Upper bound for a plugin's activation function.
    #[serde(default = "default_activation_timeout_seconds")]
    #[validate(range(min = 1, max = 600))]
    pub activation_timeout_seconds: u64,

    /// Upper bound for a plugin's teardown function.
    #[serde(default = "default_teardown_timeout_seconds")]
    #[validate(range(min = 1, max = 600))]
    pub teardown_timeout_seconds: u64,

    /// Run fan-out hooks for sibling plugins concurrently.
    #[serde(default)]
    pub concurrent_fan_out: bool,

    /// Plugin identities the host should not register.
    #[serde(default)]
    pub disabled: Vec<String>,

    /// Per-plugin configuration objects, validated against each plugin's schema.
    #[serde(default)]
    pub settings: BTreeMap<String, serde_json::Value>,
}

impl PluginSystemConfig {
    /// Hook timeout as a [`Duration`].
    pub fn hook_timeout(&self) -> Duration {
        Duration::from_secs(self.hook_timeout_seconds)
    }

    /// Activation timeout as a [`Duration`].
    pub fn activation_timeout(&self) -> Duration {
        Duration::from_secs(self.activation_timeout_seconds)
    }

    /// Teardown timeout as a [`Duration`].
    pub fn teardown_timeout(&self) -> Duration {
        Duration::from_secs(self.teardown_timeout_seconds)
    }

    /// Whether the given plugin identity is listed in `disabled`.
    pub fn is_disabled(&self, identity: &str) -> bool {
        self.disabled.iter().any(|d| d == identity)
    }

    /// Configuration object for a plugin, or an empty object.
    pub fn settings_for(&self, identity: &str) -> serde_json::Value {
        self.settings
            .get(identity)
            .cloned()
            .unwrap_or_else(|| serde_json::Value::Object(serde_json::Map::new()))
    }
}

impl Default for PluginSystemConfig {
    fn default() -> Self {
        Self {
            hook_timeout_seconds: default_hook_timeout_seconds(),
            activation_timeout_seconds: default_activation_timeout_seconds(),
            teardown_timeout_seconds: default_teardown_timeout_seconds(),
            concurrent_fan_out: false,
            disabled: Vec::new(),
            settings: BTreeMap::new(),
        }
    }
}

fn default_hook_timeout_seconds() -> u64 {
    30
}

fn default_activation_timeout_seconds() -> u64 {
    60
}

fn default_teardown_timeout_seconds() -> u64 {
    10
}
