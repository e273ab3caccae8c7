//! Static plugin metadata.

use std::collections::{BTreeMap, BTreeSet};

use semver::{Version, VersionReq};
use serde::{Deserialize, Serialize};

use crate::error::PluginError;
use crate::hooks::definitions::HookPoint;
use crate::schema::ConfigSchema;

/// Identity, version, capabilities, dependencies, configuration schema and
/// implemented hooks of a plugin.
///
/// A descriptor never changes once the plugin is registered.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginDescriptor {
    /// Unique plugin identifier, stable across versions.
    pub identity: String,
    /// Plugin version.
    pub version: Version,
    /// Plugin description.
    #[serde(default)]
    pub description: String,
    /// Capability tags this plugin provides (e.g. `memory`, `tool:search`).
    #[serde(default)]
    pub capabilities: BTreeSet<String>,
    /// Identity → accepted version range of plugins that must be active first.
    #[serde(default)]
    pub dependencies: BTreeMap<String, VersionReq>,
    /// Accepted configuration options.
    #[serde(default)]
    pub config_schema: ConfigSchema,
    /// Hook points the plugin implements. The dispatcher skips the rest.
    #[serde(default)]
    pub hooks: BTreeSet<HookPoint>,
}

impl PluginDescriptor {
    /// Creates a descriptor with no capabilities, dependencies or hooks.
    pub fn new(identity: impl Into<String>, version: Version) -> Self {
        Self {
            identity: identity.into(),
            version,
            description: String::new(),
            capabilities: BTreeSet::new(),
            dependencies: BTreeMap::new(),
            config_schema: ConfigSchema::default(),
            hooks: BTreeSet::new(),
        }
    }

    /// Sets the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Adds a capability tag.
    pub fn with_capability(mut self, tag: impl Into<String>) -> Self {
        self.capabilities.insert(tag.into());
        self
    }

    /// Adds a dependency on another plugin within a version range.
    pub fn with_dependency(mut self, identity: impl Into<String>, range: VersionReq) -> Self {
        self.dependencies.insert(identity.into(), range);
        self
    }

    /// Adds a dependency on any version of another plugin.
    pub fn depends_on(self, identity: impl Into<String>) -> Self {
        self.with_dependency(identity, VersionReq::STAR)
    }

    /// Declares an implemented hook point.
    pub fn with_hook(mut self, hook: HookPoint) -> Self {
        self.hooks.insert(hook);
        self
    }

    /// Declares several implemented hook points.
    pub fn with_hooks(mut self, hooks: impl IntoIterator<Item = HookPoint>) -> Self {
        self.hooks.extend(hooks);
        self
    }

    /// Sets the configuration schema.
    pub fn with_schema(mut self, schema: ConfigSchema) -> Self {
        self.config_schema = schema;
        self
    }

    /// Returns whether the plugin provides a capability tag.
    pub fn provides(&self, tag: &str) -> bool {
        self.capabilities.contains(tag)
    }

    /// Returns whether the plugin implements a hook point.
    pub fn supports(&self, hook: HookPoint) -> bool {
        self.hooks.contains(&hook)
    }

    /// Checks the structural invariants: non-empty identity, no self-dependency.
    pub fn validate(&self) -> Result<(), PluginError> {
        if self.identity.trim().is_empty() {
            return Err(PluginError::InvalidDescriptor {
                identity: self.identity.clone(),
                reason: "identity must not be empty".to_string(),
            });
        }
        if self.dependencies.contains_key(&self.identity) {
            return Err(PluginError::InvalidDescriptor {
                identity: self.identity.clone(),
                reason: "a plugin cannot depend on itself".to_string(),
            });
        }
        Ok(())
    }
}
