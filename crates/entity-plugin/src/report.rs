//! Aggregated per-plugin results of lifecycle passes.

use crate::error::PluginError;
use crate::registry::LifecycleState;

/// What happened to one plugin during `activate_all`.
#[derive(Debug)]
pub enum ActivationOutcome {
    /// The plugin moved to `Activated`.
    Activated,
    /// The plugin was already active; nothing happened.
    AlreadyActive,
    /// The plugin is in a terminal state and needs a reset first.
    Skipped(LifecycleState),
    /// The plugin moved to `Failed`.
    Failed(PluginError),
}

impl ActivationOutcome {
    /// Returns whether the plugin is active after the pass.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Activated | Self::AlreadyActive)
    }
}

/// Outcome for one plugin, in activation order.
#[derive(Debug)]
pub struct PluginReport {
    /// Plugin identity.
    pub identity: String,
    /// What happened to it.
    pub outcome: ActivationOutcome,
}

/// Result of one `activate_all` pass, listing every plugin in activation order.
#[derive(Debug, Default)]
pub struct ActivationReport {
    /// Per-plugin outcomes.
    pub plugins: Vec<PluginReport>,
}

impl ActivationReport {
    pub(crate) fn push(&mut self, identity: &str, outcome: ActivationOutcome) {
        self.plugins.push(PluginReport {
            identity: identity.to_string(),
            outcome,
        });
    }

    /// Returns the outcome recorded for a plugin.
    pub fn outcome(&self, identity: &str) -> Option<&ActivationOutcome> {
        self.plugins
            .iter()
            .find(|p| p.identity == identity)
            .map(|p| &p.outcome)
    }

    /// Identities of plugins active after the pass, in activation order.
    pub fn active(&self) -> Vec<&str> {
        self.plugins
            .iter()
            .filter(|p| p.outcome.is_active())
            .map(|p| p.identity.as_str())
            .collect()
    }

    /// Failures recorded during the pass, in activation order.
    pub fn failures(&self) -> impl Iterator<Item = &PluginError> {
        self.plugins.iter().filter_map(|p| match &p.outcome {
            ActivationOutcome::Failed(err) => Some(err),
            _ => None,
        })
    }

    /// Returns whether every plugin is active.
    pub fn is_complete(&self) -> bool {
        self.plugins.iter().all(|p| p.outcome.is_active())
    }
}

/// Result of `deactivate_all`.
#[derive(Debug, Default)]
pub struct DeactivationReport {
    /// Plugins moved to `Deactivated`, in teardown (reverse activation) order.
    pub deactivated: Vec<String>,
    /// Teardown failures. The failing plugins are still deactivated.
    pub failures: Vec<PluginError>,
}

impl DeactivationReport {
    /// Returns whether every teardown succeeded.
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Result of `health_check_all`.
#[derive(Debug, Default)]
pub struct HealthReport {
    /// Plugins that passed and are still active, in activation order.
    pub healthy: Vec<String>,
    /// Health check failures and the dependency failures they caused.
    pub failures: Vec<PluginError>,
}

impl HealthReport {
    /// Returns whether every active plugin passed.
    pub fn is_healthy(&self) -> bool {
        self.failures.is_empty()
    }
}
