//! Error type for the plugin runtime.
//!
//! Structural errors (`DuplicateIdentity`, `InvalidDescriptor`,
//! `CycleDetected`, `MissingDependency`) are returned directly to the caller.
//! Per-plugin errors are collected into the lifecycle reports or into
//! fan-out slots instead of aborting unrelated plugins.

use entity_core::error::{AppError, ErrorKind};
use semver::VersionReq;
use thiserror::Error;

use crate::hooks::definitions::HookPoint;
use crate::schema::ConfigViolation;

/// Errors raised by the registry, resolver, lifecycle manager and dispatcher.
#[derive(Debug, Error)]
pub enum PluginError {
    /// A plugin with the same identity is already registered.
    #[error("plugin '{identity}' is already registered")]
    DuplicateIdentity {
        /// The conflicting identity.
        identity: String,
    },

    /// The descriptor breaks a structural invariant.
    #[error("invalid descriptor for plugin '{identity}': {reason}")]
    InvalidDescriptor {
        /// Identity carried by the descriptor.
        identity: String,
        /// What is wrong with it.
        reason: String,
    },

    /// No plugin with this identity is registered.
    #[error("plugin '{identity}' is not registered")]
    NotRegistered {
        /// The unknown identity.
        identity: String,
    },

    /// The dependency graph contains a cycle.
    #[error("dependency cycle detected: {}", format_cycle(.cycle))]
    CycleDetected {
        /// Members of the cycle, each depending on the next.
        cycle: Vec<String>,
    },

    /// A declared dependency is absent or its version does not satisfy the range.
    #[error("plugin '{dependent}' requires '{identity}' {range}, which is not available")]
    MissingDependency {
        /// The plugin declaring the dependency.
        dependent: String,
        /// The required identity.
        identity: String,
        /// The required version range.
        range: VersionReq,
    },

    /// The plugin configuration does not satisfy its schema.
    #[error("invalid configuration for plugin '{identity}': {violation}")]
    InvalidConfig {
        /// The plugin being configured.
        identity: String,
        /// The violated rule.
        violation: ConfigViolation,
    },

    /// A dependency did not reach the `Activated` state.
    #[error("plugin '{identity}' cannot activate: dependency '{dependency}' is not active")]
    DependencyFailed {
        /// The plugin that was not activated.
        identity: String,
        /// The dependency that failed or was skipped.
        dependency: String,
    },

    /// The plugin's activation function failed, panicked or timed out.
    #[error("plugin '{identity}' failed to activate: {source}")]
    ActivationFailed {
        /// The failing plugin.
        identity: String,
        /// Underlying cause.
        #[source]
        source: anyhow::Error,
    },

    /// A hook invocation failed, panicked, timed out or was cancelled.
    #[error("hook '{hook}' failed in plugin '{identity}': {source}")]
    HookFailed {
        /// The failing plugin.
        identity: String,
        /// The hook being dispatched.
        hook: HookPoint,
        /// Underlying cause.
        #[source]
        source: anyhow::Error,
    },

    /// An active plugin reported itself unhealthy.
    #[error("plugin '{identity}' failed its health check: {source}")]
    HealthCheckFailed {
        /// The unhealthy plugin.
        identity: String,
        /// Underlying cause.
        #[source]
        source: anyhow::Error,
    },

    /// The plugin's teardown function failed, panicked or timed out.
    #[error("plugin '{identity}' teardown failed: {source}")]
    TeardownFailed {
        /// The failing plugin.
        identity: String,
        /// Underlying cause.
        #[source]
        source: anyhow::Error,
    },

    /// The operation is illegal while the plugin is activated.
    #[error("plugin '{identity}' is active; deactivate it first")]
    PluginActive {
        /// The active plugin.
        identity: String,
    },
}

impl PluginError {
    /// Identity of the plugin the error is about, if it concerns a single plugin.
    pub fn identity(&self) -> Option<&str> {
        match self {
            Self::DuplicateIdentity { identity }
            | Self::InvalidDescriptor { identity, .. }
            | Self::NotRegistered { identity }
            | Self::InvalidConfig { identity, .. }
            | Self::DependencyFailed { identity, .. }
            | Self::ActivationFailed { identity, .. }
            | Self::HookFailed { identity, .. }
            | Self::HealthCheckFailed { identity, .. }
            | Self::TeardownFailed { identity, .. }
            | Self::PluginActive { identity } => Some(identity),
            Self::MissingDependency { dependent, .. } => Some(dependent),
            Self::CycleDetected { .. } => None,
        }
    }

    /// Whether this error aborts a whole activation pass.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            Self::DuplicateIdentity { .. }
                | Self::InvalidDescriptor { .. }
                | Self::CycleDetected { .. }
                | Self::MissingDependency { .. }
        )
    }
}

fn format_cycle(cycle: &[String]) -> String {
    match cycle.first() {
        Some(first) => format!("{} -> {}", cycle.join(" -> "), first),
        None => String::new(),
    }
}

impl From<PluginError> for AppError {
    fn from(err: PluginError) -> Self {
        let kind = match &err {
            PluginError::NotRegistered { .. } => ErrorKind::NotFound,
            PluginError::DuplicateIdentity { .. } | PluginError::PluginActive { .. } => {
                ErrorKind::Conflict
            }
            PluginError::InvalidDescriptor { .. }
            | PluginError::InvalidConfig { .. }
            | PluginError::CycleDetected { .. }
            | PluginError::MissingDependency { .. } => ErrorKind::Validation,
            _ => ErrorKind::Plugin,
        };
        AppError::with_source(kind, err.to_string(), err)
    }
}
