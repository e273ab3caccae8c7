//! # entity-plugin
//!
//! Plugin lifecycle core for the Entity framework. Provides:
//!
//! - Plugin descriptors with semver dependencies and configuration schemas
//! - Deterministic dependency resolution (topological, ties by identity)
//! - A registry tracking each plugin's lifecycle state
//! - Ordered activation, health checks and reverse-order teardown
//! - Hook dispatch with chain and fan-out semantics
//!
//! Plugin code is isolated: a panicking, failing or hanging plugin is
//! reported as an error for that plugin and never takes the host down.

pub mod descriptor;
pub mod error;
pub mod hooks;
pub mod macros;
pub mod manager;
pub mod prelude;
pub mod registry;
pub mod report;
pub mod resolver;
pub mod schema;
pub mod traits;

mod safety;

#[cfg(test)]
mod testing;

pub use descriptor::PluginDescriptor;
pub use error::PluginError;
pub use hooks::definitions::{DispatchMode, HookAction, HookPayload, HookPoint, HookResult};
pub use hooks::dispatcher::{ChainOutcome, DispatchOutcome, FanOutOutcome, FanOutSlot, HookDispatcher};
pub use manager::LifecycleManager;
pub use registry::{LifecycleState, PluginRegistry, PluginStatus};
pub use report::{ActivationOutcome, ActivationReport, DeactivationReport, HealthReport};
pub use resolver::resolve;
pub use schema::{ConfigOption, ConfigSchema, ConfigViolation};
pub use traits::{ActivationContext, ClosureInstance, Plugin, PluginInstance};
