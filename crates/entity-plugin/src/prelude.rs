//! Prelude for convenient imports.

pub use async_trait::async_trait;
pub use semver::{Version, VersionReq};

pub use crate::descriptor::PluginDescriptor;
pub use crate::error::PluginError;
pub use crate::hooks::definitions::{DispatchMode, HookAction, HookPayload, HookPoint, HookResult};
pub use crate::schema::{ConfigOption, ConfigSchema, ConfigViolation};
pub use crate::traits::{ActivationContext, ClosureInstance, Plugin, PluginInstance};

pub use crate::{descriptor, hook_payload};
