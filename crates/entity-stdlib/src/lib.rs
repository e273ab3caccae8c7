//! # entity-stdlib
//!
//! The standard plugins that ship with the Entity framework:
//!
//! - [`PassThroughPlugin`]: one per workflow stage, returns the message
//!   unchanged; [`default_workflow`] builds the full set
//! - [`InputAdapterPlugin`] / [`OutputAdapterPlugin`]: convert between
//!   external representations and workflow messages
//! - [`PromptPlugin`]: builds reasoning and review prompts; needs an `llm` plugin
//! - [`ToolPlugin`]: executes named [`Tool`]s requested in the `do` stage

pub mod config;
pub mod plugins;

use semver::Version;

pub use config::{
    InputAdapterConfig, OutputAdapterConfig, OutputFormat, PassThroughConfig, PromptConfig,
    ToolConfig,
};
pub use plugins::input_adapter::InputAdapterPlugin;
pub use plugins::output_adapter::OutputAdapterPlugin;
pub use plugins::passthrough::{PassThroughPlugin, default_workflow};
pub use plugins::prompt::PromptPlugin;
pub use plugins::tool::{EchoTool, Tool, ToolCall, ToolPlugin};

/// Version carried by every standard plugin descriptor.
pub const STDLIB_VERSION: Version = Version::new(0, 1, 0);
