//! Standard plugin implementations.

pub mod input_adapter;
pub mod output_adapter;
pub mod passthrough;
pub mod prompt;
pub mod tool;
