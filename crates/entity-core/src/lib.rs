//! # entity-core
//!
//! Core crate for the Entity plugin standard library. Contains the
//! configuration schemas shared by the host harness and the plugin
//! runtime, and the unified error system.
//!
//! This crate has **no** internal dependencies on other workspace crates.

pub mod config;
pub mod error;
pub mod result;

pub use error::AppError;
pub use result::AppResult;
