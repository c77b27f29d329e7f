//! swapline-core: Shared types, errors, and configuration
//!
//! This crate provides the foundational types used across the Swapline workspace.

pub mod config;
pub mod deployment;
pub mod errors;
pub mod types;

pub use config::*;
pub use deployment::*;
pub use errors::*;
pub use types::*;
