//! Shared types and error hierarchy for Switchyard.

pub mod error;
pub mod tool;

pub use error::{ConfigError, RankError};
pub use tool::ToolDescriptor;
