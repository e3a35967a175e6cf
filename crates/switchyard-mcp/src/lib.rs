//! Multi-process MCP client, capability catalog and router for Switchyard.
//!
//! Each configured provider is spawned as a child process speaking
//! newline-delimited JSON-RPC 2.0 on stdio, initialized with a handshake, and
//! its tools are merged into one catalog. Calls are routed back to the
//! process that owns the tool.

pub mod catalog;
pub mod config;
pub mod error;
pub mod facade;
pub mod jsonrpc;
pub mod registry;
pub mod session;
mod transport;

pub use catalog::{Catalog, CatalogBuilder};
pub use config::{ProviderDescriptor, ProxyConfig};
pub use error::McpError;
pub use facade::ToolProxy;
pub use registry::{RebuildReport, Registry, ShutdownReport};
pub use session::ProviderSession;
pub use switchyard_types::ToolDescriptor;
