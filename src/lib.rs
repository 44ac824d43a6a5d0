//! eTabeb MCP server
//!
//! An MCP (Model Context Protocol) server fronting the eTabeb medical booking
//! API. It exposes doctor search, timeslot lookup, and a secure booking widget
//! as MCP tools and resources over HTTP and stdio transports.

pub mod config;
pub mod doctors;
pub mod matching;
pub mod search;
pub mod server;
pub mod session;
pub mod tools;
pub mod transport;
pub mod upstream;
pub mod widget;

pub use config::ServerConfig;
pub use server::McpServer;

/// Crate version, surfaced in `initialize` responses and service info.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Protocol revision echoed back when a client does not request one.
pub const DEFAULT_PROTOCOL_VERSION: &str = "2024-11-05";
