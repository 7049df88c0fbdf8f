//! MCP server for the trellis requirement relationship graph.
//!
//! This crate provides an MCP (Model Context Protocol) server that exposes
//! the trellis relationship API to AI assistants.
//!
//! # Architecture
//!
//! The server uses the `rmcp` crate for MCP protocol handling. Each tool
//! resolves a workspace, locks its storage and calls the matching handler in
//! [`trellis::api`], so the MCP surface returns the same JSON bodies and
//! status codes as every other frontend.
//!
//! # Tools
//!
//! ## Context Management
//! - `set_context` - Set the workspace root for all operations
//! - `where_am_i` - Show current workspace context
//!
//! ## Queries
//! - `relationships_get` - Ancestors, descendants or a project tree
//!
//! ## Mutations
//! - `relationship_create` - Link two requirements
//! - `relationship_delete` - Remove a direct link
//! - `relationship_move` - Re-parent a requirement atomically
//! - `requirement_register` - Add or update a catalog entry

pub mod context;
pub mod error;
pub mod models;
pub mod server;
pub mod tools;

pub use error::{Error, Result};
pub use server::TrellisMcpServer;
