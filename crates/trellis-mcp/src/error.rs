//! Error types for the trellis MCP server.
//!
//! Relationship rejections (cycles, duplicates, unknown ids) are not errors
//! here: the `trellis::api` handlers turn them into non-2xx responses. This
//! enum covers what goes wrong before a handler runs.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while resolving a workspace or serving the protocol.
#[derive(Debug, Error)]
pub enum Error {
    /// A tool was called without `workspace_root` before `set_context`.
    #[error("No workspace context set. Call set_context first.")]
    NoContext,

    /// A tool argument outside its accepted set.
    #[error("Invalid {field}: '{value}'. Valid values: {valid_values}")]
    InvalidArgument {
        /// Offending parameter.
        field: &'static str,
        /// Value as received.
        value: String,
        /// Accepted values.
        valid_values: &'static str,
    },

    /// The path does not exist or cannot be resolved.
    #[error("Workspace not found: {path}")]
    WorkspaceNotFound {
        /// Path as given.
        path: String,
        /// Canonicalization failure.
        #[source]
        source: std::io::Error,
    },

    /// The resolved path is not usable as a workspace root.
    #[error("Invalid workspace path {}: {reason}", path.display())]
    InvalidWorkspacePath {
        /// Canonical path.
        path: PathBuf,
        /// Rule it breaks.
        reason: &'static str,
    },

    /// `workspace_root` names a workspace `set_context` never opened.
    #[error("Workspace not initialized: {0}. Call set_context first.")]
    WorkspaceNotInitialized(String),

    /// No `.trellis/` directory at or above the path.
    #[error("No .trellis directory found in {0} or parent directories")]
    NoTrellisDirectory(String),

    /// `.trellis/config.yaml` is missing or malformed.
    #[error("Failed to load config {path}")]
    ConfigLoad {
        /// Config file path.
        path: String,
        /// Parse or read failure.
        #[source]
        source: trellis::error::Error,
    },

    /// Opening the configured storage backend failed.
    #[error(transparent)]
    Core(#[from] trellis::error::Error),

    /// The stdio session could not start or ended abnormally.
    #[error("MCP transport failed: {0}")]
    Transport(String),
}

/// Result type for trellis MCP operations.
pub type Result<T> = std::result::Result<T, Error>;
