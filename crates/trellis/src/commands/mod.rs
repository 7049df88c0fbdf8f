//! Workspace-level commands.

pub mod init;
