//! Trellis - requirement traceability over a closure-table graph.
//!
//! Requirements are linked into parent/child hierarchies per project. Every
//! direct edge is stored together with its transitive closure so ancestor and
//! descendant queries are single lookups. This crate provides the storage
//! backends, the validating services on top of them, the tree read model and
//! the drag-and-drop reconciler used by interactive clients, plus a CLI.

#![forbid(unsafe_code)]

// Public modules for library usage
pub mod api;
pub mod domain;
pub mod drag;
pub mod error;
pub mod flatten;
pub mod query;
pub mod service;
pub mod storage;

// Public CLI module (needed by binary)
pub mod cli;

// Command implementations
pub mod commands;

// Application context and output formatting for the CLI
pub mod app;
pub mod output;
