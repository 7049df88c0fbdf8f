//! Storage abstraction layer for trellis.
//!
//! This module provides the storage traits and the factory for creating
//! storage backends. Two implementations exist:
//!
//! - **In-memory**: Fast, ephemeral storage backed by HashMaps and petgraph
//! - **SQLite**: Durable closure-table storage; every mutation runs in a single
//!   `IMMEDIATE` transaction
//!
//! # Closure maintenance
//!
//! Both backends keep the transitive closure of the direct edges materialized.
//! Each closure row `(ancestor, descendant, depth)` records the length of the
//! shortest path between the two requirements; trivial `depth = 0` self rows
//! exist internally and are never returned.
//!
//! - Inserting `a -> d` upserts `(x, y, dx + dy + 1)` for every ancestor `x` of
//!   `a` (at distance `dx`, `a` itself at 0) and every descendant `y` of `d`
//!   (at distance `dy`), keeping the minimum depth.
//! - Deleting `a -> d` drops every row in `ancestors*(a) x descendants*(d)` and
//!   re-derives those pairs from the remaining edges, so pairs that are still
//!   connected through another path come back with their new minimum depth.
//!
//! # Example
//!
//! ```no_run
//! use trellis::domain::{Requirement, RequirementId, ScopeId};
//! use trellis::storage::{StorageBackend, create_storage};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> anyhow::Result<()> {
//!     let mut storage = create_storage(StorageBackend::InMemory).await?;
//!     storage.put_requirement(Requirement::new("A", "proj", "Parent")).await?;
//!     storage.put_requirement(Requirement::new("B", "proj", "Child")).await?;
//!
//!     let created = storage
//!         .insert_edge(&ScopeId::new("proj"), &RequirementId::new("A"), &RequirementId::new("B"))
//!         .await?;
//!     println!("{created} closure rows created");
//!     Ok(())
//! }
//! ```

use crate::domain::{ClosureEntry, Edge, Requirement, RequirementId, ScopeId, TreeNode};
use crate::error::Result;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

pub mod in_memory;
pub mod sqlite;
mod tree;

pub use tree::build_tree_rows;

/// Durable CRUD over direct edges and their derived closure, scoped by project.
///
/// Implementations must be `Send + Sync` to support concurrent access in async
/// contexts, and must apply each mutation atomically with respect to readers
/// and other writers.
///
/// # Error Handling
///
/// - `Duplicate`: the direct edge already exists (insert)
/// - `RelationshipNotFound`: the direct edge does not exist (delete/move)
/// - `Cycle`: the mutation would close a loop; re-checked inside the same
///   critical section that applies it, so a check made by the caller earlier
///   cannot be invalidated by a concurrent writer
/// - `Persistence`: backend failures
#[async_trait]
pub trait RelationshipStore: Send + Sync {
    // ========== Mutations ==========

    /// Insert the direct edge `ancestor -> descendant` and extend the closure.
    ///
    /// Returns the number of closure rows that did not exist before.
    async fn insert_edge(
        &mut self,
        scope: &ScopeId,
        ancestor: &RequirementId,
        descendant: &RequirementId,
    ) -> Result<usize>;

    /// Delete the direct edge `ancestor -> descendant` and repair the closure.
    ///
    /// Returns the net number of closure rows that disappeared.
    async fn delete_edge(
        &mut self,
        ancestor: &RequirementId,
        descendant: &RequirementId,
    ) -> Result<usize>;

    /// Replace `old_ancestor -> descendant` with `new_ancestor -> descendant`
    /// as one atomic unit. With `old_ancestor = None` this is a plain insert.
    ///
    /// Returns `(rows_deleted, rows_created)`. Nothing changes when either half
    /// fails.
    async fn move_edge(
        &mut self,
        scope: &ScopeId,
        old_ancestor: Option<&RequirementId>,
        new_ancestor: &RequirementId,
        descendant: &RequirementId,
    ) -> Result<(usize, usize)>;

    // ========== Closure Queries ==========

    /// Whether a path of length >= 1 leads from `from` to `to`.
    async fn has_path(&self, from: &RequirementId, to: &RequirementId) -> Result<bool>;

    /// Whether the direct edge `ancestor -> descendant` exists.
    async fn has_edge(&self, ancestor: &RequirementId, descendant: &RequirementId) -> Result<bool>;

    /// Direct parents of a requirement, ordered by id.
    async fn direct_parents(&self, id: &RequirementId) -> Result<Vec<RequirementId>>;

    /// All ancestors with their shortest distance, ascending by depth then id.
    async fn list_ancestors(
        &self,
        id: &RequirementId,
        max_depth: Option<usize>,
    ) -> Result<Vec<ClosureEntry>>;

    /// All descendants with their shortest distance, ascending by depth then id.
    async fn list_descendants(
        &self,
        id: &RequirementId,
        max_depth: Option<usize>,
    ) -> Result<Vec<ClosureEntry>>;

    /// One row per requirement of the scope's graph, in pre-order.
    ///
    /// A requirement with several parents is rendered under the parent on its
    /// smallest path; see [`build_tree_rows`].
    async fn list_tree(&self, scope: &ScopeId) -> Result<Vec<TreeNode>>;

    /// Direct edges of a scope, oldest first.
    async fn list_edges(&self, scope: &ScopeId) -> Result<Vec<Edge>>;
}

/// Lookup of requirement metadata.
///
/// Graph logic only needs to know whether an id exists and which scope it
/// belongs to; everything else is display decoration.
#[async_trait]
pub trait RequirementCatalog: Send + Sync {
    /// Insert or replace a requirement.
    ///
    /// # Errors
    ///
    /// Returns `Error::Validation` when the id is malformed, or when the scope
    /// of a requirement that already takes part in edges would change.
    async fn put_requirement(&mut self, requirement: Requirement) -> Result<()>;

    /// Look up a requirement by id.
    async fn get_requirement(&self, id: &RequirementId) -> Result<Option<Requirement>>;

    /// All requirements of a scope, ordered by id.
    async fn list_requirements(&self, scope: &ScopeId) -> Result<Vec<Requirement>>;
}

/// A backend providing both the relationship store and the requirement catalog.
pub trait TraceStorage: RelationshipStore + RequirementCatalog {}

impl<T: RelationshipStore + RequirementCatalog + ?Sized> TraceStorage for T {}

/// Default time a SQLite writer waits for the database lock.
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// Storage backend configuration.
///
/// Determines which storage implementation to use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageBackend {
    /// In-memory storage (ephemeral)
    InMemory,

    /// SQLite database file (persistent)
    Sqlite {
        /// Database file; created on first use
        path: PathBuf,
        /// Milliseconds to wait for a competing writer before failing
        busy_timeout_ms: u64,
    },
}

impl StorageBackend {
    /// Returns the data file path for file-based backends.
    pub fn data_path(&self) -> Option<&Path> {
        match self {
            StorageBackend::Sqlite { path, .. } => Some(path),
            StorageBackend::InMemory => None,
        }
    }
}

/// Create a storage backend.
///
/// # Errors
///
/// Returns `Error::Persistence` if the SQLite database cannot be opened or its
/// schema cannot be applied.
pub async fn create_storage(backend: StorageBackend) -> Result<Box<dyn TraceStorage>> {
    match backend {
        StorageBackend::InMemory => Ok(in_memory::new_in_memory_storage()),
        StorageBackend::Sqlite {
            path,
            busy_timeout_ms,
        } => {
            tracing::debug!(path = %path.display(), "Opening SQLite relationship store");
            let storage = sqlite::SqliteStorage::open(&path, busy_timeout_ms)?;
            Ok(Box::new(storage))
        }
    }
}
