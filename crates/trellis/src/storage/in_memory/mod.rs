//! In-memory storage backend using HashMap and petgraph.
//!
//! This module provides a fast, **ephemeral** storage implementation where all data
//! is held in RAM and **lost when the process exits**. It is suitable for:
//!
//! - Testing and development
//! - Short-lived CLI sessions
//! - Client-side closure snapshots
//!
//! # Architecture
//!
//! The implementation uses:
//! - `HashMap<RequirementId, Requirement>` for the requirement catalog
//! - `petgraph::DiGraph` holding the direct edges (edge weight: scope + creation time)
//! - `HashMap<RequirementId, NodeIndex>` for mapping requirements to graph nodes
//! - Two mirrored closure indexes (`ancestor -> descendant -> depth` and the
//!   reverse) so both directions are answered without scanning
//!
//! ## Edge Direction Convention
//!
//! Graph edges point from **ancestor to descendant** (parent -> child). The
//! closure maps never contain depth-0 self rows; the closure arithmetic treats
//! every node as its own ancestor/descendant at distance 0 instead.
//!
//! # Thread Safety
//!
//! The storage is wrapped in `Arc<Mutex<InMemoryStorageInner>>`. Every operation
//! holds the lock for its whole duration, so a mutation (validation, edge change
//! and closure repair) is never interleaved with another reader or writer.
//!
//! # Performance Characteristics
//!
//! - Insert edge: O(|ancestors(a)| x |descendants(d)|)
//! - Delete edge: O(|ancestors(a)| x (V + E) log V) for the scoped re-derivation
//! - `has_path`: O(1)
//! - Ancestor/descendant listing: O(k log k) for k results

mod inner;
mod trait_impl;

use crate::storage::TraceStorage;
use inner::InMemoryStorageInner;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Thread-safe in-memory storage.
///
/// This type alias wraps the inner storage in `Arc<Mutex<>>` for thread-safe
/// async access. It implements the storage traits via `trait_impl.rs`.
pub(crate) type InMemoryStorage = Arc<Mutex<InMemoryStorageInner>>;

/// Create a new in-memory storage instance.
///
/// # Example
///
/// ```
/// use trellis::storage::in_memory::new_in_memory_storage;
///
/// #[tokio::main(flavor = "current_thread")]
/// async fn main() {
///     let storage = new_in_memory_storage();
///     // Use storage...
/// }
/// ```
pub fn new_in_memory_storage() -> Box<dyn TraceStorage> {
    Box::new(Arc::new(Mutex::new(InMemoryStorageInner::new())))
}
