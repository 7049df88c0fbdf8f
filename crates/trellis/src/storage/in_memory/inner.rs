//! Core in-memory storage data structures and closure arithmetic.
//!
//! This module contains the inner storage structure that holds all data
//! and is wrapped in `Arc<Mutex<>>` for thread safety.

use crate::domain::{ClosureEntry, Edge, Requirement, RequirementId, ScopeId};
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use petgraph::Direction;
use petgraph::algo;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use std::collections::HashMap;

/// Weight stored on every direct edge.
#[derive(Debug, Clone)]
pub(super) struct EdgeMeta {
    pub(super) scope: ScopeId,
    pub(super) created_at: DateTime<Utc>,
}

/// Closure rows keyed by one endpoint: `from -> (to -> depth)`.
type ClosureIndex = HashMap<RequirementId, HashMap<RequirementId, usize>>;

/// Inner storage structure (not thread-safe).
///
/// # Invariants
///
/// - `down[a][d] == up[d][a]` for every stored closure row
/// - every stored depth is >= 1 and is the length of a shortest path in `graph`
/// - `graph` is acyclic
pub(crate) struct InMemoryStorageInner {
    /// Requirement catalog indexed by ID
    pub(super) requirements: HashMap<RequirementId, Requirement>,

    /// Direct edges, directed ancestor -> descendant.
    pub(super) graph: DiGraph<RequirementId, EdgeMeta>,

    /// Mapping from RequirementId to graph NodeIndex.
    ///
    /// Nodes are added on first use and never removed, so indices stay stable.
    pub(super) node_map: HashMap<RequirementId, NodeIndex>,

    /// ancestor -> descendant -> depth
    down: ClosureIndex,

    /// descendant -> ancestor -> depth
    up: ClosureIndex,
}

impl InMemoryStorageInner {
    /// Create a new empty storage instance
    pub(crate) fn new() -> Self {
        Self {
            requirements: HashMap::new(),
            graph: DiGraph::new(),
            node_map: HashMap::new(),
            down: HashMap::new(),
            up: HashMap::new(),
        }
    }

    fn node(&mut self, id: &RequirementId) -> NodeIndex {
        if let Some(&node) = self.node_map.get(id) {
            return node;
        }
        let node = self.graph.add_node(id.clone());
        self.node_map.insert(id.clone(), node);
        node
    }

    pub(super) fn closure_depth(&self, from: &RequirementId, to: &RequirementId) -> Option<usize> {
        self.down.get(from).and_then(|m| m.get(to)).copied()
    }

    /// Upsert a closure row keeping the minimum depth. Returns true if the row is new.
    fn upsert_closure(&mut self, from: &RequirementId, to: &RequirementId, depth: usize) -> bool {
        let is_new = match self.closure_depth(from, to) {
            Some(existing) if existing <= depth => return false,
            Some(_) => false,
            None => true,
        };
        self.down
            .entry(from.clone())
            .or_default()
            .insert(to.clone(), depth);
        self.up
            .entry(to.clone())
            .or_default()
            .insert(from.clone(), depth);
        is_new
    }

    fn remove_closure(&mut self, from: &RequirementId, to: &RequirementId) -> bool {
        let removed = self
            .down
            .get_mut(from)
            .and_then(|m| m.remove(to))
            .is_some();
        if let Some(m) = self.up.get_mut(to) {
            m.remove(from);
        }
        removed
    }

    /// `id` and all its ancestors with their distance (`id` itself at 0).
    fn ancestors_with_self(&self, id: &RequirementId) -> Vec<(RequirementId, usize)> {
        let mut result = vec![(id.clone(), 0)];
        if let Some(m) = self.up.get(id) {
            result.extend(m.iter().map(|(k, v)| (k.clone(), *v)));
        }
        result
    }

    /// `id` and all its descendants with their distance (`id` itself at 0).
    fn descendants_with_self(&self, id: &RequirementId) -> Vec<(RequirementId, usize)> {
        let mut result = vec![(id.clone(), 0)];
        if let Some(m) = self.down.get(id) {
            result.extend(m.iter().map(|(k, v)| (k.clone(), *v)));
        }
        result
    }

    pub(super) fn has_edge(&self, ancestor: &RequirementId, descendant: &RequirementId) -> bool {
        match (self.node_map.get(ancestor), self.node_map.get(descendant)) {
            (Some(&a), Some(&d)) => self.graph.find_edge(a, d).is_some(),
            _ => false,
        }
    }

    pub(super) fn has_path(&self, from: &RequirementId, to: &RequirementId) -> bool {
        self.closure_depth(from, to).is_some()
    }

    /// Reject edges that already exist or that would close a loop.
    fn check_insertable(&self, ancestor: &RequirementId, descendant: &RequirementId) -> Result<()> {
        if ancestor == descendant || self.has_path(descendant, ancestor) {
            return Err(Error::Cycle {
                ancestor: ancestor.clone(),
                descendant: descendant.clone(),
            });
        }
        if self.has_edge(ancestor, descendant) {
            return Err(Error::Duplicate {
                ancestor: ancestor.clone(),
                descendant: descendant.clone(),
            });
        }
        Ok(())
    }

    pub(super) fn insert_edge(
        &mut self,
        scope: &ScopeId,
        ancestor: &RequirementId,
        descendant: &RequirementId,
    ) -> Result<usize> {
        self.check_insertable(ancestor, descendant)?;
        Ok(self.apply_insert(scope, ancestor, descendant))
    }

    /// Insert an edge that is known to be valid and extend the closure.
    fn apply_insert(
        &mut self,
        scope: &ScopeId,
        ancestor: &RequirementId,
        descendant: &RequirementId,
    ) -> usize {
        let a = self.node(ancestor);
        let d = self.node(descendant);
        self.graph.add_edge(
            a,
            d,
            EdgeMeta {
                scope: scope.clone(),
                created_at: Utc::now(),
            },
        );

        let uppers = self.ancestors_with_self(ancestor);
        let lowers = self.descendants_with_self(descendant);

        let mut created = 0;
        for (x, dx) in &uppers {
            for (y, dy) in &lowers {
                if self.upsert_closure(x, y, dx + dy + 1) {
                    created += 1;
                }
            }
        }

        tracing::debug!(
            %ancestor,
            %descendant,
            ancestors = uppers.len(),
            descendants = lowers.len(),
            created,
            "Extended closure"
        );
        created
    }

    pub(super) fn delete_edge(
        &mut self,
        ancestor: &RequirementId,
        descendant: &RequirementId,
    ) -> Result<usize> {
        if !self.has_edge(ancestor, descendant) {
            return Err(Error::RelationshipNotFound {
                ancestor: ancestor.clone(),
                descendant: descendant.clone(),
            });
        }
        Ok(self.apply_delete(ancestor, descendant))
    }

    /// Remove an edge that is known to exist and repair the closure.
    fn apply_delete(&mut self, ancestor: &RequirementId, descendant: &RequirementId) -> usize {
        // Only pairs in ancestors*(a) x descendants*(d) can have routed through a -> d
        let uppers = self.ancestors_with_self(ancestor);
        let lowers = self.descendants_with_self(descendant);

        let a = self.node_map[ancestor];
        let d = self.node_map[descendant];
        if let Some(edge) = self.graph.find_edge(a, d) {
            self.graph.remove_edge(edge);
        }

        let mut removed = 0usize;
        for (x, _) in &uppers {
            for (y, _) in &lowers {
                if x != y && self.remove_closure(x, y) {
                    removed += 1;
                }
            }
        }

        // Re-derive the affected pairs from the remaining edges
        let mut reinstated = 0usize;
        for (x, _) in &uppers {
            let start = self.node_map[x];
            let distances = algo::dijkstra(&self.graph, start, None, |_| 1usize);
            for (y, _) in &lowers {
                if x == y {
                    continue;
                }
                let reached = distances.get(&self.node_map[y]).copied();
                if let Some(depth) = reached
                    && self.upsert_closure(x, y, depth)
                {
                    reinstated += 1;
                }
            }
        }

        let net = removed - reinstated;
        tracing::debug!(%ancestor, %descendant, removed, reinstated, "Repaired closure");
        net
    }

    pub(super) fn move_edge(
        &mut self,
        scope: &ScopeId,
        old_ancestor: Option<&RequirementId>,
        new_ancestor: &RequirementId,
        descendant: &RequirementId,
    ) -> Result<(usize, usize)> {
        // Validate both halves before touching anything
        if let Some(old) = old_ancestor
            && !self.has_edge(old, descendant)
        {
            return Err(Error::RelationshipNotFound {
                ancestor: old.clone(),
                descendant: descendant.clone(),
            });
        }
        self.check_insertable(new_ancestor, descendant)?;

        let deleted = match old_ancestor {
            Some(old) => self.apply_delete(old, descendant),
            None => 0,
        };
        let created = self.apply_insert(scope, new_ancestor, descendant);
        Ok((deleted, created))
    }

    pub(super) fn direct_parents(&self, id: &RequirementId) -> Vec<RequirementId> {
        let Some(&node) = self.node_map.get(id) else {
            return Vec::new();
        };
        let mut parents: Vec<RequirementId> = self
            .graph
            .edges_directed(node, Direction::Incoming)
            .map(|edge| self.graph[edge.source()].clone())
            .collect();
        parents.sort();
        parents
    }

    fn list_closure(
        index: &ClosureIndex,
        id: &RequirementId,
        max_depth: Option<usize>,
    ) -> Vec<ClosureEntry> {
        let mut entries: Vec<ClosureEntry> = index
            .get(id)
            .into_iter()
            .flat_map(|m| m.iter())
            .filter(|(_, depth)| max_depth.is_none_or(|max| **depth <= max))
            .map(|(other, depth)| ClosureEntry {
                requirement_id: other.clone(),
                depth: *depth,
            })
            .collect();
        entries.sort_by(|a, b| {
            a.depth
                .cmp(&b.depth)
                .then_with(|| a.requirement_id.cmp(&b.requirement_id))
        });
        entries
    }

    pub(super) fn list_ancestors(
        &self,
        id: &RequirementId,
        max_depth: Option<usize>,
    ) -> Vec<ClosureEntry> {
        Self::list_closure(&self.up, id, max_depth)
    }

    pub(super) fn list_descendants(
        &self,
        id: &RequirementId,
        max_depth: Option<usize>,
    ) -> Vec<ClosureEntry> {
        Self::list_closure(&self.down, id, max_depth)
    }

    pub(super) fn scope_edges(&self, scope: &ScopeId) -> Vec<Edge> {
        let mut edges: Vec<Edge> = self
            .graph
            .edge_references()
            .filter(|edge| &edge.weight().scope == scope)
            .map(|edge| Edge {
                scope: edge.weight().scope.clone(),
                ancestor: self.graph[edge.source()].clone(),
                descendant: self.graph[edge.target()].clone(),
                created_at: edge.weight().created_at,
            })
            .collect();
        edges.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.ancestor.cmp(&b.ancestor))
                .then_with(|| a.descendant.cmp(&b.descendant))
        });
        edges
    }

    /// Whether the requirement is an endpoint of any direct edge.
    pub(super) fn is_linked(&self, id: &RequirementId) -> bool {
        self.node_map.get(id).is_some_and(|&node| {
            self.graph
                .edges_directed(node, Direction::Incoming)
                .next()
                .is_some()
                || self
                    .graph
                    .edges_directed(node, Direction::Outgoing)
                    .next()
                    .is_some()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> RequirementId {
        RequirementId::new(s)
    }

    fn scope() -> ScopeId {
        ScopeId::new("proj")
    }

    #[test]
    fn test_insert_counts_new_rows_only() {
        let mut inner = InMemoryStorageInner::new();
        assert_eq!(inner.insert_edge(&scope(), &id("A"), &id("B")).unwrap(), 1);
        // B -> C adds (B,C) and (A,C)
        assert_eq!(inner.insert_edge(&scope(), &id("B"), &id("C")).unwrap(), 2);
        // A -> C is a shortcut: (A,C) already exists, only its depth shrinks
        assert_eq!(inner.insert_edge(&scope(), &id("A"), &id("C")).unwrap(), 0);
        assert_eq!(inner.closure_depth(&id("A"), &id("C")), Some(1));
    }

    #[test]
    fn test_indexes_stay_mirrored() {
        let mut inner = InMemoryStorageInner::new();
        inner.insert_edge(&scope(), &id("A"), &id("B")).unwrap();
        inner.insert_edge(&scope(), &id("B"), &id("C")).unwrap();
        inner.delete_edge(&id("A"), &id("B")).unwrap();

        for (from, tos) in &inner.down {
            for (to, depth) in tos {
                assert_eq!(inner.up[to].get(from), Some(depth));
            }
        }
        assert!(inner.has_path(&id("B"), &id("C")));
        assert!(!inner.has_path(&id("A"), &id("C")));
    }

    #[test]
    fn test_delete_reinstates_longer_alternate_path() {
        let mut inner = InMemoryStorageInner::new();
        inner.insert_edge(&scope(), &id("A"), &id("B")).unwrap();
        inner.insert_edge(&scope(), &id("A"), &id("X")).unwrap();
        inner.insert_edge(&scope(), &id("X"), &id("B")).unwrap();

        assert_eq!(inner.closure_depth(&id("A"), &id("B")), Some(1));
        let net = inner.delete_edge(&id("A"), &id("B")).unwrap();
        assert_eq!(net, 0);
        assert_eq!(inner.closure_depth(&id("A"), &id("B")), Some(2));
    }

    #[test]
    fn test_move_validates_before_mutating() {
        let mut inner = InMemoryStorageInner::new();
        inner.insert_edge(&scope(), &id("A"), &id("B")).unwrap();
        inner.insert_edge(&scope(), &id("B"), &id("C")).unwrap();

        // Moving B under its own child must fail and leave A -> B intact
        let err = inner
            .move_edge(&scope(), Some(&id("A")), &id("C"), &id("B"))
            .unwrap_err();
        assert!(matches!(err, Error::Cycle { .. }));
        assert!(inner.has_edge(&id("A"), &id("B")));
    }
}
