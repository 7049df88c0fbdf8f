//! Read-side projections over the relationship store.

use crate::domain::{
    ClosureEntry, Edge, PATH_SEPARATOR, RelatedRequirement, Requirement, RequirementId, ScopeId,
    TreeNode, sort_tree_nodes,
};
use crate::error::{Error, Result};
use crate::storage::TraceStorage;
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};

/// Ancestor, descendant and tree queries decorated for display.
pub struct TreeQueryService<'a, S: TraceStorage + ?Sized> {
    storage: &'a S,
}

impl<'a, S: TraceStorage + ?Sized> TreeQueryService<'a, S> {
    /// Wrap a storage backend.
    pub fn new(storage: &'a S) -> Self {
        Self { storage }
    }

    /// Ancestors of `id`, nearest first, tagged `direct_parent` at depth 1.
    ///
    /// # Errors
    ///
    /// Returns `RequirementNotFound` if the catalog does not know `id`.
    pub async fn get_ancestors(
        &self,
        id: &RequirementId,
        max_depth: Option<usize>,
    ) -> Result<Vec<RelatedRequirement>> {
        self.require(id).await?;
        let entries = self.storage.list_ancestors(id, max_depth).await?;
        self.decorate(entries).await
    }

    /// Descendants of `id`, nearest first; depth-1 rows are the immediate children.
    ///
    /// # Errors
    ///
    /// Returns `RequirementNotFound` if the catalog does not know `id`.
    pub async fn get_descendants(
        &self,
        id: &RequirementId,
        max_depth: Option<usize>,
    ) -> Result<Vec<RelatedRequirement>> {
        self.require(id).await?;
        let entries = self.storage.list_descendants(id, max_depth).await?;
        self.decorate(entries).await
    }

    async fn require(&self, id: &RequirementId) -> Result<Requirement> {
        self.storage
            .get_requirement(id)
            .await?
            .ok_or_else(|| Error::RequirementNotFound(id.clone()))
    }

    async fn decorate(&self, entries: Vec<ClosureEntry>) -> Result<Vec<RelatedRequirement>> {
        let mut related = Vec::with_capacity(entries.len());
        for entry in entries {
            let title = self
                .storage
                .get_requirement(&entry.requirement_id)
                .await?
                .map_or_else(|| entry.requirement_id.to_string(), |r| r.title());
            related.push(RelatedRequirement {
                requirement_id: entry.requirement_id,
                title,
                depth: entry.depth,
                direct_parent: entry.depth == 1,
            });
        }
        Ok(related)
    }

    /// Path-sorted tree of a scope with one row per requirement.
    ///
    /// A requirement with several parents is rendered once: under the first
    /// parent row (in path order) that is itself rendered. Rows beneath a
    /// dropped row are dropped with it, so every kept row's `parent_id` and
    /// `path` point at a kept row.
    pub async fn get_tree(&self, scope: &ScopeId) -> Result<Vec<TreeNode>> {
        let mut rows = self.storage.list_tree(scope).await?;
        sort_tree_nodes(&mut rows);
        Ok(dedupe_tree(rows))
    }

    /// Requirements of a scope that take part in no relationship.
    pub async fn get_unlinked(&self, scope: &ScopeId) -> Result<Vec<Requirement>> {
        let edges = self.storage.list_edges(scope).await?;
        let linked: HashSet<&RequirementId> = edges
            .iter()
            .flat_map(|edge| [&edge.ancestor, &edge.descendant])
            .collect();

        let requirements = self.storage.list_requirements(scope).await?;
        Ok(requirements
            .into_iter()
            .filter(|r| !linked.contains(&r.id))
            .collect())
    }

    /// Capture the full edge set of a scope for client-side checks.
    pub async fn snapshot(&self, scope: &ScopeId) -> Result<ClosureSnapshot> {
        let edges = self.storage.list_edges(scope).await?;
        Ok(ClosureSnapshot::from_edges(&edges))
    }
}

fn dedupe_tree(rows: Vec<TreeNode>) -> Vec<TreeNode> {
    // requirement -> path of its kept row
    let mut kept: HashMap<RequirementId, String> = HashMap::new();
    let mut out = Vec::with_capacity(rows.len());

    for row in rows {
        if kept.contains_key(&row.requirement_id) {
            continue;
        }
        if let Some(parent) = &row.parent_id {
            let parent_path = row
                .path
                .rsplit_once(PATH_SEPARATOR)
                .map_or("", |(prefix, _)| prefix);
            if kept.get(parent).is_none_or(|p| p != parent_path) {
                continue;
            }
        }
        kept.insert(row.requirement_id.clone(), row.path.clone());
        out.push(row);
    }

    out
}

/// In-memory copy of a scope's direct edges.
///
/// Holds the whole graph regardless of what the view currently shows, so
/// checks against it also see collapsed subtrees.
#[derive(Debug, Clone, Default)]
pub struct ClosureSnapshot {
    children: HashMap<RequirementId, BTreeSet<RequirementId>>,
    parents: HashMap<RequirementId, BTreeSet<RequirementId>>,
}

impl ClosureSnapshot {
    /// Build a snapshot from direct edges.
    pub fn from_edges<'e>(edges: impl IntoIterator<Item = &'e Edge>) -> Self {
        let mut snapshot = Self::default();
        for edge in edges {
            snapshot.add_edge(edge.ancestor.clone(), edge.descendant.clone());
        }
        snapshot
    }

    /// Record `ancestor -> descendant`.
    pub fn add_edge(&mut self, ancestor: RequirementId, descendant: RequirementId) {
        self.parents
            .entry(descendant.clone())
            .or_default()
            .insert(ancestor.clone());
        self.children.entry(ancestor).or_default().insert(descendant);
    }

    /// Whether the direct edge `ancestor -> descendant` exists.
    pub fn has_edge(&self, ancestor: &RequirementId, descendant: &RequirementId) -> bool {
        self.children
            .get(ancestor)
            .is_some_and(|kids| kids.contains(descendant))
    }

    /// Direct parents of `id`, ordered by id.
    pub fn parents_of(&self, id: &RequirementId) -> Vec<&RequirementId> {
        self.parents
            .get(id)
            .map(|p| p.iter().collect())
            .unwrap_or_default()
    }

    /// Whether `target` lies strictly below `from`.
    pub fn is_descendant(&self, from: &RequirementId, target: &RequirementId) -> bool {
        let mut seen: HashSet<&RequirementId> = HashSet::new();
        let mut queue: VecDeque<&RequirementId> = VecDeque::from([from]);

        while let Some(current) = queue.pop_front() {
            for child in self.children.get(current).into_iter().flatten() {
                if child == target {
                    return true;
                }
                if seen.insert(child) {
                    queue.push_back(child);
                }
            }
        }
        false
    }

    /// Whether hanging `dragged` under `target` would close a loop.
    pub fn would_create_cycle(&self, dragged: &RequirementId, target: &RequirementId) -> bool {
        dragged == target || self.is_descendant(dragged, target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> RequirementId {
        RequirementId::new(s)
    }

    fn row(path: &str) -> TreeNode {
        let segments: Vec<&str> = path.split('/').collect();
        let parent = (segments.len() > 1).then(|| id(segments[segments.len() - 2]));
        TreeNode {
            requirement_id: id(segments[segments.len() - 1]),
            parent_id: parent,
            depth: segments.len() - 1,
            path: path.to_string(),
            has_children: false,
        }
    }

    #[test]
    fn test_dedupe_keeps_first_rendered_parent() {
        // C has parents A and B; A/C sorts first
        let rows = vec![row("A"), row("A/C"), row("A/C/E"), row("B"), row("B/C"), row("B/C/E")];
        let kept: Vec<String> = dedupe_tree(rows).into_iter().map(|r| r.path).collect();
        assert_eq!(kept, vec!["A", "A/C", "A/C/E", "B"]);
    }

    #[test]
    fn test_dedupe_drops_rows_under_discarded_parent() {
        // X is reached via R/Q/X and R/X; R/Q/X sorts first and wins
        let rows = vec![
            row("R"),
            row("R/Q"),
            row("R/Q/X"),
            row("R/Q/X/Y"),
            row("R/X"),
            row("R/X/Y"),
        ];
        let kept: Vec<String> = dedupe_tree(rows).into_iter().map(|r| r.path).collect();
        assert_eq!(kept, vec!["R", "R/Q", "R/Q/X", "R/Q/X/Y"]);
    }

    #[test]
    fn test_snapshot_cycle_check_sees_deep_descendants() {
        let mut snapshot = ClosureSnapshot::default();
        snapshot.add_edge(id("A"), id("B"));
        snapshot.add_edge(id("B"), id("C"));
        snapshot.add_edge(id("C"), id("D"));

        assert!(snapshot.would_create_cycle(&id("A"), &id("A")));
        assert!(snapshot.would_create_cycle(&id("A"), &id("D")));
        assert!(!snapshot.would_create_cycle(&id("D"), &id("A")));
        assert!(snapshot.has_edge(&id("B"), &id("C")));
        assert_eq!(snapshot.parents_of(&id("C")), vec![&id("B")]);
    }
}
