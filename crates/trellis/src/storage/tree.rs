//! Tree row construction shared by the storage backends.

use crate::domain::{PATH_SEPARATOR, RequirementId, TreeNode};
use std::collections::{BTreeMap, BTreeSet, HashSet};

/// Build the `list_tree` rows from a scope's direct edges.
///
/// One pre-pass builds an `ancestor -> children` adjacency map, then an
/// iterative depth-first walk from every root emits rows in pre-order with
/// roots and siblings ordered by id. Pre-order over sorted siblings is also
/// segment-wise path order, so the first time the walk reaches a requirement
/// is along its smallest path. That row is kept and later arrivals are
/// skipped together with their subtrees, giving one row per requirement in
/// O(V + E).
///
/// Expects an acyclic edge set.
pub fn build_tree_rows<I>(edges: I) -> Vec<TreeNode>
where
    I: IntoIterator<Item = (RequirementId, RequirementId)>,
{
    let mut children: BTreeMap<RequirementId, BTreeSet<RequirementId>> = BTreeMap::new();
    let mut has_parent: HashSet<RequirementId> = HashSet::new();
    let mut nodes: BTreeSet<RequirementId> = BTreeSet::new();

    for (ancestor, descendant) in edges {
        nodes.insert(ancestor.clone());
        nodes.insert(descendant.clone());
        has_parent.insert(descendant.clone());
        children.entry(ancestor).or_default().insert(descendant);
    }

    let mut rows = Vec::with_capacity(nodes.len());
    let mut visited: HashSet<&RequirementId> = HashSet::with_capacity(nodes.len());

    for root in nodes.iter().filter(|id| !has_parent.contains(*id)) {
        // (node, parent, depth, parent path)
        let mut stack: Vec<(&RequirementId, Option<&RequirementId>, usize, String)> =
            vec![(root, None, 0, String::new())];

        while let Some((id, parent, depth, parent_path)) = stack.pop() {
            if !visited.insert(id) {
                continue;
            }
            let path = if parent_path.is_empty() {
                id.as_str().to_string()
            } else {
                format!("{parent_path}{PATH_SEPARATOR}{id}")
            };

            let kids = children.get(id);
            rows.push(TreeNode {
                requirement_id: id.clone(),
                parent_id: parent.cloned(),
                depth,
                path: path.clone(),
                has_children: kids.is_some_and(|k| !k.is_empty()),
            });

            if let Some(kids) = kids {
                // Reverse so the smallest id is popped first
                for child in kids.iter().rev().filter(|c| !visited.contains(*c)) {
                    stack.push((child, Some(id), depth + 1, path.clone()));
                }
            }
        }
    }

    rows
}
