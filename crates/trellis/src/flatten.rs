//! Collapsible view over path-sorted tree rows.
//!
//! Everything here is pure: the collapsed state is a value passed in and
//! returned, never stored alongside the graph.

use crate::domain::{RequirementId, TreeNode};
use std::collections::BTreeSet;

/// Immutable set of collapsed requirement ids.
///
/// Every modifier returns a new set and leaves `self` untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollapsedSet {
    ids: BTreeSet<RequirementId>,
}

impl CollapsedSet {
    /// The empty set: everything expanded.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `id` is collapsed.
    pub fn contains(&self, id: &RequirementId) -> bool {
        self.ids.contains(id)
    }

    /// A copy with `id` collapsed.
    #[must_use]
    pub fn with(&self, id: RequirementId) -> Self {
        let mut ids = self.ids.clone();
        ids.insert(id);
        Self { ids }
    }

    /// A copy with `id` expanded.
    #[must_use]
    pub fn without(&self, id: &RequirementId) -> Self {
        let mut ids = self.ids.clone();
        ids.remove(id);
        Self { ids }
    }

    /// A copy with the collapsed state of `id` flipped.
    #[must_use]
    pub fn toggled(&self, id: &RequirementId) -> Self {
        if self.contains(id) {
            self.without(id)
        } else {
            self.with(id.clone())
        }
    }

    /// Number of collapsed ids.
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Whether nothing is collapsed.
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Collapsed ids in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = &RequirementId> {
        self.ids.iter()
    }
}

impl FromIterator<RequirementId> for CollapsedSet {
    fn from_iter<T: IntoIterator<Item = RequirementId>>(iter: T) -> Self {
        Self {
            ids: iter.into_iter().collect(),
        }
    }
}

/// Visible rows of a path-sorted tree given the collapsed ids.
///
/// Walks the rows once, keeping one flag per open depth level that records
/// whether the row at that level is collapsed. A row is visible when no
/// enclosing level is collapsed; descendants of a collapsed row stay hidden
/// however deep they are.
pub fn flatten<'n>(nodes: &'n [TreeNode], collapsed: &CollapsedSet) -> Vec<&'n TreeNode> {
    let mut levels: Vec<bool> = Vec::new();
    // number of `true` entries in `levels`
    let mut hidden = 0usize;
    let mut visible = Vec::with_capacity(nodes.len());

    for node in nodes {
        while levels.len() > node.depth {
            if levels.pop() == Some(true) {
                hidden -= 1;
            }
        }

        if hidden == 0 {
            visible.push(node);
        }

        let is_collapsed = collapsed.contains(&node.requirement_id);
        if is_collapsed {
            hidden += 1;
        }
        levels.push(is_collapsed);
    }

    visible
}

/// Collapse every row at the shallowest depth present that has children.
pub fn collapse_all_to_top_level(nodes: &[TreeNode]) -> CollapsedSet {
    let Some(top) = nodes.iter().map(|n| n.depth).min() else {
        return CollapsedSet::new();
    };
    nodes
        .iter()
        .filter(|n| n.depth == top && n.has_children)
        .map(|n| n.requirement_id.clone())
        .collect()
}

/// Expand everything.
pub fn expand_all() -> CollapsedSet {
    CollapsedSet::new()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};

    fn node(path: &str, has_children: bool) -> TreeNode {
        let segments: Vec<&str> = path.split('/').collect();
        let depth = segments.len() - 1;
        TreeNode {
            requirement_id: RequirementId::new(segments[depth]),
            parent_id: depth.checked_sub(1).map(|p| RequirementId::new(segments[p])),
            depth,
            path: path.to_string(),
            has_children,
        }
    }

    #[fixture]
    fn tree() -> Vec<TreeNode> {
        vec![
            node("A", true),
            node("A/B", true),
            node("A/B/C", true),
            node("A/B/C/D", false),
            node("A/E", false),
            node("F", true),
            node("F/G", false),
        ]
    }

    fn ids(rows: &[&TreeNode]) -> Vec<String> {
        rows.iter().map(|n| n.requirement_id.to_string()).collect()
    }

    #[rstest]
    fn test_nothing_collapsed_shows_everything(tree: Vec<TreeNode>) {
        assert_eq!(flatten(&tree, &expand_all()).len(), tree.len());
    }

    #[rstest]
    #[case::leaf_parent("C", &["A", "B", "C", "E", "F", "G"])]
    #[case::middle("B", &["A", "B", "E", "F", "G"])]
    #[case::root("A", &["A", "F", "G"])]
    #[case::leaf("D", &["A", "B", "C", "D", "E", "F", "G"])]
    fn test_collapsed_subtree_is_hidden(
        tree: Vec<TreeNode>,
        #[case] collapsed: &str,
        #[case] expected: &[&str],
    ) {
        let set = CollapsedSet::new().with(RequirementId::new(collapsed));
        assert_eq!(ids(&flatten(&tree, &set)), expected);
    }

    #[rstest]
    fn test_nested_collapse_reopens_after_subtree(tree: Vec<TreeNode>) {
        let set: CollapsedSet = ["A", "B"].into_iter().map(RequirementId::new).collect();
        assert_eq!(ids(&flatten(&tree, &set)), vec!["A", "F", "G"]);

        let set = set.without(&RequirementId::new("A"));
        assert_eq!(ids(&flatten(&tree, &set)), vec!["A", "B", "E", "F", "G"]);
    }

    #[rstest]
    fn test_collapse_all_to_top_level(tree: Vec<TreeNode>) {
        let set = collapse_all_to_top_level(&tree);
        let collapsed: Vec<&str> = set.iter().map(RequirementId::as_str).collect();
        assert_eq!(collapsed, vec!["A", "F"]);
        assert_eq!(ids(&flatten(&tree, &set)), vec!["A", "F"]);
    }

    #[test]
    fn test_collapse_all_on_empty_tree() {
        assert!(collapse_all_to_top_level(&[]).is_empty());
    }

    #[test]
    fn test_modifiers_do_not_mutate() {
        let empty = CollapsedSet::new();
        let one = empty.toggled(&RequirementId::new("A"));
        assert!(empty.is_empty());
        assert_eq!(one.len(), 1);
        assert!(one.toggled(&RequirementId::new("A")).is_empty());
        assert_eq!(one.len(), 1);
    }
}
