//! Domain types for the requirement relationship graph.
//!
//! Requirements are owned by an external catalog and referenced here only by
//! id. The graph itself is made of direct [`Edge`]s; the closure rows derived
//! from them are exposed as [`ClosureEntry`] lists and the rendering read model
//! is the [`TreeNode`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Separator between requirement ids in a [`TreeNode::path`].
pub const PATH_SEPARATOR: char = '/';

/// Maximum length of a requirement or scope identifier.
pub const MAX_ID_LENGTH: usize = 128;

/// Opaque identifier of a requirement.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequirementId(pub String);

impl RequirementId {
    /// Create a new requirement ID
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the string representation of the ID
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequirementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for RequirementId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for RequirementId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Identifier of the boundary (usually a project) a graph lives in.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScopeId(pub String);

impl ScopeId {
    /// Create a new scope ID
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the string representation of the ID
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ScopeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ScopeId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Check that a string can be used as a requirement or scope id.
///
/// Ids must be non-empty, at most [`MAX_ID_LENGTH`] characters, free of
/// whitespace and must not contain [`PATH_SEPARATOR`].
pub fn validate_id(id: &str) -> Result<(), String> {
    if id.is_empty() {
        return Err("id cannot be empty".to_string());
    }
    if id.chars().count() > MAX_ID_LENGTH {
        return Err(format!("id cannot exceed {MAX_ID_LENGTH} characters"));
    }
    if id.chars().any(char::is_whitespace) {
        return Err(format!("id '{id}' cannot contain whitespace"));
    }
    if id.contains(PATH_SEPARATOR) {
        return Err(format!("id '{id}' cannot contain '{PATH_SEPARATOR}'"));
    }
    Ok(())
}

/// A requirement as known to the catalog.
///
/// Only the id and scope matter to graph logic; the remaining fields are
/// display metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Requirement {
    /// Unique identifier
    pub id: RequirementId,

    /// Project the requirement belongs to
    pub scope: ScopeId,

    /// Display name
    pub name: String,

    /// External reference (e.g. a document section number)
    pub external_id: Option<String>,

    /// Longer description
    pub description: Option<String>,
}

impl Requirement {
    /// Create a requirement with only the mandatory fields set.
    pub fn new(id: impl Into<String>, scope: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: RequirementId::new(id),
            scope: ScopeId::new(scope),
            name: name.into(),
            external_id: None,
            description: None,
        }
    }

    /// Title used when decorating graph rows.
    ///
    /// Prefixes the external id when one is set, e.g. `"3.1 Login"`.
    pub fn title(&self) -> String {
        match &self.external_id {
            Some(ext) if !ext.is_empty() => format!("{ext} {}", self.name),
            _ => self.name.clone(),
        }
    }
}

/// A direct, explicitly created ancestor -> descendant relationship.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    /// Scope both endpoints belong to
    pub scope: ScopeId,

    /// The parent end of the relationship
    pub ancestor: RequirementId,

    /// The child end of the relationship
    pub descendant: RequirementId,

    /// When the edge was created
    pub created_at: DateTime<Utc>,
}

/// One derived closure row as seen from a fixed node: the related node and
/// the length of the shortest path to it (always >= 1).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClosureEntry {
    /// The related requirement
    pub requirement_id: RequirementId,

    /// Number of direct edges on the shortest connecting path
    pub depth: usize,
}

/// Read-model row for rendering one hierarchy per scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeNode {
    /// The requirement this row renders
    pub requirement_id: RequirementId,

    /// Rendered direct parent (`None` for roots)
    pub parent_id: Option<RequirementId>,

    /// Distance from the rendered root (roots are 0)
    pub depth: usize,

    /// Root-to-node chain of ids joined by [`PATH_SEPARATOR`]
    pub path: String,

    /// Whether any direct edge has this requirement as its ancestor
    pub has_children: bool,
}

/// Order two tree paths so parents precede children and siblings are contiguous.
///
/// Comparison is segment by segment, so `A/B/C` sorts before `A/B-2` even
/// though `-` sorts before `/` byte-wise.
pub fn compare_paths(a: &str, b: &str) -> Ordering {
    a.split(PATH_SEPARATOR).cmp(b.split(PATH_SEPARATOR))
}

/// Sort tree rows into pre-order.
pub fn sort_tree_nodes(nodes: &mut [TreeNode]) {
    nodes.sort_by(|a, b| compare_paths(&a.path, &b.path));
}

/// An ancestor or descendant decorated for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelatedRequirement {
    /// The related requirement
    pub requirement_id: RequirementId,

    /// Display title from the catalog (falls back to the id)
    pub title: String,

    /// Shortest path length
    pub depth: usize,

    /// True for depth-1 rows (immediate parent or child)
    pub direct_parent: bool,
}

/// Result of a successful create.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOutcome {
    /// Always true for a returned outcome
    pub success: bool,

    /// Number of new closure rows
    pub relationships_created: usize,

    /// Human readable summary
    pub message: String,
}

/// Result of a successful delete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteOutcome {
    /// Always true for a returned outcome
    pub success: bool,

    /// Net number of closure rows removed
    pub relationships_deleted: usize,

    /// Human readable summary
    pub message: String,
}

/// Result of a successful atomic move.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveOutcome {
    /// Always true for a returned outcome
    pub success: bool,

    /// Closure rows removed by detaching from the old parent
    pub relationships_deleted: usize,

    /// Closure rows created by attaching to the new parent
    pub relationships_created: usize,

    /// Human readable summary
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::simple("REQ-1")]
    #[case::dotted("SRS.3.1")]
    #[case::unicode("exigence-é")]
    fn test_validate_id_accepts(#[case] id: &str) {
        assert!(validate_id(id).is_ok());
    }

    #[rstest]
    #[case::empty("", "empty")]
    #[case::space("REQ 1", "whitespace")]
    #[case::separator("A/B", "cannot contain")]
    fn test_validate_id_rejects(#[case] id: &str, #[case] expected: &str) {
        let err = validate_id(id).unwrap_err();
        assert!(err.contains(expected), "unexpected message: {err}");
    }

    #[test]
    fn test_compare_paths_keeps_subtrees_contiguous() {
        let mut paths = vec!["A/B-2", "A/B/C", "A", "A/B"];
        paths.sort_by(|a, b| compare_paths(a, b));
        assert_eq!(paths, vec!["A", "A/B", "A/B/C", "A/B-2"]);
    }

    #[test]
    fn test_requirement_title_prefers_external_id() {
        let mut req = Requirement::new("R1", "proj", "Login");
        assert_eq!(req.title(), "Login");
        req.external_id = Some("3.1".to_string());
        assert_eq!(req.title(), "3.1 Login");
    }

    #[test]
    fn test_related_requirement_serializes_camel_case() {
        let row = RelatedRequirement {
            requirement_id: RequirementId::new("B"),
            title: "B".to_string(),
            depth: 1,
            direct_parent: true,
        };
        let json = serde_json::to_value(&row).unwrap();
        assert_eq!(json["requirementId"], "B");
        assert_eq!(json["directParent"], true);
    }

    #[test]
    fn test_tree_node_serializes_snake_case() {
        let node = TreeNode {
            requirement_id: RequirementId::new("B"),
            parent_id: Some(RequirementId::new("A")),
            depth: 1,
            path: "A/B".to_string(),
            has_children: false,
        };
        let json = serde_json::to_value(&node).unwrap();
        assert_eq!(json["requirement_id"], "B");
        assert_eq!(json["parent_id"], "A");
        assert_eq!(json["has_children"], false);
    }
}
