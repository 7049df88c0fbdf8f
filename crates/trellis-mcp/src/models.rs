//! MCP request and response models.
//!
//! Request types derive [`JsonSchema`] so rmcp can advertise their shape in
//! the tool listing. Relationship responses reuse the JSON bodies produced by
//! [`trellis::api`].

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use trellis::api::{MoveBody, QueryType, RelationshipBody, RelationshipQuery};

use crate::error::{Error, Result};

/// Parameters of the `set_context` tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SetContextParams {
    /// Directory containing `.trellis/`, or any directory below it.
    pub workspace_root: String,
}

/// Parameters of the `relationships_get` tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RelationshipsGetParams {
    /// Projection to return: `ancestors`, `descendants` or `tree`.
    #[serde(rename = "type")]
    pub query_type: String,

    /// Subject of an ancestors/descendants query.
    pub requirement_id: Option<String>,

    /// Project of a tree query. Defaults to the workspace's default project.
    pub project_id: Option<String>,

    /// Only return rows at most this many levels away.
    pub max_depth: Option<usize>,

    /// Workspace to use instead of the current context.
    pub workspace_root: Option<String>,
}

impl RelationshipsGetParams {
    /// Convert into an API query, filling the project for tree queries.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for an unknown query type.
    pub fn into_query(self, default_project: &str) -> Result<RelationshipQuery> {
        let query_type = parse_query_type(&self.query_type).ok_or_else(|| {
            Error::InvalidArgument {
                field: "type",
                value: self.query_type.clone(),
                valid_values: "ancestors, descendants, tree",
            }
        })?;

        let project_id = match query_type {
            QueryType::Tree => self
                .project_id
                .or_else(|| Some(default_project.to_string())),
            QueryType::Ancestors | QueryType::Descendants => self.project_id,
        };

        Ok(RelationshipQuery {
            query_type,
            requirement_id: self.requirement_id,
            project_id,
            max_depth: self.max_depth,
        })
    }
}

/// Parameters of `relationship_create` and `relationship_delete`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RelationshipParams {
    /// Parent end of the relationship.
    pub ancestor_id: String,

    /// Child end of the relationship.
    pub descendant_id: String,

    /// Workspace to use instead of the current context.
    pub workspace_root: Option<String>,
}

impl From<RelationshipParams> for RelationshipBody {
    fn from(params: RelationshipParams) -> Self {
        Self {
            ancestor_id: params.ancestor_id,
            descendant_id: params.descendant_id,
        }
    }
}

/// Parameters of `relationship_move`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct MoveParams {
    /// Current parent to detach from. Omit to only attach.
    pub old_ancestor_id: Option<String>,

    /// New parent.
    pub new_ancestor_id: String,

    /// Requirement being moved.
    pub descendant_id: String,

    /// Workspace to use instead of the current context.
    pub workspace_root: Option<String>,
}

impl From<MoveParams> for MoveBody {
    fn from(params: MoveParams) -> Self {
        Self {
            old_ancestor_id: params.old_ancestor_id,
            new_ancestor_id: params.new_ancestor_id,
            descendant_id: params.descendant_id,
        }
    }
}

/// Parameters of `requirement_register`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RegisterParams {
    /// Requirement id, unique across projects.
    pub id: String,

    /// Display name.
    pub name: String,

    /// Project to file the requirement under. Defaults to the workspace's
    /// default project.
    pub project_id: Option<String>,

    /// External reference such as a document section number.
    pub external_id: Option<String>,

    /// Longer description.
    pub description: Option<String>,

    /// Workspace to use instead of the current context.
    pub workspace_root: Option<String>,
}

/// Response from the `set_context` tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SetContextResponse {
    /// The workspace root that was set.
    pub workspace_root: String,

    /// The SQLite database file, absent for in-memory workspaces.
    pub database_path: Option<String>,

    /// Project used when a call names none.
    pub default_project: String,

    /// Status message.
    pub message: String,
}

/// Response from the `where_am_i` tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct WhereAmIResponse {
    /// The current workspace root, if set.
    pub workspace_root: Option<String>,

    /// The current database path, if set.
    pub database_path: Option<String>,

    /// The current default project, if set.
    pub default_project: Option<String>,

    /// Whether a context is currently set.
    pub context_set: bool,
}

/// Parse a query type name, ignoring case.
#[must_use]
pub fn parse_query_type(s: &str) -> Option<QueryType> {
    match s.trim().to_lowercase().as_str() {
        "ancestors" => Some(QueryType::Ancestors),
        "descendants" => Some(QueryType::Descendants),
        "tree" => Some(QueryType::Tree),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::ancestors("ancestors", Some(QueryType::Ancestors))]
    #[case::descendants("descendants", Some(QueryType::Descendants))]
    #[case::tree_uppercase("TREE", Some(QueryType::Tree))]
    #[case::padded(" tree ", Some(QueryType::Tree))]
    #[case::invalid("parents", None)]
    #[case::empty("", None)]
    fn test_parse_query_type(#[case] input: &str, #[case] expected: Option<QueryType>) {
        assert_eq!(parse_query_type(input), expected);
    }

    fn get_params(query_type: &str, project_id: Option<&str>) -> RelationshipsGetParams {
        RelationshipsGetParams {
            query_type: query_type.to_string(),
            requirement_id: Some("REQ-1".to_string()),
            project_id: project_id.map(str::to_string),
            max_depth: None,
            workspace_root: None,
        }
    }

    #[test]
    fn test_tree_query_defaults_project() {
        let query = get_params("tree", None).into_query("portal").unwrap();
        assert_eq!(query.project_id.as_deref(), Some("portal"));

        let query = get_params("tree", Some("billing")).into_query("portal").unwrap();
        assert_eq!(query.project_id.as_deref(), Some("billing"));
    }

    #[test]
    fn test_ancestor_query_keeps_project_unset() {
        let query = get_params("ancestors", None).into_query("portal").unwrap();
        assert_eq!(query.project_id, None);
        assert_eq!(query.requirement_id.as_deref(), Some("REQ-1"));
    }

    #[test]
    fn test_unknown_query_type_is_invalid_argument() {
        let err = get_params("siblings", None).into_query("portal").unwrap_err();
        assert!(matches!(err, Error::InvalidArgument { field: "type", .. }));
    }

    #[test]
    fn test_params_accept_type_key() {
        let params: RelationshipsGetParams = serde_json::from_value(serde_json::json!({
            "type": "descendants",
            "requirement_id": "A",
            "max_depth": 2
        }))
        .unwrap();
        assert_eq!(params.query_type, "descendants");
        assert_eq!(params.max_depth, Some(2));
    }
}
