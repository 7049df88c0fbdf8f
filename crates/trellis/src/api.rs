//! Transport-agnostic relationship API.
//!
//! Each handler takes a deserialized request, runs it against a storage
//! backend and returns an [`ApiResponse`]: an HTTP-style status code plus the
//! JSON body a client expects. Frontends (the MCP server, the CLI's `--json`
//! mode) only have to move these bodies over their transport.

use crate::domain::{Requirement, RequirementId, ScopeId};
use crate::error::{Error, ErrorKind};
use crate::query::TreeQueryService;
use crate::service::RelationshipService;
use crate::storage::TraceStorage;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// Which projection a relationship query asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryType {
    /// Ancestors of `requirementId`
    Ancestors,
    /// Descendants of `requirementId`
    Descendants,
    /// The de-duplicated tree of `projectId`
    Tree,
}

/// Query string of `GET /relationships`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationshipQuery {
    /// Projection to return
    #[serde(rename = "type")]
    pub query_type: QueryType,
    /// Subject of an ancestors/descendants query
    #[serde(default)]
    pub requirement_id: Option<String>,
    /// Scope of a tree query
    #[serde(default)]
    pub project_id: Option<String>,
    /// Optional depth cap for ancestors/descendants
    #[serde(default)]
    pub max_depth: Option<usize>,
}

/// Body of `POST /relationships` and `DELETE /relationships`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationshipBody {
    /// Parent end
    pub ancestor_id: String,
    /// Child end
    pub descendant_id: String,
}

/// Body of the atomic move request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveBody {
    /// Current parent to detach from, if any
    #[serde(default)]
    pub old_ancestor_id: Option<String>,
    /// New parent
    pub new_ancestor_id: String,
    /// Requirement being moved
    pub descendant_id: String,
}

/// Body of a requirement registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterBody {
    /// Requirement id
    pub id: String,
    /// Display name
    pub name: String,
    /// Project the requirement belongs to
    pub project_id: String,
    /// External reference
    #[serde(default)]
    pub external_id: Option<String>,
    /// Longer description
    #[serde(default)]
    pub description: Option<String>,
}

/// Status code plus JSON body.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    /// HTTP-style status code
    pub status: u16,
    /// Response body
    pub body: Value,
}

impl ApiResponse {
    fn ok(body: Value) -> Self {
        Self { status: 200, body }
    }

    /// Whether the status is in the 2xx range.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Status code for an error kind.
pub fn status_for(kind: ErrorKind) -> u16 {
    match kind {
        ErrorKind::Validation => 400,
        ErrorKind::NotFound => 404,
        ErrorKind::Cycle | ErrorKind::Duplicate => 409,
        ErrorKind::Persistence | ErrorKind::PartialMove => 500,
    }
}

/// Error response carrying the full error and the user-facing message.
pub fn error_response(err: &Error) -> ApiResponse {
    ApiResponse {
        status: status_for(err.kind()),
        body: json!({
            "success": false,
            "message": err.user_message(),
            "error": err.to_string(),
        }),
    }
}

fn required<'v>(value: Option<&'v str>, name: &str) -> Result<&'v str, Error> {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(Error::Validation(format!("{name} is required"))),
    }
}

/// `GET /relationships`
pub async fn get_relationships<S>(storage: &S, query: &RelationshipQuery) -> ApiResponse
where
    S: TraceStorage + ?Sized,
{
    let queries = TreeQueryService::new(storage);

    let data = match query.query_type {
        QueryType::Ancestors | QueryType::Descendants => {
            let id = match required(query.requirement_id.as_deref(), "requirementId") {
                Ok(id) => RequirementId::new(id),
                Err(e) => return error_response(&e),
            };
            let rows = if query.query_type == QueryType::Ancestors {
                queries.get_ancestors(&id, query.max_depth).await
            } else {
                queries.get_descendants(&id, query.max_depth).await
            };
            rows.map(|r| json!(r))
        }
        QueryType::Tree => {
            let scope = match required(query.project_id.as_deref(), "projectId") {
                Ok(scope) => ScopeId::new(scope),
                Err(e) => return error_response(&e),
            };
            queries.get_tree(&scope).await.map(|r| json!(r))
        }
    };

    match data {
        Ok(data) => ApiResponse::ok(json!({ "data": data })),
        Err(e) => error_response(&e),
    }
}

/// `POST /relationships`
pub async fn create_relationship<S>(storage: &mut S, body: &RelationshipBody) -> ApiResponse
where
    S: TraceStorage + ?Sized,
{
    let mut service = RelationshipService::new(storage);
    let ancestor = RequirementId::new(body.ancestor_id.trim());
    let descendant = RequirementId::new(body.descendant_id.trim());

    match service.create(&ancestor, &descendant).await {
        Ok(outcome) => ApiResponse::ok(json!(outcome)),
        Err(e) => error_response(&e),
    }
}

/// `DELETE /relationships`
pub async fn delete_relationship<S>(storage: &mut S, body: &RelationshipBody) -> ApiResponse
where
    S: TraceStorage + ?Sized,
{
    let mut service = RelationshipService::new(storage);
    let ancestor = RequirementId::new(body.ancestor_id.trim());
    let descendant = RequirementId::new(body.descendant_id.trim());

    match service.delete(&ancestor, &descendant).await {
        Ok(outcome) => ApiResponse::ok(json!(outcome)),
        Err(e) => error_response(&e),
    }
}

/// Atomic re-parenting.
pub async fn move_relationship<S>(storage: &mut S, body: &MoveBody) -> ApiResponse
where
    S: TraceStorage + ?Sized,
{
    let mut service = RelationshipService::new(storage);
    let old = body
        .old_ancestor_id
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(RequirementId::new);
    let new_ancestor = RequirementId::new(body.new_ancestor_id.trim());
    let descendant = RequirementId::new(body.descendant_id.trim());

    match service
        .relocate(old.as_ref(), &new_ancestor, &descendant)
        .await
    {
        Ok(outcome) => ApiResponse::ok(json!(outcome)),
        Err(e) => error_response(&e),
    }
}

/// Register or update a requirement in the catalog.
pub async fn register_requirement<S>(storage: &mut S, body: &RegisterBody) -> ApiResponse
where
    S: TraceStorage + ?Sized,
{
    let requirement = match (
        required(Some(body.id.as_str()), "id"),
        required(Some(body.name.as_str()), "name"),
        required(Some(body.project_id.as_str()), "projectId"),
    ) {
        (Ok(id), Ok(name), Ok(project)) => {
            let mut requirement = Requirement::new(id, project, name);
            requirement.external_id = body.external_id.clone().filter(|s| !s.trim().is_empty());
            requirement.description = body.description.clone().filter(|s| !s.trim().is_empty());
            requirement
        }
        (Err(e), _, _) | (_, Err(e), _) | (_, _, Err(e)) => return error_response(&e),
    };

    let mut service = RelationshipService::new(storage);
    match service.register(requirement.clone()).await {
        Ok(()) => ApiResponse::ok(json!(requirement)),
        Err(e) => error_response(&e),
    }
}
