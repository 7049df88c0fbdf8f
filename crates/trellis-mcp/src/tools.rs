//! MCP tool implementations.
//!
//! Relationship tools resolve the target workspace, take the storage lock and
//! hand the request to the matching [`trellis::api`] handler. The returned
//! [`ApiResponse`] carries the status code so the server can tell rejected
//! mutations apart from transport failures.

use crate::context::Context;
use crate::error::Result;
use crate::models::{
    MoveParams, RegisterParams, RelationshipParams, RelationshipsGetParams, SetContextResponse,
    WhereAmIResponse,
};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;
use trellis::api::{self, ApiResponse, RegisterBody};

/// Tool implementations for the trellis MCP server.
pub struct Tools {
    context: Arc<RwLock<Context>>,
}

impl Tools {
    /// Create a new Tools instance with the given context.
    pub fn new(context: Arc<RwLock<Context>>) -> Self {
        Self { context }
    }

    /// Set the workspace context.
    ///
    /// Any directory inside the workspace is accepted; the root is found by
    /// walking up to the nearest `.trellis/`.
    ///
    /// # Errors
    ///
    /// Returns an error if the path is invalid, no `.trellis/` directory is
    /// found, or the workspace storage cannot be opened.
    pub async fn set_context(&self, workspace_root: &str) -> Result<SetContextResponse> {
        let mut context = self.context.write().await;
        let info = context
            .discover_and_set_workspace(Path::new(workspace_root))
            .await?;

        Ok(SetContextResponse {
            workspace_root: info.workspace_root.display().to_string(),
            database_path: info.database_path.map(|p| p.display().to_string()),
            default_project: info.default_project,
            message: "Context set successfully".to_string(),
        })
    }

    /// Get current workspace information.
    ///
    /// # Errors
    ///
    /// This function does not currently return errors but returns `Result` for API consistency.
    pub async fn where_am_i(&self) -> Result<WhereAmIResponse> {
        let context = self.context.read().await;

        Ok(match context.current_workspace() {
            Some(info) => WhereAmIResponse {
                workspace_root: Some(info.workspace_root.display().to_string()),
                database_path: info.database_path.as_ref().map(|p| p.display().to_string()),
                default_project: Some(info.default_project.clone()),
                context_set: true,
            },
            None => WhereAmIResponse {
                workspace_root: None,
                database_path: None,
                default_project: None,
                context_set: false,
            },
        })
    }

    /// Query ancestors, descendants or a project tree.
    ///
    /// # Errors
    ///
    /// Returns an error if no context is set or the query type is unknown.
    pub async fn relationships_get(&self, params: RelationshipsGetParams) -> Result<ApiResponse> {
        let context = self.context.read().await;
        let workspace_root = params.workspace_root.clone();
        let workspace_root = workspace_root.as_deref().map(Path::new);

        let default_project = context.workspace_for(workspace_root)?.default_project.clone();
        let query = params.into_query(&default_project)?;

        let storage = context.storage_for(workspace_root)?;
        let storage = storage.read().await;
        Ok(api::get_relationships(&**storage, &query).await)
    }

    /// Create a direct relationship.
    ///
    /// # Errors
    ///
    /// Returns an error if no context is set.
    pub async fn relationship_create(&self, params: RelationshipParams) -> Result<ApiResponse> {
        let context = self.context.read().await;
        let storage = context.storage_for(params.workspace_root.as_deref().map(Path::new))?;
        let mut storage = storage.write().await;
        Ok(api::create_relationship(&mut **storage, &params.into()).await)
    }

    /// Delete a direct relationship.
    ///
    /// # Errors
    ///
    /// Returns an error if no context is set.
    pub async fn relationship_delete(&self, params: RelationshipParams) -> Result<ApiResponse> {
        let context = self.context.read().await;
        let storage = context.storage_for(params.workspace_root.as_deref().map(Path::new))?;
        let mut storage = storage.write().await;
        Ok(api::delete_relationship(&mut **storage, &params.into()).await)
    }

    /// Re-parent a requirement in a single transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if no context is set.
    pub async fn relationship_move(&self, params: MoveParams) -> Result<ApiResponse> {
        let context = self.context.read().await;
        let storage = context.storage_for(params.workspace_root.as_deref().map(Path::new))?;
        let mut storage = storage.write().await;
        Ok(api::move_relationship(&mut **storage, &params.into()).await)
    }

    /// Register or update a requirement.
    ///
    /// # Errors
    ///
    /// Returns an error if no context is set.
    pub async fn requirement_register(&self, params: RegisterParams) -> Result<ApiResponse> {
        let context = self.context.read().await;
        let workspace_root = params.workspace_root.as_deref().map(Path::new);
        let project_id = match params.project_id {
            Some(project) => project,
            None => context.workspace_for(workspace_root)?.default_project.clone(),
        };
        let body = RegisterBody {
            id: params.id,
            name: params.name,
            project_id,
            external_id: params.external_id,
            description: params.description,
        };

        let storage = context.storage_for(workspace_root)?;
        let mut storage = storage.write().await;
        Ok(api::register_requirement(&mut **storage, &body).await)
    }
}
