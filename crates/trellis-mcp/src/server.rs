//! MCP server implementation.
//!
//! This module contains the main server setup using rmcp.

use crate::context::Context;
use crate::error::Error;
use crate::models::{
    MoveParams, RegisterParams, RelationshipParams, RelationshipsGetParams, SetContextParams,
};
use crate::tools::Tools;
use rmcp::handler::server::router::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::{
    CallToolResult, Content, Implementation, ProtocolVersion, ServerCapabilities, ServerInfo,
};
use rmcp::transport::stdio;
use rmcp::{
    ErrorData as McpError, ServiceExt, handler::server::ServerHandler, tool, tool_handler,
    tool_router,
};
use serde_json::json;
use std::sync::Arc;
use tokio::sync::RwLock;
use trellis::api::ApiResponse;

/// The trellis MCP server.
///
/// Provides MCP protocol handling over stdio transport.
#[derive(Clone)]
pub struct TrellisMcpServer {
    /// Shared context for workspace management.
    context: Arc<RwLock<Context>>,
    /// Tool implementations.
    tools: Arc<Tools>,
    /// Tool router for MCP dispatch.
    tool_router: ToolRouter<Self>,
}

/// Turn a handler response into a tool result.
///
/// Rejected requests (4xx/5xx) become tool-level errors carrying the API
/// body and its status, so the caller sees why the mutation was refused.
fn api_result(result: crate::Result<ApiResponse>) -> Result<CallToolResult, McpError> {
    let response = result.map_err(to_mcp_error)?;
    if response.is_success() {
        return Ok(CallToolResult::success(vec![Content::json(response.body)?]));
    }

    let mut body = response.body;
    if let Some(object) = body.as_object_mut() {
        object.insert("status".to_string(), json!(response.status));
    }
    Ok(CallToolResult::error(vec![Content::json(body)?]))
}

fn to_mcp_error(err: Error) -> McpError {
    match err {
        Error::InvalidArgument { .. } => McpError::invalid_params(err.to_string(), None),
        _ => McpError::internal_error(err.to_string(), None),
    }
}

#[tool_router]
impl TrellisMcpServer {
    /// Set the workspace context for subsequent operations.
    #[tool(
        description = "Set the workspace root directory for all subsequent operations. Call this first before using other tools."
    )]
    async fn set_context(
        &self,
        Parameters(params): Parameters<SetContextParams>,
    ) -> Result<CallToolResult, McpError> {
        match self.tools.set_context(&params.workspace_root).await {
            Ok(response) => Ok(CallToolResult::success(vec![Content::json(response)?])),
            Err(e) => Err(to_mcp_error(e)),
        }
    }

    /// Get current workspace context information.
    #[tool(
        description = "Show current workspace context, database path and default project. Useful for debugging."
    )]
    async fn where_am_i(&self) -> Result<CallToolResult, McpError> {
        match self.tools.where_am_i().await {
            Ok(response) => Ok(CallToolResult::success(vec![Content::json(response)?])),
            Err(e) => Err(to_mcp_error(e)),
        }
    }

    /// Query the relationship graph.
    #[tool(
        description = "Get ancestors or descendants of a requirement (type=ancestors|descendants, requirement_id, optional max_depth), or the de-duplicated tree of a project (type=tree, optional project_id)."
    )]
    async fn relationships_get(
        &self,
        Parameters(params): Parameters<RelationshipsGetParams>,
    ) -> Result<CallToolResult, McpError> {
        api_result(self.tools.relationships_get(params).await)
    }

    /// Create a direct relationship.
    #[tool(
        description = "Link ancestor_id -> descendant_id. Both requirements must exist in the same project. Rejected if the link already exists or would create a cycle."
    )]
    async fn relationship_create(
        &self,
        Parameters(params): Parameters<RelationshipParams>,
    ) -> Result<CallToolResult, McpError> {
        api_result(self.tools.relationship_create(params).await)
    }

    /// Delete a direct relationship.
    #[tool(
        description = "Remove the direct link ancestor_id -> descendant_id. Indirect relationships still reachable through other paths are kept."
    )]
    async fn relationship_delete(
        &self,
        Parameters(params): Parameters<RelationshipParams>,
    ) -> Result<CallToolResult, McpError> {
        api_result(self.tools.relationship_delete(params).await)
    }

    /// Re-parent a requirement atomically.
    #[tool(
        description = "Move descendant_id from old_ancestor_id (optional) to new_ancestor_id in one transaction. Nothing changes if any step fails."
    )]
    async fn relationship_move(
        &self,
        Parameters(params): Parameters<MoveParams>,
    ) -> Result<CallToolResult, McpError> {
        api_result(self.tools.relationship_move(params).await)
    }

    /// Register a requirement.
    #[tool(
        description = "Register or update a requirement (id, name, optional project_id, external_id, description) so it can take part in relationships."
    )]
    async fn requirement_register(
        &self,
        Parameters(params): Parameters<RegisterParams>,
    ) -> Result<CallToolResult, McpError> {
        api_result(self.tools.requirement_register(params).await)
    }
}

impl TrellisMcpServer {
    /// Create a new trellis MCP server.
    #[must_use]
    pub fn new() -> Self {
        let context = Arc::new(RwLock::new(Context::new()));
        let tools = Arc::new(Tools::new(Arc::clone(&context)));

        Self {
            context,
            tools,
            tool_router: Self::tool_router(),
        }
    }

    /// Get a reference to the context.
    #[must_use]
    pub fn context(&self) -> &Arc<RwLock<Context>> {
        &self.context
    }

    /// Serve MCP over stdin/stdout until the client disconnects.
    ///
    /// # Errors
    ///
    /// Returns `Error::Transport` if the handshake fails or the service task aborts.
    pub async fn run(self) -> crate::Result<()> {
        let service = self
            .serve(stdio())
            .await
            .map_err(|e| Error::Transport(e.to_string()))?;
        let reason = service
            .waiting()
            .await
            .map_err(|e| Error::Transport(e.to_string()))?;
        tracing::info!(?reason, "MCP session ended");
        Ok(())
    }
}

impl Default for TrellisMcpServer {
    fn default() -> Self {
        Self::new()
    }
}

#[tool_handler]
impl ServerHandler for TrellisMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "trellis-mcp".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                title: None,
                icons: None,
                website_url: None,
            },
            instructions: Some(
                "Trellis MCP server for requirement traceability. Call set_context first to set the workspace."
                    .into(),
            ),
        }
    }
}
