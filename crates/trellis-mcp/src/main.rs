//! Trellis MCP server binary.
//!
//! This binary runs the MCP server using stdio transport. Stdout carries the
//! protocol, so all logging goes to stderr.

use tracing_subscriber::EnvFilter;
use trellis_mcp::TrellisMcpServer;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("trellis=info,trellis_mcp=info")),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    tracing::info!("Starting trellis-mcp server");

    let server = TrellisMcpServer::new();
    server.run().await?;

    Ok(())
}
