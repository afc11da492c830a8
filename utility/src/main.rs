use anyhow::Result;
use rmcp::{ServiceExt, transport::stdio};
use tracing_subscriber::{self, EnvFilter};
use utility::Server;

#[tokio::main]
async fn main() -> Result<()> {
    // Logging to stderr only (stdout is reserved for MCP protocol)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::DEBUG.into()))
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    tracing::info!("Starting utility MCP server");

    let service = Server::new().serve(stdio()).await?;
    service.waiting().await?;
    Ok(())
}
