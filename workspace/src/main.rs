//! Workspace MCP server over stdio.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use rmcp::{ServiceExt, transport::stdio};
use tracing_subscriber::{self, EnvFilter};

use ::workspace::{Config, Server};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

#[derive(Parser)]
#[command(name = "workspace", version)]
#[command(about = "Workspace files, notes, tasks and HTTP requests served over MCP stdio")]
struct Cli {
    /// Directory holding workspace files and the database [env: WORKSPACE_DIR]
    #[arg(long)]
    workspace_dir: Option<PathBuf>,

    /// Database file name inside the workspace [env: WORKSPACE_DATABASE]
    #[arg(long)]
    database: Option<String>,

    /// Timeout for outbound HTTP requests in milliseconds [env: WORKSPACE_REQUEST_TIMEOUT_MS]
    #[arg(long)]
    request_timeout_ms: Option<u64>,
}

//--------------------------------------------------------------------------------------------------
// Functions: Main
//--------------------------------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logging to stderr only (stdout is reserved for MCP protocol)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::DEBUG.into()))
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    tracing::info!("Starting workspace MCP server");

    let config = cli.apply(Config::from_env());
    let server = Server::new(config).context("failed to initialize workspace")?;

    // Set up graceful shutdown
    let shutdown = Arc::new(tokio::sync::Notify::new());
    let shutdown_clone = shutdown.clone();

    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        tracing::info!("Received shutdown signal");
        shutdown_clone.notify_one();
    });

    let service = server.serve(stdio()).await?;

    tokio::select! {
        result = service.waiting() => {
            result?;
        }
        _ = shutdown.notified() => {
            tracing::info!("Shutting down");
        }
    }

    tracing::info!("Workspace MCP server stopped");
    Ok(())
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl Cli {
    /// Overlay command-line flags on top of `config`.
    fn apply(self, mut config: Config) -> Config {
        if let Some(dir) = self.workspace_dir {
            config.workspace_dir = dir;
        }
        if let Some(database) = self.database {
            config.database_name = database;
        }
        if let Some(timeout) = self.request_timeout_ms {
            config.request_timeout_ms = timeout;
        }
        config
    }
}
