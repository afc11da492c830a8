//! MCP server implementation.

use std::sync::Arc;

use rmcp::handler::server::wrapper::Parameters;
use rmcp::{
    ErrorData as McpError, Json, RoleServer, ServerHandler,
    handler::server::tool::ToolRouter,
    model::{
        Implementation, ListResourcesResult, PaginatedRequestParam, ProtocolVersion,
        ReadResourceRequestParam, ReadResourceResult, Resource, ResourceContents,
        ServerCapabilities, ServerInfo,
    },
    service::RequestContext,
    tool, tool_handler, tool_router,
};

use crate::config::Config;
use crate::error::WorkspaceError;
use crate::resources;
use crate::store::Store;
use crate::tools::{
    FileOperationsInput, FileOperationsOutput, NoteManagerInput, NoteManagerOutput,
    SystemInfoInput, SystemInfoOutput, TaskManagerInput, TaskManagerOutput, WebRequestInput,
    WebRequestOutput, handle_file_operations, handle_note_manager, handle_system_info,
    handle_task_manager, handle_web_request,
};

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

/// User-Agent header for outbound requests.
const USER_AGENT: &str = concat!("workspace-mcp/", env!("CARGO_PKG_VERSION"));

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Workspace MCP server.
#[derive(Clone)]
pub struct Server {
    tool_router: ToolRouter<Self>,
    config: Arc<Config>,
    store: Arc<Store>,
    client: reqwest::Client,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl Server {
    /// Create the workspace directory if needed and open the database inside it.
    pub fn new(config: Config) -> Result<Self, WorkspaceError> {
        std::fs::create_dir_all(&config.workspace_dir)?;
        let store = Store::open(config.database_path())?;

        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| WorkspaceError::Internal(format!("failed to build HTTP client: {e}")))?;

        tracing::info!(
            "Workspace at {} (database {})",
            config.workspace_dir.display(),
            config.database_name
        );

        Ok(Self {
            tool_router: Self::tool_router(),
            config: Arc::new(config),
            store: Arc::new(store),
            client,
        })
    }

    /// Get the active configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Get the note and task store.
    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    /// Public wrapper for file_operations (for testing).
    pub async fn files(
        &self,
        input: FileOperationsInput,
    ) -> Result<FileOperationsOutput, McpError> {
        self.file_operations(Parameters(input)).await.map(|j| j.0)
    }

    /// Public wrapper for note_manager (for testing).
    pub async fn notes(
        &self,
        input: NoteManagerInput,
    ) -> Result<NoteManagerOutput, McpError> {
        self.note_manager(Parameters(input)).await.map(|j| j.0)
    }

    /// Public wrapper for task_manager (for testing).
    pub async fn tasks(
        &self,
        input: TaskManagerInput,
    ) -> Result<TaskManagerOutput, McpError> {
        self.task_manager(Parameters(input)).await.map(|j| j.0)
    }

    /// Public wrapper for system_info (for testing).
    pub async fn system(
        &self,
        input: SystemInfoInput,
    ) -> Result<SystemInfoOutput, McpError> {
        self.system_info(Parameters(input)).await.map(|j| j.0)
    }

    /// Public wrapper for web_request (for testing).
    pub async fn request(
        &self,
        input: WebRequestInput,
    ) -> Result<WebRequestOutput, McpError> {
        self.web_request(Parameters(input)).await.map(|j| j.0)
    }

    /// Resources exposed by this server.
    pub fn resources(&self) -> Vec<Resource> {
        resources::list()
    }

    /// Read a resource body by URI.
    pub fn read_resource_text(&self, uri: &str) -> Result<String, McpError> {
        resources::read(&self.config, &self.store, uri)
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations: Tool Router
//--------------------------------------------------------------------------------------------------

#[tool_router]
impl Server {
    /// Reads, writes, lists or deletes files inside the workspace directory.
    #[tool(
        name = "file_operations",
        description = "Read, write, list or delete files in the workspace directory. Filenames are relative to the workspace."
    )]
    async fn file_operations(
        &self,
        params: Parameters<FileOperationsInput>,
    ) -> Result<Json<FileOperationsOutput>, McpError> {
        handle_file_operations(&self.config, params).await
    }

    /// Creates, reads, updates, deletes and searches notes.
    #[tool(
        name = "note_manager",
        description = "Create, read, update, delete or search notes stored in the workspace database."
    )]
    async fn note_manager(
        &self,
        params: Parameters<NoteManagerInput>,
    ) -> Result<Json<NoteManagerOutput>, McpError> {
        handle_note_manager(&self.store, params).await
    }

    /// Creates, lists, updates, completes and deletes tasks.
    #[tool(
        name = "task_manager",
        description = "Create, list, update, complete or delete tasks. Due dates use YYYY-MM-DD."
    )]
    async fn task_manager(
        &self,
        params: Parameters<TaskManagerInput>,
    ) -> Result<Json<TaskManagerOutput>, McpError> {
        handle_task_manager(&self.store, params).await
    }

    #[tool(
        name = "system_info",
        description = "Get disk usage, memory, CPU, the current time or the weather for a location."
    )]
    async fn system_info(
        &self,
        params: Parameters<SystemInfoInput>,
    ) -> Result<Json<SystemInfoOutput>, McpError> {
        handle_system_info(&self.config, &self.client, params).await
    }

    /// Sends a GET or POST request and returns the start of the response.
    #[tool(
        name = "web_request",
        description = "Send an HTTP GET or POST request and return the status and the beginning of the response body."
    )]
    async fn web_request(
        &self,
        params: Parameters<WebRequestInput>,
    ) -> Result<Json<WebRequestOutput>, McpError> {
        handle_web_request(&self.config, &self.client, params).await
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations: Server Handler
//--------------------------------------------------------------------------------------------------

#[tool_handler]
impl ServerHandler for Server {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder()
                .enable_tools()
                .enable_resources()
                .build(),
            server_info: Implementation::from_build_env(),
            instructions: Some(
                "Workspace MCP server. Manage files with file_operations, notes with \
                 note_manager and tasks with task_manager. Query the host with system_info \
                 and fetch URLs with web_request. Resources mcp://workspace-files, \
                 mcp://notes and mcp://tasks expose the same data as JSON."
                    .to_string(),
            ),
        }
    }

    async fn list_resources(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListResourcesResult, McpError> {
        Ok(ListResourcesResult::with_all_items(self.resources()))
    }

    async fn read_resource(
        &self,
        request: ReadResourceRequestParam,
        _context: RequestContext<RoleServer>,
    ) -> Result<ReadResourceResult, McpError> {
        let text = self.read_resource_text(&request.uri)?;

        Ok(ReadResourceResult {
            contents: vec![ResourceContents::text(text, request.uri)],
        })
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
