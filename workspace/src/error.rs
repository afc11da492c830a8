//! Error types for the workspace MCP server.

use rmcp::ErrorData as McpError;
use serde_json::json;

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum WorkspaceError {
    #[error("Missing required argument: {0}")]
    MissingArgument(&'static str),

    #[error("Invalid filename: {0}")]
    InvalidFilename(String),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Path is a directory, not a file: {0}")]
    IsDirectory(String),

    #[error("Note not found: {0}")]
    NoteNotFound(i64),

    #[error("Task not found: {0}")]
    TaskNotFound(i64),

    #[error("Title must not be empty")]
    EmptyTitle,

    #[error("Invalid due date '{0}': expected YYYY-MM-DD")]
    InvalidDueDate(String),

    #[error("Nothing to update: provide at least one field to change")]
    NothingToUpdate,

    #[error("Unsupported on this platform: {0}")]
    Unsupported(String),

    #[error("Command failed: {0}")]
    CommandFailed(String),

    #[error("Command timed out after {0}ms")]
    CommandTimeout(u64),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Invalid header: {0}")]
    InvalidHeader(String),

    #[error("Request timeout after {0}ms")]
    RequestTimeout(u64),

    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type for workspace operations.
pub type Result<T> = std::result::Result<T, WorkspaceError>;

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl WorkspaceError {
    /// Get the error code for this error variant.
    pub fn code(&self) -> &'static str {
        match self {
            Self::MissingArgument(_) => "MISSING_ARGUMENT",
            Self::InvalidFilename(_) => "INVALID_FILENAME",
            Self::FileNotFound(_) => "FILE_NOT_FOUND",
            Self::IsDirectory(_) => "IS_DIRECTORY",
            Self::NoteNotFound(_) => "NOTE_NOT_FOUND",
            Self::TaskNotFound(_) => "TASK_NOT_FOUND",
            Self::EmptyTitle => "EMPTY_TITLE",
            Self::InvalidDueDate(_) => "INVALID_DUE_DATE",
            Self::NothingToUpdate => "NOTHING_TO_UPDATE",
            Self::Unsupported(_) => "UNSUPPORTED",
            Self::CommandFailed(_) => "COMMAND_FAILED",
            Self::CommandTimeout(_) => "COMMAND_TIMEOUT",
            Self::InvalidUrl(_) => "INVALID_URL",
            Self::InvalidHeader(_) => "INVALID_HEADER",
            Self::RequestTimeout(_) => "REQUEST_TIMEOUT",
            Self::RequestFailed(_) => "REQUEST_FAILED",
            Self::Database(_) => "DATABASE_ERROR",
            Self::Io(_) => "IO_ERROR",
            Self::Serialization(_) => "SERIALIZATION_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Whether the error is caused by the server rather than the caller's input.
    pub fn is_internal(&self) -> bool {
        matches!(
            self,
            Self::Database(_)
                | Self::Io(_)
                | Self::Serialization(_)
                | Self::Internal(_)
                | Self::CommandFailed(_)
        )
    }

    /// Convert to MCP error with structured data.
    pub fn to_mcp_error(&self) -> McpError {
        let data = Some(json!({ "code": self.code() }));
        if self.is_internal() {
            McpError::internal_error(self.to_string(), data)
        } else {
            McpError::invalid_params(self.to_string(), data)
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
