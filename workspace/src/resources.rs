//! Read-only resources exposed by the workspace server.

use rmcp::ErrorData as McpError;
use rmcp::model::{AnnotateAble, RawResource, Resource};
use serde::Serialize;
use serde_json::json;

use crate::config::Config;
use crate::error::{Result, WorkspaceError};
use crate::store::Store;
use crate::tools::list_workspace_files;

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

pub const WORKSPACE_FILES_URI: &str = "mcp://workspace-files";

pub const NOTES_URI: &str = "mcp://notes";

pub const TASKS_URI: &str = "mcp://tasks";

const JSON_MIME: &str = "application/json";

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Resources advertised by `resources/list`.
pub fn list() -> Vec<Resource> {
    [
        (
            WORKSPACE_FILES_URI,
            "Workspace Files",
            "Files stored in the workspace directory",
        ),
        (NOTES_URI, "Stored Notes", "Notes saved in the database"),
        (TASKS_URI, "Task List", "Tasks tracked in the database"),
    ]
    .into_iter()
    .map(|(uri, name, description)| {
        let mut resource = RawResource::new(uri, name);
        resource.description = Some(description.to_string());
        resource.mime_type = Some(JSON_MIME.to_string());
        resource.no_annotation()
    })
    .collect()
}

/// Render the resource at `uri` as pretty-printed JSON.
pub fn read(config: &Config, store: &Store, uri: &str) -> std::result::Result<String, McpError> {
    let rendered = match uri {
        WORKSPACE_FILES_URI => list_workspace_files(config, true).and_then(|f| to_json(&f)),
        NOTES_URI => store.list_notes().and_then(|n| to_json(&n)),
        TASKS_URI => store.list_tasks(None).and_then(|t| to_json(&t)),
        _ => {
            return Err(McpError::resource_not_found(
                format!("Unknown resource: {uri}"),
                Some(json!({ "uri": uri })),
            ));
        }
    };

    rendered.map_err(|e: WorkspaceError| {
        tracing::warn!(uri, error = %e, "failed to read resource");
        e.to_mcp_error()
    })
}

fn to_json<T: Serialize>(value: &T) -> Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
