//! file_operations tool implementation.

use std::fs;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use chrono::{DateTime, Local};
use ignore::WalkBuilder;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::{ErrorData as McpError, Json};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::{Result, WorkspaceError};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum FileAction {
    Read,
    Write,
    List,
    Delete,
}

/// Input for file_operations tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct FileOperationsInput {
    /// Operation to perform: read, write, list or delete.
    pub action: FileAction,

    /// File name relative to the workspace (required for read, write and delete).
    #[serde(default)]
    pub filename: Option<String>,

    /// Content to write (write only). Defaults to empty.
    #[serde(default)]
    pub content: Option<String>,
}

/// A file inside the workspace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FileEntry {
    /// File name.
    pub name: String,

    /// Path relative to the workspace directory.
    pub path: String,

    /// Size in bytes.
    pub size: u64,

    /// Last modification time (RFC 3339, local time).
    pub modified: String,
}

/// Output for file_operations tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct FileOperationsOutput {
    pub action: FileAction,

    /// Human-readable summary.
    pub message: String,

    /// Workspace files (list only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub files: Option<Vec<FileEntry>>,

    /// File contents (read only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,

    /// Number of bytes written (write only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bytes_written: Option<usize>,
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Handle the file_operations tool call.
pub async fn handle_file_operations(
    config: &Config,
    params: Parameters<FileOperationsInput>,
) -> std::result::Result<Json<FileOperationsOutput>, McpError> {
    let input = params.0;
    let action = input.action;

    run(config, input).map(Json).map_err(|e| {
        tracing::debug!(?action, error = %e, "file operation failed");
        e.to_mcp_error()
    })
}

fn run(config: &Config, input: FileOperationsInput) -> Result<FileOperationsOutput> {
    let mut output = FileOperationsOutput {
        action: input.action,
        message: String::new(),
        files: None,
        content: None,
        bytes_written: None,
    };

    match input.action {
        FileAction::List => {
            let files = list_workspace_files(config, false)?;
            output.message = format!("Found {} file(s) in workspace", files.len());
            output.files = Some(files);
        }
        FileAction::Read => {
            let (filename, path) = required_path(config, input.filename.as_deref())?;
            check_existing_file(&path, filename)?;
            let content = fs::read_to_string(&path)?;
            output.message = format!("Read {} byte(s) from {}", content.len(), filename);
            output.content = Some(content);
        }
        FileAction::Write => {
            let (filename, path) = required_path(config, input.filename.as_deref())?;
            if path.is_dir() {
                return Err(WorkspaceError::IsDirectory(filename.to_string()));
            }
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            let content = input.content.as_deref().unwrap_or_default();
            fs::write(&path, content)?;
            tracing::info!("Wrote {} byte(s) to {}", content.len(), path.display());
            output.message = format!("Wrote {} byte(s) to {}", content.len(), filename);
            output.bytes_written = Some(content.len());
        }
        FileAction::Delete => {
            let (filename, path) = required_path(config, input.filename.as_deref())?;
            check_existing_file(&path, filename)?;
            fs::remove_file(&path)?;
            tracing::info!("Deleted {}", path.display());
            output.message = format!("Deleted {filename}");
        }
    }

    Ok(output)
}

/// Map a client-supplied name to a path inside the workspace.
///
/// Rejects empty names, absolute paths, parent components and the database files.
pub fn resolve_filename(config: &Config, filename: &str) -> Result<PathBuf> {
    let invalid = |reason: &str| WorkspaceError::InvalidFilename(format!("{filename}: {reason}"));

    if filename.trim().is_empty() {
        return Err(invalid("empty name"));
    }

    let relative = Path::new(filename);
    let mut normal = PathBuf::new();
    for component in relative.components() {
        match component {
            Component::Normal(part) => normal.push(part),
            Component::CurDir => {}
            Component::ParentDir => return Err(invalid("must not contain '..'")),
            Component::RootDir | Component::Prefix(_) => {
                return Err(invalid("must be relative to the workspace"));
            }
        }
    }

    if normal.as_os_str().is_empty() {
        return Err(invalid("empty name"));
    }
    if config.is_reserved(&normal.to_string_lossy()) {
        return Err(invalid("reserved for the database"));
    }

    Ok(config.workspace_dir.join(normal))
}

/// Regular files in the workspace, excluding the database, sorted by path.
///
/// With `recursive` false only direct children are returned.
pub fn list_workspace_files(config: &Config, recursive: bool) -> Result<Vec<FileEntry>> {
    let root = &config.workspace_dir;
    if !root.is_dir() {
        return Ok(Vec::new());
    }

    let mut walker = WalkBuilder::new(root);
    walker.standard_filters(false).follow_links(false);
    if !recursive {
        walker.max_depth(Some(1));
    }

    let mut files = Vec::new();
    for entry in walker.build() {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                tracing::warn!("Skipping unreadable workspace entry: {}", e);
                continue;
            }
        };

        if !entry.file_type().is_some_and(|t| t.is_file()) {
            continue;
        }

        let Ok(relative) = entry.path().strip_prefix(root) else {
            continue;
        };
        let relative = relative.to_string_lossy().to_string();
        if config.is_reserved(&relative) {
            continue;
        }

        let metadata = entry.metadata().map_err(|e| WorkspaceError::Internal(e.to_string()))?;
        files.push(FileEntry {
            name: entry.file_name().to_string_lossy().to_string(),
            path: relative,
            size: metadata.len(),
            modified: metadata
                .modified()
                .map(|t| DateTime::<Local>::from(t).to_rfc3339())
                .unwrap_or_default(),
        });
    }

    files.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(files)
}

fn required_path<'a>(config: &Config, filename: Option<&'a str>) -> Result<(&'a str, PathBuf)> {
    let filename = filename.ok_or(WorkspaceError::MissingArgument("filename"))?;
    Ok((filename, resolve_filename(config, filename)?))
}

fn check_existing_file(path: &Path, filename: &str) -> Result<()> {
    match fs::metadata(path) {
        Ok(meta) if meta.is_dir() => Err(WorkspaceError::IsDirectory(filename.to_string())),
        Ok(_) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            Err(WorkspaceError::FileNotFound(filename.to_string()))
        }
        Err(e) => Err(e.into()),
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup() -> (TempDir, Config) {
        let dir = TempDir::new().unwrap();
        let config = Config::default().with_workspace_dir(dir.path());
        (dir, config)
    }

    fn input(action: FileAction, filename: Option<&str>, content: Option<&str>) -> FileOperationsInput {
        FileOperationsInput {
            action,
            filename: filename.map(String::from),
            content: content.map(String::from),
        }
    }

    // ==================== resolve_filename tests ====================

    #[test]
    fn test_resolve_plain_name() {
        let (dir, config) = setup();
        let path = resolve_filename(&config, "notes.txt").unwrap();
        assert_eq!(path, dir.path().join("notes.txt"));
    }

    #[test]
    fn test_resolve_nested_name() {
        let (dir, config) = setup();
        let path = resolve_filename(&config, "./docs/a.md").unwrap();
        assert_eq!(path, dir.path().join("docs").join("a.md"));
    }

    #[test]
    fn test_resolve_rejects_escapes() {
        let (_dir, config) = setup();
        for bad in ["", "  ", "/etc/passwd", "../secret", "a/../../b", "."] {
            let err = resolve_filename(&config, bad).unwrap_err();
            assert_eq!(err.code(), "INVALID_FILENAME", "{bad:?}");
        }
    }

    #[test]
    fn test_resolve_rejects_database() {
        let (_dir, config) = setup();
        assert!(resolve_filename(&config, "notes.db").is_err());
        assert!(resolve_filename(&config, "notes.db-journal").is_err());
    }

    // ==================== action tests ====================

    #[test]
    fn test_write_then_read() {
        let (_dir, config) = setup();

        let out = run(&config, input(FileAction::Write, Some("hello.txt"), Some("hi there"))).unwrap();
        assert_eq!(out.bytes_written, Some(8));

        let out = run(&config, input(FileAction::Read, Some("hello.txt"), None)).unwrap();
        assert_eq!(out.content.as_deref(), Some("hi there"));
    }

    #[test]
    fn test_write_creates_parent_directories() {
        let (dir, config) = setup();
        run(&config, input(FileAction::Write, Some("a/b/c.txt"), Some("x"))).unwrap();
        assert!(dir.path().join("a/b/c.txt").is_file());
    }

    #[test]
    fn test_write_defaults_to_empty() {
        let (dir, config) = setup();
        let out = run(&config, input(FileAction::Write, Some("empty.txt"), None)).unwrap();
        assert_eq!(out.bytes_written, Some(0));
        assert_eq!(fs::read_to_string(dir.path().join("empty.txt")).unwrap(), "");
    }

    #[test]
    fn test_write_overwrites() {
        let (_dir, config) = setup();
        run(&config, input(FileAction::Write, Some("f.txt"), Some("long content"))).unwrap();
        run(&config, input(FileAction::Write, Some("f.txt"), Some("short"))).unwrap();

        let out = run(&config, input(FileAction::Read, Some("f.txt"), None)).unwrap();
        assert_eq!(out.content.as_deref(), Some("short"));
    }

    #[test]
    fn test_read_missing_file() {
        let (_dir, config) = setup();
        let err = run(&config, input(FileAction::Read, Some("nope.txt"), None)).unwrap_err();
        assert_eq!(err.code(), "FILE_NOT_FOUND");
    }

    #[test]
    fn test_read_directory() {
        let (dir, config) = setup();
        fs::create_dir(dir.path().join("sub")).unwrap();
        let err = run(&config, input(FileAction::Read, Some("sub"), None)).unwrap_err();
        assert_eq!(err.code(), "IS_DIRECTORY");
    }

    #[test]
    fn test_missing_filename() {
        let (_dir, config) = setup();
        for action in [FileAction::Read, FileAction::Write, FileAction::Delete] {
            let err = run(&config, input(action, None, None)).unwrap_err();
            assert_eq!(err.code(), "MISSING_ARGUMENT");
        }
    }

    #[test]
    fn test_delete() {
        let (dir, config) = setup();
        fs::write(dir.path().join("gone.txt"), "bye").unwrap();

        run(&config, input(FileAction::Delete, Some("gone.txt"), None)).unwrap();
        assert!(!dir.path().join("gone.txt").exists());

        let err = run(&config, input(FileAction::Delete, Some("gone.txt"), None)).unwrap_err();
        assert_eq!(err.code(), "FILE_NOT_FOUND");
    }

    #[test]
    fn test_list_skips_database_and_subdirectories() {
        let (dir, config) = setup();
        fs::write(dir.path().join("b.txt"), "bb").unwrap();
        fs::write(dir.path().join("a.txt"), "a").unwrap();
        fs::write(dir.path().join("notes.db"), "sqlite").unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("sub/c.txt"), "c").unwrap();

        let out = run(&config, input(FileAction::List, None, None)).unwrap();
        let files = out.files.unwrap();
        let names: Vec<&str> = files.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["a.txt", "b.txt"]);
        assert_eq!(files[1].size, 2);
        assert!(!files[0].modified.is_empty());
    }

    #[test]
    fn test_list_recursive() {
        let (dir, config) = setup();
        fs::write(dir.path().join("top.txt"), "").unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("sub/inner.txt"), "").unwrap();
        fs::write(dir.path().join(".hidden"), "").unwrap();

        let files = list_workspace_files(&config, true).unwrap();
        let paths: Vec<String> = files.into_iter().map(|f| f.path).collect();
        assert_eq!(
            paths,
            vec![
                ".hidden".to_string(),
                Path::new("sub").join("inner.txt").to_string_lossy().to_string(),
                "top.txt".to_string(),
            ]
        );
    }

    #[test]
    fn test_list_missing_workspace() {
        let config = Config::default().with_workspace_dir("/nonexistent/workspace/dir");
        assert!(list_workspace_files(&config, true).unwrap().is_empty());
    }
}
