//! MCP tool implementations.

mod files;
mod notes;
mod system;
mod tasks;
mod web;

pub use files::{
    FileAction, FileEntry, FileOperationsInput, FileOperationsOutput, handle_file_operations,
    list_workspace_files, resolve_filename,
};
pub use notes::{
    DEFAULT_NOTE_TITLE, NoteAction, NoteManagerInput, NoteManagerOutput, handle_note_manager,
};
pub use system::{
    DEFAULT_WEATHER_LOCATION, SystemCommand, SystemInfoInput, SystemInfoOutput, handle_system_info,
};
pub use tasks::{TaskAction, TaskManagerInput, TaskManagerOutput, handle_task_manager};
pub use web::{HttpMethod, WebRequestInput, WebRequestOutput, handle_web_request};
