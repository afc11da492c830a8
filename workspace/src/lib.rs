//! Workspace MCP Server
//!
//! An MCP server that gives AI agents a private working directory together with a
//! small SQLite-backed notebook and task list.
//!
//! # Tools
//!
//! - **file_operations**: read, write, list and delete files in the workspace
//! - **note_manager**: create, read, update, delete and search notes
//! - **task_manager**: create, list, update, complete and delete tasks
//! - **system_info**: disk, memory, CPU, local time and weather reports
//! - **web_request**: HTTP GET/POST with a bounded response preview
//!
//! # Resources
//!
//! `mcp://workspace-files`, `mcp://notes` and `mcp://tasks` return the same data as
//! pretty-printed JSON.

pub mod config;
pub mod error;
pub mod resources;
pub mod server;
pub mod store;
pub mod tools;

pub use config::Config;
pub use error::{Result, WorkspaceError};
pub use server::Server;
pub use store::{Note, Store, Task, TaskStatus};
