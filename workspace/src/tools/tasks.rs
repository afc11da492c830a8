//! task_manager tool implementation.

use chrono::NaiveDate;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::{ErrorData as McpError, Json};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::{Result, WorkspaceError};
use crate::store::{Store, Task, TaskChanges, TaskStatus};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum TaskAction {
    Create,
    List,
    Update,
    Complete,
    Delete,
}

/// Input for task_manager tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct TaskManagerInput {
    /// Operation to perform: create, list, update, complete or delete.
    pub action: TaskAction,

    /// Task title (required for create).
    #[serde(default)]
    pub title: Option<String>,

    /// Task description.
    #[serde(default)]
    pub description: Option<String>,

    /// Task ID (update, complete, delete).
    #[serde(default)]
    pub task_id: Option<i64>,

    /// Due date in YYYY-MM-DD format.
    #[serde(default)]
    pub due_date: Option<String>,

    /// New status (update) or status filter (list).
    #[serde(default)]
    pub status: Option<TaskStatus>,
}

/// Output for task_manager tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct TaskManagerOutput {
    pub action: TaskAction,

    /// Human-readable summary.
    pub message: String,

    /// The affected task (create, update, complete, delete).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task: Option<Task>,

    /// Tasks, newest first (list).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tasks: Option<Vec<Task>>,
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Handle the task_manager tool call.
pub async fn handle_task_manager(
    store: &Store,
    params: Parameters<TaskManagerInput>,
) -> std::result::Result<Json<TaskManagerOutput>, McpError> {
    let input = params.0;
    let action = input.action;

    run(store, input).map(Json).map_err(|e| {
        tracing::debug!(?action, error = %e, "task operation failed");
        e.to_mcp_error()
    })
}

fn run(store: &Store, input: TaskManagerInput) -> Result<TaskManagerOutput> {
    let action = input.action;
    let reply = |message: String, task: Option<Task>, tasks: Option<Vec<Task>>| TaskManagerOutput {
        action,
        message,
        task,
        tasks,
    };

    match action {
        TaskAction::Create => {
            let title = input
                .title
                .as_deref()
                .ok_or(WorkspaceError::MissingArgument("title"))?;
            let title = non_blank_title(title)?;
            let due_date = input.due_date.as_deref().map(validate_due_date).transpose()?;

            let task = store.create_task(title, input.description.as_deref(), due_date.as_deref())?;
            tracing::info!("Created task {}", task.id);
            Ok(reply(format!("Created task {}", task.id), Some(task), None))
        }
        TaskAction::List => {
            let tasks = store.list_tasks(input.status)?;
            let message = match input.status {
                Some(status) => format!("{} {} task(s)", tasks.len(), status),
                None => format!("{} task(s)", tasks.len()),
            };
            Ok(reply(message, None, Some(tasks)))
        }
        TaskAction::Update => {
            let id = require_id(input.task_id)?;
            let changes = TaskChanges {
                title: input
                    .title
                    .as_deref()
                    .map(non_blank_title)
                    .transpose()?
                    .map(String::from),
                description: input.description,
                due_date: input.due_date.as_deref().map(validate_due_date).transpose()?,
                status: input.status,
            };
            if changes.is_empty() {
                return Err(WorkspaceError::NothingToUpdate);
            }

            let task = store
                .update_task(id, &changes)?
                .ok_or(WorkspaceError::TaskNotFound(id))?;
            Ok(reply(format!("Updated task {id}"), Some(task), None))
        }
        TaskAction::Complete => {
            let id = require_id(input.task_id)?;
            let changes = TaskChanges {
                status: Some(TaskStatus::Completed),
                ..Default::default()
            };

            let task = store
                .update_task(id, &changes)?
                .ok_or(WorkspaceError::TaskNotFound(id))?;
            tracing::info!("Completed task {}", id);
            Ok(reply(format!("Completed task {id}"), Some(task), None))
        }
        TaskAction::Delete => {
            let id = require_id(input.task_id)?;
            let task = store.get_task(id)?.ok_or(WorkspaceError::TaskNotFound(id))?;
            if !store.delete_task(id)? {
                return Err(WorkspaceError::TaskNotFound(id));
            }
            tracing::info!("Deleted task {}", id);
            Ok(reply(format!("Deleted task {id}"), Some(task), None))
        }
    }
}

fn require_id(id: Option<i64>) -> Result<i64> {
    id.ok_or(WorkspaceError::MissingArgument("task_id"))
}

fn non_blank_title(title: &str) -> Result<&str> {
    let title = title.trim();
    if title.is_empty() {
        return Err(WorkspaceError::EmptyTitle);
    }
    Ok(title)
}

/// Accept only calendar dates in `YYYY-MM-DD` form, normalized.
fn validate_due_date(raw: &str) -> Result<String> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map(|d| d.format("%Y-%m-%d").to_string())
        .map_err(|_| WorkspaceError::InvalidDueDate(raw.to_string()))
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn input(action: TaskAction) -> TaskManagerInput {
        TaskManagerInput {
            action,
            title: None,
            description: None,
            task_id: None,
            due_date: None,
            status: None,
        }
    }

    fn create(store: &Store, title: &str) -> Task {
        run(
            store,
            TaskManagerInput {
                title: Some(title.to_string()),
                ..input(TaskAction::Create)
            },
        )
        .unwrap()
        .task
        .unwrap()
    }

    // ==================== Validation Tests ====================

    #[test]
    fn test_validate_due_date() {
        assert_eq!(validate_due_date("2030-02-28").unwrap(), "2030-02-28");
        assert_eq!(validate_due_date(" 2030-12-01 ").unwrap(), "2030-12-01");
        assert!(validate_due_date("2030-02-30").is_err());
        assert!(validate_due_date("tomorrow").is_err());
        assert!(validate_due_date("").is_err());
    }

    #[test]
    fn test_non_blank_title() {
        assert_eq!(non_blank_title("  Ship it ").unwrap(), "Ship it");
        assert_eq!(non_blank_title(" \t").unwrap_err().code(), "EMPTY_TITLE");
    }

    // ==================== Action Tests ====================

    #[test]
    fn test_create_requires_title() {
        let store = Store::open_in_memory().unwrap();

        let err = run(&store, input(TaskAction::Create)).unwrap_err();
        assert_eq!(err.code(), "MISSING_ARGUMENT");

        let err = run(
            &store,
            TaskManagerInput {
                title: Some("   ".into()),
                ..input(TaskAction::Create)
            },
        )
        .unwrap_err();
        assert_eq!(err.code(), "EMPTY_TITLE");
    }

    #[test]
    fn test_create_with_due_date() {
        let store = Store::open_in_memory().unwrap();
        let task = run(
            &store,
            TaskManagerInput {
                title: Some("Taxes".into()),
                description: Some("file them".into()),
                due_date: Some("2030-04-15".into()),
                ..input(TaskAction::Create)
            },
        )
        .unwrap()
        .task
        .unwrap();

        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(task.due_date.as_deref(), Some("2030-04-15"));
        assert_eq!(task.description.as_deref(), Some("file them"));
    }

    #[test]
    fn test_create_rejects_bad_due_date() {
        let store = Store::open_in_memory().unwrap();
        let err = run(
            &store,
            TaskManagerInput {
                title: Some("x".into()),
                due_date: Some("15/04/2030".into()),
                ..input(TaskAction::Create)
            },
        )
        .unwrap_err();
        assert_eq!(err.code(), "INVALID_DUE_DATE");
        assert!(store.list_tasks(None).unwrap().is_empty());
    }

    #[test]
    fn test_complete_and_list_by_status() {
        let store = Store::open_in_memory().unwrap();
        let first = create(&store, "first");
        create(&store, "second");

        let done = run(
            &store,
            TaskManagerInput {
                task_id: Some(first.id),
                ..input(TaskAction::Complete)
            },
        )
        .unwrap()
        .task
        .unwrap();
        assert_eq!(done.status, TaskStatus::Completed);

        let out = run(
            &store,
            TaskManagerInput {
                status: Some(TaskStatus::Pending),
                ..input(TaskAction::List)
            },
        )
        .unwrap();
        let pending = out.tasks.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].title, "second");

        let all = run(&store, input(TaskAction::List)).unwrap().tasks.unwrap();
        assert_eq!(all.len(), 2);
    }

    #[test]
    fn test_update_fields() {
        let store = Store::open_in_memory().unwrap();
        let task = create(&store, "draft");

        let updated = run(
            &store,
            TaskManagerInput {
                task_id: Some(task.id),
                title: Some("final".into()),
                status: Some(TaskStatus::InProgress),
                ..input(TaskAction::Update)
            },
        )
        .unwrap()
        .task
        .unwrap();
        assert_eq!(updated.title, "final");
        assert_eq!(updated.status, TaskStatus::InProgress);
    }

    #[test]
    fn test_update_requires_a_field() {
        let store = Store::open_in_memory().unwrap();
        let task = create(&store, "t");

        let err = run(
            &store,
            TaskManagerInput {
                task_id: Some(task.id),
                ..input(TaskAction::Update)
            },
        )
        .unwrap_err();
        assert_eq!(err.code(), "NOTHING_TO_UPDATE");
    }

    #[test]
    fn test_missing_task_id() {
        let store = Store::open_in_memory().unwrap();
        for action in [TaskAction::Update, TaskAction::Complete, TaskAction::Delete] {
            let err = run(&store, input(action)).unwrap_err();
            assert_eq!(err.code(), "MISSING_ARGUMENT");
        }
    }

    #[test]
    fn test_unknown_task() {
        let store = Store::open_in_memory().unwrap();
        for action in [TaskAction::Complete, TaskAction::Delete] {
            let err = run(
                &store,
                TaskManagerInput {
                    task_id: Some(77),
                    ..input(action)
                },
            )
            .unwrap_err();
            assert_eq!(err.code(), "TASK_NOT_FOUND");
        }
    }

    #[test]
    fn test_delete() {
        let store = Store::open_in_memory().unwrap();
        let task = create(&store, "gone");

        let out = run(
            &store,
            TaskManagerInput {
                task_id: Some(task.id),
                ..input(TaskAction::Delete)
            },
        )
        .unwrap();
        assert_eq!(out.task.unwrap().title, "gone");
        assert!(store.get_task(task.id).unwrap().is_none());
    }

    #[test]
    fn test_status_deserializes_snake_case() {
        let input: TaskManagerInput =
            serde_json::from_str(r#"{"action": "list", "status": "in_progress"}"#).unwrap();
        assert_eq!(input.action, TaskAction::List);
        assert_eq!(input.status, Some(TaskStatus::InProgress));
    }
}
