//! note_manager tool implementation.

use rmcp::handler::server::wrapper::Parameters;
use rmcp::{ErrorData as McpError, Json};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::{Result, WorkspaceError};
use crate::store::{Note, Store};

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

/// Title given to notes created without one.
pub const DEFAULT_NOTE_TITLE: &str = "Untitled";

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum NoteAction {
    Create,
    Read,
    Update,
    Delete,
    Search,
}

/// Input for note_manager tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct NoteManagerInput {
    /// Operation to perform: create, read, update, delete or search.
    pub action: NoteAction,

    /// Note title (create, update). Defaults to "Untitled" on create.
    #[serde(default)]
    pub title: Option<String>,

    /// Note body (create, update).
    #[serde(default)]
    pub content: Option<String>,

    /// Note ID (read, update, delete).
    #[serde(default)]
    pub note_id: Option<i64>,

    /// Case-insensitive text to look for in titles and bodies (search). Empty matches all notes.
    #[serde(default)]
    pub search_query: Option<String>,
}

/// Output for note_manager tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct NoteManagerOutput {
    pub action: NoteAction,

    /// Human-readable summary.
    pub message: String,

    /// The affected note (create, read, update, delete).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<Note>,

    /// Matching notes, most recently updated first (search).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<Vec<Note>>,
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Handle the note_manager tool call.
pub async fn handle_note_manager(
    store: &Store,
    params: Parameters<NoteManagerInput>,
) -> std::result::Result<Json<NoteManagerOutput>, McpError> {
    let input = params.0;
    let action = input.action;

    run(store, input).map(Json).map_err(|e| {
        tracing::debug!(?action, error = %e, "note operation failed");
        e.to_mcp_error()
    })
}

fn run(store: &Store, input: NoteManagerInput) -> Result<NoteManagerOutput> {
    let action = input.action;
    let reply = |message: String, note: Option<Note>, notes: Option<Vec<Note>>| NoteManagerOutput {
        action,
        message,
        note,
        notes,
    };

    match action {
        NoteAction::Create => {
            let title = input.title.as_deref().map_or(DEFAULT_NOTE_TITLE, note_title);
            let content = input.content.as_deref().unwrap_or_default();

            let note = store.create_note(title, content)?;
            tracing::info!("Created note {}", note.id);
            Ok(reply(format!("Created note {}", note.id), Some(note), None))
        }
        NoteAction::Read => {
            let id = require_id(input.note_id)?;
            let note = store.get_note(id)?.ok_or(WorkspaceError::NoteNotFound(id))?;
            Ok(reply(format!("Note {id}"), Some(note), None))
        }
        NoteAction::Update => {
            let id = require_id(input.note_id)?;
            if input.title.is_none() && input.content.is_none() {
                return Err(WorkspaceError::NothingToUpdate);
            }

            let title = input.title.as_deref().map(note_title);
            let note = store
                .update_note(id, title, input.content.as_deref())?
                .ok_or(WorkspaceError::NoteNotFound(id))?;
            Ok(reply(format!("Updated note {id}"), Some(note), None))
        }
        NoteAction::Delete => {
            let id = require_id(input.note_id)?;
            let note = store.get_note(id)?.ok_or(WorkspaceError::NoteNotFound(id))?;
            if !store.delete_note(id)? {
                return Err(WorkspaceError::NoteNotFound(id));
            }
            tracing::info!("Deleted note {}", id);
            Ok(reply(format!("Deleted note {id}"), Some(note), None))
        }
        NoteAction::Search => {
            let query = input.search_query.unwrap_or_default();
            let notes = store.search_notes(&query)?;
            let message = if query.is_empty() {
                format!("{} note(s)", notes.len())
            } else {
                format!("Found {} note(s) matching '{}'", notes.len(), query)
            };
            Ok(reply(message, None, Some(notes)))
        }
    }
}

/// Trimmed title, or the default when blank.
fn note_title(title: &str) -> &str {
    match title.trim() {
        "" => DEFAULT_NOTE_TITLE,
        trimmed => trimmed,
    }
}

fn require_id(id: Option<i64>) -> Result<i64> {
    id.ok_or(WorkspaceError::MissingArgument("note_id"))
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn input(action: NoteAction) -> NoteManagerInput {
        NoteManagerInput {
            action,
            title: None,
            content: None,
            note_id: None,
            search_query: None,
        }
    }

    fn create(store: &Store, title: &str, content: &str) -> Note {
        run(
            store,
            NoteManagerInput {
                title: Some(title.to_string()),
                content: Some(content.to_string()),
                ..input(NoteAction::Create)
            },
        )
        .unwrap()
        .note
        .unwrap()
    }

    #[test]
    fn test_create_defaults_to_untitled() {
        let store = Store::open_in_memory().unwrap();

        let note = run(&store, input(NoteAction::Create)).unwrap().note.unwrap();
        assert_eq!(note.title, "Untitled");
        assert_eq!(note.content, "");

        let note = create(&store, "   ", "body");
        assert_eq!(note.title, "Untitled");
    }

    #[test]
    fn test_read_note() {
        let store = Store::open_in_memory().unwrap();
        let created = create(&store, "Plan", "step 1");

        let out = run(
            &store,
            NoteManagerInput {
                note_id: Some(created.id),
                ..input(NoteAction::Read)
            },
        )
        .unwrap();
        assert_eq!(out.note, Some(created));
    }

    #[test]
    fn test_missing_note_id() {
        let store = Store::open_in_memory().unwrap();
        for action in [NoteAction::Read, NoteAction::Update, NoteAction::Delete] {
            let err = run(&store, input(action)).unwrap_err();
            assert_eq!(err.code(), "MISSING_ARGUMENT");
        }
    }

    #[test]
    fn test_note_not_found() {
        let store = Store::open_in_memory().unwrap();
        let err = run(
            &store,
            NoteManagerInput {
                note_id: Some(404),
                ..input(NoteAction::Read)
            },
        )
        .unwrap_err();
        assert_eq!(err.code(), "NOTE_NOT_FOUND");

        let err = run(
            &store,
            NoteManagerInput {
                note_id: Some(404),
                title: Some("x".into()),
                ..input(NoteAction::Update)
            },
        )
        .unwrap_err();
        assert_eq!(err.code(), "NOTE_NOT_FOUND");
    }

    #[test]
    fn test_update_requires_a_field() {
        let store = Store::open_in_memory().unwrap();
        let note = create(&store, "a", "b");

        let err = run(
            &store,
            NoteManagerInput {
                note_id: Some(note.id),
                ..input(NoteAction::Update)
            },
        )
        .unwrap_err();
        assert_eq!(err.code(), "NOTHING_TO_UPDATE");
    }

    #[test]
    fn test_update_content_only() {
        let store = Store::open_in_memory().unwrap();
        let note = create(&store, "Title", "old");

        let updated = run(
            &store,
            NoteManagerInput {
                note_id: Some(note.id),
                content: Some("new".into()),
                ..input(NoteAction::Update)
            },
        )
        .unwrap()
        .note
        .unwrap();
        assert_eq!(updated.title, "Title");
        assert_eq!(updated.content, "new");
    }

    #[test]
    fn test_update_blank_title_becomes_default() {
        let store = Store::open_in_memory().unwrap();
        let note = create(&store, "Plan", "body");

        let updated = run(
            &store,
            NoteManagerInput {
                note_id: Some(note.id),
                title: Some("   ".into()),
                ..input(NoteAction::Update)
            },
        )
        .unwrap()
        .note
        .unwrap();
        assert_eq!(updated.title, DEFAULT_NOTE_TITLE);

        let updated = run(
            &store,
            NoteManagerInput {
                note_id: Some(note.id),
                title: Some("  Final plan ".into()),
                ..input(NoteAction::Update)
            },
        )
        .unwrap()
        .note
        .unwrap();
        assert_eq!(updated.title, "Final plan");
        assert_eq!(updated.content, "body");
    }

    #[test]
    fn test_delete_returns_deleted_note() {
        let store = Store::open_in_memory().unwrap();
        let note = create(&store, "bye", "");

        let out = run(
            &store,
            NoteManagerInput {
                note_id: Some(note.id),
                ..input(NoteAction::Delete)
            },
        )
        .unwrap();
        assert_eq!(out.note.unwrap().id, note.id);
        assert!(store.get_note(note.id).unwrap().is_none());
    }

    #[test]
    fn test_search() {
        let store = Store::open_in_memory().unwrap();
        create(&store, "Meeting", "agenda");
        create(&store, "Recipe", "pasta");

        let out = run(
            &store,
            NoteManagerInput {
                search_query: Some("AGENDA".into()),
                ..input(NoteAction::Search)
            },
        )
        .unwrap();
        let notes = out.notes.unwrap();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].title, "Meeting");

        let all = run(&store, input(NoteAction::Search)).unwrap().notes.unwrap();
        assert_eq!(all.len(), 2);
    }
}
