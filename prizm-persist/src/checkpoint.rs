use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;

use crate::ids::generate_id;

/// A checkpoint marks a position in a session's message stream that rollback
/// can return to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Checkpoint {
    pub id: String,
    pub session_id: String,
    /// Number of messages that existed when the turn started. Rolling back to
    /// this checkpoint truncates the message list to this length.
    pub message_index: usize,
    pub caption: String,
    pub created_at: DateTime<Utc>,
    /// Display-only summary of what the turn changed.
    #[serde(default)]
    pub file_changes: Vec<FileChange>,
    #[serde(default)]
    pub completed: bool,
}

/// Kind of change a turn made to a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileChangeAction {
    Created,
    Modified,
    Deleted,
    Moved,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileChange {
    pub path: String,
    pub action: FileChangeAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_path: Option<String>,
}

impl FileChange {
    pub fn new(path: impl Into<String>, action: FileChangeAction) -> Self {
        Self {
            path: path.into(),
            action,
            from_path: None,
        }
    }

    pub fn moved(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            path: to.into(),
            action: FileChangeAction::Moved,
            from_path: Some(from.into()),
        }
    }
}

/// Open a new, incomplete checkpoint for a turn starting at `message_index`.
pub fn create_checkpoint(session_id: &str, message_index: usize, caption: &str) -> Checkpoint {
    Checkpoint {
        id: generate_id("cp"),
        session_id: session_id.to_string(),
        message_index,
        caption: caption.to_string(),
        created_at: Utc::now(),
        file_changes: Vec::new(),
        completed: false,
    }
}

/// Mark a checkpoint completed with the turn's change summary.
pub fn complete_checkpoint(checkpoint: Checkpoint, changes: Vec<FileChange>) -> Checkpoint {
    Checkpoint {
        file_changes: changes,
        completed: true,
        ..checkpoint
    }
}
