//! Envelopes stored as snapshot values for structured resources.
//!
//! Files snapshot their raw content. Documents and todo lists snapshot a
//! small JSON envelope describing what the turn did and what restoring it
//! needs.

use prizm_persist::Result;
use serde::Deserialize;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::resources::TodoList;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentAction {
    Create,
    Update,
    Delete,
}

/// Snapshot value for a `[doc:<id>]` key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentSnapshot {
    pub action: DocumentAction,
    /// Stored version holding the pre-turn title and content.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version_before: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relative_path: Option<String>,
}

impl DocumentSnapshot {
    pub fn created() -> Self {
        Self {
            action: DocumentAction::Create,
            version_before: None,
            title: None,
            relative_path: None,
        }
    }

    pub fn updated(version_before: u64, title: &str) -> Self {
        Self {
            action: DocumentAction::Update,
            version_before: Some(version_before),
            title: Some(title.to_string()),
            relative_path: None,
        }
    }

    pub fn deleted(version_before: u64, title: &str, relative_path: Option<&str>) -> Self {
        Self {
            action: DocumentAction::Delete,
            version_before: Some(version_before),
            title: Some(title.to_string()),
            relative_path: relative_path.map(str::to_string),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TodoAction {
    CreateList,
    Modify,
}

/// Snapshot value for a `[todo:<id>]` key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TodoSnapshot {
    pub action: TodoAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub list_snapshot: Option<TodoList>,
}

impl TodoSnapshot {
    pub fn created_list() -> Self {
        Self {
            action: TodoAction::CreateList,
            list_snapshot: None,
        }
    }

    pub fn modified(list: TodoList) -> Self {
        Self {
            action: TodoAction::Modify,
            list_snapshot: Some(list),
        }
    }
}

pub fn encode<T: Serialize>(envelope: &T) -> Result<String> {
    Ok(serde_json::to_string(envelope)?)
}

pub fn decode<T: DeserializeOwned>(raw: &str) -> Result<T> {
    Ok(serde_json::from_str(raw)?)
}
