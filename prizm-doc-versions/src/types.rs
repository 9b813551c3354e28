use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;

/// Who produced a version row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VersionSource {
    Agent,
    User,
    Rollback,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionProvenance {
    pub source: VersionSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checkpoint_id: Option<String>,
}

impl VersionProvenance {
    pub fn agent(session_id: &str) -> Self {
        Self {
            source: VersionSource::Agent,
            session_id: Some(session_id.to_string()),
            checkpoint_id: None,
        }
    }

    pub fn user() -> Self {
        Self {
            source: VersionSource::User,
            session_id: None,
            checkpoint_id: None,
        }
    }

    pub fn rollback(session_id: &str, checkpoint_id: &str) -> Self {
        Self {
            source: VersionSource::Rollback,
            session_id: Some(session_id.to_string()),
            checkpoint_id: Some(checkpoint_id.to_string()),
        }
    }
}

/// One stored revision of a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentVersion {
    /// 1-based, contiguous per document.
    pub version: u64,
    pub timestamp: DateTime<Utc>,
    pub title: String,
    pub content: String,
    /// Hex SHA-256 of `content`.
    pub content_hash: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provenance: Option<VersionProvenance>,
}

/// Full version history of a single document, oldest first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentVersionHistory {
    pub document_id: String,
    #[serde(default)]
    pub versions: Vec<DocumentVersion>,
}

impl DocumentVersionHistory {
    pub fn empty(document_id: &str) -> Self {
        Self {
            document_id: document_id.to_string(),
            versions: Vec::new(),
        }
    }

    pub fn latest(&self) -> Option<&DocumentVersion> {
        self.versions.last()
    }

    pub fn previous(&self) -> Option<&DocumentVersion> {
        self.versions.iter().rev().nth(1)
    }

    pub fn get(&self, version: u64) -> Option<&DocumentVersion> {
        self.versions.iter().find(|v| v.version == version)
    }
}
