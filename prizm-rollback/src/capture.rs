//! Capture helpers called by tool code before it mutates a resource.
//!
//! Each helper builds the right key and snapshot value so callers never
//! hand-assemble envelopes. Document helpers store the live document as a
//! version first, which guarantees `versionBefore` points at stored content.

use std::sync::Arc;

use prizm_doc_versions::DocumentVersionStore;
use prizm_persist::ResourceKey;
use prizm_persist::Result;
use prizm_persist::SnapshotCollector;

use crate::resources::Document;
use crate::resources::TodoList;
use crate::snapshot::DocumentSnapshot;
use crate::snapshot::TodoSnapshot;
use crate::snapshot::encode;

#[derive(Clone)]
pub struct SnapshotCapture {
    collector: Arc<SnapshotCollector>,
    versions: Arc<DocumentVersionStore>,
}

impl SnapshotCapture {
    pub fn new(collector: Arc<SnapshotCollector>, versions: Arc<DocumentVersionStore>) -> Self {
        Self {
            collector,
            versions,
        }
    }

    /// `previous` is the file content before the write, `None` when the file
    /// is being created.
    pub fn file(&self, session_id: &str, path: &str, previous: Option<String>) {
        self.collector.capture(session_id, path, previous);
    }

    pub fn document_created(&self, session_id: &str, document_id: &str) -> Result<()> {
        let key = ResourceKey::document(document_id).to_string();
        let value = encode(&DocumentSnapshot::created())?;
        self.collector.capture(session_id, &key, Some(value));
        Ok(())
    }

    /// Returns the version number recorded as `versionBefore`.
    pub async fn document_updated(&self, session_id: &str, current: &Document) -> Result<u64> {
        let version = self
            .versions
            .save_version(&current.id, &current.title, &current.content, None)
            .await?;
        let key = ResourceKey::document(&current.id).to_string();
        let value = encode(&DocumentSnapshot::updated(version.version, &current.title))?;
        self.collector.capture(session_id, &key, Some(value));
        Ok(version.version)
    }

    /// Returns the version number recorded as `versionBefore`.
    pub async fn document_deleted(&self, session_id: &str, current: &Document) -> Result<u64> {
        let version = self
            .versions
            .save_version(&current.id, &current.title, &current.content, None)
            .await?;
        let key = ResourceKey::document(&current.id).to_string();
        let value = encode(&DocumentSnapshot::deleted(
            version.version,
            &current.title,
            current.relative_path.as_deref(),
        ))?;
        self.collector.capture(session_id, &key, Some(value));
        Ok(version.version)
    }

    pub fn todo_list_created(&self, session_id: &str, list_id: &str) -> Result<()> {
        let key = ResourceKey::todo_list(list_id).to_string();
        let value = encode(&TodoSnapshot::created_list())?;
        self.collector.capture(session_id, &key, Some(value));
        Ok(())
    }

    pub fn todo_list_modified(&self, session_id: &str, current: &TodoList) -> Result<()> {
        let key = ResourceKey::todo_list(&current.id).to_string();
        let value = encode(&TodoSnapshot::modified(current.clone()))?;
        self.collector.capture(session_id, &key, Some(value));
        Ok(())
    }
}
