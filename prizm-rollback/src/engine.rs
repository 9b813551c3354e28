use std::sync::Arc;

use chrono::Utc;
use prizm_doc_versions::DocumentVersionStore;
use prizm_doc_versions::VersionProvenance;
use prizm_persist::Checkpoint;
use prizm_persist::JsonFileStore;
use prizm_persist::MemoryIdsByLayer;
use prizm_persist::PersistConfig;
use prizm_persist::ResourceKey;
use prizm_persist::Session;
use prizm_persist::SessionStore;
use prizm_persist::SnapshotCollector;
use prizm_persist::SnapshotSet;
use prizm_persist::SnapshotStore;
use prizm_persist::clamp_compressed_round;
use serde::Deserialize;
use serde::Serialize;

use crate::capture::SnapshotCapture;
use crate::error::Result;
use crate::error::RollbackError;
use crate::events::RollbackEvent;
use crate::events::RollbackEventBus;
use crate::resources::Document;
use crate::resources::ResourceStores;
use crate::snapshot::DocumentAction;
use crate::snapshot::DocumentSnapshot;
use crate::snapshot::TodoAction;
use crate::snapshot::TodoSnapshot;
use crate::snapshot::decode;
use crate::turn::TurnCoordinator;

/// What a rollback changed, for the API layer and the memory subsystem.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RollbackOutcome {
    pub restored_keys: Vec<String>,
    pub removed_checkpoint_ids: Vec<String>,
    /// Memories created by the removed messages, for downstream deletion.
    pub removed_memory_ids: MemoryIdsByLayer,
    /// Set only when the compression counter had to be lowered.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub adjusted_compressed_through_round: Option<usize>,
    pub todo_restoration_log: Vec<String>,
    pub deleted_document_ids: Vec<String>,
}

/// Session-scoped identity threaded through restoration for logging and
/// version provenance.
struct RestoreTarget<'a> {
    scope: &'a str,
    session_id: &'a str,
    checkpoint_id: &'a str,
}

pub struct RollbackEngine {
    stores: ResourceStores,
    sessions: Arc<dyn SessionStore>,
    snapshots: SnapshotStore,
    versions: Arc<DocumentVersionStore>,
    collector: Arc<SnapshotCollector>,
    events: RollbackEventBus,
}

impl RollbackEngine {
    pub fn new(
        stores: ResourceStores,
        sessions: Arc<dyn SessionStore>,
        snapshots: SnapshotStore,
        versions: Arc<DocumentVersionStore>,
        collector: Arc<SnapshotCollector>,
        events: RollbackEventBus,
    ) -> Self {
        Self {
            stores,
            sessions,
            snapshots,
            versions,
            collector,
            events,
        }
    }

    /// Wire an engine over the directories named by `config`.
    pub fn from_config(config: &PersistConfig, stores: ResourceStores) -> Self {
        let versions = DocumentVersionStore::new(config.versions_dir())
            .with_diff_section_limit(config.diff_section_limit);
        Self::new(
            stores,
            Arc::new(JsonFileStore::new(config.sessions_dir())),
            SnapshotStore::new(config.snapshots_dir()),
            Arc::new(versions),
            Arc::new(SnapshotCollector::new()),
            RollbackEventBus::new(config.event_capacity),
        )
    }

    pub fn events(&self) -> &RollbackEventBus {
        &self.events
    }

    pub fn versions(&self) -> &Arc<DocumentVersionStore> {
        &self.versions
    }

    pub fn snapshots(&self) -> &SnapshotStore {
        &self.snapshots
    }

    pub fn sessions(&self) -> &Arc<dyn SessionStore> {
        &self.sessions
    }

    /// A turn coordinator sharing this engine's collector and snapshot store.
    pub fn turn_coordinator(&self) -> TurnCoordinator {
        TurnCoordinator::new(self.collector.clone(), self.snapshots.clone())
    }

    /// Capture helpers sharing this engine's collector and version store.
    pub fn capture(&self) -> SnapshotCapture {
        SnapshotCapture::new(self.collector.clone(), self.versions.clone())
    }

    /// Revert `session` to the state it had when `checkpoint_id` was created.
    ///
    /// Fails only when the checkpoint is not in the session, in which case
    /// nothing is touched. With `restore_files == false` resources are left
    /// as they are and only the session is truncated and cleaned up.
    pub async fn rollback(
        &self,
        session: &mut Session,
        checkpoint_id: &str,
        restore_files: bool,
    ) -> Result<RollbackOutcome> {
        let Some(position) = session.checkpoint_position(checkpoint_id) else {
            return Err(RollbackError::CheckpointNotFound {
                session_id: session.id.clone(),
                checkpoint_id: checkpoint_id.to_string(),
            });
        };
        let message_index = session.checkpoints[position].message_index;
        let rolled_back: Vec<Checkpoint> = session.checkpoints[position..].to_vec();

        let mut outcome = RollbackOutcome::default();
        if restore_files {
            let merged = self.merge_snapshots(&session.id, &rolled_back).await;
            let target = RestoreTarget {
                scope: &session.scope,
                session_id: &session.id,
                checkpoint_id,
            };
            for (key, value) in &merged {
                self.restore_key(&target, key, value.as_deref(), &mut outcome)
                    .await;
            }
        }

        for message in session.messages.iter().skip(message_index) {
            outcome
                .removed_memory_ids
                .extend_from(&message.created_memories);
        }

        session.messages.truncate(message_index);
        let (kept, dropped): (Vec<_>, Vec<_>) = std::mem::take(&mut session.checkpoints)
            .into_iter()
            .enumerate()
            .partition(|(i, c)| *i < position && c.message_index < message_index);
        session.checkpoints = kept.into_iter().map(|(_, c)| c).collect();
        outcome.removed_checkpoint_ids = dropped.into_iter().map(|(_, c)| c.id).collect();

        if let Some(current) = session.compressed_through_round
            && let Some(clamped) = clamp_compressed_round(current, message_index)
        {
            session.compressed_through_round = Some(clamped);
            outcome.adjusted_compressed_through_round = Some(clamped);
        }
        session.updated_at = Utc::now();

        if let Err(e) = self.sessions.save(session).await {
            tracing::warn!(
                session_id = %session.id,
                checkpoint_id,
                error = %e,
                "failed to persist session after rollback"
            );
        }
        self.snapshots
            .delete_snapshots(&session.id, &outcome.removed_checkpoint_ids)
            .await;
        // Anything buffered now describes messages that no longer exist.
        self.collector.discard(&session.id);

        self.events.publish(RollbackEvent {
            scope: session.scope.clone(),
            session_id: session.id.clone(),
            checkpoint_id: checkpoint_id.to_string(),
            removed_memory_ids: outcome.removed_memory_ids.clone(),
            deleted_document_ids: outcome.deleted_document_ids.clone(),
            remaining_message_count: session.messages.len(),
        });

        tracing::info!(
            session_id = %session.id,
            checkpoint_id,
            restored = outcome.restored_keys.len(),
            removed_checkpoints = outcome.removed_checkpoint_ids.len(),
            remaining_messages = session.messages.len(),
            "rolled back session"
        );
        Ok(outcome)
    }

    /// Merge snapshot sets oldest-first so each key keeps the value captured
    /// closest to the rollback target.
    async fn merge_snapshots(&self, session_id: &str, checkpoints: &[Checkpoint]) -> SnapshotSet {
        let mut merged = SnapshotSet::new();
        for checkpoint in checkpoints {
            let set = self
                .snapshots
                .load_snapshots(session_id, &checkpoint.id)
                .await;
            for (key, value) in set {
                merged.entry(key).or_insert(value);
            }
        }
        merged
    }

    async fn restore_key(
        &self,
        target: &RestoreTarget<'_>,
        key: &str,
        value: Option<&str>,
        outcome: &mut RollbackOutcome,
    ) {
        let restored = match ResourceKey::parse(key) {
            ResourceKey::File(path) => self.restore_file(target, &path, value).await,
            ResourceKey::Document(id) => self.restore_document(target, &id, value, outcome).await,
            ResourceKey::TodoList(id) => self.restore_todo_list(target, &id, value, outcome).await,
            ResourceKey::Unrecognized(_) => {
                tracing::warn!(
                    session_id = target.session_id,
                    key,
                    "skipping snapshot with unrecognized key"
                );
                Ok(false)
            }
        };
        match restored {
            Ok(true) => outcome.restored_keys.push(key.to_string()),
            Ok(false) => {}
            Err(e) => tracing::warn!(
                session_id = target.session_id,
                checkpoint_id = target.checkpoint_id,
                key,
                error = %e,
                "failed to restore resource"
            ),
        }
    }

    /// A file that did not exist before the turn comes back as empty content.
    async fn restore_file(
        &self,
        target: &RestoreTarget<'_>,
        path: &str,
        value: Option<&str>,
    ) -> prizm_persist::Result<bool> {
        self.stores
            .files
            .write(target.scope, path, value.unwrap_or_default())
            .await?;
        Ok(true)
    }

    async fn restore_document(
        &self,
        target: &RestoreTarget<'_>,
        document_id: &str,
        value: Option<&str>,
        outcome: &mut RollbackOutcome,
    ) -> prizm_persist::Result<bool> {
        let Some(raw) = value else {
            tracing::debug!(document_id, "document snapshot has no envelope");
            return Ok(false);
        };
        let envelope: DocumentSnapshot = decode(raw)?;
        let documents = &self.stores.documents;

        match envelope.action {
            DocumentAction::Create => {
                let deleted = documents.delete(target.scope, document_id).await?;
                if deleted {
                    outcome.deleted_document_ids.push(document_id.to_string());
                } else {
                    tracing::debug!(document_id, "created document already gone");
                }
                Ok(deleted)
            }
            DocumentAction::Update => {
                let Some(version) = self.version_before(document_id, &envelope).await else {
                    return Ok(false);
                };
                let Some(mut document) = documents.get(target.scope, document_id).await? else {
                    tracing::debug!(document_id, "updated document no longer exists");
                    return Ok(false);
                };
                // Version rows dedup on content alone; the envelope carries the live title.
                document.title = envelope.title.unwrap_or_else(|| version.title.clone());
                document.content = version.content.clone();
                self.record_rollback_version(
                    target,
                    document_id,
                    &document.title,
                    &document.content,
                )
                .await;
                documents.put(target.scope, document).await?;
                Ok(true)
            }
            DocumentAction::Delete => {
                let Some(version) = self.version_before(document_id, &envelope).await else {
                    return Ok(false);
                };
                let title = envelope.title.unwrap_or_else(|| version.title.clone());
                let document = Document {
                    id: document_id.to_string(),
                    title,
                    content: version.content.clone(),
                    relative_path: envelope.relative_path,
                };
                self.record_rollback_version(
                    target,
                    document_id,
                    &document.title,
                    &document.content,
                )
                .await;
                documents.put(target.scope, document).await?;
                Ok(true)
            }
        }
    }

    async fn version_before(
        &self,
        document_id: &str,
        envelope: &DocumentSnapshot,
    ) -> Option<prizm_doc_versions::DocumentVersion> {
        let Some(number) = envelope.version_before else {
            tracing::warn!(document_id, "document snapshot is missing versionBefore");
            return None;
        };
        let version = self.versions.version(document_id, number).await;
        if version.is_none() {
            tracing::warn!(
                document_id,
                version = number,
                "referenced document version not found"
            );
        }
        version
    }

    /// Append the restored content as a new version; history is never
    /// rewritten.
    async fn record_rollback_version(
        &self,
        target: &RestoreTarget<'_>,
        document_id: &str,
        title: &str,
        content: &str,
    ) {
        let provenance = VersionProvenance::rollback(target.session_id, target.checkpoint_id);
        if let Err(e) = self
            .versions
            .save_version(document_id, title, content, Some(provenance))
            .await
        {
            tracing::warn!(
                session_id = target.session_id,
                document_id,
                error = %e,
                "failed to record rollback version"
            );
        }
    }

    async fn restore_todo_list(
        &self,
        target: &RestoreTarget<'_>,
        list_id: &str,
        value: Option<&str>,
        outcome: &mut RollbackOutcome,
    ) -> prizm_persist::Result<bool> {
        let Some(raw) = value else {
            tracing::debug!(list_id, "todo snapshot has no envelope");
            return Ok(false);
        };
        let envelope: TodoSnapshot = decode(raw)?;
        let todos = &self.stores.todos;

        match envelope.action {
            TodoAction::CreateList => {
                let removed = todos.remove_list(target.scope, list_id).await?;
                outcome.todo_restoration_log.push(if removed {
                    format!("removed todo list {list_id}")
                } else {
                    format!("todo list {list_id} already absent")
                });
                Ok(removed)
            }
            TodoAction::Modify => {
                let Some(list) = envelope.list_snapshot else {
                    tracing::warn!(list_id, "todo snapshot is missing listSnapshot");
                    return Ok(false);
                };
                let items = list.items.len();
                todos.put_list(target.scope, list).await?;
                outcome
                    .todo_restoration_log
                    .push(format!("restored todo list {list_id} ({items} items)"));
                Ok(true)
            }
        }
    }
}
