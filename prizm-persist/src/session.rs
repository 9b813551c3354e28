use std::path::PathBuf;

use async_trait::async_trait;
use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;

use crate::checkpoint::Checkpoint;
use crate::error::PersistError;
use crate::error::Result;
use crate::ids::sanitize_id;

/// Tier a long-term memory record belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryLayer {
    User,
    Scope,
    Session,
}

/// Memory identifiers grouped by the layer that owns them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryIdsByLayer {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub user: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub scope: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub session: Vec<String>,
}

impl MemoryIdsByLayer {
    pub fn push(&mut self, layer: MemoryLayer, id: impl Into<String>) {
        self.layer_mut(layer).push(id.into());
    }

    pub fn ids(&self, layer: MemoryLayer) -> &[String] {
        match layer {
            MemoryLayer::User => &self.user,
            MemoryLayer::Scope => &self.scope,
            MemoryLayer::Session => &self.session,
        }
    }

    pub fn extend_from(&mut self, other: &MemoryIdsByLayer) {
        self.user.extend(other.user.iter().cloned());
        self.scope.extend(other.scope.iter().cloned());
        self.session.extend(other.session.iter().cloned());
    }

    pub fn len(&self) -> usize {
        self.user.len() + self.scope.len() + self.session.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn layer_mut(&mut self, layer: MemoryLayer) -> &mut Vec<String> {
        match layer {
            MemoryLayer::User => &mut self.user,
            MemoryLayer::Scope => &mut self.scope,
            MemoryLayer::Session => &mut self.session,
        }
    }
}

/// A persisted conversation message.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionMessage {
    pub id: String,
    pub role: String, // "user", "assistant", "tool", "system"
    pub content: String,
    pub created_at: DateTime<Utc>,
    /// Long-term memories extracted from this message.
    #[serde(default, skip_serializing_if = "MemoryIdsByLayer::is_empty")]
    pub created_memories: MemoryIdsByLayer,
}

/// Full session state for persistence.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: String,
    pub scope: String,
    pub messages: Vec<SessionMessage>,
    #[serde(default)]
    pub checkpoints: Vec<Checkpoint>,
    /// Rounds already summarized out of the live context.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compressed_through_round: Option<usize>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    pub fn new(scope: &str, session_id: &str) -> Self {
        let now = Utc::now();
        Self {
            id: session_id.to_string(),
            scope: scope.to_string(),
            messages: Vec::new(),
            checkpoints: Vec::new(),
            compressed_through_round: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn add_message(&mut self, role: &str, content: &str) -> &mut SessionMessage {
        let id = format!("msg-{}", self.messages.len() + 1);
        let now = Utc::now();
        self.messages.push(SessionMessage {
            id,
            role: role.into(),
            content: content.into(),
            created_at: now,
            created_memories: MemoryIdsByLayer::default(),
        });
        self.updated_at = now;
        let last = self.messages.len() - 1;
        &mut self.messages[last]
    }

    pub fn message_count(&self) -> usize {
        self.messages.len()
    }

    pub fn checkpoint(&self, checkpoint_id: &str) -> Option<&Checkpoint> {
        self.checkpoints.iter().find(|c| c.id == checkpoint_id)
    }

    pub fn checkpoint_position(&self, checkpoint_id: &str) -> Option<usize> {
        self.checkpoints.iter().position(|c| c.id == checkpoint_id)
    }

    pub fn latest_checkpoint(&self) -> Option<&Checkpoint> {
        self.checkpoints.last()
    }

    /// Append a checkpoint to the ledger.
    ///
    /// Checkpoint message indices must be non-decreasing and may not point
    /// past the end of the message list.
    pub fn push_checkpoint(&mut self, checkpoint: Checkpoint) -> Result<()> {
        if checkpoint.session_id != self.id {
            return Err(PersistError::InvalidOperation(format!(
                "checkpoint {} belongs to session {}, not {}",
                checkpoint.id, checkpoint.session_id, self.id
            )));
        }
        if checkpoint.message_index > self.messages.len() {
            return Err(PersistError::InvalidOperation(format!(
                "checkpoint {} points at message {} but session has {}",
                checkpoint.id,
                checkpoint.message_index,
                self.messages.len()
            )));
        }
        if let Some(latest) = self.latest_checkpoint()
            && checkpoint.message_index < latest.message_index
        {
            return Err(PersistError::InvalidOperation(format!(
                "checkpoint {} at message {} precedes latest checkpoint {} at {}",
                checkpoint.id, checkpoint.message_index, latest.id, latest.message_index
            )));
        }
        self.checkpoints.push(checkpoint);
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Replace a ledger entry in place, matched by id.
    pub fn replace_checkpoint(&mut self, checkpoint: Checkpoint) -> Result<()> {
        let slot = self
            .checkpoints
            .iter_mut()
            .find(|c| c.id == checkpoint.id)
            .ok_or_else(|| PersistError::NotFound(format!("checkpoint {}", checkpoint.id)))?;
        *slot = checkpoint;
        self.updated_at = Utc::now();
        Ok(())
    }
}

/// Trait for session storage backends.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn save(&self, session: &Session) -> Result<()>;
    async fn load(&self, scope: &str, session_id: &str) -> Result<Session>;
    async fn list_sessions(&self, scope: &str) -> Result<Vec<String>>;
    async fn delete(&self, scope: &str, session_id: &str) -> Result<()>;
}

/// JSON file-based session store, one directory per scope.
pub struct JsonFileStore {
    base_dir: PathBuf,
}

impl JsonFileStore {
    pub fn new(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    fn scope_dir(&self, scope: &str) -> PathBuf {
        self.base_dir.join(sanitize_id(scope))
    }

    fn session_path(&self, scope: &str, session_id: &str) -> PathBuf {
        self.scope_dir(scope).join(format!("{}.json", sanitize_id(session_id)))
    }
}

#[async_trait]
impl SessionStore for JsonFileStore {
    async fn save(&self, session: &Session) -> Result<()> {
        tokio::fs::create_dir_all(self.scope_dir(&session.scope)).await?;
        let json = serde_json::to_string_pretty(session)?;
        tokio::fs::write(self.session_path(&session.scope, &session.id), json).await?;
        Ok(())
    }

    async fn load(&self, scope: &str, session_id: &str) -> Result<Session> {
        let path = self.session_path(scope, session_id);
        let data = match tokio::fs::read(&path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(PersistError::NotFound(format!("session {session_id}")));
            }
            Err(e) => return Err(e.into()),
        };
        Ok(serde_json::from_slice(&data)?)
    }

    async fn list_sessions(&self, scope: &str) -> Result<Vec<String>> {
        let mut read_dir = match tokio::fs::read_dir(self.scope_dir(scope)).await {
            Ok(rd) => rd,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut ids = Vec::new();
        while let Some(entry) = read_dir.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some("json")
                && let Some(name) = path.file_stem().and_then(|n| n.to_str())
            {
                ids.push(name.to_string());
            }
        }
        ids.sort();
        Ok(ids)
    }

    async fn delete(&self, scope: &str, session_id: &str) -> Result<()> {
        match tokio::fs::remove_file(self.session_path(scope, session_id)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkpoint::create_checkpoint;

    #[test]
    fn session_creation() {
        let session = Session::new("scope-a", "test-1");
        assert_eq!(session.id, "test-1");
        assert_eq!(session.scope, "scope-a");
        assert_eq!(session.message_count(), 0);
        assert!(session.checkpoints.is_empty());
        assert!(session.compressed_through_round.is_none());
    }

    #[test]
    fn add_messages() {
        let mut session = Session::new("s", "test-2");
        session.add_message("user", "Hello");
        session
            .add_message("assistant", "Hi there!")
            .created_memories
            .push(MemoryLayer::User, "mem-1");
        assert_eq!(session.message_count(), 2);
        assert_eq!(session.messages[0].role, "user");
        assert_eq!(session.messages[0].content, "Hello");
        assert_eq!(session.messages[1].id, "msg-2");
        assert_eq!(
            session.messages[1].created_memories.ids(MemoryLayer::User),
            ["mem-1".to_string()]
        );
    }

    #[test]
    fn push_checkpoint_enforces_order() {
        let mut session = Session::new("s", "sess");
        session.add_message("user", "a");
        session.add_message("assistant", "b");

        session.push_checkpoint(create_checkpoint("sess", 2, "second")).unwrap();
        let err = session
            .push_checkpoint(create_checkpoint("sess", 0, "earlier"))
            .unwrap_err();
        assert!(err.to_string().contains("precedes"));

        let err = session
            .push_checkpoint(create_checkpoint("sess", 5, "future"))
            .unwrap_err();
        assert!(err.to_string().contains("points at message 5"));

        let err = session
            .push_checkpoint(create_checkpoint("other", 2, "foreign"))
            .unwrap_err();
        assert!(err.to_string().contains("belongs to session other"));
        assert_eq!(session.checkpoints.len(), 1);
    }

    #[test]
    fn ledger_lookups() {
        let mut session = Session::new("s", "sess");
        let first = create_checkpoint("sess", 0, "one");
        let first_id = first.id.clone();
        session.push_checkpoint(first).unwrap();
        session.add_message("user", "x");
        session.push_checkpoint(create_checkpoint("sess", 1, "two")).unwrap();

        assert_eq!(session.checkpoint_position(&first_id), Some(0));
        assert_eq!(session.checkpoint(&first_id).unwrap().caption, "one");
        assert_eq!(session.latest_checkpoint().unwrap().caption, "two");
        assert!(session.checkpoint("cp-missing").is_none());
    }

    #[test]
    fn replace_checkpoint() {
        let mut session = Session::new("s", "sess");
        let cp = create_checkpoint("sess", 0, "turn");
        session.push_checkpoint(cp.clone()).unwrap();

        let mut done = cp;
        done.completed = true;
        session.replace_checkpoint(done).unwrap();
        assert!(session.checkpoints[0].completed);

        let err = session
            .replace_checkpoint(create_checkpoint("sess", 0, "stranger"))
            .unwrap_err();
        assert!(matches!(err, PersistError::NotFound(_)));
    }

    #[tokio::test]
    async fn save_load_roundtrip() {
        let tmp = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(tmp.path().to_path_buf());
        let mut session = Session::new("scope-a", "roundtrip-1");
        session.add_message("user", "Test message");
        session.compressed_through_round = Some(3);
        session.push_checkpoint(create_checkpoint("roundtrip-1", 1, "t")).unwrap();

        store.save(&session).await.unwrap();
        let loaded = store.load("scope-a", "roundtrip-1").await.unwrap();
        assert_eq!(loaded.id, "roundtrip-1");
        assert_eq!(loaded.message_count(), 1);
        assert_eq!(loaded.checkpoints, session.checkpoints);
        assert_eq!(loaded.compressed_through_round, Some(3));
    }

    #[tokio::test]
    async fn load_missing_is_not_found() {
        let tmp = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(tmp.path().to_path_buf());
        let err = store.load("scope-a", "nope").await.unwrap_err();
        assert!(matches!(err, PersistError::NotFound(_)));
    }

    #[tokio::test]
    async fn list_sessions_is_per_scope() {
        let tmp = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(tmp.path().to_path_buf());

        store.save(&Session::new("scope-a", "list-b")).await.unwrap();
        store.save(&Session::new("scope-a", "list-a")).await.unwrap();
        store.save(&Session::new("scope-b", "other")).await.unwrap();

        let ids = store.list_sessions("scope-a").await.unwrap();
        assert_eq!(ids, vec!["list-a", "list-b"]);
        assert!(store.list_sessions("scope-c").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn delete_session() {
        let tmp = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(tmp.path().to_path_buf());

        store.save(&Session::new("s", "delete-me")).await.unwrap();
        assert!(store.load("s", "delete-me").await.is_ok());

        store.delete("s", "delete-me").await.unwrap();
        assert!(store.load("s", "delete-me").await.is_err());
        // Deleting again is not an error.
        store.delete("s", "delete-me").await.unwrap();
    }
}
