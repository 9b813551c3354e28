//! Durable storage for the snapshot set captured during each checkpoint.
//!
//! ## Disk Layout
//!
//! ```text
//! {snapshots_dir}/
//!   {session_id}/
//!     {checkpoint_id}.json   # {checkpointId, sessionId, fileSnapshots}
//! ```
//!
//! Every operation is best-effort: write and delete failures are logged, and
//! a missing or corrupt file loads as an empty set.

use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;

use crate::collector::SnapshotSet;
use crate::ids::sanitize_id;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SnapshotFile {
    checkpoint_id: String,
    session_id: String,
    #[serde(default)]
    file_snapshots: SnapshotSet,
}

#[derive(Debug, Clone)]
pub struct SnapshotStore {
    base_dir: PathBuf,
}

impl SnapshotStore {
    pub fn new(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    fn session_dir(&self, session_id: &str) -> PathBuf {
        self.base_dir.join(sanitize_id(session_id))
    }

    fn snapshot_path(&self, session_id: &str, checkpoint_id: &str) -> PathBuf {
        self.session_dir(session_id)
            .join(format!("{}.json", sanitize_id(checkpoint_id)))
    }

    /// Persist the snapshot set for one checkpoint. Empty sets write nothing.
    pub async fn persist_snapshots(
        &self,
        session_id: &str,
        checkpoint_id: &str,
        snapshots: &SnapshotSet,
    ) {
        if snapshots.is_empty() {
            return;
        }
        if let Err(e) = self
            .write_snapshot_file(session_id, checkpoint_id, snapshots)
            .await
        {
            tracing::warn!(
                session_id,
                checkpoint_id,
                error = %e,
                "failed to persist checkpoint snapshots"
            );
        }
    }

    async fn write_snapshot_file(
        &self,
        session_id: &str,
        checkpoint_id: &str,
        snapshots: &SnapshotSet,
    ) -> crate::Result<()> {
        let file = SnapshotFile {
            checkpoint_id: checkpoint_id.to_string(),
            session_id: session_id.to_string(),
            file_snapshots: snapshots.clone(),
        };
        tokio::fs::create_dir_all(self.session_dir(session_id)).await?;
        let json = serde_json::to_string_pretty(&file)?;
        tokio::fs::write(self.snapshot_path(session_id, checkpoint_id), json).await?;
        Ok(())
    }

    /// Load the snapshot set for one checkpoint.
    pub async fn load_snapshots(&self, session_id: &str, checkpoint_id: &str) -> SnapshotSet {
        let path = self.snapshot_path(session_id, checkpoint_id);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return SnapshotSet::new(),
            Err(e) => {
                tracing::warn!(
                    session_id,
                    checkpoint_id,
                    path = %path.display(),
                    error = %e,
                    "failed to read checkpoint snapshots"
                );
                return SnapshotSet::new();
            }
        };
        match serde_json::from_slice::<SnapshotFile>(&bytes) {
            Ok(file) => file.file_snapshots,
            Err(e) => {
                tracing::warn!(
                    session_id,
                    checkpoint_id,
                    path = %path.display(),
                    error = %e,
                    "checkpoint snapshot file is corrupt; treating as empty"
                );
                SnapshotSet::new()
            }
        }
    }

    /// Remove the snapshot files for the given checkpoints.
    pub async fn delete_snapshots<S: AsRef<str>>(&self, session_id: &str, checkpoint_ids: &[S]) {
        for checkpoint_id in checkpoint_ids {
            let checkpoint_id = checkpoint_id.as_ref();
            match tokio::fs::remove_file(self.snapshot_path(session_id, checkpoint_id)).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => tracing::warn!(
                    session_id,
                    checkpoint_id,
                    error = %e,
                    "failed to delete checkpoint snapshots"
                ),
            }
        }
    }

    /// Remove every snapshot file recorded for a session.
    pub async fn delete_all_for_session(&self, session_id: &str) {
        match tokio::fs::remove_dir_all(self.session_dir(session_id)).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(
                session_id,
                error = %e,
                "failed to delete session snapshots"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample_set() -> SnapshotSet {
        let mut set = SnapshotSet::new();
        set.insert("notes/a.md".into(), Some("before".into()));
        set.insert("[doc:d1]".into(), Some(r#"{"action":"create"}"#.into()));
        set.insert("fresh.txt".into(), None);
        set
    }

    #[tokio::test]
    async fn persist_then_load() {
        let tmp = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(tmp.path().to_path_buf());
        store.persist_snapshots("s1", "cp-1", &sample_set()).await;
        assert_eq!(store.load_snapshots("s1", "cp-1").await, sample_set());
    }

    #[tokio::test]
    async fn file_layout_matches_documented_shape() {
        let tmp = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(tmp.path().to_path_buf());
        store.persist_snapshots("s1", "cp-1", &sample_set()).await;

        let raw = std::fs::read_to_string(tmp.path().join("s1").join("cp-1.json")).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["checkpointId"], "cp-1");
        assert_eq!(value["sessionId"], "s1");
        assert_eq!(value["fileSnapshots"]["notes/a.md"], "before");
        assert!(value["fileSnapshots"]["fresh.txt"].is_null());
    }

    #[tokio::test]
    async fn empty_set_writes_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(tmp.path().to_path_buf());
        store.persist_snapshots("s1", "cp-1", &SnapshotSet::new()).await;
        assert!(!tmp.path().join("s1").exists());
    }

    #[tokio::test]
    async fn missing_and_corrupt_files_load_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(tmp.path().to_path_buf());
        assert!(store.load_snapshots("s1", "cp-404").await.is_empty());

        std::fs::create_dir_all(tmp.path().join("s1")).unwrap();
        std::fs::write(tmp.path().join("s1").join("cp-bad.json"), "{not json").unwrap();
        assert!(store.load_snapshots("s1", "cp-bad").await.is_empty());
    }

    #[tokio::test]
    async fn sessions_are_isolated_on_disk() {
        let tmp = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(tmp.path().to_path_buf());
        let mut other = SnapshotSet::new();
        other.insert("notes/a.md".into(), Some("sibling".into()));

        store.persist_snapshots("s1", "cp-1", &sample_set()).await;
        store.persist_snapshots("s2", "cp-1", &other).await;
        store.delete_snapshots("s2", &["cp-1"]).await;

        assert_eq!(store.load_snapshots("s1", "cp-1").await, sample_set());
        assert!(store.load_snapshots("s2", "cp-1").await.is_empty());
    }

    #[tokio::test]
    async fn delete_ignores_missing_entries() {
        let tmp = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(tmp.path().to_path_buf());
        store.persist_snapshots("s1", "cp-1", &sample_set()).await;
        store
            .delete_snapshots("s1", &["cp-1".to_string(), "cp-never".to_string()])
            .await;
        assert!(store.load_snapshots("s1", "cp-1").await.is_empty());

        store.delete_all_for_session("s1").await;
        store.delete_all_for_session("s-never").await;
        assert!(!tmp.path().join("s1").exists());
    }

    #[tokio::test]
    async fn unsafe_ids_stay_inside_base_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let base = tmp.path().join("snapshots");
        let store = SnapshotStore::new(base.clone());
        store.persist_snapshots("../escape", "..", &sample_set()).await;

        assert!(base.join("___escape").join("unknown.json").exists());
        assert_eq!(store.load_snapshots("../escape", "..").await, sample_set());
    }
}
