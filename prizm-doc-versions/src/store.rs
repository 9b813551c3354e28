use std::path::PathBuf;

use chrono::Utc;
use prizm_persist::Result;
use prizm_persist::sanitize_id;
use sha2::Digest;
use sha2::Sha256;
use tokio::sync::Mutex;

use crate::diff::DEFAULT_SECTION_LIMIT;
use crate::diff::compute_diff_with_limit;
use crate::types::DocumentVersion;
use crate::types::DocumentVersionHistory;
use crate::types::VersionProvenance;

/// Hex SHA-256 of document content.
pub fn content_hash(content: &str) -> String {
    format!("{:x}", Sha256::digest(content.as_bytes()))
}

/// Per-document version histories stored as one JSON file each.
///
/// Histories only ever grow: a save whose content hash matches the latest
/// version returns that version instead of appending.
pub struct DocumentVersionStore {
    base_dir: PathBuf,
    diff_section_limit: usize,
    /// Serializes read-modify-write cycles of `save_version`.
    write_lock: Mutex<()>,
}

impl DocumentVersionStore {
    pub fn new(base_dir: PathBuf) -> Self {
        Self {
            base_dir,
            diff_section_limit: DEFAULT_SECTION_LIMIT,
            write_lock: Mutex::new(()),
        }
    }

    pub fn with_diff_section_limit(mut self, limit: usize) -> Self {
        self.diff_section_limit = limit;
        self
    }

    fn history_path(&self, document_id: &str) -> PathBuf {
        self.base_dir.join(format!("{}.json", sanitize_id(document_id)))
    }

    async fn read_history(&self, document_id: &str) -> DocumentVersionHistory {
        let path = self.history_path(document_id);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return DocumentVersionHistory::empty(document_id);
            }
            Err(e) => {
                tracing::warn!(
                    document_id,
                    path = %path.display(),
                    error = %e,
                    "failed to read version history"
                );
                return DocumentVersionHistory::empty(document_id);
            }
        };
        match serde_json::from_slice::<DocumentVersionHistory>(&bytes) {
            Ok(history) => history,
            Err(e) => {
                tracing::warn!(
                    document_id,
                    path = %path.display(),
                    error = %e,
                    "version history is corrupt; treating as empty"
                );
                DocumentVersionHistory::empty(document_id)
            }
        }
    }

    async fn write_history(&self, history: &DocumentVersionHistory) -> Result<()> {
        tokio::fs::create_dir_all(&self.base_dir).await?;
        let json = serde_json::to_string_pretty(history)?;
        tokio::fs::write(self.history_path(&history.document_id), json).await?;
        Ok(())
    }

    /// Append a version unless `content` matches the latest one.
    pub async fn save_version(
        &self,
        document_id: &str,
        title: &str,
        content: &str,
        provenance: Option<VersionProvenance>,
    ) -> Result<DocumentVersion> {
        let _guard = self.write_lock.lock().await;
        let mut history = self.read_history(document_id).await;
        let hash = content_hash(content);

        if let Some(latest) = history.latest()
            && latest.content_hash == hash
        {
            return Ok(latest.clone());
        }

        let version = DocumentVersion {
            version: history.latest().map_or(1, |v| v.version + 1),
            timestamp: Utc::now(),
            title: title.to_string(),
            content: content.to_string(),
            content_hash: hash,
            provenance,
        };
        history.versions.push(version.clone());
        self.write_history(&history).await?;
        tracing::debug!(document_id, version = version.version, "saved document version");
        Ok(version)
    }

    pub async fn version_history(&self, document_id: &str) -> DocumentVersionHistory {
        self.read_history(document_id).await
    }

    pub async fn latest_version(&self, document_id: &str) -> Option<DocumentVersion> {
        self.read_history(document_id).await.latest().cloned()
    }

    /// The version before the latest one.
    pub async fn previous_version(&self, document_id: &str) -> Option<DocumentVersion> {
        self.read_history(document_id).await.previous().cloned()
    }

    pub async fn version(&self, document_id: &str, version: u64) -> Option<DocumentVersion> {
        self.read_history(document_id).await.get(version).cloned()
    }

    /// Narrate the most recent change: a diff between the previous and the
    /// latest version.
    pub async fn diff_latest(&self, document_id: &str) -> Option<String> {
        let history = self.read_history(document_id).await;
        let latest = history.latest()?;
        let previous = history.previous()?;
        Some(compute_diff_with_limit(
            &previous.content,
            &latest.content,
            self.diff_section_limit,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::NO_SIGNIFICANT_CHANGE;
    use crate::types::VersionSource;
    use pretty_assertions::assert_eq;

    fn make_store(dir: &std::path::Path) -> DocumentVersionStore {
        DocumentVersionStore::new(dir.to_path_buf())
    }

    #[tokio::test]
    async fn first_save_is_version_one() {
        let tmp = tempfile::tempdir().unwrap();
        let store = make_store(tmp.path());
        let v = store.save_version("d1", "Title", "Hello v1", None).await.unwrap();
        assert_eq!(v.version, 1);
        assert_eq!(v.content_hash, content_hash("Hello v1"));
        assert_eq!(store.version_history("d1").await.versions.len(), 1);
    }

    #[tokio::test]
    async fn unchanged_content_is_deduplicated() {
        let tmp = tempfile::tempdir().unwrap();
        let store = make_store(tmp.path());
        let first = store.save_version("d1", "T", "same", None).await.unwrap();
        let again = store.save_version("d1", "Renamed", "same", None).await.unwrap();
        assert_eq!(again, first);
        assert_eq!(store.version_history("d1").await.versions.len(), 1);
    }

    #[tokio::test]
    async fn versions_are_contiguous() {
        let tmp = tempfile::tempdir().unwrap();
        let store = make_store(tmp.path());
        for content in ["a", "b", "a", "c"] {
            store.save_version("d1", "T", content, None).await.unwrap();
        }
        let numbers = store
            .version_history("d1")
            .await
            .versions
            .iter()
            .map(|v| v.version)
            .collect::<Vec<_>>();
        assert_eq!(numbers, vec![1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn reads_on_missing_document() {
        let tmp = tempfile::tempdir().unwrap();
        let store = make_store(tmp.path());
        assert!(store.version_history("ghost").await.versions.is_empty());
        assert!(store.latest_version("ghost").await.is_none());
        assert!(store.previous_version("ghost").await.is_none());
        assert!(store.version("ghost", 1).await.is_none());
        assert!(store.diff_latest("ghost").await.is_none());
    }

    #[tokio::test]
    async fn latest_previous_and_lookup() {
        let tmp = tempfile::tempdir().unwrap();
        let store = make_store(tmp.path());
        store.save_version("d1", "T1", "one", None).await.unwrap();
        assert!(store.previous_version("d1").await.is_none());
        store
            .save_version("d1", "T2", "two", Some(VersionProvenance::agent("s1")))
            .await
            .unwrap();

        assert_eq!(store.latest_version("d1").await.unwrap().content, "two");
        assert_eq!(store.previous_version("d1").await.unwrap().content, "one");
        let v2 = store.version("d1", 2).await.unwrap();
        assert_eq!(v2.title, "T2");
        assert_eq!(
            v2.provenance.map(|p| p.source),
            Some(VersionSource::Agent)
        );
    }

    #[tokio::test]
    async fn corrupt_history_is_treated_as_empty() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("d1.json"), "[[[").unwrap();
        let store = make_store(tmp.path());
        assert!(store.latest_version("d1").await.is_none());

        let v = store.save_version("d1", "T", "fresh", None).await.unwrap();
        assert_eq!(v.version, 1);
    }

    #[tokio::test]
    async fn diff_latest_narrates_last_change() {
        let tmp = tempfile::tempdir().unwrap();
        let store = make_store(tmp.path()).with_diff_section_limit(1);
        store.save_version("d1", "T", "keep\nold", None).await.unwrap();
        assert!(store.diff_latest("d1").await.is_none());

        store
            .save_version("d1", "T", "keep\nnew a\nnew b", None)
            .await
            .unwrap();
        assert_eq!(
            store.diff_latest("d1").await.unwrap(),
            "Added:\n+ new a\n... and 1 more\nRemoved:\n- old"
        );

        store
            .save_version("d1", "T", "new b\nkeep\nnew a", None)
            .await
            .unwrap();
        assert_eq!(store.diff_latest("d1").await.unwrap(), NO_SIGNIFICANT_CHANGE);
    }

    #[tokio::test]
    async fn history_file_layout() {
        let tmp = tempfile::tempdir().unwrap();
        let store = make_store(tmp.path());
        store.save_version("doc/1", "T", "x", None).await.unwrap();

        let raw = std::fs::read_to_string(tmp.path().join("doc_1.json")).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["documentId"], "doc/1");
        assert_eq!(value["versions"][0]["version"], 1);
        assert_eq!(value["versions"][0]["contentHash"], content_hash("x"));
    }
}
