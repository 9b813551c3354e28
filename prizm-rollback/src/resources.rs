//! Live resource stores the rollback engine restores into.
//!
//! The engine does not own these formats; it only needs read, write and
//! delete primitives keyed by scope. `FsFileStore` keeps scope files on disk,
//! and the in-memory document and todo stores back tests and embedders that
//! keep those resources elsewhere.

use std::collections::HashMap;
use std::path::Component;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use prizm_persist::PersistError;
use prizm_persist::Result;
use prizm_persist::sanitize_id;
use serde::Deserialize;
use serde::Serialize;
use tokio::sync::RwLock;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub id: String,
    pub title: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relative_path: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TodoStatus {
    Todo,
    Doing,
    Done,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TodoItem {
    pub id: String,
    pub title: String,
    pub status: TodoStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TodoList {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub items: Vec<TodoItem>,
}

#[async_trait]
pub trait FileStore: Send + Sync {
    /// Current content, or `None` when the file does not exist.
    async fn read(&self, scope: &str, path: &str) -> Result<Option<String>>;
    async fn write(&self, scope: &str, path: &str, content: &str) -> Result<()>;
    /// Returns whether a file was removed.
    async fn delete(&self, scope: &str, path: &str) -> Result<bool>;
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get(&self, scope: &str, document_id: &str) -> Result<Option<Document>>;
    async fn put(&self, scope: &str, document: Document) -> Result<()>;
    /// Returns whether a document was removed.
    async fn delete(&self, scope: &str, document_id: &str) -> Result<bool>;
}

#[async_trait]
pub trait TodoStore: Send + Sync {
    async fn get_list(&self, scope: &str, list_id: &str) -> Result<Option<TodoList>>;
    /// Insert or replace a list.
    async fn put_list(&self, scope: &str, list: TodoList) -> Result<()>;
    /// Returns whether a list was removed.
    async fn remove_list(&self, scope: &str, list_id: &str) -> Result<bool>;
}

/// The three live stores restored by rollback, bundled for sharing.
#[derive(Clone)]
pub struct ResourceStores {
    pub files: Arc<dyn FileStore>,
    pub documents: Arc<dyn DocumentStore>,
    pub todos: Arc<dyn TodoStore>,
}

/// Scope files on disk at `<root>/<scope>/<relative path>`.
pub struct FsFileStore {
    root: PathBuf,
}

impl FsFileStore {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Resolve a scope-relative path, rejecting anything that could leave
    /// the scope directory.
    fn resolve(&self, scope: &str, path: &str) -> Result<PathBuf> {
        let relative = Path::new(path);
        let is_plain = !path.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
        if !is_plain {
            return Err(PersistError::InvalidPath(path.to_string()));
        }
        Ok(self.root.join(sanitize_id(scope)).join(relative))
    }
}

#[async_trait]
impl FileStore for FsFileStore {
    async fn read(&self, scope: &str, path: &str) -> Result<Option<String>> {
        let full = self.resolve(scope, path)?;
        match tokio::fs::read_to_string(&full).await {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn write(&self, scope: &str, path: &str, content: &str) -> Result<()> {
        let full = self.resolve(scope, path)?;
        if let Some(parent) = full.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&full, content.as_bytes()).await?;
        Ok(())
    }

    async fn delete(&self, scope: &str, path: &str) -> Result<bool> {
        let full = self.resolve(scope, path)?;
        match tokio::fs::remove_file(&full).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

type ScopedKey = (String, String);

fn scoped(scope: &str, id: &str) -> ScopedKey {
    (scope.to_string(), id.to_string())
}

#[derive(Default)]
pub struct MemoryDocumentStore {
    documents: RwLock<HashMap<ScopedKey, Document>>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn get(&self, scope: &str, document_id: &str) -> Result<Option<Document>> {
        let guard = self.documents.read().await;
        Ok(guard.get(&scoped(scope, document_id)).cloned())
    }

    async fn put(&self, scope: &str, document: Document) -> Result<()> {
        let mut guard = self.documents.write().await;
        guard.insert(scoped(scope, &document.id), document);
        Ok(())
    }

    async fn delete(&self, scope: &str, document_id: &str) -> Result<bool> {
        let mut guard = self.documents.write().await;
        Ok(guard.remove(&scoped(scope, document_id)).is_some())
    }
}

#[derive(Default)]
pub struct MemoryTodoStore {
    lists: RwLock<HashMap<ScopedKey, TodoList>>,
}

impl MemoryTodoStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TodoStore for MemoryTodoStore {
    async fn get_list(&self, scope: &str, list_id: &str) -> Result<Option<TodoList>> {
        let guard = self.lists.read().await;
        Ok(guard.get(&scoped(scope, list_id)).cloned())
    }

    async fn put_list(&self, scope: &str, list: TodoList) -> Result<()> {
        let mut guard = self.lists.write().await;
        guard.insert(scoped(scope, &list.id), list);
        Ok(())
    }

    async fn remove_list(&self, scope: &str, list_id: &str) -> Result<bool> {
        let mut guard = self.lists.write().await;
        Ok(guard.remove(&scoped(scope, list_id)).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fs_store_round_trip() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FsFileStore::new(tmp.path().to_path_buf());
        assert_eq!(store.read("scope", "notes/a.md").await.unwrap(), None);

        store.write("scope", "notes/a.md", "hello\n").await.unwrap();
        assert_eq!(
            store.read("scope", "notes/a.md").await.unwrap().as_deref(),
            Some("hello\n")
        );
        assert!(tmp.path().join("scope").join("notes").join("a.md").exists());

        assert!(store.delete("scope", "notes/a.md").await.unwrap());
        assert!(!store.delete("scope", "notes/a.md").await.unwrap());
    }

    #[tokio::test]
    async fn fs_store_rejects_escaping_paths() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FsFileStore::new(tmp.path().to_path_buf());
        for bad in ["../outside.md", "/etc/passwd", "a/../../b", ""] {
            let err = store.write("scope", bad, "x").await.unwrap_err();
            assert!(matches!(err, PersistError::InvalidPath(_)), "{bad}");
        }
    }

    #[tokio::test]
    async fn fs_store_isolates_scopes() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FsFileStore::new(tmp.path().to_path_buf());
        store.write("a", "x.md", "from a").await.unwrap();
        assert_eq!(store.read("b", "x.md").await.unwrap(), None);
    }

    #[tokio::test]
    async fn memory_document_store() {
        let store = MemoryDocumentStore::new();
        let doc = Document {
            id: "d1".into(),
            title: "Title".into(),
            content: "body".into(),
            relative_path: Some("docs/d1.md".into()),
        };
        store.put("s", doc.clone()).await.unwrap();
        assert_eq!(store.get("s", "d1").await.unwrap(), Some(doc));
        assert_eq!(store.get("other", "d1").await.unwrap(), None);
        assert!(store.delete("s", "d1").await.unwrap());
        assert!(!store.delete("s", "d1").await.unwrap());
    }

    #[tokio::test]
    async fn memory_todo_store() {
        let store = MemoryTodoStore::new();
        let list = TodoList {
            id: "t1".into(),
            title: "Plan".into(),
            items: vec![TodoItem {
                id: "i1".into(),
                title: "write tests".into(),
                status: TodoStatus::Todo,
            }],
        };
        store.put_list("s", list.clone()).await.unwrap();
        assert_eq!(store.get_list("s", "t1").await.unwrap(), Some(list));
        assert!(store.remove_list("s", "t1").await.unwrap());
        assert_eq!(store.get_list("s", "t1").await.unwrap(), None);
    }
}
