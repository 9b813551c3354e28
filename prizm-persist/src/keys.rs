use std::fmt;

const DOC_PREFIX: &str = "doc";
const TODO_PREFIX: &str = "todo";

/// Logical address of a resource captured in a snapshot set.
///
/// Plain relative paths name files. Structured resources use a bracketed
/// form: `[doc:<id>]` for documents and `[todo:<id>]` for todo lists.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceKey {
    File(String),
    Document(String),
    TodoList(String),
    /// A bracketed key with a kind this version does not know how to restore.
    Unrecognized(String),
}

impl ResourceKey {
    pub fn file(path: impl Into<String>) -> Self {
        Self::File(path.into())
    }

    pub fn document(id: impl Into<String>) -> Self {
        Self::Document(id.into())
    }

    pub fn todo_list(id: impl Into<String>) -> Self {
        Self::TodoList(id.into())
    }

    pub fn parse(raw: &str) -> Self {
        let Some(inner) = raw.strip_prefix('[').and_then(|r| r.strip_suffix(']')) else {
            return Self::File(raw.to_string());
        };
        match inner.split_once(':') {
            Some((DOC_PREFIX, id)) if !id.is_empty() => Self::Document(id.to_string()),
            Some((TODO_PREFIX, id)) if !id.is_empty() => Self::TodoList(id.to_string()),
            Some(_) => Self::Unrecognized(raw.to_string()),
            // `[notes]` has no kind separator; treat it as an odd but valid file name.
            None => Self::File(raw.to_string()),
        }
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceKey::File(path) => f.write_str(path),
            ResourceKey::Document(id) => write!(f, "[{DOC_PREFIX}:{id}]"),
            ResourceKey::TodoList(id) => write!(f, "[{TODO_PREFIX}:{id}]"),
            ResourceKey::Unrecognized(raw) => f.write_str(raw),
        }
    }
}

impl From<&str> for ResourceKey {
    fn from(raw: &str) -> Self {
        Self::parse(raw)
    }
}
