use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;

use crate::error::PersistError;
use crate::error::Result;

const DEFAULT_DIFF_SECTION_LIMIT: usize = 30;
const DEFAULT_EVENT_CAPACITY: usize = 64;

/// On-disk locations and tunables for checkpoint persistence.
///
/// Loaded from TOML; every field has a default so a partial (or missing)
/// file is valid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistConfig {
    /// Root directory for sessions, snapshots, version histories and scope files.
    pub data_dir: PathBuf,
    /// Maximum lines listed per section of a document diff.
    pub diff_section_limit: usize,
    /// Buffer size of the rollback event channel.
    pub event_capacity: usize,
}

impl Default for PersistConfig {
    fn default() -> Self {
        let data_dir = dirs::data_dir()
            .map(|d| d.join("prizm"))
            .unwrap_or_else(|| PathBuf::from(".prizm"));
        Self {
            data_dir,
            diff_section_limit: DEFAULT_DIFF_SECTION_LIMIT,
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

impl PersistConfig {
    pub fn with_data_dir(data_dir: PathBuf) -> Self {
        Self {
            data_dir,
            ..Self::default()
        }
    }

    pub fn from_toml_str(raw: &str) -> Result<Self> {
        toml::from_str(raw).map_err(|e| PersistError::Config(e.to_string()))
    }

    /// Read config from `path`, falling back to defaults when the file does
    /// not exist.
    pub fn load(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(raw) => Self::from_toml_str(&raw),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no persist config; using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(e.into()),
        }
    }

    pub fn sessions_dir(&self) -> PathBuf {
        self.data_dir.join("sessions")
    }

    pub fn snapshots_dir(&self) -> PathBuf {
        self.data_dir.join("checkpoints")
    }

    pub fn versions_dir(&self) -> PathBuf {
        self.data_dir.join("doc-versions")
    }

    pub fn scopes_dir(&self) -> PathBuf {
        self.data_dir.join("scopes")
    }
}
