pub mod checkpoint;
pub mod collector;
pub mod compaction;
pub mod config;
pub mod error;
pub mod ids;
pub mod keys;
pub mod session;
pub mod snapshot_store;

// Re-export key types for convenience.
pub use checkpoint::{
    Checkpoint, FileChange, FileChangeAction, complete_checkpoint, create_checkpoint,
};
pub use collector::{SnapshotCollector, SnapshotSet};
pub use compaction::{clamp_compressed_round, round_for_message_index};
pub use config::PersistConfig;
pub use error::{PersistError, Result};
pub use ids::{UNKNOWN_ID, generate_id, sanitize_id};
pub use keys::ResourceKey;
pub use session::{
    JsonFileStore, MemoryIdsByLayer, MemoryLayer, Session, SessionMessage, SessionStore,
};
pub use snapshot_store::SnapshotStore;
