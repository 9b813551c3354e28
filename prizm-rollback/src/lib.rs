//! Checkpoint-based rollback of everything an agent turn mutated.
//!
//! A turn opens a checkpoint through [`TurnCoordinator`], tool code records
//! pre-mutation values through [`SnapshotCapture`], and [`RollbackEngine`]
//! later restores those values and truncates the session back to the
//! checkpoint.

pub mod capture;
pub mod engine;
pub mod error;
pub mod events;
pub mod resources;
pub mod snapshot;
pub mod turn;

pub use capture::SnapshotCapture;
pub use engine::{RollbackEngine, RollbackOutcome};
pub use error::{Result, RollbackError};
pub use events::{RollbackEvent, RollbackEventBus, RollbackSubscriber};
pub use resources::{
    Document, DocumentStore, FileStore, FsFileStore, MemoryDocumentStore, MemoryTodoStore,
    ResourceStores, TodoItem, TodoList, TodoStatus, TodoStore,
};
pub use snapshot::{DocumentAction, DocumentSnapshot, TodoAction, TodoSnapshot};
pub use turn::TurnCoordinator;
