use prizm_persist::PersistError;

/// Errors surfaced by turn bookkeeping and rollback.
///
/// Rollback itself only fails hard when the target checkpoint is missing;
/// everything past that point is absorbed and logged.
#[derive(Debug, thiserror::Error)]
pub enum RollbackError {
    #[error("checkpoint {checkpoint_id} not found in session {session_id}")]
    CheckpointNotFound {
        session_id: String,
        checkpoint_id: String,
    },

    #[error("{0}")]
    InvalidOperation(String),

    #[error(transparent)]
    Persist(#[from] PersistError),
}

pub type Result<T> = std::result::Result<T, RollbackError>;
