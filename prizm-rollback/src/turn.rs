use std::sync::Arc;

use chrono::Utc;
use prizm_persist::Checkpoint;
use prizm_persist::FileChange;
use prizm_persist::Session;
use prizm_persist::SnapshotCollector;
use prizm_persist::SnapshotStore;
use prizm_persist::complete_checkpoint;
use prizm_persist::create_checkpoint;

use crate::error::Result;
use crate::error::RollbackError;

/// Turn lifecycle glue: opens a checkpoint and snapshot buffer when a turn
/// starts, and persists the buffer and completes the checkpoint when it ends.
#[derive(Clone)]
pub struct TurnCoordinator {
    collector: Arc<SnapshotCollector>,
    snapshots: SnapshotStore,
}

impl TurnCoordinator {
    pub fn new(collector: Arc<SnapshotCollector>, snapshots: SnapshotStore) -> Self {
        Self {
            collector,
            snapshots,
        }
    }

    /// Create a checkpoint at the session's current message count, append it
    /// to the ledger, and start capturing.
    pub fn begin_turn(&self, session: &mut Session, caption: &str) -> Result<Checkpoint> {
        let checkpoint = create_checkpoint(&session.id, session.message_count(), caption);
        session.push_checkpoint(checkpoint.clone())?;
        self.collector.begin(&session.id);
        Ok(checkpoint)
    }

    /// Persist the turn's snapshots and mark its checkpoint completed.
    pub async fn end_turn(
        &self,
        session: &mut Session,
        checkpoint_id: &str,
        changes: Vec<FileChange>,
    ) -> Result<Checkpoint> {
        let checkpoint = session.checkpoint(checkpoint_id).cloned().ok_or_else(|| {
            RollbackError::CheckpointNotFound {
                session_id: session.id.clone(),
                checkpoint_id: checkpoint_id.to_string(),
            }
        })?;
        if !self.collector.is_active(&session.id) {
            tracing::debug!(
                session_id = %session.id,
                checkpoint_id,
                "ending turn without an active snapshot buffer"
            );
        }
        let snapshots = self.collector.flush(&session.id);
        self.snapshots
            .persist_snapshots(&session.id, checkpoint_id, &snapshots)
            .await;

        let completed = complete_checkpoint(checkpoint, changes);
        session.replace_checkpoint(completed.clone())?;
        Ok(completed)
    }

    /// Drop whatever the turn captured and remove its checkpoint from the
    /// ledger. Completed checkpoints are left alone.
    pub fn abort_turn(&self, session: &mut Session, checkpoint_id: &str) {
        self.collector.discard(&session.id);
        if let Some(position) = session.checkpoint_position(checkpoint_id)
            && !session.checkpoints[position].completed
        {
            session.checkpoints.remove(position);
            session.updated_at = Utc::now();
        }
    }
}
