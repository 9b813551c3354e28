//! Fire-and-forget notification of completed rollbacks.
//!
//! Rollback publishes a [`RollbackEvent`] and returns. Memory cleanup, audit
//! logging and other slow consumers subscribe on their own tasks, so their
//! latency and failures never reach the rollback caller.

use std::sync::Arc;

use async_trait::async_trait;
use prizm_persist::MemoryIdsByLayer;
use serde::Deserialize;
use serde::Serialize;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RollbackEvent {
    pub scope: String,
    pub session_id: String,
    pub checkpoint_id: String,
    pub removed_memory_ids: MemoryIdsByLayer,
    /// Documents deleted because the rolled-back turn created them.
    pub deleted_document_ids: Vec<String>,
    pub remaining_message_count: usize,
}

#[async_trait]
pub trait RollbackSubscriber: Send + Sync {
    /// Name used in logs when the subscriber fails.
    fn name(&self) -> &str;

    async fn on_rollback(&self, event: &RollbackEvent) -> anyhow::Result<()>;
}

#[derive(Debug, Clone)]
pub struct RollbackEventBus {
    sender: broadcast::Sender<RollbackEvent>,
}

impl RollbackEventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publish without waiting on any subscriber. Returns how many receivers
    /// were handed the event.
    pub fn publish(&self, event: RollbackEvent) -> usize {
        match self.sender.send(event) {
            Ok(receivers) => receivers,
            Err(broadcast::error::SendError(event)) => {
                tracing::debug!(
                    session_id = %event.session_id,
                    checkpoint_id = %event.checkpoint_id,
                    "no rollback subscribers"
                );
                0
            }
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RollbackEvent> {
        self.sender.subscribe()
    }

    /// Drive `subscriber` on its own task until the bus is dropped.
    pub fn spawn_subscriber(&self, subscriber: Arc<dyn RollbackSubscriber>) -> JoinHandle<()> {
        let mut receiver = self.sender.subscribe();
        tokio::spawn(async move {
            loop {
                match receiver.recv().await {
                    Ok(event) => {
                        if let Err(e) = subscriber.on_rollback(&event).await {
                            tracing::warn!(
                                subscriber = subscriber.name(),
                                session_id = %event.session_id,
                                checkpoint_id = %event.checkpoint_id,
                                error = %e,
                                "rollback subscriber failed"
                            );
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(
                            subscriber = subscriber.name(),
                            skipped,
                            "rollback subscriber lagged; events dropped"
                        );
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }
}
