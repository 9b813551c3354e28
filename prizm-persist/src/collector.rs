use std::collections::BTreeMap;
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::PoisonError;

/// Resource key to its serialized pre-mutation value. `None` means the
/// resource did not exist before the turn touched it.
pub type SnapshotSet = BTreeMap<String, Option<String>>;

/// Per-turn buffers of pre-mutation values, one per session.
///
/// The first capture of a key within a turn wins; later captures of the
/// same key are ignored so the buffer always holds the value from before
/// the turn's first mutation.
#[derive(Debug, Default)]
pub struct SnapshotCollector {
    buffers: Mutex<HashMap<String, SnapshotSet>>,
}

impl SnapshotCollector {
    pub fn new() -> Self {
        Self::default()
    }

    fn buffers(&self) -> MutexGuard<'_, HashMap<String, SnapshotSet>> {
        // Every mutation is a single insert or remove, so a poisoned map is
        // still consistent.
        self.buffers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Start a fresh buffer for `session_id`, dropping anything unflushed.
    pub fn begin(&self, session_id: &str) {
        let previous = self
            .buffers()
            .insert(session_id.to_string(), SnapshotSet::new());
        if let Some(previous) = previous
            && !previous.is_empty()
        {
            tracing::debug!(
                session_id,
                dropped = previous.len(),
                "discarding unflushed snapshot buffer"
            );
        }
    }

    /// Record `key`'s value before mutation. No-op when the key was already
    /// captured this turn or no buffer is active for the session.
    pub fn capture(&self, session_id: &str, key: &str, previous: Option<String>) {
        let mut buffers = self.buffers();
        let Some(buffer) = buffers.get_mut(session_id) else {
            tracing::debug!(session_id, key, "capture without active turn ignored");
            return;
        };
        buffer.entry(key.to_string()).or_insert(previous);
    }

    /// Return and clear the session's buffer.
    pub fn flush(&self, session_id: &str) -> SnapshotSet {
        self.buffers().remove(session_id).unwrap_or_default()
    }

    /// Clear the session's buffer without returning it.
    pub fn discard(&self, session_id: &str) {
        self.buffers().remove(session_id);
    }

    pub fn is_active(&self, session_id: &str) -> bool {
        self.buffers().contains_key(session_id)
    }
}
