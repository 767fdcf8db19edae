//! In-flight operation ledger.
//!
//! Tracks the ids of operations handed to the caller but not acknowledged
//! yet, in delivery order. The consumer position may only move to an id
//! once it is the oldest entry in the ledger, which lets the caller
//! acknowledge out of order without the persisted position ever skipping
//! over unfinished work.

use parking_lot::RwLock;
use tokio::sync::watch;
use tracing::debug;

/// Ordered set of delivered but unacknowledged operation ids.
///
/// The ledger can be locked, in which case [`push`](Self::push) waits until
/// it is unlocked again. The consumer locks it after delivering a `reset`
/// so that nothing following the reset is delivered before the caller has
/// acknowledged it.
#[derive(Debug)]
pub struct InFlightLedger {
    ids: RwLock<Vec<String>>,
    locked: watch::Sender<bool>,
}

impl InFlightLedger {
    /// Create an empty, unlocked ledger.
    pub fn new() -> Self {
        let (locked, _) = watch::channel(false);
        Self {
            ids: RwLock::new(Vec::new()),
            locked,
        }
    }

    /// Number of operations in flight.
    pub fn count(&self) -> usize {
        self.ids.read().len()
    }

    /// Returns true when every delivered operation has been acknowledged.
    pub fn is_empty(&self) -> bool {
        self.ids.read().is_empty()
    }

    /// Append `id`, waiting first for the ledger to be unlocked.
    ///
    /// Pushing an id already in flight is a no-op.
    pub async fn push(&self, id: &str) {
        self.wait_unlocked().await;
        self.insert(id);
    }

    /// Wait until the ledger is unlocked.
    pub async fn wait_unlocked(&self) {
        let mut gate = self.locked.subscribe();
        // The sender lives as long as self, so this can't fail
        let _ = gate.wait_for(|locked| !*locked).await;
    }

    /// Remove `id` and return the index it occupied, or `None` if it wasn't
    /// in flight.
    pub fn pull(&self, id: &str) -> Option<usize> {
        let mut ids = self.ids.write();
        let index = ids.iter().position(|eid| eid == id)?;
        ids.remove(index);
        debug!(id, index, remaining = ids.len(), "Pulled in-flight operation");
        Some(index)
    }

    /// Make further pushes wait until [`unlock`](Self::unlock).
    pub fn lock(&self) {
        self.locked.send_replace(true);
    }

    /// Release pushes waiting on a lock.
    pub fn unlock(&self) {
        self.locked.send_replace(false);
    }

    fn insert(&self, id: &str) {
        let mut ids = self.ids.write();
        if ids.iter().any(|eid| eid == id) {
            return;
        }
        ids.push(id.to_string());
    }
}

impl Default for InFlightLedger {
    fn default() -> Self {
        Self::new()
    }
}
