//! Shared consumer position.

use parking_lot::RwLock;
use tokio::sync::watch;

#[derive(Debug, Default)]
struct Inner {
    last_id: String,
    saved: bool,
    processing: bool,
}

/// Position of the consumer, its persistence status and the running flag,
/// behind a single lock.
///
/// Every position change bumps a revision counter observable with
/// [`subscribe`](Self::subscribe), which is how the read loop learns that a
/// new position was picked after a failed resume.
#[derive(Debug)]
pub(crate) struct ConsumerState {
    inner: RwLock<Inner>,
    revision: watch::Sender<u64>,
}

impl ConsumerState {
    pub(crate) fn new() -> Self {
        let (revision, _) = watch::channel(0);
        Self {
            inner: RwLock::new(Inner::default()),
            revision,
        }
    }

    pub(crate) fn position(&self) -> String {
        self.inner.read().last_id.clone()
    }

    /// Current position and whether it is already persisted.
    pub(crate) fn snapshot(&self) -> (String, bool) {
        let inner = self.inner.read();
        (inner.last_id.clone(), inner.saved)
    }

    /// Install the position read from the store.
    pub(crate) fn restore(&self, id: &str) {
        {
            let mut inner = self.inner.write();
            inner.last_id = id.to_string();
            inner.saved = true;
        }
        self.bump();
    }

    /// Move the position, marking it as not persisted.
    pub(crate) fn advance(&self, id: &str) {
        {
            let mut inner = self.inner.write();
            inner.last_id = id.to_string();
            inner.saved = false;
        }
        self.bump();
    }

    /// Record that `id` was persisted. The position stays dirty if it moved
    /// while the store was writing.
    pub(crate) fn mark_saved(&self, id: &str) {
        let mut inner = self.inner.write();
        inner.saved = inner.last_id == id;
    }

    /// Set the running flag, returning its previous value.
    pub(crate) fn set_processing(&self, processing: bool) -> bool {
        std::mem::replace(&mut self.inner.write().processing, processing)
    }

    pub(crate) fn is_processing(&self) -> bool {
        self.inner.read().processing
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    fn bump(&self) {
        self.revision.send_modify(|revision| *revision = revision.wrapping_add(1));
    }
}
