//! Delivered operations and their acknowledgement handles.

use tokio::sync::mpsc;
use tracing::debug;

use crate::operation::Operation;

/// Acknowledgement sent from the caller to the consumer's control loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Ack {
    pub(crate) id: String,
    pub(crate) reset: bool,
}

/// Handle acknowledging one delivered operation.
///
/// Every delivered operation must be acknowledged once handled. An operation
/// that is never acknowledged holds the consumer position back for good.
#[derive(Debug)]
pub struct AckHandle {
    id: String,
    reset: bool,
    sink: mpsc::UnboundedSender<Ack>,
}

impl AckHandle {
    pub(crate) fn new(operation: &Operation, sink: mpsc::UnboundedSender<Ack>) -> Self {
        Self {
            id: operation.id.clone(),
            reset: operation.is_reset(),
            sink,
        }
    }

    /// Id of the acknowledged operation.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Mark the operation as handled.
    pub fn done(self) {
        let ack = Ack {
            id: self.id,
            reset: self.reset,
        };
        if self.sink.send(ack).is_err() {
            debug!("Consumer stopped, acknowledgement dropped");
        }
    }
}

/// An operation handed to the caller, along with its acknowledgement handle.
#[derive(Debug)]
pub struct Delivery {
    /// The decoded operation
    pub operation: Operation,
    /// Handle to call once the operation is handled
    pub ack: AckHandle,
}

impl Delivery {
    pub(crate) fn new(operation: Operation, sink: mpsc::UnboundedSender<Ack>) -> Self {
        let ack = AckHandle::new(&operation, sink);
        Self { operation, ack }
    }

    /// Acknowledge the operation right away.
    pub fn done(self) {
        self.ack.done();
    }

    /// Split into the operation and its handle, e.g. to hand them to a
    /// worker.
    pub fn into_parts(self) -> (Operation, AckHandle) {
        (self.operation, self.ack)
    }
}
