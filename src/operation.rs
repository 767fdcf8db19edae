//! Oplog operation records.
//!
//! An [`Operation`] is one record decoded from the oplog event stream. Regular
//! mutations (`insert`, `update`, `delete`) carry an [`OperationData`] payload,
//! while the control events `reset` and `live` come without one.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Event kind telling the consumer to rebuild its downstream state.
pub const EVENT_RESET: &str = "reset";

/// Event kind telling the consumer the replication caught up with the present.
pub const EVENT_LIVE: &str = "live";

/// Metadata of the object touched by an operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationData {
    /// Object id
    pub id: String,
    /// Object type
    #[serde(rename = "type")]
    pub kind: String,
    /// URL to fetch the object from. Only present when the oplog server is
    /// configured to generate it.
    #[serde(rename = "ref", default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    /// When the operation happened
    pub timestamp: DateTime<Utc>,
    /// Objects related to this one, as `type/id` strings
    #[serde(default)]
    pub parents: Vec<String>,
}

/// A single decoded oplog record.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Operation {
    /// Wire identifier, used as resume token and as acknowledgement key
    pub id: String,
    /// Kind of operation: insert, update, delete, reset or live
    pub event: String,
    /// Payload, absent for control events
    pub data: Option<OperationData>,
}

impl Operation {
    /// Returns true for `reset` operations.
    pub fn is_reset(&self) -> bool {
        self.event == EVENT_RESET
    }

    /// Returns true for `live` operations.
    pub fn is_live(&self) -> bool {
        self.event == EVENT_LIVE
    }

    /// Returns true for control events, which never carry a payload.
    pub fn is_control(&self) -> bool {
        self.is_reset() || self.is_live()
    }

    /// Checks the record is deliverable: it must name an event, and anything
    /// but a control event must carry data.
    pub fn is_valid(&self) -> bool {
        if self.event.is_empty() {
            return false;
        }
        self.data.is_some() || self.is_control()
    }
}
