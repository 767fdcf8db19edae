//! Console rendering of operations and error handling policy for
//! `oplog-tail`.

use crate::error::ConsumerError;
use crate::operation::Operation;

/// Render one operation as a console line.
///
/// Control events print as `** reset` and `** live`. Other operations print
/// their timestamp, event, id, target and parents.
pub fn format_operation(operation: &Operation) -> String {
    if operation.is_reset() || operation.is_live() {
        return format!("** {}", operation.event);
    }

    let Some(data) = &operation.data else {
        return format!("{} #{}", operation.event, operation.id);
    };
    let target = match &data.reference {
        Some(reference) if !reference.is_empty() => reference.clone(),
        _ => format!("{}/{}", data.kind, data.id),
    };
    format!(
        "{}: {} #{} {} ({})",
        data.timestamp.to_rfc3339(),
        operation.event,
        operation.id,
        target,
        data.parents.join(", ")
    )
}

/// What the tail command does about a reported error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorAction {
    /// Log and keep going
    Log,
    /// Restart from the beginning of the oplog
    Replicate,
    /// Stop the consumer and exit with failure
    Exit,
}

/// Decide how to react to `err`.
pub fn error_action(err: &ConsumerError, has_state_file: bool) -> ErrorAction {
    if err.is_fatal() {
        ErrorAction::Exit
    } else if err.requires_caller_action() && has_state_file {
        ErrorAction::Replicate
    } else {
        ErrorAction::Log
    }
}
