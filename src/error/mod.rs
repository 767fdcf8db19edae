//! Error types for the oplog consumer.
//!
//! Every failure is reported as a [`ConsumerError`] value on the consumer's
//! error channel; the engine itself never terminates the process. Use
//! [`ConsumerError::category`] to decide how to react:
//!
//! | Error | Category | Engine behavior |
//! |-------|----------|-----------------|
//! | `IncompleteEvent`, `InvalidEvent` | Protocol | reconnect with backoff |
//! | `ConnectionClosed`, `Transport` | Network | reconnect with backoff |
//! | `Http` | Server | reconnect with backoff |
//! | `AccessDenied` | Auth | keeps retrying, callers usually stop |
//! | `ResumeFailed` | Resume | waits for a new position |
//! | `CorruptState`, `ReadingState`, `WritingState` | State | callers usually stop |

mod category;

pub use category::ErrorCategory;

use thiserror::Error;

use crate::traits::{HttpError, PositionStoreError};

/// Result alias for consumer operations.
pub type ConsumerResult<T> = Result<T, ConsumerError>;

/// Errors surfaced by the oplog consumer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConsumerError {
    /// A record ended without an `event` field.
    #[error("incomplete event")]
    IncompleteEvent,

    /// A record payload could not be decoded, or the record is not deliverable.
    #[error("invalid event: {reason}")]
    InvalidEvent { reason: String },

    /// The event stream ended or broke before a record was complete.
    #[error("connection closed")]
    ConnectionClosed,

    /// The oplog rejected the configured password.
    #[error("invalid credentials")]
    AccessDenied,

    /// The oplog did not resume from the requested position. Its retention
    /// window probably no longer covers it.
    #[error("resume failed from position {requested}")]
    ResumeFailed { requested: String },

    /// The persisted position is malformed.
    #[error("state file contains invalid data: {content:?}")]
    CorruptState { content: String },

    /// The persisted position exists but could not be read.
    #[error("reading state file failed: {message}")]
    ReadingState { message: String },

    /// The position could not be persisted.
    #[error("writing state file failed: {message}")]
    WritingState { message: String },

    /// The oplog answered with an unexpected status.
    #[error("HTTP error {status}: {body}")]
    Http { status: u16, body: String },

    /// The request could not be sent.
    #[error("transport error: {0}")]
    Transport(#[from] HttpError),
}

impl ConsumerError {
    /// Creates an invalid event error.
    pub fn invalid_event(reason: impl Into<String>) -> Self {
        Self::InvalidEvent {
            reason: reason.into(),
        }
    }

    /// Get the error category for handling decisions.
    pub fn category(&self) -> ErrorCategory {
        match self {
            ConsumerError::IncompleteEvent | ConsumerError::InvalidEvent { .. } => {
                ErrorCategory::Protocol
            }
            ConsumerError::ConnectionClosed | ConsumerError::Transport(_) => ErrorCategory::Network,
            ConsumerError::Http { .. } => ErrorCategory::Server,
            ConsumerError::AccessDenied => ErrorCategory::Auth,
            ConsumerError::ResumeFailed { .. } => ErrorCategory::Resume,
            ConsumerError::CorruptState { .. }
            | ConsumerError::ReadingState { .. }
            | ConsumerError::WritingState { .. } => ErrorCategory::State,
        }
    }

    /// Returns true if the engine recovers from this error on its own.
    pub fn is_retryable(&self) -> bool {
        self.category().is_retryable()
    }

    /// Returns true if callers conventionally stop the consumer on this error.
    pub fn is_fatal(&self) -> bool {
        self.category().is_fatal()
    }

    /// Returns true if streaming only resumes after the caller picks a new
    /// position.
    pub fn requires_caller_action(&self) -> bool {
        self.category() == ErrorCategory::Resume
    }
}

impl From<PositionStoreError> for ConsumerError {
    fn from(err: PositionStoreError) -> Self {
        match err {
            PositionStoreError::Corrupt { content } => ConsumerError::CorruptState { content },
            PositionStoreError::Read(message) => ConsumerError::ReadingState { message },
            PositionStoreError::Write(message) => ConsumerError::WritingState { message },
        }
    }
}
