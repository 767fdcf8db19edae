//! Error category classification.
//!
//! Every consumer error falls into a category that tells the caller how the
//! engine deals with it and what, if anything, the caller should do.

use std::fmt;

/// High-level categorization of consumer errors for handling decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Connection broken or never established.
    /// The engine reconnects with backoff.
    Network,

    /// The stream carried a malformed record.
    /// The engine drops the connection and reconnects with backoff.
    Protocol,

    /// The server answered with an unexpected status.
    /// The engine reconnects with backoff.
    Server,

    /// Credentials were rejected.
    /// The engine keeps retrying; callers conventionally stop.
    Auth,

    /// The server no longer holds the requested position.
    /// The engine waits for the caller to choose a new position.
    Resume,

    /// The persisted position could not be read, parsed or written.
    /// Callers conventionally stop.
    State,
}

impl ErrorCategory {
    /// Returns true if the engine retries on its own.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ErrorCategory::Network | ErrorCategory::Protocol | ErrorCategory::Server
        )
    }

    /// Returns true if callers should treat the error as terminal.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ErrorCategory::Auth | ErrorCategory::State)
    }

    /// Returns a short label for the category suitable for logging.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::Network => "network",
            ErrorCategory::Protocol => "protocol",
            ErrorCategory::Server => "server",
            ErrorCategory::Auth => "auth",
            ErrorCategory::Resume => "resume",
            ErrorCategory::State => "state",
        }
    }

    /// Returns suggested recovery actions for this category.
    pub fn recovery_hint(&self) -> &'static str {
        match self {
            ErrorCategory::Network | ErrorCategory::Protocol | ErrorCategory::Server => {
                "Reconnecting automatically"
            }
            ErrorCategory::Auth => "Check the oplog password",
            ErrorCategory::Resume => {
                "Force a full replication with position \"0\" or accept the lost operations"
            }
            ErrorCategory::State => "Check the state file content and permissions",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
