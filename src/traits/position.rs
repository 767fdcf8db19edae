//! Position store trait abstraction.
//!
//! The position is the id of the last operation known to be fully handled.
//! It is loaded once when a consumer starts and written back whenever it
//! advances, so that a restarted process resumes where the previous one
//! stopped.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

/// Position requesting a full replication from the origin of the oplog.
pub const FULL_REPLICATION: &str = "0";

/// Either a timestamp based id (up to 13 digits, empty included) or an
/// object id (24 lowercase hex characters).
static POSITION_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:[0-9]{0,13}|[0-9a-f]{24})$").expect("valid position regex"));

/// Returns true if `token` is something the oplog accepts as a resume point.
pub fn is_valid_position(token: &str) -> bool {
    POSITION_PATTERN.is_match(token)
}

/// Position persistence errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PositionStoreError {
    /// Stored content is not a valid position
    #[error("state contains invalid data: {content:?}")]
    Corrupt { content: String },
    /// Stored content exists but could not be read
    #[error("failed to read state: {0}")]
    Read(String),
    /// Position could not be written
    #[error("failed to write state: {0}")]
    Write(String),
}

/// Trait for loading and persisting the consumer position.
///
/// # Contract
///
/// - `load` returns an empty string to start from the present, `"0"` to
///   replicate the full oplog, or a previously saved id.
/// - `save` replaces the stored position entirely.
#[async_trait]
pub trait PositionStore: Send + Sync {
    /// Load the stored position.
    async fn load(&self) -> Result<String, PositionStoreError>;

    /// Replace the stored position.
    async fn save(&self, position: &str) -> Result<(), PositionStoreError>;

    /// Whether saved positions outlive the process. The consumer skips
    /// periodic saving for stores that don't.
    fn is_persistent(&self) -> bool {
        true
    }
}
