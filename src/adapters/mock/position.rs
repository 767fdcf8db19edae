//! In-memory position store for testing.
//!
//! Keeps the position in memory and records every save, so tests can check
//! when and what the consumer persisted without touching the file system.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;

use crate::traits::{PositionStore, PositionStoreError};

/// In-memory position store for testing.
///
/// # Example
///
/// ```ignore
/// use oplogc::adapters::mock::InMemoryPositionStore;
/// use oplogc::traits::PositionStore;
///
/// let store = InMemoryPositionStore::with_position("42");
/// assert_eq!(store.load().await?, "42");
///
/// store.save("43").await?;
/// assert_eq!(store.saved(), vec!["43"]);
/// ```
#[derive(Debug, Clone)]
pub struct InMemoryPositionStore {
    /// Current stored position
    position: Arc<Mutex<String>>,
    /// Every successfully saved position, in order
    saves: Arc<Mutex<Vec<String>>>,
    /// Error returned by load, if any
    load_error: Arc<Mutex<Option<PositionStoreError>>>,
    /// Whether save should fail
    save_should_fail: Arc<Mutex<bool>>,
    /// Number of save attempts, failed ones included
    save_attempts: Arc<Mutex<usize>>,
}

impl InMemoryPositionStore {
    /// Create a store holding an empty position.
    pub fn new() -> Self {
        Self::with_position("")
    }

    /// Create a store holding the given position.
    pub fn with_position(position: &str) -> Self {
        Self {
            position: Arc::new(Mutex::new(position.to_string())),
            saves: Arc::new(Mutex::new(Vec::new())),
            load_error: Arc::new(Mutex::new(None)),
            save_should_fail: Arc::new(Mutex::new(false)),
            save_attempts: Arc::new(Mutex::new(0)),
        }
    }

    /// Make the next loads fail with the given error.
    pub fn set_load_error(&self, error: Option<PositionStoreError>) {
        *self.load_error.lock() = error;
    }

    /// Configure whether save should fail.
    pub fn set_save_should_fail(&self, should_fail: bool) {
        *self.save_should_fail.lock() = should_fail;
    }

    /// Current stored position.
    pub fn position(&self) -> String {
        self.position.lock().clone()
    }

    /// Successfully saved positions, oldest first.
    pub fn saved(&self) -> Vec<String> {
        self.saves.lock().clone()
    }

    /// Number of save attempts, failed ones included.
    pub fn save_attempts(&self) -> usize {
        *self.save_attempts.lock()
    }
}

impl Default for InMemoryPositionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PositionStore for InMemoryPositionStore {
    async fn load(&self) -> Result<String, PositionStoreError> {
        if let Some(err) = self.load_error.lock().clone() {
            return Err(err);
        }
        Ok(self.position())
    }

    async fn save(&self, position: &str) -> Result<(), PositionStoreError> {
        *self.save_attempts.lock() += 1;
        if *self.save_should_fail.lock() {
            return Err(PositionStoreError::Write("mock write failure".to_string()));
        }
        *self.position.lock() = position.to_string();
        self.saves.lock().push(position.to_string());
        Ok(())
    }
}
