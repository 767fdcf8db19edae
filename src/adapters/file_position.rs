//! File-based position store adapter.
//!
//! The state file holds the bare position token, nothing else. It is read
//! once when the consumer starts and fully rewritten on every save.

use async_trait::async_trait;
use std::ffi::OsString;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::traits::{is_valid_position, PositionStore, PositionStoreError, FULL_REPLICATION};

/// File-based position store.
///
/// Without a path the store is ephemeral: it always loads an empty position
/// (only future operations are streamed) and saving does nothing.
///
/// # Example
///
/// ```ignore
/// use oplogc::adapters::FilePositionStore;
/// use oplogc::traits::PositionStore;
///
/// let store = FilePositionStore::new(Some("oplog.state".into()), true);
/// // "0" on first run: replicate everything
/// let position = store.load().await?;
/// ```
#[derive(Debug, Clone)]
pub struct FilePositionStore {
    path: Option<PathBuf>,
    allow_replication: bool,
}

impl FilePositionStore {
    /// Create a store for the given state file.
    ///
    /// `allow_replication` decides what a missing state file means: a full
    /// replication when true, starting from the present otherwise.
    pub fn new(path: Option<PathBuf>, allow_replication: bool) -> Self {
        Self {
            path,
            allow_replication,
        }
    }

    /// Create a store that never persists anything.
    pub fn ephemeral() -> Self {
        Self::new(None, false)
    }

    /// Path of the state file, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn temp_path(path: &Path) -> PathBuf {
        let mut name = path
            .file_name()
            .map(OsString::from)
            .unwrap_or_else(|| OsString::from("state"));
        name.push(".tmp");
        path.with_file_name(name)
    }
}

#[async_trait]
impl PositionStore for FilePositionStore {
    async fn load(&self) -> Result<String, PositionStoreError> {
        let Some(path) = &self.path else {
            return Ok(String::new());
        };

        let content = match tokio::fs::read(path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %path.display(), "No state file, starting fresh");
                return Ok(if self.allow_replication {
                    FULL_REPLICATION.to_string()
                } else {
                    String::new()
                });
            }
            Err(e) => return Err(PositionStoreError::Read(format!("{}: {}", path.display(), e))),
        };

        let content = String::from_utf8(content).map_err(|e| PositionStoreError::Corrupt {
            content: String::from_utf8_lossy(e.as_bytes()).into_owned(),
        })?;
        if !is_valid_position(&content) {
            return Err(PositionStoreError::Corrupt { content });
        }
        Ok(content)
    }

    async fn save(&self, position: &str) -> Result<(), PositionStoreError> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        let temp = Self::temp_path(path);
        tokio::fs::write(&temp, position.as_bytes())
            .await
            .map_err(|e| PositionStoreError::Write(format!("{}: {}", temp.display(), e)))?;
        tokio::fs::rename(&temp, path)
            .await
            .map_err(|e| PositionStoreError::Write(format!("{}: {}", path.display(), e)))?;
        debug!(path = %path.display(), position, "Saved position");
        Ok(())
    }

    fn is_persistent(&self) -> bool {
        self.path.is_some()
    }
}
