//! Persistent store implementations.
//!
//! [`FileStore`] keeps calibration and leaderboard in a single JSON file,
//! rewritten through a temporary file and an atomic rename. [`MemoryStore`]
//! keeps them in process memory.

use std::path::{Path, PathBuf};
use std::sync::Mutex as StdMutex;

use axethrow_core::{CalibrationGeometry, Leaderboard};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use super::Store;
use crate::error::StoreError;

/// On-disk layout of the store file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreDocument {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub calibration: Option<CalibrationGeometry>,
    pub leaderboard: Leaderboard,
}

// ============================================================================
// FileStore
// ============================================================================

/// JSON file store.
///
/// Every write is a read-modify-write of the whole document under an async
/// lock, so concurrent writers never lose each other's keys.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read(&self) -> Result<StoreDocument, StoreError> {
        let raw = match tokio::fs::read(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(StoreDocument::default());
            }
            Err(source) => {
                return Err(StoreError::Io {
                    path: self.path.clone(),
                    source,
                });
            }
        };

        serde_json::from_slice(&raw).map_err(|source| StoreError::Corrupt {
            path: self.path.clone(),
            source,
        })
    }

    async fn write(&self, document: &StoreDocument) -> Result<(), StoreError> {
        let io_err = |source: std::io::Error| StoreError::Io {
            path: self.path.clone(),
            source,
        };

        let serialized = serde_json::to_vec_pretty(document).map_err(|source| {
            StoreError::Corrupt {
                path: self.path.clone(),
                source,
            }
        })?;

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        tokio::fs::write(&tmp, serialized).await.map_err(io_err)?;
        tokio::fs::rename(&tmp, &self.path).await.map_err(io_err)?;
        Ok(())
    }

    async fn update(&self, apply: impl FnOnce(&mut StoreDocument) + Send) -> Result<(), StoreError> {
        let _guard = self.lock.lock().await;
        let mut document = self.read().await?;
        apply(&mut document);
        self.write(&document).await
    }
}

#[async_trait::async_trait]
impl Store for FileStore {
    async fn calibration(&self) -> Result<Option<CalibrationGeometry>, StoreError> {
        let _guard = self.lock.lock().await;
        Ok(self.read().await?.calibration)
    }

    async fn set_calibration(&self, calibration: &CalibrationGeometry) -> Result<(), StoreError> {
        let calibration = *calibration;
        self.update(move |doc| doc.calibration = Some(calibration))
            .await
    }

    async fn leaderboard(&self) -> Result<Leaderboard, StoreError> {
        let _guard = self.lock.lock().await;
        Ok(self.read().await?.leaderboard)
    }

    async fn set_leaderboard(&self, leaderboard: &Leaderboard) -> Result<(), StoreError> {
        let leaderboard = leaderboard.clone();
        self.update(move |doc| doc.leaderboard = leaderboard).await
    }
}

// ============================================================================
// MemoryStore
// ============================================================================

/// In-process store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    document: StdMutex<StoreDocument>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-populated with `document`.
    #[must_use]
    pub fn with_document(document: StoreDocument) -> Self {
        Self {
            document: StdMutex::new(document),
        }
    }

    /// Returns a copy of the current contents.
    #[must_use]
    pub fn document(&self) -> StoreDocument {
        self.with(|doc| doc.clone())
    }

    fn with<T>(&self, f: impl FnOnce(&mut StoreDocument) -> T) -> T {
        let mut guard = match self.document.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(&mut guard)
    }
}

#[async_trait::async_trait]
impl Store for MemoryStore {
    async fn calibration(&self) -> Result<Option<CalibrationGeometry>, StoreError> {
        Ok(self.with(|doc| doc.calibration))
    }

    async fn set_calibration(&self, calibration: &CalibrationGeometry) -> Result<(), StoreError> {
        self.with(|doc| doc.calibration = Some(*calibration));
        Ok(())
    }

    async fn leaderboard(&self) -> Result<Leaderboard, StoreError> {
        Ok(self.with(|doc| doc.leaderboard.clone()))
    }

    async fn set_leaderboard(&self, leaderboard: &Leaderboard) -> Result<(), StoreError> {
        self.with(|doc| doc.leaderboard = leaderboard.clone());
        Ok(())
    }
}
