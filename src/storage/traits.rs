use async_trait::async_trait;
use crate::sample::PositionSample;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    /// Store could not be opened or its schema created. Fatal at startup.
    #[error("Storage init failed: {0}")]
    Init(String),
    #[error("Storage backend error: {0}")]
    Backend(String),
}

/// Synthetic, monotonically increasing identifier assigned at insertion.
pub type RowId = i64;

/// A persisted sample together with its insertion id.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredSample {
    pub id: RowId,
    pub sample: PositionSample,
}

/// Durable log of samples that could not be delivered immediately.
///
/// Implementations acquire and release their storage handle per call; no
/// transaction is held across calls.
#[async_trait]
pub trait LocalStore: Send + Sync {
    /// Idempotently ensure the durable schema exists.
    async fn init(&self) -> Result<(), StorageError>;

    /// Persist every sample of the batch, all or nothing, in batch order.
    async fn append(&self, batch: &[PositionSample]) -> Result<(), StorageError>;

    /// Every persisted row in insertion order.
    async fn read_all(&self) -> Result<Vec<StoredSample>, StorageError>;

    /// Delete every row with `id <= through`. Rows appended after the
    /// `read_all` that produced `through` are kept.
    ///
    /// Returns the number of rows removed.
    async fn clear(&self, through: RowId) -> Result<u64, StorageError>;

    /// Number of persisted rows.
    async fn count(&self) -> Result<u64, StorageError>;

    /// Reclaim space after a drain. Default is a no-op.
    async fn compact(&self) -> Result<(), StorageError> {
        Ok(())
    }
}
