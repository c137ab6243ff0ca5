use async_trait::async_trait;
use parking_lot::{Mutex, MutexGuard};
use crate::sample::PositionSample;
use super::traits::{LocalStore, RowId, StorageError, StoredSample};

/// Volatile [`LocalStore`] kept behind a mutex.
///
/// Used in tests and wherever durability is not required. Row ids behave
/// like SQLite AUTOINCREMENT: never reused, even after a clear.
pub struct InMemoryStore {
    inner: Mutex<Rows>,
}

#[derive(Default)]
struct Rows {
    next_id: RowId,
    rows: Vec<StoredSample>,
}

impl InMemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Rows { next_id: 1, rows: Vec::new() }),
        }
    }

    /// Get current row count
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().rows.len()
    }

    /// Check if empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().rows.is_empty()
    }

    /// Snapshot of the stored samples, oldest first
    #[must_use]
    pub fn samples(&self) -> Vec<PositionSample> {
        self.lock().rows.iter().map(|r| r.sample.clone()).collect()
    }

    fn lock(&self) -> MutexGuard<'_, Rows> {
        self.inner.lock()
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LocalStore for InMemoryStore {
    async fn init(&self) -> Result<(), StorageError> {
        Ok(())
    }

    async fn append(&self, batch: &[PositionSample]) -> Result<(), StorageError> {
        let mut inner = self.lock();
        for sample in batch {
            let id = inner.next_id;
            inner.next_id += 1;
            inner.rows.push(StoredSample { id, sample: sample.clone() });
        }
        Ok(())
    }

    async fn read_all(&self) -> Result<Vec<StoredSample>, StorageError> {
        Ok(self.lock().rows.clone())
    }

    async fn clear(&self, through: RowId) -> Result<u64, StorageError> {
        let mut inner = self.lock();
        let before = inner.rows.len();
        inner.rows.retain(|r| r.id > through);
        Ok((before - inner.rows.len()) as u64)
    }

    async fn count(&self) -> Result<u64, StorageError> {
        Ok(self.lock().rows.len() as u64)
    }
}
