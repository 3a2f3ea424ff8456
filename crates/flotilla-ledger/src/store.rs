use std::collections::HashMap;

use rusqlite::ErrorCode;

use crate::{MatchId, SkirmishResult};

#[derive(Debug, derive_more::Display, derive_more::Error)]
pub enum StoreError {
    /// Another connection holds the database lock.
    #[display("store is locked by another writer")]
    Busy,
    #[display("store unavailable: {_0}")]
    Unavailable(#[error(not(source))] String),
    #[display("sqlite error: {_0}")]
    Sqlite(rusqlite::Error),
    #[display("record encoding error: {_0}")]
    Encoding(serde_json::Error),
    #[display("corrupt record: {_0}")]
    Corrupt(#[error(not(source))] String),
    /// A different record is already stored under this match id.
    #[display("match {_0} is already stored with different contents")]
    Conflict(#[error(not(source))] MatchId),
}

impl StoreError {
    /// Whether retrying the same commit later may succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Busy | Self::Unavailable(_))
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        match err.sqlite_error_code() {
            Some(ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked) => Self::Busy,
            _ => Self::Sqlite(err),
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::Encoding(err)
    }
}

/// Destination of committed batches.
///
/// `commit_batch` is all-or-nothing: on error none of the batch is visible. The
/// ledger guarantees a single caller at a time.
///
/// Records are keyed by match id. Committing a record that is already stored
/// unchanged is a no-op; a different record under a stored id fails the batch with
/// [`StoreError::Conflict`].
pub trait SkirmishStore: Send {
    fn commit_batch(&mut self, batch: &[SkirmishResult]) -> Result<(), StoreError>;
}

impl<S> SkirmishStore for Box<S>
where
    S: SkirmishStore + ?Sized,
{
    fn commit_batch(&mut self, batch: &[SkirmishResult]) -> Result<(), StoreError> {
        (**self).commit_batch(batch)
    }
}

/// Store that keeps committed results in memory.
///
/// Failures can be injected to exercise the retry path.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Vec<SkirmishResult>,
    index: HashMap<MatchId, usize>,
    batch_sizes: Vec<usize>,
    failures_left: usize,
    attempts: usize,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `n` commits fail with [`StoreError::Busy`].
    pub fn fail_next(&mut self, n: usize) {
        self.failures_left = n;
    }

    #[must_use]
    pub fn records(&self) -> &[SkirmishResult] {
        &self.records
    }

    /// Sizes of the committed batches, in commit order.
    #[must_use]
    pub fn batch_sizes(&self) -> &[usize] {
        &self.batch_sizes
    }

    /// Commit calls, failed ones included.
    #[must_use]
    pub fn attempts(&self) -> usize {
        self.attempts
    }
}

impl SkirmishStore for MemoryStore {
    fn commit_batch(&mut self, batch: &[SkirmishResult]) -> Result<(), StoreError> {
        self.attempts += 1;
        if self.failures_left > 0 {
            self.failures_left -= 1;
            return Err(StoreError::Busy);
        }

        let mut fresh = HashMap::new();
        for (pos, result) in batch.iter().enumerate() {
            let stored = self
                .index
                .get(&result.match_id)
                .map(|&i| &self.records[i])
                .or_else(|| fresh.get(&result.match_id).map(|&i| &batch[i]));
            match stored {
                Some(stored) if stored == result => {}
                Some(_) => return Err(StoreError::Conflict(result.match_id)),
                None => {
                    fresh.insert(result.match_id, pos);
                }
            }
        }

        let mut added = fresh.into_values().collect::<Vec<_>>();
        added.sort_unstable();
        for pos in added {
            self.index.insert(batch[pos].match_id, self.records.len());
            self.records.push(batch[pos].clone());
        }
        self.batch_sizes.push(batch.len());
        Ok(())
    }
}
