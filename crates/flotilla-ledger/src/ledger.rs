use std::{
    cell::RefCell,
    sync::atomic::{AtomicBool, AtomicU64, Ordering},
    thread,
    time::Duration,
};

use parking_lot::ReentrantMutex;
use serde::{Deserialize, Serialize};

use crate::{BatchQueue, SkirmishResult, SkirmishStore, StoreError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerParams {
    /// Maximum results per transaction; a full batch triggers a commit.
    pub batch_size: usize,
    /// Results the queue holds before producers block.
    pub queue_capacity: usize,
    pub max_commit_attempts: u32,
    /// Delay before the first retry; doubled after every failed attempt.
    pub retry_backoff_ms: u64,
}

impl Default for LedgerParams {
    fn default() -> Self {
        Self {
            batch_size: 10,
            queue_capacity: 40,
            max_commit_attempts: 4,
            retry_backoff_ms: 25,
        }
    }
}

#[derive(Debug, derive_more::Display, derive_more::Error)]
pub enum LedgerError {
    #[display("batch commit failed after {attempts} attempts; {pending} results still queued")]
    CommitFailed {
        attempts: u32,
        pending: usize,
        source: StoreError,
    },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FlushSummary {
    pub batches: usize,
    pub committed: usize,
}

/// Shared, batching writer in front of a [`SkirmishStore`].
///
/// Any number of threads may [`submit`](Ledger::submit) concurrently. Draining the
/// queue and committing happen under one re-entrant writer lock, so exactly one
/// consumer is active at a time and a batch is never split between two of them.
#[derive(Debug)]
pub struct Ledger<S> {
    params: LedgerParams,
    queue: BatchQueue,
    store: ReentrantMutex<RefCell<S>>,
    degraded: AtomicBool,
    submitted: AtomicU64,
    committed: AtomicU64,
}

impl<S> Ledger<S>
where
    S: SkirmishStore,
{
    #[must_use]
    pub fn new(store: S, params: LedgerParams) -> Self {
        assert!(params.batch_size > 0, "batch size must be positive");
        Self {
            params,
            queue: BatchQueue::new(params.queue_capacity.max(params.batch_size)),
            store: ReentrantMutex::new(RefCell::new(store)),
            degraded: AtomicBool::new(false),
            submitted: AtomicU64::new(0),
            committed: AtomicU64::new(0),
        }
    }

    #[must_use]
    pub fn params(&self) -> &LedgerParams {
        &self.params
    }

    /// Queues a result. When the push completes a batch, the calling thread commits
    /// full batches before returning.
    ///
    /// Never fails and never drops the result: commit failures are logged and the
    /// result stays queued for a later flush.
    pub fn submit(&self, result: SkirmishResult) {
        tracing::trace!(match_id = %result.match_id, "result submitted");
        let len = self.queue.push(result);
        self.submitted.fetch_add(1, Ordering::Relaxed);
        if len >= self.params.batch_size && !self.is_degraded() {
            // failure is already logged and leaves the results queued
            let _ = self.commit_pending(self.params.batch_size);
        }
    }

    /// Commits every queued result in batches of at most `batch_size`.
    ///
    /// Called at generation boundaries. Returns [`LedgerError::CommitFailed`] when a
    /// batch exhausts its retries; the uncommitted results stay queued.
    pub fn flush(&self) -> Result<FlushSummary, LedgerError> {
        let _writer = self.store.lock();
        let full = self.commit_pending(self.params.batch_size)?;
        let rest = self.commit_pending(1)?;
        let summary = FlushSummary {
            batches: full.batches + rest.batches,
            committed: full.committed + rest.committed,
        };
        tracing::info!(
            batches = summary.batches,
            committed = summary.committed,
            "ledger flushed"
        );
        Ok(summary)
    }

    /// Whether the last commit exhausted its retries.
    ///
    /// While degraded, producers are never blocked and submits do not commit.
    #[must_use]
    pub fn is_degraded(&self) -> bool {
        self.degraded.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn submitted(&self) -> u64 {
        self.submitted.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn committed(&self) -> u64 {
        self.committed.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Runs `f` with the store while holding the writer lock.
    pub fn with_store<T>(&self, f: impl FnOnce(&mut S) -> T) -> T {
        let guard = self.store.lock();
        let mut store = guard.borrow_mut();
        f(&mut store)
    }

    #[must_use]
    pub fn into_store(self) -> S {
        self.store.into_inner().into_inner()
    }

    /// Commits batches while at least `min_len` results are queued.
    fn commit_pending(&self, min_len: usize) -> Result<FlushSummary, LedgerError> {
        let writer = self.store.lock();
        let mut summary = FlushSummary::default();
        while self.queue.len() >= min_len {
            let batch = self.queue.drain(self.params.batch_size);
            if batch.is_empty() {
                break;
            }
            summary.committed += self.commit_with_retry(&writer, batch)?;
            summary.batches += 1;
        }
        Ok(summary)
    }

    fn commit_with_retry(
        &self,
        store: &RefCell<S>,
        batch: Vec<SkirmishResult>,
    ) -> Result<usize, LedgerError> {
        let max_attempts = self.params.max_commit_attempts.max(1);
        let mut backoff = Duration::from_millis(self.params.retry_backoff_ms);
        let mut attempt = 1;
        let err = loop {
            match store.borrow_mut().commit_batch(&batch) {
                Ok(()) => {
                    self.mark_healthy();
                    self.committed
                        .fetch_add(batch.len() as u64, Ordering::Relaxed);
                    tracing::debug!(size = batch.len(), "batch committed");
                    return Ok(batch.len());
                }
                // permanent errors such as conflicts fail every retry the same way
                Err(err) if attempt >= max_attempts || !err.is_transient() => break err,
                Err(err) => {
                    tracing::warn!(
                        attempt,
                        attempts = max_attempts,
                        %err,
                        "batch commit failed, retrying"
                    );
                    thread::sleep(backoff);
                    backoff *= 2;
                    attempt += 1;
                }
            }
        };

        let attempts = attempt;
        self.queue.requeue_front(batch);
        self.degraded.store(true, Ordering::Release);
        self.queue.set_unbounded(true);
        let pending = self.queue.len();
        tracing::warn!(attempts, pending, %err, "persistence degraded, results kept in queue");
        Err(LedgerError::CommitFailed {
            attempts,
            pending,
            source: err,
        })
    }

    fn mark_healthy(&self) {
        if self.degraded.swap(false, Ordering::AcqRel) {
            self.queue.set_unbounded(false);
            tracing::info!("persistence recovered");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;
    use crate::{
        MemoryStore, SqliteReader, SqliteStore,
        record::tests::{RUN, sample},
        sqlite::tests::TempDb,
    };

    fn params() -> LedgerParams {
        LedgerParams {
            retry_backoff_ms: 1,
            ..LedgerParams::default()
        }
    }

    #[test]
    fn test_batches_of_ten_then_forced_flush() {
        let ledger = Ledger::new(MemoryStore::new(), params());
        for i in 0..23 {
            ledger.submit(sample(0, i));
        }
        assert_eq!(ledger.pending(), 3);
        ledger.with_store(|store| assert_eq!(store.batch_sizes(), &[10, 10]));

        let summary = ledger.flush().unwrap();
        assert_eq!(
            summary,
            FlushSummary {
                batches: 1,
                committed: 3
            }
        );
        let store = ledger.into_store();
        assert_eq!(store.batch_sizes(), &[10, 10, 3]);
        let indices = store
            .records()
            .iter()
            .map(|r| r.match_id.index)
            .collect::<Vec<_>>();
        assert_eq!(indices, (0..23).collect::<Vec<_>>());
    }

    #[test]
    fn test_concurrent_producers_persist_exactly_once() {
        let ledger = Ledger::new(
            MemoryStore::new(),
            LedgerParams {
                queue_capacity: 12,
                ..params()
            },
        );
        std::thread::scope(|s| {
            for worker in 0..8 {
                let ledger = &ledger;
                s.spawn(move || {
                    for i in 0..50 {
                        ledger.submit(sample(worker, i));
                    }
                });
            }
        });
        ledger.flush().unwrap();
        assert_eq!(ledger.submitted(), 400);
        assert_eq!(ledger.committed(), 400);
        assert_eq!(ledger.pending(), 0);

        let store = ledger.into_store();
        assert!(store.batch_sizes().iter().all(|n| (1..=10).contains(n)));
        let ids = store
            .records()
            .iter()
            .map(|r| r.match_id)
            .collect::<BTreeSet<_>>();
        assert_eq!(ids.len(), 400);
        assert_eq!(store.records().len(), 400);
    }

    #[test]
    fn test_transient_failure_is_retried() {
        let mut store = MemoryStore::new();
        store.fail_next(2);
        let ledger = Ledger::new(store, params());
        for i in 0..10 {
            ledger.submit(sample(1, i));
        }
        assert_eq!(ledger.pending(), 0);
        assert!(!ledger.is_degraded());
        ledger.with_store(|store| {
            assert_eq!(store.attempts(), 3);
            assert_eq!(store.batch_sizes(), &[10]);
        });
    }

    #[test]
    fn test_exhausted_retries_requeue_and_degrade() {
        let mut store = MemoryStore::new();
        store.fail_next(4);
        let ledger = Ledger::new(store, params());
        for i in 0..10 {
            ledger.submit(sample(2, i));
        }
        assert!(ledger.is_degraded());
        assert_eq!(ledger.pending(), 10);

        // producers are not blocked past capacity while degraded
        for i in 10..60 {
            ledger.submit(sample(2, i));
        }
        assert_eq!(ledger.pending(), 60);

        let summary = ledger.flush().unwrap();
        assert_eq!(summary.committed, 60);
        assert!(!ledger.is_degraded());
        let store = ledger.into_store();
        assert_eq!(store.records().len(), 60);
        assert_eq!(store.records()[0].match_id.index, 0);
    }

    #[test]
    fn test_flush_reports_failure() {
        let mut store = MemoryStore::new();
        store.fail_next(usize::MAX);
        let ledger = Ledger::new(store, params());
        ledger.submit(sample(3, 0));
        let err = ledger.flush().unwrap_err();
        let LedgerError::CommitFailed {
            attempts, pending, ..
        } = err;
        assert_eq!(attempts, 4);
        assert_eq!(pending, 1);
        assert_eq!(ledger.committed(), 0);
    }

    #[test]
    fn test_conflicting_record_is_kept_queued_without_retries() {
        let ledger = Ledger::new(MemoryStore::new(), params());
        let stored = sample(4, 0);
        ledger
            .with_store(|store| store.commit_batch(&[stored.clone()]))
            .unwrap();

        let mut clash = stored.clone();
        clash.ticks += 1;
        ledger.submit(clash);
        let LedgerError::CommitFailed {
            attempts,
            pending,
            source,
        } = ledger.flush().unwrap_err();
        assert_eq!(attempts, 1);
        assert_eq!(pending, 1);
        assert!(matches!(source, StoreError::Conflict(id) if id == stored.match_id));
        assert!(ledger.is_degraded());
        assert_eq!(ledger.committed(), 0);
        ledger.with_store(|store| assert_eq!(store.records(), &[stored]));
    }

    #[test]
    fn test_sqlite_backed_ledger() {
        let db = TempDb::new("ledger");
        let ledger = Ledger::new(SqliteStore::open(&db.0).unwrap(), params());
        let submitted = (0..23).map(|i| sample(5, i)).collect::<Vec<_>>();
        for result in &submitted {
            ledger.submit(result.clone());
        }
        ledger.flush().unwrap();

        let reader = SqliteReader::open(&db.0).unwrap();
        assert_eq!(reader.count().unwrap(), 23);
        assert_eq!(reader.generation(RUN, 5).unwrap(), submitted);
    }
}
