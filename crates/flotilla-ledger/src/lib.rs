//! Durable, exactly-once history of match outcomes.
//!
//! Many battle workers finish matches concurrently; each outcome becomes a
//! [`SkirmishResult`] handed to a shared [`Ledger`]. The ledger never writes one
//! record at a time. Results wait in a bounded [`BatchQueue`] and are committed in
//! transactions of at most `batch_size` records.
//!
//! # Modules
//!
//! - [`record`] - [`SkirmishResult`] and its identifiers
//! - [`queue`] - Bounded multi-producer queue with backpressure
//! - [`store`] - [`SkirmishStore`] trait and the in-memory store
//! - [`sqlite`] - SQLite store in WAL mode, plus a read-only [`SqliteReader`] for
//!   history queries that run while a writer transaction is open
//! - [`ledger`] - Batching, the single-consumer writer lock, and commit retries
//!
//! # Write Path
//!
//! ```text
//! worker ── submit ──→ BatchQueue ──(len ≥ batch_size)──→ consumer (writer lock)
//!                                                             ↓ drain ≤ batch_size
//!                                                        SkirmishStore::commit_batch
//!                                                             ↓ error
//!                                             retry with backoff → requeue at front
//! ```
//!
//! The producer whose push fills a batch becomes the consumer. At generation
//! boundaries [`Ledger::flush`] commits whatever is left, so nothing waits
//! indefinitely.
//!
//! # Keys
//!
//! A [`MatchId`] carries the [`RunId`] of the training session that played it, so
//! several sessions can share one database. Committing the same record again is a
//! no-op; a different record under a stored id fails the batch with
//! [`StoreError::Conflict`] and stays queued.

pub use self::{ledger::*, queue::*, record::*, sqlite::*, store::*};

pub mod ledger;
pub mod queue;
pub mod record;
pub mod sqlite;
pub mod store;
