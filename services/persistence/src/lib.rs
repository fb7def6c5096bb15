//! Durable order journal
//!
//! Append-only, checksummed journal of order table deltas, and the
//! [`JournalOrderStore`] that lets an order table survive restarts.
//!
//! A delta is written as one batch; replay rebuilds the live orders in the
//! order they were first added, which fixes the insertion sequence the
//! table uses to break price ties.

pub mod journal;
pub mod store;

#[cfg(test)]
pub(crate) mod test_support;

pub use journal::{FsyncPolicy, JournalConfig, JournalEntry, JournalError, JournalSink, JournalWriter};
pub use journal::{decode_entries, read_journal};
pub use store::{replay, JournalOrderStore};
