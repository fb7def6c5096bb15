//! Durable order store
//!
//! [`JournalOrderStore`] plugs the journal into the engine's order table:
//! every delta becomes one journal batch, and loading replays the journal
//! into the live orders in the order they were first added.

use crate::journal::{JournalConfig, JournalEntry, JournalError, JournalWriter};
use ledger_types::ids::Hash;
use ledger_types::order::Order;
use magnetic_engine::{OrderDelta, OrderStore, StoreError};
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use tracing::{debug, info};

impl From<JournalError> for StoreError {
    fn from(err: JournalError) -> Self {
        match err {
            JournalError::Io(e) => StoreError::Io(e),
            other => StoreError::Corruption(other.to_string()),
        }
    }
}

/// Live orders after replaying `entries`, oldest addition first.
///
/// A removal of an unknown key is corruption: the table only ever removes
/// orders it holds.
pub fn replay(entries: Vec<JournalEntry>) -> Result<Vec<Order>, JournalError> {
    let mut live: BTreeMap<u64, Order> = BTreeMap::new();
    let mut by_key: HashMap<Hash, u64> = HashMap::new();
    for (index, entry) in entries.into_iter().enumerate() {
        let index = index as u64;
        match entry {
            JournalEntry::Added(order) => {
                if by_key.insert(order.key(), index).is_some() {
                    return Err(JournalError::Inconsistent {
                        entry: index,
                        reason: format!("order {} added twice", order.key()),
                    });
                }
                live.insert(index, order);
            }
            JournalEntry::Removed(key) => {
                let added_at = by_key.remove(&key).ok_or_else(|| JournalError::Inconsistent {
                    entry: index,
                    reason: format!("removal of unknown order {key}"),
                })?;
                live.remove(&added_at);
            }
        }
    }
    Ok(live.into_values().collect())
}

pub struct JournalOrderStore {
    writer: Mutex<JournalWriter>,
}

impl JournalOrderStore {
    pub fn open(config: JournalConfig) -> Result<Self, JournalError> {
        let writer = JournalWriter::open(config)?;
        info!(path = %writer.path().display(), bytes = writer.file_size(), "order journal opened");
        Ok(Self {
            writer: Mutex::new(writer),
        })
    }

    /// Rewrite the journal to hold only the live orders
    pub fn compact(&self) -> Result<usize, JournalError> {
        let mut writer = self.lock()?;
        let live = replay(writer.read_all()?)?;
        let entries: Vec<_> = live.into_iter().map(JournalEntry::Added).collect();
        writer.rewrite(&entries)?;
        info!(orders = entries.len(), bytes = writer.file_size(), "order journal compacted");
        Ok(entries.len())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, JournalWriter>, JournalError> {
        self.writer
            .lock()
            .map_err(|_| JournalError::LockPoisoned)
    }
}

impl OrderStore for JournalOrderStore {
    fn load_orders(&self) -> Result<Vec<Order>, StoreError> {
        let entries = self.lock()?.read_all()?;
        let count = entries.len();
        let orders = replay(entries)?;
        debug!(entries = count, live = orders.len(), "order journal replayed");
        Ok(orders)
    }

    fn persist_delta(&self, delta: &OrderDelta) -> Result<(), StoreError> {
        let entries: Vec<JournalEntry> = delta
            .removed
            .iter()
            .copied()
            .map(JournalEntry::Removed)
            .chain(delta.added.iter().cloned().map(JournalEntry::Added))
            .collect();
        self.lock()?.append_batch(&entries)?;
        Ok(())
    }
}
