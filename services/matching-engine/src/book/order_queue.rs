//! Best-price queue for a single trade pair
//!
//! Orders are sorted by rate ascending (cheapest to fill first) and, at
//! equal rates, by insertion sequence. Uses BTreeMap for deterministic
//! iteration, so every node peeks the same order from the same contents.

use ledger_types::ids::Hash;
use ledger_types::numeric::Ratio;
use ledger_types::order::Order;
use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashMap};

/// An order as held by the book, tagged with its insertion sequence
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestingOrder {
    pub sequence: u64,
    pub order: Order,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct QueueKey {
    rate: Ratio,
    sequence: u64,
}

/// Orders for one trade pair, best first
#[derive(Debug, Clone, Default)]
pub struct OrderQueue {
    entries: BTreeMap<QueueKey, RestingOrder>,
    /// Order key -> queue position, for point removal
    index: HashMap<Hash, QueueKey>,
}

impl OrderQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an order; returns false if an order with the same key rests here
    pub fn insert(&mut self, sequence: u64, order: Order) -> bool {
        let key = order.key();
        if self.index.contains_key(&key) {
            return false;
        }
        let queue_key = QueueKey { rate: order.rate(), sequence };
        self.index.insert(key, queue_key);
        self.entries.insert(queue_key, RestingOrder { sequence, order });
        true
    }

    /// Lowest-rate order, earliest first among equals
    pub fn best(&self) -> Option<&RestingOrder> {
        self.entries.values().next()
    }

    pub fn remove(&mut self, key: &Hash) -> Option<RestingOrder> {
        let queue_key = self.index.remove(key)?;
        self.entries.remove(&queue_key)
    }

    /// Top `depth` orders as (rate, amount)
    pub fn depth_snapshot(&self, depth: usize) -> Vec<(Option<Decimal>, u64)> {
        self.entries
            .values()
            .take(depth)
            .map(|resting| (resting.order.rate_decimal(), resting.order.amount()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
