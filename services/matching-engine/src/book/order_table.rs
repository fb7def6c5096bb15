//! Order table: every eligible order, grouped by trade pair
//!
//! Sole mutable authority over resting orders. Every mutation goes through
//! the [`OrderStore`] first and touches memory only once the store has
//! accepted it.

use super::order_queue::{OrderQueue, RestingOrder};
use super::store::{MemoryOrderStore, OrderDelta, OrderStore};
use ledger_types::errors::EngineError;
use ledger_types::ids::Hash;
use ledger_types::order::{Order, TradePair};
use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::{debug, error, warn};

pub struct OrderTable {
    queues: BTreeMap<TradePair, OrderQueue>,
    /// Order key -> pair, for removal by key
    locations: HashMap<Hash, TradePair>,
    next_sequence: u64,
    store: Box<dyn OrderStore>,
}

impl OrderTable {
    /// Load every order from `store`, sequencing them in store order
    pub fn open(store: Box<dyn OrderStore>) -> Result<Self, EngineError> {
        let orders = store.load_orders()?;
        let mut table = Self {
            queues: BTreeMap::new(),
            locations: HashMap::new(),
            next_sequence: 0,
            store,
        };
        for order in orders {
            order.verify()?;
            let key = order.key();
            if table.locations.contains_key(&key) {
                return Err(EngineError::DuplicateOrder { key });
            }
            table.insert_unchecked(order);
        }
        debug!(orders = table.len(), "order table loaded");
        Ok(table)
    }

    /// Empty table backed by a fresh [`MemoryOrderStore`]
    pub fn in_memory() -> Self {
        Self {
            queues: BTreeMap::new(),
            locations: HashMap::new(),
            next_sequence: 0,
            store: Box::new(MemoryOrderStore::new()),
        }
    }

    /// Best order for `pair` without removing it
    pub fn peek_order(&self, pair: &TradePair) -> Option<&RestingOrder> {
        self.queues.get(pair).and_then(OrderQueue::best)
    }

    /// Remove and return exactly what [`Self::peek_order`] would return
    pub fn pop_order(&mut self, pair: &TradePair) -> Result<Option<Order>, EngineError> {
        let key = match self.peek_order(pair) {
            Some(resting) => resting.order.key(),
            None => return Ok(None),
        };
        self.persist(&OrderDelta { removed: vec![key], added: vec![] })?;
        Ok(self.remove_unchecked(&key))
    }

    /// Insert a fresh or continuation order
    pub fn add_order(&mut self, order: Order) -> Result<(), EngineError> {
        self.check_insertable(&order)?;
        self.persist(&OrderDelta { removed: vec![], added: vec![order.clone()] })?;
        self.insert_unchecked(order);
        Ok(())
    }

    /// Remove an order spent outside the engine (cancel clause)
    pub fn remove_order(&mut self, key: &Hash) -> Result<Order, EngineError> {
        if !self.contains(key) {
            return Err(EngineError::OrderNotFound { key: *key });
        }
        self.persist(&OrderDelta { removed: vec![*key], added: vec![] })?;
        self.remove_unchecked(key).ok_or(EngineError::OrderNotFound { key: *key })
    }

    /// Apply a settlement delta all-or-nothing
    pub fn apply_match(&mut self, delta: OrderDelta) -> Result<(), EngineError> {
        let mut removed = HashSet::with_capacity(delta.removed.len());
        for key in &delta.removed {
            if !self.contains(key) || !removed.insert(*key) {
                return Err(EngineError::OrderNotFound { key: *key });
            }
        }
        let mut added = HashSet::with_capacity(delta.added.len());
        for order in &delta.added {
            self.check_insertable(order)?;
            if !added.insert(order.key()) {
                return Err(EngineError::DuplicateOrder { key: order.key() });
            }
        }

        self.persist(&delta)?;

        for key in &delta.removed {
            self.remove_unchecked(key);
        }
        for order in delta.added {
            debug!(key = %order.key(), pair = %order.trade_pair(), amount = order.amount(), "continuation order inserted");
            self.insert_unchecked(order);
        }
        Ok(())
    }

    /// Top `n` orders of `pair` as (rate, amount)
    pub fn depth(&self, pair: &TradePair, n: usize) -> Vec<(Option<Decimal>, u64)> {
        self.queues
            .get(pair)
            .map(|queue| queue.depth_snapshot(n))
            .unwrap_or_default()
    }

    pub fn contains(&self, key: &Hash) -> bool {
        self.locations.contains_key(key)
    }

    /// Pairs with at least one resting order, in pair order
    pub fn pairs(&self) -> Vec<TradePair> {
        self.queues
            .iter()
            .filter(|(_, queue)| !queue.is_empty())
            .map(|(pair, _)| *pair)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.locations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }

    fn check_insertable(&self, order: &Order) -> Result<(), EngineError> {
        if let Err(err) = order.verify() {
            warn!(key = %order.key(), error = %err, "order rejected");
            return Err(err.into());
        }
        if self.locations.contains_key(&order.key()) {
            warn!(key = %order.key(), "order rejected: already resting");
            return Err(EngineError::DuplicateOrder { key: order.key() });
        }
        Ok(())
    }

    fn persist(&self, delta: &OrderDelta) -> Result<(), EngineError> {
        self.store.persist_delta(delta).map_err(|err| {
            error!(error = %err, removed = delta.removed.len(), added = delta.added.len(), "order store write failed");
            EngineError::from(err)
        })
    }

    fn insert_unchecked(&mut self, order: Order) {
        let pair = order.trade_pair();
        let key = order.key();
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        if self.queues.entry(pair).or_default().insert(sequence, order) {
            self.locations.insert(key, pair);
        }
    }

    fn remove_unchecked(&mut self, key: &Hash) -> Option<Order> {
        let pair = self.locations.remove(key)?;
        let queue = self.queues.get_mut(&pair)?;
        let removed = queue.remove(key).map(|resting| resting.order);
        if queue.is_empty() {
            self.queues.remove(&pair);
        }
        removed
    }
}
