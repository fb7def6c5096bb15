//! Persistence hook for the order table
//!
//! The table never writes memory before the store has accepted a delta, so
//! a store failure leaves both sides at the pre-match state.

use ledger_types::errors::EngineError;
use ledger_types::ids::Hash;
use ledger_types::order::Order;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Net effect of one settlement (or cancellation) on the book
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OrderDelta {
    /// Keys of orders consumed
    pub removed: Vec<Hash>,
    /// Continuation or fresh orders, in insertion order
    pub added: Vec<Order>,
}

impl OrderDelta {
    pub fn is_empty(&self) -> bool {
        self.removed.is_empty() && self.added.is_empty()
    }
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Stored record is corrupt: {0}")]
    Corruption(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

impl From<StoreError> for EngineError {
    fn from(err: StoreError) -> Self {
        EngineError::Store { message: err.to_string() }
    }
}

/// Durable backing for an [`OrderTable`](super::OrderTable)
pub trait OrderStore: Send + Sync {
    /// Every live order, in the order it was first stored
    fn load_orders(&self) -> Result<Vec<Order>, StoreError>;

    /// Record a delta as a unit; an error means nothing was recorded
    fn persist_delta(&self, delta: &OrderDelta) -> Result<(), StoreError>;
}

/// In-memory store for tests and ephemeral nodes.
///
/// Clones share the same contents, so a test can keep a handle after
/// moving the store into a table.
#[derive(Debug, Clone, Default)]
pub struct MemoryOrderStore {
    orders: Arc<Mutex<Vec<Order>>>,
}

impl MemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_orders(orders: Vec<Order>) -> Self {
        Self {
            orders: Arc::new(Mutex::new(orders)),
        }
    }

    pub fn snapshot(&self) -> Vec<Order> {
        match self.orders.lock() {
            Ok(orders) => orders.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl OrderStore for MemoryOrderStore {
    fn load_orders(&self) -> Result<Vec<Order>, StoreError> {
        let orders = self
            .orders
            .lock()
            .map_err(|_| StoreError::Unavailable("memory store lock poisoned".to_string()))?;
        Ok(orders.clone())
    }

    fn persist_delta(&self, delta: &OrderDelta) -> Result<(), StoreError> {
        let mut orders = self
            .orders
            .lock()
            .map_err(|_| StoreError::Unavailable("memory store lock poisoned".to_string()))?;
        orders.retain(|order| !delta.removed.contains(&order.key()));
        orders.extend(delta.added.iter().cloned());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::order_with;

    #[test]
    fn test_memory_store_applies_delta() {
        let a = order_with(1, 2, 1, 1, 100, 1);
        let b = order_with(2, 1, 1, 1, 100, 2);
        let store = MemoryOrderStore::with_orders(vec![a.clone(), b.clone()]);

        let c = order_with(1, 2, 1, 1, 40, 3);
        store
            .persist_delta(&OrderDelta {
                removed: vec![a.key()],
                added: vec![c.clone()],
            })
            .unwrap();

        assert_eq!(store.load_orders().unwrap(), vec![b, c]);
    }

    #[test]
    fn test_memory_store_clones_share_state() {
        let store = MemoryOrderStore::new();
        let handle = store.clone();
        store
            .persist_delta(&OrderDelta {
                removed: vec![],
                added: vec![order_with(1, 2, 1, 1, 5, 1)],
            })
            .unwrap();
        assert_eq!(handle.snapshot().len(), 1);
    }

    #[test]
    fn test_store_error_converts_to_engine_error() {
        let err: EngineError = StoreError::Unavailable("down".to_string()).into();
        assert_eq!(err, EngineError::Store { message: "Store unavailable: down".to_string() });
    }
}
