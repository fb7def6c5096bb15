//! Order book infrastructure module
//!
//! Per-pair best-price queues, the order table that owns them, and the
//! persistence hook the table writes through.

pub mod order_queue;
pub mod order_table;
pub mod store;

pub use order_queue::{OrderQueue, RestingOrder};
pub use order_table::OrderTable;
pub use store::{MemoryOrderStore, OrderDelta, OrderStore, StoreError};
