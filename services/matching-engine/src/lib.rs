//! Magnetic contract matching engine
//!
//! Unspent outputs locked by a magnetic contract rest in the book as limit
//! orders. The engine detects when a ring of trade pairs crosses and builds
//! the one settlement transaction that releases every order in the ring,
//! re-listing the change of partially filled orders as continuation orders.
//!
//! **Key Invariants:**
//! - Per-asset amounts are conserved by every settlement
//! - Deterministic matching (same book and ring → same transaction)
//! - Fees never exceed the configured policy's cap
//! - A failed attempt leaves the book untouched

pub mod audit;
pub mod book;
pub mod config;
pub mod engine;
pub mod fee;
pub mod matching;

#[cfg(test)]
pub(crate) mod test_support;

pub use book::{MemoryOrderStore, OrderDelta, OrderStore, OrderTable, StoreError};
pub use config::EngineConfig;
pub use engine::Engine;
pub use fee::{FeeStrategy, strategy_for};
