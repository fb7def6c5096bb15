//! Types library for magnetic-contract matching
//!
//! Value types shared by the matching engine and its order store: asset
//! identifiers and amounts with checked arithmetic, trade pairs and orders,
//! the settlement transaction model, and the contract codec.
//!
//! # Modules
//! - `ids`: 32-byte identifiers (AssetId, Hash)
//! - `numeric`: checked amount arithmetic and exact ratios
//! - `asset`: AssetAmount
//! - `order`: TradePair, OrderUtxo, Order
//! - `tx`: settlement transaction model
//! - `contract`: magnetic contract program and witness codec
//! - `fee`: fee configuration and allocation types
//! - `errors`: error taxonomy

pub mod ids;
pub mod numeric;
pub mod asset;
pub mod order;
pub mod tx;
pub mod contract;
pub mod fee;
pub mod errors;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::asset::*;
    pub use crate::contract::*;
    pub use crate::errors::*;
    pub use crate::fee::*;
    pub use crate::ids::*;
    pub use crate::numeric::*;
    pub use crate::order::*;
    pub use crate::tx::*;
}
