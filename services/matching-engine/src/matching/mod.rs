//! Matching logic module
//!
//! Ring crossing checks and the assembly of settlement transactions.

pub mod builder;
pub mod crossing;

pub use builder::{build_settlement, plan_fills, Settlement};
pub use crossing::{can_cross, opposite_index, validate_ring};
