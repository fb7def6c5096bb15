//! Ring validation and crossing detection
//!
//! A ring crosses at leg `i` when what leg `i` asks for, inverted, is at
//! least what the next leg asks for: `1 / rate[i] >= rate[opp]`. Both rates
//! are exact fractions, so the test is done by cross-multiplication.

use ledger_types::errors::EngineError;
use ledger_types::order::{Order, TradePair};

/// Index of the leg whose offer fills leg `i`
pub fn opposite_index(i: usize, n: usize) -> usize {
    (i + 1) % n
}

/// A ring needs at least two distinct legs, each requesting what the next
/// one offers
pub fn validate_ring(ring: &[TradePair]) -> Result<(), EngineError> {
    if ring.len() < 2 {
        return Err(EngineError::InvalidRing {
            reason: format!("ring needs at least 2 legs, got {}", ring.len()),
        });
    }
    for (i, pair) in ring.iter().enumerate() {
        if pair.from_asset_id == pair.to_asset_id {
            return Err(EngineError::InvalidRing {
                reason: format!("leg {i} trades {} against itself", pair.from_asset_id),
            });
        }
        if ring[..i].contains(pair) {
            return Err(EngineError::InvalidRing {
                reason: format!("pair {pair} appears twice"),
            });
        }
        let next = &ring[opposite_index(i, ring.len())];
        if pair.to_asset_id != next.from_asset_id {
            return Err(EngineError::InvalidRing {
                reason: format!("leg {i} requests {} but the next leg offers {}", pair.to_asset_id, next.from_asset_id),
            });
        }
    }
    Ok(())
}

/// `1 / rate(order) >= rate(opposite)`
pub fn can_cross(order: &Order, opposite: &Order) -> bool {
    order.rate().product_at_most_one(&opposite.rate())
}

/// First leg at which the ring fails to cross, if any
pub fn first_uncrossed(orders: &[&Order]) -> Option<usize> {
    let n = orders.len();
    (0..n).find(|&i| !can_cross(orders[i], orders[opposite_index(i, n)]))
}
