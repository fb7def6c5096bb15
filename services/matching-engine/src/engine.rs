//! Matching engine core
//!
//! Main coordinator between the order table, the settlement builder and
//! the fee policies. Holds no order state of its own: every call reads the
//! table fresh, and a settlement either lands in the table completely or
//! not at all.

use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use ledger_types::errors::EngineError;
use ledger_types::ids::Hash;
use ledger_types::order::{Order, TradePair};
use ledger_types::tx::Tx;
use rust_decimal::Decimal;
use tracing::{debug, info, warn};

use crate::audit::settlement_amounts;
use crate::book::{OrderTable, RestingOrder};
use crate::config::EngineConfig;
use crate::fee::{strategy_for, FeeStrategy};
use crate::matching::{build_settlement, crossing, plan_fills};

pub struct Engine {
    table: RwLock<OrderTable>,
    config: EngineConfig,
    build_strategy: Box<dyn FeeStrategy>,
    validation_strategy: Box<dyn FeeStrategy>,
}

impl Engine {
    pub fn new(table: OrderTable, config: EngineConfig) -> Result<Self, EngineError> {
        config.validate()?;
        let build_strategy = strategy_for(config.fee.build_policy, &config.fee)?;
        let validation_strategy = strategy_for(config.fee.validation_policy, &config.fee)?;
        Ok(Self {
            table: RwLock::new(table),
            config,
            build_strategy,
            validation_strategy,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Whether the best orders of every leg of `ring` cross and size to a
    /// settlement. Read-only.
    pub fn has_matched_tx(&self, ring: &[TradePair]) -> bool {
        if let Err(err) = crossing::validate_ring(ring) {
            debug!(error = %err, "ring rejected");
            return false;
        }
        let table = match self.read() {
            Ok(table) => table,
            Err(err) => {
                warn!(error = %err, "match check skipped");
                return false;
            }
        };

        let mut orders = Vec::with_capacity(ring.len());
        for pair in ring {
            match table.peek_order(pair) {
                Some(resting) => orders.push(&resting.order),
                None => {
                    debug!(%pair, "no resting order");
                    return false;
                }
            }
        }
        if let Some(leg) = crossing::first_uncrossed(&orders) {
            debug!(legs = ring.len(), leg, "ring does not cross");
            return false;
        }
        // prices cross, but fills may still round down to nothing
        match plan_fills(&orders) {
            Ok(_) => {
                debug!(legs = ring.len(), "ring crosses");
                true
            }
            Err(err) => {
                debug!(legs = ring.len(), error = %err, "ring crosses but cannot settle");
                false
            }
        }
    }

    /// Build the settlement for `ring` and apply it to the table.
    ///
    /// Holds the table's write lock from peek to apply, so concurrent
    /// readers observe the book either before or after the match.
    pub fn next_matched_tx(&self, ring: &[TradePair]) -> Result<Tx, EngineError> {
        crossing::validate_ring(ring)?;
        let mut table = self.write()?;

        let legs = ring
            .iter()
            .map(|pair| {
                table
                    .peek_order(pair)
                    .cloned()
                    .ok_or(EngineError::NoRestingOrder { pair: *pair })
            })
            .collect::<Result<Vec<RestingOrder>, _>>()?;

        let settlement = build_settlement(&legs, self.build_strategy.as_ref(), &self.config.node_program)?;
        let partials = settlement.partial_count();
        let fee_outputs = settlement.fee_outputs;
        table.apply_match(settlement.delta)?;

        info!(
            tx_id = %settlement.tx.id(),
            legs = ring.len(),
            partials,
            fee_outputs,
            policy = ?self.build_strategy.kind(),
            "settlement built"
        );
        Ok(settlement.tx)
    }

    /// Audit a settlement and check its fees under the validation policy
    pub fn validate_matched_tx(&self, tx: &Tx) -> Result<(), EngineError> {
        let result = settlement_amounts(tx, &self.config.node_program).and_then(|amounts| {
            self.validation_strategy
                .validate(&amounts.paid, &amounts.charged_fees)
                .map_err(EngineError::from)
        });
        if let Err(err) = &result {
            warn!(tx_id = %tx.id(), error = %err, policy = ?self.validation_strategy.kind(), "settlement rejected");
        }
        result
    }

    pub fn add_order(&self, order: Order) -> Result<(), EngineError> {
        self.write()?.add_order(order)
    }

    pub fn remove_order(&self, key: &Hash) -> Result<Order, EngineError> {
        self.write()?.remove_order(key)
    }

    pub fn peek_order(&self, pair: &TradePair) -> Result<Option<Order>, EngineError> {
        Ok(self.read()?.peek_order(pair).map(|resting| resting.order.clone()))
    }

    pub fn depth(&self, pair: &TradePair, n: usize) -> Result<Vec<(Option<Decimal>, u64)>, EngineError> {
        Ok(self.read()?.depth(pair, n))
    }

    pub fn pairs(&self) -> Result<Vec<TradePair>, EngineError> {
        Ok(self.read()?.pairs())
    }

    pub fn order_count(&self) -> Result<usize, EngineError> {
        Ok(self.read()?.len())
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, OrderTable>, EngineError> {
        self.table.read().map_err(|_| EngineError::LockPoisoned)
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, OrderTable>, EngineError> {
        self.table.write().map_err(|_| EngineError::LockPoisoned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{order_with, pair, NODE_PROGRAM};

    fn engine() -> Engine {
        Engine::new(OrderTable::in_memory(), EngineConfig::new(NODE_PROGRAM.to_vec())).unwrap()
    }

    #[test]
    fn test_engine_empty_leg_has_no_match() {
        let engine = engine();
        engine.add_order(order_with(1, 2, 1, 1, 100, 1)).unwrap();
        assert!(!engine.has_matched_tx(&[pair(1, 2), pair(2, 1)]));
        assert!(matches!(
            engine.next_matched_tx(&[pair(1, 2), pair(2, 1)]),
            Err(EngineError::NoRestingOrder { .. })
        ));
    }

    #[test]
    fn test_engine_full_match_empties_book() {
        let engine = engine();
        engine.add_order(order_with(1, 2, 1, 1, 100, 1)).unwrap();
        engine.add_order(order_with(2, 1, 1, 1, 100, 2)).unwrap();
        let ring = [pair(1, 2), pair(2, 1)];

        assert!(engine.has_matched_tx(&ring));
        let tx = engine.next_matched_tx(&ring).unwrap();
        assert_eq!(tx.inputs().len(), 2);
        assert_eq!(engine.order_count().unwrap(), 0);
        assert!(engine.validate_matched_tx(&tx).is_ok());
    }

    #[test]
    fn test_engine_no_cross_leaves_book() {
        let engine = engine();
        engine.add_order(order_with(1, 2, 2, 1, 100, 1)).unwrap();
        engine.add_order(order_with(2, 1, 1, 1, 100, 2)).unwrap();
        let ring = [pair(1, 2), pair(2, 1)];

        assert!(!engine.has_matched_tx(&ring));
        assert!(matches!(engine.next_matched_tx(&ring), Err(EngineError::NotCrossable { .. })));
        assert_eq!(engine.order_count().unwrap(), 2);
    }

    #[test]
    fn test_engine_dust_order_is_not_matchable() {
        let engine = engine();
        // crosses on price, but half of one unit requests nothing
        engine.add_order(order_with(1, 2, 1, 2, 1, 1)).unwrap();
        engine.add_order(order_with(2, 1, 2, 1, 100, 2)).unwrap();
        let ring = [pair(1, 2), pair(2, 1)];

        assert!(!engine.has_matched_tx(&ring));
        assert!(matches!(engine.next_matched_tx(&ring), Err(EngineError::NotCrossable { leg: 0 })));
        assert_eq!(engine.order_count().unwrap(), 2);
    }

    #[test]
    fn test_engine_rejects_invalid_config() {
        let result = Engine::new(OrderTable::in_memory(), EngineConfig::default());
        assert!(matches!(result, Err(EngineError::Config { .. })));
    }

    #[test]
    fn test_engine_invalid_ring() {
        let engine = engine();
        assert!(!engine.has_matched_tx(&[pair(1, 2)]));
        assert!(matches!(
            engine.next_matched_tx(&[pair(1, 2), pair(3, 1)]),
            Err(EngineError::InvalidRing { .. })
        ));
    }
}
