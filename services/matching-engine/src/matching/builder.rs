//! Settlement transaction assembly
//!
//! Given the best order of every leg of a crossing ring, size each leg's
//! fill, hand the spreads to the fee policy and lay out one transaction
//! that satisfies every order's contract at once.
//!
//! # Output layout
//! ```text
//! per leg:   receive output (to the leg's seller program)
//!            continuation output (partial fills only, same control program)
//! per leg:   fee output (non-zero fees only, to the node program)
//! per party: refund outputs (to the party's seller program)
//! ```

use super::crossing::{first_uncrossed, opposite_index};
use crate::audit::check_conservation;
use crate::book::{OrderDelta, RestingOrder};
use crate::fee::FeeStrategy;
use ledger_types::asset::AssetAmount;
use ledger_types::contract::ClauseArguments;
use ledger_types::errors::EngineError;
use ledger_types::numeric::checked_sub;
use ledger_types::order::Order;
use ledger_types::tx::{Tx, TxData, TxInput, TxOutput};

/// Transaction format version of settlement transactions
pub const SETTLEMENT_TX_VERSION: u64 = 1;

/// Fill sizes of one leg before fees
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LegFill {
    /// Amount of the requested asset the leg receives
    pub receive: u64,
    /// Amount of the offered asset the leg gives up
    pub should_pay: u64,
    /// Offered amount, as locked by the order
    pub offered: u64,
}

impl LegFill {
    pub fn is_partial(&self) -> bool {
        self.offered > self.should_pay
    }

    pub fn remaining(&self) -> u64 {
        self.offered - self.should_pay
    }
}

/// A built settlement and the book delta it implies
#[derive(Debug, Clone)]
pub struct Settlement {
    pub tx: Tx,
    pub delta: OrderDelta,
    pub fills: Vec<LegFill>,
    pub fee_outputs: usize,
}

impl Settlement {
    pub fn partial_count(&self) -> usize {
        self.fills.iter().filter(|fill| fill.is_partial()).count()
    }
}

/// Size every leg's fill.
///
/// Each leg receives the lesser of what it requests and what the next leg
/// offers, then pays for that at its own rate rounded up. Rounding can
/// leave a leg receiving more than its counter-leg pays when the counter-leg
/// fills partially; those receives are clamped until the ring balances.
pub fn plan_fills(orders: &[&Order]) -> Result<Vec<LegFill>, EngineError> {
    let n = orders.len();
    let mut fills = Vec::with_capacity(n);
    for (i, order) in orders.iter().enumerate() {
        let opposite = orders[opposite_index(i, n)];
        let receive = order.request_amount()?.min(opposite.amount());
        fills.push(LegFill {
            receive,
            should_pay: order.should_pay_amount(receive)?,
            offered: order.amount(),
        });
    }

    loop {
        let mut clamped = false;
        for i in 0..n {
            let opp_pay = fills[opposite_index(i, n)].should_pay;
            if fills[i].receive > opp_pay {
                fills[i].receive = opp_pay;
                fills[i].should_pay = orders[i].should_pay_amount(opp_pay)?;
                clamped = true;
            }
        }
        if !clamped {
            break;
        }
    }

    if let Some(leg) = fills.iter().position(|fill| fill.receive == 0) {
        return Err(EngineError::NotCrossable { leg });
    }
    Ok(fills)
}

/// Build the settlement for one resting order per leg, in ring order
pub fn build_settlement(
    legs: &[RestingOrder],
    strategy: &dyn FeeStrategy,
    node_program: &[u8],
) -> Result<Settlement, EngineError> {
    let orders: Vec<&Order> = legs.iter().map(|leg| &leg.order).collect();
    let n = orders.len();
    if let Some(leg) = first_uncrossed(&orders) {
        return Err(EngineError::NotCrossable { leg });
    }

    let fills = plan_fills(&orders)?;

    let mut receives = Vec::with_capacity(n);
    let mut price_diffs = Vec::with_capacity(n);
    for (i, order) in orders.iter().enumerate() {
        let opp_pay = fills[opposite_index(i, n)].should_pay;
        receives.push(AssetAmount::new(order.to_asset_id(), fills[i].receive));
        price_diffs.push(AssetAmount::new(order.to_asset_id(), checked_sub(opp_pay, fills[i].receive)?));
    }

    // the order that entered the book last is the taker
    let taker = legs
        .iter()
        .enumerate()
        .max_by_key(|(_, leg)| leg.sequence)
        .map(|(i, _)| i)
        .unwrap_or(0);
    let is_makers: Vec<bool> = (0..n).map(|i| i != taker).collect();

    let allocated = strategy.allocate(&receives, &price_diffs, &is_makers)?;

    let mut data = TxData::new(SETTLEMENT_TX_VERSION);
    let mut continuation_indexes = Vec::new();
    for (i, order) in orders.iter().enumerate() {
        let receive = allocated.receives[i];
        let position = data.outputs.len();
        data.outputs
            .push(TxOutput::new(receive.asset_id, receive.amount, order.recipient_program().to_vec()));

        let arguments = if fills[i].is_partial() {
            continuation_indexes.push(data.outputs.len());
            data.outputs.push(TxOutput::new(
                order.from_asset_id(),
                fills[i].remaining(),
                order.utxo().control_program.clone(),
            ));
            // the contract recomputes the change from the pre-fee receive
            ClauseArguments::PartialTrade { amount: fills[i].receive, position: position as u64 }
        } else {
            ClauseArguments::FullTrade { position: position as u64 }
        };

        let utxo = order.utxo();
        let mut input = TxInput::spend(
            utxo.source_id,
            order.from_asset_id(),
            utxo.amount,
            utxo.source_pos,
            utxo.control_program.clone(),
        );
        input.set_arguments(arguments.encode()?);
        data.inputs.push(input);
    }

    let mut fee_outputs = 0;
    for fee in allocated.fees.iter().filter(|fee| !fee.is_zero()) {
        data.outputs.push(TxOutput::new(fee.asset_id, fee.amount, node_program.to_vec()));
        fee_outputs += 1;
    }
    for (order, refunds) in orders.iter().zip(&allocated.refunds) {
        for refund in refunds.iter().filter(|refund| !refund.is_zero()) {
            data.outputs
                .push(TxOutput::new(refund.asset_id, refund.amount, order.recipient_program().to_vec()));
        }
    }

    check_conservation(&data)?;
    let tx = data.finalize();

    let added = continuation_indexes
        .into_iter()
        .map(|index| Order::from_output(&tx, index))
        .collect::<Result<Vec<_>, _>>()?;
    let delta = OrderDelta {
        removed: orders.iter().map(|order| order.key()).collect(),
        added,
    };

    Ok(Settlement { tx, delta, fills, fee_outputs })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fee::{CappedDifferentialStrategy, MakerTakerStrategy};
    use crate::test_support::{order_with, NODE_PROGRAM};
    use ledger_types::fee::FeeConfig;

    fn capped() -> CappedDifferentialStrategy {
        CappedDifferentialStrategy::from_config(&FeeConfig::default()).unwrap()
    }

    fn resting(orders: Vec<Order>) -> Vec<RestingOrder> {
        orders
            .into_iter()
            .enumerate()
            .map(|(sequence, order)| RestingOrder { sequence: sequence as u64, order })
            .collect()
    }

    #[test]
    fn test_exact_two_leg_fill() {
        let a = order_with(1, 2, 2, 1, 100_000_000, 1);
        let b = order_with(2, 1, 1, 2, 200_000_000, 2);
        let fills = plan_fills(&[&a, &b]).unwrap();
        assert_eq!(fills[0], LegFill { receive: 200_000_000, should_pay: 100_000_000, offered: 100_000_000 });
        assert_eq!(fills[1], LegFill { receive: 100_000_000, should_pay: 200_000_000, offered: 200_000_000 });
    }

    #[test]
    fn test_partial_leg_plans_remaining() {
        let a = order_with(1, 2, 1, 1, 100, 1);
        let b = order_with(2, 1, 1, 1, 40, 2);
        let fills = plan_fills(&[&a, &b]).unwrap();
        assert_eq!(fills[0].receive, 40);
        assert_eq!(fills[0].remaining(), 60);
        assert!(!fills[1].is_partial());
    }

    #[test]
    fn test_rounding_dust_is_clamped() {
        // A pays ceil(receive * 3 / 2); B at 2/3 would receive more than A pays
        let a = order_with(1, 2, 2, 3, 10, 1);
        let b = order_with(2, 1, 3, 2, 100, 2);
        let fills = plan_fills(&[&a, &b]).unwrap();
        for i in 0..2 {
            assert!(fills[i].receive <= fills[(i + 1) % 2].should_pay);
            assert!(fills[i].should_pay <= fills[i].offered);
        }
    }

    #[test]
    fn test_full_fill_layout() {
        let a = order_with(1, 2, 2, 1, 100_000_000, 1);
        let b = order_with(2, 1, 1, 2, 200_000_000, 2);
        let settlement = build_settlement(&resting(vec![a.clone(), b.clone()]), &capped(), NODE_PROGRAM).unwrap();

        let outputs = settlement.tx.outputs();
        assert_eq!(outputs.len(), 2);
        assert_eq!(outputs[0], TxOutput::new(a.to_asset_id(), 200_000_000, a.recipient_program().to_vec()));
        assert_eq!(outputs[1], TxOutput::new(b.to_asset_id(), 100_000_000, b.recipient_program().to_vec()));
        assert_eq!(
            ClauseArguments::decode(&settlement.tx.inputs()[1].arguments).unwrap(),
            ClauseArguments::FullTrade { position: 1 }
        );
        assert_eq!(settlement.delta.removed, vec![a.key(), b.key()]);
        assert!(settlement.delta.added.is_empty());
        assert_eq!(settlement.fee_outputs, 0);
    }

    #[test]
    fn test_partial_fill_emits_continuation() {
        let a = order_with(1, 2, 1, 1, 100, 1);
        let b = order_with(2, 1, 1, 1, 40, 2);
        let settlement = build_settlement(&resting(vec![a.clone(), b]), &capped(), NODE_PROGRAM).unwrap();

        let outputs = settlement.tx.outputs();
        assert_eq!(outputs[1], TxOutput::new(a.from_asset_id(), 60, a.utxo().control_program.clone()));
        assert_eq!(
            ClauseArguments::decode(&settlement.tx.inputs()[0].arguments).unwrap(),
            ClauseArguments::PartialTrade { amount: 40, position: 0 }
        );

        let continuation = &settlement.delta.added[0];
        assert_eq!(continuation.amount(), 60);
        assert_eq!(continuation.utxo().source_id, settlement.tx.id());
        assert_eq!(continuation.utxo().source_pos, 1);
        assert_eq!(continuation.rate(), a.rate());
        assert_eq!(settlement.partial_count(), 1);
    }

    #[test]
    fn test_maker_taker_build_charges_taker() {
        let a = order_with(1, 2, 1, 1, 10_000, 1);
        let b = order_with(2, 1, 1, 1, 10_000, 2);
        let strategy = MakerTakerStrategy::from_config(&FeeConfig::default()).unwrap();
        let settlement = build_settlement(&resting(vec![a, b.clone()]), &strategy, NODE_PROGRAM).unwrap();

        // b entered last: 3 bps of 10_000 = 3
        let outputs = settlement.tx.outputs();
        assert_eq!(outputs[1].asset_amount.amount, 9_997);
        assert_eq!(outputs[2], TxOutput::new(b.to_asset_id(), 3, NODE_PROGRAM.to_vec()));
        assert_eq!(settlement.fee_outputs, 1);
    }

    #[test]
    fn test_partial_taker_witness_carries_pre_fee_receive() {
        let maker = order_with(2, 1, 1, 1, 40_000, 2);
        let taker = order_with(1, 2, 1, 1, 100_000, 1);
        let legs = vec![
            RestingOrder { sequence: 1, order: taker.clone() },
            RestingOrder { sequence: 0, order: maker },
        ];
        let strategy = MakerTakerStrategy::from_config(&FeeConfig::default()).unwrap();
        let settlement = build_settlement(&legs, &strategy, NODE_PROGRAM).unwrap();

        let outputs = settlement.tx.outputs();
        assert_eq!(outputs[0].asset_amount.amount, 39_988);
        assert_eq!(outputs[1], TxOutput::new(taker.from_asset_id(), 60_000, taker.utxo().control_program.clone()));

        let amount = match ClauseArguments::decode(&settlement.tx.inputs()[0].arguments).unwrap() {
            ClauseArguments::PartialTrade { amount, position: 0 } => amount,
            other => panic!("Unexpected arguments: {:?}", other),
        };
        assert_eq!(amount, 40_000);
        let paid = taker.should_pay_amount(amount).unwrap();
        assert_eq!(taker.amount() - paid, outputs[1].asset_amount.amount);
    }

    #[test]
    fn test_uncrossed_ring_fails() {
        let a = order_with(1, 2, 3, 1, 100, 1);
        let b = order_with(2, 1, 1, 1, 100, 2);
        let result = build_settlement(&resting(vec![a, b]), &capped(), NODE_PROGRAM);
        assert!(matches!(result, Err(EngineError::NotCrossable { leg: 0 })));
    }
}
