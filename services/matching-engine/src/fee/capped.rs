//! Capped-differential fee policy
//!
//! The spread a match captures in each asset is the payable fee, capped at
//! a fraction of what the counter-legs pay in that asset. Whatever the cap
//! leaves over is shared back across every participant.

use super::{check_lengths, push_refund, validate_against_caps, FeeStrategy};
use ledger_types::asset::AssetAmount;
use ledger_types::errors::FeeError;
use ledger_types::fee::{AllocatedAssets, FeeConfig, FeePolicyKind, FeeRate};
use ledger_types::ids::AssetId;
use ledger_types::numeric::{checked_add, checked_sub};

#[derive(Debug, Clone)]
pub struct CappedDifferentialStrategy {
    max_fee_rate: FeeRate,
}

impl CappedDifferentialStrategy {
    pub fn new(max_fee_rate: FeeRate) -> Self {
        Self { max_fee_rate }
    }

    pub fn from_config(config: &FeeConfig) -> Result<Self, FeeError> {
        Ok(Self::new(FeeRate::from_decimal(config.max_fee_rate)?))
    }
}

impl FeeStrategy for CappedDifferentialStrategy {
    fn kind(&self) -> FeePolicyKind {
        FeePolicyKind::CappedDifferential
    }

    fn allocate(
        &self,
        receives: &[AssetAmount],
        price_diffs: &[AssetAmount],
        is_makers: &[bool],
    ) -> Result<AllocatedAssets, FeeError> {
        check_lengths(receives, price_diffs, is_makers)?;
        let n = receives.len();

        // legs requesting the same asset are charged together
        let mut groups: Vec<(AssetId, Vec<usize>)> = Vec::new();
        for (i, diff) in price_diffs.iter().enumerate() {
            match groups.iter_mut().find(|(asset, _)| *asset == diff.asset_id) {
                Some((_, legs)) => legs.push(i),
                None => groups.push((diff.asset_id, vec![i])),
            }
        }

        let mut fees: Vec<AssetAmount> = price_diffs.iter().map(|diff| AssetAmount::new(diff.asset_id, 0)).collect();
        let mut refunds = vec![Vec::new(); n];
        for (asset, legs) in &groups {
            let mut payable = 0;
            // what the counter-legs actually paid in this asset
            let mut paid = 0;
            for &i in legs {
                payable = checked_add(payable, price_diffs[i].amount)?;
                paid = checked_add(paid, checked_add(receives[i].amount, price_diffs[i].amount)?)?;
            }
            let fee = payable.min(self.max_fee_rate.ceil_fee(paid)?);
            fees[legs[0]].amount = fee;

            let mut remainder = checked_sub(payable, fee)?;
            if remainder == 0 {
                continue;
            }
            let average = (remainder / n as u64).max(1);
            for (k, participant_refunds) in refunds.iter_mut().enumerate() {
                let share = if k == n - 1 { remainder } else { average.min(remainder) };
                push_refund(participant_refunds, AssetAmount::new(*asset, share))?;
                remainder -= share;
                if remainder == 0 {
                    break;
                }
            }
        }

        Ok(AllocatedAssets {
            receives: receives.to_vec(),
            fees,
            refunds,
        })
    }

    fn validate(&self, paid: &[AssetAmount], charged_fees: &[AssetAmount]) -> Result<(), FeeError> {
        validate_against_caps(&self.max_fee_rate, paid, charged_fees)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn amt(asset: u64, amount: u64) -> AssetAmount {
        AssetAmount::new(AssetId::from_u64(asset), amount)
    }

    fn strategy() -> CappedDifferentialStrategy {
        CappedDifferentialStrategy::from_config(&FeeConfig::default()).unwrap()
    }

    #[test]
    fn test_spread_below_cap_is_all_fee() {
        // paid 1000 -> cap 50; spread 40 fits under it
        let allocated = strategy()
            .allocate(&[amt(1, 960), amt(2, 500)], &[amt(1, 40), amt(2, 0)], &[true, false])
            .unwrap();
        assert_eq!(allocated.fees, vec![amt(1, 40), amt(2, 0)]);
        assert_eq!(allocated.receives, vec![amt(1, 960), amt(2, 500)]);
        assert!(allocated.refunds.iter().all(Vec::is_empty));
    }

    #[test]
    fn test_three_leg_remainder_split() {
        let receives = [amt(1, 90), amt(2, 90), amt(3, 90)];
        let diffs = [amt(1, 10), amt(2, 10), amt(3, 10)];
        let allocated = strategy().allocate(&receives, &diffs, &[true, true, false]).unwrap();

        // cap = ceil(100 * 5%) = 5 per leg, remainder 5 split 1/1/3
        assert_eq!(allocated.fees, vec![amt(1, 5), amt(2, 5), amt(3, 5)]);
        assert_eq!(allocated.refunds[0], vec![amt(1, 1), amt(2, 1), amt(3, 1)]);
        assert_eq!(allocated.refunds[1], vec![amt(1, 1), amt(2, 1), amt(3, 1)]);
        assert_eq!(allocated.refunds[2], vec![amt(1, 3), amt(2, 3), amt(3, 3)]);
    }

    #[test]
    fn test_shared_asset_charged_once() {
        // legs 0 and 2 both request asset 2
        let receives = [amt(2, 90), amt(3, 90), amt(2, 90), amt(1, 90)];
        let diffs = [amt(2, 10), amt(3, 10), amt(2, 10), amt(1, 10)];
        let allocated = strategy().allocate(&receives, &diffs, &[true; 4]).unwrap();

        // asset 2: spread 20, cap ceil(200 * 5%) = 10, remainder 10 split 2/2/2/4
        assert_eq!(allocated.fees, vec![amt(2, 10), amt(3, 5), amt(2, 0), amt(1, 5)]);
        for participant in &allocated.refunds[..3] {
            assert_eq!(participant, &vec![amt(2, 2), amt(3, 1), amt(1, 1)]);
        }
        assert_eq!(allocated.refunds[3], vec![amt(2, 4), amt(3, 2), amt(1, 2)]);
    }

    #[test]
    fn test_small_remainder_goes_to_first_participants() {
        // paid 20 -> cap 1; remainder 1 over two participants
        let allocated = strategy()
            .allocate(&[amt(1, 18), amt(2, 20)], &[amt(1, 2), amt(2, 0)], &[false, true])
            .unwrap();
        assert_eq!(allocated.fees[0], amt(1, 1));
        assert_eq!(allocated.refunds[0], vec![amt(1, 1)]);
        assert!(allocated.refunds[1].is_empty());
    }

    #[test]
    fn test_validate_cap() {
        let s = strategy();
        assert!(s.validate(&[amt(1, 100)], &[amt(1, 5)]).is_ok());
        assert!(matches!(
            s.validate(&[amt(1, 100)], &[amt(1, 6)]),
            Err(FeeError::FeeValidationFailed { charged: 6, cap: 5, .. })
        ));
    }

    proptest! {
        #[test]
        fn prop_fee_capped_and_refunds_balance(
            legs in prop::collection::vec((1u64..1_000_000_000, 0u64..1_000_000), 2..6)
        ) {
            let receives: Vec<_> = legs.iter().enumerate().map(|(i, (r, _))| amt(i as u64 + 1, *r)).collect();
            let diffs: Vec<_> = legs.iter().enumerate().map(|(i, (_, d))| amt(i as u64 + 1, *d)).collect();
            let makers = vec![true; legs.len()];
            let s = strategy();
            let allocated = s.allocate(&receives, &diffs, &makers).unwrap();

            for (i, (r, d)) in legs.iter().enumerate() {
                let asset = AssetId::from_u64(i as u64 + 1);
                let fee = allocated.fees[i].amount;
                prop_assert!(fee <= (r + d).div_ceil(20));
                let refunded: u64 = allocated.refunds.iter().flatten()
                    .filter(|a| a.asset_id == asset)
                    .map(|a| a.amount)
                    .sum();
                prop_assert_eq!(fee + refunded, *d);
            }

            let paid: Vec<_> = legs.iter().enumerate().map(|(i, (r, d))| amt(i as u64 + 1, r + d)).collect();
            prop_assert!(s.validate(&paid, &allocated.fees).is_ok());
        }
    }
}
