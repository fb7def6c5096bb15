//! Maker/taker fee policy
//!
//! A flat basis-point charge on what each participant is owed. Makers and
//! the taker are charged at separate rates. The fee is drawn from the leg's
//! spread before it touches the receive amount, and any spread left over is
//! returned to the leg it came from.

use super::{check_lengths, push_refund, validate_against_caps, FeeStrategy};
use ledger_types::asset::AssetAmount;
use ledger_types::errors::FeeError;
use ledger_types::fee::{AllocatedAssets, FeeConfig, FeePolicyKind, FeeRate};
use ledger_types::numeric::{checked_add, checked_sub};

#[derive(Debug, Clone)]
pub struct MakerTakerStrategy {
    maker_rate: FeeRate,
    taker_rate: FeeRate,
}

impl MakerTakerStrategy {
    pub fn new(maker_fee_bps: u64, taker_fee_bps: u64) -> Result<Self, FeeError> {
        Ok(Self {
            maker_rate: FeeRate::from_bps(maker_fee_bps)?,
            taker_rate: FeeRate::from_bps(taker_fee_bps)?,
        })
    }

    pub fn from_config(config: &FeeConfig) -> Result<Self, FeeError> {
        Self::new(config.maker_fee_bps, config.taker_fee_bps)
    }
}

impl FeeStrategy for MakerTakerStrategy {
    fn kind(&self) -> FeePolicyKind {
        FeePolicyKind::MakerTaker
    }

    fn allocate(
        &self,
        receives: &[AssetAmount],
        price_diffs: &[AssetAmount],
        is_makers: &[bool],
    ) -> Result<AllocatedAssets, FeeError> {
        check_lengths(receives, price_diffs, is_makers)?;

        let n = receives.len();
        let mut allocated = AllocatedAssets {
            receives: Vec::with_capacity(n),
            fees: Vec::with_capacity(n),
            refunds: vec![Vec::new(); n],
        };
        for (i, ((receive, diff), is_maker)) in receives.iter().zip(price_diffs).zip(is_makers).enumerate() {
            let rate = if *is_maker { &self.maker_rate } else { &self.taker_rate };
            let owed = checked_add(receive.amount, diff.amount)?;
            let fee = rate.ceil_fee(owed)?;

            let from_spread = fee.min(diff.amount);
            let from_receive = checked_sub(fee, from_spread)?;

            allocated
                .receives
                .push(AssetAmount::new(receive.asset_id, checked_sub(receive.amount, from_receive)?));
            allocated.fees.push(AssetAmount::new(receive.asset_id, fee));
            push_refund(
                &mut allocated.refunds[i],
                AssetAmount::new(diff.asset_id, checked_sub(diff.amount, from_spread)?),
            )?;
        }
        Ok(allocated)
    }

    /// Under-charging is allowed; anything above the taker rate is not
    fn validate(&self, paid: &[AssetAmount], charged_fees: &[AssetAmount]) -> Result<(), FeeError> {
        validate_against_caps(&self.taker_rate, paid, charged_fees)
    }
}
