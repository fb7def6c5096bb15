//! Fee policies
//!
//! A [`FeeStrategy`] sizes the protocol fee while a settlement is built and
//! checks the fee of a settlement submitted for validation. Both policies
//! work on per-participant amounts in ring order.

pub mod capped;
pub mod maker_taker;

pub use capped::CappedDifferentialStrategy;
pub use maker_taker::MakerTakerStrategy;

use ledger_types::asset::AssetAmount;
use ledger_types::errors::FeeError;
use ledger_types::fee::{AllocatedAssets, FeeConfig, FeePolicyKind, FeeRate};
use ledger_types::ids::AssetId;
use ledger_types::numeric::checked_add;
use std::collections::BTreeMap;

pub trait FeeStrategy: Send + Sync {
    fn kind(&self) -> FeePolicyKind;

    /// Split each participant's spread between fee and refunds.
    ///
    /// `receives[i]` and `price_diffs[i]` are both in participant `i`'s
    /// requested asset; `is_makers[i]` is false for the single taker.
    fn allocate(
        &self,
        receives: &[AssetAmount],
        price_diffs: &[AssetAmount],
        is_makers: &[bool],
    ) -> Result<AllocatedAssets, FeeError>;

    /// Check the fees charged by a settlement against the amounts paid into it
    fn validate(&self, paid: &[AssetAmount], charged_fees: &[AssetAmount]) -> Result<(), FeeError>;
}

/// Instantiate the policy named by `kind`
pub fn strategy_for(kind: FeePolicyKind, config: &FeeConfig) -> Result<Box<dyn FeeStrategy>, FeeError> {
    let strategy: Box<dyn FeeStrategy> = match kind {
        FeePolicyKind::CappedDifferential => Box::new(CappedDifferentialStrategy::from_config(config)?),
        FeePolicyKind::MakerTaker => Box::new(MakerTakerStrategy::from_config(config)?),
    };
    Ok(strategy)
}

fn check_lengths(
    receives: &[AssetAmount],
    price_diffs: &[AssetAmount],
    is_makers: &[bool],
) -> Result<(), FeeError> {
    if receives.len() != price_diffs.len() || receives.len() != is_makers.len() {
        return Err(FeeError::ParticipantMismatch {
            receives: receives.len(),
            diffs: price_diffs.len(),
            makers: is_makers.len(),
        });
    }
    for (receive, diff) in receives.iter().zip(price_diffs) {
        if receive.asset_id != diff.asset_id {
            return Err(FeeError::MissingReceiveOutput { asset: diff.asset_id });
        }
    }
    Ok(())
}

fn sum_by_asset(amounts: &[AssetAmount]) -> Result<BTreeMap<AssetId, u64>, FeeError> {
    let mut totals = BTreeMap::new();
    for amount in amounts {
        let total = totals.entry(amount.asset_id).or_insert(0u64);
        *total = checked_add(*total, amount.amount)?;
    }
    Ok(totals)
}

/// Every charged asset must have been paid in, and its fee may not exceed
/// `rate` applied to each paid amount of that asset.
fn validate_against_caps(
    rate: &FeeRate,
    paid: &[AssetAmount],
    charged_fees: &[AssetAmount],
) -> Result<(), FeeError> {
    let mut caps: BTreeMap<AssetId, u64> = BTreeMap::new();
    for amount in paid {
        let cap = caps.entry(amount.asset_id).or_insert(0);
        *cap = checked_add(*cap, rate.ceil_fee(amount.amount)?)?;
    }

    for (asset, charged) in sum_by_asset(charged_fees)? {
        if charged == 0 {
            continue;
        }
        let cap = *caps.get(&asset).ok_or(FeeError::MissingReceiveOutput { asset })?;
        if charged > cap {
            return Err(FeeError::FeeValidationFailed { asset, charged, cap });
        }
    }
    Ok(())
}

/// Add `amount` to a participant's refund list, merging same-asset entries
fn push_refund(refunds: &mut Vec<AssetAmount>, amount: AssetAmount) -> Result<(), FeeError> {
    if amount.is_zero() {
        return Ok(());
    }
    match refunds.iter_mut().find(|r| r.asset_id == amount.asset_id) {
        Some(existing) => existing.amount = checked_add(existing.amount, amount.amount)?,
        None => refunds.push(amount),
    }
    Ok(())
}
