//! Fee configuration and allocation types
//!
//! Rates are configured as decimals or basis points but applied with exact
//! integer ceiling division, so every validating node computes the same fee.

use crate::asset::AssetAmount;
use crate::errors::{ArithmeticError, FeeError};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Basis points per unit
pub const BPS_DENOMINATOR: u64 = 10_000;

/// Largest decimal scale accepted for a rate; keeps `amount * mantissa` in u128
const MAX_RATE_SCALE: u32 = 18;

/// Fee policy variants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeePolicyKind {
    /// Spread captured by the match, capped at a percentage of the amount paid
    CappedDifferential,
    /// Flat basis-point charge, distinguishing makers from takers
    MakerTaker,
}

/// Fee settings per policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeeConfig {
    /// Cap on the capped-differential fee, as a fraction of the amount paid
    pub max_fee_rate: Decimal,
    pub maker_fee_bps: u64,
    pub taker_fee_bps: u64,
    /// Policy used while assembling settlement transactions
    pub build_policy: FeePolicyKind,
    /// Policy used when validating a submitted settlement transaction
    pub validation_policy: FeePolicyKind,
}

impl Default for FeeConfig {
    fn default() -> Self {
        Self {
            max_fee_rate: Decimal::new(5, 2), // 5%
            maker_fee_bps: 0,
            taker_fee_bps: 3,
            build_policy: FeePolicyKind::CappedDifferential,
            validation_policy: FeePolicyKind::CappedDifferential,
        }
    }
}

impl FeeConfig {
    pub fn validate(&self) -> Result<(), FeeError> {
        FeeRate::from_decimal(self.max_fee_rate)?;
        for bps in [self.maker_fee_bps, self.taker_fee_bps] {
            if bps > BPS_DENOMINATOR {
                return Err(FeeError::InvalidRate(format!("{bps} bps exceeds 100%")));
            }
        }
        Ok(())
    }
}

/// An exact fee rate `numerator / denominator`, at most 1
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeRate {
    numerator: u128,
    denominator: u128,
}

impl FeeRate {
    pub fn from_bps(bps: u64) -> Result<Self, FeeError> {
        if bps > BPS_DENOMINATOR {
            return Err(FeeError::InvalidRate(format!("{bps} bps exceeds 100%")));
        }
        Ok(Self {
            numerator: bps as u128,
            denominator: BPS_DENOMINATOR as u128,
        })
    }

    pub fn from_decimal(rate: Decimal) -> Result<Self, FeeError> {
        let rate = rate.normalize();
        if rate.is_sign_negative() || rate > Decimal::ONE {
            return Err(FeeError::InvalidRate(format!("{rate} outside [0, 1]")));
        }
        if rate.scale() > MAX_RATE_SCALE {
            return Err(FeeError::InvalidRate(format!("{rate} has more than {MAX_RATE_SCALE} decimals")));
        }
        Ok(Self {
            numerator: rate.mantissa().unsigned_abs(),
            denominator: 10u128.pow(rate.scale()),
        })
    }

    /// `ceil(amount * rate)`
    pub fn ceil_fee(&self, amount: u64) -> Result<u64, ArithmeticError> {
        let product = (amount as u128)
            .checked_mul(self.numerator)
            .ok_or(ArithmeticError::Overflow { op: "fee" })?;
        let fee = product.div_ceil(self.denominator);
        u64::try_from(fee).map_err(|_| ArithmeticError::Overflow { op: "fee" })
    }
}

/// Per-participant outcome of fee allocation, in ring order
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AllocatedAssets {
    /// Amount each participant's recipient receives in its requested asset
    pub receives: Vec<AssetAmount>,
    /// Protocol fee taken from each participant's leg
    pub fees: Vec<AssetAmount>,
    /// Spread returned to each participant, possibly in several assets
    pub refunds: Vec<Vec<AssetAmount>>,
}

impl AllocatedAssets {
    pub fn participant_count(&self) -> usize {
        self.receives.len()
    }
}
