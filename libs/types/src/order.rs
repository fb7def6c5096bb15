//! Orders and trade pairs
//!
//! An order is an unspent output locked by a magnetic contract. It is
//! immutable: a partial fill produces a new, smaller continuation order
//! backed by the settlement transaction's change output.

use crate::contract::{decode_program, MagneticContractArgs};
use crate::errors::{ArithmeticError, ContractError};
use crate::ids::{AssetId, Hash};
use crate::numeric::{mul_div_ceil, mul_div_floor, Ratio};
use crate::tx::Tx;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Directional asset pair: offer `from_asset_id`, request `to_asset_id`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TradePair {
    pub from_asset_id: AssetId,
    pub to_asset_id: AssetId,
}

impl TradePair {
    pub fn new(from_asset_id: AssetId, to_asset_id: AssetId) -> Self {
        Self { from_asset_id, to_asset_id }
    }
}

impl fmt::Display for TradePair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}->{}", self.from_asset_id, self.to_asset_id)
    }
}

/// Locator and contents of the output backing an order
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderUtxo {
    pub source_id: Hash,
    pub source_pos: u64,
    pub amount: u64,
    pub control_program: Vec<u8>,
}

impl OrderUtxo {
    /// Stable identity of the output, shared by the book and its store
    pub fn key(&self) -> Hash {
        let mut buf = Vec::with_capacity(32 + 8 + 8 + self.control_program.len());
        buf.extend_from_slice(self.source_id.as_bytes());
        buf.extend_from_slice(&self.source_pos.to_le_bytes());
        buf.extend_from_slice(&self.amount.to_le_bytes());
        buf.extend_from_slice(&self.control_program);
        Hash::digest(&buf)
    }
}

/// A resting offer backed by a magnetic-contract output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    from_asset_id: AssetId,
    utxo: OrderUtxo,
    contract: MagneticContractArgs,
}

impl Order {
    /// Build an order from an output holding `from_asset_id`.
    ///
    /// Fails if the output's program is not a magnetic contract, or if the
    /// contract requests the very asset it locks.
    pub fn new(from_asset_id: AssetId, utxo: OrderUtxo) -> Result<Self, ContractError> {
        let contract = decode_program(&utxo.control_program)?;
        if contract.requested_asset == from_asset_id {
            return Err(ContractError::OrderMismatch {
                reason: "contract requests the asset it locks".to_string(),
            });
        }
        Ok(Self { from_asset_id, utxo, contract })
    }

    /// Continuation order for output `index` of a settlement transaction
    pub fn from_output(tx: &Tx, index: usize) -> Result<Self, ContractError> {
        let output = tx
            .outputs()
            .get(index)
            .ok_or(ContractError::OutputOutOfRange { index })?;

        let utxo = OrderUtxo {
            source_id: tx.id(),
            source_pos: index as u64,
            amount: output.asset_amount.amount,
            control_program: output.control_program.clone(),
        };
        Self::new(output.asset_amount.asset_id, utxo)
    }

    /// Re-decode the program and check it still agrees with the cached contract
    pub fn verify(&self) -> Result<(), ContractError> {
        let decoded = decode_program(&self.utxo.control_program)?;
        if decoded != self.contract {
            return Err(ContractError::OrderMismatch {
                reason: "contract arguments differ from control program".to_string(),
            });
        }
        if decoded.requested_asset == self.from_asset_id {
            return Err(ContractError::OrderMismatch {
                reason: "contract requests the asset it locks".to_string(),
            });
        }
        Ok(())
    }

    pub fn key(&self) -> Hash {
        self.utxo.key()
    }

    pub fn trade_pair(&self) -> TradePair {
        TradePair::new(self.from_asset_id, self.contract.requested_asset)
    }

    pub fn from_asset_id(&self) -> AssetId {
        self.from_asset_id
    }

    pub fn to_asset_id(&self) -> AssetId {
        self.contract.requested_asset
    }

    pub fn utxo(&self) -> &OrderUtxo {
        &self.utxo
    }

    pub fn amount(&self) -> u64 {
        self.utxo.amount
    }

    pub fn contract(&self) -> &MagneticContractArgs {
        &self.contract
    }

    pub fn ratio_numerator(&self) -> u64 {
        // validated positive at decode time
        self.contract.ratio_numerator.unsigned_abs()
    }

    pub fn ratio_denominator(&self) -> u64 {
        self.contract.ratio_denominator.unsigned_abs()
    }

    /// Program that must receive the requested asset
    pub fn recipient_program(&self) -> &[u8] {
        &self.contract.seller_program
    }

    /// Units of `to_asset` requested per unit of `from_asset` offered.
    ///
    /// Lower is cheaper to fill.
    pub fn rate(&self) -> Ratio {
        Ratio::new(self.ratio_numerator(), self.ratio_denominator())
    }

    /// [`Order::rate`] as a decimal, for depth snapshots and logs
    pub fn rate_decimal(&self) -> Option<Decimal> {
        Decimal::from(self.ratio_numerator()).checked_div(Decimal::from(self.ratio_denominator()))
    }

    /// `floor(amount * numerator / denominator)`
    pub fn request_amount(&self) -> Result<u64, ArithmeticError> {
        mul_div_floor(self.utxo.amount, self.ratio_numerator(), self.ratio_denominator())
    }

    /// `ceil(receive * denominator / numerator)`, rounded in the maker's favor
    pub fn should_pay_amount(&self, receive_amount: u64) -> Result<u64, ArithmeticError> {
        mul_div_ceil(receive_amount, self.ratio_denominator(), self.ratio_numerator())
    }
}
