//! Settlement auditing
//!
//! Reads a settlement transaction back into the amounts a fee policy
//! validates: what each spent order actually paid, and what the node
//! program was paid as fees.

use ledger_types::asset::AssetAmount;
use ledger_types::contract::{decode_program, ClauseArguments};
use ledger_types::errors::{ContractError, EngineError, FeeError};
use ledger_types::ids::AssetId;
use ledger_types::numeric::checked_sub;
use ledger_types::tx::{Tx, TxData};
use std::collections::BTreeMap;

/// Inputs and outputs carry the same total of every asset
pub fn check_conservation(data: &TxData) -> Result<(), EngineError> {
    let mut totals: BTreeMap<AssetId, (u128, u128)> = BTreeMap::new();
    for input in &data.inputs {
        totals.entry(input.asset_id()).or_default().0 += input.amount() as u128;
    }
    for output in &data.outputs {
        totals.entry(output.asset_amount.asset_id).or_default().1 += output.asset_amount.amount as u128;
    }
    for (asset, (inputs, outputs)) in totals {
        if inputs != outputs {
            return Err(EngineError::ValueNotConserved { asset, inputs, outputs });
        }
    }
    Ok(())
}

/// Amounts a fee policy validates a settlement against
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SettlementAmounts {
    /// Per input: offered amount less the continuation it locks back up
    pub paid: Vec<AssetAmount>,
    /// Outputs paid to the node program
    pub charged_fees: Vec<AssetAmount>,
}

/// Decode every input's contract and match it to its outputs.
///
/// Each input's witness names the output that pays its seller; a partial
/// fill must also lock its change back under the input's own program.
pub fn settlement_amounts(tx: &Tx, node_program: &[u8]) -> Result<SettlementAmounts, EngineError> {
    check_conservation(tx.data())?;

    let outputs = tx.outputs();
    let mut claimed = vec![false; outputs.len()];
    let mut paid = Vec::with_capacity(tx.inputs().len());

    for input in tx.inputs() {
        let contract = decode_program(&input.control_program)?;
        let (position, partial) = match ClauseArguments::decode(&input.arguments)? {
            ClauseArguments::FullTrade { position } => (position, false),
            ClauseArguments::PartialTrade { position, .. } => (position, true),
            ClauseArguments::Cancel { .. } => {
                return Err(ContractError::OrderMismatch {
                    reason: "cancel clause cannot settle a match".to_string(),
                }
                .into())
            }
        };

        let missing = FeeError::MissingReceiveOutput { asset: contract.requested_asset };
        let index = usize::try_from(position).map_err(|_| missing.clone())?;
        let receive = outputs.get(index).ok_or_else(|| missing.clone())?;
        if claimed[index]
            || receive.control_program != contract.seller_program
            || receive.asset_amount.asset_id != contract.requested_asset
        {
            return Err(missing.into());
        }
        claimed[index] = true;

        let mut continuation = 0;
        if partial {
            let found = outputs.iter().enumerate().position(|(j, output)| {
                !claimed[j]
                    && output.control_program == input.control_program
                    && output.asset_amount.asset_id == input.asset_id()
            });
            let j = found.ok_or_else(|| ContractError::OrderMismatch {
                reason: "partial fill without continuation output".to_string(),
            })?;
            claimed[j] = true;
            continuation = outputs[j].asset_amount.amount;
        }

        paid.push(AssetAmount::new(input.asset_id(), checked_sub(input.amount(), continuation)?));
    }

    let charged_fees = outputs
        .iter()
        .filter(|output| output.control_program == node_program)
        .map(|output| output.asset_amount)
        .collect();

    Ok(SettlementAmounts { paid, charged_fees })
}
