//! Settlement transaction model
//!
//! Just enough of the ledger's transaction shape to express a match: spend
//! inputs carrying witness arguments, and outputs paying an asset amount to
//! a control program.
//!
//! # Canonical encoding
//! ```text
//! [version: u64][serialized_size: u64]
//! [input_count: u32] per input:
//!     [source_id: 32][source_pos: u64][asset_id: 32][amount: u64]
//!     [program_len: u32][program][arg_count: u32] per arg: [len: u32][bytes]
//! [output_count: u32] per output:
//!     [asset_id: 32][amount: u64][program_len: u32][program]
//! ```
//! All integers little-endian. The id encoding omits `serialized_size` and
//! the witness arguments.

use crate::asset::AssetAmount;
use crate::ids::{AssetId, Hash};
use serde::{Deserialize, Serialize};

/// Spend of an existing output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxInput {
    pub source_id: Hash,
    pub source_pos: u64,
    pub asset_amount: AssetAmount,
    pub control_program: Vec<u8>,
    pub arguments: Vec<Vec<u8>>,
}

impl TxInput {
    pub fn spend(
        source_id: Hash,
        asset_id: AssetId,
        amount: u64,
        source_pos: u64,
        control_program: Vec<u8>,
    ) -> Self {
        Self {
            source_id,
            source_pos,
            asset_amount: AssetAmount::new(asset_id, amount),
            control_program,
            arguments: Vec::new(),
        }
    }

    pub fn asset_id(&self) -> AssetId {
        self.asset_amount.asset_id
    }

    pub fn amount(&self) -> u64 {
        self.asset_amount.amount
    }

    pub fn set_arguments(&mut self, arguments: Vec<Vec<u8>>) {
        self.arguments = arguments;
    }
}

/// Output paying `asset_amount` to `control_program`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOutput {
    pub asset_amount: AssetAmount,
    pub control_program: Vec<u8>,
}

impl TxOutput {
    pub fn new(asset_id: AssetId, amount: u64, control_program: Vec<u8>) -> Self {
        Self {
            asset_amount: AssetAmount::new(asset_id, amount),
            control_program,
        }
    }
}

/// Unfinalized transaction body
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TxData {
    pub version: u64,
    pub serialized_size: u64,
    pub inputs: Vec<TxInput>,
    pub outputs: Vec<TxOutput>,
}

fn put_u32(buf: &mut Vec<u8>, v: usize) {
    // counts and lengths are bounded by program/argument limits well below u32::MAX
    buf.extend_from_slice(&(v as u32).to_le_bytes());
}

fn put_bytes(buf: &mut Vec<u8>, data: &[u8]) {
    put_u32(buf, data.len());
    buf.extend_from_slice(data);
}

impl TxData {
    pub fn new(version: u64) -> Self {
        Self { version, ..Default::default() }
    }

    fn encode(&self, with_witness: bool) -> Vec<u8> {
        let mut buf = Vec::with_capacity(256);
        buf.extend_from_slice(&self.version.to_le_bytes());
        if with_witness {
            buf.extend_from_slice(&self.serialized_size.to_le_bytes());
        }

        put_u32(&mut buf, self.inputs.len());
        for input in &self.inputs {
            buf.extend_from_slice(input.source_id.as_bytes());
            buf.extend_from_slice(&input.source_pos.to_le_bytes());
            buf.extend_from_slice(input.asset_amount.asset_id.as_bytes());
            buf.extend_from_slice(&input.asset_amount.amount.to_le_bytes());
            put_bytes(&mut buf, &input.control_program);
            if with_witness {
                put_u32(&mut buf, input.arguments.len());
                for arg in &input.arguments {
                    put_bytes(&mut buf, arg);
                }
            }
        }

        put_u32(&mut buf, self.outputs.len());
        for output in &self.outputs {
            buf.extend_from_slice(output.asset_amount.asset_id.as_bytes());
            buf.extend_from_slice(&output.asset_amount.amount.to_le_bytes());
            put_bytes(&mut buf, &output.control_program);
        }
        buf
    }

    /// Full serialization including witness arguments
    pub fn to_bytes(&self) -> Vec<u8> {
        self.encode(true)
    }

    /// Serialization the transaction id commits to
    pub fn id_bytes(&self) -> Vec<u8> {
        self.encode(false)
    }

    /// Fix the serialized size and compute the id
    pub fn finalize(mut self) -> Tx {
        self.serialized_size = self.to_bytes().len() as u64;
        let id = Hash::digest(&self.id_bytes());
        Tx { data: self, id }
    }
}

/// Finalized transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tx {
    data: TxData,
    id: Hash,
}

impl Tx {
    pub fn id(&self) -> Hash {
        self.id
    }

    pub fn data(&self) -> &TxData {
        &self.data
    }

    pub fn inputs(&self) -> &[TxInput] {
        &self.data.inputs
    }

    pub fn outputs(&self) -> &[TxOutput] {
        &self.data.outputs
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        self.data.to_bytes()
    }

    pub fn into_data(self) -> TxData {
        self.data
    }
}
