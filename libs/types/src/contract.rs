//! Magnetic contract codec
//!
//! The only place that touches script bytes. Decodes a locking program into
//! its contract arguments and encodes the clause arguments placed in the
//! unlocking witness. The interpreter that executes these programs lives
//! outside this workspace and remains the final authority.
//!
//! # Program layout
//! ```text
//! 0x00                          witness version
//! push(requested asset, 32)
//! push(ratio numerator)         minimal little-endian int64
//! push(ratio denominator)
//! push(seller program)
//! push(seller key, 32)
//! ```

use crate::errors::ContractError;
use crate::ids::AssetId;
use serde::{Deserialize, Serialize};

pub const WITNESS_VERSION: u8 = 0x00;

/// Clause selector for the partial trade unlock path
pub const PARTIAL_TRADE_CLAUSE_SELECTOR: i64 = 0;
/// Clause selector for the full trade unlock path
pub const FULL_TRADE_CLAUSE_SELECTOR: i64 = 1;
/// Clause selector for the signature-authorized cancel path
pub const CANCEL_CLAUSE_SELECTOR: i64 = 2;

const OP_PUSHDATA1: u8 = 0x4c;
const OP_PUSHDATA2: u8 = 0x4d;
const MAX_DIRECT_PUSH: usize = 75;
const SELLER_KEY_LEN: usize = 32;

/// Arguments committed by a magnetic contract locking program
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MagneticContractArgs {
    pub requested_asset: AssetId,
    pub ratio_numerator: i64,
    pub ratio_denominator: i64,
    pub seller_program: Vec<u8>,
    pub seller_key: Vec<u8>,
}

/// Encode `n` the way the VM encodes int64 arguments: little-endian with
/// trailing zero bytes stripped, so zero is the empty string.
pub fn int64_bytes(n: i64) -> Vec<u8> {
    let mut bytes = n.to_le_bytes().to_vec();
    while bytes.last() == Some(&0) {
        bytes.pop();
    }
    bytes
}

/// Inverse of [`int64_bytes`]
pub fn int64_from_bytes(bytes: &[u8]) -> Result<i64, ContractError> {
    if bytes.len() > 8 {
        return Err(ContractError::IntegerTooLong { len: bytes.len() });
    }
    let mut buf = [0u8; 8];
    buf[..bytes.len()].copy_from_slice(bytes);
    Ok(i64::from_le_bytes(buf))
}

fn amount_bytes(amount: u64) -> Result<Vec<u8>, ContractError> {
    let n = i64::try_from(amount).map_err(|_| ContractError::AmountOutOfRange(amount))?;
    Ok(int64_bytes(n))
}

fn amount_from_bytes(bytes: &[u8]) -> Result<u64, ContractError> {
    let n = int64_from_bytes(bytes)?;
    u64::try_from(n).map_err(|_| ContractError::NegativeInteger(n))
}

fn push_data(out: &mut Vec<u8>, data: &[u8]) -> Result<(), ContractError> {
    match data.len() {
        0 => out.push(0x00),
        len @ 1..=MAX_DIRECT_PUSH => {
            out.push(len as u8);
            out.extend_from_slice(data);
        }
        len @ 76..=0xff => {
            out.push(OP_PUSHDATA1);
            out.push(len as u8);
            out.extend_from_slice(data);
        }
        len @ 0x100..=0xffff => {
            out.push(OP_PUSHDATA2);
            out.extend_from_slice(&(len as u16).to_le_bytes());
            out.extend_from_slice(data);
        }
        len => return Err(ContractError::InvalidLength { field: "push data", len }),
    }
    Ok(())
}

struct PushReader<'a> {
    program: &'a [u8],
    pos: usize,
}

impl<'a> PushReader<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8], ContractError> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|end| *end <= self.program.len())
            .ok_or(ContractError::TruncatedPush { offset: self.pos })?;
        let slice = &self.program[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn next_push(&mut self) -> Result<&'a [u8], ContractError> {
        let opcode = self.take(1)?[0];
        let len = match opcode {
            0x00 => 0,
            n if (n as usize) <= MAX_DIRECT_PUSH => n as usize,
            OP_PUSHDATA1 => self.take(1)?[0] as usize,
            OP_PUSHDATA2 => {
                let b = self.take(2)?;
                u16::from_le_bytes([b[0], b[1]]) as usize
            }
            _ => return Err(ContractError::NotMagneticContract),
        };
        self.take(len)
    }

    fn remaining(&self) -> usize {
        self.program.len() - self.pos
    }
}

/// Build the locking program for a magnetic contract
pub fn encode_program(args: &MagneticContractArgs) -> Result<Vec<u8>, ContractError> {
    validate_args(args)?;

    let mut program = vec![WITNESS_VERSION];
    push_data(&mut program, args.requested_asset.as_bytes())?;
    push_data(&mut program, &int64_bytes(args.ratio_numerator))?;
    push_data(&mut program, &int64_bytes(args.ratio_denominator))?;
    push_data(&mut program, &args.seller_program)?;
    push_data(&mut program, &args.seller_key)?;
    Ok(program)
}

/// Decode a locking program into its contract arguments
pub fn decode_program(program: &[u8]) -> Result<MagneticContractArgs, ContractError> {
    if program.first() != Some(&WITNESS_VERSION) {
        return Err(ContractError::NotMagneticContract);
    }

    let mut reader = PushReader { program, pos: 1 };

    let asset = reader.next_push()?;
    let asset: [u8; 32] = asset
        .try_into()
        .map_err(|_| ContractError::InvalidLength { field: "requested asset", len: asset.len() })?;
    let ratio_numerator = int64_from_bytes(reader.next_push()?)?;
    let ratio_denominator = int64_from_bytes(reader.next_push()?)?;
    let seller_program = reader.next_push()?.to_vec();
    let seller_key = reader.next_push()?.to_vec();

    if reader.remaining() != 0 {
        return Err(ContractError::TrailingBytes { count: reader.remaining() });
    }

    let args = MagneticContractArgs {
        requested_asset: AssetId::new(asset),
        ratio_numerator,
        ratio_denominator,
        seller_program,
        seller_key,
    };
    validate_args(&args)?;
    Ok(args)
}

fn validate_args(args: &MagneticContractArgs) -> Result<(), ContractError> {
    if args.ratio_numerator <= 0 || args.ratio_denominator <= 0 {
        return Err(ContractError::InvalidRatio {
            numerator: args.ratio_numerator,
            denominator: args.ratio_denominator,
        });
    }
    if args.seller_program.is_empty() {
        return Err(ContractError::InvalidLength { field: "seller program", len: 0 });
    }
    if args.seller_key.len() != SELLER_KEY_LEN {
        return Err(ContractError::InvalidLength {
            field: "seller key",
            len: args.seller_key.len(),
        });
    }
    Ok(())
}

/// Unlocking witness arguments, one variant per contract clause.
///
/// `position` is the index of the output that pays the order's seller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClauseArguments {
    FullTrade { position: u64 },
    PartialTrade { amount: u64, position: u64 },
    Cancel { signature: Vec<u8>, position: u64 },
}

impl ClauseArguments {
    pub fn selector(&self) -> i64 {
        match self {
            ClauseArguments::FullTrade { .. } => FULL_TRADE_CLAUSE_SELECTOR,
            ClauseArguments::PartialTrade { .. } => PARTIAL_TRADE_CLAUSE_SELECTOR,
            ClauseArguments::Cancel { .. } => CANCEL_CLAUSE_SELECTOR,
        }
    }

    /// Witness argument vector, selector last
    pub fn encode(&self) -> Result<Vec<Vec<u8>>, ContractError> {
        let selector = int64_bytes(self.selector());
        let args = match self {
            ClauseArguments::FullTrade { position } => vec![amount_bytes(*position)?, selector],
            ClauseArguments::PartialTrade { amount, position } => {
                vec![amount_bytes(*amount)?, amount_bytes(*position)?, selector]
            }
            ClauseArguments::Cancel { signature, position } => {
                vec![signature.clone(), amount_bytes(*position)?, selector]
            }
        };
        Ok(args)
    }

    pub fn decode(arguments: &[Vec<u8>]) -> Result<Self, ContractError> {
        let (selector, rest) = arguments
            .split_last()
            .ok_or(ContractError::ArgumentCount(0))?;

        match int64_from_bytes(selector)? {
            FULL_TRADE_CLAUSE_SELECTOR => match rest {
                [position] => Ok(ClauseArguments::FullTrade {
                    position: amount_from_bytes(position)?,
                }),
                _ => Err(ContractError::ArgumentCount(arguments.len())),
            },
            PARTIAL_TRADE_CLAUSE_SELECTOR => match rest {
                [amount, position] => Ok(ClauseArguments::PartialTrade {
                    amount: amount_from_bytes(amount)?,
                    position: amount_from_bytes(position)?,
                }),
                _ => Err(ContractError::ArgumentCount(arguments.len())),
            },
            CANCEL_CLAUSE_SELECTOR => match rest {
                [signature, position] => Ok(ClauseArguments::Cancel {
                    signature: signature.clone(),
                    position: amount_from_bytes(position)?,
                }),
                _ => Err(ContractError::ArgumentCount(arguments.len())),
            },
            other => Err(ContractError::UnknownClause(other)),
        }
    }
}
