//! Error types for the matching engine
//!
//! Error taxonomy using thiserror. Every failure of a matching attempt is
//! recoverable by the caller: the ring is simply left out of the block.

use crate::ids::{AssetId, Hash};
use crate::order::TradePair;
use thiserror::Error;

/// Top-level engine error
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    #[error("Invalid ring: {reason}")]
    InvalidRing { reason: String },

    #[error("No resting order for trade pair {pair}")]
    NoRestingOrder { pair: TradePair },

    #[error("Ring does not cross at leg {leg}")]
    NotCrossable { leg: usize },

    #[error("Script decode error: {0}")]
    Contract(#[from] ContractError),

    #[error("Arithmetic overflow: {0}")]
    Arithmetic(#[from] ArithmeticError),

    #[error("Fee error: {0}")]
    Fee(#[from] FeeError),

    #[error("Value not conserved for asset {asset}: inputs {inputs}, outputs {outputs}")]
    ValueNotConserved {
        asset: AssetId,
        inputs: u128,
        outputs: u128,
    },

    #[error("Order not found: {key}")]
    OrderNotFound { key: Hash },

    #[error("Order already resting: {key}")]
    DuplicateOrder { key: Hash },

    #[error("Invalid configuration: {message}")]
    Config { message: String },

    #[error("Order store error: {message}")]
    Store { message: String },

    #[error("Order table lock poisoned")]
    LockPoisoned,
}

/// Locking-script or witness decoding errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ContractError {
    #[error("Not a magnetic contract program")]
    NotMagneticContract,

    #[error("Truncated push data at offset {offset}")]
    TruncatedPush { offset: usize },

    #[error("Invalid {field} length: {len}")]
    InvalidLength { field: &'static str, len: usize },

    #[error("Ratio out of range: {numerator}/{denominator}")]
    InvalidRatio { numerator: i64, denominator: i64 },

    #[error("Integer argument too long: {len} bytes")]
    IntegerTooLong { len: usize },

    #[error("Amount {0} does not fit a script integer")]
    AmountOutOfRange(u64),

    #[error("Negative integer argument: {0}")]
    NegativeInteger(i64),

    #[error("Trailing bytes after contract: {count}")]
    TrailingBytes { count: usize },

    #[error("Unknown clause selector: {0}")]
    UnknownClause(i64),

    #[error("Wrong witness argument count for clause: {0}")]
    ArgumentCount(usize),

    #[error("Order does not match its contract: {reason}")]
    OrderMismatch { reason: String },

    #[error("Output {index} out of range")]
    OutputOutOfRange { index: usize },
}

/// Checked amount arithmetic errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ArithmeticError {
    #[error("overflow in {op}")]
    Overflow { op: &'static str },

    #[error("underflow in {op}")]
    Underflow { op: &'static str },

    #[error("division by zero in {op}")]
    DivisionByZero { op: &'static str },
}

/// Fee allocation and validation errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FeeError {
    #[error("Charged fee {charged} of asset {asset} exceeds cap {cap}")]
    FeeValidationFailed { asset: AssetId, charged: u64, cap: u64 },

    #[error("No receive output for asset {asset}")]
    MissingReceiveOutput { asset: AssetId },

    #[error("Participant count mismatch: {receives} receives, {diffs} price diffs, {makers} maker flags")]
    ParticipantMismatch {
        receives: usize,
        diffs: usize,
        makers: usize,
    },

    #[error("Invalid fee rate: {0}")]
    InvalidRate(String),

    #[error("Arithmetic overflow: {0}")]
    Arithmetic(#[from] ArithmeticError),
}
