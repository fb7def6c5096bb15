//! Checked integer arithmetic for asset amounts
//!
//! Settlement math never touches floating point: products are taken in u128
//! and narrowed back to u64, so a result that does not fit is an error
//! rather than a silent wraparound.

use crate::errors::ArithmeticError;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// `floor(a * b / c)`
pub fn mul_div_floor(a: u64, b: u64, c: u64) -> Result<u64, ArithmeticError> {
    if c == 0 {
        return Err(ArithmeticError::DivisionByZero { op: "mul_div_floor" });
    }
    let q = (a as u128) * (b as u128) / (c as u128);
    u64::try_from(q).map_err(|_| ArithmeticError::Overflow { op: "mul_div_floor" })
}

/// `ceil(a * b / c)`
pub fn mul_div_ceil(a: u64, b: u64, c: u64) -> Result<u64, ArithmeticError> {
    if c == 0 {
        return Err(ArithmeticError::DivisionByZero { op: "mul_div_ceil" });
    }
    let c = c as u128;
    let q = ((a as u128) * (b as u128)).div_ceil(c);
    u64::try_from(q).map_err(|_| ArithmeticError::Overflow { op: "mul_div_ceil" })
}

pub fn checked_add(a: u64, b: u64) -> Result<u64, ArithmeticError> {
    a.checked_add(b).ok_or(ArithmeticError::Overflow { op: "add" })
}

pub fn checked_sub(a: u64, b: u64) -> Result<u64, ArithmeticError> {
    a.checked_sub(b).ok_or(ArithmeticError::Underflow { op: "sub" })
}

/// An exact positive rational `numerator / denominator`.
///
/// Comparison cross-multiplies in u128, so `1/2 == 2/4` and no precision is
/// lost for any pair of u64 components.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Ratio {
    pub numerator: u64,
    pub denominator: u64,
}

impl Ratio {
    pub fn new(numerator: u64, denominator: u64) -> Self {
        Self { numerator, denominator }
    }

    /// `self * other <= 1`
    pub fn product_at_most_one(&self, other: &Ratio) -> bool {
        (self.numerator as u128) * (other.numerator as u128)
            <= (self.denominator as u128) * (other.denominator as u128)
    }
}

impl PartialEq for Ratio {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Ratio {}

impl PartialOrd for Ratio {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Ratio {
    fn cmp(&self, other: &Self) -> Ordering {
        let lhs = (self.numerator as u128) * (other.denominator as u128);
        let rhs = (other.numerator as u128) * (self.denominator as u128);
        lhs.cmp(&rhs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_mul_div_rounding() {
        assert_eq!(mul_div_floor(10, 1, 3).unwrap(), 3);
        assert_eq!(mul_div_ceil(10, 1, 3).unwrap(), 4);
        assert_eq!(mul_div_ceil(9, 1, 3).unwrap(), 3);
        assert_eq!(mul_div_ceil(0, 5, 3).unwrap(), 0);
    }

    #[test]
    fn test_mul_div_large_intermediate() {
        // intermediate product exceeds u64 but result fits
        assert_eq!(mul_div_floor(u64::MAX, 4, 8).unwrap(), u64::MAX / 2);
    }

    #[test]
    fn test_mul_div_overflow() {
        assert_eq!(
            mul_div_floor(u64::MAX, 2, 1),
            Err(ArithmeticError::Overflow { op: "mul_div_floor" })
        );
        assert!(mul_div_ceil(1, 1, 0).is_err());
    }

    #[test]
    fn test_checked_sub_underflow() {
        assert_eq!(checked_sub(1, 2), Err(ArithmeticError::Underflow { op: "sub" }));
        assert_eq!(checked_add(u64::MAX, 0).unwrap(), u64::MAX);
        assert!(checked_add(u64::MAX, 1).is_err());
    }

    #[test]
    fn test_ratio_equivalence() {
        assert_eq!(Ratio::new(1, 2), Ratio::new(2, 4));
        assert!(Ratio::new(1, 3) < Ratio::new(1, 2));
        assert!(Ratio::new(u64::MAX, 1) > Ratio::new(u64::MAX - 1, 1));
    }

    #[test]
    fn test_ratio_products() {
        let two = Ratio::new(2, 1);
        let half = Ratio::new(1, 2);
        assert!(two.product_at_most_one(&half));
        assert!(Ratio::new(9, 10).product_at_most_one(&Ratio::new(1, 1)));
        assert!(!Ratio::new(11, 10).product_at_most_one(&Ratio::new(1, 1)));
    }

    proptest! {
        #[test]
        fn prop_ceil_is_floor_or_floor_plus_one(a in 0u64..u64::MAX / 2, b in 1u64..1_000_000, c in 1u64..1_000_000) {
            let (floor, ceil) = match (mul_div_floor(a, b, c), mul_div_ceil(a, b, c)) {
                (Ok(f), Ok(c)) => (f, c),
                _ => return Ok(()),
            };
            prop_assert!(ceil == floor || ceil == floor + 1);
            let exact = (a as u128) * (b as u128) % (c as u128) == 0;
            prop_assert_eq!(exact, ceil == floor);
        }
    }
}
