//! Overflow-checked token amounts.
//!
//! Every balance mutation in a channel goes through [`Amount`]. The arithmetic
//! never wraps: each operation returns an [`AmountError`] instead, so a bad
//! input aborts the surrounding operation rather than corrupting accounting.
//!
//! # Serialization
//!
//! Amounts are serialized as decimal strings, since 256-bit values do not fit
//! into a JSON number without loss of precision.
//!
//! ```json
//! "1000000000000000000"
//! ```

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use alloy_primitives::U256;
use serde_with::{DeserializeFromStr, SerializeDisplay};

/// Errors produced by [`Amount`] arithmetic and parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AmountError {
    /// The result does not fit into 256 bits, or a subtraction went below zero.
    #[error("arithmetic overflow")]
    ArithmeticOverflow,
    /// Division or remainder by zero.
    #[error("division by zero")]
    DivisionByZero,
    /// The input is not a non-negative base-10 integer.
    #[error("amount must be a non-negative decimal integer")]
    Parse,
}

/// A non-negative token amount in the asset's smallest unit.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, SerializeDisplay, DeserializeFromStr,
)]
pub struct Amount(U256);

impl Amount {
    /// The zero amount.
    pub const ZERO: Self = Self(U256::ZERO);

    /// The largest representable amount.
    pub const MAX: Self = Self(U256::MAX);

    /// Wraps a raw 256-bit value.
    #[must_use]
    pub const fn new(value: U256) -> Self {
        Self(value)
    }

    /// Returns the underlying 256-bit value.
    #[must_use]
    pub const fn as_u256(&self) -> U256 {
        self.0
    }

    /// Returns `true` for the zero amount.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Checked addition.
    ///
    /// # Errors
    ///
    /// Returns [`AmountError::ArithmeticOverflow`] if the sum exceeds 256 bits.
    pub fn checked_add(self, rhs: Self) -> Result<Self, AmountError> {
        self.0
            .checked_add(rhs.0)
            .map(Self)
            .ok_or(AmountError::ArithmeticOverflow)
    }

    /// Checked subtraction.
    ///
    /// # Errors
    ///
    /// Returns [`AmountError::ArithmeticOverflow`] if `rhs` is larger than `self`.
    pub fn checked_sub(self, rhs: Self) -> Result<Self, AmountError> {
        self.0
            .checked_sub(rhs.0)
            .map(Self)
            .ok_or(AmountError::ArithmeticOverflow)
    }

    /// Checked multiplication.
    ///
    /// # Errors
    ///
    /// Returns [`AmountError::ArithmeticOverflow`] if the product exceeds 256 bits.
    pub fn checked_mul(self, rhs: Self) -> Result<Self, AmountError> {
        self.0
            .checked_mul(rhs.0)
            .map(Self)
            .ok_or(AmountError::ArithmeticOverflow)
    }

    /// Checked integer division, rounding toward zero.
    ///
    /// # Errors
    ///
    /// Returns [`AmountError::DivisionByZero`] if `rhs` is zero.
    pub fn checked_div(self, rhs: Self) -> Result<Self, AmountError> {
        self.0
            .checked_div(rhs.0)
            .map(Self)
            .ok_or(AmountError::DivisionByZero)
    }

    /// Checked remainder.
    ///
    /// # Errors
    ///
    /// Returns [`AmountError::DivisionByZero`] if `rhs` is zero.
    pub fn checked_rem(self, rhs: Self) -> Result<Self, AmountError> {
        self.0
            .checked_rem(rhs.0)
            .map(Self)
            .ok_or(AmountError::DivisionByZero)
    }
}

impl From<u64> for Amount {
    fn from(value: u64) -> Self {
        Self(U256::from(value))
    }
}

impl From<U256> for Amount {
    fn from(value: U256) -> Self {
        Self(value)
    }
}

impl From<Amount> for U256 {
    fn from(value: Amount) -> Self {
        value.0
    }
}

impl Display for Amount {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Amount {
    type Err = AmountError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(AmountError::Parse);
        }
        U256::from_str_radix(s, 10)
            .map(Self)
            .map_err(|_| AmountError::Parse)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_zero() {
        assert!(Amount::ZERO.is_zero());
        assert!(Amount::default().is_zero());
        assert!(!Amount::from(1).is_zero());
        assert!(!Amount::MAX.is_zero());
    }

    #[test]
    fn test_add_within_range() {
        let sum = Amount::from(100).checked_add(Amount::from(150)).unwrap();
        assert_eq!(sum, Amount::from(250));
    }

    #[test]
    fn test_add_overflow() {
        let err = Amount::MAX.checked_add(Amount::from(1)).unwrap_err();
        assert_eq!(err, AmountError::ArithmeticOverflow);
    }

    #[test]
    fn test_sub_underflow_is_overflow() {
        let err = Amount::from(1).checked_sub(Amount::from(2)).unwrap_err();
        assert_eq!(err, AmountError::ArithmeticOverflow);
        assert_eq!(Amount::from(2).checked_sub(Amount::from(2)).unwrap(), Amount::ZERO);
    }

    #[test]
    fn test_mul_overflow() {
        let half = Amount::new(U256::MAX >> 1);
        assert_eq!(half.checked_mul(Amount::from(2)).unwrap(), Amount::new(U256::MAX - U256::from(1)));
        assert_eq!(
            half.checked_mul(Amount::from(3)).unwrap_err(),
            AmountError::ArithmeticOverflow
        );
    }

    #[test]
    fn test_div_and_rem() {
        assert_eq!(Amount::from(17).checked_div(Amount::from(5)).unwrap(), Amount::from(3));
        assert_eq!(Amount::from(17).checked_rem(Amount::from(5)).unwrap(), Amount::from(2));
    }

    #[test]
    fn test_div_by_zero() {
        assert_eq!(
            Amount::from(17).checked_div(Amount::ZERO).unwrap_err(),
            AmountError::DivisionByZero
        );
        assert_eq!(
            Amount::from(17).checked_rem(Amount::ZERO).unwrap_err(),
            AmountError::DivisionByZero
        );
    }

    #[test]
    fn test_parse_decimal() {
        let amount: Amount = "1000000000000000000".parse().unwrap();
        assert_eq!(amount.as_u256(), U256::from(10).pow(U256::from(18)));
        assert!("0x10".parse::<Amount>().is_err());
        assert!("-1".parse::<Amount>().is_err());
        assert!("".parse::<Amount>().is_err());
    }

    #[test]
    fn test_serde_as_decimal_string() {
        let amount = Amount::from(42);
        let json = serde_json::to_string(&amount).unwrap();
        assert_eq!(json, "\"42\"");
        let back: Amount = serde_json::from_str(&json).unwrap();
        assert_eq!(back, amount);
    }
}
