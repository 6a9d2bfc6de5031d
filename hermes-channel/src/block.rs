//! Block height utilities for exit timelocks and authorization windows.
//!
//! This module provides the [`BlockNumber`] type used for every time-bounded
//! channel operation: the validity window of a signed exit authorization and
//! the timelock after which a pending exit can be finalized.

use std::fmt::{Display, Formatter};
use std::num::ParseIntError;
use std::str::FromStr;

use alloy_primitives::U256;
use serde_with::{DeserializeFromStr, SerializeDisplay};

/// A block height on the host ledger.
///
/// # Serialization
///
/// Serialized as a stringified integer to avoid loss of precision in JSON, since
/// `JavaScript`'s `Number` type cannot safely represent all 64-bit integers.
///
/// ```json
/// "19000123"
/// ```
#[derive(
    Debug, Clone, Copy, Default, PartialEq, PartialOrd, Ord, Eq, Hash, SerializeDisplay, DeserializeFromStr,
)]
pub struct BlockNumber(u64);

impl Display for BlockNumber {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for BlockNumber {
    type Err = ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<u64>().map(Self)
    }
}

impl From<u64> for BlockNumber {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl From<BlockNumber> for U256 {
    fn from(value: BlockNumber) -> Self {
        Self::from(value.0)
    }
}

impl BlockNumber {
    /// The genesis block.
    pub const GENESIS: Self = Self(0);

    /// Creates a new [`BlockNumber`] from a raw height.
    #[must_use]
    pub const fn new(height: u64) -> Self {
        Self(height)
    }

    /// Returns the raw height.
    #[must_use]
    pub const fn as_u64(&self) -> u64 {
        self.0
    }

    /// Returns the height `blocks` after this one, or `None` on overflow.
    #[must_use]
    pub const fn checked_add(self, blocks: u64) -> Option<Self> {
        match self.0.checked_add(blocks) {
            Some(height) => Some(Self(height)),
            None => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checked_add() {
        assert_eq!(BlockNumber::new(10).checked_add(5), Some(BlockNumber::new(15)));
        assert_eq!(BlockNumber::new(u64::MAX).checked_add(1), None);
    }

    #[test]
    fn test_serde_as_string() {
        let json = serde_json::to_string(&BlockNumber::new(18_000)).unwrap();
        assert_eq!(json, "\"18000\"");
        let back: BlockNumber = serde_json::from_str(&json).unwrap();
        assert_eq!(back, BlockNumber::new(18_000));
        assert!(serde_json::from_str::<BlockNumber>("\"-3\"").is_err());
    }
}
