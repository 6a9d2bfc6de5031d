//! Persistent channel state.

use alloy_primitives::Address;
use serde::{Deserialize, Serialize};

use crate::amount::Amount;
use crate::block::BlockNumber;

/// The intermediary ("hermes") a channel pays into.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntermediaryRef {
    /// Signer authorized on the intermediary's behalf.
    pub operator_address: Address,
    /// Intermediary contract; settled funds are sent here.
    pub settlement_target: Address,
    /// Cumulative amount settled so far. Never decreases.
    pub total_settled: Amount,
}

/// A pending withdrawal of the channel balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExitRequest {
    /// First block at which the exit can be finalized.
    pub timelock: BlockNumber,
    /// Receiver of the channel balance.
    pub beneficiary: Address,
}

/// Lifecycle phase of a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelPhase {
    /// No operator has been set yet.
    Uninitialized,
    /// Initialized, no exit pending.
    Open,
    /// Initialized, an exit is waiting for its timelock.
    ExitPending,
}

/// Everything a channel persists.
///
/// A channel with a zero `operator` is uninitialized.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelState {
    /// Managed asset.
    pub token: Address,
    /// Exchange used to convert native-currency top-ups into `token`.
    pub dex: Address,
    /// Channel operator; signs promises, exit authorizations and cheques.
    pub operator: Address,
    /// Owner of the administrative recovery operations.
    pub owner: Address,
    /// Intermediary the channel settles into.
    pub intermediary: IntermediaryRef,
    /// Pending exit, if any.
    pub exit_request: Option<ExitRequest>,
    /// Highest destination-cheque nonce accepted so far.
    pub last_authorized_nonce: u64,
    /// Receiver of recovered funds.
    pub funds_destination: Option<Address>,
}

impl ChannelState {
    /// Returns `true` once an operator has been set.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.operator != Address::ZERO
    }

    /// Returns the current lifecycle phase.
    #[must_use]
    pub fn phase(&self) -> ChannelPhase {
        if !self.is_initialized() {
            ChannelPhase::Uninitialized
        } else if self.exit_request.is_some() {
            ChannelPhase::ExitPending
        } else {
            ChannelPhase::Open
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::address;

    #[test]
    fn test_phases() {
        let mut state = ChannelState::default();
        assert_eq!(state.phase(), ChannelPhase::Uninitialized);
        state.operator = address!("0x0000000000000000000000000000000000000001");
        assert_eq!(state.phase(), ChannelPhase::Open);
        state.exit_request = Some(ExitRequest {
            timelock: BlockNumber::new(10),
            beneficiary: address!("0x0000000000000000000000000000000000000002"),
        });
        assert_eq!(state.phase(), ChannelPhase::ExitPending);
    }
}
