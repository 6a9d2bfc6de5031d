//! Observable channel events.
//!
//! Events are delivered to the host's [`EventSink`](crate::port::EventSink)
//! only when the operation that raised them commits. Each [`ChannelEvent`] can
//! also be rendered as an EVM log record through the Solidity event
//! definitions in [`abi`], so indexers built for the on-chain contracts can
//! consume them unchanged.

use alloy_primitives::{Address, LogData};
use alloy_sol_types::SolEvent;
use serde::{Deserialize, Serialize};

use crate::amount::Amount;
use crate::block::BlockNumber;

/// Solidity event ABI of a channel.
pub mod abi {
    use alloy_sol_types::sol;

    sol! {
        /// The channel received its operator and intermediary.
        #[allow(missing_docs)]
        #[derive(Debug, PartialEq, Eq)]
        event ChannelInitialised(address operator, address hermes);

        /// A promise was (partially) settled.
        #[allow(missing_docs)]
        #[derive(Debug, PartialEq, Eq)]
        event PromiseSettled(address beneficiary, uint256 amount, uint256 totalSettled);

        /// An exit was requested.
        #[allow(missing_docs)]
        #[derive(Debug, PartialEq, Eq)]
        event ExitRequested(uint256 timelock);

        /// A pending exit was finalized.
        #[allow(missing_docs)]
        #[derive(Debug, PartialEq, Eq)]
        event FinalizeExit(uint256 amount);

        /// The funds destination changed.
        #[allow(missing_docs)]
        #[derive(Debug, PartialEq, Eq)]
        event DestinationChanged(address indexed previousDestination, address indexed newDestination);

        /// Channel ownership changed.
        #[allow(missing_docs)]
        #[derive(Debug, PartialEq, Eq)]
        event OwnershipTransferred(address indexed previousOwner, address indexed newOwner);
    }
}

/// A state transition observable by off-chain parties.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all_fields = "camelCase")]
pub enum ChannelEvent {
    /// The channel was initialized.
    ChannelInitialised {
        /// Channel operator.
        operator: Address,
        /// Intermediary contract.
        intermediary: Address,
    },
    /// Funds moved to the intermediary under a promise.
    PromiseSettled {
        /// Receiver of the settled funds.
        beneficiary: Address,
        /// Amount moved by this settlement, fee included.
        amount: Amount,
        /// Cumulative settled amount afterwards.
        total_settled: Amount,
    },
    /// An exit was requested.
    ExitRequested {
        /// Block from which the exit can be finalized.
        timelock: BlockNumber,
    },
    /// A pending exit was finalized.
    FinalizeExit {
        /// Amount paid to the beneficiary.
        amount: Amount,
    },
    /// The funds destination changed.
    DestinationChanged {
        /// Former destination (zero if none).
        previous: Address,
        /// New destination.
        next: Address,
    },
    /// Ownership changed.
    OwnershipTransferred {
        /// Former owner (zero if none).
        previous: Address,
        /// New owner.
        next: Address,
    },
}

impl ChannelEvent {
    /// Returns the Solidity event name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::ChannelInitialised { .. } => "ChannelInitialised",
            Self::PromiseSettled { .. } => "PromiseSettled",
            Self::ExitRequested { .. } => "ExitRequested",
            Self::FinalizeExit { .. } => "FinalizeExit",
            Self::DestinationChanged { .. } => "DestinationChanged",
            Self::OwnershipTransferred { .. } => "OwnershipTransferred",
        }
    }

    /// Encodes this event as an EVM log record.
    #[must_use]
    pub fn to_log_data(&self) -> LogData {
        match *self {
            Self::ChannelInitialised {
                operator,
                intermediary,
            } => abi::ChannelInitialised {
                operator,
                hermes: intermediary,
            }
            .encode_log_data(),
            Self::PromiseSettled {
                beneficiary,
                amount,
                total_settled,
            } => abi::PromiseSettled {
                beneficiary,
                amount: amount.into(),
                totalSettled: total_settled.into(),
            }
            .encode_log_data(),
            Self::ExitRequested { timelock } => abi::ExitRequested {
                timelock: timelock.into(),
            }
            .encode_log_data(),
            Self::FinalizeExit { amount } => abi::FinalizeExit {
                amount: amount.into(),
            }
            .encode_log_data(),
            Self::DestinationChanged { previous, next } => abi::DestinationChanged {
                previousDestination: previous,
                newDestination: next,
            }
            .encode_log_data(),
            Self::OwnershipTransferred { previous, next } => abi::OwnershipTransferred {
                previousOwner: previous,
                newOwner: next,
            }
            .encode_log_data(),
        }
    }
}

/// An event as recorded by a host, tagged with its origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelLog {
    /// Channel that emitted the event.
    pub channel: Address,
    /// Block height at emission.
    pub block: BlockNumber,
    /// The event itself.
    #[serde(flatten)]
    pub event: ChannelEvent,
}
