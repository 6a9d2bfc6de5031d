//! Interfaces to everything a channel talks to but does not own.
//!
//! A channel never holds balances itself. It reads and moves value through the
//! ports below, which together form a [`ChannelHost`]:
//!
//! - [`AssetTransferPort`] — fungible token balances and transfers
//! - [`NativeCurrencyPort`] — the ledger's native currency
//! - [`IntermediaryPort`] — operator lookup on an intermediary contract
//! - [`DexPort`] — native-to-asset swaps used by fast funding
//! - [`EventSink`] — delivery of committed events
//! - [`Journal`] — checkpoints that let a failed operation undo its calls
//!
//! [`MemoryHost`](crate::memory::MemoryHost) implements all of them in memory.

use alloy_primitives::Address;

use crate::amount::Amount;
use crate::block::BlockNumber;
use crate::error::PortError;
use crate::event::ChannelEvent;

/// Fungible assets addressed by their contract address.
pub trait AssetTransferPort {
    /// Returns the balance of `account` in `asset`.
    ///
    /// # Errors
    ///
    /// Returns [`PortError`] if the asset cannot be queried.
    fn balance_of(&self, asset: Address, account: Address) -> Result<Amount, PortError>;

    /// Moves `amount` of `asset` from `from` to `to`.
    ///
    /// Implementations must fail loudly instead of silently moving less.
    ///
    /// # Errors
    ///
    /// Returns [`PortError::InsufficientBalance`] or [`PortError::Rejected`].
    fn transfer(
        &mut self,
        asset: Address,
        from: Address,
        to: Address,
        amount: Amount,
    ) -> Result<(), PortError>;
}

/// The host ledger's native currency.
pub trait NativeCurrencyPort {
    /// Returns the native balance of `account`.
    ///
    /// # Errors
    ///
    /// Returns [`PortError`] if the balance cannot be queried.
    fn native_balance_of(&self, account: Address) -> Result<Amount, PortError>;

    /// Moves `amount` of native currency from `from` to `to`.
    ///
    /// # Errors
    ///
    /// Returns [`PortError::InsufficientBalance`] or [`PortError::Rejected`].
    fn send_native(&mut self, from: Address, to: Address, amount: Amount)
    -> Result<(), PortError>;
}

/// Intermediary contracts.
pub trait IntermediaryPort {
    /// Returns the signer authorized on behalf of `intermediary`.
    ///
    /// # Errors
    ///
    /// Returns [`PortError::UnknownIntermediary`] if nothing is deployed there.
    fn operator_of(&self, intermediary: Address) -> Result<Address, PortError>;
}

/// Decentralized exchanges selling the channel asset for native currency.
pub trait DexPort {
    /// Spends `value` native currency held by `payer` on `dex`, delivering
    /// at least `min_out` of the pool's asset to `recipient`.
    ///
    /// Returns the amount of asset bought.
    ///
    /// # Errors
    ///
    /// Returns [`PortError`] if the swap cannot be executed.
    fn swap_native_for_asset(
        &mut self,
        dex: Address,
        payer: Address,
        value: Amount,
        min_out: Amount,
        recipient: Address,
    ) -> Result<Amount, PortError>;
}

/// Receiver of committed channel events.
pub trait EventSink {
    /// Records `event` emitted by `channel`.
    fn emit(&mut self, channel: Address, event: ChannelEvent);
}

/// Undo support for the value-moving ports.
///
/// A channel takes a checkpoint before an operation touches any port and
/// reverts to it if the operation fails, so external effects are all-or-nothing.
pub trait Journal {
    /// Opaque snapshot of the host.
    type Checkpoint;

    /// Captures the current host state.
    fn checkpoint(&mut self) -> Self::Checkpoint;

    /// Restores the state captured by `checkpoint`.
    fn revert_to(&mut self, checkpoint: Self::Checkpoint);
}

/// Everything a channel needs from the ledger it runs on.
pub trait ChannelHost:
    AssetTransferPort + NativeCurrencyPort + IntermediaryPort + DexPort + EventSink + Journal
{
    /// Returns the current block height.
    fn block_number(&self) -> BlockNumber;
}

/// The caller of a channel operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallContext {
    /// Address that invoked the operation.
    pub caller: Address,
    /// Native currency attached to the call.
    pub value: Amount,
}

impl CallContext {
    /// A call from `caller` carrying no value.
    #[must_use]
    pub const fn new(caller: Address) -> Self {
        Self {
            caller,
            value: Amount::ZERO,
        }
    }

    /// Attaches native currency to the call.
    #[must_use]
    pub const fn with_value(mut self, value: Amount) -> Self {
        self.value = value;
        self
    }
}
