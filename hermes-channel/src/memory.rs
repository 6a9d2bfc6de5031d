//! In-memory ledger implementing every channel port.
//!
//! [`MemoryHost`] stands in for the chain a channel would normally run on: it
//! tracks balances of any number of assets, native currency, a directory of
//! intermediary contracts, fixed-rate exchange pools and the event log.
//! Checkpoints snapshot the ledger only. The event log is append-only and is
//! not rolled back, since channels emit events once an operation commits.
//!
//! # Example
//!
//! ```rust
//! use alloy_primitives::address;
//! use hermes_channel::amount::Amount;
//! use hermes_channel::port::AssetTransferPort;
//! use hermes_channel::memory::MemoryHost;
//!
//! let token = address!("0x0000000000000000000000000000000000007070");
//! let alice = address!("0x00000000000000000000000000000000000a11ce");
//! let bob = address!("0x0000000000000000000000000000000000000b0b");
//!
//! let mut host = MemoryHost::new();
//! host.mint(token, alice, Amount::from(10)).unwrap();
//! host.transfer(token, alice, bob, Amount::from(4)).unwrap();
//! assert_eq!(host.balance_of(token, bob).unwrap(), Amount::from(4));
//! ```

use std::collections::HashMap;

use alloy_primitives::Address;
use serde::{Deserialize, Serialize};

use crate::amount::{Amount, AmountError};
use crate::block::BlockNumber;
use crate::error::PortError;
use crate::event::{ChannelEvent, ChannelLog};
use crate::port::{
    AssetTransferPort, ChannelHost, DexPort, EventSink, IntermediaryPort, Journal,
    NativeCurrencyPort,
};

/// A fixed-rate pool selling `asset` for native currency.
///
/// The pool pays out of the asset balance held by its own address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DexPool {
    /// Asset sold by the pool.
    pub asset: Address,
    /// Asset units paid per unit of native currency.
    pub rate: Amount,
}

#[derive(Debug, Clone, Default)]
struct Ledger {
    balances: HashMap<(Address, Address), Amount>,
    native: HashMap<Address, Amount>,
    intermediaries: HashMap<Address, Address>,
    pools: HashMap<Address, DexPool>,
}

/// Snapshot returned by [`MemoryHost::checkpoint`](Journal::checkpoint).
#[derive(Debug, Clone)]
pub struct MemoryCheckpoint(Ledger);

/// A journaled in-memory ledger.
#[derive(Debug, Clone, Default)]
pub struct MemoryHost {
    ledger: Ledger,
    logs: Vec<ChannelLog>,
    block: BlockNumber,
}

impl MemoryHost {
    /// Creates an empty ledger at the genesis block.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty ledger at `block`.
    #[must_use]
    pub fn at_block(block: BlockNumber) -> Self {
        Self {
            block,
            ..Self::default()
        }
    }

    /// Creates `amount` of `asset` out of thin air for `account`.
    ///
    /// # Errors
    ///
    /// Returns [`AmountError::ArithmeticOverflow`] if the balance would overflow.
    pub fn mint(
        &mut self,
        asset: Address,
        account: Address,
        amount: Amount,
    ) -> Result<(), AmountError> {
        let balance = self.ledger.balances.entry((asset, account)).or_default();
        *balance = balance.checked_add(amount)?;
        Ok(())
    }

    /// Credits native currency to `account`.
    ///
    /// # Errors
    ///
    /// Returns [`AmountError::ArithmeticOverflow`] if the balance would overflow.
    pub fn credit_native(&mut self, account: Address, amount: Amount) -> Result<(), AmountError> {
        let balance = self.ledger.native.entry(account).or_default();
        *balance = balance.checked_add(amount)?;
        Ok(())
    }

    /// Deploys an intermediary contract at `contract` whose signer is `operator`.
    pub fn register_intermediary(&mut self, contract: Address, operator: Address) {
        self.ledger.intermediaries.insert(contract, operator);
    }

    /// Opens an exchange pool at `dex`.
    pub fn register_pool(&mut self, dex: Address, pool: DexPool) {
        self.ledger.pools.insert(dex, pool);
    }

    /// Jumps to block `block`.
    pub const fn set_block(&mut self, block: BlockNumber) {
        self.block = block;
    }

    /// Mines `blocks` empty blocks and returns the new height.
    pub const fn advance_blocks(&mut self, blocks: u64) -> BlockNumber {
        self.block = BlockNumber::new(self.block.as_u64().saturating_add(blocks));
        self.block
    }

    /// Returns every event emitted so far, oldest first.
    #[must_use]
    pub fn logs(&self) -> &[ChannelLog] {
        &self.logs
    }

    /// Returns the events emitted by `channel`, oldest first.
    pub fn events_of(&self, channel: Address) -> impl Iterator<Item = &ChannelEvent> {
        self.logs
            .iter()
            .filter(move |log| log.channel == channel)
            .map(|log| &log.event)
    }

    fn asset_balance(&self, asset: Address, account: Address) -> Amount {
        self.ledger
            .balances
            .get(&(asset, account))
            .copied()
            .unwrap_or_default()
    }

    fn native_balance(&self, account: Address) -> Amount {
        self.ledger.native.get(&account).copied().unwrap_or_default()
    }
}

/// Debits `from` and credits `to` in `book`, or changes nothing.
fn move_between<K: Copy + Eq + std::hash::Hash>(
    book: &mut HashMap<K, Amount>,
    account: Address,
    from: K,
    to: K,
    amount: Amount,
) -> Result<(), PortError> {
    let available = book.get(&from).copied().unwrap_or_default();
    let debited = available
        .checked_sub(amount)
        .map_err(|_| PortError::InsufficientBalance {
            account,
            available,
            required: amount,
        })?;
    if from == to {
        return Ok(());
    }
    let credited = book
        .get(&to)
        .copied()
        .unwrap_or_default()
        .checked_add(amount)?;
    book.insert(from, debited);
    book.insert(to, credited);
    Ok(())
}

impl AssetTransferPort for MemoryHost {
    fn balance_of(&self, asset: Address, account: Address) -> Result<Amount, PortError> {
        Ok(self.asset_balance(asset, account))
    }

    fn transfer(
        &mut self,
        asset: Address,
        from: Address,
        to: Address,
        amount: Amount,
    ) -> Result<(), PortError> {
        move_between(
            &mut self.ledger.balances,
            from,
            (asset, from),
            (asset, to),
            amount,
        )
    }
}

impl NativeCurrencyPort for MemoryHost {
    fn native_balance_of(&self, account: Address) -> Result<Amount, PortError> {
        Ok(self.native_balance(account))
    }

    fn send_native(
        &mut self,
        from: Address,
        to: Address,
        amount: Amount,
    ) -> Result<(), PortError> {
        move_between(&mut self.ledger.native, from, from, to, amount)
    }
}

impl IntermediaryPort for MemoryHost {
    fn operator_of(&self, intermediary: Address) -> Result<Address, PortError> {
        self.ledger
            .intermediaries
            .get(&intermediary)
            .copied()
            .ok_or(PortError::UnknownIntermediary(intermediary))
    }
}

impl DexPort for MemoryHost {
    fn swap_native_for_asset(
        &mut self,
        dex: Address,
        payer: Address,
        value: Amount,
        min_out: Amount,
        recipient: Address,
    ) -> Result<Amount, PortError> {
        let pool = self
            .ledger
            .pools
            .get(&dex)
            .copied()
            .ok_or(PortError::UnknownDex(dex))?;
        let bought = value.checked_mul(pool.rate)?;
        if bought < min_out {
            return Err(PortError::Rejected(format!(
                "swap output {bought} below minimum {min_out}"
            )));
        }
        // Both legs are validated before either is applied.
        let mut ledger = self.ledger.clone();
        move_between(&mut ledger.native, payer, payer, dex, value)?;
        move_between(
            &mut ledger.balances,
            dex,
            (pool.asset, dex),
            (pool.asset, recipient),
            bought,
        )?;
        self.ledger = ledger;
        Ok(bought)
    }
}

impl EventSink for MemoryHost {
    fn emit(&mut self, channel: Address, event: ChannelEvent) {
        self.logs.push(ChannelLog {
            channel,
            block: self.block,
            event,
        });
    }
}

impl Journal for MemoryHost {
    type Checkpoint = MemoryCheckpoint;

    fn checkpoint(&mut self) -> MemoryCheckpoint {
        MemoryCheckpoint(self.ledger.clone())
    }

    fn revert_to(&mut self, checkpoint: MemoryCheckpoint) {
        self.ledger = checkpoint.0;
    }
}

impl ChannelHost for MemoryHost {
    fn block_number(&self) -> BlockNumber {
        self.block
    }
}
