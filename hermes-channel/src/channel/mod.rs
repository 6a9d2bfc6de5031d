//! The channel state machine.
//!
//! A [`ChannelStateMachine`] owns the [`ChannelState`] of one channel and
//! drives every transition on it. Value never lives inside the machine: it is
//! read and moved through a [`ChannelHost`] passed to each operation.
//!
//! # Atomicity
//!
//! Each mutating operation runs as a transaction. It edits a draft copy of the
//! state, takes a host [`Journal`](crate::port::Journal) checkpoint before any
//! external call and buffers its events. On success the draft replaces the
//! state and the events reach the host's [`EventSink`](crate::port::EventSink);
//! on failure the host is reverted and nothing is kept.
//!
//! # Reentrancy
//!
//! The state is guarded by a non-blocking lock held for the whole operation.
//! A call back into the same channel from inside a host call (for example an
//! asset contract reacting to a transfer) fails with
//! [`ChannelError::ReentrantCall`]. The machine does not queue callers: hosts
//! serialize operations on a channel themselves.
//!
//! # Example
//!
//! ```rust
//! use alloy_primitives::address;
//! use hermes_channel::amount::Amount;
//! use hermes_channel::channel::{ChannelParams, ChannelStateMachine};
//! use hermes_channel::config::ChannelConfig;
//! use hermes_channel::memory::MemoryHost;
//! use hermes_channel::port::CallContext;
//! use hermes_channel::state::ChannelPhase;
//!
//! let channel_address = address!("0x00000000000000000000000000000000000c4a11");
//! let hermes = address!("0x000000000000000000000000000000000000e4e5");
//! let identity = address!("0x00000000000000000000000000000000000a11ce");
//!
//! let mut host = MemoryHost::new();
//! host.register_intermediary(hermes, address!("0x0000000000000000000000000000000000000b0b"));
//!
//! let channel = ChannelStateMachine::new(channel_address, ChannelConfig::default()).unwrap();
//! channel
//!     .initialize(
//!         &mut host,
//!         CallContext::new(identity),
//!         ChannelParams {
//!             token: address!("0x0000000000000000000000000000000000007070"),
//!             dex: address!("0x0000000000000000000000000000000000000de5"),
//!             identity,
//!             intermediary: hermes,
//!             fee: Amount::ZERO,
//!         },
//!     )
//!     .unwrap();
//! assert_eq!(channel.phase().unwrap(), ChannelPhase::Open);
//! ```

mod exit;
mod recovery;
mod settle;

pub use settle::Settlement;

use std::sync::{Mutex, MutexGuard, TryLockError};

use alloy_primitives::Address;
use serde::{Deserialize, Serialize};

#[cfg(feature = "telemetry")]
use tracing::instrument;
#[cfg(feature = "telemetry")]
use tracing_core::Level;

use crate::amount::{Amount, AmountError};
use crate::block::BlockNumber;
use crate::config::ChannelConfig;
use crate::error::ChannelError;
use crate::event::ChannelEvent;
use crate::port::{CallContext, ChannelHost};
use crate::state::{ChannelPhase, ChannelState, IntermediaryRef};

/// Minimum amount of asset a native top-up must buy.
const MIN_SWAP_OUTPUT: u64 = 1;

/// Arguments of [`ChannelStateMachine::initialize`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelParams {
    /// Asset managed by the channel.
    pub token: Address,
    /// Exchange used for native-currency top-ups.
    pub dex: Address,
    /// Identity that becomes operator and owner of the channel.
    pub identity: Address,
    /// Intermediary contract the channel settles into.
    pub intermediary: Address,
    /// Amount of `token` paid from the channel to the caller.
    pub fee: Amount,
}

/// Settlement and exit logic of a single payment channel.
#[derive(Debug)]
pub struct ChannelStateMachine {
    address: Address,
    config: ChannelConfig,
    state: Mutex<ChannelState>,
}

impl ChannelStateMachine {
    /// Creates an uninitialized channel deployed at `address`.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::InvalidArgument`] if `address` is zero or the
    /// configuration is invalid.
    pub fn new(address: Address, config: ChannelConfig) -> Result<Self, ChannelError> {
        if address == Address::ZERO {
            return Err(ChannelError::InvalidArgument("channel address must be non-zero"));
        }
        config.validate()?;
        Ok(Self {
            address,
            config,
            state: Mutex::new(ChannelState::default()),
        })
    }

    /// Address of the channel; the account holding its funds.
    #[must_use]
    pub const fn address(&self) -> Address {
        self.address
    }

    /// Returns the channel configuration.
    #[must_use]
    pub const fn config(&self) -> &ChannelConfig {
        &self.config
    }

    /// Returns a copy of the current state.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::ReentrantCall`] while an operation is running.
    pub fn snapshot(&self) -> Result<ChannelState, ChannelError> {
        Ok(self.lock()?.clone())
    }

    /// Returns the lifecycle phase.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::ReentrantCall`] while an operation is running.
    pub fn phase(&self) -> Result<ChannelPhase, ChannelError> {
        Ok(self.lock()?.phase())
    }

    /// Returns `true` once the channel has an operator.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::ReentrantCall`] while an operation is running.
    pub fn is_initialized(&self) -> Result<bool, ChannelError> {
        Ok(self.lock()?.is_initialized())
    }

    /// Returns the timelock an exit requested at `block` would get.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::Arithmetic`] if the block height overflows.
    pub fn timelock_for(&self, block: BlockNumber) -> Result<BlockNumber, ChannelError> {
        block
            .checked_add(self.config.delay_blocks)
            .ok_or(ChannelError::Arithmetic(AmountError::ArithmeticOverflow))
    }

    /// Binds the channel to its asset, exchange, operator and intermediary.
    ///
    /// Pays `params.fee` from the channel balance to the caller when non-zero,
    /// and records the intermediary's signer as reported by the intermediary.
    ///
    /// # Errors
    ///
    /// - [`ChannelError::AlreadyInitialized`] on any second call
    /// - [`ChannelError::InvalidArgument`] for a zero token, identity or intermediary
    /// - [`ChannelError::TransferRejected`] if the fee cannot be paid
    /// - [`ChannelError::IntermediaryUnavailable`] if the intermediary has no operator
    #[cfg_attr(feature = "telemetry", instrument(skip_all, err, fields(
        channel = %self.address,
        identity = %params.identity,
        intermediary = %params.intermediary,
    )))]
    pub fn initialize<H: ChannelHost>(
        &self,
        host: &mut H,
        ctx: CallContext,
        params: ChannelParams,
    ) -> Result<(), ChannelError> {
        self.transact(host, |tx| {
            if tx.state.is_initialized() {
                return Err(ChannelError::AlreadyInitialized);
            }
            if params.token == Address::ZERO {
                return Err(ChannelError::InvalidArgument("token must be non-zero"));
            }
            if params.identity == Address::ZERO {
                return Err(ChannelError::InvalidArgument("identity must be non-zero"));
            }
            if params.intermediary == Address::ZERO {
                return Err(ChannelError::InvalidArgument("intermediary must be non-zero"));
            }

            if !params.fee.is_zero() {
                tx.pay(params.token, ctx.caller, params.fee)?;
            }
            let hermes_operator = tx
                .host
                .operator_of(params.intermediary)
                .map_err(ChannelError::IntermediaryUnavailable)?;

            tx.state.token = params.token;
            tx.state.dex = params.dex;
            tx.state.operator = params.identity;
            tx.state.owner = params.identity;
            tx.state.intermediary = IntermediaryRef {
                operator_address: hermes_operator,
                settlement_target: params.intermediary,
                total_settled: Amount::ZERO,
            };
            tx.emit(ChannelEvent::OwnershipTransferred {
                previous: Address::ZERO,
                next: params.identity,
            });
            tx.emit(ChannelEvent::ChannelInitialised {
                operator: params.identity,
                intermediary: params.intermediary,
            });

            #[cfg(feature = "telemetry")]
            tracing::event!(Level::INFO,
                hermes_operator = %hermes_operator,
                fee = %params.fee,
                "channel initialized"
            );
            Ok(())
        })
    }

    /// Converts the native currency attached to the call into the channel's
    /// asset through the bound exchange, crediting the channel.
    ///
    /// Returns the amount of asset bought.
    ///
    /// # Errors
    ///
    /// - [`ChannelError::NotInitialized`] before initialization
    /// - [`ChannelError::TransferRejected`] if the payment or swap fails,
    ///   including when the swap would buy nothing
    #[cfg_attr(feature = "telemetry", instrument(skip_all, err, fields(
        channel = %self.address,
        caller = %ctx.caller,
        value = %ctx.value,
    )))]
    pub fn receive_native<H: ChannelHost>(
        &self,
        host: &mut H,
        ctx: CallContext,
    ) -> Result<Amount, ChannelError> {
        self.transact(host, |tx| {
            tx.require_initialized()?;
            let channel = tx.channel;
            let dex = tx.state.dex;
            tx.host.send_native(ctx.caller, channel, ctx.value)?;
            let bought = tx.host.swap_native_for_asset(
                dex,
                channel,
                ctx.value,
                Amount::from(MIN_SWAP_OUTPUT),
                channel,
            )?;

            #[cfg(feature = "telemetry")]
            tracing::event!(Level::INFO, bought = %bought, "native top-up swapped");
            Ok(bought)
        })
    }

    /// Recipient hook for push-style asset transfers.
    ///
    /// Accepts every notification and changes nothing, so the channel is a
    /// valid recipient of the managed asset.
    #[allow(clippy::unused_self)]
    pub const fn tokens_received(
        &self,
        _operator: Address,
        _from: Address,
        _to: Address,
        _amount: Amount,
        _user_data: &[u8],
        _operator_data: &[u8],
    ) {
    }

    fn lock(&self) -> Result<MutexGuard<'_, ChannelState>, ChannelError> {
        match self.state.try_lock() {
            Ok(guard) => Ok(guard),
            // Commits are a single assignment, so a poisoned state is still consistent.
            Err(TryLockError::Poisoned(poisoned)) => Ok(poisoned.into_inner()),
            Err(TryLockError::WouldBlock) => Err(ChannelError::ReentrantCall),
        }
    }

    /// Runs `op` as one all-or-nothing transaction against `host`.
    fn transact<H, T, F>(&self, host: &mut H, op: F) -> Result<T, ChannelError>
    where
        H: ChannelHost,
        F: FnOnce(&mut Tx<'_, H>) -> Result<T, ChannelError>,
    {
        let mut state = self.lock()?;
        let checkpoint = host.checkpoint();
        let mut tx = Tx {
            host,
            channel: self.address,
            config: self.config,
            state: state.clone(),
            events: Vec::new(),
        };
        let outcome = op(&mut tx);
        let Tx {
            host,
            state: draft,
            events,
            ..
        } = tx;
        match outcome {
            Ok(value) => {
                *state = draft;
                for event in events {
                    host.emit(self.address, event);
                }
                Ok(value)
            }
            Err(err) => {
                host.revert_to(checkpoint);
                Err(err)
            }
        }
    }
}

/// A running operation: the host, a draft of the state and buffered events.
struct Tx<'h, H> {
    host: &'h mut H,
    channel: Address,
    config: ChannelConfig,
    state: ChannelState,
    events: Vec<ChannelEvent>,
}

impl<H: ChannelHost> Tx<'_, H> {
    fn emit(&mut self, event: ChannelEvent) {
        self.events.push(event);
    }

    fn require_initialized(&self) -> Result<(), ChannelError> {
        if self.state.is_initialized() {
            Ok(())
        } else {
            Err(ChannelError::NotInitialized)
        }
    }

    fn require_owner(&self, caller: Address) -> Result<(), ChannelError> {
        self.require_initialized()?;
        if caller == self.state.owner {
            Ok(())
        } else {
            Err(ChannelError::NotOwner(caller))
        }
    }

    /// Balance of `asset` held by the channel.
    fn balance(&self, asset: Address) -> Result<Amount, ChannelError> {
        Ok(self.host.balance_of(asset, self.channel)?)
    }

    /// Sends `amount` of `asset` from the channel to `to`.
    fn pay(&mut self, asset: Address, to: Address, amount: Amount) -> Result<(), ChannelError> {
        self.host.transfer(asset, self.channel, to, amount)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::{AssetTransferPort, NativeCurrencyPort};
    use crate::testing::{
        CHANNEL, DEX, HERMES, REGISTRY, TOKEN, ScriptedHost, host, hermes_key, open_channel,
        operator_key, params, stranger_key,
    };
    use alloy_primitives::address;
    use std::sync::Arc;

    #[test]
    fn test_new_rejects_zero_address_and_short_delay() {
        assert!(matches!(
            ChannelStateMachine::new(Address::ZERO, ChannelConfig::default()),
            Err(ChannelError::InvalidArgument(_))
        ));
        assert!(matches!(
            ChannelStateMachine::new(CHANNEL, ChannelConfig::default().with_delay_blocks(0)),
            Err(ChannelError::InvalidArgument(_))
        ));
        assert!(matches!(
            ChannelStateMachine::new(CHANNEL, ChannelConfig::default().with_delay_blocks(1)),
            Err(ChannelError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_initialize_records_bindings() {
        let channel = ChannelStateMachine::new(CHANNEL, ChannelConfig::default()).unwrap();
        let mut host = host();
        assert_eq!(channel.phase().unwrap(), ChannelPhase::Uninitialized);
        channel
            .initialize(&mut host, CallContext::new(REGISTRY), params())
            .unwrap();

        let state = channel.snapshot().unwrap();
        assert_eq!(state.token, TOKEN);
        assert_eq!(state.dex, DEX);
        assert_eq!(state.operator, operator_key().address());
        assert_eq!(state.owner, operator_key().address());
        assert_eq!(state.intermediary.operator_address, hermes_key().address());
        assert_eq!(state.intermediary.settlement_target, HERMES);
        assert_eq!(state.intermediary.total_settled, Amount::ZERO);
        assert!(channel.is_initialized().unwrap());

        let events: Vec<_> = host.events_of(CHANNEL).copied().collect();
        assert_eq!(
            events,
            vec![
                ChannelEvent::OwnershipTransferred {
                    previous: Address::ZERO,
                    next: operator_key().address(),
                },
                ChannelEvent::ChannelInitialised {
                    operator: operator_key().address(),
                    intermediary: HERMES,
                },
            ]
        );
    }

    #[test]
    fn test_initialize_is_exactly_once() {
        let (channel, mut host) = open_channel(0);
        let mut other = params();
        other.identity = stranger_key().address();
        assert_eq!(
            channel.initialize(&mut host, CallContext::new(REGISTRY), other),
            Err(ChannelError::AlreadyInitialized)
        );
        assert_eq!(channel.snapshot().unwrap().operator, operator_key().address());
    }

    #[test]
    fn test_initialize_rejects_zero_addresses() {
        let channel = ChannelStateMachine::new(CHANNEL, ChannelConfig::default()).unwrap();
        let mut host = host();
        let patches: [fn(&mut ChannelParams); 3] = [
            |p| p.token = Address::ZERO,
            |p| p.identity = Address::ZERO,
            |p| p.intermediary = Address::ZERO,
        ];
        for patch in patches {
            let mut bad = params();
            patch(&mut bad);
            assert!(matches!(
                channel.initialize(&mut host, CallContext::new(REGISTRY), bad),
                Err(ChannelError::InvalidArgument(_))
            ));
        }
        assert!(!channel.is_initialized().unwrap());
    }

    #[test]
    fn test_initialize_pays_fee_to_caller() {
        let channel = ChannelStateMachine::new(CHANNEL, ChannelConfig::default()).unwrap();
        let mut host = host();
        host.mint(TOKEN, CHANNEL, Amount::from(50)).unwrap();
        let mut with_fee = params();
        with_fee.fee = Amount::from(20);
        channel
            .initialize(&mut host, CallContext::new(REGISTRY), with_fee)
            .unwrap();
        assert_eq!(host.balance_of(TOKEN, REGISTRY).unwrap(), Amount::from(20));
        assert_eq!(host.balance_of(TOKEN, CHANNEL).unwrap(), Amount::from(30));
    }

    #[test]
    fn test_initialize_unknown_intermediary_rolls_back_fee() {
        let channel = ChannelStateMachine::new(CHANNEL, ChannelConfig::default()).unwrap();
        let mut host = host();
        host.mint(TOKEN, CHANNEL, Amount::from(50)).unwrap();
        let mut bad = params();
        bad.fee = Amount::from(20);
        bad.intermediary = address!("0x0000000000000000000000000000000000000bad");

        let err = channel
            .initialize(&mut host, CallContext::new(REGISTRY), bad)
            .unwrap_err();
        assert!(matches!(err, ChannelError::IntermediaryUnavailable(_)));
        assert_eq!(host.balance_of(TOKEN, CHANNEL).unwrap(), Amount::from(50));
        assert_eq!(host.balance_of(TOKEN, REGISTRY).unwrap(), Amount::ZERO);
        assert!(host.logs().is_empty());
        assert!(!channel.is_initialized().unwrap());
    }

    #[test]
    fn test_operations_require_initialization() {
        let channel = ChannelStateMachine::new(CHANNEL, ChannelConfig::default()).unwrap();
        let mut host = host();
        let ctx = CallContext::new(REGISTRY);
        assert_eq!(channel.finalize_exit(&mut host), Err(ChannelError::NotInitialized));
        assert_eq!(channel.claim_native(&mut host, ctx), Err(ChannelError::NotInitialized));
        assert_eq!(
            channel.receive_native(&mut host, ctx),
            Err(ChannelError::NotInitialized)
        );
    }

    #[test]
    fn test_tokens_received_is_inert() {
        let channel = ChannelStateMachine::new(CHANNEL, ChannelConfig::default()).unwrap();
        channel.tokens_received(REGISTRY, REGISTRY, CHANNEL, Amount::from(5), b"", b"data");
        assert_eq!(channel.snapshot().unwrap(), ChannelState::default());
    }

    #[test]
    fn test_receive_native_swaps_into_channel() {
        let (channel, mut host) = open_channel(0);
        host.credit_native(REGISTRY, Amount::from(10)).unwrap();
        let ctx = CallContext::new(REGISTRY).with_value(Amount::from(10));

        let bought = channel.receive_native(&mut host, ctx).unwrap();
        assert_eq!(bought, Amount::from(20));
        assert_eq!(host.balance_of(TOKEN, CHANNEL).unwrap(), Amount::from(20));
        assert_eq!(host.native_balance_of(CHANNEL).unwrap(), Amount::ZERO);
        assert_eq!(host.native_balance_of(DEX).unwrap(), Amount::from(10));
    }

    #[test]
    fn test_receive_native_without_value_fails() {
        let (channel, mut host) = open_channel(0);
        let err = channel
            .receive_native(&mut host, CallContext::new(REGISTRY))
            .unwrap_err();
        assert!(matches!(err, ChannelError::TransferRejected(_)));
    }

    #[test]
    fn test_timelock_for() {
        let channel = ChannelStateMachine::new(CHANNEL, ChannelConfig::default()).unwrap();
        assert_eq!(
            channel.timelock_for(BlockNumber::new(100)).unwrap(),
            BlockNumber::new(18_100)
        );
        assert!(channel.timelock_for(BlockNumber::new(u64::MAX)).is_err());
    }

    #[test]
    fn test_reentrant_call_is_rejected() {
        let (channel, inner) = open_channel(1000);
        let channel = Arc::new(channel);
        let mut host = ScriptedHost::new(inner);
        let ctx = CallContext::new(operator_key().address());
        channel
            .set_funds_destination(&mut host, ctx, REGISTRY)
            .unwrap();
        let stray = address!("0x0000000000000000000000000000000000000a5e");
        host.inner.mint(stray, CHANNEL, Amount::from(5)).unwrap();
        host.reenter = Some(Arc::clone(&channel));

        let claimed = channel.claim_tokens(&mut host, ctx, stray).unwrap();
        assert_eq!(claimed, Amount::from(5));
        assert_eq!(host.reentry_results, vec![Err(ChannelError::ReentrantCall)]);
        assert_eq!(host.inner.balance_of(stray, REGISTRY).unwrap(), Amount::from(5));
        assert_eq!(host.inner.balance_of(TOKEN, CHANNEL).unwrap(), Amount::from(1000));
    }

    #[test]
    fn test_failed_operation_reverts_host() {
        let (channel, inner) = open_channel(1000);
        let mut host = ScriptedHost::new(inner);
        let ctx = CallContext::new(operator_key().address());
        channel
            .set_funds_destination(&mut host, ctx, REGISTRY)
            .unwrap();
        host.inner.credit_native(CHANNEL, Amount::from(3)).unwrap();
        host.reject_native = true;
        let logs_before = host.inner.logs().len();

        let err = channel.claim_native(&mut host, ctx).unwrap_err();
        assert!(matches!(err, ChannelError::TransferRejected(_)));
        assert_eq!(host.inner.native_balance_of(CHANNEL).unwrap(), Amount::from(3));
        assert_eq!(host.inner.logs().len(), logs_before);
        assert_eq!(host.reverts, 1);
    }
}
