//! Shared fixtures for unit tests.

use std::sync::Arc;

use alloy_primitives::{Address, Bytes, address, b256};
use alloy_signer::SignerSync;
use alloy_signer_local::PrivateKeySigner;

use crate::amount::Amount;
use crate::block::BlockNumber;
use crate::channel::{ChannelParams, ChannelStateMachine};
use crate::config::ChannelConfig;
use crate::error::{ChannelError, PortError};
use crate::event::ChannelEvent;
use crate::memory::{DexPool, MemoryCheckpoint, MemoryHost};
use crate::message::{ChannelMessage, Signed};
use crate::port::{
    AssetTransferPort, CallContext, ChannelHost, DexPort, EventSink, IntermediaryPort, Journal,
    NativeCurrencyPort,
};
use crate::signature::MessageFormat;

pub const CHANNEL: Address = address!("0x00000000000000000000000000000000000c4a11");
pub const TOKEN: Address = address!("0x0000000000000000000000000000000000007070");
pub const DEX: Address = address!("0x0000000000000000000000000000000000000de5");
pub const HERMES: Address = address!("0x000000000000000000000000000000000000e4e5");
pub const REGISTRY: Address = address!("0x0000000000000000000000000000000000005e65");
pub const BENEFICIARY: Address = address!("0x000000000000000000000000000000000000beef");

/// Key of the channel operator (the identity).
pub fn operator_key() -> PrivateKeySigner {
    PrivateKeySigner::from_bytes(&b256!(
        "0x4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318"
    ))
    .unwrap()
}

/// Key of the intermediary's signer.
pub fn hermes_key() -> PrivateKeySigner {
    PrivateKeySigner::from_bytes(&b256!(
        "0x5de4111afa1a4b94908f83103eb1f1706367c2e68ca870fc3fb9a804cdab365a"
    ))
    .unwrap()
}

/// A key unrelated to the channel.
pub fn stranger_key() -> PrivateKeySigner {
    PrivateKeySigner::from_bytes(&b256!(
        "0x59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d"
    ))
    .unwrap()
}

pub fn sign<M: ChannelMessage>(
    message: M,
    channel: Address,
    format: MessageFormat,
    key: &PrivateKeySigner,
) -> Signed<M> {
    let digest = message.digest(channel, format);
    let signature = key.sign_hash_sync(&digest).unwrap();
    Signed::new(message, Bytes::copy_from_slice(&signature.as_bytes()))
}

/// A host with the intermediary deployed and a 1:2 native pool with reserve.
pub fn host() -> MemoryHost {
    let mut host = MemoryHost::new();
    host.register_intermediary(HERMES, hermes_key().address());
    host.register_pool(
        DEX,
        DexPool {
            asset: TOKEN,
            rate: Amount::from(2),
        },
    );
    host.mint(TOKEN, DEX, Amount::from(1_000_000)).unwrap();
    host
}

pub fn params() -> ChannelParams {
    ChannelParams {
        token: TOKEN,
        dex: DEX,
        identity: operator_key().address(),
        intermediary: HERMES,
        fee: Amount::ZERO,
    }
}

/// An initialized channel holding `deposit` units of [`TOKEN`].
pub fn open_channel(deposit: u64) -> (ChannelStateMachine, MemoryHost) {
    open_channel_with(ChannelConfig::default(), deposit)
}

/// Like [`open_channel`], with a custom configuration.
pub fn open_channel_with(config: ChannelConfig, deposit: u64) -> (ChannelStateMachine, MemoryHost) {
    let channel = ChannelStateMachine::new(CHANNEL, config).unwrap();
    let mut host = host();
    channel
        .initialize(&mut host, CallContext::new(REGISTRY), params())
        .unwrap();
    host.mint(TOKEN, CHANNEL, Amount::from(deposit)).unwrap();
    (channel, host)
}

/// Wraps a [`MemoryHost`] with misbehaving collaborators.
pub struct ScriptedHost {
    pub inner: MemoryHost,
    /// Channel to call back into from every asset transfer.
    pub reenter: Option<Arc<ChannelStateMachine>>,
    pub reentry_results: Vec<Result<Amount, ChannelError>>,
    pub reject_native: bool,
    pub reverts: usize,
}

impl ScriptedHost {
    pub fn new(inner: MemoryHost) -> Self {
        Self {
            inner,
            reenter: None,
            reentry_results: Vec::new(),
            reject_native: false,
            reverts: 0,
        }
    }
}

impl AssetTransferPort for ScriptedHost {
    fn balance_of(&self, asset: Address, account: Address) -> Result<Amount, PortError> {
        self.inner.balance_of(asset, account)
    }

    fn transfer(
        &mut self,
        asset: Address,
        from: Address,
        to: Address,
        amount: Amount,
    ) -> Result<(), PortError> {
        if let Some(channel) = self.reenter.clone() {
            let result = channel.finalize_exit(&mut self.inner);
            self.reentry_results.push(result);
        }
        self.inner.transfer(asset, from, to, amount)
    }
}

impl NativeCurrencyPort for ScriptedHost {
    fn native_balance_of(&self, account: Address) -> Result<Amount, PortError> {
        self.inner.native_balance_of(account)
    }

    fn send_native(
        &mut self,
        from: Address,
        to: Address,
        amount: Amount,
    ) -> Result<(), PortError> {
        if self.reject_native {
            return Err(PortError::Rejected("recipient refuses native currency".into()));
        }
        self.inner.send_native(from, to, amount)
    }
}

impl IntermediaryPort for ScriptedHost {
    fn operator_of(&self, intermediary: Address) -> Result<Address, PortError> {
        self.inner.operator_of(intermediary)
    }
}

impl DexPort for ScriptedHost {
    fn swap_native_for_asset(
        &mut self,
        dex: Address,
        payer: Address,
        value: Amount,
        min_out: Amount,
        recipient: Address,
    ) -> Result<Amount, PortError> {
        self.inner
            .swap_native_for_asset(dex, payer, value, min_out, recipient)
    }
}

impl EventSink for ScriptedHost {
    fn emit(&mut self, channel: Address, event: ChannelEvent) {
        self.inner.emit(channel, event);
    }
}

impl Journal for ScriptedHost {
    type Checkpoint = MemoryCheckpoint;

    fn checkpoint(&mut self) -> MemoryCheckpoint {
        self.inner.checkpoint()
    }

    fn revert_to(&mut self, checkpoint: MemoryCheckpoint) {
        self.reverts += 1;
        self.inner.revert_to(checkpoint);
    }
}

impl ChannelHost for ScriptedHost {
    fn block_number(&self) -> BlockNumber {
        self.inner.block_number()
    }
}
