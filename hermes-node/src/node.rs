//! The hosted channel and the ledger it runs on.

use std::collections::HashMap;

use alloy_primitives::Address;
use hermes_channel::block::BlockNumber;
use hermes_channel::channel::ChannelStateMachine;
use hermes_channel::error::ChannelError;
use hermes_channel::memory::{DexPool, MemoryHost};
use hermes_channel::message::Signed;

use crate::auth::{CallArgs, Caller, NodeCall};
use crate::config::NodeConfig;

/// One channel together with its in-memory ledger.
#[derive(Debug)]
pub struct ChannelNode {
    channel: ChannelStateMachine,
    host: MemoryHost,
    call_nonces: HashMap<Address, u64>,
}

impl ChannelNode {
    /// Builds the ledger described by `config` and deploys an uninitialized
    /// channel on it.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::InvalidArgument`] for a zero channel address or
    /// an invalid channel configuration.
    pub fn from_config(config: &NodeConfig) -> Result<Self, ChannelError> {
        let channel = ChannelStateMachine::new(config.channel_address, config.channel)?;
        let mut host = MemoryHost::at_block(BlockNumber::new(config.start_block));
        for intermediary in &config.intermediaries {
            host.register_intermediary(intermediary.address, intermediary.operator);
        }
        for pool in &config.pools {
            host.register_pool(
                pool.dex,
                DexPool {
                    asset: pool.asset,
                    rate: pool.rate,
                },
            );
        }
        Ok(Self {
            channel,
            host,
            call_nonces: HashMap::new(),
        })
    }

    /// Returns the hosted channel.
    #[must_use]
    pub const fn channel(&self) -> &ChannelStateMachine {
        &self.channel
    }

    /// Returns the ledger.
    #[must_use]
    pub const fn host(&self) -> &MemoryHost {
        &self.host
    }

    /// Recovers the signer of `call` and checks its nonce.
    ///
    /// The nonce is only recorded by [`consume`](Self::consume), so a call
    /// whose operation fails can be resubmitted.
    ///
    /// # Errors
    ///
    /// - [`ChannelError::InvalidSignature`] for a malformed signature
    /// - [`ChannelError::StaleNonce`] if the signer already used the nonce or a later one
    pub fn authenticate<A: CallArgs>(
        &self,
        call: &Signed<NodeCall<A>>,
    ) -> Result<Caller, ChannelError> {
        let signer = call
            .verify(self.channel.address(), self.channel.config().message_format)?
            .signer();
        let nonce = call.message.nonce;
        let last = self.call_nonces.get(&signer).copied().unwrap_or_default();
        if nonce <= last {
            return Err(ChannelError::StaleNonce { nonce, last });
        }
        Ok(Caller {
            address: signer,
            nonce,
        })
    }

    /// Records the nonce of a call that went through.
    pub fn consume(&mut self, caller: Caller) {
        self.call_nonces.insert(caller.address, caller.nonce);
    }

    /// Returns the channel and mutable access to the ledger, as channel
    /// operations need both.
    pub const fn split(&mut self) -> (&ChannelStateMachine, &mut MemoryHost) {
        (&self.channel, &mut self.host)
    }
}
