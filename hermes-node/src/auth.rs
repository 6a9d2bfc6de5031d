//! Caller authentication for endpoints acting on the caller's authority.
//!
//! The in-memory ledger has no transaction senders, so a request that merely
//! names its caller proves nothing. Owner-gated endpoints and the native
//! top-up instead take a [`NodeCall`] signed by the caller: the recovered
//! signer becomes the caller, and a per-signer nonce that must strictly
//! increase stops a call from being replayed.
//!
//! The digest is
//! `keccak256(abi.encodePacked("Hermes node call:", channel, action, uint256(nonce), keccak256(args)))`,
//! signed under the channel's [`MessageFormat`](hermes_channel::signature::MessageFormat).

use alloy_primitives::{Address, B256, U256, keccak256};
use alloy_sol_types::SolValue;
use hermes_channel::amount::Amount;
use hermes_channel::message::ChannelMessage;
use hermes_channel::port::CallContext;
use serde::{Deserialize, Serialize};

/// Domain prefix of a signed node call.
pub const CALL_PREFIX: &str = "Hermes node call:";

/// Arguments of an authenticated endpoint.
pub trait CallArgs {
    /// Name of the action, bound into the signed digest.
    const ACTION: &'static str;

    /// Returns the packed encoding of the arguments.
    fn packed(&self) -> Vec<u8>;
}

/// An authenticated call: the endpoint arguments plus the signer's nonce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeCall<A> {
    /// Endpoint arguments.
    #[serde(flatten)]
    pub args: A,
    /// Must exceed the last nonce the node accepted from the same signer.
    pub nonce: u64,
}

impl<A: CallArgs> ChannelMessage for NodeCall<A> {
    fn message_hash(&self, channel: Address) -> B256 {
        let packed = (
            CALL_PREFIX.to_owned(),
            channel,
            A::ACTION.to_owned(),
            U256::from(self.nonce),
            keccak256(self.args.packed()),
        )
            .abi_encode_packed();
        keccak256(packed)
    }
}

/// A caller whose signature checked out, pending nonce consumption.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caller {
    /// Recovered signer.
    pub address: Address,
    /// Nonce of the call.
    pub nonce: u64,
}

impl Caller {
    /// Returns the call context for the channel.
    #[must_use]
    pub const fn context(&self) -> CallContext {
        CallContext::new(self.address)
    }
}

/// Arguments of `POST /channel/destination`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DestinationArgs {
    /// New funds destination.
    pub destination: Address,
}

impl CallArgs for DestinationArgs {
    const ACTION: &'static str = "setFundsDestination";

    fn packed(&self) -> Vec<u8> {
        self.destination.abi_encode_packed()
    }
}

/// Arguments of `POST /channel/claim/tokens`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimTokensArgs {
    /// Asset to recover.
    pub asset: Address,
}

impl CallArgs for ClaimTokensArgs {
    const ACTION: &'static str = "claimTokens";

    fn packed(&self) -> Vec<u8> {
        self.asset.abi_encode_packed()
    }
}

/// Arguments of `POST /channel/claim/native`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimNativeArgs {}

impl CallArgs for ClaimNativeArgs {
    const ACTION: &'static str = "claimNative";

    fn packed(&self) -> Vec<u8> {
        Vec::new()
    }
}

/// Arguments of `POST /channel/ownership`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnershipArgs {
    /// Owner to hand over to.
    pub new_owner: Address,
}

impl CallArgs for OwnershipArgs {
    const ACTION: &'static str = "transferOwnership";

    fn packed(&self) -> Vec<u8> {
        self.new_owner.abi_encode_packed()
    }
}

/// Arguments of `POST /channel/fund`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FundArgs {
    /// Native currency the signer pays.
    pub value: Amount,
}

impl CallArgs for FundArgs {
    const ACTION: &'static str = "fund";

    fn packed(&self) -> Vec<u8> {
        self.value.as_u256().abi_encode_packed()
    }
}
