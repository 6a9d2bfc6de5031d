//! Signed channel messages.
//!
//! The channel operator authorizes three kinds of messages off-chain:
//!
//! - [`Promise`] — a cumulative amount owed to the intermediary, settled with
//!   [`settle_promise`](crate::channel::ChannelStateMachine::settle_promise)
//! - [`ExitAuthorization`] — permission for a third party to start an exit
//! - [`DestinationCheque`] — a nonce-guarded change of the funds destination
//!
//! Each message hashes to a 32-byte digest via `keccak256(abi.encodePacked(..))`,
//! and travels inside a [`Signed`] envelope. [`Signed::verify`] recovers the
//! signer into a [`Verified`] principal, which an operation then checks against
//! the channel operator with [`Verified::require_signer`].

use alloy_primitives::{Address, B256, Bytes, U256, keccak256};
use alloy_sol_types::SolValue;
use serde::{Deserialize, Serialize};

use crate::amount::Amount;
use crate::block::BlockNumber;
use crate::error::ChannelError;
use crate::signature::{self, MessageFormat, SignatureError};

/// Domain prefix of an exit authorization.
pub const EXIT_PREFIX: &str = "Exit request:";

/// Domain prefix of a funds-destination cheque.
pub const FUNDS_DESTINATION_PREFIX: &str = "Set funds destination:";

/// A message the channel operator can sign.
pub trait ChannelMessage {
    /// Returns the keccak256 hash of the packed message for `channel`.
    fn message_hash(&self, channel: Address) -> B256;

    /// Returns the digest the operator signs under `format`.
    fn digest(&self, channel: Address, format: MessageFormat) -> B256 {
        format.digest(self.message_hash(channel))
    }
}

/// An off-chain payment promise.
///
/// `amount` is cumulative: it is the total owed over the channel's lifetime,
/// not an increment. Only the part above what was already settled is paid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Promise {
    /// Total amount owed to the intermediary.
    pub amount: Amount,
    /// Fee paid to whoever submits the settlement.
    pub transactor_fee: Amount,
    /// Hash-lock preimage revealed at settlement.
    pub lock: B256,
}

impl Promise {
    /// Returns the hash-lock committed to in the signed digest.
    #[must_use]
    pub fn hashlock(&self) -> B256 {
        keccak256(self.lock)
    }
}

impl ChannelMessage for Promise {
    fn message_hash(&self, channel: Address) -> B256 {
        let packed = (
            channel,
            self.amount.as_u256(),
            self.transactor_fee.as_u256(),
            self.hashlock(),
        )
            .abi_encode_packed();
        keccak256(packed)
    }
}

/// Permission to request an exit on the operator's behalf.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExitAuthorization {
    /// Address receiving the channel balance when the exit is finalized.
    pub beneficiary: Address,
    /// Last block at which this authorization may be used.
    pub valid_until: BlockNumber,
}

impl ChannelMessage for ExitAuthorization {
    fn message_hash(&self, channel: Address) -> B256 {
        let packed = (
            EXIT_PREFIX.to_owned(),
            channel,
            self.beneficiary,
            U256::from(self.valid_until.as_u64()),
        )
            .abi_encode_packed();
        keccak256(packed)
    }
}

/// A nonce-guarded request to change the funds destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DestinationCheque {
    /// New funds destination.
    pub destination: Address,
    /// Must be greater than the last nonce the channel accepted.
    pub nonce: u64,
}

impl ChannelMessage for DestinationCheque {
    fn message_hash(&self, _channel: Address) -> B256 {
        let packed = (
            FUNDS_DESTINATION_PREFIX.to_owned(),
            self.destination,
            U256::from(self.nonce),
        )
            .abi_encode_packed();
        keccak256(packed)
    }
}

/// A message together with its 65-byte `r ‖ s ‖ v` signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signed<M> {
    /// The signed message.
    #[serde(flatten)]
    pub message: M,
    /// Signature over the message digest. Empty when the caller needs none.
    #[serde(default)]
    pub signature: Bytes,
}

impl<M> Signed<M> {
    /// Pairs a message with a signature.
    #[must_use]
    pub const fn new(message: M, signature: Bytes) -> Self {
        Self { message, signature }
    }
}

impl<M: ChannelMessage> Signed<M> {
    /// Recovers the signer of this message for `channel`.
    ///
    /// # Errors
    ///
    /// Returns [`SignatureError`] if the signature is malformed or malleable.
    pub fn verify(
        &self,
        channel: Address,
        format: MessageFormat,
    ) -> Result<Verified<'_, M>, SignatureError> {
        let digest = self.message.digest(channel, format);
        let signer = signature::recover(&digest, &self.signature)?;
        Ok(Verified {
            message: &self.message,
            signer,
        })
    }
}

#[cfg(feature = "client")]
impl<M: ChannelMessage> Signed<M> {
    /// Signs `message` for `channel` with a local private key.
    ///
    /// # Errors
    ///
    /// Returns [`alloy_signer::Error`] if signing fails.
    pub fn sign(
        message: M,
        channel: Address,
        format: MessageFormat,
        signer: &alloy_signer_local::PrivateKeySigner,
    ) -> Result<Self, alloy_signer::Error> {
        use alloy_signer::SignerSync;

        let digest = message.digest(channel, format);
        let signature = signer.sign_hash_sync(&digest)?;
        Ok(Self {
            message,
            signature: Bytes::copy_from_slice(&signature.as_bytes()),
        })
    }
}

/// A message whose signer has been recovered.
///
/// Only [`Signed::verify`] constructs this type, so holding one proves the
/// signature was well formed.
#[derive(Debug, Clone, Copy)]
pub struct Verified<'a, M> {
    message: &'a M,
    signer: Address,
}

impl<'a, M> Verified<'a, M> {
    /// Returns the recovered signer.
    #[must_use]
    pub const fn signer(&self) -> Address {
        self.signer
    }

    /// Returns the verified message.
    #[must_use]
    pub const fn message(&self) -> &'a M {
        self.message
    }

    /// Returns the message if it was signed by `expected`.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::UnauthorizedSigner`] for any other signer.
    pub fn require_signer(self, expected: Address) -> Result<&'a M, ChannelError> {
        if self.signer == expected {
            Ok(self.message)
        } else {
            Err(ChannelError::UnauthorizedSigner {
                expected,
                actual: self.signer,
            })
        }
    }
}
