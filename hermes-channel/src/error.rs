//! Error types for channel operations.
//!
//! Every failure aborts the whole operation: no state change and no transfer
//! survives an `Err`. [`ChannelError::reason`] maps each failure to a stable,
//! machine-readable [`ErrorReason`] code for callers that do not want to match
//! on the error itself.

use alloy_primitives::Address;
use serde::{Deserialize, Serialize};

use crate::amount::{Amount, AmountError};
use crate::block::BlockNumber;
use crate::signature::SignatureError;

/// Errors reported by the external collaborators behind a
/// [`ChannelHost`](crate::port::ChannelHost).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PortError {
    /// The sender does not hold enough of the asset.
    #[error("insufficient balance for {account}: have {available}, need {required}")]
    InsufficientBalance {
        /// Account that was debited.
        account: Address,
        /// Its balance at the time of the call.
        available: Amount,
        /// Amount that was requested.
        required: Amount,
    },
    /// No intermediary contract is known at the given address.
    #[error("no intermediary registered at {0}")]
    UnknownIntermediary(Address),
    /// No exchange pool is known for the given exchange address.
    #[error("no exchange pool registered at {0}")]
    UnknownDex(Address),
    /// The callee refused the call for another reason.
    #[error("{0}")]
    Rejected(String),
}

impl From<AmountError> for PortError {
    fn from(e: AmountError) -> Self {
        Self::Rejected(e.to_string())
    }
}

/// Errors returned by [`ChannelStateMachine`](crate::channel::ChannelStateMachine) operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum ChannelError {
    /// `initialize` was called on a channel that already has an operator.
    #[error("channel is already initialized")]
    AlreadyInitialized,
    /// The operation requires an initialized channel.
    #[error("channel is not initialized")]
    NotInitialized,
    /// An argument is the zero address or out of its allowed range.
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),
    /// The signature is well formed but was not produced by the channel operator.
    #[error("message must be signed by channel operator {expected}, got {actual}")]
    UnauthorizedSigner {
        /// The channel operator.
        expected: Address,
        /// The address the signature recovered to.
        actual: Address,
    },
    /// The signature is malformed or malleable.
    #[error(transparent)]
    InvalidSignature(#[from] SignatureError),
    /// Overflow-checked arithmetic failed.
    #[error(transparent)]
    Arithmetic(#[from] AmountError),
    /// The promise does not carry anything beyond what was already settled.
    #[error("amount to settle should be greater than already settled")]
    NothingToSettle,
    /// A new exit was requested while another one is still pending.
    #[error("an exit request is already pending")]
    ExitAlreadyPending,
    /// No exit is pending, or its timelock has not been reached yet.
    #[error("exit is not ready (timelock {timelock:?}, current block {current})")]
    ExitNotReady {
        /// Timelock of the pending exit, if any.
        timelock: Option<BlockNumber>,
        /// Block height at the time of the call.
        current: BlockNumber,
    },
    /// The cheque nonce is not greater than the last accepted one.
    #[error("nonce {nonce} must be greater than last used nonce {last}")]
    StaleNonce {
        /// The rejected nonce.
        nonce: u64,
        /// The last accepted nonce.
        last: u64,
    },
    /// The channel's own asset cannot be pulled out through recovery.
    #[error("the channel's managed asset cannot be recovered")]
    CannotRecoverNativeAsset,
    /// An asset, native-currency or exchange call failed.
    #[error("transfer rejected: {0}")]
    TransferRejected(PortError),
    /// The intermediary contract could not provide its operator.
    #[error("intermediary unavailable: {0}")]
    IntermediaryUnavailable(PortError),
    /// The caller is not the channel owner.
    #[error("caller {0} is not the channel owner")]
    NotOwner(Address),
    /// The channel was called again while an operation on it was running.
    #[error("reentrant call into channel")]
    ReentrantCall,
}

impl From<PortError> for ChannelError {
    fn from(e: PortError) -> Self {
        Self::TransferRejected(e)
    }
}

impl ChannelError {
    /// Returns the machine-readable reason code for this error.
    #[must_use]
    pub const fn reason(&self) -> ErrorReason {
        match self {
            Self::AlreadyInitialized => ErrorReason::AlreadyInitialized,
            Self::NotInitialized => ErrorReason::NotInitialized,
            Self::InvalidArgument(_) => ErrorReason::InvalidArgument,
            Self::UnauthorizedSigner { .. } => ErrorReason::UnauthorizedSigner,
            Self::InvalidSignature(SignatureError::ZeroSigner) => ErrorReason::ZeroSigner,
            Self::InvalidSignature(_) => ErrorReason::InvalidSignature,
            Self::Arithmetic(AmountError::DivisionByZero) => ErrorReason::DivisionByZero,
            Self::Arithmetic(_) => ErrorReason::ArithmeticOverflow,
            Self::NothingToSettle => ErrorReason::NothingToSettle,
            Self::ExitAlreadyPending => ErrorReason::ExitAlreadyPending,
            Self::ExitNotReady { .. } => ErrorReason::ExitNotReady,
            Self::StaleNonce { .. } => ErrorReason::StaleNonce,
            Self::CannotRecoverNativeAsset => ErrorReason::CannotRecoverNativeAsset,
            Self::TransferRejected(_) => ErrorReason::TransferRejected,
            Self::IntermediaryUnavailable(_) => ErrorReason::IntermediaryUnavailable,
            Self::NotOwner(_) => ErrorReason::NotOwner,
            Self::ReentrantCall => ErrorReason::ReentrantCall,
        }
    }
}

/// Machine-readable error reason codes for channel failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum ErrorReason {
    /// See [`ChannelError::AlreadyInitialized`].
    AlreadyInitialized,
    /// See [`ChannelError::NotInitialized`].
    NotInitialized,
    /// See [`ChannelError::InvalidArgument`].
    InvalidArgument,
    /// See [`ChannelError::UnauthorizedSigner`].
    UnauthorizedSigner,
    /// The signature is malformed or malleable.
    InvalidSignature,
    /// The signature recovered to the zero address.
    ZeroSigner,
    /// Checked arithmetic overflowed or underflowed.
    ArithmeticOverflow,
    /// Checked division by zero.
    DivisionByZero,
    /// See [`ChannelError::NothingToSettle`].
    NothingToSettle,
    /// See [`ChannelError::ExitAlreadyPending`].
    ExitAlreadyPending,
    /// See [`ChannelError::ExitNotReady`].
    ExitNotReady,
    /// See [`ChannelError::StaleNonce`].
    StaleNonce,
    /// See [`ChannelError::CannotRecoverNativeAsset`].
    CannotRecoverNativeAsset,
    /// See [`ChannelError::TransferRejected`].
    TransferRejected,
    /// See [`ChannelError::IntermediaryUnavailable`].
    IntermediaryUnavailable,
    /// See [`ChannelError::NotOwner`].
    NotOwner,
    /// See [`ChannelError::ReentrantCall`].
    ReentrantCall,
}

impl ErrorReason {
    /// Returns the snake_case code as it appears on the wire.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::AlreadyInitialized => "already_initialized",
            Self::NotInitialized => "not_initialized",
            Self::InvalidArgument => "invalid_argument",
            Self::UnauthorizedSigner => "unauthorized_signer",
            Self::InvalidSignature => "invalid_signature",
            Self::ZeroSigner => "zero_signer",
            Self::ArithmeticOverflow => "arithmetic_overflow",
            Self::DivisionByZero => "division_by_zero",
            Self::NothingToSettle => "nothing_to_settle",
            Self::ExitAlreadyPending => "exit_already_pending",
            Self::ExitNotReady => "exit_not_ready",
            Self::StaleNonce => "stale_nonce",
            Self::CannotRecoverNativeAsset => "cannot_recover_native_asset",
            Self::TransferRejected => "transfer_rejected",
            Self::IntermediaryUnavailable => "intermediary_unavailable",
            Self::NotOwner => "not_owner",
            Self::ReentrantCall => "reentrant_call",
        }
    }
}
