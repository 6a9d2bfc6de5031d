#![cfg_attr(docsrs, feature(doc_auto_cfg))]

//! Settlement and exit state machine for hermes payment channels.
//!
//! A channel holds funds an identity (the channel operator) owes to an
//! intermediary, the "hermes". The operator pays off-chain by signing
//! cumulative promises; the intermediary settles them on-chain whenever it
//! likes, and the operator can leave through a timelocked exit that gives the
//! intermediary a window to settle first.
//!
//! # Overview
//!
//! The [`ChannelStateMachine`](channel::ChannelStateMachine) owns the state of
//! one channel and performs every transition on it. All value moves through a
//! [`ChannelHost`](port::ChannelHost), so the same machine runs against an
//! on-chain ledger adapter or the in-memory [`MemoryHost`](memory::MemoryHost).
//! Every operation is atomic: a failure leaves both the channel and the host
//! untouched.
//!
//! # Modules
//!
//! - [`amount`] - Overflow-checked 256-bit token amounts
//! - [`block`] - Block heights
//! - [`channel`] - The channel state machine and its operations
//! - [`config`] - Per-channel tunables
//! - [`error`] - Error taxonomy and reason codes
//! - [`event`] - Observable events and their EVM log encoding
//! - [`memory`] - In-memory ledger implementing every port
//! - [`message`] - Signed promises, exit authorizations and destination cheques
//! - [`port`] - Interfaces to the ledger a channel runs on
//! - [`signature`] - Signer recovery
//! - [`state`] - Persistent channel state
//!
//! # Feature Flags
//!
//! - `client` - Signing of channel messages with local private keys
//! - `telemetry` - Enables tracing instrumentation for debugging and monitoring

pub mod amount;
pub mod block;
pub mod channel;
pub mod config;
pub mod error;
pub mod event;
pub mod memory;
pub mod message;
pub mod port;
pub mod signature;
pub mod state;

#[cfg(test)]
mod testing;
