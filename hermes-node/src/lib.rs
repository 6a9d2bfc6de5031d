//! HTTP host for a hermes payment channel.
//!
//! Runs one [`ChannelStateMachine`](hermes_channel::channel::ChannelStateMachine)
//! on an in-memory ledger and exposes its operations as JSON endpoints, with a
//! few devnet helpers for minting funds and mining blocks.
//!
//! # Modules
//!
//! - [`handlers`] — Axum route handlers and router builder
//! - [`auth`] — Signed calls proving the caller of owner-gated endpoints
//! - [`node`] — The hosted channel and its ledger
//! - [`error`] — Handler error type and HTTP status mapping
//! - [`config`] — Server configuration with environment variable expansion

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod node;

pub use handlers::{NodeState, node_router};
pub use node::ChannelNode;
