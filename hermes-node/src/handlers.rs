//! Axum route handlers for the node.
//!
//! Every channel operation is exposed as a `POST` endpoint. The in-memory
//! ledger has no transaction senders, so endpoints acting on the caller's
//! authority take a [`NodeCall`] signed by the caller (see [`crate::auth`]).
//! Settlement and initialization only name the account paid the fee, and
//! exits always run as a third party. The `/ledger` endpoints are devnet
//! helpers that mint funds and mine blocks.

use std::sync::Arc;

use alloy_primitives::Address;
use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use hermes_channel::amount::Amount;
use hermes_channel::block::BlockNumber;
use hermes_channel::channel::{ChannelParams, Settlement};
use hermes_channel::config::ChannelConfig;
use hermes_channel::error::ChannelError;
use hermes_channel::event::ChannelLog;
use hermes_channel::message::{DestinationCheque, ExitAuthorization, Promise, Signed};
use hermes_channel::port::{AssetTransferPort, CallContext, ChannelHost, NativeCurrencyPort};
use hermes_channel::state::{ChannelPhase, ChannelState, ExitRequest};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::auth::{
    ClaimNativeArgs, ClaimTokensArgs, DestinationArgs, FundArgs, NodeCall, OwnershipArgs,
};
use crate::error::NodeError;
use crate::node::ChannelNode;

/// Shared application state for the node.
pub type NodeState = Arc<Mutex<ChannelNode>>;

/// Caller of requests that prove no identity. Never a channel operator.
const ANONYMOUS_CALLER: Address = Address::ZERO;

/// Body of `POST /channel/initialize`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeRequest {
    /// Account receiving the initialization fee.
    pub caller: Address,
    /// Channel bindings.
    #[serde(flatten)]
    pub params: ChannelParams,
}

/// Body of `POST /channel/settle`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettleRequest {
    /// Account receiving the transactor fee.
    pub caller: Address,
    /// Operator-signed promise.
    pub promise: Signed<Promise>,
}

/// Body of `POST /ledger/mint`.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MintRequest {
    /// Asset to mint; native currency when absent.
    #[serde(default)]
    pub asset: Option<Address>,
    /// Receiving account.
    pub account: Address,
    /// Amount to create.
    pub amount: Amount,
}

/// Body of `POST /ledger/mine`.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MineRequest {
    /// Number of blocks to mine.
    pub blocks: u64,
}

/// A single amount.
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AmountResponse {
    /// The amount.
    pub amount: Amount,
}

/// The current block height.
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockResponse {
    /// Current block.
    pub block: BlockNumber,
}

/// `GET /channel` response.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelView {
    /// Channel address.
    pub address: Address,
    /// Lifecycle phase.
    pub phase: ChannelPhase,
    /// Current block.
    pub block: BlockNumber,
    /// Channel balance of its managed asset.
    pub balance: Amount,
    /// Channel balance of native currency.
    pub native_balance: Amount,
    /// Full channel state.
    pub state: ChannelState,
    /// Channel configuration.
    pub config: ChannelConfig,
}

/// `GET /health` — Liveness check.
pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// `GET /channel` — Returns the channel state and balances.
///
/// # Errors
///
/// Returns 409 if the channel is busy, or 422 if a balance cannot be read.
pub async fn get_channel(State(node): State<NodeState>) -> Result<Json<ChannelView>, NodeError> {
    let node = node.lock().await;
    let channel = node.channel();
    let host = node.host();
    let state = channel.snapshot()?;
    let address = channel.address();
    let balance = host
        .balance_of(state.token, address)
        .map_err(ChannelError::from)?;
    let native_balance = host
        .native_balance_of(address)
        .map_err(ChannelError::from)?;
    Ok(Json(ChannelView {
        address,
        phase: state.phase(),
        block: host.block_number(),
        balance,
        native_balance,
        state,
        config: *channel.config(),
    }))
}

/// `GET /events` — Returns every committed channel event, oldest first.
pub async fn get_events(State(node): State<NodeState>) -> Json<Vec<ChannelLog>> {
    let node = node.lock().await;
    Json(node.host().logs().to_vec())
}

/// `POST /channel/initialize` — Initializes the channel.
///
/// # Errors
///
/// Returns 409 if already initialized, 400 on bad arguments.
pub async fn post_initialize(
    State(node): State<NodeState>,
    Json(body): Json<InitializeRequest>,
) -> Result<Json<ChannelState>, NodeError> {
    let mut node = node.lock().await;
    let (channel, host) = node.split();
    channel.initialize(host, CallContext::new(body.caller), body.params)?;
    Ok(Json(channel.snapshot()?))
}

/// `POST /channel/settle` — Settles a signed promise.
///
/// # Errors
///
/// Returns 409 if nothing is left to settle, 403 for a foreign signer.
pub async fn post_settle(
    State(node): State<NodeState>,
    Json(body): Json<SettleRequest>,
) -> Result<Json<Settlement>, NodeError> {
    let mut node = node.lock().await;
    let (channel, host) = node.split();
    let settlement = channel.settle_promise(host, CallContext::new(body.caller), &body.promise)?;
    Ok(Json(settlement))
}

/// `POST /channel/exit` — Requests an exit.
///
/// HTTP callers prove no identity, so the request always runs as a third
/// party and the authorization must carry the operator's signature.
///
/// # Errors
///
/// Returns 409 if an exit is pending, 400 for an invalid validity window or
/// a missing signature, 403 for a foreign signer.
pub async fn post_exit(
    State(node): State<NodeState>,
    Json(authorization): Json<Signed<ExitAuthorization>>,
) -> Result<Json<ExitRequest>, NodeError> {
    let mut node = node.lock().await;
    let (channel, host) = node.split();
    let exit = channel.request_exit(host, CallContext::new(ANONYMOUS_CALLER), &authorization)?;
    Ok(Json(exit))
}

/// `POST /channel/exit/finalize` — Finalizes a matured exit.
///
/// # Errors
///
/// Returns 409 if no exit has matured.
pub async fn post_finalize_exit(
    State(node): State<NodeState>,
) -> Result<Json<AmountResponse>, NodeError> {
    let mut node = node.lock().await;
    let (channel, host) = node.split();
    let amount = channel.finalize_exit(host)?;
    Ok(Json(AmountResponse { amount }))
}

/// `POST /channel/destination` — Sets the funds destination as owner.
///
/// # Errors
///
/// Returns 403 for a signer other than the owner, 409 for a stale nonce.
pub async fn post_destination(
    State(node): State<NodeState>,
    Json(call): Json<Signed<NodeCall<DestinationArgs>>>,
) -> Result<Json<ChannelState>, NodeError> {
    let mut node = node.lock().await;
    let caller = node.authenticate(&call)?;
    let (channel, host) = node.split();
    channel.set_funds_destination(host, caller.context(), call.message.args.destination)?;
    let state = channel.snapshot()?;
    node.consume(caller);
    Ok(Json(state))
}

/// `POST /channel/destination/cheque` — Sets the funds destination with a
/// signed cheque.
///
/// # Errors
///
/// Returns 409 for a stale nonce, 403 for a foreign signer.
pub async fn post_destination_cheque(
    State(node): State<NodeState>,
    Json(cheque): Json<Signed<DestinationCheque>>,
) -> Result<Json<ChannelState>, NodeError> {
    let mut node = node.lock().await;
    let (channel, host) = node.split();
    channel.set_funds_destination_by_cheque(host, &cheque)?;
    Ok(Json(channel.snapshot()?))
}

/// `POST /channel/claim/tokens` — Recovers a stray asset.
///
/// # Errors
///
/// Returns 403 for the managed asset or a signer other than the owner.
pub async fn post_claim_tokens(
    State(node): State<NodeState>,
    Json(call): Json<Signed<NodeCall<ClaimTokensArgs>>>,
) -> Result<Json<AmountResponse>, NodeError> {
    let mut node = node.lock().await;
    let caller = node.authenticate(&call)?;
    let (channel, host) = node.split();
    let amount = channel.claim_tokens(host, caller.context(), call.message.args.asset)?;
    node.consume(caller);
    Ok(Json(AmountResponse { amount }))
}

/// `POST /channel/claim/native` — Recovers native currency.
///
/// # Errors
///
/// Returns 403 for a signer other than the owner.
pub async fn post_claim_native(
    State(node): State<NodeState>,
    Json(call): Json<Signed<NodeCall<ClaimNativeArgs>>>,
) -> Result<Json<AmountResponse>, NodeError> {
    let mut node = node.lock().await;
    let caller = node.authenticate(&call)?;
    let (channel, host) = node.split();
    let amount = channel.claim_native(host, caller.context())?;
    node.consume(caller);
    Ok(Json(AmountResponse { amount }))
}

/// `POST /channel/ownership` — Transfers ownership.
///
/// # Errors
///
/// Returns 403 for a signer other than the owner.
pub async fn post_ownership(
    State(node): State<NodeState>,
    Json(call): Json<Signed<NodeCall<OwnershipArgs>>>,
) -> Result<Json<ChannelState>, NodeError> {
    let mut node = node.lock().await;
    let caller = node.authenticate(&call)?;
    let (channel, host) = node.split();
    channel.transfer_ownership(host, caller.context(), call.message.args.new_owner)?;
    let state = channel.snapshot()?;
    node.consume(caller);
    Ok(Json(state))
}

/// `POST /channel/fund` — Tops the channel up with the signer's native
/// currency.
///
/// # Errors
///
/// Returns 422 if the payment or swap fails.
pub async fn post_fund(
    State(node): State<NodeState>,
    Json(call): Json<Signed<NodeCall<FundArgs>>>,
) -> Result<Json<AmountResponse>, NodeError> {
    let mut node = node.lock().await;
    let caller = node.authenticate(&call)?;
    let (channel, host) = node.split();
    let ctx = caller.context().with_value(call.message.args.value);
    let amount = channel.receive_native(host, ctx)?;
    node.consume(caller);
    Ok(Json(AmountResponse { amount }))
}

/// `POST /ledger/mint` — Creates funds out of thin air.
///
/// # Errors
///
/// Returns 400 if the balance would overflow.
pub async fn post_mint(
    State(node): State<NodeState>,
    Json(body): Json<MintRequest>,
) -> Result<Json<AmountResponse>, NodeError> {
    let mut node = node.lock().await;
    let (_, host) = node.split();
    let amount = match body.asset {
        Some(asset) => {
            host.mint(asset, body.account, body.amount)?;
            host.balance_of(asset, body.account)
        }
        None => {
            host.credit_native(body.account, body.amount)?;
            host.native_balance_of(body.account)
        }
    }
    .map_err(ChannelError::from)?;
    tracing::info!(account = %body.account, amount = %body.amount, "minted");
    Ok(Json(AmountResponse { amount }))
}

/// `POST /ledger/mine` — Mines empty blocks.
pub async fn post_mine(
    State(node): State<NodeState>,
    Json(body): Json<MineRequest>,
) -> Json<BlockResponse> {
    let mut node = node.lock().await;
    let (_, host) = node.split();
    let block = host.advance_blocks(body.blocks);
    Json(BlockResponse { block })
}

/// `GET /ledger/balance/{asset}/{account}` — Returns an asset balance.
///
/// # Errors
///
/// Returns 422 if the balance cannot be read.
pub async fn get_balance(
    State(node): State<NodeState>,
    Path((asset, account)): Path<(Address, Address)>,
) -> Result<Json<AmountResponse>, NodeError> {
    let node = node.lock().await;
    let amount = node
        .host()
        .balance_of(asset, account)
        .map_err(ChannelError::from)?;
    Ok(Json(AmountResponse { amount }))
}

/// `GET /ledger/native/{account}` — Returns a native-currency balance.
///
/// # Errors
///
/// Returns 422 if the balance cannot be read.
pub async fn get_native_balance(
    State(node): State<NodeState>,
    Path(account): Path<Address>,
) -> Result<Json<AmountResponse>, NodeError> {
    let node = node.lock().await;
    let amount = node
        .host()
        .native_balance_of(account)
        .map_err(ChannelError::from)?;
    Ok(Json(AmountResponse { amount }))
}

/// Creates an Axum [`Router`] with all node endpoints.
///
/// Endpoints:
/// - `GET /health` — liveness check
/// - `GET /channel` — channel state and balances
/// - `GET /events` — committed channel events
/// - `POST /channel/initialize` — initialize the channel
/// - `POST /channel/settle` — settle a signed promise
/// - `POST /channel/exit` — request an exit
/// - `POST /channel/exit/finalize` — finalize a matured exit
/// - `POST /channel/destination` — set the funds destination as owner
/// - `POST /channel/destination/cheque` — set the funds destination by cheque
/// - `POST /channel/claim/tokens` — recover a stray asset
/// - `POST /channel/claim/native` — recover native currency
/// - `POST /channel/ownership` — transfer ownership
/// - `POST /channel/fund` — native top-up through the exchange
/// - `POST /ledger/mint` — mint funds
/// - `POST /ledger/mine` — mine blocks
/// - `GET /ledger/balance/{asset}/{account}` — asset balance
/// - `GET /ledger/native/{account}` — native-currency balance
pub fn node_router(state: NodeState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/channel", get(get_channel))
        .route("/events", get(get_events))
        .route("/channel/initialize", post(post_initialize))
        .route("/channel/settle", post(post_settle))
        .route("/channel/exit", post(post_exit))
        .route("/channel/exit/finalize", post(post_finalize_exit))
        .route("/channel/destination", post(post_destination))
        .route("/channel/destination/cheque", post(post_destination_cheque))
        .route("/channel/claim/tokens", post(post_claim_tokens))
        .route("/channel/claim/native", post(post_claim_native))
        .route("/channel/ownership", post(post_ownership))
        .route("/channel/fund", post(post_fund))
        .route("/ledger/mint", post(post_mint))
        .route("/ledger/mine", post(post_mine))
        .route("/ledger/balance/{asset}/{account}", get(get_balance))
        .route("/ledger/native/{account}", get(get_native_balance))
        .with_state(state)
}
