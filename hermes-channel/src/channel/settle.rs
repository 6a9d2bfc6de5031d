//! Promise settlement.

use alloy_primitives::Address;
use serde::{Deserialize, Serialize};

#[cfg(feature = "telemetry")]
use tracing::instrument;
#[cfg(feature = "telemetry")]
use tracing_core::Level;

use super::ChannelStateMachine;
use crate::amount::Amount;
use crate::error::ChannelError;
use crate::event::ChannelEvent;
use crate::message::{Promise, Signed};
use crate::port::{CallContext, ChannelHost};

/// Outcome of a successful settlement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settlement {
    /// Intermediary contract that received the payout.
    pub beneficiary: Address,
    /// Amount taken from the channel, fee included.
    pub amount: Amount,
    /// Part of `amount` paid to the submitter.
    pub transactor_fee: Amount,
    /// Cumulative settled amount after this call.
    pub total_settled: Amount,
}

impl ChannelStateMachine {
    /// Settles the unpaid part of an operator-signed promise.
    ///
    /// The promise amount is cumulative. Only `amount - total_settled` is
    /// paid, clamped to the channel balance; the rest can be settled with the
    /// same promise once the channel is topped up. The payout minus the
    /// transactor fee goes to the intermediary and the fee to the caller.
    ///
    /// # Errors
    ///
    /// - [`ChannelError::InvalidSignature`] / [`ChannelError::UnauthorizedSigner`]
    ///   if the promise is not signed by the operator
    /// - [`ChannelError::NothingToSettle`] if nothing is owed or the channel is empty
    /// - [`ChannelError::Arithmetic`] if the fee exceeds the payout
    /// - [`ChannelError::TransferRejected`] if a transfer fails
    #[cfg_attr(feature = "telemetry", instrument(skip_all, err, fields(
        channel = %self.address,
        amount = %promise.message.amount,
        transactor_fee = %promise.message.transactor_fee,
    )))]
    pub fn settle_promise<H: ChannelHost>(
        &self,
        host: &mut H,
        ctx: CallContext,
        promise: &Signed<Promise>,
    ) -> Result<Settlement, ChannelError> {
        self.transact(host, |tx| {
            tx.require_initialized()?;
            let promise = promise
                .verify(tx.channel, tx.config.message_format)?
                .require_signer(tx.state.operator)?;

            let settled = tx.state.intermediary.total_settled;
            if promise.amount <= settled {
                return Err(ChannelError::NothingToSettle);
            }
            let mut unpaid = promise.amount.checked_sub(settled)?;
            let available = tx.balance(tx.state.token)?;
            if unpaid > available {
                unpaid = available;
            }
            if unpaid.is_zero() {
                return Err(ChannelError::NothingToSettle);
            }

            let total_settled = settled.checked_add(unpaid)?;
            tx.state.intermediary.total_settled = total_settled;

            let token = tx.state.token;
            let beneficiary = tx.state.intermediary.settlement_target;
            let payout = unpaid.checked_sub(promise.transactor_fee)?;
            tx.pay(token, beneficiary, payout)?;
            if !promise.transactor_fee.is_zero() {
                tx.pay(token, ctx.caller, promise.transactor_fee)?;
            }
            tx.emit(ChannelEvent::PromiseSettled {
                beneficiary,
                amount: unpaid,
                total_settled,
            });

            #[cfg(feature = "telemetry")]
            tracing::event!(Level::INFO,
                settled = %unpaid,
                total_settled = %total_settled,
                "promise settled"
            );
            Ok(Settlement {
                beneficiary,
                amount: unpaid,
                transactor_fee: promise.transactor_fee,
                total_settled,
            })
        })
    }
}
