//! Delayed withdrawal of the channel balance.
//!
//! An exit is requested first and finalized no earlier than
//! `delay_blocks` later. The delay gives the intermediary time to settle its
//! latest promise before the balance leaves the channel.

use alloy_primitives::Address;

#[cfg(feature = "telemetry")]
use tracing::instrument;
#[cfg(feature = "telemetry")]
use tracing_core::Level;

use super::ChannelStateMachine;
use crate::amount::Amount;
use crate::error::ChannelError;
use crate::event::ChannelEvent;
use crate::message::{ExitAuthorization, Signed};
use crate::port::{CallContext, ChannelHost};
use crate::state::ExitRequest;

impl ChannelStateMachine {
    /// Starts an exit paying the whole channel balance to the beneficiary.
    ///
    /// The operator may request an exit directly, in which case the signature
    /// is ignored. Anyone else must present an exit authorization signed by
    /// the operator. The authorization must still be valid and must expire
    /// before the resulting timelock.
    ///
    /// Returns the stored request.
    ///
    /// # Errors
    ///
    /// - [`ChannelError::ExitAlreadyPending`] if an exit is outstanding
    /// - [`ChannelError::InvalidArgument`] for an expired or too long validity
    ///   window, or a zero beneficiary
    /// - [`ChannelError::InvalidSignature`] / [`ChannelError::UnauthorizedSigner`]
    ///   if a third party's authorization is not signed by the operator
    #[cfg_attr(feature = "telemetry", instrument(skip_all, err, fields(
        channel = %self.address,
        beneficiary = %request.message.beneficiary,
        valid_until = %request.message.valid_until,
    )))]
    pub fn request_exit<H: ChannelHost>(
        &self,
        host: &mut H,
        ctx: CallContext,
        request: &Signed<ExitAuthorization>,
    ) -> Result<ExitRequest, ChannelError> {
        self.transact(host, |tx| {
            tx.require_initialized()?;
            let current = tx.host.block_number();
            let timelock = self.timelock_for(current)?;
            if tx.state.exit_request.is_some() {
                return Err(ChannelError::ExitAlreadyPending);
            }

            let authorization = &request.message;
            if authorization.valid_until <= current {
                return Err(ChannelError::InvalidArgument(
                    "exit authorization has already expired",
                ));
            }
            if timelock <= authorization.valid_until {
                return Err(ChannelError::InvalidArgument(
                    "exit authorization must expire before the timelock",
                ));
            }
            if authorization.beneficiary == Address::ZERO {
                return Err(ChannelError::InvalidArgument("beneficiary must be non-zero"));
            }
            if ctx.caller != tx.state.operator {
                request
                    .verify(tx.channel, tx.config.message_format)?
                    .require_signer(tx.state.operator)?;
            }

            let exit = ExitRequest {
                timelock,
                beneficiary: authorization.beneficiary,
            };
            tx.state.exit_request = Some(exit);
            tx.emit(ChannelEvent::ExitRequested { timelock });

            #[cfg(feature = "telemetry")]
            tracing::event!(Level::INFO, timelock = %timelock, "exit requested");
            Ok(exit)
        })
    }

    /// Pays the whole channel balance to the beneficiary of a matured exit.
    ///
    /// Anyone may call this once the timelock is reached. Returns the amount
    /// paid.
    ///
    /// # Errors
    ///
    /// - [`ChannelError::ExitNotReady`] without a pending exit or before its timelock
    /// - [`ChannelError::TransferRejected`] if the payout fails
    #[cfg_attr(feature = "telemetry", instrument(skip_all, err, fields(channel = %self.address)))]
    pub fn finalize_exit<H: ChannelHost>(&self, host: &mut H) -> Result<Amount, ChannelError> {
        self.transact(host, |tx| {
            tx.require_initialized()?;
            let current = tx.host.block_number();
            let exit = match tx.state.exit_request {
                Some(exit) if current >= exit.timelock => exit,
                pending => {
                    return Err(ChannelError::ExitNotReady {
                        timelock: pending.map(|exit| exit.timelock),
                        current,
                    });
                }
            };

            let token = tx.state.token;
            let amount = tx.balance(token)?;
            tx.pay(token, exit.beneficiary, amount)?;
            tx.state.exit_request = None;
            tx.emit(ChannelEvent::FinalizeExit { amount });

            #[cfg(feature = "telemetry")]
            tracing::event!(Level::INFO,
                beneficiary = %exit.beneficiary,
                amount = %amount,
                "exit finalized"
            );
            Ok(amount)
        })
    }
}
