//! Funds destination, recovery of stray funds and ownership.

use alloy_primitives::Address;

#[cfg(feature = "telemetry")]
use tracing::instrument;
#[cfg(feature = "telemetry")]
use tracing_core::Level;

use super::{ChannelStateMachine, Tx};
use crate::amount::Amount;
use crate::error::ChannelError;
use crate::event::ChannelEvent;
use crate::message::{DestinationCheque, Signed};
use crate::port::{CallContext, ChannelHost};

impl<H: ChannelHost> Tx<'_, H> {
    fn change_destination(&mut self, next: Address) {
        let previous = self.state.funds_destination.replace(next);
        self.emit(ChannelEvent::DestinationChanged {
            previous: previous.unwrap_or(Address::ZERO),
            next,
        });
    }

    fn destination(&self) -> Result<Address, ChannelError> {
        self.state
            .funds_destination
            .ok_or(ChannelError::InvalidArgument("funds destination is not set"))
    }
}

impl ChannelStateMachine {
    /// Changes the funds destination with an operator-signed cheque.
    ///
    /// Anyone may submit the cheque. Each cheque carries a nonce that must
    /// exceed the last accepted one, so a cheque can be used once and older
    /// cheques can never be replayed.
    ///
    /// # Errors
    ///
    /// - [`ChannelError::InvalidArgument`] for a zero destination
    /// - [`ChannelError::StaleNonce`] if the nonce was already superseded
    /// - [`ChannelError::InvalidSignature`] / [`ChannelError::UnauthorizedSigner`]
    ///   if the cheque is not signed by the operator
    #[cfg_attr(feature = "telemetry", instrument(skip_all, err, fields(
        channel = %self.address,
        destination = %cheque.message.destination,
        nonce = cheque.message.nonce,
    )))]
    pub fn set_funds_destination_by_cheque<H: ChannelHost>(
        &self,
        host: &mut H,
        cheque: &Signed<DestinationCheque>,
    ) -> Result<(), ChannelError> {
        self.transact(host, |tx| {
            tx.require_initialized()?;
            let DestinationCheque { destination, nonce } = cheque.message;
            if destination == Address::ZERO {
                return Err(ChannelError::InvalidArgument("destination must be non-zero"));
            }
            let last = tx.state.last_authorized_nonce;
            if nonce <= last {
                return Err(ChannelError::StaleNonce { nonce, last });
            }
            cheque
                .verify(tx.channel, tx.config.message_format)?
                .require_signer(tx.state.operator)?;

            tx.state.last_authorized_nonce = nonce;
            tx.change_destination(destination);

            #[cfg(feature = "telemetry")]
            tracing::event!(Level::INFO, "funds destination changed by cheque");
            Ok(())
        })
    }

    /// Changes the funds destination. Owner only.
    ///
    /// # Errors
    ///
    /// - [`ChannelError::NotOwner`] for any other caller
    /// - [`ChannelError::InvalidArgument`] for a zero destination
    #[cfg_attr(feature = "telemetry", instrument(skip_all, err, fields(
        channel = %self.address,
        destination = %destination,
    )))]
    pub fn set_funds_destination<H: ChannelHost>(
        &self,
        host: &mut H,
        ctx: CallContext,
        destination: Address,
    ) -> Result<(), ChannelError> {
        self.transact(host, |tx| {
            tx.require_owner(ctx.caller)?;
            if destination == Address::ZERO {
                return Err(ChannelError::InvalidArgument("destination must be non-zero"));
            }
            tx.change_destination(destination);
            Ok(())
        })
    }

    /// Sends the channel's whole balance of a stray `asset` to the funds
    /// destination. Owner only. Returns the amount recovered.
    ///
    /// The managed asset is excluded: it only leaves through settlement or exit.
    ///
    /// # Errors
    ///
    /// - [`ChannelError::NotOwner`] for any other caller
    /// - [`ChannelError::CannotRecoverNativeAsset`] for the managed asset
    /// - [`ChannelError::InvalidArgument`] if no funds destination is set
    /// - [`ChannelError::TransferRejected`] if the transfer fails
    #[cfg_attr(feature = "telemetry", instrument(skip_all, err, fields(
        channel = %self.address,
        asset = %asset,
    )))]
    pub fn claim_tokens<H: ChannelHost>(
        &self,
        host: &mut H,
        ctx: CallContext,
        asset: Address,
    ) -> Result<Amount, ChannelError> {
        self.transact(host, |tx| {
            tx.require_owner(ctx.caller)?;
            if asset == tx.state.token {
                return Err(ChannelError::CannotRecoverNativeAsset);
            }
            let destination = tx.destination()?;
            let amount = tx.balance(asset)?;
            tx.pay(asset, destination, amount)?;

            #[cfg(feature = "telemetry")]
            tracing::event!(Level::INFO,
                amount = %amount,
                destination = %destination,
                "tokens recovered"
            );
            Ok(amount)
        })
    }

    /// Sends the channel's whole native-currency balance to the funds
    /// destination. Owner only. Returns the amount recovered.
    ///
    /// # Errors
    ///
    /// - [`ChannelError::NotOwner`] for any other caller
    /// - [`ChannelError::InvalidArgument`] if no funds destination is set
    /// - [`ChannelError::TransferRejected`] if the transfer fails
    #[cfg_attr(feature = "telemetry", instrument(skip_all, err, fields(channel = %self.address)))]
    pub fn claim_native<H: ChannelHost>(
        &self,
        host: &mut H,
        ctx: CallContext,
    ) -> Result<Amount, ChannelError> {
        self.transact(host, |tx| {
            tx.require_owner(ctx.caller)?;
            let destination = tx.destination()?;
            let channel = tx.channel;
            let amount = tx.host.native_balance_of(channel)?;
            tx.host.send_native(channel, destination, amount)?;

            #[cfg(feature = "telemetry")]
            tracing::event!(Level::INFO,
                amount = %amount,
                destination = %destination,
                "native currency recovered"
            );
            Ok(amount)
        })
    }

    /// Hands ownership of the channel to `new_owner`. Owner only.
    ///
    /// The operator is unaffected: it keeps signing promises, exits and cheques.
    ///
    /// # Errors
    ///
    /// - [`ChannelError::NotOwner`] for any other caller
    /// - [`ChannelError::InvalidArgument`] for a zero `new_owner`
    #[cfg_attr(feature = "telemetry", instrument(skip_all, err, fields(
        channel = %self.address,
        new_owner = %new_owner,
    )))]
    pub fn transfer_ownership<H: ChannelHost>(
        &self,
        host: &mut H,
        ctx: CallContext,
        new_owner: Address,
    ) -> Result<(), ChannelError> {
        self.transact(host, |tx| {
            tx.require_owner(ctx.caller)?;
            if new_owner == Address::ZERO {
                return Err(ChannelError::InvalidArgument("new owner must be non-zero"));
            }
            let previous = std::mem::replace(&mut tx.state.owner, new_owner);
            tx.emit(ChannelEvent::OwnershipTransferred {
                previous,
                next: new_owner,
            });
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::amount::Amount;
    use crate::config::ChannelConfig;
    use crate::error::ChannelError;
    use crate::event::ChannelEvent;
    use crate::message::{DestinationCheque, Signed};
    use crate::port::{AssetTransferPort, CallContext, NativeCurrencyPort};
    use crate::signature::MessageFormat;
    use crate::testing::{
        BENEFICIARY, CHANNEL, TOKEN, open_channel, open_channel_with, operator_key, sign,
        stranger_key,
    };
    use alloy_primitives::{Address, address};

    const STRAY: Address = address!("0x0000000000000000000000000000000000000a5e");
    const VAULT: Address = address!("0x000000000000000000000000000000000000fa17");

    fn cheque(destination: Address, nonce: u64) -> Signed<DestinationCheque> {
        sign(
            DestinationCheque { destination, nonce },
            CHANNEL,
            MessageFormat::Raw,
            &operator_key(),
        )
    }

    fn owner() -> CallContext {
        CallContext::new(operator_key().address())
    }

    #[test]
    fn test_cheque_sets_destination() {
        let (channel, mut host) = open_channel(0);
        channel
            .set_funds_destination_by_cheque(&mut host, &cheque(VAULT, 1))
            .unwrap();
        let state = channel.snapshot().unwrap();
        assert_eq!(state.funds_destination, Some(VAULT));
        assert_eq!(state.last_authorized_nonce, 1);
        assert_eq!(
            host.events_of(CHANNEL).last(),
            Some(&ChannelEvent::DestinationChanged {
                previous: Address::ZERO,
                next: VAULT,
            })
        );
    }

    #[test]
    fn test_cheque_nonce_must_increase() {
        let (channel, mut host) = open_channel(0);
        channel
            .set_funds_destination_by_cheque(&mut host, &cheque(VAULT, 5))
            .unwrap();
        for nonce in [0, 1, 5] {
            assert_eq!(
                channel.set_funds_destination_by_cheque(&mut host, &cheque(BENEFICIARY, nonce)),
                Err(ChannelError::StaleNonce { nonce, last: 5 })
            );
        }
        channel
            .set_funds_destination_by_cheque(&mut host, &cheque(BENEFICIARY, 6))
            .unwrap();
        assert_eq!(channel.snapshot().unwrap().funds_destination, Some(BENEFICIARY));
    }

    #[test]
    fn test_cheque_replay_rejected() {
        let (channel, mut host) = open_channel(0);
        let first = cheque(VAULT, 1);
        channel
            .set_funds_destination_by_cheque(&mut host, &first)
            .unwrap();
        assert_eq!(
            channel.set_funds_destination_by_cheque(&mut host, &first),
            Err(ChannelError::StaleNonce { nonce: 1, last: 1 })
        );
    }

    #[test]
    fn test_cheque_requires_operator() {
        let (channel, mut host) = open_channel(0);
        let forged = sign(
            DestinationCheque {
                destination: VAULT,
                nonce: 1,
            },
            CHANNEL,
            MessageFormat::Raw,
            &stranger_key(),
        );
        assert!(matches!(
            channel.set_funds_destination_by_cheque(&mut host, &forged),
            Err(ChannelError::UnauthorizedSigner { .. })
        ));
        assert_eq!(channel.snapshot().unwrap().last_authorized_nonce, 0);
        assert!(matches!(
            channel.set_funds_destination_by_cheque(&mut host, &cheque(Address::ZERO, 1)),
            Err(ChannelError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_personal_sign_cheque() {
        let config = ChannelConfig::default().with_message_format(MessageFormat::PersonalSign);
        let (channel, mut host) = open_channel_with(config, 0);

        assert!(matches!(
            channel.set_funds_destination_by_cheque(&mut host, &cheque(VAULT, 1)),
            Err(ChannelError::UnauthorizedSigner { .. })
        ));
        let personal = sign(
            DestinationCheque {
                destination: VAULT,
                nonce: 1,
            },
            CHANNEL,
            MessageFormat::PersonalSign,
            &operator_key(),
        );
        channel
            .set_funds_destination_by_cheque(&mut host, &personal)
            .unwrap();
        let state = channel.snapshot().unwrap();
        assert_eq!(state.funds_destination, Some(VAULT));
        assert_eq!(state.last_authorized_nonce, 1);
    }

    #[test]
    fn test_owner_gates() {
        let (channel, mut host) = open_channel(0);
        let stranger = CallContext::new(stranger_key().address());
        let not_owner = ChannelError::NotOwner(stranger_key().address());
        assert_eq!(
            channel.set_funds_destination(&mut host, stranger, VAULT),
            Err(not_owner.clone())
        );
        assert_eq!(
            channel.claim_tokens(&mut host, stranger, STRAY),
            Err(not_owner.clone())
        );
        assert_eq!(channel.claim_native(&mut host, stranger), Err(not_owner.clone()));
        assert_eq!(
            channel.transfer_ownership(&mut host, stranger, VAULT),
            Err(not_owner)
        );
    }

    #[test]
    fn test_claim_tokens_moves_stray_balance() {
        let (channel, mut host) = open_channel(1000);
        host.mint(STRAY, CHANNEL, Amount::from(42)).unwrap();
        assert!(matches!(
            channel.claim_tokens(&mut host, owner(), STRAY),
            Err(ChannelError::InvalidArgument(_))
        ));

        channel
            .set_funds_destination(&mut host, owner(), VAULT)
            .unwrap();
        let amount = channel.claim_tokens(&mut host, owner(), STRAY).unwrap();
        assert_eq!(amount, Amount::from(42));
        assert_eq!(host.balance_of(STRAY, VAULT).unwrap(), Amount::from(42));
        assert_eq!(host.balance_of(STRAY, CHANNEL).unwrap(), Amount::ZERO);
    }

    #[test]
    fn test_managed_asset_cannot_be_claimed() {
        let (channel, mut host) = open_channel(1000);
        channel
            .set_funds_destination(&mut host, owner(), VAULT)
            .unwrap();
        assert_eq!(
            channel.claim_tokens(&mut host, owner(), TOKEN),
            Err(ChannelError::CannotRecoverNativeAsset)
        );
        assert_eq!(host.balance_of(TOKEN, CHANNEL).unwrap(), Amount::from(1000));
    }

    #[test]
    fn test_claim_native() {
        let (channel, mut host) = open_channel(0);
        host.credit_native(CHANNEL, Amount::from(9)).unwrap();
        channel
            .set_funds_destination(&mut host, owner(), VAULT)
            .unwrap();
        assert_eq!(channel.claim_native(&mut host, owner()).unwrap(), Amount::from(9));
        assert_eq!(host.native_balance_of(VAULT).unwrap(), Amount::from(9));
    }

    #[test]
    fn test_transfer_ownership() {
        let (channel, mut host) = open_channel(0);
        channel
            .transfer_ownership(&mut host, owner(), VAULT)
            .unwrap();
        let state = channel.snapshot().unwrap();
        assert_eq!(state.owner, VAULT);
        assert_eq!(state.operator, operator_key().address());
        assert_eq!(
            host.events_of(CHANNEL).last(),
            Some(&ChannelEvent::OwnershipTransferred {
                previous: operator_key().address(),
                next: VAULT,
            })
        );
        assert_eq!(
            channel.set_funds_destination(&mut host, owner(), VAULT),
            Err(ChannelError::NotOwner(operator_key().address()))
        );
        channel
            .set_funds_destination(&mut host, CallContext::new(VAULT), BENEFICIARY)
            .unwrap();
        assert!(matches!(
            channel.transfer_ownership(&mut host, CallContext::new(VAULT), Address::ZERO),
            Err(ChannelError::InvalidArgument(_))
        ));
    }
}
