//! Error types for the node's HTTP surface.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use hermes_channel::amount::AmountError;
use hermes_channel::error::ChannelError;

/// Errors returned by node handlers.
#[derive(Debug, thiserror::Error)]
pub enum NodeError {
    /// A channel operation failed.
    #[error(transparent)]
    Channel(#[from] ChannelError),

    /// A ledger helper overflowed.
    #[error("ledger error: {0}")]
    Ledger(#[from] AmountError),
}

impl NodeError {
    /// Returns the machine-readable reason code.
    #[must_use]
    pub fn reason(&self) -> &'static str {
        match self {
            Self::Channel(e) => e.reason().as_str(),
            Self::Ledger(e) => ChannelError::Arithmetic(*e).reason().as_str(),
        }
    }

    fn status(&self) -> StatusCode {
        let Self::Channel(err) = self else {
            return StatusCode::BAD_REQUEST;
        };
        match err {
            ChannelError::InvalidArgument(_)
            | ChannelError::InvalidSignature(_)
            | ChannelError::Arithmetic(_) => StatusCode::BAD_REQUEST,
            ChannelError::UnauthorizedSigner { .. }
            | ChannelError::NotOwner(_)
            | ChannelError::CannotRecoverNativeAsset => StatusCode::FORBIDDEN,
            ChannelError::AlreadyInitialized
            | ChannelError::NotInitialized
            | ChannelError::NothingToSettle
            | ChannelError::ExitAlreadyPending
            | ChannelError::ExitNotReady { .. }
            | ChannelError::StaleNonce { .. }
            | ChannelError::ReentrantCall => StatusCode::CONFLICT,
            ChannelError::TransferRejected(_) | ChannelError::IntermediaryUnavailable(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for NodeError {
    fn into_response(self) -> Response {
        let status = self.status();
        tracing::debug!(status = %status, reason = self.reason(), "request failed: {self}");
        let body = serde_json::json!({
            "error": self.to_string(),
            "reason": self.reason(),
        });
        (status, axum::Json(body)).into_response()
    }
}
