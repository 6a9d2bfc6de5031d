//! Per-channel configuration.
//!
//! # Example
//!
//! ```rust
//! use hermes_channel::config::ChannelConfig;
//! use hermes_channel::signature::MessageFormat;
//!
//! let config: ChannelConfig = serde_json::from_str(r#"{ "delay_blocks": 100 }"#).unwrap();
//! assert_eq!(config.delay_blocks, 100);
//! assert_eq!(config.message_format, MessageFormat::Raw);
//! ```

use serde::{Deserialize, Serialize};

use crate::error::ChannelError;
use crate::signature::MessageFormat;

/// Default exit delay in blocks (roughly three to four days of blocks).
pub const DEFAULT_DELAY_BLOCKS: u64 = 18_000;

/// Smallest usable exit delay.
///
/// An exit authorization must be valid after the current block and expire
/// before the timelock, which needs at least one block strictly in between.
pub const MIN_DELAY_BLOCKS: u64 = 2;

/// Tunables of a single channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelConfig {
    /// Number of blocks an exit stays contestable before it can be finalized.
    #[serde(default = "default_delay_blocks")]
    pub delay_blocks: u64,

    /// How message hashes are turned into signed digests.
    #[serde(default)]
    pub message_format: MessageFormat,
}

fn default_delay_blocks() -> u64 {
    DEFAULT_DELAY_BLOCKS
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            delay_blocks: DEFAULT_DELAY_BLOCKS,
            message_format: MessageFormat::default(),
        }
    }
}

impl ChannelConfig {
    /// Sets the exit delay.
    #[must_use]
    pub const fn with_delay_blocks(mut self, delay_blocks: u64) -> Self {
        self.delay_blocks = delay_blocks;
        self
    }

    /// Sets the message format.
    #[must_use]
    pub const fn with_message_format(mut self, message_format: MessageFormat) -> Self {
        self.message_format = message_format;
        self
    }

    /// Checks the configuration for values a channel cannot operate with.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::InvalidArgument`] if `delay_blocks` is below
    /// [`MIN_DELAY_BLOCKS`].
    pub fn validate(&self) -> Result<(), ChannelError> {
        if self.delay_blocks < MIN_DELAY_BLOCKS {
            return Err(ChannelError::InvalidArgument("delay_blocks must be at least 2"));
        }
        Ok(())
    }
}
