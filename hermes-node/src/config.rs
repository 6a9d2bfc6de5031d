//! Node configuration.
//!
//! Loads configuration from a TOML file with support for environment variable
//! expansion in string values. Variables use `$VAR` or `${VAR}` syntax.
//!
//! # Example Configuration
//!
//! ```toml
//! host = "0.0.0.0"
//! port = 4031
//! channel_address = "0x00000000000000000000000000000000000c4a11"
//! start_block = 0
//!
//! [channel]
//! delay_blocks = 18000
//! message_format = "raw"
//!
//! [[intermediaries]]
//! address = "0x000000000000000000000000000000000000e4e5"
//! operator = "$HERMES_OPERATOR"
//!
//! [[pools]]
//! dex = "0x0000000000000000000000000000000000000de5"
//! asset = "0x0000000000000000000000000000000000007070"
//! rate = "2"
//! ```
//!
//! # Environment Variables
//!
//! - `CONFIG` — Path to configuration file (default: `config.toml`)
//! - `HOST` — Override server bind address
//! - `PORT` — Override server port
//! - Any variable referenced by `$VAR` in the config file

use std::net::{IpAddr, Ipv4Addr};
use std::path::Path;

use alloy_primitives::{Address, address};
use hermes_channel::amount::Amount;
use hermes_channel::config::ChannelConfig;
use serde::{Deserialize, Serialize};

/// Address the channel is deployed at when the file names none.
pub const DEFAULT_CHANNEL_ADDRESS: Address = address!("0x00000000000000000000000000000000000c4a11");

/// Errors raised while loading the configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The file exists but cannot be read.
    #[error("cannot read config file: {0}")]
    Io(#[from] std::io::Error),
    /// The file is not valid TOML for [`NodeConfig`].
    #[error("invalid config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Top-level node configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Server bind address (default: `0.0.0.0`).
    #[serde(default = "default_host")]
    pub host: IpAddr,

    /// Server port (default: `4031`).
    #[serde(default = "default_port")]
    pub port: u16,

    /// Address of the hosted channel.
    #[serde(default = "default_channel_address")]
    pub channel_address: Address,

    /// Block height the in-memory ledger starts at.
    #[serde(default)]
    pub start_block: u64,

    /// Tunables of the hosted channel.
    #[serde(default)]
    pub channel: ChannelConfig,

    /// Intermediary contracts deployed on the ledger.
    #[serde(default)]
    pub intermediaries: Vec<IntermediaryConfig>,

    /// Exchange pools available for native top-ups.
    #[serde(default)]
    pub pools: Vec<PoolConfig>,
}

/// An intermediary contract and its signer.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct IntermediaryConfig {
    /// Contract address.
    pub address: Address,
    /// Signer reported by the contract.
    pub operator: Address,
}

/// A fixed-rate exchange pool.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Pool address; its asset balance is the pool reserve.
    pub dex: Address,
    /// Asset sold by the pool.
    pub asset: Address,
    /// Asset units per unit of native currency.
    pub rate: Amount,
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}

const fn default_port() -> u16 {
    4031
}

const fn default_channel_address() -> Address {
    DEFAULT_CHANNEL_ADDRESS
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            channel_address: DEFAULT_CHANNEL_ADDRESS,
            start_block: 0,
            channel: ChannelConfig::default(),
            intermediaries: Vec::new(),
            pools: Vec::new(),
        }
    }
}

impl NodeConfig {
    /// Loads configuration from `path`, falling back to defaults when the
    /// file does not exist.
    ///
    /// After loading, all `$VAR` / `${VAR}` references are expanded from the
    /// process environment. `HOST` and `PORT` env vars override the file values.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = if path.exists() {
            std::fs::read_to_string(path)?
        } else {
            String::new()
        };
        let mut config = Self::from_toml(&content)?;

        if let Ok(host) = std::env::var("HOST") {
            if let Ok(addr) = host.parse() {
                config.host = addr;
            }
        }
        if let Ok(port) = std::env::var("PORT") {
            if let Ok(p) = port.parse() {
                config.port = p;
            }
        }
        Ok(config)
    }

    /// Parses configuration from TOML text, expanding environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] if the text is not a valid configuration.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let expanded = expand_env_vars(content);
        Ok(toml::from_str(&expanded)?)
    }
}

/// Expands `$VAR` and `${VAR}` patterns in a string from environment variables.
///
/// Unresolved variables are left as-is.
fn expand_env_vars(input: &str) -> String {
    expand_with(input, |name| std::env::var(name).ok())
}

fn expand_with(input: &str, lookup: impl Fn(&str) -> Option<String>) -> String {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch != '$' {
            result.push(ch);
            continue;
        }
        let braced = chars.next_if_eq(&'{').is_some();
        let mut name = String::new();
        let mut closed = false;
        while let Some(&c) = chars.peek() {
            if braced && c == '}' {
                chars.next();
                closed = true;
                break;
            }
            if !braced && !c.is_ascii_alphanumeric() && c != '_' {
                break;
            }
            name.push(c);
            chars.next();
        }

        let resolved = if name.is_empty() || (braced && !closed) {
            None
        } else {
            lookup(&name)
        };
        match resolved {
            Some(value) => result.push_str(&value),
            None => {
                result.push('$');
                if braced {
                    result.push('{');
                }
                result.push_str(&name);
                if closed {
                    result.push('}');
                }
            }
        }
    }

    result
}
