//! Domain error types.
//!
//! Manual `Display` impls rather than a derive macro, matching the rest of the
//! codebase: `thiserror` is a declared workspace dependency but is not used for
//! these enums.

use std::fmt;

/// Errors raised while loading or validating the configuration surface.
///
/// Per the error-handling design, configuration errors are fatal at load time —
/// they are never retried or downgraded to a warning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    MissingField(&'static str),
    EmptyCoinList,
    InvalidUrl(String),
    WalletRequiredForLiveMode,
    Io(String),
    Parse(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::MissingField(field) => write!(f, "missing required config field: {field}"),
            ConfigError::EmptyCoinList => write!(f, "trading.coins must list at least one symbol"),
            ConfigError::InvalidUrl(url) => write!(f, "invalid base_url: {url}"),
            ConfigError::WalletRequiredForLiveMode => {
                write!(f, "wallet.secret_key and wallet.account_address are required when paper_mode is false")
            }
            ConfigError::Io(msg) => write!(f, "failed to read config file: {msg}"),
            ConfigError::Parse(msg) => write!(f, "failed to parse config: {msg}"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Errors surfaced by the gateway while establishing venue connectivity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    NoWalletCredentials,
    SubscriptionFailed { channel: String, reason: String },
    SnapshotUnavailable { symbol: String },
}

impl fmt::Display for GatewayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GatewayError::NoWalletCredentials => {
                write!(f, "live execution requires wallet credentials")
            }
            GatewayError::SubscriptionFailed { channel, reason } => {
                write!(f, "subscription to {channel} failed: {reason}")
            }
            GatewayError::SnapshotUnavailable { symbol } => {
                write!(f, "no REST snapshot available for {symbol}")
            }
        }
    }
}

impl std::error::Error for GatewayError {}

/// Errors raised by the paper execution backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaperExecutionError {
    WouldNotFill,
    UnknownOrder { venue_id: u64 },
    InvalidSize,
}

impl fmt::Display for PaperExecutionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PaperExecutionError::WouldNotFill => write!(f, "IOC would not fill"),
            PaperExecutionError::UnknownOrder { venue_id } => {
                write!(f, "no resting order with venue id {venue_id}")
            }
            PaperExecutionError::InvalidSize => write!(f, "order size must be positive"),
        }
    }
}

impl std::error::Error for PaperExecutionError {}
