//! Wallet provider request and event types.

use alloy::primitives::Address;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Options accepted by a provider's connect call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectOptions {
    /// Only connect if the application is already trusted; never prompt.
    pub only_if_trusted: bool,
}

/// How a message should be shown to the user when asked to sign it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplayEncoding {
    #[default]
    Utf8,
    Hex,
}

/// Unsolicited notifications pushed by a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderEvent {
    Connect(Address),
    Disconnect,
    /// The user switched accounts; `None` means no account is exposed anymore.
    AccountChanged(Option<Address>),
}

/// Errors reported by a wallet provider.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProviderError {
    /// The user declined the request.
    #[error("Request rejected: {0}")]
    Rejected(String),

    /// `only_if_trusted` was requested but the application is not trusted.
    #[error("Application is not trusted by the wallet")]
    NotTrusted,

    /// The operation needs a connected wallet.
    #[error("Wallet is not connected")]
    NotConnected,

    #[error("Signing failed: {0}")]
    Signing(String),

    /// The extension failed internally or did not answer.
    #[error("Provider unavailable: {0}")]
    Unavailable(String),
}

/// Result type for provider operations.
pub type ProviderResult<T> = Result<T, ProviderError>;
