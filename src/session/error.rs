//! Conditions reported by session intents.

use serde::Serialize;
use thiserror::Error;

/// Why a transfer was refused before touching the ledger.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Precondition {
    #[error("wallet is not connected")]
    WalletNotConnected,

    #[error("ephemeral account is not funded")]
    AccountNotFunded,

    #[error("a transfer is already in flight")]
    TransferInFlight,
}

/// Errors surfaced at the orchestrator boundary.
///
/// Every variant is also mirrored into the snapshot's `notice`, so a consumer
/// can render from state alone.
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum SessionError {
    /// No compatible wallet provider was detected.
    #[error("No compatible wallet provider detected")]
    ProviderAbsent,

    /// User or extension rejected the connect request.
    #[error("Connection declined: {0}")]
    ConnectionDeclined(String),

    #[error("Precondition not met: {0}")]
    PreconditionNotMet(Precondition),

    /// A funding grant or its confirmation did not succeed.
    #[error("Funding failed: {0}")]
    FundingFailed(String),

    /// Submission or confirmation of the signed transfer failed.
    #[error("Transfer failed: {0}")]
    TransferFailed(String),

    /// The session was shut down while the operation was suspended.
    #[error("Operation cancelled")]
    Cancelled,
}

/// Result type for session intents.
pub type SessionResult<T> = Result<T, SessionError>;
