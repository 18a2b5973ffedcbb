//! Ledger-facing types and error definitions.

use alloy::primitives::{Bytes, TxHash};
use thiserror::Error;

pub use crate::config::schema::LedgerConfig;

/// Gas cost of a plain value transfer.
pub const TRANSFER_GAS_LIMIT: u64 = 21_000;

/// Errors that can occur during ledger operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LedgerError {
    /// RPC connection or request failed.
    #[error("RPC error: {0}")]
    Rpc(String),

    /// Transaction was not confirmed within expected time.
    #[error("Transaction not confirmed after {0} seconds")]
    ConfirmationTimeout(u64),

    /// The faucet refused or cannot serve a funding grant.
    #[error("Funding rejected: {0}")]
    FundingRejected(String),

    /// Signing or key handling failed.
    #[error("Signing error: {0}")]
    Signing(String),

    /// Gas price exceeded maximum allowed.
    #[error("Gas price {current_gwei} gwei exceeds maximum {max_gwei} gwei")]
    GasPriceTooHigh { current_gwei: u64, max_gwei: u64 },

    /// Chain configuration mismatch.
    #[error("Chain ID mismatch: expected {expected}, got {actual}")]
    ChainMismatch { expected: u64, actual: u64 },
}

/// Result type for ledger operations.
pub type LedgerResult<T> = Result<T, LedgerError>;

/// Final outcome of waiting on a submitted transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfirmationStatus {
    /// Transaction is included with the required block depth.
    Confirmed { block_number: u64 },
    /// Transaction was included but reverted, or was dropped.
    Failed(String),
}

impl ConfirmationStatus {
    pub fn is_confirmed(&self) -> bool {
        matches!(self, ConfirmationStatus::Confirmed { .. })
    }
}

/// Chain parameters needed to sign a transfer offline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferParams {
    pub chain_id: u64,
    pub nonce: u64,
    /// Gas price in wei, safety multiplier already applied.
    pub gas_price: u128,
    pub gas_limit: u64,
}

/// A signed, EIP-2718 encoded transaction ready for submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTransaction {
    pub hash: TxHash,
    pub raw: Bytes,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = LedgerError::ConfirmationTimeout(60);
        assert_eq!(err.to_string(), "Transaction not confirmed after 60 seconds");

        let err = LedgerError::GasPriceTooHigh {
            current_gwei: 600,
            max_gwei: 500,
        };
        assert!(err.to_string().contains("600"));

        let err = LedgerError::FundingRejected("rate limited".into());
        assert_eq!(err.to_string(), "Funding rejected: rate limited");
    }

    #[test]
    fn test_confirmation_status() {
        assert!(ConfirmationStatus::Confirmed { block_number: 7 }.is_confirmed());
        assert!(!ConfirmationStatus::Failed("reverted".into()).is_confirmed());
    }
}
