//! Ledger integration subsystem.
//!
//! # Data Flow
//! ```text
//! Environment Variables (faucet key) + LedgerConfig (RPC URLs)
//!     → faucet.rs (key loading, grant limits, nonce tracking)
//!     → transaction.rs (build + sign transfers offline)
//!     → client.rs (RPC with timeouts/failover, submit, confirm)
//! ```
//!
//! # Security Constraints
//! - Private keys ONLY from environment variables
//! - Never log private keys or sensitive data
//! - All RPC calls have configurable timeouts
//! - Graceful degradation when the ledger is unreachable

pub mod client;
pub mod faucet;
pub mod transaction;
pub mod types;

pub use client::{LedgerClient, RpcLedgerClient};
pub use faucet::Faucet;
pub use types::{
    ConfirmationStatus, LedgerError, LedgerResult, SignedTransaction, TransferParams,
    TRANSFER_GAS_LIMIT,
};
