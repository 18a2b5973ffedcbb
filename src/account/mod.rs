//! Ephemeral account subsystem.
//!
//! # Data Flow
//! ```text
//! create_and_fund intent
//!     → manager.rs (check-and-set Funding, generate, install, fund)
//!     → ephemeral.rs (random keypair, signs outgoing transfers)
//!     → LedgerClient (grant, confirm, balance)
//!     → SessionStore (balance + funding state)
//! ```
//!
//! # Security Constraints
//! - The ephemeral key is held in memory only and dropped with its account
//! - Snapshots expose the address and balance, never the key

pub mod ephemeral;
pub mod manager;

pub use ephemeral::EphemeralAccount;
pub use manager::AccountManager;
