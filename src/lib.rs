//! Devnet wallet session library.
//!
//! Connects a user's wallet, funds a throwaway ephemeral account from a devnet
//! faucet and moves funds from that account back to the wallet, publishing
//! every step as an observable session snapshot.

pub mod account;
pub mod config;
pub mod ledger;
pub mod lifecycle;
pub mod observability;
pub mod provider;
pub mod session;

pub use config::schema::SessionConfig;
pub use lifecycle::Shutdown;
pub use session::{SessionError, SessionOrchestrator, SessionSnapshot};
