//! Wallet provider subsystem.
//!
//! # Data Flow
//! ```text
//! WalletConfig (env var name, approval policy)
//!     → keystore.rs detect() → Option<Arc<dyn WalletProvider>>
//!     → session orchestrator (connect / disconnect / events)
//! ```
//!
//! A missing provider is a valid state, not an error.

pub mod capability;
pub mod keystore;
pub mod types;

pub use capability::WalletProvider;
pub use keystore::{detect, KeystoreProvider};
pub use types::{ConnectOptions, DisplayEncoding, ProviderError, ProviderEvent, ProviderResult};
