//! Session subsystem: state, intents and the store that publishes them.
//!
//! # Data Flow
//! ```text
//! consumer intent
//!     → orchestrator.rs (preconditions, provider + ledger calls)
//!     → account::AccountManager (ephemeral account funding)
//!     → store.rs (watch channel, check-and-set)
//!     → state.rs snapshots → consumers (render, serialize)
//! ```
//!
//! # Design Decisions
//! - The orchestrator and account manager are the only writers
//! - Consumers never see a mutable reference, only cloned snapshots
//! - Snapshots contain no key material

pub mod error;
pub mod orchestrator;
pub mod state;
pub mod store;

pub use error::{Precondition, SessionError, SessionResult};
pub use orchestrator::SessionOrchestrator;
pub use state::{
    AccountView, ConnectionState, FundingState, ProviderPresence, SessionSnapshot,
    TransferRecord, TransferStatus, WalletSession, TRANSFER_HISTORY_LIMIT,
};
pub use store::SessionStore;
