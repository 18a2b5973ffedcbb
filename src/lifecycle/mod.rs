//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Shutdown (shutdown.rs):
//!     trigger() → root CancellationToken cancelled
//!               → session child tokens cancelled
//!               → suspended intents and follow-up funding return
//!
//! Signals (signals.rs):
//!     SIGINT (Ctrl-C) → Shutdown::trigger()
//! ```
//!
//! # Design Decisions
//! - One root token per process; every session derives a child token
//! - Suspension points race the token instead of polling a flag

pub mod shutdown;
pub mod signals;

pub use shutdown::{cancellable, Shutdown};
