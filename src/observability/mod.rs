//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Ledger, provider, account manager and orchestrator produce:
//!     → logging.rs (structured log events via tracing)
//!     → metrics.rs (intent/funding/transfer counters, ledger health gauge)
//!
//! Consumers:
//!     → stderr (pretty or JSON lines)
//!     → Metrics endpoint (Prometheus scrape, optional)
//! ```
//!
//! # Design Decisions
//! - Secrets never reach a log line or metric label
//! - Metric calls are no-ops until an exporter is installed

pub mod logging;
pub mod metrics;
