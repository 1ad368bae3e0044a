//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! http, services, blockchain, ledger
//!     → logging.rs (tracing events; request spans carry x-request-id)
//!     → metrics.rs (requests, provisioning, funding transfers, ledger ops)
//!
//! Consumers:
//!     → stdout (pretty or JSON lines)
//!     → Prometheus scrape endpoint, when enabled
//! ```
//!
//! Without an installed recorder the metric macros are no-ops.

pub mod logging;
pub mod metrics;
