//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Funding transfer to a new wallet:
//!     → retries.rs (retry transient RPC failures)
//!     → backoff.rs (exponential delay + jitter between attempts)
//! ```
//!
//! # Design Decisions
//! - Every RPC call already has a deadline (see blockchain::client)
//! - Retries are bounded per funder; exhausting them moves on to the next funder

pub mod backoff;
pub mod retries;

pub use retries::{retry_with_backoff, RetryPolicy};
