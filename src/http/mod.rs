//! HTTP surface.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (request ID, trace, timeout, CORS, metrics)
//!     → handlers/* (AuthUser extractor for protected routes)
//!     → services
//!     → error.rs (domain error → status + {"error": ...})
//! ```

pub mod error;
pub mod handlers;
pub mod server;

pub use error::ApiError;
pub use server::{AppState, HttpServer};
