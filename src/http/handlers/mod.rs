//! Route handlers, grouped by resource.
//!
//! Handlers only unpack the request and call a service; status mapping
//! lives in `http::error`.

pub mod admin;
pub mod auth;
pub mod candidates;
pub mod elections;
pub mod health;
pub mod invites;
pub mod wallet;

use serde::Serialize;

/// Plain acknowledgement body.
#[derive(Debug, Serialize)]
pub struct Message {
    pub message: &'static str,
}

pub(crate) fn message(message: &'static str) -> axum::Json<Message> {
    axum::Json(Message { message })
}
