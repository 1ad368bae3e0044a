//! Voter authentication API.
//!
//! Accounts sign up with an e-mail and password and receive a freshly
//! generated wallet, funded from node-managed accounts. Signed-in users
//! create and run elections on a ledger (in-memory or the deployed Voting
//! contract) where every action is signed with their own wallet.
//!
//! # Architecture Overview
//!
//! ```text
//!   Client ──▶ http (router, AuthUser) ──▶ services ──┬─▶ accounts (UserStore)
//!                                                     ├─▶ auth (JWT, bcrypt)
//!                                                     ├─▶ blockchain (client, provisioner)
//!                                                     ├─▶ ledger (ElectionLedger)
//!                                                     └─▶ mail (Mailer)
//!
//!   Cross-cutting: config, observability, resilience, lifecycle
//! ```

// Core subsystems
pub mod accounts;
pub mod auth;
pub mod blockchain;
pub mod config;
pub mod http;
pub mod ledger;
pub mod mail;
pub mod services;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;
pub mod resilience;

pub use config::ServiceConfig;
pub use http::{AppState, HttpServer};
pub use lifecycle::Shutdown;
