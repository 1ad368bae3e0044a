//! User accounts and their wallets.

pub mod store;
pub mod types;

pub use store::{AccountError, EmailReservation, UserStore};
pub use types::{NewUser, Role, UserRecord, UserSummary, UserView, WalletRecord};
