//! Password hashing with bcrypt.
//!
//! Both calls are CPU-bound; async callers run them on the blocking pool.

use crate::auth::AuthError;

pub fn hash(password: &str, cost: u32) -> Result<String, AuthError> {
    bcrypt::hash(password, cost).map_err(|e| AuthError::Hashing(e.to_string()))
}

/// A malformed stored hash counts as a mismatch.
pub fn verify(password: &str, hash: &str) -> bool {
    match bcrypt::verify(password, hash) {
        Ok(matches) => matches,
        Err(e) => {
            tracing::warn!(error = %e, "Stored password hash could not be checked");
            false
        }
    }
}
