//! JWT issuance and verification (HS256).
//!
//! Two token kinds share the secret but not their claims: a session token
//! identifies a user, a recovery token authorizes one password reset for an
//! e-mail. Neither verifies as the other.

use alloy::primitives::Address;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::accounts::{Role, UserRecord};
use crate::accounts::types::unix_now;
use crate::auth::AuthError;
use crate::config::AuthConfig;

const RECOVERY_PURPOSE: &str = "recovery";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionClaims {
    pub user_id: u64,
    pub user_name: String,
    pub user_email: String,
    pub user_wallet: Address,
    pub role: Role,
    pub iat: u64,
    pub exp: u64,
}

impl SessionClaims {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecoveryClaims {
    pub email: String,
    pub purpose: String,
    pub iat: u64,
    pub exp: u64,
}

/// Signs and verifies tokens with the configured secret.
#[derive(Clone)]
pub struct TokenIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    session_ttl_secs: u64,
    recovery_ttl_secs: u64,
}

impl TokenIssuer {
    pub fn new(config: &AuthConfig) -> Self {
        let secret = config.jwt_secret.as_bytes();
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp"]);

        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation,
            session_ttl_secs: config.token_ttl_secs,
            recovery_ttl_secs: config.recovery_ttl_secs,
        }
    }

    pub fn issue_session(&self, user: &UserRecord) -> Result<String, AuthError> {
        let iat = unix_now();
        self.sign(&SessionClaims {
            user_id: user.id,
            user_name: user.name.clone(),
            user_email: user.email.clone(),
            user_wallet: user.wallet.address,
            role: user.role,
            iat,
            exp: iat + self.session_ttl_secs,
        })
    }

    pub fn issue_recovery(&self, email: &str) -> Result<String, AuthError> {
        let iat = unix_now();
        self.sign(&RecoveryClaims {
            email: email.to_string(),
            purpose: RECOVERY_PURPOSE.to_string(),
            iat,
            exp: iat + self.recovery_ttl_secs,
        })
    }

    pub fn verify_session(&self, token: &str) -> Result<SessionClaims, AuthError> {
        self.verify(token)
    }

    pub fn verify_recovery(&self, token: &str) -> Result<RecoveryClaims, AuthError> {
        let claims: RecoveryClaims = self.verify(token)?;
        if claims.purpose != RECOVERY_PURPOSE {
            return Err(AuthError::InvalidToken("not a recovery token".into()));
        }
        Ok(claims)
    }

    fn sign<T: Serialize>(&self, claims: &T) -> Result<String, AuthError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding)
            .map_err(|e| AuthError::Signing(e.to_string()))
    }

    fn verify<T: DeserializeOwned>(&self, token: &str) -> Result<T, AuthError> {
        decode::<T>(token, &self.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                _ => AuthError::InvalidToken(e.to_string()),
            })
    }
}

impl std::fmt::Debug for TokenIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenIssuer")
            .field("session_ttl_secs", &self.session_ttl_secs)
            .field("recovery_ttl_secs", &self.recovery_ttl_secs)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accounts::WalletRecord;

    fn issuer() -> TokenIssuer {
        TokenIssuer::new(&AuthConfig::default())
    }

    fn user() -> UserRecord {
        UserRecord {
            id: 7,
            name: "Ana".into(),
            email: "ana@example.com".into(),
            password_hash: String::new(),
            role: Role::User,
            wallet: WalletRecord {
                address: Address::repeat_byte(0x11),
                private_key: String::new(),
                created_at: 0,
                updated_at: 0,
                funding: Vec::new(),
            },
            created_at: 0,
            updated_at: 0,
        }
    }

    #[test]
    fn test_session_round_trip() {
        let issuer = issuer();
        let token = issuer.issue_session(&user()).unwrap();
        let claims = issuer.verify_session(&token).unwrap();
        assert_eq!(claims.user_id, 7);
        assert_eq!(claims.user_wallet, Address::repeat_byte(0x11));
        assert!(!claims.is_admin());
        assert_eq!(claims.exp - claims.iat, 86_400);
    }

    #[test]
    fn test_session_claim_names() {
        let issuer = issuer();
        let token = issuer.issue_session(&user()).unwrap();
        let payload: serde_json::Value =
            decode::<serde_json::Value>(&token, &issuer.decoding, &issuer.validation)
                .unwrap()
                .claims;
        for claim in ["userId", "userName", "userEmail", "userWallet", "role", "exp", "iat"] {
            assert!(payload.get(claim).is_some(), "missing {claim}");
        }
    }

    #[test]
    fn test_token_kinds_do_not_mix() {
        let issuer = issuer();
        let session = issuer.issue_session(&user()).unwrap();
        let recovery = issuer.issue_recovery("ana@example.com").unwrap();

        assert_eq!(issuer.verify_recovery(&recovery).unwrap().email, "ana@example.com");
        assert!(matches!(issuer.verify_session(&recovery), Err(AuthError::InvalidToken(_))));
        assert!(matches!(issuer.verify_recovery(&session), Err(AuthError::InvalidToken(_))));
    }

    #[test]
    fn test_expired_token() {
        let issuer = issuer();
        let now = unix_now();
        let token = issuer
            .sign(&RecoveryClaims {
                email: "ana@example.com".into(),
                purpose: RECOVERY_PURPOSE.into(),
                iat: now - 100,
                exp: now - 10,
            })
            .unwrap();
        assert!(matches!(issuer.verify_recovery(&token), Err(AuthError::TokenExpired)));
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let token = issuer().issue_session(&user()).unwrap();
        let other = TokenIssuer::new(&AuthConfig {
            jwt_secret: "another-secret-that-is-long-enough-0000".into(),
            ..AuthConfig::default()
        });
        assert!(matches!(other.verify_session(&token), Err(AuthError::InvalidToken(_))));
        assert!(issuer().verify_session("garbage").is_err());
    }
}
