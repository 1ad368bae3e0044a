//! Per-user wallet generation and key handling.
//!
//! # Security
//! - Keys are never logged; `Debug` prints the address only
//! - The hex private key is only produced for persistence in the user store

use alloy::hex;
use alloy::primitives::Address;
use alloy::signers::local::PrivateKeySigner;

use crate::blockchain::types::{BlockchainError, BlockchainResult};

/// A freshly generated (or restored) secp256k1 keypair.
#[derive(Clone)]
pub struct GeneratedWallet {
    signer: PrivateKeySigner,
}

impl GeneratedWallet {
    /// Generate a new random keypair.
    pub fn generate() -> Self {
        Self {
            signer: PrivateKeySigner::random(),
        }
    }

    /// Restore a wallet from a hex-encoded private key (with or without 0x prefix).
    pub fn from_private_key(private_key_hex: &str) -> BlockchainResult<Self> {
        let key_hex = private_key_hex.strip_prefix("0x").unwrap_or(private_key_hex);

        let signer: PrivateKeySigner = key_hex
            .parse()
            .map_err(|e| BlockchainError::Wallet(format!("Invalid private key format: {}", e)))?;

        Ok(Self { signer })
    }

    /// Get the wallet's address.
    pub fn address(&self) -> Address {
        self.signer.address()
    }

    /// 0x-prefixed hex of the 32-byte private key.
    pub fn private_key_hex(&self) -> String {
        hex::encode_prefixed(self.signer.to_bytes())
    }

    /// A signer for contract transactions sent on behalf of this wallet.
    pub fn signer(&self) -> PrivateKeySigner {
        self.signer.clone()
    }
}

impl std::fmt::Debug for GeneratedWallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeneratedWallet")
            .field("address", &self.address())
            .finish_non_exhaustive()
    }
}
