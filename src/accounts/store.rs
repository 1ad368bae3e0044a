//! User store with JSON persistence.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use thiserror::Error;

use crate::accounts::types::{unix_now, NewUser, Role, UserRecord, WalletRecord};
use crate::blockchain::types::FundingTransfer;

#[derive(Debug, Error)]
pub enum AccountError {
    #[error("An account with this e-mail already exists")]
    DuplicateEmail,

    #[error("User not found")]
    NotFound,

    #[error("Store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Store format error: {0}")]
    Format(#[from] serde_json::Error),
}

/// Index value of an e-mail that is reserved but not yet bound to a user.
const RESERVED: u64 = 0;

/// Concurrent user store keyed by id, with a case-insensitive e-mail index.
///
/// With a persistence path every mutation is written through to disk.
#[derive(Clone, Default)]
pub struct UserStore {
    users: Arc<DashMap<u64, UserRecord>>,
    /// Lower-cased e-mail -> user id, or `RESERVED`.
    emails: Arc<DashMap<String, u64>>,
    /// Last id handed out; ids start at 1.
    last_id: Arc<AtomicU64>,
    persistence_path: Option<String>,
    /// Serializes snapshot writes.
    write_lock: Arc<Mutex<()>>,
}

fn email_key(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Exclusive claim on an e-mail address, held while a sign-up is in
/// progress. Dropping it without [`UserStore::insert_reserved`] frees the
/// address again.
pub struct EmailReservation {
    emails: Arc<DashMap<String, u64>>,
    key: String,
    bound: bool,
}

impl Drop for EmailReservation {
    fn drop(&mut self) {
        if !self.bound {
            self.emails.remove_if(&self.key, |_, id| *id == RESERVED);
        }
    }
}

impl UserStore {
    pub fn new(persistence_path: Option<String>) -> Self {
        Self {
            persistence_path,
            ..Self::default()
        }
    }

    /// Load from file if it exists; an absent file gives an empty store.
    pub fn load_from_file(path: &str) -> Result<Self, AccountError> {
        let store = Self::new(Some(path.to_string()));
        if Path::new(path).exists() {
            let reader = BufReader::new(File::open(path)?);
            let users: Vec<UserRecord> = serde_json::from_reader(reader)?;
            for user in users {
                store.last_id.fetch_max(user.id, Ordering::SeqCst);
                store.emails.insert(email_key(&user.email), user.id);
                store.users.insert(user.id, user);
            }
            tracing::info!("Loaded {} users from store file", store.users.len());
        }
        Ok(store)
    }

    /// Write every user to the persistence path, if one is configured.
    ///
    /// The snapshot goes to a temporary file first and is renamed into place.
    pub fn save_to_file(&self) -> Result<(), AccountError> {
        let Some(path) = &self.persistence_path else {
            return Ok(());
        };
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());

        let mut users: Vec<UserRecord> = self.users.iter().map(|r| r.value().clone()).collect();
        users.sort_by_key(|u| u.id);

        let tmp = format!("{}.tmp", path);
        let mut writer = BufWriter::new(File::create(&tmp)?);
        serde_json::to_writer(&mut writer, &users)?;
        writer.flush()?;
        writer.get_ref().sync_all()?;
        drop(writer);
        fs::rename(&tmp, path)?;
        tracing::debug!("Saved {} users to store file", users.len());
        Ok(())
    }

    /// Write-through after a mutation. The in-memory state stays
    /// authoritative; a failed write is retried by the next one.
    fn persist(&self) {
        if let Err(e) = self.save_to_file() {
            tracing::error!(error = %e, "Failed to persist user store");
        }
    }

    /// Claim `email` until the returned reservation is used or dropped.
    pub fn reserve_email(&self, email: &str) -> Result<EmailReservation, AccountError> {
        match self.emails.entry(email_key(email)) {
            Entry::Occupied(_) => Err(AccountError::DuplicateEmail),
            Entry::Vacant(slot) => {
                let key = slot.key().clone();
                slot.insert(RESERVED);
                Ok(EmailReservation {
                    emails: self.emails.clone(),
                    key,
                    bound: false,
                })
            }
        }
    }

    /// Insert a new user. The first user ever registered becomes the admin.
    pub fn insert(&self, new_user: NewUser) -> Result<UserRecord, AccountError> {
        let reservation = self.reserve_email(&new_user.email)?;
        Ok(self.insert_reserved(reservation, new_user))
    }

    /// Insert a user under an e-mail already reserved by the caller.
    pub fn insert_reserved(&self, mut reservation: EmailReservation, new_user: NewUser) -> UserRecord {
        let id = self.last_id.fetch_add(1, Ordering::SeqCst) + 1;
        let now = unix_now();
        let user = UserRecord {
            id,
            name: new_user.name,
            email: new_user.email.trim().to_string(),
            password_hash: new_user.password_hash,
            role: if id == 1 { Role::Admin } else { Role::User },
            wallet: WalletRecord {
                address: new_user.wallet_address,
                private_key: new_user.private_key,
                created_at: now,
                updated_at: now,
                funding: Vec::new(),
            },
            created_at: now,
            updated_at: now,
        };
        self.users.insert(id, user.clone());
        self.emails.insert(reservation.key.clone(), id);
        reservation.bound = true;
        self.persist();
        user
    }

    pub fn get(&self, id: u64) -> Option<UserRecord> {
        self.users.get(&id).map(|r| r.value().clone())
    }

    pub fn find_by_email(&self, email: &str) -> Option<UserRecord> {
        let id = *self.emails.get(&email_key(email))?;
        if id == RESERVED {
            return None;
        }
        self.get(id)
    }

    /// Users whose name contains `name`, ignoring case. `None` lists everyone.
    pub fn search_by_name(&self, name: Option<&str>) -> Vec<UserRecord> {
        let needle = name.map(|n| n.trim().to_lowercase()).filter(|n| !n.is_empty());
        let mut users: Vec<UserRecord> = self
            .users
            .iter()
            .filter(|r| {
                needle
                    .as_deref()
                    .map_or(true, |n| r.value().name.to_lowercase().contains(n))
            })
            .map(|r| r.value().clone())
            .collect();
        users.sort_by_key(|u| u.id);
        users
    }

    pub fn update_password(&self, id: u64, password_hash: String) -> Result<(), AccountError> {
        {
            let mut user = self.users.get_mut(&id).ok_or(AccountError::NotFound)?;
            user.password_hash = password_hash;
            user.updated_at = unix_now();
        }
        self.persist();
        Ok(())
    }

    /// Append funding transfers to a user's wallet record.
    pub fn record_funding(
        &self,
        id: u64,
        transfers: Vec<FundingTransfer>,
    ) -> Result<(), AccountError> {
        {
            let mut user = self.users.get_mut(&id).ok_or(AccountError::NotFound)?;
            user.wallet.funding.extend(transfers);
            user.wallet.updated_at = unix_now();
        }
        self.persist();
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::types::TransferOutcome;
    use alloy::primitives::{Address, U256};

    fn new_user(name: &str, email: &str) -> NewUser {
        NewUser {
            name: name.to_string(),
            email: email.to_string(),
            password_hash: "hash".to_string(),
            wallet_address: Address::repeat_byte(1),
            private_key: "0x01".to_string(),
        }
    }

    #[test]
    fn test_first_user_is_admin() {
        let store = UserStore::new(None);
        let first = store.insert(new_user("Ana", "ana@example.com")).unwrap();
        let second = store.insert(new_user("Bruno", "bruno@example.com")).unwrap();
        assert_eq!((first.id, first.role), (1, Role::Admin));
        assert_eq!((second.id, second.role), (2, Role::User));
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_email_unique_ignoring_case() {
        let store = UserStore::new(None);
        store.insert(new_user("Ana", "Ana@Example.com")).unwrap();
        let err = store.insert(new_user("Other", " ana@example.COM ")).unwrap_err();
        assert!(matches!(err, AccountError::DuplicateEmail));
        assert_eq!(store.find_by_email("ANA@example.com").unwrap().name, "Ana");
        assert!(store.find_by_email("nobody@example.com").is_none());
    }

    #[test]
    fn test_concurrent_inserts_keep_one_per_email() {
        let store = UserStore::new(None);
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = store.clone();
                std::thread::spawn(move || store.insert(new_user(&format!("u{i}"), "same@example.com")))
            })
            .collect();
        let ok = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(Result::is_ok)
            .count();
        assert_eq!(ok, 1);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_reservation_blocks_email_until_dropped() {
        let store = UserStore::new(None);
        let held = store.reserve_email("Ana@example.com").unwrap();
        assert!(matches!(
            store.reserve_email("ana@EXAMPLE.com"),
            Err(AccountError::DuplicateEmail)
        ));
        assert!(store.find_by_email("ana@example.com").is_none());
        drop(held);

        let held = store.reserve_email("ana@example.com").unwrap();
        let user = store.insert_reserved(held, new_user("Ana", "ana@example.com"));
        assert_eq!(store.find_by_email("ANA@example.com").unwrap().id, user.id);
        assert!(matches!(
            store.insert(new_user("Other", "ana@example.com")),
            Err(AccountError::DuplicateEmail)
        ));
    }

    #[test]
    fn test_search_by_name() {
        let store = UserStore::new(None);
        store.insert(new_user("Maria Silva", "maria@example.com")).unwrap();
        store.insert(new_user("João Silva", "joao@example.com")).unwrap();
        store.insert(new_user("Pedro", "pedro@example.com")).unwrap();

        assert_eq!(store.search_by_name(Some("silva")).len(), 2);
        assert_eq!(store.search_by_name(Some("PEDRO"))[0].email, "pedro@example.com");
        assert_eq!(store.search_by_name(None).len(), 3);
        assert_eq!(store.search_by_name(Some("  ")).len(), 3);
    }

    #[test]
    fn test_update_password_and_funding() {
        let store = UserStore::new(None);
        let user = store.insert(new_user("Ana", "ana@example.com")).unwrap();

        store.update_password(user.id, "new-hash".into()).unwrap();
        store
            .record_funding(
                user.id,
                vec![FundingTransfer {
                    funder: Address::repeat_byte(2),
                    value: U256::from(5u64),
                    tx_hash: None,
                    outcome: TransferOutcome::Confirmed { block_number: 1 },
                    at: 1,
                }],
            )
            .unwrap();

        let user = store.get(user.id).unwrap();
        assert_eq!(user.password_hash, "new-hash");
        assert_eq!(user.wallet.funding.len(), 1);
        assert!(matches!(store.update_password(99, "x".into()), Err(AccountError::NotFound)));
    }

    #[test]
    fn test_persistence() {
        let path = format!("test_users_{}.json", uuid::Uuid::new_v4());

        let store = UserStore::new(Some(path.clone()));
        store.insert(new_user("Ana", "ana@example.com")).unwrap();
        store.insert(new_user("Bruno", "bruno@example.com")).unwrap();
        store.save_to_file().unwrap();

        let loaded = UserStore::load_from_file(&path).unwrap();
        assert_eq!(loaded.len(), 2);
        assert!(loaded.find_by_email("BRUNO@example.com").is_some());
        // ids continue after the highest persisted one
        let third = loaded.insert(new_user("Carla", "carla@example.com")).unwrap();
        assert_eq!((third.id, third.role), (3, Role::User));

        std::fs::remove_file(&path).unwrap_or_default();
    }

    #[test]
    fn test_mutations_are_written_through() {
        let path = format!("test_users_{}.json", uuid::Uuid::new_v4());

        let store = UserStore::new(Some(path.clone()));
        let user = store.insert(new_user("Ana", "ana@example.com")).unwrap();
        store.update_password(user.id, "new-hash".into()).unwrap();

        // no explicit save: a crash here must not lose the account
        let loaded = UserStore::load_from_file(&path).unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded.get(user.id).unwrap().password_hash, "new-hash");
        assert!(!Path::new(&format!("{}.tmp", path)).exists());

        std::fs::remove_file(&path).unwrap_or_default();
    }

    #[test]
    fn test_missing_file_gives_empty_store() {
        let store = UserStore::load_from_file("does-not-exist-users.json").unwrap();
        assert!(store.is_empty());
    }
}
