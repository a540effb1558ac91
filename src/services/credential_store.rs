//! Per-slot credential storage.
//!
//! Every account slot owns `<root>/account<N>/account.db`, a SQLite database
//! whose single `credentials` row holds the AES-256-GCM encrypted access token.
//! Removing a slot deletes its directory and shifts every higher slot down by
//! one so that directory numbers always match registry positions.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use rusqlite::params;
use tracing::{debug, info};

use crate::database::connection::Database;
use crate::services::crypto_service::{CryptoService, CryptoServiceTrait, SecretKey};
use crate::types::credential::{EncryptedData, StoredCredential};
use crate::types::errors::CredentialStoreError;

const SLOT_DIR_PREFIX: &str = "account";
const DB_FILE: &str = "account.db";
const TOKEN_KEY_PASSPHRASE: &str = "gitdesk-token-key-v1";
const TOKEN_KEY_SALT: &[u8] = b"gitdesk-tokensalt";

/// Trait defining per-slot credential persistence.
pub trait CredentialStoreTrait {
    fn slot_dir(&self, slot: usize) -> PathBuf;
    fn is_configured(&self, slot: usize) -> bool;
    fn load(&self, slot: usize) -> Result<Option<StoredCredential>, CredentialStoreError>;
    fn save(&self, slot: usize, credential: &StoredCredential) -> Result<(), CredentialStoreError>;
    fn clear(&self, slot: usize) -> Result<(), CredentialStoreError>;
    /// Deletes `slot` and relocates slots `slot+1..count` down by one.
    fn remove_slot(&self, slot: usize, count: usize) -> Result<(), CredentialStoreError>;
}

/// Credential store rooted at the application config directory.
pub struct CredentialStore {
    root: PathBuf,
    crypto: CryptoService,
    key: SecretKey,
}

impl CredentialStore {
    pub fn new<P: Into<PathBuf>>(root: P) -> Result<Self, CredentialStoreError> {
        let crypto = CryptoService::new();
        let key = crypto.derive_key(TOKEN_KEY_PASSPHRASE, TOKEN_KEY_SALT)?;
        Ok(Self {
            root: root.into(),
            crypto,
            key,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn db_path(&self, slot: usize) -> PathBuf {
        self.slot_dir(slot).join(DB_FILE)
    }

    fn open(&self, slot: usize) -> Result<Database, CredentialStoreError> {
        fs::create_dir_all(self.slot_dir(slot))?;
        Ok(Database::open(self.db_path(slot))?)
    }
}

impl CredentialStoreTrait for CredentialStore {
    fn slot_dir(&self, slot: usize) -> PathBuf {
        self.root.join(format!("{}{}", SLOT_DIR_PREFIX, slot))
    }

    fn is_configured(&self, slot: usize) -> bool {
        self.db_path(slot).is_file()
    }

    fn load(&self, slot: usize) -> Result<Option<StoredCredential>, CredentialStoreError> {
        if !self.is_configured(slot) {
            return Ok(None);
        }
        let db = self.open(slot)?;
        let row = db.connection().query_row(
            "SELECT encrypted_token, iv, auth_tag, login, display_name, avatar_url FROM credentials WHERE id = 'default'",
            [],
            |row| {
                Ok((
                    EncryptedData {
                        ciphertext: row.get(0)?,
                        iv: row.get(1)?,
                        auth_tag: row.get(2)?,
                    },
                    row.get::<_, String>(3)?,
                    row.get::<_, Option<String>>(4)?,
                    row.get::<_, Option<String>>(5)?,
                ))
            },
        );

        match row {
            Ok((encrypted, login, display_name, avatar_url)) => {
                let token = self.crypto.open_token(&encrypted, &self.key)?;
                Ok(Some(StoredCredential {
                    token,
                    login,
                    display_name,
                    avatar_url,
                }))
            }
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, slot: usize, credential: &StoredCredential) -> Result<(), CredentialStoreError> {
        let encrypted = self
            .crypto
            .seal_token(&credential.token, &self.key)?;
        let db = self.open(slot)?;
        db.connection().execute(
            "INSERT OR REPLACE INTO credentials (id, encrypted_token, iv, auth_tag, login, display_name, avatar_url, updated_at) VALUES ('default', ?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                encrypted.ciphertext,
                encrypted.iv,
                encrypted.auth_tag,
                credential.login,
                credential.display_name,
                credential.avatar_url,
                Utc::now().timestamp()
            ],
        )?;
        debug!(slot, login = %credential.login, "stored credential");
        Ok(())
    }

    fn clear(&self, slot: usize) -> Result<(), CredentialStoreError> {
        if !self.is_configured(slot) {
            return Ok(());
        }
        let db = self.open(slot)?;
        db.connection().execute("DELETE FROM credentials", [])?;
        debug!(slot, "cleared credential");
        Ok(())
    }

    fn remove_slot(&self, slot: usize, count: usize) -> Result<(), CredentialStoreError> {
        let dir = self.slot_dir(slot);
        if dir.exists() {
            fs::remove_dir_all(&dir)?;
        }
        for j in slot + 1..count {
            let from = self.slot_dir(j);
            if from.exists() {
                fs::rename(&from, self.slot_dir(j - 1))?;
            }
        }
        info!(slot, count, "removed credential slot");
        Ok(())
    }
}
