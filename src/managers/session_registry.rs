//! Session Registry for GitDesk.
//!
//! Ordered list of signed-in accounts plus the "current account" pointer.
//! Slot `i` of the registry owns credential directory `account<i>`; removing
//! an account deletes its directory and renumbers every higher slot so the
//! two stay aligned. The registry is mutated only from the UI thread; the
//! current account is published on a `watch` channel for background tasks.

use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::json;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::managers::account::Account;
use crate::services::credential_store::{CredentialStore, CredentialStoreTrait};
use crate::services::device_flow::AuthPrompt;
use crate::services::http_transport::HttpTransport;
use crate::services::settings_engine::{SettingsEngine, SettingsEngineTrait};
use crate::types::auth::SetupOutcome;
use crate::types::errors::{RegistryError, SettingsError};

const ACCOUNTS_KEY: &str = "general.accounts";

/// Builds the `Account` for a slot.
pub trait AccountFactory: Send + Sync {
    fn create(&self, slot: usize) -> Arc<Account>;
}

/// Production factory: every account shares the credential store, transport
/// and auth prompt.
pub struct DefaultAccountFactory {
    store: Arc<CredentialStore>,
    transport: Arc<dyn HttpTransport>,
    prompt: Arc<dyn AuthPrompt>,
}

impl DefaultAccountFactory {
    pub fn new(store: Arc<CredentialStore>, transport: Arc<dyn HttpTransport>, prompt: Arc<dyn AuthPrompt>) -> Self {
        Self {
            store,
            transport,
            prompt,
        }
    }
}

impl AccountFactory for DefaultAccountFactory {
    fn create(&self, slot: usize) -> Arc<Account> {
        Arc::new(Account::new(
            slot,
            Arc::clone(&self.store),
            Arc::clone(&self.transport),
            Arc::clone(&self.prompt),
        ))
    }
}

/// Result of `add_account`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddAccountOutcome {
    /// Appended at this registry position.
    Added(usize),
    /// `exit_requested` is set when no account exists, since nothing is usable.
    Cancelled { exit_requested: bool },
    Failed { reason: String, exit_requested: bool },
}

impl AddAccountOutcome {
    pub fn exit_requested(&self) -> bool {
        matches!(
            self,
            AddAccountOutcome::Cancelled { exit_requested: true }
                | AddAccountOutcome::Failed {
                    exit_requested: true,
                    ..
                }
        )
    }
}

pub struct SessionRegistry {
    accounts: Vec<Arc<Account>>,
    current: Option<usize>,
    factory: Arc<dyn AccountFactory>,
    store: Arc<CredentialStore>,
    settings: Arc<Mutex<SettingsEngine>>,
    current_tx: watch::Sender<Option<Arc<Account>>>,
}

impl SessionRegistry {
    pub fn new(factory: Arc<dyn AccountFactory>, store: Arc<CredentialStore>, settings: Arc<Mutex<SettingsEngine>>) -> Self {
        let (current_tx, _) = watch::channel(None);
        Self {
            accounts: Vec::new(),
            current: None,
            factory,
            store,
            settings,
            current_tx,
        }
    }

    pub fn accounts(&self) -> &[Arc<Account>] {
        &self.accounts
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    pub fn current(&self) -> Option<Arc<Account>> {
        self.current.and_then(|i| self.accounts.get(i)).cloned()
    }

    pub fn current_index(&self) -> Option<usize> {
        self.current
    }

    /// Follows the current account from other tasks.
    pub fn subscribe(&self) -> watch::Receiver<Option<Arc<Account>>> {
        self.current_tx.subscribe()
    }

    fn publish_current(&self) {
        self.current_tx.send_replace(self.current());
    }

    /// Account count recorded in settings.
    pub fn persisted_count(&self) -> usize {
        self.settings.lock().get_or(ACCOUNTS_KEY, 1usize)
    }

    fn set_persisted_count(&self, count: usize) -> Result<(), SettingsError> {
        self.settings.lock().set_value(ACCOUNTS_KEY, json!(count))
    }

    fn holds_slot(&self, slot: usize) -> bool {
        self.accounts.iter().any(|a| a.slot() == slot)
    }

    /// Lowest slot that no account holds and that has no stored credential.
    pub fn next_free_slot(&self) -> usize {
        (0..)
            .find(|&slot| !self.holds_slot(slot) && !self.store.is_configured(slot))
            .unwrap_or(self.accounts.len())
    }

    /// Number of slot directories the store may hold.
    fn slot_span(&self) -> usize {
        let highest = self.accounts.iter().map(|a| a.slot() + 1).max().unwrap_or(0);
        self.persisted_count().max(self.accounts.len()).max(highest)
    }

    /// Moves every account above `vacated` down one slot.
    fn shift_down_above(&self, vacated: usize) {
        for account in &self.accounts {
            let slot = account.slot();
            if slot > vacated {
                account.set_slot(slot - 1);
            }
        }
    }

    /// Signs in the account for `slot` (next free slot when `None`) and
    /// appends it once it is ready. The first account added becomes current.
    pub async fn add_account(&mut self, slot: Option<usize>) -> AddAccountOutcome {
        let slot = slot.unwrap_or_else(|| self.next_free_slot());
        let account = self.factory.create(slot);

        match account.connect().await {
            SetupOutcome::Ready => {
                self.accounts.push(account);
                let position = self.accounts.len() - 1;
                if self.current.is_none() {
                    self.current = Some(position);
                    self.publish_current();
                }
                if self.persisted_count() < slot + 1 {
                    if let Err(e) = self.set_persisted_count(slot + 1) {
                        warn!(slot, error = %e, "could not persist account count");
                    }
                }
                info!(slot, position, "account added");
                AddAccountOutcome::Added(position)
            }
            SetupOutcome::Cancelled => {
                info!(slot, "account setup cancelled");
                AddAccountOutcome::Cancelled {
                    exit_requested: self.accounts.is_empty(),
                }
            }
            SetupOutcome::Failed(reason) => {
                warn!(slot, %reason, "account setup failed");
                AddAccountOutcome::Failed {
                    reason,
                    exit_requested: self.accounts.is_empty(),
                }
            }
        }
    }

    /// Removes the account at `index`, deletes its stored credential, moves
    /// every higher slot down by one and fixes up the current pointer.
    /// Removing the last account is allowed and leaves no current account.
    pub fn remove_account(&mut self, index: usize) -> Result<(), RegistryError> {
        if index >= self.accounts.len() {
            return Err(RegistryError::SlotOutOfRange {
                slot: index,
                len: self.accounts.len(),
            });
        }

        let removed_slot = self.accounts[index].slot();
        let count = self.slot_span();
        self.store.remove_slot(removed_slot, count)?;

        self.accounts.remove(index);
        self.shift_down_above(removed_slot);

        self.current = match self.current {
            Some(c) if c == index => (!self.accounts.is_empty()).then_some(0),
            Some(c) if c > index => Some(c - 1),
            other => other,
        };
        self.publish_current();

        self.set_persisted_count(count.saturating_sub(1))?;
        info!(index, remaining = self.accounts.len(), "account removed");
        Ok(())
    }

    /// Deletes the storage of a slot no account holds and closes the gap it
    /// leaves, so slot numbers stay contiguous.
    pub fn release_slot(&mut self, slot: usize) -> Result<(), RegistryError> {
        if self.holds_slot(slot) {
            return Err(RegistryError::SlotInUse(slot));
        }
        let count = self.slot_span().max(slot + 1);
        self.store.remove_slot(slot, count)?;
        self.shift_down_above(slot);
        self.set_persisted_count(count - 1)?;
        info!(slot, "released empty slot");
        Ok(())
    }

    /// Makes the account at `index` current. Never re-authenticates.
    pub fn switch_account(&mut self, index: usize) -> Result<(), RegistryError> {
        if index >= self.accounts.len() {
            return Err(RegistryError::SlotOutOfRange {
                slot: index,
                len: self.accounts.len(),
            });
        }
        self.current = Some(index);
        self.publish_current();
        Ok(())
    }
}
