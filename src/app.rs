//! App Core for GitDesk.
//!
//! `App` is the context object built once at startup and handed to whatever
//! drives the UI. It owns settings, credential storage, the session registry,
//! the refresh engine and the download manager.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::managers::download_manager::DownloadManager;
use crate::managers::refresh_engine::{RefreshEngine, RefreshReport};
use crate::managers::session_registry::{AccountFactory, AddAccountOutcome, DefaultAccountFactory, SessionRegistry};
use crate::managers::ui_dispatch::UiHandle;
use crate::services::credential_store::{CredentialStore, CredentialStoreTrait};
use crate::services::device_flow::AuthPrompt;
use crate::services::git_runner::GitRunner;
use crate::services::http_transport::HttpTransport;
use crate::services::notifier::DesktopNotifier;
use crate::services::settings_engine::{SettingsEngine, SettingsEngineTrait};
use crate::types::errors::RegistryError;
use crate::types::settings::AppSettings;

const SETTINGS_FILE: &str = "settings.json";

/// Whether the application can continue after loading accounts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartupOutcome {
    Ready,
    /// No usable account; the front-end should shut down.
    Exit,
}

pub struct App {
    config_dir: PathBuf,
    pub settings: Arc<Mutex<SettingsEngine>>,
    pub store: Arc<CredentialStore>,
    pub transport: Arc<dyn HttpTransport>,
    pub registry: SessionRegistry,
    pub refresh: Arc<RefreshEngine>,
    pub downloads: Arc<DownloadManager>,
    pub git: GitRunner,
}

impl App {
    /// Builds the context rooted at `config_dir`. A malformed settings file is
    /// logged and replaced by defaults.
    pub fn new(
        config_dir: PathBuf,
        transport: Arc<dyn HttpTransport>,
        prompt: Arc<dyn AuthPrompt>,
        notifier: Arc<dyn DesktopNotifier>,
    ) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        std::fs::create_dir_all(&config_dir)?;

        let mut settings_engine = SettingsEngine::new(Some(config_dir.join(SETTINGS_FILE)));
        if let Err(e) = settings_engine.load() {
            warn!(error = %e, "settings unreadable, using defaults");
        }
        let toggles = settings_engine.get_settings().notifications;
        let settings = Arc::new(Mutex::new(settings_engine));

        let store = Arc::new(CredentialStore::new(&config_dir)?);
        let factory: Arc<dyn AccountFactory> = Arc::new(DefaultAccountFactory::new(
            Arc::clone(&store),
            Arc::clone(&transport),
            prompt,
        ));
        let registry = SessionRegistry::new(factory, Arc::clone(&store), Arc::clone(&settings));

        Ok(Self {
            config_dir,
            settings,
            store,
            registry,
            refresh: Arc::new(RefreshEngine::new(notifier, toggles)),
            downloads: Arc::new(DownloadManager::new(Arc::clone(&transport))),
            transport,
            git: GitRunner::new(),
        })
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    pub fn settings_snapshot(&self) -> AppSettings {
        self.settings.lock().get_settings().clone()
    }

    /// Signs in every configured slot (at least one). Slot 0 being cancelled
    /// while nothing else is signed in ends startup. Slots that end up with no
    /// stored credential are released so the remaining ones stay contiguous;
    /// a slot that failed with its credential intact is kept for the next run.
    pub async fn load(&mut self) -> StartupOutcome {
        let count = self.registry.persisted_count().max(1);
        let mut empty = Vec::new();
        for slot in 0..count {
            let outcome = self.registry.add_account(Some(slot)).await;
            if outcome.exit_requested() {
                info!(slot, ?outcome, "no usable account, exiting");
                return StartupOutcome::Exit;
            }
            if !matches!(outcome, AddAccountOutcome::Added(_)) && matches!(self.store.load(slot), Ok(None)) {
                empty.push(slot);
            }
        }
        for slot in empty.into_iter().rev() {
            if let Err(e) = self.registry.release_slot(slot) {
                warn!(slot, error = %e, "could not release empty slot");
            }
        }
        if self.registry.is_empty() {
            StartupOutcome::Exit
        } else {
            StartupOutcome::Ready
        }
    }

    pub async fn add_account(&mut self) -> AddAccountOutcome {
        self.registry.add_account(None).await
    }

    pub fn remove_account(&mut self, index: usize) -> Result<(), RegistryError> {
        self.registry.remove_account(index)
    }

    pub fn switch_account(&mut self, index: usize) -> Result<(), RegistryError> {
        self.registry.switch_account(index)
    }

    /// Re-reads notification toggles from settings into the refresh engine.
    pub fn apply_settings(&self) {
        let toggles = self.settings.lock().get_settings().notifications;
        self.refresh.set_toggles(toggles);
    }

    /// Refreshes every list for the current account.
    pub async fn refresh_current(&self) -> Option<RefreshReport> {
        let account = self.registry.current()?;
        Some(self.refresh.refresh_all(&account).await)
    }

    /// Starts the auto-refresh loop in the background; each report is applied
    /// on the UI thread through `ui`.
    pub fn spawn_auto_refresh<S: 'static>(
        &self,
        ui: UiHandle<S>,
        cancel: CancellationToken,
        apply: impl Fn(&mut S, RefreshReport) + Send + Sync + 'static,
    ) -> JoinHandle<()> {
        self.spawn_auto_refresh_every(
            self.settings_snapshot().refresh.auto_refresh_interval_minutes,
            ui,
            cancel,
            apply,
        )
    }

    pub fn spawn_auto_refresh_every<S: 'static>(
        &self,
        interval_minutes: u64,
        ui: UiHandle<S>,
        cancel: CancellationToken,
        apply: impl Fn(&mut S, RefreshReport) + Send + Sync + 'static,
    ) -> JoinHandle<()> {
        let engine = Arc::clone(&self.refresh);
        let current = self.registry.subscribe();
        let apply = Arc::new(apply);
        tokio::spawn(async move {
            engine
                .run_auto_refresh(interval_minutes, current, cancel, move |report| {
                    let apply = Arc::clone(&apply);
                    ui.post(move |state| apply(state, report));
                })
                .await;
        })
    }
}
