//! Refresh driver for the main lists.
//!
//! `refresh_all` loads the six startup lists concurrently. The four notifiable
//! streams run through their [`ChangeDetector`] and raise at most one desktop
//! notification each. A stream's fetch, diff, notify and snapshot replacement
//! run under that stream's lock, so overlapping refreshes of the same stream
//! are serialized while different streams stay independent.
//!
//! Snapshots live as long as the engine. Switching accounts or hiding the
//! window does not reset them.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use parking_lot::RwLock;
use tokio::sync::{watch, Mutex};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::managers::account::Account;
use crate::managers::change_detector::{ChangeDetector, StreamChange, StreamKind};
use crate::services::notifier::DesktopNotifier;
use crate::types::event::Event;
use crate::types::notification::Notification;
use crate::types::repository::Repository;
use crate::types::settings::NotificationSettings;
use crate::types::user::UserProfile;

/// One fetched batch for a notifiable stream.
#[derive(Debug, Clone, Copy)]
pub enum StreamBatch<'a> {
    Feed(&'a [Event]),
    Notifications(&'a [Notification]),
    Starred(&'a [Repository]),
    Watched(&'a [Repository]),
}

impl StreamBatch<'_> {
    pub fn kind(&self) -> StreamKind {
        match self {
            StreamBatch::Feed(_) => StreamKind::Feed,
            StreamBatch::Notifications(_) => StreamKind::Notifications,
            StreamBatch::Starred(_) => StreamKind::Starred,
            StreamBatch::Watched(_) => StreamKind::Watched,
        }
    }
}

/// Everything a full refresh produced. Lists whose fetch failed are empty.
#[derive(Debug, Clone, Default)]
pub struct RefreshReport {
    pub feed: Vec<Event>,
    pub repos: Vec<Repository>,
    pub starred: Vec<Repository>,
    pub watched: Vec<Repository>,
    pub following: Vec<UserProfile>,
    pub notifications: Vec<Notification>,
    /// Changes that raised a desktop notification.
    pub notified: Vec<StreamChange>,
}

pub struct RefreshEngine {
    feed: Mutex<ChangeDetector>,
    notifications: Mutex<ChangeDetector>,
    starred: Mutex<ChangeDetector>,
    watched: Mutex<ChangeDetector>,
    toggles: RwLock<NotificationSettings>,
    notifier: Arc<dyn DesktopNotifier>,
}

impl RefreshEngine {
    pub fn new(notifier: Arc<dyn DesktopNotifier>, toggles: NotificationSettings) -> Self {
        Self {
            feed: Mutex::new(ChangeDetector::new(StreamKind::Feed)),
            notifications: Mutex::new(ChangeDetector::new(StreamKind::Notifications)),
            starred: Mutex::new(ChangeDetector::new(StreamKind::Starred)),
            watched: Mutex::new(ChangeDetector::new(StreamKind::Watched)),
            toggles: RwLock::new(toggles),
            notifier,
        }
    }

    /// Takes effect at the next diff.
    pub fn set_toggles(&self, toggles: NotificationSettings) {
        *self.toggles.write() = toggles;
    }

    pub fn toggles(&self) -> NotificationSettings {
        *self.toggles.read()
    }

    fn is_enabled(&self, kind: StreamKind) -> bool {
        let toggles = self.toggles.read();
        match kind {
            StreamKind::Feed => toggles.activity,
            StreamKind::Notifications => toggles.notifications,
            StreamKind::Starred => toggles.starred,
            StreamKind::Watched => toggles.watched,
        }
    }

    fn detector(&self, kind: StreamKind) -> &Mutex<ChangeDetector> {
        match kind {
            StreamKind::Feed => &self.feed,
            StreamKind::Notifications => &self.notifications,
            StreamKind::Starred => &self.starred,
            StreamKind::Watched => &self.watched,
        }
    }

    pub async fn is_initialized(&self, kind: StreamKind) -> bool {
        self.detector(kind).lock().await.is_initialized()
    }

    /// Diffs, notifies when the stream's toggle is on, and always replaces the
    /// snapshot. Must be called with the stream's lock held.
    fn diff_and_notify(&self, detector: &mut ChangeDetector, batch: StreamBatch<'_>) -> Option<StreamChange> {
        let change = match batch {
            StreamBatch::Feed(events) => detector.observe_events(events, Utc::now()),
            StreamBatch::Notifications(items) => detector.observe_notifications(items),
            StreamBatch::Starred(repos) | StreamBatch::Watched(repos) => detector.observe_repos(repos),
        }?;

        let kind = batch.kind();
        if !self.is_enabled(kind) {
            debug!(stream = kind.as_str(), count = change.count, "change suppressed by toggle");
            return None;
        }
        info!(stream = kind.as_str(), count = change.count, "stream changed");
        self.notifier.notify(&change.title, &change.message);
        Some(change)
    }

    /// Feeds an already fetched batch through its stream's detector.
    pub async fn ingest(&self, batch: StreamBatch<'_>) -> Option<StreamChange> {
        let mut detector = self.detector(batch.kind()).lock().await;
        self.diff_and_notify(&mut detector, batch)
    }

    pub async fn refresh_feed(&self, account: &Account) -> (Vec<Event>, Option<StreamChange>) {
        let mut detector = self.feed.lock().await;
        let username = account.username();
        match account
            .recover("get_received_events", account.client().get_received_events(&username))
            .await
        {
            Some(events) => {
                let change = self.diff_and_notify(&mut detector, StreamBatch::Feed(&events));
                (events, change)
            }
            None => (Vec::new(), None),
        }
    }

    pub async fn refresh_notifications(&self, account: &Account) -> (Vec<Notification>, Option<StreamChange>) {
        let mut detector = self.notifications.lock().await;
        match account
            .recover("get_notifications", account.client().get_notifications(false, false))
            .await
        {
            Some(items) => {
                let change = self.diff_and_notify(&mut detector, StreamBatch::Notifications(&items));
                (items, change)
            }
            None => (Vec::new(), None),
        }
    }

    pub async fn refresh_starred(&self, account: &Account) -> (Vec<Repository>, Option<StreamChange>) {
        let mut detector = self.starred.lock().await;
        match account.recover("get_starred", account.client().get_starred()).await {
            Some(repos) => {
                let change = self.diff_and_notify(&mut detector, StreamBatch::Starred(&repos));
                (repos, change)
            }
            None => (Vec::new(), None),
        }
    }

    pub async fn refresh_watched(&self, account: &Account) -> (Vec<Repository>, Option<StreamChange>) {
        let mut detector = self.watched.lock().await;
        match account.recover("get_watched", account.client().get_watched()).await {
            Some(repos) => {
                let change = self.diff_and_notify(&mut detector, StreamBatch::Watched(&repos));
                (repos, change)
            }
            None => (Vec::new(), None),
        }
    }

    /// Loads feed, repositories, starred, watched, following and notifications
    /// concurrently.
    pub async fn refresh_all(&self, account: &Account) -> RefreshReport {
        debug!(slot = account.slot(), "refreshing all lists");
        let (feed, repos, starred, watched, following, notifications) = tokio::join!(
            self.refresh_feed(account),
            account.get_repos("updated"),
            self.refresh_starred(account),
            self.refresh_watched(account),
            account.get_following(),
            self.refresh_notifications(account),
        );

        let notified = [&feed.1, &starred.1, &watched.1, &notifications.1]
            .into_iter()
            .flatten()
            .cloned()
            .collect();

        RefreshReport {
            feed: feed.0,
            repos,
            starred: starred.0,
            watched: watched.0,
            following,
            notifications: notifications.0,
            notified,
        }
    }

    /// Calls `refresh_all` for the current account every `interval_minutes`
    /// until `cancel` fires. An interval of 0 disables auto-refresh. The first
    /// refresh happens one interval after the call.
    pub async fn run_auto_refresh<F>(
        &self,
        interval_minutes: u64,
        current: watch::Receiver<Option<Arc<Account>>>,
        cancel: CancellationToken,
        mut on_report: F,
    ) where
        F: FnMut(RefreshReport) + Send,
    {
        if interval_minutes == 0 {
            debug!("auto-refresh disabled");
            return;
        }
        let mut ticker = tokio::time::interval(Duration::from_secs(interval_minutes * 60));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    let account = current.borrow().clone();
                    match account {
                        Some(account) => on_report(self.refresh_all(&account).await),
                        None => debug!("auto-refresh tick without an account"),
                    }
                }
            }
        }
        debug!("auto-refresh stopped");
    }
}
