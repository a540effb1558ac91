//! "Anything new since last time?" for the four notifiable streams.
//!
//! A [`ChangeDetector`] remembers what the previous fetch of one stream
//! contained and reports what is new in the next one. The first fetch after
//! construction only seeds the snapshot. Every fetch replaces the snapshot,
//! whether or not a change was reported.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};

use crate::types::event::Event;
use crate::types::notification::Notification;
use crate::types::repository::Repository;

const MESSAGE_MAX_CHARS: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamKind {
    Feed,
    Notifications,
    Starred,
    Watched,
}

impl StreamKind {
    pub const ALL: [StreamKind; 4] = [
        StreamKind::Feed,
        StreamKind::Notifications,
        StreamKind::Starred,
        StreamKind::Watched,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StreamKind::Feed => "feed",
            StreamKind::Notifications => "notifications",
            StreamKind::Starred => "starred",
            StreamKind::Watched => "watched",
        }
    }
}

/// What the previous fetch of a stream looked like.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Snapshot {
    /// Nothing fetched yet; distinct from an empty fetch.
    #[default]
    Uninitialized,
    Ids(HashSet<String>),
    /// Repository id to its last push timestamp (RFC 3339, or empty).
    Pushes(HashMap<u64, String>),
}

/// A change worth one desktop notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamChange {
    pub stream: StreamKind,
    pub count: usize,
    pub title: String,
    pub message: String,
}

fn plural(count: usize) -> &'static str {
    if count == 1 {
        ""
    } else {
        "s"
    }
}

#[derive(Debug, Clone)]
pub struct ChangeDetector {
    kind: StreamKind,
    snapshot: Snapshot,
}

impl ChangeDetector {
    pub fn new(kind: StreamKind) -> Self {
        Self {
            kind,
            snapshot: Snapshot::Uninitialized,
        }
    }

    pub fn kind(&self) -> StreamKind {
        self.kind
    }

    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    pub fn is_initialized(&self) -> bool {
        self.snapshot != Snapshot::Uninitialized
    }

    /// Returns the ids in `current` absent from the previous id snapshot, in
    /// fetch order, and installs `current` as the new snapshot. `None` on the
    /// seeding fetch.
    fn diff_ids<'a>(&mut self, current: Vec<&'a str>) -> Option<Vec<&'a str>> {
        let next: HashSet<String> = current.iter().map(|id| id.to_string()).collect();
        let previous = std::mem::replace(&mut self.snapshot, Snapshot::Ids(next));
        let previous = match previous {
            Snapshot::Ids(ids) => ids,
            _ => return None,
        };
        let mut seen = HashSet::new();
        Some(
            current
                .into_iter()
                .filter(|id| !previous.contains(*id) && seen.insert(*id))
                .collect(),
        )
    }

    /// New activity-feed events.
    pub fn observe_events(&mut self, events: &[Event], now: DateTime<Utc>) -> Option<StreamChange> {
        let fresh = self.diff_ids(events.iter().map(|e| e.id.as_str()).collect())?;
        let first = fresh.first()?;
        let event = events.iter().find(|e| e.id == *first)?;
        let count = fresh.len();
        Some(StreamChange {
            stream: self.kind,
            count,
            title: format!("{} new activity item{}", count, plural(count)),
            message: event.format_display(now).chars().take(MESSAGE_MAX_CHARS).collect(),
        })
    }

    /// Newly unread notification threads. Read threads are not tracked, so a
    /// thread that becomes unread again counts as new.
    pub fn observe_notifications(&mut self, notifications: &[Notification]) -> Option<StreamChange> {
        let unread: Vec<&str> = notifications
            .iter()
            .filter(|n| n.unread)
            .map(|n| n.id.as_str())
            .collect();
        let fresh = self.diff_ids(unread)?;
        let first = fresh.first()?;
        let notification = notifications.iter().find(|n| n.id == *first)?;
        let count = fresh.len();
        Some(StreamChange {
            stream: self.kind,
            count,
            title: format!("{} new GitHub notification{}", count, plural(count)),
            message: format!(
                "{} ({})",
                notification.subject.title,
                notification.repository_full_name()
            ),
        })
    }

    /// Starred or watched repositories with a new push. A repository that was
    /// not in the previous fetch is not an update.
    pub fn observe_repos(&mut self, repos: &[Repository]) -> Option<StreamChange> {
        let next: HashMap<u64, String> = repos.iter().map(|r| (r.id, r.pushed_at_key())).collect();
        let previous = std::mem::replace(&mut self.snapshot, Snapshot::Pushes(next));
        let previous = match previous {
            Snapshot::Pushes(pushes) => pushes,
            _ => return None,
        };

        let mut reported = HashSet::new();
        let updated: Vec<&Repository> = repos
            .iter()
            .filter(|r| {
                previous
                    .get(&r.id)
                    .is_some_and(|old| *old != r.pushed_at_key())
                    && reported.insert(r.id)
            })
            .collect();

        let first = updated.first()?;
        let count = updated.len();
        let label = match self.kind {
            StreamKind::Watched => "watched",
            _ => "starred",
        };
        let mut message = first.full_name.clone();
        if count > 1 {
            message.push_str(&format!(" and {} more", count - 1));
        }
        Some(StreamChange {
            stream: self.kind,
            count,
            title: format!("{} {} repo{} updated", count, label, plural(count)),
            message,
        })
    }
}
