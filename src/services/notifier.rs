//! Desktop notification sink.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::info;

const MAX_BODY_CHARS: usize = 100;

/// Fire-and-forget "show a transient notification" boundary.
pub trait DesktopNotifier: Send + Sync {
    fn notify(&self, title: &str, body: &str);
}

/// Truncates a notification body to the length desktop toasts can show.
pub fn truncate_body(body: &str) -> String {
    body.chars().take(MAX_BODY_CHARS).collect()
}

/// Emits notifications as `info` events.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl DesktopNotifier for LogNotifier {
    fn notify(&self, title: &str, body: &str) {
        info!(target: "gitdesk::notification", title, body = %truncate_body(body), "desktop notification");
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShownNotification {
    pub title: String,
    pub body: String,
}

/// Keeps every notification in memory.
#[derive(Debug, Default, Clone)]
pub struct RecordingNotifier {
    shown: Arc<Mutex<Vec<ShownNotification>>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shown(&self) -> Vec<ShownNotification> {
        self.shown.lock().clone()
    }

    /// Removes and returns everything recorded so far.
    pub fn take(&self) -> Vec<ShownNotification> {
        std::mem::take(&mut *self.shown.lock())
    }

    pub fn len(&self) -> usize {
        self.shown.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.shown.lock().is_empty()
    }
}

impl DesktopNotifier for RecordingNotifier {
    fn notify(&self, title: &str, body: &str) {
        self.shown.lock().push(ShownNotification {
            title: title.to_string(),
            body: truncate_body(body),
        });
    }
}
