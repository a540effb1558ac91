// GitDesk shared type definitions
// Domain records are immutable value objects deserialized straight from the
// REST API's JSON; settings, auth and download types live alongside them.

pub mod auth;
pub mod commit;
pub mod content;
pub mod credential;
pub mod download;
pub mod errors;
pub mod event;
pub mod issue;
pub mod notification;
pub mod release;
pub mod repository;
pub mod search;
pub mod settings;
pub mod user;
pub mod workflow;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};

/// Deserializes `null` the same as a missing field.
pub(crate) fn null_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Long relative form used by repositories, issues and commits ("3 days ago").
pub fn relative_time_long(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let diff = now.signed_duration_since(then);
    let days = diff.num_days();
    let seconds = diff.num_seconds() - days * 86_400;
    let plural = |n: i64, unit: &str| format!("{} {}{} ago", n, unit, if n > 1 { "s" } else { "" });

    if days > 365 {
        plural(days / 365, "year")
    } else if days > 30 {
        plural(days / 30, "month")
    } else if days > 0 {
        plural(days, "day")
    } else if seconds > 3600 {
        plural(seconds / 3600, "hour")
    } else if seconds > 60 {
        plural(seconds / 60, "minute")
    } else {
        "just now".to_string()
    }
}

/// Compact relative form used by the activity feed and notifications ("3d ago").
pub fn relative_time_short(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let diff = now.signed_duration_since(then);
    let days = diff.num_days();
    let seconds = diff.num_seconds() - days * 86_400;

    if days > 365 {
        format!("{}y ago", days / 365)
    } else if days > 30 {
        format!("{}mo ago", days / 30)
    } else if days > 0 {
        format!("{}d ago", days)
    } else if seconds > 3600 {
        format!("{}h ago", seconds / 3600)
    } else if seconds > 60 {
        format!("{}m ago", seconds / 60)
    } else {
        "Just now".to_string()
    }
}

/// Human-readable byte size ("1.5 MB").
pub fn format_size(size: u64) -> String {
    const KB: f64 = 1024.0;
    let s = size as f64;
    if s < KB {
        format!("{} B", size)
    } else if s < KB * KB {
        format!("{:.1} KB", s / KB)
    } else if s < KB * KB * KB {
        format!("{:.1} MB", s / (KB * KB))
    } else {
        format!("{:.2} GB", s / (KB * KB * KB))
    }
}
