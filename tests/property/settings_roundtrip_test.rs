//! Property-based tests for AppSettings serialization.
//!
//! Arbitrary settings must survive a JSON round-trip and a save/load cycle
//! through the SettingsEngine without loss.

use gitdesk::services::settings_engine::{SettingsEngine, SettingsEngineTrait};
use gitdesk::types::settings::{
    AppSettings, DarkMode, GeneralSettings, NotificationSettings, PathSettings, RefreshSettings,
};
use proptest::prelude::*;
use serde_json::json;

fn arb_dark_mode() -> impl Strategy<Value = DarkMode> {
    prop_oneof![Just(DarkMode::Off), Just(DarkMode::On), Just(DarkMode::Auto)]
}

fn arb_general() -> impl Strategy<Value = GeneralSettings> {
    (
        1usize..10,
        arb_dark_mode(),
        any::<bool>(),
        "[ -~]{0,80}",
        0usize..5000,
        "[a-z+]{1,20}",
        any::<bool>(),
    )
        .prop_map(
            |(accounts, dark_mode, window_shown, repo_template, commit_limit, global_hotkey, check_for_updates)| {
                GeneralSettings {
                    accounts,
                    dark_mode,
                    window_shown,
                    repo_template,
                    commit_limit,
                    global_hotkey,
                    check_for_updates,
                }
            },
        )
}

fn arb_paths() -> impl Strategy<Value = PathSettings> {
    ("[a-zA-Z0-9/_-]{1,40}", "[a-zA-Z0-9/_-]{1,40}", any::<bool>(), any::<bool>()).prop_map(
        |(download_location, git_path, git_use_org_structure, git_clone_recursive)| PathSettings {
            download_location,
            git_path,
            git_use_org_structure,
            git_clone_recursive,
        },
    )
}

fn arb_notifications() -> impl Strategy<Value = NotificationSettings> {
    (any::<bool>(), any::<bool>(), any::<bool>(), any::<bool>()).prop_map(
        |(activity, notifications, starred, watched)| NotificationSettings {
            activity,
            notifications,
            starred,
            watched,
        },
    )
}

fn arb_settings() -> impl Strategy<Value = AppSettings> {
    (arb_general(), arb_paths(), arb_notifications(), 0u64..1440).prop_map(
        |(general, paths, notifications, interval)| AppSettings {
            general,
            paths,
            notifications,
            refresh: RefreshSettings {
                auto_refresh_interval_minutes: interval,
            },
        },
    )
}

proptest! {
    #[test]
    fn json_roundtrip_preserves_settings(settings in arb_settings()) {
        let encoded = serde_json::to_string(&settings).unwrap();
        let decoded: AppSettings = serde_json::from_str(&encoded).unwrap();
        prop_assert_eq!(decoded, settings);
    }

    #[test]
    fn dot_notation_set_then_get_returns_value(starred in any::<bool>(), interval in 0u64..1440) {
        let dir = tempfile::tempdir().unwrap();
        let mut engine = SettingsEngine::new(Some(dir.path().join("settings.json")));
        engine.set_value("notifications.starred", json!(starred)).unwrap();
        engine.set_value("refresh.auto_refresh_interval_minutes", json!(interval)).unwrap();

        prop_assert_eq!(engine.get_value("notifications.starred"), Some(json!(starred)));
        prop_assert_eq!(engine.get_or("refresh.auto_refresh_interval_minutes", 0u64), interval);

        let mut reloaded = SettingsEngine::new(Some(dir.path().join("settings.json")));
        let settings = reloaded.load().unwrap();
        prop_assert_eq!(settings.notifications.starred, starred);
        prop_assert_eq!(settings.refresh.auto_refresh_interval_minutes, interval);
    }
}
