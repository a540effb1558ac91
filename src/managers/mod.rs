// GitDesk state managers
// Managers own runtime state: accounts, the session registry, change detection,
// refresh scheduling, UI hand-off and downloads.

pub mod account;
pub mod change_detector;
pub mod download_manager;
pub mod refresh_engine;
pub mod session_registry;
pub mod ui_dispatch;
