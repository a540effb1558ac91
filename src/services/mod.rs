// GitDesk services
// Services are the boundary-facing pieces: crypto, settings, credential storage,
// HTTP transport, the GitHub REST client, device-flow auth, notifications, git.

pub mod credential_store;
pub mod crypto_service;
pub mod device_flow;
pub mod git_runner;
pub mod github_api;
pub mod http_transport;
pub mod notifier;
pub mod settings_engine;
