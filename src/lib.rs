//! GitDesk: the core of a multi-account GitHub desktop client.
//!
//! Accounts sign in with the OAuth device flow and keep their token encrypted
//! in a per-slot store. The refresh engine polls the activity feed,
//! notifications and starred/watched repositories, and raises a desktop
//! notification when something new shows up. Front-ends drive everything
//! through [`app::App`].

pub mod app;
pub mod database;
pub mod managers;
pub mod platform;
pub mod services;
pub mod types;
