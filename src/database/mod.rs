//! Per-slot SQLite storage. Every `accountN/` directory holds one
//! `account.db` with the encrypted token and cached profile fields.

pub mod connection;
pub mod migrations;

pub use connection::Database;
