//! # bizmatch-store
//!
//! SQLite persistence for the BizMatch domain: accounts, opportunities,
//! lead requests, connections, blocks, messages, notifications, favorites
//! and settings.
//!
//! The crate exposes a synchronous [`Database`] handle that wraps a
//! `rusqlite::Connection` and provides typed CRUD helpers for every domain
//! model, plus the one compound write that must be atomic
//! ([`Database::block_and_disconnect`]).

pub mod accounts;
pub mod blocks;
pub mod connections;
pub mod database;
pub mod favorites;
pub mod messages;
pub mod migrations;
pub mod models;
pub mod notifications;
pub mod opportunities;
pub mod requirements;
pub mod settings;

mod error;
mod sql;

pub use database::Database;
pub use error::{Result, StoreError};
pub use models::*;
