//! # Hourbook DB
//!
//! SQLite implementation of the [`EventStore`](hourbook_core::traits::EventStore)
//! and [`ScoreStore`](hourbook_core::traits::ScoreStore) contracts.

pub mod sqlite;

pub use sqlite::SqliteStore;
