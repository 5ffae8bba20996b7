// SPDX-FileCopyrightText: 2026 Omnidesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite persistence layer for the Omnidesk interaction ledger.
//!
//! Provides WAL-mode SQLite storage with embedded migrations, a single-writer
//! concurrency model via `tokio-rusqlite`, and typed queries for reporters,
//! interactions, messages, email threads and channel accounts. Uniqueness of
//! external ids and ongoing interactions is enforced by the schema itself.

pub mod adapter;
pub mod database;
pub mod migrations;
pub mod queries;

pub use adapter::SqliteLedger;
pub use database::Database;
