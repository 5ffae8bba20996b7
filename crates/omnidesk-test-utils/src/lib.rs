// SPDX-FileCopyrightText: 2026 Omnidesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Omnidesk integration tests.
//!
//! Provides in-memory collaborators and a harness for fast, deterministic,
//! CI-runnable tests without provider APIs or a CRM.
//!
//! # Components
//!
//! - [`MemoryLedger`] - In-memory ledger enforcing the same uniqueness rules as SQLite
//! - [`MockGateway`] - Scripted channel gateway capturing outbound sends
//! - [`RecordingCrm`] / [`RecordingNotifier`] - Capture CRM hand-offs and fan-out
//! - [`TestHarness`] - An [`omnidesk_engine::Engine`] wired to all of the above

pub mod harness;
pub mod memory_ledger;
pub mod mock_channel;
pub mod recording;

pub use harness::{TestHarness, TestHarnessBuilder};
pub use memory_ledger::MemoryLedger;
pub use mock_channel::MockGateway;
pub use recording::{RecordingCrm, RecordingNotifier};
