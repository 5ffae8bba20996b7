// SPDX-FileCopyrightText: 2026 Omnidesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Omnidesk omnichannel desk.
//!
//! This crate provides the error type, the domain model and the collaborator
//! traits (ledger, channel gateway, CRM, notifier) that the reconciliation
//! engine and the real-time layer are written against.

pub mod error;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::{OmniError, RuleViolation};
pub use types::{
    AdapterType, ChannelAccount, ErrorStatus, HealthStatus, Interaction, InteractionStatus,
    InteractionType, Message, Platform, Reporter, SentBy, Thread,
};

pub use traits::{
    ChannelGateway, CrmSink, LedgerStore, MessageNotifier, NoopNotifier, PluginAdapter,
};
