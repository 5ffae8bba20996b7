// SPDX-FileCopyrightText: 2026 Omnidesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Collaborator trait definitions.
//!
//! The ledger, channel gateway and CRM extend the [`PluginAdapter`] base
//! trait and use `#[async_trait]` for dynamic dispatch compatibility.

pub mod adapter;
pub mod crm;
pub mod gateway;
pub mod ledger;
pub mod notify;

pub use adapter::PluginAdapter;
pub use crm::CrmSink;
pub use gateway::ChannelGateway;
pub use ledger::LedgerStore;
pub use notify::{MessageNotifier, NoopNotifier};
