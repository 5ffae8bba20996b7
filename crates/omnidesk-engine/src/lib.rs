// SPDX-FileCopyrightText: 2026 Omnidesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Reconciliation engine for the Omnidesk omnichannel desk.
//!
//! The [`Engine`] turns raw webhook deliveries from WhatsApp, Messenger,
//! Instagram and Gmail into idempotent reporter, interaction and message
//! rows, drives the claim/close saga against the CRM, performs
//! agent-originated sends, and serves the dashboard read models.
//!
//! Every ingestion path follows the same shape: resolve the reporter, resolve
//! the ongoing interaction for the channel's correlation key, then resolve the
//! message by its external id. Lookups are an optimization; uniqueness is
//! enforced by the ledger and a [`OmniError::Conflict`] on create is treated
//! as "someone else created it first" and resolved by re-fetching.

pub mod email;
pub mod lifecycle;
pub mod meta;
pub mod outbound;
pub mod payload;
pub mod query;
mod reconcile;
pub mod verify;
pub mod whatsapp;

use std::sync::Arc;
use std::sync::atomic::AtomicU64;

use omnidesk_core::types::Message;
use omnidesk_core::{ChannelGateway, CrmSink, LedgerStore, MessageNotifier, OmniError, Platform};
use omnidesk_prometheus::{IngestOutcome, record_webhook_message};
use serde::Serialize;
use tracing::debug;

pub use email::{EmailIngest, parse_from_header, reply_address};
pub use lifecycle::CloseOutcome;
pub use outbound::{Actor, LiveChatRequest, SendRequest};
pub use query::{AgentInteraction, ClosedInteraction, InteractionMessages, InteractionPage};
pub use verify::{Verification, verify_subscription};

/// Result of one webhook delivery.
///
/// Serializes to the webhook response body `{message_ids, interaction_ids}`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct IngestReport {
    /// External ids of every effective message, new or pre-existing.
    pub message_ids: Vec<String>,
    pub interaction_ids: Vec<i64>,
    /// Effective messages in delivery order.
    #[serde(skip)]
    pub messages: Vec<Message>,
    /// Messages persisted by this delivery; only these are fanned out.
    #[serde(skip)]
    pub created: Vec<Message>,
}

impl IngestReport {
    fn push(&mut self, message: Message, created: bool) {
        self.message_ids
            .push(message.meta_message_id.clone().unwrap_or_else(|| message.id.to_string()));
        if !self.interaction_ids.contains(&message.interaction_id) {
            self.interaction_ids.push(message.interaction_id);
        }
        if created {
            self.created.push(message.clone());
        }
        self.messages.push(message);
    }
}

/// The reconciliation engine and its collaborators.
///
/// Cheap to clone; all collaborators are shared.
#[derive(Clone)]
pub struct Engine {
    ledger: Arc<dyn LedgerStore>,
    gateway: Arc<dyn ChannelGateway>,
    crm: Arc<dyn CrmSink>,
    notifier: Arc<dyn MessageNotifier>,
    /// Gmail history id processed so far; 0 until a watch succeeds.
    history_cursor: Arc<AtomicU64>,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("ledger", &self.ledger.name())
            .field("gateway", &self.gateway.name())
            .field("crm", &self.crm.name())
            .finish_non_exhaustive()
    }
}

impl Engine {
    pub fn new(
        ledger: Arc<dyn LedgerStore>,
        gateway: Arc<dyn ChannelGateway>,
        crm: Arc<dyn CrmSink>,
        notifier: Arc<dyn MessageNotifier>,
    ) -> Self {
        Self {
            ledger,
            gateway,
            crm,
            notifier,
            history_cursor: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn ledger(&self) -> &Arc<dyn LedgerStore> {
        &self.ledger
    }

    /// Fan newly persisted messages out to the real-time layer.
    fn publish(&self, messages: &[Message]) {
        if messages.is_empty() {
            return;
        }
        debug!(count = messages.len(), "publishing messages");
        self.notifier.notify(messages);
    }

    /// Fold one message outcome into the report and the webhook counters.
    fn tally(
        platform: Platform,
        outcome: Result<(Message, bool), OmniError>,
        report: &mut IngestReport,
    ) -> Result<(), OmniError> {
        let label = platform.to_string();
        match outcome {
            Ok((message, created)) => {
                let result = if created {
                    IngestOutcome::Created
                } else {
                    IngestOutcome::Duplicate
                };
                record_webhook_message(&label, result);
                report.push(message, created);
                Ok(())
            }
            Err(e) => {
                record_webhook_message(&label, IngestOutcome::Failed);
                Err(e)
            }
        }
    }

    fn skipped(platform: Platform) {
        record_webhook_message(&platform.to_string(), IngestOutcome::Skipped);
    }

    /// Publish whatever a delivery persisted, then hand back its outcome.
    ///
    /// Messages created before a later entry failed are still fanned out.
    fn conclude(
        &self,
        outcome: Result<(), OmniError>,
        report: IngestReport,
    ) -> Result<IngestReport, OmniError> {
        self.publish(&report.created);
        outcome.map(|()| report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use omnidesk_core::types::{SentBy, now_timestamp};

    fn message(id: i64, interaction_id: i64, mid: Option<&str>) -> Message {
        Message {
            id,
            interaction_id,
            sender_id: "s".into(),
            recipient_id: "r".into(),
            meta_message_id: mid.map(str::to_string),
            body: "hi".into(),
            message_timestamp: now_timestamp(),
            attachment_type: None,
            attachment_url: None,
            sent_by: SentBy::Reporter,
            is_read: false,
            is_deleted: false,
            created_at: now_timestamp(),
            updated_at: now_timestamp(),
        }
    }

    #[test]
    fn report_dedupes_interaction_ids_and_tracks_created() {
        let mut report = IngestReport::default();
        report.push(message(1, 7, Some("m1")), true);
        report.push(message(2, 7, Some("m2")), false);
        report.push(message(3, 8, None), true);

        assert_eq!(report.interaction_ids, vec![7, 8]);
        assert_eq!(report.message_ids, vec!["m1", "m2", "3"]);
        assert_eq!(report.created.len(), 2);

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["message_ids"][0], "m1");
        assert_eq!(json["interaction_ids"], serde_json::json!([7, 8]));
        assert!(json.get("messages").is_none());
    }
}
