// SPDX-FileCopyrightText: 2026 Omnidesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Gmail ingestion and threaded replies.
//!
//! Gmail pushes carry only a mailbox address and a history id. The engine
//! keeps its own history cursor, lists everything added since, and
//! reconciles each message through Thread, Reporter, Interaction and Message
//! in that order. Replies are sent inside the provider thread with
//! `References`/`In-Reply-To` pointing at the latest external message id.

use std::sync::LazyLock;
use std::sync::atomic::Ordering;

use base64::Engine as _;
use base64::engine::general_purpose::{STANDARD, URL_SAFE};
use chrono::{DateTime, Utc};
use omnidesk_core::traits::gateway::{FetchedEmail, OutboundEmail};
use omnidesk_core::types::{
    Interaction, Message, NewMessage, SentBy, TIMESTAMP_FORMAT, Thread, now_timestamp,
};
use omnidesk_core::{OmniError, Platform};
use regex::Regex;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::payload::{GmailNotification, GmailPush};
use crate::reconcile::find_or_create;
use crate::{Engine, IngestReport};

static BRACKETED_ADDRESS: LazyLock<Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(r"<([^>]+)>"));

/// Outcome of one Gmail push.
#[derive(Debug, Clone, Default, Serialize)]
pub struct EmailIngest {
    #[serde(flatten)]
    pub report: IngestReport,
    /// History id the cursor was advanced to.
    pub history_id: u64,
}

/// Decode the base64 JSON notification carried by a Pub/Sub push.
pub fn decode_notification(push: &GmailPush) -> Result<GmailNotification, OmniError> {
    let data = push.message.data.trim();
    let bytes = STANDARD
        .decode(data)
        .or_else(|_| URL_SAFE.decode(data))
        .map_err(|e| OmniError::InvalidPayload(format!("pub/sub data is not base64: {e}")))?;
    serde_json::from_slice(&bytes)
        .map_err(|e| OmniError::InvalidPayload(format!("pub/sub data is not a notification: {e}")))
}

/// Split a `From` header into display name and address.
///
/// `Jane <jane@x.com>` yields `("Jane", "jane@x.com")`. Without brackets the
/// whole header is the address and the name is empty.
pub fn parse_from_header(from: &str) -> (String, String) {
    match (from.find('<'), from.rfind('>')) {
        (Some(open), Some(close)) if open < close => (
            from[..open].trim().trim_matches('"').to_string(),
            from[open + 1..close].trim().to_string(),
        ),
        _ => (String::new(), from.trim().to_string()),
    }
}

/// Reply recipient for a thread's `From` header: the bracketed address, or
/// the whole header when it has none.
pub fn reply_address(from: &str) -> Result<String, OmniError> {
    let pattern = BRACKETED_ADDRESS
        .as_ref()
        .map_err(|e| OmniError::Internal(format!("address pattern: {e}")))?;
    Ok(pattern
        .captures(from)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .unwrap_or_else(|| from.trim().to_string()))
}

fn email_timestamp(date: &str) -> String {
    DateTime::parse_from_rfc2822(date.trim())
        .map(|d| d.with_timezone(&Utc).format(TIMESTAMP_FORMAT).to_string())
        .unwrap_or_else(|_| now_timestamp())
}

impl Engine {
    /// Current Gmail history cursor; 0 until seeded.
    pub fn history_cursor(&self) -> u64 {
        self.history_cursor.load(Ordering::Acquire)
    }

    /// Move the cursor forward; never moves it back.
    pub fn seed_history_cursor(&self, history_id: u64) {
        self.history_cursor.fetch_max(history_id, Ordering::AcqRel);
    }

    /// Subscribe the mailbox to push notifications and seed the cursor.
    ///
    /// A failed watch leaves the cursor at 0, in which case the first push
    /// starts from its own history id.
    pub async fn start_mailbox_watch(&self) -> u64 {
        match self.gateway.watch_mailbox().await {
            Ok(history_id) => {
                self.seed_history_cursor(history_id);
                info!(history_id, "mailbox watch started");
                history_id
            }
            Err(e) => {
                warn!(error = %e, "mailbox watch failed, history cursor left unset");
                0
            }
        }
    }

    /// Ingest a Gmail Pub/Sub push.
    pub async fn ingest_email(&self, push: &GmailPush) -> Result<EmailIngest, OmniError> {
        let notification = decode_notification(push)?;
        let start = match self.history_cursor() {
            0 => notification.history_id,
            cursor => cursor,
        };
        debug!(
            mailbox = %notification.email_address,
            start,
            "processing mailbox history"
        );

        let profile = self.gateway.mailbox_profile().await?;
        let history = self.gateway.mailbox_history(start).await?;

        let mut report = IngestReport::default();
        let outcome = self
            .email_messages(&profile.email_address, &history.message_ids, &mut report)
            .await;
        if outcome.is_ok() {
            self.seed_history_cursor(history.history_id);
        }
        let report = self.conclude(outcome, report)?;

        Ok(EmailIngest {
            report,
            history_id: self.history_cursor().max(history.history_id),
        })
    }

    async fn email_messages(
        &self,
        mailbox: &str,
        message_ids: &[String],
        report: &mut IngestReport,
    ) -> Result<(), OmniError> {
        for message_id in message_ids {
            if let Some(existing) = self.delivered(message_id).await? {
                Self::tally(Platform::Email, Ok((existing, false)), report)?;
                continue;
            }

            let email = self.gateway.fetch_email(message_id).await?;
            let (_, sender) = parse_from_header(&email.from);
            // Our own replies show up in the history too.
            if sender.eq_ignore_ascii_case(mailbox) {
                debug!(message_id = %email.id, "outgoing email skipped");
                Self::skipped(Platform::Email);
                continue;
            }

            let outcome = self.email_message(mailbox, &email).await;
            Self::tally(Platform::Email, outcome, report)?;
        }
        Ok(())
    }

    async fn email_message(
        &self,
        mailbox: &str,
        email: &FetchedEmail,
    ) -> Result<(Message, bool), OmniError> {
        let thread = Thread {
            id: email.thread_id.clone(),
            subject: email.subject.clone(),
            email_date: email.date.clone(),
            from: email.from.clone(),
        };
        find_or_create(
            || self.ledger.get_thread(&email.thread_id),
            || self.ledger.create_thread(&thread),
        )
        .await?;

        let (name, address) = parse_from_header(&email.from);
        let reporter = self.reporter_by_email(&address, &name).await?;
        let interaction = self
            .ongoing_conversation(mailbox, &email.thread_id, reporter.id)
            .await?;

        self.record_message(&NewMessage {
            interaction_id: interaction.id,
            sender_id: address,
            recipient_id: mailbox.to_string(),
            meta_message_id: Some(email.id.clone()),
            body: email.body.clone(),
            message_timestamp: email_timestamp(&email.date),
            attachment_type: None,
            attachment_url: None,
            sent_by: SentBy::Reporter,
        })
        .await
    }

    /// Reply to an email interaction inside its provider thread.
    pub(crate) async fn send_email(
        &self,
        interaction: &Interaction,
        body: &str,
    ) -> Result<Message, OmniError> {
        let thread_id = interaction.conversation_id.as_deref().ok_or_else(|| {
            OmniError::InvalidPayload(format!(
                "email interaction {} has no thread",
                interaction.id
            ))
        })?;
        let thread = self
            .ledger
            .get_thread(thread_id)
            .await?
            .ok_or_else(|| OmniError::not_found("thread", thread_id))?;

        let profile = self.gateway.mailbox_profile().await?;
        let to = reply_address(&thread.from)?;
        let reply_to = self
            .ledger
            .latest_external_message(interaction.id)
            .await?
            .and_then(|m| m.meta_message_id)
            .unwrap_or_default();

        let outbound = OutboundEmail {
            thread_id: thread.id.clone(),
            from: profile.email_address.clone(),
            to: to.clone(),
            subject: thread.subject.clone(),
            references: reply_to.clone(),
            in_reply_to: reply_to,
            body: body.to_string(),
        };
        let sent_id = self.gateway.send_email(&outbound).await?;
        info!(interaction_id = interaction.id, thread_id, "email reply sent");

        let (message, _) = self
            .record_message(&NewMessage {
                interaction_id: interaction.id,
                sender_id: profile.email_address,
                recipient_id: to,
                meta_message_id: Some(sent_id),
                body: body.to_string(),
                message_timestamp: now_timestamp(),
                attachment_type: None,
                attachment_url: None,
                sent_by: SentBy::Agent,
            })
            .await?;
        Ok(message)
    }
}
