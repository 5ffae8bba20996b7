// SPDX-FileCopyrightText: 2026 Omnidesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! WhatsApp Cloud webhook ingestion.

use omnidesk_core::types::{
    AttachmentType, Message, NewMessage, SentBy, now_timestamp, timestamp_from_unix_secs,
};
use omnidesk_core::{OmniError, Platform};
use tracing::debug;

use crate::payload::{WhatsappContact, WhatsappMessage, WhatsappWebhook};
use crate::{Engine, IngestReport};

/// Body and attachment derived from a WhatsApp message before any ledger write.
struct Content {
    body: String,
    attachment_type: Option<AttachmentType>,
    attachment_url: Option<String>,
}

impl Engine {
    /// Ingest a WhatsApp Cloud webhook delivery.
    ///
    /// Each entry contributes at most its first message; entries without a
    /// contact or message (delivery and read statuses) are skipped.
    pub async fn ingest_whatsapp(
        &self,
        payload: &WhatsappWebhook,
    ) -> Result<IngestReport, OmniError> {
        let mut report = IngestReport::default();
        let outcome = self.whatsapp_entries(payload, &mut report).await;
        self.conclude(outcome, report)
    }

    async fn whatsapp_entries(
        &self,
        payload: &WhatsappWebhook,
        report: &mut IngestReport,
    ) -> Result<(), OmniError> {
        for entry in &payload.entry {
            let value = entry.changes.first().map(|change| &change.value);
            let (Some(contact), Some(message)) = (
                value.and_then(|v| v.contacts.first()),
                value.and_then(|v| v.messages.first()),
            ) else {
                debug!(platform_id = %entry.id, "whatsapp change without message skipped");
                Self::skipped(Platform::Whatsapp);
                continue;
            };

            let outcome = self.whatsapp_message(&entry.id, contact, message).await;
            Self::tally(Platform::Whatsapp, outcome, report)?;
        }
        Ok(())
    }

    async fn whatsapp_message(
        &self,
        platform_id: &str,
        contact: &WhatsappContact,
        message: &WhatsappMessage,
    ) -> Result<(Message, bool), OmniError> {
        if let Some(existing) = self.delivered(&message.id).await? {
            return Ok((existing, false));
        }

        // Media lookups happen before any write so a gateway failure leaves no trace.
        let content = self.whatsapp_content(message).await?;

        let name = contact
            .profile
            .as_ref()
            .map(|p| p.name.as_str())
            .unwrap_or_default();
        let reporter = self.reporter_by_meta_id(&contact.wa_id, name).await?;
        let interaction = self
            .ongoing_direct(Platform::Whatsapp, platform_id, reporter.id)
            .await?;

        let timestamp = message
            .timestamp
            .parse::<i64>()
            .map(timestamp_from_unix_secs)
            .unwrap_or_else(|_| now_timestamp());

        self.record_message(&NewMessage {
            interaction_id: interaction.id,
            sender_id: contact.wa_id.clone(),
            recipient_id: platform_id.to_string(),
            meta_message_id: Some(message.id.clone()),
            body: content.body,
            message_timestamp: timestamp,
            attachment_type: content.attachment_type,
            attachment_url: content.attachment_url,
            sent_by: SentBy::Reporter,
        })
        .await
    }

    async fn whatsapp_content(&self, message: &WhatsappMessage) -> Result<Content, OmniError> {
        let text = message
            .text
            .as_ref()
            .map(|t| t.body.clone())
            .unwrap_or_default();

        match message.kind.as_str() {
            "location" => Ok(Content {
                body: message
                    .location
                    .as_ref()
                    .map(|l| l.to_string())
                    .unwrap_or_default(),
                attachment_type: Some(AttachmentType::Location),
                attachment_url: None,
            }),
            kind @ ("image" | "video") => {
                let (media, attachment_type) = if kind == "image" {
                    (message.image.as_ref(), AttachmentType::Image)
                } else {
                    (message.video.as_ref(), AttachmentType::Video)
                };
                let media = media.ok_or_else(|| {
                    OmniError::InvalidPayload(format!(
                        "whatsapp {kind} message {} has no media object",
                        message.id
                    ))
                })?;
                let url = self.gateway.resolve_whatsapp_media(&media.id).await?;
                Ok(Content {
                    body: if media.caption.is_empty() {
                        text
                    } else {
                        media.caption.clone()
                    },
                    attachment_type: Some(attachment_type),
                    attachment_url: Some(url),
                })
            }
            _ => Ok(Content {
                body: text,
                attachment_type: None,
                attachment_url: None,
            }),
        }
    }
}
