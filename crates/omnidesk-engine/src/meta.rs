// SPDX-FileCopyrightText: 2026 Omnidesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Messenger and Instagram webhook ingestion: direct messages and mentions.

use omnidesk_core::traits::gateway::MentionTarget;
use omnidesk_core::types::{
    AttachmentType, Message, NewMessage, SentBy, now_timestamp, timestamp_from_unix_millis,
    timestamp_from_unix_secs,
};
use omnidesk_core::{OmniError, Platform};
use tracing::debug;

use crate::payload::{MentionValue, MetaEntry, MetaWebhook, Messaging, MessagingMessage};
use crate::{Engine, IngestReport};

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

impl Engine {
    /// Ingest a Messenger webhook delivery (page messages and feed mentions).
    pub async fn ingest_facebook(&self, payload: &MetaWebhook) -> Result<IngestReport, OmniError> {
        let mut report = IngestReport::default();
        let outcome = self
            .meta_entries(Platform::Facebook, payload, &mut report)
            .await;
        self.conclude(outcome, report)
    }

    /// Ingest an Instagram webhook delivery (direct messages and mentions).
    pub async fn ingest_instagram(
        &self,
        payload: &MetaWebhook,
    ) -> Result<IngestReport, OmniError> {
        let mut report = IngestReport::default();
        let outcome = self
            .meta_entries(Platform::Instagram, payload, &mut report)
            .await;
        self.conclude(outcome, report)
    }

    async fn meta_entries(
        &self,
        platform: Platform,
        payload: &MetaWebhook,
        report: &mut IngestReport,
    ) -> Result<(), OmniError> {
        for entry in &payload.entry {
            let outcome = if let Some(messaging) = entry.messaging.first() {
                let Some(message) = messaging.message.as_ref() else {
                    debug!(platform_id = %entry.id, "messaging event without message skipped");
                    Self::skipped(platform);
                    continue;
                };
                // The page's own replies come back as echoes.
                if messaging.sender.id == entry.id || message.is_echo {
                    debug!(platform_id = %entry.id, mid = %message.mid, "echo skipped");
                    Self::skipped(platform);
                    continue;
                }
                self.meta_direct(platform, entry, messaging, message).await
            } else if let Some(change) = entry.changes.first() {
                match platform {
                    Platform::Instagram => self.instagram_mention(&entry.id, &change.value).await,
                    _ => self.facebook_mention(&entry.id, &change.value).await,
                }
            } else {
                Self::skipped(platform);
                continue;
            };

            match outcome {
                Ok(Some(result)) => Self::tally(platform, Ok(result), report)?,
                Ok(None) => Self::skipped(platform),
                Err(e) => Self::tally(platform, Err(e), report)?,
            }
        }
        Ok(())
    }

    async fn meta_direct(
        &self,
        platform: Platform,
        entry: &MetaEntry,
        messaging: &Messaging,
        message: &MessagingMessage,
    ) -> Result<Option<(Message, bool)>, OmniError> {
        if let Some(existing) = self.delivered(&message.mid).await? {
            return Ok(Some((existing, false)));
        }

        let reporter = self.reporter_by_meta_id(&messaging.sender.id, "").await?;
        let interaction = self.ongoing_direct(platform, &entry.id, reporter.id).await?;

        let (attachment_type, attachment_url) = match message.attachments.first() {
            Some(attachment) if attachment.kind == "image" => {
                (Some(AttachmentType::Image), attachment.payload.url.clone())
            }
            Some(attachment) if attachment.kind == "video" => {
                (Some(AttachmentType::Video), attachment.payload.url.clone())
            }
            _ => (None, None),
        };

        let result = self
            .record_message(&NewMessage {
                interaction_id: interaction.id,
                sender_id: messaging.sender.id.clone(),
                recipient_id: entry.id.clone(),
                meta_message_id: Some(message.mid.clone()),
                body: message.text.clone(),
                message_timestamp: messaging
                    .timestamp
                    .map(timestamp_from_unix_millis)
                    .unwrap_or_else(now_timestamp),
                attachment_type,
                attachment_url,
                sent_by: SentBy::Reporter,
            })
            .await?;
        Ok(Some(result))
    }

    /// A page mention in a post or comment. Keyed by post id.
    async fn facebook_mention(
        &self,
        platform_id: &str,
        value: &MentionValue,
    ) -> Result<Option<(Message, bool)>, OmniError> {
        let Some(post_id) = non_empty(&value.post_id) else {
            debug!(platform_id, "facebook change without post id skipped");
            return Ok(None);
        };
        let message_id = non_empty(&value.comment_id).unwrap_or(post_id);

        if let Some(existing) = self.delivered(message_id).await? {
            return Ok(Some((existing, false)));
        }

        let media_url = format!("https://www.facebook.com/{post_id}");
        let interaction = self
            .ongoing_mention(Platform::Facebook, platform_id, post_id, Some(media_url))
            .await?;

        let result = self
            .record_message(&NewMessage {
                interaction_id: interaction.id,
                sender_id: value.from.as_ref().map(|f| f.id.clone()).unwrap_or_default(),
                recipient_id: platform_id.to_string(),
                meta_message_id: Some(message_id.to_string()),
                body: value.message.clone().unwrap_or_default(),
                message_timestamp: value
                    .created_time
                    .map(timestamp_from_unix_secs)
                    .unwrap_or_else(now_timestamp),
                attachment_type: None,
                attachment_url: None,
                sent_by: SentBy::Reporter,
            })
            .await?;
        Ok(Some(result))
    }

    /// An Instagram mention in a comment or caption. Keyed by media id.
    ///
    /// The webhook carries only ids; text and permalink are fetched first.
    async fn instagram_mention(
        &self,
        platform_id: &str,
        value: &MentionValue,
    ) -> Result<Option<(Message, bool)>, OmniError> {
        let Some(media_id) = non_empty(&value.media_id) else {
            debug!(platform_id, "instagram change without media id skipped");
            return Ok(None);
        };
        let (target, message_id) = match non_empty(&value.comment_id) {
            Some(comment_id) => (MentionTarget::Comment(comment_id.to_string()), comment_id),
            None => (MentionTarget::Media(media_id.to_string()), media_id),
        };

        if let Some(existing) = self.delivered(message_id).await? {
            return Ok(Some((existing, false)));
        }

        let mention = self
            .gateway
            .fetch_instagram_mention(platform_id, &target)
            .await?;
        let interaction = self
            .ongoing_mention(Platform::Instagram, platform_id, media_id, mention.permalink)
            .await?;

        let result = self
            .record_message(&NewMessage {
                interaction_id: interaction.id,
                sender_id: String::new(),
                recipient_id: platform_id.to_string(),
                meta_message_id: Some(message_id.to_string()),
                body: mention.text,
                message_timestamp: now_timestamp(),
                attachment_type: None,
                attachment_url: None,
                sent_by: SentBy::Reporter,
            })
            .await?;
        Ok(Some(result))
    }
}
