// SPDX-FileCopyrightText: 2026 Omnidesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Inbound webhook payload shapes.
//!
//! Only the fields the engine reads are modelled; everything else the
//! providers send is ignored. Missing arrays deserialize as empty so a
//! status-only delivery is skipped rather than rejected.

use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct IdField {
    #[serde(default)]
    pub id: String,
}

// --- Messenger / Instagram ---

/// `POST /webhook-meta/{facebook,instagram}` body.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MetaWebhook {
    #[serde(default)]
    pub object: Option<String>,
    #[serde(default)]
    pub entry: Vec<MetaEntry>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MetaEntry {
    /// Page id or Instagram account id the event arrived on.
    pub id: String,
    #[serde(default)]
    pub messaging: Vec<Messaging>,
    #[serde(default)]
    pub changes: Vec<MetaChange>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Messaging {
    #[serde(default)]
    pub sender: IdField,
    #[serde(default)]
    pub recipient: IdField,
    /// Milliseconds since the epoch.
    #[serde(default)]
    pub timestamp: Option<i64>,
    #[serde(default)]
    pub message: Option<MessagingMessage>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MessagingMessage {
    pub mid: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub is_echo: bool,
    #[serde(default)]
    pub attachments: Vec<MetaAttachment>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MetaAttachment {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub payload: AttachmentPayload,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AttachmentPayload {
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MetaChange {
    #[serde(default)]
    pub field: Option<String>,
    #[serde(default)]
    pub value: MentionValue,
}

/// Mention fields of a Facebook feed change or an Instagram `mentions` change.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MentionValue {
    #[serde(default)]
    pub post_id: Option<String>,
    #[serde(default)]
    pub media_id: Option<String>,
    #[serde(default)]
    pub comment_id: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub from: Option<IdField>,
    /// Unix seconds.
    #[serde(default)]
    pub created_time: Option<i64>,
}

// --- WhatsApp Cloud ---

/// `POST /webhooks` body.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WhatsappWebhook {
    #[serde(default)]
    pub object: Option<String>,
    #[serde(default)]
    pub entry: Vec<WhatsappEntry>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WhatsappEntry {
    /// WhatsApp business account id.
    pub id: String,
    #[serde(default)]
    pub changes: Vec<WhatsappChange>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WhatsappChange {
    #[serde(default)]
    pub value: WhatsappValue,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WhatsappValue {
    #[serde(default)]
    pub contacts: Vec<WhatsappContact>,
    #[serde(default)]
    pub messages: Vec<WhatsappMessage>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WhatsappContact {
    pub wa_id: String,
    #[serde(default)]
    pub profile: Option<WhatsappProfile>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WhatsappProfile {
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WhatsappMessage {
    pub id: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    /// Unix seconds as a decimal string.
    #[serde(default)]
    pub timestamp: String,
    #[serde(default)]
    pub text: Option<WhatsappText>,
    #[serde(default)]
    pub image: Option<WhatsappMedia>,
    #[serde(default)]
    pub video: Option<WhatsappMedia>,
    /// Kept verbatim; it becomes the message body.
    #[serde(default)]
    pub location: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WhatsappText {
    #[serde(default)]
    pub body: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WhatsappMedia {
    pub id: String,
    #[serde(default)]
    pub caption: String,
}

// --- Gmail push ---

/// Pub/Sub push envelope posted to `/webhook-gmail`.
#[derive(Debug, Clone, Deserialize)]
pub struct GmailPush {
    pub message: PubSubMessage,
    #[serde(default)]
    pub subscription: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PubSubMessage {
    /// Base64 JSON of [`GmailNotification`].
    pub data: String,
    #[serde(default, rename = "messageId")]
    pub message_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GmailNotification {
    pub email_address: String,
    pub history_id: u64,
}
