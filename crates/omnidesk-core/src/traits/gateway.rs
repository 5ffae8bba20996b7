// SPDX-FileCopyrightText: 2026 Omnidesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Channel gateway trait for provider APIs (Meta Graph, Gmail).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::OmniError;
use crate::traits::adapter::PluginAdapter;

/// Which Instagram object a mention webhook points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MentionTarget {
    /// The account was mentioned in a comment.
    Comment(String),
    /// The account was mentioned in a media caption.
    Media(String),
}

/// Details of an Instagram mention fetched from the Graph API.
#[derive(Debug, Clone, PartialEq)]
pub struct InstagramMention {
    pub text: String,
    pub permalink: Option<String>,
}

/// A Messenger or Instagram Direct send on behalf of a page.
#[derive(Debug, Clone)]
pub struct MessengerSend {
    pub page_id: String,
    pub access_token: String,
    pub recipient_id: String,
    pub text: String,
}

/// A WhatsApp Cloud API text send.
#[derive(Debug, Clone)]
pub struct WhatsappSend {
    pub number_id: String,
    pub access_token: String,
    pub recipient: String,
    pub text: String,
}

/// Provider acknowledgement of an outbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub recipient_id: String,
    pub message_id: String,
}

/// The connected mailbox.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailboxProfile {
    pub email_address: String,
    pub history_id: u64,
}

/// Messages added to the mailbox since a history cursor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MailboxHistory {
    pub message_ids: Vec<String>,
    pub history_id: u64,
}

/// One email as fetched from the mailbox.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchedEmail {
    pub id: String,
    pub thread_id: String,
    pub subject: String,
    /// Raw `From` header, usually `Name <address>`.
    pub from: String,
    pub date: String,
    /// Plain-text body.
    pub body: String,
}

/// An agent reply within an existing email thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundEmail {
    pub thread_id: String,
    pub from: String,
    pub to: String,
    pub subject: String,
    pub references: String,
    pub in_reply_to: String,
    pub body: String,
}

impl OutboundEmail {
    /// Render the RFC 2822 message submitted to the provider.
    pub fn to_rfc2822(&self) -> String {
        format!(
            "From: {}\r\nTo: {}\r\nSubject: {}\r\nReferences: {}\r\nIn-Reply-To: {}\r\n\r\n{}",
            self.from, self.to, self.subject, self.references, self.in_reply_to, self.body
        )
    }
}

/// Outbound capability towards the external messaging providers.
///
/// Every method is a network call with no retry at this layer; callers
/// decide how to surface failures.
#[async_trait]
pub trait ChannelGateway: PluginAdapter {
    /// Resolve a WhatsApp media id to a direct download URL.
    async fn resolve_whatsapp_media(&self, media_id: &str) -> Result<String, OmniError>;

    /// Look up the text and permalink of an Instagram mention.
    async fn fetch_instagram_mention(
        &self,
        account_id: &str,
        target: &MentionTarget,
    ) -> Result<InstagramMention, OmniError>;

    async fn send_messenger(&self, send: &MessengerSend) -> Result<SentMessage, OmniError>;

    async fn send_whatsapp(&self, send: &WhatsappSend) -> Result<SentMessage, OmniError>;

    async fn mailbox_profile(&self) -> Result<MailboxProfile, OmniError>;

    /// Subscribe the mailbox to push notifications; returns the current history id.
    async fn watch_mailbox(&self) -> Result<u64, OmniError>;

    async fn mailbox_history(&self, start_history_id: u64) -> Result<MailboxHistory, OmniError>;

    async fn fetch_email(&self, message_id: &str) -> Result<FetchedEmail, OmniError>;

    /// Send a reply and return the provider message id.
    async fn send_email(&self, email: &OutboundEmail) -> Result<String, OmniError>;
}
