// SPDX-FileCopyrightText: 2026 Omnidesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock channel gateway for deterministic testing.
//!
//! `MockGateway` implements `ChannelGateway` with scripted provider lookups
//! (WhatsApp media, Instagram mentions, Gmail history and messages) and
//! captures every outbound send for assertion in tests.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;

use omnidesk_core::traits::adapter::PluginAdapter;
use omnidesk_core::traits::gateway::{
    FetchedEmail, InstagramMention, MailboxHistory, MailboxProfile, MentionTarget, MessengerSend,
    OutboundEmail, SentMessage, WhatsappSend,
};
use omnidesk_core::types::{AdapterType, HealthStatus};
use omnidesk_core::{ChannelGateway, OmniError};

/// A scripted channel gateway.
///
/// Lookups that were not scripted fail with `OmniError::Channel`, the same
/// way an unreachable provider would.
pub struct MockGateway {
    media: Mutex<HashMap<String, String>>,
    mentions: Mutex<HashMap<String, InstagramMention>>,
    profile: Mutex<MailboxProfile>,
    watch: Mutex<Option<u64>>,
    history: Mutex<VecDeque<MailboxHistory>>,
    history_starts: Mutex<Vec<u64>>,
    emails: Mutex<HashMap<String, FetchedEmail>>,
    messenger_sent: Mutex<Vec<MessengerSend>>,
    whatsapp_sent: Mutex<Vec<WhatsappSend>>,
    emails_sent: Mutex<Vec<OutboundEmail>>,
    lookups: AtomicUsize,
    sends: AtomicUsize,
    fail_sends: AtomicBool,
}

impl MockGateway {
    /// Create a gateway with nothing scripted and mailbox `support@example.com`.
    pub fn new() -> Self {
        Self {
            media: Mutex::new(HashMap::new()),
            mentions: Mutex::new(HashMap::new()),
            profile: Mutex::new(MailboxProfile {
                email_address: "support@example.com".to_string(),
                history_id: 1,
            }),
            watch: Mutex::new(None),
            history: Mutex::new(VecDeque::new()),
            history_starts: Mutex::new(Vec::new()),
            emails: Mutex::new(HashMap::new()),
            messenger_sent: Mutex::new(Vec::new()),
            whatsapp_sent: Mutex::new(Vec::new()),
            emails_sent: Mutex::new(Vec::new()),
            lookups: AtomicUsize::new(0),
            sends: AtomicUsize::new(0),
            fail_sends: AtomicBool::new(false),
        }
    }

    pub async fn script_media(&self, media_id: &str, url: &str) {
        self.media
            .lock()
            .await
            .insert(media_id.to_string(), url.to_string());
    }

    /// Script a mention lookup keyed by comment or media id.
    pub async fn script_mention(&self, id: &str, text: &str, permalink: Option<&str>) {
        self.mentions.lock().await.insert(
            id.to_string(),
            InstagramMention {
                text: text.to_string(),
                permalink: permalink.map(str::to_string),
            },
        );
    }

    pub async fn set_mailbox(&self, email_address: &str) {
        self.profile.lock().await.email_address = email_address.to_string();
    }

    /// Make `watch_mailbox` succeed with this history id.
    pub async fn script_watch(&self, history_id: u64) {
        *self.watch.lock().await = Some(history_id);
    }

    /// Queue one history page; pages are served in order.
    pub async fn push_history(&self, message_ids: &[&str], history_id: u64) {
        self.history.lock().await.push_back(MailboxHistory {
            message_ids: message_ids.iter().map(|id| id.to_string()).collect(),
            history_id,
        });
    }

    pub async fn script_email(&self, email: FetchedEmail) {
        self.emails.lock().await.insert(email.id.clone(), email);
    }

    /// Make every outbound send fail.
    pub fn fail_sends(&self, fail: bool) {
        self.fail_sends.store(fail, Ordering::SeqCst);
    }

    /// Number of lookup calls (media, mention, history, fetch) served.
    pub fn lookup_count(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }

    pub async fn history_starts(&self) -> Vec<u64> {
        self.history_starts.lock().await.clone()
    }

    pub async fn messenger_sent(&self) -> Vec<MessengerSend> {
        self.messenger_sent.lock().await.clone()
    }

    pub async fn whatsapp_sent(&self) -> Vec<WhatsappSend> {
        self.whatsapp_sent.lock().await.clone()
    }

    pub async fn emails_sent(&self) -> Vec<OutboundEmail> {
        self.emails_sent.lock().await.clone()
    }

    fn lookup(&self) {
        self.lookups.fetch_add(1, Ordering::SeqCst);
    }

    fn next_send_id(&self, prefix: &str) -> Result<String, OmniError> {
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(OmniError::channel("mock send failure"));
        }
        let n = self.sends.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(format!("{prefix}-{n}"))
    }
}

impl Default for MockGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PluginAdapter for MockGateway {
    fn name(&self) -> &str {
        "mock-gateway"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Channel
    }

    async fn health_check(&self) -> Result<HealthStatus, OmniError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), OmniError> {
        Ok(())
    }
}

#[async_trait]
impl ChannelGateway for MockGateway {
    async fn resolve_whatsapp_media(&self, media_id: &str) -> Result<String, OmniError> {
        self.lookup();
        self.media
            .lock()
            .await
            .get(media_id)
            .cloned()
            .ok_or_else(|| OmniError::channel(format!("unknown media {media_id}")))
    }

    async fn fetch_instagram_mention(
        &self,
        _account_id: &str,
        target: &MentionTarget,
    ) -> Result<InstagramMention, OmniError> {
        self.lookup();
        let id = match target {
            MentionTarget::Comment(id) | MentionTarget::Media(id) => id,
        };
        self.mentions
            .lock()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| OmniError::channel(format!("unknown mention {id}")))
    }

    async fn send_messenger(&self, send: &MessengerSend) -> Result<SentMessage, OmniError> {
        let message_id = self.next_send_id("m_sent")?;
        self.messenger_sent.lock().await.push(send.clone());
        Ok(SentMessage {
            recipient_id: send.recipient_id.clone(),
            message_id,
        })
    }

    async fn send_whatsapp(&self, send: &WhatsappSend) -> Result<SentMessage, OmniError> {
        let message_id = self.next_send_id("wamid.sent")?;
        self.whatsapp_sent.lock().await.push(send.clone());
        Ok(SentMessage {
            recipient_id: send.recipient.clone(),
            message_id,
        })
    }

    async fn mailbox_profile(&self) -> Result<MailboxProfile, OmniError> {
        Ok(self.profile.lock().await.clone())
    }

    async fn watch_mailbox(&self) -> Result<u64, OmniError> {
        self.watch
            .lock()
            .await
            .ok_or_else(|| OmniError::channel("watch not scripted"))
    }

    async fn mailbox_history(&self, start_history_id: u64) -> Result<MailboxHistory, OmniError> {
        self.lookup();
        self.history_starts.lock().await.push(start_history_id);
        Ok(self
            .history
            .lock()
            .await
            .pop_front()
            .unwrap_or(MailboxHistory {
                message_ids: Vec::new(),
                history_id: start_history_id,
            }))
    }

    async fn fetch_email(&self, message_id: &str) -> Result<FetchedEmail, OmniError> {
        self.lookup();
        self.emails
            .lock()
            .await
            .get(message_id)
            .cloned()
            .ok_or_else(|| OmniError::channel(format!("unknown email {message_id}")))
    }

    async fn send_email(&self, email: &OutboundEmail) -> Result<String, OmniError> {
        let id = self.next_send_id("gmail-sent")?;
        self.emails_sent.lock().await.push(email.clone());
        Ok(id)
    }
}
