// SPDX-FileCopyrightText: 2026 Omnidesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory ledger for deterministic testing.
//!
//! `MemoryLedger` implements `LedgerStore` with the same uniqueness rules the
//! SQLite schema enforces: unique reporter external id, unique message
//! external id, unique thread id and at most one ongoing interaction per
//! correlation key. Violations surface as `OmniError::Conflict`.

use async_trait::async_trait;
use tokio::sync::Mutex;

use omnidesk_core::traits::adapter::PluginAdapter;
use omnidesk_core::types::{
    AdapterType, ChannelAccount, HealthStatus, Interaction, InteractionQuery, InteractionStatus,
    InteractionType, InteractionUpdate, Message, NewInteraction, NewMessage, NewReporter, Reporter,
    Thread, now_timestamp,
};
use omnidesk_core::{LedgerStore, OmniError, Platform};

#[derive(Default)]
struct State {
    reporters: Vec<Reporter>,
    interactions: Vec<Interaction>,
    messages: Vec<Message>,
    threads: Vec<Thread>,
    accounts: Vec<ChannelAccount>,
    /// Reporters created as email senders.
    email_senders: Vec<i64>,
    next_id: i64,
    rejected_status: Option<InteractionStatus>,
}

impl State {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    /// Ongoing interaction that would collide with `new`, if any.
    /// Key of an ongoing interaction, other than `except`, that `new` would duplicate.
    fn ongoing_collision(&self, new: &NewInteraction, except: Option<i64>) -> Option<String> {
        self.interactions
            .iter()
            .filter(|i| i.status.is_ongoing() && Some(i.id) != except)
            .find_map(|i| {
                if let Some(media) = &new.mention_media_id
                    && i.mention_media_id.as_ref() == Some(media)
                {
                    return Some(media.clone());
                }
                if let Some(conversation) = &new.conversation_id
                    && i.conversation_id.as_ref() == Some(conversation)
                {
                    return Some(conversation.clone());
                }
                let keyed_by_reporter = new.interaction_type == InteractionType::Message
                    && !matches!(new.platform, Platform::Email | Platform::LiveChat);
                (keyed_by_reporter
                    && i.interaction_type == InteractionType::Message
                    && i.platform == new.platform
                    && i.reporter_id == new.reporter_id)
                    .then(|| format!("{:?}/{}", new.reporter_id, new.platform))
            })
    }
}

/// An in-memory [`LedgerStore`].
#[derive(Default)]
pub struct MemoryLedger {
    state: Mutex<State>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every update that sets `status` fail with a storage error.
    pub async fn reject_status_updates(&self, status: InteractionStatus) {
        self.state.lock().await.rejected_status = Some(status);
    }

    pub async fn reporter_count(&self) -> usize {
        self.state.lock().await.reporters.len()
    }

    pub async fn interaction_count(&self) -> usize {
        self.state.lock().await.interactions.len()
    }

    pub async fn message_count(&self) -> usize {
        self.state.lock().await.messages.len()
    }
}

#[async_trait]
impl PluginAdapter for MemoryLedger {
    fn name(&self) -> &str {
        "memory-ledger"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Ledger
    }

    async fn health_check(&self) -> Result<HealthStatus, OmniError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), OmniError> {
        Ok(())
    }
}

#[async_trait]
impl LedgerStore for MemoryLedger {
    async fn find_reporter_by_meta_id(
        &self,
        meta_id: &str,
    ) -> Result<Option<Reporter>, OmniError> {
        let state = self.state.lock().await;
        Ok(state
            .reporters
            .iter()
            .find(|r| r.meta_reporter_id.as_deref() == Some(meta_id))
            .cloned())
    }

    async fn find_reporter_by_email(&self, email: &str) -> Result<Option<Reporter>, OmniError> {
        let state = self.state.lock().await;
        Ok(state
            .reporters
            .iter()
            .find(|r| r.email.as_deref() == Some(email))
            .cloned())
    }

    async fn get_reporter(&self, id: i64) -> Result<Option<Reporter>, OmniError> {
        let state = self.state.lock().await;
        Ok(state.reporters.iter().find(|r| r.id == id).cloned())
    }

    async fn create_reporter(&self, reporter: &NewReporter) -> Result<Reporter, OmniError> {
        // Let concurrent callers interleave between their lookup and create.
        tokio::task::yield_now().await;
        let mut state = self.state.lock().await;
        if let Some(meta_id) = &reporter.meta_reporter_id
            && state
                .reporters
                .iter()
                .any(|r| r.meta_reporter_id.as_ref() == Some(meta_id))
        {
            return Err(OmniError::Conflict {
                entity: "reporter",
                key: meta_id.clone(),
            });
        }
        if reporter.email_sender
            && let Some(email) = &reporter.email
            && state.email_senders.iter().any(|id| {
                state.reporters.iter().any(|r| {
                    r.id == *id
                        && !r.is_deleted
                        && r.email.as_ref().is_some_and(|e| e.eq_ignore_ascii_case(email))
                })
            })
        {
            return Err(OmniError::Conflict {
                entity: "reporter",
                key: email.clone(),
            });
        }
        let now = now_timestamp();
        let created = Reporter {
            id: state.next_id(),
            meta_reporter_id: reporter.meta_reporter_id.clone(),
            name: reporter.name.clone(),
            email: reporter.email.clone(),
            phone_number: reporter.phone_number.clone(),
            gender: None,
            address: None,
            platform_username: None,
            is_deleted: false,
            created_at: now.clone(),
            updated_at: now,
        };
        if reporter.email_sender {
            state.email_senders.push(created.id);
        }
        state.reporters.push(created.clone());
        Ok(created)
    }

    async fn find_ongoing_by_reporter(
        &self,
        reporter_id: i64,
        platform: Platform,
    ) -> Result<Option<Interaction>, OmniError> {
        let state = self.state.lock().await;
        Ok(state
            .interactions
            .iter()
            .find(|i| {
                i.status.is_ongoing()
                    && i.reporter_id == Some(reporter_id)
                    && i.platform == platform
                    && i.interaction_type == InteractionType::Message
            })
            .cloned())
    }

    async fn find_ongoing_by_mention_media(
        &self,
        media_id: &str,
    ) -> Result<Option<Interaction>, OmniError> {
        let state = self.state.lock().await;
        Ok(state
            .interactions
            .iter()
            .find(|i| i.status.is_ongoing() && i.mention_media_id.as_deref() == Some(media_id))
            .cloned())
    }

    async fn find_ongoing_by_conversation(
        &self,
        conversation_id: &str,
    ) -> Result<Option<Interaction>, OmniError> {
        let state = self.state.lock().await;
        Ok(state
            .interactions
            .iter()
            .find(|i| {
                i.status.is_ongoing() && i.conversation_id.as_deref() == Some(conversation_id)
            })
            .cloned())
    }

    async fn get_interaction(&self, id: i64) -> Result<Option<Interaction>, OmniError> {
        let state = self.state.lock().await;
        Ok(state.interactions.iter().find(|i| i.id == id).cloned())
    }

    async fn create_interaction(
        &self,
        interaction: &NewInteraction,
    ) -> Result<Interaction, OmniError> {
        tokio::task::yield_now().await;
        let mut state = self.state.lock().await;
        if let Some(key) = state.ongoing_collision(interaction, None) {
            return Err(OmniError::Conflict {
                entity: "interaction",
                key,
            });
        }
        let now = now_timestamp();
        let created = Interaction {
            id: state.next_id(),
            platform_id: interaction.platform_id.clone(),
            reporter_id: interaction.reporter_id,
            conversation_id: interaction.conversation_id.clone(),
            mention_media_id: interaction.mention_media_id.clone(),
            mention_media_url: interaction.mention_media_url.clone(),
            agent_id: None,
            status: InteractionStatus::Unclaimed,
            platform: interaction.platform,
            interaction_type: interaction.interaction_type,
            latitude: None,
            longitude: None,
            duration_secs: None,
            created_at: now.clone(),
            updated_at: now,
        };
        state.interactions.push(created.clone());
        Ok(created)
    }

    async fn update_interaction(
        &self,
        id: i64,
        update: &InteractionUpdate,
    ) -> Result<Option<Interaction>, OmniError> {
        let mut state = self.state.lock().await;
        if update.status.is_some() && update.status == state.rejected_status {
            return Err(OmniError::Storage {
                source: "status update rejected".into(),
            });
        }
        let Some(current) = state.interactions.iter().find(|i| i.id == id) else {
            return Ok(None);
        };
        if let Some(status) = update.status
            && status.is_ongoing()
            && !current.status.is_ongoing()
        {
            let reopened = NewInteraction {
                platform_id: current.platform_id.clone(),
                reporter_id: current.reporter_id,
                conversation_id: current.conversation_id.clone(),
                mention_media_id: current.mention_media_id.clone(),
                mention_media_url: current.mention_media_url.clone(),
                platform: current.platform,
                interaction_type: current.interaction_type,
            };
            if state.ongoing_collision(&reopened, Some(id)).is_some() {
                return Err(OmniError::Conflict {
                    entity: "ongoing interaction",
                    key: id.to_string(),
                });
            }
        }
        let Some(interaction) = state.interactions.iter_mut().find(|i| i.id == id) else {
            return Ok(None);
        };
        if let Some(agent_id) = &update.agent_id {
            interaction.agent_id = Some(agent_id.clone());
        }
        if let Some(status) = update.status {
            interaction.status = status;
        }
        if let Some(duration) = update.duration_secs {
            interaction.duration_secs = Some(duration);
        }
        interaction.updated_at = now_timestamp();
        Ok(Some(interaction.clone()))
    }

    async fn list_interactions(
        &self,
        query: &InteractionQuery,
    ) -> Result<(Vec<Interaction>, i64), OmniError> {
        let state = self.state.lock().await;
        let mut matching: Vec<Interaction> = state
            .interactions
            .iter()
            .filter(|i| query.matches(i))
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        let total = matching.len() as i64;
        let page = match query.window() {
            Some((offset, limit)) => matching
                .into_iter()
                .skip(usize::try_from(offset).unwrap_or(usize::MAX))
                .take(usize::try_from(limit).unwrap_or(usize::MAX))
                .collect(),
            None => matching,
        };
        Ok((page, total))
    }

    async fn find_message_by_meta_id(
        &self,
        meta_id: &str,
    ) -> Result<Option<Message>, OmniError> {
        let state = self.state.lock().await;
        Ok(state
            .messages
            .iter()
            .find(|m| m.meta_message_id.as_deref() == Some(meta_id))
            .cloned())
    }

    async fn create_message(&self, message: &NewMessage) -> Result<Message, OmniError> {
        tokio::task::yield_now().await;
        let mut state = self.state.lock().await;
        if let Some(meta_id) = &message.meta_message_id
            && state
                .messages
                .iter()
                .any(|m| m.meta_message_id.as_ref() == Some(meta_id))
        {
            return Err(OmniError::Conflict {
                entity: "message",
                key: meta_id.clone(),
            });
        }
        let now = now_timestamp();
        let created = Message {
            id: state.next_id(),
            interaction_id: message.interaction_id,
            sender_id: message.sender_id.clone(),
            recipient_id: message.recipient_id.clone(),
            meta_message_id: message.meta_message_id.clone(),
            body: message.body.clone(),
            message_timestamp: message.message_timestamp.clone(),
            attachment_type: message.attachment_type,
            attachment_url: message.attachment_url.clone(),
            sent_by: message.sent_by,
            is_read: false,
            is_deleted: false,
            created_at: now.clone(),
            updated_at: now,
        };
        state.messages.push(created.clone());
        Ok(created)
    }

    async fn list_messages(&self, interaction_id: i64) -> Result<Vec<Message>, OmniError> {
        let state = self.state.lock().await;
        let mut messages: Vec<Message> = state
            .messages
            .iter()
            .filter(|m| m.interaction_id == interaction_id)
            .cloned()
            .collect();
        messages.sort_by(|a, b| {
            a.message_timestamp
                .cmp(&b.message_timestamp)
                .then(a.id.cmp(&b.id))
        });
        Ok(messages)
    }

    async fn latest_message(&self, interaction_id: i64) -> Result<Option<Message>, OmniError> {
        Ok(self.list_messages(interaction_id).await?.pop())
    }

    async fn latest_external_message(
        &self,
        interaction_id: i64,
    ) -> Result<Option<Message>, OmniError> {
        Ok(self
            .list_messages(interaction_id)
            .await?
            .into_iter()
            .rev()
            .find(|m| m.meta_message_id.is_some()))
    }

    async fn get_thread(&self, id: &str) -> Result<Option<Thread>, OmniError> {
        let state = self.state.lock().await;
        Ok(state.threads.iter().find(|t| t.id == id).cloned())
    }

    async fn create_thread(&self, thread: &Thread) -> Result<Thread, OmniError> {
        let mut state = self.state.lock().await;
        if state.threads.iter().any(|t| t.id == thread.id) {
            return Err(OmniError::Conflict {
                entity: "thread",
                key: thread.id.clone(),
            });
        }
        state.threads.push(thread.clone());
        Ok(thread.clone())
    }

    async fn get_channel_account(&self, id: i64) -> Result<Option<ChannelAccount>, OmniError> {
        let state = self.state.lock().await;
        Ok(state.accounts.iter().find(|a| a.id == id).cloned())
    }

    async fn create_channel_account(
        &self,
        account: &ChannelAccount,
    ) -> Result<ChannelAccount, OmniError> {
        let mut state = self.state.lock().await;
        let created = ChannelAccount {
            id: state.next_id(),
            ..account.clone()
        };
        state.accounts.push(created.clone());
        Ok(created)
    }
}
