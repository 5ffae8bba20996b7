// SPDX-FileCopyrightText: 2026 Omnidesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Ledger store trait: durable interaction, message, reporter and thread state.

use async_trait::async_trait;

use crate::error::OmniError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{
    ChannelAccount, Interaction, InteractionQuery, InteractionUpdate, Message, NewInteraction,
    NewMessage, NewReporter, Platform, Reporter, Thread,
};

/// Durable storage for the interaction ledger.
///
/// Lookups return `Ok(None)` for absent rows. Creates must enforce
/// uniqueness of external reporter ids, external message ids, thread ids and
/// ongoing interactions per correlation key, returning
/// [`OmniError::Conflict`] when a concurrent writer got there first.
#[async_trait]
pub trait LedgerStore: PluginAdapter {
    // --- Reporters ---

    async fn find_reporter_by_meta_id(&self, meta_id: &str)
    -> Result<Option<Reporter>, OmniError>;

    async fn find_reporter_by_email(&self, email: &str) -> Result<Option<Reporter>, OmniError>;

    async fn get_reporter(&self, id: i64) -> Result<Option<Reporter>, OmniError>;

    async fn create_reporter(&self, reporter: &NewReporter) -> Result<Reporter, OmniError>;

    // --- Interactions ---

    /// Ongoing direct-message interaction of a reporter on a platform.
    async fn find_ongoing_by_reporter(
        &self,
        reporter_id: i64,
        platform: Platform,
    ) -> Result<Option<Interaction>, OmniError>;

    /// Ongoing mention interaction for a mentioned post or media.
    async fn find_ongoing_by_mention_media(
        &self,
        media_id: &str,
    ) -> Result<Option<Interaction>, OmniError>;

    /// Ongoing interaction bound to a provider conversation (email thread).
    async fn find_ongoing_by_conversation(
        &self,
        conversation_id: &str,
    ) -> Result<Option<Interaction>, OmniError>;

    async fn get_interaction(&self, id: i64) -> Result<Option<Interaction>, OmniError>;

    /// Open a new interaction with status UNCLAIMED.
    async fn create_interaction(
        &self,
        interaction: &NewInteraction,
    ) -> Result<Interaction, OmniError>;

    /// Apply a partial update; `Ok(None)` when the interaction does not exist.
    async fn update_interaction(
        &self,
        id: i64,
        update: &InteractionUpdate,
    ) -> Result<Option<Interaction>, OmniError>;

    /// Matching interactions newest first, with the unpaginated total.
    async fn list_interactions(
        &self,
        query: &InteractionQuery,
    ) -> Result<(Vec<Interaction>, i64), OmniError>;

    // --- Messages ---

    async fn find_message_by_meta_id(&self, meta_id: &str)
    -> Result<Option<Message>, OmniError>;

    async fn create_message(&self, message: &NewMessage) -> Result<Message, OmniError>;

    /// Messages of an interaction in timestamp order.
    async fn list_messages(&self, interaction_id: i64) -> Result<Vec<Message>, OmniError>;

    /// Most recent message of an interaction, whatever its origin.
    async fn latest_message(&self, interaction_id: i64) -> Result<Option<Message>, OmniError>;

    /// Most recent message of an interaction that carries an external id.
    async fn latest_external_message(
        &self,
        interaction_id: i64,
    ) -> Result<Option<Message>, OmniError>;

    // --- Threads ---

    async fn get_thread(&self, id: &str) -> Result<Option<Thread>, OmniError>;

    async fn create_thread(&self, thread: &Thread) -> Result<Thread, OmniError>;

    // --- Channel accounts ---

    async fn get_channel_account(&self, id: i64) -> Result<Option<ChannelAccount>, OmniError>;

    /// Insert a channel account; the `id` field of the argument is ignored.
    async fn create_channel_account(
        &self,
        account: &ChannelAccount,
    ) -> Result<ChannelAccount, OmniError>;
}
