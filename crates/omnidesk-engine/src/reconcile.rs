// SPDX-FileCopyrightText: 2026 Omnidesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Find-or-create primitives shared by every ingestion path.

use std::future::Future;

use omnidesk_core::types::{
    Interaction, Message, NewInteraction, NewMessage, NewReporter, Reporter,
};
use omnidesk_core::{OmniError, Platform};
use tracing::{debug, info};

use crate::Engine;

/// Look a row up, creating it when absent.
///
/// A conflict on create means a concurrent writer won the race; the row is
/// re-fetched and returned as pre-existing. Returns `(row, created)`.
pub(crate) async fn find_or_create<T, Find, FindFut, Create, CreateFut>(
    find: Find,
    create: Create,
) -> Result<(T, bool), OmniError>
where
    Find: Fn() -> FindFut,
    FindFut: Future<Output = Result<Option<T>, OmniError>>,
    Create: FnOnce() -> CreateFut,
    CreateFut: Future<Output = Result<T, OmniError>>,
{
    if let Some(existing) = find().await? {
        return Ok((existing, false));
    }
    match create().await {
        Ok(created) => Ok((created, true)),
        Err(e) if e.is_conflict() => {
            debug!(error = %e, "lost create race, re-fetching");
            find().await?.map(|existing| (existing, false)).ok_or(e)
        }
        Err(e) => Err(e),
    }
}

impl Engine {
    /// Reporter keyed by a platform-assigned id.
    pub(crate) async fn reporter_by_meta_id(
        &self,
        meta_id: &str,
        name: &str,
    ) -> Result<Reporter, OmniError> {
        let new = NewReporter {
            meta_reporter_id: Some(meta_id.to_string()),
            name: name.to_string(),
            ..Default::default()
        };
        let (reporter, created) = find_or_create(
            || self.ledger.find_reporter_by_meta_id(meta_id),
            || self.ledger.create_reporter(&new),
        )
        .await?;
        if created {
            debug!(reporter_id = reporter.id, "reporter created");
        }
        Ok(reporter)
    }

    /// Reporter keyed by email address.
    pub(crate) async fn reporter_by_email(
        &self,
        email: &str,
        name: &str,
    ) -> Result<Reporter, OmniError> {
        let new = NewReporter {
            name: name.to_string(),
            email: Some(email.to_string()),
            email_sender: true,
            ..Default::default()
        };
        let (reporter, _) = find_or_create(
            || self.ledger.find_reporter_by_email(email),
            || self.ledger.create_reporter(&new),
        )
        .await?;
        Ok(reporter)
    }

    /// Ongoing direct-message interaction of a reporter, opened if needed.
    pub(crate) async fn ongoing_direct(
        &self,
        platform: Platform,
        platform_id: &str,
        reporter_id: i64,
    ) -> Result<Interaction, OmniError> {
        let new = NewInteraction::direct(platform, platform_id, reporter_id);
        let (interaction, created) = find_or_create(
            || self.ledger.find_ongoing_by_reporter(reporter_id, platform),
            || self.ledger.create_interaction(&new),
        )
        .await?;
        if created {
            info!(interaction_id = interaction.id, platform = %platform, "interaction opened");
        }
        Ok(interaction)
    }

    /// Ongoing mention interaction for a post or media, opened if needed.
    pub(crate) async fn ongoing_mention(
        &self,
        platform: Platform,
        platform_id: &str,
        media_id: &str,
        media_url: Option<String>,
    ) -> Result<Interaction, OmniError> {
        let new = NewInteraction::mention(platform, platform_id, media_id, media_url);
        let (interaction, created) = find_or_create(
            || self.ledger.find_ongoing_by_mention_media(media_id),
            || self.ledger.create_interaction(&new),
        )
        .await?;
        if created {
            info!(interaction_id = interaction.id, platform = %platform, media_id, "mention interaction opened");
        }
        Ok(interaction)
    }

    /// Ongoing email interaction bound to a provider thread, opened if needed.
    pub(crate) async fn ongoing_conversation(
        &self,
        platform_id: &str,
        conversation_id: &str,
        reporter_id: i64,
    ) -> Result<Interaction, OmniError> {
        let new = NewInteraction {
            conversation_id: Some(conversation_id.to_string()),
            ..NewInteraction::direct(Platform::Email, platform_id, reporter_id)
        };
        let (interaction, created) = find_or_create(
            || self.ledger.find_ongoing_by_conversation(conversation_id),
            || self.ledger.create_interaction(&new),
        )
        .await?;
        if created {
            info!(interaction_id = interaction.id, conversation_id, "email interaction opened");
        }
        Ok(interaction)
    }

    /// Persist a message unless its external id is already recorded.
    pub(crate) async fn record_message(
        &self,
        message: &NewMessage,
    ) -> Result<(Message, bool), OmniError> {
        match message.meta_message_id.as_deref() {
            Some(meta_id) => {
                find_or_create(
                    || self.ledger.find_message_by_meta_id(meta_id),
                    || self.ledger.create_message(message),
                )
                .await
            }
            None => Ok((self.ledger.create_message(message).await?, true)),
        }
    }

    /// Existing message for an external id, if this delivery is a redelivery.
    pub(crate) async fn delivered(&self, meta_id: &str) -> Result<Option<Message>, OmniError> {
        let existing = self.ledger.find_message_by_meta_id(meta_id).await?;
        if existing.is_some() {
            debug!(meta_id, "message already recorded");
        }
        Ok(existing)
    }
}
