// SPDX-FileCopyrightText: 2026 Omnidesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Dashboard read models.

use omnidesk_core::types::{Interaction, InteractionQuery, InteractionStatus, Message, Reporter, Thread};
use omnidesk_core::{OmniError, Platform};
use serde::Serialize;

use crate::Engine;
use crate::outbound::Actor;

#[derive(Debug, Clone, Serialize)]
pub struct InteractionPage {
    pub interaction_list: Vec<Interaction>,
    pub total: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_size: Option<u32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct InteractionMessages {
    pub interaction: Interaction,
    pub messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thread_info: Option<Thread>,
}

/// An agent's interaction with its most recent message.
#[derive(Debug, Clone, Serialize)]
pub struct AgentInteraction {
    #[serde(flatten)]
    pub interaction: Interaction,
    pub latest_message: Option<Message>,
}

/// A closed interaction with its reporter, for reporting exports.
#[derive(Debug, Clone, Serialize)]
pub struct ClosedInteraction {
    #[serde(flatten)]
    pub interaction: Interaction,
    pub reporter: Option<Reporter>,
}

impl Engine {
    /// Interactions visible through the actor's channel account.
    ///
    /// An empty result is reported as not found.
    pub async fn list_interactions(
        &self,
        mut query: InteractionQuery,
        actor: &Actor,
    ) -> Result<InteractionPage, OmniError> {
        let account = self.channel_account(actor).await?;
        query.scope = Some(account.scope());

        let (interaction_list, total) = self.ledger.list_interactions(&query).await?;
        if interaction_list.is_empty() {
            return Err(OmniError::not_found("interaction", "query"));
        }
        Ok(InteractionPage {
            interaction_list,
            total,
            page: query.page,
            page_size: query.page_size,
        })
    }

    /// One interaction with its timeline, plus the thread for email.
    pub async fn interaction_messages(
        &self,
        interaction_id: i64,
    ) -> Result<InteractionMessages, OmniError> {
        let interaction = self
            .ledger
            .get_interaction(interaction_id)
            .await?
            .ok_or_else(|| OmniError::not_found("interaction", interaction_id))?;
        let messages = self.ledger.list_messages(interaction_id).await?;

        let thread_info = match (&interaction.platform, &interaction.conversation_id) {
            (Platform::Email, Some(thread_id)) => self.ledger.get_thread(thread_id).await?,
            _ => None,
        };

        Ok(InteractionMessages {
            interaction,
            messages,
            thread_info,
        })
    }

    /// Interactions assigned to an agent, newest first.
    pub async fn my_interactions(&self, agent_id: &str) -> Result<Vec<AgentInteraction>, OmniError> {
        let query = InteractionQuery {
            agent_ids: vec![agent_id.to_string()],
            ..Default::default()
        };
        let (interactions, _) = self.ledger.list_interactions(&query).await?;
        if interactions.is_empty() {
            return Err(OmniError::not_found("interaction", agent_id));
        }

        let mut out = Vec::with_capacity(interactions.len());
        for interaction in interactions {
            let latest_message = self.ledger.latest_message(interaction.id).await?;
            out.push(AgentInteraction {
                interaction,
                latest_message,
            });
        }
        Ok(out)
    }

    /// Every closed interaction with its reporter.
    pub async fn closed_data(&self) -> Result<Vec<ClosedInteraction>, OmniError> {
        let query = InteractionQuery {
            statuses: vec![InteractionStatus::Closed],
            ..Default::default()
        };
        let (interactions, _) = self.ledger.list_interactions(&query).await?;
        if interactions.is_empty() {
            return Err(OmniError::not_found("interaction", "CLOSED"));
        }

        let mut out = Vec::with_capacity(interactions.len());
        for interaction in interactions {
            let reporter = match interaction.reporter_id {
                Some(id) => self.ledger.get_reporter(id).await?,
                None => None,
            };
            out.push(ClosedInteraction {
                interaction,
                reporter,
            });
        }
        Ok(out)
    }
}
