// SPDX-FileCopyrightText: 2026 Omnidesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Claim and close.
//!
//! Closing is a two-step saga without a coordinator: the interaction is
//! marked CLOSED, then handed off to the CRM. When the hand-off fails the
//! status is put back to IN_PROGRESS. A failed rollback is reported as
//! [`OmniError::CompensationFailed`] so callers can tell an interaction that
//! is CLOSED without CRM confirmation from an ordinary CRM failure.

use chrono::{NaiveDateTime, Utc};
use omnidesk_core::types::{
    ClosedInteractionReport, Interaction, InteractionStatus, InteractionType, InteractionUpdate,
    TIMESTAMP_FORMAT,
};
use omnidesk_core::OmniError;
use serde::Serialize;
use tracing::{error, info, warn};

use crate::Engine;

/// Response body of a successful close.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CloseOutcome {
    pub interaction_id: i64,
    pub agent_id: Option<String>,
    pub interaction_status: InteractionStatus,
}

/// Seconds between `created_at` and now; 0 when the timestamp is unreadable.
fn elapsed_secs(created_at: &str) -> i64 {
    NaiveDateTime::parse_from_str(created_at, TIMESTAMP_FORMAT)
        .map(|created| (Utc::now().naive_utc() - created).num_seconds().max(0))
        .unwrap_or(0)
}

impl Engine {
    /// Assign an interaction to an agent and move it to IN_PROGRESS.
    pub async fn claim(&self, interaction_id: i64, agent_id: &str) -> Result<Interaction, OmniError> {
        let update = InteractionUpdate {
            agent_id: Some(agent_id.to_string()),
            status: Some(InteractionStatus::InProgress),
            ..Default::default()
        };
        let interaction = self
            .ledger
            .update_interaction(interaction_id, &update)
            .await?
            .ok_or_else(|| OmniError::not_found("interaction", interaction_id))?;
        info!(interaction_id, agent_id, "interaction claimed");
        Ok(interaction)
    }

    /// Close an interaction and hand it off to the CRM, compensating on failure.
    pub async fn close(&self, interaction_id: i64) -> Result<CloseOutcome, OmniError> {
        let current = self
            .ledger
            .get_interaction(interaction_id)
            .await?
            .ok_or_else(|| OmniError::not_found("interaction", interaction_id))?;

        let update = InteractionUpdate {
            status: Some(InteractionStatus::Closed),
            duration_secs: Some(elapsed_secs(&current.created_at)),
            ..Default::default()
        };
        let closed = self
            .ledger
            .update_interaction(interaction_id, &update)
            .await?
            .ok_or_else(|| OmniError::not_found("interaction", interaction_id))?;

        if let Err(handoff) = self.hand_off(&closed).await {
            warn!(interaction_id, error = %handoff, "crm hand-off failed, reopening interaction");
            return Err(self.compensate(interaction_id, handoff).await);
        }

        info!(interaction_id, duration_secs = ?closed.duration_secs, "interaction closed");
        Ok(CloseOutcome {
            interaction_id,
            agent_id: closed.agent_id,
            interaction_status: closed.status,
        })
    }

    async fn hand_off(&self, interaction: &Interaction) -> Result<(), OmniError> {
        let reporter = match (interaction.interaction_type, interaction.reporter_id) {
            (InteractionType::Message, Some(reporter_id)) => {
                self.ledger.get_reporter(reporter_id).await?
            }
            _ => None,
        };
        let report = ClosedInteractionReport::new(interaction, reporter.as_ref());
        self.crm.submit_closed_interaction(&report).await
    }

    /// Put a closed interaction back to IN_PROGRESS. Returns the error to surface.
    async fn compensate(&self, interaction_id: i64, cause: OmniError) -> OmniError {
        let revert = InteractionUpdate {
            status: Some(InteractionStatus::InProgress),
            ..Default::default()
        };
        match self.ledger.update_interaction(interaction_id, &revert).await {
            Ok(Some(_)) => cause,
            Ok(None) => {
                error!(interaction_id, "interaction vanished during compensation");
                OmniError::CompensationFailed {
                    interaction_id,
                    message: format!("interaction missing after failed hand-off: {cause}"),
                }
            }
            Err(e) => {
                error!(interaction_id, error = %e, "compensation failed, interaction left CLOSED");
                OmniError::CompensationFailed {
                    interaction_id,
                    message: format!("{e} (after hand-off failure: {cause})"),
                }
            }
        }
    }
}
