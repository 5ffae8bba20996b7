// SPDX-FileCopyrightText: 2026 Omnidesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Omnidesk workspace.

use thiserror::Error;

use crate::types::ErrorStatus;

/// A domain rule that blocked an agent-originated operation.
///
/// Each rule maps to its own wire status so the dashboard can render a
/// specific operator-facing message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RuleViolation {
    /// The acting agent has no channel account attached.
    #[error("user does not have a channel account")]
    NoChannelAccount,
    /// The channel account lacks the platform id required for this send.
    #[error("platform id is not set on the channel account")]
    PlatformIdNotSet,
    /// The channel account lacks the access token required for this send.
    #[error("platform access token is not set on the channel account")]
    AccessTokenNotSet,
    /// The interaction's platform id does not belong to the channel account.
    #[error("channel account does not match the interaction platform")]
    ChannelAccountMismatch,
}

/// The primary error type used across all Omnidesk traits and operations.
#[derive(Debug, Error)]
pub enum OmniError {
    /// Configuration errors (invalid TOML, missing required fields, type mismatches).
    #[error("configuration error: {0}")]
    Config(String),

    /// Ledger backend errors (connection, query failure, serialization).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A ledger record that the operation depends on does not exist.
    #[error("{entity} not found: {key}")]
    NotFound { entity: &'static str, key: String },

    /// A create hit a uniqueness constraint; the row already exists.
    #[error("{entity} already exists: {key}")]
    Conflict { entity: &'static str, key: String },

    /// Channel gateway errors (non-2xx response, network failure, bad body).
    #[error("channel error: {message}")]
    Channel {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A domain rule rejected the operation.
    #[error("rule violation: {0}")]
    Rule(#[from] RuleViolation),

    /// The CRM rejected or failed the closed-interaction hand-off.
    #[error("crm hand-off failed: {message}")]
    Crm { message: String },

    /// A saga compensation failed; the ledger may disagree with the CRM.
    #[error("compensation failed for interaction {interaction_id}: {message}")]
    CompensationFailed { interaction_id: i64, message: String },

    /// An inbound payload could not be decoded into the expected shape.
    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl OmniError {
    /// Shorthand for a [`OmniError::NotFound`] keyed by any displayable value.
    pub fn not_found(entity: &'static str, key: impl std::fmt::Display) -> Self {
        Self::NotFound {
            entity,
            key: key.to_string(),
        }
    }

    /// Shorthand for a [`OmniError::Channel`] without an underlying source.
    pub fn channel(message: impl Into<String>) -> Self {
        Self::Channel {
            message: message.into(),
            source: None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }

    /// Classify this error into the status code carried by the response envelope.
    pub fn error_status(&self) -> ErrorStatus {
        match self {
            Self::NotFound { .. } => ErrorStatus::DataNotFound,
            Self::InvalidPayload(_) => ErrorStatus::FailedBindJson,
            Self::Rule(RuleViolation::NoChannelAccount) => ErrorStatus::UserDoNotHaveChannelAccount,
            Self::Rule(RuleViolation::PlatformIdNotSet) => ErrorStatus::PlatformIdNotSet,
            Self::Rule(RuleViolation::AccessTokenNotSet) => ErrorStatus::PlatformAccessTokenNotSet,
            Self::Rule(RuleViolation::ChannelAccountMismatch) => ErrorStatus::ChannelAccountNotMatch,
            Self::Crm { .. } => ErrorStatus::CrmResponseError,
            _ => ErrorStatus::SystemBusy,
        }
    }
}
