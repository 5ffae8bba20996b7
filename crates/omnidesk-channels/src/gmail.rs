// SPDX-FileCopyrightText: 2026 Omnidesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Gmail REST client with OAuth refresh-token authentication.
//!
//! Access tokens are cached and refreshed shortly before expiry. Messages are
//! fetched in `raw` form and parsed locally so the `From`/`Date` headers reach
//! the engine exactly as the sender wrote them.

use std::time::{Duration, Instant};

use base64::Engine as _;
use base64::engine::general_purpose::{URL_SAFE, URL_SAFE_NO_PAD};
use mail_parser::MessageParser;
use omnidesk_config::model::GmailConfig;
use omnidesk_core::OmniError;
use omnidesk_core::traits::gateway::{FetchedEmail, MailboxHistory, MailboxProfile, OutboundEmail};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::http::{build_client, decode, transport_err, u64_from_string_or_number};

/// Refresh the access token this long before it expires.
const REFRESH_MARGIN: Duration = Duration::from_secs(60);

struct CachedToken {
    value: String,
    expires_at: Instant,
}

/// Client for the Gmail `users/me` API.
pub struct GmailClient {
    client: reqwest::Client,
    api_base_url: String,
    token_url: String,
    client_id: String,
    client_secret: String,
    refresh_token: String,
    topic_name: Option<String>,
    label_ids: Vec<String>,
    token: Mutex<Option<CachedToken>>,
}

impl std::fmt::Debug for GmailClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GmailClient")
            .field("api_base_url", &self.api_base_url)
            .field("token_url", &self.token_url)
            .field("client_id", &self.client_id)
            .finish_non_exhaustive()
    }
}

#[derive(Serialize)]
struct RefreshForm<'a> {
    client_id: &'a str,
    client_secret: &'a str,
    refresh_token: &'a str,
    grant_type: &'static str,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: u64,
}

fn default_expires_in() -> u64 {
    3600
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProfileResponse {
    email_address: String,
    #[serde(deserialize_with = "u64_from_string_or_number")]
    history_id: u64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WatchResponse {
    #[serde(deserialize_with = "u64_from_string_or_number")]
    history_id: u64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct HistoryResponse {
    #[serde(default)]
    history: Vec<HistoryRecord>,
    #[serde(deserialize_with = "u64_from_string_or_number")]
    history_id: u64,
}

#[derive(Deserialize)]
struct HistoryRecord {
    #[serde(default)]
    messages: Vec<MessageRef>,
}

#[derive(Deserialize)]
struct MessageRef {
    id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawMessage {
    id: String,
    thread_id: String,
    raw: String,
}

impl GmailClient {
    /// Build a client; fails when the OAuth credentials are missing.
    pub fn new(config: &GmailConfig, timeout_secs: u64) -> Result<Self, OmniError> {
        let required = |value: &Option<String>, key: &str| {
            value
                .clone()
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| OmniError::Config(format!("gmail.{key} is required")))
        };
        Ok(Self {
            client: build_client(timeout_secs)?,
            api_base_url: config.api_base_url.trim_end_matches('/').to_string(),
            token_url: config.token_url.clone(),
            client_id: required(&config.client_id, "client_id")?,
            client_secret: required(&config.client_secret, "client_secret")?,
            refresh_token: required(&config.refresh_token, "refresh_token")?,
            topic_name: config.topic_name.clone(),
            label_ids: config.label_ids.clone(),
            token: Mutex::new(None),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/users/me/{path}", self.api_base_url)
    }

    /// Current access token, refreshing it when absent or about to expire.
    async fn access_token(&self) -> Result<String, OmniError> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref()
            && token.expires_at > Instant::now() + REFRESH_MARGIN
        {
            return Ok(token.value.clone());
        }

        let form = serde_urlencoded::to_string(RefreshForm {
            client_id: &self.client_id,
            client_secret: &self.client_secret,
            refresh_token: &self.refresh_token,
            grant_type: "refresh_token",
        })
        .map_err(|e| OmniError::Internal(format!("failed to encode token request: {e}")))?;

        let response = self
            .client
            .post(&self.token_url)
            .header(
                reqwest::header::CONTENT_TYPE,
                "application/x-www-form-urlencoded",
            )
            .body(form)
            .send()
            .await
            .map_err(|e| transport_err("gmail token refresh", e))?;
        let token: TokenResponse = decode("gmail token refresh", response).await?;
        debug!(expires_in = token.expires_in, "gmail access token refreshed");

        let value = token.access_token.clone();
        *cached = Some(CachedToken {
            value: token.access_token,
            expires_at: Instant::now() + Duration::from_secs(token.expires_in),
        });
        Ok(value)
    }

    pub async fn profile(&self) -> Result<MailboxProfile, OmniError> {
        let token = self.access_token().await?;
        let response = self
            .client
            .get(self.url("profile"))
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| transport_err("gmail profile", e))?;
        let profile: ProfileResponse = decode("gmail profile", response).await?;
        Ok(MailboxProfile {
            email_address: profile.email_address,
            history_id: profile.history_id,
        })
    }

    /// Register the push subscription for the configured labels.
    pub async fn watch(&self) -> Result<u64, OmniError> {
        let topic = self
            .topic_name
            .as_deref()
            .ok_or_else(|| OmniError::Config("gmail.topic_name is required to watch".into()))?;
        let token = self.access_token().await?;
        let response = self
            .client
            .post(self.url("watch"))
            .bearer_auth(token)
            .json(&json!({ "labelIds": self.label_ids, "topicName": topic }))
            .send()
            .await
            .map_err(|e| transport_err("gmail watch", e))?;
        let watch: WatchResponse = decode("gmail watch", response).await?;
        info!(history_id = watch.history_id, "gmail watch registered");
        Ok(watch.history_id)
    }

    /// Ids of messages added since `start_history_id`, first message per record.
    pub async fn history(&self, start_history_id: u64) -> Result<MailboxHistory, OmniError> {
        let token = self.access_token().await?;
        let url = reqwest::Url::parse_with_params(
            &self.url("history"),
            &[
                ("startHistoryId", start_history_id.to_string()),
                ("historyTypes", "messageAdded".to_string()),
            ],
        )
        .map_err(|e| OmniError::channel(format!("invalid gmail history URL: {e}")))?;

        let response = self
            .client
            .get(url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| transport_err("gmail history", e))?;
        let history: HistoryResponse = decode("gmail history", response).await?;

        let message_ids = history
            .history
            .into_iter()
            .filter_map(|record| record.messages.into_iter().next())
            .map(|m| m.id)
            .collect();
        Ok(MailboxHistory {
            message_ids,
            history_id: history.history_id,
        })
    }

    pub async fn fetch(&self, message_id: &str) -> Result<FetchedEmail, OmniError> {
        let token = self.access_token().await?;
        let url = reqwest::Url::parse_with_params(
            &self.url(&format!("messages/{message_id}")),
            &[("format", "raw")],
        )
        .map_err(|e| OmniError::channel(format!("invalid gmail message URL: {e}")))?;

        let response = self
            .client
            .get(url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| transport_err("gmail message", e))?;
        let raw: RawMessage = decode("gmail message", response).await?;
        parse_raw_message(raw)
    }

    /// Submit a reply into its thread and return the new message id.
    pub async fn send(&self, email: &OutboundEmail) -> Result<String, OmniError> {
        let token = self.access_token().await?;
        let raw = URL_SAFE_NO_PAD.encode(email.to_rfc2822());
        let response = self
            .client
            .post(self.url("messages/send"))
            .bearer_auth(token)
            .json(&json!({ "raw": raw, "threadId": email.thread_id }))
            .send()
            .await
            .map_err(|e| transport_err("gmail send", e))?;
        let sent: MessageRef = decode("gmail send", response).await?;
        Ok(sent.id)
    }
}

fn parse_raw_message(raw: RawMessage) -> Result<FetchedEmail, OmniError> {
    // Gmail pads inconsistently; normalize before decoding.
    let trimmed = raw.raw.trim_end_matches('=');
    let bytes = URL_SAFE_NO_PAD
        .decode(trimmed)
        .or_else(|_| URL_SAFE.decode(&raw.raw))
        .map_err(|e| OmniError::InvalidPayload(format!("gmail message {} is not base64: {e}", raw.id)))?;

    let parsed = MessageParser::default().parse(&bytes).ok_or_else(|| {
        OmniError::InvalidPayload(format!("gmail message {} is not valid MIME", raw.id))
    })?;

    let header = |name: &str| {
        parsed
            .header_raw(name)
            .map(|v| v.trim().to_string())
            .unwrap_or_default()
    };

    Ok(FetchedEmail {
        subject: parsed.subject().unwrap_or_default().to_string(),
        from: header("From"),
        date: header("Date"),
        body: parsed
            .body_text(0)
            .map(|b| b.into_owned())
            .unwrap_or_default(),
        id: raw.id,
        thread_id: raw.thread_id,
    })
}
