// SPDX-FileCopyrightText: 2026 Omnidesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for Omnidesk.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use serde::{Deserialize, Serialize};

/// Top-level Omnidesk configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable overrides.
/// All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct OmnideskConfig {
    /// HTTP listener and dashboard API settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Webhook verification settings.
    #[serde(default)]
    pub webhook: WebhookConfig,

    /// Ledger storage settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Meta Graph API settings (Facebook, Instagram, WhatsApp).
    #[serde(default)]
    pub meta: MetaConfig,

    /// Gmail API settings.
    #[serde(default)]
    pub gmail: GmailConfig,

    /// CRM hand-off settings.
    #[serde(default)]
    pub crm: CrmConfig,

    /// Real-time socket layer settings.
    #[serde(default)]
    pub realtime: RealtimeConfig,
}

/// HTTP listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Address to bind.
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to bind.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Bearer token for the dashboard API. `None` rejects every API call.
    #[serde(default)]
    pub api_token: Option<String>,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            api_token: None,
            log_level: default_log_level(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Webhook verification configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct WebhookConfig {
    /// Secret echoed by Meta in `hub.verify_token`. `None` rejects every handshake.
    #[serde(default)]
    pub verify_token: Option<String>,
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL (Write-Ahead Logging) mode for SQLite.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("omnidesk").join("omnidesk.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("omnidesk.db"))
        .to_string_lossy()
        .into_owned()
}

fn default_wal_mode() -> bool {
    true
}

/// Meta Graph API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct MetaConfig {
    /// Graph API base URL.
    #[serde(default = "default_graph_base_url")]
    pub graph_base_url: String,

    /// Graph API version for Messenger and Instagram.
    #[serde(default = "default_graph_api_version")]
    pub api_version: String,

    /// Graph API version for WhatsApp Cloud.
    #[serde(default = "default_graph_api_version")]
    pub wa_api_version: String,

    /// System-user token used to resolve WhatsApp media.
    #[serde(default)]
    pub wa_access_token: Option<String>,

    /// Token used to look up Instagram mentions.
    #[serde(default)]
    pub ig_access_token: Option<String>,

    /// Per-request timeout in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for MetaConfig {
    fn default() -> Self {
        Self {
            graph_base_url: default_graph_base_url(),
            api_version: default_graph_api_version(),
            wa_api_version: default_graph_api_version(),
            wa_access_token: None,
            ig_access_token: None,
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

fn default_graph_base_url() -> String {
    "https://graph.facebook.com".to_string()
}

fn default_graph_api_version() -> String {
    "v18.0".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

/// Gmail API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GmailConfig {
    /// Enable the email channel.
    #[serde(default)]
    pub enabled: bool,

    /// Gmail REST base URL.
    #[serde(default = "default_gmail_api_base_url")]
    pub api_base_url: String,

    /// OAuth token endpoint.
    #[serde(default = "default_gmail_token_url")]
    pub token_url: String,

    #[serde(default)]
    pub client_id: Option<String>,

    #[serde(default)]
    pub client_secret: Option<String>,

    /// Long-lived OAuth refresh token of the support mailbox.
    #[serde(default)]
    pub refresh_token: Option<String>,

    /// Pub/Sub topic the mailbox watch publishes to.
    #[serde(default)]
    pub topic_name: Option<String>,

    /// Labels the mailbox watch is restricted to.
    #[serde(default = "default_gmail_label_ids")]
    pub label_ids: Vec<String>,
}

impl Default for GmailConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_base_url: default_gmail_api_base_url(),
            token_url: default_gmail_token_url(),
            client_id: None,
            client_secret: None,
            refresh_token: None,
            topic_name: None,
            label_ids: default_gmail_label_ids(),
        }
    }
}

fn default_gmail_api_base_url() -> String {
    "https://gmail.googleapis.com/gmail/v1".to_string()
}

fn default_gmail_token_url() -> String {
    "https://oauth2.googleapis.com/token".to_string()
}

fn default_gmail_label_ids() -> Vec<String> {
    vec!["INBOX".to_string(), "UNREAD".to_string()]
}

/// CRM hand-off configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CrmConfig {
    /// Base URL of the CRM service; `/interaction` is appended.
    #[serde(default = "default_crm_base_url")]
    pub base_url: String,

    /// Bearer token presented to the CRM.
    #[serde(default)]
    pub server_token: Option<String>,

    #[serde(default = "default_request_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for CrmConfig {
    fn default() -> Self {
        Self {
            base_url: default_crm_base_url(),
            server_token: None,
            timeout_secs: default_request_timeout_secs(),
        }
    }
}

fn default_crm_base_url() -> String {
    "http://127.0.0.1:8000".to_string()
}

/// Real-time socket layer configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RealtimeConfig {
    /// Socket URL the outbound notifier dials (`/ws` is appended).
    #[serde(default = "default_public_url")]
    pub public_url: String,

    /// Deadline for writing a single frame.
    #[serde(default = "default_write_wait_secs")]
    pub write_wait_secs: u64,

    /// Read deadline, refreshed by every pong.
    #[serde(default = "default_pong_wait_secs")]
    pub pong_wait_secs: u64,

    /// Largest inbound frame accepted, in bytes.
    #[serde(default = "default_max_message_size")]
    pub max_message_size: usize,

    /// Pending outbound frames per connection.
    #[serde(default = "default_send_buffer")]
    pub send_buffer: usize,

    /// Messages the notifier queues before dropping.
    #[serde(default = "default_notifier_queue")]
    pub notifier_queue: usize,

    /// Delay between notifier dial attempts.
    #[serde(default = "default_notifier_retry_interval_ms")]
    pub notifier_retry_interval_ms: u64,

    /// Give up dialing after this long.
    #[serde(default = "default_notifier_connect_deadline_secs")]
    pub notifier_connect_deadline_secs: u64,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            public_url: default_public_url(),
            write_wait_secs: default_write_wait_secs(),
            pong_wait_secs: default_pong_wait_secs(),
            max_message_size: default_max_message_size(),
            send_buffer: default_send_buffer(),
            notifier_queue: default_notifier_queue(),
            notifier_retry_interval_ms: default_notifier_retry_interval_ms(),
            notifier_connect_deadline_secs: default_notifier_connect_deadline_secs(),
        }
    }
}

fn default_public_url() -> String {
    "ws://127.0.0.1:8080".to_string()
}

fn default_write_wait_secs() -> u64 {
    10
}

fn default_pong_wait_secs() -> u64 {
    60
}

fn default_max_message_size() -> usize {
    10_000
}

fn default_send_buffer() -> usize {
    256
}

fn default_notifier_queue() -> usize {
    1024
}

fn default_notifier_retry_interval_ms() -> u64 {
    1000
}

fn default_notifier_connect_deadline_secs() -> u64 {
    30
}
