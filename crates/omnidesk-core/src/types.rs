// SPDX-FileCopyrightText: 2026 Omnidesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain types shared by the ledger, the engine and the real-time layer.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Health status reported by adapter health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Adapter is fully operational.
    Healthy,
    /// Adapter is operational but experiencing issues.
    Degraded(String),
    /// Adapter is not operational.
    Unhealthy(String),
}

/// Identifies the kind of collaborator behind an adapter.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum AdapterType {
    Ledger,
    Channel,
    Crm,
    Observability,
}

/// Timestamp format used for every persisted and wire timestamp.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

/// Current UTC time in [`TIMESTAMP_FORMAT`].
pub fn now_timestamp() -> String {
    chrono::Utc::now().format(TIMESTAMP_FORMAT).to_string()
}

/// Format a unix timestamp in seconds, falling back to now when out of range.
pub fn timestamp_from_unix_secs(secs: i64) -> String {
    chrono::DateTime::from_timestamp(secs, 0)
        .map(|t| t.format(TIMESTAMP_FORMAT).to_string())
        .unwrap_or_else(now_timestamp)
}

/// Format a unix timestamp in milliseconds, falling back to now when out of range.
pub fn timestamp_from_unix_millis(millis: i64) -> String {
    chrono::DateTime::from_timestamp_millis(millis)
        .map(|t| t.format(TIMESTAMP_FORMAT).to_string())
        .unwrap_or_else(now_timestamp)
}

// --- Enumerations ---

/// Lifecycle status of an interaction.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum InteractionStatus {
    Unclaimed,
    Waiting,
    InProgress,
    Active,
    Inactive,
    Closed,
    Missed,
    Unprocessed,
    Processed,
}

impl InteractionStatus {
    /// Every status except CLOSED counts as ongoing.
    pub fn is_ongoing(self) -> bool {
        self != Self::Closed
    }
}

/// External channel an interaction lives on.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum Platform {
    Facebook,
    Instagram,
    Whatsapp,
    Email,
    LiveChat,
}

/// Direct message versus public mention.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum InteractionType {
    #[serde(rename = "PESAN")]
    #[strum(serialize = "PESAN")]
    Message,
    #[serde(rename = "MENTION")]
    #[strum(serialize = "MENTION")]
    Mention,
}

/// Which side of the conversation produced a message.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum SentBy {
    Agent,
    Reporter,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum AttachmentType {
    Image,
    Video,
    Location,
}

/// Status code carried in the `errorStatus` field of every HTTP response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorStatus {
    SystemBusy,
    DataNotFound,
    FailedBindJson,
    InvalidQuery,
    Unauthorized,
    UserDoNotHaveChannelAccount,
    PlatformIdNotSet,
    PlatformAccessTokenNotSet,
    ChannelAccountNotMatch,
    CrmResponseError,
}

impl ErrorStatus {
    /// Operator-facing message paired with the status.
    pub fn message(self) -> &'static str {
        match self {
            Self::SystemBusy => "System Busy",
            Self::DataNotFound => "The requested data does not exist",
            Self::FailedBindJson => "Invalid JSON Body",
            Self::InvalidQuery => "Invalid query params, Please re-enter with the right values",
            Self::Unauthorized => "The access token is missing or invalid",
            Self::UserDoNotHaveChannelAccount => "User does not have a channel account",
            Self::PlatformIdNotSet => "Platform id is not set on the channel account",
            Self::PlatformAccessTokenNotSet => {
                "Platform access token is not set on the channel account"
            }
            Self::ChannelAccountNotMatch => "Channel account does not match the platform id",
            Self::CrmResponseError => "CRM rejected the interaction data",
        }
    }
}

// --- Reporters ---

/// The external party of a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reporter {
    pub id: i64,
    /// Platform-assigned id (PSID, IGSID, WhatsApp number). `None` for email and live chat.
    pub meta_reporter_id: Option<String>,
    pub name: String,
    pub email: Option<String>,
    pub phone_number: Option<String>,
    pub gender: Option<String>,
    pub address: Option<String>,
    pub platform_username: Option<String>,
    pub is_deleted: bool,
    pub created_at: String,
    pub updated_at: String,
}

/// Fields for a reporter that does not exist yet.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewReporter {
    pub meta_reporter_id: Option<String>,
    pub name: String,
    pub email: Option<String>,
    pub phone_number: Option<String>,
    /// Sender on the email channel; the address is then unique among live reporters.
    pub email_sender: bool,
}

// --- Interactions ---

/// One reporter-to-organization conversation on one channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interaction {
    pub id: i64,
    /// Organizational account the interaction arrived on (page id, IG id, WA id, mailbox).
    pub platform_id: String,
    pub reporter_id: Option<i64>,
    pub conversation_id: Option<String>,
    pub mention_media_id: Option<String>,
    pub mention_media_url: Option<String>,
    pub agent_id: Option<String>,
    pub status: InteractionStatus,
    pub platform: Platform,
    pub interaction_type: InteractionType,
    pub latitude: Option<String>,
    pub longitude: Option<String>,
    pub duration_secs: Option<i64>,
    pub created_at: String,
    pub updated_at: String,
}

/// Fields for an interaction about to be opened. Status is always UNCLAIMED.
#[derive(Debug, Clone, PartialEq)]
pub struct NewInteraction {
    pub platform_id: String,
    pub reporter_id: Option<i64>,
    pub conversation_id: Option<String>,
    pub mention_media_id: Option<String>,
    pub mention_media_url: Option<String>,
    pub platform: Platform,
    pub interaction_type: InteractionType,
}

impl NewInteraction {
    /// A direct-message interaction keyed by reporter.
    pub fn direct(platform: Platform, platform_id: impl Into<String>, reporter_id: i64) -> Self {
        Self {
            platform_id: platform_id.into(),
            reporter_id: Some(reporter_id),
            conversation_id: None,
            mention_media_id: None,
            mention_media_url: None,
            platform,
            interaction_type: InteractionType::Message,
        }
    }

    /// A public-mention interaction keyed by the mentioned media.
    pub fn mention(
        platform: Platform,
        platform_id: impl Into<String>,
        media_id: impl Into<String>,
        media_url: Option<String>,
    ) -> Self {
        Self {
            platform_id: platform_id.into(),
            reporter_id: None,
            conversation_id: None,
            mention_media_id: Some(media_id.into()),
            mention_media_url: media_url,
            platform,
            interaction_type: InteractionType::Mention,
        }
    }
}

/// Partial update applied to an interaction. `None` leaves the column untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InteractionUpdate {
    pub agent_id: Option<String>,
    pub status: Option<InteractionStatus>,
    pub duration_secs: Option<i64>,
}

/// Visibility scope derived from a channel account.
///
/// EMAIL interactions are always visible; other channels only when their
/// platform id belongs to the account.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AccountScope {
    pub platform_ids: Vec<String>,
    pub include_live_chat: bool,
}

/// Filters for interaction listings. Empty vectors mean "no filter".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InteractionQuery {
    pub interaction_ids: Vec<i64>,
    pub reporter_ids: Vec<i64>,
    pub agent_ids: Vec<String>,
    pub statuses: Vec<InteractionStatus>,
    pub platforms: Vec<Platform>,
    pub interaction_types: Vec<InteractionType>,
    pub scope: Option<AccountScope>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

impl InteractionQuery {
    /// Whether an interaction passes every filter (pagination excluded).
    pub fn matches(&self, interaction: &Interaction) -> bool {
        fn allowed<T: PartialEq>(filter: &[T], value: &T) -> bool {
            filter.is_empty() || filter.contains(value)
        }

        let in_scope = match &self.scope {
            None => true,
            Some(scope) => {
                interaction.platform == Platform::Email
                    || (scope.include_live_chat && interaction.platform == Platform::LiveChat)
                    || scope.platform_ids.contains(&interaction.platform_id)
            }
        };
        let agent_ok = self.agent_ids.is_empty()
            || interaction
                .agent_id
                .as_ref()
                .is_some_and(|a| self.agent_ids.contains(a));
        let reporter_ok = self.reporter_ids.is_empty()
            || interaction
                .reporter_id
                .is_some_and(|r| self.reporter_ids.contains(&r));

        in_scope
            && agent_ok
            && reporter_ok
            && allowed(&self.interaction_ids, &interaction.id)
            && allowed(&self.statuses, &interaction.status)
            && allowed(&self.platforms, &interaction.platform)
            && allowed(&self.interaction_types, &interaction.interaction_type)
    }

    /// Row offset and limit when both `page` (1-based) and `page_size` are set.
    ///
    /// An offset past `i64::MAX` saturates, which selects an empty page.
    pub fn window(&self) -> Option<(i64, i64)> {
        match (self.page, self.page_size) {
            (Some(page), Some(size)) if page > 0 && size > 0 => {
                let offset = Self::offset(page, size).unwrap_or(i64::MAX);
                Some((offset, i64::from(size)))
            }
            _ => None,
        }
    }

    /// False when `page` and `page_size` multiply past what SQLite can offset.
    pub fn window_in_range(&self) -> bool {
        match (self.page, self.page_size) {
            (Some(page), Some(size)) if page > 0 => Self::offset(page, size).is_some(),
            _ => true,
        }
    }

    fn offset(page: u32, size: u32) -> Option<i64> {
        i64::from(page - 1).checked_mul(i64::from(size))
    }
}

// --- Messages ---

/// One inbound or outbound message of an interaction.
///
/// Serializes to the real-time wire shape: the external id travels as `mid`
/// and the body as `message`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: i64,
    pub interaction_id: i64,
    pub sender_id: String,
    pub recipient_id: String,
    #[serde(rename = "mid")]
    pub meta_message_id: Option<String>,
    #[serde(rename = "message")]
    pub body: String,
    pub message_timestamp: String,
    pub attachment_type: Option<AttachmentType>,
    pub attachment_url: Option<String>,
    pub sent_by: SentBy,
    pub is_read: bool,
    pub is_deleted: bool,
    pub created_at: String,
    pub updated_at: String,
}

/// Fields for a message about to be persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct NewMessage {
    pub interaction_id: i64,
    pub sender_id: String,
    pub recipient_id: String,
    pub meta_message_id: Option<String>,
    pub body: String,
    pub message_timestamp: String,
    pub attachment_type: Option<AttachmentType>,
    pub attachment_url: Option<String>,
    pub sent_by: SentBy,
}

// --- Email threads ---

/// Provider thread binding used to rebuild reply headers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Thread {
    /// Provider-assigned thread id; doubles as the interaction conversation id.
    pub id: String,
    pub subject: String,
    pub email_date: String,
    pub from: String,
}

// --- Channel accounts ---

/// Credentials mapping an organizational channel to its provider accounts.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelAccount {
    pub id: i64,
    pub name: String,
    pub facebook_page_id: Option<String>,
    pub instagram_id: Option<String>,
    pub whatsapp_number_id: Option<String>,
    pub whatsapp_business_id: Option<String>,
    #[serde(skip_serializing)]
    pub facebook_access_token: Option<String>,
    #[serde(skip_serializing)]
    pub instagram_access_token: Option<String>,
    #[serde(skip_serializing)]
    pub whatsapp_access_token: Option<String>,
    pub is_live_chat_active: bool,
}

impl ChannelAccount {
    /// Interactions visible to agents holding this account.
    pub fn scope(&self) -> AccountScope {
        let platform_ids = [
            &self.facebook_page_id,
            &self.instagram_id,
            &self.whatsapp_business_id,
        ]
        .into_iter()
        .flatten()
        .filter(|id| !id.is_empty())
        .cloned()
        .collect();

        AccountScope {
            platform_ids,
            include_live_chat: self.is_live_chat_active,
        }
    }
}

impl std::fmt::Debug for ChannelAccount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let redact = |t: &Option<String>| t.as_ref().map(|_| "[redacted]");
        f.debug_struct("ChannelAccount")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("facebook_page_id", &self.facebook_page_id)
            .field("instagram_id", &self.instagram_id)
            .field("whatsapp_number_id", &self.whatsapp_number_id)
            .field("whatsapp_business_id", &self.whatsapp_business_id)
            .field("facebook_access_token", &redact(&self.facebook_access_token))
            .field("instagram_access_token", &redact(&self.instagram_access_token))
            .field("whatsapp_access_token", &redact(&self.whatsapp_access_token))
            .field("is_live_chat_active", &self.is_live_chat_active)
            .finish()
    }
}

// --- CRM hand-off ---

/// Payload handed to the CRM when an interaction is closed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClosedInteractionReport {
    pub id: i64,
    pub created_at: String,
    pub updated_at: String,
    pub name: String,
    pub gender: String,
    pub phone_number: String,
    pub email: String,
    pub address: String,
    pub platform_id: String,
    pub conversation_id: String,
    pub reporter_id: Option<i64>,
    pub mention_media_id: String,
    pub mention_media_url: String,
    pub agent_id: String,
    pub status: InteractionStatus,
    pub platform: Platform,
    pub interaction_type: InteractionType,
    pub latitude: String,
    pub longitude: String,
    pub duration_secs: Option<i64>,
}

impl ClosedInteractionReport {
    /// Build the report; reporter details are blank for mentions.
    pub fn new(interaction: &Interaction, reporter: Option<&Reporter>) -> Self {
        let text = |v: &Option<String>| v.clone().unwrap_or_default();
        Self {
            id: interaction.id,
            created_at: interaction.created_at.clone(),
            updated_at: interaction.updated_at.clone(),
            name: reporter.map(|r| r.name.clone()).unwrap_or_default(),
            gender: reporter.map(|r| text(&r.gender)).unwrap_or_default(),
            phone_number: reporter.map(|r| text(&r.phone_number)).unwrap_or_default(),
            email: reporter.map(|r| text(&r.email)).unwrap_or_default(),
            address: reporter.map(|r| text(&r.address)).unwrap_or_default(),
            platform_id: interaction.platform_id.clone(),
            conversation_id: text(&interaction.conversation_id),
            reporter_id: interaction.reporter_id,
            mention_media_id: text(&interaction.mention_media_id),
            mention_media_url: text(&interaction.mention_media_url),
            agent_id: text(&interaction.agent_id),
            status: interaction.status,
            platform: interaction.platform,
            interaction_type: interaction.interaction_type,
            latitude: text(&interaction.latitude),
            longitude: text(&interaction.longitude),
            duration_secs: interaction.duration_secs,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn interaction(platform: Platform, platform_id: &str) -> Interaction {
        Interaction {
            id: 1,
            platform_id: platform_id.into(),
            reporter_id: Some(3),
            conversation_id: None,
            mention_media_id: None,
            mention_media_url: None,
            agent_id: Some("agent-1".into()),
            status: InteractionStatus::InProgress,
            platform,
            interaction_type: InteractionType::Message,
            latitude: None,
            longitude: None,
            duration_secs: None,
            created_at: now_timestamp(),
            updated_at: now_timestamp(),
        }
    }

    #[test]
    fn enums_use_screaming_wire_names() {
        assert_eq!(InteractionStatus::InProgress.to_string(), "IN_PROGRESS");
        assert_eq!(Platform::LiveChat.to_string(), "LIVE_CHAT");
        assert_eq!(Platform::Whatsapp.to_string(), "WHATSAPP");
        assert_eq!(InteractionType::Message.to_string(), "PESAN");
        assert_eq!(
            serde_json::to_string(&InteractionType::Mention).unwrap(),
            "\"MENTION\""
        );
        assert_eq!(
            InteractionStatus::from_str("UNCLAIMED").unwrap(),
            InteractionStatus::Unclaimed
        );
        assert!(!InteractionStatus::Closed.is_ongoing());
        assert!(InteractionStatus::Waiting.is_ongoing());
    }

    #[test]
    fn message_serializes_mid_and_message_fields() {
        let msg = Message {
            id: 9,
            interaction_id: 1,
            sender_id: "628123".into(),
            recipient_id: "page".into(),
            meta_message_id: Some("wamid.100".into()),
            body: "halo".into(),
            message_timestamp: now_timestamp(),
            attachment_type: None,
            attachment_url: None,
            sent_by: SentBy::Reporter,
            is_read: false,
            is_deleted: false,
            created_at: now_timestamp(),
            updated_at: now_timestamp(),
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["mid"], "wamid.100");
        assert_eq!(json["message"], "halo");
        assert_eq!(json["sent_by"], "REPORTER");
    }

    #[test]
    fn scoped_query_always_includes_email() {
        let query = InteractionQuery {
            scope: Some(AccountScope {
                platform_ids: vec!["page-1".into()],
                include_live_chat: false,
            }),
            ..Default::default()
        };
        assert!(query.matches(&interaction(Platform::Email, "inbox@x.com")));
        assert!(query.matches(&interaction(Platform::Facebook, "page-1")));
        assert!(!query.matches(&interaction(Platform::Facebook, "page-2")));
        assert!(!query.matches(&interaction(Platform::LiveChat, "")));
    }

    #[test]
    fn query_filters_by_agent_and_status() {
        let query = InteractionQuery {
            agent_ids: vec!["agent-1".into()],
            statuses: vec![InteractionStatus::InProgress],
            ..Default::default()
        };
        assert!(query.matches(&interaction(Platform::Whatsapp, "wa")));

        let other = InteractionQuery {
            agent_ids: vec!["agent-2".into()],
            ..Default::default()
        };
        assert!(!other.matches(&interaction(Platform::Whatsapp, "wa")));
    }

    #[test]
    fn window_requires_page_and_size() {
        let mut query = InteractionQuery::default();
        assert_eq!(query.window(), None);
        query.page = Some(3);
        query.page_size = Some(20);
        assert_eq!(query.window(), Some((40, 20)));
    }

    #[test]
    fn huge_window_saturates_instead_of_wrapping() {
        let query = InteractionQuery {
            page: Some(100_000),
            page_size: Some(100_000),
            ..Default::default()
        };
        assert_eq!(query.window(), Some((9_999_900_000, 100_000)));
        assert!(query.window_in_range());

        let beyond = InteractionQuery {
            page: Some(u32::MAX),
            page_size: Some(u32::MAX),
            ..Default::default()
        };
        assert_eq!(beyond.window(), Some((i64::MAX, i64::from(u32::MAX))));
        assert!(!beyond.window_in_range());
    }

    proptest::proptest! {
        #[test]
        fn window_pages_never_overlap(page in 1u32..1000, size in 1u32..500) {
            let query = InteractionQuery { page: Some(page), page_size: Some(size), ..Default::default() };
            let next = InteractionQuery { page: Some(page + 1), page_size: Some(size), ..Default::default() };
            let (offset, limit) = query.window().unwrap();
            let (next_offset, _) = next.window().unwrap();
            proptest::prop_assert_eq!(offset + limit, next_offset);
        }
    }

    #[test]
    fn channel_account_debug_redacts_tokens() {
        let account = ChannelAccount {
            id: 1,
            name: "Support".into(),
            facebook_page_id: Some("page".into()),
            instagram_id: None,
            whatsapp_number_id: None,
            whatsapp_business_id: Some("waba".into()),
            facebook_access_token: Some("EAAB-secret".into()),
            instagram_access_token: None,
            whatsapp_access_token: None,
            is_live_chat_active: true,
        };
        let debug = format!("{account:?}");
        assert!(!debug.contains("EAAB-secret"));
        assert!(debug.contains("[redacted]"));

        let scope = account.scope();
        assert_eq!(scope.platform_ids, vec!["page".to_string(), "waba".to_string()]);
        assert!(scope.include_live_chat);
    }

    #[test]
    fn unix_timestamps_are_formatted() {
        assert_eq!(timestamp_from_unix_secs(0), "1970-01-01T00:00:00.000Z");
        assert_eq!(
            timestamp_from_unix_millis(1_700_000_000_123),
            "2023-11-14T22:13:20.123Z"
        );
    }
}
