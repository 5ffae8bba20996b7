// SPDX-FileCopyrightText: 2026 Omnidesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Meta Graph API client: WhatsApp media, Instagram mentions, Messenger and
//! WhatsApp Cloud sends.

use omnidesk_config::model::MetaConfig;
use omnidesk_core::OmniError;
use omnidesk_core::traits::gateway::{
    InstagramMention, MentionTarget, MessengerSend, SentMessage, WhatsappSend,
};
use reqwest::Url;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::http::{build_client, decode, transport_err};

/// HTTP client for graph.facebook.com.
#[derive(Clone)]
pub struct GraphClient {
    client: reqwest::Client,
    base_url: String,
    api_version: String,
    wa_api_version: String,
    wa_access_token: Option<String>,
    ig_access_token: Option<String>,
}

impl std::fmt::Debug for GraphClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphClient")
            .field("base_url", &self.base_url)
            .field("api_version", &self.api_version)
            .field("wa_api_version", &self.wa_api_version)
            .finish_non_exhaustive()
    }
}

#[derive(Deserialize)]
struct MediaLookup {
    url: String,
}

#[derive(Deserialize)]
struct MentionLookup {
    mentioned_comment: Option<MentionedComment>,
    mentioned_media: Option<MentionedMedia>,
}

#[derive(Deserialize)]
struct MentionedComment {
    #[serde(default)]
    text: String,
    media: Option<MediaRef>,
}

#[derive(Deserialize)]
struct MediaRef {
    permalink: Option<String>,
}

#[derive(Deserialize)]
struct MentionedMedia {
    #[serde(default)]
    caption: String,
    permalink: Option<String>,
}

#[derive(Deserialize)]
struct MessengerReceipt {
    recipient_id: String,
    message_id: String,
}

#[derive(Deserialize)]
struct WhatsappReceipt {
    #[serde(default)]
    contacts: Vec<WhatsappContact>,
    #[serde(default)]
    messages: Vec<WhatsappMessageRef>,
}

#[derive(Deserialize)]
struct WhatsappContact {
    wa_id: String,
}

#[derive(Deserialize)]
struct WhatsappMessageRef {
    id: String,
}

impl GraphClient {
    pub fn new(config: &MetaConfig) -> Result<Self, OmniError> {
        Ok(Self {
            client: build_client(config.request_timeout_secs)?,
            base_url: config.graph_base_url.trim_end_matches('/').to_string(),
            api_version: config.api_version.clone(),
            wa_api_version: config.wa_api_version.clone(),
            wa_access_token: config.wa_access_token.clone(),
            ig_access_token: config.ig_access_token.clone(),
        })
    }

    fn endpoint(&self, version: &str, path: &str) -> String {
        format!("{}/{version}/{path}", self.base_url)
    }

    fn endpoint_with_query(
        &self,
        version: &str,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<Url, OmniError> {
        Url::parse_with_params(&self.endpoint(version, path), query)
            .map_err(|e| OmniError::channel(format!("invalid graph URL for {path}: {e}")))
    }

    fn require<'a>(token: &'a Option<String>, name: &str) -> Result<&'a str, OmniError> {
        token
            .as_deref()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| OmniError::channel(format!("{name} is not configured")))
    }

    /// Resolve a WhatsApp media id to its download URL.
    pub async fn resolve_whatsapp_media(&self, media_id: &str) -> Result<String, OmniError> {
        let token = Self::require(&self.wa_access_token, "meta.wa_access_token")?;
        let response = self
            .client
            .get(self.endpoint(&self.wa_api_version, media_id))
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| transport_err("whatsapp media", e))?;
        let media: MediaLookup = decode("whatsapp media", response).await?;
        debug!(media_id, "whatsapp media resolved");
        Ok(media.url)
    }

    /// Look up the text and permalink behind an Instagram mention.
    pub async fn fetch_instagram_mention(
        &self,
        account_id: &str,
        target: &MentionTarget,
    ) -> Result<InstagramMention, OmniError> {
        let token = Self::require(&self.ig_access_token, "meta.ig_access_token")?;
        let fields = match target {
            MentionTarget::Comment(id) => {
                format!("mentioned_comment.comment_id({id}){{text,media{{id,permalink}}}}")
            }
            MentionTarget::Media(id) => {
                format!("mentioned_media.media_id({id}){{caption,permalink}}")
            }
        };
        let url = self.endpoint_with_query(
            &self.api_version,
            account_id,
            &[("fields", &fields), ("access_token", token)],
        )?;
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| transport_err("instagram mention", e))?;
        let lookup: MentionLookup = decode("instagram mention", response).await?;

        match (target, lookup) {
            (
                MentionTarget::Comment(_),
                MentionLookup {
                    mentioned_comment: Some(comment),
                    ..
                },
            ) => Ok(InstagramMention {
                text: comment.text,
                permalink: comment.media.and_then(|m| m.permalink),
            }),
            (
                MentionTarget::Media(_),
                MentionLookup {
                    mentioned_media: Some(media),
                    ..
                },
            ) => Ok(InstagramMention {
                text: media.caption,
                permalink: media.permalink,
            }),
            _ => Err(OmniError::channel(format!(
                "instagram mention lookup for {account_id} returned no mention"
            ))),
        }
    }

    /// Send a human-agent tagged Messenger or Instagram Direct message.
    pub async fn send_messenger(&self, send: &MessengerSend) -> Result<SentMessage, OmniError> {
        let url = self.endpoint_with_query(
            &self.api_version,
            &format!("{}/messages", send.page_id),
            &[("access_token", &send.access_token)],
        )?;
        let body = json!({
            "recipient": { "id": send.recipient_id },
            "messaging_type": "MESSAGE_TAG",
            "tag": "HUMAN_AGENT",
            "message": { "text": send.text },
        });
        let response = self
            .client
            .post(url)
            .json(&body)
            .send()
            .await
            .map_err(|e| transport_err("messenger send", e))?;
        let receipt: MessengerReceipt = decode("messenger send", response).await?;
        Ok(SentMessage {
            recipient_id: receipt.recipient_id,
            message_id: receipt.message_id,
        })
    }

    /// Send a plain-text WhatsApp Cloud message.
    pub async fn send_whatsapp(&self, send: &WhatsappSend) -> Result<SentMessage, OmniError> {
        let body = json!({
            "messaging_product": "whatsapp",
            "recipient_type": "individual",
            "to": send.recipient,
            "type": "text",
            "text": { "preview_url": false, "body": send.text },
        });
        let response = self
            .client
            .post(self.endpoint(
                &self.wa_api_version,
                &format!("{}/messages", send.number_id),
            ))
            .bearer_auth(&send.access_token)
            .json(&body)
            .send()
            .await
            .map_err(|e| transport_err("whatsapp send", e))?;
        let receipt: WhatsappReceipt = decode("whatsapp send", response).await?;

        let message_id = receipt
            .messages
            .into_iter()
            .next()
            .map(|m| m.id)
            .ok_or_else(|| OmniError::channel("whatsapp send returned no message id"))?;
        let recipient_id = receipt
            .contacts
            .into_iter()
            .next()
            .map(|c| c.wa_id)
            .unwrap_or_else(|| send.recipient.clone());
        Ok(SentMessage {
            recipient_id,
            message_id,
        })
    }
}
