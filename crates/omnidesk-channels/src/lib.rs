// SPDX-FileCopyrightText: 2026 Omnidesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Provider clients for the Omnidesk service.
//!
//! [`HttpChannelGateway`] combines the Meta Graph client and the optional
//! Gmail client behind the [`ChannelGateway`] trait; [`HttpCrm`] delivers
//! closed interactions to the CRM.

pub mod crm;
pub mod gmail;
pub mod graph;
mod http;

use async_trait::async_trait;
use omnidesk_config::model::{GmailConfig, MetaConfig};
use omnidesk_core::traits::gateway::{
    FetchedEmail, InstagramMention, MailboxHistory, MailboxProfile, MentionTarget, MessengerSend,
    OutboundEmail, SentMessage, WhatsappSend,
};
use omnidesk_core::{AdapterType, ChannelGateway, HealthStatus, OmniError, PluginAdapter};
use tracing::info;

pub use crm::HttpCrm;
pub use gmail::GmailClient;
pub use graph::GraphClient;

/// Channel gateway backed by the real provider APIs.
#[derive(Debug)]
pub struct HttpChannelGateway {
    graph: GraphClient,
    gmail: Option<GmailClient>,
}

impl HttpChannelGateway {
    pub fn new(graph: GraphClient, gmail: Option<GmailClient>) -> Self {
        Self { graph, gmail }
    }

    /// Build from configuration; the Gmail client exists only when enabled.
    pub fn from_config(meta: &MetaConfig, gmail: &GmailConfig) -> Result<Self, OmniError> {
        let graph = GraphClient::new(meta)?;
        let gmail = if gmail.enabled {
            Some(GmailClient::new(gmail, meta.request_timeout_secs)?)
        } else {
            info!("email channel disabled");
            None
        };
        Ok(Self::new(graph, gmail))
    }

    fn gmail(&self) -> Result<&GmailClient, OmniError> {
        self.gmail
            .as_ref()
            .ok_or_else(|| OmniError::channel("email channel is not enabled"))
    }
}

#[async_trait]
impl PluginAdapter for HttpChannelGateway {
    fn name(&self) -> &str {
        "meta-gmail-http"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Channel
    }

    async fn health_check(&self) -> Result<HealthStatus, OmniError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), OmniError> {
        Ok(())
    }
}

#[async_trait]
impl ChannelGateway for HttpChannelGateway {
    async fn resolve_whatsapp_media(&self, media_id: &str) -> Result<String, OmniError> {
        self.graph.resolve_whatsapp_media(media_id).await
    }

    async fn fetch_instagram_mention(
        &self,
        account_id: &str,
        target: &MentionTarget,
    ) -> Result<InstagramMention, OmniError> {
        self.graph.fetch_instagram_mention(account_id, target).await
    }

    async fn send_messenger(&self, send: &MessengerSend) -> Result<SentMessage, OmniError> {
        self.graph.send_messenger(send).await
    }

    async fn send_whatsapp(&self, send: &WhatsappSend) -> Result<SentMessage, OmniError> {
        self.graph.send_whatsapp(send).await
    }

    async fn mailbox_profile(&self) -> Result<MailboxProfile, OmniError> {
        self.gmail()?.profile().await
    }

    async fn watch_mailbox(&self) -> Result<u64, OmniError> {
        self.gmail()?.watch().await
    }

    async fn mailbox_history(&self, start_history_id: u64) -> Result<MailboxHistory, OmniError> {
        self.gmail()?.history(start_history_id).await
    }

    async fn fetch_email(&self, message_id: &str) -> Result<FetchedEmail, OmniError> {
        self.gmail()?.fetch(message_id).await
    }

    async fn send_email(&self, email: &OutboundEmail) -> Result<String, OmniError> {
        self.gmail()?.send(email).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn disabled_email_fails_email_calls_only() {
        let gateway =
            HttpChannelGateway::from_config(&MetaConfig::default(), &GmailConfig::default())
                .unwrap();
        assert_eq!(gateway.adapter_type(), AdapterType::Channel);
        let err = gateway.mailbox_profile().await.unwrap_err();
        assert!(err.to_string().contains("email channel is not enabled"));
        assert!(gateway.watch_mailbox().await.is_err());
    }

    #[test]
    fn enabled_email_without_credentials_is_a_config_error() {
        let gmail = GmailConfig {
            enabled: true,
            ..GmailConfig::default()
        };
        let err = HttpChannelGateway::from_config(&MetaConfig::default(), &gmail).unwrap_err();
        assert!(matches!(err, OmniError::Config(_)));
    }
}
