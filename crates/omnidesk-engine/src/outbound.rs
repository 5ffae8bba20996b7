// SPDX-FileCopyrightText: 2026 Omnidesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Agent-originated sends and the live chat widget.

use omnidesk_core::traits::gateway::{MessengerSend, WhatsappSend};
use omnidesk_core::types::{
    ChannelAccount, Interaction, InteractionStatus, InteractionType, Message, NewInteraction,
    NewMessage, NewReporter, Reporter, SentBy, now_timestamp,
};
use omnidesk_core::{OmniError, Platform, RuleViolation};
use serde::Deserialize;
use tracing::info;

use crate::Engine;

/// Who is acting on a dashboard request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Actor {
    pub agent_id: Option<String>,
    pub channel_account_id: Option<i64>,
}

/// Body of `POST /interaction/messenger/send` and `/interaction/live-chat/send`.
#[derive(Debug, Clone, Deserialize)]
pub struct SendRequest {
    pub interaction_id: i64,
    pub message: String,
    /// Informational; the stored interaction decides the channel.
    #[serde(default)]
    pub platform: Option<Platform>,
    /// Live chat only; defaults to AGENT.
    #[serde(default)]
    pub sent_by: Option<SentBy>,
}

/// Body of `POST /interaction/live-chat/create`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LiveChatRequest {
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone_number: Option<String>,
}

fn configured(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

/// Page id and token for a Messenger or Instagram send from this account.
fn messenger_credentials<'a>(
    account: &'a ChannelAccount,
    interaction: &Interaction,
) -> Result<(&'a str, &'a str), RuleViolation> {
    let page_id = configured(&account.facebook_page_id).ok_or(RuleViolation::PlatformIdNotSet)?;
    let token = match interaction.platform {
        Platform::Instagram => {
            let instagram_id =
                configured(&account.instagram_id).ok_or(RuleViolation::PlatformIdNotSet)?;
            if interaction.platform_id != instagram_id {
                return Err(RuleViolation::ChannelAccountMismatch);
            }
            &account.instagram_access_token
        }
        _ => {
            if interaction.platform_id != page_id {
                return Err(RuleViolation::ChannelAccountMismatch);
            }
            &account.facebook_access_token
        }
    };
    let token = configured(token).ok_or(RuleViolation::AccessTokenNotSet)?;
    Ok((page_id, token))
}

/// Number id and token for a WhatsApp send from this account.
fn whatsapp_credentials<'a>(
    account: &'a ChannelAccount,
    interaction: &Interaction,
) -> Result<(&'a str, &'a str), RuleViolation> {
    let number_id =
        configured(&account.whatsapp_number_id).ok_or(RuleViolation::PlatformIdNotSet)?;
    let business_id =
        configured(&account.whatsapp_business_id).ok_or(RuleViolation::PlatformIdNotSet)?;
    if interaction.platform_id != business_id {
        return Err(RuleViolation::ChannelAccountMismatch);
    }
    let token =
        configured(&account.whatsapp_access_token).ok_or(RuleViolation::AccessTokenNotSet)?;
    Ok((number_id, token))
}

impl Engine {
    /// Send an agent reply on whatever channel the interaction lives on.
    ///
    /// The stored message is fanned out to the real-time layer.
    pub async fn send_message(
        &self,
        request: &SendRequest,
        actor: &Actor,
    ) -> Result<Message, OmniError> {
        let interaction = self
            .ledger
            .get_interaction(request.interaction_id)
            .await?
            .ok_or_else(|| OmniError::not_found("interaction", request.interaction_id))?;
        if let Some(platform) = request.platform
            && platform != interaction.platform
        {
            return Err(OmniError::InvalidPayload(format!(
                "interaction {} is on {}, not {platform}",
                interaction.id, interaction.platform
            )));
        }

        let message = match interaction.platform {
            Platform::Facebook | Platform::Instagram => {
                self.send_messenger(&interaction, &request.message, actor).await?
            }
            Platform::Whatsapp => {
                self.send_whatsapp(&interaction, &request.message, actor).await?
            }
            Platform::Email => self.send_email(&interaction, &request.message).await?,
            Platform::LiveChat => {
                let sent_by = request.sent_by.unwrap_or(SentBy::Agent);
                self.live_chat_message(&interaction, &request.message, sent_by, actor)
                    .await?
            }
        };

        self.publish(std::slice::from_ref(&message));
        Ok(message)
    }

    /// Persist a live chat message and fan it out. Rejects other channels.
    pub async fn send_live_chat(
        &self,
        request: &SendRequest,
        actor: &Actor,
    ) -> Result<Message, OmniError> {
        let interaction = self
            .ledger
            .get_interaction(request.interaction_id)
            .await?
            .ok_or_else(|| OmniError::not_found("interaction", request.interaction_id))?;
        if interaction.platform != Platform::LiveChat {
            return Err(OmniError::InvalidPayload(format!(
                "interaction {} is not a live chat",
                interaction.id
            )));
        }

        let sent_by = request.sent_by.unwrap_or(SentBy::Agent);
        let message = self
            .live_chat_message(&interaction, &request.message, sent_by, actor)
            .await?;
        self.publish(std::slice::from_ref(&message));
        Ok(message)
    }

    /// Open a live chat for a new visitor.
    pub async fn create_live_chat(
        &self,
        request: &LiveChatRequest,
    ) -> Result<(Reporter, Interaction), OmniError> {
        let reporter = self
            .ledger
            .create_reporter(&NewReporter {
                meta_reporter_id: None,
                name: request.name.clone(),
                email: request.email.clone(),
                phone_number: request.phone_number.clone(),
                email_sender: false,
            })
            .await?;
        let interaction = self
            .ledger
            .create_interaction(&NewInteraction::direct(Platform::LiveChat, "", reporter.id))
            .await?;
        info!(
            interaction_id = interaction.id,
            reporter_id = reporter.id,
            "live chat opened"
        );
        Ok((reporter, interaction))
    }

    pub(crate) async fn channel_account(&self, actor: &Actor) -> Result<ChannelAccount, OmniError> {
        let Some(account_id) = actor.channel_account_id.filter(|id| *id != 0) else {
            return Err(RuleViolation::NoChannelAccount.into());
        };
        match self.ledger.get_channel_account(account_id).await? {
            Some(account) if account.id != 0 => Ok(account),
            _ => Err(RuleViolation::NoChannelAccount.into()),
        }
    }

    /// External id of the interaction's reporter, the provider-side recipient.
    async fn external_recipient(&self, interaction: &Interaction) -> Result<String, OmniError> {
        if interaction.interaction_type == InteractionType::Mention {
            return Err(OmniError::InvalidPayload(format!(
                "interaction {} is a mention and cannot be replied to directly",
                interaction.id
            )));
        }
        let reporter_id = interaction.reporter_id.ok_or_else(|| {
            OmniError::InvalidPayload(format!("interaction {} has no reporter", interaction.id))
        })?;
        self.ledger
            .get_reporter(reporter_id)
            .await?
            .and_then(|r| r.meta_reporter_id)
            .ok_or_else(|| OmniError::not_found("reporter", reporter_id))
    }

    async fn send_messenger(
        &self,
        interaction: &Interaction,
        text: &str,
        actor: &Actor,
    ) -> Result<Message, OmniError> {
        let account = self.channel_account(actor).await?;
        let (page_id, token) = messenger_credentials(&account, interaction)?;
        let recipient = self.external_recipient(interaction).await?;

        let sent = self
            .gateway
            .send_messenger(&MessengerSend {
                page_id: page_id.to_string(),
                access_token: token.to_string(),
                recipient_id: recipient.clone(),
                text: text.to_string(),
            })
            .await?;
        info!(interaction_id = interaction.id, platform = %interaction.platform, "reply sent");

        self.record_reply(interaction, &interaction.platform_id, &recipient, sent.message_id, text)
            .await
    }

    async fn send_whatsapp(
        &self,
        interaction: &Interaction,
        text: &str,
        actor: &Actor,
    ) -> Result<Message, OmniError> {
        let account = self.channel_account(actor).await?;
        let (number_id, token) = whatsapp_credentials(&account, interaction)?;
        let recipient = self.external_recipient(interaction).await?;

        let sent = self
            .gateway
            .send_whatsapp(&WhatsappSend {
                number_id: number_id.to_string(),
                access_token: token.to_string(),
                recipient: recipient.clone(),
                text: text.to_string(),
            })
            .await?;
        info!(interaction_id = interaction.id, "whatsapp reply sent");

        self.record_reply(interaction, &interaction.platform_id, &sent.recipient_id, sent.message_id, text)
            .await
    }

    async fn record_reply(
        &self,
        interaction: &Interaction,
        sender: &str,
        recipient: &str,
        message_id: String,
        text: &str,
    ) -> Result<Message, OmniError> {
        let (message, _) = self
            .record_message(&NewMessage {
                interaction_id: interaction.id,
                sender_id: sender.to_string(),
                recipient_id: recipient.to_string(),
                meta_message_id: Some(message_id).filter(|id| !id.is_empty()),
                body: text.to_string(),
                message_timestamp: now_timestamp(),
                attachment_type: None,
                attachment_url: None,
                sent_by: SentBy::Agent,
            })
            .await?;
        Ok(message)
    }

    async fn live_chat_message(
        &self,
        interaction: &Interaction,
        text: &str,
        sent_by: SentBy,
        actor: &Actor,
    ) -> Result<Message, OmniError> {
        if interaction.status == InteractionStatus::Closed {
            return Err(OmniError::InvalidPayload(format!(
                "interaction {} is closed",
                interaction.id
            )));
        }
        let agent = actor
            .agent_id
            .clone()
            .or_else(|| interaction.agent_id.clone())
            .unwrap_or_default();
        let reporter = interaction
            .reporter_id
            .map(|id| id.to_string())
            .unwrap_or_default();
        let (sender, recipient) = match sent_by {
            SentBy::Agent => (agent, reporter),
            SentBy::Reporter => (reporter, agent),
        };

        let (message, _) = self
            .record_message(&NewMessage {
                interaction_id: interaction.id,
                sender_id: sender,
                recipient_id: recipient,
                meta_message_id: None,
                body: text.to_string(),
                message_timestamp: now_timestamp(),
                attachment_type: None,
                attachment_url: None,
                sent_by,
            })
            .await?;
        Ok(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account() -> ChannelAccount {
        ChannelAccount {
            id: 1,
            name: "support".into(),
            facebook_page_id: Some("page-1".into()),
            instagram_id: Some("ig-1".into()),
            whatsapp_number_id: Some("num-1".into()),
            whatsapp_business_id: Some("waba-1".into()),
            facebook_access_token: Some("fb-token".into()),
            instagram_access_token: Some("ig-token".into()),
            whatsapp_access_token: Some("wa-token".into()),
            is_live_chat_active: true,
        }
    }

    fn interaction(platform: Platform, platform_id: &str) -> Interaction {
        Interaction {
            id: 1,
            platform_id: platform_id.into(),
            reporter_id: Some(1),
            conversation_id: None,
            mention_media_id: None,
            mention_media_url: None,
            agent_id: None,
            status: InteractionStatus::Unclaimed,
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
    fn instagram_sends_through_the_page_with_the_instagram_token() {
        let acct = account();
        let creds = messenger_credentials(&acct, &interaction(Platform::Instagram, "ig-1"));
        assert_eq!(creds, Ok(("page-1", "ig-token")));
    }

    #[test]
    fn messenger_rules_are_checked_in_order() {
        let mut acct = account();
        acct.facebook_access_token = Some(String::new());
        let fb = interaction(Platform::Facebook, "page-2");
        assert_eq!(
            messenger_credentials(&acct, &fb),
            Err(RuleViolation::ChannelAccountMismatch)
        );
        let fb = interaction(Platform::Facebook, "page-1");
        assert_eq!(
            messenger_credentials(&acct, &fb),
            Err(RuleViolation::AccessTokenNotSet)
        );
        acct.facebook_page_id = None;
        assert_eq!(
            messenger_credentials(&acct, &fb),
            Err(RuleViolation::PlatformIdNotSet)
        );
    }

    #[test]
    fn whatsapp_rules_are_checked_in_order() {
        let mut acct = account();
        let wa = interaction(Platform::Whatsapp, "waba-1");
        assert_eq!(whatsapp_credentials(&acct, &wa), Ok(("num-1", "wa-token")));

        acct.whatsapp_access_token = None;
        assert_eq!(
            whatsapp_credentials(&acct, &wa),
            Err(RuleViolation::AccessTokenNotSet)
        );
        let other = interaction(Platform::Whatsapp, "waba-2");
        assert_eq!(
            whatsapp_credentials(&acct, &other),
            Err(RuleViolation::ChannelAccountMismatch)
        );
        acct.whatsapp_business_id = Some(String::new());
        assert_eq!(
            whatsapp_credentials(&acct, &wa),
            Err(RuleViolation::PlatformIdNotSet)
        );
    }
}
