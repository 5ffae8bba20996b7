// SPDX-FileCopyrightText: 2026 Omnidesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP CRM sink used by the close saga.

use async_trait::async_trait;
use omnidesk_config::model::CrmConfig;
use omnidesk_core::types::ClosedInteractionReport;
use omnidesk_core::{AdapterType, CrmSink, HealthStatus, OmniError, PluginAdapter};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::http::{build_client, error_detail};

/// CRM response envelope; only the error flag and message matter here.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CrmEnvelope {
    #[serde(default)]
    is_error: bool,
    #[serde(default)]
    error_status: String,
    #[serde(default)]
    error_message: String,
}

/// Posts closed interactions to `{base_url}/interaction`.
pub struct HttpCrm {
    client: reqwest::Client,
    endpoint: String,
    server_token: Option<String>,
}

impl std::fmt::Debug for HttpCrm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpCrm")
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

impl HttpCrm {
    pub fn new(config: &CrmConfig) -> Result<Self, OmniError> {
        Ok(Self {
            client: build_client(config.timeout_secs)?,
            endpoint: format!("{}/interaction", config.base_url.trim_end_matches('/')),
            server_token: config.server_token.clone(),
        })
    }
}

#[async_trait]
impl PluginAdapter for HttpCrm {
    fn name(&self) -> &str {
        "crm-http"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Crm
    }

    async fn health_check(&self) -> Result<HealthStatus, OmniError> {
        Ok(match &self.server_token {
            Some(_) => HealthStatus::Healthy,
            None => HealthStatus::Degraded("crm.server_token is not set".into()),
        })
    }

    async fn shutdown(&self) -> Result<(), OmniError> {
        Ok(())
    }
}

#[async_trait]
impl CrmSink for HttpCrm {
    async fn submit_closed_interaction(
        &self,
        report: &ClosedInteractionReport,
    ) -> Result<(), OmniError> {
        let mut request = self.client.post(&self.endpoint).json(report);
        if let Some(token) = &self.server_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|e| OmniError::Crm {
            message: format!("request failed: {e}"),
        })?;
        let status = response.status();
        let body = response.text().await.map_err(|e| OmniError::Crm {
            message: format!("failed to read response: {e}"),
        })?;

        if !status.is_success() {
            warn!(interaction_id = report.id, status = %status, "crm rejected closed interaction");
            return Err(OmniError::Crm {
                message: format!("{status}: {}", error_detail(&body)),
            });
        }

        // An empty or non-envelope 2xx body counts as accepted.
        if let Ok(envelope) = serde_json::from_str::<CrmEnvelope>(&body)
            && envelope.is_error
        {
            warn!(
                interaction_id = report.id,
                error_status = %envelope.error_status,
                "crm reported an error for closed interaction"
            );
            return Err(OmniError::Crm {
                message: format!("{}: {}", envelope.error_status, envelope.error_message),
            });
        }

        debug!(interaction_id = report.id, "crm accepted closed interaction");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use omnidesk_core::types::{Interaction, InteractionStatus, InteractionType, Platform};
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn report() -> ClosedInteractionReport {
        let interaction = Interaction {
            id: 11,
            platform_id: "page-1".into(),
            reporter_id: None,
            conversation_id: None,
            mention_media_id: Some("post-1".into()),
            mention_media_url: None,
            agent_id: Some("agent-7".into()),
            status: InteractionStatus::Closed,
            platform: Platform::Facebook,
            interaction_type: InteractionType::Mention,
            latitude: None,
            longitude: None,
            duration_secs: Some(95),
            created_at: "2024-01-01T00:00:00.000Z".into(),
            updated_at: "2024-01-01T00:01:35.000Z".into(),
        };
        ClosedInteractionReport::new(&interaction, None)
    }

    fn crm(server: &MockServer) -> HttpCrm {
        HttpCrm::new(&CrmConfig {
            base_url: format!("{}/", server.uri()),
            server_token: Some("crm-token".into()),
            timeout_secs: 5,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn accepted_report_is_ok() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/interaction"))
            .and(header("authorization", "Bearer crm-token"))
            .and(body_partial_json(json!({
                "id": 11,
                "agentId": "agent-7",
                "status": "CLOSED",
                "interactionType": "MENTION",
                "durationSecs": 95
            })))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"data": null, "isError": false, "errorStatus": ""})),
            )
            .expect(1)
            .mount(&server)
            .await;

        crm(&server).submit_closed_interaction(&report()).await.unwrap();
    }

    #[tokio::test]
    async fn error_flag_in_2xx_body_is_a_crm_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "isError": true,
                "errorStatus": "FAILED_BIND_JSON",
                "errorMessage": "bad body"
            })))
            .mount(&server)
            .await;

        let err = crm(&server)
            .submit_closed_interaction(&report())
            .await
            .unwrap_err();
        assert!(matches!(err, OmniError::Crm { .. }));
        assert!(err.to_string().contains("FAILED_BIND_JSON"));
    }

    #[tokio::test]
    async fn server_error_is_a_crm_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
            .mount(&server)
            .await;

        let err = crm(&server)
            .submit_closed_interaction(&report())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("maintenance"));
    }

    #[tokio::test]
    async fn missing_token_degrades_health() {
        let crm = HttpCrm::new(&CrmConfig::default()).unwrap();
        assert!(matches!(
            crm.health_check().await.unwrap(),
            HealthStatus::Degraded(_)
        ));
    }
}
