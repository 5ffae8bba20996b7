// SPDX-FileCopyrightText: 2026 Omnidesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Authentication for the dashboard API.
//!
//! Requests carry `Authorization: Bearer <token>`. When no token is
//! configured every request is rejected (fail-closed). The acting agent and
//! their channel account arrive as `X-Agent-Id` / `X-Channel-Account-Id`,
//! set by the dashboard backend that holds the agent session.

use axum::extract::{FromRequestParts, Request, State};
use axum::http::request::Parts;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use omnidesk_engine::Actor;

use crate::envelope::ApiError;

pub const AGENT_ID_HEADER: &str = "x-agent-id";
pub const CHANNEL_ACCOUNT_HEADER: &str = "x-channel-account-id";

/// Authentication configuration for the gateway.
#[derive(Clone, Default)]
pub struct AuthConfig {
    /// Expected bearer token. `None` rejects every request.
    pub bearer_token: Option<String>,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field(
                "bearer_token",
                &self.bearer_token.as_ref().map(|_| "[redacted]"),
            )
            .finish()
    }
}

/// Middleware that validates the bearer token.
pub async fn auth_middleware(
    State(auth): State<AuthConfig>,
    request: Request,
    next: Next,
) -> Response {
    let Some(expected) = auth.bearer_token.as_deref().filter(|t| !t.is_empty()) else {
        tracing::error!("gateway has no api token configured -- rejecting request");
        return ApiError::unauthorized().into_response();
    };

    let presented = request
        .headers()
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));

    if presented == Some(expected) {
        next.run(request).await
    } else {
        tracing::debug!(path = %request.uri().path(), "bearer token rejected");
        ApiError::unauthorized().into_response()
    }
}

/// The caller's identity, read from request headers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Identity(pub Actor);

impl Identity {
    /// The agent id, required by agent-scoped routes.
    pub fn agent_id(&self) -> Result<&str, ApiError> {
        self.0.agent_id.as_deref().ok_or_else(ApiError::unauthorized)
    }
}

impl<S: Send + Sync> FromRequestParts<S> for Identity {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = |name: &str| {
            parts
                .headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
        };

        let agent_id = header(AGENT_ID_HEADER).map(str::to_string);
        let channel_account_id = match header(CHANNEL_ACCOUNT_HEADER) {
            Some(raw) => Some(raw.parse::<i64>().map_err(|_| ApiError::invalid_query())?),
            None => None,
        };

        Ok(Self(Actor {
            agent_id,
            channel_account_id,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request as HttpRequest;

    async fn identity(headers: &[(&str, &str)]) -> Result<Identity, ApiError> {
        let mut builder = HttpRequest::builder().uri("/");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        let (mut parts, ()) = builder.body(()).unwrap().into_parts();
        Identity::from_request_parts(&mut parts, &()).await
    }

    #[test]
    fn auth_config_debug_redacts_token() {
        let config = AuthConfig {
            bearer_token: Some("secret-token".to_string()),
        };
        let debug = format!("{config:?}");
        assert!(debug.contains("[redacted]"));
        assert!(!debug.contains("secret-token"));
    }

    #[tokio::test]
    async fn identity_reads_agent_and_account() {
        let id = identity(&[("X-Agent-Id", "agent-7"), ("X-Channel-Account-Id", "3")])
            .await
            .unwrap();
        assert_eq!(id.agent_id().unwrap(), "agent-7");
        assert_eq!(id.0.channel_account_id, Some(3));
    }

    #[tokio::test]
    async fn missing_agent_is_unauthorized_only_when_required() {
        let id = identity(&[]).await.unwrap();
        assert_eq!(id, Identity::default());
        assert_eq!(id.agent_id().unwrap_err(), ApiError::unauthorized());
    }

    #[tokio::test]
    async fn malformed_account_id_is_invalid_query() {
        let err = identity(&[("X-Channel-Account-Id", "abc")]).await.unwrap_err();
        assert_eq!(err, ApiError::invalid_query());
    }
}
