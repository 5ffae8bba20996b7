// SPDX-FileCopyrightText: 2026 Omnidesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Dashboard API handlers and the public health/metrics endpoints.

use std::str::FromStr;

use axum::Json;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use omnidesk_core::types::InteractionQuery;
use omnidesk_core::{HealthStatus, Interaction, InteractionStatus, PluginAdapter, Reporter};
use omnidesk_engine::{LiveChatRequest, SendRequest};
use serde::{Deserialize, Serialize};

use crate::auth::Identity;
use crate::envelope::{ApiError, json_body, query_params, respond};
use crate::server::GatewayState;

/// Body of `PUT /interaction/claim` and `PUT /interaction/close`.
#[derive(Debug, Deserialize)]
pub struct InteractionIdBody {
    pub interaction_id: i64,
}

#[derive(Debug, Deserialize)]
pub struct InteractionIdQuery {
    pub interaction_id: i64,
}

/// Raw `GET /interaction/list` parameters; lists are comma separated.
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub interaction_ids: Option<String>,
    pub reporter_ids: Option<String>,
    pub agent_ids: Option<String>,
    pub status: Option<String>,
    pub platforms: Option<String>,
    pub interaction_types: Option<String>,
    pub page: Option<u32>,
    #[serde(rename = "pageSize")]
    pub page_size: Option<u32>,
}

impl ListQuery {
    /// Parse into a ledger query. Any unparseable item fails the whole query.
    pub fn into_query(self) -> Result<InteractionQuery, ApiError> {
        fn split<T: FromStr>(raw: Option<String>) -> Result<Vec<T>, ApiError> {
            raw.as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| {
                    s.split(',')
                        .map(|item| item.trim().parse::<T>().map_err(|_| ApiError::invalid_query()))
                        .collect()
                })
                .unwrap_or_else(|| Ok(Vec::new()))
        }

        let query = InteractionQuery {
            interaction_ids: split(self.interaction_ids)?,
            reporter_ids: split(self.reporter_ids)?,
            agent_ids: split(self.agent_ids)?,
            statuses: split(self.status)?,
            platforms: split(self.platforms)?,
            interaction_types: split(self.interaction_types)?,
            scope: None,
            page: self.page,
            page_size: self.page_size,
        };
        if !query.window_in_range() {
            return Err(ApiError::invalid_query());
        }
        Ok(query)
    }
}

/// Response of a claim.
#[derive(Debug, Serialize)]
pub struct ClaimResponse {
    pub interaction_id: i64,
    pub agent_id: Option<String>,
    pub interaction_status: InteractionStatus,
}

#[derive(Debug, Serialize)]
pub struct LiveChatCreated {
    pub reporter: Reporter,
    pub interaction: Interaction,
}

/// GET /interaction/list
pub async fn list_interactions(
    State(state): State<GatewayState>,
    identity: Identity,
    query: Result<Query<ListQuery>, QueryRejection>,
) -> Response {
    let result = async {
        let query = query_params(query)?.into_query()?;
        Ok::<_, ApiError>(state.engine.list_interactions(query, &identity.0).await?)
    }
    .await;
    respond(result)
}

/// GET /interaction/messages?interaction_id=
pub async fn interaction_messages(
    State(state): State<GatewayState>,
    query: Result<Query<InteractionIdQuery>, QueryRejection>,
) -> Response {
    let result = async {
        let query = query_params(query)?;
        Ok::<_, ApiError>(state.engine.interaction_messages(query.interaction_id).await?)
    }
    .await;
    respond(result)
}

/// GET /interaction/my
pub async fn my_interactions(State(state): State<GatewayState>, identity: Identity) -> Response {
    let result = async {
        let agent_id = identity.agent_id()?;
        Ok::<_, ApiError>(state.engine.my_interactions(agent_id).await?)
    }
    .await;
    respond(result)
}

/// GET /interaction/closed-data
pub async fn closed_data(State(state): State<GatewayState>) -> Response {
    respond(state.engine.closed_data().await.map_err(ApiError::from))
}

/// PUT /interaction/claim
pub async fn claim(
    State(state): State<GatewayState>,
    identity: Identity,
    body: Result<Json<InteractionIdBody>, JsonRejection>,
) -> Response {
    let result = async {
        let agent_id = identity.agent_id()?;
        let body = json_body(body)?;
        let interaction = state.engine.claim(body.interaction_id, agent_id).await?;
        Ok::<_, ApiError>(ClaimResponse {
            interaction_id: interaction.id,
            agent_id: interaction.agent_id,
            interaction_status: interaction.status,
        })
    }
    .await;
    respond(result)
}

/// PUT /interaction/close
pub async fn close(
    State(state): State<GatewayState>,
    body: Result<Json<InteractionIdBody>, JsonRejection>,
) -> Response {
    let result = async {
        let body = json_body(body)?;
        Ok::<_, ApiError>(state.engine.close(body.interaction_id).await?)
    }
    .await;
    respond(result)
}

/// POST /interaction/messenger/send
pub async fn messenger_send(
    State(state): State<GatewayState>,
    identity: Identity,
    body: Result<Json<SendRequest>, JsonRejection>,
) -> Response {
    let result = async {
        let request = json_body(body)?;
        Ok::<_, ApiError>(state.engine.send_message(&request, &identity.0).await?)
    }
    .await;
    respond(result)
}

/// POST /interaction/live-chat/send
pub async fn live_chat_send(
    State(state): State<GatewayState>,
    identity: Identity,
    body: Result<Json<SendRequest>, JsonRejection>,
) -> Response {
    let result = async {
        let request = json_body(body)?;
        Ok::<_, ApiError>(state.engine.send_live_chat(&request, &identity.0).await?)
    }
    .await;
    respond(result)
}

/// POST /interaction/live-chat/create
pub async fn live_chat_create(
    State(state): State<GatewayState>,
    body: Result<Json<LiveChatRequest>, JsonRejection>,
) -> Response {
    let result = async {
        let request = json_body(body)?;
        if request.name.trim().is_empty() {
            return Err(ApiError::bad_json());
        }
        let (reporter, interaction) = state.engine.create_live_chat(&request).await?;
        Ok::<_, ApiError>(LiveChatCreated {
            reporter,
            interaction,
        })
    }
    .await;
    respond(result)
}

/// Response body for GET /health.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub uptime_secs: u64,
    pub ledger: String,
    pub rooms: usize,
    pub clients: usize,
    pub listeners: usize,
}

/// GET /health
///
/// Unauthenticated. 503 when the ledger is unhealthy or the broker is gone.
pub async fn health(State(state): State<GatewayState>) -> Response {
    let ledger = match state.engine.ledger().health_check().await {
        Ok(HealthStatus::Healthy) => Ok("healthy".to_string()),
        Ok(HealthStatus::Degraded(reason)) => Ok(format!("degraded: {reason}")),
        Ok(HealthStatus::Unhealthy(reason)) => Err(format!("unhealthy: {reason}")),
        Err(e) => Err(format!("unhealthy: {e}")),
    };
    let snapshot = state.broker.snapshot().await;

    let healthy = ledger.is_ok() && snapshot.is_ok();
    let snapshot = snapshot.unwrap_or_default();
    let body = HealthResponse {
        status: if healthy { "ok" } else { "unavailable" },
        version: env!("CARGO_PKG_VERSION"),
        uptime_secs: state.health.start_time.elapsed().as_secs(),
        ledger: ledger.unwrap_or_else(|e| e),
        rooms: snapshot.rooms.len(),
        clients: snapshot.clients.len(),
        listeners: snapshot.listeners,
    };
    let status = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(body)).into_response()
}

/// GET /metrics
///
/// Prometheus text exposition; 404 when no recorder is installed.
pub async fn metrics(State(state): State<GatewayState>) -> Response {
    match &state.health.prometheus_render {
        Some(render) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4")],
            render(),
        )
            .into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}
