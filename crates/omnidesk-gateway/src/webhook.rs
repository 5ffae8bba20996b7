// SPDX-FileCopyrightText: 2026 Omnidesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Inbound webhook routes for Meta (Messenger, Instagram, WhatsApp) and
//! Gmail Pub/Sub pushes.

use std::collections::HashMap;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use omnidesk_engine::payload::{GmailPush, MetaWebhook, WhatsappWebhook};
use omnidesk_engine::{Verification, verify_subscription};
use tracing::{debug, info};

use crate::envelope::{ApiError, json_body, respond};
use crate::server::GatewayState;

/// GET on any Meta webhook route: the subscription handshake.
///
/// Echoes `hub.challenge` as a bare integer when `hub.verify_token`
/// matches the configured secret.
pub async fn verify(
    State(state): State<GatewayState>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let verdict = verify_subscription(
        params.get("hub.mode").map(String::as_str),
        params.get("hub.verify_token").map(String::as_str),
        params.get("hub.challenge").map(String::as_str),
        state.verify_token.as_deref(),
    );
    match verdict {
        Verification::Accepted(challenge) => {
            info!("webhook subscription verified");
            (StatusCode::OK, challenge.to_string()).into_response()
        }
        Verification::Forbidden => {
            debug!("webhook verification token rejected");
            StatusCode::FORBIDDEN.into_response()
        }
        Verification::BadRequest => StatusCode::BAD_REQUEST.into_response(),
    }
}

/// POST /webhook-meta/facebook
pub async fn facebook(
    State(state): State<GatewayState>,
    body: Result<Json<MetaWebhook>, JsonRejection>,
) -> Response {
    respond(ingest_meta(&state, body, false).await)
}

/// POST /webhook-meta/instagram
pub async fn instagram(
    State(state): State<GatewayState>,
    body: Result<Json<MetaWebhook>, JsonRejection>,
) -> Response {
    respond(ingest_meta(&state, body, true).await)
}

async fn ingest_meta(
    state: &GatewayState,
    body: Result<Json<MetaWebhook>, JsonRejection>,
    instagram: bool,
) -> Result<omnidesk_engine::IngestReport, ApiError> {
    let payload = json_body(body)?;
    let report = if instagram {
        state.engine.ingest_instagram(&payload).await?
    } else {
        state.engine.ingest_facebook(&payload).await?
    };
    Ok(report)
}

/// POST /webhooks (WhatsApp Cloud API)
pub async fn whatsapp(
    State(state): State<GatewayState>,
    body: Result<Json<WhatsappWebhook>, JsonRejection>,
) -> Response {
    let result = async {
        let payload = json_body(body)?;
        Ok::<_, ApiError>(state.engine.ingest_whatsapp(&payload).await?)
    }
    .await;
    respond(result)
}

/// POST /webhook-gmail (Pub/Sub push)
pub async fn gmail(
    State(state): State<GatewayState>,
    body: Result<Json<GmailPush>, JsonRejection>,
) -> Response {
    let result = async {
        let push = json_body(body)?;
        Ok::<_, ApiError>(state.engine.ingest_email(&push).await?)
    }
    .await;
    respond(result)
}
