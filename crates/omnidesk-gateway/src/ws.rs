// SPDX-FileCopyrightText: 2026 Omnidesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Socket upgrade routes.
//!
//! `/ws?user_id=&room_id=` joins an interaction room; `/ws/listen` receives
//! presence snapshots only. Once upgraded, the connection is handed to the
//! realtime session pumps.

use axum::extract::rejection::QueryRejection;
use axum::extract::ws::{WebSocketUpgrade, rejection::WebSocketUpgradeRejection};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use futures::StreamExt;
use omnidesk_core::ErrorStatus;
use omnidesk_realtime::{ClientParams, run_client, run_listener};
use serde::Deserialize;

use crate::envelope::ApiError;
use crate::server::GatewayState;

/// Query parameters of a room connection.
#[derive(Debug, Default, Deserialize)]
pub struct ClientQuery {
    pub user_id: Option<String>,
    pub room_id: Option<String>,
    pub sender_id: Option<String>,
    pub is_agent: Option<String>,
}

impl ClientQuery {
    /// Both `user_id` and `room_id` are required and must be non-empty.
    pub fn into_params(self) -> Option<ClientParams> {
        let non_empty = |v: Option<String>| v.filter(|s| !s.trim().is_empty());
        Some(ClientParams {
            user_id: non_empty(self.user_id)?,
            room_id: non_empty(self.room_id)?,
            sender_id: non_empty(self.sender_id),
            is_agent: self.is_agent.as_deref() == Some("true"),
        })
    }
}

/// GET /ws
///
/// Parameters are checked before the upgrade so a bad request gets an
/// `INVALID_QUERY` envelope rather than a handshake error.
pub async fn client_handler(
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
    State(state): State<GatewayState>,
    query: Result<Query<ClientQuery>, QueryRejection>,
) -> Response {
    let params = query.ok().and_then(|Query(q)| q.into_params());
    let Some(params) = params else {
        return ApiError::new(StatusCode::BAD_REQUEST, ErrorStatus::InvalidQuery).into_response();
    };
    let ws = match ws {
        Ok(ws) => ws,
        Err(rejection) => return rejection.into_response(),
    };

    let broker = state.broker.clone();
    let settings = state.sessions.clone();
    ws.max_message_size(settings.max_message_size)
        .on_upgrade(move |socket| async move {
            let (sink, stream) = socket.split();
            run_client(stream, sink, broker, params, settings).await;
        })
}

/// GET /ws/listen
pub async fn listener_handler(ws: WebSocketUpgrade, State(state): State<GatewayState>) -> Response {
    let broker = state.broker.clone();
    let settings = state.sessions.clone();
    ws.max_message_size(settings.max_message_size)
        .on_upgrade(move |socket| async move {
            let (sink, stream) = socket.split();
            run_listener(stream, sink, broker, settings).await;
        })
}
