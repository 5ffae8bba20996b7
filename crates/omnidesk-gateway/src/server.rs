// SPDX-FileCopyrightText: 2026 Omnidesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Gateway HTTP server built on axum.
//!
//! Sets up routes, middleware, and shared state for the gateway.

use std::sync::Arc;

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, post, put},
};
use omnidesk_core::OmniError;
use omnidesk_engine::Engine;
use omnidesk_realtime::{Broker, SessionSettings};
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::auth::{AuthConfig, auth_middleware};
use crate::{handlers, webhook, ws};

/// Health state for unauthenticated health/metrics endpoints.
#[derive(Clone)]
pub struct HealthState {
    /// Process start time for uptime calculation.
    pub start_time: std::time::Instant,
    /// Optional Prometheus metrics render function.
    pub prometheus_render: Option<Arc<dyn Fn() -> String + Send + Sync>>,
}

impl Default for HealthState {
    fn default() -> Self {
        Self {
            start_time: std::time::Instant::now(),
            prometheus_render: None,
        }
    }
}

/// Shared state for axum request handlers.
#[derive(Clone)]
pub struct GatewayState {
    pub engine: Engine,
    pub broker: Broker,
    pub sessions: SessionSettings,
    /// Secret for the Meta subscription handshake.
    pub verify_token: Option<String>,
    pub health: HealthState,
}

/// Gateway server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub auth: AuthConfig,
}

/// Build the full route table.
///
/// - public: `/health`, `/metrics`, webhooks, socket upgrades, and the live
///   chat widget routes (`/interaction/messages`, `/interaction/live-chat/*`)
/// - bearer-protected: every other `/interaction/*` route
pub fn router(state: GatewayState, auth: AuthConfig) -> Router {
    let public_routes = Router::new()
        .route("/health", get(handlers::health))
        .route("/metrics", get(handlers::metrics))
        .route(
            "/webhook-meta/facebook",
            get(webhook::verify).post(webhook::facebook),
        )
        .route(
            "/webhook-meta/instagram",
            get(webhook::verify).post(webhook::instagram),
        )
        .route("/webhooks", get(webhook::verify).post(webhook::whatsapp))
        .route("/webhook-gmail", post(webhook::gmail))
        .route("/interaction/messages", get(handlers::interaction_messages))
        .route("/interaction/live-chat/send", post(handlers::live_chat_send))
        .route(
            "/interaction/live-chat/create",
            post(handlers::live_chat_create),
        )
        .route("/ws", get(ws::client_handler))
        .route("/ws/listen", get(ws::listener_handler))
        .with_state(state.clone());

    let api_routes = Router::new()
        .route("/interaction/list", get(handlers::list_interactions))
        .route("/interaction/my", get(handlers::my_interactions))
        .route("/interaction/closed-data", get(handlers::closed_data))
        .route("/interaction/claim", put(handlers::claim))
        .route("/interaction/close", put(handlers::close))
        .route("/interaction/messenger/send", post(handlers::messenger_send))
        .route_layer(axum_middleware::from_fn_with_state(auth, auth_middleware))
        .with_state(state);

    Router::new()
        .merge(public_routes)
        .merge(api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Bind and serve until `shutdown` fires.
pub async fn start_server(
    config: &ServerConfig,
    state: GatewayState,
    shutdown: CancellationToken,
) -> Result<(), OmniError> {
    let app = router(state, config.auth.clone());

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| OmniError::Channel {
            message: format!("failed to bind gateway to {addr}: {e}"),
            source: Some(Box::new(e)),
        })?;

    tracing::info!("gateway listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .map_err(|e| OmniError::Channel {
            message: format!("gateway server error: {e}"),
            source: Some(Box::new(e)),
        })?;

    tracing::info!("gateway stopped");
    Ok(())
}
