// SPDX-FileCopyrightText: 2026 Omnidesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP and socket surface of the Omnidesk service.
//!
//! One axum router serves the Meta and Gmail webhooks, the dashboard API
//! (behind bearer auth), the live chat widget routes, socket upgrades into
//! the real-time layer, and the health/metrics endpoints. Every JSON route
//! answers with the same `{data, isError, errorStatus, errorMessage}`
//! envelope.

pub mod auth;
pub mod envelope;
pub mod handlers;
pub mod server;
pub mod webhook;
pub mod ws;

pub use auth::{AuthConfig, Identity};
pub use envelope::{ApiError, Envelope};
pub use server::{GatewayState, HealthState, ServerConfig, router, start_server};
