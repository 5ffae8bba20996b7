// SPDX-FileCopyrightText: 2026 Omnidesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Metric registration and recording helpers.
//!
//! Uses the metrics-rs facade so any recorder (Prometheus, statsd, etc.)
//! can collect these metrics. Without an installed recorder every call is a
//! no-op, which keeps library tests free of global state.

use metrics::{describe_counter, describe_gauge};

pub const WS_CONNECTIONS: &str = "omnidesk_ws_connections";
pub const ROOM_BROADCASTS: &str = "omnidesk_room_broadcasts_total";
pub const WS_FRAMES_DROPPED: &str = "omnidesk_ws_frames_dropped_total";
pub const WEBHOOK_MESSAGES: &str = "omnidesk_webhook_messages_total";
pub const NOTIFIER_DROPPED: &str = "omnidesk_notifier_dropped_total";

/// Outcome label of an ingested webhook message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    Created,
    Duplicate,
    Skipped,
    Failed,
}

impl IngestOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Duplicate => "duplicate",
            Self::Skipped => "skipped",
            Self::Failed => "failed",
        }
    }
}

/// Register all Omnidesk metric descriptions.
///
/// Called once at startup after the recorder is installed.
pub fn register_metrics() {
    describe_gauge!(WS_CONNECTIONS, "Currently open socket sessions");
    describe_counter!(ROOM_BROADCASTS, "Messages broadcast into rooms");
    describe_counter!(
        WS_FRAMES_DROPPED,
        "Frames dropped because a session outbound buffer was full"
    );
    describe_counter!(
        WEBHOOK_MESSAGES,
        "Inbound webhook messages by platform and outcome"
    );
    describe_counter!(
        NOTIFIER_DROPPED,
        "Messages the outbound notifier could not deliver"
    );
}

/// Adjust the open-connection gauge; `kind` is `client`, `listener` or `notifier`.
pub fn connection_opened(kind: &'static str) {
    metrics::gauge!(WS_CONNECTIONS, "kind" => kind).increment(1.0);
}

pub fn connection_closed(kind: &'static str) {
    metrics::gauge!(WS_CONNECTIONS, "kind" => kind).decrement(1.0);
}

pub fn record_room_broadcast() {
    metrics::counter!(ROOM_BROADCASTS).increment(1);
}

pub fn record_frame_dropped() {
    metrics::counter!(WS_FRAMES_DROPPED).increment(1);
}

/// Record one inbound webhook message.
pub fn record_webhook_message(platform: &str, outcome: IngestOutcome) {
    metrics::counter!(
        WEBHOOK_MESSAGES,
        "platform" => platform.to_string(),
        "outcome" => outcome.as_str()
    )
    .increment(1);
}

pub fn record_notifier_dropped(count: u64) {
    metrics::counter!(NOTIFIER_DROPPED).increment(count);
}
