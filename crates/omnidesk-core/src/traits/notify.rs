// SPDX-FileCopyrightText: 2026 Omnidesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Real-time fan-out hook called after messages are persisted.

use crate::types::Message;

/// Pushes persisted messages into the real-time layer.
///
/// Implementations must not block: delivery is best-effort and failures are
/// logged by the implementation, never returned to the durable write path.
pub trait MessageNotifier: Send + Sync + 'static {
    fn notify(&self, messages: &[Message]);
}

/// Notifier that discards everything. Useful when the real-time layer is disabled.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopNotifier;

impl MessageNotifier for NoopNotifier {
    fn notify(&self, _messages: &[Message]) {}
}
