// SPDX-FileCopyrightText: 2026 Omnidesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bridge from request handlers into the socket layer.
//!
//! [`WsNotifier::notify`] never blocks: messages go onto a bounded queue
//! drained by a dispatcher task, which keeps one outbound socket per
//! room/sender pair and dials the public socket URL as an ordinary client.
//! Dial failures are retried on a fixed interval up to a deadline; frames
//! for a socket that never comes up are dropped and counted.

use std::collections::HashMap;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use omnidesk_config::model::RealtimeConfig;
use omnidesk_core::{Message, MessageNotifier, SentBy};
use serde::Serialize;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::Message as WireMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

use crate::protocol::{self, Frame};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Notifier timing and sizing.
#[derive(Debug, Clone)]
pub struct NotifierSettings {
    pub public_url: String,
    pub queue: usize,
    pub send_buffer: usize,
    pub retry_interval: Duration,
    pub connect_deadline: Duration,
    pub write_wait: Duration,
    /// Close an outbound socket after this long without traffic.
    pub idle: Duration,
}

impl NotifierSettings {
    pub fn from_config(config: &RealtimeConfig) -> Self {
        Self {
            public_url: config.public_url.clone(),
            queue: config.notifier_queue,
            send_buffer: config.send_buffer,
            retry_interval: Duration::from_millis(config.notifier_retry_interval_ms),
            connect_deadline: Duration::from_secs(config.notifier_connect_deadline_secs),
            write_wait: Duration::from_secs(config.write_wait_secs),
            idle: Duration::from_secs(config.pong_wait_secs),
        }
    }
}

#[derive(Serialize)]
struct SendMessage<'a> {
    action: &'static str,
    message: &'a Message,
}

/// URL the notifier dials to publish `message` into its interaction room.
pub fn dial_url(public_url: &str, message: &Message) -> Result<Url, url::ParseError> {
    let room_id = message.interaction_id.to_string();
    let mut url = Url::parse(&format!("{}/ws", public_url.trim_end_matches('/')))?;
    {
        let mut query = url.query_pairs_mut();
        query
            .append_pair(
                "user_id",
                &format!("notifier:{room_id}:{}", message.sender_id),
            )
            .append_pair("room_id", &room_id)
            .append_pair("sender_id", &message.sender_id);
        if message.sent_by == SentBy::Agent {
            query.append_pair("is_agent", "true");
        }
    }
    Ok(url)
}

/// [`MessageNotifier`] that publishes over the socket layer.
#[derive(Debug, Clone)]
pub struct WsNotifier {
    tx: mpsc::Sender<Message>,
}

impl WsNotifier {
    /// Spawn the dispatcher task. It stops when `cancel` fires.
    pub fn spawn(settings: NotifierSettings, cancel: CancellationToken) -> Self {
        let (tx, rx) = mpsc::channel(settings.queue);
        tokio::spawn(dispatch(rx, settings, cancel));
        Self { tx }
    }
}

impl MessageNotifier for WsNotifier {
    fn notify(&self, messages: &[Message]) {
        for message in messages {
            match self.tx.try_send(message.clone()) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    omnidesk_prometheus::record_notifier_dropped(1);
                    warn!(message_id = message.id, "notifier queue full, message dropped");
                }
                Err(TrySendError::Closed(_)) => {
                    omnidesk_prometheus::record_notifier_dropped(1);
                    debug!(message_id = message.id, "notifier stopped, message dropped");
                }
            }
        }
    }
}

async fn dispatch(
    mut rx: mpsc::Receiver<Message>,
    settings: NotifierSettings,
    cancel: CancellationToken,
) {
    let mut bridges: HashMap<String, mpsc::Sender<Frame>> = HashMap::new();

    loop {
        let message = tokio::select! {
            () = cancel.cancelled() => break,
            message = rx.recv() => match message {
                Some(message) => message,
                None => break,
            },
        };

        let url = match dial_url(&settings.public_url, &message) {
            Ok(url) => url,
            Err(e) => {
                warn!(error = %e, url = %settings.public_url, "invalid notifier url");
                omnidesk_prometheus::record_notifier_dropped(1);
                continue;
            }
        };
        let Some(frame) = protocol::encode(&SendMessage {
            action: protocol::SEND_MESSAGE,
            message: &message,
        }) else {
            continue;
        };

        let key = url.to_string();
        let bridge = match bridges.get(&key) {
            Some(bridge) if !bridge.is_closed() => bridge.clone(),
            _ => {
                let (tx, bridge_rx) = mpsc::channel(settings.send_buffer);
                tokio::spawn(bridge_loop(url, bridge_rx, settings.clone(), cancel.child_token()));
                bridges.insert(key, tx.clone());
                tx
            }
        };
        if bridge.try_send(frame).is_err() {
            omnidesk_prometheus::record_notifier_dropped(1);
            warn!(interaction_id = message.interaction_id, "notifier bridge busy, message dropped");
        }

        bridges.retain(|_, tx| !tx.is_closed());
    }

    debug!(bridges = bridges.len(), "notifier stopped");
}

/// One outbound socket. Dials lazily, redials after a failed write, and
/// exits after `idle` without frames.
async fn bridge_loop(
    url: Url,
    mut rx: mpsc::Receiver<Frame>,
    settings: NotifierSettings,
    cancel: CancellationToken,
) {
    let mut socket: Option<Socket> = None;

    loop {
        tokio::select! {
            () = cancel.cancelled() => break,
            frame = tokio::time::timeout(settings.idle, rx.recv()) => match frame {
                Ok(Some(frame)) => {
                    send_frame(&url, &mut socket, frame, &settings, &cancel).await;
                }
                Ok(None) => break,
                Err(_) => {
                    // Idle: stop accepting, then flush what raced in.
                    rx.close();
                    while let Ok(frame) = rx.try_recv() {
                        send_frame(&url, &mut socket, frame, &settings, &cancel).await;
                    }
                    break;
                }
            },
            incoming = next_incoming(&mut socket) => {
                if incoming.is_none() {
                    debug!(%url, "notifier socket closed by peer");
                    socket = None;
                }
            }
        }
    }

    if let Some(mut ws) = socket {
        let _ = tokio::time::timeout(settings.write_wait, ws.close(None)).await;
        omnidesk_prometheus::connection_closed("notifier");
    }
}

/// Drain room traffic echoed back to the bridge so pongs keep flowing.
/// Pends forever while disconnected.
async fn next_incoming(socket: &mut Option<Socket>) -> Option<()> {
    match socket.as_mut() {
        Some(ws) => match ws.next().await {
            Some(Ok(_)) => Some(()),
            _ => None,
        },
        None => std::future::pending().await,
    }
}

async fn send_frame(
    url: &Url,
    socket: &mut Option<Socket>,
    frame: Frame,
    settings: &NotifierSettings,
    cancel: &CancellationToken,
) {
    // A stale socket gets one redial before the frame is given up.
    for _ in 0..2 {
        if socket.is_none() {
            *socket = connect(url, settings, cancel).await;
            if socket.is_some() {
                omnidesk_prometheus::connection_opened("notifier");
            }
        }
        let Some(ws) = socket.as_mut() else {
            break;
        };
        let sent = tokio::time::timeout(
            settings.write_wait,
            ws.send(WireMessage::Text(frame.as_ref().into())),
        )
        .await;
        match sent {
            Ok(Ok(())) => return,
            Ok(Err(e)) => debug!(error = %e, %url, "notifier write failed"),
            Err(_) => debug!(%url, "notifier write deadline elapsed"),
        }
        *socket = None;
        omnidesk_prometheus::connection_closed("notifier");
    }

    omnidesk_prometheus::record_notifier_dropped(1);
    warn!(%url, "notifier could not deliver frame");
}

async fn connect(url: &Url, settings: &NotifierSettings, cancel: &CancellationToken) -> Option<Socket> {
    let give_up = Instant::now() + settings.connect_deadline;
    let mut attempts = 0u32;

    loop {
        attempts += 1;
        match tokio::time::timeout(settings.write_wait, connect_async(url.as_str())).await {
            Ok(Ok((ws, _response))) => {
                if attempts > 1 {
                    info!(%url, attempts, "notifier connected");
                }
                return Some(ws);
            }
            Ok(Err(e)) => debug!(error = %e, %url, attempts, "notifier dial failed"),
            Err(_) => debug!(%url, attempts, "notifier dial timed out"),
        }

        if Instant::now() + settings.retry_interval > give_up {
            warn!(%url, attempts, "notifier giving up on dial");
            return None;
        }
        tokio::select! {
            () = cancel.cancelled() => return None,
            () = tokio::time::sleep(settings.retry_interval) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use omnidesk_core::Message;

    fn message(sent_by: SentBy) -> Message {
        Message {
            id: 5,
            interaction_id: 42,
            sender_id: "jane+cs@example.com".to_string(),
            recipient_id: "62811".to_string(),
            meta_message_id: None,
            body: "hello".to_string(),
            message_timestamp: "2026-01-01 00:00:00".to_string(),
            attachment_type: None,
            attachment_url: None,
            sent_by,
            is_read: false,
            is_deleted: false,
            created_at: "2026-01-01 00:00:00".to_string(),
            updated_at: "2026-01-01 00:00:00".to_string(),
        }
    }

    #[test]
    fn dial_url_encodes_identity() {
        let url = dial_url("ws://127.0.0.1:8080/", &message(SentBy::Agent)).unwrap();
        assert_eq!(url.path(), "/ws");
        let pairs: HashMap<String, String> = url.query_pairs().into_owned().collect();
        assert_eq!(pairs["user_id"], "notifier:42:jane+cs@example.com");
        assert_eq!(pairs["room_id"], "42");
        assert_eq!(pairs["sender_id"], "jane+cs@example.com");
        assert_eq!(pairs["is_agent"], "true");
    }

    #[test]
    fn reporter_messages_are_not_flagged_as_agent() {
        let url = dial_url("ws://localhost:8080", &message(SentBy::Reporter)).unwrap();
        assert!(!url.query_pairs().any(|(k, _)| k == "is_agent"));
    }

    #[tokio::test]
    async fn notify_never_blocks_when_queue_is_full() {
        let (tx, mut rx) = mpsc::channel(1);
        let notifier = WsNotifier { tx };
        notifier.notify(&[message(SentBy::Agent), message(SentBy::Reporter)]);
        assert_eq!(rx.recv().await.unwrap().sent_by, SentBy::Agent);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn connect_gives_up_after_deadline() {
        let settings = NotifierSettings {
            public_url: "ws://127.0.0.1:9".to_string(),
            queue: 4,
            send_buffer: 4,
            retry_interval: Duration::from_millis(10),
            connect_deadline: Duration::from_millis(50),
            write_wait: Duration::from_millis(200),
            idle: Duration::from_secs(1),
        };
        let url = dial_url(&settings.public_url, &message(SentBy::Agent)).unwrap();
        let socket = connect(&url, &settings, &CancellationToken::new()).await;
        assert!(socket.is_none());
    }
}
