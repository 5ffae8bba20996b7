// SPDX-FileCopyrightText: 2026 Omnidesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Client and listener session pumps.
//!
//! A session runs an inbound and an outbound flow concurrently; whichever
//! finishes first ends the session, and the disconnect sequence then runs
//! exactly once from the owning task. Pumps are generic over any
//! `Stream`/`Sink` of axum socket messages so they can be driven by an
//! upgraded connection or by in-memory channels.

use std::fmt::Display;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use axum::extract::ws::Message as WsMessage;
use futures::{Sink, SinkExt, Stream, StreamExt};
use omnidesk_config::model::RealtimeConfig;
use serde_json::json;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info_span, trace, warn};

use crate::broker::Broker;
use crate::peer::{Peer, next_conn_id};
use crate::protocol::{self, ClientEvent, Frame, Member, RoomEvent};
use crate::room::RoomHandle;

/// Socket timing and sizing limits.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub write_wait: Duration,
    pub pong_wait: Duration,
    pub max_message_size: usize,
    pub send_buffer: usize,
}

impl SessionSettings {
    pub fn from_config(config: &RealtimeConfig) -> Self {
        Self {
            write_wait: Duration::from_secs(config.write_wait_secs),
            pong_wait: Duration::from_secs(config.pong_wait_secs),
            max_message_size: config.max_message_size,
            send_buffer: config.send_buffer,
        }
    }

    /// Pings go out at 9/10 of the pong wait.
    pub fn ping_period(&self) -> Duration {
        self.pong_wait * 9 / 10
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self::from_config(&RealtimeConfig::default())
    }
}

/// Connection parameters of a room client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientParams {
    pub user_id: String,
    pub room_id: String,
    /// Identity shown as the sender of broadcasts; defaults to `user_id`.
    pub sender_id: Option<String>,
    pub is_agent: bool,
}

/// Run a room client until either flow ends.
pub async fn run_client<S, K, E>(
    inbound: S,
    outbound: K,
    broker: Broker,
    params: ClientParams,
    settings: SessionSettings,
) where
    S: Stream<Item = Result<WsMessage, E>> + Unpin + Send,
    K: Sink<WsMessage> + Unpin + Send,
    K::Error: Display,
    E: Display,
{
    let conn_id = next_conn_id();
    let span = info_span!(
        "ws_client",
        conn_id,
        user_id = %params.user_id,
        room = %params.room_id,
        is_agent = params.is_agent
    );
    client_session(conn_id, inbound, outbound, broker, params, settings)
        .instrument(span)
        .await;
}

async fn client_session<S, K, E>(
    conn_id: u64,
    inbound: S,
    outbound: K,
    broker: Broker,
    params: ClientParams,
    settings: SessionSettings,
) where
    S: Stream<Item = Result<WsMessage, E>> + Unpin + Send,
    K: Sink<WsMessage> + Unpin + Send,
    K::Error: Display,
    E: Display,
{
    let (tx, rx) = mpsc::channel(settings.send_buffer);
    let peer = Peer::new(conn_id, params.user_id.as_str(), tx);

    let (room, origin) = match broker.join_room(&params.room_id).await {
        Ok(joined) => joined,
        Err(e) => {
            warn!(error = %e, "rejecting client");
            return;
        }
    };

    let evicted = match broker.register_client(peer.clone()).await {
        Ok(evicted) => evicted,
        Err(e) => {
            warn!(error = %e, "rejecting client");
            broker.leave_room(&params.room_id).await;
            return;
        }
    };
    if let Some(previous) = evicted
        && tokio::time::timeout(settings.write_wait, previous.cancelled())
            .await
            .is_err()
    {
        warn!("evicted session did not close in time");
    }

    room.register(peer.clone()).await;
    omnidesk_prometheus::connection_opened("client");
    debug!(?origin, "client connected");

    let sender = Member::new(params.sender_id.clone().unwrap_or_else(|| params.user_id.clone()));
    let joined = RoomEvent {
        action: protocol::ROOM_JOINED.to_string(),
        message: json!(origin),
        sender: sender.clone(),
        room: Member::new(room.id()),
    };
    if let Some(frame) = protocol::encode(&joined) {
        peer.deliver(&frame);
    }

    let ctx = ClientContext {
        conn_id,
        broker: &broker,
        room: &room,
        sender,
        in_room: AtomicBool::new(true),
    };

    tokio::select! {
        () = client_inbound(inbound, &settings, &ctx) => trace!("inbound flow ended"),
        () = write_pump(outbound, rx, &settings, peer.shutdown_token()) => trace!("outbound flow ended"),
    }

    broker.unregister_client(&peer).await;
    ctx.leave_room().await;
    omnidesk_prometheus::connection_closed("client");
    peer.mark_closed();
    debug!("client disconnected");
}

struct ClientContext<'a> {
    conn_id: u64,
    broker: &'a Broker,
    room: &'a RoomHandle,
    sender: Member,
    in_room: AtomicBool,
}

impl ClientContext<'_> {
    async fn handle(&self, text: &str) {
        let event: ClientEvent = match serde_json::from_str(text) {
            Ok(event) => event,
            Err(e) => {
                debug!(error = %e, "dropping undecodable event");
                return;
            }
        };

        match event.action.as_str() {
            protocol::SEND_MESSAGE => {
                if !self.in_room.load(Ordering::Acquire) {
                    debug!("send-message after leaving room ignored");
                    return;
                }
                let outgoing = RoomEvent {
                    action: event.action,
                    message: event.message,
                    sender: self.sender.clone(),
                    room: Member::new(self.room.id()),
                };
                if let Some(frame) = protocol::encode(&outgoing) {
                    self.room.broadcast(frame).await;
                }
            }
            protocol::LEAVE_ROOM => self.leave_room().await,
            other => debug!(action = other, "ignoring client event"),
        }
    }

    /// Leave the room once; later calls are no-ops.
    async fn leave_room(&self) {
        if self.in_room.swap(false, Ordering::AcqRel) {
            self.room.unregister(self.conn_id).await;
            self.broker.leave_room(self.room.id()).await;
        }
    }
}

async fn client_inbound<S, E>(inbound: S, settings: &SessionSettings, ctx: &ClientContext<'_>)
where
    S: Stream<Item = Result<WsMessage, E>> + Unpin,
    E: Display,
{
    let mut reader = Reader::new(inbound, settings);
    while let Some(text) = reader.next_text().await {
        ctx.handle(&text).await;
    }
}

/// Run a presence listener until either flow ends.
pub async fn run_listener<S, K, E>(inbound: S, outbound: K, broker: Broker, settings: SessionSettings)
where
    S: Stream<Item = Result<WsMessage, E>> + Unpin + Send,
    K: Sink<WsMessage> + Unpin + Send,
    K::Error: Display,
    E: Display,
{
    let conn_id = next_conn_id();
    listener_session(conn_id, inbound, outbound, broker, settings)
        .instrument(info_span!("ws_listener", conn_id))
        .await;
}

async fn listener_session<S, K, E>(
    conn_id: u64,
    inbound: S,
    outbound: K,
    broker: Broker,
    settings: SessionSettings,
) where
    S: Stream<Item = Result<WsMessage, E>> + Unpin + Send,
    K: Sink<WsMessage> + Unpin + Send,
    K::Error: Display,
    E: Display,
{
    let (tx, rx) = mpsc::channel(settings.send_buffer);
    let peer = Peer::new(conn_id, "listener", tx);

    if let Err(e) = broker.register_listener(peer.clone()).await {
        warn!(error = %e, "rejecting listener");
        return;
    }
    omnidesk_prometheus::connection_opened("listener");
    debug!("listener connected");

    let mut reader = Reader::new(inbound, &settings);
    tokio::select! {
        () = async { while reader.next_text().await.is_some() {} } => trace!("inbound flow ended"),
        () = write_pump(outbound, rx, &settings, peer.shutdown_token()) => trace!("outbound flow ended"),
    }

    broker.unregister_listener(conn_id).await;
    omnidesk_prometheus::connection_closed("listener");
    peer.mark_closed();
    debug!("listener disconnected");
}

/// Inbound half: yields text frames and keeps the read deadline.
struct Reader<'a, S> {
    inbound: S,
    settings: &'a SessionSettings,
    deadline: Instant,
}

impl<'a, S, E> Reader<'a, S>
where
    S: Stream<Item = Result<WsMessage, E>> + Unpin,
    E: Display,
{
    fn new(inbound: S, settings: &'a SessionSettings) -> Self {
        Self {
            inbound,
            settings,
            deadline: Instant::now() + settings.pong_wait,
        }
    }

    /// Next text payload, or `None` once the connection should close.
    async fn next_text(&mut self) -> Option<String> {
        loop {
            let message = match tokio::time::timeout_at(self.deadline, self.inbound.next()).await {
                Err(_) => {
                    debug!("read deadline elapsed");
                    return None;
                }
                Ok(None) => return None,
                Ok(Some(Err(e))) => {
                    debug!(error = %e, "socket read failed");
                    return None;
                }
                Ok(Some(Ok(message))) => message,
            };

            match message {
                WsMessage::Text(text) => {
                    if text.as_str().len() > self.settings.max_message_size {
                        warn!(size = text.as_str().len(), "frame exceeds read limit");
                        return None;
                    }
                    return Some(text.as_str().to_owned());
                }
                WsMessage::Binary(bytes) => {
                    if bytes.len() > self.settings.max_message_size {
                        warn!(size = bytes.len(), "frame exceeds read limit");
                        return None;
                    }
                    match String::from_utf8(bytes.to_vec()) {
                        Ok(text) => return Some(text),
                        Err(_) => debug!("dropping non-utf8 binary frame"),
                    }
                }
                WsMessage::Pong(_) => {
                    self.deadline = Instant::now() + self.settings.pong_wait;
                }
                WsMessage::Ping(_) => {}
                WsMessage::Close(_) => return None,
            }
        }
    }
}

/// Outbound half: drains the buffer, coalescing queued frames into one
/// newline-separated write, and pings on a fixed period.
async fn write_pump<K>(
    mut outbound: K,
    mut rx: mpsc::Receiver<Frame>,
    settings: &SessionSettings,
    shutdown: CancellationToken,
) where
    K: Sink<WsMessage> + Unpin,
    K::Error: Display,
{
    let period = settings.ping_period();
    let mut ping = tokio::time::interval_at(Instant::now() + period, period);

    loop {
        tokio::select! {
            () = shutdown.cancelled() => {
                let _ = write(&mut outbound, WsMessage::Close(None), settings.write_wait).await;
                return;
            }
            frame = rx.recv() => {
                let Some(frame) = frame else {
                    let _ = write(&mut outbound, WsMessage::Close(None), settings.write_wait).await;
                    return;
                };
                let mut batch = String::from(&*frame);
                while let Ok(next) = rx.try_recv() {
                    batch.push('\n');
                    batch.push_str(&next);
                }
                if !write(&mut outbound, WsMessage::Text(batch.into()), settings.write_wait).await {
                    return;
                }
            }
            _ = ping.tick() => {
                if !write(&mut outbound, WsMessage::Ping(Default::default()), settings.write_wait).await {
                    return;
                }
            }
        }
    }
}

async fn write<K>(outbound: &mut K, message: WsMessage, deadline: Duration) -> bool
where
    K: Sink<WsMessage> + Unpin,
    K::Error: Display,
{
    match tokio::time::timeout(deadline, outbound.send(message)).await {
        Ok(Ok(())) => true,
        Ok(Err(e)) => {
            debug!(error = %e, "socket write failed");
            false
        }
        Err(_) => {
            debug!("socket write deadline elapsed");
            false
        }
    }
}
