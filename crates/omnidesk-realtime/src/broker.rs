// SPDX-FileCopyrightText: 2026 Omnidesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Process-wide connection broker.
//!
//! One task owns the client, listener and room directories. Sessions talk to
//! it through [`Broker`], a cloneable handle over a command queue, so the
//! directories are only ever touched from that task.
//!
//! Invariants maintained by the loop:
//! - at most one client per user id; a newer connection evicts the older one
//!   and the newer session waits for the eviction to finish before joining
//!   its room;
//! - a room stays in the directory while any join is outstanding, and is
//!   retired when its last member leaves.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::BrokerClosed;
use crate::peer::Peer;
use crate::protocol::{self, Frame, Member, Presence, RoomOrigin};
use crate::room::RoomHandle;

const BROKER_QUEUE: usize = 1024;

enum Command {
    RegisterClient {
        peer: Peer,
        reply: oneshot::Sender<Option<CancellationToken>>,
    },
    UnregisterClient {
        user_id: Arc<str>,
        conn_id: u64,
    },
    RegisterListener(Peer),
    UnregisterListener(u64),
    Broadcast(Frame),
    JoinRoom {
        room_id: String,
        reply: oneshot::Sender<(RoomHandle, RoomOrigin)>,
    },
    LeaveRoom(String),
    Snapshot(oneshot::Sender<BrokerSnapshot>),
}

/// Point-in-time view of the broker directories.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BrokerSnapshot {
    pub rooms: Vec<String>,
    pub clients: Vec<String>,
    pub listeners: usize,
}

/// Cloneable handle to the broker task.
#[derive(Debug, Clone)]
pub struct Broker {
    tx: mpsc::Sender<Command>,
}

impl Broker {
    /// Spawn the broker loop. It stops when `cancel` fires, shutting down
    /// every registered session on the way out.
    pub fn spawn(cancel: CancellationToken) -> Self {
        let (tx, rx) = mpsc::channel(BROKER_QUEUE);
        tokio::spawn(run(rx, cancel));
        Self { tx }
    }

    /// Register a client. Returns the `closed` token of an evicted session
    /// for the same user id, if there was one.
    pub async fn register_client(
        &self,
        peer: Peer,
    ) -> Result<Option<CancellationToken>, BrokerClosed> {
        let (reply, rx) = oneshot::channel();
        self.submit(Command::RegisterClient { peer, reply }).await?;
        rx.await.map_err(|_| BrokerClosed)
    }

    /// Remove a client. Ignored when the user id is now held by a newer
    /// connection.
    pub async fn unregister_client(&self, peer: &Peer) {
        let _ = self
            .submit(Command::UnregisterClient {
                user_id: Arc::clone(&peer.user_id),
                conn_id: peer.conn_id,
            })
            .await;
    }

    pub async fn register_listener(&self, peer: Peer) -> Result<(), BrokerClosed> {
        self.submit(Command::RegisterListener(peer)).await
    }

    pub async fn unregister_listener(&self, conn_id: u64) {
        let _ = self.submit(Command::UnregisterListener(conn_id)).await;
    }

    /// Fan a frame out to every registered client.
    pub async fn broadcast(&self, frame: Frame) -> Result<(), BrokerClosed> {
        self.submit(Command::Broadcast(frame)).await
    }

    /// Find or create the room for `room_id` and count this join against it.
    ///
    /// Every successful join must be paired with one [`Broker::leave_room`].
    pub async fn join_room(&self, room_id: &str) -> Result<(RoomHandle, RoomOrigin), BrokerClosed> {
        let (reply, rx) = oneshot::channel();
        self.submit(Command::JoinRoom {
            room_id: room_id.to_string(),
            reply,
        })
        .await?;
        rx.await.map_err(|_| BrokerClosed)
    }

    pub async fn leave_room(&self, room_id: &str) {
        let _ = self.submit(Command::LeaveRoom(room_id.to_string())).await;
    }

    pub async fn snapshot(&self) -> Result<BrokerSnapshot, BrokerClosed> {
        let (reply, rx) = oneshot::channel();
        self.submit(Command::Snapshot(reply)).await?;
        rx.await.map_err(|_| BrokerClosed)
    }

    async fn submit(&self, command: Command) -> Result<(), BrokerClosed> {
        self.tx.send(command).await.map_err(|_| BrokerClosed)
    }
}

struct RoomEntry {
    handle: RoomHandle,
    joins: usize,
}

#[derive(Default)]
struct Directories {
    clients: HashMap<Arc<str>, Peer>,
    listeners: HashMap<u64, Peer>,
    rooms: HashMap<String, RoomEntry>,
}

impl Directories {
    fn presence(&self, action: &str) -> Presence {
        let mut online: Vec<Member> = self.rooms.keys().map(Member::new).collect();
        online.sort();
        let mut online_user: Vec<Member> =
            self.clients.keys().map(|id| Member::new(id.as_ref())).collect();
        online_user.sort();
        Presence {
            action: action.to_string(),
            online,
            online_user,
        }
    }

    fn notify_listeners(&self, action: &str) {
        if self.listeners.is_empty() {
            return;
        }
        let Some(frame) = protocol::encode(&self.presence(action)) else {
            return;
        };
        for listener in self.listeners.values() {
            listener.deliver(&frame);
        }
    }

    fn snapshot(&self) -> BrokerSnapshot {
        let mut rooms: Vec<String> = self.rooms.keys().cloned().collect();
        rooms.sort();
        let mut clients: Vec<String> = self.clients.keys().map(|id| id.to_string()).collect();
        clients.sort();
        BrokerSnapshot {
            rooms,
            clients,
            listeners: self.listeners.len(),
        }
    }

    fn apply(&mut self, command: Command) {
        match command {
            Command::RegisterClient { peer, reply } => {
                let evicted = match self.clients.insert(Arc::clone(&peer.user_id), peer.clone()) {
                    Some(previous) if previous.conn_id != peer.conn_id => {
                        info!(
                            user_id = %peer.user_id,
                            evicted = previous.conn_id,
                            conn_id = peer.conn_id,
                            "replacing existing connection"
                        );
                        previous.shut_down();
                        Some(previous.closed_token())
                    }
                    _ => None,
                };
                let _ = reply.send(evicted);
                self.notify_listeners(protocol::USER_JOIN);
            }
            Command::UnregisterClient { user_id, conn_id } => {
                let current = self.clients.get(&user_id).map(|p| p.conn_id);
                if current == Some(conn_id) {
                    self.clients.remove(&user_id);
                    self.notify_listeners(protocol::USER_LEFT);
                }
            }
            Command::RegisterListener(peer) => {
                self.listeners.insert(peer.conn_id, peer);
                self.notify_listeners(protocol::JOIN_ROOM);
            }
            Command::UnregisterListener(conn_id) => {
                self.listeners.remove(&conn_id);
            }
            Command::Broadcast(frame) => {
                for client in self.clients.values() {
                    client.deliver(&frame);
                }
            }
            Command::JoinRoom { room_id, reply } => {
                let origin = match self.rooms.get_mut(&room_id) {
                    Some(entry) => {
                        entry.joins += 1;
                        RoomOrigin::Omnichannel
                    }
                    None => {
                        let handle = RoomHandle::spawn(&room_id);
                        self.rooms
                            .insert(room_id.clone(), RoomEntry { handle, joins: 1 });
                        RoomOrigin::Webhook
                    }
                };
                if let Some(entry) = self.rooms.get(&room_id) {
                    let _ = reply.send((entry.handle.clone(), origin));
                }
            }
            Command::LeaveRoom(room_id) => {
                if let Some(entry) = self.rooms.get_mut(&room_id) {
                    entry.joins = entry.joins.saturating_sub(1);
                    if entry.joins == 0 {
                        self.rooms.remove(&room_id);
                        debug!(room = %room_id, "room emptied");
                    }
                }
            }
            Command::Snapshot(reply) => {
                let _ = reply.send(self.snapshot());
            }
        }
    }

    fn shut_down_all(&self) {
        for peer in self.clients.values().chain(self.listeners.values()) {
            peer.shut_down();
        }
    }
}

async fn run(mut rx: mpsc::Receiver<Command>, cancel: CancellationToken) {
    let mut dirs = Directories::default();
    debug!("broker started");

    loop {
        tokio::select! {
            () = cancel.cancelled() => break,
            command = rx.recv() => match command {
                Some(command) => dirs.apply(command),
                None => break,
            },
        }
    }

    if !dirs.clients.is_empty() || !dirs.listeners.is_empty() {
        warn!(
            clients = dirs.clients.len(),
            listeners = dirs.listeners.len(),
            "broker stopping with live sessions"
        );
    }
    dirs.shut_down_all();
    debug!("broker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::peer::next_conn_id;

    fn peer(user: &str) -> (Peer, mpsc::Receiver<Frame>) {
        let (tx, rx) = mpsc::channel(16);
        (Peer::new(next_conn_id(), user, tx), rx)
    }

    fn presence(rx: &mut mpsc::Receiver<Frame>) -> Presence {
        serde_json::from_str(&rx.try_recv().expect("presence frame")).unwrap()
    }

    #[tokio::test]
    async fn second_connection_evicts_first() {
        let broker = Broker::spawn(CancellationToken::new());
        let (first, _rx1) = peer("agent-1");
        let (second, _rx2) = peer("agent-1");
        let first_shutdown = first.shutdown_token();

        assert!(broker.register_client(first.clone()).await.unwrap().is_none());
        let evicted = broker.register_client(second.clone()).await.unwrap();

        assert!(first_shutdown.is_cancelled());
        assert!(!second.shutdown_token().is_cancelled());
        assert!(evicted.is_some());

        // The stale session's unregister must not remove the new entry.
        broker.unregister_client(&first).await;
        let snapshot = broker.snapshot().await.unwrap();
        assert_eq!(snapshot.clients, vec!["agent-1".to_string()]);
    }

    #[tokio::test]
    async fn join_reports_origin_and_rooms_retire_when_empty() {
        let broker = Broker::spawn(CancellationToken::new());

        let (_, origin) = broker.join_room("12").await.unwrap();
        assert_eq!(origin, RoomOrigin::Webhook);
        let (_, origin) = broker.join_room("12").await.unwrap();
        assert_eq!(origin, RoomOrigin::Omnichannel);

        broker.leave_room("12").await;
        assert_eq!(broker.snapshot().await.unwrap().rooms, vec!["12".to_string()]);
        broker.leave_room("12").await;
        assert!(broker.snapshot().await.unwrap().rooms.is_empty());

        let (_, origin) = broker.join_room("12").await.unwrap();
        assert_eq!(origin, RoomOrigin::Webhook);
    }

    #[tokio::test]
    async fn listeners_receive_presence_snapshots() {
        let broker = Broker::spawn(CancellationToken::new());
        let (listener, mut listener_rx) = peer("listener");
        broker.join_room("12").await.unwrap();
        broker.register_listener(listener).await.unwrap();

        let (client, _client_rx) = peer("agent-1");
        broker.register_client(client.clone()).await.unwrap();
        broker.unregister_client(&client).await;
        broker.snapshot().await.unwrap();

        let joined = presence(&mut listener_rx);
        assert_eq!(joined.action, protocol::JOIN_ROOM);
        assert_eq!(joined.online, vec![Member::new("12")]);
        assert!(joined.online_user.is_empty());

        let user_join = presence(&mut listener_rx);
        assert_eq!(user_join.action, protocol::USER_JOIN);
        assert_eq!(user_join.online_user, vec![Member::new("agent-1")]);

        let user_left = presence(&mut listener_rx);
        assert_eq!(user_left.action, protocol::USER_LEFT);
        assert!(user_left.online_user.is_empty());
    }

    #[tokio::test]
    async fn broadcast_reaches_all_clients_but_not_listeners() {
        let broker = Broker::spawn(CancellationToken::new());
        let (a, mut a_rx) = peer("a");
        let (b, mut b_rx) = peer("b");
        let (listener, mut listener_rx) = peer("listener");
        broker.register_client(a).await.unwrap();
        broker.register_client(b).await.unwrap();
        broker.register_listener(listener).await.unwrap();
        listener_rx.recv().await.unwrap();

        broker.broadcast(Arc::from("maintenance")).await.unwrap();
        broker.snapshot().await.unwrap();

        assert_eq!(&*a_rx.try_recv().unwrap(), "maintenance");
        assert_eq!(&*b_rx.try_recv().unwrap(), "maintenance");
        assert!(listener_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn cancel_shuts_down_sessions() {
        let cancel = CancellationToken::new();
        let broker = Broker::spawn(cancel.clone());
        let (client, _rx) = peer("agent-1");
        let shutdown = client.shutdown_token();
        broker.register_client(client).await.unwrap();

        cancel.cancel();
        tokio::time::timeout(std::time::Duration::from_secs(1), shutdown.cancelled())
            .await
            .unwrap();
        assert!(broker.snapshot().await.is_err());
    }
}
