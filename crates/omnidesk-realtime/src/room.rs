// SPDX-FileCopyrightText: 2026 Omnidesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-interaction broadcast group.
//!
//! Each room is its own task draining a command queue, so membership changes
//! and broadcasts inside one room are applied in submission order without
//! locks. The task ends once every handle has been dropped.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, trace};

use crate::peer::Peer;
use crate::protocol::Frame;

const ROOM_QUEUE: usize = 256;

enum RoomCommand {
    Register(Peer),
    Unregister(u64),
    Broadcast(Frame),
    #[cfg(test)]
    Members(tokio::sync::oneshot::Sender<Vec<Arc<str>>>),
}

/// Cloneable handle to a running room.
#[derive(Debug, Clone)]
pub struct RoomHandle {
    id: Arc<str>,
    tx: mpsc::Sender<RoomCommand>,
}

impl std::fmt::Debug for RoomCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Register(peer) => write!(f, "Register({})", peer.conn_id),
            Self::Unregister(id) => write!(f, "Unregister({id})"),
            Self::Broadcast(_) => f.write_str("Broadcast"),
            #[cfg(test)]
            Self::Members(_) => f.write_str("Members"),
        }
    }
}

impl RoomHandle {
    /// Start a room task for `id`.
    pub fn spawn(id: &str) -> Self {
        let (tx, rx) = mpsc::channel(ROOM_QUEUE);
        let id: Arc<str> = Arc::from(id);
        tokio::spawn(run(Arc::clone(&id), rx));
        Self { id, tx }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub async fn register(&self, peer: Peer) {
        self.submit(RoomCommand::Register(peer)).await;
    }

    /// Remove a member. Removing an absent member is a no-op.
    pub async fn unregister(&self, conn_id: u64) {
        self.submit(RoomCommand::Unregister(conn_id)).await;
    }

    pub async fn broadcast(&self, frame: Frame) {
        self.submit(RoomCommand::Broadcast(frame)).await;
    }

    /// User ids of the current members, in join order of their connections.
    #[cfg(test)]
    pub(crate) async fn members(&self) -> Vec<Arc<str>> {
        let (reply, rx) = tokio::sync::oneshot::channel();
        self.submit(RoomCommand::Members(reply)).await;
        rx.await.unwrap_or_default()
    }

    async fn submit(&self, command: RoomCommand) {
        if let Err(e) = self.tx.send(command).await {
            debug!(room = %self.id, command = ?e.0, "room already retired");
        }
    }
}

async fn run(id: Arc<str>, mut rx: mpsc::Receiver<RoomCommand>) {
    let mut members: HashMap<u64, Peer> = HashMap::new();
    debug!(room = %id, "room opened");

    while let Some(command) = rx.recv().await {
        match command {
            RoomCommand::Register(peer) => {
                trace!(room = %id, conn_id = peer.conn_id, "member joined");
                members.insert(peer.conn_id, peer);
            }
            RoomCommand::Unregister(conn_id) => {
                if members.remove(&conn_id).is_some() {
                    trace!(room = %id, conn_id, "member left");
                }
            }
            RoomCommand::Broadcast(frame) => {
                omnidesk_prometheus::record_room_broadcast();
                for peer in members.values() {
                    peer.deliver(&frame);
                }
            }
            #[cfg(test)]
            RoomCommand::Members(reply) => {
                let mut peers: Vec<&Peer> = members.values().collect();
                peers.sort_by_key(|p| p.conn_id);
                let _ = reply.send(peers.into_iter().map(|p| Arc::clone(&p.user_id)).collect());
            }
        }
    }

    debug!(room = %id, "room retired");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::peer::next_conn_id;

    fn peer(user: &str, capacity: usize) -> (Peer, mpsc::Receiver<Frame>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Peer::new(next_conn_id(), user, tx), rx)
    }

    #[tokio::test]
    async fn broadcast_reaches_every_member_in_order() {
        let room = RoomHandle::spawn("42");
        let (a, mut a_rx) = peer("a", 8);
        let (b, mut b_rx) = peer("b", 8);
        room.register(a).await;
        room.register(b).await;

        room.broadcast(Arc::from("one")).await;
        room.broadcast(Arc::from("two")).await;

        for rx in [&mut a_rx, &mut b_rx] {
            assert_eq!(&*rx.recv().await.unwrap(), "one");
            assert_eq!(&*rx.recv().await.unwrap(), "two");
        }
    }

    #[tokio::test]
    async fn unregister_is_idempotent() {
        let room = RoomHandle::spawn("42");
        let (a, mut a_rx) = peer("a", 8);
        let conn_id = a.conn_id;
        room.register(a).await;

        room.unregister(conn_id).await;
        room.unregister(conn_id).await;
        room.unregister(9999).await;
        room.broadcast(Arc::from("after")).await;

        assert!(room.members().await.is_empty());
        assert!(a_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn slow_member_does_not_block_others() {
        let room = RoomHandle::spawn("42");
        let (slow, _slow_rx) = peer("slow", 1);
        let (fast, mut fast_rx) = peer("fast", 8);
        room.register(slow).await;
        room.register(fast).await;

        for i in 0..4 {
            room.broadcast(Arc::from(format!("f{i}"))).await;
        }

        for i in 0..4 {
            assert_eq!(&*fast_rx.recv().await.unwrap(), format!("f{i}"));
        }
    }

    #[tokio::test]
    async fn members_lists_user_ids() {
        let room = RoomHandle::spawn("7");
        let (a, _a_rx) = peer("agent-1", 1);
        let (b, _b_rx) = peer("reporter-9", 1);
        room.register(a).await;
        room.register(b).await;
        assert_eq!(
            room.members().await,
            vec![Arc::<str>::from("agent-1"), Arc::from("reporter-9")]
        );
        assert_eq!(room.id(), "7");
    }
}
