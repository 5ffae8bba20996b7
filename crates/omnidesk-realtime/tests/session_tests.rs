// SPDX-FileCopyrightText: 2026 Omnidesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Session behaviour driven through in-memory sockets.

use std::collections::VecDeque;
use std::time::Duration;

use axum::extract::ws::Message as WsMessage;
use futures::StreamExt;
use futures::channel::mpsc::{UnboundedReceiver, UnboundedSender, unbounded};
use omnidesk_realtime::{Broker, ClientParams, SessionSettings, run_client, run_listener};
use serde_json::{Value, json};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

const WAIT: Duration = Duration::from_secs(2);

struct TestSocket {
    to_server: Option<UnboundedSender<Result<WsMessage, String>>>,
    from_server: UnboundedReceiver<WsMessage>,
    pending: VecDeque<Value>,
    task: JoinHandle<()>,
}

impl TestSocket {
    fn client(broker: &Broker, user_id: &str, room_id: &str) -> Self {
        let (to_server, inbound) = unbounded();
        let (outbound, from_server) = unbounded();
        let params = ClientParams {
            user_id: user_id.to_string(),
            room_id: room_id.to_string(),
            sender_id: None,
            is_agent: true,
        };
        let task = tokio::spawn(run_client(
            inbound,
            outbound,
            broker.clone(),
            params,
            SessionSettings::default(),
        ));
        Self {
            to_server: Some(to_server),
            from_server,
            pending: VecDeque::new(),
            task,
        }
    }

    fn listener(broker: &Broker) -> Self {
        let (to_server, inbound) = unbounded();
        let (outbound, from_server) = unbounded();
        let task = tokio::spawn(run_listener(
            inbound,
            outbound,
            broker.clone(),
            SessionSettings::default(),
        ));
        Self {
            to_server: Some(to_server),
            from_server,
            pending: VecDeque::new(),
            task,
        }
    }

    fn send(&self, event: Value) {
        self.to_server
            .as_ref()
            .unwrap()
            .unbounded_send(Ok(WsMessage::Text(event.to_string().into())))
            .unwrap();
    }

    /// Next JSON event, splitting coalesced batches.
    async fn next_event(&mut self) -> Value {
        loop {
            if let Some(event) = self.pending.pop_front() {
                return event;
            }
            let frame = tokio::time::timeout(WAIT, self.from_server.next())
                .await
                .expect("timed out waiting for a frame")
                .expect("socket closed");
            if let WsMessage::Text(text) = frame {
                for line in text.as_str().split('\n') {
                    self.pending.push_back(serde_json::from_str(line).unwrap());
                }
            }
        }
    }

    async fn expect_silence(&mut self) {
        assert!(self.pending.is_empty());
        let next = tokio::time::timeout(Duration::from_millis(150), self.from_server.next()).await;
        assert!(next.is_err(), "unexpected frame: {next:?}");
    }

    async fn hang_up(mut self) {
        self.to_server.take();
        tokio::time::timeout(WAIT, self.task).await.unwrap().unwrap();
    }
}

#[tokio::test]
async fn messages_stay_inside_their_room() {
    let broker = Broker::spawn(CancellationToken::new());
    let mut a = TestSocket::client(&broker, "agent-1", "10");
    assert_eq!(a.next_event().await["message"], "WEBHOOK");
    let mut b = TestSocket::client(&broker, "reporter-7", "10");
    assert_eq!(b.next_event().await["message"], "OMNICHANNEL");
    let mut c = TestSocket::client(&broker, "agent-2", "20");
    assert_eq!(c.next_event().await["message"], "WEBHOOK");

    a.send(json!({"action": "send-message", "message": {"body": "hello"}}));

    for socket in [&mut a, &mut b] {
        let event = socket.next_event().await;
        assert_eq!(event["action"], "send-message");
        assert_eq!(event["message"]["body"], "hello");
        assert_eq!(event["sender"]["id"], "agent-1");
        assert_eq!(event["room"]["id"], "10");
    }
    c.expect_silence().await;
}

#[tokio::test]
async fn undecodable_events_are_dropped_not_fatal() {
    let broker = Broker::spawn(CancellationToken::new());
    let mut a = TestSocket::client(&broker, "agent-1", "10");
    a.next_event().await;

    a.to_server
        .as_ref()
        .unwrap()
        .unbounded_send(Ok(WsMessage::Text("not json".into())))
        .unwrap();
    a.send(json!({"action": "send-message", "message": "still here"}));

    assert_eq!(a.next_event().await["message"], "still here");
}

#[tokio::test]
async fn new_connection_for_same_user_evicts_old_one() {
    let broker = Broker::spawn(CancellationToken::new());
    let mut first = TestSocket::client(&broker, "agent-1", "10");
    first.next_event().await;

    let mut second = TestSocket::client(&broker, "agent-1", "10");

    let close = tokio::time::timeout(WAIT, first.from_server.next())
        .await
        .unwrap();
    assert!(matches!(close, Some(WsMessage::Close(None))));
    tokio::time::timeout(WAIT, &mut first.task).await.unwrap().unwrap();

    assert_eq!(second.next_event().await["action"], "room-joined");
    let snapshot = broker.snapshot().await.unwrap();
    assert_eq!(snapshot.clients, vec!["agent-1".to_string()]);
    assert_eq!(snapshot.rooms, vec!["10".to_string()]);
}

#[tokio::test]
async fn listener_sees_presence_changes() {
    let broker = Broker::spawn(CancellationToken::new());
    let mut listener = TestSocket::listener(&broker);

    let joined = listener.next_event().await;
    assert_eq!(joined["action"], "join-room");
    assert_eq!(joined["online"], json!([]));

    let mut client = TestSocket::client(&broker, "agent-1", "10");
    client.next_event().await;

    let user_join = listener.next_event().await;
    assert_eq!(user_join["action"], "user-join");
    assert_eq!(user_join["online"], json!([{"id": "10"}]));
    assert_eq!(user_join["online_user"], json!([{"id": "agent-1"}]));

    client.hang_up().await;
    let user_left = listener.next_event().await;
    assert_eq!(user_left["action"], "user-left");
    assert_eq!(user_left["online_user"], json!([]));

    // Listeners never receive room traffic.
    let mut other = TestSocket::client(&broker, "agent-2", "11");
    other.next_event().await;
    other.send(json!({"action": "send-message", "message": "hi"}));
    other.next_event().await;
    assert_eq!(listener.next_event().await["action"], "user-join");
    listener.expect_silence().await;
}

#[tokio::test]
async fn leaving_stops_room_traffic_and_empty_rooms_retire() {
    let broker = Broker::spawn(CancellationToken::new());
    let mut a = TestSocket::client(&broker, "agent-1", "30");
    a.next_event().await;
    let mut b = TestSocket::client(&broker, "reporter-1", "30");
    b.next_event().await;

    a.send(json!({"action": "leave-room"}));
    a.send(json!({"action": "send-message", "message": "ignored"}));
    tokio::time::sleep(Duration::from_millis(50)).await;

    b.send(json!({"action": "send-message", "message": "after leave"}));
    assert_eq!(b.next_event().await["message"], "after leave");
    a.expect_silence().await;

    b.hang_up().await;
    let snapshot = broker.snapshot().await.unwrap();
    assert!(snapshot.rooms.is_empty());
    assert_eq!(snapshot.clients, vec!["agent-1".to_string()]);
}

#[tokio::test]
async fn broker_shutdown_closes_sessions() {
    let cancel = CancellationToken::new();
    let broker = Broker::spawn(cancel.clone());
    let mut client = TestSocket::client(&broker, "agent-1", "10");
    client.next_event().await;

    cancel.cancel();
    let close = tokio::time::timeout(WAIT, client.from_server.next())
        .await
        .unwrap();
    assert!(matches!(close, Some(WsMessage::Close(None))));
    tokio::time::timeout(WAIT, client.task).await.unwrap().unwrap();
}
