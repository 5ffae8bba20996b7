// SPDX-FileCopyrightText: 2026 Omnidesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Real-time layer for the Omnidesk service.
//!
//! A single [`Broker`] task owns the client, listener and room directories;
//! each [`RoomHandle`] runs its own task for per-interaction fan-out.
//! Sessions ([`run_client`], [`run_listener`]) pump frames between a socket
//! and those actors, and [`WsNotifier`] lets request handlers publish
//! persisted messages into rooms without touching the socket layer.

pub mod broker;
pub mod notifier;
pub mod peer;
pub mod protocol;
pub mod room;
pub mod session;

pub use broker::{Broker, BrokerSnapshot};
pub use notifier::{NotifierSettings, WsNotifier, dial_url};
pub use peer::Peer;
pub use protocol::{Frame, Member, Presence, RoomEvent, RoomOrigin};
pub use room::RoomHandle;
pub use session::{ClientParams, SessionSettings, run_client, run_listener};

/// The broker task has stopped; no further sessions can register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("realtime broker has shut down")]
pub struct BrokerClosed;
