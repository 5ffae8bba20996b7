// SPDX-FileCopyrightText: 2026 Omnidesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Handle to one connected session's outbound buffer.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::protocol::Frame;

static NEXT_CONN_ID: AtomicU64 = AtomicU64::new(1);

/// Allocate a process-unique connection id.
pub fn next_conn_id() -> u64 {
    NEXT_CONN_ID.fetch_add(1, Ordering::Relaxed)
}

/// What the Broker and Rooms hold for each connected session.
///
/// `shutdown` asks the session to close; `closed` is cancelled by the
/// session once its disconnect sequence has finished.
#[derive(Debug, Clone)]
pub struct Peer {
    pub conn_id: u64,
    pub user_id: Arc<str>,
    tx: mpsc::Sender<Frame>,
    shutdown: CancellationToken,
    closed: CancellationToken,
}

impl Peer {
    pub fn new(conn_id: u64, user_id: impl Into<Arc<str>>, tx: mpsc::Sender<Frame>) -> Self {
        Self {
            conn_id,
            user_id: user_id.into(),
            tx,
            shutdown: CancellationToken::new(),
            closed: CancellationToken::new(),
        }
    }

    /// Queue a frame without waiting. A full buffer drops the frame.
    pub fn deliver(&self, frame: &Frame) -> bool {
        match self.tx.try_send(Arc::clone(frame)) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                omnidesk_prometheus::record_frame_dropped();
                warn!(
                    conn_id = self.conn_id,
                    user_id = %self.user_id,
                    "outbound buffer full, frame dropped"
                );
                false
            }
            Err(TrySendError::Closed(_)) => {
                debug!(conn_id = self.conn_id, "outbound buffer closed");
                false
            }
        }
    }

    /// Ask the session to disconnect.
    pub fn shut_down(&self) {
        self.shutdown.cancel();
    }

    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Token cancelled once the session has fully disconnected.
    pub fn closed_token(&self) -> CancellationToken {
        self.closed.clone()
    }

    pub(crate) fn mark_closed(&self) {
        self.closed.cancel();
    }
}
