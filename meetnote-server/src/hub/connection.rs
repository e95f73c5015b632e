//! Live client connections owned by the hub

use chrono::{DateTime, Utc};
use meetnote_common::HubEvent;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::mpsc::{self, error::SendTimeoutError, error::TrySendError};
use uuid::Uuid;

use super::BroadcastHub;

/// Opaque connection identifier
pub type ConnectionId = Uuid;

/// Outcome of handing one event to one connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Delivery {
    /// Event queued for the client
    Accepted,
    /// Client side is gone
    Closed,
    /// Queue stayed full for the whole grace period
    TimedOut,
}

/// Hub-side half of a connection: a bounded queue towards the transport loop
pub(crate) struct Connection {
    pub(crate) id: ConnectionId,
    pub(crate) opened_at: DateTime<Utc>,
    tx: mpsc::Sender<HubEvent>,
    open: AtomicBool,
}

impl Connection {
    pub(crate) fn new(id: ConnectionId, tx: mpsc::Sender<HubEvent>) -> Self {
        Self {
            id,
            opened_at: Utc::now(),
            tx,
            open: AtomicBool::new(true),
        }
    }

    /// Open and still attached to a receiver
    pub(crate) fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire) && !self.tx.is_closed()
    }

    /// Mark closed so concurrent broadcasts skip it before it is removed
    pub(crate) fn close(&self) {
        self.open.store(false, Ordering::Release);
    }

    /// Queue an event, waiting at most `grace` for room
    pub(crate) async fn deliver(&self, event: HubEvent, grace: Duration) -> Delivery {
        match self.tx.try_send(event) {
            Ok(()) => Delivery::Accepted,
            Err(TrySendError::Closed(_)) => Delivery::Closed,
            Err(TrySendError::Full(event)) => match self.tx.send_timeout(event, grace).await {
                Ok(()) => Delivery::Accepted,
                Err(SendTimeoutError::Closed(_)) => Delivery::Closed,
                Err(SendTimeoutError::Timeout(_)) => Delivery::TimedOut,
            },
        }
    }
}

/// Client-side half of a connection, returned by [`BroadcastHub::register`]
///
/// Dropping the handle unregisters the connection.
pub struct ConnectionHandle {
    id: ConnectionId,
    rx: mpsc::Receiver<HubEvent>,
    hub: BroadcastHub,
}

impl ConnectionHandle {
    pub(crate) fn new(id: ConnectionId, rx: mpsc::Receiver<HubEvent>, hub: BroadcastHub) -> Self {
        Self { id, rx, hub }
    }

    /// Identifier used for `unregister` and `send_to_caller`
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Wait for the next event; `None` once the hub has dropped the connection
    pub async fn recv(&mut self) -> Option<HubEvent> {
        self.rx.recv().await
    }

    /// Take the next queued event without waiting
    pub fn try_recv(&mut self) -> Option<HubEvent> {
        self.rx.try_recv().ok()
    }
}

impl Drop for ConnectionHandle {
    fn drop(&mut self) {
        self.hub.unregister(self.id);
    }
}

impl std::fmt::Debug for ConnectionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionHandle").field("id", &self.id).finish()
    }
}
