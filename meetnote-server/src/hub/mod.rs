//! Broadcast hub: registry of live realtime connections and event fan-out
//!
//! Each connection owns a bounded queue drained by its transport loop (the
//! SSE stream). Publishers never touch a connection directly; they call
//! [`BroadcastHub::broadcast`], which snapshots the live set and hands the
//! event to every member concurrently. A member whose queue stays full for
//! longer than the send grace period is treated as disconnected and removed.
//!
//! Delivery to one connection never blocks or fails delivery to another,
//! and no failure is ever reported back to the publisher.

mod connection;

pub use connection::{ConnectionHandle, ConnectionId};

use chrono::Utc;
use connection::{Connection, Delivery};
use futures::future::join_all;
use meetnote_common::HubEvent;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Default per-connection queue length
pub const DEFAULT_QUEUE_CAPACITY: usize = 64;

/// Default time a broadcast waits on a full connection queue
pub const DEFAULT_SEND_GRACE: Duration = Duration::from_millis(500);

/// Hub tuning
#[derive(Debug, Clone, Copy)]
pub struct HubConfig {
    /// Events buffered per connection before it counts as slow
    pub queue_capacity: usize,
    /// How long a send may wait for room in a full queue
    pub send_grace: Duration,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            send_grace: DEFAULT_SEND_GRACE,
        }
    }
}

struct HubShared {
    connections: RwLock<HashMap<ConnectionId, Arc<Connection>>>,
    config: HubConfig,
}

/// Process-wide broadcast hub
///
/// Cheap to clone; all clones share the same live connection set. Constructed
/// once at startup and handed to every component that publishes or subscribes.
#[derive(Clone)]
pub struct BroadcastHub {
    shared: Arc<HubShared>,
}

impl BroadcastHub {
    /// Create a hub with no connections
    pub fn new(config: HubConfig) -> Self {
        let config = HubConfig {
            queue_capacity: config.queue_capacity.max(1),
            ..config
        };
        info!(
            queue_capacity = config.queue_capacity,
            send_grace_ms = config.send_grace.as_millis() as u64,
            "Broadcast hub initialized"
        );
        Self {
            shared: Arc::new(HubShared {
                connections: RwLock::new(HashMap::new()),
                config,
            }),
        }
    }

    /// Add a new connection to the live set
    ///
    /// The connection is fully constructed before it becomes visible, so a
    /// concurrent broadcast either sees all of it or none of it.
    pub fn register(&self) -> ConnectionHandle {
        let (tx, rx) = mpsc::channel(self.shared.config.queue_capacity);
        let id = Uuid::new_v4();
        let connection = Arc::new(Connection::new(id, tx));

        let live = {
            let mut connections = self
                .shared
                .connections
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            connections.insert(id, connection);
            connections.len()
        };

        info!(connection_id = %id, live, "Hub connection registered");
        ConnectionHandle::new(id, rx, self.clone())
    }

    /// Remove a connection; unknown or already-removed ids are a no-op
    ///
    /// Returns whether a connection was removed.
    pub fn unregister(&self, id: ConnectionId) -> bool {
        let (removed, live) = {
            let mut connections = self
                .shared
                .connections
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            let removed = connections.remove(&id);
            (removed, connections.len())
        };

        match removed {
            Some(connection) => {
                connection.close();
                let open_secs = (Utc::now() - connection.opened_at).num_seconds().max(0);
                info!(connection_id = %id, live, open_secs, "Hub connection unregistered");
                true
            }
            None => {
                debug!(connection_id = %id, "Unregister for unknown connection ignored");
                false
            }
        }
    }

    /// Deliver an event to every connection live at the moment of the call
    ///
    /// Returns the number of connections that accepted the event. Completes
    /// within the send grace period regardless of how slow any one
    /// connection is; connections that fail are unregistered.
    pub async fn broadcast(&self, event: HubEvent) -> usize {
        let recipients = self.snapshot();
        if recipients.is_empty() {
            debug!(event_type = event.event_type(), "Broadcast with no live connections");
            return 0;
        }

        let grace = self.shared.config.send_grace;
        let outcomes = join_all(
            recipients
                .iter()
                .map(|connection| connection.deliver(event.clone(), grace)),
        )
        .await;

        let mut delivered = 0;
        for (connection, outcome) in recipients.iter().zip(outcomes) {
            match outcome {
                Delivery::Accepted => delivered += 1,
                failed => self.drop_connection(connection, failed),
            }
        }

        debug!(
            event_type = event.event_type(),
            recipients = recipients.len(),
            delivered,
            "Broadcast event"
        );
        delivered
    }

    /// Deliver an event to exactly one connection
    ///
    /// Returns false if the connection is not live or could not accept the
    /// event (in which case it is unregistered).
    pub async fn send_to_caller(&self, id: ConnectionId, event: HubEvent) -> bool {
        let connection = {
            let connections = self
                .shared
                .connections
                .read()
                .unwrap_or_else(PoisonError::into_inner);
            connections.get(&id).filter(|c| c.is_open()).cloned()
        };

        let Some(connection) = connection else {
            debug!(connection_id = %id, event_type = event.event_type(), "Send to unknown connection");
            return false;
        };

        match connection
            .deliver(event, self.shared.config.send_grace)
            .await
        {
            Delivery::Accepted => true,
            failed => {
                self.drop_connection(&connection, failed);
                false
            }
        }
    }

    /// Number of live connections
    pub fn connection_count(&self) -> usize {
        self.shared
            .connections
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether a connection is currently live
    pub fn is_connected(&self, id: ConnectionId) -> bool {
        self.shared
            .connections
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .is_some_and(|c| c.is_open())
    }

    /// Drop every live connection, ending each subscriber's stream
    ///
    /// Used at shutdown so long-lived SSE responses complete. Returns the
    /// number of connections closed.
    pub fn close_all(&self) -> usize {
        let drained: Vec<Arc<Connection>> = {
            let mut connections = self
                .shared
                .connections
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            connections.drain().map(|(_, connection)| connection).collect()
        };

        for connection in &drained {
            connection.close();
        }
        info!(closed = drained.len(), "Hub closed all connections");
        drained.len()
    }

    /// Hub tuning in effect
    pub fn config(&self) -> HubConfig {
        self.shared.config
    }

    /// Open connections at this instant; the lock is released before any send
    fn snapshot(&self) -> Vec<Arc<Connection>> {
        self.shared
            .connections
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|c| c.is_open())
            .cloned()
            .collect()
    }

    fn drop_connection(&self, connection: &Connection, reason: Delivery) {
        connection.close();
        match reason {
            Delivery::TimedOut => warn!(
                connection_id = %connection.id,
                "Connection did not accept event within grace period, dropping"
            ),
            _ => debug!(connection_id = %connection.id, "Connection closed by client, dropping"),
        }
        self.unregister(connection.id);
    }
}

impl Default for BroadcastHub {
    fn default() -> Self {
        Self::new(HubConfig::default())
    }
}
