//! Server-Sent Events (SSE) utilities
//!
//! Framing of [`HubEvent`] records for the `text/event-stream` transport.

use axum::response::sse::{Event, KeepAlive};
use std::time::Duration;
use tracing::warn;

use crate::events::HubEvent;

/// Convert a hub event into an SSE frame
///
/// The `event:` field carries the event kind and `data:` the JSON record,
/// so browser clients can use `addEventListener("progress", ...)`.
/// Returns `None` (after logging) if the record cannot be serialized.
pub fn to_sse_event(event: &HubEvent) -> Option<Event> {
    match Event::default().event(event.event_type()).json_data(event) {
        Ok(frame) => Some(frame),
        Err(e) => {
            warn!("SSE: Failed to serialize event {}: {}", event.event_type(), e);
            None
        }
    }
}

/// Keep-alive comment configuration shared by all event streams
pub fn keep_alive(interval: Duration) -> KeepAlive {
    KeepAlive::new().interval(interval).text("heartbeat")
}
