//! Realtime channel: SSE subscription and client ping
//!
//! `GET /hubs/meeting` registers a hub connection for the lifetime of the
//! stream. The first event is `connected` with the connection id, which the
//! client passes back to `POST /hubs/meeting/ping`.

use axum::{
    extract::State,
    response::sse::{Event, Sse},
    routing::{get, post},
    Json, Router,
};
use futures::stream::Stream;
use meetnote_common::sse::{keep_alive, to_sse_event};
use meetnote_common::HubEvent;
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::AppState;

/// POST /hubs/meeting/ping request
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PingRequest {
    pub connection_id: Uuid,
    #[serde(default)]
    pub message: String,
}

/// POST /hubs/meeting/ping response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PingResponse {
    pub connection_id: Uuid,
    pub delivered: bool,
}

/// GET /hubs/meeting
///
/// Streams `connected`, then every `progress`, `result` and `failed` event
/// broadcast while the stream is open, plus `pong` replies for this client.
pub async fn meeting_stream(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let mut handle = state.hub.register();
    let connection_id = handle.id();
    info!(connection_id = %connection_id, "SSE client connected to meeting hub");

    let stream = async_stream::stream! {
        if let Some(frame) = to_sse_event(&HubEvent::connected(connection_id)) {
            yield Ok(frame);
        }

        // Ends when the hub drops the connection; dropping the stream drops
        // the handle, which unregisters it
        while let Some(event) = handle.recv().await {
            if let Some(frame) = to_sse_event(&event) {
                yield Ok(frame);
            }
        }

        debug!(connection_id = %connection_id, "SSE: meeting hub stream closed by hub");
    };

    Sse::new(stream).keep_alive(keep_alive(state.keep_alive))
}

/// POST /hubs/meeting/ping
///
/// Replies with a `pong` to the calling connection only.
pub async fn ping(
    State(state): State<AppState>,
    Json(request): Json<PingRequest>,
) -> ApiResult<Json<PingResponse>> {
    let delivered = state
        .hub
        .send_to_caller(request.connection_id, HubEvent::pong(request.message))
        .await;

    if !delivered {
        return Err(ApiError::NotFound(format!(
            "Connection {} is not live",
            request.connection_id
        )));
    }

    Ok(Json(PingResponse {
        connection_id: request.connection_id,
        delivered,
    }))
}

/// Build realtime routes
pub fn hub_routes() -> Router<AppState> {
    Router::new()
        .route("/hubs/meeting", get(meeting_stream))
        .route("/hubs/meeting/ping", post(ping))
}
