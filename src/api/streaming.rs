//! Streaming API endpoints
//!
//! Pushes every published dashboard view via Server-Sent Events (SSE)

use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
};
use futures::stream::Stream;
use std::convert::Infallible;
use tokio_stream::{StreamExt as _, wrappers::WatchStream};

use crate::AppState;
use crate::auth::AdminUser;

/// GET /admin/dashboard/stream
///
/// The first event is the current view. Intermediate views may be skipped
/// when the client reads slower than the dashboard publishes.
pub async fn stream_dashboard(
    State(state): State<AppState>,
    AdminUser(session): AdminUser,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let handle = state.registry.get_or_start(&session).await;
    tracing::debug!(uid = %session.uid, "Dashboard stream opened");

    let stream = WatchStream::new(handle.subscribe()).map(|view| {
        let event = Event::default().event("view");
        Ok(match event.json_data(&view) {
            Ok(event) => event,
            Err(error) => {
                tracing::error!(%error, "Failed to encode dashboard view");
                Event::default().event("error").data("encode failed")
            }
        })
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}
