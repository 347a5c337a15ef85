//! Server-sent events handler for live task output.

use std::pin::Pin;

use axum::extract::{Path, State};
use axum::response::sse::{Event, KeepAlive, KeepAliveStream, Sse};
use futures::future;
use futures::stream::{Stream, StreamExt};
use tokio_stream::wrappers::BroadcastStream;

use conveyor_events::TaskEvent;

use crate::error::AppResult;
use crate::state::AppState;

type EventStream = Pin<Box<dyn Stream<Item = Result<Event, axum::Error>> + Send>>;

/// GET /v1/stream/{id} -- stream a task's events as SSE.
///
/// Nothing is replayed: subscribers see chunks published after they connect,
/// then the stream closes once the `finished` event goes out. Connecting to
/// a task that already finished yields a single `finished` event.
pub async fn stream_task(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> AppResult<Sse<KeepAliveStream<EventStream>>> {
    // Subscribe before the status check so a terminal transition racing this
    // handler is seen on one side or the other.
    let rx = state.events.subscribe();
    let task = state.dispatcher.get(&id).await?;

    let stream: EventStream = if task.is_terminal() {
        let event = TaskEvent::finished(&task.id, task.status);
        Box::pin(futures::stream::once(async move { to_sse(event) }))
    } else {
        tracing::debug!(task_id = %id, "Stream subscriber attached");
        Box::pin(
            BroadcastStream::new(rx)
                // Drop other tasks' events and lag notices.
                .filter_map(move |msg| {
                    future::ready(match msg {
                        Ok(event) if event.task_id == id => Some(event),
                        _ => None,
                    })
                })
                // Pass the finished event through, then end the stream.
                .scan(false, |ended, event| {
                    if *ended {
                        return future::ready(None);
                    }
                    *ended = event.is_final();
                    future::ready(Some(event))
                })
                .map(to_sse),
        )
    };

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

fn to_sse(event: TaskEvent) -> Result<Event, axum::Error> {
    Event::default().json_data(&event)
}
