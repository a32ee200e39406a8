//! Route handlers: lifecycle commands, status reads, and the two SSE feeds.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, KeepAliveStream, Sse};
use axum::response::{IntoResponse, Response};
use axum::Json;
use futures::stream::{self, Stream, StreamExt};
use serde::Serialize;
use serde_json::json;
use tokio::time::interval;
use tracing::warn;

use super::AppState;
use crate::error::Error;
use crate::telemetry::{LogEntry, MetricsSnapshot, TelemetryStore};

/// Cadence of the coalescing log push. Only the newest entry at tick time is
/// delivered; entries superseded within one tick are never sent.
const LOG_PUSH_PERIOD: Duration = Duration::from_millis(200);
/// Cadence of the unconditional metrics push.
const METRICS_PUSH_PERIOD: Duration = Duration::from_millis(1000);

const SSE_KEEP_ALIVE: Duration = Duration::from_secs(30);

#[derive(Debug, Serialize)]
pub struct CommandResponse {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub async fn status(State(state): State<AppState>) -> Response {
    match state.supervisor.status().await {
        Some(status) => Json(status).into_response(),
        None => Json(json!({ "running": false })).into_response(),
    }
}

pub async fn start(State(state): State<AppState>) -> Json<CommandResponse> {
    match state.supervisor.start().await {
        Ok(()) => Json(CommandResponse {
            ok: true,
            error: None,
        }),
        Err(err) => Json(CommandResponse {
            ok: false,
            error: Some(err.to_string()),
        }),
    }
}

pub async fn stop(State(state): State<AppState>) -> Response {
    match state.supervisor.stop().await {
        Ok(()) => Json(CommandResponse {
            ok: true,
            error: None,
        })
        .into_response(),
        Err(err @ Error::NotRunning) => (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": err.to_string() })),
        )
            .into_response(),
        Err(err) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": err.to_string() })),
        )
            .into_response(),
    }
}

pub async fn logs_stream(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let entries = log_entries(Arc::clone(&state.store), LOG_PUSH_PERIOD).await;
    let stream = entries.filter_map(|entry| async move {
        match serde_json::to_string(&entry) {
            Ok(data) => Some(Ok::<_, Infallible>(Event::default().data(data))),
            Err(err) => {
                warn!(%err, "failed to encode log entry");
                None
            }
        }
    });
    sse(stream)
}

pub async fn metrics_stream(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let stream = metrics_snapshots(Arc::clone(&state.store), METRICS_PUSH_PERIOD).filter_map(
        |snapshot| async move {
            match serde_json::to_string(&snapshot) {
                Ok(data) => Some(Ok::<_, Infallible>(Event::default().data(data))),
                Err(err) => {
                    warn!(%err, "failed to encode metrics snapshot");
                    None
                }
            }
        },
    );
    sse(stream)
}

fn sse<S>(stream: S) -> Sse<KeepAliveStream<S>>
where
    S: Stream<Item = Result<Event, Infallible>> + Send + 'static,
{
    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(SSE_KEEP_ALIVE)
            .text("keep-alive"),
    )
}

/// Per-connection coalescing feed over the log history.
///
/// On every tick, yields the newest entry iff its timestamp differs from the
/// last one this connection saw. The cursor starts at the latest entry
/// present at connect time, so observers receive only entries produced after
/// they connect (no backfill).
pub(crate) async fn log_entries(
    store: Arc<TelemetryStore>,
    period: Duration,
) -> impl Stream<Item = LogEntry> {
    let cursor = store.latest().await.map(|entry| entry.ts);
    let ticker = interval(period);
    stream::unfold(
        (store, ticker, cursor),
        |(store, mut ticker, mut cursor)| async move {
            loop {
                ticker.tick().await;
                let Some(latest) = store.latest().await else {
                    continue;
                };
                if Some(latest.ts) != cursor {
                    cursor = Some(latest.ts);
                    return Some((latest, (store, ticker, cursor)));
                }
            }
        },
    )
}

/// Per-connection metrics feed: one full counter snapshot per tick,
/// unconditionally.
pub(crate) fn metrics_snapshots(
    store: Arc<TelemetryStore>,
    period: Duration,
) -> impl Stream<Item = MetricsSnapshot> {
    let ticker = interval(period);
    stream::unfold((store, ticker), |(store, mut ticker)| async move {
        ticker.tick().await;
        let snapshot = store.snapshot_metrics().await;
        Some((snapshot, (store, ticker)))
    })
}
