//! Recognition queue inspection

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use crate::ocr::{AdapterStatus, QueueStats};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(queue_status).delete(clear_queue))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct QueueStatusResponse {
    #[serde(flatten)]
    stats: QueueStats,
    engine_status: AdapterStatus,
}

#[derive(Serialize)]
struct ClearedResponse {
    cleared: usize,
}

async fn queue_status(State(state): State<AppState>) -> Json<QueueStatusResponse> {
    Json(QueueStatusResponse {
        stats: state.queue().stats(),
        engine_status: state.adapter().status().await,
    })
}

/// Drop pending recognitions; in-flight work finishes
async fn clear_queue(State(state): State<AppState>) -> Json<ClearedResponse> {
    let cleared = state.queue().clear_queue();
    tracing::info!(cleared, "Recognition queue cleared");
    Json(ClearedResponse { cleared })
}
