//! Health check

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use crate::ocr::{AdapterStatus, OcrProvider};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/v1/health", get(health_check))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    engine: OcrProvider,
    engine_status: AdapterStatus,
    active_jobs: usize,
}

async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        engine: state.adapter().provider(),
        engine_status: state.adapter().status().await,
        active_jobs: state.jobs().active_jobs(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ocr::engine::testing::FakeEngine;
    use crate::routes::testing::{test_server, test_state};

    #[tokio::test]
    async fn test_health() {
        let server = test_server(test_state(FakeEngine::new("x"), 1));
        let response = server.get("/health").await;
        response.assert_status_ok();

        let body: serde_json::Value = response.json();
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["engine"], "tesseract");
        assert_eq!(body["engineStatus"]["state"], "uninitialized");
    }
}
