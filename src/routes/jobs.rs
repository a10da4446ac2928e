//! Extraction job routes

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::jobs::{JobRecord, JobStatus, SubmitJob};
use crate::ocr::ProcessingOptions;
use crate::pages::{parse_page_ranges, SelectionResult};
use crate::pipeline::ValidationError;
use crate::state::AppState;

/// Create the jobs router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_job).get(list_jobs))
        .route("/:id", get(get_job))
        .route("/:id/cancel", post(cancel_job))
        .route("/:id/pages", get(job_pages))
}

/// New job; the document travels base64 encoded
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateJobRequest {
    pub owner_id: String,
    pub file_name: String,
    /// Base64 document content
    pub data: String,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub options: ProcessingOptions,
    /// Page numbers, e.g. `[1, 3, 4]`
    #[serde(default)]
    pub selected_pages: Option<Vec<u32>>,
    /// Range string, e.g. `1,3-4`; ignored when `selectedPages` is set
    #[serde(default)]
    pub page_range: Option<String>,
}

async fn create_job(
    State(state): State<AppState>,
    Json(request): Json<CreateJobRequest>,
) -> Result<(StatusCode, Json<JobRecord>)> {
    let data = STANDARD
        .decode(request.data.trim())
        .map_err(|e| AppError::BadRequest(format!("Invalid base64 document: {}", e)))?;

    let selected_pages = match (request.selected_pages, request.page_range) {
        (Some(pages), _) => Some(pages),
        (None, Some(range)) => Some(parse_page_ranges(&range)),
        (None, None) => None,
    };

    let job = state
        .jobs()
        .submit(SubmitJob {
            owner_id: request.owner_id,
            file_name: request.file_name,
            data,
            language: request.language,
            options: request.options,
            selected_pages,
        })
        .await?;

    Ok((StatusCode::ACCEPTED, Json(job)))
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub owner: String,
}

async fn list_jobs(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<JobRecord>>> {
    Ok(Json(state.jobs().list(&query.owner).await?))
}

async fn get_job(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<JobRecord>> {
    Ok(Json(state.jobs().get(id).await?))
}

async fn cancel_job(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<JobRecord>> {
    Ok(Json(state.jobs().cancel(id).await?))
}

#[derive(Debug, Deserialize)]
pub struct PagesQuery {
    /// e.g. `1-3,5`; every page when absent
    #[serde(default)]
    pub pages: Option<String>,
}

/// Pages of a completed job
async fn job_pages(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<PagesQuery>,
) -> Result<Json<SelectionResult>> {
    let job = state.jobs().get(id).await?;
    let result = match (&job.status, &job.result) {
        (JobStatus::Completed, Some(result)) => result,
        _ => {
            return Err(AppError::Conflict(format!(
                "Job {} has no result ({:?})",
                id, job.status
            )))
        }
    };

    let cache_key = id.to_string();
    let selection = state.selection();
    let pages = match query.pages.as_deref().map(str::trim).filter(|p| !p.is_empty()) {
        Some(range) => {
            let pages = parse_page_ranges(range);
            if pages.is_empty() {
                return Err(ValidationError::NoPagesSelected.into());
            }
            let validation =
                selection.validate_page_selection(&result.text, &pages, Some(&cache_key));
            if !validation.is_valid() {
                return Err(ValidationError::InvalidPages(validation.invalid).into());
            }
            pages
        }
        None => selection.available_pages(&result.text, Some(&cache_key)),
    };

    Ok(Json(selection.extract_selected_pages(
        &result.text,
        &pages,
        Some(&cache_key),
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::testing::blank_png;
    use crate::ocr::engine::testing::FakeEngine;
    use crate::routes::testing::{test_server, test_state};
    use axum_test::TestServer;
    use base64::Engine as _;
    use serde_json::{json, Value};
    use tokio::time::{sleep, Duration};

    async fn wait_for_terminal(server: &TestServer, id: &str) -> Value {
        for _ in 0..500 {
            let job: Value = server.get(&format!("/api/v1/jobs/{}", id)).await.json();
            let status = job["status"].as_str().unwrap_or_default().to_string();
            if ["completed", "failed", "cancelled"].contains(&status.as_str()) {
                return job;
            }
            sleep(Duration::from_millis(10)).await;
        }
        panic!("job {id} did not finish");
    }

    fn pdf_body() -> Value {
        json!({
            "ownerId": "alice",
            "fileName": "scan.pdf",
            "data": STANDARD.encode(b"%PDF-1.4 stub"),
        })
    }

    #[tokio::test]
    async fn test_job_lifecycle_and_pages() {
        let server = test_server(test_state(FakeEngine::new("two words"), 3));

        let response = server.post("/api/v1/jobs").json(&pdf_body()).await;
        response.assert_status(StatusCode::ACCEPTED);
        let created: Value = response.json();
        assert_eq!(created["status"], "pending");
        let id = created["id"].as_str().unwrap().to_string();

        let done = wait_for_terminal(&server, &id).await;
        assert_eq!(done["status"], "completed");
        assert_eq!(done["progress"], 100);
        assert_eq!(done["result"]["strategy"], "rasterized_recognition");

        let selection: Value = server
            .get(&format!("/api/v1/jobs/{}/pages", id))
            .add_query_param("pages", "1-2")
            .await
            .json();
        assert_eq!(selection["pageRange"], "1, 2");
        assert_eq!(selection["totalWordCount"], 4);
        assert_eq!(selection["documentStats"]["totalPages"], 3);

        let response = server
            .get(&format!("/api/v1/jobs/{}/pages", id))
            .add_query_param("pages", "2,9")
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
        let error: Value = response.json();
        assert_eq!(error["error"], "invalid_pages");
        assert_eq!(error["details"]["invalidPages"], json!([9]));

        let listed: Value = server
            .get("/api/v1/jobs")
            .add_query_param("owner", "alice")
            .await
            .json();
        assert_eq!(listed.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_rejects_bad_uploads() {
        let server = test_server(test_state(FakeEngine::new("x"), 1));

        let response = server
            .post("/api/v1/jobs")
            .json(&json!({ "ownerId": "a", "fileName": "a.png", "data": "%%%" }))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);

        let response = server
            .post("/api/v1/jobs")
            .json(&json!({
                "ownerId": "a",
                "fileName": "notes.txt",
                "data": STANDARD.encode(b"plain text, not a document"),
            }))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
        let error: Value = response.json();
        assert_eq!(error["error"], "validation_error");

        let mut body = pdf_body();
        body["pageRange"] = json!("2-4");
        let response = server.post("/api/v1/jobs").json(&body).await;
        response.assert_status(StatusCode::BAD_REQUEST);

        let mut body = json!({
            "ownerId": "a",
            "fileName": "a.png",
            "data": STANDARD.encode(blank_png(4, 4)),
        });
        body["options"] = json!({ "brightness": 250 });
        let response = server.post("/api/v1/jobs").json(&body).await;
        response.assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_unknown_job() {
        let server = test_server(test_state(FakeEngine::new("x"), 1));
        let response = server
            .get(&format!("/api/v1/jobs/{}", Uuid::new_v4()))
            .await;
        response.assert_status(StatusCode::NOT_FOUND);

        let response = server
            .post(&format!("/api/v1/jobs/{}/cancel", Uuid::new_v4()))
            .await;
        response.assert_status(StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_cancel_finished_job_conflicts() {
        let server = test_server(test_state(FakeEngine::new("x"), 1));
        let body = json!({
            "ownerId": "a",
            "fileName": "a.png",
            "data": STANDARD.encode(blank_png(4, 4)),
        });
        let created: Value = server.post("/api/v1/jobs").json(&body).await.json();
        let id = created["id"].as_str().unwrap().to_string();
        wait_for_terminal(&server, &id).await;

        let response = server.post(&format!("/api/v1/jobs/{}/cancel", id)).await;
        response.assert_status(StatusCode::CONFLICT);
    }
}
