//! Page selection over caller-supplied packed text

use axum::{extract::State, routing::post, Json, Router};
use serde::Deserialize;

use crate::error::Result;
use crate::pages::{PageValidation, SelectionResult};
use crate::pipeline::ValidationError;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/select", post(select_pages))
        .route("/validate", post(validate_pages))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageSelectionRequest {
    /// Packed text with page markers, or plain text
    pub text: String,
    pub pages: Vec<u32>,
    /// Memoization key for repeated selections over the same text
    #[serde(default)]
    pub cache_key: Option<String>,
}

async fn select_pages(
    State(state): State<AppState>,
    Json(request): Json<PageSelectionRequest>,
) -> Result<Json<SelectionResult>> {
    let selection = state.selection();
    let cache_key = request.cache_key.as_deref();

    let validation = selection.validate_page_selection(&request.text, &request.pages, cache_key);
    if !validation.is_valid() {
        return Err(ValidationError::InvalidPages(validation.invalid).into());
    }

    Ok(Json(selection.extract_selected_pages(
        &request.text,
        &request.pages,
        cache_key,
    )))
}

async fn validate_pages(
    State(state): State<AppState>,
    Json(request): Json<PageSelectionRequest>,
) -> Json<PageValidation> {
    Json(state.selection().validate_page_selection(
        &request.text,
        &request.pages,
        request.cache_key.as_deref(),
    ))
}
