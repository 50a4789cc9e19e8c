//! Reader API endpoints
//!
//! A session per open book: status, bounded page navigation, debounced
//! viewport updates, the current frame, and delayed close.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::{Deserialize, Serialize};

use crate::reader::{ContainerSize, NavTarget, SessionStatus};
use crate::state::AppState;

use super::{not_found, ApiError, ErrorResponse};

/// Request to open a reader
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenRequest {
    pub book_id: String,
}

/// Response for an opened reader
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenResponse {
    pub session_id: String,
}

/// Navigation request: absolute page or relative delta
#[derive(Deserialize)]
pub struct NavigateRequest {
    pub page: Option<u64>,
    pub delta: Option<i64>,
}

/// Current page after a navigation request
#[derive(Serialize)]
pub struct NavigateResponse {
    pub page: usize,
}

/// The current frame, base64-encoded for JSON transport
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameResponse {
    pub page: usize,
    /// Base64-encoded image data
    pub data: String,
    pub content_type: String,
    /// Backing raster dimensions in physical pixels
    pub width: u32,
    pub height: u32,
    /// Displayed dimensions in CSS pixels
    pub css_width: f32,
    pub css_height: f32,
    pub fit_scale: f32,
}

/// Create the reader router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(open_reader))
        .route("/:id", get(get_status).delete(close_reader))
        .route("/:id/page", post(navigate))
        .route("/:id/viewport", post(set_viewport))
        .route("/:id/frame", get(get_frame))
}

/// Open a reader session for a book
async fn open_reader(
    State(state): State<AppState>,
    Json(request): Json<OpenRequest>,
) -> Result<Json<OpenResponse>, ApiError> {
    let book = state
        .shelf()
        .get(&request.book_id)
        .await
        .ok_or_else(|| not_found("Book", &request.book_id))?;

    let session_id = state.sessions().open(&book).await;
    tracing::debug!("Opened reader session '{}' for '{}'", session_id, book.id);

    Ok(Json(OpenResponse { session_id }))
}

/// Session status snapshot
async fn get_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SessionStatus>, ApiError> {
    let status = state
        .sessions()
        .status(&id)
        .await
        .ok_or_else(|| not_found("Session", &id))?;

    Ok(Json(status))
}

/// Navigate to a page; out-of-range requests are silently ignored
async fn navigate(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<NavigateRequest>,
) -> Result<Json<NavigateResponse>, ApiError> {
    let target = match (request.page, request.delta) {
        (Some(page), _) => NavTarget::Page(page as usize),
        (None, Some(delta)) => NavTarget::Delta(delta),
        (None, None) => {
            return Err((
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse::new("Provide either 'page' or 'delta'")),
            ))
        }
    };

    let page = state
        .sessions()
        .navigate(&id, target)
        .await
        .ok_or_else(|| not_found("Session", &id))?;

    Ok(Json(NavigateResponse { page }))
}

/// Report the container size; re-renders are debounced
async fn set_viewport(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(container): Json<ContainerSize>,
) -> Result<StatusCode, ApiError> {
    if !state.sessions().set_viewport(&id, container).await {
        return Err(not_found("Session", &id));
    }

    Ok(StatusCode::NO_CONTENT)
}

/// The latest rendered frame; 204 while nothing has been rendered yet
async fn get_frame(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let frame = state
        .sessions()
        .frame(&id)
        .await
        .ok_or_else(|| not_found("Session", &id))?;

    let Some(frame) = frame else {
        return Ok(StatusCode::NO_CONTENT.into_response());
    };

    let response = FrameResponse {
        page: frame.page,
        data: BASE64.encode(&frame.data),
        content_type: frame.format.content_type().to_string(),
        width: frame.width,
        height: frame.height,
        css_width: frame.css_width,
        css_height: frame.css_height,
        fit_scale: frame.fit_scale,
    };

    Ok(Json(response).into_response())
}

/// Close a session after the fade-out delay
async fn close_reader(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    if !state.sessions().close(&id).await {
        return Err(not_found("Session", &id));
    }

    Ok(StatusCode::ACCEPTED)
}
