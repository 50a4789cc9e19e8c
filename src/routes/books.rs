//! Book API endpoints
//!
//! - List books with cover data URLs
//! - Upload PDFs (multipart, multiple files per request)
//! - Get and delete books
//! - Serve generated cover thumbnails

use std::collections::HashSet;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::{header, StatusCode},
    response::Response,
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::Serialize;
use uuid::Uuid;

use crate::document::{generate_cover, CoverImage, DocumentError};
use crate::shelf::{title_from_filename, Book, BookSource};
use crate::state::AppState;

use super::{not_found, ApiError, ErrorResponse};

/// Response for the book list
#[derive(Serialize)]
pub struct BookListResponse {
    pub books: Vec<BookSummary>,
    pub total: usize,
}

/// Summary of a book for the gallery
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookSummary {
    pub id: String,
    pub title: String,
    pub page_count: Option<usize>,
    /// Cover as a data URL once one has been generated
    pub cover_url: Option<String>,
}

/// Full book details
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookDetailResponse {
    pub id: String,
    pub title: String,
    pub author: Option<String>,
    pub page_count: Option<usize>,
    pub cover_url: Option<String>,
    pub source: &'static str,
    pub added_at: DateTime<Utc>,
}

/// One accepted upload
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedBook {
    pub id: String,
    pub title: String,
    pub page_count: usize,
}

/// One rejected upload
#[derive(Serialize)]
pub struct UploadError {
    pub filename: String,
    pub error: String,
}

/// Upload response
#[derive(Serialize)]
pub struct UploadResponse {
    pub books: Vec<UploadedBook>,
    pub errors: Vec<UploadError>,
}

/// Create the books router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_books).post(upload_books))
        .route("/:id", get(get_book).delete(delete_book))
        .route("/:id/cover", get(get_cover))
        // Allow up to 100MB uploads
        .layer(DefaultBodyLimit::max(100 * 1024 * 1024))
}

fn summarize(book: &Book) -> BookSummary {
    BookSummary {
        id: book.id.clone(),
        title: book.title.clone(),
        page_count: book.page_count,
        cover_url: book.cover_url(),
    }
}

/// List all books on the shelf
async fn list_books(State(state): State<AppState>) -> Json<BookListResponse> {
    let books = state.shelf().list().await;
    let summaries: Vec<BookSummary> = books.iter().map(summarize).collect();
    let total = summaries.len();

    Json(BookListResponse {
        books: summaries,
        total,
    })
}

/// Upload PDFs
///
/// Accepts multiple files per request; each valid PDF becomes one book
/// titled after its filename with the `.pdf` suffix stripped. Invalid
/// files are reported per entry without failing the batch.
async fn upload_books(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    tracing::debug!("Starting book upload processing");

    let mut received: Vec<(String, Vec<u8>)> = Vec::new();
    let mut errors: Vec<UploadError> = Vec::new();

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        tracing::error!("Failed to read multipart field: {}", e);
        (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::with_details(
                "Failed to read upload",
                e.to_string(),
            )),
        )
    })? {
        let name = field.name().unwrap_or("").to_string();
        let filename = field
            .file_name()
            .map(|s| s.to_string())
            .unwrap_or_else(|| "unknown.pdf".to_string());
        let content_type = field.content_type().map(|s| s.to_string());

        tracing::debug!(
            "Received field: name='{}', filename='{}', content_type={:?}",
            name,
            filename,
            content_type
        );

        // The picker is restricted to PDFs; enforce the same here.
        let is_pdf = content_type.as_deref() == Some("application/pdf")
            || filename.to_ascii_lowercase().ends_with(".pdf");
        if !is_pdf {
            errors.push(UploadError {
                filename,
                error: "Only application/pdf uploads are accepted".to_string(),
            });
            continue;
        }

        let data = field.bytes().await.map_err(|e| {
            tracing::error!("Failed to read file data: {}", e);
            (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse::with_details(
                    "Failed to read file data",
                    e.to_string(),
                )),
            )
        })?;

        received.push((filename, data.to_vec()));
    }

    if received.is_empty() && errors.is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::new("No file provided. Use a 'file' field")),
        ));
    }

    // Assign unique ids up front so same-named files in one batch cannot
    // clobber each other once the parses run concurrently
    let mut assigned: HashSet<String> = HashSet::new();
    let mut prepared = Vec::with_capacity(received.len());
    for (filename, data) in received {
        let title = title_from_filename(&filename);
        let mut id = title.clone();
        if id.is_empty() || assigned.contains(&id) || state.shelf().contains(&id).await {
            id = format!("{}-{}", id, Uuid::new_v4());
        }
        assigned.insert(id.clone());
        prepared.push((id, title, filename, data));
    }

    // Validate every file through the engine concurrently
    let uploads = prepared.into_iter().map(|(id, title, filename, data)| {
        let state = state.clone();
        async move {
            match state.documents().open(&id, data.clone()).await {
                Ok(handle) => {
                    let page_count = handle.page_count();
                    let mut book = Book::new(id.clone(), title.clone(), BookSource::from_upload(data));
                    book.page_count = Some(page_count);
                    state.shelf().insert(book).await;
                    tracing::info!("Book uploaded: '{}' with {} pages", id, page_count);
                    Ok(UploadedBook {
                        id,
                        title,
                        page_count,
                    })
                }
                Err(e) => {
                    tracing::error!("Failed to parse upload '{}': {}", filename, e);
                    Err(UploadError {
                        filename,
                        error: e.to_string(),
                    })
                }
            }
        }
    });

    let mut books = Vec::new();
    for result in join_all(uploads).await {
        match result {
            Ok(book) => books.push(book),
            Err(error) => errors.push(error),
        }
    }

    Ok(Json(UploadResponse { books, errors }))
}

/// Get book details by id
async fn get_book(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<BookDetailResponse>, ApiError> {
    let book = state
        .shelf()
        .get(&id)
        .await
        .ok_or_else(|| not_found("Book", &id))?;

    // Author comes from the document info dictionary when it is open
    let author = match state.documents().get(&id).await {
        Some(handle) => {
            tokio::task::spawn_blocking(move || handle.info().author)
                .await
                .unwrap_or(None)
        }
        None => None,
    };

    Ok(Json(BookDetailResponse {
        id: book.id.clone(),
        title: book.title.clone(),
        author,
        page_count: book.page_count,
        cover_url: book.cover_url(),
        source: book.source.kind(),
        added_at: book.added_at,
    }))
}

/// Delete a book, releasing its bytes and cached document
async fn delete_book(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    if !state.shelf().remove(&id).await {
        return Err(not_found("Book", &id));
    }

    state.documents().remove(&id).await;
    Ok(StatusCode::NO_CONTENT)
}

/// Serve the cover thumbnail, generating and attaching it on first request
async fn get_cover(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let book = state
        .shelf()
        .get(&id)
        .await
        .ok_or_else(|| not_found("Book", &id))?;

    if let Some(cover) = &book.cover {
        return Ok(cover_response(cover));
    }

    state.open_document(&id).await.map_err(|e| match e {
        DocumentError::NotFound(_) => not_found("Book", &id),
        other => {
            tracing::error!("Failed to open document for cover of '{}': {}", id, other);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::with_details(
                    format!("Failed to open book '{}'", id),
                    other.to_string(),
                )),
            )
        }
    })?;

    let cover = generate_cover(state.documents(), &id).await.map_err(|e| {
        tracing::error!("Failed to generate cover for '{}': {}", id, e);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse::with_details(
                format!("Failed to generate cover for '{}'", id),
                e.to_string(),
            )),
        )
    })?;

    let cover = Arc::new(cover);
    state.shelf().set_cover(&id, cover.clone()).await;

    Ok(cover_response(&cover))
}

fn cover_response(cover: &CoverImage) -> Response {
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, cover.content_type())
        .header(header::CACHE_CONTROL, "max-age=86400") // Cache covers longer
        .body(Body::from(cover.data.clone()))
        .unwrap()
}
