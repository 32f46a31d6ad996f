//! HTTP handlers for the imagejoin server
//!
//! Every mutating action answers with a 303 back to the session page, so a
//! browser refresh never repeats an upload or a move. Conversion is the
//! exception: its result only exists in the response that produced it.

use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::header,
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
    Form, Json, Router,
};
use imagejoin_core::{ConversionOptions, ConvertError, ImageFormat, Quality, UploadedImage};
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::ServerError;
use crate::page::{self, Notice, NO_INPUT_MESSAGE};
use crate::state::AppState;

/// Multipart field carrying the uploaded files
pub const UPLOAD_FIELD: &str = "images";

/// Build the application router
pub fn router(state: AppState) -> Router {
    let body_limit = state.max_upload_bytes;

    Router::new()
        .route("/", get(handle_new_session))
        .route("/health", get(handle_health))
        .route("/s/:id", get(handle_page))
        .route("/s/:id/upload", post(handle_upload))
        .route("/s/:id/move/:index/:direction", post(handle_move))
        .route("/s/:id/clear", post(handle_clear))
        .route("/s/:id/options", post(handle_options))
        .route("/s/:id/convert", post(handle_convert))
        .route("/s/:id/image/:index", get(handle_image))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
    pub sessions: usize,
}

/// Handler: GET /health
pub async fn handle_health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: "imagejoin-server",
        version: env!("CARGO_PKG_VERSION"),
        sessions: state.sessions.len().await,
    })
}

fn session_page(id: Uuid) -> Redirect {
    Redirect::to(&format!("/s/{}", id))
}

/// Handler: GET /
pub async fn handle_new_session(State(state): State<AppState>) -> Redirect {
    let id = state.sessions.create().await;
    info!(session = %id, "new session");
    session_page(id)
}

/// Handler: GET /s/:id
pub async fn handle_page(State(state): State<AppState>, Path(id): Path<Uuid>) -> Response {
    match state.sessions.get(id).await {
        Some(session) => {
            let session = session.lock().await;
            Html(page::render(id, &session, &Notice::None)).into_response()
        }
        None => {
            debug!(session = %id, "unknown session, starting over");
            Redirect::to("/").into_response()
        }
    }
}

/// Handler: POST /s/:id/upload
pub async fn handle_upload(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    mut multipart: Multipart,
) -> Result<Redirect, ServerError> {
    let session = state.sessions.require(id).await?;

    let mut uploads = Vec::new();
    let mut form: Option<OptionsForm> = None;
    while let Some(field) = multipart.next_field().await.map_err(|e| {
        warn!("Failed to read multipart field: {}", e);
        ServerError::InvalidRequest(format!("Failed to read upload: {}", e))
    })? {
        let name = field.name().unwrap_or("").to_string();
        if name != UPLOAD_FIELD {
            if OptionsForm::FIELDS.contains(&name.as_str()) {
                let value = field.text().await.map_err(|e| {
                    ServerError::InvalidRequest(format!("Failed to read field {}: {}", name, e))
                })?;
                form.get_or_insert_with(OptionsForm::default)
                    .set_field(&name, value)?;
            }
            continue;
        }

        let file_name = field.file_name().unwrap_or("").to_string();
        if file_name.is_empty() {
            continue;
        }
        if !ImageFormat::accepts_file_name(&file_name) {
            warn!(session = %id, file = %file_name, "skipping file with unsupported extension");
            continue;
        }

        let data = field.bytes().await.map_err(|e| {
            ServerError::InvalidRequest(format!("Failed to read file data: {}", e))
        })?;
        debug!(file = %file_name, bytes = data.len(), "received file");
        uploads.push(UploadedImage::new(file_name, data.to_vec()));
    }

    let mut session = session.lock().await;
    if let Some(form) = form {
        form.apply(&mut session.options)?;
    }

    let count = uploads.len();
    let replaced = session.images.ingest(uploads);
    info!(session = %id, files = count, replaced, "upload");

    Ok(session_page(id))
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
}

/// Handler: POST /s/:id/move/:index/:direction
pub async fn handle_move(
    State(state): State<AppState>,
    Path((id, index, direction)): Path<(Uuid, usize, Direction)>,
    Form(form): Form<OptionsForm>,
) -> Result<Redirect, ServerError> {
    let session = state.sessions.require(id).await?;
    let mut session = session.lock().await;
    form.apply(&mut session.options)?;

    let moved = match direction {
        Direction::Up => session.images.move_up(index),
        Direction::Down => session.images.move_down(index),
    };
    if !moved {
        debug!(session = %id, index, ?direction, "move ignored");
    }

    Ok(session_page(id))
}

/// Handler: POST /s/:id/clear
pub async fn handle_clear(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Form(form): Form<OptionsForm>,
) -> Result<Redirect, ServerError> {
    let session = state.sessions.require(id).await?;
    let mut session = session.lock().await;
    form.apply(&mut session.options)?;
    session.images.clear();
    info!(session = %id, "cleared");
    Ok(session_page(id))
}

/// Values of `options-form`, submitted with every action button
///
/// An unchecked checkbox is absent from the form body.
#[derive(Debug, Default, Deserialize)]
pub struct OptionsForm {
    #[serde(default)]
    pub filename: String,
    #[serde(default)]
    pub title: String,
    pub compress: Option<String>,
    pub quality: Option<u8>,
}

impl OptionsForm {
    const FIELDS: [&'static str; 4] = ["filename", "title", "compress", "quality"];

    /// Fill one field from a multipart text part
    fn set_field(&mut self, name: &str, value: String) -> Result<(), ServerError> {
        match name {
            "filename" => self.filename = value,
            "title" => self.title = value,
            "compress" => self.compress = Some(value),
            "quality" => {
                let quality = value.trim().parse().map_err(|_| {
                    ServerError::InvalidRequest(format!("quality must be a number, got {}", value))
                })?;
                self.quality = Some(quality);
            }
            _ => {}
        }
        Ok(())
    }

    fn apply(self, options: &mut ConversionOptions) -> Result<(), ServerError> {
        let quality = match self.quality {
            Some(value) => Quality::new(value)?,
            None => options.quality,
        };

        options.filename = self.filename;
        options.title = self.title;
        options.compress = self.compress.is_some();
        options.quality = quality;
        Ok(())
    }
}

/// Handler: POST /s/:id/options
pub async fn handle_options(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Form(form): Form<OptionsForm>,
) -> Result<Redirect, ServerError> {
    let session = state.sessions.require(id).await?;
    let mut session = session.lock().await;
    form.apply(&mut session.options)?;
    debug!(session = %id, quality = session.options.quality.value(), "options updated");
    Ok(session_page(id))
}

/// Handler: POST /s/:id/convert
pub async fn handle_convert(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Form(form): Form<OptionsForm>,
) -> Result<Html<String>, ServerError> {
    let session = state.sessions.require(id).await?;
    // Held for the whole conversion so moves and uploads wait their turn
    let mut session = session.lock().await;
    form.apply(&mut session.options)?;

    let images = session.images.images().to_vec();
    let options = session.options.clone();
    let outcome = tokio::task::spawn_blocking(move || imagejoin_core::convert(&images, &options))
        .await
        .map_err(|e| ServerError::Internal(format!("Conversion task failed: {}", e)))?;

    let notice = match outcome {
        Ok(result) => {
            info!(
                session = %id,
                pages = result.metrics.page_count,
                bytes = result.metrics.output_size_bytes,
                file = %result.filename,
                "pdf ready"
            );
            Notice::Converted(result)
        }
        Err(ConvertError::NoInput) => Notice::Error(NO_INPUT_MESSAGE.to_string()),
        Err(e) => {
            warn!(session = %id, error = %e, "conversion failed");
            Notice::Error(format!("Conversion failed: {}", e))
        }
    };

    Ok(Html(page::render(id, &session, &notice)))
}

/// Handler: GET /s/:id/image/:index
pub async fn handle_image(
    State(state): State<AppState>,
    Path((id, index)): Path<(Uuid, usize)>,
) -> Result<Response, ServerError> {
    let session = state.sessions.require(id).await?;
    let session = session.lock().await;

    let image = session
        .images
        .list()
        .and_then(|list| list.get(index))
        .ok_or_else(|| ServerError::NotFound(format!("image {}", index)))?;

    let content_type = image
        .format()
        .map(ImageFormat::mime_type)
        .unwrap_or("application/octet-stream");

    Ok(([(header::CONTENT_TYPE, content_type)], image.bytes().to_vec()).into_response())
}
