//! Error types for the imagejoin server

use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use html_escape::encode_text;
use imagejoin_core::ConvertError;
use thiserror::Error;
use uuid::Uuid;

/// Server error types
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Session not found: {0}")]
    SessionNotFound(Uuid),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<ConvertError> for ServerError {
    fn from(err: ConvertError) -> Self {
        match err {
            ConvertError::InvalidOption(msg) => ServerError::InvalidRequest(msg),
            other => ServerError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = match &self {
            ServerError::SessionNotFound(_) | ServerError::NotFound(_) => StatusCode::NOT_FOUND,
            ServerError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ServerError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let body = format!(
            r#"<!DOCTYPE html>
<html>
<head><meta charset="utf-8"><title>{code}</title></head>
<body style="font-family: sans-serif; max-width: 600px; margin: 40px auto;">
  <h1 style="color: #dc3545;">{code}</h1>
  <p>{message}</p>
  <p><a href="/">Start over</a></p>
</body>
</html>"#,
            code = status,
            message = encode_text(&self.to_string()),
        );

        (status, Html(body)).into_response()
    }
}
