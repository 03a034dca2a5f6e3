use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("Invalid model name: {0}")]
    InvalidName(String),

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    /// The model is listed but has no artifact yet.
    #[error("Torrent not available for model: {0}")]
    TorrentNotBuilt(String),

    #[error("Store torrent not available")]
    StoreTorrentNotBuilt,

    #[error("Internal error: {0}")]
    Internal(String),
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    code: String,
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            HttpError::InvalidName(_) => (StatusCode::BAD_REQUEST, "INVALID_MODEL_NAME"),
            HttpError::ModelNotFound(_) => (StatusCode::NOT_FOUND, "MODEL_NOT_FOUND"),
            HttpError::TorrentNotBuilt(_) => (StatusCode::NOT_FOUND, "TORRENT_NOT_FOUND"),
            HttpError::StoreTorrentNotBuilt => (StatusCode::NOT_FOUND, "TORRENT_NOT_FOUND"),
            HttpError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        };

        let body = ErrorResponse {
            error: self.to_string(),
            code: code.to_string(),
        };

        (status, Json(body)).into_response()
    }
}
