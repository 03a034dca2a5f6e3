use super::error::HttpError;
use super::AppState;
use crate::catalog::Model;
use crate::constants::{STORE_ARTIFACT_STEM, TORRENT_CONTENT_TYPE, TORRENT_EXTENSION};
use crate::manifest::ModelName;
use axum::{
    extract::{Path, State},
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::io::ErrorKind;
use tracing::{debug, warn};

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub models: usize,
}

/// GET /health
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        models: state.catalog.snapshot().len(),
    })
}

/// GET /api/models
pub async fn list_models(State(state): State<AppState>) -> Json<Vec<Model>> {
    Json(state.catalog.snapshot().models.clone())
}

/// GET /api/models/{name}/torrent
///
/// `name` may omit the tag, in which case `latest` is served.
pub async fn model_torrent(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Response, HttpError> {
    let parsed = ModelName::parse(&name).map_err(|_| HttpError::InvalidName(name.clone()))?;
    let name = parsed.to_string();

    let snapshot = state.catalog.snapshot();
    let model = snapshot
        .get(&name)
        .ok_or_else(|| HttpError::ModelNotFound(name.clone()))?;
    let path = model
        .torrent_file
        .as_ref()
        .ok_or_else(|| HttpError::TorrentNotBuilt(name.clone()))?;

    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            warn!(model = %name, path = %path.display(), "torrent listed but missing on disk");
            return Err(HttpError::TorrentNotBuilt(name));
        }
        Err(e) => return Err(HttpError::Internal(e.to_string())),
    };

    debug!(model = %name, bytes = bytes.len(), "serving torrent");
    Ok(torrent_response(&parsed.file_stem(), &name, bytes))
}

/// GET /api/store/torrent
pub async fn store_torrent(State(state): State<AppState>) -> Result<Response, HttpError> {
    let snapshot = state.catalog.snapshot();
    let artifact = snapshot
        .store_torrent
        .as_ref()
        .ok_or(HttpError::StoreTorrentNotBuilt)?;

    let bytes = match tokio::fs::read(&artifact.path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => return Err(HttpError::StoreTorrentNotBuilt),
        Err(e) => return Err(HttpError::Internal(e.to_string())),
    };

    Ok(torrent_response(STORE_ARTIFACT_STEM, STORE_ARTIFACT_STEM, bytes))
}

/// Builds the download response. `filename` is the artifact's own file name
/// for clients that only read the plain parameter; `filename*` (RFC 6266)
/// carries the model name, which may contain characters like `:`.
fn torrent_response(stem: &str, display_name: &str, bytes: Vec<u8>) -> Response {
    let fallback: String = stem
        .chars()
        .map(|c| match c {
            '"' | '\\' => '_',
            c if c.is_ascii_graphic() => c,
            _ => '_',
        })
        .collect();
    let disposition = format!(
        "attachment; filename=\"{fallback}.{TORRENT_EXTENSION}\"; filename*=UTF-8''{}.{TORRENT_EXTENSION}",
        encode_ext_value(display_name)
    );
    (
        [
            (header::CONTENT_TYPE, TORRENT_CONTENT_TYPE.to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    )
        .into_response()
}

/// Percent-encodes everything outside the unreserved set.
fn encode_ext_value(s: &str) -> String {
    s.bytes()
        .map(|b| {
            if b.is_ascii_alphanumeric() || b == b'-' || b == b'_' || b == b'.' || b == b'~' {
                (b as char).to_string()
            } else {
                format!("%{:02X}", b)
            }
        })
        .collect()
}
