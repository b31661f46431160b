use super::error::{ApiError, ApiResult};
use super::AppState;
use crate::media::{non_blank, MediaDescriptor, RelayPhase, RelayRequest};
use axum::{
    body::Body,
    extract::{rejection::JsonRejection, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use tracing::{error, info, warn};

#[derive(Debug, Deserialize)]
pub struct InfoBody {
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DownloadBody {
    url: Option<String>,
    /// Rendition id from a previous info response
    format: Option<String>,
}

pub async fn liveness() -> &'static str {
    "Video Downloader API is up and running!"
}

pub async fn info(
    State(state): State<AppState>,
    body: Result<Json<InfoBody>, JsonRejection>,
) -> ApiResult<Json<MediaDescriptor>> {
    let url = body
        .ok()
        .and_then(|Json(body)| non_blank(body.url))
        .ok_or(ApiError::MissingUrl)?;

    info!("Fetching info for {}", url);

    let descriptor = state.media.describe(&url).await.map_err(|e| {
        error!("Failed to describe {}: {}", url, e);
        ApiError::from(e)
    })?;

    info!(
        "Found {} formats for \"{}\"",
        descriptor.renditions.len(),
        descriptor.title
    );
    Ok(Json(descriptor))
}

pub async fn download(
    State(state): State<AppState>,
    body: Result<Json<DownloadBody>, JsonRejection>,
) -> ApiResult<Response> {
    let request = body
        .ok()
        .and_then(|Json(body)| RelayRequest::new(body.url, body.format))
        .ok_or(ApiError::MissingDownloadFields)?;

    info!(
        "Downloading {} with format {}",
        request.source_url, request.rendition_id
    );

    let filename = state.media.attachment_name(&request);
    let stream = state.media.relay(&request).await.map_err(|e| {
        error!("Download of {} failed: {}", request.source_url, e);
        ApiError::from(e)
    })?;

    if stream.phase() == RelayPhase::Complete {
        warn!(
            "Extraction tool produced no data for {} ({})",
            request.source_url, request.rendition_id
        );
    }

    let headers = [
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", filename),
        ),
        (
            header::CONTENT_TYPE,
            "application/octet-stream".to_string(),
        ),
    ];

    Ok((StatusCode::OK, headers, Body::from_stream(stream.into_body())).into_response())
}
