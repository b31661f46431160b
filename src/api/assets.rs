use super::error::ApiError;
use super::AppState;
use axum::{
    body::Body,
    extract::{Request, State},
    http::{header, Method},
    response::{IntoResponse, Response},
};
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio_util::io::ReaderStream;
use tracing::debug;

const INDEX_FILE: &str = "index.html";

/// Serves the client build for everything the API does not route.
///
/// Unknown paths get `index.html` so client-side routes survive a reload.
pub async fn fallback(State(state): State<AppState>, request: Request) -> Response {
    let path = request.uri().path();
    if path == "/api" || path.starts_with("/api/") {
        return ApiError::NotFound.into_response();
    }

    let Some(root) = state.static_root.as_deref() else {
        return ApiError::NotFound.into_response();
    };

    if request.method() != Method::GET && request.method() != Method::HEAD {
        return ApiError::NotFound.into_response();
    }

    match serve(root, path).await {
        Ok(response) => response,
        Err(e) => e.into_response(),
    }
}

async fn serve(root: &Path, path: &str) -> Result<Response, ApiError> {
    let relative = relative_path(path).ok_or(ApiError::NotFound)?;
    let candidate = root.join(&relative);

    let is_file = tokio::fs::metadata(&candidate)
        .await
        .map(|meta| meta.is_file())
        .unwrap_or(false);
    let file_path = if is_file {
        candidate
    } else {
        root.join(INDEX_FILE)
    };

    let resolved = contained(root, &file_path).await.ok_or(ApiError::NotFound)?;
    let file = File::open(&resolved).await.map_err(|e| {
        debug!("Cannot open {}: {}", resolved.display(), e);
        ApiError::NotFound
    })?;

    let mime = mime_guess::from_path(&file_path).first_or_octet_stream();
    let body = Body::from_stream(ReaderStream::new(file));
    Ok(([(header::CONTENT_TYPE, mime.to_string())], body).into_response())
}

/// Resolves symlinks in `path`; `None` unless the target is still under `root`.
async fn contained(root: &Path, path: &Path) -> Option<PathBuf> {
    let root = tokio::fs::canonicalize(root).await.ok()?;
    let resolved = tokio::fs::canonicalize(path).await.ok()?;
    if resolved.starts_with(&root) {
        Some(resolved)
    } else {
        debug!("Refusing {}: resolves outside {}", path.display(), root.display());
        None
    }
}

/// Request path as a path below the static root; `None` if it tries to leave it.
fn relative_path(path: &str) -> Option<PathBuf> {
    let mut relative = PathBuf::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => continue,
            ".." => return None,
            s if s.contains('\\') => return None,
            s => relative.push(s),
        }
    }
    Some(relative)
}
