use crate::media::{ExtractionError, RelayError};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

/// Client-facing failure. `Display` is the whole message the client sees;
/// tool diagnostics stay in the wrapped source and in the logs.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Missing URL")]
    MissingUrl,
    #[error("Missing url or format")]
    MissingDownloadFields,
    #[error("Failed to fetch video info")]
    Extraction(#[from] ExtractionError),
    #[error("Download failed")]
    Relay(#[from] RelayError),
    #[error("Not found")]
    NotFound,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::MissingUrl | ApiError::MissingDownloadFields => StatusCode::BAD_REQUEST,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::Extraction(_) | ApiError::Relay(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({ "error": self.to_string() });
        (self.status(), Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_status_codes() {
        assert_eq!(ApiError::MissingUrl.status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::MissingDownloadFields.status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::NotFound.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            ApiError::from(RelayError::Stalled(Duration::from_secs(1))).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_message_hides_tool_details() {
        let err = ApiError::from(ExtractionError::TimedOut(Duration::from_secs(60)));
        assert_eq!(err.to_string(), "Failed to fetch video info");

        let err = ApiError::from(RelayError::NotPiped);
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.to_string(), "Download failed");
        assert_eq!(
            RelayError::NotPiped.to_string(),
            "extraction tool output was not piped"
        );
    }
}
