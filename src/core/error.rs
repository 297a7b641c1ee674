// Centralized error handling for the relay

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while accepting an upload and launching its download
#[derive(Error, Debug)]
pub enum DownloadError {
    #[error("torrent required")]
    BadRequest,

    #[error("torrent too large")]
    TooLarge,

    #[error("Failed to persist torrent: {0}")]
    Storage(String),

    #[error("Failed to launch download agent: {0}")]
    Launch(String),
}

impl IntoResponse for DownloadError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            DownloadError::BadRequest => (StatusCode::BAD_REQUEST, "torrent required"),
            DownloadError::TooLarge => (StatusCode::PAYLOAD_TOO_LARGE, "torrent too large"),
            DownloadError::Storage(_) | DownloadError::Launch(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "internal server error")
            }
        };

        (status, message).into_response()
    }
}

/// Errors raised while sweeping a download's output.
///
/// Never surfaced to an HTTP caller, the reaper only logs them.
#[derive(Error, Debug)]
pub enum SweepError {
    #[error("Failed to read directory {}: {source}", .path.display())]
    ReadDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to remove {}: {source}", .path.display())]
    RemoveEntry {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use http_body_util::BodyExt;

    async fn body_text(response: Response) -> String {
        let bytes = Body::new(response.into_body()).collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_bad_request_is_plain_400() {
        let response = DownloadError::BadRequest.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let content_type = response.headers().get("content-type").unwrap().to_str().unwrap();
        assert!(content_type.starts_with("text/plain"));

        assert_eq!(body_text(response).await, "torrent required");
    }

    #[tokio::test]
    async fn test_internal_errors_hide_details() {
        let response = DownloadError::Launch("No such file or directory".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_text(response).await, "internal server error");

        let response = DownloadError::Storage("disk full".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_sweep_error_mentions_path() {
        let err = SweepError::RemoveEntry {
            path: PathBuf::from("/srv/torrents/file.iso"),
            source: std::io::Error::from(std::io::ErrorKind::PermissionDenied),
        };
        assert!(err.to_string().contains("/srv/torrents/file.iso"));
    }
}
