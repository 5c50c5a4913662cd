use axum::{
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use tracing::{error, warn};

use crate::{
    images::services::IngestError, storage::StorageError, users::repo_types::RepoError,
};

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),
    #[error("user not found")]
    NotFound,
    #[error("invalid user id {0:?}")]
    InvalidId(String),
    #[error(transparent)]
    Ingest(#[from] IngestError),
    #[error(transparent)]
    Multipart(#[from] MultipartError),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<RepoError> for AppError {
    fn from(e: RepoError) -> Self {
        match e {
            RepoError::InvalidId(id) => AppError::InvalidId(id),
            RepoError::Backend(e) => AppError::Internal(e),
        }
    }
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) | AppError::InvalidId(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::Multipart(e) => e.status(),
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Ingest(e) => match e {
                IngestError::UnsupportedMediaType(_) | IngestError::UnsupportedFormat(_) => {
                    StatusCode::UNSUPPORTED_MEDIA_TYPE
                }
                IngestError::EmptyUpload | IngestError::InvalidFileName(_) => {
                    StatusCode::BAD_REQUEST
                }
                IngestError::TooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
                IngestError::Timeout(_) => StatusCode::SERVICE_UNAVAILABLE,
                IngestError::Decode(_)
                | IngestError::Storage(_)
                | IngestError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    fn public_message(&self) -> String {
        match self {
            AppError::Internal(_) => "internal server error".into(),
            AppError::Ingest(IngestError::Storage(StorageError::Conflict(_))) => {
                "an upload with the same name is in progress, retry".into()
            }
            AppError::Ingest(IngestError::Storage(_) | IngestError::Internal(_)) => {
                "failed to store image".into()
            }
            AppError::Multipart(e) => e.body_text(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self, %status, "request failed");
        } else {
            warn!(error = %self, %status, "request rejected");
        }

        let body = serde_json::json!({ "error": self.public_message() });
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn pipeline_failures_map_to_4xx_and_5xx() {
        let cases = [
            (IngestError::UnsupportedMediaType("text/plain".into()), 415),
            (IngestError::UnsupportedFormat("image/gif".into()), 415),
            (IngestError::EmptyUpload, 400),
            (IngestError::InvalidFileName("..".into()), 400),
            (IngestError::TooLarge { size: 2, max: 1 }, 413),
            (IngestError::Decode("bad".into()), 500),
            (IngestError::Timeout(Duration::from_secs(1)), 503),
            (
                IngestError::Storage(StorageError::Conflict("1-a.jpg".into())),
                500,
            ),
        ];
        for (err, code) in cases {
            assert_eq!(AppError::from(err).status().as_u16(), code);
        }
    }

    #[test]
    fn repo_errors_convert() {
        let invalid = AppError::from(RepoError::InvalidId("zz".into()));
        assert_eq!(invalid.status(), StatusCode::BAD_REQUEST);

        let backend = AppError::from(RepoError::Backend(anyhow::anyhow!("connection reset")));
        assert_eq!(backend.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(backend.public_message(), "internal server error");
    }

    #[test]
    fn storage_details_are_not_leaked() {
        let err = AppError::from(IngestError::Storage(StorageError::Io(
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "/srv/uploads denied"),
        )));
        assert_eq!(err.public_message(), "failed to store image");
    }
}
