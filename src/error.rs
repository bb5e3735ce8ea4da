//! Application error types and their JSON HTTP mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

/// Error model used throughout request parsing, staging, and remote calls.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("No file uploaded")]
    MissingFile,
    #[error("{message}")]
    InvalidRequest { message: String, code: &'static str },
    #[error("{0}")]
    BadMultipart(String),
    #[error("{0}")]
    PayloadTooLarge(String),
    #[error("{0}")]
    UnsupportedMediaType(String),
    #[error("Transcription job failed")]
    JobFailed {
        job_name: String,
        reason: Option<String>,
    },
    #[error("transcription job {job_name} did not finish within {waited_secs}s")]
    Timeout { job_name: String, waited_secs: u64 },
    #[error("{service} request failed: {message}")]
    Upstream {
        service: &'static str,
        message: String,
    },
    #[error("{0}")]
    Internal(String),
}

impl AppError {
    /// Creates a `400 Bad Request` error with a machine-readable code.
    pub fn invalid_request(message: impl Into<String>, code: &'static str) -> Self {
        Self::InvalidRequest {
            message: message.into(),
            code,
        }
    }

    /// Creates a multipart parsing/shape validation error.
    pub fn bad_multipart(message: impl Into<String>) -> Self {
        Self::BadMultipart(message.into())
    }

    /// Creates a `413 Payload Too Large` error for bodies over the upload limit.
    pub fn payload_too_large(message: impl Into<String>) -> Self {
        Self::PayloadTooLarge(message.into())
    }

    /// Creates a `415 Unsupported Media Type` error.
    pub fn unsupported_media_type(message: impl Into<String>) -> Self {
        Self::UnsupportedMediaType(message.into())
    }

    /// Creates an error for a failed call to a remote AWS service.
    pub fn upstream(service: &'static str, message: impl Into<String>) -> Self {
        Self::Upstream {
            service,
            message: message.into(),
        }
    }

    /// Creates a generic internal server error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::MissingFile | Self::InvalidRequest { .. } | Self::BadMultipart(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            Self::UnsupportedMediaType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            Self::JobFailed { .. } | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            Self::Upstream { .. } => StatusCode::BAD_GATEWAY,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::MissingFile => "missing_file",
            Self::InvalidRequest { code, .. } => *code,
            Self::BadMultipart(_) => "invalid_multipart",
            Self::PayloadTooLarge(_) => "payload_too_large",
            Self::UnsupportedMediaType(_) => "unsupported_media_type",
            Self::JobFailed { .. } => "transcription_failed",
            Self::Timeout { .. } => "transcription_timeout",
            Self::Upstream { .. } => "upstream_error",
            Self::Internal(_) => "internal_error",
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorPayload {
    error: String,
    code: &'static str,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::warn!(status = status.as_u16(), error = %self, details = ?self, "request failed");
        }

        let payload = ErrorPayload {
            error: self.to_string(),
            code: self.code(),
        };
        (status, Json(payload)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_bad_request() {
        let err = AppError::MissingFile;
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.to_string(), "No file uploaded");
    }

    #[test]
    fn failed_job_keeps_public_message() {
        let err = AppError::JobFailed {
            job_name: "transcription-a".to_string(),
            reason: Some("unsupported sample rate".to_string()),
        };
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.to_string(), "Transcription job failed");
        assert_eq!(err.code(), "transcription_failed");
    }

    #[test]
    fn upstream_errors_map_to_bad_gateway() {
        let err = AppError::upstream("s3", "access denied");
        assert_eq!(err.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(err.to_string(), "s3 request failed: access denied");
    }
}
