// Error types for the generation gateway
//
// One thiserror enum per concern. Only `ApiError` reaches the client; everything
// below it is mapped into a uniform JSON body by the handlers.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("MAX_FILE_SIZE must be > 0, got {0}")]
    InvalidMaxFileSize(u64),

    #[error("GENERATION_TIMEOUT must be > 0 seconds, got {0}")]
    InvalidTimeout(u64),

    #[error("Invalid server config: {0}")]
    InvalidServerConfig(String),
}

/// Image encoding errors (the upload could not be turned into a data URL)
#[derive(Debug, Error)]
pub enum ImageEncodeError {
    /// `path` stays out of the message, which is returned to clients
    #[error("Failed to process image: {source}")]
    Open {
        path: String,
        #[source]
        source: image::ImageError,
    },

    #[error("Failed to process image: {0}")]
    Encode(#[from] image::ImageError),

    #[error("Failed to process image: encoding task failed: {0}")]
    TaskJoin(String),
}

/// Errors raised while talking to the fal.ai API
#[derive(Debug, Error)]
pub enum FalError {
    #[error("FAL_API_KEY not found in environment variables")]
    MissingApiKey,

    #[error("Failed to build HTTP client: {0}")]
    ClientBuild(#[source] reqwest::Error),

    #[error(transparent)]
    Encoding(#[from] ImageEncodeError),

    #[error("{status} - {body}")]
    Status { status: u16, body: String },

    #[error("request timed out")]
    Timeout,

    #[error("{0}")]
    Transport(#[source] reqwest::Error),

    #[error("Invalid response format: {0}")]
    InvalidResponse(String),
}

impl From<reqwest::Error> for FalError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FalError::Timeout
        } else {
            FalError::Transport(err)
        }
    }
}

/// Per-image download failure while materializing results
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("download failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("failed to write {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Generation log write failures (never surfaced to clients)
#[derive(Debug, Error)]
pub enum GenerationLogError {
    #[error("Failed to serialize log entry: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Failed to write log file {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Errors returned from HTTP handlers
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    PayloadTooLarge(String),

    #[error("{0}")]
    InvalidFileType(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::InvalidFileType(_) | ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = Json(serde_json::json!({
            "success": false,
            "error": self.to_string(),
        }));
        (status, body).into_response()
    }
}

pub type FalResult<T> = Result<T, FalError>;
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_status_mapping() {
        assert_eq!(
            ApiError::PayloadTooLarge("big".into()).status(),
            StatusCode::PAYLOAD_TOO_LARGE
        );
        assert_eq!(
            ApiError::InvalidFileType("gif".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::Internal("boom".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_fal_status_error_display() {
        let err = FalError::Status {
            status: 503,
            body: "overloaded".to_string(),
        };
        assert_eq!(err.to_string(), "503 - overloaded");
    }
}
