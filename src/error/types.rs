use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

use crate::services::{AnalysisError, NormalizeError, SessionError};

pub type AppResult<T> = Result<T, AppError>;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Invalid API key")]
    InvalidApiKey,

    #[error("File too large: {size}MB exceeds limit of {limit}MB")]
    FileTooLarge { size: usize, limit: usize },

    #[error("Invalid file: {message}")]
    InvalidFile { message: String },

    #[error("Rate limit exceeded: maximum concurrent requests reached")]
    RateLimitExceeded,

    #[error("Could not process file: {message}")]
    ExtractionFailed { message: String },

    #[error("Could not process file: {message}")]
    EncodingFailed { message: String },

    #[error("No usable content: provide a readable file or paste the resume text")]
    NoUsableContent,

    #[error("Analysis failed: {message}")]
    AnalysisFailed { message: String },

    #[error("Session not found: {id}")]
    SessionNotFound { id: String },

    #[error("Upload superseded by a newer selection")]
    UploadSuperseded,

    #[error("Session limit reached: at most {limit} sessions may be open")]
    SessionLimitReached { limit: usize },

    #[error("Missing file in request")]
    MissingFile,

    #[error("Service unavailable: {service}")]
    ServiceUnavailable { service: String },
}

impl AppError {
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::InvalidApiKey => "INVALID_API_KEY",
            AppError::FileTooLarge { .. } => "FILE_TOO_LARGE",
            AppError::InvalidFile { .. } => "INVALID_FILE",
            AppError::RateLimitExceeded => "RATE_LIMIT_EXCEEDED",
            AppError::ExtractionFailed { .. } => "EXTRACTION_FAILED",
            AppError::EncodingFailed { .. } => "ENCODING_FAILED",
            AppError::NoUsableContent => "NO_USABLE_CONTENT",
            AppError::AnalysisFailed { .. } => "ANALYSIS_FAILED",
            AppError::SessionNotFound { .. } => "SESSION_NOT_FOUND",
            AppError::UploadSuperseded => "UPLOAD_SUPERSEDED",
            AppError::SessionLimitReached { .. } => "SESSION_LIMIT_REACHED",
            AppError::MissingFile => "MISSING_FILE",
            AppError::ServiceUnavailable { .. } => "SERVICE_UNAVAILABLE",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::InvalidApiKey => StatusCode::UNAUTHORIZED,
            AppError::FileTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::InvalidFile { .. } => StatusCode::BAD_REQUEST,
            AppError::RateLimitExceeded => StatusCode::TOO_MANY_REQUESTS,
            AppError::ExtractionFailed { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::EncodingFailed { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::NoUsableContent => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::AnalysisFailed { .. } => StatusCode::BAD_GATEWAY,
            AppError::SessionNotFound { .. } => StatusCode::NOT_FOUND,
            AppError::UploadSuperseded => StatusCode::CONFLICT,
            AppError::SessionLimitReached { .. } => StatusCode::SERVICE_UNAVAILABLE,
            AppError::MissingFile => StatusCode::BAD_REQUEST,
            AppError::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_code = self.error_code();
        let message = self.to_string();
        let request_id = Uuid::new_v4().to_string();
        let timestamp = chrono::Utc::now().to_rfc3339();

        tracing::error!(
            error_code = error_code,
            status_code = %status,
            request_id = %request_id,
            error_message = %message,
            "API error occurred"
        );

        let body = Json(json!({
            "success": false,
            "error": {
                "code": error_code,
                "message": message,
                "request_id": request_id,
                "timestamp": timestamp
            },
            "data": null
        }));

        (status, body).into_response()
    }
}

impl From<NormalizeError> for AppError {
    fn from(err: NormalizeError) -> Self {
        match err {
            NormalizeError::Extraction { .. } => AppError::ExtractionFailed {
                message: err.to_string(),
            },
            NormalizeError::Encoding { .. } => AppError::EncodingFailed {
                message: err.to_string(),
            },
            NormalizeError::NoUsableContent => AppError::NoUsableContent,
        }
    }
}

impl From<AnalysisError> for AppError {
    fn from(err: AnalysisError) -> Self {
        match err {
            AnalysisError::NotConfigured(_) => AppError::ServiceUnavailable {
                service: err.to_string(),
            },
            _ => AppError::AnalysisFailed {
                message: err.to_string(),
            },
        }
    }
}

impl From<SessionError> for AppError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::LimitReached { limit } => AppError::SessionLimitReached { limit },
        }
    }
}

impl AppError {
    pub fn service_unavailable(service: impl Into<String>) -> Self {
        AppError::ServiceUnavailable {
            service: service.into(),
        }
    }

    pub fn session_not_found(id: impl Into<String>) -> Self {
        AppError::SessionNotFound { id: id.into() }
    }
}
