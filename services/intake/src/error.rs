use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use evalgate_domain::access_code::InvalidAccessCode;

/// Intake service domain error variants.
#[derive(Debug, thiserror::Error)]
pub enum IntakeServiceError {
    #[error("code must be 4 lowercase letters or digits")]
    InvalidFormat,
    #[error("code not found")]
    CodeNotFound,
    #[error("code expired")]
    CodeExpired,
    #[error("evaluation not found")]
    EvaluationNotFound,
    #[error("invalid evaluation id")]
    InvalidId,
    #[error("invalid code status")]
    InvalidStatus,
    #[error("at most 100 codes can be generated at once")]
    BatchTooLarge,
    #[error("count must not be negative")]
    InvalidCount,
    /// Request body, query string or path could not be decoded.
    #[error("{0}")]
    BadRequest(String),
    #[error("request body too large")]
    PayloadTooLarge,
    #[error("missing data")]
    MissingData,
    #[error("could not generate a unique code, please retry")]
    GenerationExhausted,
    #[error("internal error")]
    Internal(#[from] anyhow::Error),
}

impl From<InvalidAccessCode> for IntakeServiceError {
    fn from(_: InvalidAccessCode) -> Self {
        Self::InvalidFormat
    }
}

impl From<JsonRejection> for IntakeServiceError {
    fn from(rejection: JsonRejection) -> Self {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            return Self::PayloadTooLarge;
        }
        Self::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for IntakeServiceError {
    fn from(rejection: QueryRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for IntakeServiceError {
    fn from(rejection: PathRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl IntakeServiceError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidFormat => "INVALID_FORMAT",
            Self::CodeNotFound => "CODE_NOT_FOUND",
            Self::CodeExpired => "CODE_EXPIRED",
            Self::EvaluationNotFound => "EVALUATION_NOT_FOUND",
            Self::InvalidId => "INVALID_ID",
            Self::InvalidStatus => "INVALID_STATUS",
            Self::BatchTooLarge => "BATCH_TOO_LARGE",
            Self::InvalidCount => "INVALID_COUNT",
            Self::BadRequest(_) => "BAD_REQUEST",
            Self::PayloadTooLarge => "PAYLOAD_TOO_LARGE",
            Self::MissingData => "MISSING_DATA",
            Self::GenerationExhausted => "GENERATION_EXHAUSTED",
            Self::Internal(_) => "INTERNAL",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidFormat
            | Self::InvalidId
            | Self::InvalidStatus
            | Self::BatchTooLarge
            | Self::InvalidCount
            | Self::BadRequest(_)
            | Self::MissingData => StatusCode::BAD_REQUEST,
            Self::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            Self::CodeExpired => StatusCode::FORBIDDEN,
            Self::CodeNotFound | Self::EvaluationNotFound => StatusCode::NOT_FOUND,
            Self::GenerationExhausted | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for IntakeServiceError {
    fn into_response(self) -> Response {
        let status = self.status();
        // 4xx are expected client errors and already visible in the TraceLayer span.
        match &self {
            Self::Internal(e) => {
                tracing::error!(error = ?e, kind = "INTERNAL", "internal error");
            }
            Self::GenerationExhausted => {
                tracing::error!(kind = "GENERATION_EXHAUSTED", "code generation exhausted");
            }
            _ => {}
        }
        let body = serde_json::json!({
            "kind": self.kind(),
            "message": self.to_string(),
        });
        (status, axum::Json(body)).into_response()
    }
}
