//! Common error type and result alias.
//!
//! Every failure surfaced to a client carries a machine-readable `error` code
//! and an HTTP status: 400 for bad input and safety refusals, 401 for
//! authentication, 402 for exhausted credits, 500 for everything else.
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("authentication failed")]
    Unauthenticated,

    #[error("insufficient credits")]
    InsufficientCredits,

    #[error("ledger read failed: {0}")]
    LedgerUnavailable(String),

    #[error("ledger write failed: {0}")]
    LedgerWriteFailed(String),

    #[error("generation service error: {0}")]
    GenerationServiceError(String),

    #[error("generation declined for safety reasons: {0}")]
    SafetyRefusal(String),

    #[error("generation returned no image")]
    EmptyResult,

    #[error("upstream returned malformed JSON: {0}")]
    MalformedUpstreamJson(String),

    #[error("configuration error: {0}")]
    ConfigurationError(String),

    #[error("http client error: {0}")]
    HttpClient(#[from] reqwest::Error),
}

impl AppError {
    /// Stable machine-readable code for the JSON `error` field.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::InvalidInput(_) => "InvalidInput",
            AppError::Unauthenticated => "Unauthenticated",
            AppError::InsufficientCredits => "InsufficientCredits",
            AppError::LedgerUnavailable(_) => "LedgerUnavailable",
            AppError::LedgerWriteFailed(_) => "LedgerWriteFailed",
            // Transport failures are reported under the service error code.
            AppError::GenerationServiceError(_) | AppError::HttpClient(_) => {
                "GenerationServiceError"
            }
            AppError::SafetyRefusal(_) => "SafetyRefusal",
            AppError::EmptyResult => "EmptyResult",
            AppError::MalformedUpstreamJson(_) => "MalformedUpstreamJson",
            AppError::ConfigurationError(_) => "ConfigurationError",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::InvalidInput(_) | AppError::SafetyRefusal(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthenticated => StatusCode::UNAUTHORIZED,
            AppError::InsufficientCredits => StatusCode::PAYMENT_REQUIRED,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("request failed: {self}");
        }
        let body = Json(json!({
            "error": self.code(),
            "message": self.to_string(),
        }));
        (status, body).into_response()
    }
}
