use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::error;

/// Domain errors surfaced to the client. Raw storage errors never leave the
/// server; they are logged and mapped to a generic 500.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Check the date and time format")]
    Format,

    #[error("An entry for this date already exists")]
    DuplicateEntry,

    #[error("Not allowed")]
    Unauthorized,

    #[error("Not found")]
    NotFound,

    #[error("No OTP found, request a new one")]
    OtpNotFound,

    #[error("OTP expired, request a new one")]
    OtpExpired,

    #[error("Invalid OTP")]
    OtpInvalid,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Account not verified")]
    NotVerified,

    #[error("Email already registered")]
    EmailTaken,

    #[error("{0}")]
    Validation(String),

    #[error("Database error")]
    Database(#[from] sqlx::Error),

    #[error("Internal error")]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Format => StatusCode::BAD_REQUEST,
            Self::DuplicateEntry => StatusCode::CONFLICT,
            Self::Unauthorized => StatusCode::FORBIDDEN,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::OtpNotFound => StatusCode::BAD_REQUEST,
            Self::OtpExpired => StatusCode::BAD_REQUEST,
            Self::OtpInvalid => StatusCode::BAD_REQUEST,
            Self::InvalidCredentials => StatusCode::UNAUTHORIZED,
            Self::NotVerified => StatusCode::FORBIDDEN,
            Self::EmailTaken => StatusCode::CONFLICT,
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!(error = ?self, "request failed");
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

/// True when the error is a unique-constraint violation, which the timesheet
/// and user stores treat as DuplicateEntry/EmailTaken rather than a 500.
pub fn is_unique_violation(e: &sqlx::Error) -> bool {
    e.as_database_error()
        .map(|d| d.is_unique_violation())
        .unwrap_or(false)
}
