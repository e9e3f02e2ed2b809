use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("amount does not match the expected deposit")]
    PriceMismatch,

    #[error("a matching booking was created moments ago")]
    DuplicateBooking,

    #[error("rate limited")]
    RateLimited { reset_at: String },

    #[error("payment provider error: {0}")]
    Payment(String),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("service unavailable: {0}")]
    Unavailable(String),

    #[error("forbidden")]
    Forbidden,

    #[error("webhook authentication failed")]
    WebhookAuth,

    #[error("not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::Validation(_) | AppError::PriceMismatch => StatusCode::BAD_REQUEST,
            AppError::DuplicateBooking => StatusCode::CONFLICT,
            AppError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            AppError::Payment(_) => StatusCode::BAD_GATEWAY,
            AppError::Database(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::WebhookAuth => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
        };

        // Internal detail stays in the logs; the wire gets a sanitized message.
        let body = match &self {
            AppError::Database(e) => {
                tracing::error!(error = %e, "database error");
                serde_json::json!({ "error": "internal error" })
            }
            AppError::Internal(e) => {
                tracing::error!(error = %e, "internal error");
                serde_json::json!({ "error": "internal error" })
            }
            AppError::RateLimited { reset_at } => {
                serde_json::json!({ "error": "rate limited", "resetTime": reset_at })
            }
            other => serde_json::json!({ "error": other.to_string() }),
        };

        (status, axum::Json(body)).into_response()
    }
}
