pub mod admin;
pub mod booking;
pub mod health;
pub mod payment;
pub mod webhook;

use axum::http::HeaderMap;

use crate::errors::AppError;
use crate::services::rate_limit;
use crate::state::AppState;

/// First hop of x-forwarded-for, falling back to a placeholder when the
/// service is hit directly.
pub fn client_ip(headers: &HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "unknown".to_string())
}

pub fn enforce_rate_limit(
    state: &AppState,
    headers: &HeaderMap,
    action: &str,
) -> Result<(), AppError> {
    let ip = client_ip(headers);
    let limited = {
        let db = state.db.lock().unwrap();
        rate_limit::check(&db, &ip, action, state.config.rate_limit_max)?
    };

    if let Some(reset) = limited {
        tracing::warn!(%ip, action, "rate limit exceeded");
        return Err(AppError::RateLimited {
            reset_at: reset.format("%Y-%m-%d %H:%M:%S").to_string(),
        });
    }
    Ok(())
}
