use std::sync::Arc;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use chrono::{NaiveDate, NaiveTime};
use serde::Deserialize;

use crate::errors::AppError;
use crate::pricing::PackageId;
use crate::services::checkout::{self, DraftRequest};
use crate::state::AppState;

use super::enforce_rate_limit;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBookingRequest {
    pub package_id: String,
    pub customer_name: String,
    pub customer_email: String,
    pub customer_phone: String,
    pub booking_date: String,
    pub booking_time: String,
    pub notes: Option<String>,
    pub total_amount: f64,
    pub people_count: Option<i64>,
    pub locale: Option<String>,
}

/// Schema validation at the boundary: everything downstream works with typed
/// values only.
fn validate(body: CreateBookingRequest) -> Result<DraftRequest, AppError> {
    let package = PackageId::parse(body.package_id.trim())
        .ok_or_else(|| AppError::Validation("unknown package id".to_string()))?;

    let name = body.customer_name.trim().to_string();
    if name.is_empty() {
        return Err(AppError::Validation("customer name is required".to_string()));
    }

    let email = body.customer_email.trim().to_lowercase();
    if email.is_empty() || !email.contains('@') {
        return Err(AppError::Validation("a valid email is required".to_string()));
    }

    let phone = body.customer_phone.trim().to_string();
    if phone.is_empty() {
        return Err(AppError::Validation("customer phone is required".to_string()));
    }

    let booking_date = NaiveDate::parse_from_str(body.booking_date.trim(), "%Y-%m-%d")
        .map_err(|_| AppError::Validation("booking date must be YYYY-MM-DD".to_string()))?;

    let booking_time = body.booking_time.trim().to_string();
    NaiveTime::parse_from_str(&booking_time, "%H:%M")
        .map_err(|_| AppError::Validation("booking time must be HH:MM".to_string()))?;

    if !body.total_amount.is_finite() || body.total_amount <= 0.0 {
        return Err(AppError::Validation("total amount must be positive".to_string()));
    }

    let locale = match body.locale.as_deref() {
        Some("tr") => "tr",
        Some("de") => "de",
        _ => "en",
    }
    .to_string();

    Ok(DraftRequest {
        package,
        customer_name: name,
        customer_email: email,
        customer_phone: phone,
        booking_date,
        booking_time,
        notes: body.notes.map(|n| n.trim().to_string()).filter(|n| !n.is_empty()),
        locale,
        total_amount: body.total_amount,
        people_count: body.people_count,
    })
}

// POST /api/booking and /api/booking/create-draft
pub async fn create_draft(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<CreateBookingRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    enforce_rate_limit(&state, &headers, "booking_create")?;

    let req = validate(body)?;
    let booking = checkout::create_draft(&state, &req)?;

    tracing::info!(
        booking_id = %booking.id,
        package = booking.package_id.as_str(),
        email = %booking.customer_email,
        "draft booking created"
    );

    Ok(Json(serde_json::json!({
        "success": true,
        "bookingId": booking.id,
    })))
}
