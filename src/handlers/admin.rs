use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::Json;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::db::queries::{self, ListParams};
use crate::errors::AppError;
use crate::models::{Booking, BookingStatus, Customer, Payment, PaymentStatus};
use crate::state::AppState;

use super::enforce_rate_limit;

const TS_FMT: &str = "%Y-%m-%d %H:%M:%S";
const DATE_FMT: &str = "%Y-%m-%d";
const MAX_PAGE_SIZE: i64 = 100;

/// Bearer token plus email allowlist. The admin surface answers any failed
/// check with the same 403 and never says which part was wrong.
fn check_admin(headers: &HeaderMap, state: &AppState) -> Result<(), AppError> {
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    let token = auth.strip_prefix("Bearer ").unwrap_or("");

    if token.is_empty() || token != state.config.admin_token {
        return Err(AppError::Forbidden);
    }

    let email = headers
        .get("x-admin-email")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .trim()
        .to_lowercase();

    if email.is_empty() || !state.config.admin_emails.iter().any(|e| e == &email) {
        tracing::warn!(%email, "admin request with unlisted identity");
        return Err(AppError::Forbidden);
    }

    Ok(())
}

#[derive(Deserialize)]
pub struct ListQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub search: Option<String>,
    pub status: Option<String>,
    #[serde(rename = "sortBy")]
    pub sort_by: Option<String>,
    #[serde(rename = "sortOrder")]
    pub sort_order: Option<String>,
    #[serde(rename = "dateFrom")]
    pub date_from: Option<String>,
    #[serde(rename = "dateTo")]
    pub date_to: Option<String>,
}

fn valid_date(value: Option<String>, field: &str) -> Result<Option<String>, AppError> {
    match value {
        None => Ok(None),
        Some(s) => {
            let s = s.trim().to_string();
            if s.is_empty() {
                return Ok(None);
            }
            NaiveDate::parse_from_str(&s, DATE_FMT)
                .map_err(|_| AppError::Validation(format!("{field} must be YYYY-MM-DD")))?;
            Ok(Some(s))
        }
    }
}

/// Sort columns are whitelisted here; anything else silently falls back to
/// the default so sortBy never reaches the SQL layer unchecked.
fn to_list_params(
    q: ListQuery,
    sortable: &[&str],
    default_sort: &str,
    statuses: &[&str],
) -> Result<ListParams, AppError> {
    let sort_by = q
        .sort_by
        .filter(|s| sortable.contains(&s.as_str()))
        .unwrap_or_else(|| default_sort.to_string());
    let sort_order = match q.sort_order.as_deref() {
        Some("asc") | Some("ASC") => "ASC",
        _ => "DESC",
    };

    let status = match q.status {
        None => None,
        Some(s) => {
            let s = s.trim().to_string();
            if s.is_empty() {
                None
            } else if statuses.contains(&s.as_str()) {
                Some(s)
            } else {
                return Err(AppError::Validation("unknown status filter".to_string()));
            }
        }
    };

    Ok(ListParams {
        page: q.page.unwrap_or(1).max(1),
        limit: q.limit.unwrap_or(20).clamp(1, MAX_PAGE_SIZE),
        search: q.search.map(|s| s.trim().to_string()).filter(|s| !s.is_empty()),
        status,
        date_from: valid_date(q.date_from, "dateFrom")?,
        date_to: valid_date(q.date_to, "dateTo")?,
        sort_by,
        sort_order: sort_order.to_string(),
    })
}

fn pagination(page: i64, limit: i64, total: i64) -> serde_json::Value {
    serde_json::json!({
        "page": page,
        "limit": limit,
        "total": total,
        "totalPages": (total + limit - 1) / limit,
    })
}

// ── Bookings ──

#[derive(Serialize)]
pub struct BookingResponse {
    id: String,
    #[serde(rename = "packageId")]
    package_id: String,
    #[serde(rename = "customerName")]
    customer_name: String,
    #[serde(rename = "customerEmail")]
    customer_email: String,
    #[serde(rename = "customerPhone")]
    customer_phone: String,
    #[serde(rename = "bookingDate")]
    booking_date: String,
    #[serde(rename = "bookingTime")]
    booking_time: String,
    status: String,
    #[serde(rename = "totalAmount")]
    total_amount: f64,
    #[serde(rename = "peopleCount")]
    people_count: Option<i64>,
    notes: Option<String>,
    locale: String,
    #[serde(rename = "createdAt")]
    created_at: String,
    #[serde(rename = "updatedAt")]
    updated_at: String,
}

impl From<Booking> for BookingResponse {
    fn from(b: Booking) -> Self {
        BookingResponse {
            id: b.id,
            package_id: b.package_id.as_str().to_string(),
            customer_name: b.customer_name,
            customer_email: b.customer_email,
            customer_phone: b.customer_phone,
            booking_date: b.booking_date.format(DATE_FMT).to_string(),
            booking_time: b.booking_time,
            status: b.status.as_str().to_string(),
            total_amount: b.total_amount,
            people_count: b.people_count,
            notes: b.notes,
            locale: b.locale,
            created_at: b.created_at.format(TS_FMT).to_string(),
            updated_at: b.updated_at.format(TS_FMT).to_string(),
        }
    }
}

const BOOKING_STATUSES: &[&str] = &["draft", "pending", "confirmed", "cancelled", "completed"];
const BOOKING_SORTS: &[&str] = &["created_at", "booking_date", "total_amount", "status", "customer_name"];

// GET /api/admin/bookings
pub async fn get_bookings(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<ListQuery>,
) -> Result<Json<serde_json::Value>, AppError> {
    check_admin(&headers, &state)?;
    enforce_rate_limit(&state, &headers, "admin_list")?;

    let params = to_list_params(query, BOOKING_SORTS, "created_at", BOOKING_STATUSES)?;
    let (bookings, total) = {
        let db = state.db.lock().unwrap();
        queries::list_bookings(&db, &params)?
    };

    let data: Vec<BookingResponse> = bookings.into_iter().map(Into::into).collect();
    Ok(Json(serde_json::json!({
        "data": data,
        "pagination": pagination(params.page, params.limit, total),
    })))
}

// PATCH /api/admin/bookings
#[derive(Deserialize)]
pub struct UpdateBookingRequest {
    #[serde(rename = "bookingId")]
    pub booking_id: String,
    pub status: String,
}

pub async fn update_booking_status(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<UpdateBookingRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    check_admin(&headers, &state)?;

    let status = BookingStatus::parse_admin_target(&body.status)
        .ok_or_else(|| AppError::Validation("status must be one of pending, confirmed, cancelled, completed".to_string()))?;

    let updated = {
        let db = state.db.lock().unwrap();
        queries::set_booking_status(&db, &body.booking_id, status)?
    };

    if !updated {
        return Err(AppError::NotFound("booking".to_string()));
    }

    tracing::info!(booking_id = %body.booking_id, status = status.as_str(), "booking status updated by admin");
    Ok(Json(serde_json::json!({ "success": true })))
}

// ── Customers ──

#[derive(Serialize)]
pub struct CustomerResponse {
    email: String,
    name: String,
    phone: String,
    #[serde(rename = "createdAt")]
    created_at: String,
    #[serde(rename = "confirmedBookings")]
    confirmed_bookings: i64,
    #[serde(rename = "totalValue")]
    total_value: f64,
    #[serde(rename = "totalPaid")]
    total_paid: f64,
    #[serde(rename = "outstandingBalance")]
    outstanding_balance: f64,
    #[serde(rename = "lastBookingDate")]
    last_booking_date: Option<String>,
    #[serde(rename = "lastBookingStatus")]
    last_booking_status: Option<String>,
}

const CUSTOMER_SORTS: &[&str] = &["created_at", "email", "name"];

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// Aggregates are joined in memory from two follow-up queries rather than a
/// DB-side join, so a missing foreign key never breaks the listing.
fn customer_aggregates(
    customers: Vec<Customer>,
    bookings: Vec<Booking>,
    payments: Vec<Payment>,
) -> Vec<CustomerResponse> {
    let mut paid_by_booking: HashMap<&str, f64> = HashMap::new();
    for payment in &payments {
        if payment.status == PaymentStatus::Success {
            if let Some(id) = payment.booking_id.as_deref() {
                *paid_by_booking.entry(id).or_insert(0.0) += payment.amount;
            }
        }
    }

    let mut bookings_by_email: HashMap<&str, Vec<&Booking>> = HashMap::new();
    for booking in &bookings {
        bookings_by_email
            .entry(booking.customer_email.as_str())
            .or_default()
            .push(booking);
    }

    customers
        .into_iter()
        .map(|customer| {
            let theirs = bookings_by_email
                .get(customer.email.as_str())
                .map(|v| v.as_slice())
                .unwrap_or(&[]);

            let confirmed: Vec<&&Booking> = theirs
                .iter()
                .filter(|b| {
                    matches!(b.status, BookingStatus::Confirmed | BookingStatus::Completed)
                })
                .collect();

            let total_value: f64 = confirmed.iter().map(|b| b.total_amount).sum();
            let total_paid: f64 = confirmed
                .iter()
                .filter_map(|b| paid_by_booking.get(b.id.as_str()))
                .sum();

            let last = theirs.iter().max_by_key(|b| (b.booking_date, b.created_at));

            CustomerResponse {
                email: customer.email,
                name: customer.name,
                phone: customer.phone,
                created_at: customer.created_at.format(TS_FMT).to_string(),
                confirmed_bookings: confirmed.len() as i64,
                total_value: round2(total_value),
                total_paid: round2(total_paid),
                outstanding_balance: round2(total_value - total_paid),
                last_booking_date: last.map(|b| b.booking_date.format(DATE_FMT).to_string()),
                last_booking_status: last.map(|b| b.status.as_str().to_string()),
            }
        })
        .collect()
}

// GET /api/admin/customers
pub async fn get_customers(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<ListQuery>,
) -> Result<Json<serde_json::Value>, AppError> {
    check_admin(&headers, &state)?;
    enforce_rate_limit(&state, &headers, "admin_list")?;

    let params = to_list_params(query, CUSTOMER_SORTS, "created_at", &[])?;

    let (customers, total, bookings, payments) = {
        let db = state.db.lock().unwrap();
        let (customers, total) = queries::list_customers(&db, &params)?;
        let emails: Vec<String> = customers.iter().map(|c| c.email.clone()).collect();
        let bookings = queries::bookings_for_emails(&db, &emails)?;
        let booking_ids: Vec<String> = bookings.iter().map(|b| b.id.clone()).collect();
        let payments = queries::payments_for_booking_ids(&db, &booking_ids)?;
        (customers, total, bookings, payments)
    };

    let data = customer_aggregates(customers, bookings, payments);
    Ok(Json(serde_json::json!({
        "data": data,
        "pagination": pagination(params.page, params.limit, total),
    })))
}

// ── Payments ──

#[derive(Serialize)]
pub struct PaymentResponse {
    id: String,
    #[serde(rename = "bookingId")]
    booking_id: Option<String>,
    provider: String,
    #[serde(rename = "providerOrderId")]
    provider_order_id: Option<String>,
    #[serde(rename = "conversationId")]
    conversation_id: Option<String>,
    status: String,
    amount: f64,
    currency: String,
    #[serde(rename = "createdAt")]
    created_at: String,
    #[serde(rename = "updatedAt")]
    updated_at: String,
}

impl From<Payment> for PaymentResponse {
    fn from(p: Payment) -> Self {
        PaymentResponse {
            id: p.id,
            booking_id: p.booking_id,
            provider: p.provider.as_str().to_string(),
            provider_order_id: p.provider_order_id,
            conversation_id: p.conversation_id,
            status: p.status.as_str().to_string(),
            amount: p.amount,
            currency: p.currency,
            created_at: p.created_at.format(TS_FMT).to_string(),
            updated_at: p.updated_at.format(TS_FMT).to_string(),
        }
    }
}

const PAYMENT_STATUSES: &[&str] = &["pending", "success", "failure"];
const PAYMENT_SORTS: &[&str] = &["created_at", "amount", "status", "provider"];

// GET /api/admin/payments
pub async fn get_payments(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<ListQuery>,
) -> Result<Json<serde_json::Value>, AppError> {
    check_admin(&headers, &state)?;
    enforce_rate_limit(&state, &headers, "admin_list")?;

    let params = to_list_params(query, PAYMENT_SORTS, "created_at", PAYMENT_STATUSES)?;
    let (payments, total) = {
        let db = state.db.lock().unwrap();
        queries::list_payments(&db, &params)?
    };

    let data: Vec<PaymentResponse> = payments.into_iter().map(Into::into).collect();
    Ok(Json(serde_json::json!({
        "data": data,
        "pagination": pagination(params.page, params.limit, total),
    })))
}

// ── Stats ──

// GET /api/admin/stats
pub async fn get_stats(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, AppError> {
    check_admin(&headers, &state)?;

    let stats = {
        let db = state.db.lock().unwrap();
        queries::get_admin_stats(&db)?
    };

    Ok(Json(serde_json::json!({
        "bookings": {
            "total": stats.total_bookings,
            "draft": stats.draft_bookings,
            "pending": stats.pending_bookings,
            "confirmed": stats.confirmed_bookings,
            "cancelled": stats.cancelled_bookings,
            "completed": stats.completed_bookings,
            "upcomingConfirmed": stats.upcoming_confirmed,
        },
        "revenue": {
            "confirmedTotal": round2(stats.confirmed_revenue),
            "depositsCollected": round2(stats.deposits_collected),
        },
        "customers": { "total": stats.total_customers },
    })))
}
