use std::sync::Arc;

use chrono::{Duration, NaiveDate, Utc};
use uuid::Uuid;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::{Booking, BookingStatus, Payment, PaymentProvider, PaymentStatus};
use crate::pricing::{self, PackageId, Quote};
use crate::state::AppState;

pub const DUPLICATE_WINDOW_MINUTES: i64 = 5;

/// A booking-creation request that already passed schema validation at the
/// handler boundary.
#[derive(Debug, Clone)]
pub struct DraftRequest {
    pub package: PackageId,
    pub customer_name: String,
    pub customer_email: String,
    pub customer_phone: String,
    pub booking_date: NaiveDate,
    pub booking_time: String,
    pub notes: Option<String>,
    pub locale: String,
    pub total_amount: f64,
    pub people_count: Option<i64>,
}

/// Draft creation: recompute the price server-side, reject tampered totals,
/// guard against double submission, upsert the customer, insert the booking.
pub fn create_draft(state: &Arc<AppState>, req: &DraftRequest) -> Result<Booking, AppError> {
    let quote = pricing::quote(req.package, req.booking_date, req.people_count)
        .map_err(|e| AppError::Validation(e.to_string()))?;

    if !pricing::amounts_match(quote.price, req.total_amount) {
        tracing::warn!(
            expected = quote.price,
            submitted = req.total_amount,
            email = %req.customer_email,
            "rejected booking with tampered total"
        );
        return Err(AppError::PriceMismatch);
    }

    let now = Utc::now().naive_utc();
    let booking = Booking {
        id: Uuid::new_v4().to_string(),
        package_id: req.package,
        customer_name: req.customer_name.clone(),
        customer_email: req.customer_email.clone(),
        customer_phone: req.customer_phone.clone(),
        booking_date: req.booking_date,
        booking_time: req.booking_time.clone(),
        status: BookingStatus::Draft,
        total_amount: quote.price,
        people_count: if req.package.is_per_person() {
            req.people_count
        } else {
            None
        },
        notes: req.notes.clone(),
        locale: req.locale.clone(),
        created_at: now,
        updated_at: now,
    };

    let db = state.db.lock().unwrap();

    let cutoff = now - Duration::minutes(DUPLICATE_WINDOW_MINUTES);
    if queries::has_recent_duplicate(
        &db,
        &req.customer_email,
        req.package,
        req.booking_date,
        &req.booking_time,
        &cutoff,
    )? {
        return Err(AppError::DuplicateBooking);
    }

    queries::upsert_customer(&db, &req.customer_email, &req.customer_name, &req.customer_phone)?;
    queries::create_booking(&db, &booking)?;

    Ok(booking)
}

/// Re-derives the deposit for (package, date, people) and rejects when the
/// client-submitted amount is off by more than a cent. Runs before any
/// provider call so a tampered amount never leaves the process.
pub fn expected_deposit(
    package: PackageId,
    date: NaiveDate,
    people_count: Option<i64>,
    claimed_amount: f64,
) -> Result<Quote, AppError> {
    let quote = pricing::quote(package, date, people_count)
        .map_err(|e| AppError::Validation(e.to_string()))?;

    if !pricing::amounts_match(quote.deposit_amount, claimed_amount) {
        tracing::warn!(
            expected = quote.deposit_amount,
            submitted = claimed_amount,
            package = package.as_str(),
            "rejected payment with tampered deposit"
        );
        return Err(AppError::PriceMismatch);
    }

    Ok(quote)
}

/// EUR deposit converted to TRY at the current rate.
pub async fn deposit_in_try(state: &Arc<AppState>, amount_eur: f64) -> Result<(f64, f64), AppError> {
    let rate = state.rates.eur_to_try().await.map_err(|e| {
        tracing::error!(error = %e, "exchange rate fetch failed");
        AppError::Unavailable("exchange rate source unreachable".to_string())
    })?;
    Ok((pricing::round2(amount_eur * rate), rate))
}

fn new_payment(
    booking_id: Option<String>,
    provider: PaymentProvider,
    provider_order_id: Option<String>,
    conversation_id: String,
    status: PaymentStatus,
    amount_eur: f64,
    provider_response: Option<String>,
) -> Payment {
    let now = Utc::now().naive_utc();
    Payment {
        id: Uuid::new_v4().to_string(),
        booking_id,
        provider,
        provider_order_id,
        conversation_id: Some(conversation_id),
        status,
        amount: amount_eur,
        currency: "EUR".to_string(),
        provider_response,
        created_at: now,
        updated_at: now,
    }
}

/// Synchronous card success: write the settled payment row, promote the
/// booking and dispatch the confirmation email.
pub async fn settle_card_success(
    state: &Arc<AppState>,
    booking_id: Option<String>,
    provider_payment_id: String,
    conversation_id: String,
    amount_eur: f64,
    provider_response: String,
) -> Result<(), AppError> {
    let payment = new_payment(
        booking_id.clone(),
        PaymentProvider::Iyzico,
        Some(provider_payment_id),
        conversation_id,
        PaymentStatus::Success,
        amount_eur,
        Some(provider_response),
    );

    let booking = {
        let db = state.db.lock().unwrap();
        queries::insert_payment(&db, &payment)?;
        match booking_id.as_deref() {
            Some(id) => {
                queries::confirm_booking(&db, id)?;
                queries::get_booking_by_id(&db, id)?
            }
            None => None,
        }
    };

    if let Some(booking) = &booking {
        send_confirmation(state, booking).await;
    }
    Ok(())
}

/// Declined card charge: keep the failure on record, leave the booking alone.
pub fn record_card_decline(
    state: &Arc<AppState>,
    booking_id: Option<String>,
    conversation_id: String,
    amount_eur: f64,
    code: &str,
    message: &str,
) -> Result<(), AppError> {
    let payment = new_payment(
        booking_id,
        PaymentProvider::Iyzico,
        None,
        conversation_id,
        PaymentStatus::Failure,
        amount_eur,
        Some(serde_json::json!({ "errorCode": code, "errorMessage": message }).to_string()),
    );

    let db = state.db.lock().unwrap();
    queries::insert_payment(&db, &payment)?;
    Ok(())
}

/// Hosted-invoice order created: pending payment row keyed by the provider
/// order id; the booking waits in `pending` for the webhook.
pub fn register_pending_order(
    state: &Arc<AppState>,
    booking_id: Option<String>,
    order_id: String,
    conversation_id: String,
    amount_eur: f64,
    provider_response: String,
) -> Result<(), AppError> {
    let payment = new_payment(
        booking_id.clone(),
        PaymentProvider::Turinvoice,
        Some(order_id),
        conversation_id,
        PaymentStatus::Pending,
        amount_eur,
        Some(provider_response),
    );

    let db = state.db.lock().unwrap();
    queries::insert_payment(&db, &payment)?;
    if let Some(id) = booking_id.as_deref() {
        queries::mark_booking_pending(&db, id)?;
    }
    Ok(())
}

pub enum WebhookResolution {
    /// No payment row yet for this order id: the frontend's own confirmation
    /// write is still in flight. Acknowledged so the provider stops retrying.
    NoMatchingPayment,
    /// Payment was already settled; replay is a no-op.
    AlreadySettled,
    Settled { booking_id: Option<String> },
}

/// Applies an authenticated "paid" webhook. The pending->success transition
/// is a conditional update; only the delivery that actually flips the row
/// promotes the booking and sends the email.
pub async fn apply_paid_webhook(
    state: &Arc<AppState>,
    order_id: &str,
    raw_payload: &str,
) -> Result<WebhookResolution, AppError> {
    let (resolution, booking) = {
        let db = state.db.lock().unwrap();

        let Some(payment) = queries::get_payment_by_order_id(&db, order_id)? else {
            return Ok(WebhookResolution::NoMatchingPayment);
        };

        let transitioned = queries::complete_payment(&db, order_id, raw_payload)?;
        if !transitioned {
            return Ok(WebhookResolution::AlreadySettled);
        }

        let booking = match payment.booking_id.as_deref() {
            Some(id) => {
                queries::confirm_booking(&db, id)?;
                queries::get_booking_by_id(&db, id)?
            }
            None => None,
        };

        (
            WebhookResolution::Settled {
                booking_id: payment.booking_id.clone(),
            },
            booking,
        )
    };

    if let Some(booking) = &booking {
        send_confirmation(state, booking).await;
    }
    Ok(resolution)
}

/// Confirmation email failures never fail the payment transaction.
pub async fn send_confirmation(state: &Arc<AppState>, booking: &Booking) {
    if let Err(e) = state.mailer.send_booking_confirmation(booking).await {
        tracing::error!(error = %e, booking_id = %booking.id, "failed to send confirmation email");
    }
}
