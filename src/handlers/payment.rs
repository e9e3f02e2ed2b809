use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;
use chrono::NaiveDate;
use serde::Deserialize;
use uuid::Uuid;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::PaymentProvider;
use crate::pricing::PackageId;
use crate::services::checkout;
use crate::services::payments::{CardDetails, ChargeOutcome, ChargeRequest};
use crate::state::AppState;

use super::enforce_rate_limit;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardData {
    pub card_holder_name: String,
    pub card_number: String,
    pub expire_month: String,
    pub expire_year: String,
    pub cvc: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerData {
    pub name: String,
    pub email: String,
    pub phone: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardPaymentRequest {
    pub payment_data: CardData,
    pub customer_data: CustomerData,
    pub amount: f64,
    pub package_id: String,
    pub booking_date: String,
    pub people_count: Option<i64>,
    pub booking_id: Option<String>,
    pub locale: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoicePaymentRequest {
    pub customer_data: CustomerData,
    pub amount: f64,
    pub package_id: String,
    pub booking_date: String,
    pub people_count: Option<i64>,
    pub booking_id: Option<String>,
    pub locale: Option<String>,
}

struct ValidatedInit {
    package: PackageId,
    date: NaiveDate,
    locale: String,
}

fn validate_init(
    package_id: &str,
    booking_date: &str,
    locale: Option<&str>,
    customer: &CustomerData,
) -> Result<ValidatedInit, AppError> {
    let package = PackageId::parse(package_id.trim())
        .ok_or_else(|| AppError::Validation("unknown package id".to_string()))?;
    let date = NaiveDate::parse_from_str(booking_date.trim(), "%Y-%m-%d")
        .map_err(|_| AppError::Validation("booking date must be YYYY-MM-DD".to_string()))?;

    if customer.email.trim().is_empty() || !customer.email.contains('@') {
        return Err(AppError::Validation("a valid email is required".to_string()));
    }
    if customer.name.trim().is_empty() {
        return Err(AppError::Validation("customer name is required".to_string()));
    }

    let locale = match locale {
        Some("tr") => "tr",
        Some("de") => "de",
        _ => "en",
    }
    .to_string();

    Ok(ValidatedInit { package, date, locale })
}

// POST /api/payment/initialize — synchronous card charge.
pub async fn initialize_card(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<CardPaymentRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    enforce_rate_limit(&state, &headers, "payment_initialize")?;

    let init = validate_init(
        &body.package_id,
        &body.booking_date,
        body.locale.as_deref(),
        &body.customer_data,
    )?;

    // The client-submitted amount is advisory; the quote is authoritative.
    let quote = checkout::expected_deposit(init.package, init.date, body.people_count, body.amount)?;
    let (amount_try, exchange_rate) = checkout::deposit_in_try(&state, quote.deposit_amount).await?;

    let conversation_id = Uuid::new_v4().to_string();
    let request = ChargeRequest {
        conversation_id: conversation_id.clone(),
        amount_try,
        amount_eur: quote.deposit_amount,
        buyer_name: body.customer_data.name.trim().to_string(),
        buyer_email: body.customer_data.email.trim().to_lowercase(),
        buyer_phone: body.customer_data.phone.trim().to_string(),
        description: quote.display_name.to_string(),
        locale: init.locale,
        card: Some(CardDetails {
            holder_name: body.payment_data.card_holder_name,
            number: body.payment_data.card_number,
            expire_month: body.payment_data.expire_month,
            expire_year: body.payment_data.expire_year,
            cvc: body.payment_data.cvc,
        }),
    };

    let outcome = state
        .gateway(PaymentProvider::Iyzico)
        .initialize(&request)
        .await
        .map_err(|e| AppError::Payment(e.to_string()))?;

    match outcome {
        ChargeOutcome::Completed { payment_id } => {
            tracing::info!(%conversation_id, %payment_id, "card payment completed");
            checkout::settle_card_success(
                &state,
                body.booking_id,
                payment_id.clone(),
                conversation_id.clone(),
                quote.deposit_amount,
                serde_json::json!({ "paymentId": payment_id }).to_string(),
            )
            .await?;

            Ok(Json(serde_json::json!({
                "success": true,
                "status": "success",
                "paymentId": payment_id,
                "conversationId": conversation_id,
                "amountEUR": quote.deposit_amount,
                "amountTRY": amount_try,
                "exchangeRate": exchange_rate,
            })))
        }
        ChargeOutcome::Declined { code, message } => {
            tracing::warn!(%conversation_id, code, "card payment declined");
            checkout::record_card_decline(
                &state,
                body.booking_id,
                conversation_id.clone(),
                quote.deposit_amount,
                &code,
                &message,
            )?;

            Ok(Json(serde_json::json!({
                "success": false,
                "status": "failure",
                "conversationId": conversation_id,
                "errorCode": code,
                "errorMessage": message,
            })))
        }
        ChargeOutcome::Redirect { .. } => Err(AppError::Payment(
            "card gateway returned a redirect".to_string(),
        )),
    }
}

// POST /api/payment/initialize/turinvoice — hosted-invoice order creation.
pub async fn initialize_invoice(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<InvoicePaymentRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    enforce_rate_limit(&state, &headers, "payment_initialize")?;

    let init = validate_init(
        &body.package_id,
        &body.booking_date,
        body.locale.as_deref(),
        &body.customer_data,
    )?;

    let quote = checkout::expected_deposit(init.package, init.date, body.people_count, body.amount)?;
    let (amount_try, exchange_rate) = checkout::deposit_in_try(&state, quote.deposit_amount).await?;

    let conversation_id = Uuid::new_v4().to_string();
    let request = ChargeRequest {
        conversation_id: conversation_id.clone(),
        amount_try,
        amount_eur: quote.deposit_amount,
        buyer_name: body.customer_data.name.trim().to_string(),
        buyer_email: body.customer_data.email.trim().to_lowercase(),
        buyer_phone: body.customer_data.phone.trim().to_string(),
        description: quote.display_name.to_string(),
        locale: init.locale,
        card: None,
    };

    let outcome = state
        .gateway(PaymentProvider::Turinvoice)
        .initialize(&request)
        .await
        .map_err(|e| AppError::Payment(e.to_string()))?;

    match outcome {
        ChargeOutcome::Redirect { order_id, payment_url } => {
            tracing::info!(%conversation_id, %order_id, "invoice order created");
            checkout::register_pending_order(
                &state,
                body.booking_id,
                order_id.clone(),
                conversation_id.clone(),
                quote.deposit_amount,
                serde_json::json!({
                    "idOrder": order_id,
                    "paymentUrl": payment_url,
                    "amountTRY": amount_try,
                    "exchangeRate": exchange_rate,
                })
                .to_string(),
            )?;

            Ok(Json(serde_json::json!({
                "success": true,
                "idOrder": order_id,
                "paymentUrl": payment_url,
                "amountEUR": quote.deposit_amount,
                "amountTRY": amount_try,
                "exchangeRate": exchange_rate,
                "currency": "TRY",
                "state": "pending",
            })))
        }
        ChargeOutcome::Declined { code, message } => {
            tracing::warn!(%conversation_id, code, "invoice order creation failed");
            Ok(Json(serde_json::json!({
                "success": false,
                "errorCode": code,
                "errorMessage": message,
            })))
        }
        ChargeOutcome::Completed { .. } => Err(AppError::Payment(
            "invoice gateway settled synchronously".to_string(),
        )),
    }
}

// GET /api/payment/status/:order_id — polled by the frontend while the
// hosted flow completes.
pub async fn payment_status(
    State(state): State<Arc<AppState>>,
    Path(order_id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let payment = {
        let db = state.db.lock().unwrap();
        queries::get_payment_by_order_id(&db, &order_id)?
    };

    let payment = payment.ok_or_else(|| AppError::NotFound("payment".to_string()))?;

    Ok(Json(serde_json::json!({
        "status": payment.status.as_str(),
        "bookingId": payment.booking_id,
    })))
}
