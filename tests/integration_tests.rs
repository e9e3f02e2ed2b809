use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::routing::{get, post};
use axum::Router;
use tower::ServiceExt;

use shutterbook::config::AppConfig;
use shutterbook::db;
use shutterbook::handlers;
use shutterbook::models::Booking;
use shutterbook::services::exchange::FixedRateSource;
use shutterbook::services::mailer::Mailer;
use shutterbook::services::payments::iyzico::{IyzicoGateway, DEMO_TEST_CARD};
use shutterbook::services::payments::{ChargeOutcome, ChargeRequest, PaymentGateway};
use shutterbook::state::AppState;

// ── Mock providers ──

/// Hosted-invoice gateway double: always returns a redirect whose order id
/// echoes the conversation id.
struct MockInvoiceGateway;

#[async_trait]
impl PaymentGateway for MockInvoiceGateway {
    async fn initialize(&self, req: &ChargeRequest) -> anyhow::Result<ChargeOutcome> {
        Ok(ChargeOutcome::Redirect {
            order_id: format!("ord-{}", req.conversation_id),
            payment_url: format!("https://pay.example/{}", req.conversation_id),
        })
    }
}

struct MockMailer {
    sent: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl Mailer for MockMailer {
    async fn send_booking_confirmation(&self, booking: &Booking) -> anyhow::Result<()> {
        self.sent.lock().unwrap().push(booking.id.clone());
        Ok(())
    }
}

// ── Helpers ──

fn test_config(rate_limit_max: i64) -> AppConfig {
    AppConfig {
        port: 3000,
        database_url: ":memory:".to_string(),
        admin_token: "test-token".to_string(),
        admin_emails: vec!["admin@example.com".to_string()],
        iyzico_api_key: "".to_string(),
        iyzico_secret_key: "".to_string(),
        iyzico_base_url: "".to_string(),
        payment_demo_mode: true,
        turinvoice_api_key: "".to_string(),
        turinvoice_base_url: "".to_string(),
        turinvoice_webhook_secret: "hook-secret".to_string(),
        exchange_rate_url: "".to_string(),
        mail_api_url: "".to_string(),
        mail_api_key: "".to_string(),
        mail_from: "bookings@test.example".to_string(),
        rate_limit_max,
    }
}

fn test_state_with_limit(rate_limit_max: i64) -> (Arc<AppState>, Arc<Mutex<Vec<String>>>) {
    let config = test_config(rate_limit_max);
    let conn = db::init_db(":memory:").unwrap();
    let sent = Arc::new(Mutex::new(vec![]));

    let state = Arc::new(AppState {
        db: Arc::new(Mutex::new(conn)),
        config,
        card_gateway: Box::new(IyzicoGateway::new(
            String::new(),
            String::new(),
            String::new(),
            true,
        )),
        invoice_gateway: Box::new(MockInvoiceGateway),
        rates: Box::new(FixedRateSource(40.0)),
        mailer: Box::new(MockMailer {
            sent: Arc::clone(&sent),
        }),
    });
    (state, sent)
}

fn test_state() -> (Arc<AppState>, Arc<Mutex<Vec<String>>>) {
    test_state_with_limit(1000)
}

fn test_app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(handlers::health::health))
        .route("/api/booking", post(handlers::booking::create_draft))
        .route(
            "/api/booking/create-draft",
            post(handlers::booking::create_draft),
        )
        .route(
            "/api/payment/initialize",
            post(handlers::payment::initialize_card),
        )
        .route(
            "/api/payment/initialize/turinvoice",
            post(handlers::payment::initialize_invoice),
        )
        .route(
            "/api/payment/status/:order_id",
            get(handlers::payment::payment_status),
        )
        .route(
            "/api/payment/webhook/turinvoice",
            post(handlers::webhook::turinvoice_webhook),
        )
        .route(
            "/api/admin/bookings",
            get(handlers::admin::get_bookings).patch(handlers::admin::update_booking_status),
        )
        .route("/api/admin/customers", get(handlers::admin::get_customers))
        .route("/api/admin/payments", get(handlers::admin::get_payments))
        .route("/api/admin/stats", get(handlers::admin::get_stats))
        .with_state(state)
}

fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("Content-Type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn admin_get(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header("Authorization", "Bearer test-token")
        .header("X-Admin-Email", "admin@example.com")
        .body(Body::empty())
        .unwrap()
}

async fn body_json(res: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn draft_body(email: &str, date: &str, time: &str) -> serde_json::Value {
    serde_json::json!({
        "packageId": "essential",
        "customerName": "Alice Example",
        "customerEmail": email,
        "customerPhone": "+905551112233",
        "bookingDate": date,
        "bookingTime": time,
        "totalAmount": 150.0,
        "locale": "en",
    })
}

fn card_body(card: &str, amount: f64, booking_id: Option<&str>) -> serde_json::Value {
    serde_json::json!({
        "paymentData": {
            "cardHolderName": "Alice Example",
            "cardNumber": card,
            "expireMonth": "12",
            "expireYear": "2030",
            "cvc": "123",
        },
        "customerData": {
            "name": "Alice Example",
            "email": "alice@example.com",
            "phone": "+905551112233",
        },
        "amount": amount,
        "packageId": "essential",
        "bookingDate": "2025-09-10",
        "bookingId": booking_id,
        "locale": "en",
    })
}

fn invoice_body(amount: f64, booking_id: Option<&str>) -> serde_json::Value {
    serde_json::json!({
        "customerData": {
            "name": "Alice Example",
            "email": "alice@example.com",
            "phone": "+905551112233",
        },
        "amount": amount,
        "packageId": "essential",
        "bookingDate": "2025-09-10",
        "bookingId": booking_id,
        "locale": "en",
    })
}

fn webhook_body(order_id: &str, state: &str, secret: &str) -> serde_json::Value {
    serde_json::json!({
        "id": order_id,
        "state": state,
        "secret_key": secret,
        "amount": "1800.00",
    })
}

/// Creates a draft booking and returns its id.
async fn create_draft(state: &Arc<AppState>, email: &str, date: &str, time: &str) -> String {
    let app = test_app(state.clone());
    let res = app
        .oneshot(post_json("/api/booking", draft_body(email, date, time)))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let json = body_json(res).await;
    assert_eq!(json["success"], true);
    json["bookingId"].as_str().unwrap().to_string()
}

fn booking_status(state: &Arc<AppState>, id: &str) -> String {
    let db = state.db.lock().unwrap();
    shutterbook::db::queries::get_booking_by_id(&db, id)
        .unwrap()
        .unwrap()
        .status
        .as_str()
        .to_string()
}

// ── Health ──

#[tokio::test]
async fn test_health() {
    let (state, _) = test_state();
    let app = test_app(state);

    let res = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

// ── Booking creation ──

#[tokio::test]
async fn test_create_draft_booking() {
    let (state, _) = test_state();
    let id = create_draft(&state, "alice@example.com", "2025-09-10", "14:00").await;

    assert_eq!(booking_status(&state, &id), "draft");

    let db = state.db.lock().unwrap();
    let booking = shutterbook::db::queries::get_booking_by_id(&db, &id)
        .unwrap()
        .unwrap();
    assert_eq!(booking.total_amount, 150.0);
    assert_eq!(booking.customer_email, "alice@example.com");
}

#[tokio::test]
async fn test_create_draft_rejects_tampered_total() {
    let (state, _) = test_state();
    let app = test_app(state.clone());

    let mut body = draft_body("alice@example.com", "2025-09-10", "14:00");
    body["totalAmount"] = serde_json::json!(99.0);

    let res = app.oneshot(post_json("/api/booking", body)).await.unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    // No rows were written.
    let app = test_app(state);
    let res = app.oneshot(admin_get("/api/admin/bookings")).await.unwrap();
    let json = body_json(res).await;
    assert_eq!(json["pagination"]["total"], 0);
}

#[tokio::test]
async fn test_create_draft_rejects_unknown_package() {
    let (state, _) = test_state();
    let app = test_app(state);

    let mut body = draft_body("alice@example.com", "2025-09-10", "14:00");
    body["packageId"] = serde_json::json!("platinum");

    let res = app.oneshot(post_json("/api/booking", body)).await.unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_rooftop_people_count_bounds() {
    let (state, _) = test_state();

    // 4 people x 80 EUR, off-season.
    let app = test_app(state.clone());
    let mut body = draft_body("group@example.com", "2025-09-10", "14:00");
    body["packageId"] = serde_json::json!("rooftop");
    body["peopleCount"] = serde_json::json!(4);
    body["totalAmount"] = serde_json::json!(320.0);
    let res = app.oneshot(post_json("/api/booking", body)).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    // 11 people is out of range.
    let app = test_app(state);
    let mut body = draft_body("group@example.com", "2025-09-10", "15:00");
    body["packageId"] = serde_json::json!("rooftop");
    body["peopleCount"] = serde_json::json!(11);
    body["totalAmount"] = serde_json::json!(880.0);
    let res = app.oneshot(post_json("/api/booking", body)).await.unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_winter_discount_applies_to_total() {
    let (state, _) = test_state();
    let app = test_app(state);

    // 150 x 0.85 = 127.50 inside the winter window.
    let mut body = draft_body("winter@example.com", "2025-12-15", "14:00");
    body["totalAmount"] = serde_json::json!(127.50);

    let res = app.oneshot(post_json("/api/booking", body)).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_duplicate_booking_rejected_within_window() {
    let (state, _) = test_state();
    let id = create_draft(&state, "dup@example.com", "2025-09-10", "14:00").await;

    let app = test_app(state.clone());
    let res = app
        .oneshot(post_json(
            "/api/booking",
            draft_body("dup@example.com", "2025-09-10", "14:00"),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);

    // Same slot, different customer is fine.
    let app = test_app(state.clone());
    let res = app
        .oneshot(post_json(
            "/api/booking",
            draft_body("other@example.com", "2025-09-10", "14:00"),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    // Backdate the first booking past the 5-minute window; the resubmission
    // is then accepted.
    {
        let db = state.db.lock().unwrap();
        db.execute(
            "UPDATE bookings SET created_at = '2000-01-01 00:00:00' WHERE id = ?1",
            rusqlite::params![id],
        )
        .unwrap();
    }
    let app = test_app(state);
    let res = app
        .oneshot(post_json(
            "/api/booking",
            draft_body("dup@example.com", "2025-09-10", "14:00"),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

// ── Card payment (demo gateway) ──

#[tokio::test]
async fn test_card_payment_success_confirms_booking() {
    let (state, sent) = test_state();
    let booking_id = create_draft(&state, "alice@example.com", "2025-09-10", "14:00").await;

    let app = test_app(state.clone());
    let res = app
        .oneshot(post_json(
            "/api/payment/initialize",
            card_body(DEMO_TEST_CARD, 45.0, Some(&booking_id)),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let json = body_json(res).await;
    assert_eq!(json["success"], true);
    assert_eq!(json["status"], "success");
    assert_eq!(json["amountEUR"], 45.0);
    assert_eq!(json["amountTRY"], 1800.0);
    assert_eq!(json["exchangeRate"], 40.0);
    assert!(json["paymentId"].as_str().unwrap().starts_with("demo-"));

    assert_eq!(booking_status(&state, &booking_id), "confirmed");
    assert_eq!(sent.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_card_payment_decline_leaves_booking_draft() {
    let (state, sent) = test_state();
    let booking_id = create_draft(&state, "alice@example.com", "2025-09-10", "14:00").await;

    let app = test_app(state.clone());
    let res = app
        .oneshot(post_json(
            "/api/payment/initialize",
            card_body("4111111111111111", 45.0, Some(&booking_id)),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let json = body_json(res).await;
    assert_eq!(json["success"], false);
    assert_eq!(json["errorCode"], "invalid_card");

    assert_eq!(booking_status(&state, &booking_id), "draft");
    assert_eq!(sent.lock().unwrap().len(), 0);

    // The decline is on record.
    let app = test_app(state);
    let res = app
        .oneshot(admin_get("/api/admin/payments?status=failure"))
        .await
        .unwrap();
    let json = body_json(res).await;
    assert_eq!(json["pagination"]["total"], 1);
}

#[tokio::test]
async fn test_card_payment_rejects_tampered_deposit() {
    let (state, _) = test_state();
    let booking_id = create_draft(&state, "alice@example.com", "2025-09-10", "14:00").await;

    // Expected deposit is 45.00; 44.50 is off by more than a cent.
    let app = test_app(state.clone());
    let res = app
        .oneshot(post_json(
            "/api/payment/initialize",
            card_body(DEMO_TEST_CARD, 44.50, Some(&booking_id)),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    // No payment was written and the booking is untouched.
    assert_eq!(booking_status(&state, &booking_id), "draft");
    let app = test_app(state);
    let res = app.oneshot(admin_get("/api/admin/payments")).await.unwrap();
    let json = body_json(res).await;
    assert_eq!(json["pagination"]["total"], 0);
}

#[tokio::test]
async fn test_card_payment_accepts_within_cent_epsilon() {
    let (state, _) = test_state();

    let app = test_app(state);
    let res = app
        .oneshot(post_json(
            "/api/payment/initialize",
            card_body(DEMO_TEST_CARD, 45.01, None),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let json = body_json(res).await;
    assert_eq!(json["success"], true);
}

// ── Hosted invoice flow + webhook reconciliation ──

async fn start_invoice_flow(state: &Arc<AppState>, booking_id: &str) -> String {
    let app = test_app(state.clone());
    let res = app
        .oneshot(post_json(
            "/api/payment/initialize/turinvoice",
            invoice_body(45.0, Some(booking_id)),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let json = body_json(res).await;
    assert_eq!(json["success"], true);
    assert_eq!(json["currency"], "TRY");
    assert_eq!(json["state"], "pending");
    assert!(json["paymentUrl"].as_str().unwrap().starts_with("https://"));
    json["idOrder"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_invoice_initialize_marks_booking_pending() {
    let (state, _) = test_state();
    let booking_id = create_draft(&state, "alice@example.com", "2025-09-10", "14:00").await;

    let order_id = start_invoice_flow(&state, &booking_id).await;

    assert_eq!(booking_status(&state, &booking_id), "pending");

    let app = test_app(state);
    let res = app
        .oneshot(
            Request::builder()
                .uri(format!("/api/payment/status/{order_id}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let json = body_json(res).await;
    assert_eq!(json["status"], "pending");
    assert_eq!(json["bookingId"], booking_id.as_str());
}

#[tokio::test]
async fn test_webhook_paid_confirms_booking_and_is_idempotent() {
    let (state, sent) = test_state();
    let booking_id = create_draft(&state, "alice@example.com", "2025-09-10", "14:00").await;
    let order_id = start_invoice_flow(&state, &booking_id).await;

    // First delivery settles the payment, confirms the booking, sends mail.
    let app = test_app(state.clone());
    let res = app
        .oneshot(post_json(
            "/api/payment/webhook/turinvoice",
            webhook_body(&order_id, "paid", "hook-secret"),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(booking_status(&state, &booking_id), "confirmed");
    assert_eq!(sent.lock().unwrap().len(), 1);

    // Replay: still 200, nothing changes, no second email.
    let app = test_app(state.clone());
    let res = app
        .oneshot(post_json(
            "/api/payment/webhook/turinvoice",
            webhook_body(&order_id, "paid", "hook-secret"),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(booking_status(&state, &booking_id), "confirmed");
    assert_eq!(sent.lock().unwrap().len(), 1);

    // Poll endpoint reflects the settled payment.
    let app = test_app(state);
    let res = app
        .oneshot(
            Request::builder()
                .uri(format!("/api/payment/status/{order_id}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let json = body_json(res).await;
    assert_eq!(json["status"], "success");
}

#[tokio::test]
async fn test_webhook_rejects_bad_secret() {
    let (state, sent) = test_state();
    let booking_id = create_draft(&state, "alice@example.com", "2025-09-10", "14:00").await;
    let order_id = start_invoice_flow(&state, &booking_id).await;

    let app = test_app(state.clone());
    let res = app
        .oneshot(post_json(
            "/api/payment/webhook/turinvoice",
            webhook_body(&order_id, "paid", "wrong-secret"),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    assert_eq!(booking_status(&state, &booking_id), "pending");
    assert_eq!(sent.lock().unwrap().len(), 0);
}

#[tokio::test]
async fn test_webhook_rejects_malformed_payload() {
    let (state, _) = test_state();

    let app = test_app(state.clone());
    let res = app
        .oneshot(post_json(
            "/api/payment/webhook/turinvoice",
            serde_json::json!({ "state": "paid" }),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let app = test_app(state);
    let res = app
        .oneshot(post_json(
            "/api/payment/webhook/turinvoice",
            serde_json::json!({ "state": "paid", "secret_key": "hook-secret" }),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_webhook_unpaid_state_is_acknowledged_noop() {
    let (state, sent) = test_state();
    let booking_id = create_draft(&state, "alice@example.com", "2025-09-10", "14:00").await;
    let order_id = start_invoice_flow(&state, &booking_id).await;

    let app = test_app(state.clone());
    let res = app
        .oneshot(post_json(
            "/api/payment/webhook/turinvoice",
            webhook_body(&order_id, "waiting", "hook-secret"),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let json = body_json(res).await;
    assert_eq!(json["success"], true);

    assert_eq!(booking_status(&state, &booking_id), "pending");
    assert_eq!(sent.lock().unwrap().len(), 0);
}

#[tokio::test]
async fn test_webhook_unknown_order_acknowledged() {
    let (state, _) = test_state();

    let app = test_app(state);
    let res = app
        .oneshot(post_json(
            "/api/payment/webhook/turinvoice",
            webhook_body("no-such-order", "paid", "hook-secret"),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let json = body_json(res).await;
    assert_eq!(json["success"], true);
}

#[tokio::test]
async fn test_payment_status_unknown_order_is_404() {
    let (state, _) = test_state();
    let app = test_app(state);

    let res = app
        .oneshot(
            Request::builder()
                .uri("/api/payment/status/missing")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

// ── Admin API ──

#[tokio::test]
async fn test_admin_requires_token_and_listed_email() {
    let (state, _) = test_state();

    // No credentials.
    let app = test_app(state.clone());
    let res = app
        .oneshot(
            Request::builder()
                .uri("/api/admin/bookings")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    // Valid token, unlisted identity.
    let app = test_app(state.clone());
    let res = app
        .oneshot(
            Request::builder()
                .uri("/api/admin/bookings")
                .header("Authorization", "Bearer test-token")
                .header("X-Admin-Email", "intruder@example.com")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    // Wrong token, listed identity.
    let app = test_app(state.clone());
    let res = app
        .oneshot(
            Request::builder()
                .uri("/api/admin/bookings")
                .header("Authorization", "Bearer wrong")
                .header("X-Admin-Email", "admin@example.com")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let app = test_app(state);
    let res = app.oneshot(admin_get("/api/admin/bookings")).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_admin_bookings_filter_and_pagination() {
    let (state, _) = test_state();
    create_draft(&state, "a@example.com", "2025-09-10", "10:00").await;
    create_draft(&state, "b@example.com", "2025-09-11", "11:00").await;
    create_draft(&state, "c@example.com", "2025-09-12", "12:00").await;

    let app = test_app(state.clone());
    let res = app
        .oneshot(admin_get("/api/admin/bookings?page=1&limit=2"))
        .await
        .unwrap();
    let json = body_json(res).await;
    assert_eq!(json["data"].as_array().unwrap().len(), 2);
    assert_eq!(json["pagination"]["total"], 3);
    assert_eq!(json["pagination"]["totalPages"], 2);

    let app = test_app(state.clone());
    let res = app
        .oneshot(admin_get("/api/admin/bookings?search=b@example"))
        .await
        .unwrap();
    let json = body_json(res).await;
    assert_eq!(json["pagination"]["total"], 1);
    assert_eq!(json["data"][0]["customerEmail"], "b@example.com");

    let app = test_app(state.clone());
    let res = app
        .oneshot(admin_get("/api/admin/bookings?status=confirmed"))
        .await
        .unwrap();
    let json = body_json(res).await;
    assert_eq!(json["pagination"]["total"], 0);

    // Unknown status filter is rejected, unknown sort column falls back.
    let app = test_app(state.clone());
    let res = app
        .oneshot(admin_get("/api/admin/bookings?status=bogus"))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let app = test_app(state);
    let res = app
        .oneshot(admin_get("/api/admin/bookings?sortBy=evil;drop"))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_admin_updates_booking_status() {
    let (state, _) = test_state();
    let booking_id = create_draft(&state, "a@example.com", "2025-09-10", "10:00").await;

    let app = test_app(state.clone());
    let res = app
        .oneshot(
            Request::builder()
                .method("PATCH")
                .uri("/api/admin/bookings")
                .header("Authorization", "Bearer test-token")
                .header("X-Admin-Email", "admin@example.com")
                .header("Content-Type", "application/json")
                .body(Body::from(
                    serde_json::json!({ "bookingId": booking_id, "status": "cancelled" })
                        .to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(booking_status(&state, &booking_id), "cancelled");

    // Draft is not an admin-assignable status.
    let app = test_app(state.clone());
    let res = app
        .oneshot(
            Request::builder()
                .method("PATCH")
                .uri("/api/admin/bookings")
                .header("Authorization", "Bearer test-token")
                .header("X-Admin-Email", "admin@example.com")
                .header("Content-Type", "application/json")
                .body(Body::from(
                    serde_json::json!({ "bookingId": booking_id, "status": "draft" }).to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    // Unknown booking.
    let app = test_app(state);
    let res = app
        .oneshot(
            Request::builder()
                .method("PATCH")
                .uri("/api/admin/bookings")
                .header("Authorization", "Bearer test-token")
                .header("X-Admin-Email", "admin@example.com")
                .header("Content-Type", "application/json")
                .body(Body::from(
                    serde_json::json!({ "bookingId": "nope", "status": "confirmed" }).to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_admin_customer_aggregates() {
    let (state, _) = test_state();
    let booking_id = create_draft(&state, "alice@example.com", "2025-09-10", "14:00").await;

    // Pay the deposit with the demo card so the booking confirms.
    let app = test_app(state.clone());
    let res = app
        .oneshot(post_json(
            "/api/payment/initialize",
            card_body(DEMO_TEST_CARD, 45.0, Some(&booking_id)),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let app = test_app(state);
    let res = app.oneshot(admin_get("/api/admin/customers")).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let json = body_json(res).await;

    assert_eq!(json["pagination"]["total"], 1);
    let customer = &json["data"][0];
    assert_eq!(customer["email"], "alice@example.com");
    assert_eq!(customer["confirmedBookings"], 1);
    assert_eq!(customer["totalValue"], 150.0);
    assert_eq!(customer["totalPaid"], 45.0);
    assert_eq!(customer["outstandingBalance"], 105.0);
    assert_eq!(customer["lastBookingDate"], "2025-09-10");
    assert_eq!(customer["lastBookingStatus"], "confirmed");
}

#[tokio::test]
async fn test_admin_stats() {
    let (state, _) = test_state();
    let booking_id = create_draft(&state, "alice@example.com", "2999-09-10", "14:00").await;

    let app = test_app(state.clone());
    let res = app
        .oneshot(post_json(
            "/api/payment/initialize",
            card_body(DEMO_TEST_CARD, 45.0, Some(&booking_id)),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let app = test_app(state);
    let res = app.oneshot(admin_get("/api/admin/stats")).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let json = body_json(res).await;

    assert_eq!(json["bookings"]["total"], 1);
    assert_eq!(json["bookings"]["confirmed"], 1);
    assert_eq!(json["bookings"]["upcomingConfirmed"], 1);
    assert_eq!(json["revenue"]["confirmedTotal"], 150.0);
    assert_eq!(json["revenue"]["depositsCollected"], 45.0);
    assert_eq!(json["customers"]["total"], 1);
}

// ── Rate limiting ──

#[tokio::test]
async fn test_booking_creation_rate_limited() {
    let (state, _) = test_state_with_limit(3);

    for i in 0..3 {
        let app = test_app(state.clone());
        let res = app
            .oneshot(post_json(
                "/api/booking",
                draft_body(&format!("u{i}@example.com"), "2025-09-10", &format!("{:02}:00", 10 + i)),
            ))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }

    let app = test_app(state);
    let res = app
        .oneshot(post_json(
            "/api/booking",
            draft_body("u9@example.com", "2025-09-10", "19:00"),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);
    let json = body_json(res).await;
    assert!(json["resetTime"].as_str().is_some());
}
