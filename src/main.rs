use std::sync::{Arc, Mutex};

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use shutterbook::config::AppConfig;
use shutterbook::db;
use shutterbook::handlers;
use shutterbook::services::exchange::HttpRateSource;
use shutterbook::services::mailer::HttpMailer;
use shutterbook::services::payments::iyzico::IyzicoGateway;
use shutterbook::services::payments::turinvoice::TurinvoiceGateway;
use shutterbook::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = AppConfig::from_env();

    let conn = db::init_db(&config.database_url)?;

    if config.payment_demo_mode {
        tracing::warn!("card gateway running in DEMO mode; only the test card will be accepted");
    }
    let card_gateway = IyzicoGateway::new(
        config.iyzico_api_key.clone(),
        config.iyzico_secret_key.clone(),
        config.iyzico_base_url.clone(),
        config.payment_demo_mode,
    );
    let invoice_gateway = TurinvoiceGateway::new(
        config.turinvoice_api_key.clone(),
        config.turinvoice_base_url.clone(),
    );
    let rates = HttpRateSource::new(config.exchange_rate_url.clone());
    let mailer = HttpMailer::new(
        config.mail_api_url.clone(),
        config.mail_api_key.clone(),
        config.mail_from.clone(),
    );

    let state = Arc::new(AppState {
        db: Arc::new(Mutex::new(conn)),
        config: config.clone(),
        card_gateway: Box::new(card_gateway),
        invoice_gateway: Box::new(invoice_gateway),
        rates: Box::new(rates),
        mailer: Box::new(mailer),
    });

    let app = Router::new()
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
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state);

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("starting server on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
