use std::env;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub port: u16,
    pub database_url: String,
    pub admin_token: String,
    /// Only these identities may use the admin API.
    pub admin_emails: Vec<String>,
    pub iyzico_api_key: String,
    pub iyzico_secret_key: String,
    pub iyzico_base_url: String,
    /// When set, the card gateway never calls out and only the designated
    /// test card succeeds. Defaults to on when no credentials are configured.
    pub payment_demo_mode: bool,
    pub turinvoice_api_key: String,
    pub turinvoice_base_url: String,
    pub turinvoice_webhook_secret: String,
    pub exchange_rate_url: String,
    pub mail_api_url: String,
    pub mail_api_key: String,
    pub mail_from: String,
    /// Requests allowed per ip/action inside one 60s window.
    pub rate_limit_max: i64,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let iyzico_api_key = env::var("IYZICO_API_KEY").unwrap_or_default();
        let payment_demo_mode = env::var("PAYMENT_DEMO_MODE")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or_else(|| iyzico_api_key.trim().is_empty());

        Self {
            port: env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3000),
            database_url: env::var("DATABASE_URL").unwrap_or_else(|_| "shutterbook.db".to_string()),
            admin_token: env::var("ADMIN_TOKEN").unwrap_or_else(|_| "changeme".to_string()),
            admin_emails: env::var("ADMIN_EMAILS")
                .unwrap_or_default()
                .split(',')
                .map(|s| s.trim().to_lowercase())
                .filter(|s| !s.is_empty())
                .collect(),
            iyzico_api_key,
            iyzico_secret_key: env::var("IYZICO_SECRET_KEY").unwrap_or_default(),
            iyzico_base_url: env::var("IYZICO_BASE_URL")
                .unwrap_or_else(|_| "https://api.iyzipay.com".to_string()),
            payment_demo_mode,
            turinvoice_api_key: env::var("TURINVOICE_API_KEY").unwrap_or_default(),
            turinvoice_base_url: env::var("TURINVOICE_BASE_URL")
                .unwrap_or_else(|_| "https://api.turinvoice.com".to_string()),
            turinvoice_webhook_secret: env::var("TURINVOICE_WEBHOOK_SECRET").unwrap_or_default(),
            exchange_rate_url: env::var("EXCHANGE_RATE_URL")
                .unwrap_or_else(|_| "https://api.frankfurter.app/latest?from=EUR&to=TRY".to_string()),
            mail_api_url: env::var("MAIL_API_URL")
                .unwrap_or_else(|_| "https://api.resend.com/emails".to_string()),
            mail_api_key: env::var("MAIL_API_KEY").unwrap_or_default(),
            mail_from: env::var("MAIL_FROM")
                .unwrap_or_else(|_| "bookings@shutterbook.example".to_string()),
            rate_limit_max: env::var("RATE_LIMIT_MAX")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(20),
        }
    }
}
