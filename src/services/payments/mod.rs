pub mod iyzico;
pub mod turinvoice;

use async_trait::async_trait;

/// Card data for the synchronous charge path. The hosted-invoice gateway
/// never sees card details.
#[derive(Debug, Clone)]
pub struct CardDetails {
    pub holder_name: String,
    pub number: String,
    pub expire_month: String,
    pub expire_year: String,
    pub cvc: String,
}

#[derive(Debug, Clone)]
pub struct ChargeRequest {
    pub conversation_id: String,
    /// Deposit converted to TRY at request time, rounded to 2 decimals.
    pub amount_try: f64,
    pub amount_eur: f64,
    pub buyer_name: String,
    pub buyer_email: String,
    pub buyer_phone: String,
    pub description: String,
    pub locale: String,
    pub card: Option<CardDetails>,
}

/// Discriminated gateway result. Transport failures are reported as
/// `Declined` with the `provider_unreachable` code so callers can tell them
/// apart from provider-declared declines like an invalid card.
#[derive(Debug, Clone)]
pub enum ChargeOutcome {
    Completed { payment_id: String },
    Redirect { order_id: String, payment_url: String },
    Declined { code: String, message: String },
}

pub const ERR_UNREACHABLE: &str = "provider_unreachable";

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn initialize(&self, req: &ChargeRequest) -> anyhow::Result<ChargeOutcome>;
}
