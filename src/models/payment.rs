use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    pub id: String,
    pub booking_id: Option<String>,
    pub provider: PaymentProvider,
    pub provider_order_id: Option<String>,
    pub conversation_id: Option<String>,
    pub status: PaymentStatus,
    pub amount: f64,
    pub currency: String,
    pub provider_response: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PaymentProvider {
    Iyzico,
    Turinvoice,
}

impl PaymentProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentProvider::Iyzico => "iyzico",
            PaymentProvider::Turinvoice => "turinvoice",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "turinvoice" => PaymentProvider::Turinvoice,
            _ => PaymentProvider::Iyzico,
        }
    }
}

/// Only moves pending -> success or pending -> failure; the transition is
/// enforced with a conditional UPDATE in the query layer.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Success,
    Failure,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Success => "success",
            PaymentStatus::Failure => "failure",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "success" => PaymentStatus::Success,
            "failure" => PaymentStatus::Failure,
            _ => PaymentStatus::Pending,
        }
    }
}
