use std::sync::{Arc, Mutex};

use rusqlite::Connection;

use crate::config::AppConfig;
use crate::models::PaymentProvider;
use crate::services::exchange::RateSource;
use crate::services::mailer::Mailer;
use crate::services::payments::PaymentGateway;

pub struct AppState {
    pub db: Arc<Mutex<Connection>>,
    pub config: AppConfig,
    pub card_gateway: Box<dyn PaymentGateway>,
    pub invoice_gateway: Box<dyn PaymentGateway>,
    pub rates: Box<dyn RateSource>,
    pub mailer: Box<dyn Mailer>,
}

impl AppState {
    pub fn gateway(&self, provider: PaymentProvider) -> &dyn PaymentGateway {
        match provider {
            PaymentProvider::Iyzico => self.card_gateway.as_ref(),
            PaymentProvider::Turinvoice => self.invoice_gateway.as_ref(),
        }
    }
}
