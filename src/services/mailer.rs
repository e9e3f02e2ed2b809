use anyhow::Context;
use async_trait::async_trait;
use serde_json::json;

use crate::models::Booking;

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_booking_confirmation(&self, booking: &Booking) -> anyhow::Result<()>;
}

/// HTTP mail API client (Resend-style `POST /emails` with bearer auth).
pub struct HttpMailer {
    api_url: String,
    api_key: String,
    from: String,
    client: reqwest::Client,
}

impl HttpMailer {
    pub fn new(api_url: String, api_key: String, from: String) -> Self {
        Self {
            api_url,
            api_key,
            from,
            client: reqwest::Client::new(),
        }
    }
}

fn confirmation_subject(locale: &str) -> &'static str {
    match locale {
        "tr" => "Rezervasyonunuz onaylandı",
        "de" => "Ihre Buchung ist bestätigt",
        _ => "Your booking is confirmed",
    }
}

fn confirmation_body(booking: &Booking) -> String {
    let date = booking.booking_date.format("%Y-%m-%d");
    match booking.locale.as_str() {
        "tr" => format!(
            "Merhaba {},\n\n{} rezervasyonunuz {} {} için onaylandı.\n\nGörüşmek üzere!",
            booking.customer_name,
            booking.package_id.display_name(),
            date,
            booking.booking_time,
        ),
        "de" => format!(
            "Hallo {},\n\nIhre Buchung ({}) am {} um {} ist bestätigt.\n\nBis bald!",
            booking.customer_name,
            booking.package_id.display_name(),
            date,
            booking.booking_time,
        ),
        _ => format!(
            "Hi {},\n\nYour {} on {} at {} is confirmed.\n\nSee you soon!",
            booking.customer_name,
            booking.package_id.display_name(),
            date,
            booking.booking_time,
        ),
    }
}

#[async_trait]
impl Mailer for HttpMailer {
    async fn send_booking_confirmation(&self, booking: &Booking) -> anyhow::Result<()> {
        let body = json!({
            "from": self.from,
            "to": [booking.customer_email],
            "subject": confirmation_subject(&booking.locale),
            "text": confirmation_body(booking),
        });

        self.client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .context("failed to call mail API")?
            .error_for_status()
            .context("mail API returned error")?;

        Ok(())
    }
}
