use anyhow::Context;
use async_trait::async_trait;

#[async_trait]
pub trait RateSource: Send + Sync {
    /// Current EUR -> TRY rate.
    async fn eur_to_try(&self) -> anyhow::Result<f64>;
}

/// Fetches the configured exchange-rate endpoint (frankfurter-style payload:
/// `{"rates":{"TRY":36.91}}`).
pub struct HttpRateSource {
    url: String,
    client: reqwest::Client,
}

impl HttpRateSource {
    pub fn new(url: String) -> Self {
        Self {
            url,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl RateSource for HttpRateSource {
    async fn eur_to_try(&self) -> anyhow::Result<f64> {
        let data: serde_json::Value = self
            .client
            .get(&self.url)
            .send()
            .await
            .context("failed to call exchange rate source")?
            .json()
            .await
            .context("failed to parse exchange rate response")?;

        data["rates"]["TRY"]
            .as_f64()
            .filter(|rate| *rate > 0.0)
            .ok_or_else(|| anyhow::anyhow!("missing TRY rate in exchange response"))
    }
}

/// Fixed rate, used by tests and local development.
pub struct FixedRateSource(pub f64);

#[async_trait]
impl RateSource for FixedRateSource {
    async fn eur_to_try(&self) -> anyhow::Result<f64> {
        Ok(self.0)
    }
}
