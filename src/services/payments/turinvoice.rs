use async_trait::async_trait;
use serde_json::json;

use super::{ChargeOutcome, ChargeRequest, PaymentGateway, ERR_UNREACHABLE};

/// Hosted-invoice gateway. `initialize` only creates the order; the charge
/// settles later through the webhook.
pub struct TurinvoiceGateway {
    api_key: String,
    base_url: String,
    client: reqwest::Client,
}

impl TurinvoiceGateway {
    pub fn new(api_key: String, base_url: String) -> Self {
        Self {
            api_key,
            base_url,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl PaymentGateway for TurinvoiceGateway {
    async fn initialize(&self, req: &ChargeRequest) -> anyhow::Result<ChargeOutcome> {
        let body = json!({
            "amount": format!("{:.2}", req.amount_try),
            "currency": "TRY",
            "description": req.description,
            "buyer_email": req.buyer_email,
            "buyer_name": req.buyer_name,
            "external_id": req.conversation_id,
            "locale": req.locale,
        });

        let response = self
            .client
            .post(format!("{}/api/orders", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await;

        let response = match response {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(error = %e, "invoice provider unreachable");
                return Ok(ChargeOutcome::Declined {
                    code: ERR_UNREACHABLE.to_string(),
                    message: "Payment provider could not be reached".to_string(),
                });
            }
        };

        let status = response.status();
        let data: serde_json::Value = match response.json().await {
            Ok(d) => d,
            Err(e) => {
                tracing::warn!(error = %e, "unparseable invoice provider response");
                return Ok(ChargeOutcome::Declined {
                    code: ERR_UNREACHABLE.to_string(),
                    message: "Payment provider returned an invalid response".to_string(),
                });
            }
        };

        if !status.is_success() {
            tracing::warn!(%status, "invoice order creation rejected");
            return Ok(ChargeOutcome::Declined {
                code: "request_rejected".to_string(),
                message: data["message"]
                    .as_str()
                    .unwrap_or("Order creation was rejected")
                    .to_string(),
            });
        }

        let order_id = data["id_order"]
            .as_str()
            .map(|s| s.to_string())
            .unwrap_or_else(|| data["id_order"].to_string());
        let payment_url = data["payment_url"].as_str().unwrap_or_default().to_string();

        if order_id.is_empty() || order_id == "null" || payment_url.is_empty() {
            return Ok(ChargeOutcome::Declined {
                code: "request_rejected".to_string(),
                message: "Order creation response was incomplete".to_string(),
            });
        }

        Ok(ChargeOutcome::Redirect {
            order_id,
            payment_url,
        })
    }
}
