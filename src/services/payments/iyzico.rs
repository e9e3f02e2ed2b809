use async_trait::async_trait;
use base64::Engine;
use hmac::{Hmac, Mac};
use serde_json::json;
use sha1::Sha1;

use super::{ChargeOutcome, ChargeRequest, PaymentGateway, ERR_UNREACHABLE};

const CHARGE_PATH: &str = "/payment/auth";

/// The only card number the demo gateway accepts.
pub const DEMO_TEST_CARD: &str = "5528790000000008";

pub struct IyzicoGateway {
    api_key: String,
    secret_key: String,
    base_url: String,
    demo_mode: bool,
    client: reqwest::Client,
}

impl IyzicoGateway {
    pub fn new(api_key: String, secret_key: String, base_url: String, demo_mode: bool) -> Self {
        Self {
            api_key,
            secret_key,
            base_url,
            demo_mode,
            client: reqwest::Client::new(),
        }
    }
}

/// Request signature: HMAC-SHA1 over nonce + request path + JSON body,
/// base64-encoded, carried in the Authorization header next to the api key.
fn sign_request(secret_key: &str, nonce: &str, path: &str, body: &str) -> String {
    let mut data = String::with_capacity(nonce.len() + path.len() + body.len());
    data.push_str(nonce);
    data.push_str(path);
    data.push_str(body);

    let mut mac = match Hmac::<Sha1>::new_from_slice(secret_key.as_bytes()) {
        Ok(m) => m,
        Err(_) => return String::new(),
    };
    mac.update(data.as_bytes());
    let result = mac.finalize().into_bytes();
    base64::engine::general_purpose::STANDARD.encode(result)
}

fn demo_charge(req: &ChargeRequest) -> anyhow::Result<ChargeOutcome> {
    let card = req
        .card
        .as_ref()
        .ok_or_else(|| anyhow::anyhow!("card details required for card charge"))?;

    let pan: String = card.number.chars().filter(|c| !c.is_whitespace()).collect();
    if pan == DEMO_TEST_CARD {
        Ok(ChargeOutcome::Completed {
            payment_id: format!("demo-{}", req.conversation_id),
        })
    } else {
        Ok(ChargeOutcome::Declined {
            code: "invalid_card".to_string(),
            message: "Card was declined".to_string(),
        })
    }
}

#[async_trait]
impl PaymentGateway for IyzicoGateway {
    async fn initialize(&self, req: &ChargeRequest) -> anyhow::Result<ChargeOutcome> {
        if self.demo_mode {
            return demo_charge(req);
        }

        let card = req
            .card
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("card details required for card charge"))?;

        let body = json!({
            "locale": req.locale,
            "conversationId": req.conversation_id,
            "price": format!("{:.2}", req.amount_try),
            "paidPrice": format!("{:.2}", req.amount_try),
            "currency": "TRY",
            "installment": 1,
            "paymentCard": {
                "cardHolderName": card.holder_name,
                "cardNumber": card.number,
                "expireMonth": card.expire_month,
                "expireYear": card.expire_year,
                "cvc": card.cvc,
            },
            "buyer": {
                "id": req.buyer_email,
                "name": req.buyer_name,
                "email": req.buyer_email,
                "gsmNumber": req.buyer_phone,
            },
            "basketItems": [{
                "id": req.conversation_id,
                "name": req.description,
                "category1": "Photography",
                "itemType": "VIRTUAL",
                "price": format!("{:.2}", req.amount_try),
            }],
        });
        let body_str = serde_json::to_string(&body)?;

        let nonce = uuid::Uuid::new_v4().to_string();
        let signature = sign_request(&self.secret_key, &nonce, CHARGE_PATH, &body_str);

        let response = self
            .client
            .post(format!("{}{}", self.base_url, CHARGE_PATH))
            .header("Authorization", format!("IYZWS {}:{}", self.api_key, signature))
            .header("x-iyzi-rnd", &nonce)
            .header("Content-Type", "application/json")
            .body(body_str)
            .send()
            .await;

        let response = match response {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(error = %e, "card provider unreachable");
                return Ok(ChargeOutcome::Declined {
                    code: ERR_UNREACHABLE.to_string(),
                    message: "Payment provider could not be reached".to_string(),
                });
            }
        };

        let data: serde_json::Value = match response.json().await {
            Ok(d) => d,
            Err(e) => {
                tracing::warn!(error = %e, "unparseable card provider response");
                return Ok(ChargeOutcome::Declined {
                    code: ERR_UNREACHABLE.to_string(),
                    message: "Payment provider returned an invalid response".to_string(),
                });
            }
        };

        if data["status"] == "success" {
            let payment_id = data["paymentId"]
                .as_str()
                .map(|s| s.to_string())
                .unwrap_or_else(|| data["paymentId"].to_string());
            Ok(ChargeOutcome::Completed { payment_id })
        } else {
            Ok(ChargeOutcome::Declined {
                code: data["errorCode"].as_str().unwrap_or("payment_failed").to_string(),
                message: data["errorMessage"]
                    .as_str()
                    .unwrap_or("Payment was declined")
                    .to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::payments::CardDetails;

    fn charge_request(card_number: &str) -> ChargeRequest {
        ChargeRequest {
            conversation_id: "conv-1".to_string(),
            amount_try: 1650.0,
            amount_eur: 45.0,
            buyer_name: "Test Buyer".to_string(),
            buyer_email: "buyer@example.com".to_string(),
            buyer_phone: "+905551112233".to_string(),
            description: "Essential Photoshoot".to_string(),
            locale: "en".to_string(),
            card: Some(CardDetails {
                holder_name: "Test Buyer".to_string(),
                number: card_number.to_string(),
                expire_month: "12".to_string(),
                expire_year: "2030".to_string(),
                cvc: "123".to_string(),
            }),
        }
    }

    #[test]
    fn signature_is_deterministic_and_secret_dependent() {
        let a = sign_request("secret", "nonce", "/payment/auth", "{}");
        let b = sign_request("secret", "nonce", "/payment/auth", "{}");
        let c = sign_request("other-secret", "nonce", "/payment/auth", "{}");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(!a.is_empty());
    }

    #[tokio::test]
    async fn demo_mode_accepts_only_test_card() {
        let gw = IyzicoGateway::new(String::new(), String::new(), String::new(), true);

        let ok = gw.initialize(&charge_request(DEMO_TEST_CARD)).await.unwrap();
        assert!(matches!(ok, ChargeOutcome::Completed { .. }));

        let declined = gw.initialize(&charge_request("4111111111111111")).await.unwrap();
        match declined {
            ChargeOutcome::Declined { code, .. } => assert_eq!(code, "invalid_card"),
            other => panic!("expected decline, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn demo_mode_ignores_card_whitespace() {
        let gw = IyzicoGateway::new(String::new(), String::new(), String::new(), true);
        let ok = gw
            .initialize(&charge_request("5528 7900 0000 0008"))
            .await
            .unwrap();
        assert!(matches!(ok, ChargeOutcome::Completed { .. }));
    }
}
