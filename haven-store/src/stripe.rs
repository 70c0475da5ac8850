use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use haven_core::payment::{IntentStatus, PaymentAdapter, PaymentIntent, PaymentProviderError, Refund};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;

/// Stripe PaymentIntents over the REST API.
pub struct StripePaymentAdapter {
    http: reqwest::Client,
    api_base: String,
    secret_key: String,
}

impl StripePaymentAdapter {
    pub fn new(api_base: impl Into<String>, secret_key: impl Into<String>) -> Result<Self, PaymentProviderError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .map_err(|e| PaymentProviderError::Transport(e.to_string()))?;
        Ok(Self {
            http,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            secret_key: secret_key.into(),
        })
    }

    async fn send<T: for<'de> Deserialize<'de>>(
        &self,
        request: reqwest::RequestBuilder,
        what: &str,
    ) -> Result<T, PaymentProviderError> {
        let response = request
            .bearer_auth(&self.secret_key)
            .send()
            .await
            .map_err(|e| PaymentProviderError::Transport(e.to_string()))?;

        let status = response.status();
        let body: Value = response
            .json()
            .await
            .map_err(|e| PaymentProviderError::Transport(e.to_string()))?;

        if !status.is_success() {
            return Err(error_from_body(status.as_u16(), &body, what));
        }

        serde_json::from_value(body).map_err(|e| PaymentProviderError::Provider(e.to_string()))
    }
}

#[derive(Debug, Deserialize)]
struct StripeIntent {
    id: String,
    #[serde(default)]
    client_secret: Option<String>,
    amount: i64,
    currency: String,
    status: String,
    #[serde(default)]
    metadata: HashMap<String, String>,
    /// Charge object when expanded, id string otherwise
    #[serde(default)]
    latest_charge: Option<Value>,
    #[serde(default)]
    last_payment_error: Option<StripeErrorBody>,
    created: i64,
}

#[derive(Debug, Deserialize)]
struct StripeErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    decline_code: Option<String>,
    #[serde(default, rename = "type")]
    kind: Option<String>,
}

impl StripeErrorBody {
    fn reason(&self) -> String {
        self.decline_code
            .clone()
            .or_else(|| self.message.clone())
            .or_else(|| self.code.clone())
            .unwrap_or_else(|| "payment failed".to_string())
    }
}

#[derive(Debug, Deserialize)]
struct StripeRefund {
    id: String,
    payment_intent: Option<String>,
    amount: i64,
    status: String,
}

fn map_status(status: &str, has_error: bool) -> IntentStatus {
    match status {
        "succeeded" => IntentStatus::Succeeded,
        "canceled" => IntentStatus::Canceled,
        "processing" => IntentStatus::Processing,
        "requires_action" => IntentStatus::RequiresAction,
        "requires_capture" => IntentStatus::RequiresCapture,
        "requires_confirmation" => IntentStatus::RequiresConfirmation,
        // A retry-able decline puts the intent back here with the error attached
        "requires_payment_method" if has_error => IntentStatus::Failed,
        _ => IntentStatus::RequiresPaymentMethod,
    }
}

impl From<StripeIntent> for PaymentIntent {
    fn from(raw: StripeIntent) -> Self {
        let status = map_status(&raw.status, raw.last_payment_error.is_some());
        let receipt_url = raw
            .latest_charge
            .as_ref()
            .and_then(|charge| charge.get("receipt_url"))
            .and_then(Value::as_str)
            .map(str::to_string);
        PaymentIntent {
            id: raw.id,
            client_secret: raw.client_secret,
            amount: raw.amount,
            currency: raw.currency.to_uppercase(),
            status,
            metadata: raw.metadata,
            receipt_url,
            failure_reason: raw.last_payment_error.as_ref().map(StripeErrorBody::reason),
            created_at: Utc.timestamp_opt(raw.created, 0).single().unwrap_or_else(Utc::now),
        }
    }
}

fn error_from_body(status: u16, body: &Value, what: &str) -> PaymentProviderError {
    let error: Option<StripeErrorBody> = body
        .get("error")
        .and_then(|e| serde_json::from_value(e.clone()).ok());

    match (status, error) {
        (404, _) => PaymentProviderError::NotFound(what.to_string()),
        (_, Some(err)) if err.kind.as_deref() == Some("card_error") || status == 402 => {
            PaymentProviderError::Declined { reason: err.reason() }
        }
        (_, Some(err)) => PaymentProviderError::Provider(err.reason()),
        (_, None) => PaymentProviderError::Provider(format!("HTTP {}", status)),
    }
}

#[async_trait]
impl PaymentAdapter for StripePaymentAdapter {
    async fn create_intent(
        &self,
        amount: i64,
        currency: &str,
        customer_ref: &str,
        metadata: &HashMap<String, String>,
    ) -> Result<PaymentIntent, PaymentProviderError> {
        let mut form: Vec<(String, String)> = vec![
            ("amount".to_string(), amount.to_string()),
            ("currency".to_string(), currency.to_lowercase()),
            ("receipt_email".to_string(), customer_ref.to_string()),
            ("automatic_payment_methods[enabled]".to_string(), "true".to_string()),
        ];
        for (key, value) in metadata {
            form.push((format!("metadata[{}]", key), value.clone()));
        }

        let request = self
            .http
            .post(format!("{}/v1/payment_intents", self.api_base))
            .form(&form);
        let raw: StripeIntent = self.send(request, "payment intent").await?;
        tracing::info!(intent_id = %raw.id, amount, "Stripe payment intent created");
        Ok(raw.into())
    }

    async fn retrieve_intent(&self, intent_id: &str) -> Result<PaymentIntent, PaymentProviderError> {
        let request = self
            .http
            .get(format!("{}/v1/payment_intents/{}", self.api_base, intent_id))
            .query(&[("expand[]", "latest_charge")]);
        let raw: StripeIntent = self.send(request, intent_id).await?;
        Ok(raw.into())
    }

    async fn refund(
        &self,
        intent_id: &str,
        amount: Option<i64>,
    ) -> Result<Refund, PaymentProviderError> {
        let mut form = vec![("payment_intent".to_string(), intent_id.to_string())];
        if let Some(amount) = amount {
            form.push(("amount".to_string(), amount.to_string()));
        }
        let request = self
            .http
            .post(format!("{}/v1/refunds", self.api_base))
            .form(&form);
        let raw: StripeRefund = self.send(request, intent_id).await?;
        Ok(Refund {
            id: raw.id,
            intent_id: raw.payment_intent.unwrap_or_else(|| intent_id.to_string()),
            amount: raw.amount,
            status: raw.status,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_intent_mapping_with_expanded_charge() {
        let raw: StripeIntent = serde_json::from_value(json!({
            "id": "pi_123",
            "client_secret": "pi_123_secret",
            "amount": 212100,
            "currency": "eur",
            "status": "succeeded",
            "metadata": { "booking_id": "4f1c2b7e-8d2a-4a57-9a8e-0c6f1d2e3b4a" },
            "latest_charge": { "id": "ch_1", "receipt_url": "https://pay.stripe.com/receipts/1" },
            "created": 1717200000
        }))
        .unwrap();

        let intent = PaymentIntent::from(raw);
        assert_eq!(intent.status, IntentStatus::Succeeded);
        assert_eq!(intent.currency, "EUR");
        assert_eq!(intent.receipt_url.as_deref(), Some("https://pay.stripe.com/receipts/1"));
        assert!(intent.booking_id().is_some());
    }

    #[test]
    fn test_declined_intent_maps_to_failed() {
        let raw: StripeIntent = serde_json::from_value(json!({
            "id": "pi_9",
            "amount": 1000,
            "currency": "eur",
            "status": "requires_payment_method",
            "latest_charge": "ch_9",
            "last_payment_error": { "type": "card_error", "decline_code": "insufficient_funds" },
            "created": 1717200000
        }))
        .unwrap();

        let intent = PaymentIntent::from(raw);
        assert_eq!(intent.status, IntentStatus::Failed);
        assert_eq!(intent.receipt_url, None);
        assert_eq!(intent.failure_reason.as_deref(), Some("insufficient_funds"));
    }

    #[test]
    fn test_error_body_mapping() {
        let body = json!({ "error": { "type": "card_error", "message": "Your card was declined." } });
        assert!(matches!(
            error_from_body(402, &body, "pi_1"),
            PaymentProviderError::Declined { ref reason } if reason == "Your card was declined."
        ));
        assert!(matches!(
            error_from_body(404, &json!({}), "pi_1"),
            PaymentProviderError::NotFound(_)
        ));
        assert!(matches!(
            error_from_body(500, &json!({}), "pi_1"),
            PaymentProviderError::Provider(_)
        ));
    }
}
