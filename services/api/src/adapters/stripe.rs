//! services/api/src/adapters/stripe.rs
//!
//! The live payment gateway: a thin client for Stripe's PaymentIntents REST API.

use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Deserialize;
use storefront_core::domain::{GatewayMode, GatewayPayment, GatewayPaymentStatus, PaymentIntent};
use storefront_core::ports::{PaymentGateway, PortError, PortResult};
use tracing::debug;

#[derive(Clone)]
pub struct StripeGateway {
    http: Client,
    api_base: String,
    secret_key: String,
}

impl StripeGateway {
    pub fn new(api_base: impl Into<String>, secret_key: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
            secret_key: secret_key.into(),
        }
    }

    async fn read<T: for<'de> Deserialize<'de>>(response: reqwest::Response) -> PortResult<T> {
        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(PortError::Gateway(format!(
                "stripe request failed with status {status}: {text}"
            )));
        }
        response
            .json::<T>()
            .await
            .map_err(|e| PortError::Gateway(e.to_string()))
    }
}

#[derive(Debug, Deserialize)]
struct IntentResponse {
    id: String,
    client_secret: Option<String>,
    status: String,
    amount: i64,
    currency: String,
}

/// Converts a major-unit amount to the smallest currency unit.
fn to_minor_units(amount: Decimal) -> PortResult<i64> {
    (amount * Decimal::ONE_HUNDRED)
        .round()
        .to_i64()
        .ok_or_else(|| PortError::Validation(format!("amount {} is out of range", amount)))
}

fn from_minor_units(amount: i64) -> Decimal {
    Decimal::new(amount, 2)
}

fn map_status(status: &str) -> GatewayPaymentStatus {
    match status {
        "succeeded" => GatewayPaymentStatus::Succeeded,
        "canceled" => GatewayPaymentStatus::Failed,
        _ => GatewayPaymentStatus::Pending,
    }
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    fn mode(&self) -> GatewayMode {
        GatewayMode::Live
    }

    async fn create_intent(&self, amount: Decimal, currency: &str) -> PortResult<PaymentIntent> {
        let minor = to_minor_units(amount)?.to_string();
        let response = self
            .http
            .post(format!("{}/v1/payment_intents", self.api_base))
            .bearer_auth(&self.secret_key)
            .form(&[
                ("amount", minor.as_str()),
                ("currency", currency),
                ("automatic_payment_methods[enabled]", "true"),
            ])
            .send()
            .await
            .map_err(|e| PortError::Gateway(e.to_string()))?;

        let intent: IntentResponse = Self::read(response).await?;
        debug!(handle_id = %intent.id, status = %intent.status, "Stripe intent created");
        Ok(PaymentIntent {
            client_secret: intent.client_secret.unwrap_or_default(),
            handle_id: intent.id,
            amount,
            currency: currency.to_string(),
            mode: GatewayMode::Live,
        })
    }

    async fn payment_status(&self, handle_id: &str) -> PortResult<GatewayPayment> {
        let response = self
            .http
            .get(format!("{}/v1/payment_intents/{}", self.api_base, handle_id))
            .bearer_auth(&self.secret_key)
            .send()
            .await
            .map_err(|e| PortError::Gateway(e.to_string()))?;

        let intent: IntentResponse = Self::read(response).await?;
        Ok(GatewayPayment {
            status: map_status(&intent.status),
            amount: from_minor_units(intent.amount),
            currency: intent.currency,
        })
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    #[test]
    fn amounts_are_sent_in_cents() {
        assert_eq!(to_minor_units(dec!(63)).unwrap(), 6300);
        assert_eq!(to_minor_units(dec!(29.995)).unwrap(), 3000);
        assert_eq!(to_minor_units(dec!(0.5)).unwrap(), 50);
        assert_eq!(from_minor_units(6300), dec!(63));
        assert_eq!(from_minor_units(2999), dec!(29.99));
    }

    #[test]
    fn retrieved_intents_carry_amount_and_currency() {
        let body = r#"{"id":"pi_1","client_secret":"pi_1_secret_x","status":"succeeded",
                       "amount":3400,"currency":"usd","object":"payment_intent"}"#;
        let intent: IntentResponse = serde_json::from_str(body).unwrap();
        assert_eq!(intent.amount, 3400);
        assert_eq!(intent.currency, "usd");
    }

    #[test]
    fn only_succeeded_and_canceled_are_final() {
        assert_eq!(map_status("succeeded"), GatewayPaymentStatus::Succeeded);
        assert_eq!(map_status("canceled"), GatewayPaymentStatus::Failed);
        assert_eq!(map_status("processing"), GatewayPaymentStatus::Pending);
        assert_eq!(map_status("requires_action"), GatewayPaymentStatus::Pending);
    }
}
