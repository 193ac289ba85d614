//! The simulated payment gateway used when no live gateway is configured.
//!
//! It is deterministic: every intent succeeds after a fixed delay, and any handle it
//! issued reports `Succeeded` for the amount and currency it was issued for. Callers can
//! tell it apart through [`GatewayMode::Simulated`].

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;
use tracing::warn;
use uuid::Uuid;

use crate::domain::{GatewayMode, GatewayPayment, GatewayPaymentStatus, PaymentIntent};
use crate::ports::{PaymentGateway, PortError, PortResult};

const SIMULATED_PREFIX: &str = "MOCK_txn_";

type Issued = HashMap<String, (Decimal, String)>;

#[derive(Debug, Clone)]
pub struct SimulatedGateway {
    delay: Duration,
    issued: Arc<Mutex<Issued>>,
}

impl SimulatedGateway {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            issued: Arc::default(),
        }
    }

    fn issued(&self) -> PortResult<MutexGuard<'_, Issued>> {
        self.issued
            .lock()
            .map_err(|_| PortError::Unexpected("simulated gateway lock poisoned".to_string()))
    }
}

#[async_trait]
impl PaymentGateway for SimulatedGateway {
    fn mode(&self) -> GatewayMode {
        GatewayMode::Simulated
    }

    async fn create_intent(&self, amount: Decimal, currency: &str) -> PortResult<PaymentIntent> {
        tokio::time::sleep(self.delay).await;
        let handle_id = format!("{}{}", SIMULATED_PREFIX, Uuid::new_v4().simple());
        self.issued()?
            .insert(handle_id.clone(), (amount, currency.to_string()));
        Ok(PaymentIntent {
            client_secret: format!("{}_secret", handle_id),
            handle_id,
            amount,
            currency: currency.to_string(),
            mode: GatewayMode::Simulated,
        })
    }

    async fn payment_status(&self, handle_id: &str) -> PortResult<GatewayPayment> {
        let (amount, currency) = self.issued()?.get(handle_id).cloned().ok_or_else(|| {
            PortError::Gateway(format!("unknown simulated payment handle {}", handle_id))
        })?;
        Ok(GatewayPayment {
            status: GatewayPaymentStatus::Succeeded,
            amount,
            currency,
        })
    }
}

/// Picks the live gateway when one is configured, otherwise the simulated one.
pub fn select_gateway(
    live: Option<Arc<dyn PaymentGateway>>,
    simulated_delay: Duration,
) -> Arc<dyn PaymentGateway> {
    match live {
        Some(gateway) => gateway,
        None => {
            warn!("No live payment gateway configured; using the simulated gateway");
            Arc::new(SimulatedGateway::new(simulated_delay))
        }
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    #[tokio::test]
    async fn simulated_handles_report_what_they_were_issued_for() {
        let gateway = select_gateway(None, Duration::from_millis(1));
        assert_eq!(gateway.mode(), GatewayMode::Simulated);

        let intent = gateway.create_intent(dec!(63), "usd").await.unwrap();
        assert!(intent.handle_id.starts_with(SIMULATED_PREFIX));
        assert_eq!(intent.mode, GatewayMode::Simulated);
        let payment = gateway.payment_status(&intent.handle_id).await.unwrap();
        assert_eq!(payment.status, GatewayPaymentStatus::Succeeded);
        assert!(payment.covers(dec!(63.00), "USD"));
        assert!(!payment.covers(dec!(34), "usd"));
        assert!(gateway.payment_status("pi_live_123").await.is_err());
        assert!(gateway
            .payment_status(&format!("{}forged", SIMULATED_PREFIX))
            .await
            .is_err());
    }
}
