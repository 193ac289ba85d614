//! services/api/src/adapters/notifier.rs
//!
//! Order confirmations are recorded in the service log. Mail delivery is left to
//! whatever consumes that log.

use async_trait::async_trait;
use storefront_core::domain::Order;
use storefront_core::ports::{OrderNotifier, PortResult};
use tracing::info;

#[derive(Clone, Default)]
pub struct LogNotifier;

#[async_trait]
impl OrderNotifier for LogNotifier {
    async fn notify_order_placed(&self, order: &Order) -> PortResult<()> {
        info!(
            order_id = %order.id,
            user_id = %order.user_id,
            items = order.items.len(),
            total = %order.total_amount,
            payment_method = order.payment_method.as_str(),
            "Order confirmation queued"
        );
        Ok(())
    }
}
