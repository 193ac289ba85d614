//! Reading orders back and moving them through their lifecycle.

use std::str::FromStr;
use std::sync::Arc;

use tracing::info;
use uuid::Uuid;

use crate::domain::{AuthUser, Order, OrderStatus};
use crate::ports::{OrderRepository, PortError, PortResult};

/// How strictly admins may move an order between statuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatusPolicy {
    /// Any status may follow any other.
    Permissive,
    /// Only forward moves, plus cancellation of a live order.
    #[default]
    ForwardOnly,
}

impl FromStr for StatusPolicy {
    type Err = PortError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "permissive" => Ok(Self::Permissive),
            "forward_only" => Ok(Self::ForwardOnly),
            other => Err(PortError::Validation(format!(
                "unknown order status policy '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct OrderSettings {
    pub policy: StatusPolicy,
    /// Return the items of a cancelled order to stock.
    pub restock_on_cancel: bool,
}

#[derive(Clone)]
pub struct OrderService {
    repo: Arc<dyn OrderRepository>,
    settings: OrderSettings,
}

impl OrderService {
    pub fn new(repo: Arc<dyn OrderRepository>, settings: OrderSettings) -> Self {
        Self { repo, settings }
    }

    pub async fn list_for_user(&self, user_id: Uuid) -> PortResult<Vec<Order>> {
        self.repo.list_orders_for_user(user_id).await
    }

    /// The owner or an admin may read an order.
    pub async fn get_by_id(&self, order_id: Uuid, caller: &AuthUser) -> PortResult<Order> {
        let order = self.repo.get_order(order_id).await?;
        if order.user_id != caller.user_id && !caller.is_admin() {
            return Err(PortError::Unauthorized);
        }
        Ok(order)
    }

    pub async fn list_all(&self, caller: &AuthUser) -> PortResult<Vec<Order>> {
        if !caller.is_admin() {
            return Err(PortError::Unauthorized);
        }
        self.repo.list_all_orders().await
    }

    pub async fn set_status(
        &self,
        order_id: Uuid,
        next: OrderStatus,
        caller: &AuthUser,
    ) -> PortResult<Order> {
        if !caller.is_admin() {
            return Err(PortError::Unauthorized);
        }
        let order = self.repo.get_order(order_id).await?;
        let current = order.order_status;
        if self.settings.policy == StatusPolicy::ForwardOnly && !current.can_advance_to(next) {
            return Err(PortError::Conflict(format!(
                "Order cannot move from {} to {}",
                current, next
            )));
        }
        // Its stock is back on the shelf and is not reserved again.
        if order.restocked && next != OrderStatus::Cancelled {
            return Err(PortError::Conflict(format!(
                "Order {} was cancelled and restocked; it cannot be reopened",
                order_id
            )));
        }

        let restock = self.settings.restock_on_cancel
            && next == OrderStatus::Cancelled
            && !order.restocked;
        let order = self
            .repo
            .update_order_status(order_id, current, next, restock)
            .await?;
        info!(order_id = %order_id, from = %current, to = %next, restock, "Order status updated");
        Ok(order)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use rust_decimal_macros::dec;

    use super::*;
    use crate::domain::{PaymentMethodLabel, ProductRef, Role};
    use crate::gateway::SimulatedGateway;
    use crate::memory::InMemoryStore;
    use crate::services::checkout::{CheckoutEngine, CheckoutSettings, OrderLineRequest, PlaceOrder};
    use crate::services::test_support::{address, product, stock_of, QuietNotifier};

    fn admin() -> AuthUser {
        AuthUser {
            user_id: Uuid::new_v4(),
            role: Role::Admin,
        }
    }

    /// Places a two-unit order of a fresh product with stock 10.
    async fn placed(store: &Arc<InMemoryStore>) -> (Order, Uuid) {
        let tee = product(store, "tee-001", dec!(29), 10).await;
        let user = Uuid::new_v4();
        let home = address(store, user).await;
        let engine = CheckoutEngine::new(
            store.clone(),
            store.clone(),
            store.clone(),
            Arc::new(SimulatedGateway::new(Duration::from_millis(1))),
            Arc::new(QuietNotifier),
            CheckoutSettings {
                shipping_fee: dec!(5),
                currency: "usd".to_string(),
                gateway_timeout: Duration::from_secs(1),
            },
        );
        let order = engine
            .place_order(
                user,
                PlaceOrder {
                    items: vec![OrderLineRequest {
                        product: ProductRef::Id(tee.id),
                        quantity: 2,
                        selected_size: None,
                        selected_color: None,
                    }],
                    shipping_address_id: Some(home.id),
                    payment_method: PaymentMethodLabel::CashOnDelivery,
                    payment: None,
                },
            )
            .await
            .unwrap();
        (order, tee.id)
    }

    fn service(store: &Arc<InMemoryStore>, policy: StatusPolicy, restock: bool) -> OrderService {
        OrderService::new(
            store.clone(),
            OrderSettings {
                policy,
                restock_on_cancel: restock,
            },
        )
    }

    #[tokio::test]
    async fn forward_only_rejects_moving_backwards() {
        let store = Arc::new(InMemoryStore::new());
        let (order, _) = placed(&store).await;
        let orders = service(&store, StatusPolicy::ForwardOnly, false);

        let shipped = orders
            .set_status(order.id, OrderStatus::Shipped, &admin())
            .await
            .unwrap();
        assert_eq!(shipped.order_status, OrderStatus::Shipped);

        let back = orders
            .set_status(order.id, OrderStatus::Processing, &admin())
            .await;
        assert!(matches!(back, Err(PortError::Conflict(_))), "got {back:?}");
    }

    #[tokio::test]
    async fn permissive_policy_allows_any_move() {
        let store = Arc::new(InMemoryStore::new());
        let (order, _) = placed(&store).await;
        let orders = service(&store, StatusPolicy::Permissive, false);

        orders
            .set_status(order.id, OrderStatus::Delivered, &admin())
            .await
            .unwrap();
        let back = orders
            .set_status(order.id, OrderStatus::Processing, &admin())
            .await
            .unwrap();
        assert_eq!(back.order_status, OrderStatus::Processing);
    }

    #[tokio::test]
    async fn cancelling_restocks_only_when_enabled() {
        let store = Arc::new(InMemoryStore::new());
        let (order, tee) = placed(&store).await;
        service(&store, StatusPolicy::ForwardOnly, false)
            .set_status(order.id, OrderStatus::Cancelled, &admin())
            .await
            .unwrap();
        assert_eq!(stock_of(&store, tee).await, 8);

        let store = Arc::new(InMemoryStore::new());
        let (order, tee) = placed(&store).await;
        let orders = service(&store, StatusPolicy::Permissive, true);
        orders
            .set_status(order.id, OrderStatus::Cancelled, &admin())
            .await
            .unwrap();
        assert_eq!(stock_of(&store, tee).await, 10);

        // Cancelling twice must not restock twice.
        orders
            .set_status(order.id, OrderStatus::Cancelled, &admin())
            .await
            .unwrap();
        assert_eq!(stock_of(&store, tee).await, 10);
    }

    #[tokio::test]
    async fn a_restocked_order_stays_cancelled() {
        let store = Arc::new(InMemoryStore::new());
        let (order, tee) = placed(&store).await;
        let orders = service(&store, StatusPolicy::Permissive, true);

        orders
            .set_status(order.id, OrderStatus::Cancelled, &admin())
            .await
            .unwrap();
        assert_eq!(stock_of(&store, tee).await, 10);

        let reopened = orders
            .set_status(order.id, OrderStatus::Placed, &admin())
            .await;
        assert!(matches!(reopened, Err(PortError::Conflict(_))), "got {reopened:?}");

        let again = orders
            .set_status(order.id, OrderStatus::Cancelled, &admin())
            .await
            .unwrap();
        assert_eq!(again.order_status, OrderStatus::Cancelled);
        assert_eq!(stock_of(&store, tee).await, 10);
    }

    #[tokio::test]
    async fn cancelled_orders_reopen_when_nothing_was_restocked() {
        let store = Arc::new(InMemoryStore::new());
        let (order, tee) = placed(&store).await;
        let orders = service(&store, StatusPolicy::Permissive, false);

        orders
            .set_status(order.id, OrderStatus::Cancelled, &admin())
            .await
            .unwrap();
        let reopened = orders
            .set_status(order.id, OrderStatus::Placed, &admin())
            .await
            .unwrap();

        assert_eq!(reopened.order_status, OrderStatus::Placed);
        assert!(!reopened.restocked);
        assert_eq!(stock_of(&store, tee).await, 8);
    }

    #[tokio::test]
    async fn only_admins_manage_orders() {
        let store = Arc::new(InMemoryStore::new());
        let (order, _) = placed(&store).await;
        let orders = service(&store, StatusPolicy::ForwardOnly, false);
        let owner = AuthUser {
            user_id: order.user_id,
            role: Role::Customer,
        };
        let stranger = AuthUser {
            user_id: Uuid::new_v4(),
            role: Role::Customer,
        };

        let result = orders.set_status(order.id, OrderStatus::Shipped, &owner).await;
        assert!(matches!(result, Err(PortError::Unauthorized)), "got {result:?}");
        assert!(matches!(orders.list_all(&owner).await, Err(PortError::Unauthorized)));

        assert_eq!(orders.get_by_id(order.id, &owner).await.unwrap().id, order.id);
        assert!(orders.get_by_id(order.id, &admin()).await.is_ok());
        assert!(matches!(
            orders.get_by_id(order.id, &stranger).await,
            Err(PortError::Unauthorized)
        ));
        assert_eq!(orders.list_all(&admin()).await.unwrap().len(), 1);
        assert_eq!(orders.list_for_user(order.user_id).await.unwrap().len(), 1);
    }

    #[test]
    fn policy_parses_from_config_strings() {
        assert_eq!("forward_only".parse::<StatusPolicy>().unwrap(), StatusPolicy::ForwardOnly);
        assert_eq!(" Permissive ".parse::<StatusPolicy>().unwrap(), StatusPolicy::Permissive);
        assert!("strict".parse::<StatusPolicy>().is_err());
    }
}
