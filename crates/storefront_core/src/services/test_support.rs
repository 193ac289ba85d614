//! Seeding helpers and test doubles shared by the service tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::domain::{
    Address, AddressLabel, Category, GatewayMode, GatewayPayment, GatewayPaymentStatus, NewOrder,
    Order, OrderItem, PaymentIntent, PaymentMethodLabel, PaymentStatus, Product, ShippingSnapshot,
};
use crate::memory::InMemoryStore;
use crate::ports::{
    AddressRepository, CatalogRepository, OrderNotifier, PaymentGateway, PortError, PortResult,
};

//=========================================================================================
// Notifiers
//=========================================================================================

pub struct QuietNotifier;

#[async_trait]
impl OrderNotifier for QuietNotifier {
    async fn notify_order_placed(&self, _order: &Order) -> PortResult<()> {
        Ok(())
    }
}

/// Forwards the id of every confirmed order.
pub struct ChannelNotifier(pub mpsc::UnboundedSender<Uuid>);

#[async_trait]
impl OrderNotifier for ChannelNotifier {
    async fn notify_order_placed(&self, order: &Order) -> PortResult<()> {
        self.0
            .send(order.id)
            .map_err(|e| PortError::Unexpected(e.to_string()))
    }
}

//=========================================================================================
// Gateways
//=========================================================================================

/// Never answers within any reasonable deadline.
pub struct StalledGateway;

#[async_trait]
impl PaymentGateway for StalledGateway {
    fn mode(&self) -> GatewayMode {
        GatewayMode::Live
    }

    async fn create_intent(&self, _amount: Decimal, _currency: &str) -> PortResult<PaymentIntent> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Err(PortError::Gateway("unreachable".to_string()))
    }

    async fn payment_status(&self, _handle_id: &str) -> PortResult<GatewayPayment> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Err(PortError::Gateway("unreachable".to_string()))
    }
}

/// Answers status lookups from a fixed script.
pub struct ScriptedGateway {
    script: Mutex<VecDeque<GatewayPayment>>,
}

impl ScriptedGateway {
    /// Every answer is for `amount` in usd.
    pub fn new(amount: Decimal, script: impl IntoIterator<Item = GatewayPaymentStatus>) -> Self {
        Self::answering(script.into_iter().map(|status| GatewayPayment {
            status,
            amount,
            currency: "usd".to_string(),
        }))
    }

    pub fn answering(script: impl IntoIterator<Item = GatewayPayment>) -> Self {
        Self {
            script: Mutex::new(script.into_iter().collect()),
        }
    }
}

#[async_trait]
impl PaymentGateway for ScriptedGateway {
    fn mode(&self) -> GatewayMode {
        GatewayMode::Live
    }

    async fn create_intent(&self, amount: Decimal, currency: &str) -> PortResult<PaymentIntent> {
        Ok(PaymentIntent {
            handle_id: "pi_123".to_string(),
            client_secret: "pi_123_secret".to_string(),
            amount,
            currency: currency.to_string(),
            mode: GatewayMode::Live,
        })
    }

    async fn payment_status(&self, _handle_id: &str) -> PortResult<GatewayPayment> {
        self.script
            .lock()
            .map_err(|e| PortError::Unexpected(e.to_string()))?
            .pop_front()
            .ok_or_else(|| PortError::Gateway("script exhausted".to_string()))
    }
}

//=========================================================================================
// Seeding
//=========================================================================================

pub async fn product(
    store: &Arc<InMemoryStore>,
    slug: &str,
    price: Decimal,
    stock: u32,
) -> Product {
    let category = Category {
        id: Uuid::new_v4(),
        name: format!("{} category", slug),
        slug: format!("{}-category", slug),
    };
    store.insert_category(category.clone()).await.unwrap();
    let now = Utc::now();
    store
        .insert_product(Product {
            id: Uuid::new_v4(),
            slug: slug.to_string(),
            name: slug.replace('-', " "),
            description: String::new(),
            price,
            stock,
            images: vec![format!("https://cdn.example.com/{}.jpg", slug)],
            category_id: category.id,
            is_featured: false,
            created_at: now,
            updated_at: now,
        })
        .await
        .unwrap()
}

pub async fn address(store: &Arc<InMemoryStore>, user_id: Uuid) -> Address {
    let now = Utc::now();
    store
        .insert_address(Address {
            id: Uuid::new_v4(),
            user_id,
            name: "Jane Doe".to_string(),
            phone: "9876543210".to_string(),
            address_line: "12 Residency Road".to_string(),
            city: "Bengaluru".to_string(),
            state: "Karnataka".to_string(),
            pincode: "560025".to_string(),
            landmark: None,
            label: AddressLabel::Home,
            is_default: true,
            is_active: true,
            created_at: now,
            updated_at: now,
        })
        .await
        .unwrap()
}

pub async fn stock_of(store: &Arc<InMemoryStore>, product_id: Uuid) -> u32 {
    store.get_product(product_id).await.unwrap().stock
}

/// A ready-to-commit order of `quantity` units of `item` for a fresh user.
pub async fn new_order(
    store: &Arc<InMemoryStore>,
    item: &Product,
    quantity: u32,
    reference: Option<&str>,
) -> NewOrder {
    let user = Uuid::new_v4();
    let home = address(store, user).await;
    let shipping_fee = Decimal::from(5);
    NewOrder {
        id: Uuid::new_v4(),
        user_id: user,
        items: vec![OrderItem {
            product_id: item.id,
            name: item.name.clone(),
            image: None,
            quantity,
            price: item.price,
            selected_size: None,
            selected_color: None,
        }],
        shipping: ShippingSnapshot::from(&home),
        payment_method: PaymentMethodLabel::Card,
        payment_status: PaymentStatus::Paid,
        payment_reference: reference.map(str::to_string),
        shipping_fee,
        total_amount: item.price * Decimal::from(quantity) + shipping_fee,
        created_at: Utc::now(),
    }
}
