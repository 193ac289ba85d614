//! services/api/src/web/state.rs
//!
//! Defines the application state shared by every request handler.

use std::sync::Arc;

use storefront_core::ports::{
    AddressRepository, CartRepository, CatalogRepository, OrderNotifier, OrderRepository,
    PaymentGateway, PaymentMethodRepository, UserRepository, WishlistRepository,
};
use storefront_core::services::{
    AddressBook, CartService, CatalogService, CheckoutEngine, CheckoutSettings, OrderService,
    OrderSettings, PaymentMethodBook, WishlistService,
};

use crate::config::Config;

//=========================================================================================
// AppState (Shared Across All Requests)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub users: Arc<dyn UserRepository>,
    pub catalog: CatalogService,
    pub carts: CartService,
    pub wishlists: WishlistService,
    pub addresses: AddressBook,
    pub payment_methods: PaymentMethodBook,
    pub checkout: CheckoutEngine,
    pub orders: OrderService,
    pub config: Arc<Config>,
}

impl AppState {
    /// Wires every service to one storage backend.
    pub fn new<S>(
        store: Arc<S>,
        gateway: Arc<dyn PaymentGateway>,
        notifier: Arc<dyn OrderNotifier>,
        config: Arc<Config>,
    ) -> Self
    where
        S: UserRepository
            + CatalogRepository
            + CartRepository
            + WishlistRepository
            + AddressRepository
            + PaymentMethodRepository
            + OrderRepository
            + 'static,
    {
        let checkout_settings = CheckoutSettings {
            shipping_fee: config.shipping_fee,
            currency: config.currency.clone(),
            gateway_timeout: config.gateway_timeout,
        };
        let order_settings = OrderSettings {
            policy: config.order_status_policy,
            restock_on_cancel: config.restock_on_cancel,
        };

        Self {
            users: store.clone(),
            catalog: CatalogService::new(store.clone()),
            carts: CartService::new(store.clone(), store.clone()),
            wishlists: WishlistService::new(store.clone(), store.clone()),
            addresses: AddressBook::new(store.clone()),
            payment_methods: PaymentMethodBook::new(store.clone()),
            checkout: CheckoutEngine::new(
                store.clone(),
                store.clone(),
                store.clone(),
                gateway,
                notifier,
                checkout_settings,
            ),
            orders: OrderService::new(store, order_settings),
            config,
        }
    }
}
