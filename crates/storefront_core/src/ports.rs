//! crates/storefront_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the storefront's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of specific external implementations like databases or gateways.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::domain::{
    Address, AuthUser, CartLine, Category, GatewayMode, GatewayPayment, NewOrder, Order,
    OrderStatus, PaymentIntent, PaymentMethod, PaymentStatus, Product, ProductChanges, Role, User,
    UserCredentials,
};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port and service operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Validation failed: {0}")]
    Validation(String),
    #[error("Not authenticated")]
    Unauthenticated,
    #[error("Not authorized")]
    Unauthorized,
    #[error("Not enough stock for {product_name}. Available: {available}")]
    InsufficientStock { product_name: String, available: u32 },
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Payment gateway error: {0}")]
    Gateway(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Storage Ports (Traits)
//=========================================================================================

#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Fails with `Conflict` when the email is already registered.
    async fn create_user(&self, name: &str, email: &str, hashed_password: &str)
        -> PortResult<User>;

    async fn get_user(&self, user_id: Uuid) -> PortResult<User>;

    async fn get_credentials_by_email(&self, email: &str) -> PortResult<UserCredentials>;

    async fn set_role(&self, email: &str, role: Role) -> PortResult<User>;

    /// Fails with `Conflict` when `email` belongs to another account.
    async fn update_profile(&self, user_id: Uuid, name: &str, email: &str) -> PortResult<User>;

    async fn get_password_hash(&self, user_id: Uuid) -> PortResult<String>;

    async fn update_password_hash(&self, user_id: Uuid, hashed_password: &str) -> PortResult<()>;

    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()>;

    /// Resolves a live (unexpired) session into the identity it carries.
    async fn validate_auth_session(&self, session_id: &str) -> PortResult<AuthUser>;

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()>;
}

#[async_trait]
pub trait CatalogRepository: Send + Sync {
    /// All products, newest first.
    async fn list_products(&self) -> PortResult<Vec<Product>>;

    async fn list_featured_products(&self) -> PortResult<Vec<Product>>;

    async fn get_product(&self, product_id: Uuid) -> PortResult<Product>;

    async fn get_product_by_slug(&self, slug: &str) -> PortResult<Product>;

    /// Returns the products that still exist; unknown ids are silently skipped.
    async fn get_products_by_ids(&self, product_ids: &[Uuid]) -> PortResult<Vec<Product>>;

    /// Fails with `Conflict` when the slug is taken.
    async fn insert_product(&self, product: Product) -> PortResult<Product>;

    /// Writes only the columns set in `changes`, in one statement. Fails with `Conflict`
    /// when the new slug is taken.
    async fn update_product(&self, product_id: Uuid, changes: ProductChanges)
        -> PortResult<Product>;

    async fn delete_product(&self, product_id: Uuid) -> PortResult<()>;

    async fn list_categories(&self) -> PortResult<Vec<Category>>;

    async fn get_category(&self, category_id: Uuid) -> PortResult<Category>;

    async fn insert_category(&self, category: Category) -> PortResult<Category>;
}

#[async_trait]
pub trait CartRepository: Send + Sync {
    /// A user with no cart yet gets an empty list.
    async fn load_cart_lines(&self, user_id: Uuid) -> PortResult<Vec<CartLine>>;

    /// Replaces the stored cart with `lines`, preserving their order.
    async fn save_cart_lines(&self, user_id: Uuid, lines: &[CartLine]) -> PortResult<()>;
}

#[async_trait]
pub trait WishlistRepository: Send + Sync {
    async fn load_wishlist(&self, user_id: Uuid) -> PortResult<Vec<Uuid>>;

    async fn save_wishlist(&self, user_id: Uuid, product_ids: &[Uuid]) -> PortResult<()>;
}

#[async_trait]
pub trait AddressRepository: Send + Sync {
    async fn insert_address(&self, address: Address) -> PortResult<Address>;

    /// Returns the address even when it is soft-deleted.
    async fn get_address(&self, address_id: Uuid) -> PortResult<Address>;

    /// Active addresses only: the default first, then newest first.
    async fn list_active_addresses(&self, user_id: Uuid) -> PortResult<Vec<Address>>;

    async fn update_address(&self, address: Address) -> PortResult<Address>;

    /// In one transaction: clear `is_default` on every address of `user_id`, then set it
    /// on `address_id`. Fails with `NotFound` (and changes nothing) when the target is not
    /// an active address of that user.
    async fn replace_default_address(&self, user_id: Uuid, address_id: Uuid)
        -> PortResult<Address>;

    /// Marks the address inactive and clears its default flag.
    async fn deactivate_address(&self, user_id: Uuid, address_id: Uuid) -> PortResult<()>;
}

#[async_trait]
pub trait PaymentMethodRepository: Send + Sync {
    async fn insert_payment_method(&self, method: PaymentMethod) -> PortResult<PaymentMethod>;

    async fn get_payment_method(&self, method_id: Uuid) -> PortResult<PaymentMethod>;

    /// Newest first.
    async fn list_payment_methods(&self, user_id: Uuid) -> PortResult<Vec<PaymentMethod>>;

    async fn delete_payment_method(&self, method_id: Uuid) -> PortResult<()>;

    /// Same two-step contract as [`AddressRepository::replace_default_address`].
    async fn replace_default_payment_method(
        &self,
        user_id: Uuid,
        method_id: Uuid,
    ) -> PortResult<PaymentMethod>;
}

#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Reserves stock and persists the order as one unit of work.
    ///
    /// For every item, stock is decremented only when `stock >= quantity`. If any
    /// decrement fails the whole unit is rolled back and `InsufficientStock` (or
    /// `NotFound` for a vanished product) is returned; no stock changes and no order is
    /// stored. A payment reference already carried by another order is a `Conflict`.
    async fn commit_order(&self, order: NewOrder) -> PortResult<Order>;

    async fn get_order(&self, order_id: Uuid) -> PortResult<Order>;

    /// Newest first.
    async fn list_orders_for_user(&self, user_id: Uuid) -> PortResult<Vec<Order>>;

    /// Newest first.
    async fn list_all_orders(&self) -> PortResult<Vec<Order>>;

    async fn find_order_by_payment_reference(&self, reference: &str) -> PortResult<Order>;

    /// Moves the order from `expected` to `next`. Fails with `Conflict` if the stored
    /// status is no longer `expected`. With `restock`, and only if the order has not been
    /// restocked before, each item's quantity is added back to its product (if it still
    /// exists) and the order is marked restocked, all in the same transaction.
    async fn update_order_status(
        &self,
        order_id: Uuid,
        expected: OrderStatus,
        next: OrderStatus,
        restock: bool,
    ) -> PortResult<Order>;

    /// Settles a pending payment. Fails with `Conflict` if it is no longer pending.
    async fn settle_payment(&self, order_id: Uuid, status: PaymentStatus) -> PortResult<Order>;
}

//=========================================================================================
// External Capability Ports
//=========================================================================================

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    fn mode(&self) -> GatewayMode;

    /// Starts a payment for `amount` and returns an opaque handle.
    async fn create_intent(&self, amount: Decimal, currency: &str) -> PortResult<PaymentIntent>;

    /// Looks up the authoritative status, amount and currency of a previously created
    /// handle.
    async fn payment_status(&self, handle_id: &str) -> PortResult<GatewayPayment>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait OrderNotifier: Send + Sync {
    /// Sends the order confirmation. Callers never roll back on failure.
    async fn notify_order_placed(&self, order: &Order) -> PortResult<()>;
}
