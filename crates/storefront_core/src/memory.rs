//! crates/storefront_core/src/memory.rs
//!
//! Thread-safe in-memory implementation of every storage port.
//!
//! All state sits behind one mutex, so each port call is a single critical section.
//! That gives `commit_order` the same all-or-nothing behaviour the Postgres adapter gets
//! from a transaction.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::{
    Address, AuthUser, CartLine, Category, NewOrder, Order, OrderStatus, PaymentMethod,
    PaymentStatus, Product, ProductChanges, Role, User, UserCredentials,
};
use crate::ports::{
    AddressRepository, CartRepository, CatalogRepository, OrderRepository,
    PaymentMethodRepository, PortError, PortResult, UserRepository, WishlistRepository,
};

#[derive(Default)]
struct MemoryState {
    users: HashMap<Uuid, (User, String)>,
    sessions: HashMap<String, (Uuid, DateTime<Utc>)>,
    categories: Vec<Category>,
    products: HashMap<Uuid, Product>,
    carts: HashMap<Uuid, Vec<CartLine>>,
    wishlists: HashMap<Uuid, Vec<Uuid>>,
    addresses: HashMap<Uuid, Address>,
    payment_methods: HashMap<Uuid, PaymentMethod>,
    orders: Vec<Order>,
}

/// In-memory store for development and tests.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> PortResult<MutexGuard<'_, MemoryState>> {
        self.state
            .lock()
            .map_err(|_| PortError::Unexpected("in-memory store lock poisoned".to_string()))
    }
}

fn newest_first<T>(items: &mut [T], created_at: impl Fn(&T) -> DateTime<Utc>) {
    items.sort_by(|a, b| created_at(b).cmp(&created_at(a)));
}

//=========================================================================================
// Accounts
//=========================================================================================

#[async_trait]
impl UserRepository for InMemoryStore {
    async fn create_user(
        &self,
        name: &str,
        email: &str,
        hashed_password: &str,
    ) -> PortResult<User> {
        let mut state = self.lock()?;
        if state.users.values().any(|(u, _)| u.email == email) {
            return Err(PortError::Conflict(format!("Email {} already exists", email)));
        }
        let user = User {
            id: Uuid::new_v4(),
            name: name.to_string(),
            email: email.to_string(),
            role: Role::Customer,
            created_at: Utc::now(),
        };
        state
            .users
            .insert(user.id, (user.clone(), hashed_password.to_string()));
        Ok(user)
    }

    async fn get_user(&self, user_id: Uuid) -> PortResult<User> {
        let state = self.lock()?;
        state
            .users
            .get(&user_id)
            .map(|(u, _)| u.clone())
            .ok_or_else(|| PortError::NotFound(format!("User {} not found", user_id)))
    }

    async fn get_credentials_by_email(&self, email: &str) -> PortResult<UserCredentials> {
        let state = self.lock()?;
        state
            .users
            .values()
            .find(|(u, _)| u.email == email)
            .map(|(u, hash)| UserCredentials {
                user_id: u.id,
                email: u.email.clone(),
                hashed_password: hash.clone(),
            })
            .ok_or_else(|| PortError::NotFound(format!("User {} not found", email)))
    }

    async fn set_role(&self, email: &str, role: Role) -> PortResult<User> {
        let mut state = self.lock()?;
        let (user, _) = state
            .users
            .values_mut()
            .find(|(u, _)| u.email == email)
            .ok_or_else(|| PortError::NotFound(format!("User {} not found", email)))?;
        user.role = role;
        Ok(user.clone())
    }

    async fn update_profile(&self, user_id: Uuid, name: &str, email: &str) -> PortResult<User> {
        let mut state = self.lock()?;
        if state
            .users
            .values()
            .any(|(u, _)| u.email == email && u.id != user_id)
        {
            return Err(PortError::Conflict(format!("Email {} already exists", email)));
        }
        let (user, _) = state
            .users
            .get_mut(&user_id)
            .ok_or_else(|| PortError::NotFound(format!("User {} not found", user_id)))?;
        user.name = name.to_string();
        user.email = email.to_string();
        Ok(user.clone())
    }

    async fn get_password_hash(&self, user_id: Uuid) -> PortResult<String> {
        let state = self.lock()?;
        state
            .users
            .get(&user_id)
            .map(|(_, hash)| hash.clone())
            .ok_or_else(|| PortError::NotFound(format!("User {} not found", user_id)))
    }

    async fn update_password_hash(&self, user_id: Uuid, hashed_password: &str) -> PortResult<()> {
        let mut state = self.lock()?;
        let (_, hash) = state
            .users
            .get_mut(&user_id)
            .ok_or_else(|| PortError::NotFound(format!("User {} not found", user_id)))?;
        *hash = hashed_password.to_string();
        Ok(())
    }

    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()> {
        let mut state = self.lock()?;
        state
            .sessions
            .insert(session_id.to_string(), (user_id, expires_at));
        Ok(())
    }

    async fn validate_auth_session(&self, session_id: &str) -> PortResult<AuthUser> {
        let state = self.lock()?;
        let (user_id, expires_at) = state
            .sessions
            .get(session_id)
            .copied()
            .ok_or(PortError::Unauthenticated)?;
        if expires_at <= Utc::now() {
            return Err(PortError::Unauthenticated);
        }
        let (user, _) = state.users.get(&user_id).ok_or(PortError::Unauthenticated)?;
        Ok(AuthUser {
            user_id,
            role: user.role,
        })
    }

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()> {
        let mut state = self.lock()?;
        state.sessions.remove(session_id);
        Ok(())
    }
}

//=========================================================================================
// Catalog
//=========================================================================================

#[async_trait]
impl CatalogRepository for InMemoryStore {
    async fn list_products(&self) -> PortResult<Vec<Product>> {
        let state = self.lock()?;
        let mut products: Vec<Product> = state.products.values().cloned().collect();
        newest_first(&mut products, |p| p.created_at);
        Ok(products)
    }

    async fn list_featured_products(&self) -> PortResult<Vec<Product>> {
        let mut products = self.list_products().await?;
        products.retain(|p| p.is_featured);
        Ok(products)
    }

    async fn get_product(&self, product_id: Uuid) -> PortResult<Product> {
        let state = self.lock()?;
        state
            .products
            .get(&product_id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("Product {} not found", product_id)))
    }

    async fn get_product_by_slug(&self, slug: &str) -> PortResult<Product> {
        let state = self.lock()?;
        state
            .products
            .values()
            .find(|p| p.slug == slug)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("Product {} not found", slug)))
    }

    async fn get_products_by_ids(&self, product_ids: &[Uuid]) -> PortResult<Vec<Product>> {
        let state = self.lock()?;
        Ok(product_ids
            .iter()
            .filter_map(|id| state.products.get(id).cloned())
            .collect())
    }

    async fn insert_product(&self, product: Product) -> PortResult<Product> {
        let mut state = self.lock()?;
        if state.products.values().any(|p| p.slug == product.slug) {
            return Err(PortError::Conflict(format!(
                "Product slug '{}' already exists",
                product.slug
            )));
        }
        state.products.insert(product.id, product.clone());
        Ok(product)
    }

    async fn update_product(
        &self,
        product_id: Uuid,
        changes: ProductChanges,
    ) -> PortResult<Product> {
        let mut state = self.lock()?;
        if let Some(slug) = &changes.slug {
            if state
                .products
                .values()
                .any(|p| &p.slug == slug && p.id != product_id)
            {
                return Err(PortError::Conflict(format!(
                    "Product slug '{}' already exists",
                    slug
                )));
            }
        }
        let product = state
            .products
            .get_mut(&product_id)
            .ok_or_else(|| PortError::NotFound(format!("Product {} not found", product_id)))?;

        if let Some(name) = changes.name {
            product.name = name;
        }
        if let Some(slug) = changes.slug {
            product.slug = slug;
        }
        if let Some(description) = changes.description {
            product.description = description;
        }
        if let Some(price) = changes.price {
            product.price = price;
        }
        if let Some(stock) = changes.stock {
            product.stock = stock;
        }
        if let Some(images) = changes.images {
            product.images = images;
        }
        if let Some(category_id) = changes.category_id {
            product.category_id = category_id;
        }
        if let Some(is_featured) = changes.is_featured {
            product.is_featured = is_featured;
        }
        product.updated_at = Utc::now();
        Ok(product.clone())
    }

    async fn delete_product(&self, product_id: Uuid) -> PortResult<()> {
        let mut state = self.lock()?;
        state
            .products
            .remove(&product_id)
            .map(|_| ())
            .ok_or_else(|| PortError::NotFound(format!("Product {} not found", product_id)))
    }

    async fn list_categories(&self) -> PortResult<Vec<Category>> {
        let state = self.lock()?;
        let mut categories = state.categories.clone();
        categories.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(categories)
    }

    async fn get_category(&self, category_id: Uuid) -> PortResult<Category> {
        let state = self.lock()?;
        state
            .categories
            .iter()
            .find(|c| c.id == category_id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("Category {} not found", category_id)))
    }

    async fn insert_category(&self, category: Category) -> PortResult<Category> {
        let mut state = self.lock()?;
        if state.categories.iter().any(|c| c.slug == category.slug) {
            return Err(PortError::Conflict(format!(
                "Category slug '{}' already exists",
                category.slug
            )));
        }
        state.categories.push(category.clone());
        Ok(category)
    }
}

//=========================================================================================
// Cart & Wishlist
//=========================================================================================

#[async_trait]
impl CartRepository for InMemoryStore {
    async fn load_cart_lines(&self, user_id: Uuid) -> PortResult<Vec<CartLine>> {
        let state = self.lock()?;
        Ok(state.carts.get(&user_id).cloned().unwrap_or_default())
    }

    async fn save_cart_lines(&self, user_id: Uuid, lines: &[CartLine]) -> PortResult<()> {
        let mut state = self.lock()?;
        state.carts.insert(user_id, lines.to_vec());
        Ok(())
    }
}

#[async_trait]
impl WishlistRepository for InMemoryStore {
    async fn load_wishlist(&self, user_id: Uuid) -> PortResult<Vec<Uuid>> {
        let state = self.lock()?;
        Ok(state.wishlists.get(&user_id).cloned().unwrap_or_default())
    }

    async fn save_wishlist(&self, user_id: Uuid, product_ids: &[Uuid]) -> PortResult<()> {
        let mut state = self.lock()?;
        state.wishlists.insert(user_id, product_ids.to_vec());
        Ok(())
    }
}

//=========================================================================================
// Address & Payment Method Books
//=========================================================================================

#[async_trait]
impl AddressRepository for InMemoryStore {
    async fn insert_address(&self, address: Address) -> PortResult<Address> {
        let mut state = self.lock()?;
        state.addresses.insert(address.id, address.clone());
        Ok(address)
    }

    async fn get_address(&self, address_id: Uuid) -> PortResult<Address> {
        let state = self.lock()?;
        state
            .addresses
            .get(&address_id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("Address {} not found", address_id)))
    }

    async fn list_active_addresses(&self, user_id: Uuid) -> PortResult<Vec<Address>> {
        let state = self.lock()?;
        let mut addresses: Vec<Address> = state
            .addresses
            .values()
            .filter(|a| a.user_id == user_id && a.is_active)
            .cloned()
            .collect();
        addresses.sort_by(|a, b| {
            b.is_default
                .cmp(&a.is_default)
                .then(b.created_at.cmp(&a.created_at))
        });
        Ok(addresses)
    }

    async fn update_address(&self, address: Address) -> PortResult<Address> {
        let mut state = self.lock()?;
        if !state.addresses.contains_key(&address.id) {
            return Err(PortError::NotFound(format!("Address {} not found", address.id)));
        }
        state.addresses.insert(address.id, address.clone());
        Ok(address)
    }

    async fn replace_default_address(
        &self,
        user_id: Uuid,
        address_id: Uuid,
    ) -> PortResult<Address> {
        let mut state = self.lock()?;
        let target_ok = state
            .addresses
            .get(&address_id)
            .is_some_and(|a| a.user_id == user_id && a.is_active);
        if !target_ok {
            return Err(PortError::NotFound(format!("Address {} not found", address_id)));
        }

        let now = Utc::now();
        for address in state.addresses.values_mut().filter(|a| a.user_id == user_id) {
            if address.is_default {
                address.is_default = false;
                address.updated_at = now;
            }
        }

        let target = state
            .addresses
            .get_mut(&address_id)
            .ok_or_else(|| PortError::NotFound(format!("Address {} not found", address_id)))?;
        target.is_default = true;
        target.updated_at = now;
        Ok(target.clone())
    }

    async fn deactivate_address(&self, user_id: Uuid, address_id: Uuid) -> PortResult<()> {
        let mut state = self.lock()?;
        let address = state
            .addresses
            .get_mut(&address_id)
            .filter(|a| a.user_id == user_id)
            .ok_or_else(|| PortError::NotFound(format!("Address {} not found", address_id)))?;
        address.is_active = false;
        address.is_default = false;
        address.updated_at = Utc::now();
        Ok(())
    }
}

#[async_trait]
impl PaymentMethodRepository for InMemoryStore {
    async fn insert_payment_method(&self, method: PaymentMethod) -> PortResult<PaymentMethod> {
        let mut state = self.lock()?;
        state.payment_methods.insert(method.id, method.clone());
        Ok(method)
    }

    async fn get_payment_method(&self, method_id: Uuid) -> PortResult<PaymentMethod> {
        let state = self.lock()?;
        state
            .payment_methods
            .get(&method_id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("Payment method {} not found", method_id)))
    }

    async fn list_payment_methods(&self, user_id: Uuid) -> PortResult<Vec<PaymentMethod>> {
        let state = self.lock()?;
        let mut methods: Vec<PaymentMethod> = state
            .payment_methods
            .values()
            .filter(|m| m.user_id == user_id)
            .cloned()
            .collect();
        newest_first(&mut methods, |m| m.created_at);
        Ok(methods)
    }

    async fn delete_payment_method(&self, method_id: Uuid) -> PortResult<()> {
        let mut state = self.lock()?;
        state
            .payment_methods
            .remove(&method_id)
            .map(|_| ())
            .ok_or_else(|| PortError::NotFound(format!("Payment method {} not found", method_id)))
    }

    async fn replace_default_payment_method(
        &self,
        user_id: Uuid,
        method_id: Uuid,
    ) -> PortResult<PaymentMethod> {
        let mut state = self.lock()?;
        if !state
            .payment_methods
            .get(&method_id)
            .is_some_and(|m| m.user_id == user_id)
        {
            return Err(PortError::NotFound(format!(
                "Payment method {} not found",
                method_id
            )));
        }
        for method in state
            .payment_methods
            .values_mut()
            .filter(|m| m.user_id == user_id)
        {
            method.is_default = method.id == method_id;
        }
        state
            .payment_methods
            .get(&method_id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("Payment method {} not found", method_id)))
    }
}

//=========================================================================================
// Orders
//=========================================================================================

#[async_trait]
impl OrderRepository for InMemoryStore {
    async fn commit_order(&self, order: NewOrder) -> PortResult<Order> {
        let mut state = self.lock()?;

        if let Some(reference) = &order.payment_reference {
            if state
                .orders
                .iter()
                .any(|o| o.payment_reference.as_ref() == Some(reference))
            {
                return Err(PortError::Conflict("Payment reference already used".to_string()));
            }
        }

        // Check every line against the stock left after the lines before it, then apply.
        let mut remaining: HashMap<Uuid, u32> = HashMap::new();
        for item in &order.items {
            let product = state.products.get(&item.product_id).ok_or_else(|| {
                PortError::NotFound(format!("Product {} not found", item.product_id))
            })?;
            let available = remaining.entry(product.id).or_insert(product.stock);
            if *available < item.quantity {
                return Err(PortError::InsufficientStock {
                    product_name: product.name.clone(),
                    available: *available,
                });
            }
            *available -= item.quantity;
        }

        let now = Utc::now();
        for (product_id, stock) in remaining {
            if let Some(product) = state.products.get_mut(&product_id) {
                product.stock = stock;
                product.updated_at = now;
            }
        }

        let order = order.into_order();
        state.orders.push(order.clone());
        Ok(order)
    }

    async fn get_order(&self, order_id: Uuid) -> PortResult<Order> {
        let state = self.lock()?;
        state
            .orders
            .iter()
            .find(|o| o.id == order_id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("Order {} not found", order_id)))
    }

    async fn list_orders_for_user(&self, user_id: Uuid) -> PortResult<Vec<Order>> {
        let state = self.lock()?;
        let mut orders: Vec<Order> = state
            .orders
            .iter()
            .filter(|o| o.user_id == user_id)
            .cloned()
            .collect();
        newest_first(&mut orders, |o| o.created_at);
        Ok(orders)
    }

    async fn list_all_orders(&self) -> PortResult<Vec<Order>> {
        let state = self.lock()?;
        let mut orders = state.orders.clone();
        newest_first(&mut orders, |o| o.created_at);
        Ok(orders)
    }

    async fn find_order_by_payment_reference(&self, reference: &str) -> PortResult<Order> {
        let state = self.lock()?;
        state
            .orders
            .iter()
            .find(|o| o.payment_reference.as_deref() == Some(reference))
            .cloned()
            .ok_or_else(|| {
                PortError::NotFound(format!("No order for payment reference {}", reference))
            })
    }

    async fn update_order_status(
        &self,
        order_id: Uuid,
        expected: OrderStatus,
        next: OrderStatus,
        restock: bool,
    ) -> PortResult<Order> {
        let mut state = self.lock()?;
        let index = state
            .orders
            .iter()
            .position(|o| o.id == order_id)
            .ok_or_else(|| PortError::NotFound(format!("Order {} not found", order_id)))?;

        let current = state.orders[index].order_status;
        if current != expected {
            return Err(PortError::Conflict(format!(
                "Order {} is {} (expected {})",
                order_id, current, expected
            )));
        }

        let now = Utc::now();
        let restock = restock && !state.orders[index].restocked;
        if restock {
            let items = state.orders[index].items.clone();
            for item in items {
                if let Some(product) = state.products.get_mut(&item.product_id) {
                    product.stock = product.stock.saturating_add(item.quantity);
                    product.updated_at = now;
                }
            }
        }

        let order = &mut state.orders[index];
        order.order_status = next;
        order.restocked |= restock;
        order.updated_at = now;
        Ok(order.clone())
    }

    async fn settle_payment(&self, order_id: Uuid, status: PaymentStatus) -> PortResult<Order> {
        let mut state = self.lock()?;
        let order = state
            .orders
            .iter_mut()
            .find(|o| o.id == order_id)
            .ok_or_else(|| PortError::NotFound(format!("Order {} not found", order_id)))?;
        if order.payment_status != PaymentStatus::Pending {
            return Err(PortError::Conflict(format!(
                "Payment for order {} is already {}",
                order_id,
                order.payment_status.as_str()
            )));
        }
        order.payment_status = status;
        order.updated_at = Utc::now();
        Ok(order.clone())
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;
    use crate::services::test_support::{new_order, product, stock_of};

    #[tokio::test]
    async fn payment_reference_is_unique_across_orders() {
        let store = Arc::new(InMemoryStore::new());
        let tee = product(&store, "tee-001", dec!(29), 10).await;

        store
            .commit_order(new_order(&store, &tee, 2, Some("pi_123")).await)
            .await
            .unwrap();
        let reused = store
            .commit_order(new_order(&store, &tee, 2, Some("pi_123")).await)
            .await;

        assert!(matches!(reused, Err(PortError::Conflict(_))), "got {reused:?}");
        assert_eq!(stock_of(&store, tee.id).await, 8);

        store.commit_order(new_order(&store, &tee, 2, None).await).await.unwrap();
        store.commit_order(new_order(&store, &tee, 2, None).await).await.unwrap();
        assert_eq!(stock_of(&store, tee.id).await, 4);
    }

    #[tokio::test]
    async fn an_order_is_restocked_at_most_once() {
        let store = Arc::new(InMemoryStore::new());
        let tee = product(&store, "tee-001", dec!(29), 10).await;
        let order = store
            .commit_order(new_order(&store, &tee, 2, None).await)
            .await
            .unwrap();

        let cancelled = store
            .update_order_status(order.id, OrderStatus::Placed, OrderStatus::Cancelled, true)
            .await
            .unwrap();
        assert!(cancelled.restocked);
        assert_eq!(stock_of(&store, tee.id).await, 10);

        store
            .update_order_status(order.id, OrderStatus::Cancelled, OrderStatus::Placed, false)
            .await
            .unwrap();
        let again = store
            .update_order_status(order.id, OrderStatus::Placed, OrderStatus::Cancelled, true)
            .await
            .unwrap();
        assert!(again.restocked);
        assert_eq!(stock_of(&store, tee.id).await, 10);
    }

    #[tokio::test]
    async fn restocking_saturates_instead_of_overflowing() {
        let store = Arc::new(InMemoryStore::new());
        let tee = product(&store, "tee-001", dec!(29), 10).await;
        let order = store
            .commit_order(new_order(&store, &tee, 2, None).await)
            .await
            .unwrap();
        store
            .update_product(
                tee.id,
                ProductChanges {
                    stock: Some(u32::MAX - 1),
                    ..ProductChanges::default()
                },
            )
            .await
            .unwrap();

        store
            .update_order_status(order.id, OrderStatus::Placed, OrderStatus::Cancelled, true)
            .await
            .unwrap();
        assert_eq!(stock_of(&store, tee.id).await, u32::MAX);
    }
}
