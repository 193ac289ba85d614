//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, the concrete implementation of the
//! storage ports from the `core` crate. It handles all interactions with the
//! PostgreSQL database using `sqlx`.
//!
//! Multi-row changes (order commit with stock reservation, status change with restock,
//! default-flag swaps, cart and wishlist rewrites) each run inside one transaction.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use storefront_core::domain::{
    Address, AuthUser, CartLine, Category, NewOrder, Order, OrderItem, OrderStatus,
    PaymentInstrument, PaymentMethod, PaymentStatus, Product, ProductChanges, Role,
    SelectedColor, ShippingSnapshot, User, UserCredentials,
};
use storefront_core::ports::{
    AddressRepository, CartRepository, CatalogRepository, OrderRepository,
    PaymentMethodRepository, PortError, PortResult, UserRepository, WishlistRepository,
};
use uuid::Uuid;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements every storage port.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }

    async fn begin(&self) -> PortResult<Transaction<'static, Postgres>> {
        self.pool.begin().await.map_err(unexpected)
    }
}

//=========================================================================================
// Error Helpers
//=========================================================================================

fn unexpected(e: sqlx::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

fn not_found_or_unexpected(e: sqlx::Error, what: String) -> PortError {
    match e {
        sqlx::Error::RowNotFound => PortError::NotFound(format!("{} not found", what)),
        _ => unexpected(e),
    }
}

fn conflict_or_unexpected(e: sqlx::Error, conflict: String) -> PortError {
    let unique = matches!(&e, sqlx::Error::Database(db) if db.is_unique_violation());
    if unique {
        PortError::Conflict(conflict)
    } else {
        unexpected(e)
    }
}

fn to_i32(value: u32, field: &str) -> PortResult<i32> {
    i32::try_from(value).map_err(|_| PortError::Validation(format!("{} is too large", field)))
}

fn to_u32(value: i32) -> u32 {
    u32::try_from(value).unwrap_or(0)
}

fn parse_column<T>(value: &str) -> PortResult<T>
where
    T: std::str::FromStr<Err = String>,
{
    value.parse::<T>().map_err(PortError::Unexpected)
}

fn color(name: Option<String>, hex: Option<String>) -> Option<SelectedColor> {
    name.map(|name| SelectedColor { name, hex })
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct UserRecord {
    id: Uuid,
    name: String,
    email: String,
    role: String,
    created_at: DateTime<Utc>,
}
impl UserRecord {
    fn to_domain(self) -> PortResult<User> {
        Ok(User {
            id: self.id,
            name: self.name,
            email: self.email,
            role: parse_column::<Role>(&self.role)?,
            created_at: self.created_at,
        })
    }
}

#[derive(FromRow)]
struct CategoryRecord {
    id: Uuid,
    name: String,
    slug: String,
}
impl CategoryRecord {
    fn to_domain(self) -> Category {
        Category {
            id: self.id,
            name: self.name,
            slug: self.slug,
        }
    }
}

#[derive(FromRow)]
struct ProductRecord {
    id: Uuid,
    slug: String,
    name: String,
    description: String,
    price: Decimal,
    stock: i32,
    images: Vec<String>,
    category_id: Uuid,
    is_featured: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}
impl ProductRecord {
    fn to_domain(self) -> Product {
        Product {
            id: self.id,
            slug: self.slug,
            name: self.name,
            description: self.description,
            price: self.price,
            stock: to_u32(self.stock),
            images: self.images,
            category_id: self.category_id,
            is_featured: self.is_featured,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(FromRow)]
struct CartLineRecord {
    product_id: Uuid,
    quantity: i32,
    selected_size: Option<String>,
    color_name: Option<String>,
    color_hex: Option<String>,
}
impl CartLineRecord {
    fn to_domain(self) -> CartLine {
        CartLine {
            product_id: self.product_id,
            quantity: to_u32(self.quantity),
            selected_size: self.selected_size,
            selected_color: color(self.color_name, self.color_hex),
        }
    }
}

#[derive(FromRow)]
struct AddressRecord {
    id: Uuid,
    user_id: Uuid,
    name: String,
    phone: String,
    address_line: String,
    city: String,
    state: String,
    pincode: String,
    landmark: Option<String>,
    label: String,
    is_default: bool,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}
impl AddressRecord {
    fn to_domain(self) -> PortResult<Address> {
        Ok(Address {
            id: self.id,
            user_id: self.user_id,
            name: self.name,
            phone: self.phone,
            address_line: self.address_line,
            city: self.city,
            state: self.state,
            pincode: self.pincode,
            landmark: self.landmark,
            label: parse_column(&self.label)?,
            is_default: self.is_default,
            is_active: self.is_active,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(FromRow)]
struct PaymentMethodRecord {
    id: Uuid,
    user_id: Uuid,
    kind: String,
    card_name: Option<String>,
    last4: Option<String>,
    expiry: Option<String>,
    upi_id: Option<String>,
    is_default: bool,
    created_at: DateTime<Utc>,
}
impl PaymentMethodRecord {
    fn to_domain(self) -> PortResult<PaymentMethod> {
        let instrument = match self.kind.as_str() {
            "card" => PaymentInstrument::Card {
                card_name: self.card_name.unwrap_or_default(),
                last4: self.last4.unwrap_or_default(),
                expiry: self.expiry.unwrap_or_default(),
            },
            "upi" => PaymentInstrument::Upi {
                upi_id: self.upi_id.unwrap_or_default(),
            },
            other => {
                return Err(PortError::Unexpected(format!(
                    "unknown payment method kind '{}'",
                    other
                )))
            }
        };
        Ok(PaymentMethod {
            id: self.id,
            user_id: self.user_id,
            instrument,
            is_default: self.is_default,
            created_at: self.created_at,
        })
    }
}

#[derive(FromRow)]
struct OrderRecord {
    id: Uuid,
    user_id: Uuid,
    shipping_address_id: Uuid,
    shipping_name: String,
    shipping_phone: String,
    shipping_address_line: String,
    shipping_city: String,
    shipping_state: String,
    shipping_pincode: String,
    shipping_landmark: Option<String>,
    payment_method: String,
    payment_status: String,
    payment_reference: Option<String>,
    order_status: String,
    shipping_fee: Decimal,
    total_amount: Decimal,
    restocked: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}
impl OrderRecord {
    fn to_domain(self, items: Vec<OrderItem>) -> PortResult<Order> {
        Ok(Order {
            id: self.id,
            user_id: self.user_id,
            items,
            shipping: ShippingSnapshot {
                address_id: self.shipping_address_id,
                name: self.shipping_name,
                phone: self.shipping_phone,
                address_line: self.shipping_address_line,
                city: self.shipping_city,
                state: self.shipping_state,
                pincode: self.shipping_pincode,
                landmark: self.shipping_landmark,
            },
            payment_method: parse_column(&self.payment_method)?,
            payment_status: parse_column(&self.payment_status)?,
            payment_reference: self.payment_reference,
            order_status: parse_column(&self.order_status)?,
            shipping_fee: self.shipping_fee,
            total_amount: self.total_amount,
            restocked: self.restocked,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(FromRow)]
struct OrderItemRecord {
    order_id: Uuid,
    product_id: Uuid,
    name: String,
    image: Option<String>,
    quantity: i32,
    price: Decimal,
    selected_size: Option<String>,
    color_name: Option<String>,
    color_hex: Option<String>,
}
impl OrderItemRecord {
    fn to_domain(self) -> OrderItem {
        OrderItem {
            product_id: self.product_id,
            name: self.name,
            image: self.image,
            quantity: to_u32(self.quantity),
            price: self.price,
            selected_size: self.selected_size,
            selected_color: color(self.color_name, self.color_hex),
        }
    }
}

//=========================================================================================
// Accounts
//=========================================================================================

#[async_trait]
impl UserRepository for DbAdapter {
    async fn create_user(
        &self,
        name: &str,
        email: &str,
        hashed_password: &str,
    ) -> PortResult<User> {
        let record = sqlx::query_as::<_, UserRecord>(
            "INSERT INTO users (id, name, email, hashed_password) VALUES ($1, $2, $3, $4) \
             RETURNING id, name, email, role, created_at",
        )
        .bind(Uuid::new_v4())
        .bind(name)
        .bind(email)
        .bind(hashed_password)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| conflict_or_unexpected(e, format!("Email {} already exists", email)))?;
        record.to_domain()
    }

    async fn get_user(&self, user_id: Uuid) -> PortResult<User> {
        sqlx::query_as::<_, UserRecord>(
            "SELECT id, name, email, role, created_at FROM users WHERE id = $1",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| not_found_or_unexpected(e, format!("User {}", user_id)))?
        .to_domain()
    }

    async fn get_credentials_by_email(&self, email: &str) -> PortResult<UserCredentials> {
        let (user_id, email, hashed_password): (Uuid, String, String) =
            sqlx::query_as("SELECT id, email, hashed_password FROM users WHERE email = $1")
                .bind(email)
                .fetch_one(&self.pool)
                .await
                .map_err(|e| not_found_or_unexpected(e, format!("User {}", email)))?;
        Ok(UserCredentials {
            user_id,
            email,
            hashed_password,
        })
    }

    async fn set_role(&self, email: &str, role: Role) -> PortResult<User> {
        sqlx::query_as::<_, UserRecord>(
            "UPDATE users SET role = $1 WHERE email = $2 \
             RETURNING id, name, email, role, created_at",
        )
        .bind(role.as_str())
        .bind(email)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| not_found_or_unexpected(e, format!("User {}", email)))?
        .to_domain()
    }

    async fn update_profile(&self, user_id: Uuid, name: &str, email: &str) -> PortResult<User> {
        sqlx::query_as::<_, UserRecord>(
            "UPDATE users SET name = $1, email = $2 WHERE id = $3 \
             RETURNING id, name, email, role, created_at",
        )
        .bind(name)
        .bind(email)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => PortError::NotFound(format!("User {} not found", user_id)),
            e => conflict_or_unexpected(e, format!("Email {} already exists", email)),
        })?
        .to_domain()
    }

    async fn get_password_hash(&self, user_id: Uuid) -> PortResult<String> {
        let (hashed_password,): (String,) =
            sqlx::query_as("SELECT hashed_password FROM users WHERE id = $1")
                .bind(user_id)
                .fetch_one(&self.pool)
                .await
                .map_err(|e| not_found_or_unexpected(e, format!("User {}", user_id)))?;
        Ok(hashed_password)
    }

    async fn update_password_hash(&self, user_id: Uuid, hashed_password: &str) -> PortResult<()> {
        let result = sqlx::query("UPDATE users SET hashed_password = $1 WHERE id = $2")
            .bind(hashed_password)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("User {} not found", user_id)));
        }
        Ok(())
    }

    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()> {
        sqlx::query("INSERT INTO auth_sessions (id, user_id, expires_at) VALUES ($1, $2, $3)")
            .bind(session_id)
            .bind(user_id)
            .bind(expires_at)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    async fn validate_auth_session(&self, session_id: &str) -> PortResult<AuthUser> {
        let row: Option<(Uuid, String)> = sqlx::query_as(
            "SELECT u.id, u.role FROM auth_sessions s JOIN users u ON u.id = s.user_id \
             WHERE s.id = $1 AND s.expires_at > now()",
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;

        let (user_id, role) = row.ok_or(PortError::Unauthenticated)?;
        Ok(AuthUser {
            user_id,
            role: parse_column(&role)?,
        })
    }

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()> {
        sqlx::query("DELETE FROM auth_sessions WHERE id = $1")
            .bind(session_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }
}

//=========================================================================================
// Catalog
//=========================================================================================

#[async_trait]
impl CatalogRepository for DbAdapter {
    async fn list_products(&self) -> PortResult<Vec<Product>> {
        let records =
            sqlx::query_as::<_, ProductRecord>("SELECT * FROM products ORDER BY created_at DESC")
                .fetch_all(&self.pool)
                .await
                .map_err(unexpected)?;
        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn list_featured_products(&self) -> PortResult<Vec<Product>> {
        let records = sqlx::query_as::<_, ProductRecord>(
            "SELECT * FROM products WHERE is_featured ORDER BY created_at DESC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn get_product(&self, product_id: Uuid) -> PortResult<Product> {
        let record = sqlx::query_as::<_, ProductRecord>("SELECT * FROM products WHERE id = $1")
            .bind(product_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| not_found_or_unexpected(e, format!("Product {}", product_id)))?;
        Ok(record.to_domain())
    }

    async fn get_product_by_slug(&self, slug: &str) -> PortResult<Product> {
        let record = sqlx::query_as::<_, ProductRecord>("SELECT * FROM products WHERE slug = $1")
            .bind(slug)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| not_found_or_unexpected(e, format!("Product {}", slug)))?;
        Ok(record.to_domain())
    }

    async fn get_products_by_ids(&self, product_ids: &[Uuid]) -> PortResult<Vec<Product>> {
        let records =
            sqlx::query_as::<_, ProductRecord>("SELECT * FROM products WHERE id = ANY($1)")
                .bind(product_ids)
                .fetch_all(&self.pool)
                .await
                .map_err(unexpected)?;
        let mut by_id: HashMap<Uuid, Product> = records
            .into_iter()
            .map(|r| (r.id, r.to_domain()))
            .collect();
        Ok(product_ids.iter().filter_map(|id| by_id.remove(id)).collect())
    }

    async fn insert_product(&self, product: Product) -> PortResult<Product> {
        let record = sqlx::query_as::<_, ProductRecord>(
            "INSERT INTO products \
             (id, slug, name, description, price, stock, images, category_id, is_featured, \
              created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) RETURNING *",
        )
        .bind(product.id)
        .bind(&product.slug)
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.price)
        .bind(to_i32(product.stock, "stock")?)
        .bind(&product.images)
        .bind(product.category_id)
        .bind(product.is_featured)
        .bind(product.created_at)
        .bind(product.updated_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            conflict_or_unexpected(e, format!("Product slug '{}' already exists", product.slug))
        })?;
        Ok(record.to_domain())
    }

    async fn update_product(
        &self,
        product_id: Uuid,
        changes: ProductChanges,
    ) -> PortResult<Product> {
        let stock = changes.stock.map(|s| to_i32(s, "stock")).transpose()?;
        let record = sqlx::query_as::<_, ProductRecord>(
            "UPDATE products SET \
             name = COALESCE($2, name), \
             slug = COALESCE($3, slug), \
             description = COALESCE($4, description), \
             price = COALESCE($5, price), \
             stock = COALESCE($6, stock), \
             images = COALESCE($7, images), \
             category_id = COALESCE($8, category_id), \
             is_featured = COALESCE($9, is_featured), \
             updated_at = now() \
             WHERE id = $1 RETURNING *",
        )
        .bind(product_id)
        .bind(&changes.name)
        .bind(&changes.slug)
        .bind(&changes.description)
        .bind(changes.price)
        .bind(stock)
        .bind(&changes.images)
        .bind(changes.category_id)
        .bind(changes.is_featured)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => {
                PortError::NotFound(format!("Product {} not found", product_id))
            }
            e => conflict_or_unexpected(
                e,
                format!(
                    "Product slug '{}' already exists",
                    changes.slug.as_deref().unwrap_or_default()
                ),
            ),
        })?;
        Ok(record.to_domain())
    }

    async fn delete_product(&self, product_id: Uuid) -> PortResult<()> {
        let result = sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(product_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("Product {} not found", product_id)));
        }
        Ok(())
    }

    async fn list_categories(&self) -> PortResult<Vec<Category>> {
        let records = sqlx::query_as::<_, CategoryRecord>("SELECT * FROM categories ORDER BY name")
            .fetch_all(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn get_category(&self, category_id: Uuid) -> PortResult<Category> {
        let record = sqlx::query_as::<_, CategoryRecord>("SELECT * FROM categories WHERE id = $1")
            .bind(category_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| not_found_or_unexpected(e, format!("Category {}", category_id)))?;
        Ok(record.to_domain())
    }

    async fn insert_category(&self, category: Category) -> PortResult<Category> {
        let record = sqlx::query_as::<_, CategoryRecord>(
            "INSERT INTO categories (id, name, slug) VALUES ($1, $2, $3) RETURNING *",
        )
        .bind(category.id)
        .bind(&category.name)
        .bind(&category.slug)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            conflict_or_unexpected(e, format!("Category slug '{}' already exists", category.slug))
        })?;
        Ok(record.to_domain())
    }
}

//=========================================================================================
// Cart & Wishlist
//=========================================================================================

#[async_trait]
impl CartRepository for DbAdapter {
    async fn load_cart_lines(&self, user_id: Uuid) -> PortResult<Vec<CartLine>> {
        let records = sqlx::query_as::<_, CartLineRecord>(
            "SELECT product_id, quantity, selected_size, color_name, color_hex \
             FROM cart_lines WHERE user_id = $1 ORDER BY position",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn save_cart_lines(&self, user_id: Uuid, lines: &[CartLine]) -> PortResult<()> {
        let mut tx = self.begin().await?;
        sqlx::query("DELETE FROM cart_lines WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await
            .map_err(unexpected)?;

        for (position, line) in lines.iter().enumerate() {
            sqlx::query(
                "INSERT INTO cart_lines \
                 (user_id, position, product_id, quantity, selected_size, color_name, color_hex) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7)",
            )
            .bind(user_id)
            .bind(position as i32)
            .bind(line.product_id)
            .bind(to_i32(line.quantity, "quantity")?)
            .bind(&line.selected_size)
            .bind(line.selected_color.as_ref().map(|c| c.name.as_str()))
            .bind(line.selected_color.as_ref().and_then(|c| c.hex.as_deref()))
            .execute(&mut *tx)
            .await
            .map_err(unexpected)?;
        }

        tx.commit().await.map_err(unexpected)
    }
}

#[async_trait]
impl WishlistRepository for DbAdapter {
    async fn load_wishlist(&self, user_id: Uuid) -> PortResult<Vec<Uuid>> {
        let rows: Vec<(Uuid,)> = sqlx::query_as(
            "SELECT product_id FROM wishlist_items WHERE user_id = $1 ORDER BY position",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    async fn save_wishlist(&self, user_id: Uuid, product_ids: &[Uuid]) -> PortResult<()> {
        let mut tx = self.begin().await?;
        sqlx::query("DELETE FROM wishlist_items WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await
            .map_err(unexpected)?;

        for (position, product_id) in product_ids.iter().enumerate() {
            sqlx::query(
                "INSERT INTO wishlist_items (user_id, position, product_id) VALUES ($1, $2, $3)",
            )
            .bind(user_id)
            .bind(position as i32)
            .bind(product_id)
            .execute(&mut *tx)
            .await
            .map_err(unexpected)?;
        }

        tx.commit().await.map_err(unexpected)
    }
}

//=========================================================================================
// Address & Payment Method Books
//=========================================================================================

#[async_trait]
impl AddressRepository for DbAdapter {
    async fn insert_address(&self, address: Address) -> PortResult<Address> {
        sqlx::query_as::<_, AddressRecord>(
            "INSERT INTO addresses \
             (id, user_id, name, phone, address_line, city, state, pincode, landmark, label, \
              is_default, is_active, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14) RETURNING *",
        )
        .bind(address.id)
        .bind(address.user_id)
        .bind(&address.name)
        .bind(&address.phone)
        .bind(&address.address_line)
        .bind(&address.city)
        .bind(&address.state)
        .bind(&address.pincode)
        .bind(&address.landmark)
        .bind(address.label.as_str())
        .bind(address.is_default)
        .bind(address.is_active)
        .bind(address.created_at)
        .bind(address.updated_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| conflict_or_unexpected(e, "User already has a default address".to_string()))?
        .to_domain()
    }

    async fn get_address(&self, address_id: Uuid) -> PortResult<Address> {
        sqlx::query_as::<_, AddressRecord>("SELECT * FROM addresses WHERE id = $1")
            .bind(address_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| not_found_or_unexpected(e, format!("Address {}", address_id)))?
            .to_domain()
    }

    async fn list_active_addresses(&self, user_id: Uuid) -> PortResult<Vec<Address>> {
        sqlx::query_as::<_, AddressRecord>(
            "SELECT * FROM addresses WHERE user_id = $1 AND is_active \
             ORDER BY is_default DESC, created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?
        .into_iter()
        .map(AddressRecord::to_domain)
        .collect()
    }

    async fn update_address(&self, address: Address) -> PortResult<Address> {
        sqlx::query_as::<_, AddressRecord>(
            "UPDATE addresses SET name = $2, phone = $3, address_line = $4, city = $5, \
             state = $6, pincode = $7, landmark = $8, label = $9, is_default = $10, \
             updated_at = $11 WHERE id = $1 RETURNING *",
        )
        .bind(address.id)
        .bind(&address.name)
        .bind(&address.phone)
        .bind(&address.address_line)
        .bind(&address.city)
        .bind(&address.state)
        .bind(&address.pincode)
        .bind(&address.landmark)
        .bind(address.label.as_str())
        .bind(address.is_default)
        .bind(address.updated_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| not_found_or_unexpected(e, format!("Address {}", address.id)))?
        .to_domain()
    }

    async fn replace_default_address(
        &self,
        user_id: Uuid,
        address_id: Uuid,
    ) -> PortResult<Address> {
        let mut tx = self.begin().await?;

        sqlx::query(
            "UPDATE addresses SET is_default = FALSE, updated_at = now() \
             WHERE user_id = $1 AND is_default AND id <> $2",
        )
        .bind(user_id)
        .bind(address_id)
        .execute(&mut *tx)
        .await
        .map_err(unexpected)?;

        let record = sqlx::query_as::<_, AddressRecord>(
            "UPDATE addresses SET is_default = TRUE, updated_at = now() \
             WHERE id = $1 AND user_id = $2 AND is_active RETURNING *",
        )
        .bind(address_id)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| conflict_or_unexpected(e, "Default address changed concurrently".to_string()))?
        .ok_or_else(|| PortError::NotFound(format!("Address {} not found", address_id)))?;

        tx.commit().await.map_err(unexpected)?;
        record.to_domain()
    }

    async fn deactivate_address(&self, user_id: Uuid, address_id: Uuid) -> PortResult<()> {
        let result = sqlx::query(
            "UPDATE addresses SET is_active = FALSE, is_default = FALSE, updated_at = now() \
             WHERE id = $1 AND user_id = $2",
        )
        .bind(address_id)
        .bind(user_id)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("Address {} not found", address_id)));
        }
        Ok(())
    }
}

#[async_trait]
impl PaymentMethodRepository for DbAdapter {
    async fn insert_payment_method(&self, method: PaymentMethod) -> PortResult<PaymentMethod> {
        let (card_name, last4, expiry, upi_id) = match &method.instrument {
            PaymentInstrument::Card {
                card_name,
                last4,
                expiry,
            } => (Some(card_name), Some(last4), Some(expiry), None),
            PaymentInstrument::Upi { upi_id } => (None, None, None, Some(upi_id)),
        };
        sqlx::query_as::<_, PaymentMethodRecord>(
            "INSERT INTO payment_methods \
             (id, user_id, kind, card_name, last4, expiry, upi_id, is_default, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) RETURNING *",
        )
        .bind(method.id)
        .bind(method.user_id)
        .bind(method.instrument.kind())
        .bind(card_name)
        .bind(last4)
        .bind(expiry)
        .bind(upi_id)
        .bind(method.is_default)
        .bind(method.created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            conflict_or_unexpected(e, "User already has a default payment method".to_string())
        })?
        .to_domain()
    }

    async fn get_payment_method(&self, method_id: Uuid) -> PortResult<PaymentMethod> {
        sqlx::query_as::<_, PaymentMethodRecord>("SELECT * FROM payment_methods WHERE id = $1")
            .bind(method_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| not_found_or_unexpected(e, format!("Payment method {}", method_id)))?
            .to_domain()
    }

    async fn list_payment_methods(&self, user_id: Uuid) -> PortResult<Vec<PaymentMethod>> {
        sqlx::query_as::<_, PaymentMethodRecord>(
            "SELECT * FROM payment_methods WHERE user_id = $1 ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?
        .into_iter()
        .map(PaymentMethodRecord::to_domain)
        .collect()
    }

    async fn delete_payment_method(&self, method_id: Uuid) -> PortResult<()> {
        let result = sqlx::query("DELETE FROM payment_methods WHERE id = $1")
            .bind(method_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!(
                "Payment method {} not found",
                method_id
            )));
        }
        Ok(())
    }

    async fn replace_default_payment_method(
        &self,
        user_id: Uuid,
        method_id: Uuid,
    ) -> PortResult<PaymentMethod> {
        let mut tx = self.begin().await?;

        sqlx::query(
            "UPDATE payment_methods SET is_default = FALSE \
             WHERE user_id = $1 AND is_default AND id <> $2",
        )
        .bind(user_id)
        .bind(method_id)
        .execute(&mut *tx)
        .await
        .map_err(unexpected)?;

        let record = sqlx::query_as::<_, PaymentMethodRecord>(
            "UPDATE payment_methods SET is_default = TRUE \
             WHERE id = $1 AND user_id = $2 RETURNING *",
        )
        .bind(method_id)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| {
            conflict_or_unexpected(e, "Default payment method changed concurrently".to_string())
        })?
        .ok_or_else(|| PortError::NotFound(format!("Payment method {} not found", method_id)))?;

        tx.commit().await.map_err(unexpected)?;
        record.to_domain()
    }
}

//=========================================================================================
// Orders
//=========================================================================================

impl DbAdapter {
    /// Loads the items for `records` and assembles the orders, keeping the input order.
    async fn with_items(&self, records: Vec<OrderRecord>) -> PortResult<Vec<Order>> {
        let ids: Vec<Uuid> = records.iter().map(|r| r.id).collect();
        let items = sqlx::query_as::<_, OrderItemRecord>(
            "SELECT * FROM order_items WHERE order_id = ANY($1) ORDER BY order_id, position",
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        let mut by_order: HashMap<Uuid, Vec<OrderItem>> = HashMap::new();
        for item in items {
            by_order.entry(item.order_id).or_default().push(item.to_domain());
        }
        records
            .into_iter()
            .map(|r| {
                let items = by_order.remove(&r.id).unwrap_or_default();
                r.to_domain(items)
            })
            .collect()
    }

    async fn fetch_order(&self, order_id: Uuid) -> PortResult<Order> {
        let record = sqlx::query_as::<_, OrderRecord>("SELECT * FROM orders WHERE id = $1")
            .bind(order_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| not_found_or_unexpected(e, format!("Order {}", order_id)))?;
        self.with_items(vec![record])
            .await?
            .pop()
            .ok_or_else(|| PortError::NotFound(format!("Order {} not found", order_id)))
    }
}

#[async_trait]
impl OrderRepository for DbAdapter {
    async fn commit_order(&self, order: NewOrder) -> PortResult<Order> {
        // One decrement per product, in id order, so concurrent commits lock rows in the
        // same sequence.
        let mut wanted: BTreeMap<Uuid, u32> = BTreeMap::new();
        for item in &order.items {
            let total = wanted.entry(item.product_id).or_insert(0);
            *total = total.saturating_add(item.quantity);
        }

        let mut tx = self.begin().await?;

        for (product_id, quantity) in &wanted {
            let quantity = to_i32(*quantity, "quantity")?;
            let reserved = sqlx::query(
                "UPDATE products SET stock = stock - $1, updated_at = now() \
                 WHERE id = $2 AND stock >= $1",
            )
            .bind(quantity)
            .bind(product_id)
            .execute(&mut *tx)
            .await
            .map_err(unexpected)?;

            if reserved.rows_affected() == 0 {
                let current: Option<(String, i32)> =
                    sqlx::query_as("SELECT name, stock FROM products WHERE id = $1")
                        .bind(product_id)
                        .fetch_optional(&mut *tx)
                        .await
                        .map_err(unexpected)?;
                tx.rollback().await.map_err(unexpected)?;
                return Err(match current {
                    Some((product_name, stock)) => PortError::InsufficientStock {
                        product_name,
                        available: to_u32(stock),
                    },
                    None => PortError::NotFound(format!("Product {} not found", product_id)),
                });
            }
        }

        let shipping = &order.shipping;
        sqlx::query(
            "INSERT INTO orders \
             (id, user_id, shipping_address_id, shipping_name, shipping_phone, \
              shipping_address_line, shipping_city, shipping_state, shipping_pincode, \
              shipping_landmark, payment_method, payment_status, payment_reference, \
              order_status, shipping_fee, total_amount, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, \
                     $17, $17)",
        )
        .bind(order.id)
        .bind(order.user_id)
        .bind(shipping.address_id)
        .bind(&shipping.name)
        .bind(&shipping.phone)
        .bind(&shipping.address_line)
        .bind(&shipping.city)
        .bind(&shipping.state)
        .bind(&shipping.pincode)
        .bind(&shipping.landmark)
        .bind(order.payment_method.as_str())
        .bind(order.payment_status.as_str())
        .bind(&order.payment_reference)
        .bind(OrderStatus::Placed.as_str())
        .bind(order.shipping_fee)
        .bind(order.total_amount)
        .bind(order.created_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| conflict_or_unexpected(e, "Payment reference already used".to_string()))?;

        for (position, item) in order.items.iter().enumerate() {
            sqlx::query(
                "INSERT INTO order_items \
                 (order_id, position, product_id, name, image, quantity, price, selected_size, \
                  color_name, color_hex) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
            )
            .bind(order.id)
            .bind(position as i32)
            .bind(item.product_id)
            .bind(&item.name)
            .bind(&item.image)
            .bind(to_i32(item.quantity, "quantity")?)
            .bind(item.price)
            .bind(&item.selected_size)
            .bind(item.selected_color.as_ref().map(|c| c.name.as_str()))
            .bind(item.selected_color.as_ref().and_then(|c| c.hex.as_deref()))
            .execute(&mut *tx)
            .await
            .map_err(unexpected)?;
        }

        tx.commit().await.map_err(unexpected)?;
        Ok(order.into_order())
    }

    async fn get_order(&self, order_id: Uuid) -> PortResult<Order> {
        self.fetch_order(order_id).await
    }

    async fn list_orders_for_user(&self, user_id: Uuid) -> PortResult<Vec<Order>> {
        let records = sqlx::query_as::<_, OrderRecord>(
            "SELECT * FROM orders WHERE user_id = $1 ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        self.with_items(records).await
    }

    async fn list_all_orders(&self) -> PortResult<Vec<Order>> {
        let records =
            sqlx::query_as::<_, OrderRecord>("SELECT * FROM orders ORDER BY created_at DESC")
                .fetch_all(&self.pool)
                .await
                .map_err(unexpected)?;
        self.with_items(records).await
    }

    async fn find_order_by_payment_reference(&self, reference: &str) -> PortResult<Order> {
        let (order_id,): (Uuid,) =
            sqlx::query_as("SELECT id FROM orders WHERE payment_reference = $1")
                .bind(reference)
                .fetch_one(&self.pool)
                .await
                .map_err(|e| {
                    not_found_or_unexpected(e, format!("Order for payment reference {}", reference))
                })?;
        self.fetch_order(order_id).await
    }

    async fn update_order_status(
        &self,
        order_id: Uuid,
        expected: OrderStatus,
        next: OrderStatus,
        restock: bool,
    ) -> PortResult<Order> {
        let mut tx = self.begin().await?;

        let current: Option<(String, bool)> =
            sqlx::query_as("SELECT order_status, restocked FROM orders WHERE id = $1 FOR UPDATE")
                .bind(order_id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(unexpected)?;
        let (status, restocked) = match current {
            Some(row) => row,
            None => {
                tx.rollback().await.map_err(unexpected)?;
                return Err(PortError::NotFound(format!("Order {} not found", order_id)));
            }
        };
        if status != expected.as_str() {
            tx.rollback().await.map_err(unexpected)?;
            return Err(PortError::Conflict(format!(
                "Order {} is {} (expected {})",
                order_id, status, expected
            )));
        }
        let restock = restock && !restocked;

        sqlx::query(
            "UPDATE orders SET order_status = $1, restocked = restocked OR $2, updated_at = now() \
             WHERE id = $3",
        )
        .bind(next.as_str())
        .bind(restock)
        .bind(order_id)
        .execute(&mut *tx)
        .await
        .map_err(unexpected)?;

        if restock {
            // Products deleted since the order was placed are skipped by the join.
            sqlx::query(
                "UPDATE products p SET stock = p.stock + oi.quantity, updated_at = now() \
                 FROM (SELECT product_id, SUM(quantity) AS quantity FROM order_items \
                       WHERE order_id = $1 GROUP BY product_id) oi \
                 WHERE p.id = oi.product_id",
            )
            .bind(order_id)
            .execute(&mut *tx)
            .await
            .map_err(unexpected)?;
        }

        tx.commit().await.map_err(unexpected)?;
        self.fetch_order(order_id).await
    }

    async fn settle_payment(&self, order_id: Uuid, status: PaymentStatus) -> PortResult<Order> {
        let settled = sqlx::query(
            "UPDATE orders SET payment_status = $1, updated_at = now() \
             WHERE id = $2 AND payment_status = $3",
        )
        .bind(status.as_str())
        .bind(order_id)
        .bind(PaymentStatus::Pending.as_str())
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;

        let order = self.fetch_order(order_id).await?;
        if settled.rows_affected() == 0 {
            return Err(PortError::Conflict(format!(
                "Payment for order {} is already {}",
                order_id,
                order.payment_status.as_str()
            )));
        }
        Ok(order)
    }
}
