//! crates/storefront_core/src/domain.rs
//!
//! Defines the pure, core data structures for the storefront.
//! These structs are independent of any database or serialization format.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

//=========================================================================================
// Accounts
//=========================================================================================

/// The role attached to an account. Admin routes check this server-side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Customer,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Customer => "user",
            Role::Admin => "admin",
        }
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::Customer),
            "admin" => Ok(Role::Admin),
            other => Err(format!("unknown role '{}'", other)),
        }
    }
}

// Represents a user - used throughout app
#[derive(Debug, Clone)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

// Only used internally for login/signup - contains sensitive data
#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub user_id: Uuid,
    pub email: String,
    pub hashed_password: String,
}

/// The identity resolved from a session cookie for the duration of one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub role: Role,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

//=========================================================================================
// Catalog
//=========================================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct Category {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
}

/// A catalog product. `price` and `stock` are authoritative and never taken from a client.
#[derive(Debug, Clone, PartialEq)]
pub struct Product {
    pub id: Uuid,
    pub slug: String,
    pub name: String,
    pub description: String,
    pub price: Decimal,
    pub stock: u32,
    pub images: Vec<String>,
    pub category_id: Uuid,
    pub is_featured: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Admin input for a new product. The slug is derived from the name.
#[derive(Debug, Clone)]
pub struct NewProduct {
    pub name: String,
    pub description: String,
    pub price: Decimal,
    pub stock: u32,
    pub images: Vec<String>,
    pub category_id: Uuid,
    pub is_featured: bool,
}

/// Partial admin update of a product.
#[derive(Debug, Clone, Default)]
pub struct ProductPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<Decimal>,
    pub stock: Option<u32>,
    pub images: Option<Vec<String>>,
    pub category_id: Option<Uuid>,
    pub is_featured: Option<bool>,
}

/// Validated column changes for one product. `None` leaves the stored value alone, so
/// stock moved by concurrent checkouts is never written back.
#[derive(Debug, Clone, Default)]
pub struct ProductChanges {
    pub name: Option<String>,
    pub slug: Option<String>,
    pub description: Option<String>,
    pub price: Option<Decimal>,
    pub stock: Option<u32>,
    pub images: Option<Vec<String>>,
    pub category_id: Option<Uuid>,
    pub is_featured: Option<bool>,
}

/// A client-supplied product reference: either the internal id or the human slug.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProductRef {
    Id(Uuid),
    Slug(String),
}

impl ProductRef {
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        match Uuid::parse_str(raw) {
            Ok(id) => ProductRef::Id(id),
            Err(_) => ProductRef::Slug(raw.to_string()),
        }
    }
}

impl fmt::Display for ProductRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProductRef::Id(id) => write!(f, "{}", id),
            ProductRef::Slug(slug) => f.write_str(slug),
        }
    }
}

/// Turns a product or category name into a lower-case, URL-safe slug.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_dash = false;
    for c in name.trim().chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }
    slug
}

//=========================================================================================
// Cart & Wishlist
//=========================================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedColor {
    pub name: String,
    pub hex: Option<String>,
}

/// One cart entry. Identity is `(product_id, selected_size, selected_color.name)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartLine {
    pub product_id: Uuid,
    pub quantity: u32,
    pub selected_size: Option<String>,
    pub selected_color: Option<SelectedColor>,
}

impl CartLine {
    pub fn color_name(&self) -> Option<&str> {
        self.selected_color.as_ref().map(|c| c.name.as_str())
    }

    pub fn matches(&self, product_id: Uuid, size: Option<&str>, color_name: Option<&str>) -> bool {
        self.product_id == product_id
            && self.selected_size.as_deref() == size
            && self.color_name() == color_name
    }
}

/// A cart line with its product resolved against the live catalog.
#[derive(Debug, Clone)]
pub struct ResolvedCartLine {
    pub product: Product,
    pub quantity: u32,
    pub selected_size: Option<String>,
    pub selected_color: Option<SelectedColor>,
}

impl ResolvedCartLine {
    pub fn line_total(&self) -> Decimal {
        self.product.price * Decimal::from(self.quantity)
    }
}

/// The user's cart as shown to them. `total` is always computed from live prices.
#[derive(Debug, Clone, Default)]
pub struct Cart {
    pub lines: Vec<ResolvedCartLine>,
}

impl Cart {
    pub fn total(&self) -> Decimal {
        self.lines.iter().map(ResolvedCartLine::line_total).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

//=========================================================================================
// Address Book
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AddressLabel {
    #[default]
    Home,
    Work,
    Other,
}

impl AddressLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            AddressLabel::Home => "Home",
            AddressLabel::Work => "Work",
            AddressLabel::Other => "Other",
        }
    }
}

impl FromStr for AddressLabel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Home" => Ok(AddressLabel::Home),
            "Work" => Ok(AddressLabel::Work),
            "Other" => Ok(AddressLabel::Other),
            other => Err(format!("unknown address label '{}'", other)),
        }
    }
}

/// A shipping address. Deletion is soft (`is_active = false`) so history keeps resolving.
#[derive(Debug, Clone, PartialEq)]
pub struct Address {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub phone: String,
    pub address_line: String,
    pub city: String,
    pub state: String,
    pub pincode: String,
    pub landmark: Option<String>,
    pub label: AddressLabel,
    pub is_default: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// User input for creating or replacing an address.
#[derive(Debug, Clone)]
pub struct AddressInput {
    pub name: String,
    pub phone: String,
    pub address_line: String,
    pub city: String,
    pub state: String,
    pub pincode: String,
    pub landmark: Option<String>,
    pub label: AddressLabel,
    pub is_default: bool,
}

//=========================================================================================
// Payment Method Book
//=========================================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentInstrument {
    Card {
        card_name: String,
        last4: String,
        expiry: String,
    },
    Upi {
        upi_id: String,
    },
}

impl PaymentInstrument {
    pub fn kind(&self) -> &'static str {
        match self {
            PaymentInstrument::Card { .. } => "card",
            PaymentInstrument::Upi { .. } => "upi",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PaymentMethod {
    pub id: Uuid,
    pub user_id: Uuid,
    pub instrument: PaymentInstrument,
    pub is_default: bool,
    pub created_at: DateTime<Utc>,
}

//=========================================================================================
// Orders
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentStatus {
    Pending,
    Paid,
    Failed,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Failed => "failed",
        }
    }
}

impl FromStr for PaymentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(PaymentStatus::Pending),
            "paid" => Ok(PaymentStatus::Paid),
            "failed" => Ok(PaymentStatus::Failed),
            other => Err(format!("unknown payment status '{}'", other)),
        }
    }
}

/// Fulfillment state: `placed -> processing -> shipped -> delivered`, or `cancelled`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderStatus {
    Placed,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Placed => "placed",
            OrderStatus::Processing => "processing",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }

    fn rank(&self) -> u8 {
        match self {
            OrderStatus::Placed => 0,
            OrderStatus::Processing => 1,
            OrderStatus::Shipped => 2,
            OrderStatus::Delivered => 3,
            OrderStatus::Cancelled => 4,
        }
    }

    /// Whether `next` is a legal step under the forward-only lifecycle.
    pub fn can_advance_to(&self, next: OrderStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        match next {
            OrderStatus::Cancelled => true,
            _ => next.rank() > self.rank(),
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "placed" => Ok(OrderStatus::Placed),
            "processing" => Ok(OrderStatus::Processing),
            "shipped" => Ok(OrderStatus::Shipped),
            "delivered" => Ok(OrderStatus::Delivered),
            "cancelled" => Ok(OrderStatus::Cancelled),
            other => Err(format!("unknown order status '{}'", other)),
        }
    }
}

/// The payment path label snapshotted onto an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PaymentMethodLabel {
    #[default]
    CashOnDelivery,
    Card,
    Upi,
}

impl PaymentMethodLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethodLabel::CashOnDelivery => "COD",
            PaymentMethodLabel::Card => "Card",
            PaymentMethodLabel::Upi => "UPI",
        }
    }
}

impl FromStr for PaymentMethodLabel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "COD" => Ok(PaymentMethodLabel::CashOnDelivery),
            "Card" => Ok(PaymentMethodLabel::Card),
            "UPI" => Ok(PaymentMethodLabel::Upi),
            other => Err(format!("unknown payment method '{}'", other)),
        }
    }
}

/// A purchased line. `price` is the catalog price at the moment the order was placed.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderItem {
    pub product_id: Uuid,
    pub name: String,
    pub image: Option<String>,
    pub quantity: u32,
    pub price: Decimal,
    pub selected_size: Option<String>,
    pub selected_color: Option<SelectedColor>,
}

impl OrderItem {
    pub fn line_total(&self) -> Decimal {
        self.price * Decimal::from(self.quantity)
    }
}

/// Copy of the delivery address taken when the order is created.
#[derive(Debug, Clone, PartialEq)]
pub struct ShippingSnapshot {
    pub address_id: Uuid,
    pub name: String,
    pub phone: String,
    pub address_line: String,
    pub city: String,
    pub state: String,
    pub pincode: String,
    pub landmark: Option<String>,
}

impl From<&Address> for ShippingSnapshot {
    fn from(address: &Address) -> Self {
        Self {
            address_id: address.id,
            name: address.name.clone(),
            phone: address.phone.clone(),
            address_line: address.address_line.clone(),
            city: address.city.clone(),
            state: address.state.clone(),
            pincode: address.pincode.clone(),
            landmark: address.landmark.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    pub id: Uuid,
    pub user_id: Uuid,
    pub items: Vec<OrderItem>,
    pub shipping: ShippingSnapshot,
    pub payment_method: PaymentMethodLabel,
    pub payment_status: PaymentStatus,
    pub payment_reference: Option<String>,
    pub order_status: OrderStatus,
    pub shipping_fee: Decimal,
    pub total_amount: Decimal,
    /// Set once the items have been returned to stock after a cancellation.
    pub restocked: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    pub fn subtotal(&self) -> Decimal {
        self.items.iter().map(OrderItem::line_total).sum()
    }
}

/// Everything needed to commit an order; storage assigns nothing but the row itself.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub id: Uuid,
    pub user_id: Uuid,
    pub items: Vec<OrderItem>,
    pub shipping: ShippingSnapshot,
    pub payment_method: PaymentMethodLabel,
    pub payment_status: PaymentStatus,
    pub payment_reference: Option<String>,
    pub shipping_fee: Decimal,
    pub total_amount: Decimal,
    pub created_at: DateTime<Utc>,
}

impl NewOrder {
    pub fn into_order(self) -> Order {
        Order {
            id: self.id,
            user_id: self.user_id,
            items: self.items,
            shipping: self.shipping,
            payment_method: self.payment_method,
            payment_status: self.payment_status,
            payment_reference: self.payment_reference,
            order_status: OrderStatus::Placed,
            shipping_fee: self.shipping_fee,
            total_amount: self.total_amount,
            restocked: false,
            created_at: self.created_at,
            updated_at: self.created_at,
        }
    }
}

//=========================================================================================
// Payment Gateway
//=========================================================================================

/// Whether a payment handle came from the real gateway or the simulated fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayMode {
    Live,
    Simulated,
}

impl GatewayMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            GatewayMode::Live => "live",
            GatewayMode::Simulated => "simulated",
        }
    }
}

/// Status of a payment as reported by the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayPaymentStatus {
    Succeeded,
    Pending,
    Failed,
}

/// What the gateway knows about a handle: its status and what it was issued for.
#[derive(Debug, Clone, PartialEq)]
pub struct GatewayPayment {
    pub status: GatewayPaymentStatus,
    pub amount: Decimal,
    pub currency: String,
}

impl GatewayPayment {
    /// True when the payment was issued for exactly `amount` in `currency`.
    pub fn covers(&self, amount: Decimal, currency: &str) -> bool {
        self.amount == amount && self.currency.eq_ignore_ascii_case(currency)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PaymentIntent {
    pub handle_id: String,
    pub client_secret: String,
    pub amount: Decimal,
    pub currency: String,
    pub mode: GatewayMode,
}
