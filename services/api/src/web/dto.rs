//! services/api/src/web/dto.rs
//!
//! JSON request and response bodies. Field names are camelCase on the wire; every
//! response carries `success: true` next to its payload.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use storefront_core::domain::{
    Address, AddressInput, AddressLabel, Category, NewProduct, Order, OrderItem, PaymentInstrument,
    PaymentIntent, PaymentMethod, Product, ProductPatch, ProductRef, ResolvedCartLine,
    SelectedColor, User,
};
use storefront_core::ports::{PortError, PortResult};
use storefront_core::services::{LineKey, OrderLineRequest};
use utoipa::ToSchema;
use uuid::Uuid;

//=========================================================================================
// Shared
//=========================================================================================

#[derive(Serialize, ToSchema)]
pub struct MessageResponse {
    pub success: bool,
    pub message: String,
}

impl MessageResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }
}

#[derive(Serialize, Deserialize, ToSchema, Clone)]
pub struct SelectedColorDto {
    pub name: String,
    pub hex: Option<String>,
}

impl From<SelectedColorDto> for SelectedColor {
    fn from(dto: SelectedColorDto) -> Self {
        SelectedColor {
            name: dto.name,
            hex: dto.hex,
        }
    }
}

impl From<SelectedColor> for SelectedColorDto {
    fn from(color: SelectedColor) -> Self {
        Self {
            name: color.name,
            hex: color.hex,
        }
    }
}

//=========================================================================================
// Accounts
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct SignupRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize, ToSchema)]
pub struct UpdateProfileRequest {
    pub name: String,
    pub email: String,
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePasswordRequest {
    pub old_password: String,
    pub new_password: String,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: String,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            name: user.name,
            email: user.email,
            role: user.role.as_str().to_string(),
            created_at: user.created_at,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct AuthResponse {
    pub success: bool,
    pub user: UserResponse,
}

//=========================================================================================
// Catalog
//=========================================================================================

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProductResponse {
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

impl From<Product> for ProductResponse {
    fn from(p: Product) -> Self {
        Self {
            id: p.id,
            slug: p.slug,
            name: p.name,
            description: p.description,
            price: p.price,
            stock: p.stock,
            images: p.images,
            category_id: p.category_id,
            is_featured: p.is_featured,
            created_at: p.created_at,
            updated_at: p.updated_at,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct ProductEnvelope {
    pub success: bool,
    pub product: ProductResponse,
}

#[derive(Serialize, ToSchema)]
pub struct ProductList {
    pub success: bool,
    pub products: Vec<ProductResponse>,
}

impl ProductList {
    pub fn new(products: Vec<Product>) -> Self {
        Self {
            success: true,
            products: products.into_iter().map(ProductResponse::from).collect(),
        }
    }
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProductRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price: Decimal,
    pub stock: u32,
    pub images: Vec<String>,
    pub category_id: Uuid,
    #[serde(default)]
    pub is_featured: bool,
}

impl From<ProductRequest> for NewProduct {
    fn from(req: ProductRequest) -> Self {
        NewProduct {
            name: req.name,
            description: req.description,
            price: req.price,
            stock: req.stock,
            images: req.images,
            category_id: req.category_id,
            is_featured: req.is_featured,
        }
    }
}

#[derive(Deserialize, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
pub struct ProductPatchRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<Decimal>,
    pub stock: Option<u32>,
    pub images: Option<Vec<String>>,
    pub category_id: Option<Uuid>,
    pub is_featured: Option<bool>,
}

impl From<ProductPatchRequest> for ProductPatch {
    fn from(req: ProductPatchRequest) -> Self {
        ProductPatch {
            name: req.name,
            description: req.description,
            price: req.price,
            stock: req.stock,
            images: req.images,
            category_id: req.category_id,
            is_featured: req.is_featured,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct CategoryResponse {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
}

impl From<Category> for CategoryResponse {
    fn from(c: Category) -> Self {
        Self {
            id: c.id,
            name: c.name,
            slug: c.slug,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct CategoryList {
    pub success: bool,
    pub categories: Vec<CategoryResponse>,
}

#[derive(Serialize, ToSchema)]
pub struct CategoryEnvelope {
    pub success: bool,
    pub category: CategoryResponse,
}

#[derive(Deserialize, ToSchema)]
pub struct CategoryRequest {
    pub name: String,
}

//=========================================================================================
// Cart & Wishlist
//=========================================================================================

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AddToCartRequest {
    /// Product id or slug.
    pub product_id: String,
    pub quantity: Option<u32>,
    pub selected_size: Option<String>,
    pub selected_color: Option<SelectedColorDto>,
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCartRequest {
    pub product_id: String,
    /// Zero or less removes the line.
    pub quantity: i64,
    pub selected_size: Option<String>,
    pub selected_color: Option<SelectedColorDto>,
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RemoveFromCartRequest {
    pub product_id: String,
    pub selected_size: Option<String>,
    pub selected_color: Option<SelectedColorDto>,
}

pub fn line_key(
    product_id: &str,
    selected_size: Option<String>,
    selected_color: Option<SelectedColorDto>,
) -> LineKey {
    LineKey {
        product: ProductRef::parse(product_id),
        selected_size,
        selected_color: selected_color.map(|c| c.name),
    }
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CartLineResponse {
    pub product: ProductResponse,
    pub quantity: u32,
    pub selected_size: Option<String>,
    pub selected_color: Option<SelectedColorDto>,
    pub line_total: Decimal,
}

impl From<ResolvedCartLine> for CartLineResponse {
    fn from(line: ResolvedCartLine) -> Self {
        Self {
            line_total: line.line_total(),
            product: line.product.into(),
            quantity: line.quantity,
            selected_size: line.selected_size,
            selected_color: line.selected_color.map(Into::into),
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct CartResponse {
    pub success: bool,
    pub cart: Vec<CartLineResponse>,
    pub total: Decimal,
}

impl From<storefront_core::domain::Cart> for CartResponse {
    fn from(cart: storefront_core::domain::Cart) -> Self {
        Self {
            success: true,
            total: cart.total(),
            cart: cart.lines.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ToggleWishlistRequest {
    pub product_id: String,
}

#[derive(Serialize, ToSchema)]
pub struct WishlistResponse {
    pub success: bool,
    pub wishlist: Vec<ProductResponse>,
}

impl WishlistResponse {
    pub fn new(products: Vec<Product>) -> Self {
        Self {
            success: true,
            wishlist: products.into_iter().map(Into::into).collect(),
        }
    }
}

//=========================================================================================
// Address Book
//=========================================================================================

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AddressRequest {
    pub name: String,
    pub phone: String,
    pub address_line: String,
    pub city: String,
    pub state: String,
    pub pincode: String,
    pub landmark: Option<String>,
    /// `Home`, `Work` or `Other`; defaults to `Home`.
    pub label: Option<String>,
    #[serde(default)]
    pub is_default: bool,
}

impl TryFrom<AddressRequest> for AddressInput {
    type Error = PortError;

    fn try_from(req: AddressRequest) -> PortResult<Self> {
        let label = match req.label.as_deref() {
            None | Some("") => AddressLabel::default(),
            Some(raw) => raw.parse().map_err(PortError::Validation)?,
        };
        Ok(AddressInput {
            name: req.name,
            phone: req.phone,
            address_line: req.address_line,
            city: req.city,
            state: req.state,
            pincode: req.pincode,
            landmark: req.landmark,
            label,
            is_default: req.is_default,
        })
    }
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AddressResponse {
    pub id: Uuid,
    pub name: String,
    pub phone: String,
    pub address_line: String,
    pub city: String,
    pub state: String,
    pub pincode: String,
    pub landmark: Option<String>,
    pub label: String,
    pub is_default: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Address> for AddressResponse {
    fn from(a: Address) -> Self {
        Self {
            id: a.id,
            name: a.name,
            phone: a.phone,
            address_line: a.address_line,
            city: a.city,
            state: a.state,
            pincode: a.pincode,
            landmark: a.landmark,
            label: a.label.as_str().to_string(),
            is_default: a.is_default,
            created_at: a.created_at,
            updated_at: a.updated_at,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct AddressEnvelope {
    pub success: bool,
    pub address: AddressResponse,
}

#[derive(Serialize, ToSchema)]
pub struct AddressList {
    pub success: bool,
    pub addresses: Vec<AddressResponse>,
}

//=========================================================================================
// Payments
//=========================================================================================

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PaymentMethodRequest {
    /// `card` or `upi`.
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub is_default: bool,
    pub card_name: Option<String>,
    pub last4: Option<String>,
    pub expiry: Option<String>,
    pub upi_id: Option<String>,
}

impl PaymentMethodRequest {
    pub fn instrument(self) -> PortResult<PaymentInstrument> {
        match self.kind.as_str() {
            "card" => Ok(PaymentInstrument::Card {
                card_name: self.card_name.unwrap_or_default(),
                last4: self.last4.unwrap_or_default(),
                expiry: self.expiry.unwrap_or_default(),
            }),
            "upi" => Ok(PaymentInstrument::Upi {
                upi_id: self.upi_id.unwrap_or_default(),
            }),
            _ => Err(PortError::Validation("Invalid payment method type".to_string())),
        }
    }
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PaymentMethodResponse {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub card_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last4: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiry: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upi_id: Option<String>,
    pub is_default: bool,
    pub created_at: DateTime<Utc>,
}

impl From<PaymentMethod> for PaymentMethodResponse {
    fn from(m: PaymentMethod) -> Self {
        let kind = m.instrument.kind().to_string();
        let (card_name, last4, expiry, upi_id) = match m.instrument {
            PaymentInstrument::Card {
                card_name,
                last4,
                expiry,
            } => (Some(card_name), Some(last4), Some(expiry), None),
            PaymentInstrument::Upi { upi_id } => (None, None, None, Some(upi_id)),
        };
        Self {
            id: m.id,
            kind,
            card_name,
            last4,
            expiry,
            upi_id,
            is_default: m.is_default,
            created_at: m.created_at,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct PaymentMethodList {
    pub success: bool,
    pub methods: Vec<PaymentMethodResponse>,
}

impl PaymentMethodList {
    pub fn new(methods: Vec<PaymentMethod>) -> Self {
        Self {
            success: true,
            methods: methods.into_iter().map(Into::into).collect(),
        }
    }
}

/// One requested line of an order or a payment quote.
#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OrderLineDto {
    /// Product id or slug.
    #[serde(alias = "productId")]
    pub product: String,
    pub quantity: u32,
    pub selected_size: Option<String>,
    pub selected_color: Option<SelectedColorDto>,
}

impl From<OrderLineDto> for OrderLineRequest {
    fn from(dto: OrderLineDto) -> Self {
        OrderLineRequest {
            product: ProductRef::parse(&dto.product),
            quantity: dto.quantity,
            selected_size: dto.selected_size,
            selected_color: dto.selected_color.map(Into::into),
        }
    }
}

pub fn order_lines(items: Vec<OrderLineDto>) -> Vec<OrderLineRequest> {
    items.into_iter().map(Into::into).collect()
}

#[derive(Deserialize, ToSchema)]
pub struct CreatePaymentIntentRequest {
    pub items: Vec<OrderLineDto>,
    pub currency: Option<String>,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PaymentIntentResponse {
    pub success: bool,
    /// `live` or `simulated`.
    pub mode: String,
    pub handle_id: String,
    pub client_secret: String,
    pub amount: Decimal,
    pub currency: String,
}

impl From<PaymentIntent> for PaymentIntentResponse {
    fn from(intent: PaymentIntent) -> Self {
        Self {
            success: true,
            mode: intent.mode.as_str().to_string(),
            handle_id: intent.handle_id,
            client_secret: intent.client_secret,
            amount: intent.amount,
            currency: intent.currency,
        }
    }
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmPaymentRequest {
    #[serde(alias = "paymentIntentId")]
    pub handle_id: String,
    /// Status as reported by the client-side payment flow.
    #[serde(default)]
    pub status: String,
}

//=========================================================================================
// Orders
//=========================================================================================

#[derive(Deserialize, ToSchema, Clone)]
pub struct PaymentInfoDto {
    pub id: String,
    pub status: String,
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    pub items: Vec<OrderLineDto>,
    /// Id of one of the caller's saved addresses.
    pub shipping_address: Option<Uuid>,
    /// `COD`, `Card` or `UPI`; defaults to `COD`.
    pub payment_method: Option<String>,
    pub payment_info: Option<PaymentInfoDto>,
}

#[derive(Deserialize, ToSchema)]
pub struct UpdateOrderStatusRequest {
    pub status: String,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OrderItemResponse {
    pub product_id: Uuid,
    pub name: String,
    pub image: Option<String>,
    pub quantity: u32,
    pub price: Decimal,
    pub selected_size: Option<String>,
    pub selected_color: Option<SelectedColorDto>,
}

impl From<OrderItem> for OrderItemResponse {
    fn from(item: OrderItem) -> Self {
        Self {
            product_id: item.product_id,
            name: item.name,
            image: item.image,
            quantity: item.quantity,
            price: item.price,
            selected_size: item.selected_size,
            selected_color: item.selected_color.map(Into::into),
        }
    }
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ShippingAddressResponse {
    pub address_id: Uuid,
    pub name: String,
    pub phone: String,
    pub address_line: String,
    pub city: String,
    pub state: String,
    pub pincode: String,
    pub landmark: Option<String>,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OrderResponse {
    pub id: Uuid,
    pub user_id: Uuid,
    pub items: Vec<OrderItemResponse>,
    pub shipping_address: ShippingAddressResponse,
    pub payment_method: String,
    pub payment_status: String,
    pub payment_reference: Option<String>,
    pub order_status: String,
    pub shipping_fee: Decimal,
    pub total_amount: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Order> for OrderResponse {
    fn from(o: Order) -> Self {
        let s = o.shipping;
        Self {
            id: o.id,
            user_id: o.user_id,
            items: o.items.into_iter().map(Into::into).collect(),
            shipping_address: ShippingAddressResponse {
                address_id: s.address_id,
                name: s.name,
                phone: s.phone,
                address_line: s.address_line,
                city: s.city,
                state: s.state,
                pincode: s.pincode,
                landmark: s.landmark,
            },
            payment_method: o.payment_method.as_str().to_string(),
            payment_status: o.payment_status.as_str().to_string(),
            payment_reference: o.payment_reference,
            order_status: o.order_status.as_str().to_string(),
            shipping_fee: o.shipping_fee,
            total_amount: o.total_amount,
            created_at: o.created_at,
            updated_at: o.updated_at,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct OrderEnvelope {
    pub success: bool,
    pub order: OrderResponse,
}

impl OrderEnvelope {
    pub fn new(order: Order) -> Self {
        Self {
            success: true,
            order: order.into(),
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct OrderList {
    pub success: bool,
    pub orders: Vec<OrderResponse>,
}

impl OrderList {
    pub fn new(orders: Vec<Order>) -> Self {
        Self {
            success: true,
            orders: orders.into_iter().map(Into::into).collect(),
        }
    }
}
