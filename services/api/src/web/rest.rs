//! services/api/src/web/rest.rs
//!
//! The master definition for the OpenAPI specification.

use utoipa::OpenApi;

use crate::error::ErrorBody;
use crate::web::dto::{
    AddToCartRequest, AddressEnvelope, AddressList, AddressRequest, AddressResponse,
    AuthResponse, CartLineResponse, CartResponse, CategoryEnvelope, CategoryList,
    CategoryRequest, CategoryResponse, ConfirmPaymentRequest, CreateOrderRequest,
    CreatePaymentIntentRequest, LoginRequest, MessageResponse, OrderEnvelope, OrderItemResponse,
    OrderLineDto, OrderList, OrderResponse, PaymentInfoDto, PaymentIntentResponse,
    PaymentMethodList, PaymentMethodRequest, PaymentMethodResponse, ProductEnvelope, ProductList,
    ProductPatchRequest, ProductRequest, ProductResponse, RemoveFromCartRequest,
    SelectedColorDto, ShippingAddressResponse, SignupRequest, ToggleWishlistRequest,
    UpdateCartRequest, UpdateOrderStatusRequest, UpdatePasswordRequest, UpdateProfileRequest,
    UserResponse, WishlistResponse,
};
use crate::web::{addresses, auth, cart, catalog, orders, payments};

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        auth::signup_handler,
        auth::login_handler,
        auth::logout_handler,
        auth::me_handler,
        auth::update_profile_handler,
        auth::update_password_handler,
        catalog::list_products_handler,
        catalog::featured_products_handler,
        catalog::product_by_slug_handler,
        catalog::list_categories_handler,
        catalog::create_product_handler,
        catalog::update_product_handler,
        catalog::delete_product_handler,
        catalog::create_category_handler,
        cart::get_cart_handler,
        cart::add_to_cart_handler,
        cart::update_cart_handler,
        cart::remove_from_cart_handler,
        cart::clear_cart_handler,
        cart::get_wishlist_handler,
        cart::toggle_wishlist_handler,
        addresses::list_addresses_handler,
        addresses::add_address_handler,
        addresses::update_address_handler,
        addresses::delete_address_handler,
        addresses::set_default_address_handler,
        payments::list_payment_methods_handler,
        payments::add_payment_method_handler,
        payments::delete_payment_method_handler,
        payments::set_default_payment_method_handler,
        payments::create_payment_intent_handler,
        payments::confirm_payment_handler,
        orders::place_order_handler,
        orders::my_orders_handler,
        orders::get_order_handler,
        orders::update_order_status_handler,
        orders::all_orders_handler,
    ),
    components(
        schemas(
            ErrorBody, MessageResponse, SelectedColorDto,
            SignupRequest, LoginRequest, UserResponse, AuthResponse, UpdateProfileRequest,
            UpdatePasswordRequest,
            ProductResponse, ProductEnvelope, ProductList, ProductRequest, ProductPatchRequest,
            CategoryResponse, CategoryList, CategoryEnvelope, CategoryRequest,
            AddToCartRequest, UpdateCartRequest, RemoveFromCartRequest, CartLineResponse,
            CartResponse, ToggleWishlistRequest, WishlistResponse,
            AddressRequest, AddressResponse, AddressEnvelope, AddressList,
            PaymentMethodRequest, PaymentMethodResponse, PaymentMethodList,
            OrderLineDto, CreatePaymentIntentRequest, PaymentIntentResponse, ConfirmPaymentRequest,
            PaymentInfoDto, CreateOrderRequest, UpdateOrderStatusRequest,
            OrderItemResponse, ShippingAddressResponse, OrderResponse, OrderEnvelope, OrderList
        )
    ),
    tags(
        (name = "Accounts", description = "Signup, login, the session cookie and profile edits."),
        (name = "Catalog", description = "Public product and category reads."),
        (name = "Catalog Admin", description = "Product and category management. Admin only."),
        (name = "Cart", description = "The caller's shopping cart."),
        (name = "Wishlist", description = "The caller's wishlist."),
        (name = "Addresses", description = "The caller's shipping address book."),
        (name = "Payments", description = "Stored payment methods and gateway payments."),
        (name = "Orders", description = "Order placement and history."),
        (name = "Orders Admin", description = "Order status management. Admin only.")
    )
)]
pub struct ApiDoc;
