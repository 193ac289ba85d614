pub mod addresses;
pub mod auth;
pub mod cart;
pub mod catalog;
pub mod dto;
pub mod extract;
pub mod middleware;
pub mod orders;
pub mod payments;
pub mod rest;
pub mod state;

use axum::{
    http::{
        header::{ACCEPT, CONTENT_TYPE},
        HeaderValue, Method,
    },
    middleware as axum_middleware,
    routing::{delete, get, patch, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::config::ConfigError;
use crate::error::ApiError;
use middleware::{require_admin, require_auth};
use rest::ApiDoc;
use state::AppState;

/// Builds the complete application: public, signed-in and admin routes, CORS for the
/// configured browser origin, request tracing and the Swagger UI.
pub fn router(state: Arc<AppState>) -> Result<Router, ApiError> {
    let origin = state
        .config
        .cors_origin
        .parse::<HeaderValue>()
        .map_err(|e| ConfigError::InvalidValue("CORS_ORIGIN".to_string(), e.to_string()))?;
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([CONTENT_TYPE, ACCEPT]);

    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/auth/signup", post(auth::signup_handler))
        .route("/auth/login", post(auth::login_handler))
        .route("/auth/logout", post(auth::logout_handler))
        .route("/products", get(catalog::list_products_handler))
        .route("/products/featured", get(catalog::featured_products_handler))
        .route("/products/{slug}", get(catalog::product_by_slug_handler))
        .route("/categories", get(catalog::list_categories_handler));

    // Protected routes (auth required)
    let protected_routes = Router::new()
        .route("/auth/me", get(auth::me_handler))
        .route("/users/update", put(auth::update_profile_handler))
        .route("/users/update-password", put(auth::update_password_handler))
        .route("/cart", get(cart::get_cart_handler))
        .route("/cart/add", post(cart::add_to_cart_handler))
        .route("/cart/update", put(cart::update_cart_handler))
        .route("/cart/remove", post(cart::remove_from_cart_handler))
        .route("/cart/clear", delete(cart::clear_cart_handler))
        .route("/wishlist", get(cart::get_wishlist_handler))
        .route("/wishlist/toggle", post(cart::toggle_wishlist_handler))
        .route(
            "/address",
            get(addresses::list_addresses_handler).post(addresses::add_address_handler),
        )
        .route(
            "/address/{id}",
            put(addresses::update_address_handler).delete(addresses::delete_address_handler),
        )
        .route(
            "/address/{id}/default",
            patch(addresses::set_default_address_handler),
        )
        .route(
            "/payments",
            get(payments::list_payment_methods_handler).post(payments::add_payment_method_handler),
        )
        .route(
            "/payments/{id}",
            delete(payments::delete_payment_method_handler),
        )
        .route(
            "/payments/{id}/default",
            patch(payments::set_default_payment_method_handler),
        )
        .route(
            "/payments/create-payment-intent",
            post(payments::create_payment_intent_handler),
        )
        .route("/payments/confirm", post(payments::confirm_payment_handler))
        .route("/orders", post(orders::place_order_handler))
        .route("/orders/myorders", get(orders::my_orders_handler))
        .route("/orders/{id}", get(orders::get_order_handler))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            require_auth,
        ));

    // Admin routes; `require_auth` is the outer layer so it runs first
    let admin_routes = Router::new()
        .route("/admin/products", post(catalog::create_product_handler))
        .route(
            "/admin/products/{id}",
            put(catalog::update_product_handler).delete(catalog::delete_product_handler),
        )
        .route("/admin/categories", post(catalog::create_category_handler))
        .route(
            "/orders/admin/{id}/status",
            put(orders::update_order_status_handler),
        )
        .route("/orders/admin/all", get(orders::all_orders_handler))
        .route_layer(axum_middleware::from_fn(require_admin))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            require_auth,
        ));

    let api_router = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .merge(admin_routes)
        .with_state(state);

    // Merge the API router with the Swagger UI router for a complete application.
    Ok(Router::new()
        .merge(api_router)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
        .layer(cors))
}
