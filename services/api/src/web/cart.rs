//! services/api/src/web/cart.rs
//!
//! Cart and wishlist endpoints. Every handler here runs behind `require_auth`.

use axum::{extract::State, Extension, Json};
use std::sync::Arc;
use storefront_core::domain::{AuthUser, ProductRef};

use crate::error::{ApiError, ErrorBody};
use crate::web::dto::{
    line_key, AddToCartRequest, CartResponse, RemoveFromCartRequest, ToggleWishlistRequest,
    UpdateCartRequest, WishlistResponse,
};
use crate::web::extract::ApiJson;
use crate::web::state::AppState;

//=========================================================================================
// Cart
//=========================================================================================

/// GET /cart - The caller's cart with live prices and total
#[utoipa::path(
    get,
    path = "/cart",
    tag = "Cart",
    responses(
        (status = 200, description = "Current cart", body = CartResponse),
        (status = 401, description = "No active session", body = ErrorBody)
    )
)]
pub async fn get_cart_handler(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<AuthUser>,
) -> Result<Json<CartResponse>, ApiError> {
    let cart = state.carts.get(caller.user_id).await?;
    Ok(Json(cart.into()))
}

/// POST /cart/add - Add a product, merging with an identical variant line
#[utoipa::path(
    post,
    path = "/cart/add",
    tag = "Cart",
    request_body = AddToCartRequest,
    responses(
        (status = 200, description = "Updated cart", body = CartResponse),
        (status = 404, description = "No such product", body = ErrorBody)
    )
)]
pub async fn add_to_cart_handler(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<AuthUser>,
    ApiJson(req): ApiJson<AddToCartRequest>,
) -> Result<Json<CartResponse>, ApiError> {
    let cart = state
        .carts
        .add(
            caller.user_id,
            &ProductRef::parse(&req.product_id),
            req.quantity,
            req.selected_size,
            req.selected_color.map(Into::into),
        )
        .await?;
    Ok(Json(cart.into()))
}

#[utoipa::path(
    put,
    path = "/cart/update",
    tag = "Cart",
    request_body = UpdateCartRequest,
    responses((status = 200, description = "Updated cart", body = CartResponse))
)]
pub async fn update_cart_handler(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<AuthUser>,
    ApiJson(req): ApiJson<UpdateCartRequest>,
) -> Result<Json<CartResponse>, ApiError> {
    let key = line_key(&req.product_id, req.selected_size, req.selected_color);
    let cart = state
        .carts
        .update_quantity(caller.user_id, &key, req.quantity)
        .await?;
    Ok(Json(cart.into()))
}

#[utoipa::path(
    post,
    path = "/cart/remove",
    tag = "Cart",
    request_body = RemoveFromCartRequest,
    responses((status = 200, description = "Updated cart", body = CartResponse))
)]
pub async fn remove_from_cart_handler(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<AuthUser>,
    ApiJson(req): ApiJson<RemoveFromCartRequest>,
) -> Result<Json<CartResponse>, ApiError> {
    let key = line_key(&req.product_id, req.selected_size, req.selected_color);
    let cart = state.carts.remove(caller.user_id, &key).await?;
    Ok(Json(cart.into()))
}

#[utoipa::path(
    delete,
    path = "/cart/clear",
    tag = "Cart",
    responses((status = 200, description = "Empty cart", body = CartResponse))
)]
pub async fn clear_cart_handler(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<AuthUser>,
) -> Result<Json<CartResponse>, ApiError> {
    let cart = state.carts.clear(caller.user_id).await?;
    Ok(Json(cart.into()))
}

//=========================================================================================
// Wishlist
//=========================================================================================

#[utoipa::path(
    get,
    path = "/wishlist",
    tag = "Wishlist",
    responses((status = 200, description = "Wishlisted products", body = WishlistResponse))
)]
pub async fn get_wishlist_handler(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<AuthUser>,
) -> Result<Json<WishlistResponse>, ApiError> {
    let products = state.wishlists.get(caller.user_id).await?;
    Ok(Json(WishlistResponse::new(products)))
}

/// POST /wishlist/toggle - Add the product if absent, remove it if present
#[utoipa::path(
    post,
    path = "/wishlist/toggle",
    tag = "Wishlist",
    request_body = ToggleWishlistRequest,
    responses(
        (status = 200, description = "Updated wishlist", body = WishlistResponse),
        (status = 404, description = "No such product", body = ErrorBody)
    )
)]
pub async fn toggle_wishlist_handler(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<AuthUser>,
    ApiJson(req): ApiJson<ToggleWishlistRequest>,
) -> Result<Json<WishlistResponse>, ApiError> {
    let products = state
        .wishlists
        .toggle(caller.user_id, &ProductRef::parse(&req.product_id))
        .await?;
    Ok(Json(WishlistResponse::new(products)))
}
