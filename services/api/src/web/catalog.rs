//! services/api/src/web/catalog.rs
//!
//! Public catalog reads and the admin-only catalog management endpoints.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::error::{ApiError, ErrorBody};
use crate::web::dto::{
    CategoryEnvelope, CategoryList, CategoryRequest, MessageResponse, ProductEnvelope,
    ProductList, ProductPatchRequest, ProductRequest,
};
use crate::web::extract::ApiJson;
use crate::web::state::AppState;

//=========================================================================================
// Public Reads
//=========================================================================================

/// GET /products - Every product, newest first
#[utoipa::path(
    get,
    path = "/products",
    tag = "Catalog",
    responses((status = 200, description = "All products", body = ProductList))
)]
pub async fn list_products_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ProductList>, ApiError> {
    let products = state.catalog.list().await?;
    Ok(Json(ProductList::new(products)))
}

/// GET /products/featured - Products flagged for the storefront front page
#[utoipa::path(
    get,
    path = "/products/featured",
    tag = "Catalog",
    responses((status = 200, description = "Featured products", body = ProductList))
)]
pub async fn featured_products_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ProductList>, ApiError> {
    let products = state.catalog.featured().await?;
    Ok(Json(ProductList::new(products)))
}

#[utoipa::path(
    get,
    path = "/products/{slug}",
    tag = "Catalog",
    params(("slug" = String, Path, description = "Product slug")),
    responses(
        (status = 200, description = "The product", body = ProductEnvelope),
        (status = 404, description = "No such product", body = ErrorBody)
    )
)]
pub async fn product_by_slug_handler(
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
) -> Result<Json<ProductEnvelope>, ApiError> {
    let product = state.catalog.by_slug(&slug).await?;
    Ok(Json(ProductEnvelope {
        success: true,
        product: product.into(),
    }))
}

#[utoipa::path(
    get,
    path = "/categories",
    tag = "Catalog",
    responses((status = 200, description = "All categories", body = CategoryList))
)]
pub async fn list_categories_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<CategoryList>, ApiError> {
    let categories = state.catalog.categories().await?;
    Ok(Json(CategoryList {
        success: true,
        categories: categories.into_iter().map(Into::into).collect(),
    }))
}

//=========================================================================================
// Admin
//=========================================================================================

/// POST /admin/products - Create a product; the slug is derived from the name
#[utoipa::path(
    post,
    path = "/admin/products",
    tag = "Catalog Admin",
    request_body = ProductRequest,
    responses(
        (status = 201, description = "Product created", body = ProductEnvelope),
        (status = 400, description = "Invalid product", body = ErrorBody),
        (status = 403, description = "Caller is not an admin", body = ErrorBody),
        (status = 409, description = "Slug already taken", body = ErrorBody)
    )
)]
pub async fn create_product_handler(
    State(state): State<Arc<AppState>>,
    ApiJson(req): ApiJson<ProductRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let product = state.catalog.create_product(req.into()).await?;
    info!(product_id = %product.id, slug = %product.slug, "Product created");
    Ok((
        StatusCode::CREATED,
        Json(ProductEnvelope {
            success: true,
            product: product.into(),
        }),
    ))
}

#[utoipa::path(
    put,
    path = "/admin/products/{id}",
    tag = "Catalog Admin",
    params(("id" = Uuid, Path, description = "Product id")),
    request_body = ProductPatchRequest,
    responses(
        (status = 200, description = "Product updated", body = ProductEnvelope),
        (status = 404, description = "No such product", body = ErrorBody)
    )
)]
pub async fn update_product_handler(
    State(state): State<Arc<AppState>>,
    Path(product_id): Path<Uuid>,
    ApiJson(req): ApiJson<ProductPatchRequest>,
) -> Result<Json<ProductEnvelope>, ApiError> {
    let product = state.catalog.update_product(product_id, req.into()).await?;
    Ok(Json(ProductEnvelope {
        success: true,
        product: product.into(),
    }))
}

#[utoipa::path(
    delete,
    path = "/admin/products/{id}",
    tag = "Catalog Admin",
    params(("id" = Uuid, Path, description = "Product id")),
    responses(
        (status = 200, description = "Product deleted", body = MessageResponse),
        (status = 404, description = "No such product", body = ErrorBody)
    )
)]
pub async fn delete_product_handler(
    State(state): State<Arc<AppState>>,
    Path(product_id): Path<Uuid>,
) -> Result<Json<MessageResponse>, ApiError> {
    state.catalog.delete_product(product_id).await?;
    info!(product_id = %product_id, "Product deleted");
    Ok(Json(MessageResponse::ok("Product deleted")))
}

#[utoipa::path(
    post,
    path = "/admin/categories",
    tag = "Catalog Admin",
    request_body = CategoryRequest,
    responses(
        (status = 201, description = "Category created", body = CategoryEnvelope),
        (status = 409, description = "Category already exists", body = ErrorBody)
    )
)]
pub async fn create_category_handler(
    State(state): State<Arc<AppState>>,
    ApiJson(req): ApiJson<CategoryRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let category = state.catalog.create_category(&req.name).await?;
    Ok((
        StatusCode::CREATED,
        Json(CategoryEnvelope {
            success: true,
            category: category.into(),
        }),
    ))
}
