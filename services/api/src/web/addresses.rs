//! services/api/src/web/addresses.rs
//!
//! The caller's address book.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use std::sync::Arc;
use storefront_core::domain::{Address, AuthUser};
use uuid::Uuid;

use crate::error::{ApiError, ErrorBody};
use crate::web::dto::{AddressEnvelope, AddressList, AddressRequest, MessageResponse};
use crate::web::extract::ApiJson;
use crate::web::state::AppState;

fn envelope(address: Address) -> Json<AddressEnvelope> {
    Json(AddressEnvelope {
        success: true,
        address: address.into(),
    })
}

#[utoipa::path(
    get,
    path = "/address",
    tag = "Addresses",
    responses((status = 200, description = "Saved addresses, default first", body = AddressList))
)]
pub async fn list_addresses_handler(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<AuthUser>,
) -> Result<Json<AddressList>, ApiError> {
    let addresses = state.addresses.list(caller.user_id).await?;
    Ok(Json(AddressList {
        success: true,
        addresses: addresses.into_iter().map(Into::into).collect(),
    }))
}

/// POST /address - Save a new address, optionally as the new default
#[utoipa::path(
    post,
    path = "/address",
    tag = "Addresses",
    request_body = AddressRequest,
    responses(
        (status = 201, description = "Address saved", body = AddressEnvelope),
        (status = 400, description = "Invalid address", body = ErrorBody)
    )
)]
pub async fn add_address_handler(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<AuthUser>,
    ApiJson(req): ApiJson<AddressRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let address = state.addresses.add(caller.user_id, req.try_into()?).await?;
    Ok((StatusCode::CREATED, envelope(address)))
}

#[utoipa::path(
    put,
    path = "/address/{id}",
    tag = "Addresses",
    params(("id" = Uuid, Path, description = "Address id")),
    request_body = AddressRequest,
    responses(
        (status = 200, description = "Address updated", body = AddressEnvelope),
        (status = 403, description = "Belongs to another user", body = ErrorBody),
        (status = 404, description = "No such address", body = ErrorBody)
    )
)]
pub async fn update_address_handler(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<AuthUser>,
    Path(address_id): Path<Uuid>,
    ApiJson(req): ApiJson<AddressRequest>,
) -> Result<Json<AddressEnvelope>, ApiError> {
    let address = state
        .addresses
        .update(caller.user_id, address_id, req.try_into()?)
        .await?;
    Ok(envelope(address))
}

#[utoipa::path(
    delete,
    path = "/address/{id}",
    tag = "Addresses",
    params(("id" = Uuid, Path, description = "Address id")),
    responses(
        (status = 200, description = "Address deleted", body = MessageResponse),
        (status = 403, description = "Belongs to another user", body = ErrorBody),
        (status = 404, description = "No such address", body = ErrorBody)
    )
)]
pub async fn delete_address_handler(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<AuthUser>,
    Path(address_id): Path<Uuid>,
) -> Result<Json<MessageResponse>, ApiError> {
    state.addresses.remove(caller.user_id, address_id).await?;
    Ok(Json(MessageResponse::ok("Address deleted")))
}

#[utoipa::path(
    patch,
    path = "/address/{id}/default",
    tag = "Addresses",
    params(("id" = Uuid, Path, description = "Address id")),
    responses(
        (status = 200, description = "Address is now the default", body = AddressEnvelope),
        (status = 403, description = "Belongs to another user", body = ErrorBody),
        (status = 404, description = "No such address", body = ErrorBody)
    )
)]
pub async fn set_default_address_handler(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<AuthUser>,
    Path(address_id): Path<Uuid>,
) -> Result<Json<AddressEnvelope>, ApiError> {
    let address = state
        .addresses
        .set_default(caller.user_id, address_id)
        .await?;
    Ok(envelope(address))
}
