//! services/api/src/web/payments.rs
//!
//! Stored payment methods, plus the two gateway endpoints: opening a payment intent
//! for a set of lines and confirming a pending payment.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use std::sync::Arc;
use storefront_core::domain::AuthUser;
use tracing::info;
use uuid::Uuid;

use crate::error::{ApiError, ErrorBody};
use crate::web::dto::{
    order_lines, ConfirmPaymentRequest, CreatePaymentIntentRequest, OrderEnvelope,
    PaymentIntentResponse, PaymentMethodList, PaymentMethodRequest,
};
use crate::web::extract::ApiJson;
use crate::web::state::AppState;

//=========================================================================================
// Stored Methods
//=========================================================================================

#[utoipa::path(
    get,
    path = "/payments",
    tag = "Payments",
    responses((status = 200, description = "Saved payment methods", body = PaymentMethodList))
)]
pub async fn list_payment_methods_handler(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<AuthUser>,
) -> Result<Json<PaymentMethodList>, ApiError> {
    let methods = state.payment_methods.list(caller.user_id).await?;
    Ok(Json(PaymentMethodList::new(methods)))
}

/// POST /payments - Save a card or UPI instrument
#[utoipa::path(
    post,
    path = "/payments",
    tag = "Payments",
    request_body = PaymentMethodRequest,
    responses(
        (status = 201, description = "Saved; returns the full list", body = PaymentMethodList),
        (status = 400, description = "Invalid instrument", body = ErrorBody)
    )
)]
pub async fn add_payment_method_handler(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<AuthUser>,
    ApiJson(req): ApiJson<PaymentMethodRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let is_default = req.is_default;
    let methods = state
        .payment_methods
        .add(caller.user_id, req.instrument()?, is_default)
        .await?;
    Ok((StatusCode::CREATED, Json(PaymentMethodList::new(methods))))
}

#[utoipa::path(
    delete,
    path = "/payments/{id}",
    tag = "Payments",
    params(("id" = Uuid, Path, description = "Payment method id")),
    responses(
        (
            status = 200,
            description = "Deleted; returns the remaining methods",
            body = PaymentMethodList
        ),
        (status = 403, description = "Belongs to another user", body = ErrorBody),
        (status = 404, description = "No such method", body = ErrorBody)
    )
)]
pub async fn delete_payment_method_handler(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<AuthUser>,
    Path(method_id): Path<Uuid>,
) -> Result<Json<PaymentMethodList>, ApiError> {
    let methods = state.payment_methods.remove(caller.user_id, method_id).await?;
    Ok(Json(PaymentMethodList::new(methods)))
}

#[utoipa::path(
    patch,
    path = "/payments/{id}/default",
    tag = "Payments",
    params(("id" = Uuid, Path, description = "Payment method id")),
    responses(
        (status = 200, description = "Default switched", body = PaymentMethodList),
        (status = 403, description = "Belongs to another user", body = ErrorBody),
        (status = 404, description = "No such method", body = ErrorBody)
    )
)]
pub async fn set_default_payment_method_handler(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<AuthUser>,
    Path(method_id): Path<Uuid>,
) -> Result<Json<PaymentMethodList>, ApiError> {
    let methods = state
        .payment_methods
        .set_default(caller.user_id, method_id)
        .await?;
    Ok(Json(PaymentMethodList::new(methods)))
}

//=========================================================================================
// Gateway
//=========================================================================================

/// POST /payments/create-payment-intent - Price the lines and open a gateway payment
///
/// The amount is always computed from the catalog, never taken from the client.
/// `mode` tells the client whether a live gateway or the simulated one answered.
#[utoipa::path(
    post,
    path = "/payments/create-payment-intent",
    tag = "Payments",
    request_body = CreatePaymentIntentRequest,
    responses(
        (status = 200, description = "Payment intent opened", body = PaymentIntentResponse),
        (status = 400, description = "Invalid lines or total", body = ErrorBody),
        (status = 502, description = "Gateway failed or timed out", body = ErrorBody)
    )
)]
pub async fn create_payment_intent_handler(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<AuthUser>,
    ApiJson(req): ApiJson<CreatePaymentIntentRequest>,
) -> Result<Json<PaymentIntentResponse>, ApiError> {
    let lines = order_lines(req.items);
    let intent = state
        .checkout
        .create_payment_intent(&lines, req.currency.as_deref())
        .await?;
    info!(user_id = %caller.user_id, handle_id = %intent.handle_id, "Payment intent issued");
    Ok(Json(intent.into()))
}

/// POST /payments/confirm - Settle a pending order payment against the gateway
#[utoipa::path(
    post,
    path = "/payments/confirm",
    tag = "Payments",
    request_body = ConfirmPaymentRequest,
    responses(
        (status = 200, description = "Order with its settled payment status", body = OrderEnvelope),
        (status = 403, description = "Order belongs to someone else", body = ErrorBody),
        (status = 404, description = "No order carries this payment", body = ErrorBody),
        (status = 409, description = "Payment already settled", body = ErrorBody)
    )
)]
pub async fn confirm_payment_handler(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<AuthUser>,
    ApiJson(req): ApiJson<ConfirmPaymentRequest>,
) -> Result<Json<OrderEnvelope>, ApiError> {
    let order = state
        .checkout
        .confirm_payment(caller.user_id, &req.handle_id, &req.status)
        .await?;
    Ok(Json(OrderEnvelope::new(order)))
}
