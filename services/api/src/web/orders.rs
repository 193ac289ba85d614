//! services/api/src/web/orders.rs
//!
//! Order placement, order history and the admin status endpoints.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use std::sync::Arc;
use storefront_core::domain::{AuthUser, OrderStatus, PaymentMethodLabel};
use storefront_core::ports::PortError;
use storefront_core::services::{PaymentOutcome, PlaceOrder};
use tracing::info;
use uuid::Uuid;

use crate::error::{ApiError, ErrorBody};
use crate::web::dto::{
    order_lines, CreateOrderRequest, OrderEnvelope, OrderList, UpdateOrderStatusRequest,
};
use crate::web::extract::ApiJson;
use crate::web::state::AppState;

impl TryFrom<CreateOrderRequest> for PlaceOrder {
    type Error = PortError;

    fn try_from(req: CreateOrderRequest) -> Result<Self, Self::Error> {
        let payment_method = match req.payment_method.as_deref().map(str::trim) {
            None | Some("") => PaymentMethodLabel::default(),
            Some(raw) => raw.parse().map_err(PortError::Validation)?,
        };
        Ok(PlaceOrder {
            items: order_lines(req.items),
            shipping_address_id: req.shipping_address,
            payment_method,
            payment: req.payment_info.map(|info| PaymentOutcome {
                handle_id: info.id,
                status: info.status,
            }),
        })
    }
}

/// POST /orders - Place an order from explicit lines
///
/// Prices come from the catalog at placement time. Stock for every line is reserved
/// atomically; if any line is short the whole order is rejected.
#[utoipa::path(
    post,
    path = "/orders",
    tag = "Orders",
    request_body = CreateOrderRequest,
    responses(
        (status = 201, description = "Order placed", body = OrderEnvelope),
        (status = 400, description = "Empty order or missing address", body = ErrorBody),
        (status = 403, description = "Address belongs to someone else", body = ErrorBody),
        (status = 404, description = "Unknown product or address", body = ErrorBody),
        (status = 409, description = "Insufficient stock", body = ErrorBody),
        (status = 502, description = "Payment gateway timed out", body = ErrorBody)
    )
)]
pub async fn place_order_handler(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<AuthUser>,
    ApiJson(req): ApiJson<CreateOrderRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let order = state
        .checkout
        .place_order(caller.user_id, req.try_into()?)
        .await?;
    Ok((StatusCode::CREATED, Json(OrderEnvelope::new(order))))
}

#[utoipa::path(
    get,
    path = "/orders/myorders",
    tag = "Orders",
    responses((status = 200, description = "The caller's orders, newest first", body = OrderList))
)]
pub async fn my_orders_handler(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<AuthUser>,
) -> Result<Json<OrderList>, ApiError> {
    let orders = state.orders.list_for_user(caller.user_id).await?;
    Ok(Json(OrderList::new(orders)))
}

/// GET /orders/{id} - One order; visible to its owner and to admins
#[utoipa::path(
    get,
    path = "/orders/{id}",
    tag = "Orders",
    params(("id" = Uuid, Path, description = "Order id")),
    responses(
        (status = 200, description = "The order", body = OrderEnvelope),
        (status = 403, description = "Order belongs to someone else", body = ErrorBody),
        (status = 404, description = "No such order", body = ErrorBody)
    )
)]
pub async fn get_order_handler(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<AuthUser>,
    Path(order_id): Path<Uuid>,
) -> Result<Json<OrderEnvelope>, ApiError> {
    let order = state.orders.get_by_id(order_id, &caller).await?;
    Ok(Json(OrderEnvelope::new(order)))
}

//=========================================================================================
// Admin
//=========================================================================================

#[utoipa::path(
    put,
    path = "/orders/admin/{id}/status",
    tag = "Orders Admin",
    params(("id" = Uuid, Path, description = "Order id")),
    request_body = UpdateOrderStatusRequest,
    responses(
        (status = 200, description = "Status changed", body = OrderEnvelope),
        (status = 400, description = "Unknown status", body = ErrorBody),
        (status = 409, description = "Transition not allowed", body = ErrorBody)
    )
)]
pub async fn update_order_status_handler(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<AuthUser>,
    Path(order_id): Path<Uuid>,
    ApiJson(req): ApiJson<UpdateOrderStatusRequest>,
) -> Result<Json<OrderEnvelope>, ApiError> {
    let next: OrderStatus = req
        .status
        .trim()
        .to_lowercase()
        .parse()
        .map_err(PortError::Validation)?;
    let order = state.orders.set_status(order_id, next, &caller).await?;
    info!(
        order_id = %order.id,
        status = %order.order_status,
        admin = %caller.user_id,
        "Order status set"
    );
    Ok(Json(OrderEnvelope::new(order)))
}

#[utoipa::path(
    get,
    path = "/orders/admin/all",
    tag = "Orders Admin",
    responses(
        (status = 200, description = "Every order, newest first", body = OrderList),
        (status = 403, description = "Caller is not an admin", body = ErrorBody)
    )
)]
pub async fn all_orders_handler(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<AuthUser>,
) -> Result<Json<OrderList>, ApiError> {
    let orders = state.orders.list_all(&caller).await?;
    Ok(Json(OrderList::new(orders)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::web::dto::PaymentInfoDto;

    fn request(payment_method: Option<&str>) -> CreateOrderRequest {
        CreateOrderRequest {
            items: Vec::new(),
            shipping_address: None,
            payment_method: payment_method.map(str::to_string),
            payment_info: Some(PaymentInfoDto {
                id: "pi_1".to_string(),
                status: "succeeded".to_string(),
            }),
        }
    }

    #[test]
    fn payment_method_defaults_to_cash_on_delivery() {
        let order = PlaceOrder::try_from(request(None)).unwrap();
        assert_eq!(order.payment_method, PaymentMethodLabel::CashOnDelivery);
        assert_eq!(order.payment.unwrap().handle_id, "pi_1");
    }

    #[test]
    fn unknown_payment_methods_are_rejected() {
        assert!(PlaceOrder::try_from(request(Some("Cheque"))).is_err());
        assert_eq!(
            PlaceOrder::try_from(request(Some("UPI"))).unwrap().payment_method,
            PaymentMethodLabel::Upi
        );
    }
}
