//! The checkout/order engine.
//!
//! Turns requested lines into an immutable order: prices come from the catalog at the
//! moment of purchase, stock is reserved together with the order insert, and the payment
//! gateway is consulted (with a deadline) before anything is committed.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rust_decimal::Decimal;
use tracing::{info, warn};
use uuid::Uuid;

use crate::domain::{
    GatewayPaymentStatus, NewOrder, Order, OrderItem, PaymentIntent, PaymentMethodLabel,
    PaymentStatus, ProductRef, SelectedColor, ShippingSnapshot,
};
use crate::ports::{
    AddressRepository, CatalogRepository, OrderNotifier, OrderRepository, PaymentGateway,
    PortError, PortResult,
};
use crate::services::catalog::CatalogService;
use crate::validation;

#[derive(Debug, Clone)]
pub struct CheckoutSettings {
    /// Flat surcharge added to every order.
    pub shipping_fee: Decimal,
    pub currency: String,
    /// Upper bound on any single payment gateway call.
    pub gateway_timeout: Duration,
}

/// One requested line of an order or payment quote.
#[derive(Debug, Clone)]
pub struct OrderLineRequest {
    pub product: ProductRef,
    pub quantity: u32,
    pub selected_size: Option<String>,
    pub selected_color: Option<SelectedColor>,
}

/// What the client reports after talking to the gateway.
#[derive(Debug, Clone)]
pub struct PaymentOutcome {
    pub handle_id: String,
    pub status: String,
}

#[derive(Debug, Clone)]
pub struct PlaceOrder {
    pub items: Vec<OrderLineRequest>,
    pub shipping_address_id: Option<Uuid>,
    pub payment_method: PaymentMethodLabel,
    pub payment: Option<PaymentOutcome>,
}

/// Lines priced from the live catalog plus the shipping fee.
#[derive(Debug, Clone)]
pub struct Quote {
    pub items: Vec<OrderItem>,
    pub subtotal: Decimal,
    pub shipping_fee: Decimal,
    pub total: Decimal,
}

#[derive(Clone)]
pub struct CheckoutEngine {
    catalog: CatalogService,
    addresses: Arc<dyn AddressRepository>,
    orders: Arc<dyn OrderRepository>,
    gateway: Arc<dyn PaymentGateway>,
    notifier: Arc<dyn OrderNotifier>,
    settings: CheckoutSettings,
}

impl CheckoutEngine {
    pub fn new(
        catalog: Arc<dyn CatalogRepository>,
        addresses: Arc<dyn AddressRepository>,
        orders: Arc<dyn OrderRepository>,
        gateway: Arc<dyn PaymentGateway>,
        notifier: Arc<dyn OrderNotifier>,
        settings: CheckoutSettings,
    ) -> Self {
        Self {
            catalog: CatalogService::new(catalog),
            addresses,
            orders,
            gateway,
            notifier,
            settings,
        }
    }

    pub fn settings(&self) -> &CheckoutSettings {
        &self.settings
    }

    /// Prices `lines` against the catalog and checks that the stock can cover them.
    pub async fn quote(&self, lines: &[OrderLineRequest]) -> PortResult<Quote> {
        check_lines(lines)?;

        let mut items = Vec::with_capacity(lines.len());
        let mut wanted: HashMap<Uuid, (String, u32, u32)> = HashMap::new();
        for line in lines {
            let product = self.catalog.resolve(&line.product).await?;
            let entry = wanted
                .entry(product.id)
                .or_insert_with(|| (product.name.clone(), product.stock, 0));
            entry.2 = entry.2.saturating_add(line.quantity);

            items.push(OrderItem {
                product_id: product.id,
                name: product.name.clone(),
                image: product.images.first().cloned(),
                quantity: line.quantity,
                price: product.price,
                selected_size: validation::optional(line.selected_size.as_deref()),
                selected_color: line.selected_color.clone(),
            });
        }

        for (name, stock, requested) in wanted.into_values() {
            if stock < requested {
                return Err(PortError::InsufficientStock {
                    product_name: name,
                    available: stock,
                });
            }
        }

        let subtotal: Decimal = items.iter().map(OrderItem::line_total).sum();
        Ok(Quote {
            items,
            subtotal,
            shipping_fee: self.settings.shipping_fee,
            total: subtotal + self.settings.shipping_fee,
        })
    }

    /// Places an order for `user_id`.
    ///
    /// Stock for every line is reserved in the same unit of work that stores the order,
    /// so either the whole order goes through or nothing changes. The cart is left alone.
    pub async fn place_order(&self, user_id: Uuid, request: PlaceOrder) -> PortResult<Order> {
        check_lines(&request.items)?;
        let address_id = request
            .shipping_address_id
            .ok_or_else(|| PortError::Validation("Shipping address is required".to_string()))?;
        let address = self.addresses.get_address(address_id).await?;
        if address.user_id != user_id {
            return Err(PortError::Unauthorized);
        }
        if !address.is_active {
            return Err(PortError::Validation(
                "Shipping address is no longer available".to_string(),
            ));
        }

        let quote = self.quote(&request.items).await?;
        let (payment_status, payment_reference) = self
            .verify_payment(request.payment.as_ref(), quote.total)
            .await?;

        let order = self
            .orders
            .commit_order(NewOrder {
                id: Uuid::new_v4(),
                user_id,
                items: quote.items,
                shipping: ShippingSnapshot::from(&address),
                payment_method: request.payment_method,
                payment_status,
                payment_reference,
                shipping_fee: quote.shipping_fee,
                total_amount: quote.total,
                created_at: Utc::now(),
            })
            .await?;

        info!(
            order_id = %order.id,
            user_id = %user_id,
            total = %order.total_amount,
            payment_status = order.payment_status.as_str(),
            "Order placed"
        );
        self.spawn_confirmation(order.clone());
        Ok(order)
    }

    /// Quotes the lines and opens a gateway payment for the total.
    pub async fn create_payment_intent(
        &self,
        lines: &[OrderLineRequest],
        currency: Option<&str>,
    ) -> PortResult<PaymentIntent> {
        let quote = self.quote(lines).await?;
        if quote.total < Decimal::ONE {
            return Err(PortError::Validation("Invalid total amount".to_string()));
        }
        let currency = currency
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .unwrap_or(&self.settings.currency)
            .to_lowercase();

        let intent = tokio::time::timeout(
            self.settings.gateway_timeout,
            self.gateway.create_intent(quote.total, &currency),
        )
        .await
        .map_err(|_| self.timed_out())??;

        info!(
            handle_id = %intent.handle_id,
            amount = %intent.amount,
            mode = intent.mode.as_str(),
            "Payment intent created"
        );
        Ok(intent)
    }

    /// Settles a pending payment once the gateway reports a final status.
    pub async fn confirm_payment(
        &self,
        user_id: Uuid,
        handle_id: &str,
        reported_status: &str,
    ) -> PortResult<Order> {
        let order = self.orders.find_order_by_payment_reference(handle_id).await?;
        if order.user_id != user_id {
            return Err(PortError::Unauthorized);
        }
        if order.payment_status != PaymentStatus::Pending {
            return Err(PortError::Conflict(format!(
                "Payment for order {} is already {}",
                order.id,
                order.payment_status.as_str()
            )));
        }

        let payment = tokio::time::timeout(
            self.settings.gateway_timeout,
            self.gateway.payment_status(handle_id),
        )
        .await
        .map_err(|_| self.timed_out())??;
        if reported_status != gateway_status_label(payment.status) {
            warn!(
                order_id = %order.id,
                reported = reported_status,
                gateway = gateway_status_label(payment.status),
                "Client-reported payment status differs from the gateway"
            );
        }

        let settled = match payment.status {
            GatewayPaymentStatus::Succeeded
                if payment.covers(order.total_amount, &self.settings.currency) =>
            {
                PaymentStatus::Paid
            }
            GatewayPaymentStatus::Succeeded => {
                warn!(
                    order_id = %order.id,
                    paid = %payment.amount,
                    currency = %payment.currency,
                    total = %order.total_amount,
                    "Gateway payment does not match the order total"
                );
                PaymentStatus::Failed
            }
            GatewayPaymentStatus::Failed => PaymentStatus::Failed,
            GatewayPaymentStatus::Pending => return Ok(order),
        };
        let order = self.orders.settle_payment(order.id, settled).await?;
        info!(order_id = %order.id, payment_status = settled.as_str(), "Payment settled");
        Ok(order)
    }

    /// A timeout aborts checkout; any other gateway failure leaves the payment pending.
    ///
    /// A handle is accepted only once, and only when the gateway issued it for exactly
    /// `total` in the store currency.
    async fn verify_payment(
        &self,
        outcome: Option<&PaymentOutcome>,
        total: Decimal,
    ) -> PortResult<(PaymentStatus, Option<String>)> {
        let Some(outcome) = outcome else {
            return Ok((PaymentStatus::Pending, None));
        };
        let handle_id = validation::required("paymentInfo.id", &outcome.handle_id)?;
        match self.orders.find_order_by_payment_reference(&handle_id).await {
            Ok(existing) => {
                return Err(PortError::Conflict(format!(
                    "Payment {} already belongs to order {}",
                    handle_id, existing.id
                )))
            }
            Err(PortError::NotFound(_)) => {}
            Err(e) => return Err(e),
        }

        let checked = tokio::time::timeout(
            self.settings.gateway_timeout,
            self.gateway.payment_status(&handle_id),
        )
        .await
        .map_err(|_| self.timed_out())?;

        let status = match checked {
            Ok(payment) if !payment.covers(total, &self.settings.currency) => {
                warn!(
                    handle_id = %handle_id,
                    paid = %payment.amount,
                    currency = %payment.currency,
                    total = %total,
                    "Gateway payment does not match the order total"
                );
                return Err(PortError::Validation(
                    "Payment amount does not match the order total".to_string(),
                ));
            }
            Ok(payment) => match payment.status {
                GatewayPaymentStatus::Succeeded => PaymentStatus::Paid,
                GatewayPaymentStatus::Failed => PaymentStatus::Failed,
                GatewayPaymentStatus::Pending => PaymentStatus::Pending,
            },
            Err(e) => {
                warn!(
                    handle_id = %handle_id,
                    error = %e,
                    "Could not verify payment; leaving it pending"
                );
                PaymentStatus::Pending
            }
        };
        if outcome.status == "succeeded" && status != PaymentStatus::Paid {
            warn!(handle_id = %handle_id, "Client reported success the gateway did not confirm");
        }
        Ok((status, Some(handle_id)))
    }

    fn timed_out(&self) -> PortError {
        PortError::Gateway(format!(
            "payment gateway did not answer within {}s",
            self.settings.gateway_timeout.as_secs_f32()
        ))
    }

    fn spawn_confirmation(&self, order: Order) {
        let notifier = self.notifier.clone();
        tokio::spawn(async move {
            if let Err(e) = notifier.notify_order_placed(&order).await {
                warn!(order_id = %order.id, error = %e, "Order confirmation could not be sent");
            }
        });
    }
}

fn check_lines(lines: &[OrderLineRequest]) -> PortResult<()> {
    if lines.is_empty() {
        return Err(PortError::Validation("No items in order".to_string()));
    }
    if lines.iter().any(|l| l.quantity == 0) {
        return Err(PortError::Validation("quantity must be at least 1".to_string()));
    }
    Ok(())
}

fn gateway_status_label(status: GatewayPaymentStatus) -> &'static str {
    match status {
        GatewayPaymentStatus::Succeeded => "succeeded",
        GatewayPaymentStatus::Pending => "pending",
        GatewayPaymentStatus::Failed => "failed",
    }
}
