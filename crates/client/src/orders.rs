//! Orders and payments.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::instrument;
use zdrink_core::{CartId, OrderId, OrderStatus, OrderType, PaymentMethodId, Price, ProductId, SkuId};

use crate::catalog::Listing;
use crate::error::ApiError;
use crate::http::ApiClient;

const ORDERS_PATH: &str = "/orders/orders/";
const MY_ORDERS_PATH: &str = "/orders/orders/my_orders/";
const CREATE_PAYMENT_PATH: &str = "/payments/transactions/create_payment/";

/// A new order rejected before it was sent.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrderValidationError {
    #[error("Delivery orders require a delivery address")]
    MissingDeliveryAddress,
    #[error("Takeaway orders require a pickup time")]
    MissingPickupTime,
    #[error("Order has no cart and no items")]
    NoItems,
}

/// Order creation request.
#[derive(Debug, Clone, Serialize)]
pub struct NewOrder {
    pub order_type: OrderType,
    pub customer_name: String,
    pub customer_phone: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delivery_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delivery_time: Option<DateTime<FixedOffset>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pickup_time: Option<DateTime<FixedOffset>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table_number: Option<String>,
    /// Order everything in this cart.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cart_id: Option<CartId>,
    /// Order these items directly.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub items: Vec<NewOrderItem>,
}

impl NewOrder {
    /// Check the fields the order type requires.
    ///
    /// # Errors
    ///
    /// Returns the first missing requirement.
    pub fn validate(&self) -> Result<(), OrderValidationError> {
        match self.order_type {
            OrderType::Delivery if is_blank(self.delivery_address.as_deref()) => {
                return Err(OrderValidationError::MissingDeliveryAddress);
            }
            OrderType::Takeaway if self.pickup_time.is_none() => {
                return Err(OrderValidationError::MissingPickupTime);
            }
            _ => {}
        }
        if self.cart_id.is_none() && self.items.is_empty() {
            return Err(OrderValidationError::NoItems);
        }
        Ok(())
    }
}

fn is_blank(value: Option<&str>) -> bool {
    value.is_none_or(|v| v.trim().is_empty())
}

/// One directly specified order item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewOrderItem {
    pub product_id: ProductId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sku_id: Option<SkuId>,
    pub quantity: u32,
}

/// An order as listed or in detail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    #[serde(default)]
    pub order_number: Option<String>,
    pub status: OrderStatus,
    #[serde(default)]
    pub order_type: OrderType,
    #[serde(default)]
    pub subtotal: Option<Price>,
    #[serde(default)]
    pub delivery_fee: Option<Price>,
    #[serde(default)]
    pub discount_amount: Option<Price>,
    #[serde(default)]
    pub total_amount: Option<Price>,
    #[serde(default)]
    pub customer_name: Option<String>,
    #[serde(default)]
    pub customer_phone: Option<String>,
    #[serde(default)]
    pub items_count: Option<u32>,
    #[serde(default)]
    pub items: Vec<OrderItem>,
    #[serde(default)]
    pub created_at: Option<String>,
}

impl Order {
    /// Whether the backend will accept a cancellation.
    #[must_use]
    pub const fn can_cancel(&self) -> bool {
        self.status.is_cancellable()
    }
}

/// A line of a placed order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: i64,
    #[serde(default)]
    pub product: Option<ProductId>,
    #[serde(default)]
    pub sku: Option<SkuId>,
    #[serde(default)]
    pub product_name: Option<String>,
    pub quantity: u32,
    #[serde(default)]
    pub unit_price: Option<Price>,
    #[serde(default)]
    pub total_price: Option<Price>,
    #[serde(default)]
    pub customization: Option<String>,
}

#[derive(Serialize)]
struct CancelBody<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    notes: Option<&'a str>,
}

#[derive(Serialize)]
struct PageParam {
    page: u32,
}

/// Payment initiation request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaymentRequest {
    pub order_id: OrderId,
    pub payment_method_id: PaymentMethodId,
    /// WeChat openid, for JSAPI payments.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub openid: Option<String>,
}

/// Payment handed back by the backend for the client to complete.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PaymentTicket {
    pub transaction_id: i64,
    #[serde(default)]
    pub transaction_no: Option<String>,
    /// Provider-specific payload (e.g. signed JSAPI parameters).
    #[serde(default)]
    pub payment_data: Value,
}

/// Order and payment calls.
#[derive(Debug, Clone)]
pub struct OrdersApi {
    api: ApiClient,
}

impl OrdersApi {
    #[must_use]
    pub const fn new(api: ApiClient) -> Self {
        Self { api }
    }

    /// Place an order.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::InvalidOrder` without calling the backend if the
    /// order is incomplete, otherwise any request error.
    #[instrument(skip(self, order), fields(order_type = ?order.order_type))]
    pub async fn create(&self, order: &NewOrder) -> Result<Order, ApiError> {
        order.validate()?;
        let created: Order = self.api.post(ORDERS_PATH, order).await?;
        tracing::info!(order_id = %created.id, "Order created");
        Ok(created)
    }

    /// The signed-in user's orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` if the request fails.
    #[instrument(skip(self))]
    pub async fn my_orders(&self, page: Option<u32>) -> Result<Vec<Order>, ApiError> {
        let listing: Listing<Order> = match page {
            Some(page) => self.api.get_query(MY_ORDERS_PATH, &PageParam { page }).await?,
            None => self.api.get(MY_ORDERS_PATH).await?,
        };
        Ok(listing.into_items())
    }

    /// One order in detail.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` if the request fails.
    #[instrument(skip(self), fields(order_id = %id))]
    pub async fn order(&self, id: OrderId) -> Result<Order, ApiError> {
        self.api.get(&format!("{ORDERS_PATH}{id}/")).await
    }

    /// Cancel an order.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` if the backend refuses (e.g. already preparing).
    #[instrument(skip(self, notes), fields(order_id = %id))]
    pub async fn cancel(&self, id: OrderId, notes: Option<&str>) -> Result<Order, ApiError> {
        let order: Order = self
            .api
            .post(&format!("{ORDERS_PATH}{id}/cancel/"), &CancelBody { notes })
            .await?;
        tracing::info!(status = %order.status, "Order cancelled");
        Ok(order)
    }

    /// Start paying for an order.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` if the request fails.
    #[instrument(skip(self, request), fields(order_id = %request.order_id))]
    pub async fn create_payment(&self, request: &PaymentRequest) -> Result<PaymentTicket, ApiError> {
        self.api.post(CREATE_PAYMENT_PATH, request).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    fn order(order_type: OrderType) -> NewOrder {
        NewOrder {
            order_type,
            customer_name: "Alice".to_string(),
            customer_phone: "13800000000".to_string(),
            customer_notes: None,
            delivery_address: None,
            delivery_time: None,
            pickup_time: None,
            table_number: None,
            cart_id: Some(CartId::new(1)),
            items: Vec::new(),
        }
    }

    #[test]
    fn test_delivery_requires_address() {
        let mut new_order = order(OrderType::Delivery);
        assert_eq!(
            new_order.validate(),
            Err(OrderValidationError::MissingDeliveryAddress)
        );
        new_order.delivery_address = Some("   ".to_string());
        assert!(new_order.validate().is_err());
        new_order.delivery_address = Some("1 Main St".to_string());
        assert!(new_order.validate().is_ok());
    }

    #[test]
    fn test_takeaway_requires_pickup_time() {
        let mut new_order = order(OrderType::Takeaway);
        assert_eq!(new_order.validate(), Err(OrderValidationError::MissingPickupTime));
        new_order.pickup_time = Some(DateTime::parse_from_rfc3339("2024-05-01T12:30:00+08:00").unwrap());
        assert!(new_order.validate().is_ok());
    }

    #[test]
    fn test_order_needs_cart_or_items() {
        let mut new_order = order(OrderType::DineIn);
        new_order.cart_id = None;
        assert_eq!(new_order.validate(), Err(OrderValidationError::NoItems));
    }

    #[test]
    fn test_new_order_wire_format() {
        let mut new_order = order(OrderType::DineIn);
        new_order.table_number = Some("A3".to_string());
        assert_eq!(
            serde_json::to_value(&new_order).unwrap(),
            json!({
                "order_type": "dine_in",
                "customer_name": "Alice",
                "customer_phone": "13800000000",
                "table_number": "A3",
                "cart_id": 1
            })
        );
    }

    #[test]
    fn test_order_decodes_list_shape() {
        let order: Order = serde_json::from_value(json!({
            "id": 12,
            "order_number": "ZD20240501001",
            "status": "preparing",
            "order_type": "takeaway",
            "total_amount": "36.00",
            "items_count": 2,
            "created_at": "2024-05-01T12:00:00+08:00"
        }))
        .unwrap();
        assert!(!order.can_cancel());
        assert_eq!(order.total_amount, Some(Price::from_fen(3600)));
    }
}
