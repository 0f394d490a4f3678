use crate::error::{OrderError, Result};
use crate::validation::validate_amount;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

pub type ModelId = i64;

/// Lifecycle state of an order. Only `Pending` orders can be changed by the
/// customer; later states are driven by fulfillment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
pub enum OrderStatus {
    Pending,
    Confirmed,
    InTransit,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub fn is_mutable(&self) -> bool {
        matches!(self, OrderStatus::Pending)
    }
}

/// One requested line of a new order. `unit_price` is the dish price captured
/// at checkout and never looked up again.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewOrderItem {
    pub dish_id: ModelId,
    pub quantity: i32,
    pub unit_price: Decimal,
}

impl NewOrderItem {
    pub fn subtotal(&self) -> Result<Decimal> {
        subtotal(self.quantity, self.unit_price)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewOrder {
    pub restaurant_id: ModelId,
    pub delivery_address: String,
    /// Client-computed total. Optional, and only accepted if it equals the
    /// item sum.
    #[serde(default)]
    pub total_amount: Option<Decimal>,
    pub items: Vec<NewOrderItem>,
}

impl NewOrder {
    pub fn items_total(&self) -> Result<Decimal> {
        self.items
            .iter()
            .try_fold(Decimal::ZERO, |total, item| add_to_total(total, item.subtotal()?))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub order_id: ModelId,
    pub customer_id: ModelId,
    pub restaurant_id: ModelId,
    pub status: OrderStatus,
    pub total_amount: Decimal,
    pub delivery_address: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
    pub order_id: ModelId,
    pub dish_id: ModelId,
    pub dish_name: Option<String>,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub subtotal: Decimal,
}

/// Row of a customer's order history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderSummary {
    #[serde(flatten)]
    pub order: Order,
    pub restaurant_name: Option<String>,
    pub item_count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderDetail {
    #[serde(flatten)]
    pub order: Order,
    pub restaurant_name: Option<String>,
    pub items: Vec<OrderItem>,
}

impl OrderDetail {
    pub fn items_total(&self) -> Decimal {
        order_total(&self.items)
    }
}

/// `quantity * unit_price`, rejected when it overflows or does not fit a
/// stored amount.
pub fn subtotal(quantity: i32, unit_price: Decimal) -> Result<Decimal> {
    let amount = Decimal::from(quantity).checked_mul(unit_price).ok_or_else(|| {
        OrderError::Validation(format!("subtotal of {} x {} overflows", quantity, unit_price))
    })?;
    validate_amount("subtotal", amount)
}

/// Adds one subtotal to a running order total, with the same bounds.
pub fn add_to_total(total: Decimal, amount: Decimal) -> Result<Decimal> {
    let sum = total
        .checked_add(amount)
        .ok_or_else(|| OrderError::Validation("order total overflows".to_string()))?;
    validate_amount("order total", sum)
}

/// Sum of item subtotals; zero for an empty order.
pub fn order_total(items: &[OrderItem]) -> Decimal {
    items.iter().map(|item| item.subtotal).sum()
}
