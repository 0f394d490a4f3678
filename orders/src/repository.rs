use crate::error::Result;
use crate::model::{ModelId, NewOrder, OrderDetail, OrderSummary};
use async_trait::async_trait;

/// Ownership-scoped access to orders and their items.
///
/// Implementations are the only place `total_amount` is written, and always
/// write it as the sum of the current item subtotals. Every mutation is gated
/// on the order belonging to `customer_id` and being `Pending`, and runs as
/// one atomic unit per order.
#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Inserts a `Pending` order and all its items atomically.
    async fn create_order(&self, customer_id: ModelId, order: &NewOrder) -> Result<ModelId>;

    /// Newest first. Empty when the customer has no orders.
    async fn get_orders_for_customer(&self, customer_id: ModelId) -> Result<Vec<OrderSummary>>;

    async fn get_order_detail(
        &self,
        order_id: ModelId,
        customer_id: ModelId,
    ) -> Result<OrderDetail>;

    async fn delete_order(&self, order_id: ModelId, customer_id: ModelId) -> Result<()>;

    async fn update_order_address(
        &self,
        order_id: ModelId,
        customer_id: ModelId,
        address: &str,
    ) -> Result<()>;

    async fn delete_order_item(
        &self,
        order_id: ModelId,
        customer_id: ModelId,
        dish_id: ModelId,
    ) -> Result<()>;

    async fn update_order_item_quantity(
        &self,
        order_id: ModelId,
        customer_id: ModelId,
        dish_id: ModelId,
        quantity: i32,
    ) -> Result<()>;
}
