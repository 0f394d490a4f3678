use crate::error::{OrderError, Result};
use crate::model::{
    ModelId, NewOrder, Order, OrderDetail, OrderItem, OrderStatus, OrderSummary, add_to_total,
    subtotal,
};
use crate::repository::OrderRepository;
use crate::storage::observe;
use crate::validation::{validate_address, validate_id, validate_new_order, validate_quantity};
use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::{PgConnection, Row};
use std::str::FromStr;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

const ORDER_COLUMNS: &str = "o.order_id, o.customer_id, o.restaurant_id, o.status, \
     o.total_amount, o.delivery_address, o.created_at";

/// PostgreSQL-backed order store.
///
/// Mutations lock the order row (`FOR UPDATE`) inside a transaction before
/// touching items, so concurrent mutators of one order are serialized and
/// the recomputed total always reflects the committed item set.
#[derive(Clone)]
pub struct PgOrderRepository {
    pool: PgPool,
}

impl PgOrderRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(
        database_url: &str,
        max_connections: u32,
        acquire_timeout: Duration,
    ) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(acquire_timeout)
            .connect(database_url)
            .await?;

        info!(max_connections, "PostgreSQL connection pool established");
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    /// Locks the order row if it belongs to the customer and is still
    /// `Pending`. Missing, foreign and non-pending orders all fail the same way.
    pub async fn lock_pending_order(
        tx: &mut PgConnection,
        order_id: ModelId,
        customer_id: ModelId,
    ) -> Result<()> {
        let status: Option<String> = sqlx::query_scalar(
            "SELECT status FROM orders WHERE order_id = $1 AND customer_id = $2 FOR UPDATE",
        )
        .bind(order_id)
        .bind(customer_id)
        .fetch_optional(&mut *tx)
        .await?;

        match status {
            Some(status) if parse_status(&status)?.is_mutable() => Ok(()),
            _ => {
                warn!(order_id, customer_id, "Order is not a pending order of this customer");
                Err(OrderError::PreconditionFailed(format!(
                    "order {} is not a pending order of customer {}",
                    order_id, customer_id
                )))
            }
        }
    }

    /// Rewrites `total_amount` as the sum of the order's current subtotals.
    pub async fn recompute_total(tx: &mut PgConnection, order_id: ModelId) -> Result<Decimal> {
        let total: Decimal = sqlx::query_scalar(
            r#"
            UPDATE orders
            SET total_amount = (
                SELECT COALESCE(SUM(subtotal), 0) FROM order_item WHERE order_id = $1
            )
            WHERE order_id = $1
            RETURNING total_amount
            "#,
        )
        .bind(order_id)
        .fetch_one(&mut *tx)
        .await?;

        debug!(order_id, %total, "Recomputed order total");
        Ok(total)
    }

    pub async fn insert_order(
        tx: &mut PgConnection,
        customer_id: ModelId,
        order: &NewOrder,
    ) -> Result<ModelId> {
        let total = order.items_total()?;
        let order_id: ModelId = sqlx::query_scalar(
            r#"
            INSERT INTO orders (customer_id, restaurant_id, status, total_amount, delivery_address)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING order_id
            "#,
        )
        .bind(customer_id)
        .bind(order.restaurant_id)
        .bind(OrderStatus::Pending.to_string())
        .bind(total)
        .bind(order.delivery_address.trim())
        .fetch_one(&mut *tx)
        .await
        .map_err(reject_unknown_references)?;

        debug!(order_id, customer_id, "Inserted order row");
        Ok(order_id)
    }

    pub async fn insert_order_items(
        tx: &mut PgConnection,
        order_id: ModelId,
        order: &NewOrder,
    ) -> Result<()> {
        for item in &order.items {
            let line_subtotal = item.subtotal()?;
            sqlx::query(
                r#"
                INSERT INTO order_item (order_id, dish_id, quantity, unit_price, subtotal)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(order_id)
            .bind(item.dish_id)
            .bind(item.quantity)
            .bind(item.unit_price)
            .bind(line_subtotal)
            .execute(&mut *tx)
            .await
            .map_err(reject_unknown_references)?;
        }

        debug!(order_id, count = order.items.len(), "Inserted order items");
        Ok(())
    }

    async fn create_order_tx(&self, customer_id: ModelId, order: &NewOrder) -> Result<ModelId> {
        let mut tx = self.pool.begin().await?;

        let order_id = Self::insert_order(&mut tx, customer_id, order).await?;
        Self::insert_order_items(&mut tx, order_id, order).await?;
        Self::recompute_total(&mut tx, order_id).await?;

        tx.commit().await?;
        info!(order_id, customer_id, "Created order");
        Ok(order_id)
    }

    async fn orders_for_customer(&self, customer_id: ModelId) -> Result<Vec<OrderSummary>> {
        let query = format!(
            r#"
            SELECT {ORDER_COLUMNS}, r.name AS restaurant_name, COUNT(oi.dish_id) AS item_count
            FROM orders o
            LEFT JOIN restaurants r ON r.restaurant_id = o.restaurant_id
            LEFT JOIN order_item oi ON oi.order_id = o.order_id
            WHERE o.customer_id = $1
            GROUP BY o.order_id, r.name
            ORDER BY o.created_at DESC, o.order_id DESC
            "#
        );

        sqlx::query(&query)
            .bind(customer_id)
            .fetch_all(&self.pool)
            .await?
            .iter()
            .map(|row| -> Result<OrderSummary> {
                Ok(OrderSummary {
                    order: order_from_row(row)?,
                    restaurant_name: row.try_get("restaurant_name")?,
                    item_count: row.try_get("item_count")?,
                })
            })
            .collect()
    }

    async fn order_detail(&self, order_id: ModelId, customer_id: ModelId) -> Result<OrderDetail> {
        let mut tx = self.pool.begin().await?;
        // One snapshot for the order row and its items.
        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ, READ ONLY")
            .execute(&mut *tx)
            .await?;

        let query = format!(
            r#"
            SELECT {ORDER_COLUMNS}, r.name AS restaurant_name
            FROM orders o
            LEFT JOIN restaurants r ON r.restaurant_id = o.restaurant_id
            WHERE o.order_id = $1 AND o.customer_id = $2
            "#
        );
        let row = sqlx::query(&query)
            .bind(order_id)
            .bind(customer_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| OrderError::NotFound(format!("order {}", order_id)))?;

        let order = order_from_row(&row)?;
        let restaurant_name: Option<String> = row.try_get("restaurant_name")?;

        let items = sqlx::query(
            r#"
            SELECT oi.order_id, oi.dish_id, d.name AS dish_name,
                   oi.quantity, oi.unit_price, oi.subtotal
            FROM order_item oi
            LEFT JOIN dishes d ON d.dish_id = oi.dish_id
            WHERE oi.order_id = $1
            ORDER BY oi.dish_id
            "#,
        )
        .bind(order_id)
        .fetch_all(&mut *tx)
        .await?
        .iter()
        .map(item_from_row)
        .collect::<Result<Vec<_>>>()?;

        tx.commit().await?;

        Ok(OrderDetail {
            order,
            restaurant_name,
            items,
        })
    }

    async fn delete_order_tx(&self, order_id: ModelId, customer_id: ModelId) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        Self::lock_pending_order(&mut tx, order_id, customer_id).await?;

        let items = sqlx::query("DELETE FROM order_item WHERE order_id = $1")
            .bind(order_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        let deleted = sqlx::query(
            "DELETE FROM orders WHERE order_id = $1 AND customer_id = $2 AND status = $3",
        )
        .bind(order_id)
        .bind(customer_id)
        .bind(OrderStatus::Pending.to_string())
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if deleted == 0 {
            return Err(OrderError::PreconditionFailed(format!(
                "order {} could not be deleted",
                order_id
            )));
        }

        tx.commit().await?;
        info!(order_id, customer_id, items, "Deleted order");
        Ok(())
    }

    async fn update_address(
        &self,
        order_id: ModelId,
        customer_id: ModelId,
        address: &str,
    ) -> Result<()> {
        let updated = sqlx::query(
            r#"
            UPDATE orders SET delivery_address = $3
            WHERE order_id = $1 AND customer_id = $2 AND status = $4
            "#,
        )
        .bind(order_id)
        .bind(customer_id)
        .bind(address)
        .bind(OrderStatus::Pending.to_string())
        .execute(&self.pool)
        .await?
        .rows_affected();

        if updated == 0 {
            warn!(order_id, customer_id, "Address update matched no pending order");
            return Err(OrderError::PreconditionFailed(format!(
                "order {} is not a pending order of customer {}",
                order_id, customer_id
            )));
        }

        info!(order_id, customer_id, "Updated delivery address");
        Ok(())
    }

    async fn delete_item_tx(
        &self,
        order_id: ModelId,
        customer_id: ModelId,
        dish_id: ModelId,
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        Self::lock_pending_order(&mut tx, order_id, customer_id).await?;

        let deleted = sqlx::query("DELETE FROM order_item WHERE order_id = $1 AND dish_id = $2")
            .bind(order_id)
            .bind(dish_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        if deleted == 0 {
            return Err(OrderError::NotFound(format!(
                "dish {} is not in order {}",
                dish_id, order_id
            )));
        }

        let total = Self::recompute_total(&mut tx, order_id).await?;
        tx.commit().await?;

        info!(order_id, customer_id, dish_id, %total, "Removed order item");
        Ok(())
    }

    async fn update_quantity_tx(
        &self,
        order_id: ModelId,
        customer_id: ModelId,
        dish_id: ModelId,
        quantity: i32,
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        Self::lock_pending_order(&mut tx, order_id, customer_id).await?;

        let unit_price: Decimal = sqlx::query_scalar(
            "SELECT unit_price FROM order_item WHERE order_id = $1 AND dish_id = $2",
        )
        .bind(order_id)
        .bind(dish_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| {
            OrderError::NotFound(format!("dish {} is not in order {}", dish_id, order_id))
        })?;

        let new_subtotal = subtotal(quantity, unit_price)?;
        let other_lines: Decimal = sqlx::query_scalar(
            r#"
            SELECT COALESCE(SUM(subtotal), 0) FROM order_item
            WHERE order_id = $1 AND dish_id <> $2
            "#,
        )
        .bind(order_id)
        .bind(dish_id)
        .fetch_one(&mut *tx)
        .await?;
        add_to_total(other_lines, new_subtotal)?;

        sqlx::query(
            r#"
            UPDATE order_item SET quantity = $3, subtotal = $4
            WHERE order_id = $1 AND dish_id = $2
            "#,
        )
        .bind(order_id)
        .bind(dish_id)
        .bind(quantity)
        .bind(new_subtotal)
        .execute(&mut *tx)
        .await?;

        let total = Self::recompute_total(&mut tx, order_id).await?;
        tx.commit().await?;

        info!(order_id, customer_id, dish_id, quantity, %total, "Updated item quantity");
        Ok(())
    }
}

fn parse_status(raw: &str) -> Result<OrderStatus> {
    OrderStatus::from_str(raw)
        .map_err(|_| OrderError::Corrupt(format!("unknown order status '{}'", raw)))
}

fn order_from_row(row: &PgRow) -> Result<Order> {
    let status: String = row.try_get("status")?;
    Ok(Order {
        order_id: row.try_get("order_id")?,
        customer_id: row.try_get("customer_id")?,
        restaurant_id: row.try_get("restaurant_id")?,
        status: parse_status(&status)?,
        total_amount: row.try_get("total_amount")?,
        delivery_address: row.try_get("delivery_address")?,
        created_at: row.try_get("created_at")?,
    })
}

fn item_from_row(row: &PgRow) -> Result<OrderItem> {
    Ok(OrderItem {
        order_id: row.try_get("order_id")?,
        dish_id: row.try_get("dish_id")?,
        dish_name: row.try_get("dish_name")?,
        quantity: row.try_get("quantity")?,
        unit_price: row.try_get("unit_price")?,
        subtotal: row.try_get("subtotal")?,
    })
}

/// Foreign key violations on insert mean the caller named a restaurant or
/// dish that does not exist.
fn reject_unknown_references(err: sqlx::Error) -> OrderError {
    match &err {
        sqlx::Error::Database(db) if db.is_foreign_key_violation() => {
            OrderError::Validation("unknown restaurant or dish".to_string())
        }
        _ => {
            error!(error = %err, "Failed to insert order data");
            OrderError::Store(err)
        }
    }
}

#[async_trait]
impl OrderRepository for PgOrderRepository {
    async fn create_order(&self, customer_id: ModelId, order: &NewOrder) -> Result<ModelId> {
        validate_id("customer id", customer_id)?;
        validate_new_order(order)?;

        let started = Instant::now();
        let result = self.create_order_tx(customer_id, order).await;
        observe("create_order", started, &result);
        result
    }

    async fn get_orders_for_customer(&self, customer_id: ModelId) -> Result<Vec<OrderSummary>> {
        let started = Instant::now();
        let result = self.orders_for_customer(customer_id).await;
        observe("list_orders", started, &result);
        result
    }

    async fn get_order_detail(
        &self,
        order_id: ModelId,
        customer_id: ModelId,
    ) -> Result<OrderDetail> {
        let started = Instant::now();
        let result = self.order_detail(order_id, customer_id).await;
        observe("order_detail", started, &result);
        result
    }

    async fn delete_order(&self, order_id: ModelId, customer_id: ModelId) -> Result<()> {
        let started = Instant::now();
        let result = self.delete_order_tx(order_id, customer_id).await;
        observe("delete_order", started, &result);
        result
    }

    async fn update_order_address(
        &self,
        order_id: ModelId,
        customer_id: ModelId,
        address: &str,
    ) -> Result<()> {
        let address = validate_address(address)?;

        let started = Instant::now();
        let result = self.update_address(order_id, customer_id, address).await;
        observe("update_address", started, &result);
        result
    }

    async fn delete_order_item(
        &self,
        order_id: ModelId,
        customer_id: ModelId,
        dish_id: ModelId,
    ) -> Result<()> {
        let started = Instant::now();
        let result = self.delete_item_tx(order_id, customer_id, dish_id).await;
        observe("delete_item", started, &result);
        result
    }

    async fn update_order_item_quantity(
        &self,
        order_id: ModelId,
        customer_id: ModelId,
        dish_id: ModelId,
        quantity: i32,
    ) -> Result<()> {
        validate_quantity(quantity)?;

        let started = Instant::now();
        let result = self
            .update_quantity_tx(order_id, customer_id, dish_id, quantity)
            .await;
        observe("update_quantity", started, &result);
        result
    }
}
