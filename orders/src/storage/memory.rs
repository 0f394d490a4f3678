use crate::error::{OrderError, Result};
use crate::model::{
    ModelId, NewOrder, Order, OrderDetail, OrderItem, OrderStatus, OrderSummary, add_to_total,
    order_total, subtotal,
};
use crate::repository::OrderRepository;
use crate::storage::observe;
use crate::validation::{validate_address, validate_id, validate_new_order, validate_quantity};
use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

fn missing_item(order_id: ModelId, dish_id: ModelId) -> OrderError {
    OrderError::NotFound(format!("dish {} is not in order {}", dish_id, order_id))
}

#[derive(Default)]
struct Store {
    last_order_id: ModelId,
    orders: BTreeMap<ModelId, Order>,
    // order id -> dish id -> item
    items: BTreeMap<ModelId, BTreeMap<ModelId, OrderItem>>,
    restaurants: HashMap<ModelId, String>,
    dishes: HashMap<ModelId, String>,
}

impl Store {
    fn check_pending(&self, order_id: ModelId, customer_id: ModelId) -> Result<()> {
        match self.orders.get(&order_id) {
            Some(order) if order.customer_id == customer_id && order.status.is_mutable() => {
                Ok(())
            }
            _ => {
                warn!(order_id, customer_id, "Order is not a pending order of this customer");
                Err(OrderError::PreconditionFailed(format!(
                    "order {} is not a pending order of customer {}",
                    order_id, customer_id
                )))
            }
        }
    }

    fn recompute_total(&mut self, order_id: ModelId) {
        let total = self
            .items
            .get(&order_id)
            .map(|items| items.values().map(|item| item.subtotal).sum())
            .unwrap_or_default();
        if let Some(order) = self.orders.get_mut(&order_id) {
            order.total_amount = total;
            debug!(order_id, %total, "Recomputed order total");
        }
    }

    fn items_of(&self, order_id: ModelId) -> Vec<OrderItem> {
        self.items
            .get(&order_id)
            .map(|items| {
                items
                    .values()
                    .cloned()
                    .map(|mut item| {
                        item.dish_name = self.dishes.get(&item.dish_id).cloned();
                        item
                    })
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Order store held in process memory.
///
/// One lock guards the whole store and every operation completes under it,
/// which gives each order the same all-or-nothing behavior as the
/// PostgreSQL store. Catalog names are optional and only feed the joined
/// restaurant/dish names.
#[derive(Clone, Default)]
pub struct InMemoryOrderRepository {
    store: Arc<Mutex<Store>>,
}

impl InMemoryOrderRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_restaurant(&self, restaurant_id: ModelId, name: &str) {
        self.store.lock().await.restaurants.insert(restaurant_id, name.to_string());
    }

    pub async fn add_dish(&self, dish_id: ModelId, name: &str) {
        self.store.lock().await.dishes.insert(dish_id, name.to_string());
    }

    /// Moves an order to another status, standing in for fulfillment.
    pub async fn set_status(&self, order_id: ModelId, status: OrderStatus) -> Result<()> {
        let mut store = self.store.lock().await;
        let order = store
            .orders
            .get_mut(&order_id)
            .ok_or_else(|| OrderError::NotFound(format!("order {}", order_id)))?;
        order.status = status;
        info!(order_id, %status, "Order status changed");
        Ok(())
    }
}

#[async_trait]
impl OrderRepository for InMemoryOrderRepository {
    async fn create_order(&self, customer_id: ModelId, order: &NewOrder) -> Result<ModelId> {
        validate_id("customer id", customer_id)?;
        validate_new_order(order)?;

        let started = Instant::now();
        let mut store = self.store.lock().await;
        let order_id = store.last_order_id + 1;

        let items = order
            .items
            .iter()
            .map(|line| -> Result<(ModelId, OrderItem)> {
                let item = OrderItem {
                    order_id,
                    dish_id: line.dish_id,
                    dish_name: None,
                    quantity: line.quantity,
                    unit_price: line.unit_price,
                    subtotal: line.subtotal()?,
                };
                Ok((line.dish_id, item))
            })
            .collect::<Result<BTreeMap<ModelId, OrderItem>>>()?;
        let total_amount = order.items_total()?;

        store.last_order_id = order_id;
        store.orders.insert(
            order_id,
            Order {
                order_id,
                customer_id,
                restaurant_id: order.restaurant_id,
                status: OrderStatus::Pending,
                total_amount,
                delivery_address: order.delivery_address.trim().to_string(),
                created_at: Utc::now(),
            },
        );
        store.items.insert(order_id, items);
        store.recompute_total(order_id);

        info!(order_id, customer_id, "Created order");
        let result = Ok(order_id);
        observe("create_order", started, &result);
        result
    }

    async fn get_orders_for_customer(&self, customer_id: ModelId) -> Result<Vec<OrderSummary>> {
        let started = Instant::now();
        let store = self.store.lock().await;
        let mut summaries: Vec<OrderSummary> = store
            .orders
            .values()
            .filter(|order| order.customer_id == customer_id)
            .map(|order| OrderSummary {
                order: order.clone(),
                restaurant_name: store.restaurants.get(&order.restaurant_id).cloned(),
                item_count: store
                    .items
                    .get(&order.order_id)
                    .map_or(0, |items| items.len() as i64),
            })
            .collect();

        summaries.sort_by(|a, b| {
            b.order
                .created_at
                .cmp(&a.order.created_at)
                .then(b.order.order_id.cmp(&a.order.order_id))
        });
        let result = Ok(summaries);
        observe("list_orders", started, &result);
        result
    }

    async fn get_order_detail(
        &self,
        order_id: ModelId,
        customer_id: ModelId,
    ) -> Result<OrderDetail> {
        let started = Instant::now();
        let store = self.store.lock().await;
        let result = store
            .orders
            .get(&order_id)
            .filter(|order| order.customer_id == customer_id)
            .cloned()
            .ok_or_else(|| OrderError::NotFound(format!("order {}", order_id)))
            .map(|order| OrderDetail {
                restaurant_name: store.restaurants.get(&order.restaurant_id).cloned(),
                items: store.items_of(order_id),
                order,
            });
        observe("order_detail", started, &result);
        result
    }

    async fn delete_order(&self, order_id: ModelId, customer_id: ModelId) -> Result<()> {
        let started = Instant::now();
        let mut store = self.store.lock().await;
        let result = store.check_pending(order_id, customer_id);
        if result.is_ok() {
            store.orders.remove(&order_id);
            let items = store.items.remove(&order_id).map_or(0, |items| items.len());
            info!(order_id, customer_id, items, "Deleted order");
        }
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
        let mut store = self.store.lock().await;
        let result = store.check_pending(order_id, customer_id);
        if result.is_ok() {
            if let Some(order) = store.orders.get_mut(&order_id) {
                order.delivery_address = address.to_string();
            }
            info!(order_id, customer_id, "Updated delivery address");
        }
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
        let mut store = self.store.lock().await;
        let result = store.check_pending(order_id, customer_id).and_then(|()| {
            store
                .items
                .get_mut(&order_id)
                .and_then(|items| items.remove(&dish_id))
                .map(|_| ())
                .ok_or_else(|| missing_item(order_id, dish_id))
        });
        if result.is_ok() {
            store.recompute_total(order_id);
            info!(order_id, customer_id, dish_id, "Removed order item");
        }
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
        let mut store = self.store.lock().await;
        let result = store.check_pending(order_id, customer_id).and_then(|()| {
            let items = store
                .items
                .get_mut(&order_id)
                .ok_or_else(|| missing_item(order_id, dish_id))?;
            let unit_price = items
                .get(&dish_id)
                .map(|item| item.unit_price)
                .ok_or_else(|| missing_item(order_id, dish_id))?;

            let new_subtotal = subtotal(quantity, unit_price)?;
            let other_lines = items
                .iter()
                .filter(|(id, _)| **id != dish_id)
                .try_fold(Decimal::ZERO, |total, (_, item)| add_to_total(total, item.subtotal))?;
            add_to_total(other_lines, new_subtotal)?;

            if let Some(item) = items.get_mut(&dish_id) {
                item.quantity = quantity;
                item.subtotal = new_subtotal;
            }
            Ok(())
        });
        if result.is_ok() {
            store.recompute_total(order_id);
            info!(order_id, customer_id, dish_id, quantity, "Updated item quantity");
        }
        observe("update_quantity", started, &result);
        result
    }
}

impl InMemoryOrderRepository {
    /// True when every order's stored total equals the sum of its items.
    pub async fn totals_consistent(&self) -> bool {
        let store = self.store.lock().await;
        store
            .orders
            .values()
            .all(|order| order.total_amount == order_total(&store.items_of(order.order_id)))
    }
}
