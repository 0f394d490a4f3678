use crate::{
    error::{OrderError, ServiceError, ServiceResult},
    model::{ModelId, NewOrder, OrderDetail, OrderSummary},
    repository::OrderRepository,
    validation::{validate_address, validate_id, validate_new_order, validate_quantity},
};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Customer-facing order operations.
///
/// Inputs are checked here before the repository is touched. Store failures
/// are logged and reported as `ServiceError::Internal`.
pub struct OrderService {
    repository: Arc<dyn OrderRepository>,
}

impl OrderService {
    pub fn new(repository: Arc<dyn OrderRepository>) -> Self {
        info!("Initializing new OrderService");
        Self { repository }
    }

    pub async fn create_order(
        &self,
        customer_id: ModelId,
        order: &NewOrder,
    ) -> ServiceResult<ModelId> {
        validate_id("customer id", customer_id).map_err(invalid)?;
        validate_new_order(order).map_err(invalid)?;

        debug!(
            customer_id,
            restaurant_id = order.restaurant_id,
            items = order.items.len(),
            "Creating order"
        );
        let order_id = self
            .repository
            .create_order(customer_id, order)
            .await
            .map_err(|e| for_mutation("create_order", e))?;
        info!(order_id, customer_id, "Order placed");
        Ok(order_id)
    }

    pub async fn list_orders(&self, customer_id: ModelId) -> ServiceResult<Vec<OrderSummary>> {
        validate_id("customer id", customer_id).map_err(invalid)?;

        let orders = self
            .repository
            .get_orders_for_customer(customer_id)
            .await
            .map_err(|e| for_read("list_orders", e))?;
        debug!(customer_id, count = orders.len(), "Listed orders");
        Ok(orders)
    }

    pub async fn order_detail(
        &self,
        order_id: ModelId,
        customer_id: ModelId,
    ) -> ServiceResult<OrderDetail> {
        validate_id("order id", order_id).map_err(invalid)?;
        validate_id("customer id", customer_id).map_err(invalid)?;

        self.repository
            .get_order_detail(order_id, customer_id)
            .await
            .map_err(|e| for_read("order_detail", e))
    }

    pub async fn delete_order(&self, order_id: ModelId, customer_id: ModelId) -> ServiceResult<()> {
        validate_id("order id", order_id).map_err(invalid)?;
        validate_id("customer id", customer_id).map_err(invalid)?;

        self.repository
            .delete_order(order_id, customer_id)
            .await
            .map_err(|e| for_mutation("delete_order", e))
    }

    pub async fn update_address(
        &self,
        order_id: ModelId,
        customer_id: ModelId,
        address: &str,
    ) -> ServiceResult<()> {
        validate_id("order id", order_id).map_err(invalid)?;
        validate_id("customer id", customer_id).map_err(invalid)?;
        let address = validate_address(address).map_err(invalid)?;

        self.repository
            .update_order_address(order_id, customer_id, address)
            .await
            .map_err(|e| for_mutation("update_address", e))
    }

    pub async fn remove_item(
        &self,
        order_id: ModelId,
        customer_id: ModelId,
        dish_id: ModelId,
    ) -> ServiceResult<()> {
        validate_id("order id", order_id).map_err(invalid)?;
        validate_id("customer id", customer_id).map_err(invalid)?;
        validate_id("dish id", dish_id).map_err(invalid)?;

        self.repository
            .delete_order_item(order_id, customer_id, dish_id)
            .await
            .map_err(|e| for_mutation("delete_item", e))
    }

    pub async fn update_item_quantity(
        &self,
        order_id: ModelId,
        customer_id: ModelId,
        dish_id: ModelId,
        quantity: i32,
    ) -> ServiceResult<()> {
        validate_id("order id", order_id).map_err(invalid)?;
        validate_id("customer id", customer_id).map_err(invalid)?;
        validate_id("dish id", dish_id).map_err(invalid)?;
        validate_quantity(quantity).map_err(invalid)?;

        self.repository
            .update_order_item_quantity(order_id, customer_id, dish_id, quantity)
            .await
            .map_err(|e| for_mutation("update_quantity", e))
    }
}

fn invalid(e: OrderError) -> ServiceError {
    match e {
        OrderError::Validation(message) => ServiceError::Invalid(message),
        other => internal("validation", other),
    }
}

fn internal(op: &str, e: OrderError) -> ServiceError {
    error!(op, error = %e, "Order store failure");
    ServiceError::Internal
}

/// Missing, foreign, and non-pending orders look the same to the caller.
fn for_mutation(op: &str, e: OrderError) -> ServiceError {
    match e {
        OrderError::Validation(message) => ServiceError::Invalid(message),
        OrderError::NotFound(_) | OrderError::PreconditionFailed(_) => {
            warn!(op, reason = %e, "Rejected order mutation");
            ServiceError::CannotPerform
        }
        other => internal(op, other),
    }
}

fn for_read(op: &str, e: OrderError) -> ServiceError {
    match e {
        OrderError::Validation(message) => ServiceError::Invalid(message),
        OrderError::NotFound(_) | OrderError::PreconditionFailed(_) => ServiceError::NotFound,
        other => internal(op, other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mutation_errors_collapse() {
        assert_eq!(
            for_mutation("t", OrderError::NotFound("x".into())),
            ServiceError::CannotPerform
        );
        assert_eq!(
            for_mutation("t", OrderError::PreconditionFailed("x".into())),
            ServiceError::CannotPerform
        );
        assert_eq!(for_mutation("t", OrderError::Corrupt("x".into())), ServiceError::Internal);
        assert_eq!(
            for_mutation("t", OrderError::Validation("bad".into())),
            ServiceError::Invalid("bad".into())
        );
    }

    #[test]
    fn read_errors_keep_not_found() {
        assert_eq!(for_read("t", OrderError::NotFound("x".into())), ServiceError::NotFound);
        assert_eq!(
            for_read("t", OrderError::Store(sqlx::Error::PoolTimedOut)),
            ServiceError::Internal
        );
    }
}
