use orders::{
    InMemoryOrderRepository, OrderError, OrderRepository, OrderService, ServiceError,
    model::{ModelId, NewOrder, NewOrderItem, OrderStatus},
};
use rust_decimal::Decimal;
use std::str::FromStr;
use std::sync::Arc;

const CUSTOMER: ModelId = 7;
const OTHER_CUSTOMER: ModelId = 8;
const RESTAURANT: ModelId = 3;
const DISH_A: ModelId = 1;
const DISH_B: ModelId = 2;

fn money(value: &str) -> Decimal {
    Decimal::from_str(value).unwrap()
}

// Two lines: A at 5.00 x2 and B at 3.00 x1, total 13.00.
fn two_line_order() -> NewOrder {
    NewOrder {
        restaurant_id: RESTAURANT,
        delivery_address: "12 Baker St".to_string(),
        total_amount: Some(money("13.00")),
        items: vec![
            NewOrderItem { dish_id: DISH_A, quantity: 2, unit_price: money("5.00") },
            NewOrderItem { dish_id: DISH_B, quantity: 1, unit_price: money("3.00") },
        ],
    }
}

async fn repository() -> InMemoryOrderRepository {
    let repo = InMemoryOrderRepository::new();
    repo.add_restaurant(RESTAURANT, "Pasta Place").await;
    repo.add_dish(DISH_A, "Lasagna").await;
    repo.add_dish(DISH_B, "Garlic Bread").await;
    repo
}

async fn total_of(repo: &InMemoryOrderRepository, order_id: ModelId) -> Decimal {
    repo.get_order_detail(order_id, CUSTOMER).await.unwrap().order.total_amount
}

#[tokio::test]
async fn test_edit_sequence_keeps_total_in_step() {
    let repo = repository().await;
    let order_id = repo.create_order(CUSTOMER, &two_line_order()).await.unwrap();

    let detail = repo.get_order_detail(order_id, CUSTOMER).await.unwrap();
    assert_eq!(detail.order.status, OrderStatus::Pending);
    assert_eq!(detail.order.total_amount, money("13.00"));
    assert_eq!(detail.restaurant_name.as_deref(), Some("Pasta Place"));
    assert_eq!(detail.items.len(), 2);
    assert_eq!(detail.items[0].dish_name.as_deref(), Some("Lasagna"));

    repo.update_order_item_quantity(order_id, CUSTOMER, DISH_A, 3).await.unwrap();
    assert_eq!(total_of(&repo, order_id).await, money("18.00"));

    repo.delete_order_item(order_id, CUSTOMER, DISH_B).await.unwrap();
    assert_eq!(total_of(&repo, order_id).await, money("15.00"));
    let detail = repo.get_order_detail(order_id, CUSTOMER).await.unwrap();
    assert_eq!(detail.items.len(), 1);
    assert_eq!(detail.items[0].subtotal, money("15.00"));

    repo.delete_order(order_id, CUSTOMER).await.unwrap();
    assert!(matches!(
        repo.get_order_detail(order_id, CUSTOMER).await,
        Err(OrderError::NotFound(_))
    ));
    assert!(repo.totals_consistent().await);
}

#[tokio::test]
async fn test_removing_last_item_leaves_empty_order() {
    let repo = repository().await;
    let mut order = two_line_order();
    order.items.truncate(1);
    order.total_amount = None;
    let order_id = repo.create_order(CUSTOMER, &order).await.unwrap();

    repo.delete_order_item(order_id, CUSTOMER, DISH_A).await.unwrap();

    let detail = repo.get_order_detail(order_id, CUSTOMER).await.unwrap();
    assert!(detail.items.is_empty());
    assert_eq!(detail.order.total_amount, Decimal::ZERO);
    assert_eq!(detail.order.status, OrderStatus::Pending);
}

#[tokio::test]
async fn test_non_pending_order_is_frozen() {
    let repo = repository().await;
    let order_id = repo.create_order(CUSTOMER, &two_line_order()).await.unwrap();
    repo.set_status(order_id, OrderStatus::Delivered).await.unwrap();
    let before = repo.get_order_detail(order_id, CUSTOMER).await.unwrap();

    assert!(matches!(
        repo.update_order_item_quantity(order_id, CUSTOMER, DISH_A, 5).await,
        Err(OrderError::PreconditionFailed(_))
    ));
    assert!(matches!(
        repo.delete_order_item(order_id, CUSTOMER, DISH_A).await,
        Err(OrderError::PreconditionFailed(_))
    ));
    assert!(matches!(
        repo.update_order_address(order_id, CUSTOMER, "1 New Rd").await,
        Err(OrderError::PreconditionFailed(_))
    ));
    assert!(matches!(
        repo.delete_order(order_id, CUSTOMER).await,
        Err(OrderError::PreconditionFailed(_))
    ));

    let after = repo.get_order_detail(order_id, CUSTOMER).await.unwrap();
    assert_eq!(before, after);
}

#[tokio::test]
async fn test_orders_of_other_customers_are_untouchable() {
    let repo = repository().await;
    let order_id = repo.create_order(CUSTOMER, &two_line_order()).await.unwrap();

    assert!(matches!(
        repo.get_order_detail(order_id, OTHER_CUSTOMER).await,
        Err(OrderError::NotFound(_))
    ));
    assert!(matches!(
        repo.delete_order(order_id, OTHER_CUSTOMER).await,
        Err(OrderError::PreconditionFailed(_))
    ));
    assert!(matches!(
        repo.update_order_address(order_id, OTHER_CUSTOMER, "Elsewhere").await,
        Err(OrderError::PreconditionFailed(_))
    ));
    assert!(repo.get_orders_for_customer(OTHER_CUSTOMER).await.unwrap().is_empty());
    assert_eq!(total_of(&repo, order_id).await, money("13.00"));
}

#[tokio::test]
async fn test_missing_item_is_not_found() {
    let repo = repository().await;
    let order_id = repo.create_order(CUSTOMER, &two_line_order()).await.unwrap();

    assert!(matches!(
        repo.delete_order_item(order_id, CUSTOMER, 99).await,
        Err(OrderError::NotFound(_))
    ));
    assert!(matches!(
        repo.update_order_item_quantity(order_id, CUSTOMER, 99, 2).await,
        Err(OrderError::NotFound(_))
    ));
    assert_eq!(total_of(&repo, order_id).await, money("13.00"));
}

#[tokio::test]
async fn test_list_is_newest_first_with_counts() {
    let repo = repository().await;
    assert!(repo.get_orders_for_customer(CUSTOMER).await.unwrap().is_empty());

    let first = repo.create_order(CUSTOMER, &two_line_order()).await.unwrap();
    let mut single = two_line_order();
    single.items.truncate(1);
    single.total_amount = None;
    let second = repo.create_order(CUSTOMER, &single).await.unwrap();

    let orders = repo.get_orders_for_customer(CUSTOMER).await.unwrap();
    let ids: Vec<ModelId> = orders.iter().map(|o| o.order.order_id).collect();
    assert_eq!(ids, vec![second, first]);
    assert_eq!(orders[0].item_count, 1);
    assert_eq!(orders[1].item_count, 2);
    assert_eq!(orders[1].restaurant_name.as_deref(), Some("Pasta Place"));
}

#[tokio::test]
async fn test_address_update_is_trimmed() {
    let repo = repository().await;
    let order_id = repo.create_order(CUSTOMER, &two_line_order()).await.unwrap();

    repo.update_order_address(order_id, CUSTOMER, "  5 Elm Rd ").await.unwrap();
    let detail = repo.get_order_detail(order_id, CUSTOMER).await.unwrap();
    assert_eq!(detail.order.delivery_address, "5 Elm Rd");
    assert_eq!(detail.order.total_amount, money("13.00"));
}

#[tokio::test]
async fn test_invalid_create_stores_nothing() {
    let repo = repository().await;
    let mut order = two_line_order();
    order.items[1].quantity = 0;

    assert!(matches!(
        repo.create_order(CUSTOMER, &order).await,
        Err(OrderError::Validation(_))
    ));
    assert!(repo.get_orders_for_customer(CUSTOMER).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_amounts_outside_numeric_10_2_are_rejected() {
    let repo = repository().await;

    let mut fractional = two_line_order();
    fractional.items[0].unit_price = money("5.555");
    fractional.total_amount = None;

    let mut too_large = two_line_order();
    too_large.items[0].quantity = 1000;
    too_large.items[0].unit_price = money("200000");
    too_large.total_amount = None;

    let mut overflowing = two_line_order();
    overflowing.items[0].quantity = i32::MAX;
    overflowing.items[0].unit_price = Decimal::MAX;
    overflowing.total_amount = None;

    for order in [fractional, too_large, overflowing] {
        assert!(matches!(
            repo.create_order(CUSTOMER, &order).await,
            Err(OrderError::Validation(_))
        ));
    }
    assert!(repo.get_orders_for_customer(CUSTOMER).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_quantity_beyond_amount_limit_changes_nothing() {
    let repo = repository().await;
    let mut order = two_line_order();
    order.items[0].quantity = 1;
    order.items[0].unit_price = money("99999999.99");
    order.items.truncate(1);
    order.total_amount = None;
    let order_id = repo.create_order(CUSTOMER, &order).await.unwrap();
    let before = repo.get_order_detail(order_id, CUSTOMER).await.unwrap();

    for quantity in [2, i32::MAX] {
        assert!(matches!(
            repo.update_order_item_quantity(order_id, CUSTOMER, DISH_A, quantity).await,
            Err(OrderError::Validation(_))
        ));
    }

    let after = repo.get_order_detail(order_id, CUSTOMER).await.unwrap();
    assert_eq!(before, after);
    assert_eq!(after.order.total_amount, money("99999999.99"));
    assert!(repo.totals_consistent().await);
}

#[tokio::test]
async fn test_largest_allowed_total_is_stored_exactly() {
    let repo = repository().await;
    let mut order = two_line_order();
    order.items[0].unit_price = money("49999999.99");
    order.items[1].unit_price = money("0.01");
    order.items[1].quantity = 1;
    order.total_amount = Some(money("99999999.99"));
    let order_id = repo.create_order(CUSTOMER, &order).await.unwrap();

    assert_eq!(total_of(&repo, order_id).await, money("99999999.99"));
    assert!(matches!(
        repo.update_order_item_quantity(order_id, CUSTOMER, DISH_B, 2).await,
        Err(OrderError::Validation(_))
    ));
    assert_eq!(total_of(&repo, order_id).await, money("99999999.99"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_edits_keep_total_consistent() {
    let repo = Arc::new(repository().await);
    let order_id = repo.create_order(CUSTOMER, &two_line_order()).await.unwrap();

    let (quantity, removal) = tokio::join!(
        repo.update_order_item_quantity(order_id, CUSTOMER, DISH_A, 4),
        repo.delete_order_item(order_id, CUSTOMER, DISH_B),
    );
    quantity.unwrap();
    removal.unwrap();

    let detail = repo.get_order_detail(order_id, CUSTOMER).await.unwrap();
    assert_eq!(detail.items.len(), 1);
    assert_eq!(detail.order.total_amount, money("20.00"));
    assert!(repo.totals_consistent().await);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_parallel_quantity_updates_from_tasks() {
    let repo = Arc::new(repository().await);
    let order_id = repo.create_order(CUSTOMER, &two_line_order()).await.unwrap();

    let tasks: Vec<_> = (1..=8)
        .map(|quantity| {
            let repo = Arc::clone(&repo);
            tokio::spawn(async move {
                repo.update_order_item_quantity(order_id, CUSTOMER, DISH_A, quantity).await
            })
        })
        .collect();
    for result in futures::future::join_all(tasks).await {
        result.unwrap().unwrap();
    }

    let detail = repo.get_order_detail(order_id, CUSTOMER).await.unwrap();
    let line = detail.items.iter().find(|i| i.dish_id == DISH_A).unwrap();
    assert_eq!(line.subtotal, line.unit_price * Decimal::from(line.quantity));
    assert!(repo.totals_consistent().await);
}

#[tokio::test]
async fn test_service_over_memory_store() {
    let repo = Arc::new(repository().await);
    let service = OrderService::new(repo.clone());

    let order_id = service.create_order(CUSTOMER, &two_line_order()).await.unwrap();
    repo.set_status(order_id, OrderStatus::Confirmed).await.unwrap();

    assert_eq!(service.delete_order(order_id, CUSTOMER).await, Err(ServiceError::CannotPerform));
    assert_eq!(
        service.delete_order(order_id + 100, CUSTOMER).await,
        Err(ServiceError::CannotPerform)
    );
    assert_eq!(service.order_detail(order_id, OTHER_CUSTOMER).await, Err(ServiceError::NotFound));
    let detail = service.order_detail(order_id, CUSTOMER).await.unwrap();
    assert_eq!(detail.order.status, OrderStatus::Confirmed);
}
