use crate::identity::AuthenticatedCustomer;
use axum::{
    Json, Router,
    extract::{FromRequest, Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, put},
};
use orders::{
    OrderError, OrderService, ServiceError,
    model::{ModelId, NewOrder, OrderDetail, OrderSummary},
    validation::parse_id,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    orders: Arc<OrderService>,
}

impl AppState {
    pub fn new(orders: Arc<OrderService>) -> Self {
        Self { orders }
    }
}

/// Error half of every handler. Serialized as `{"message": ...}`.
#[derive(Debug)]
pub enum ApiError {
    Service(ServiceError),
    Unauthorized,
    /// Body could not be read as the expected JSON.
    Rejected(StatusCode, String),
}

/// `Json` whose rejections use the same `{"message"}` body as every other error.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Rejected(rejection.status(), rejection.body_text())
    }
}

impl From<ServiceError> for ApiError {
    fn from(e: ServiceError) -> Self {
        ApiError::Service(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized".to_string()),
            ApiError::Rejected(status, message) => (status, message),
            ApiError::Service(e) => {
                let status = match e {
                    ServiceError::Invalid(_) => StatusCode::BAD_REQUEST,
                    ServiceError::NotFound => StatusCode::NOT_FOUND,
                    ServiceError::CannotPerform => StatusCode::CONFLICT,
                    ServiceError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
                };
                (status, e.to_string())
            }
        };
        (status, Json(json!({ "message": message }))).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateOrderResponse {
    pub success: bool,
    pub order_id: ModelId,
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateAddressRequest {
    pub delivery_address: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateQuantityRequest {
    pub quantity: i32,
}

fn path_id(field: &'static str, raw: &str) -> ApiResult<ModelId> {
    parse_id(field, raw).map_err(|e| match e {
        OrderError::Validation(message) => ApiError::Service(ServiceError::Invalid(message)),
        _ => ApiError::Service(ServiceError::Internal),
    })
}

fn message(text: &str) -> Json<serde_json::Value> {
    Json(json!({ "message": text }))
}

/// Customer order routes, mounted under `/user`.
pub fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/orders", get(list_orders).post(create_order))
        .route("/orders/{id}", get(order_detail).delete(delete_order).put(update_address))
        .route("/orders/{id}/items/{dish_id}", put(update_item_quantity).delete(remove_item))
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .nest("/user", order_routes())
        .route("/health", get(health_check))
        .with_state(state)
}

pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK").into_response()
}

pub async fn create_order(
    State(state): State<AppState>,
    AuthenticatedCustomer(customer_id): AuthenticatedCustomer,
    ApiJson(order): ApiJson<NewOrder>,
) -> ApiResult<Json<CreateOrderResponse>> {
    let order_id = state.orders.create_order(customer_id, &order).await?;
    Ok(Json(CreateOrderResponse {
        success: true,
        order_id,
        message: "Order created successfully".to_string(),
    }))
}

pub async fn list_orders(
    State(state): State<AppState>,
    AuthenticatedCustomer(customer_id): AuthenticatedCustomer,
) -> ApiResult<Json<Vec<OrderSummary>>> {
    Ok(Json(state.orders.list_orders(customer_id).await?))
}

pub async fn order_detail(
    State(state): State<AppState>,
    AuthenticatedCustomer(customer_id): AuthenticatedCustomer,
    Path(id): Path<String>,
) -> ApiResult<Json<OrderDetail>> {
    let order_id = path_id("order id", &id)?;
    Ok(Json(state.orders.order_detail(order_id, customer_id).await?))
}

pub async fn delete_order(
    State(state): State<AppState>,
    AuthenticatedCustomer(customer_id): AuthenticatedCustomer,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let order_id = path_id("order id", &id)?;
    state.orders.delete_order(order_id, customer_id).await?;
    Ok(message("order deleted successfully"))
}

pub async fn update_address(
    State(state): State<AppState>,
    AuthenticatedCustomer(customer_id): AuthenticatedCustomer,
    Path(id): Path<String>,
    ApiJson(request): ApiJson<UpdateAddressRequest>,
) -> ApiResult<impl IntoResponse> {
    let order_id = path_id("order id", &id)?;
    state
        .orders
        .update_address(order_id, customer_id, &request.delivery_address)
        .await?;
    Ok(message("order updated successfully"))
}

pub async fn remove_item(
    State(state): State<AppState>,
    AuthenticatedCustomer(customer_id): AuthenticatedCustomer,
    Path((id, dish_id)): Path<(String, String)>,
) -> ApiResult<impl IntoResponse> {
    let order_id = path_id("order id", &id)?;
    let dish_id = path_id("dish id", &dish_id)?;
    state.orders.remove_item(order_id, customer_id, dish_id).await?;
    Ok(message("item removed successfully"))
}

pub async fn update_item_quantity(
    State(state): State<AppState>,
    AuthenticatedCustomer(customer_id): AuthenticatedCustomer,
    Path((id, dish_id)): Path<(String, String)>,
    ApiJson(request): ApiJson<UpdateQuantityRequest>,
) -> ApiResult<impl IntoResponse> {
    let order_id = path_id("order id", &id)?;
    let dish_id = path_id("dish id", &dish_id)?;
    state
        .orders
        .update_item_quantity(order_id, customer_id, dish_id, request.quantity)
        .await?;
    Ok(message("item quantity updated successfully"))
}
