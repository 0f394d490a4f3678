pub mod error;
pub mod model;
pub mod repository;
pub mod service;
pub mod storage;
pub mod validation;

pub use error::{OrderError, ServiceError};
pub use repository::OrderRepository;
pub use service::OrderService;
pub use storage::{InMemoryOrderRepository, PgOrderRepository};
