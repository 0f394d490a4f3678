use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

use delivery::executable_utils::{
    initialize_executable, initialize_tracing, install_metrics_recorder, run_backend,
};
use orders::{OrderService, PgOrderRepository};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    println!("Starting backend...");
    let config = initialize_executable()?;
    initialize_tracing(&config.backend.log_level);
    let metrics = install_metrics_recorder()?;

    let repository = PgOrderRepository::connect(
        &config.common.database_url,
        config.database.max_connections,
        Duration::from_secs(config.database.acquire_timeout_secs),
    )
    .await?;
    sqlx::migrate!("../migrations").run(repository.pool()).await?;
    tracing::info!("Database migrations applied");

    let orders = Arc::new(OrderService::new(Arc::new(repository)));
    run_backend(config.backend, orders, metrics).await
}
