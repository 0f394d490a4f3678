use crate::api::{AppState, router};
use axum::{Router, routing::get};
use clap::Parser;
use common::config::{BackendConfig, Config};
use http::{HeaderName, HeaderValue, Method, header};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use orders::OrderService;
use std::{error::Error, path::Path, sync::Arc};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::EnvFilter;

use crate::identity::CUSTOMER_ID_HEADER;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to config file
    #[arg(short, long, default_value = "delivery/config/dev.yaml")]
    pub config: String,
}

/// Loads `.env`, parses CLI args and reads the config file.
pub fn initialize_executable() -> Result<Config, Box<dyn Error + Send + Sync>> {
    if let Err(e) = dotenvy::dotenv() {
        println!("No .env file loaded: {}", e);
    }

    let args = Args::parse();
    println!("Loading config from: {}", args.config);
    let config = Config::load(Path::new(&args.config))?;
    println!("Loaded config for project: {}", config.common.project_name);

    Ok(config)
}

/// Installs the global subscriber. `RUST_LOG` wins over the configured level.
pub fn initialize_tracing(log_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

pub fn install_metrics_recorder() -> Result<PrometheusHandle, Box<dyn Error + Send + Sync>> {
    Ok(PrometheusBuilder::new().install_recorder()?)
}

pub fn cors_layer(allowed_origins: &[String]) -> Result<CorsLayer, Box<dyn Error + Send + Sync>> {
    let origins = allowed_origins
        .iter()
        .map(|origin| origin.parse::<HeaderValue>())
        .collect::<Result<Vec<_>, _>>()?;

    Ok(CorsLayer::new()
        .allow_origin(origins)
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static(CUSTOMER_ID_HEADER),
        ]))
}

/// Full application: order routes, health, `/metrics`, tracing and CORS.
pub fn build_app(
    config: &BackendConfig,
    orders: Arc<OrderService>,
    metrics: PrometheusHandle,
) -> Result<Router, Box<dyn Error + Send + Sync>> {
    Ok(router(AppState::new(orders))
        .route("/metrics", get(move || std::future::ready(metrics.render())))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&config.allowed_origins)?))
}

pub async fn run_backend(
    config: BackendConfig,
    orders: Arc<OrderService>,
    metrics: PrometheusHandle,
) -> Result<(), Box<dyn Error + Send + Sync>> {
    let app = build_app(&config, orders, metrics)?;

    tracing::info!("Starting backend service at {}", config.server_address);
    let listener = tokio::net::TcpListener::bind(&config.server_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
