//! # CardHub API
//!
//! HTTP surface of the CardHub ID-card issuance backend. Every `/api` route
//! except login runs behind bearer authentication; handlers apply the
//! caller's access policy before touching the repositories.

use std::time::Duration;

use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderName, Method},
    routing::get,
    Router,
};
use cardhub_database::PostgresPool;
use cardhub_utils::{AppConfig, CardHubError, CardHubResult, TokenService};
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    services::ServeDir,
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

pub mod bootstrap;
pub mod extract;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod storage;

use metrics::Metrics;
use middleware::request_id_middleware;
use storage::LocalStorage;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub pool: PostgresPool,
    pub config: AppConfig,
    pub tokens: TokenService,
    pub storage: LocalStorage,
    pub metrics: Metrics,
}

impl AppState {
    pub fn new(pool: PostgresPool, config: AppConfig) -> CardHubResult<Self> {
        let tokens = TokenService::from_config(&config.auth)?;
        let storage = LocalStorage::from_config(&config.storage);
        let metrics = Metrics::new(&config.monitoring.prometheus_namespace).map_err(|e| {
            CardHubError::Configuration {
                message: format!("Failed to register metrics: {e}"),
            }
        })?;

        Ok(Self {
            pool,
            config,
            tokens,
            storage,
            metrics,
        })
    }
}

pub fn create_app(state: AppState) -> Router {
    let config = state.config.clone();

    let mut app = Router::new()
        // Health check endpoints
        .route("/health", get(handlers::health_check))
        .route("/health/detailed", get(handlers::detailed_health_check))
        // API routes
        .nest("/api", routes::create_api_routes(state.clone()))
        // Uploaded files
        .nest_service(
            &config.storage.public_path,
            ServeDir::new(&config.storage.upload_dir),
        );

    if config.monitoring.metrics_enabled {
        app = app.route("/metrics", get(handlers::metrics_handler));
    }

    with_middleware(app.with_state(state), &config)
}

/// Cross-cutting layers shared by every route.
pub fn with_middleware(app: Router, config: &AppConfig) -> Router {
    app.layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(axum::middleware::from_fn(request_id_middleware))
            .layer(TimeoutLayer::new(Duration::from_secs(config.server.timeout_seconds)))
            .layer(CompressionLayer::new())
            .layer(
                CorsLayer::new()
                    .allow_origin(Any)
                    .allow_methods([
                        Method::GET,
                        Method::POST,
                        Method::PUT,
                        Method::PATCH,
                        Method::DELETE,
                    ])
                    .allow_headers([
                        header::CONTENT_TYPE,
                        header::AUTHORIZATION,
                        HeaderName::from_static(middleware::REQUEST_ID_HEADER),
                    ]),
            )
            .layer(DefaultBodyLimit::max(config.server.max_request_size)),
    )
}
