//! Anti-Snoring Pillow Backend Server
//!
//! REST backend for snoring detection and pump control.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                 ANTI-SNORING BACKEND                     │
//! ├──────────────────────────────────────────────────────────┤
//! │  ┌──────────┐  ┌──────────┐  ┌───────────────────────┐  │
//! │  │  API     │  │  Auth    │  │  Snoring Detector     │  │
//! │  │  (Axum)  │  │  (JWT)   │  │  (ONNX / mock mode)   │  │
//! │  └────┬─────┘  └────┬─────┘  └──────────┬────────────┘  │
//! │       └─────────────┼───────────────────┘               │
//! │              ┌──────┴──────┐      ┌─────────────────┐   │
//! │              │ PostgreSQL  │      │  Raspberry Pi   │   │
//! │              └─────────────┘      │ (pump control)  │   │
//! │                                   └─────────────────┘   │
//! └──────────────────────────────────────────────────────────┘
//! ```

mod config;
mod db;
mod error;
mod handlers;
mod middleware;
mod ml;
mod models;
mod pi;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::HeaderValue,
    middleware as axum_middleware,
    routing::{get, post},
};
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

pub use error::{AppError, AppResult};

use handlers::auto_detect::AutoDetectRegistry;
use ml::SnoringDetector;
use pi::PiClient;

/// Uploaded clips are short; 20 MB covers over a minute of uncompressed audio.
const MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

#[tokio::main]
async fn main() {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "antisnore_backend=debug,tower_http=debug".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = config::Config::from_env();

    tracing::info!("Anti-Snoring Pillow backend starting...");
    tracing::info!("Database: {}", config.database_url.split('@').last().unwrap_or("***"));
    tracing::info!("Raspberry Pi: {}", config.raspi_api_url);

    // Initialize database pool
    let pool = db::create_pool(&config.database_url).await
        .expect("Failed to create database pool");

    // Run migrations
    tracing::info!("Running database migrations...");
    db::run_migrations(&pool).await
        .expect("Failed to run migrations");

    if config.is_production() && config.jwt_secret.contains("change-in-production") {
        tracing::warn!("JWT_SECRET still has its default value in production");
    }

    // Load the snoring classifier (mock mode when the model file is absent)
    let detector = Arc::new(SnoringDetector::load(&config.model_path));
    if detector.is_mock() {
        tracing::warn!("No model at {}, predictions are mocked", detector.model_path());
    }

    let pi = Arc::new(PiClient::new(
        config.raspi_api_url.clone(),
        config.raspi_api_key.clone(),
    ));

    // Build application state
    let state = AppState {
        pool,
        config: config.clone(),
        detector,
        pi,
        auto_detect: AutoDetectRegistry::default(),
    };

    // Build router
    let app = create_router(state);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("🚀 Server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub pool: sqlx::PgPool,
    pub config: config::Config,
    pub detector: Arc<SnoringDetector>,
    pub pi: Arc<PiClient>,
    pub auto_detect: AutoDetectRegistry,
}

/// Create the main router with all routes
fn create_router(state: AppState) -> Router {
    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/", get(handlers::health::root))
        .route("/health", get(handlers::health::check))
        .route("/auth/register", post(handlers::auth::register))
        .route("/auth/login", post(handlers::auth::login));

    // User routes (JWT auth)
    let user_routes = Router::new()
        .route("/auth/logout", post(handlers::auth::logout))
        .route("/auth/me", get(handlers::auth::me))

        // Snoring detection
        .route("/snore/detect", post(handlers::snore::detect))
        .route("/snore/logs", get(handlers::snore::logs))
        .route("/snore/stats", get(handlers::snore::stats))

        // Pump control
        .route("/pump/trigger", post(handlers::pump::trigger))
        .route("/pump/logs", get(handlers::pump::logs))
        .route("/pump/status", get(handlers::pump::status))

        // Pillow height
        .route("/pillow/level", post(handlers::pillow::set_level))
        .route("/pillow/levels", get(handlers::pillow::levels))

        // Auto detection
        .route("/auto-detect/start", post(handlers::auto_detect::start))
        .route("/auto-detect/stop", post(handlers::auto_detect::stop))
        .route("/auto-detect/status", get(handlers::auto_detect::status))
        .route("/auto-detect/simulate-detection", post(handlers::auto_detect::simulate))

        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::require_user_auth
        ));

    let cors = cors_layer(&state.config);

    // Combine all routes
    Router::new()
        .merge(public_routes)
        .merge(user_routes)
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// CORS restricted to the configured frontend origins, wide open as a fallback
fn cors_layer(config: &config::Config) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .cors_origins_list()
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    if origins.is_empty() {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    }
}
