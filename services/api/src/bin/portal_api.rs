//! services/api/src/bin/portal_api.rs

use axum::http::{
    header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
    HeaderValue, Method,
};
use axum::Router;
use onboarding_core::memory::InMemoryBackend;
use onboarding_core::ports::{AuthService, DocumentStore, ObjectStorage};
use portal_api::{
    adapters::{DbAdapter, S3Storage},
    config::Config,
    error::ApiError,
    web::{self, ApiDoc, AppState},
};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Connect to the Backend & Run Migrations ---
    let memory = Arc::new(InMemoryBackend::new());
    let (auth, store): (Arc<dyn AuthService>, Arc<dyn DocumentStore>) =
        match &config.database_url {
            Some(database_url) => {
                info!("Connecting to database...");
                let db_pool = PgPoolOptions::new()
                    .max_connections(10)
                    .connect(database_url)
                    .await?;
                let db_adapter = Arc::new(DbAdapter::new(db_pool));
                info!("Running database migrations...");
                db_adapter.run_migrations().await?;
                info!("Database migrations complete.");
                (db_adapter.clone() as Arc<dyn AuthService>, db_adapter as Arc<dyn DocumentStore>)
            }
            None => {
                warn!("DATABASE_URL is not set; using the in-memory backend. Data will not persist.");
                (memory.clone() as Arc<dyn AuthService>, memory.clone() as Arc<dyn DocumentStore>)
            }
        };

    // --- 3. Initialize Object Storage ---
    let objects: Arc<dyn ObjectStorage> = match &config.s3 {
        Some(settings) => {
            info!("Storing module images in S3 bucket '{}'", settings.bucket);
            Arc::new(S3Storage::new(settings))
        }
        None => {
            warn!("S3_BUCKET is not set; module images are kept in memory.");
            memory as Arc<dyn ObjectStorage>
        }
    };

    // --- 4. Build the Shared AppState ---
    let app_state = Arc::new(AppState::new(auth, store, objects, config.clone()));

    let origin = config.cors_origin.parse::<HeaderValue>().map_err(|e| {
        ApiError::Internal(format!("Invalid CORS_ORIGIN '{}': {}", config.cors_origin, e))
    })?;
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE, ACCEPT]);

    // --- 5. Create the Web Router ---
    let app = Router::new()
        .merge(web::router(app_state))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    // --- 6. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
