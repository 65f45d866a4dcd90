//! services/api/src/bin/api.rs

use api_lib::{
    adapters::GeminiExtractionAdapter,
    config::Config,
    error::ApiError,
    web::{api_router, rest::ApiDoc, state::AppState},
};
use axum::{
    http::{header::CONTENT_TYPE, HeaderValue, Method},
    Router,
};
use register_assistant_core::ExtractionService;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::{error, info};
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

    // --- 2. Initialize the Extraction Adapter ---
    // Without a credential the server still starts; image uploads then fail
    // with a configuration error while JSON uploads keep working.
    let extraction: Option<Arc<dyn ExtractionService>> = match &config.gemini_api_key {
        Some(api_key) => {
            info!(
                model = %config.extraction_model,
                "Extraction service configured."
            );
            let adapter: Arc<dyn ExtractionService> =
                Arc::new(GeminiExtractionAdapter::from_credentials(
                    api_key,
                    &config.extraction_api_base,
                    config.extraction_model.clone(),
                ));
            Some(adapter)
        }
        None => {
            error!("GEMINI_API_KEY is not set. Image extraction is disabled.");
            None
        }
    };

    // --- 3. Build the Shared AppState ---
    let app_state = AppState::new(config.clone(), extraction);

    let origin = config.cors_origin.parse::<HeaderValue>().map_err(|e| {
        ApiError::Internal(format!("Invalid CORS origin '{}': {}", config.cors_origin, e))
    })?;
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE]);

    // --- 4. Create the Web Router ---
    // Merge the API router with the Swagger UI router for a complete application.
    let app = Router::new()
        .merge(api_router(app_state).layer(cors))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    // --- 5. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
