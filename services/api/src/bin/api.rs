//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{Argon2Hasher, JpegNormalizer, JsonFileStore, OpenAiSstAdapter, OpenAiStoryAdapter},
    config::Config,
    error::ApiError,
    web::{
        self,
        rest::ApiDoc,
        state::{AppState, SessionRegistry},
    },
};
use async_openai::{config::OpenAIConfig, Client};
use axum::http::{
    header::{ACCEPT, CONTENT_TYPE},
    HeaderValue, Method,
};
use axum::Router;
use festival_stories_core::ports::{RecordStore, SpeechToTextService};
use festival_stories_core::{
    seed_sample_data, EnhancementGateway, IdentityService, KeyRotationManager,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
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

    // --- 2. Prepare the Record Store ---
    info!(data_dir = %config.data_dir.display(), "Initializing record store...");
    let store: Arc<dyn RecordStore> = Arc::new(JsonFileStore::new(config.data_dir.clone()));
    store.initialize().await?;
    if config.seed_sample_data {
        let report = seed_sample_data(store.as_ref()).await?;
        info!(?report, "Demo storytellers and stories are available");
    }

    // --- 3. Initialize Service Adapters ---
    if config.credentials.is_empty() {
        warn!("No OpenAI API keys configured; AI enhancement and transcription are disabled");
    } else {
        let names: Vec<&str> = config.credentials.iter().map(|c| c.name.as_str()).collect();
        info!(keys = ?names, "API key rotation enabled");
    }

    let story_adapter = Arc::new(OpenAiStoryAdapter::new(config.enhancement_model.clone()));
    let enhancement = Arc::new(EnhancementGateway::new(
        KeyRotationManager::new(config.credentials.clone()),
        story_adapter.clone(),
        story_adapter,
    ));

    // Transcription always uses the first configured key.
    let sst: Option<Arc<dyn SpeechToTextService>> = config.credentials.first().map(|credential| {
        let client = Client::with_config(OpenAIConfig::new().with_api_key(credential.key.clone()));
        Arc::new(OpenAiSstAdapter::new(client, config.sst_model.clone())) as Arc<dyn SpeechToTextService>
    });

    // --- 4. Build the Shared AppState ---
    let app_state = Arc::new(AppState {
        config: config.clone(),
        identity: IdentityService::new(store.clone(), Arc::new(Argon2Hasher::new())),
        store,
        enhancement,
        images: Arc::new(JpegNormalizer),
        sst,
        sessions: SessionRegistry::default(),
    });

    let origin = config
        .cors_origin
        .parse::<HeaderValue>()
        .map_err(|source| ApiError::CorsOrigin {
            origin: config.cors_origin.clone(),
            source,
        })?;
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE, ACCEPT]);

    // --- 5. Create the Web Router ---
    // Merge the API router with the Swagger UI router for a complete application.
    let app = Router::new()
        .merge(web::router(app_state).layer(cors))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

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
