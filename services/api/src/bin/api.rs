//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{
        DbAdapter, DelegatedClassifier, DelegatedQueryRewriter, DelegatedTimezoneLookup,
        DelegatedTitleAdapter, GeminiGateway, GoogleSearchGateway, SearchCredentials,
    },
    config::{Config, ConfigError},
    error::ApiError,
    web::{
        auth::{login_handler, logout_handler, signup_handler},
        chat_handler, delete_chat_handler, list_chats_handler, list_messages_handler,
        middleware::require_auth,
        rename_chat_handler,
        rest::ApiDoc,
        state::AppState,
    },
};
use axum::{
    extract::DefaultBodyLimit,
    http::{
        header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
        HeaderValue, Method,
    },
    middleware as axum_middleware,
    routing::{delete, get, post},
    Router,
};
use converse_core::ports::{CompletionService, SystemClock};
use converse_core::synthesizer::Synthesizer;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tracing::info;
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

    // --- 2. Connect to Database & Run Migrations ---
    info!("Connecting to database...");
    let db_pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await?;
    let db_adapter = Arc::new(DbAdapter::new(db_pool));
    info!("Running database migrations...");
    db_adapter.run_migrations().await?;
    info!("Database migrations complete.");

    // --- 3. Initialize the Gateways ---
    let http_client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.request_timeout_secs))
        .build()
        .map_err(|e| ApiError::Internal(format!("Failed to build HTTP client: {}", e)))?;

    let gemini_api_key = config
        .gemini_api_key
        .as_ref()
        .ok_or_else(|| ApiError::Internal("GEMINI_API_KEY is required".to_string()))?;
    let completions: Arc<dyn CompletionService> = Arc::new(GeminiGateway::new(
        http_client.clone(),
        gemini_api_key,
        config.gemini_model.clone(),
        config.gemini_base_url.clone(),
    ));

    let search_credentials = match (&config.search_api_key, &config.search_engine_id) {
        (Some(api_key), Some(engine_id)) => Some(SearchCredentials {
            api_key: api_key.clone(),
            engine_id: engine_id.clone(),
        }),
        _ => None,
    };
    let search_gateway = Arc::new(GoogleSearchGateway::new(http_client, search_credentials));

    // --- 4. Build the Pipeline and Shared AppState ---
    let classifier = Arc::new(DelegatedClassifier::new(completions.clone()));
    let rewriter = Arc::new(DelegatedQueryRewriter::new(completions.clone()));
    let timezones = Arc::new(DelegatedTimezoneLookup::new(completions.clone()));
    let titles = Arc::new(DelegatedTitleAdapter::new(completions.clone()));
    let synthesizer = Arc::new(Synthesizer::new(
        completions,
        search_gateway,
        rewriter,
        timezones,
        Arc::new(SystemClock),
        config.default_timezone,
    ));

    let app_state = Arc::new(AppState {
        chats: db_adapter.clone(),
        identity: db_adapter,
        classifier,
        synthesizer,
        titles,
        config: config.clone(),
    });

    let allowed_origin = config.allowed_origin.parse::<HeaderValue>().map_err(|e| {
        ConfigError::InvalidValue("ALLOWED_ORIGIN".to_string(), e.to_string())
    })?;
    let cors = CorsLayer::new()
        .allow_origin(allowed_origin)
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE, ACCEPT]);

    // --- 5. Create the Web Router ---
    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/auth/signup", post(signup_handler))
        .route("/auth/login", post(login_handler))
        .route("/auth/logout", post(logout_handler));

    // Protected routes (auth required)
    let protected_routes = Router::new()
        .route("/chat", post(chat_handler))
        .route("/chats", get(list_chats_handler))
        .route("/chats/{chat_id}/messages", get(list_messages_handler))
        .route("/chats/{chat_id}/rename", post(rename_chat_handler))
        .route("/chats/{chat_id}", delete(delete_chat_handler))
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            require_auth,
        ));

    // Combine API routes
    let api_router = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(DefaultBodyLimit::max(1024 * 1024))
        .layer(cors)
        .with_state(app_state);

    // Merge the API router with the Swagger UI router for a complete application.
    let app = Router::new()
        .merge(api_router)
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
