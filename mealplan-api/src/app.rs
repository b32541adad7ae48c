/// Application state and router builder
///
/// # Example
///
/// ```no_run
/// use mealplan_api::{app::{build_router, AppState}, config::Config};
/// use sqlx::PgPool;
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// let pool = PgPool::connect(&config.database.url).await?;
/// let state = AppState::new(pool, config)?;
/// let app = build_router(state);
/// # Ok(())
/// # }
/// ```

use crate::{config::Config, error::ApiError, middleware::security::SecurityHeadersLayer};
use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderName, HeaderValue, Method},
    routing::{delete, get, post},
    Router,
};
use mealplan_shared::{
    ai::{anthropic::AnthropicClient, tts::TtsClient},
    billing::{
        client::StripeClient,
        ledger::PgEventLedger,
        reconcile::WebhookProcessor,
        signature::WebhookVerifier,
        store::PgSubscriptionStore,
    },
    http::ClientError,
    storage::StorageClient,
};
use sqlx::PgPool;
use std::{sync::Arc, time::Duration};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

/// Shared application state
///
/// Cloned for each request via Axum's `State` extractor. Vendor clients are
/// `None` when their configuration is absent; handlers answer 503 then.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: PgPool,

    /// Application configuration
    pub config: Arc<Config>,

    pub stripe: Option<StripeClient>,

    pub anthropic: Option<AnthropicClient>,

    pub tts: Option<TtsClient>,

    pub storage: Option<StorageClient>,

    /// Present when a webhook signing secret is configured
    pub webhook_verifier: Option<WebhookVerifier>,

    /// Idempotent event dispatcher
    pub webhooks: WebhookProcessor,
}

impl AppState {
    /// Creates application state with database-backed webhook processing
    pub fn new(db: PgPool, config: Config) -> Result<Self, ClientError> {
        let stripe = config
            .stripe
            .as_ref()
            .map(|c| StripeClient::new(&c.secret_key, &c.api_base))
            .transpose()?;

        let anthropic = config
            .anthropic
            .as_ref()
            .map(|c| AnthropicClient::new(&c.api_key, &c.model, &c.api_base))
            .transpose()?;

        let tts = config
            .elevenlabs
            .as_ref()
            .map(|c| TtsClient::new(&c.api_key, &c.voice_id, &c.api_base))
            .transpose()?;

        let storage = config
            .storage
            .as_ref()
            .map(|c| StorageClient::new(&c.url, &c.service_role_key, &c.bucket))
            .transpose()?;

        let webhook_verifier = config.webhook.secret.as_ref().map(|secret| {
            WebhookVerifier::new(secret, Duration::from_secs(config.webhook.tolerance_secs))
        });

        let webhooks = WebhookProcessor::new(
            Arc::new(PgEventLedger::new(db.clone())),
            Arc::new(PgSubscriptionStore::new(db.clone())),
        );

        Ok(Self {
            db,
            config: Arc::new(config),
            stripe,
            anthropic,
            tts,
            storage,
            webhook_verifier,
            webhooks,
        })
    }

    /// Replaces the webhook processor (e.g. with in-memory ledger and store)
    pub fn with_webhook_processor(mut self, webhooks: WebhookProcessor) -> Self {
        self.webhooks = webhooks;
        self
    }

    pub fn stripe(&self) -> Result<&StripeClient, ApiError> {
        self.stripe.as_ref().ok_or_else(|| ApiError::not_configured("Stripe"))
    }

    pub fn anthropic(&self) -> Result<&AnthropicClient, ApiError> {
        self.anthropic
            .as_ref()
            .ok_or_else(|| ApiError::not_configured("AI assistant"))
    }

    pub fn tts(&self) -> Result<&TtsClient, ApiError> {
        self.tts.as_ref().ok_or_else(|| ApiError::not_configured("Text-to-speech"))
    }

    pub fn storage(&self) -> Result<&StorageClient, ApiError> {
        self.storage
            .as_ref()
            .ok_or_else(|| ApiError::not_configured("Image storage"))
    }

    pub fn webhook_verifier(&self) -> Result<&WebhookVerifier, ApiError> {
        self.webhook_verifier
            .as_ref()
            .ok_or_else(|| ApiError::not_configured("Stripe webhook secret"))
    }
}

/// Builds the complete Axum router with all routes and middleware
///
/// # Architecture
///
/// ```text
/// /
/// ├── /health                          # Health check (public)
/// └── /api/
///     ├── /recipes                     # GET list, POST create
///     │   ├── /:id                     # GET, PUT, DELETE
///     │   └── /:id/image               # POST raw image upload
///     ├── /favorites                   # GET list, POST add
///     │   └── /:recipe_id              # DELETE
///     ├── /meal-plan                   # GET week, PUT slot, DELETE week
///     │   └── /:slot_id                # DELETE slot
///     ├── /family                      # GET, PUT
///     ├── /stripe/
///     │   ├── /subscription            # GET status
///     │   ├── /checkout                # POST
///     │   ├── /portal                  # POST
///     │   └── /webhook                 # POST (signed, no identity)
///     ├── /chat                        # POST
///     ├── /scan                        # POST
///     └── /voice                       # POST
/// ```
///
/// Identity is resolved per handler through the `UserIdentity` extractor.
///
/// # Middleware Stack
///
/// Applied in order (bottom to top):
/// 1. Request body limit
/// 2. Logging (tower-http TraceLayer)
/// 3. CORS (tower-http CorsLayer)
/// 4. Security headers
pub fn build_router(state: AppState) -> Router {
    use crate::routes;

    let health_routes = Router::new().route("/health", get(routes::health::health_check));

    let recipe_routes = Router::new()
        .route(
            "/",
            get(routes::recipes::list_recipes).post(routes::recipes::create_recipe),
        )
        .route(
            "/:id",
            get(routes::recipes::get_recipe)
                .put(routes::recipes::update_recipe)
                .delete(routes::recipes::delete_recipe),
        )
        .route("/:id/image", post(routes::recipes::upload_image));

    let favorite_routes = Router::new()
        .route(
            "/",
            get(routes::favorites::list_favorites).post(routes::favorites::add_favorite),
        )
        .route("/:recipe_id", delete(routes::favorites::remove_favorite));

    let meal_plan_routes = Router::new()
        .route(
            "/",
            get(routes::meal_plan::get_week)
                .put(routes::meal_plan::upsert_slot)
                .delete(routes::meal_plan::clear_week),
        )
        .route("/:slot_id", delete(routes::meal_plan::delete_slot));

    let stripe_routes = Router::new()
        .route("/subscription", get(routes::billing::get_subscription))
        .route("/checkout", post(routes::billing::create_checkout))
        .route("/portal", post(routes::billing::create_portal))
        .route("/webhook", post(routes::webhook::stripe_webhook));

    let api_routes = Router::new()
        .nest("/recipes", recipe_routes)
        .nest("/favorites", favorite_routes)
        .nest("/meal-plan", meal_plan_routes)
        .route(
            "/family",
            get(routes::family::get_family).put(routes::family::put_family),
        )
        .nest("/stripe", stripe_routes)
        .route("/chat", post(routes::chat::chat))
        .route("/scan", post(routes::scan::scan_food))
        .route("/voice", post(routes::voice::text_to_speech));

    let anonymous_id = HeaderName::from_static(crate::middleware::identity::ANONYMOUS_ID_HEADER);

    // Configure CORS based on environment
    let cors = if state.config.api.cors_origins.iter().any(|o| o == "*") {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, anonymous_id])
    } else {
        let origins: Vec<HeaderValue> = state
            .config
            .api
            .cors_origins
            .iter()
            .filter_map(|origin| origin.parse().ok())
            .collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::DELETE,
                Method::OPTIONS,
            ])
            .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, anonymous_id])
            .allow_credentials(true)
            .max_age(Duration::from_secs(3600))
    };

    let body_limit = state.config.body_limit();
    let production = state.config.api.production;

    Router::new()
        .merge(health_routes)
        .nest("/api", api_routes)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors)
        .layer(SecurityHeadersLayer::new(production))
        .with_state(state)
}
