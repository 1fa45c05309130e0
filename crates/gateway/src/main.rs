//! Newswire API Gateway
//!
//! The main entry point for all external API requests.
//! Handles:
//! - Authentication
//! - Rate limiting
//! - Request routing
//! - Observability (logging, metrics)

mod extract;
mod handlers;
mod middleware;

use axum::{
    routing::{delete, get, post},
    Router,
};
use metrics_exporter_prometheus::PrometheusBuilder;
use newswire_common::{
    auth::JwtManager,
    cache::Cache,
    config::AppConfig,
    db::{DbPool, Repository},
    metrics,
    providers::{generative::GeminiClient, news::NewsClient},
    ChatService, NewsService, SummaryService,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub repo: Repository,
    pub cache: Cache,
    pub news: NewsService,
    pub summaries: SummaryService,
    pub chat: ChatService,
    pub jwt: Arc<JwtManager>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = AppConfig::load()?;

    init_tracing(&config);

    info!("Starting Newswire API Gateway v{}", newswire_common::VERSION);

    // Expose Prometheus metrics when configured
    if config.observability.metrics_port > 0 {
        let metrics_addr = SocketAddr::from(([0, 0, 0, 0], config.observability.metrics_port));
        PrometheusBuilder::new()
            .with_http_listener(metrics_addr)
            .install()?;
        info!("Metrics exporter listening on {}", metrics_addr);
    }
    metrics::register_metrics();

    // Initialize database and cache connections
    info!("Connecting to database...");
    let db = DbPool::new(&config.database).await?;
    let repo = Repository::new(db);

    info!("Connecting to cache...");
    let cache = Cache::connect(&config.redis.url).await?;

    // Provider clients
    let news_client = Arc::new(NewsClient::new(
        config.news.api_key.clone(),
        config.news.base_url.clone(),
        config.news.timeout_secs,
    )?);
    let summary_generator = Arc::new(GeminiClient::new(
        config.generative.api_key.clone(),
        config.generative.api_base.clone(),
        config.generative.summary_model.clone(),
        config.generative.timeout_secs,
    )?);
    let chat_generator = Arc::new(GeminiClient::new(
        config.generative.api_key.clone(),
        config.generative.api_base.clone(),
        config.generative.chat_model.clone(),
        config.generative.timeout_secs,
    )?);

    // Services
    let news = NewsService::new(cache.clone(), news_client, config.news.cache_ttl_secs);
    let summaries = SummaryService::new(cache.clone(), Arc::new(repo.clone()), summary_generator);
    let chat = ChatService::new(cache.clone(), chat_generator);
    let jwt = Arc::new(JwtManager::new(
        &config.auth.jwt_secret,
        config.auth.jwt_expiration_secs,
    ));

    let config = Arc::new(config);
    let state = AppState {
        config: config.clone(),
        repo,
        cache,
        news,
        summaries,
        chat,
        jwt,
    };

    // Build the router
    let app = create_router(state);

    // Start the server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.observability.log_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    if config.observability.json_logging {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Create the main application router
fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Request ID propagation
    let request_id = SetRequestIdLayer::x_request_id(MakeRequestUuid);
    let propagate_id = PropagateRequestIdLayer::x_request_id();

    // API routes
    let mut api_routes = Router::new()
        // News endpoints
        .route("/news/headlines", get(handlers::news::get_headlines))
        .route("/news/search", get(handlers::news::search_news))
        .route("/news/save", post(handlers::news::save_article))
        .route("/news/saved", get(handlers::news::get_saved_articles))
        .route(
            "/news/saved/{article_id}",
            delete(handlers::news::remove_saved_article),
        )
        // Summarization endpoints
        .route("/ai/summarize", post(handlers::summaries::summarize_by_url))
        .route(
            "/ai/summarize/{article_id}",
            post(handlers::summaries::summarize_by_id),
        )
        // Chat endpoints
        .route("/chat/message", post(handlers::chat::send_message))
        .route(
            "/chat/history",
            get(handlers::chat::get_history).delete(handlers::chat::clear_history),
        )
        // Auth endpoints
        .route("/auth/register", post(handlers::auth::register))
        .route("/auth/login", post(handlers::auth::login))
        .route("/auth/me", get(handlers::auth::me));

    if state.config.rate_limit.enabled {
        let limiter = middleware::rate_limit::create_rate_limiter(
            state.config.rate_limit.requests_per_second,
            state.config.rate_limit.burst,
        );
        api_routes = api_routes.layer(axum::middleware::from_fn(
            move |request: axum::extract::Request, next: axum::middleware::Next| {
                let limiter = limiter.clone();
                async move {
                    middleware::rate_limit::rate_limit_middleware(request, next, limiter).await
                }
            },
        ));
    }

    // Compose the app
    Router::new()
        // Health endpoints (no auth, no rate limit)
        .route("/health", get(handlers::health::health))
        .route("/ready", get(handlers::health::ready))
        .nest("/v1", api_routes)
        .layer(TimeoutLayer::new(state.config.request_timeout()))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(request_id)
        .layer(propagate_id)
        .with_state(state)
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, starting shutdown..."),
        _ = terminate => info!("Received SIGTERM, starting shutdown..."),
    }
}
