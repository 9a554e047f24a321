mod handlers;
mod models;
mod services;

use std::sync::Arc;
use axum::{
    Router,
    middleware,
    extract::Request,
    http::{Method, header::{self, HeaderName}},
    response::Response,
    body::Body,
};
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::Span;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use models::config::AppConfig;
use services::dashscope::DashScopeClient;
use services::pipeline::{Collaborators, GenerationPipeline};
use services::storage::OutputStore;
use services::transport::HttpFetcher;
use services::typeface::FontLibrary;

pub struct AppState {
    pub pipeline: GenerationPipeline,
    /// Cancelled on shutdown; each generation runs on a child token.
    pub shutdown: CancellationToken,
}

/// Headers that must never appear in logs.
const SENSITIVE_HEADERS: &[&str] = &["authorization", "cookie"];

fn is_sensitive_header(name: &HeaderName) -> bool {
    let lower = name.as_str();
    SENSITIVE_HEADERS.iter().any(|&s| lower == s)
}

async fn request_id_middleware(
    request: Request<Body>,
    next: axum::middleware::Next,
) -> Response {
    let request_id = uuid::Uuid::new_v4().to_string();
    let mut response = next.run(request).await;
    if !response.headers().contains_key("X-Request-Id") {
        if let Ok(value) = request_id.parse() {
            response.headers_mut().insert("X-Request-Id", value);
        }
    }
    response
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    handlers::health::init_start_time();

    if config.dashscope_api_key.is_empty() {
        tracing::warn!("DASHSCOPE_API_KEY is not set; captions fall back to mock text and synthesis returns placeholders");
    }

    let config = Arc::new(config);
    let dashscope = Arc::new(DashScopeClient::new(config.clone()));
    let fetcher = HttpFetcher::new(config.fetch_timeout(), &config.output_dir, &config.output_base_url);
    let store = OutputStore::new(&config.output_dir, &config.output_base_url).await?;
    let fonts = FontLibrary::load_dir(&config.font_dir, &config.default_font);

    let pipeline = GenerationPipeline::new(
        &config,
        Collaborators {
            understanding: dashscope.clone(),
            synthesis: dashscope,
            fetcher: Arc::new(fetcher),
            store: Arc::new(store),
        },
        Arc::new(fonts),
    );

    let shutdown = CancellationToken::new();
    let state = Arc::new(AppState {
        pipeline,
        shutdown: shutdown.clone(),
    });

    let cors_origins: Vec<_> = config.allowed_origins.iter()
        .filter_map(|o| o.parse().ok())
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(cors_origins)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, HeaderName::from_static("x-request-id")])
        .expose_headers([HeaderName::from_static("x-request-id")]);

    let meme_api = Router::new()
        .route("/generate", axum::routing::post(handlers::meme::generate))
        .route("/emotions", axum::routing::get(handlers::meme::list_emotions))
        .route("/filters", axum::routing::get(handlers::meme::list_filters))
        .route("/health", axum::routing::get(handlers::health::health_check));

    // Trace layer that redacts credential headers from log output
    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(|request: &Request<Body>| {
            let safe_headers: Vec<String> = request
                .headers()
                .iter()
                .map(|(name, value)| {
                    if is_sensitive_header(name) {
                        format!("{}=[REDACTED]", name)
                    } else {
                        format!("{}={}", name, value.to_str().unwrap_or(""))
                    }
                })
                .collect();

            tracing::info_span!(
                "http_request",
                method = %request.method(),
                uri = %request.uri(),
                headers = %safe_headers.join(", "),
            )
        })
        .on_response(|response: &Response, latency: std::time::Duration, _span: &Span| {
            tracing::info!(
                status = response.status().as_u16(),
                latency_ms = latency.as_millis() as u64,
                "response",
            );
        });

    // Multipart framing and the text fields need room beyond the image itself.
    let body_limit = config.max_upload_bytes as usize + 1024 * 1024;

    let mut app = Router::new().nest("/api/meme", meme_api);
    if config.output_base_url.len() > 1 && config.output_base_url.starts_with('/') {
        app = app.nest_service(&config.output_base_url, ServeDir::new(&config.output_dir));
    } else {
        tracing::info!(base_url = %config.output_base_url, "Output directory is served externally");
    }

    let app = app
        .layer(axum::extract::DefaultBodyLimit::max(body_limit))
        .layer(middleware::from_fn(request_id_middleware))
        .layer(trace_layer)
        .layer(cors)
        .with_state(state.clone());

    let addr = config.listen_addr.clone();
    tracing::info!(
        models = ?config.model_candidates().as_slice(),
        output_dir = %config.output_dir,
        "Starting server on {}", addr
    );

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown))
        .await?;

    Ok(())
}

async fn shutdown_signal(shutdown: CancellationToken) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received, cancelling in-flight generations...");
    shutdown.cancel();
}
