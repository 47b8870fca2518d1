//! HTTP API gateway for Warmline.
//!
//! Exposes the chat endpoint plus the persona, credits, history, and
//! checkout surfaces. Callers identify themselves through headers:
//! `x-account-id` routes to durable SQLite state, `x-device-id` to
//! session-scoped memory, and a bare `/api/chat` request runs in the
//! stateless mode where the client owns its own history.
//!
//! Built on Axum.

pub mod api;

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::http::{HeaderName, HeaderValue};
use axum::{Router, routing::get};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::{info, warn};

use warmline_billing::CheckoutClient;
use warmline_config::AppConfig;
use warmline_core::CompanionModel;
use warmline_provider::CompletionClient;
use warmline_store::{SessionStore, SqliteStore};

/// Shared application state for the gateway.
///
/// Everything here is either immutable configuration or an `Arc` over a
/// store that carries its own synchronization, so the state itself needs
/// no lock.
pub struct GatewayState {
    pub config: AppConfig,
    /// `None` when no model credential is configured; chat requests then
    /// fail with a configuration error rather than a confusing upstream one.
    pub model: Option<Arc<dyn CompanionModel>>,
    /// `None` when no payment credential is configured.
    pub checkout: Option<CheckoutClient>,
    /// Session-scoped state for anonymous device principals.
    pub session: Arc<SessionStore>,
    /// Durable state for authenticated account principals.
    pub durable: Arc<SqliteStore>,
}

pub type SharedState = Arc<GatewayState>;

/// Build the Axum router with all gateway routes and middleware.
///
/// Layers applied:
/// - CORS: permissive when no origins are configured, else restricted to
///   the configured list
/// - Request body size limit (1 MB)
/// - HTTP trace logging
pub fn build_router(state: SharedState) -> Router {
    let cors = cors_layer(&state.config.gateway.allowed_origins);

    Router::new()
        .route("/health", get(health_handler))
        .merge(api::api_router(state))
        .layer(DefaultBodyLimit::max(1024 * 1024))
        .layer(cors)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    if allowed_origins.is_empty() {
        return CorsLayer::permissive();
    }
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring unparseable CORS origin");
                None
            }
        })
        .collect();
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([
            axum::http::Method::GET,
            axum::http::Method::POST,
            axum::http::Method::PUT,
            axum::http::Method::DELETE,
        ])
        .allow_headers([
            axum::http::header::CONTENT_TYPE,
            // Principal headers; without these a restricted-origin browser
            // can never reach the stateful routes.
            HeaderName::from_static("x-device-id"),
            HeaderName::from_static("x-account-id"),
        ])
}

/// Start the gateway HTTP server.
pub async fn start(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let host = config.gateway.host.clone();
    let port = config.gateway.port;
    let addr = format!("{host}:{port}");

    let model: Option<Arc<dyn CompanionModel>> = match CompletionClient::from_config(&config.model)
    {
        Some(client) => Some(Arc::new(client)),
        None => {
            warn!("No model API key configured — chat requests will be rejected");
            None
        }
    };

    let checkout = CheckoutClient::from_config(&config.billing);
    if checkout.is_none() {
        warn!("No payment secret key configured — checkout requests will be rejected");
    }

    let session = Arc::new(SessionStore::new());
    let durable = Arc::new(SqliteStore::new(&config.storage.sqlite_path).await?);

    let state = Arc::new(GatewayState {
        config,
        model,
        checkout,
        session,
        durable,
    });

    let app = build_router(state);

    info!(addr = %addr, "Gateway listening");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// --- Handlers ---

#[derive(serde::Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health_handler() -> axum::Json<HealthResponse> {
    axum::Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}
