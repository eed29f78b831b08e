//! # Attest HTTP API Module
//!
//! This module implements the JSON HTTP API server using axum.
//!
//! ## Endpoints
//!
//! - `GET /health` - Health check (no session)
//! - `POST /login` - Open a session (no session)
//! - `POST /logout`, `GET /session`
//! - `GET /dashboard` - Ledger counts and policy listing
//! - `GET|POST /policies`, `GET|PUT|DELETE /policies/{name}`
//! - `GET /policies/{name}/summary`
//! - `GET /users`, `POST /assignments`
//! - `GET /portal` - The caller's training
//! - `GET|POST /quiz/{module}`
//! - `GET /audit`
//! - `GET /roadmap`
//!
//! ## Security Configuration (Environment Variables)
//!
//! - `ATTEST_CORS_ORIGINS`: Comma-separated list of allowed origins, or "*" for all (default: localhost only)
//! - `ATTEST_RATE_LIMIT`: Requests per second (default: 0, disabled)

mod auth;
mod handlers;
mod middleware;
mod types;

pub use auth::{SessionContext, SessionStore, bearer_token};
pub use middleware::{create_rate_limiter, get_rate_limit_from_env};
pub use types::{
    ApiError, AssignRequest, AuditResponse, DashboardResponse, ErrorResponse, HealthResponse,
    LoginRequest, LoginResponse, LogoutResponse, MenuItem, PhaseJson, PolicyChangeResponse,
    PolicyListResponse, PolicyResponse, PortalItem, PortalResponse, QuizResponse,
    QuizResultResponse, QuizSubmitRequest, RoadmapResponse, SessionResponse, SummaryResponse,
    UpdatePolicyRequest, UploadPolicyRequest, UsersResponse, status_for,
};

use attest_core::{AttestError, PolicyStore, Summarizer, Tracker, primitives::MAX_POLICY_BYTES};
use axum::{
    Router,
    http::{HeaderValue, Method, header},
    middleware as axum_middleware,
    routing::{get, post},
};
use std::sync::Arc;
use tokio::sync::Mutex;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Largest accepted request body: a maximum-size document after JSON
/// escaping, plus the envelope. Oversized documents are rejected by
/// `validate_content` with a 400, not by the transport.
const MAX_BODY_BYTES: usize = 2 * MAX_POLICY_BYTES + 64 * 1024;

// =============================================================================
// SERVER STATE
// =============================================================================

/// Shared server state.
///
/// The ledger has a single writer: every request takes the tracker lock.
#[derive(Clone)]
pub struct AppState {
    pub tracker: Arc<Mutex<Tracker>>,
    pub store: Arc<dyn PolicyStore>,
    pub summarizer: Arc<dyn Summarizer>,
    pub sessions: SessionStore,
}

impl AppState {
    #[must_use]
    pub fn new(
        tracker: Tracker,
        store: Arc<dyn PolicyStore>,
        summarizer: Arc<dyn Summarizer>,
    ) -> Self {
        Self {
            tracker: Arc::new(Mutex::new(tracker)),
            store,
            summarizer,
            sessions: SessionStore::new(),
        }
    }
}

// =============================================================================
// CORS CONFIGURATION
// =============================================================================

const CORS_METHODS: [Method; 5] = [
    Method::GET,
    Method::POST,
    Method::PUT,
    Method::DELETE,
    Method::OPTIONS,
];

/// Build CORS layer from `ATTEST_CORS_ORIGINS`.
///
/// - `*`: any origin
/// - unset: localhost only
/// - otherwise: the comma-separated origins that parse
fn build_cors_layer() -> CorsLayer {
    let origins_env = std::env::var("ATTEST_CORS_ORIGINS").ok();

    match origins_env.as_deref() {
        Some("*") => {
            tracing::warn!(
                "CORS: Allowing ALL origins (ATTEST_CORS_ORIGINS=*). This is insecure for production!"
            );
            CorsLayer::permissive()
        }
        Some(origins) => {
            let allowed_origins: Vec<HeaderValue> = origins
                .split(',')
                .filter_map(|s| {
                    let trimmed = s.trim();
                    match trimmed.parse::<HeaderValue>() {
                        Ok(hv) => {
                            tracing::info!("CORS: Allowing origin: {}", trimmed);
                            Some(hv)
                        }
                        Err(e) => {
                            tracing::warn!("CORS: Invalid origin '{}': {}", trimmed, e);
                            None
                        }
                    }
                })
                .collect();

            if allowed_origins.is_empty() {
                tracing::warn!(
                    "CORS: No valid origins in ATTEST_CORS_ORIGINS, defaulting to localhost only"
                );
                build_localhost_cors()
            } else {
                CorsLayer::new()
                    .allow_origin(allowed_origins)
                    .allow_methods(CORS_METHODS)
                    .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
            }
        }
        None => {
            tracing::info!("CORS: No ATTEST_CORS_ORIGINS set, defaulting to localhost only");
            build_localhost_cors()
        }
    }
}

fn build_localhost_cors() -> CorsLayer {
    let origins: Vec<HeaderValue> = [
        "http://localhost:3000",
        "http://localhost:8080",
        "http://127.0.0.1:3000",
        "http://127.0.0.1:8080",
    ]
    .into_iter()
    .filter_map(|o| o.parse::<HeaderValue>().ok())
    .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(CORS_METHODS)
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}

// =============================================================================
// ROUTER CREATION
// =============================================================================

/// Create the axum router with all endpoints and middleware.
///
/// Middleware stack (outer to inner):
/// 1. Tracing - logs all requests
/// 2. CORS - handles preflight requests
/// 3. Body limit
/// 4. Rate Limiting (if enabled)
///
/// Session checks happen per handler through the `SessionContext` extractor.
pub fn create_router(state: AppState) -> Router {
    let rate_limit = get_rate_limit_from_env();
    let rate_limiter = create_rate_limiter(rate_limit);
    match &rate_limiter {
        Some(_) => tracing::info!("Rate limiting enabled: {} requests/second", rate_limit),
        None => tracing::info!("Rate limiting disabled"),
    }

    let mut router = Router::new()
        .route("/health", get(handlers::health_handler))
        .route("/login", post(handlers::login_handler))
        .route("/logout", post(handlers::logout_handler))
        .route("/session", get(handlers::session_handler))
        .route("/dashboard", get(handlers::dashboard_handler))
        .route(
            "/policies",
            get(handlers::list_policies_handler).post(handlers::upload_policy_handler),
        )
        .route(
            "/policies/{name}",
            get(handlers::get_policy_handler)
                .put(handlers::update_policy_handler)
                .delete(handlers::delete_policy_handler),
        )
        .route("/policies/{name}/summary", get(handlers::summary_handler))
        .route("/users", get(handlers::users_handler))
        .route("/assignments", post(handlers::assign_handler))
        .route("/portal", get(handlers::portal_handler))
        .route(
            "/quiz/{module}",
            get(handlers::quiz_handler).post(handlers::submit_quiz_handler),
        )
        .route("/audit", get(handlers::audit_handler))
        .route("/roadmap", get(handlers::roadmap_handler));

    if let Some(limiter) = rate_limiter {
        router = router.layer(axum_middleware::from_fn_with_state(
            limiter,
            middleware::rate_limit_middleware,
        ));
    }

    router
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(build_cors_layer())
                .layer(axum::extract::DefaultBodyLimit::max(MAX_BODY_BYTES)),
        )
        .with_state(state)
}

// =============================================================================
// SERVER STARTUP
// =============================================================================

/// Bind `addr` and serve until Ctrl+C.
pub async fn run_server(addr: &str, state: AppState) -> Result<(), AttestError> {
    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| AttestError::IoError(format!("Bind failed: {}", e)))?;

    tracing::info!(event = "listening", addr = %addr, "Attest HTTP server listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| AttestError::IoError(format!("Server error: {}", e)))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Cannot listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!(event = "shutdown", "Shutting down");
}
