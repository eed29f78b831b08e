//! # Authentication Module
//!
//! Session tokens for the Attest HTTP API.
//!
//! `POST /login` exchanges a username/password pair for an opaque token.
//! Every other endpoint except `/health` requires it:
//!
//! ```text
//! Authorization: Bearer <token>
//! ```
//!
//! Handlers receive the caller as a `SessionContext` extractor. Sessions
//! close on logout or after `SESSION_IDLE_TTL` without a request.

use super::AppState;
use super::types::ErrorResponse;
use attest_core::User;
use axum::{
    Json,
    extract::FromRequestParts,
    http::{StatusCode, header, request::Parts},
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

// =============================================================================
// SESSION STORE
// =============================================================================

/// Sessions unused for this long are closed (8 hours).
pub const SESSION_IDLE_TTL: Duration = Duration::from_secs(8 * 60 * 60);

#[derive(Debug, Clone)]
struct Session {
    user: User,
    last_seen: Instant,
}

/// Open sessions, keyed by token.
///
/// A session expires after `idle_ttl` without a request. Expired sessions
/// are dropped when next resolved and swept on every login.
#[derive(Debug, Clone)]
pub struct SessionStore {
    sessions: Arc<RwLock<HashMap<String, Session>>>,
    idle_ttl: Duration,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::with_idle_ttl(SESSION_IDLE_TTL)
    }
}

impl SessionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_idle_ttl(idle_ttl: Duration) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            idle_ttl,
        }
    }

    /// Open a session for `user` and return its token.
    pub async fn open(&self, user: User) -> String {
        let token = uuid::Uuid::new_v4().to_string();
        let now = Instant::now();
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, s| now.duration_since(s.last_seen) < self.idle_ttl);
        let expired = before - sessions.len();
        if expired > 0 {
            tracing::debug!(event = "sessions_expired", count = expired, "Expired idle sessions");
        }
        sessions.insert(
            token.clone(),
            Session {
                user,
                last_seen: now,
            },
        );
        token
    }

    /// The user behind `token`, if the session is open and not idle too long.
    /// A successful lookup refreshes the idle timer.
    pub async fn resolve(&self, token: &str) -> Option<User> {
        let now = Instant::now();
        let mut sessions = self.sessions.write().await;
        let session = sessions.get_mut(token)?;
        if now.duration_since(session.last_seen) >= self.idle_ttl {
            sessions.remove(token);
            return None;
        }
        session.last_seen = now;
        Some(session.user.clone())
    }

    /// Close a session. Returns whether it was open.
    pub async fn close(&self, token: &str) -> bool {
        self.sessions.write().await.remove(token).is_some()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

// =============================================================================
// EXTRACTOR
// =============================================================================

/// The authenticated caller of a request.
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub token: String,
    pub user: User,
}

/// Token from an `Authorization: Bearer <token>` header value.
pub fn bearer_token(value: &str) -> Option<&str> {
    let token = value.strip_prefix("Bearer ")?.trim();
    (!token.is_empty()).then_some(token)
}

fn unauthorized(reason: &'static str, message: &str) -> (StatusCode, Json<ErrorResponse>) {
    tracing::warn!(event = "auth_failure", reason = reason, "{}", message);
    (
        StatusCode::UNAUTHORIZED,
        Json(ErrorResponse {
            error: message.to_string(),
        }),
    )
}

impl FromRequestParts<AppState> for SessionContext {
    type Rejection = (StatusCode, Json<ErrorResponse>);

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header_value = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                unauthorized("missing_authorization_header", "Missing Authorization header")
            })?;

        let token = bearer_token(header_value)
            .ok_or_else(|| unauthorized("malformed_authorization_header", "Expected a Bearer token"))?;

        match state.sessions.resolve(token).await {
            Some(user) => Ok(Self {
                token: token.to_string(),
                user,
            }),
            None => Err(unauthorized("unknown_session", "Session expired or invalid")),
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
