//! # API Request/Response Types
//!
//! This module defines the JSON structures for the HTTP API, and the
//! mapping from `AttestError` to HTTP status codes.

use attest_core::{
    AttestError, AuditEntry, DashboardCounts, Page, PolicyInfo, QuestionView, QuizOutcome,
    RoadmapPhase, Role, TrainingAssignment, User,
};
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

// =============================================================================
// ERRORS
// =============================================================================

/// Error body returned by every failing endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// An `AttestError` on its way out of a handler.
#[derive(Debug)]
pub struct ApiError(pub AttestError);

impl From<AttestError> for ApiError {
    fn from(e: AttestError) -> Self {
        Self(e)
    }
}

/// HTTP status for each error class.
#[must_use]
pub fn status_for(error: &AttestError) -> StatusCode {
    match error {
        AttestError::InvalidPolicyName(_)
        | AttestError::InvalidPolicyContent(_)
        | AttestError::InvalidQuizSubmission(_)
        | AttestError::UnknownUser(_)
        | AttestError::SerializationError(_) => StatusCode::BAD_REQUEST,
        AttestError::InvalidCredentials => StatusCode::UNAUTHORIZED,
        AttestError::Forbidden { .. } => StatusCode::FORBIDDEN,
        AttestError::PolicyNotFound(_) | AttestError::AssignmentNotFound { .. } => {
            StatusCode::NOT_FOUND
        }
        AttestError::Storage(_) | AttestError::Summary(_) => StatusCode::BAD_GATEWAY,
        AttestError::Database(_)
        | AttestError::Migration(_)
        | AttestError::InvalidRecord(_)
        | AttestError::Config(_)
        | AttestError::IoError(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(&self.0);
        if status.is_server_error() {
            tracing::error!(event = "request_failed", status = status.as_u16(), error = %self.0, "Request failed");
        }
        (
            status,
            Json(ErrorResponse {
                error: self.0.to_string(),
            }),
        )
            .into_response()
    }
}

// =============================================================================
// HEALTH
// =============================================================================

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

impl Default for HealthResponse {
    fn default() -> Self {
        Self {
            status: "ok".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

// =============================================================================
// SESSIONS
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// One entry of the role's menu.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MenuItem {
    pub page: Page,
    pub title: String,
}

impl MenuItem {
    /// The menu shown to `role`.
    #[must_use]
    pub fn for_role(role: Role) -> Vec<Self> {
        role.menu()
            .into_iter()
            .map(|page| Self {
                page,
                title: page.title().to_string(),
            })
            .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    pub username: String,
    pub role: Role,
    pub menu: Vec<MenuItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionResponse {
    pub username: String,
    pub role: Role,
    pub menu: Vec<MenuItem>,
}

impl SessionResponse {
    #[must_use]
    pub fn for_user(user: &User) -> Self {
        Self {
            username: user.name.clone(),
            role: user.role,
            menu: MenuItem::for_role(user.role),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogoutResponse {
    pub success: bool,
}

// =============================================================================
// DASHBOARD
// =============================================================================

/// Ledger counts and the stored policies.
///
/// A listing failure does not fail the page: it is reported in
/// `policy_error` with an empty `policies`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardResponse {
    pub pending: u64,
    pub completed: u64,
    pub overdue: u64,
    pub policies: Vec<PolicyInfo>,
    pub policy_error: Option<String>,
}

impl DashboardResponse {
    #[must_use]
    pub fn new(counts: DashboardCounts, listing: Result<Vec<PolicyInfo>, AttestError>) -> Self {
        let (policies, policy_error) = match listing {
            Ok(policies) => (policies, None),
            Err(e) => (Vec::new(), Some(format!("Error fetching policies: {}", e))),
        };
        Self {
            pending: counts.pending,
            completed: counts.completed,
            overdue: counts.overdue,
            policies,
            policy_error,
        }
    }
}

// =============================================================================
// POLICIES
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyListResponse {
    pub policies: Vec<PolicyInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadPolicyRequest {
    pub name: String,
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdatePolicyRequest {
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyResponse {
    pub name: String,
    pub content: String,
}

/// Acknowledges an upload, edit or delete with the audit line written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyChangeResponse {
    pub name: String,
    pub audit_entry: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryResponse {
    pub name: String,
    pub summary: String,
    /// True when `summary` is the error placeholder.
    pub failed: bool,
}

// =============================================================================
// TRAINING
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignRequest {
    pub user: String,
    pub module: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsersResponse {
    pub users: Vec<User>,
}

/// A ledger row as shown in the user portal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortalItem {
    #[serde(flatten)]
    pub assignment: TrainingAssignment,
    pub overdue: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortalResponse {
    pub username: String,
    pub assignments: Vec<PortalItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizResponse {
    pub module: String,
    pub questions: Vec<QuestionView>,
    pub pass_score: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizSubmitRequest {
    pub answers: Vec<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizResultResponse {
    pub module: String,
    pub score: u8,
    pub total: u8,
    pub passed: bool,
    pub message: String,
}

impl QuizResultResponse {
    #[must_use]
    pub fn new(module: &str, outcome: QuizOutcome, pass_score: u8) -> Self {
        let message = if outcome.passed {
            format!(
                "Training completed with score {}/{}.",
                outcome.score, outcome.total
            )
        } else {
            format!(
                "Score {}/{} is below the pass mark of {}/{}. Review the policy and try again.",
                outcome.score, outcome.total, pass_score, outcome.total
            )
        };
        Self {
            module: module.to_string(),
            score: outcome.score,
            total: outcome.total,
            passed: outcome.passed,
            message,
        }
    }
}

// =============================================================================
// AUDIT & ROADMAP
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditResponse {
    pub entries: Vec<AuditEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseJson {
    pub phase: u8,
    pub title: String,
    pub done: bool,
}

impl From<&RoadmapPhase> for PhaseJson {
    fn from(phase: &RoadmapPhase) -> Self {
        Self {
            phase: phase.phase,
            title: phase.title.to_string(),
            done: phase.done,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoadmapResponse {
    pub phases: Vec<PhaseJson>,
}
