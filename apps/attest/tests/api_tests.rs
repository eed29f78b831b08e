//! Integration tests for the Attest HTTP API.
//!
//! Uses axum-test to drive the router without starting a real server.

// Allow unwrap and panic in tests - these are standard for test code
// Allow holding MutexGuard across await - tests are serialized to avoid env var conflicts
#![allow(clippy::unwrap_used, clippy::panic, clippy::await_holding_lock)]

use attest::api::{
    AppState, AuditResponse, DashboardResponse, ErrorResponse, HealthResponse, LoginResponse,
    LogoutResponse, PolicyChangeResponse, PolicyListResponse, PolicyResponse, PortalResponse,
    QuizResponse, QuizResultResponse, RoadmapResponse, SessionResponse, SummaryResponse,
    UsersResponse, create_router,
};
use attest_core::{
    AttestError, LeadSentenceSummarizer, MemoryPolicyStore, Page, PolicyInfo, PolicyName,
    PolicyStore, Role, StaticIdentityProvider, Summarizer, SummaryParams, TrainingAssignment,
    TrainingStatus, Tracker, primitives::MAX_POLICY_BYTES,
};
use axum::http::{HeaderName, HeaderValue, StatusCode, header};
use axum_test::TestServer;
use serde_json::json;
use std::sync::{Arc, Mutex};

/// Serializes tests since the router reads env vars at construction.
static ENV_TEST_MUTEX: Mutex<()> = Mutex::new(());

const POLICY: &str = "code-of-conduct.txt";
const POLICY_TEXT: &str = "Employees must report conflicts of interest. \
    Gifts above a nominal value must be declared to compliance. \
    Breaches are reviewed by the ethics committee.";

// =============================================================================
// TEST DOUBLES
// =============================================================================

/// A store whose every call fails, standing in for an unreachable container.
struct UnreachableStore;

impl PolicyStore for UnreachableStore {
    fn backend(&self) -> &'static str {
        "unreachable"
    }

    fn list(&self) -> Result<Vec<PolicyInfo>, AttestError> {
        Err(AttestError::Storage("connection refused".to_string()))
    }

    fn upload(&self, _name: &PolicyName, _content: &str) -> Result<(), AttestError> {
        Err(AttestError::Storage("connection refused".to_string()))
    }

    fn download(&self, _name: &PolicyName) -> Result<String, AttestError> {
        Err(AttestError::Storage("connection refused".to_string()))
    }

    fn delete(&self, _name: &PolicyName) -> Result<(), AttestError> {
        Err(AttestError::Storage("connection refused".to_string()))
    }
}

/// A model that is always down.
struct BrokenSummarizer;

impl Summarizer for BrokenSummarizer {
    fn backend(&self) -> &'static str {
        "broken"
    }

    fn summarize(&self, _text: &str, _params: &SummaryParams) -> Result<String, AttestError> {
        Err(AttestError::Summary("model unavailable".to_string()))
    }
}

// =============================================================================
// HELPER FUNCTIONS
// =============================================================================

/// Guard that holds the mutex and clears the env vars on drop.
struct TestGuard {
    _guard: std::sync::MutexGuard<'static, ()>,
}

impl Drop for TestGuard {
    fn drop(&mut self) {
        // SAFETY: Tests run sequentially under ENV_TEST_MUTEX, so no concurrent env access.
        unsafe {
            std::env::remove_var("ATTEST_RATE_LIMIT");
            std::env::remove_var("ATTEST_CORS_ORIGINS");
        }
    }
}

fn lock_env() -> TestGuard {
    let guard = ENV_TEST_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    // SAFETY: Tests run sequentially under ENV_TEST_MUTEX, so no concurrent env access.
    unsafe {
        std::env::remove_var("ATTEST_RATE_LIMIT");
        std::env::remove_var("ATTEST_CORS_ORIGINS");
    }
    TestGuard { _guard: guard }
}

fn server_with(
    store: Arc<dyn PolicyStore>,
    summarizer: Arc<dyn Summarizer>,
    guard: TestGuard,
) -> (TestServer, TestGuard) {
    let tracker = Tracker::in_memory(Arc::new(StaticIdentityProvider::default())).unwrap();
    let state = AppState::new(tracker, store, summarizer);
    (TestServer::new(create_router(state)).unwrap(), guard)
}

/// A server over an empty in-memory store and the lead-sentence summarizer.
fn create_test_server() -> (TestServer, TestGuard) {
    server_with(
        Arc::new(MemoryPolicyStore::new()),
        Arc::new(LeadSentenceSummarizer),
        lock_env(),
    )
}

fn bearer(token: &str) -> (HeaderName, HeaderValue) {
    (
        header::AUTHORIZATION,
        format!("Bearer {}", token).parse::<HeaderValue>().unwrap(),
    )
}

async fn login(server: &TestServer, username: &str, password: &str) -> String {
    let response = server
        .post("/login")
        .json(&json!({"username": username, "password": password}))
        .await;
    response.assert_status_ok();
    response.json::<LoginResponse>().token
}

async fn login_as(server: &TestServer, role: Role) -> String {
    match role {
        Role::Admin => login(server, "admin", "admin123").await,
        Role::Editor => login(server, "editor", "editor123").await,
        Role::Analyst => login(server, "analyst", "analyst123").await,
    }
}

async fn upload(server: &TestServer, token: &str, name: &str, content: &str) {
    let (name_h, value) = bearer(token);
    server
        .post("/policies")
        .add_header(name_h, value)
        .json(&json!({"name": name, "content": content}))
        .await
        .assert_status(StatusCode::CREATED);
}

async fn assign(server: &TestServer, token: &str, user: &str, module: &str) -> TrainingAssignment {
    let (name_h, value) = bearer(token);
    let response = server
        .post("/assignments")
        .add_header(name_h, value)
        .json(&json!({"user": user, "module": module}))
        .await;
    response.assert_status(StatusCode::CREATED);
    response.json()
}

async fn audit_lines(server: &TestServer, token: &str) -> Vec<String> {
    let (name_h, value) = bearer(token);
    let response = server.get("/audit").add_header(name_h, value).await;
    response.assert_status_ok();
    response
        .json::<AuditResponse>()
        .entries
        .into_iter()
        .map(|e| e.entry)
        .collect()
}

// =============================================================================
// HEALTH & SESSIONS
// =============================================================================

#[tokio::test]
async fn test_health_needs_no_session() {
    let (server, _guard) = create_test_server();

    let response = server.get("/health").await;

    response.assert_status_ok();
    let health: HealthResponse = response.json();
    assert_eq!(health.status, "ok");
}

#[tokio::test]
async fn test_login_returns_role_menu() {
    let (server, _guard) = create_test_server();

    let response = server
        .post("/login")
        .json(&json!({"username": "editor", "password": "editor123"}))
        .await;

    response.assert_status_ok();
    let login: LoginResponse = response.json();
    assert_eq!(login.username, "editor");
    assert_eq!(login.role, Role::Editor);
    assert!(!login.token.is_empty());
    let pages: Vec<Page> = login.menu.iter().map(|m| m.page).collect();
    assert!(pages.contains(&Page::UploadPolicies));
    assert!(!pages.contains(&Page::VisionRoadmap));
}

#[tokio::test]
async fn test_login_rejects_wrong_password() {
    let (server, _guard) = create_test_server();

    let response = server
        .post("/login")
        .json(&json!({"username": "admin", "password": "wrong"}))
        .await;

    response.assert_status_unauthorized();
    let error: ErrorResponse = response.json();
    assert_eq!(error.error, "Invalid credentials");
}

#[tokio::test]
async fn test_login_rejects_unknown_user() {
    let (server, _guard) = create_test_server();

    let response = server
        .post("/login")
        .json(&json!({"username": "mallory", "password": "admin123"}))
        .await;

    response.assert_status_unauthorized();
}

#[tokio::test]
async fn test_pages_require_a_session() {
    let (server, _guard) = create_test_server();

    for path in ["/dashboard", "/policies", "/portal", "/audit", "/session"] {
        let response = server.get(path).await;
        response.assert_status_unauthorized();
    }
}

#[tokio::test]
async fn test_unknown_token_is_rejected() {
    let (server, _guard) = create_test_server();
    let (name, value) = bearer("not-a-session");

    let response = server.get("/dashboard").add_header(name, value).await;

    response.assert_status_unauthorized();
}

#[tokio::test]
async fn test_session_reports_identity() {
    let (server, _guard) = create_test_server();
    let token = login_as(&server, Role::Analyst).await;
    let (name, value) = bearer(&token);

    let response = server.get("/session").add_header(name, value).await;

    response.assert_status_ok();
    let session: SessionResponse = response.json();
    assert_eq!(session.username, "analyst");
    assert_eq!(session.role, Role::Analyst);
    let pages: Vec<Page> = session.menu.iter().map(|m| m.page).collect();
    assert_eq!(
        pages,
        vec![
            Page::Dashboard,
            Page::SummaryAndTraining,
            Page::UserPortal,
            Page::AuditLog
        ]
    );
}

#[tokio::test]
async fn test_admin_menu_has_every_page() {
    let (server, _guard) = create_test_server();

    let response = server
        .post("/login")
        .json(&json!({"username": "admin", "password": "admin123"}))
        .await;

    let login: LoginResponse = response.json();
    assert_eq!(login.menu.len(), Page::ALL.len());
    assert_eq!(login.menu[5].title, "Vision & Roadmap");
}

#[tokio::test]
async fn test_logout_invalidates_token() {
    let (server, _guard) = create_test_server();
    let token = login_as(&server, Role::Editor).await;

    let (name, value) = bearer(&token);
    let response = server.post("/logout").add_header(name, value).await;
    response.assert_status_ok();
    assert!(response.json::<LogoutResponse>().success);

    let (name, value) = bearer(&token);
    server
        .get("/dashboard")
        .add_header(name, value)
        .await
        .assert_status_unauthorized();
}

// =============================================================================
// POLICIES
// =============================================================================

#[tokio::test]
async fn test_upload_lists_and_audits() {
    let (server, _guard) = create_test_server();
    let token = login_as(&server, Role::Editor).await;
    let (name, value) = bearer(&token);

    let response = server
        .post("/policies")
        .add_header(name, value)
        .json(&json!({"name": POLICY, "content": POLICY_TEXT}))
        .await;

    response.assert_status(StatusCode::CREATED);
    let change: PolicyChangeResponse = response.json();
    assert_eq!(change.audit_entry, format!("Uploaded policy: {}", POLICY));

    let (name, value) = bearer(&token);
    let listing: PolicyListResponse = server.get("/policies").add_header(name, value).await.json();
    assert_eq!(listing.policies.len(), 1);
    assert_eq!(listing.policies[0].name, POLICY);

    assert_eq!(
        audit_lines(&server, &token).await,
        vec![format!("Uploaded policy: {}", POLICY)]
    );
}

#[tokio::test]
async fn test_analyst_cannot_upload() {
    let (server, _guard) = create_test_server();
    let token = login_as(&server, Role::Analyst).await;
    let (name, value) = bearer(&token);

    let response = server
        .post("/policies")
        .add_header(name, value)
        .json(&json!({"name": POLICY, "content": POLICY_TEXT}))
        .await;

    response.assert_status_forbidden();
    assert!(audit_lines(&server, &token).await.is_empty());
}

#[tokio::test]
async fn test_upload_rejects_non_text_names() {
    let (server, _guard) = create_test_server();
    let token = login_as(&server, Role::Admin).await;

    for bad in ["report.pdf", "../escape.txt", ".txt", ""] {
        let (name, value) = bearer(&token);
        let response = server
            .post("/policies")
            .add_header(name, value)
            .json(&json!({"name": bad, "content": POLICY_TEXT}))
            .await;
        response.assert_status_bad_request();
    }
    assert!(audit_lines(&server, &token).await.is_empty());
}

#[tokio::test]
async fn test_upload_size_limit_is_enforced_by_validation() {
    let (server, _guard) = create_test_server();
    let token = login_as(&server, Role::Admin).await;

    let (name, value) = bearer(&token);
    server
        .post("/policies")
        .add_header(name, value)
        .json(&json!({"name": "largest.txt", "content": "x".repeat(MAX_POLICY_BYTES)}))
        .await
        .assert_status(StatusCode::CREATED);

    let (name, value) = bearer(&token);
    let response = server
        .post("/policies")
        .add_header(name, value)
        .json(&json!({"name": "too-large.txt", "content": "x".repeat(MAX_POLICY_BYTES + 1)}))
        .await;

    response.assert_status_bad_request();
    let error: ErrorResponse = response.json();
    assert!(error.error.starts_with("Invalid policy content"));
    assert_eq!(audit_lines(&server, &token).await.len(), 1);
}

#[tokio::test]
async fn test_get_policy_returns_text() {
    let (server, _guard) = create_test_server();
    let token = login_as(&server, Role::Admin).await;
    upload(&server, &token, POLICY, POLICY_TEXT).await;
    let analyst = login_as(&server, Role::Analyst).await;
    let (name, value) = bearer(&analyst);

    let response = server
        .get(&format!("/policies/{}", POLICY))
        .add_header(name, value)
        .await;

    response.assert_status_ok();
    let policy: PolicyResponse = response.json();
    assert_eq!(policy.content, POLICY_TEXT);
}

#[tokio::test]
async fn test_get_missing_policy_is_not_found() {
    let (server, _guard) = create_test_server();
    let token = login_as(&server, Role::Admin).await;
    let (name, value) = bearer(&token);

    server
        .get("/policies/missing.txt")
        .add_header(name, value)
        .await
        .assert_status_not_found();
}

#[tokio::test]
async fn test_edit_overwrites_and_audits() {
    let (server, _guard) = create_test_server();
    let token = login_as(&server, Role::Editor).await;
    upload(&server, &token, POLICY, POLICY_TEXT).await;
    let (name, value) = bearer(&token);

    let response = server
        .put(&format!("/policies/{}", POLICY))
        .add_header(name, value)
        .json(&json!({"content": "Revised text."}))
        .await;

    response.assert_status_ok();
    let (name, value) = bearer(&token);
    let policy: PolicyResponse = server
        .get(&format!("/policies/{}", POLICY))
        .add_header(name, value)
        .await
        .json();
    assert_eq!(policy.content, "Revised text.");
    assert_eq!(
        audit_lines(&server, &token).await,
        vec![
            format!("Edited policy: {}", POLICY),
            format!("Uploaded policy: {}", POLICY),
        ]
    );
}

#[tokio::test]
async fn test_edit_missing_policy_is_not_found() {
    let (server, _guard) = create_test_server();
    let token = login_as(&server, Role::Editor).await;
    let (name, value) = bearer(&token);

    let response = server
        .put("/policies/missing.txt")
        .add_header(name, value)
        .json(&json!({"content": "text"}))
        .await;

    response.assert_status_not_found();
    assert!(audit_lines(&server, &token).await.is_empty());
}

#[tokio::test]
async fn test_editor_cannot_delete() {
    let (server, _guard) = create_test_server();
    let token = login_as(&server, Role::Editor).await;
    upload(&server, &token, POLICY, POLICY_TEXT).await;
    let (name, value) = bearer(&token);

    let response = server
        .delete(&format!("/policies/{}", POLICY))
        .add_header(name, value)
        .await;

    response.assert_status_forbidden();
    let (name, value) = bearer(&token);
    let listing: PolicyListResponse = server.get("/policies").add_header(name, value).await.json();
    assert_eq!(listing.policies.len(), 1);
}

#[tokio::test]
async fn test_admin_delete_removes_and_audits() {
    let (server, _guard) = create_test_server();
    let token = login_as(&server, Role::Admin).await;
    upload(&server, &token, POLICY, POLICY_TEXT).await;
    let (name, value) = bearer(&token);

    let response = server
        .delete(&format!("/policies/{}", POLICY))
        .add_header(name, value)
        .await;

    response.assert_status_ok();
    let (name, value) = bearer(&token);
    let listing: PolicyListResponse = server.get("/policies").add_header(name, value).await.json();
    assert!(listing.policies.is_empty());
    assert_eq!(
        audit_lines(&server, &token).await[0],
        format!("Deleted policy: {}", POLICY)
    );
}

#[tokio::test]
async fn test_delete_missing_policy_is_not_found() {
    let (server, _guard) = create_test_server();
    let token = login_as(&server, Role::Admin).await;
    let (name, value) = bearer(&token);

    server
        .delete("/policies/missing.txt")
        .add_header(name, value)
        .await
        .assert_status_not_found();
    assert!(audit_lines(&server, &token).await.is_empty());
}

#[tokio::test]
async fn test_store_failure_is_bad_gateway_and_not_audited() {
    let (server, _guard) = server_with(
        Arc::new(UnreachableStore),
        Arc::new(LeadSentenceSummarizer),
        lock_env(),
    );
    let token = login_as(&server, Role::Admin).await;
    let (name, value) = bearer(&token);

    let response = server
        .post("/policies")
        .add_header(name, value)
        .json(&json!({"name": POLICY, "content": POLICY_TEXT}))
        .await;

    response.assert_status(StatusCode::BAD_GATEWAY);
    assert!(audit_lines(&server, &token).await.is_empty());
}

// =============================================================================
// SUMMARY
// =============================================================================

#[tokio::test]
async fn test_summary_uses_model() {
    let (server, _guard) = create_test_server();
    let token = login_as(&server, Role::Admin).await;
    upload(&server, &token, POLICY, POLICY_TEXT).await;
    let (name, value) = bearer(&token);

    let response = server
        .get(&format!("/policies/{}/summary", POLICY))
        .add_header(name, value)
        .await;

    response.assert_status_ok();
    let summary: SummaryResponse = response.json();
    assert!(!summary.failed);
    assert!(summary.summary.starts_with("Employees must report"));
}

#[tokio::test]
async fn test_summary_failure_yields_placeholder() {
    let (server, _guard) = server_with(
        Arc::new(MemoryPolicyStore::new()),
        Arc::new(BrokenSummarizer),
        lock_env(),
    );
    let token = login_as(&server, Role::Admin).await;
    upload(&server, &token, POLICY, POLICY_TEXT).await;
    let (name, value) = bearer(&token);

    let response = server
        .get(&format!("/policies/{}/summary", POLICY))
        .add_header(name, value)
        .await;

    response.assert_status_ok();
    let summary: SummaryResponse = response.json();
    assert!(summary.failed);
    assert!(summary.summary.starts_with("Error generating summary:"));
    assert!(summary.summary.contains("model unavailable"));
}

// =============================================================================
// DASHBOARD
// =============================================================================

#[tokio::test]
async fn test_dashboard_counts_assignments() {
    let (server, _guard) = create_test_server();
    let token = login_as(&server, Role::Admin).await;
    upload(&server, &token, POLICY, POLICY_TEXT).await;
    assign(&server, &token, "analyst", POLICY).await;
    assign(&server, &token, "editor", POLICY).await;
    let (name, value) = bearer(&token);

    let response = server.get("/dashboard").add_header(name, value).await;

    response.assert_status_ok();
    let dashboard: DashboardResponse = response.json();
    assert_eq!(dashboard.pending, 2);
    assert_eq!(dashboard.completed, 0);
    assert_eq!(dashboard.overdue, 0);
    assert_eq!(dashboard.policies.len(), 1);
    assert!(dashboard.policy_error.is_none());
}

#[tokio::test]
async fn test_dashboard_reports_listing_failure_inline() {
    let (server, _guard) = server_with(
        Arc::new(UnreachableStore),
        Arc::new(LeadSentenceSummarizer),
        lock_env(),
    );
    let token = login_as(&server, Role::Analyst).await;
    let (name, value) = bearer(&token);

    let response = server.get("/dashboard").add_header(name, value).await;

    response.assert_status_ok();
    let dashboard: DashboardResponse = response.json();
    assert!(dashboard.policies.is_empty());
    let error = dashboard.policy_error.unwrap();
    assert!(error.starts_with("Error fetching policies:"));
    assert!(error.contains("connection refused"));
}

// =============================================================================
// TRAINING
// =============================================================================

#[tokio::test]
async fn test_assign_sets_due_date_and_audits() {
    let (server, _guard) = create_test_server();
    let token = login_as(&server, Role::Editor).await;
    upload(&server, &token, POLICY, POLICY_TEXT).await;

    let assignment = assign(&server, &token, "analyst", POLICY).await;

    assert_eq!(assignment.user, "analyst");
    assert_eq!(assignment.role, Role::Analyst);
    assert_eq!(assignment.status, TrainingStatus::Pending);
    assert_eq!(assignment.score, 0);
    assert_eq!(
        assignment.due_date,
        assignment.assigned_at.date() + chrono::Days::new(7)
    );
    assert_eq!(
        audit_lines(&server, &token).await[0],
        format!("Assigned {} to analyst", POLICY)
    );
}

#[tokio::test]
async fn test_analyst_cannot_assign() {
    let (server, _guard) = create_test_server();
    let admin = login_as(&server, Role::Admin).await;
    upload(&server, &admin, POLICY, POLICY_TEXT).await;
    let analyst = login_as(&server, Role::Analyst).await;
    let (name, value) = bearer(&analyst);

    server
        .post("/assignments")
        .add_header(name, value)
        .json(&json!({"user": "analyst", "module": POLICY}))
        .await
        .assert_status_forbidden();
}

#[tokio::test]
async fn test_assign_requires_known_user_and_stored_policy() {
    let (server, _guard) = create_test_server();
    let token = login_as(&server, Role::Admin).await;
    upload(&server, &token, POLICY, POLICY_TEXT).await;

    let (name, value) = bearer(&token);
    server
        .post("/assignments")
        .add_header(name, value)
        .json(&json!({"user": "nobody", "module": POLICY}))
        .await
        .assert_status_bad_request();

    let (name, value) = bearer(&token);
    server
        .post("/assignments")
        .add_header(name, value)
        .json(&json!({"user": "analyst", "module": "missing.txt"}))
        .await
        .assert_status_not_found();

    assert_eq!(audit_lines(&server, &token).await.len(), 1);
}

#[tokio::test]
async fn test_users_lists_assignees() {
    let (server, _guard) = create_test_server();
    let token = login_as(&server, Role::Editor).await;
    let (name, value) = bearer(&token);

    let response = server.get("/users").add_header(name, value).await;

    response.assert_status_ok();
    let users: UsersResponse = response.json();
    let names: Vec<_> = users.users.into_iter().map(|u| u.name).collect();
    assert_eq!(names, vec!["admin", "analyst", "editor"]);
}

#[tokio::test]
async fn test_portal_shows_only_own_rows() {
    let (server, _guard) = create_test_server();
    let admin = login_as(&server, Role::Admin).await;
    upload(&server, &admin, POLICY, POLICY_TEXT).await;
    assign(&server, &admin, "analyst", POLICY).await;
    assign(&server, &admin, "editor", POLICY).await;
    let analyst = login_as(&server, Role::Analyst).await;
    let (name, value) = bearer(&analyst);

    let response = server.get("/portal").add_header(name, value).await;

    response.assert_status_ok();
    let portal: PortalResponse = response.json();
    assert_eq!(portal.username, "analyst");
    assert_eq!(portal.assignments.len(), 1);
    assert_eq!(portal.assignments[0].assignment.module, POLICY);
    assert!(!portal.assignments[0].overdue);
}

#[tokio::test]
async fn test_quiz_requires_pending_assignment() {
    let (server, _guard) = create_test_server();
    let token = login_as(&server, Role::Analyst).await;

    let (name, value) = bearer(&token);
    server
        .get(&format!("/quiz/{}", POLICY))
        .add_header(name, value)
        .await
        .assert_status_not_found();

    let (name, value) = bearer(&token);
    server
        .post(&format!("/quiz/{}", POLICY))
        .add_header(name, value)
        .json(&json!({"answers": [1, 2, 3]}))
        .await
        .assert_status_not_found();
}

#[tokio::test]
async fn test_quiz_hides_answers() {
    let (server, _guard) = create_test_server();
    let admin = login_as(&server, Role::Admin).await;
    upload(&server, &admin, POLICY, POLICY_TEXT).await;
    assign(&server, &admin, "analyst", POLICY).await;
    let analyst = login_as(&server, Role::Analyst).await;
    let (name, value) = bearer(&analyst);

    let response = server
        .get(&format!("/quiz/{}", POLICY))
        .add_header(name, value)
        .await;

    response.assert_status_ok();
    assert!(!response.text().contains("correct"));
    let quiz: QuizResponse = response.json();
    assert_eq!(quiz.questions.len(), 3);
    assert_eq!(quiz.pass_score, 2);
}

#[tokio::test]
async fn test_failed_quiz_keeps_training_pending() {
    let (server, _guard) = create_test_server();
    let admin = login_as(&server, Role::Admin).await;
    upload(&server, &admin, POLICY, POLICY_TEXT).await;
    assign(&server, &admin, "analyst", POLICY).await;
    let analyst = login_as(&server, Role::Analyst).await;
    let (name, value) = bearer(&analyst);

    let response = server
        .post(&format!("/quiz/{}", POLICY))
        .add_header(name, value)
        .json(&json!({"answers": [1, 0, 0]}))
        .await;

    response.assert_status_ok();
    let result: QuizResultResponse = response.json();
    assert!(!result.passed);
    assert_eq!(result.score, 1);
    assert!(result.message.contains("below the pass mark"));

    let (name, value) = bearer(&analyst);
    let portal: PortalResponse = server.get("/portal").add_header(name, value).await.json();
    assert_eq!(portal.assignments[0].assignment.status, TrainingStatus::Pending);
    assert_eq!(audit_lines(&server, &admin).await.len(), 2);
}

#[tokio::test]
async fn test_passed_quiz_completes_training() {
    let (server, _guard) = create_test_server();
    let admin = login_as(&server, Role::Admin).await;
    upload(&server, &admin, POLICY, POLICY_TEXT).await;
    assign(&server, &admin, "analyst", POLICY).await;
    let analyst = login_as(&server, Role::Analyst).await;
    let (name, value) = bearer(&analyst);

    let response = server
        .post(&format!("/quiz/{}", POLICY))
        .add_header(name, value)
        .json(&json!({"answers": [1, 2, 0]}))
        .await;

    response.assert_status_ok();
    let result: QuizResultResponse = response.json();
    assert!(result.passed);
    assert_eq!((result.score, result.total), (2, 3));
    assert_eq!(result.message, "Training completed with score 2/3.");

    let (name, value) = bearer(&analyst);
    let portal: PortalResponse = server.get("/portal").add_header(name, value).await.json();
    assert_eq!(portal.assignments[0].assignment.status, TrainingStatus::Completed);
    assert_eq!(portal.assignments[0].assignment.score, 2);

    assert_eq!(
        audit_lines(&server, &admin).await[0],
        format!("analyst completed {} with score 2/3", POLICY)
    );

    let (name, value) = bearer(&admin);
    let dashboard: DashboardResponse = server.get("/dashboard").add_header(name, value).await.json();
    assert_eq!((dashboard.pending, dashboard.completed), (0, 1));
}

#[tokio::test]
async fn test_wrong_answer_count_is_bad_request() {
    let (server, _guard) = create_test_server();
    let admin = login_as(&server, Role::Admin).await;
    upload(&server, &admin, POLICY, POLICY_TEXT).await;
    assign(&server, &admin, "analyst", POLICY).await;
    let analyst = login_as(&server, Role::Analyst).await;
    let (name, value) = bearer(&analyst);

    server
        .post(&format!("/quiz/{}", POLICY))
        .add_header(name, value)
        .json(&json!({"answers": [1, 2]}))
        .await
        .assert_status_bad_request();
}

// =============================================================================
// ROADMAP
// =============================================================================

#[tokio::test]
async fn test_roadmap_is_admin_only() {
    let (server, _guard) = create_test_server();

    for role in [Role::Editor, Role::Analyst] {
        let token = login_as(&server, role).await;
        let (name, value) = bearer(&token);
        server
            .get("/roadmap")
            .add_header(name, value)
            .await
            .assert_status_forbidden();
    }

    let token = login_as(&server, Role::Admin).await;
    let (name, value) = bearer(&token);
    let response = server.get("/roadmap").add_header(name, value).await;
    response.assert_status_ok();
    let roadmap: RoadmapResponse = response.json();
    assert_eq!(roadmap.phases.len(), 7);
    assert_eq!(roadmap.phases.iter().filter(|p| p.done).count(), 4);
}

// =============================================================================
// MIDDLEWARE
// =============================================================================

#[tokio::test]
async fn test_rate_limit_returns_429() {
    let guard = lock_env();
    // SAFETY: Tests run sequentially under ENV_TEST_MUTEX, so no concurrent env access.
    unsafe { std::env::set_var("ATTEST_RATE_LIMIT", "1") };
    let (server, _guard) = server_with(
        Arc::new(MemoryPolicyStore::new()),
        Arc::new(LeadSentenceSummarizer),
        guard,
    );

    server.get("/health").await.assert_status_ok();
    let response = server.get("/health").await;

    response.assert_status(StatusCode::TOO_MANY_REQUESTS);
    let error: ErrorResponse = response.json();
    assert_eq!(error.error, "Too Many Requests");
}

#[tokio::test]
async fn test_cors_allows_configured_origin() {
    let guard = lock_env();
    // SAFETY: Tests run sequentially under ENV_TEST_MUTEX, so no concurrent env access.
    unsafe { std::env::set_var("ATTEST_CORS_ORIGINS", "https://compliance.example.com") };
    let (server, _guard) = server_with(
        Arc::new(MemoryPolicyStore::new()),
        Arc::new(LeadSentenceSummarizer),
        guard,
    );

    let response = server
        .get("/health")
        .add_header(
            header::ORIGIN,
            "https://compliance.example.com"
                .parse::<HeaderValue>()
                .unwrap(),
        )
        .await;

    response.assert_status_ok();
    assert_eq!(
        response.header(header::ACCESS_CONTROL_ALLOW_ORIGIN),
        "https://compliance.example.com"
    );
}
