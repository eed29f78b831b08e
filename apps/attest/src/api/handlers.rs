//! # API Endpoint Handlers
//!
//! One handler per page action. Every handler follows the same flow:
//! resolve the session, check the role, touch the ledger or the store,
//! respond. Store and model calls run on the blocking pool.

use super::{
    AppState,
    auth::SessionContext,
    types::{
        ApiError, AssignRequest, AuditResponse, DashboardResponse, HealthResponse, LoginRequest,
        LoginResponse, LogoutResponse, MenuItem, PhaseJson, PolicyChangeResponse,
        PolicyListResponse, PolicyResponse, PortalItem, PortalResponse, QuizResponse,
        QuizResultResponse, QuizSubmitRequest, RoadmapResponse, SessionResponse,
        SummaryResponse, UpdatePolicyRequest, UploadPolicyRequest, UsersResponse,
    },
};
use attest_core::{
    Action, AttestError, PolicyChange, PolicyName, ROADMAP, Summary, Tracker, User,
    primitives::{QUIZ_PASS_SCORE, SUMMARY_ERROR_PREFIX},
    require_existing, summarize_or_placeholder, validate_content,
};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::{Local, NaiveDate, NaiveDateTime};

type ApiResult<T> = Result<T, ApiError>;

// =============================================================================
// HELPERS
// =============================================================================

fn now() -> NaiveDateTime {
    Local::now().naive_local()
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// Run a blocking store call off the async executor.
async fn blocking<T, F>(f: F) -> Result<T, AttestError>
where
    F: FnOnce() -> Result<T, AttestError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| AttestError::IoError(format!("blocking task failed: {}", e)))?
}

/// Check that `user` may perform `action`, logging refusals.
fn authorize(user: &User, action: Action) -> Result<(), AttestError> {
    Tracker::authorize(user, action).inspect_err(|_| {
        tracing::warn!(
            event = "forbidden",
            user = %user.name,
            role = %user.role,
            action = %action,
            "Action refused"
        );
    })
}

// =============================================================================
// HEALTH & SESSIONS
// =============================================================================

/// Health check endpoint.
pub async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse::default())
}

/// Exchange credentials for a session token.
pub async fn login_handler(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> ApiResult<Json<LoginResponse>> {
    let user = {
        let tracker = state.tracker.lock().await;
        tracker.authenticate(&request.username, &request.password)
    }
    .inspect_err(|_| {
        tracing::warn!(event = "login_failed", username = %request.username, "Invalid credentials");
    })?;

    let token = state.sessions.open(user.clone()).await;
    tracing::info!(event = "login", user = %user.name, role = %user.role, "Session opened");

    Ok(Json(LoginResponse {
        token,
        menu: MenuItem::for_role(user.role),
        username: user.name,
        role: user.role,
    }))
}

pub async fn logout_handler(
    State(state): State<AppState>,
    ctx: SessionContext,
) -> impl IntoResponse {
    let closed = state.sessions.close(&ctx.token).await;
    tracing::info!(event = "logout", user = %ctx.user.name, "Session closed");
    Json(LogoutResponse { success: closed })
}

/// Current identity, role and menu.
pub async fn session_handler(ctx: SessionContext) -> impl IntoResponse {
    Json(SessionResponse::for_user(&ctx.user))
}

// =============================================================================
// DASHBOARD
// =============================================================================

/// Ledger counts plus the policy listing.
///
/// Listing failures are reported inline; ledger failures fail the request.
pub async fn dashboard_handler(
    State(state): State<AppState>,
    _ctx: SessionContext,
) -> ApiResult<Json<DashboardResponse>> {
    let counts = state.tracker.lock().await.dashboard(today())?;

    let store = state.store.clone();
    let listing = blocking(move || store.list()).await;
    if let Err(e) = &listing {
        tracing::warn!(event = "policy_list_failed", error = %e, "Policy listing failed");
    }

    Ok(Json(DashboardResponse::new(counts, listing)))
}

// =============================================================================
// POLICIES
// =============================================================================

pub async fn list_policies_handler(
    State(state): State<AppState>,
    _ctx: SessionContext,
) -> ApiResult<Json<PolicyListResponse>> {
    let store = state.store.clone();
    let policies = blocking(move || store.list()).await?;
    Ok(Json(PolicyListResponse { policies }))
}

/// Upload a new policy, or overwrite an existing one with the same name.
pub async fn upload_policy_handler(
    State(state): State<AppState>,
    ctx: SessionContext,
    Json(request): Json<UploadPolicyRequest>,
) -> ApiResult<impl IntoResponse> {
    authorize(&ctx.user, PolicyChange::Uploaded.action())?;
    let name = PolicyName::parse(request.name)?;
    validate_content(&request.content)?;

    let store = state.store.clone();
    let target = name.clone();
    blocking(move || store.upload(&target, &request.content)).await?;

    let entry = state.tracker.lock().await.record_policy_change(
        &ctx.user,
        PolicyChange::Uploaded,
        &name,
        now(),
    )?;
    tracing::info!(event = "policy_uploaded", user = %ctx.user.name, policy = %name, "Policy uploaded");

    Ok((
        StatusCode::CREATED,
        Json(PolicyChangeResponse {
            name: name.to_string(),
            audit_entry: entry.entry,
        }),
    ))
}

/// Full text of a policy.
pub async fn get_policy_handler(
    State(state): State<AppState>,
    _ctx: SessionContext,
    Path(name): Path<String>,
) -> ApiResult<Json<PolicyResponse>> {
    let name = PolicyName::parse(name)?;
    let store = state.store.clone();
    let target = name.clone();
    let content = blocking(move || store.download(&target)).await?;
    Ok(Json(PolicyResponse {
        name: name.to_string(),
        content,
    }))
}

/// Overwrite an existing policy with edited text.
pub async fn update_policy_handler(
    State(state): State<AppState>,
    ctx: SessionContext,
    Path(name): Path<String>,
    Json(request): Json<UpdatePolicyRequest>,
) -> ApiResult<Json<PolicyChangeResponse>> {
    authorize(&ctx.user, PolicyChange::Edited.action())?;
    let name = PolicyName::parse(name)?;
    validate_content(&request.content)?;

    let store = state.store.clone();
    let target = name.clone();
    blocking(move || {
        require_existing(store.as_ref(), &target)?;
        store.upload(&target, &request.content)
    })
    .await?;

    let entry = state.tracker.lock().await.record_policy_change(
        &ctx.user,
        PolicyChange::Edited,
        &name,
        now(),
    )?;
    tracing::info!(event = "policy_edited", user = %ctx.user.name, policy = %name, "Policy edited");

    Ok(Json(PolicyChangeResponse {
        name: name.to_string(),
        audit_entry: entry.entry,
    }))
}

/// Delete a policy (Admin only).
pub async fn delete_policy_handler(
    State(state): State<AppState>,
    ctx: SessionContext,
    Path(name): Path<String>,
) -> ApiResult<Json<PolicyChangeResponse>> {
    authorize(&ctx.user, PolicyChange::Deleted.action())?;
    let name = PolicyName::parse(name)?;

    let store = state.store.clone();
    let target = name.clone();
    blocking(move || store.delete(&target)).await?;

    let entry = state.tracker.lock().await.record_policy_change(
        &ctx.user,
        PolicyChange::Deleted,
        &name,
        now(),
    )?;
    tracing::info!(event = "policy_deleted", user = %ctx.user.name, policy = %name, "Policy deleted");

    Ok(Json(PolicyChangeResponse {
        name: name.to_string(),
        audit_entry: entry.entry,
    }))
}

/// Summary of a policy. Model failures yield the placeholder, not an error.
pub async fn summary_handler(
    State(state): State<AppState>,
    _ctx: SessionContext,
    Path(name): Path<String>,
) -> ApiResult<Json<SummaryResponse>> {
    let name = PolicyName::parse(name)?;
    let store = state.store.clone();
    let target = name.clone();
    let content = blocking(move || store.download(&target)).await?;

    let summarizer = state.summarizer.clone();
    let summary = tokio::task::spawn_blocking(move || {
        summarize_or_placeholder(summarizer.as_ref(), &content)
    })
    .await
    .unwrap_or_else(|e| Summary {
        text: format!("{}: {}", SUMMARY_ERROR_PREFIX, e),
        failed: true,
    });

    if summary.failed {
        tracing::warn!(
            event = "summary_failed",
            policy = %name,
            backend = state.summarizer.backend(),
            reason = %summary.text,
            "Summarization failed"
        );
    }

    Ok(Json(SummaryResponse {
        name: name.to_string(),
        summary: summary.text,
        failed: summary.failed,
    }))
}

// =============================================================================
// TRAINING
// =============================================================================

/// Identities that training can be assigned to.
pub async fn users_handler(
    State(state): State<AppState>,
    ctx: SessionContext,
) -> ApiResult<Json<UsersResponse>> {
    authorize(&ctx.user, Action::AssignTraining)?;
    let users = state.tracker.lock().await.users();
    Ok(Json(UsersResponse { users }))
}

/// Assign a stored policy to a user as a training module.
pub async fn assign_handler(
    State(state): State<AppState>,
    ctx: SessionContext,
    Json(request): Json<AssignRequest>,
) -> ApiResult<impl IntoResponse> {
    authorize(&ctx.user, Action::AssignTraining)?;
    let module = PolicyName::parse(request.module)?;

    let store = state.store.clone();
    let target = module.clone();
    blocking(move || require_existing(store.as_ref(), &target)).await?;

    let assignment = state.tracker.lock().await.assign_training(
        &ctx.user,
        &request.user,
        &module,
        now(),
    )?;
    tracing::info!(
        event = "training_assigned",
        by = %ctx.user.name,
        user = %assignment.user,
        module = %assignment.module,
        due = %assignment.due_date,
        "Training assigned"
    );

    Ok((StatusCode::CREATED, Json(assignment)))
}

/// The caller's own assignments.
pub async fn portal_handler(
    State(state): State<AppState>,
    ctx: SessionContext,
) -> ApiResult<Json<PortalResponse>> {
    let rows = state.tracker.lock().await.assignments_for(&ctx.user.name)?;
    let today = today();
    let assignments = rows
        .into_iter()
        .map(|assignment| PortalItem {
            overdue: assignment.is_overdue(today),
            assignment,
        })
        .collect();
    Ok(Json(PortalResponse {
        username: ctx.user.name,
        assignments,
    }))
}

/// Questions for a module the caller has pending.
pub async fn quiz_handler(
    State(state): State<AppState>,
    ctx: SessionContext,
    Path(module): Path<String>,
) -> ApiResult<Json<QuizResponse>> {
    let module = PolicyName::parse(module)?;
    let quiz = state.tracker.lock().await.quiz(&ctx.user, &module)?;
    Ok(Json(QuizResponse {
        module: module.to_string(),
        questions: quiz.view(),
        pass_score: QUIZ_PASS_SCORE,
    }))
}

/// Grade the caller's answers; a pass completes the training.
pub async fn submit_quiz_handler(
    State(state): State<AppState>,
    ctx: SessionContext,
    Path(module): Path<String>,
    Json(request): Json<QuizSubmitRequest>,
) -> ApiResult<Json<QuizResultResponse>> {
    let module = PolicyName::parse(module)?;
    let submission =
        state
            .tracker
            .lock()
            .await
            .submit_quiz(&ctx.user, &module, &request.answers, now())?;

    let outcome = submission.outcome;
    if outcome.passed {
        tracing::info!(
            event = "training_completed",
            user = %ctx.user.name,
            module = %module,
            score = outcome.score,
            rows = submission.completed,
            "Training completed"
        );
    } else {
        tracing::info!(
            event = "quiz_failed",
            user = %ctx.user.name,
            module = %module,
            score = outcome.score,
            "Quiz below pass mark"
        );
    }

    Ok(Json(QuizResultResponse::new(
        module.as_str(),
        outcome,
        QUIZ_PASS_SCORE,
    )))
}

// =============================================================================
// AUDIT & ROADMAP
// =============================================================================

/// The audit trail, newest first.
pub async fn audit_handler(
    State(state): State<AppState>,
    _ctx: SessionContext,
) -> ApiResult<Json<AuditResponse>> {
    let entries = state.tracker.lock().await.audit_trail()?;
    Ok(Json(AuditResponse { entries }))
}

pub async fn roadmap_handler(ctx: SessionContext) -> ApiResult<Json<RoadmapResponse>> {
    authorize(&ctx.user, Action::ViewRoadmap)?;
    Ok(Json(RoadmapResponse {
        phases: ROADMAP.iter().map(PhaseJson::from).collect(),
    }))
}
