//! HTTP request handlers.
//!
//! Authentication and CSRF checks have already run in the route policy
//! filter by the time these execute; handlers only carry business logic.

use axum::{
    extract::State,
    http::{header::SET_COOKIE, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Extension, Json,
};

use crate::api::types::*;
use crate::auth::csrf::{self, CSRF_COOKIE};
use crate::auth::{cookie_value, AuthError, Principal, SESSION_COOKIE};
use crate::error::BridgeResult;
use crate::sync::TriggerKind;
use crate::AppState;

/// Receive a webhook payload from RapidPro.
///
/// POST /dhis2rapidpro/webhook
#[utoipa::path(
    post,
    path = "/dhis2rapidpro/webhook",
    responses(
        (status = 200, description = "Payload queued for delivery", body = WebhookResponse),
        (status = 401, description = "Missing or invalid webhook token")
    ),
    security(("webhook_token" = [])),
    tag = "webhook"
)]
pub async fn webhook(
    State(state): State<AppState>,
    Json(payload): Json<serde_json::Value>,
) -> BridgeResult<Json<WebhookResponse>> {
    state.sync.handle_webhook(payload).await?;

    Ok(Json(WebhookResponse {
        status: "queued".to_string(),
    }))
}

/// Trigger a contact/report synchronization run.
///
/// GET|POST /dhis2rapidpro/sync
#[utoipa::path(
    post,
    path = "/dhis2rapidpro/sync",
    responses(
        (status = 200, description = "Sync triggered", body = TriggerResponse),
        (status = 401, description = "Operator authentication required")
    ),
    tag = "triggers"
)]
pub async fn trigger_sync(
    State(state): State<AppState>,
    principal: Option<Extension<Principal>>,
) -> BridgeResult<Json<TriggerResponse>> {
    run_trigger(&state, TriggerKind::Sync, principal).await
}

/// Trigger a scan for overdue reports.
///
/// GET|POST /dhis2rapidpro/scan
#[utoipa::path(
    post,
    path = "/dhis2rapidpro/scan",
    responses(
        (status = 200, description = "Scan triggered", body = TriggerResponse),
        (status = 401, description = "Operator authentication required")
    ),
    tag = "triggers"
)]
pub async fn trigger_scan(
    State(state): State<AppState>,
    principal: Option<Extension<Principal>>,
) -> BridgeResult<Json<TriggerResponse>> {
    run_trigger(&state, TriggerKind::Scan, principal).await
}

/// Trigger reminder campaigns.
///
/// GET|POST /dhis2rapidpro/reminders
#[utoipa::path(
    post,
    path = "/dhis2rapidpro/reminders",
    responses(
        (status = 200, description = "Reminders triggered", body = TriggerResponse),
        (status = 401, description = "Operator authentication required")
    ),
    tag = "triggers"
)]
pub async fn trigger_reminders(
    State(state): State<AppState>,
    principal: Option<Extension<Principal>>,
) -> BridgeResult<Json<TriggerResponse>> {
    run_trigger(&state, TriggerKind::Reminders, principal).await
}

async fn run_trigger(
    state: &AppState,
    kind: TriggerKind,
    principal: Option<Extension<Principal>>,
) -> BridgeResult<Json<TriggerResponse>> {
    // The principal is absent when management auth is disabled in config
    if let Some(Extension(Principal::Operator(username))) = principal {
        tracing::info!(operator = %username, trigger = kind.as_str(), "Trigger requested");
    }

    let last_run_at = state.sync.trigger(kind).await?;

    Ok(Json(TriggerResponse {
        triggered: kind.as_str().to_string(),
        last_run_at,
    }))
}

/// Authenticate an operator and open a session.
///
/// POST /login
#[utoipa::path(
    post,
    path = "/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Session opened", body = LoginResponse),
        (status = 401, description = "Invalid credentials")
    ),
    tag = "auth"
)]
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Response {
    if state
        .users
        .authenticate(&request.username, &request.password)
        .is_none()
    {
        tracing::warn!(username = %request.username, "Login failed");
        return AuthError {
            error: "Unauthenticated".to_string(),
            code: "UNAUTHENTICATED".to_string(),
        }
        .into_response();
    }

    let session_id = state.sessions.create(&request.username).await;
    let csrf_token = csrf::issue_token();

    tracing::info!(username = %request.username, "Operator logged in");

    (
        [
            (
                SET_COOKIE,
                format!("{SESSION_COOKIE}={session_id}; Path=/; HttpOnly; SameSite=Lax"),
            ),
            // Readable by browser scripts for the double-submit echo
            (
                SET_COOKIE,
                format!("{CSRF_COOKIE}={csrf_token}; Path=/; SameSite=Lax"),
            ),
        ],
        Json(LoginResponse {
            username: request.username,
        }),
    )
        .into_response()
}

/// Close the operator session.
///
/// POST /logout
#[utoipa::path(
    post,
    path = "/logout",
    responses(
        (status = 200, description = "Session closed"),
        (status = 401, description = "Operator authentication required")
    ),
    tag = "auth"
)]
pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if let Some(session_id) = cookie_value(&headers, SESSION_COOKIE) {
        state.sessions.remove(&session_id).await;
    }

    (
        [(
            SET_COOKIE,
            format!("{SESSION_COOKIE}=; Path=/; HttpOnly; Max-Age=0"),
        )],
        StatusCode::OK,
    )
        .into_response()
}

/// Operator dashboard snapshot.
///
/// GET /management/dashboard
#[utoipa::path(
    get,
    path = "/management/dashboard",
    responses(
        (status = 200, description = "Dashboard snapshot", body = DashboardResponse),
        (status = 401, description = "Operator authentication required")
    ),
    tag = "management"
)]
pub async fn dashboard(State(state): State<AppState>) -> BridgeResult<Json<DashboardResponse>> {
    let last_run_at = state
        .repository
        .last_run_at()
        .await?
        .map(crate::sync::format_last_run_at);

    Ok(Json(DashboardResponse {
        status: "up".to_string(),
        last_run_at,
    }))
}

/// Health check.
///
/// GET /health
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service health", body = HealthResponse)
    ),
    tag = "health"
)]
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let database = match sqlx::query("SELECT 1").execute(state.repository.pool()).await {
        Ok(_) => "connected",
        Err(_) => "unavailable",
    };

    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        database: database.to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}
