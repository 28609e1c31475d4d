//! Request filter enforcing the route access policy.
//!
//! Every request is classified once against the policy, then checked against
//! the scheme the matched rule demands. Authentication failures are terminal
//! here: they produce a rejection response and never reach business logic.
//! The webhook token check deliberately runs before any operator credential
//! handling so the webhook path can never fall through to session auth.

use axum::{
    body::Body,
    extract::{Request, State},
    http::{header::AUTHORIZATION, header::WWW_AUTHENTICATE, HeaderMap, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::api::policy::{AuthScheme, CsrfMode};
use crate::auth::csrf;
use crate::auth::session::{cookie_value, decode_basic_credentials, SESSION_COOKIE};
use crate::auth::token::{digests_match, hash_secret};
use crate::AppState;

/// The principal a request was authenticated as, stored in extensions.
#[derive(Debug, Clone)]
pub enum Principal {
    /// An operator authenticated via session or basic auth.
    Operator(String),
    /// The RapidPro webhook caller, authenticated via the token scheme.
    Webhook,
}

/// Error response for authentication failures.
#[derive(Debug, Serialize)]
pub struct AuthError {
    pub error: String,
    pub code: String,
}

impl AuthError {
    /// The single rejection used for missing and mismatched credentials
    /// alike, so the two cases are indistinguishable to the caller.
    fn unauthenticated() -> Self {
        Self {
            error: "Unauthenticated".to_string(),
            code: "UNAUTHENTICATED".to_string(),
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        (StatusCode::UNAUTHORIZED, Json(self)).into_response()
    }
}

/// 401 with a basic-auth challenge, so a browser or curl prompts for
/// credentials instead of receiving a silent rejection.
fn challenge_response() -> Response {
    let mut response = AuthError::unauthenticated().into_response();
    response.headers_mut().insert(
        WWW_AUTHENTICATE,
        HeaderValue::from_static("Basic realm=\"dhis2rapidpro\""),
    );
    response
}

fn csrf_rejection() -> Response {
    (
        StatusCode::FORBIDDEN,
        Json(AuthError {
            error: "Missing or invalid CSRF token".to_string(),
            code: "CSRF_REJECTED".to_string(),
        }),
    )
        .into_response()
}

/// Classify the request and enforce the matched rule.
pub async fn enforce_route_policy(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let rule = state.policy.classify(request.uri().path()).clone();

    let principal = match rule.scheme {
        AuthScheme::None => None,
        AuthScheme::Token => match verify_webhook_token(&state, request.headers()).await {
            Ok(()) => Some(Principal::Webhook),
            Err(response) => return response,
        },
        AuthScheme::SessionOrBasic => match verify_operator(&state, request.headers()).await {
            Ok(username) => Some(Principal::Operator(username)),
            Err(response) => return response,
        },
    };

    if rule.csrf == CsrfMode::Enforced
        && !csrf::is_safe_method(request.method())
        && !csrf::tokens_match(request.headers())
    {
        return csrf_rejection();
    }

    if let Some(principal) = principal {
        request.extensions_mut().insert(principal);
    }

    next.run(request).await
}

/// Verify the webhook bearer token against the provisioned digest.
///
/// Consulting the provisioner may create the token as a side effect of the
/// very first request, authenticated or not. Store failures reject the
/// request (fail closed) and are only surfaced to operational logging.
async fn verify_webhook_token(state: &AppState, headers: &HeaderMap) -> Result<(), Response> {
    let stored_digest = match state.provisioner.get_or_create_digest().await {
        Ok(digest) => digest,
        Err(e) => {
            tracing::error!(error = %e, "Token store unavailable, rejecting webhook request");
            return Err(AuthError::unauthenticated().into_response());
        }
    };

    let credential = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| {
            // RapidPro sends `Token <secret>`; plain bearer is accepted too.
            v.strip_prefix("Bearer ").or_else(|| v.strip_prefix("Token "))
        });

    let credential = match credential {
        Some(value) => value,
        None => return Err(AuthError::unauthenticated().into_response()),
    };

    if digests_match(&hash_secret(credential), &stored_digest) {
        Ok(())
    } else {
        Err(AuthError::unauthenticated().into_response())
    }
}

/// Resolve an operator from the session cookie or a basic-auth header.
async fn verify_operator(state: &AppState, headers: &HeaderMap) -> Result<String, Response> {
    if let Some(session_id) = cookie_value(headers, SESSION_COOKIE) {
        if let Some(session) = state.sessions.resolve(&session_id).await {
            return Ok(session.username);
        }
    }

    if let Some(header) = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
    {
        if let Some((username, password)) = decode_basic_credentials(header) {
            if state.users.authenticate(&username, &password).is_some() {
                return Ok(username);
            }
            tracing::warn!(username = %username, "Invalid operator credentials");
            return Err(AuthError::unauthenticated().into_response());
        }
    }

    Err(challenge_response())
}
