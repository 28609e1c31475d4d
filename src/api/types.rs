//! API request and response types.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

// ==================== Webhook ====================

/// Response after a webhook payload has been queued.
#[derive(Debug, Serialize, ToSchema)]
pub struct WebhookResponse {
    /// Queue status, currently always "queued".
    pub status: String,
}

// ==================== Administrative triggers ====================

/// Response from an administrative trigger endpoint.
#[derive(Debug, Serialize, ToSchema)]
pub struct TriggerResponse {
    /// Which trigger ran: "sync", "scan" or "reminders".
    pub triggered: String,
    /// Timestamp of the previous run, if any (poller wire format).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_run_at: Option<String>,
}

// ==================== Authentication ====================

/// Login request.
#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    /// Operator username.
    pub username: String,
    /// Operator password.
    pub password: String,
}

/// Login response. The session and CSRF cookies travel in headers.
#[derive(Debug, Serialize, ToSchema)]
pub struct LoginResponse {
    /// Authenticated operator.
    pub username: String,
}

// ==================== Management ====================

/// Operator dashboard snapshot.
#[derive(Debug, Serialize, ToSchema)]
pub struct DashboardResponse {
    /// Service status.
    pub status: String,
    /// Timestamp of the last sync run, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_run_at: Option<String>,
}

// ==================== Health ====================

/// Health check response.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Service status.
    pub status: String,
    /// Service version.
    pub version: String,
    /// Database connectivity.
    pub database: String,
    /// Timestamp.
    pub timestamp: String,
}
