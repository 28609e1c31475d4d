//! Route definitions for the API.

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

use crate::api::handlers;
use crate::api::policy::WEBHOOK_PATH;
use crate::auth::enforce_route_policy;
use crate::AppState;

/// Security scheme modifier for OpenAPI.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "webhook_token",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .description(Some("Generated webhook token (see server log at first provisioning)"))
                        .build(),
                ),
            );
            components.add_security_scheme(
                "basic_auth",
                SecurityScheme::Http(HttpBuilder::new().scheme(HttpAuthScheme::Basic).build()),
            );
        }
    }
}

/// OpenAPI documentation.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::webhook,
        handlers::trigger_sync,
        handlers::trigger_scan,
        handlers::trigger_reminders,
        handlers::login,
        handlers::logout,
        handlers::dashboard,
        handlers::health,
    ),
    components(schemas(
        crate::api::types::WebhookResponse,
        crate::api::types::TriggerResponse,
        crate::api::types::LoginRequest,
        crate::api::types::LoginResponse,
        crate::api::types::DashboardResponse,
        crate::api::types::HealthResponse,
    )),
    modifiers(&SecurityAddon),
    tags(
        (name = "webhook", description = "Inbound webhook from RapidPro"),
        (name = "triggers", description = "Administrative sync triggers"),
        (name = "auth", description = "Operator authentication"),
        (name = "management", description = "Management surface"),
        (name = "health", description = "Health and status endpoints")
    ),
    info(
        title = "DHIS2 RapidPro Bridge API",
        version = "0.1.0",
        description = "Synchronization bridge between DHIS2 and RapidPro",
        license(name = "BSD-3-Clause")
    )
)]
pub struct ApiDoc;

/// Build the API router.
///
/// The route policy filter wraps every route, so classification happens for
/// each request exactly once regardless of which handler it reaches.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route(WEBHOOK_PATH, post(handlers::webhook))
        // Triggers accept GET as well: schedulers and cron jobs often can't
        // do more than a plain curl
        .route(
            "/dhis2rapidpro/sync",
            get(handlers::trigger_sync).post(handlers::trigger_sync),
        )
        .route(
            "/dhis2rapidpro/scan",
            get(handlers::trigger_scan).post(handlers::trigger_scan),
        )
        .route(
            "/dhis2rapidpro/reminders",
            get(handlers::trigger_reminders).post(handlers::trigger_reminders),
        )
        .route("/login", post(handlers::login))
        .route("/logout", post(handlers::logout))
        .route("/management/dashboard", get(handlers::dashboard))
        .route("/health", get(handlers::health))
        .with_state(state.clone())
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(middleware::from_fn_with_state(state, enforce_route_policy))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
