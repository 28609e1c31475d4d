//! Route access policy.
//!
//! Declarative mapping from URL path patterns to the authentication scheme and
//! CSRF mode governing them. The policy is built once at startup from the
//! auth configuration into an ordered matcher list; each request is classified
//! exactly once, first match wins.

use crate::config::{AuthConfig, ManagementAuthMode, WebhookAuthMode};

/// Path of the inbound webhook endpoint.
pub const WEBHOOK_PATH: &str = "/dhis2rapidpro/webhook";

/// Administrative trigger endpoints, invoked by schedulers rather than browsers.
pub const TRIGGER_PATHS: [&str; 3] = [
    "/dhis2rapidpro/sync",
    "/dhis2rapidpro/scan",
    "/dhis2rapidpro/reminders",
];

/// Authentication scheme required for a path group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthScheme {
    /// Session cookie or basic-auth challenge.
    SessionOrBasic,
    /// Webhook bearer token verified against the stored digest.
    Token,
    /// No authentication.
    None,
}

/// Whether CSRF protection applies to a path group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CsrfMode {
    Enforced,
    Exempt,
}

/// A path pattern in the ordered matcher list.
#[derive(Debug, Clone)]
enum PathPattern {
    Exact(&'static str),
    Prefix(&'static str),
}

impl PathPattern {
    fn matches(&self, path: &str) -> bool {
        match self {
            PathPattern::Exact(p) => path == *p,
            PathPattern::Prefix(p) => path.starts_with(p),
        }
    }
}

/// One rule in the policy: pattern plus the schemes it demands.
#[derive(Debug, Clone)]
pub struct RouteRule {
    pattern: PathPattern,
    pub scheme: AuthScheme,
    pub csrf: CsrfMode,
}

impl RouteRule {
    fn new(pattern: PathPattern, scheme: AuthScheme, csrf: CsrfMode) -> Self {
        Self {
            pattern,
            scheme,
            csrf,
        }
    }
}

/// Ordered set of route rules, evaluated first-match-wins.
#[derive(Debug, Clone)]
pub struct RouteAccessPolicy {
    rules: Vec<RouteRule>,
    default_rule: RouteRule,
}

impl RouteAccessPolicy {
    /// Build the matcher list from the auth configuration.
    ///
    /// A disabled scheme drops its path group back to unauthenticated, so the
    /// table below only grows rules for schemes that are switched on.
    pub fn from_config(auth: &AuthConfig) -> Self {
        let mut rules = Vec::new();

        if auth.webhook == WebhookAuthMode::Token {
            rules.push(RouteRule::new(
                PathPattern::Exact(WEBHOOK_PATH),
                AuthScheme::Token,
                CsrfMode::Exempt,
            ));
        }

        if auth.management == ManagementAuthMode::Basic {
            // Trigger endpoints: operator-authenticated but CSRF-exempt, they
            // are called by schedulers and automation.
            for path in TRIGGER_PATHS {
                rules.push(RouteRule::new(
                    PathPattern::Exact(path),
                    AuthScheme::SessionOrBasic,
                    CsrfMode::Exempt,
                ));
            }
            // The management console sub-path keeps its frames working without
            // a CSRF token, as the legacy deployment did.
            rules.push(RouteRule::new(
                PathPattern::Prefix("/management/console"),
                AuthScheme::SessionOrBasic,
                CsrfMode::Exempt,
            ));
            rules.push(RouteRule::new(
                PathPattern::Prefix("/management"),
                AuthScheme::SessionOrBasic,
                CsrfMode::Enforced,
            ));
            // Login authenticates the submitted credentials itself; the CSRF
            // cookie is first issued by its response.
            rules.push(RouteRule::new(
                PathPattern::Exact("/login"),
                AuthScheme::None,
                CsrfMode::Exempt,
            ));
            rules.push(RouteRule::new(
                PathPattern::Exact("/logout"),
                AuthScheme::SessionOrBasic,
                CsrfMode::Enforced,
            ));
        }

        Self {
            rules,
            default_rule: RouteRule::new(PathPattern::Prefix(""), AuthScheme::None, CsrfMode::Exempt),
        }
    }

    /// Classify a request path against the ordered rule set.
    pub fn classify(&self, path: &str) -> &RouteRule {
        self.rules
            .iter()
            .find(|rule| rule.pattern.matches(path))
            .unwrap_or(&self.default_rule)
    }
}
