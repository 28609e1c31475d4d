//! Operator authentication for management paths.
//!
//! Operators are defined in configuration with SHA-256 password digests and
//! authenticate either with a session cookie issued by `POST /login` or with
//! a basic-auth header on each request.

use std::collections::HashMap;
use std::sync::Arc;

use axum::http::{header::COOKIE, HeaderMap};
use base64::{engine::general_purpose::STANDARD, Engine};
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::auth::token::{digests_match, generate_secret, hash_secret};

/// Name of the session cookie.
pub const SESSION_COOKIE: &str = "SESSION";

/// Configured operator user.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct ConfiguredUser {
    pub username: String,
    /// Password digest (SHA-256 hex).
    pub password_hash: String,
}

impl ConfiguredUser {
    /// Verify a password against the stored digest.
    pub fn verify_password(&self, password: &str) -> bool {
        digests_match(&hash_secret(password), &self.password_hash)
    }
}

/// In-memory store of configured operator users.
#[derive(Clone)]
pub struct UserStore {
    users: HashMap<String, ConfiguredUser>,
}

impl UserStore {
    /// Create a new user store from configured users.
    pub fn new(users: Vec<ConfiguredUser>) -> Self {
        let users = users.into_iter().map(|u| (u.username.clone(), u)).collect();
        Self { users }
    }

    /// Authenticate an operator with username and password.
    pub fn authenticate(&self, username: &str, password: &str) -> Option<&ConfiguredUser> {
        self.users
            .get(username)
            .filter(|user| user.verify_password(password))
    }
}

/// An active operator session.
#[derive(Debug, Clone)]
pub struct Session {
    pub username: String,
    /// Creation time (for future session expiry).
    #[allow(dead_code)]
    pub created_at: DateTime<Utc>,
}

/// In-memory session store keyed by opaque session IDs.
#[derive(Clone)]
pub struct SessionStore {
    sessions: Arc<RwLock<HashMap<String, Session>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Create a session for an authenticated operator and return its ID.
    pub async fn create(&self, username: &str) -> String {
        let id = generate_secret();
        let session = Session {
            username: username.to_string(),
            created_at: Utc::now(),
        };
        self.sessions.write().await.insert(id.clone(), session);
        id
    }

    /// Resolve a session ID to its session, if still active.
    pub async fn resolve(&self, id: &str) -> Option<Session> {
        self.sessions.read().await.get(id).cloned()
    }

    /// Remove a session (logout).
    pub async fn remove(&self, id: &str) {
        self.sessions.write().await.remove(id);
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Read a named cookie from the request headers.
pub fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    let raw = headers.get(COOKIE)?.to_str().ok()?;
    raw.split(';').find_map(|pair| {
        let (key, value) = pair.trim().split_once('=')?;
        (key == name).then(|| value.to_string())
    })
}

/// Decode a `Basic` authorization header value into (username, password).
pub fn decode_basic_credentials(header_value: &str) -> Option<(String, String)> {
    let encoded = header_value.strip_prefix("Basic ")?;
    let decoded = STANDARD.decode(encoded).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (username, password) = decoded.split_once(':')?;
    Some((username.to_string(), password.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn test_user(username: &str, password: &str) -> ConfiguredUser {
        ConfiguredUser {
            username: username.to_string(),
            password_hash: hash_secret(password),
        }
    }

    #[test]
    fn test_operator_authentication() {
        let store = UserStore::new(vec![test_user("admin", "district")]);

        assert!(store.authenticate("admin", "district").is_some());
        assert!(store.authenticate("admin", "wrong").is_none());
        assert!(store.authenticate("unknown", "district").is_none());
    }

    #[tokio::test]
    async fn test_session_lifecycle() {
        let sessions = SessionStore::new();

        let id = sessions.create("admin").await;
        assert_eq!(sessions.resolve(&id).await.unwrap().username, "admin");

        sessions.remove(&id).await;
        assert!(sessions.resolve(&id).await.is_none());
    }

    #[test]
    fn test_cookie_value_parsing() {
        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_static("XSRF-TOKEN=abc; SESSION=s3ss10n; other=1"),
        );

        assert_eq!(cookie_value(&headers, SESSION_COOKIE).as_deref(), Some("s3ss10n"));
        assert_eq!(cookie_value(&headers, "XSRF-TOKEN").as_deref(), Some("abc"));
        assert!(cookie_value(&headers, "missing").is_none());
    }

    #[test]
    fn test_decode_basic_credentials() {
        let encoded = STANDARD.encode("admin:district");
        let (username, password) =
            decode_basic_credentials(&format!("Basic {}", encoded)).unwrap();
        assert_eq!(username, "admin");
        assert_eq!(password, "district");

        assert!(decode_basic_credentials("Bearer abc").is_none());
        assert!(decode_basic_credentials("Basic ???").is_none());
    }
}
