//! Configuration module for the bridge.
//!
//! Loads configuration from YAML files and environment variables.

use config::{Config as ConfigLoader, ConfigError, Environment, File};
use serde::Deserialize;

use crate::auth::ConfiguredUser;

/// Root configuration structure.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub dhis2: Dhis2Config,
    pub rapidpro: RapidProConfig,
    #[serde(default)]
    pub auth: AuthConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
}

/// DHIS2 connection settings for the outbound side of the bridge.
#[derive(Debug, Clone, Deserialize)]
pub struct Dhis2Config {
    /// Base API URL, e.g. `https://play.dhis2.org/api`.
    pub api_url: String,
    pub username: String,
    pub password: String,
}

/// RapidPro connection settings.
#[derive(Debug, Clone, Deserialize)]
pub struct RapidProConfig {
    /// Base API URL, e.g. `https://rapidpro.io/api/v2`.
    pub api_url: String,
    /// API token for outbound calls. Validated by the startup connection probe.
    #[serde(default)]
    pub api_token: Option<String>,
}

/// Authentication configuration.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AuthConfig {
    /// Scheme guarding the management paths and administrative triggers.
    #[serde(default)]
    pub management: ManagementAuthMode,
    /// Scheme guarding the inbound webhook endpoint.
    #[serde(default)]
    pub webhook: WebhookAuthMode,
    /// Operator users for session/basic authentication.
    #[serde(default)]
    pub users: Vec<ConfiguredUser>,
}

/// Authentication mode for management paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ManagementAuthMode {
    /// Session cookie or basic-auth challenge (the default).
    #[default]
    Basic,
    /// No authentication; management paths fall back to unauthenticated.
    None,
}

/// Authentication mode for the webhook endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum WebhookAuthMode {
    /// No authentication (the default; must be opted out of for production).
    #[default]
    None,
    /// Secret bearer token verified against a stored digest.
    Token,
}

impl Config {
    /// Load configuration from files and environment.
    ///
    /// Priority (highest to lowest):
    /// 1. Environment variables (DHIS2RAPIDPRO_*)
    /// 2. config/local.yaml (if exists)
    /// 3. config/default.yaml
    pub fn load() -> Result<Self, ConfigError> {
        let config = ConfigLoader::builder()
            // Start with default config
            .add_source(File::with_name("config/default").required(false))
            // Layer on local overrides
            .add_source(File::with_name("config/local").required(false))
            // Layer on environment variables with DHIS2RAPIDPRO_ prefix
            .add_source(
                Environment::with_prefix("DHIS2RAPIDPRO")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Reject configurations the server must not start with.
    ///
    /// Called before binding the listener; a failure here is fatal.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.auth.management == ManagementAuthMode::Basic && self.auth.users.is_empty() {
            return Err(ConfigError::Message(
                "management auth is set to `basic` but no operator users are configured \
                 (`auth.users`)"
                    .to_string(),
            ));
        }
        if self.dhis2.api_url.is_empty() {
            return Err(ConfigError::Message(
                "`dhis2.api_url` must not be empty".to_string(),
            ));
        }
        if self.rapidpro.api_url.is_empty() {
            return Err(ConfigError::Message(
                "`rapidpro.api_url` must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}
