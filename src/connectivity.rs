//! Startup connection probes for the two platforms.
//!
//! The bridge refuses to serve traffic when either side is unreachable or
//! misconfigured; the error messages carry hints an operator can act on.

use anyhow::{anyhow, bail, Result};
use serde_json::Value;

use crate::config::{Dhis2Config, RapidProConfig};

/// Probes DHIS2 and RapidPro before the server starts accepting requests.
pub struct ConnectionProbe {
    http: reqwest::Client,
    dhis2: Dhis2Config,
    rapidpro: RapidProConfig,
}

impl ConnectionProbe {
    pub fn new(dhis2: Dhis2Config, rapidpro: RapidProConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            dhis2,
            rapidpro,
        }
    }

    /// Fetch DHIS2 system info and expect a version string.
    pub async fn test_dhis2_connection(&self) -> Result<()> {
        let url = format!("{}/system/info.json", self.dhis2.api_url.trim_end_matches('/'));
        let response = self
            .http
            .get(&url)
            .basic_auth(&self.dhis2.username, Some(&self.dhis2.password))
            .send()
            .await
            .map_err(|e| {
                anyhow!(
                    "Connection error during DHIS2 connection test. Are you sure that \
                     `dhis2.api.url` is set correctly? Hint: check your firewall settings. \
                     Error message => {e}"
                )
            })?;

        if !response.status().is_success() {
            bail!(
                "Unexpected HTTP response code during DHIS2 connection test. Are you sure that \
                 `dhis2.api.url` is set correctly and the credentials are valid? Hint: check \
                 your firewall settings. Response code: {}",
                response.status().as_u16()
            );
        }

        let body: Value = response.json().await.unwrap_or(Value::Null);
        let version = expect_dhis2_version(&body).map_err(|body| {
            anyhow!(
                "Unexpected JSON response during DHIS2 connection test: expecting system info \
                 version. Are you sure that `dhis2.api.url` is set correctly and the right \
                 version of DHIS is installed? JSON response => {body}"
            )
        })?;

        tracing::info!(version = %version, "DHIS2 connection test passed");
        Ok(())
    }

    /// Fetch the RapidPro workspace and expect its UUID.
    pub async fn test_rapidpro_connection(&self) -> Result<()> {
        let token = self
            .rapidpro
            .api_token
            .as_deref()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| {
                anyhow!("Missing RapidPro API token. Are you sure that you set `rapidpro.api.token`?")
            })?;

        let url = format!("{}/workspace.json", self.rapidpro.api_url.trim_end_matches('/'));
        let response = self
            .http
            .get(&url)
            .header("Authorization", format!("Token {token}"))
            .send()
            .await
            .map_err(|e| {
                anyhow!(
                    "Connection error during RapidPro connection test. Are you sure that \
                     `rapidpro.api.url` is set correctly? Hint: check your firewall settings. \
                     Error message => {e}"
                )
            })?;

        if !response.status().is_success() {
            let code = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            bail!(
                "Unexpected HTTP response code during RapidPro connection test. Are you sure \
                 that `rapidpro.api.url` is set correctly and the credentials are valid? \
                 Response code: {code}. Response body: {body}"
            );
        }

        let body: Value = response.json().await.unwrap_or(Value::Null);
        let uuid = expect_workspace_uuid(&body).map_err(|body| {
            anyhow!(
                "Unexpected JSON response during RapidPro connection test: expecting workspace \
                 UUID. Are you sure that `rapidpro.api.url` is set correctly and the right \
                 version of RapidPro is installed? JSON response => {body}"
            )
        })?;

        tracing::info!(workspace = %uuid, "RapidPro connection test passed");
        Ok(())
    }
}

fn expect_dhis2_version(body: &Value) -> Result<String, String> {
    body.get("version")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| body.to_string())
}

fn expect_workspace_uuid(body: &Value) -> Result<String, String> {
    body.get("uuid")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| body.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expect_dhis2_version() {
        let ok = serde_json::json!({"version": "2.39.1", "revision": "abc"});
        assert_eq!(expect_dhis2_version(&ok).unwrap(), "2.39.1");

        let wrong = serde_json::json!({"args": {}, "headers": {}});
        assert!(expect_dhis2_version(&wrong).is_err());
    }

    #[test]
    fn test_expect_workspace_uuid() {
        let ok = serde_json::json!({"uuid": "690859ee-6688-44c1-9c22-c4c6e4e0a4b2"});
        assert_eq!(
            expect_workspace_uuid(&ok).unwrap(),
            "690859ee-6688-44c1-9c22-c4c6e4e0a4b2"
        );

        let wrong = serde_json::json!({"detail": "Invalid token"});
        assert!(expect_workspace_uuid(&wrong).is_err());
    }

    #[test]
    fn test_missing_rapidpro_token_is_fatal() {
        let probe = ConnectionProbe::new(
            Dhis2Config {
                api_url: "http://dhis2.test/api".to_string(),
                username: "admin".to_string(),
                password: "district".to_string(),
            },
            RapidProConfig {
                api_url: "http://rapidpro.test/api/v2".to_string(),
                api_token: None,
            },
        );

        let err = tokio_test::block_on(probe.test_rapidpro_connection()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Missing RapidPro API token. Are you sure that you set `rapidpro.api.token`?"
        );
    }
}
