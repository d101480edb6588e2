//! Bearer tokens for the session pool management API.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use std::sync::Arc;
use tokio::process::Command;
use tokio::sync::Mutex;

use crate::config::EngineConfig;
use crate::errors::AgentError;

pub const DYNAMIC_SESSIONS_RESOURCE: &str = "https://dynamicsessions.io";

/// Tokens within this window of expiry are refreshed before use.
const REFRESH_MARGIN_MINUTES: i64 = 5;

#[async_trait]
pub trait AccessTokenProvider: Send + Sync {
    async fn access_token(&self) -> Result<String, AgentError>;
}

/// A fixed token, typically from `POOL_MANAGEMENT_TOKEN`.
pub struct StaticTokenProvider {
    token: String,
}

impl StaticTokenProvider {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

#[async_trait]
impl AccessTokenProvider for StaticTokenProvider {
    async fn access_token(&self) -> Result<String, AgentError> {
        Ok(self.token.clone())
    }
}

/// `POOL_MANAGEMENT_TOKEN` when set, otherwise the Azure CLI.
pub fn token_provider_from_config(config: &EngineConfig) -> Arc<dyn AccessTokenProvider> {
    match &config.pool_management_token {
        Some(token) => Arc::new(StaticTokenProvider::new(token.clone())),
        None => Arc::new(AzureCliTokenProvider::new()),
    }
}

#[derive(Debug, Clone)]
struct CachedToken {
    token: String,
    expires_on: DateTime<Utc>,
}

impl CachedToken {
    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        self.expires_on > now + Duration::minutes(REFRESH_MARGIN_MINUTES)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AzCliToken {
    access_token: String,
    #[serde(rename = "expires_on")]
    expires_on: Option<i64>,
}

/// Obtains tokens from `az account get-access-token`, caching each one until
/// shortly before it expires.
pub struct AzureCliTokenProvider {
    resource: String,
    cached: Mutex<Option<CachedToken>>,
}

impl AzureCliTokenProvider {
    pub fn new() -> Self {
        Self::for_resource(DYNAMIC_SESSIONS_RESOURCE)
    }

    pub fn for_resource(resource: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            cached: Mutex::new(None),
        }
    }

    async fn fetch(&self) -> Result<CachedToken, AgentError> {
        log::debug!("Requesting access token for {} from Azure CLI", self.resource);
        let output = Command::new("az")
            .args([
                "account",
                "get-access-token",
                "--resource",
                &self.resource,
                "--output",
                "json",
            ])
            .output()
            .await
            .map_err(|e| {
                AgentError::SandboxError(format!(
                    "Failed to run Azure CLI (set POOL_MANAGEMENT_TOKEN or install az): {}",
                    e
                ))
            })?;

        if !output.status.success() {
            return Err(AgentError::SandboxError(format!(
                "Azure CLI token request failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        parse_cli_token(&output.stdout, Utc::now())
    }
}

impl Default for AzureCliTokenProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AccessTokenProvider for AzureCliTokenProvider {
    async fn access_token(&self) -> Result<String, AgentError> {
        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref().filter(|t| t.is_fresh(Utc::now())) {
            return Ok(token.token.clone());
        }

        let token = self.fetch().await?;
        log::info!("Obtained sandbox access token valid until {}", token.expires_on);
        let value = token.token.clone();
        *cached = Some(token);
        Ok(value)
    }
}

fn parse_cli_token(stdout: &[u8], now: DateTime<Utc>) -> Result<CachedToken, AgentError> {
    let parsed: AzCliToken = serde_json::from_slice(stdout).map_err(|e| {
        AgentError::SandboxError(format!("Unexpected Azure CLI token output: {}", e))
    })?;

    // Older CLI versions omit `expires_on`; assume the usual one-hour lifetime.
    let expires_on = parsed
        .expires_on
        .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
        .unwrap_or_else(|| now + Duration::hours(1));

    Ok(CachedToken {
        token: parsed.access_token,
        expires_on,
    })
}
