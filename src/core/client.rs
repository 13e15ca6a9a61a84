use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::core::config::SourceConfig;
use crate::core::credentials::CredentialResolver;
use crate::core::error::UsageError;
use crate::core::models::usage::{parse_reset_timestamp, UsageMetric, UsageSnapshot};

/// Beta header value the OAuth usage endpoint requires.
pub const BETA_HEADER: &str = "oauth-2025-04-20";

#[derive(Deserialize)]
struct UsageWindowRaw {
    utilization: f64,
    resets_at: Option<String>,
}

#[derive(Deserialize)]
struct UsageResponseRaw {
    five_hour: Option<UsageWindowRaw>,
    seven_day: Option<UsageWindowRaw>,
    seven_day_opus: Option<UsageWindowRaw>,
    seven_day_sonnet: Option<UsageWindowRaw>,
}

fn parse_window(raw: UsageWindowRaw) -> UsageMetric {
    UsageMetric {
        utilization: raw.utilization,
        resets_at: raw.resets_at.as_deref().and_then(parse_reset_timestamp),
    }
}

impl From<UsageResponseRaw> for UsageSnapshot {
    fn from(raw: UsageResponseRaw) -> Self {
        Self {
            five_hour: raw.five_hour.map(parse_window),
            seven_day: raw.seven_day.map(parse_window),
            seven_day_opus: raw.seven_day_opus.map(parse_window),
            seven_day_sonnet: raw.seven_day_sonnet.map(parse_window),
            plan: None,
        }
    }
}

/// Decode a response body into a snapshot.
pub fn decode_usage(body: &[u8]) -> Result<UsageSnapshot, UsageError> {
    let raw: UsageResponseRaw = serde_json::from_slice(body)?;
    Ok(raw.into())
}

/// Validate that an endpoint is safe to send a bearer token to.
///
/// HTTPS is required; plain HTTP is only accepted for loopback hosts.
pub fn validate_endpoint(url: &str) -> Result<()> {
    let parsed = reqwest::Url::parse(url).with_context(|| format!("not a URL: '{}'", url))?;
    let loopback = matches!(
        parsed.host_str(),
        Some("localhost") | Some("127.0.0.1") | Some("[::1]")
    );
    match parsed.scheme() {
        "https" => Ok(()),
        "http" if loopback => Ok(()),
        _ => anyhow::bail!("endpoint must use HTTPS, got: {}", url),
    }
}

/// Anything that can produce a usage snapshot; the scheduler's only view of the network.
#[async_trait]
pub trait UsageSource: Send + Sync {
    async fn fetch(&self) -> Result<UsageSnapshot, UsageError>;
}

pub struct UsageClient {
    http: reqwest::Client,
    endpoint: String,
    timeout: Duration,
    resolver: CredentialResolver,
}

impl UsageClient {
    pub fn new(resolver: CredentialResolver, endpoint: impl Into<String>, timeout: Duration) -> Result<Self> {
        let endpoint = endpoint.into();
        validate_endpoint(&endpoint)?;
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            http,
            endpoint,
            timeout,
            resolver,
        })
    }

    pub fn from_config(config: &SourceConfig) -> Result<Self> {
        Self::new(
            CredentialResolver::from_config(config),
            config.endpoint.clone(),
            Duration::from_secs(config.request_timeout_secs),
        )
    }

    fn transport_error(&self, err: reqwest::Error) -> UsageError {
        let cause = if err.is_timeout() {
            format!("request timed out after {}s", self.timeout.as_secs_f32())
        } else {
            let mut message = err.to_string();
            let mut source = std::error::Error::source(&err);
            while let Some(inner) = source {
                message.push_str(": ");
                message.push_str(&inner.to_string());
                source = inner.source();
            }
            message
        };
        UsageError::Network(cause)
    }
}

#[async_trait]
impl UsageSource for UsageClient {
    async fn fetch(&self) -> Result<UsageSnapshot, UsageError> {
        let credential = self.resolver.resolve().await?;

        let response = self
            .http
            .get(&self.endpoint)
            .bearer_auth(&credential.access_token)
            .header("anthropic-beta", BETA_HEADER)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        debug!(status = status.as_u16(), "usage endpoint responded");
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            warn!(status = status.as_u16(), "usage endpoint rejected the credential");
            return Err(UsageError::CredentialExpired);
        }
        if !status.is_success() {
            return Err(UsageError::InvalidResponse {
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await.map_err(|e| self.transport_error(e))?;
        let mut snapshot = decode_usage(&body)?;
        snapshot.plan = Some(credential.plan());
        Ok(snapshot)
    }
}
