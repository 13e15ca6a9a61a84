use std::path::PathBuf;
use std::sync::OnceLock;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use regex::Regex;
use serde_json::Value;
use tracing::debug;

use crate::core::config::SourceConfig;
use crate::core::error::CredentialError;
use crate::core::models::usage::PlanInfo;
use crate::core::process::run_command;

/// Keychain service name Claude Code stores its OAuth credential under.
pub const KEYCHAIN_SERVICE: &str = "Claude Code-credentials";

// --- Credential payload ---

#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    pub access_token: String,
    pub subscription_type: Option<String>,
    pub rate_limit_tier: Option<String>,
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("access_token", &"<redacted>")
            .field("subscription_type", &self.subscription_type)
            .field("rate_limit_tier", &self.rate_limit_tier)
            .finish()
    }
}

fn tier_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?i)(\d+)x").expect("tier pattern is valid"))
}

impl Credential {
    /// Rate multiplier such as "5X" or "20X", taken from `rate_limit_tier`.
    pub fn tier_label(&self) -> Option<String> {
        let tier = self.rate_limit_tier.as_deref()?;
        tier_pattern()
            .captures(tier)
            .map(|caps| format!("{}X", &caps[1]))
    }

    pub fn subscription_label(&self) -> &'static str {
        match self
            .subscription_type
            .as_deref()
            .map(str::to_lowercase)
            .as_deref()
        {
            Some("max") => "Claude Max",
            Some("pro") => "Claude Pro",
            _ => "Claude",
        }
    }

    pub fn plan(&self) -> PlanInfo {
        PlanInfo {
            subscription: self.subscription_label().to_string(),
            tier: self.tier_label(),
        }
    }
}

/// Extract a credential from either the current or the legacy JSON layout.
/// Returns `None` for unparsable JSON or a missing/empty token.
///
/// Fields are read one by one, so a mistyped field written by another tool
/// only loses that field.
pub fn parse_credential_json(content: &str) -> Option<Credential> {
    let blob: Value = serde_json::from_str(content.trim()).ok()?;
    let non_empty = |v: Option<&Value>| v.and_then(Value::as_str).filter(|t| !t.is_empty()).map(str::to_string);

    if let Some(oauth) = blob.get("claudeAiOauth").filter(|v| v.is_object()) {
        if let Some(token) = non_empty(oauth.get("accessToken")) {
            return Some(Credential {
                access_token: token,
                subscription_type: non_empty(oauth.get("subscriptionType")),
                rate_limit_tier: non_empty(oauth.get("rateLimitTier")),
            });
        }
    }

    // legacy layout kept the token at the top level
    non_empty(blob.get("accessToken")).map(|token| Credential {
        access_token: token,
        subscription_type: None,
        rate_limit_tier: None,
    })
}

// --- Secret sources ---

/// A place the raw credential JSON can be read from.
#[async_trait]
pub trait SecretSource: Send + Sync {
    fn name(&self) -> &'static str;
    async fn read_secret(&self) -> Result<String>;
}

/// `security find-generic-password -s <service> -w`, which copes with
/// keychain entries created by other tools better than the native API does.
pub struct SecurityCommandSource {
    service: String,
    timeout: Duration,
}

impl SecurityCommandSource {
    pub fn new(service: impl Into<String>, timeout: Duration) -> Self {
        Self {
            service: service.into(),
            timeout,
        }
    }
}

#[async_trait]
impl SecretSource for SecurityCommandSource {
    fn name(&self) -> &'static str {
        "security-command"
    }

    async fn read_secret(&self) -> Result<String> {
        let secret = run_command(
            "security",
            &["find-generic-password", "-s", self.service.as_str(), "-w"],
            self.timeout,
        )
        .await?;
        Ok(secret)
    }
}

/// The platform's own secure storage: the login keychain on macOS, the
/// credentials file Claude Code writes elsewhere.
pub struct NativeStoreSource {
    #[cfg_attr(not(target_os = "macos"), allow(dead_code))]
    service: String,
}

impl NativeStoreSource {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }
}

#[async_trait]
impl SecretSource for NativeStoreSource {
    fn name(&self) -> &'static str {
        "native-store"
    }

    /// Matches on service alone: the item's account is the login user,
    /// which is not known here.
    #[cfg(target_os = "macos")]
    async fn read_secret(&self) -> Result<String> {
        use security_framework::item::{ItemClass, ItemSearchOptions, Limit, SearchResult};

        let results = ItemSearchOptions::new()
            .class(ItemClass::generic_password())
            .service(&self.service)
            .load_data(true)
            .limit(Limit::Max(1))
            .search()
            .with_context(|| format!("Keychain item '{}' not found", self.service))?;
        let bytes = results
            .into_iter()
            .find_map(|result| match result {
                SearchResult::Data(bytes) => Some(bytes),
                _ => None,
            })
            .with_context(|| format!("Keychain item '{}' has no data", self.service))?;
        String::from_utf8(bytes).context("Keychain item is not valid UTF-8")
    }

    #[cfg(not(target_os = "macos"))]
    async fn read_secret(&self) -> Result<String> {
        let path = claude_credentials_path();
        tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))
    }
}

#[cfg_attr(target_os = "macos", allow(dead_code))]
fn claude_credentials_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("~"))
        .join(".claude")
        .join(".credentials.json")
}

// --- Resolver ---

/// Reads the credential fresh on every call, trying each source once, in order.
pub struct CredentialResolver {
    sources: Vec<Box<dyn SecretSource>>,
}

impl CredentialResolver {
    pub fn new(sources: Vec<Box<dyn SecretSource>>) -> Self {
        Self { sources }
    }

    pub fn from_config(config: &SourceConfig) -> Self {
        Self::new(vec![
            Box::new(SecurityCommandSource::new(
                config.keychain_service.clone(),
                Duration::from_secs(config.command_timeout_secs),
            )),
            Box::new(NativeStoreSource::new(config.keychain_service.clone())),
        ])
    }

    pub async fn resolve(&self) -> Result<Credential, CredentialError> {
        for source in &self.sources {
            match source.read_secret().await {
                Ok(raw) => match parse_credential_json(&raw) {
                    Some(credential) => {
                        debug!(source = source.name(), "credential resolved");
                        return Ok(credential);
                    }
                    None => debug!(source = source.name(), "no access token in credential payload"),
                },
                Err(e) => {
                    let reason = format!("{:#}", e);
                    debug!(source = source.name(), error = %reason, "credential source failed");
                }
            }
        }
        Err(CredentialError::NoCredential)
    }
}
