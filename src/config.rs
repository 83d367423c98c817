//! armsync settings: subscription, endpoint, credentials and wait budgets

use anyhow::{Context, Result};
use armkit::rest::DEFAULT_ENDPOINT;
use declarative::{ExecuteOptions, Fragments, RetryConfig};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

const SUBSCRIPTION_ENV: &str = "AZURE_SUBSCRIPTION_ID";
const ENDPOINT_ENV: &str = "ARM_ENDPOINT";

/// Get the config directory path
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir().context("Could not determine home directory")?;
    Ok(home.join(".config").join("armsync"))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Default subscription for documents that don't name one
    pub subscription_id: Option<String>,
    /// ARM base URL
    pub endpoint: String,
    /// Environment variable holding the bearer token
    pub token_env: String,
    pub operation_timeout_secs: u64,
    pub delete_poll_interval_secs: u64,
    pub delete_timeout_secs: u64,
    pub retry: RetrySettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            subscription_id: None,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            token_env: "AZURE_ACCESS_TOKEN".to_string(),
            operation_timeout_secs: 1200,
            delete_poll_interval_secs: 20,
            delete_timeout_secs: 1200,
            retry: RetrySettings::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub backoff_factor: f64,
    pub max_delay_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1000,
            backoff_factor: 2.0,
            max_delay_ms: 30_000,
        }
    }
}

impl Settings {
    /// Load settings from `path`, or from the default location.
    ///
    /// A missing default file yields defaults; a missing explicit file is an
    /// error. Environment overrides are applied last.
    pub fn load(path: Option<&str>) -> Result<Self> {
        let settings = match path {
            Some(path) => {
                let path = PathBuf::from(shellexpand::tilde(path).as_ref());
                Self::read(&path)?
            }
            None => {
                let path = config_dir()?.join("config.toml");
                if path.exists() { Self::read(&path)? } else { Self::default() }
            }
        };
        Ok(settings.with_env(|key| std::env::var(key).ok()))
    }

    fn read(path: &std::path::Path) -> Result<Self> {
        let content =
            fs::read_to_string(path).with_context(|| format!("Could not read {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("Invalid TOML format in {}", path.display()))
    }

    /// Apply environment overrides through `lookup`
    #[must_use]
    pub fn with_env(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(subscription) = lookup(SUBSCRIPTION_ENV).filter(|s| !s.is_empty()) {
            self.subscription_id = Some(subscription);
        }
        if let Some(endpoint) = lookup(ENDPOINT_ENV).filter(|s| !s.is_empty()) {
            self.endpoint = endpoint;
        }
        self
    }

    /// Bearer token from the configured environment variable
    pub fn token(&self) -> Result<String> {
        std::env::var(&self.token_env)
            .ok()
            .filter(|t| !t.is_empty())
            .with_context(|| format!("No access token: set {}", self.token_env))
    }

    /// Identity defaults merged into every document
    pub fn defaults(&self) -> Fragments {
        let mut fragments = Fragments::new();
        if let Some(subscription) = &self.subscription_id {
            fragments.insert("subscription_id".to_string(), subscription.clone());
        }
        fragments
    }

    pub fn execute_options(&self, check_mode: bool) -> ExecuteOptions {
        ExecuteOptions {
            check_mode,
            operation_timeout: Duration::from_secs(self.operation_timeout_secs),
            delete_poll_interval: Duration::from_secs(self.delete_poll_interval_secs),
            delete_timeout: Duration::from_secs(self.delete_timeout_secs),
            retry: RetryConfig {
                max_attempts: self.retry.max_attempts,
                base_delay: Duration::from_millis(self.retry.base_delay_ms),
                backoff_factor: self.retry.backoff_factor,
                max_delay: Duration::from_millis(self.retry.max_delay_ms),
            },
        }
    }
}
