// Configuration for booking sessions, the reference cache and the remote store

use anyhow::Context;
use rand::Rng;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

pub const STORE_URL_ENV: &str = "CABIN_STORE_URL";
pub const STORE_API_KEY_ENV: &str = "CABIN_STORE_API_KEY";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BookingConfig {
    pub workflow: WorkflowConfig,
    pub retry: RetryConfig,
    pub cache: CacheConfig,
    pub store: StoreConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WorkflowConfig {
    pub submit_timeout_ms: u64,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            submit_timeout_ms: 10_000,
        }
    }
}

impl WorkflowConfig {
    pub fn submit_timeout(&self) -> Duration {
        Duration::from_millis(self.submit_timeout_ms)
    }
}

// Caller-side retry policy for failed submissions
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub backoff_multiplier: f64,
    pub jitter_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff_ms: 200,
            max_backoff_ms: 5_000,
            backoff_multiplier: 2.0,
            jitter_factor: 0.1,
        }
    }
}

impl RetryConfig {
    // Exponential backoff, jittered so retrying sessions spread out
    pub fn backoff(&self, retry_attempt: u32) -> Duration {
        let base_backoff_ms = (self.initial_backoff_ms as f64
            * self.backoff_multiplier.powf(retry_attempt as f64))
        .min(self.max_backoff_ms as f64);

        let jitter = rand::thread_rng().gen::<f64>() * self.jitter_factor * base_backoff_ms;
        let backoff_ms = base_backoff_ms * (1.0 - self.jitter_factor / 2.0) + jitter;

        Duration::from_millis(backoff_ms.max(0.0) as u64)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub ttl_seconds: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { ttl_seconds: 60 }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_seconds)
    }
}

#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub base_url: String,
    pub api_key: String,
    pub timeout_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:54321".to_string(),
            api_key: String::new(),
            timeout_ms: 8_000,
        }
    }
}

// Keeps the key out of logs
impl std::fmt::Debug for StoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .field("timeout_ms", &self.timeout_ms)
            .finish()
    }
}

impl BookingConfig {
    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        serde_json::from_str(json).context("invalid booking configuration")
    }

    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;

        let mut config = Self::from_json(&content)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        config.apply_env_overrides(|name| std::env::var(name).ok());
        config.validate()?;

        tracing::info!(path = %path.display(), store = %config.store.base_url, "loaded booking config");
        Ok(config)
    }

    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup(STORE_URL_ENV) {
            self.store.base_url = url;
        }
        if let Some(key) = lookup(STORE_API_KEY_ENV) {
            self.store.api_key = key;
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.workflow.submit_timeout_ms == 0 {
            anyhow::bail!("workflow.submit_timeout_ms must be greater than zero");
        }
        if self.retry.backoff_multiplier < 1.0 {
            anyhow::bail!("retry.backoff_multiplier must be at least 1.0");
        }
        if !(0.0..=1.0).contains(&self.retry.jitter_factor) {
            anyhow::bail!("retry.jitter_factor must be within 0.0..=1.0");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_json() {
        let config = BookingConfig::from_json("{}").unwrap();

        assert_eq!(config.workflow.submit_timeout_ms, 10_000);
        assert_eq!(config.retry.max_retries, 3);
        assert_eq!(config.cache.ttl(), Duration::from_secs(60));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json() {
        let config = BookingConfig::from_json(
            r#"{"retry": {"max_retries": 5}, "store": {"base_url": "https://store.test"}}"#,
        )
        .unwrap();

        assert_eq!(config.retry.max_retries, 5);
        assert_eq!(config.retry.initial_backoff_ms, 200);
        assert_eq!(config.store.base_url, "https://store.test");
    }

    #[test]
    fn test_env_overrides() {
        let mut config = BookingConfig::default();
        config.apply_env_overrides(|name| match name {
            STORE_API_KEY_ENV => Some("secret".to_string()),
            _ => None,
        });

        assert_eq!(config.store.api_key, "secret");
        assert_eq!(config.store.base_url, "http://localhost:54321");
        assert!(!format!("{:?}", config.store).contains("secret"));
    }

    #[test]
    fn test_validate_rejects_bad_retry() {
        let mut config = BookingConfig::default();
        config.retry.jitter_factor = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_missing_file() {
        let result = BookingConfig::load("/nonexistent/booking.json");
        assert!(result.is_err());
    }

    #[test]
    fn test_backoff_grows_and_caps() {
        let config = RetryConfig {
            jitter_factor: 0.0,
            ..RetryConfig::default()
        };

        assert_eq!(config.backoff(0), Duration::from_millis(200));
        assert_eq!(config.backoff(1), Duration::from_millis(400));
        assert_eq!(config.backoff(2), Duration::from_millis(800));
        assert_eq!(config.backoff(10), Duration::from_millis(5_000));
    }

    #[test]
    fn test_backoff_jitter_bounds() {
        let config = RetryConfig::default();
        for _ in 0..100 {
            let backoff = config.backoff(1).as_millis();
            assert!((380..=420).contains(&backoff), "backoff {}", backoff);
        }
    }
}
