//! Configuration for catalog reconciliation.

use crate::error::{ReconcileError, ReconcileResult};
use catsync_protocol::MAX_PAGE_SIZE;
use std::time::Duration;

/// Default number of in-flight mutations per executor phase.
pub const DEFAULT_MAX_CONCURRENCY: usize = 10;

/// Configuration for a catalog service connection and reconciler.
#[derive(Debug, Clone)]
pub struct CatalogConfig {
    /// Base URL of the catalog API (e.g., "https://api.example.com").
    pub base_url: String,
    /// API key sent as a bearer token.
    pub api_key: Option<String>,
    /// Entries requested per list page.
    pub page_size: u32,
    /// Maximum in-flight mutations per executor phase.
    pub max_concurrency: usize,
    /// Request timeout enforced by the HTTP client.
    pub timeout: Duration,
    /// User agent sent with every request.
    pub user_agent: String,
    /// Retry configuration of the HTTP layer.
    pub retry: RetryConfig,
}

impl CatalogConfig {
    /// Creates a new configuration.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: None,
            page_size: MAX_PAGE_SIZE,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            timeout: Duration::from_secs(30),
            user_agent: format!("catsync/{}", env!("CARGO_PKG_VERSION")),
            retry: RetryConfig::default(),
        }
    }

    /// Sets the API key.
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Sets the list page size.
    pub fn with_page_size(mut self, size: u32) -> Self {
        self.page_size = size;
        self
    }

    /// Sets the per-phase concurrency ceiling.
    pub fn with_max_concurrency(mut self, max: usize) -> Self {
        self.max_concurrency = max;
        self
    }

    /// Sets the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the user agent.
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Sets the retry configuration.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Checks that the configuration can be used.
    pub fn validate(&self) -> ReconcileResult<()> {
        if self.base_url.trim().is_empty() {
            return Err(ReconcileError::InvalidConfig("base_url is empty".into()));
        }
        if self.page_size == 0 || self.page_size > MAX_PAGE_SIZE {
            return Err(ReconcileError::InvalidConfig(format!(
                "page_size must be in 1..={MAX_PAGE_SIZE}, got {}",
                self.page_size
            )));
        }
        if self.max_concurrency == 0 {
            return Err(ReconcileError::InvalidConfig(
                "max_concurrency must be at least 1".into(),
            ));
        }
        self.retry.validate()
    }
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self::new("https://api.incident.io")
    }
}

/// Configuration for retry behavior of the HTTP layer.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first.
    pub max_attempts: u32,
    /// Initial delay between retries.
    pub initial_delay: Duration,
    /// Maximum delay between retries.
    pub max_delay: Duration,
    /// Multiplier for exponential backoff.
    pub backoff_multiplier: f64,
    /// Whether to add jitter to delays.
    pub add_jitter: bool,
}

impl RetryConfig {
    /// Creates a new retry configuration.
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            initial_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
            add_jitter: true,
        }
    }

    /// Creates a configuration with no retries.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            backoff_multiplier: 1.0,
            add_jitter: false,
        }
    }

    /// Sets the initial delay.
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Sets the maximum delay.
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Sets the backoff multiplier.
    pub fn with_backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    /// Disables jitter.
    pub fn without_jitter(mut self) -> Self {
        self.add_jitter = false;
        self
    }

    /// Checks that the retry settings can be used.
    pub fn validate(&self) -> ReconcileResult<()> {
        if self.max_attempts == 0 {
            return Err(ReconcileError::InvalidConfig(
                "retry.max_attempts must be at least 1".into(),
            ));
        }
        if !self.backoff_multiplier.is_finite() || self.backoff_multiplier < 1.0 {
            return Err(ReconcileError::InvalidConfig(format!(
                "retry.backoff_multiplier must be a finite number >= 1.0, got {}",
                self.backoff_multiplier
            )));
        }
        Ok(())
    }

    /// Calculates the delay before a given attempt (0-indexed).
    ///
    /// Never panics, even on settings `validate` would reject: a delay that
    /// cannot be represented falls back to `max_delay`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let exponent = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
        let base_delay = self.initial_delay.as_secs_f64() * self.backoff_multiplier.powi(exponent);

        let mut delay_secs = base_delay.min(self.max_delay.as_secs_f64()).max(0.0);
        if self.add_jitter {
            // Up to 25% on top.
            delay_secs += delay_secs * 0.25 * rand::random::<f64>();
        }

        Duration::try_from_secs_f64(delay_secs).unwrap_or(self.max_delay)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::new(4)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_config_builder() {
        let config = CatalogConfig::new("https://catalog.example.com")
            .with_api_key("secret")
            .with_page_size(50)
            .with_max_concurrency(4)
            .with_timeout(Duration::from_secs(60));

        assert_eq!(config.base_url, "https://catalog.example.com");
        assert_eq!(config.api_key.as_deref(), Some("secret"));
        assert_eq!(config.page_size, 50);
        assert_eq!(config.max_concurrency, 4);
        assert_eq!(config.timeout, Duration::from_secs(60));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn defaults() {
        let config = CatalogConfig::default();
        assert_eq!(config.page_size, 250);
        assert_eq!(config.max_concurrency, 10);
        assert!(config.user_agent.starts_with("catsync/"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validate_rejects_bad_values() {
        let bad = [
            CatalogConfig::new("  "),
            CatalogConfig::default().with_page_size(0),
            CatalogConfig::default().with_page_size(251),
            CatalogConfig::default().with_max_concurrency(0),
            CatalogConfig::default().with_retry(RetryConfig::new(0)),
            CatalogConfig::default().with_retry(RetryConfig::new(4).with_backoff_multiplier(-2.0)),
            CatalogConfig::default().with_retry(RetryConfig::new(4).with_backoff_multiplier(0.5)),
            CatalogConfig::default()
                .with_retry(RetryConfig::new(4).with_backoff_multiplier(f64::NAN)),
            CatalogConfig::default()
                .with_retry(RetryConfig::new(4).with_backoff_multiplier(f64::INFINITY)),
        ];
        for config in bad {
            assert!(matches!(
                config.validate(),
                Err(ReconcileError::InvalidConfig(_))
            ));
        }
    }

    #[test]
    fn retry_config_no_retry() {
        let config = RetryConfig::no_retry();
        assert_eq!(config.max_attempts, 1);
        assert_eq!(config.delay_for_attempt(3), Duration::ZERO);
    }

    #[test]
    fn retry_delay_calculation() {
        let config = RetryConfig::new(5)
            .with_initial_delay(Duration::from_millis(100))
            .with_backoff_multiplier(2.0);

        assert_eq!(config.delay_for_attempt(0), Duration::ZERO);

        let delay1 = config.delay_for_attempt(1);
        assert!(delay1 >= Duration::from_millis(100));
        assert!(delay1 <= Duration::from_millis(125));

        let delay2 = config.delay_for_attempt(2);
        assert!(delay2 >= Duration::from_millis(200));
    }

    #[test]
    fn retry_delay_without_jitter_is_exact() {
        let config = RetryConfig::new(5)
            .with_initial_delay(Duration::from_secs(1))
            .without_jitter();
        assert_eq!(config.delay_for_attempt(3), Duration::from_secs(4));
    }

    #[test]
    fn retry_delay_respects_max() {
        let config = RetryConfig::new(10)
            .with_initial_delay(Duration::from_secs(1))
            .with_max_delay(Duration::from_secs(5))
            .with_backoff_multiplier(10.0);

        let delay = config.delay_for_attempt(5);
        assert!(delay <= Duration::from_millis(6250));
    }

    #[test]
    fn retry_delay_never_panics_on_unvalidated_settings() {
        let negative = RetryConfig::new(4)
            .with_backoff_multiplier(-2.0)
            .without_jitter();
        assert!(negative.validate().is_err());
        assert_eq!(negative.delay_for_attempt(2), Duration::ZERO);
        assert!(negative.delay_for_attempt(3) <= negative.max_delay);

        let nan = RetryConfig::new(4)
            .with_backoff_multiplier(f64::NAN)
            .without_jitter();
        assert_eq!(nan.delay_for_attempt(2), nan.max_delay);

        let huge = RetryConfig::new(4)
            .with_initial_delay(Duration::MAX)
            .with_max_delay(Duration::MAX);
        assert!(huge.validate().is_ok());
        assert_eq!(huge.delay_for_attempt(1), Duration::MAX);
    }
}
