use std::path::PathBuf;
use std::time::Duration;

/// Default User-Agent string sent with every request
pub const DEFAULT_USER_AGENT: &str = concat!(
    "Mozilla/5.0 (Windows NT 6.3; Win64; x64) ",
    "AppleWebKit/537.36 ",
    "(KHTML, like Gecko) Chrome/60.0.3112.90 Safari/537.36"
);

/// Unauthenticated web endpoint of the shrink service (size-limited uploads)
pub const WEB_ENDPOINT: &str = "https://tinypng.com/web";

/// Key-authenticated API endpoint of the shrink service
pub const API_ENDPOINT: &str = "https://api.tinify.com";

/// Number of retries after the initial attempt
pub const DEFAULT_MAX_RETRIES: usize = 1;

/// Fixed pause before every retry attempt
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(500);

/// Conditions that may trigger a retry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum RetryTrigger {
    /// Transport-level errors (connection refused, DNS failure, reset, etc.)
    TransportError,
    /// Single attempt timed out
    Timeout,
    /// Specific HTTP status code
    Status(u16),
    /// Error that is never retryable (e.g. `DeadlineExceeded`, `Cancelled`)
    NonRetryable,
}

/// Retry policy: a bounded number of retries with a fixed delay
///
/// Unlike idempotency-aware policies, every method is retried, including POST.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retries after the initial attempt (0 = no retries, default: 1)
    /// Total attempts = 1 (initial) + `max_retries`
    pub max_retries: usize,

    /// Delay before each retry attempt (default: 500ms)
    pub delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            delay: DEFAULT_RETRY_DELAY,
        }
    }
}

impl RetryConfig {
    /// Create config with no retries
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            max_retries: 0,
            ..Default::default()
        }
    }

    /// Create fast config for testing (one retry, 1ms delay)
    #[must_use]
    pub fn fast() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            delay: Duration::from_millis(1),
        }
    }

    /// Check if attempt number `attempt` (0-based) may be followed by a retry
    /// after observing `trigger`
    ///
    /// Connection failures, attempt timeouts and any 5xx status are transient.
    /// Everything else (2xx, 3xx, 4xx, deadline, cancellation) is final.
    #[must_use]
    pub fn should_retry(&self, trigger: RetryTrigger, attempt: usize) -> bool {
        if attempt >= self.max_retries {
            return false;
        }
        match trigger {
            RetryTrigger::TransportError | RetryTrigger::Timeout => true,
            RetryTrigger::Status(status) => (500..=599).contains(&status),
            RetryTrigger::NonRetryable => false,
        }
    }
}

/// TLS root certificate configuration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[non_exhaustive]
pub enum TlsRootConfig {
    /// Use Mozilla's root certificates (webpki-roots, no OS dependency)
    WebPki,
    /// Use OS native root certificate store
    #[default]
    Native,
}

/// Transport security configuration
///
/// Controls whether the client enforces TLS or allows insecure HTTP.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[non_exhaustive]
pub enum TransportSecurity {
    /// Require TLS for all connections (HTTPS only) - default and recommended
    #[default]
    TlsOnly,
    /// Allow insecure HTTP connections (for testing with mock servers only)
    ///
    /// **WARNING**: Never use in production as it exposes credentials to interception.
    AllowInsecureHttp,
}

/// Overall transport configuration
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Per-attempt timeout (default: 30 seconds)
    ///
    /// Each retry attempt gets its own timeout. An elapsed attempt is
    /// treated as a connection failure and is retried.
    pub request_timeout: Duration,

    /// Maximum response body size in bytes (default: 64 MiB)
    pub max_body_size: usize,

    /// User-Agent header value (default: browser-like [`DEFAULT_USER_AGENT`])
    pub user_agent: String,

    /// Retry policy configuration (`None` = single attempt)
    pub retry: Option<RetryConfig>,

    /// Transport security mode (default: `TlsOnly`)
    pub transport: TransportSecurity,

    /// Trust store for requests using [`TlsProfile::Default`](crate::TlsProfile::Default)
    /// (default: `Native`)
    pub tls_roots: TlsRootConfig,

    /// PEM bundle of CA certificates for requests using
    /// [`TlsProfile::Pinned`](crate::TlsProfile::Pinned)
    ///
    /// When `None`, pinned requests fall back to `tls_roots`.
    pub ca_bundle: Option<PathBuf>,

    /// Timeout for idle connections in the pool (default: 90 seconds)
    pub pool_idle_timeout: Option<Duration>,

    /// Maximum number of idle connections per host (default: 8)
    pub pool_max_idle_per_host: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            max_body_size: 64 * 1024 * 1024, // 64 MiB
            user_agent: DEFAULT_USER_AGENT.to_owned(),
            retry: Some(RetryConfig::default()),
            transport: TransportSecurity::TlsOnly,
            tls_roots: TlsRootConfig::default(),
            ca_bundle: None,
            pool_idle_timeout: Some(Duration::from_secs(90)),
            pool_max_idle_per_host: 8,
        }
    }
}

impl TransportConfig {
    /// Create configuration for testing with mock servers (allows insecure HTTP)
    ///
    /// **WARNING**: This configuration allows plain HTTP connections.
    /// Use only for local testing with mock servers, never in production.
    #[must_use]
    pub fn for_testing() -> Self {
        Self {
            request_timeout: Duration::from_secs(10),
            max_body_size: 16 * 1024 * 1024, // 16 MiB
            user_agent: DEFAULT_USER_AGENT.to_owned(),
            retry: Some(RetryConfig::fast()),
            transport: TransportSecurity::AllowInsecureHttp,
            tls_roots: TlsRootConfig::WebPki,
            ca_bundle: None,
            pool_idle_timeout: Some(Duration::from_secs(10)),
            pool_max_idle_per_host: 4,
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn test_retry_config_defaults() {
        let config = RetryConfig::default();
        assert_eq!(config.max_retries, 1);
        assert_eq!(config.delay, Duration::from_millis(500));
    }

    #[test]
    fn test_retry_config_disabled() {
        let config = RetryConfig::disabled();
        assert_eq!(config.max_retries, 0);
    }

    #[test]
    fn test_should_retry_server_errors_only() {
        let config = RetryConfig::default();

        assert!(config.should_retry(RetryTrigger::Status(500), 0));
        assert!(config.should_retry(RetryTrigger::Status(503), 0));
        assert!(config.should_retry(RetryTrigger::Status(599), 0));

        assert!(!config.should_retry(RetryTrigger::Status(200), 0));
        assert!(!config.should_retry(RetryTrigger::Status(201), 0));
        assert!(!config.should_retry(RetryTrigger::Status(400), 0));
        assert!(!config.should_retry(RetryTrigger::Status(401), 0));
        assert!(!config.should_retry(RetryTrigger::Status(429), 0));
        assert!(!config.should_retry(RetryTrigger::Status(600), 0));
    }

    #[test]
    fn test_should_retry_connection_failures() {
        let config = RetryConfig::default();
        assert!(config.should_retry(RetryTrigger::TransportError, 0));
        assert!(config.should_retry(RetryTrigger::Timeout, 0));
        assert!(!config.should_retry(RetryTrigger::NonRetryable, 0));
    }

    #[test]
    fn test_should_retry_stops_when_exhausted() {
        let config = RetryConfig::default();
        assert!(config.should_retry(RetryTrigger::Status(503), 0));
        assert!(!config.should_retry(RetryTrigger::Status(503), 1));
        assert!(!RetryConfig::disabled().should_retry(RetryTrigger::TransportError, 0));
    }

    #[test]
    fn test_transport_config_defaults() {
        let config = TransportConfig::default();
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert_eq!(config.max_body_size, 64 * 1024 * 1024);
        assert_eq!(config.user_agent, DEFAULT_USER_AGENT);
        assert_eq!(config.retry.map(|r| r.max_retries), Some(1));
        assert_eq!(config.transport, TransportSecurity::TlsOnly);
        assert_eq!(config.tls_roots, TlsRootConfig::Native);
        assert!(config.ca_bundle.is_none());
    }

    #[test]
    fn test_transport_config_for_testing() {
        let config = TransportConfig::for_testing();
        assert_eq!(config.transport, TransportSecurity::AllowInsecureHttp);
        assert_eq!(config.tls_roots, TlsRootConfig::WebPki);
        assert_eq!(
            config.retry.map(|r| r.delay),
            Some(Duration::from_millis(1))
        );
    }

    #[test]
    fn test_default_user_agent_is_browser_like() {
        assert!(DEFAULT_USER_AGENT.starts_with("Mozilla/5.0 "));
        assert!(DEFAULT_USER_AGENT.ends_with("Safari/537.36"));
    }
}
