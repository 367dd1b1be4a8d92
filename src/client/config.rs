//! Client configuration options.

use std::time::Duration;

use reqwest::StatusCode;
use url::Url;

/// Default REST API base address.
pub const DEFAULT_API_ADDRESS: &str = "https://api.comdirect.de/api/";

/// Default OAuth token endpoint base address.
pub const DEFAULT_TOKEN_ADDRESS: &str = "https://api.comdirect.de/";

/// Configuration for the comdirect client.
///
/// # Example
///
/// ```
/// use comdirect_rs::ClientConfig;
/// use std::time::Duration;
///
/// let config = ClientConfig::default()
///     .with_timeout(Duration::from_secs(60))
///     .with_user_agent("my-app/1.0");
/// ```
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base address for domain API requests
    pub api_address: Url,
    /// Base address of the OAuth token endpoint
    pub token_address: Url,
    /// Request timeout
    pub timeout: Duration,
    /// User-Agent header value
    pub user_agent: String,
    /// Retry policy used when a call site supplies none
    pub default_retry: RetryPolicy,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_address: parse_base(DEFAULT_API_ADDRESS),
            token_address: parse_base(DEFAULT_TOKEN_ADDRESS),
            timeout: Duration::from_secs(30),
            user_agent: format!("comdirect-rs/{} (Rust)", env!("CARGO_PKG_VERSION")),
            default_retry: RetryPolicy::default(),
        }
    }
}

// Only called with the address constants above.
fn parse_base(s: &str) -> Url {
    Url::parse(s).expect("default address is a valid URL")
}

/// Make sure a base address ends in `/` so that `Url::join` appends
/// instead of replacing the last path segment.
pub(crate) fn normalize_base(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}

impl ClientConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the domain API base address.
    pub fn with_api_address(mut self, url: Url) -> Self {
        self.api_address = normalize_base(url);
        self
    }

    /// Set the token endpoint base address.
    pub fn with_token_address(mut self, url: Url) -> Self {
        self.token_address = normalize_base(url);
        self
    }

    /// Set the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the User-Agent header.
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Set the retry policy used when a call site supplies none.
    pub fn with_default_retry(mut self, retry: RetryPolicy) -> Self {
        self.default_retry = retry;
        self
    }

    /// Full URL of the OAuth token endpoint.
    pub fn token_url(&self) -> Result<Url, url::ParseError> {
        self.token_address.join("oauth/token")
    }

    /// Resolve an API path (with or without a leading `/`) against the
    /// API base address.
    pub fn api_url(&self, path: &str) -> Result<Url, url::ParseError> {
        self.api_address.join(path.trim_start_matches('/'))
    }
}

/// Per-call retry policy of the executor.
///
/// Only HTTP-level outcomes are retried: a response whose status is in
/// the retry set. Transport failures are returned immediately.
///
/// The default retries nothing (empty status set) but keeps 10 attempts
/// with a one second delay ready for call sites that add statuses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// HTTP status codes that trigger another attempt
    pub retry_statuses: Vec<StatusCode>,
    /// Pause between attempts
    pub delay: Duration,
    /// Total number of attempts, including the first
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retry_statuses: Vec::new(),
            delay: Duration::from_secs(1),
            max_attempts: 10,
        }
    }
}

impl RetryPolicy {
    /// Create a policy with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a policy with no retries at all.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Default::default()
        }
    }

    /// Add a status code that triggers a retry.
    pub fn retry_on(mut self, status: StatusCode) -> Self {
        if !self.retry_statuses.contains(&status) {
            self.retry_statuses.push(status);
        }
        self
    }

    /// Set the pause between attempts.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Set the total number of attempts; values below 1 mean 1.
    pub fn with_max_attempts(mut self, max: u32) -> Self {
        self.max_attempts = max.max(1);
        self
    }

    /// Check if a status code should be retried.
    pub fn should_retry_status(&self, status: StatusCode) -> bool {
        self.retry_statuses.contains(&status)
    }
}
