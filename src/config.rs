//! Collector settings.
//!
//! Settings come from a TOML file. Without an explicit path the loader
//! checks, in order:
//!
//! 1. `./config.toml`
//! 2. `$HOME/.config/comdirect/config.toml`
//! 3. `/etc/comdirect/config.toml`
//!
//! The first file that exists wins. Secrets may be left out of the file
//! and supplied through `COMDIRECT_CLIENT_SECRET` and `COMDIRECT_PIN`.
//!
//! ```toml
//! client_id = "User_ABC"
//! client_secret = "..."
//! account_id = "12345678"
//! pin = "123456"
//!
//! [schedule]
//! account_period = 60
//!
//! [influx]
//! url = "http://localhost:8086"
//! token = "..."
//! org = "home"
//! bucket = "finance"
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer};
use tracing::{debug, info};
use url::Url;

use crate::auth::{ClientCredentials, Credentials};
use crate::client::{ClientConfig, RetryPolicy};
use crate::collector::DEFAULT_QUOTE_ADDRESS;
use crate::error::{ConfigError, SinkError};
use crate::logging::{LogFormat, LoggingSettings};
use crate::sink::{InfluxWriter, LogWriter, PointWriter};

/// Name of the settings file in every search directory.
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Environment variable overriding `client_secret`.
pub const CLIENT_SECRET_ENV: &str = "COMDIRECT_CLIENT_SECRET";

/// Environment variable overriding `pin`.
pub const PIN_ENV: &str = "COMDIRECT_PIN";

/// Complete collector settings.
#[derive(Clone, Deserialize)]
pub struct Settings {
    /// Domain API base address
    #[serde(default = "default_api_address")]
    pub api_address: Url,
    /// OAuth token endpoint base address
    #[serde(default = "default_token_address")]
    pub token_address: Url,
    /// OAuth client id
    #[serde(default)]
    pub client_id: String,
    /// OAuth client secret
    #[serde(default = "empty_secret", deserialize_with = "secret")]
    pub client_secret: SecretString,
    /// Account number used for the password grant
    #[serde(default)]
    pub account_id: String,
    /// PIN used for the password grant
    #[serde(default = "empty_secret", deserialize_with = "secret")]
    pub pin: SecretString,
    /// Log filter directive, e.g. `info` or `comdirect_rs=debug`
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Log output format
    #[serde(default)]
    pub log_format: LogFormat,
    /// Task timing
    #[serde(default)]
    pub schedule: ScheduleSettings,
    /// HTTP client options
    #[serde(default)]
    pub http: HttpSettings,
    /// Time-series store; points are only logged when absent
    #[serde(default)]
    pub influx: Option<InfluxSettings>,
    /// Third-party quotes; not polled when absent
    #[serde(default)]
    pub quotes: Option<QuoteSettings>,
}

/// Task timing, all values in seconds.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScheduleSettings {
    /// Token refresh period
    pub refresh_rate: u64,
    /// Delay before the first refresh
    pub refresh_initial_delay: u64,
    /// Pause between account polls
    pub account_period: u64,
    /// Delay before the first account poll
    pub account_initial_delay: u64,
    /// Pause between depot polls
    pub depot_period: u64,
    /// Delay before the first depot poll
    pub depot_initial_delay: u64,
    /// Maximum wait for the TAN confirmation
    pub tan_timeout: u64,
    /// Time in-flight work gets on shutdown
    pub shutdown_grace: u64,
}

impl Default for ScheduleSettings {
    fn default() -> Self {
        Self {
            refresh_rate: 300,
            refresh_initial_delay: 300,
            account_period: 60,
            account_initial_delay: 0,
            depot_period: 60,
            depot_initial_delay: 0,
            tan_timeout: 30,
            shutdown_grace: 5,
        }
    }
}

impl ScheduleSettings {
    /// Token refresh period.
    pub fn refresh_rate(&self) -> Duration {
        Duration::from_secs(self.refresh_rate)
    }

    /// Delay before the first refresh.
    pub fn refresh_initial_delay(&self) -> Duration {
        Duration::from_secs(self.refresh_initial_delay)
    }

    /// Pause between account polls.
    pub fn account_period(&self) -> Duration {
        Duration::from_secs(self.account_period)
    }

    /// Delay before the first account poll.
    pub fn account_initial_delay(&self) -> Duration {
        Duration::from_secs(self.account_initial_delay)
    }

    /// Pause between depot polls.
    pub fn depot_period(&self) -> Duration {
        Duration::from_secs(self.depot_period)
    }

    /// Delay before the first depot poll.
    pub fn depot_initial_delay(&self) -> Duration {
        Duration::from_secs(self.depot_initial_delay)
    }

    /// Maximum wait for the TAN confirmation.
    pub fn tan_timeout(&self) -> Duration {
        Duration::from_secs(self.tan_timeout)
    }

    /// Time in-flight work gets on shutdown.
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace)
    }
}

/// HTTP client options.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpSettings {
    /// Request timeout in seconds
    pub timeout: u64,
    /// User-Agent header; the library default when absent
    pub user_agent: Option<String>,
    /// Status codes retried by default
    pub retry_statuses: Vec<u16>,
    /// Pause between attempts in milliseconds
    pub retry_delay_ms: u64,
    /// Total attempts per call
    pub retry_max_attempts: u32,
}

impl Default for HttpSettings {
    fn default() -> Self {
        let retry = RetryPolicy::default();
        Self {
            timeout: 30,
            user_agent: None,
            retry_statuses: Vec::new(),
            retry_delay_ms: retry.delay.as_millis() as u64,
            retry_max_attempts: retry.max_attempts,
        }
    }
}

/// InfluxDB v2 connection.
#[derive(Clone, Deserialize)]
pub struct InfluxSettings {
    /// Server address
    pub url: Url,
    /// API token
    #[serde(deserialize_with = "secret")]
    pub token: SecretString,
    /// Organization
    pub org: String,
    /// Bucket
    pub bucket: String,
}

/// Alpha Vantage quote polling.
#[derive(Clone, Deserialize)]
pub struct QuoteSettings {
    /// Source address
    #[serde(default = "default_quote_address")]
    pub url: Url,
    /// API key
    #[serde(deserialize_with = "secret")]
    pub api_key: SecretString,
    /// Names to resolve and sample
    #[serde(default)]
    pub targets: Vec<String>,
    /// Pause between polls in seconds
    #[serde(default = "default_quote_period")]
    pub period: u64,
    /// Delay before the first poll in seconds
    #[serde(default)]
    pub initial_delay: u64,
}

impl QuoteSettings {
    /// Pause between polls.
    pub fn period(&self) -> Duration {
        Duration::from_secs(self.period)
    }

    /// Delay before the first poll.
    pub fn initial_delay(&self) -> Duration {
        Duration::from_secs(self.initial_delay)
    }
}

impl std::fmt::Debug for QuoteSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QuoteSettings")
            .field("url", &self.url.as_str())
            .field("api_key", &"[REDACTED]")
            .field("targets", &self.targets)
            .field("period", &self.period)
            .field("initial_delay", &self.initial_delay)
            .finish()
    }
}

impl std::fmt::Debug for InfluxSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InfluxSettings")
            .field("url", &self.url.as_str())
            .field("token", &"[REDACTED]")
            .field("org", &self.org)
            .field("bucket", &self.bucket)
            .finish()
    }
}

impl Settings {
    /// Load settings from `path`, or from the first file in the search
    /// locations when `None`, then apply environment overrides and
    /// validate.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => find_config_file(&search_paths())?,
        };
        let mut settings = Self::from_file(&path)?;
        settings.apply_overrides(|key| std::env::var(key).ok());
        settings.validate()?;
        info!(path = %path.display(), "configuration loaded");
        Ok(settings)
    }

    /// Read and parse one file without overrides or validation.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Replace secrets with values from `lookup` where present.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(secret) = lookup(CLIENT_SECRET_ENV).filter(|s| !s.is_empty()) {
            debug!("client secret taken from environment");
            self.client_secret = SecretString::from(secret);
        }
        if let Some(pin) = lookup(PIN_ENV).filter(|s| !s.is_empty()) {
            debug!("PIN taken from environment");
            self.pin = SecretString::from(pin);
        }
    }

    /// Reject missing credentials and zero periods.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let required = [
            ("client_id", self.client_id.is_empty()),
            ("client_secret", self.client_secret.expose_secret().is_empty()),
            ("account_id", self.account_id.is_empty()),
            ("pin", self.pin.expose_secret().is_empty()),
        ];
        if let Some((key, _)) = required.iter().find(|(_, missing)| *missing) {
            return Err(ConfigError::Invalid(format!("{} must not be empty", key)));
        }

        let periods = [
            ("schedule.refresh_rate", self.schedule.refresh_rate),
            ("schedule.account_period", self.schedule.account_period),
            ("schedule.depot_period", self.schedule.depot_period),
            ("http.timeout", self.http.timeout),
        ];
        if let Some((key, _)) = periods.iter().find(|(_, secs)| *secs == 0) {
            return Err(ConfigError::Invalid(format!("{} must be greater than zero", key)));
        }

        if let Some(quotes) = &self.quotes {
            if quotes.period == 0 {
                return Err(ConfigError::Invalid("quotes.period must be greater than zero".into()));
            }
            if quotes.api_key.expose_secret().is_empty() {
                return Err(ConfigError::Invalid("quotes.api_key must not be empty".into()));
            }
        }

        for status in &self.http.retry_statuses {
            StatusCode::from_u16(*status)
                .map_err(|_| ConfigError::Invalid(format!("{} is not an HTTP status", status)))?;
        }
        Ok(())
    }

    /// HTTP layer configuration.
    pub fn client_config(&self) -> Result<ClientConfig, ConfigError> {
        let mut retry = RetryPolicy::new()
            .with_delay(Duration::from_millis(self.http.retry_delay_ms))
            .with_max_attempts(self.http.retry_max_attempts);
        for status in &self.http.retry_statuses {
            let status = StatusCode::from_u16(*status)
                .map_err(|_| ConfigError::Invalid(format!("{} is not an HTTP status", status)))?;
            retry = retry.retry_on(status);
        }

        let mut config = ClientConfig::default()
            .with_api_address(self.api_address.clone())
            .with_token_address(self.token_address.clone())
            .with_timeout(Duration::from_secs(self.http.timeout))
            .with_default_retry(retry);
        if let Some(agent) = &self.http.user_agent {
            config = config.with_user_agent(agent.clone());
        }
        Ok(config)
    }

    /// OAuth client registration.
    pub fn client_credentials(&self) -> ClientCredentials {
        ClientCredentials::new(self.client_id.clone(), self.client_secret.expose_secret())
    }

    /// Password-grant credentials.
    pub fn credentials(&self) -> Credentials {
        Credentials::new(self.account_id.clone(), self.pin.expose_secret())
    }

    /// Writer for collected points: InfluxDB when configured, the log
    /// otherwise.
    pub fn point_writer(&self) -> Result<Arc<dyn PointWriter>, SinkError> {
        match &self.influx {
            Some(influx) => {
                let writer = InfluxWriter::new(
                    influx.url.clone(),
                    influx.token.clone(),
                    &influx.org,
                    &influx.bucket,
                )?;
                info!(url = %writer.write_url(), "writing points to InfluxDB");
                Ok(Arc::new(writer))
            }
            None => {
                info!("no [influx] section; points are logged only");
                Ok(Arc::new(LogWriter))
            }
        }
    }

    /// Logging configuration.
    pub fn logging(&self) -> LoggingSettings {
        LoggingSettings {
            level: self.log_level.clone(),
            format: self.log_format,
        }
    }
}

impl std::fmt::Debug for Settings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Settings")
            .field("api_address", &self.api_address.as_str())
            .field("token_address", &self.token_address.as_str())
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("account_id", &self.account_id)
            .field("pin", &"[REDACTED]")
            .field("log_level", &self.log_level)
            .field("log_format", &self.log_format)
            .field("schedule", &self.schedule)
            .field("http", &self.http)
            .field("influx", &self.influx)
            .field("quotes", &self.quotes)
            .finish()
    }
}

/// Locations searched when no path is given, in order.
pub fn search_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from(".").join(CONFIG_FILE_NAME)];
    if let Some(home) = dirs::home_dir() {
        paths.push(home.join(".config").join("comdirect").join(CONFIG_FILE_NAME));
    }
    paths.push(PathBuf::from("/etc/comdirect").join(CONFIG_FILE_NAME));
    paths
}

/// First of `candidates` that exists.
pub fn find_config_file(candidates: &[PathBuf]) -> Result<PathBuf, ConfigError> {
    candidates
        .iter()
        .find(|p| p.is_file())
        .cloned()
        .ok_or_else(|| ConfigError::NotFound {
            searched: candidates.to_vec(),
        })
}

fn secret<'de, D>(deserializer: D) -> Result<SecretString, D::Error>
where
    D: Deserializer<'de>,
{
    String::deserialize(deserializer).map(SecretString::from)
}

fn empty_secret() -> SecretString {
    SecretString::from(String::new())
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_api_address() -> Url {
    ClientConfig::default().api_address
}

fn default_token_address() -> Url {
    ClientConfig::default().token_address
}

fn default_quote_address() -> Url {
    // constant is a valid URL
    Url::parse(DEFAULT_QUOTE_ADDRESS).unwrap_or_else(|_| ClientConfig::default().api_address)
}

fn default_quote_period() -> u64 {
    60
}
