//! Error types for the comdirect client and collector.
//!
//! Failures are grouped by the component that raises them so callers can
//! tell a rejected login apart from a lost connection or a provider that
//! kept answering `503`:
//!
//! - [`AuthError`] - OAuth exchanges against the token endpoint
//! - [`SessionError`] - session acquisition and the TAN handshake
//! - [`ExecutorError`] - the retrying HTTP executor
//! - [`ConfigError`] - loading and validating settings
//! - [`SinkError`] - writing data points to the time-series store
//! - [`QuoteError`] - third-party quote lookups
//!
//! Everything converts into the crate-level [`Error`].

use std::path::PathBuf;

use reqwest::StatusCode;
use serde_json::Value;
use thiserror::Error;

use crate::auth::SessionState;

/// A specialized `Result` type for comdirect operations.
pub type Result<T> = std::result::Result<T, Error>;

/// The main error type for all operations in this crate.
#[derive(Error, Debug)]
pub enum Error {
    /// OAuth token exchange failed
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// Session handshake failed
    #[error(transparent)]
    Session(#[from] SessionError),

    /// HTTP execution failed
    #[error(transparent)]
    Executor(#[from] ExecutorError),

    /// Configuration could not be loaded
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Data points could not be written
    #[error(transparent)]
    Sink(#[from] SinkError),

    /// A third-party quote could not be obtained
    #[error(transparent)]
    Quote(#[from] QuoteError),

    /// HTTP request failed outside the executor (body decoding etc.)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// API answered with an unexpected status code
    #[error("API error: status={status}, body={body}")]
    Api {
        /// HTTP status code
        status: u16,
        /// Raw response body for debugging
        body: Value,
    },

    /// The access token was rejected (401)
    #[error("Access token rejected; refresh required")]
    SessionExpired,

    /// Invalid input provided to a function
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// URL parsing error
    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),
}

impl Error {
    /// Returns `true` if the error is worth retrying on the next cycle.
    ///
    /// Transport failures, exhausted retries and server-side statuses are
    /// transient; rejected credentials and broken handshakes are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Executor(err) => err.is_retryable(),
            Error::Auth(AuthError::Network(_)) => true,
            Error::Http(_) | Error::SessionExpired => true,
            Error::Api { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }

    /// Returns `true` if this error must terminate the process when it
    /// happens during start-up.
    ///
    /// A broken login or TAN handshake cannot be recovered without a new
    /// human-gated TAN cycle.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::Auth(_) | Error::Session(_) | Error::Config(_)
        )
    }

    /// Returns `true` if this is an authentication-related error.
    pub fn is_auth_error(&self) -> bool {
        matches!(self, Error::Auth(_) | Error::SessionExpired)
    }

    /// Create an API error from a status and a raw body.
    ///
    /// Bodies that are not JSON are kept as a string value.
    pub(crate) fn from_api_response(status: StatusCode, body: &str) -> Self {
        let body = serde_json::from_str(body).unwrap_or_else(|_| Value::String(body.to_string()));
        Error::Api {
            status: status.as_u16(),
            body,
        }
    }
}

/// Errors raised while exchanging OAuth tokens.
#[derive(Error, Debug)]
pub enum AuthError {
    /// The token endpoint rejected the request
    #[error("Token endpoint rejected the {grant} grant ({status}): {body}")]
    InvalidCredentials {
        /// Grant type that was attempted
        grant: &'static str,
        /// HTTP status code
        status: u16,
        /// Raw response body
        body: String,
    },

    /// The token endpoint could not be reached
    #[error("Network error during OAuth exchange: {0}")]
    Network(#[from] reqwest::Error),

    /// The token endpoint answered with something that is not a token
    #[error("Malformed token response: {0}")]
    MalformedResponse(#[from] serde_json::Error),

    /// The token endpoint address could not be built
    #[error("Invalid token endpoint: {0}")]
    InvalidEndpoint(#[from] url::ParseError),

    /// A token operation was attempted before `connect`
    #[error("No token available; connect first")]
    NotConnected,

    /// The current token carries no refresh value
    #[error("Current token has no refresh value")]
    MissingRefreshToken,
}

/// Errors raised by the session state machine.
#[derive(Error, Debug)]
pub enum SessionError {
    /// Session listing returned no records
    #[error("No session record received")]
    NoSessionRecord,

    /// TAN validation response lacked a usable challenge descriptor
    #[error("Missing authentication-info challenge: {0}")]
    MissingChallenge(String),

    /// The provider refused to activate the session
    #[error("Session activation failed ({status}): {body}")]
    ActivationFailed {
        /// HTTP status code
        status: u16,
        /// Raw response body
        body: String,
    },

    /// A handshake step answered with an unexpected status code
    #[error("Unexpected status {status} while trying to {step}: {body}")]
    UnexpectedStatus {
        /// Handshake step
        step: &'static str,
        /// HTTP status code
        status: u16,
        /// Raw response body
        body: String,
    },

    /// A transition was attempted from the wrong state
    #[error("Invalid session transition: expected {expected:?}, found {actual:?}")]
    InvalidState {
        /// State the transition requires
        expected: SessionState,
        /// State the session is in
        actual: SessionState,
    },

    /// Request info was requested before a session was acquired
    #[error("Session not acquired yet")]
    NotAcquired,

    /// The request could not be executed
    #[error(transparent)]
    Executor(#[from] ExecutorError),

    /// A session payload could not be decoded
    #[error("Malformed session payload: {0}")]
    Malformed(#[from] serde_json::Error),

    /// The response body could not be read
    #[error("Failed to read session response: {0}")]
    Body(#[from] reqwest::Error),
}

/// Errors raised by the retrying HTTP executor.
#[derive(Error, Debug)]
pub enum ExecutorError {
    /// No response at all (connection refused, DNS, timeout, ...)
    #[error("Transport failure: {0}")]
    Transport(#[source] reqwest::Error),

    /// The server kept answering with a retryable status
    ///
    /// The last response is kept so the caller can decide whether it is
    /// still usable.
    #[error("Retries exhausted after {attempts} attempts (last status {status})")]
    RetriesExhausted {
        /// Number of attempts performed
        attempts: u32,
        /// Status of the last response
        status: StatusCode,
        /// The last response received
        response: Box<reqwest::Response>,
    },

    /// The request body is a stream and cannot be replayed
    #[error("Request body cannot be cloned; build it from an in-memory buffer")]
    BodyNotReplayable,

    /// The request could not be built
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// No access token is available yet
    #[error("No access token available")]
    NotAuthenticated,
}

impl ExecutorError {
    /// Returns `true` if the failure may go away on a later attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ExecutorError::Transport(_) | ExecutorError::RetriesExhausted { .. }
        )
    }

    /// Recover the last response of a [`ExecutorError::RetriesExhausted`].
    pub fn into_response(self) -> Option<reqwest::Response> {
        match self {
            ExecutorError::RetriesExhausted { response, .. } => Some(*response),
            _ => None,
        }
    }
}

/// Errors raised while loading settings.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// No configuration file exists at any search location
    #[error("No configuration found (searched: {})", display_paths(.searched))]
    NotFound {
        /// Locations that were tried
        searched: Vec<PathBuf>,
    },

    /// The configuration file could not be read
    #[error("Failed to read {path}: {source}")]
    Read {
        /// File that failed
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The configuration file is not valid TOML for the settings schema
    #[error("Failed to parse {path}: {source}")]
    Parse {
        /// File that failed
        path: PathBuf,
        /// Underlying parse error
        #[source]
        source: toml::de::Error,
    },

    /// A value is present but unusable
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Errors raised by time-series writers.
#[derive(Error, Debug)]
pub enum SinkError {
    /// The store could not be reached
    #[error("Failed to reach time-series store: {0}")]
    Network(#[from] reqwest::Error),

    /// The store refused the write
    #[error("Time-series store rejected write ({status}): {body}")]
    Rejected {
        /// HTTP status code
        status: u16,
        /// Raw response body
        body: String,
    },

    /// The writer cannot be set up with the given settings
    #[error("Invalid sink configuration: {0}")]
    InvalidConfig(String),

    /// A point has no fields and cannot be encoded
    #[error("Data point '{0}' has no fields")]
    EmptyPoint(String),

    /// The sink worker is gone and accepts no more points
    #[error("Point channel closed")]
    Closed,
}

/// Errors raised by the third-party quote source.
#[derive(Error, Debug)]
pub enum QuoteError {
    /// No symbol matches the configured name
    #[error("No symbol found for '{0}'")]
    UnknownTarget(String),

    /// The source returned no price for the symbol
    #[error("No quote available for symbol '{0}'")]
    MissingQuote(String),

    /// The source sent a usage notice instead of data
    #[error("Quote source refused the request: {0}")]
    Throttled(String),
}
