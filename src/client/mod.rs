//! HTTP layer for the comdirect API.
//!
//! [`ComdirectClient`] executes requests with the current token, JSON
//! headers and an optional per-call [`RetryPolicy`].
//!
//! # Example
//!
//! ```no_run
//! use comdirect_rs::{ClientConfig, RetryPolicy};
//! use reqwest::StatusCode;
//! use std::time::Duration;
//!
//! let config = ClientConfig::default()
//!     .with_timeout(Duration::from_secs(10))
//!     .with_default_retry(
//!         RetryPolicy::new()
//!             .retry_on(StatusCode::SERVICE_UNAVAILABLE)
//!             .with_max_attempts(3),
//!     );
//! ```

mod config;
mod http;

pub use config::{ClientConfig, RetryPolicy, DEFAULT_API_ADDRESS, DEFAULT_TOKEN_ADDRESS};
pub(crate) use config::normalize_base;
pub use http::ComdirectClient;
