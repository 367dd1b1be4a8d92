//! Authentication against the comdirect API.
//!
//! Logging in takes three OAuth exchanges around a two-factor handshake:
//!
//! 1. [`TokenManager::connect`] - password grant, yields a [`ComdirectClient`](crate::ComdirectClient)
//! 2. [`Session::init`] - acquire the session, request a TAN challenge,
//!    wait for approval, activate
//! 3. [`TokenManager::secondary_exchange`] - trade the primary token for a
//!    session-scoped one
//!
//! Afterwards [`TokenManager::refresh`] keeps the token alive.
//!
//! ```no_run
//! use std::time::Duration;
//! use comdirect_rs::{ClientConfig, ClientCredentials, Credentials, Session, TanConfirmation, TokenManager};
//!
//! # async fn example() -> comdirect_rs::Result<()> {
//! let tokens = TokenManager::new(
//!     ClientConfig::default(),
//!     ClientCredentials::new("User_ABC", "client-secret"),
//!     Credentials::new("12345678", "123456"),
//! )?;
//! let client = tokens.connect().await?;
//!
//! let session = Session::new();
//! let confirmation = TanConfirmation::new();
//! session.init(&client, &confirmation, Duration::from_secs(30)).await?;
//!
//! let client = tokens.secondary_exchange(&client).await?;
//! # Ok(())
//! # }
//! ```

mod correlation;
mod credentials;
mod oauth;
mod session;
mod token;

pub use correlation::{Correlation, CorrelationGenerator};
pub use credentials::{ClientCredentials, Credentials};
pub use oauth::{SharedTokenManager, TokenManager};
pub use session::{ConfirmationOutcome, Session, SessionState, TanConfirmation};
pub use token::{CustomerInfo, Grant, Token, TokenStore};
pub(crate) use token::TokenResponse;

/// Header carrying the serialized correlation of a request.
pub const REQUEST_INFO_HEADER: &str = "x-http-request-info";

/// Header carrying the TAN challenge descriptor.
pub const AUTHENTICATION_INFO_HEADER: &str = "x-once-authentication-info";
