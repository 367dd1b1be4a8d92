//! # comdirect-rs
//!
//! A session-managed Rust client for the comdirect REST API, plus a
//! collector that samples account balances and depot positions into a
//! time-series store.
//!
//! ## Features
//!
//! - **Authentication**: OAuth password, secondary and refresh grants
//! - **Session Handshake**: TAN challenge with out-of-band confirmation
//! - **Resilient Requests**: Per-call retry on configurable status codes
//! - **Scheduling**: Fixed-delay and fixed-rate tasks with graceful shutdown
//! - **Collection**: Balances, depot positions and optional third-party
//!   quotes written as InfluxDB points
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use comdirect_rs::{ClientConfig, ClientCredentials, Credentials, TanConfirmation, TokenManager};
//!
//! #[tokio::main]
//! async fn main() -> comdirect_rs::Result<()> {
//!     let tokens = TokenManager::new(
//!         ClientConfig::default(),
//!         ClientCredentials::new("User_ABC", "client-secret"),
//!         Credentials::new("12345678", "123456"),
//!     )?;
//!
//!     // Confirm from another task once the TAN was approved on the device
//!     let confirmation = TanConfirmation::new();
//!     let ctx = comdirect_rs::app::initialize(&tokens, &confirmation, Duration::from_secs(30)).await?;
//!
//!     for balance in ctx.accounts().balances().await? {
//!         println!("{}: {} EUR", balance.account.iban, balance.balance_eur.value);
//!     }
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![deny(unsafe_code)]

pub mod api;
pub mod app;
pub mod auth;
pub mod client;
pub mod collector;
pub mod config;
pub mod context;
pub mod error;
pub mod logging;
pub mod models;
pub mod scheduler;
pub mod shutdown;
pub mod sink;

#[cfg(test)]
mod test_support;

// Re-export primary types at crate root for convenience
pub use app::Collector;
pub use auth::{ClientCredentials, Credentials, Session, SessionState, TanConfirmation, TokenManager};
pub use client::{ClientConfig, ComdirectClient, RetryPolicy};
pub use config::Settings;
pub use context::{AppContext, RefreshGuard};
pub use error::{Error, ExecutorError, Result};
pub use models::{DepotId, RequestId, SessionId};

/// Prelude module for convenient imports.
///
/// ```rust
/// use comdirect_rs::prelude::*;
/// ```
pub mod prelude {
    pub use crate::app::{initialize, Collector};
    pub use crate::auth::{
        ClientCredentials, Credentials, Session, SessionState, TanConfirmation, TokenManager,
    };
    pub use crate::client::{ClientConfig, ComdirectClient, RetryPolicy};
    pub use crate::context::AppContext;
    pub use crate::error::{Error, ExecutorError, Result};
    pub use crate::models::{AccountBalance, Depot, DepotId, DepotPosition, SessionId};
    pub use crate::scheduler::Scheduler;
    pub use crate::sink::{DataPoint, PointWriter};
}
