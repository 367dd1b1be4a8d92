//! Data models for the comdirect API.
//!
//! This module contains the strongly-typed data structures exchanged with
//! the provider. Models are organized by domain:
//!
//! - [`primitives`] - Identifier newtypes like `SessionId`, `DepotId`
//! - [`session`] - Session records, challenge descriptors, request info
//! - [`account`] - Amounts, paging, bank accounts and balances
//! - [`depot`] - Depots and their positions
//! - [`quote`] - Third-party symbol search and quotes

pub mod primitives;
pub mod session;
pub mod account;
pub mod depot;
pub mod quote;

// Re-export commonly used types
pub use primitives::*;
pub use session::*;
pub use account::*;
pub use depot::*;
pub use quote::*;
