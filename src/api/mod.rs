//! API service modules for comdirect endpoints.
//!
//! Each service covers one area of the API. Services attach a fresh
//! request-info header from the session to every call.

mod accounts;
mod depots;

pub use accounts::AccountsService;
pub use depots::DepotsService;
