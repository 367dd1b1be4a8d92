//! Periodic data collection.
//!
//! The account and depot pollers own an [`AppContext`](crate::AppContext)
//! clone and a [`PointSender`]. One call to `poll` is one cycle: fetch
//! under the shared side of the refresh guard, turn the response into
//! points, hand them to the sink. The quote poller talks to a third-party
//! source and needs no session.

mod account;
mod depot;
mod quote;

pub use account::AccountPoller;
pub use depot::DepotPoller;
pub use quote::{QuotePoller, QuoteSource, DEFAULT_QUOTE_ADDRESS};

use tracing::debug;

use crate::error::SinkError;
use crate::sink::{DataPoint, PointSender};

/// Measurement written for account balances.
pub const ACCOUNT_MEASUREMENT: &str = "Account";

/// Measurement written for depot positions.
pub const DEPOT_MEASUREMENT: &str = "Depot";

/// Measurement written for third-party quotes.
pub const QUOTE_MEASUREMENT: &str = "Quote";

/// Field carrying the sampled value.
pub const VALUE_FIELD: &str = "Value";

async fn publish(points: &PointSender, batch: Vec<DataPoint>) -> Result<usize, SinkError> {
    let count = batch.len();
    for point in batch {
        points.send(point).await.map_err(|_| SinkError::Closed)?;
    }
    debug!(points = count, "points queued");
    Ok(count)
}
