//! Depot (brokerage custody account) models.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::account::{Amount, Paging};
use super::primitives::DepotId;

/// Depot master data.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Depot {
    /// Internal depot id
    pub depot_id: DepotId,
    /// Depot number for display
    #[serde(default)]
    pub depot_display_id: String,
    /// Owning client id
    #[serde(default)]
    pub client_id: String,
    /// Depot type
    #[serde(default)]
    pub depot_type: String,
    /// Default settlement account
    #[serde(default)]
    pub default_settlement_account_id: Option<String>,
    /// All settlement accounts
    #[serde(default)]
    pub settlement_account_ids: Vec<String>,
    /// Name of the depot holder
    #[serde(default)]
    pub holder_name: Option<String>,
}

/// A price together with the time it was determined.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceQuote {
    /// Price
    pub price: Amount,
    /// Time of the price (provider format)
    #[serde(default)]
    pub price_date_time: Option<String>,
}

/// Aggregated values over all positions of a depot.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DepotAggregate {
    /// Depot master data
    pub depot: Depot,
    /// Value at previous day's close
    #[serde(default)]
    pub prev_day_value: Option<Amount>,
    /// Current value
    #[serde(default)]
    pub current_value: Option<Amount>,
    /// Purchase value
    #[serde(default)]
    pub purchase_value: Option<Amount>,
    /// Absolute profit/loss since purchase
    #[serde(default)]
    pub profit_loss_purchase_abs: Option<Amount>,
    /// Absolute profit/loss since previous day
    #[serde(default)]
    pub profit_loss_prev_day_abs: Option<Amount>,
    /// Relative profit/loss since purchase, in percent
    #[serde(default, with = "rust_decimal::serde::str_option")]
    pub profit_loss_purchase_rel: Option<Decimal>,
    /// Relative profit/loss since previous day, in percent
    #[serde(default, with = "rust_decimal::serde::str_option")]
    pub profit_loss_prev_day_rel: Option<Decimal>,
}

/// A single position held in a depot.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DepotPosition {
    /// Depot the position belongs to
    pub depot_id: DepotId,
    /// Position id
    pub position_id: String,
    /// German securities identification number
    pub wkn: String,
    /// Custody type
    #[serde(default)]
    pub custody_type: Option<String>,
    /// Held quantity
    pub quantity: Amount,
    /// Quantity available for sale
    #[serde(default)]
    pub available_quantity: Option<Amount>,
    /// Current price
    #[serde(default)]
    pub current_price: Option<PriceQuote>,
    /// Average purchase price
    #[serde(default)]
    pub purchase_price: Option<Amount>,
    /// Previous day's closing price
    #[serde(default)]
    pub prev_day_price: Option<PriceQuote>,
    /// Current value of the position
    pub current_value: Amount,
    /// Purchase value of the position
    #[serde(default)]
    pub purchase_value: Option<Amount>,
    /// Absolute profit/loss since purchase
    #[serde(default)]
    pub profit_loss_purchase_abs: Option<Amount>,
    /// Absolute profit/loss since previous day
    #[serde(default)]
    pub profit_loss_prev_day_abs: Option<Amount>,
    /// Relative profit/loss since purchase, in percent
    #[serde(default, with = "rust_decimal::serde::str_option")]
    pub profit_loss_purchase_rel: Option<Decimal>,
    /// Relative profit/loss since previous day, in percent
    #[serde(default, with = "rust_decimal::serde::str_option")]
    pub profit_loss_prev_day_rel: Option<Decimal>,
    /// Whether the current price could be determined
    #[serde(default)]
    pub current_price_determinable: bool,
}

/// Positions of one depot plus their aggregate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DepotPositions {
    /// Paging metadata
    #[serde(default)]
    pub paging: Paging,
    /// Aggregated depot values
    #[serde(default)]
    pub aggregated: Option<DepotAggregate>,
    /// Individual positions
    #[serde(default)]
    pub values: Vec<DepotPosition>,
}
