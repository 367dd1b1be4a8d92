//! Account and balance models.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A monetary amount or quantity with its unit.
///
/// The provider encodes values as decimal strings (`{"value": "12.34",
/// "unit": "EUR"}`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Amount {
    /// Numeric value
    #[serde(with = "rust_decimal::serde::str")]
    pub value: Decimal,
    /// Currency code or unit (`EUR`, `XXX` for pieces)
    #[serde(default)]
    pub unit: String,
}

/// Paging metadata of list responses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Paging {
    /// Index of the first returned value
    #[serde(default)]
    pub index: u32,
    /// Total number of matches
    #[serde(default)]
    pub matches: u32,
}

/// Generic paged list response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    /// Paging metadata
    #[serde(default)]
    pub paging: Paging,
    /// Returned values
    #[serde(default = "Vec::new")]
    pub values: Vec<T>,
}

/// Key/text pair used for enumerations such as account types.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyText {
    /// Machine-readable key
    #[serde(default)]
    pub key: String,
    /// Display text
    #[serde(default)]
    pub text: String,
}

/// Bank account master data.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    /// Internal account id
    pub account_id: String,
    /// Account number for display
    #[serde(default)]
    pub account_display_id: String,
    /// Account currency
    #[serde(default)]
    pub currency: String,
    /// Owning client id
    #[serde(default)]
    pub client_id: String,
    /// IBAN of the account
    #[serde(default)]
    pub iban: String,
    /// Type of account (giro, tagesgeld, ...)
    #[serde(default)]
    pub account_type: KeyText,
    /// Granted credit limit
    #[serde(default)]
    pub credit_limit: Option<Amount>,
}

/// Balance of a single bank account.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountBalance {
    /// Internal account id
    pub account_id: String,
    /// Account master data
    pub account: Account,
    /// Balance in account currency
    pub balance: Amount,
    /// Balance converted to EUR
    #[serde(rename = "balanceEUR")]
    pub balance_eur: Amount,
    /// Available cash in account currency
    #[serde(default)]
    pub available_cash_amount: Option<Amount>,
    /// Available cash converted to EUR
    #[serde(default, rename = "availableCashAmountEUR")]
    pub available_cash_amount_eur: Option<Amount>,
}
