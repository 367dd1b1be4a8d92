//! Third-party quote poller.
//!
//! Configured targets are free-text names ("Apple", "MSCI World"). Each
//! name is resolved to a ticker symbol once through the source's symbol
//! search; the mapping is cached for the life of the process.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use reqwest::StatusCode;
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use url::Url;

use super::{publish, QUOTE_MEASUREMENT, VALUE_FIELD};
use crate::client::normalize_base;
use crate::error::QuoteError;
use crate::models::{GlobalQuoteResponse, SymbolSearch};
use crate::sink::{DataPoint, PointSender};
use crate::{Error, Result};

/// Default Alpha Vantage address.
pub const DEFAULT_QUOTE_ADDRESS: &str = "https://www.alphavantage.co/";

/// Alpha Vantage query client with a symbol cache.
pub struct QuoteSource {
    http: reqwest::Client,
    query_url: Url,
    api_key: SecretString,
    symbols: RwLock<HashMap<String, String>>,
}

impl QuoteSource {
    /// Create a source querying `base` with `api_key`.
    pub fn new(base: Url, api_key: SecretString, timeout: Duration) -> Result<Self> {
        let query_url = normalize_base(base).join("query")?;
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            query_url,
            api_key,
            symbols: RwLock::new(HashMap::new()),
        })
    }

    /// Resolve a target name to its best-matching symbol.
    pub async fn lookup_symbol(&self, name: &str) -> Result<String> {
        if let Some(symbol) = self.symbols.read().await.get(name) {
            return Ok(symbol.clone());
        }

        let search: SymbolSearch = self
            .query(&[("function", "SYMBOL_SEARCH"), ("keywords", name)])
            .await?;
        let Some(best) = search.best_matches.into_iter().next() else {
            return Err(match search.note {
                Some(note) => QuoteError::Throttled(note),
                None => QuoteError::UnknownTarget(name.to_string()),
            }
            .into());
        };

        info!(name, symbol = %best.symbol, "symbol resolved");
        self.symbols
            .write()
            .await
            .insert(name.to_string(), best.symbol.clone());
        Ok(best.symbol)
    }

    /// Latest price of `symbol`.
    pub async fn price(&self, symbol: &str) -> Result<Decimal> {
        let response: GlobalQuoteResponse = self
            .query(&[("function", "GLOBAL_QUOTE"), ("symbol", symbol)])
            .await?;
        if let Some(price) = response.quote.and_then(|q| q.price) {
            debug!(symbol, %price, "quote received");
            return Ok(price);
        }
        Err(match response.note {
            Some(note) => QuoteError::Throttled(note),
            None => QuoteError::MissingQuote(symbol.to_string()),
        }
        .into())
    }

    async fn query<T: DeserializeOwned>(&self, params: &[(&str, &str)]) -> Result<T> {
        let response = self
            .http
            .get(self.query_url.clone())
            .query(params)
            .query(&[("apikey", self.api_key.expose_secret())])
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if status != StatusCode::OK {
            return Err(Error::from_api_response(status, &body));
        }
        Ok(serde_json::from_str(&body)?)
    }
}

impl std::fmt::Debug for QuoteSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QuoteSource")
            .field("query_url", &self.query_url.as_str())
            .field("api_key", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

/// Samples the price of every configured target.
#[derive(Debug, Clone)]
pub struct QuotePoller {
    source: Arc<QuoteSource>,
    targets: Vec<String>,
    points: PointSender,
}

impl QuotePoller {
    /// Create a poller for `targets`.
    pub fn new(source: Arc<QuoteSource>, targets: Vec<String>, points: PointSender) -> Self {
        Self {
            source,
            targets,
            points,
        }
    }

    /// Run one cycle; returns the number of points queued.
    ///
    /// A target that fails is logged and skipped. The cycle fails only
    /// when no target produced a quote.
    pub async fn poll(&self) -> Result<usize> {
        let mut batch = Vec::with_capacity(self.targets.len());
        let mut last_error = None;
        for target in &self.targets {
            match self.sample(target).await {
                Ok(point) => batch.push(point),
                Err(err) => {
                    warn!(name = %target, error = %err, "quote skipped");
                    last_error = Some(err);
                }
            }
        }

        if batch.is_empty() {
            if let Some(err) = last_error {
                return Err(err);
            }
        }
        let count = publish(&self.points, batch).await?;
        info!(quotes = count, "quotes collected");
        Ok(count)
    }

    async fn sample(&self, target: &str) -> Result<DataPoint> {
        let symbol = self.source.lookup_symbol(target).await?;
        let price = self.source.price(&symbol).await?;
        Ok(DataPoint::new(QUOTE_MEASUREMENT)
            .tag("Symbol", symbol)
            .field(VALUE_FIELD, price))
    }
}
