//! Account balance poller.

use tracing::info;

use super::{publish, ACCOUNT_MEASUREMENT, VALUE_FIELD};
use crate::context::AppContext;
use crate::models::AccountBalance;
use crate::sink::{DataPoint, PointSender};
use crate::Result;

/// Samples the EUR balance of every account.
#[derive(Debug, Clone)]
pub struct AccountPoller {
    ctx: AppContext,
    points: PointSender,
}

impl AccountPoller {
    /// Create a poller writing into `points`.
    pub fn new(ctx: AppContext, points: PointSender) -> Self {
        Self { ctx, points }
    }

    /// Run one cycle; returns the number of points queued.
    pub async fn poll(&self) -> Result<usize> {
        let balances = {
            let _guard = self.ctx.refresh_guard().poll().await;
            self.ctx.accounts().balances().await?
        };
        let count = publish(&self.points, balance_points(&balances)).await?;
        info!(accounts = count, "account balances collected");
        Ok(count)
    }
}

/// One point per account, tagged by IBAN.
pub fn balance_points(balances: &[AccountBalance]) -> Vec<DataPoint> {
    balances
        .iter()
        .map(|b| {
            DataPoint::new(ACCOUNT_MEASUREMENT)
                .tag("IBAN", b.account.iban.as_str())
                .field(VALUE_FIELD, b.balance_eur.value)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::FieldValue;
    use crate::test_support::{activated_context, mock_server};
    use rust_decimal_macros::dec;
    use tokio::sync::mpsc;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, ResponseTemplate};

    fn balance(iban: &str, eur: &str) -> serde_json::Value {
        serde_json::json!({
            "accountId": iban,
            "account": {
                "accountId": iban,
                "accountDisplayId": "1",
                "currency": "EUR",
                "clientId": "C1",
                "iban": iban,
                "accountType": {"key": "CA", "text": "Girokonto"}
            },
            "balance": {"value": eur, "unit": "EUR"},
            "balanceEUR": {"value": eur, "unit": "EUR"}
        })
    }

    #[tokio::test]
    async fn test_poll_queues_one_point_per_account() {
        let server = mock_server().await;
        Mock::given(method("GET"))
            .and(path("/api/banking/clients/user/v2/accounts/balances"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "paging": {"index": 0, "matches": 2},
                "values": [balance("DE01", "100.25"), balance("DE02", "-3.10")]
            })))
            .mount(&server)
            .await;

        let (tx, mut rx) = mpsc::channel(8);
        let poller = AccountPoller::new(activated_context(&server, "S1").await, tx);

        assert_eq!(poller.poll().await.unwrap(), 2);

        let first = rx.recv().await.unwrap();
        assert_eq!(first.measurement, "Account");
        assert_eq!(first.tags.get("IBAN").map(String::as_str), Some("DE01"));
        assert_eq!(first.fields.get("Value"), Some(&FieldValue::Decimal(dec!(100.25))));
        let second = rx.recv().await.unwrap();
        assert_eq!(second.fields.get("Value"), Some(&FieldValue::Decimal(dec!(-3.10))));
    }

    #[tokio::test]
    async fn test_poll_error_queues_nothing() {
        let server = mock_server().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let (tx, mut rx) = mpsc::channel(8);
        let poller = AccountPoller::new(activated_context(&server, "S1").await, tx);

        assert!(poller.poll().await.is_err());
        drop(poller);
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_closed_sink() {
        let server = mock_server().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "paging": {"index": 0, "matches": 1},
                "values": [balance("DE01", "1")]
            })))
            .mount(&server)
            .await;

        let (tx, rx) = mpsc::channel(8);
        drop(rx);
        let poller = AccountPoller::new(activated_context(&server, "S1").await, tx);

        assert!(matches!(
            poller.poll().await,
            Err(crate::Error::Sink(crate::error::SinkError::Closed))
        ));
    }
}
