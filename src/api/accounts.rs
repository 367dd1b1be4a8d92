//! Accounts service for banking endpoints.

use crate::auth::Session;
use crate::client::ComdirectClient;
use crate::models::{AccountBalance, Page};
use crate::Result;

const BALANCES_PATH: &str = "banking/clients/user/v2/accounts/balances";

/// Service for bank account operations.
///
/// # Example
///
/// ```no_run
/// # async fn example(ctx: comdirect_rs::AppContext) -> comdirect_rs::Result<()> {
/// for balance in ctx.accounts().balances().await? {
///     println!("{}: {} EUR", balance.account.iban, balance.balance_eur.value);
/// }
/// # Ok(())
/// # }
/// ```
pub struct AccountsService {
    client: ComdirectClient,
    session: Session,
}

impl AccountsService {
    pub(crate) fn new(client: ComdirectClient, session: Session) -> Self {
        Self { client, session }
    }

    /// Get the balances of all accounts.
    pub async fn balances(&self) -> Result<Vec<AccountBalance>> {
        let request_info = self.session.new_request_info().await?;
        let page: Page<AccountBalance> = self
            .client
            .get_json(BALANCES_PATH, &request_info, None)
            .await?;
        Ok(page.values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{activated_context, mock_server};
    use rust_decimal_macros::dec;
    use wiremock::matchers::{header, header_exists, method, path};
    use wiremock::{Mock, ResponseTemplate};

    #[tokio::test]
    async fn test_balances() {
        let server = mock_server().await;
        Mock::given(method("GET"))
            .and(path("/api/banking/clients/user/v2/accounts/balances"))
            .and(header("authorization", "Bearer access"))
            .and(header_exists("x-http-request-info"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "paging": {"index": 0, "matches": 1},
                "values": [{
                    "accountId": "A1",
                    "account": {
                        "accountId": "A1",
                        "accountDisplayId": "123",
                        "currency": "EUR",
                        "clientId": "C1",
                        "iban": "DE00123",
                        "accountType": {"key": "CA", "text": "Girokonto"}
                    },
                    "balance": {"value": "10.50", "unit": "EUR"},
                    "balanceEUR": {"value": "10.50", "unit": "EUR"}
                }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let ctx = activated_context(&server, "S1").await;
        let balances = ctx.accounts().balances().await.unwrap();

        assert_eq!(balances.len(), 1);
        assert_eq!(balances[0].account.iban, "DE00123");
        assert_eq!(balances[0].balance_eur.value, dec!(10.50));
    }

    #[tokio::test]
    async fn test_balances_bad_status() {
        let server = mock_server().await;
        Mock::given(method("GET"))
            .and(path("/api/banking/clients/user/v2/accounts/balances"))
            .respond_with(ResponseTemplate::new(500).set_body_string("oops"))
            .mount(&server)
            .await;

        let ctx = activated_context(&server, "S1").await;
        match ctx.accounts().balances().await {
            Err(crate::Error::Api { status, .. }) => assert_eq!(status, 500),
            other => panic!("expected Api error, got {other:?}"),
        }
    }
}
