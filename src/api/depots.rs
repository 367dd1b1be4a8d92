//! Depots service for brokerage endpoints.

use crate::auth::Session;
use crate::client::ComdirectClient;
use crate::models::{Depot, DepotId, DepotPositions, Page};
use crate::Result;

/// Service for depot operations.
pub struct DepotsService {
    client: ComdirectClient,
    session: Session,
}

impl DepotsService {
    pub(crate) fn new(client: ComdirectClient, session: Session) -> Self {
        Self { client, session }
    }

    /// List all depots of the user.
    pub async fn list(&self) -> Result<Vec<Depot>> {
        let request_info = self.session.new_request_info().await?;
        let page: Page<Depot> = self
            .client
            .get_json("brokerage/clients/user/v3/depots", &request_info, None)
            .await?;
        Ok(page.values)
    }

    /// Get the positions of a depot.
    ///
    /// # Arguments
    ///
    /// * `depot_id` - The depot to query
    pub async fn positions(&self, depot_id: &DepotId) -> Result<DepotPositions> {
        let request_info = self.session.new_request_info().await?;
        self.client
            .get_json(
                &format!("brokerage/v3/depots/{}/positions", depot_id),
                &request_info,
                None,
            )
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Session;
    use crate::test_support::{activated_context, mock_server, token_store};
    use crate::AppContext;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, ResponseTemplate};

    #[tokio::test]
    async fn test_list_and_positions() {
        let server = mock_server().await;
        Mock::given(method("GET"))
            .and(path("/api/brokerage/clients/user/v3/depots"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "paging": {"index": 0, "matches": 1},
                "values": [{"depotId": "D1", "depotDisplayId": "999", "clientId": "C1", "depotType": "STANDARD_DEPOT"}]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/brokerage/v3/depots/D1/positions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "paging": {"index": 0, "matches": 1},
                "values": [{
                    "depotId": "D1",
                    "positionId": "P1",
                    "wkn": "A0RPWH",
                    "quantity": {"value": "10", "unit": "XXX"},
                    "currentValue": {"value": "1500.00", "unit": "EUR"}
                }]
            })))
            .mount(&server)
            .await;

        let ctx = activated_context(&server, "S1").await;
        let depots = ctx.depots().list().await.unwrap();
        assert_eq!(depots[0].depot_id.as_str(), "D1");

        let positions = ctx.depots().positions(&depots[0].depot_id).await.unwrap();
        assert_eq!(positions.values.len(), 1);
        assert_eq!(positions.values[0].wkn, "A0RPWH");
    }

    #[tokio::test]
    async fn test_requires_acquired_session() {
        let server = mock_server().await;
        let client = crate::ComdirectClient::new(
            crate::test_support::config_for(&server),
            token_store("access").await,
        )
        .unwrap();
        let ctx = AppContext::new(client, Session::new());

        assert!(matches!(
            ctx.depots().list().await,
            Err(crate::Error::Session(crate::error::SessionError::NotAcquired))
        ));
        assert!(server.received_requests().await.unwrap().is_empty());
    }
}
