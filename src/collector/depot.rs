//! Depot position poller.

use tracing::{info, warn};

use super::{publish, DEPOT_MEASUREMENT, VALUE_FIELD};
use crate::context::AppContext;
use crate::models::{DepotId, DepotPosition};
use crate::sink::{DataPoint, PointSender};
use crate::Result;

/// Samples the current value of every position in one depot.
#[derive(Debug, Clone)]
pub struct DepotPoller {
    ctx: AppContext,
    points: PointSender,
    depot_id: DepotId,
}

impl DepotPoller {
    /// Create a poller for a known depot.
    pub fn new(ctx: AppContext, points: PointSender, depot_id: DepotId) -> Self {
        Self {
            ctx,
            points,
            depot_id,
        }
    }

    /// Look up the user's depots and build a poller for the first one.
    ///
    /// Returns `None` when the user has no depot.
    pub async fn discover(ctx: AppContext, points: PointSender) -> Result<Option<Self>> {
        let depots = {
            let _guard = ctx.refresh_guard().poll().await;
            ctx.depots().list().await?
        };
        let mut depots = depots.into_iter();
        let Some(first) = depots.next() else {
            warn!("no depot found; depot collection disabled");
            return Ok(None);
        };
        let skipped = depots.len();
        if skipped > 0 {
            warn!(depot_id = %first.depot_id, skipped, "several depots found; collecting the first only");
        }
        Ok(Some(Self::new(ctx, points, first.depot_id)))
    }

    /// The depot being sampled.
    pub fn depot_id(&self) -> &DepotId {
        &self.depot_id
    }

    /// Run one cycle; returns the number of points queued.
    pub async fn poll(&self) -> Result<usize> {
        let positions = {
            let _guard = self.ctx.refresh_guard().poll().await;
            self.ctx.depots().positions(&self.depot_id).await?
        };
        let count = publish(&self.points, position_points(&positions.values)).await?;
        info!(depot_id = %self.depot_id, positions = count, "depot positions collected");
        Ok(count)
    }
}

/// One point per position, tagged by WKN.
pub fn position_points(positions: &[DepotPosition]) -> Vec<DataPoint> {
    positions
        .iter()
        .map(|p| {
            DataPoint::new(DEPOT_MEASUREMENT)
                .tag("WKN", p.wkn.as_str())
                .field(VALUE_FIELD, p.current_value.value)
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

    fn depot(id: &str) -> serde_json::Value {
        serde_json::json!({
            "depotId": id,
            "depotDisplayId": "900",
            "clientId": "C1",
            "depotType": "CLIENT_DEPOT",
            "settlementAccountIds": []
        })
    }

    async fn mount_depots(server: &wiremock::MockServer, values: Vec<serde_json::Value>) {
        Mock::given(method("GET"))
            .and(path("/api/brokerage/clients/user/v3/depots"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "paging": {"index": 0, "matches": values.len()},
                "values": values
            })))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_discover_picks_first_depot() {
        let server = mock_server().await;
        mount_depots(&server, vec![depot("D1"), depot("D2")]).await;

        let (tx, _rx) = mpsc::channel(8);
        let poller = DepotPoller::discover(activated_context(&server, "S1").await, tx)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(poller.depot_id().as_str(), "D1");
    }

    #[tokio::test]
    async fn test_discover_without_depot() {
        let server = mock_server().await;
        mount_depots(&server, vec![]).await;

        let (tx, _rx) = mpsc::channel(8);
        let poller = DepotPoller::discover(activated_context(&server, "S1").await, tx)
            .await
            .unwrap();
        assert!(poller.is_none());
    }

    #[tokio::test]
    async fn test_poll_queues_one_point_per_position() {
        let server = mock_server().await;
        Mock::given(method("GET"))
            .and(path("/api/brokerage/v3/depots/D1/positions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "paging": {"index": 0, "matches": 1},
                "values": [{
                    "depotId": "D1",
                    "positionId": "P1",
                    "wkn": "A0RPWH",
                    "quantity": {"value": "10", "unit": "XXX"},
                    "currentValue": {"value": "845.30", "unit": "EUR"}
                }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let (tx, mut rx) = mpsc::channel(8);
        let poller = DepotPoller::new(
            activated_context(&server, "S1").await,
            tx,
            DepotId::new("D1"),
        );

        assert_eq!(poller.poll().await.unwrap(), 1);
        let point = rx.recv().await.unwrap();
        assert_eq!(point.measurement, "Depot");
        assert_eq!(point.tags.get("WKN").map(String::as_str), Some("A0RPWH"));
        assert_eq!(point.fields.get("Value"), Some(&FieldValue::Decimal(dec!(845.30))));
    }
}
