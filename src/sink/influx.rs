//! InfluxDB v2 writer.

use async_trait::async_trait;
use reqwest::header::{HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use tracing::debug;
use url::Url;

use super::{line_protocol, DataPoint, PointWriter};
use crate::client::normalize_base;
use crate::error::SinkError;

/// Writes points to an InfluxDB v2 bucket over HTTP.
pub struct InfluxWriter {
    http: reqwest::Client,
    write_url: Url,
    token: SecretString,
}

impl InfluxWriter {
    /// Create a writer for `bucket` in `org` on the server at `url`.
    pub fn new(
        url: Url,
        token: SecretString,
        org: &str,
        bucket: &str,
    ) -> Result<Self, SinkError> {
        let mut write_url = normalize_base(url)
            .join("api/v2/write")
            .map_err(|e| SinkError::InvalidConfig(e.to_string()))?;
        write_url
            .query_pairs_mut()
            .append_pair("org", org)
            .append_pair("bucket", bucket)
            .append_pair("precision", "ns");

        Ok(Self {
            http: reqwest::Client::builder().build()?,
            write_url,
            token,
        })
    }

    /// Full write endpoint, including query parameters.
    pub fn write_url(&self) -> &Url {
        &self.write_url
    }
}

#[async_trait]
impl PointWriter for InfluxWriter {
    async fn write(&self, points: &[DataPoint]) -> Result<(), SinkError> {
        if points.is_empty() {
            return Ok(());
        }
        let body = line_protocol::encode_batch(points)?;

        let mut auth = HeaderValue::from_str(&format!("Token {}", self.token.expose_secret()))
            .map_err(|_| SinkError::InvalidConfig("token contains invalid characters".to_string()))?;
        auth.set_sensitive(true);

        let response = self
            .http
            .post(self.write_url.clone())
            .header(AUTHORIZATION, auth)
            .header(CONTENT_TYPE, "text/plain; charset=utf-8")
            .body(body)
            .send()
            .await?;

        let status = response.status();
        debug!(%status, points = points.len(), "influx write answered");
        if status != StatusCode::NO_CONTENT {
            let body = response.text().await.unwrap_or_default();
            return Err(SinkError::Rejected {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }
}

impl std::fmt::Debug for InfluxWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InfluxWriter")
            .field("write_url", &self.write_url.as_str())
            .field("token", &"[REDACTED]")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use wiremock::matchers::{body_string, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn writer(server: &MockServer) -> InfluxWriter {
        InfluxWriter::new(
            Url::parse(&server.uri()).unwrap(),
            SecretString::from("influx-token".to_string()),
            "home",
            "finance",
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_write_posts_line_protocol() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v2/write"))
            .and(query_param("org", "home"))
            .and(query_param("bucket", "finance"))
            .and(query_param("precision", "ns"))
            .and(header("authorization", "Token influx-token"))
            .and(body_string("Depot,WKN=A0RPWH Value=1500.5 1000000000"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let point = DataPoint::new("Depot")
            .tag("WKN", "A0RPWH")
            .field("Value", 1500.5)
            .at(Utc.timestamp_opt(1, 0).unwrap());
        writer(&server).write(&[point]).await.unwrap();
    }

    #[tokio::test]
    async fn test_write_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v2/write"))
            .respond_with(ResponseTemplate::new(401).set_body_string("unauthorized access"))
            .mount(&server)
            .await;

        let point = DataPoint::new("Account").field("Value", 1.0);
        match writer(&server).write(&[point]).await {
            Err(SinkError::Rejected { status, body }) => {
                assert_eq!(status, 401);
                assert_eq!(body, "unauthorized access");
            }
            other => panic!("expected Rejected, got {other:?}"),
        }
    }

    #[test]
    fn test_debug_redacts_token() {
        let writer = InfluxWriter::new(
            Url::parse("http://localhost:8086").unwrap(),
            SecretString::from("influx-token".to_string()),
            "o",
            "b",
        )
        .unwrap();
        let dbg = format!("{:?}", writer);
        assert!(!dbg.contains("influx-token"));
        assert!(dbg.contains("bucket=b"));
    }
}
