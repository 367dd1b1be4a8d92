//! Authenticated HTTP client with per-call retry.

use std::sync::Arc;

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Method, Request, RequestBuilder, Response, StatusCode};
use secrecy::ExposeSecret;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::auth::{TokenStore, REQUEST_INFO_HEADER};
use crate::error::ExecutorError;
use crate::{Error, Result};

use super::config::{ClientConfig, RetryPolicy};

/// Handle for authenticated calls against the provider API.
///
/// Every request goes out with the token that is current when the request
/// is executed, plus JSON `Content-Type`/`Accept` headers that the
/// underlying transport adds on its own. Cloning is cheap; clones share the
/// connection pool and the token slot.
///
/// Obtain one from [`TokenManager::connect`](crate::TokenManager::connect).
///
/// # Example
///
/// ```no_run
/// use comdirect_rs::{ComdirectClient, RetryPolicy};
/// use reqwest::{Method, StatusCode};
/// use std::time::Duration;
///
/// # async fn example(client: ComdirectClient) -> Result<(), comdirect_rs::ExecutorError> {
/// let policy = RetryPolicy::new()
///     .retry_on(StatusCode::SERVICE_UNAVAILABLE)
///     .with_max_attempts(3)
///     .with_delay(Duration::from_millis(500));
///
/// let request = client.request(Method::GET, "banking/clients/user/v2/accounts/balances")?;
/// let response = client.send(request, Some(&policy)).await?;
/// println!("{}", response.status());
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct ComdirectClient {
    pub(crate) inner: Arc<ClientInner>,
}

pub(crate) struct ClientInner {
    pub(crate) http: reqwest::Client,
    pub(crate) tokens: TokenStore,
    pub(crate) config: ClientConfig,
}

impl ComdirectClient {
    /// Create a client that authenticates with whatever `tokens` holds.
    pub fn new(config: ClientConfig, tokens: TokenStore) -> std::result::Result<Self, reqwest::Error> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .default_headers(headers)
            .build()?;

        Ok(Self {
            inner: Arc::new(ClientInner {
                http,
                tokens,
                config,
            }),
        })
    }

    /// Client configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// Start a request against an API path.
    pub fn request(&self, method: Method, path: &str) -> std::result::Result<RequestBuilder, ExecutorError> {
        let url = self
            .inner
            .config
            .api_url(path)
            .map_err(|e| ExecutorError::InvalidRequest(format!("{}: {}", path, e)))?;
        Ok(self.inner.http.request(method, url))
    }

    /// Build and execute a request.
    pub async fn send(
        &self,
        builder: RequestBuilder,
        policy: Option<&RetryPolicy>,
    ) -> std::result::Result<Response, ExecutorError> {
        let request = builder
            .build()
            .map_err(|e| ExecutorError::InvalidRequest(e.to_string()))?;
        self.execute(request, policy).await
    }

    /// Execute a request with the given retry policy, or the configured
    /// default policy when `None`.
    ///
    /// The token is read once, so all attempts of one call carry the same
    /// credentials even if a refresh commits in between.
    ///
    /// # Errors
    ///
    /// - [`ExecutorError::Transport`] when no response was received; never retried
    /// - [`ExecutorError::RetriesExhausted`] when every attempt answered with
    ///   a status from the retry set; the last response is attached
    /// - [`ExecutorError::BodyNotReplayable`] for streaming bodies
    pub async fn execute(
        &self,
        request: Request,
        policy: Option<&RetryPolicy>,
    ) -> std::result::Result<Response, ExecutorError> {
        self.inner.execute(request, policy).await
    }

    /// Whether this client authenticates from `store`.
    pub(crate) fn uses_store(&self, store: &TokenStore) -> bool {
        self.inner.tokens.same_as(store)
    }

    /// GET a JSON document, attaching the given request-info header.
    pub(crate) async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        request_info: &str,
        policy: Option<&RetryPolicy>,
    ) -> Result<T> {
        let builder = self
            .request(Method::GET, path)?
            .header(REQUEST_INFO_HEADER, request_info);
        let response = self.send(builder, policy).await?;
        handle_response(response).await
    }
}

impl ClientInner {
    async fn execute(
        &self,
        mut request: Request,
        policy: Option<&RetryPolicy>,
    ) -> std::result::Result<Response, ExecutorError> {
        let policy = policy.unwrap_or(&self.config.default_retry);

        let token = self
            .tokens
            .current()
            .await
            .ok_or(ExecutorError::NotAuthenticated)?;
        let mut bearer = HeaderValue::from_str(&format!("Bearer {}", token.access_token().expose_secret()))
            .map_err(|_| ExecutorError::InvalidRequest("Invalid token format".to_string()))?;
        bearer.set_sensitive(true);
        request.headers_mut().insert(AUTHORIZATION, bearer);

        let max_attempts = policy.max_attempts.max(1);
        let mut attempt = 0;
        loop {
            attempt += 1;
            let this_attempt = request
                .try_clone()
                .ok_or(ExecutorError::BodyNotReplayable)?;

            let response = self
                .http
                .execute(this_attempt)
                .await
                .map_err(ExecutorError::Transport)?;

            let status = response.status();
            if !policy.should_retry_status(status) {
                return Ok(response);
            }

            if attempt >= max_attempts {
                warn!(
                    method = %request.method(),
                    url = %request.url(),
                    %status,
                    attempts = attempt,
                    "retries exhausted"
                );
                return Err(ExecutorError::RetriesExhausted {
                    attempts: attempt,
                    status,
                    response: Box::new(response),
                });
            }

            debug!(
                url = %request.url(),
                %status,
                attempt,
                delay_ms = policy.delay.as_millis() as u64,
                "retrying request"
            );
            tokio::time::sleep(policy.delay).await;
        }
    }
}

/// Decode a `200 OK` JSON body or map the status to an error.
pub(crate) async fn handle_response<T: DeserializeOwned>(response: Response) -> Result<T> {
    let status = response.status();

    if status == StatusCode::OK {
        return Ok(response.json().await?);
    }

    let body = response.text().await.unwrap_or_default();
    if status == StatusCode::UNAUTHORIZED {
        return Err(Error::SessionExpired);
    }
    Err(Error::from_api_response(status, &body))
}

impl std::fmt::Debug for ComdirectClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComdirectClient")
            .field("config", &self.inner.config)
            .finish()
    }
}
