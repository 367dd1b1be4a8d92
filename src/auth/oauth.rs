//! OAuth token exchanges against the provider's token endpoint.

use std::sync::Arc;

use reqwest::header::{HeaderValue, ACCEPT};
use secrecy::ExposeSecret;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::client::{ClientConfig, ComdirectClient};
use crate::error::AuthError;

use super::credentials::{ClientCredentials, Credentials};
use super::token::{Grant, Token, TokenResponse, TokenStore};

/// Owner of the current OAuth token.
///
/// The manager performs the three exchanges of the login flow:
///
/// 1. [`connect`](Self::connect) - password grant with account number and PIN
/// 2. [`secondary_exchange`](Self::secondary_exchange) - trade the primary
///    token for a session-scoped one once the TAN handshake is done
/// 3. [`refresh`](Self::refresh) - renew with the refresh grant, driven by
///    the scheduler
///
/// Exchanges are serialized, so token replacements happen in a total order.
/// Readers never block an exchange for longer than the pointer swap.
pub struct TokenManager {
    http: reqwest::Client,
    config: ClientConfig,
    client: ClientCredentials,
    credentials: Credentials,
    store: TokenStore,
    exchange: Mutex<()>,
}

impl TokenManager {
    /// Create a token manager; no request is made until [`connect`](Self::connect).
    pub fn new(
        config: ClientConfig,
        client: ClientCredentials,
        credentials: Credentials,
    ) -> Result<Self, AuthError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build()?;

        Ok(Self {
            http,
            config,
            client,
            credentials,
            store: TokenStore::new(),
            exchange: Mutex::new(()),
        })
    }

    /// Perform the password grant and return the authenticated client.
    ///
    /// # Errors
    ///
    /// - [`AuthError::InvalidCredentials`] if the endpoint answers non-2xx
    /// - [`AuthError::Network`] if the endpoint cannot be reached
    pub async fn connect(&self) -> Result<ComdirectClient, AuthError> {
        let _exchange = self.exchange.lock().await;
        info!(account = %self.credentials.account_id, "starting OAuth password flow");

        let form = [
            ("grant_type", Grant::Password.as_str()),
            ("username", self.credentials.account_id.as_str()),
            ("password", self.credentials.pin.expose_secret()),
            ("client_id", self.client.client_id.as_str()),
            ("client_secret", self.client.client_secret.expose_secret()),
        ];
        let response = self.request_token(Grant::Password, &form).await?;
        let token = self.store.replace(Token::from_response(response, Grant::Password)).await;
        debug!(generation = token.generation(), expires_at = %token.expires_at(), "primary token stored");

        Ok(ComdirectClient::new(self.config.clone(), self.store.clone())?)
    }

    /// Exchange the primary token for a session-scoped token.
    ///
    /// The current access value is sent as a form parameter, not as a
    /// bearer header.
    pub async fn secondary_exchange(
        &self,
        client: &ComdirectClient,
    ) -> Result<ComdirectClient, AuthError> {
        self.ensure_own(client)?;
        let _exchange = self.exchange.lock().await;
        info!("starting OAuth secondary flow");

        let current = self.store.current().await.ok_or(AuthError::NotConnected)?;
        let form = [
            ("grant_type", Grant::Secondary.as_str()),
            ("token", current.access_token().expose_secret()),
            ("client_id", self.client.client_id.as_str()),
            ("client_secret", self.client.client_secret.expose_secret()),
        ];
        let response = self.request_token(Grant::Secondary, &form).await?;

        let mut next = Token::from_response(response, Grant::Secondary);
        next.inherit_refresh(&current);
        let token = self.store.replace(next).await;
        debug!(generation = token.generation(), scope = ?token.scope(), "session token stored");

        Ok(client.clone())
    }

    /// Renew the current token with the refresh grant.
    ///
    /// Requests that already took a snapshot of the old token keep using
    /// it; everything built after this returns sees the new one.
    pub async fn refresh(&self, client: &ComdirectClient) -> Result<ComdirectClient, AuthError> {
        self.ensure_own(client)?;
        let _exchange = self.exchange.lock().await;

        let current = self.store.current().await.ok_or(AuthError::NotConnected)?;
        let refresh_token = current.refresh_token().ok_or(AuthError::MissingRefreshToken)?;
        let form = [
            ("grant_type", Grant::Refresh.as_str()),
            ("refresh_token", refresh_token.expose_secret()),
            ("client_id", self.client.client_id.as_str()),
            ("client_secret", self.client.client_secret.expose_secret()),
        ];
        let response = self.request_token(Grant::Refresh, &form).await?;

        let mut next = Token::from_response(response, Grant::Refresh);
        next.inherit_refresh(&current);
        let token = self.store.replace(next).await;
        info!(generation = token.generation(), expires_at = %token.expires_at(), "token refreshed");

        Ok(client.clone())
    }

    /// Read-only view of the token slot.
    pub fn store(&self) -> &TokenStore {
        &self.store
    }

    /// The OAuth client id.
    pub fn client_id(&self) -> &str {
        self.client.client_id()
    }

    fn ensure_own(&self, client: &ComdirectClient) -> Result<(), AuthError> {
        if client.uses_store(&self.store) {
            Ok(())
        } else {
            Err(AuthError::NotConnected)
        }
    }

    async fn request_token(
        &self,
        grant: Grant,
        form: &[(&str, &str)],
    ) -> Result<TokenResponse, AuthError> {
        let url = self.config.token_url()?;

        let response = self
            .http
            .post(url)
            .header(ACCEPT, HeaderValue::from_static("application/json"))
            .form(form)
            .send()
            .await?;

        let status = response.status();
        debug!(grant = %grant, %status, "token endpoint answered");

        let body = response.text().await?;
        if !status.is_success() {
            return Err(AuthError::InvalidCredentials {
                grant: grant.as_str(),
                status: status.as_u16(),
                body,
            });
        }

        let parsed: TokenResponse = serde_json::from_str(&body)?;
        if parsed.access_token.is_empty() {
            return Err(AuthError::MalformedResponse(serde::de::Error::custom(
                "empty access_token",
            )));
        }
        Ok(parsed)
    }
}

impl std::fmt::Debug for TokenManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenManager")
            .field("client", &self.client)
            .field("credentials", &self.credentials)
            .finish_non_exhaustive()
    }
}

/// Token managers are shared between the init sequence and the refresh task.
pub type SharedTokenManager = Arc<TokenManager>;
