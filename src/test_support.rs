//! Fixtures shared by unit tests.

use url::Url;
use wiremock::MockServer;

use crate::auth::{Grant, Session, SessionState, Token, TokenResponse, TokenStore};
use crate::client::{ClientConfig, ComdirectClient};
use crate::context::AppContext;

pub(crate) async fn mock_server() -> MockServer {
    MockServer::start().await
}

/// Config with both base addresses on the mock server, API under `/api`.
pub(crate) fn config_for(server: &MockServer) -> ClientConfig {
    ClientConfig::default()
        .with_api_address(Url::parse(&format!("{}/api", server.uri())).unwrap())
        .with_token_address(Url::parse(&server.uri()).unwrap())
}

pub(crate) fn token_response(access: &str) -> TokenResponse {
    TokenResponse {
        access_token: access.to_string(),
        token_type: Some("bearer".to_string()),
        refresh_token: Some("refresh".to_string()),
        expires_in: Some(599),
        scope: None,
        customer_number: None,
        bpid: None,
        contact_id: None,
    }
}

pub(crate) async fn token_store(access: &str) -> TokenStore {
    let store = TokenStore::new();
    store
        .replace(Token::from_response(token_response(access), Grant::Password))
        .await;
    store
}

/// Context with token `access` and an activated session `session_id`.
pub(crate) async fn activated_context(server: &MockServer, session_id: &str) -> AppContext {
    let client = ComdirectClient::new(config_for(server), token_store("access").await).unwrap();
    AppContext::new(client, Session::with_state(session_id, SessionState::Activated))
}
