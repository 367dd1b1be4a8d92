//! End-to-end start-up against a mock provider.
//!
//! Covers the whole init sequence: password grant, session lookup, TAN
//! challenge, confirmation, activation and the secondary exchange.
//!
//! Run with: cargo test --test session_flow

use std::sync::Once;
use std::time::Duration;

use tracing_subscriber::EnvFilter;
use url::Url;
use wiremock::matchers::{body_string_contains, header, header_exists, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use comdirect_rs::auth::{AUTHENTICATION_INFO_HEADER, REQUEST_INFO_HEADER};
use comdirect_rs::error::SessionError;
use comdirect_rs::prelude::*;

static INIT: Once = Once::new();

/// Initialize logging for tests
fn init_logging() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

fn token_manager(server: &MockServer) -> TokenManager {
    let config = ClientConfig::default()
        .with_token_address(Url::parse(&server.uri()).unwrap())
        .with_api_address(Url::parse(&format!("{}/api", server.uri())).unwrap());
    TokenManager::new(
        config,
        ClientCredentials::new("User_ABC", "client-secret"),
        Credentials::new("12345678", "123456"),
    )
    .unwrap()
}

fn token_body(access: &str, refresh: Option<&str>) -> serde_json::Value {
    let mut body = serde_json::json!({
        "access_token": access,
        "token_type": "bearer",
        "expires_in": 599,
        "scope": "TWO_FACTOR",
        "kdnr": "1234567890",
        "bpid": 123,
        "kontaktId": 456
    });
    if let Some(refresh) = refresh {
        body["refresh_token"] = refresh.into();
    }
    body
}

async fn mount_password_grant(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .and(body_string_contains("grant_type=password"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body("primary", Some("refresh-1"))))
        .expect(1)
        .mount(server)
        .await;
}

async fn mount_session_list(server: &MockServer, records: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path("/api/session/clients/user/v1/sessions"))
        .and(header("authorization", "Bearer primary"))
        .and(header_exists(REQUEST_INFO_HEADER))
        .respond_with(ResponseTemplate::new(200).set_body_json(records))
        .expect(1)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_full_init_sequence() {
    init_logging();
    let server = MockServer::start().await;

    mount_password_grant(&server).await;
    mount_session_list(&server, serde_json::json!([{"identifier": "SID-1"}])).await;
    Mock::given(method("POST"))
        .and(path("/api/session/clients/user/v1/sessions/SID-1/validate"))
        .respond_with(ResponseTemplate::new(201).insert_header(
            AUTHENTICATION_INFO_HEADER,
            r#"{"id":"CH-7","typ":"P_TAN_PUSH","challenge":"approve","availableTypes":["P_TAN_PUSH"]}"#,
        ))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/api/session/clients/user/v1/sessions/SID-1"))
        .and(header(AUTHENTICATION_INFO_HEADER, r#"{"id":"CH-7"}"#))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "identifier": "SID-1", "sessionTanActive": true, "activated2FA": true
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .and(body_string_contains("grant_type=cd_secondary"))
        .and(body_string_contains("token=primary"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body("secondary", None)))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/banking/clients/user/v2/accounts/balances"))
        .and(header("authorization", "Bearer secondary"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "paging": {"index": 0, "matches": 0},
            "values": []
        })))
        .expect(1)
        .mount(&server)
        .await;

    let tokens = token_manager(&server);
    let confirmation = TanConfirmation::new();
    let confirm = confirmation.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        confirm.confirm();
    });

    let ctx = initialize(&tokens, &confirmation, Duration::from_secs(5))
        .await
        .unwrap();

    assert_eq!(ctx.session().state().await, SessionState::Activated);
    assert_eq!(ctx.session().session_id().await.unwrap().as_str(), "SID-1");

    let token = tokens.store().current().await.unwrap();
    assert!(token.has_refresh_token());
    assert_eq!(token.customer().unwrap().customer_number.as_deref(), Some("1234567890"));

    // requests built after init use the session-scoped token
    assert!(ctx.accounts().balances().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_no_session_record_stops_before_tan() {
    init_logging();
    let server = MockServer::start().await;
    mount_password_grant(&server).await;
    mount_session_list(&server, serde_json::json!([])).await;

    let tokens = token_manager(&server);
    let confirmation = TanConfirmation::new();
    confirmation.confirm();

    let err = initialize(&tokens, &confirmation, Duration::from_secs(1))
        .await
        .unwrap_err();

    assert!(err.is_fatal());
    assert!(matches!(err, Error::Session(SessionError::NoSessionRecord)));
    let requests = server.received_requests().await.unwrap();
    assert!(requests.iter().all(|r| !r.url.path().ends_with("/validate")));
}

#[tokio::test]
async fn test_missing_challenge_stops_before_activation() {
    init_logging();
    let server = MockServer::start().await;
    mount_password_grant(&server).await;
    mount_session_list(&server, serde_json::json!([{"identifier": "SID-1"}])).await;
    Mock::given(method("POST"))
        .and(path("/api/session/clients/user/v1/sessions/SID-1/validate"))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    let tokens = token_manager(&server);
    let confirmation = TanConfirmation::new();
    confirmation.confirm();

    let err = initialize(&tokens, &confirmation, Duration::from_secs(1))
        .await
        .unwrap_err();

    assert!(err.is_fatal());
    assert!(matches!(err, Error::Session(SessionError::MissingChallenge(_))));
    let requests = server.received_requests().await.unwrap();
    assert!(requests.iter().all(|r| r.method.as_str() != "PATCH"));
    assert!(requests
        .iter()
        .all(|r| !String::from_utf8_lossy(&r.body).contains("cd_secondary")));
}

#[tokio::test]
async fn test_rejected_credentials_are_fatal() {
    init_logging();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(ResponseTemplate::new(401).set_body_string(r#"{"error":"invalid_grant"}"#))
        .expect(1)
        .mount(&server)
        .await;

    let tokens = token_manager(&server);
    let err = initialize(&tokens, &TanConfirmation::new(), Duration::from_secs(1))
        .await
        .unwrap_err();

    assert!(err.is_fatal());
    assert!(err.is_auth_error());
    assert_eq!(server.received_requests().await.unwrap().len(), 1);
}
