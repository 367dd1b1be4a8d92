//! Session acquisition and the TAN handshake.

use std::sync::Arc;
use std::time::Duration;

use reqwest::{Method, Response, StatusCode};
use tokio::sync::{Notify, RwLock};
use tracing::{debug, info, warn};

use crate::client::ComdirectClient;
use crate::error::SessionError;
use crate::models::{AuthenticationInfo, ChallengeId, SessionId, SessionRecord};

use super::correlation::{Correlation, CorrelationGenerator};
use super::{AUTHENTICATION_INFO_HEADER, REQUEST_INFO_HEADER};

const SESSIONS_PATH: &str = "session/clients/user/v1/sessions";

/// Position of a [`Session`] in the handshake.
///
/// Transitions only move forward:
/// `Uninitialized -> SessionAcquired -> TanPending -> TanValidated -> Activated`.
/// A failed step moves the session to `Failed`, which is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Nothing has been requested yet
    Uninitialized,
    /// A server-issued session id is known
    SessionAcquired,
    /// A TAN challenge is outstanding
    TanPending,
    /// The confirmation wait is over
    TanValidated,
    /// Two-factor activation is complete
    Activated,
    /// A handshake step failed
    Failed,
}

/// Result of waiting for the TAN confirmation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmationOutcome {
    /// The confirmation event arrived
    Confirmed,
    /// The timeout elapsed first
    TimedOut,
}

/// Out-of-band "TAN approved" event.
///
/// Cloned handles share one event. A confirmation delivered before anyone
/// waits is kept and consumed by the next wait.
///
/// ```
/// use comdirect_rs::TanConfirmation;
///
/// let confirmation = TanConfirmation::new();
/// let trigger = confirmation.clone();
/// // e.g. from a signal handler
/// trigger.confirm();
/// ```
#[derive(Debug, Clone, Default)]
pub struct TanConfirmation {
    notify: Arc<Notify>,
}

impl TanConfirmation {
    /// Create a new, unconfirmed event.
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver the confirmation.
    pub fn confirm(&self) {
        self.notify.notify_one();
    }

    async fn wait(&self, timeout: Duration) -> ConfirmationOutcome {
        match tokio::time::timeout(timeout, self.notify.notified()).await {
            Ok(()) => ConfirmationOutcome::Confirmed,
            Err(_) => ConfirmationOutcome::TimedOut,
        }
    }
}

/// The authenticated session with the provider.
///
/// A session is acquired once per process and taken through the TAN
/// handshake by [`init`](Session::init). Afterwards it only hands out
/// request-info header values; nothing outside this type changes its
/// identifier or state.
///
/// `Session` is cheap to clone; clones share state.
#[derive(Clone)]
pub struct Session {
    inner: Arc<RwLock<SessionInner>>,
}

struct SessionInner {
    state: SessionState,
    correlation: CorrelationGenerator,
    session_id: Option<SessionId>,
    challenge: Option<AuthenticationInfo>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    /// Create an uninitialized session with a client-generated tracing id.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(SessionInner {
                state: SessionState::Uninitialized,
                correlation: CorrelationGenerator::client_generated(),
                session_id: None,
                challenge: None,
            })),
        }
    }

    /// Current handshake state.
    pub async fn state(&self) -> SessionState {
        self.inner.read().await.state
    }

    /// Server-issued session id, once acquired.
    pub async fn session_id(&self) -> Option<SessionId> {
        self.inner.read().await.session_id.clone()
    }

    /// Outstanding challenge, while the TAN is pending or being validated.
    pub async fn challenge(&self) -> Option<AuthenticationInfo> {
        self.inner.read().await.challenge.clone()
    }

    /// Generator for correlations under the current session id.
    ///
    /// Before a session is acquired this carries the client-generated id.
    pub async fn correlation(&self) -> CorrelationGenerator {
        self.inner.read().await.correlation.clone()
    }

    /// Serialized request-info header value with a fresh request id.
    ///
    /// # Errors
    ///
    /// [`SessionError::NotAcquired`] until a session has been acquired.
    pub async fn new_request_info(&self) -> Result<String, SessionError> {
        let inner = self.inner.read().await;
        if inner.session_id.is_none() {
            return Err(SessionError::NotAcquired);
        }
        Ok(inner.correlation.next().header_value())
    }

    /// Run the whole handshake: acquire, request the TAN challenge, wait
    /// for confirmation (or `tan_timeout`), activate.
    ///
    /// Any failure leaves the session in [`SessionState::Failed`].
    pub async fn init(
        &self,
        client: &ComdirectClient,
        confirmation: &TanConfirmation,
        tan_timeout: Duration,
    ) -> Result<(), SessionError> {
        self.acquire_session(client).await?;
        self.request_tan_challenge(client).await?;
        self.await_confirmation(confirmation, tan_timeout).await?;
        self.activate_session(client).await
    }

    /// List the user's sessions and adopt the first record's identifier.
    ///
    /// # Errors
    ///
    /// [`SessionError::NoSessionRecord`] if the list is empty.
    pub async fn acquire_session(&self, client: &ComdirectClient) -> Result<SessionId, SessionError> {
        let correlation = {
            let inner = self.inner.read().await;
            expect_state(&inner, SessionState::Uninitialized)?;
            inner.correlation.next()
        };

        let result = self.list_sessions(client, &correlation).await;
        let mut inner = self.inner.write().await;
        match result {
            Ok(id) => {
                info!(session_id = %id, "session acquired");
                inner.correlation = CorrelationGenerator::new(id.clone());
                inner.session_id = Some(id.clone());
                inner.state = SessionState::SessionAcquired;
                Ok(id)
            }
            Err(err) => {
                inner.state = SessionState::Failed;
                Err(err)
            }
        }
    }

    /// Ask the provider to start a TAN challenge for the session.
    ///
    /// # Errors
    ///
    /// [`SessionError::MissingChallenge`] if the response carries no usable
    /// challenge descriptor.
    pub async fn request_tan_challenge(
        &self,
        client: &ComdirectClient,
    ) -> Result<AuthenticationInfo, SessionError> {
        let (session_id, correlation) = {
            let inner = self.inner.read().await;
            expect_state(&inner, SessionState::SessionAcquired)?;
            (acquired_id(&inner)?, inner.correlation.next())
        };

        let result = self.validate(client, &session_id, &correlation).await;
        let mut inner = self.inner.write().await;
        match result {
            Ok(challenge) => {
                info!(
                    session_id = %session_id,
                    challenge_type = challenge.challenge_type.as_deref().unwrap_or("unknown"),
                    challenge = challenge.challenge.as_deref().unwrap_or(""),
                    "TAN challenge issued; waiting for approval"
                );
                inner.challenge = Some(challenge.clone());
                inner.state = SessionState::TanPending;
                Ok(challenge)
            }
            Err(err) => {
                inner.state = SessionState::Failed;
                Err(err)
            }
        }
    }

    /// Wait for the confirmation event or the timeout, whichever is first.
    ///
    /// Both outcomes move on to activation; the provider itself checks
    /// whether the TAN was approved.
    pub async fn await_confirmation(
        &self,
        confirmation: &TanConfirmation,
        timeout: Duration,
    ) -> Result<ConfirmationOutcome, SessionError> {
        expect_state(&*self.inner.read().await, SessionState::TanPending)?;

        let outcome = confirmation.wait(timeout).await;
        match outcome {
            ConfirmationOutcome::Confirmed => info!("TAN confirmation received"),
            ConfirmationOutcome::TimedOut => {
                info!(timeout_secs = timeout.as_secs(), "TAN wait elapsed; attempting activation")
            }
        }

        let mut inner = self.inner.write().await;
        expect_state(&inner, SessionState::TanPending)?;
        inner.state = SessionState::TanValidated;
        Ok(outcome)
    }

    /// Present the challenge id back and finish two-factor activation.
    ///
    /// # Errors
    ///
    /// [`SessionError::ActivationFailed`] on any status but 200.
    pub async fn activate_session(&self, client: &ComdirectClient) -> Result<(), SessionError> {
        let (session_id, challenge, correlation) = {
            let inner = self.inner.read().await;
            expect_state(&inner, SessionState::TanValidated)?;
            let challenge = inner
                .challenge
                .as_ref()
                .and_then(|c| c.id.clone())
                .filter(|id| !id.is_empty())
                .ok_or_else(|| SessionError::MissingChallenge("no challenge id recorded".to_string()))?;
            (acquired_id(&inner)?, challenge, inner.correlation.next())
        };

        let result = self.activate(client, &session_id, challenge, &correlation).await;
        let mut inner = self.inner.write().await;
        match result {
            Ok(record) => {
                if let Some(record) = record.filter(|r| !r.identifier.as_str().is_empty()) {
                    if record.identifier != session_id {
                        debug!(old = %session_id, new = %record.identifier, "activation changed session id");
                        inner.correlation = CorrelationGenerator::new(record.identifier.clone());
                        inner.session_id = Some(record.identifier);
                    }
                }
                inner.challenge = None;
                inner.state = SessionState::Activated;
                info!(session_id = ?inner.session_id, "session activated");
                Ok(())
            }
            Err(err) => {
                inner.state = SessionState::Failed;
                Err(err)
            }
        }
    }

    async fn list_sessions(
        &self,
        client: &ComdirectClient,
        correlation: &Correlation,
    ) -> Result<SessionId, SessionError> {
        let request = client
            .request(Method::GET, SESSIONS_PATH)?
            .header(REQUEST_INFO_HEADER, correlation.header_value());
        let response = client.send(request, None).await?;
        let body = expect_status(response, StatusCode::OK, "list sessions").await?;

        let records: Vec<SessionRecord> = serde_json::from_str(&body)?;
        if records.len() > 1 {
            warn!(count = records.len(), "more than one session record; using the first");
        }
        records
            .into_iter()
            .next()
            .map(|r| r.identifier)
            .ok_or(SessionError::NoSessionRecord)
    }

    async fn validate(
        &self,
        client: &ComdirectClient,
        session_id: &SessionId,
        correlation: &Correlation,
    ) -> Result<AuthenticationInfo, SessionError> {
        let body = serde_json::to_string(&SessionRecord::tan_activation(session_id.clone()))?;
        let request = client
            .request(Method::POST, &format!("{}/{}/validate", SESSIONS_PATH, session_id))?
            .header(REQUEST_INFO_HEADER, correlation.header_value())
            .body(body);
        let response = client.send(request, None).await?;

        let header = response.headers().get(AUTHENTICATION_INFO_HEADER).cloned();
        expect_status(response, StatusCode::CREATED, "validate session").await?;

        let raw = header
            .ok_or_else(|| SessionError::MissingChallenge(format!("{} header absent", AUTHENTICATION_INFO_HEADER)))?;
        let raw = raw
            .to_str()
            .map_err(|_| SessionError::MissingChallenge("header is not valid text".to_string()))?;
        let challenge: AuthenticationInfo = serde_json::from_str(raw)?;

        match &challenge.id {
            Some(id) if !id.is_empty() => Ok(challenge),
            _ => Err(SessionError::MissingChallenge("challenge id is empty".to_string())),
        }
    }

    async fn activate(
        &self,
        client: &ComdirectClient,
        session_id: &SessionId,
        challenge: ChallengeId,
        correlation: &Correlation,
    ) -> Result<Option<SessionRecord>, SessionError> {
        let body = serde_json::to_string(&SessionRecord::tan_activation(session_id.clone()))?;
        let auth_info = serde_json::to_string(&AuthenticationInfo::for_challenge(challenge))?;
        let request = client
            .request(Method::PATCH, &format!("{}/{}", SESSIONS_PATH, session_id))?
            .header(REQUEST_INFO_HEADER, correlation.header_value())
            .header(AUTHENTICATION_INFO_HEADER, auth_info)
            .body(body);
        let response = client.send(request, None).await?;

        let status = response.status();
        let body = response.text().await?;
        if status != StatusCode::OK {
            return Err(SessionError::ActivationFailed {
                status: status.as_u16(),
                body,
            });
        }
        Ok(serde_json::from_str(&body).ok())
    }
}

#[cfg(test)]
impl Session {
    /// A session that already went through the handshake up to `state`.
    pub(crate) fn with_state(id: &str, state: SessionState) -> Self {
        Self {
            inner: Arc::new(RwLock::new(SessionInner {
                state,
                correlation: CorrelationGenerator::new(SessionId::new(id)),
                session_id: Some(SessionId::new(id)),
                challenge: None,
            })),
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.inner.try_read() {
            Ok(inner) => f
                .debug_struct("Session")
                .field("state", &inner.state)
                .field("session_id", &inner.session_id)
                .finish(),
            Err(_) => f.debug_struct("Session").finish_non_exhaustive(),
        }
    }
}

fn expect_state(inner: &SessionInner, expected: SessionState) -> Result<(), SessionError> {
    if inner.state == expected {
        Ok(())
    } else {
        Err(SessionError::InvalidState {
            expected,
            actual: inner.state,
        })
    }
}

fn acquired_id(inner: &SessionInner) -> Result<SessionId, SessionError> {
    inner.session_id.clone().ok_or(SessionError::NotAcquired)
}

async fn expect_status(
    response: Response,
    expected: StatusCode,
    step: &'static str,
) -> Result<String, SessionError> {
    let status = response.status();
    let body = response.text().await?;
    if status != expected {
        return Err(SessionError::UnexpectedStatus {
            step,
            status: status.as_u16(),
            body,
        });
    }
    Ok(body)
}
