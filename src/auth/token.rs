//! OAuth tokens and the store that holds the current one.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use secrecy::SecretString;
use serde::Deserialize;
use tokio::sync::RwLock;

/// The exchange that produced a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Grant {
    /// Resource-owner password grant (primary login)
    Password,
    /// Provider-specific secondary exchange for a session-scoped token
    Secondary,
    /// Refresh grant
    Refresh,
}

impl Grant {
    /// Value of the `grant_type` form parameter.
    pub fn as_str(&self) -> &'static str {
        match self {
            Grant::Password => "password",
            Grant::Secondary => "cd_secondary",
            Grant::Refresh => "refresh_token",
        }
    }
}

impl fmt::Display for Grant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Customer identifiers returned alongside session-scoped tokens.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CustomerInfo {
    /// Customer number (`kdnr`)
    pub customer_number: Option<String>,
    /// Business partner id (`bpid`)
    pub business_partner_id: Option<i64>,
    /// Contact id (`kontaktId`)
    pub contact_id: Option<i64>,
}

impl CustomerInfo {
    fn is_empty(&self) -> bool {
        self.customer_number.is_none()
            && self.business_partner_id.is_none()
            && self.contact_id.is_none()
    }
}

/// An OAuth token.
///
/// Tokens are immutable; every exchange produces a new one which replaces
/// the previous token in the [`TokenStore`] as a whole.
pub struct Token {
    access: SecretString,
    refresh: Option<SecretString>,
    expires_at: DateTime<Utc>,
    scope: Option<String>,
    grant: Grant,
    customer: Option<CustomerInfo>,
    generation: u64,
}

impl Token {
    pub(crate) fn from_response(response: TokenResponse, grant: Grant) -> Self {
        let customer = CustomerInfo {
            customer_number: response.customer_number,
            business_partner_id: response.bpid,
            contact_id: response.contact_id,
        };
        Self {
            access: SecretString::from(response.access_token),
            refresh: response.refresh_token.map(SecretString::from),
            expires_at: expiry_after(response.expires_in.unwrap_or(0)),
            scope: response.scope,
            grant,
            customer: (!customer.is_empty()).then_some(customer),
            generation: 0,
        }
    }

    pub(crate) fn access_token(&self) -> &SecretString {
        &self.access
    }

    pub(crate) fn refresh_token(&self) -> Option<&SecretString> {
        self.refresh.as_ref()
    }

    /// Keep the previous refresh value when an exchange does not rotate it.
    pub(crate) fn inherit_refresh(&mut self, previous: &Token) {
        if self.refresh.is_none() {
            self.refresh = previous.refresh.clone();
        }
    }

    /// When the access value expires.
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// Check if the token will expire within the given buffer period.
    pub fn expires_within(&self, buffer: Duration) -> bool {
        Utc::now() + buffer >= self.expires_at
    }

    /// Check if the token has expired.
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }

    /// Granted scope, as reported by the provider.
    pub fn scope(&self) -> Option<&str> {
        self.scope.as_deref()
    }

    /// Exchange that produced this token.
    pub fn grant(&self) -> Grant {
        self.grant
    }

    /// Whether a refresh value is present.
    pub fn has_refresh_token(&self) -> bool {
        self.refresh.is_some()
    }

    /// Customer identifiers, if the provider sent any.
    pub fn customer(&self) -> Option<&CustomerInfo> {
        self.customer.as_ref()
    }

    /// Position of this token in the sequence of stored tokens, starting at 1.
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// Longest lifetime accepted from the token endpoint.
pub(crate) const MAX_TOKEN_LIFETIME_SECS: i64 = 366 * 24 * 60 * 60;

// Out-of-range lifetimes are clamped into `0..=MAX_TOKEN_LIFETIME_SECS`.
fn expiry_after(expires_in: i64) -> DateTime<Utc> {
    let now = Utc::now();
    let secs = expires_in.clamp(0, MAX_TOKEN_LIFETIME_SECS);
    Duration::try_seconds(secs)
        .and_then(|lifetime| now.checked_add_signed(lifetime))
        .unwrap_or(now)
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Token")
            .field("access", &"[REDACTED]")
            .field("refresh", &self.refresh.as_ref().map(|_| "[REDACTED]"))
            .field("expires_at", &self.expires_at)
            .field("scope", &self.scope)
            .field("grant", &self.grant)
            .field("generation", &self.generation)
            .finish()
    }
}

/// Holder of the single current token.
///
/// Readers take a snapshot (`Arc<Token>`) and keep using it for the whole
/// request, so a replacement never tears a token in half and never changes
/// the credentials of a request that has already started.
#[derive(Clone, Default)]
pub struct TokenStore {
    inner: Arc<RwLock<Option<Arc<Token>>>>,
}

impl TokenStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the current token.
    pub async fn current(&self) -> Option<Arc<Token>> {
        self.inner.read().await.clone()
    }

    /// Replace the current token, returning the stored snapshot.
    pub(crate) async fn replace(&self, mut next: Token) -> Arc<Token> {
        let mut slot = self.inner.write().await;
        next.generation = slot.as_ref().map_or(1, |t| t.generation + 1);
        let next = Arc::new(next);
        *slot = Some(next.clone());
        next
    }

    /// Whether a token has been stored.
    pub async fn is_connected(&self) -> bool {
        self.inner.read().await.is_some()
    }

    /// Generation of the current token, or 0 if none is stored.
    pub async fn generation(&self) -> u64 {
        self.inner.read().await.as_ref().map_or(0, |t| t.generation)
    }

    /// Expiry of the current token.
    pub async fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.inner.read().await.as_ref().map(|t| t.expires_at)
    }

    /// Whether two stores share the same slot.
    pub(crate) fn same_as(&self, other: &TokenStore) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for TokenStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenStore").finish_non_exhaustive()
    }
}

/// Token endpoint response.
#[derive(Debug, Deserialize)]
pub(crate) struct TokenResponse {
    pub(crate) access_token: String,
    #[allow(dead_code)]
    #[serde(default)]
    pub(crate) token_type: Option<String>,
    #[serde(default)]
    pub(crate) refresh_token: Option<String>,
    #[serde(default)]
    pub(crate) expires_in: Option<i64>,
    #[serde(default)]
    pub(crate) scope: Option<String>,
    #[serde(default, rename = "kdnr")]
    pub(crate) customer_number: Option<String>,
    #[serde(default)]
    pub(crate) bpid: Option<i64>,
    #[serde(default, rename = "kontaktId")]
    pub(crate) contact_id: Option<i64>,
}
