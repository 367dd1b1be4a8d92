//! Login and OAuth client credentials.

use std::fmt;

use secrecy::SecretString;

/// Password-grant credentials of the account holder.
#[derive(Clone)]
pub struct Credentials {
    pub(crate) account_id: String,
    pub(crate) pin: SecretString,
}

impl Credentials {
    /// Create credentials from the account number (Zugangsnummer) and PIN.
    pub fn new(account_id: impl Into<String>, pin: impl Into<String>) -> Self {
        Self {
            account_id: account_id.into(),
            pin: SecretString::from(pin.into()),
        }
    }

    /// The account number used as OAuth username.
    pub fn account_id(&self) -> &str {
        &self.account_id
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("account_id", &self.account_id)
            .field("pin", &"[REDACTED]")
            .finish()
    }
}

/// OAuth client registration (client id and secret).
#[derive(Clone)]
pub struct ClientCredentials {
    pub(crate) client_id: String,
    pub(crate) client_secret: SecretString,
}

impl ClientCredentials {
    /// Create client credentials.
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: SecretString::from(client_secret.into()),
        }
    }

    /// The OAuth client id.
    pub fn client_id(&self) -> &str {
        &self.client_id
    }
}

impl fmt::Debug for ClientCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientCredentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .finish()
    }
}
