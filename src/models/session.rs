//! Session and TAN challenge payloads.

use serde::{Deserialize, Serialize};

use super::primitives::{ChallengeId, RequestId, SessionId};

/// A session record as returned by the session listing.
///
/// The same shape is sent back when validating and activating the
/// session, with both marker flags set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    /// Server-issued identifier
    pub identifier: SessionId,
    /// Whether the session is TAN-activated
    #[serde(default)]
    pub session_tan_active: bool,
    /// Whether two-factor authentication is activated
    #[serde(default, rename = "activated2FA")]
    pub activated_2fa: bool,
}

impl SessionRecord {
    /// The record body that requests TAN activation for `identifier`.
    pub fn tan_activation(identifier: SessionId) -> Self {
        Self {
            identifier,
            session_tan_active: true,
            activated_2fa: true,
        }
    }
}

/// Challenge descriptor carried in the authentication-info header.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticationInfo {
    /// Challenge identifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<ChallengeId>,
    /// Challenge type (e.g. `P_TAN_PUSH`, `M_TAN`)
    #[serde(default, rename = "typ", skip_serializing_if = "Option::is_none")]
    pub challenge_type: Option<String>,
    /// Human-readable challenge text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub challenge: Option<String>,
    /// Other TAN methods the provider offers
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub available_types: Vec<String>,
}

impl AuthenticationInfo {
    /// Descriptor that only echoes a challenge id back.
    pub fn for_challenge(id: ChallengeId) -> Self {
        Self {
            id: Some(id),
            ..Default::default()
        }
    }
}

/// Request-info header payload: `{"clientRequestId": {...}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestInfo {
    /// Session/request pair
    pub client_request_id: ClientRequestId,
}

/// Session/request pair used for request tracing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientRequestId {
    /// Session the request belongs to
    pub session_id: SessionId,
    /// Fresh per request
    pub request_id: RequestId,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_record_wire_names() {
        let record = SessionRecord::tan_activation(SessionId::new("S1"));
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "identifier": "S1",
                "sessionTanActive": true,
                "activated2FA": true
            })
        );
    }

    #[test]
    fn test_session_record_defaults() {
        let record: SessionRecord = serde_json::from_str(r#"{"identifier":"S2"}"#).unwrap();
        assert_eq!(record.identifier.as_str(), "S2");
        assert!(!record.session_tan_active);
        assert!(!record.activated_2fa);
    }

    #[test]
    fn test_authentication_info_parse() {
        let info: AuthenticationInfo = serde_json::from_str(
            r#"{"id":"123","typ":"P_TAN_PUSH","challenge":"open app","availableTypes":["P_TAN_PUSH","M_TAN"]}"#,
        )
        .unwrap();
        assert_eq!(info.id.unwrap().as_str(), "123");
        assert_eq!(info.challenge_type.as_deref(), Some("P_TAN_PUSH"));
        assert_eq!(info.available_types.len(), 2);
    }

    #[test]
    fn test_authentication_info_echo_only_has_id() {
        let info = AuthenticationInfo::for_challenge(ChallengeId::new("42"));
        assert_eq!(serde_json::to_string(&info).unwrap(), r#"{"id":"42"}"#);
    }
}
