//! Request correlation ids.

use crate::models::{ClientRequestId, RequestId, RequestInfo, SessionId};

/// A session/request id pair for one outgoing call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Correlation {
    /// Session the call belongs to
    pub session_id: SessionId,
    /// Fresh for every call
    pub request_id: RequestId,
}

impl Correlation {
    /// Pair `session_id` with a freshly generated request id.
    pub fn new(session_id: SessionId) -> Self {
        Self {
            session_id,
            request_id: RequestId::generate(),
        }
    }

    /// The request-info header payload.
    pub fn request_info(&self) -> RequestInfo {
        RequestInfo {
            client_request_id: ClientRequestId {
                session_id: self.session_id.clone(),
                request_id: self.request_id.clone(),
            },
        }
    }

    /// The request-info header value as a JSON string.
    pub fn header_value(&self) -> String {
        // two string fields; serialization cannot fail
        serde_json::to_string(&self.request_info()).unwrap_or_default()
    }
}

/// Produces correlations for a fixed session id.
#[derive(Debug, Clone)]
pub struct CorrelationGenerator {
    session_id: SessionId,
}

impl CorrelationGenerator {
    /// Create a generator for `session_id`.
    pub fn new(session_id: SessionId) -> Self {
        Self { session_id }
    }

    /// Create a generator with a client-generated session id.
    pub fn client_generated() -> Self {
        Self::new(SessionId::generate())
    }

    /// The session id every correlation carries.
    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    /// Next correlation, with a new request id.
    pub fn next(&self) -> Correlation {
        Correlation::new(self.session_id.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::REQUEST_ID_LEN;

    #[test]
    fn test_header_value_shape() {
        let correlation = Correlation::new(SessionId::new("S1"));
        let value: serde_json::Value = serde_json::from_str(&correlation.header_value()).unwrap();

        assert_eq!(value["clientRequestId"]["sessionId"], "S1");
        let request_id = value["clientRequestId"]["requestId"].as_str().unwrap();
        assert_eq!(request_id.len(), REQUEST_ID_LEN);
    }

    #[test]
    fn test_generator_keeps_session_and_varies_request() {
        let generator = CorrelationGenerator::client_generated();
        let a = generator.next();
        let b = generator.next();

        assert_eq!(a.session_id, b.session_id);
        assert_eq!(&a.session_id, generator.session_id());
        assert_ne!(a.request_id, b.request_id);
    }
}
