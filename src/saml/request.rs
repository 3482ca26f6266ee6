//! SAML AuthnRequest construction.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use chrono::{DateTime, Utc};
use quick_xml::escape::escape;
use serde::Serialize;

/// HTTP-POST binding URN.
pub const HTTP_POST_BINDING: &str = "urn:oasis:names:tc:SAML:2.0:bindings:HTTP-POST";

/// NameID format requested from the IdP.
pub const EMAIL_NAME_ID_FORMAT: &str = "urn:oasis:names:tc:SAML:1.1:nameid-format:emailAddress";

/// Status of an issued AuthnRequest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Pending,
}

/// An AuthnRequest we issued and have not heard back about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PendingRequest {
    pub request_id: String,
    pub created_at: DateTime<Utc>,
    pub relay_state: Option<String>,
    pub status: RequestStatus,
}

impl PendingRequest {
    pub fn new(request_id: String, relay_state: Option<&str>) -> Self {
        Self {
            request_id,
            created_at: Utc::now(),
            relay_state: relay_state.map(String::from),
            status: RequestStatus::Pending,
        }
    }
}

/// Fields substituted into the AuthnRequest template.
#[derive(Debug, Clone)]
pub struct AuthnRequest<'a> {
    pub id: &'a str,
    pub issue_instant: DateTime<Utc>,
    pub destination: &'a str,
    pub acs_url: &'a str,
    pub issuer: &'a str,
}

impl AuthnRequest<'_> {
    /// Render the request document.
    pub fn to_xml(&self) -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<samlp:AuthnRequest
    xmlns:samlp="urn:oasis:names:tc:SAML:2.0:protocol"
    xmlns:saml="urn:oasis:names:tc:SAML:2.0:assertion"
    ID="{id}"
    Version="2.0"
    IssueInstant="{instant}"
    Destination="{destination}"
    AssertionConsumerServiceURL="{acs}"
    ProtocolBinding="{binding}">
    <saml:Issuer>{issuer}</saml:Issuer>
    <samlp:NameIDPolicy
        Format="{format}"
        AllowCreate="true"/>
</samlp:AuthnRequest>"#,
            id = escape(self.id),
            instant = self.issue_instant.format("%Y-%m-%dT%H:%M:%SZ"),
            destination = escape(self.destination),
            acs = escape(self.acs_url),
            binding = HTTP_POST_BINDING,
            issuer = escape(self.issuer),
            format = EMAIL_NAME_ID_FORMAT,
        )
    }

    /// Base64 of the rendered document.
    pub fn encode(&self) -> String {
        BASE64.encode(self.to_xml())
    }
}

/// Fresh AuthnRequest ID (`_` followed by a UUID; IDs must not start with a digit).
pub fn new_request_id() -> String {
    format!("_{}", uuid::Uuid::new_v4())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn test_request() -> AuthnRequest<'static> {
        AuthnRequest {
            id: "_abc",
            issue_instant: Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 5).unwrap(),
            destination: "https://acme.onelogin.com/trust/saml2/http-post/sso",
            acs_url: "https://sp.example.com/saml/acs",
            issuer: "https://sp.example.com/saml/metadata",
        }
    }

    #[test]
    fn test_request_xml() {
        let xml = test_request().to_xml();
        assert!(xml.starts_with("<?xml version=\"1.0\""));
        assert!(xml.contains(r#"ID="_abc""#));
        assert!(xml.contains(r#"IssueInstant="2024-03-01T12:30:05Z""#));
        assert!(xml.contains(r#"AssertionConsumerServiceURL="https://sp.example.com/saml/acs""#));
        assert!(xml.contains(HTTP_POST_BINDING));
        assert!(xml.contains("<saml:Issuer>https://sp.example.com/saml/metadata</saml:Issuer>"));
        assert!(xml.contains(EMAIL_NAME_ID_FORMAT));
    }

    #[test]
    fn test_request_escapes_values() {
        let mut request = test_request();
        request.acs_url = "https://sp.example.com/acs?a=1&b=2";
        assert!(request.to_xml().contains("a=1&amp;b=2"));
    }

    #[test]
    fn test_encode() {
        let request = test_request();
        let decoded = BASE64.decode(request.encode()).unwrap();
        assert_eq!(String::from_utf8(decoded).unwrap(), request.to_xml());
    }

    #[test]
    fn test_request_id_format() {
        let id = new_request_id();
        assert!(id.starts_with('_'));
        assert_eq!(id.len(), 37);
        assert_ne!(id, new_request_id());
    }
}
