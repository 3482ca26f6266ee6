//! SAML Response decoding.
//!
//! The response is decoded and checked for well-formed XML. Its content is
//! not inspected: there is no signature, condition or subject processing.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use chrono::{DateTime, Utc};
use quick_xml::events::Event;
use quick_xml::Reader;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::error::{HarnessError, HarnessResult};
use crate::session::SessionId;

/// Attributes reported for every accepted response.
pub fn demo_attributes() -> BTreeMap<String, String> {
    [
        ("email", "demo.user@example.com"),
        ("first_name", "Demo"),
        ("last_name", "User"),
        ("user_id", "demo_user_123"),
        ("department", "IT"),
        ("role", "Administrator"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

/// Outcome of [`SsoSessionManager::validate_saml_response`](super::SsoSessionManager::validate_saml_response).
#[derive(Debug, Clone, Serialize)]
pub struct ResponseValidation {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_attributes: Option<BTreeMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<SessionId>,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relay_state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ResponseValidation {
    pub fn accepted(user_attributes: BTreeMap<String, String>, relay_state: Option<&str>) -> Self {
        Self {
            valid: true,
            user_attributes: Some(user_attributes),
            session_id: Some(SessionId::new()),
            timestamp: Utc::now(),
            relay_state: relay_state.map(String::from),
            error: None,
        }
    }

    pub fn rejected(error: &HarnessError) -> Self {
        Self {
            valid: false,
            user_attributes: None,
            session_id: None,
            timestamp: Utc::now(),
            relay_state: None,
            error: Some(error.to_string()),
        }
    }
}

/// Base64-decode a response into its XML text.
///
/// ASCII whitespace is ignored so line-wrapped POST bodies decode.
pub fn decode_response(encoded: &str) -> HarnessResult<String> {
    let compact: String = encoded.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    let bytes = BASE64.decode(compact)?;
    Ok(String::from_utf8(bytes)?)
}

/// Check that `xml` is a single well-formed element tree.
pub fn check_well_formed(xml: &str) -> HarnessResult<()> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut depth = 0usize;
    let mut seen_root = false;

    loop {
        let event = reader.read_event().map_err(|e| {
            HarnessError::Xml(format!("{} at position {}", e, reader.buffer_position()))
        })?;

        match event {
            Event::Start(ref e) | Event::Empty(ref e) => {
                if depth == 0 && seen_root {
                    return Err(HarnessError::Xml("multiple root elements".to_string()));
                }
                for attr in e.attributes() {
                    attr.map_err(|err| HarnessError::Xml(err.to_string()))?;
                }
                seen_root = true;
                if matches!(event, Event::Start(_)) {
                    depth += 1;
                }
            }
            Event::End(_) => {
                depth = depth
                    .checked_sub(1)
                    .ok_or_else(|| HarnessError::Xml("unexpected closing tag".to_string()))?;
            }
            Event::Text(ref text) => {
                if depth == 0 && text.iter().any(|b| !b.is_ascii_whitespace()) {
                    return Err(HarnessError::Xml(
                        "text outside of root element".to_string(),
                    ));
                }
                text.unescape()
                    .map_err(|err| HarnessError::Xml(err.to_string()))?;
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !seen_root {
        return Err(HarnessError::Xml("no root element found".to_string()));
    }
    if depth != 0 {
        return Err(HarnessError::Xml("unclosed element at end of document".to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_well_formed() {
        assert!(check_well_formed("<a><b x=\"1\"/>text</a>").is_ok());
        assert!(check_well_formed(
            "<?xml version=\"1.0\"?>\n<samlp:Response xmlns:samlp=\"urn:x\"><!-- c --></samlp:Response>\n"
        )
        .is_ok());
    }

    #[test]
    fn test_malformed() {
        assert!(check_well_formed("").is_err());
        assert!(check_well_formed("plain text").is_err());
        assert!(check_well_formed("<a>").is_err());
        assert!(check_well_formed("<a></b>").is_err());
        assert!(check_well_formed("<a/><b/>").is_err());
        assert!(check_well_formed("<a/>trailing").is_err());
    }

    #[test]
    fn test_decode_response() {
        let encoded = BASE64.encode("<Response/>");
        assert_eq!(decode_response(&encoded).unwrap(), "<Response/>");

        assert!(matches!(
            decode_response("not base64!!"),
            Err(HarnessError::Decode(_))
        ));

        let invalid_utf8 = BASE64.encode([0xff, 0xfe, 0xfd]);
        assert!(matches!(
            decode_response(&invalid_utf8),
            Err(HarnessError::Utf8(_))
        ));
    }

    #[test]
    fn test_decode_wrapped_response() {
        let xml = format!("<samlp:Response>{}</samlp:Response>", "x".repeat(200));
        let flat = BASE64.encode(&xml);
        let wrapped = flat
            .as_bytes()
            .chunks(76)
            .map(|chunk| std::str::from_utf8(chunk).unwrap())
            .collect::<Vec<_>>()
            .join("\r\n");
        assert!(wrapped.contains("\r\n"));

        assert_eq!(decode_response(&wrapped).unwrap(), xml);
        assert_eq!(decode_response(&format!("  {}\n", wrapped)).unwrap(), xml);
        assert_eq!(decode_response(&wrapped.replace("\r\n", "\n")).unwrap(), xml);
    }

    #[test]
    fn test_demo_attributes() {
        let attrs = demo_attributes();
        assert_eq!(attrs.len(), 6);
        assert_eq!(attrs["email"], "demo.user@example.com");
        assert_eq!(attrs["role"], "Administrator");
    }
}
