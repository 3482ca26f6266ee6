//! Session types for SSO sessions.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::SessionInvalidReason;

/// Session lifetime: 8 hours.
pub const SESSION_TTL_SECS: i64 = 8 * 60 * 60;

const SESSION_ID_PREFIX: &str = "session_";

/// Unique session identifier (16 random bytes, rendered as `session_<hex>`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId([u8; 16]);

impl SessionId {
    /// Generate a new random session ID.
    pub fn new() -> Self {
        Self(rand::random())
    }

    /// Hex form without the prefix.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from hex string without the prefix.
    pub fn from_hex(s: &str) -> Option<Self> {
        let bytes = hex::decode(s).ok()?;
        let arr: [u8; 16] = bytes.try_into().ok()?;
        Some(Self(arr))
    }

    /// Parse the rendered form, `session_<hex>`.
    pub fn parse(s: &str) -> Option<Self> {
        s.strip_prefix(SESSION_ID_PREFIX).and_then(Self::from_hex)
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", SESSION_ID_PREFIX, self.to_hex())
    }
}

impl std::str::FromStr for SessionId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("invalid session id: {}", s))
    }
}

impl Serialize for SessionId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for SessionId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Where a session is in its lifecycle at a given instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Active,
    /// Logged out.
    Inactive,
    /// Past its expiry. Derived, never stored.
    Expired,
}

/// A stored SSO session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,

    /// User identifier taken from the `user_id` attribute, if present.
    pub user_id: Option<String>,

    /// Email taken from the `email` attribute, if present.
    pub email: Option<String>,

    /// Attributes the session was created with.
    pub attributes: BTreeMap<String, String>,

    pub created_at: DateTime<Utc>,

    pub expires_at: DateTime<Utc>,

    /// Cleared by logout.
    pub active: bool,
}

impl Session {
    /// Create an active session starting now.
    pub fn new(attributes: BTreeMap<String, String>, ttl_secs: i64) -> Self {
        Self::starting_at(attributes, Utc::now(), ttl_secs)
    }

    /// Create an active session starting at `now`.
    pub fn starting_at(
        attributes: BTreeMap<String, String>,
        now: DateTime<Utc>,
        ttl_secs: i64,
    ) -> Self {
        Self {
            id: SessionId::new(),
            user_id: attributes.get("user_id").cloned(),
            email: attributes.get("email").cloned(),
            attributes,
            created_at: now,
            expires_at: now + Duration::seconds(ttl_secs),
            active: true,
        }
    }

    /// Expired from the expiry instant on.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// Lifecycle state at `now`. Expiry wins over logout.
    pub fn state_at(&self, now: DateTime<Utc>) -> SessionState {
        if self.is_expired_at(now) {
            SessionState::Expired
        } else if !self.active {
            SessionState::Inactive
        } else {
            SessionState::Active
        }
    }

    /// Get a single attribute.
    pub fn get_attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }
}

/// Outcome of validating a session id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionValidation {
    Valid {
        user_attributes: BTreeMap<String, String>,
        expires_at: DateTime<Utc>,
    },
    Invalid(SessionInvalidReason),
}

impl SessionValidation {
    pub fn is_valid(&self) -> bool {
        matches!(self, SessionValidation::Valid { .. })
    }

    pub fn reason(&self) -> Option<SessionInvalidReason> {
        match self {
            SessionValidation::Valid { .. } => None,
            SessionValidation::Invalid(reason) => Some(*reason),
        }
    }

    /// Attributes of a valid session.
    pub fn user_attributes(&self) -> Option<&BTreeMap<String, String>> {
        match self {
            SessionValidation::Valid {
                user_attributes, ..
            } => Some(user_attributes),
            SessionValidation::Invalid(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attrs() -> BTreeMap<String, String> {
        let mut attributes = BTreeMap::new();
        attributes.insert("email".to_string(), "user@example.com".to_string());
        attributes.insert("user_id".to_string(), "u-1".to_string());
        attributes
    }

    #[test]
    fn test_session_id_roundtrip() {
        let id = SessionId::new();
        let rendered = id.to_string();
        assert!(rendered.starts_with("session_"));
        assert_eq!(rendered.len(), "session_".len() + 32);
        assert_eq!(SessionId::parse(&rendered), Some(id));
        assert_eq!(rendered.parse::<SessionId>().unwrap(), id);
    }

    #[test]
    fn test_session_id_serializes_as_string() {
        let id = SessionId::new();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{}\"", id));
        let back: SessionId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn test_session_id_invalid() {
        assert!(SessionId::parse("not-a-session").is_none());
        assert!(SessionId::parse("session_abcd").is_none()); // too short
        assert!(SessionId::parse("session_zz").is_none());
        assert!(SessionId::from_hex("").is_none());
    }

    #[test]
    fn test_session_new() {
        let session = Session::new(attrs(), SESSION_TTL_SECS);
        assert!(session.active);
        assert_eq!(session.user_id.as_deref(), Some("u-1"));
        assert_eq!(session.email.as_deref(), Some("user@example.com"));
        assert_eq!(
            session.expires_at - session.created_at,
            Duration::hours(8)
        );
        assert_eq!(session.get_attribute("email"), Some("user@example.com"));
    }

    #[test]
    fn test_session_state() {
        let now = Utc::now();
        let mut session = Session::starting_at(attrs(), now, SESSION_TTL_SECS);
        assert_eq!(session.state_at(now), SessionState::Active);

        let after_expiry = now + Duration::hours(8);
        assert!(session.is_expired_at(after_expiry));
        assert_eq!(session.state_at(after_expiry), SessionState::Expired);

        session.active = false;
        assert_eq!(session.state_at(now), SessionState::Inactive);
        assert_eq!(session.state_at(after_expiry), SessionState::Expired);
    }
}
