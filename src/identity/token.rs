//! Bearer token held by the identity client.

use chrono::{DateTime, Utc};

/// Opaque access token with an optional expiry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessToken {
    value: String,
    expires_at: Option<DateTime<Utc>>,
}

impl AccessToken {
    pub fn new(value: impl Into<String>, expires_at: Option<DateTime<Utc>>) -> Self {
        Self {
            value: value.into(),
            expires_at,
        }
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    pub fn is_present(&self) -> bool {
        !self.value.is_empty()
    }

    /// Non-empty and not yet expired at `now`. Invalid from the expiry instant on.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.is_present() && self.expires_at.map_or(true, |exp| now < exp)
    }

    pub fn is_valid(&self) -> bool {
        self.is_valid_at(Utc::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_token_expiry_boundary() {
        let issued = Utc::now();
        let expires = issued + Duration::hours(1);
        let token = AccessToken::new("tok", Some(expires));

        assert!(token.is_valid_at(issued));
        assert!(token.is_valid_at(expires - Duration::milliseconds(1)));
        assert!(!token.is_valid_at(expires));
        assert!(!token.is_valid_at(expires + Duration::seconds(1)));
    }

    #[test]
    fn test_token_without_expiry() {
        let token = AccessToken::new("tok", None);
        assert!(token.is_valid_at(Utc::now() + Duration::days(365)));
    }

    #[test]
    fn test_empty_token_invalid() {
        let token = AccessToken::new("", None);
        assert!(!token.is_present());
        assert!(!token.is_valid());
    }
}
