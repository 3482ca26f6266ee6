//! Simulated OneLogin API client.
//!
//! Every call is answered in-process with deterministic placeholder data.

use chrono::{Duration, Utc};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashSet};
use std::sync::RwLock;
use tracing::{debug, info, warn};

use super::api::{ApiStats, CreatedUser, IdentityApi, UserLookup};
use super::token::AccessToken;
use crate::config::{OneLoginConfig, DEMO_CLIENT_ID};
use crate::error::{HarnessError, HarnessResult};
use crate::user::MappedUser;

/// Token handed out by the simulated OAuth endpoint.
pub const DEMO_ACCESS_TOKEN: &str = "demo_access_token_12345";

/// Lifetime of a simulated access token.
pub const TOKEN_TTL_SECS: i64 = 3600;

/// Creation date reported for every looked-up user.
const LOOKUP_CREATED_AT: &str = "2024-01-15T10:30:00Z";

/// Failures the simulated API should produce on demand.
#[derive(Debug, Clone, Default)]
pub struct SimulatedFaults {
    /// Refuse every authentication attempt.
    pub reject_authentication: bool,

    /// Refuse to create users with these emails.
    pub reject_emails: HashSet<String>,
}

impl SimulatedFaults {
    pub fn reject_email(mut self, email: impl Into<String>) -> Self {
        self.reject_emails.insert(email.into());
        self
    }
}

/// In-process stand-in for the OneLogin API.
pub struct DemoIdentityClient {
    client_id: String,
    client_secret: String,
    region: String,
    subdomain: String,
    base_url: String,
    token: RwLock<Option<AccessToken>>,
    faults: SimulatedFaults,
}

impl DemoIdentityClient {
    /// Create a client from OneLogin configuration.
    pub fn new(config: &OneLoginConfig) -> Self {
        Self::with_faults(config, SimulatedFaults::default())
    }

    /// Create a client that fails as described by `faults`.
    pub fn with_faults(config: &OneLoginConfig, faults: SimulatedFaults) -> Self {
        let region = config.effective_region().to_string();
        let base_url = format!("https://api.{}.onelogin.com", region);

        info!(base_url = %base_url, "OneLogin connector initialized");

        Self {
            client_id: config.effective_client_id().to_string(),
            client_secret: config.effective_client_secret().to_string(),
            region,
            subdomain: config.effective_subdomain().to_string(),
            base_url,
            token: RwLock::new(None),
            faults,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// OAuth token endpoint.
    pub fn auth_url(&self) -> String {
        format!("{}/auth/oauth2/v2/token", self.base_url)
    }

    /// `Authorization` header value for the client-credentials token call.
    pub fn authorization_header(&self) -> String {
        format!(
            "client_id:{}, client_secret:{}",
            self.client_id, self.client_secret
        )
    }

    /// Users collection endpoint.
    pub fn users_url(&self) -> String {
        format!("{}/api/2/users", self.base_url)
    }

    /// True when running with placeholder credentials.
    pub fn is_demo_mode(&self) -> bool {
        self.client_id == DEMO_CLIENT_ID
    }

    /// Currently held token, if any.
    pub fn token(&self) -> Option<AccessToken> {
        self.token.read().ok().and_then(|t| t.clone())
    }

    fn store_token(&self, token: AccessToken) -> bool {
        match self.token.write() {
            Ok(mut slot) => {
                *slot = Some(token);
                true
            }
            Err(_) => {
                warn!("Token lock poisoned");
                false
            }
        }
    }
}

impl IdentityApi for DemoIdentityClient {
    fn authenticate(&self) -> bool {
        if self.faults.reject_authentication {
            warn!(auth_url = %self.auth_url(), "OneLogin authentication failed");
            return false;
        }

        let authorization = self.authorization_header();
        debug!(
            auth_url = %self.auth_url(),
            header_len = authorization.len(),
            "Requesting access token"
        );

        if self.is_demo_mode() {
            info!("Demo mode: simulating OneLogin authentication");
        } else {
            info!("OneLogin authentication successful");
        }

        let expires_at = Utc::now() + Duration::seconds(TOKEN_TTL_SECS);
        self.store_token(AccessToken::new(DEMO_ACCESS_TOKEN, Some(expires_at)))
    }

    fn is_authenticated(&self) -> bool {
        self.token
            .read()
            .map(|t| t.as_ref().is_some_and(AccessToken::is_valid))
            .unwrap_or(false)
    }

    fn create_user(&self, user: &MappedUser) -> HarnessResult<CreatedUser> {
        if !self.ensure_authenticated() {
            return Err(HarnessError::AuthenticationFailed);
        }

        if self.faults.reject_emails.contains(&user.email) {
            warn!(email = %user.email, "OneLogin rejected user creation");
            return Err(HarnessError::RemoteCreateFailed {
                email: user.email.clone(),
                reason: "rejected by identity provider".to_string(),
            });
        }

        // Not unique: equal-length emails share an id.
        let user_id = format!("ol_user_{}", user.email.chars().count());

        info!(email = %user.email, user_id = %user_id, "Created user");

        Ok(CreatedUser {
            user_id,
            email: user.email.clone(),
            created_at: Utc::now().to_rfc3339(),
            status: "active".to_string(),
        })
    }

    fn get_user_by_email(&self, email: &str) -> Option<UserLookup> {
        if !self.ensure_authenticated() {
            return None;
        }

        let local_part = email.split('@').next().unwrap_or("");
        let mut segments = local_part.split('.');
        let first = segments.next().unwrap_or("");
        let last = local_part.split('.').next_back().unwrap_or("");

        let user = UserLookup {
            id: format!("ol_user_{}", stable_hash(email) % 10_000),
            email: email.to_string(),
            firstname: title_case(first),
            lastname: title_case(last),
            status: "active".to_string(),
            created_at: LOOKUP_CREATED_AT.to_string(),
        };

        info!(email = %email, "Retrieved user");
        Some(user)
    }

    fn sync_user_attributes(&self, user_id: &str, attributes: &BTreeMap<String, String>) -> bool {
        if !self.ensure_authenticated() {
            return false;
        }

        debug!(user_id = %user_id, attributes = attributes.len(), "Syncing attributes");
        info!(user_id = %user_id, "Synchronized attributes");
        true
    }

    fn get_api_stats(&self) -> ApiStats {
        ApiStats {
            authenticated: self.is_authenticated(),
            token_valid: self.token().is_some_and(|t| t.is_present()),
            base_url: self.base_url.clone(),
            region: self.region.clone(),
            subdomain: self.subdomain.clone(),
            demo_mode: self.is_demo_mode(),
        }
    }
}

/// Hash that stays the same across runs and builds.
fn stable_hash(value: &str) -> u64 {
    let digest = Sha256::digest(value.as_bytes());
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(bytes)
}

/// Uppercase the first letter of each alphabetic run, lowercase the rest.
fn title_case(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut prev_alpha = false;
    for c in value.chars() {
        if c.is_alphabetic() {
            if prev_alpha {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            prev_alpha = true;
        } else {
            out.push(c);
            prev_alpha = false;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn test_client() -> DemoIdentityClient {
        DemoIdentityClient::new(&OneLoginConfig::default())
    }

    fn test_user(email: &str) -> MappedUser {
        let record = crate::user::UserRecord::new().with("email", email);
        MappedUser::from_record(&record, Utc::now())
    }

    #[test]
    fn test_authenticate() {
        let client = test_client();
        assert!(!client.is_authenticated());

        assert!(client.authenticate());
        assert!(client.is_authenticated());

        let token = client.token().unwrap();
        assert_eq!(token.value(), DEMO_ACCESS_TOKEN);
        let expires_at = token.expires_at().unwrap();
        assert!(token.is_valid_at(expires_at - Duration::seconds(1)));
        assert!(!token.is_valid_at(expires_at));
    }

    #[test]
    fn test_authorization_header() {
        assert_eq!(
            test_client().authorization_header(),
            "client_id:DEMO_CLIENT_ID, client_secret:DEMO_CLIENT_SECRET"
        );

        let config = OneLoginConfig {
            client_id: "abc".to_string(),
            client_secret: "s3cret".to_string(),
            ..Default::default()
        };
        let client = DemoIdentityClient::new(&config);
        assert_eq!(client.authorization_header(), "client_id:abc, client_secret:s3cret");
        assert!(!client.is_demo_mode());
    }

    #[test]
    fn test_expired_token_not_authenticated() {
        let client = test_client();
        client.store_token(AccessToken::new(
            DEMO_ACCESS_TOKEN,
            Some(Utc::now() - Duration::seconds(1)),
        ));
        assert!(!client.is_authenticated());

        // create_user re-authenticates on its own
        assert!(client.create_user(&test_user("a@example.com")).is_ok());
        assert!(client.is_authenticated());
    }

    #[test]
    fn test_create_user_id_from_email_length() {
        let client = test_client();
        let created = client.create_user(&test_user("testuser001@example.com")).unwrap();
        assert_eq!(created.user_id, "ol_user_23");
        assert_eq!(created.email, "testuser001@example.com");
        assert_eq!(created.status, "active");
    }

    #[test]
    fn test_create_user_auth_failure() {
        let faults = SimulatedFaults {
            reject_authentication: true,
            ..Default::default()
        };
        let client = DemoIdentityClient::with_faults(&OneLoginConfig::default(), faults);

        let result = client.create_user(&test_user("a@example.com"));
        assert!(matches!(result, Err(HarnessError::AuthenticationFailed)));
        assert!(client.token().is_none());
        assert!(client.get_user_by_email("a@example.com").is_none());
        assert!(!client.sync_user_attributes("ol_user_1", &BTreeMap::new()));
    }

    #[test]
    fn test_bulk_continues_after_failure() {
        let faults = SimulatedFaults::default().reject_email("b@example.com");
        let client = DemoIdentityClient::with_faults(&OneLoginConfig::default(), faults);

        let users: Vec<MappedUser> = ["a@example.com", "b@example.com", "c@example.com"]
            .iter()
            .map(|e| test_user(e))
            .collect();
        let result = client.provision_users_bulk(&users);

        assert!(result.success);
        assert_eq!(result.total_users, 3);
        assert_eq!(result.successful, 2);
        assert_eq!(result.failed, 1);
        assert_eq!(result.errors, vec!["Failed to create b@example.com"]);
        let metrics = result.metrics.unwrap();
        assert_eq!(metrics.traditional_time_minutes, 12);
        assert_eq!(metrics.reduction_percentage, 75.0);
    }

    #[test]
    fn test_bulk_auth_failure() {
        let faults = SimulatedFaults {
            reject_authentication: true,
            ..Default::default()
        };
        let client = DemoIdentityClient::with_faults(&OneLoginConfig::default(), faults);
        let result = client.provision_users_bulk(&[test_user("a@example.com")]);
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("Authentication failed"));
    }

    #[test]
    fn test_lookup_by_email() {
        let client = test_client();
        let user = client.get_user_by_email("jane.q.doe@example.com").unwrap();
        assert_eq!(user.firstname, "Jane");
        assert_eq!(user.lastname, "Doe");
        assert_eq!(user.created_at, LOOKUP_CREATED_AT);
        assert!(user.id.starts_with("ol_user_"));

        let again = client.get_user_by_email("jane.q.doe@example.com").unwrap();
        assert_eq!(user.id, again.id);

        let single = client.get_user_by_email("admin@example.com").unwrap();
        assert_eq!(single.firstname, "Admin");
        assert_eq!(single.lastname, "Admin");
    }

    #[test]
    fn test_title_case() {
        assert_eq!(title_case("jOHN"), "John");
        assert_eq!(title_case("o'neil"), "O'Neil");
        assert_eq!(title_case("user42x"), "User42X");
        assert_eq!(title_case(""), "");
    }

    #[test]
    fn test_api_stats() {
        let client = test_client();
        let stats = client.get_api_stats();
        assert!(!stats.authenticated);
        assert!(!stats.token_valid);
        assert!(stats.demo_mode);
        assert_eq!(stats.base_url, "https://api.us.onelogin.com");
        assert_eq!(stats.subdomain, "demo-company");

        client.authenticate();
        assert!(client.get_api_stats().authenticated);
        assert_eq!(client.users_url(), "https://api.us.onelogin.com/api/2/users");
    }

    #[test]
    fn test_not_demo_mode_with_real_credentials() {
        let config = OneLoginConfig {
            client_id: "real".to_string(),
            client_secret: "secret".to_string(),
            region: "eu".to_string(),
            subdomain: "acme".to_string(),
        };
        let client = DemoIdentityClient::new(&config);
        assert!(!client.is_demo_mode());
        assert_eq!(client.base_url(), "https://api.eu.onelogin.com");
        assert!(client.authenticate());
    }
}
