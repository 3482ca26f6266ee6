//! SAML Service Provider and SSO session manager.
//!
//! Handles the SP-initiated flow: issuing AuthnRequests, accepting
//! responses, and owning the session table.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;
use tracing::{debug, info, warn};

use super::request::{new_request_id, AuthnRequest, PendingRequest};
use super::response::{check_well_formed, decode_response, demo_attributes, ResponseValidation};
use crate::config::Settings;
use crate::error::{HarnessResult, SessionInvalidReason};
use crate::session::{
    MemorySessionStore, RetentionPolicy, Session, SessionId, SessionState, SessionStore,
    SessionValidation, SESSION_TTL_SECS,
};
use crate::util::round_to;

/// Session counts for monitoring.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionStats {
    pub active_sessions: usize,
    pub total_sessions: usize,
    /// Share of stored sessions not logged out, in percent.
    pub active_ratio: f64,
    pub pending_requests: usize,
}

/// SAML Service Provider that owns the SSO session table.
pub struct SsoSessionManager {
    entity_id: String,
    acs_url: String,
    sls_url: String,
    idp_sso_url: String,
    store: Box<dyn SessionStore>,
    pending: RwLock<HashMap<String, PendingRequest>>,
    retention: RetentionPolicy,
    session_ttl_secs: i64,
}

impl SsoSessionManager {
    /// Create a manager with an in-memory store that keeps logged-out sessions.
    pub fn new(settings: &Settings) -> Self {
        Self::with_store(
            settings,
            Box::new(MemorySessionStore::new()),
            RetentionPolicy::default(),
        )
    }

    /// Create a manager over a caller-supplied store.
    pub fn with_store(
        settings: &Settings,
        store: Box<dyn SessionStore>,
        retention: RetentionPolicy,
    ) -> Self {
        let idp_sso_url = format!(
            "https://{}.onelogin.com/trust/saml2/http-post/sso",
            settings.onelogin.effective_subdomain()
        );

        info!(entity_id = %settings.saml.entity_id, "SAML handler initialized");

        Self {
            entity_id: settings.saml.entity_id.clone(),
            acs_url: settings.saml.acs_url.clone(),
            sls_url: settings.saml.sls_url.clone(),
            idp_sso_url,
            store,
            pending: RwLock::new(HashMap::new()),
            retention,
            session_ttl_secs: SESSION_TTL_SECS,
        }
    }

    pub fn entity_id(&self) -> &str {
        &self.entity_id
    }

    pub fn acs_url(&self) -> &str {
        &self.acs_url
    }

    pub fn sls_url(&self) -> &str {
        &self.sls_url
    }

    /// IdP endpoint AuthnRequests are addressed to.
    pub fn idp_sso_url(&self) -> &str {
        &self.idp_sso_url
    }

    /// Build an AuthnRequest and record it as pending.
    ///
    /// Returns `(request_id, base64_document)`.
    pub fn generate_saml_request(&self, relay_state: Option<&str>) -> (String, String) {
        let request_id = new_request_id();
        let request = AuthnRequest {
            id: &request_id,
            issue_instant: Utc::now(),
            destination: &self.idp_sso_url,
            acs_url: &self.acs_url,
            issuer: &self.entity_id,
        };
        let encoded = request.encode();

        match self.pending.write() {
            Ok(mut pending) => {
                pending.insert(
                    request_id.clone(),
                    PendingRequest::new(request_id.clone(), relay_state),
                );
            }
            Err(_) => warn!(request_id = %request_id, "Pending request lock poisoned"),
        }

        info!(request_id = %request_id, "Generated SAML request");
        (request_id, encoded)
    }

    /// Redirect-binding URL carrying an encoded request and optional relay state.
    pub fn build_redirect_url(&self, encoded_request: &str, relay_state: Option<&str>) -> String {
        let mut url = format!(
            "{}?SAMLRequest={}",
            self.idp_sso_url,
            urlencoding::encode(encoded_request)
        );

        if let Some(state) = relay_state {
            url.push_str(&format!("&RelayState={}", urlencoding::encode(state)));
        }

        debug!(url = %url, "Built SAML redirect URL");
        url
    }

    /// Look up a request issued by [`Self::generate_saml_request`].
    pub fn pending_request(&self, request_id: &str) -> Option<PendingRequest> {
        self.pending
            .read()
            .ok()
            .and_then(|pending| pending.get(request_id).cloned())
    }

    /// Drop pending requests issued at or before `now - max_age`.
    /// Returns the number removed.
    pub fn evict_stale_requests_at(&self, now: DateTime<Utc>, max_age: Duration) -> usize {
        let cutoff = now - max_age;
        match self.pending.write() {
            Ok(mut pending) => {
                let before = pending.len();
                pending.retain(|_, request| request.created_at > cutoff);
                let evicted = before - pending.len();
                debug!(evicted, remaining = pending.len(), "Evicted stale SAML requests");
                evicted
            }
            Err(_) => {
                warn!("Pending request lock poisoned");
                0
            }
        }
    }

    pub fn evict_stale_requests(&self, max_age: Duration) -> usize {
        self.evict_stale_requests_at(Utc::now(), max_age)
    }

    /// Decode and parse a SAML Response.
    ///
    /// Only decoding and XML well-formedness are checked. Accepted responses
    /// always carry the fixed demo attribute set and a fresh, unstored session id.
    pub fn validate_saml_response(
        &self,
        saml_response: &str,
        relay_state: Option<&str>,
    ) -> ResponseValidation {
        let parsed = decode_response(saml_response).and_then(|xml| check_well_formed(&xml));

        match parsed {
            Ok(()) => {
                info!("SAML response validated");
                ResponseValidation::accepted(demo_attributes(), relay_state)
            }
            Err(e) => {
                warn!(error = %e, "SAML response validation failed");
                ResponseValidation::rejected(&e)
            }
        }
    }

    /// Store a new active session for `attributes`, expiring in 8 hours.
    pub fn create_user_session(
        &self,
        attributes: BTreeMap<String, String>,
    ) -> HarnessResult<SessionId> {
        self.create_user_session_at(attributes, Utc::now())
    }

    /// Store a new active session starting at `now`.
    pub fn create_user_session_at(
        &self,
        attributes: BTreeMap<String, String>,
        now: DateTime<Utc>,
    ) -> HarnessResult<SessionId> {
        let session = Session::starting_at(attributes, now, self.session_ttl_secs);
        let id = session.id;
        self.store.put(session)?;

        info!(session_id = %id, "Created user session");
        Ok(id)
    }

    /// Validate a session id against the current time.
    pub fn validate_session(&self, session_id: &str) -> SessionValidation {
        self.validate_session_at(session_id, Utc::now())
    }

    /// Validate a session id at `now`. Expiry is reported before logout.
    ///
    /// A failing store reads as "Session not found" here; use
    /// [`Self::try_validate_session_at`] to see the store error.
    pub fn validate_session_at(&self, session_id: &str, now: DateTime<Utc>) -> SessionValidation {
        self.try_validate_session_at(session_id, now)
            .unwrap_or_else(|e| {
                warn!(session_id = %session_id, error = %e, "Session lookup failed");
                SessionValidation::Invalid(SessionInvalidReason::NotFound)
            })
    }

    /// Validate a session id at `now`, propagating store failures.
    pub fn try_validate_session_at(
        &self,
        session_id: &str,
        now: DateTime<Utc>,
    ) -> HarnessResult<SessionValidation> {
        let session = match SessionId::parse(session_id) {
            Some(id) => self.store.get(&id)?,
            None => None,
        };
        let Some(session) = session else {
            return Ok(SessionValidation::Invalid(SessionInvalidReason::NotFound));
        };

        Ok(match session.state_at(now) {
            SessionState::Expired => SessionValidation::Invalid(SessionInvalidReason::Expired),
            SessionState::Inactive => SessionValidation::Invalid(SessionInvalidReason::Inactive),
            SessionState::Active => SessionValidation::Valid {
                user_attributes: session.attributes,
                expires_at: session.expires_at,
            },
        })
    }

    /// Log a session out. Returns false if the session is unknown.
    pub fn logout_user(&self, session_id: &str) -> bool {
        let Some(id) = SessionId::parse(session_id) else {
            return false;
        };

        let result = match self.retention {
            RetentionPolicy::RetainOnLogout => self.store.update(&id, &|s| s.active = false),
            RetentionPolicy::DeleteOnLogout => self.store.delete(&id),
        };

        match result {
            Ok(true) => {
                info!(session_id = %session_id, "User logged out");
                true
            }
            Ok(false) => false,
            Err(e) => {
                warn!(session_id = %session_id, error = %e, "Logout failed");
                false
            }
        }
    }

    /// Session counts. Expired sessions still count toward the total.
    pub fn get_session_stats(&self) -> SessionStats {
        let sessions = self.store.list().unwrap_or_else(|e| {
            warn!(error = %e, "Failed to list sessions");
            Vec::new()
        });
        let pending_requests = self.pending.read().map(|p| p.len()).unwrap_or(0);

        let total_sessions = sessions.len();
        let active_sessions = sessions.iter().filter(|s| s.active).count();
        let active_ratio =
            round_to(active_sessions as f64 / total_sessions.max(1) as f64 * 100.0, 2);

        SessionStats {
            active_sessions,
            total_sessions,
            active_ratio,
            pending_requests,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HarnessError;
    use base64::{engine::general_purpose::STANDARD as BASE64, Engine};

    fn test_manager() -> SsoSessionManager {
        SsoSessionManager::new(&Settings::default())
    }

    fn attrs(email: &str) -> BTreeMap<String, String> {
        let mut attributes = BTreeMap::new();
        attributes.insert("email".to_string(), email.to_string());
        attributes
    }

    #[test]
    fn test_generate_saml_request() {
        let manager = test_manager();
        let (request_id, encoded) = manager.generate_saml_request(Some("/dashboard"));

        assert!(request_id.starts_with('_'));
        let xml = String::from_utf8(BASE64.decode(&encoded).unwrap()).unwrap();
        assert!(xml.contains(&format!(r#"ID="{}""#, request_id)));
        assert!(xml.contains("https://demo-company.onelogin.com/trust/saml2/http-post/sso"));
        assert!(xml.contains("https://localhost:5000/saml/acs"));
        assert!(check_well_formed(&xml).is_ok());

        let pending = manager.pending_request(&request_id).unwrap();
        assert_eq!(pending.relay_state.as_deref(), Some("/dashboard"));
        assert_eq!(manager.get_session_stats().pending_requests, 1);
        assert_eq!(manager.get_session_stats().total_sessions, 0);
    }

    #[test]
    fn test_build_redirect_url() {
        let manager = test_manager();
        let url = manager.build_redirect_url("a+b/c=", Some("/next page"));
        assert!(url.starts_with("https://demo-company.onelogin.com/trust/saml2/http-post/sso?"));
        assert!(url.contains("SAMLRequest=a%2Bb%2Fc%3D"));
        assert!(url.contains("RelayState=%2Fnext%20page"));

        let no_state = manager.build_redirect_url("abc", None);
        assert!(!no_state.contains("RelayState"));
    }

    #[test]
    fn test_validate_response_not_base64() {
        let manager = test_manager();
        let result = manager.validate_saml_response("%%% not base64 %%%", None);
        assert!(!result.valid);
        assert!(result.error.as_deref().is_some_and(|e| !e.is_empty()));
        assert!(result.user_attributes.is_none());
    }

    #[test]
    fn test_validate_response_malformed_xml() {
        let manager = test_manager();
        let encoded = BASE64.encode("<samlp:Response><unclosed>");
        let result = manager.validate_saml_response(&encoded, None);
        assert!(!result.valid);
        assert!(result.error.is_some());
    }

    #[test]
    fn test_validate_response_ignores_content() {
        let manager = test_manager();
        let encoded = BASE64.encode(
            r#"<samlp:Response xmlns:samlp="urn:oasis:names:tc:SAML:2.0:protocol"><Attribute Name="email">someone.else@example.com</Attribute></samlp:Response>"#,
        );
        let result = manager.validate_saml_response(&encoded, Some("state-1"));

        assert!(result.valid);
        let attributes = result.user_attributes.unwrap();
        assert_eq!(attributes["email"], "demo.user@example.com");
        assert!(result.session_id.is_some());
        assert_eq!(result.relay_state.as_deref(), Some("state-1"));

        // The returned id is not a stored session
        let id = result.session_id.unwrap().to_string();
        assert_eq!(
            manager.validate_session(&id).reason(),
            Some(SessionInvalidReason::NotFound)
        );
    }

    #[test]
    fn test_session_lifecycle() {
        let manager = test_manager();
        let id = manager
            .create_user_session(attrs("user@example.com"))
            .unwrap()
            .to_string();

        let validation = manager.validate_session(&id);
        assert!(validation.is_valid());
        assert_eq!(
            validation.user_attributes().unwrap()["email"],
            "user@example.com"
        );

        assert!(manager.logout_user(&id));
        assert_eq!(
            manager.validate_session(&id).reason(),
            Some(SessionInvalidReason::Inactive)
        );

        // Logged-out sessions stay in the table
        assert_eq!(manager.get_session_stats().total_sessions, 1);
    }

    #[test]
    fn test_session_not_found() {
        let manager = test_manager();
        assert_eq!(
            manager.validate_session("session_missing").reason(),
            Some(SessionInvalidReason::NotFound)
        );
        assert_eq!(
            manager.validate_session(&SessionId::new().to_string()).reason(),
            Some(SessionInvalidReason::NotFound)
        );
        assert!(!manager.logout_user("session_missing"));
        assert!(!manager.logout_user(&SessionId::new().to_string()));
    }

    #[test]
    fn test_session_expiry() {
        let manager = test_manager();
        let now = Utc::now();
        let id = manager
            .create_user_session_at(attrs("user@example.com"), now)
            .unwrap()
            .to_string();

        let just_before = now + Duration::hours(8) - Duration::seconds(1);
        assert!(manager.validate_session_at(&id, just_before).is_valid());

        let after = now + Duration::hours(8) + Duration::milliseconds(1);
        assert_eq!(
            manager.validate_session_at(&id, after).reason(),
            Some(SessionInvalidReason::Expired)
        );

        // Expired wins over inactive
        manager.logout_user(&id);
        assert_eq!(
            manager.validate_session_at(&id, after).reason(),
            Some(SessionInvalidReason::Expired)
        );
    }

    #[test]
    fn test_session_stats() {
        let manager = test_manager();
        let ids: Vec<String> = (0..3)
            .map(|i| {
                manager
                    .create_user_session(attrs(&format!("user{}@example.com", i)))
                    .unwrap()
                    .to_string()
            })
            .collect();
        assert!(manager.logout_user(&ids[1]));

        let stats = manager.get_session_stats();
        assert_eq!(stats.active_sessions, 2);
        assert_eq!(stats.total_sessions, 3);
        assert_eq!(stats.active_ratio, 66.67);
    }

    #[test]
    fn test_session_stats_empty() {
        let stats = test_manager().get_session_stats();
        assert_eq!(stats.total_sessions, 0);
        assert_eq!(stats.active_ratio, 0.0);
    }

    #[test]
    fn test_delete_on_logout_policy() {
        let manager = SsoSessionManager::with_store(
            &Settings::default(),
            Box::new(MemorySessionStore::new()),
            RetentionPolicy::DeleteOnLogout,
        );
        let id = manager
            .create_user_session(attrs("user@example.com"))
            .unwrap()
            .to_string();

        assert!(manager.logout_user(&id));
        assert_eq!(
            manager.validate_session(&id).reason(),
            Some(SessionInvalidReason::NotFound)
        );
        assert_eq!(manager.get_session_stats().total_sessions, 0);
    }

    /// Store whose every operation fails.
    struct PoisonedStore;

    impl SessionStore for PoisonedStore {
        fn get(&self, _id: &SessionId) -> HarnessResult<Option<Session>> {
            Err(HarnessError::LockPoisoned("session store"))
        }

        fn put(&self, _session: Session) -> HarnessResult<()> {
            Err(HarnessError::LockPoisoned("session store"))
        }

        fn delete(&self, _id: &SessionId) -> HarnessResult<bool> {
            Err(HarnessError::LockPoisoned("session store"))
        }

        fn list(&self) -> HarnessResult<Vec<Session>> {
            Err(HarnessError::LockPoisoned("session store"))
        }

        fn update(&self, _id: &SessionId, _apply: &dyn Fn(&mut Session)) -> HarnessResult<bool> {
            Err(HarnessError::LockPoisoned("session store"))
        }
    }

    #[test]
    fn test_validate_response_line_wrapped() {
        let manager = test_manager();
        let xml = format!(
            r#"<samlp:Response xmlns:samlp="urn:oasis:names:tc:SAML:2.0:protocol" ID="_r1"><Issuer>{}</Issuer></samlp:Response>"#,
            "https://demo-company.onelogin.com/saml/metadata/".repeat(4)
        );
        let flat = BASE64.encode(xml);
        assert!(flat.len() > 152);

        let wrapped = flat
            .as_bytes()
            .chunks(76)
            .map(|chunk| std::str::from_utf8(chunk).unwrap())
            .collect::<Vec<_>>()
            .join("\r\n");

        assert!(manager.validate_saml_response(&flat, None).valid);
        let result = manager.validate_saml_response(&wrapped, None);
        assert!(result.valid, "{:?}", result.error);
    }

    #[test]
    fn test_store_fault_surfaces_on_try_validate() {
        let manager = SsoSessionManager::with_store(
            &Settings::default(),
            Box::new(PoisonedStore),
            RetentionPolicy::default(),
        );
        let id = SessionId::new().to_string();

        assert!(matches!(
            manager.try_validate_session_at(&id, Utc::now()),
            Err(HarnessError::LockPoisoned(_))
        ));
        assert_eq!(
            manager.validate_session(&id).reason(),
            Some(SessionInvalidReason::NotFound)
        );
        // Unparseable ids never reach the store
        assert_eq!(
            manager
                .try_validate_session_at("session_missing", Utc::now())
                .unwrap()
                .reason(),
            Some(SessionInvalidReason::NotFound)
        );
    }

    #[test]
    fn test_evict_stale_requests() {
        let manager = test_manager();
        for _ in 0..5 {
            manager.generate_saml_request(None);
        }
        assert_eq!(manager.get_session_stats().pending_requests, 5);

        assert_eq!(manager.evict_stale_requests(Duration::hours(1)), 0);
        assert_eq!(manager.get_session_stats().pending_requests, 5);

        let later = Utc::now() + Duration::hours(2);
        assert_eq!(manager.evict_stale_requests_at(later, Duration::hours(1)), 5);
        assert_eq!(manager.get_session_stats().pending_requests, 0);
    }
}
