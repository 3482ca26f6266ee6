//! SAML single sign-on.
//!
//! Provides SP-initiated AuthnRequests, response acceptance and the SSO
//! session table.

pub mod provider;
pub mod request;
pub mod response;

pub use provider::{SessionStats, SsoSessionManager};
pub use request::{AuthnRequest, PendingRequest, RequestStatus};
pub use response::{demo_attributes, ResponseValidation};
