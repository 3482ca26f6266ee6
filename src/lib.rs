//! SSO provisioning harness.
//!
//! Provisions synthetic users into a simulated OneLogin tenant, opens SAML
//! SSO sessions for them, and reports on the run.

pub mod config;
pub mod error;
pub mod identity;
pub mod provisioning;
pub mod saml;
pub mod session;
pub mod user;

pub(crate) mod util;

pub use config::Settings;
pub use error::{HarnessError, HarnessResult, SessionInvalidReason};
pub use identity::{DemoIdentityClient, IdentityApi, SimulatedFaults};
pub use provisioning::{BatchResult, ProvisioningEngine, ProvisioningResult, SystemStats};
pub use saml::SsoSessionManager;
pub use session::{RetentionPolicy, SessionId, SessionStore};
pub use user::{MappedUser, UserRecord};
