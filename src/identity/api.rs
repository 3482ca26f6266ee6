//! Identity provider capability interface and its result types.

use serde::Serialize;
use std::collections::BTreeMap;
use tracing::info;

use crate::error::HarnessResult;
use crate::user::MappedUser;
use crate::util::round_to;

/// Manual onboarding estimate per user, in minutes.
pub const MANUAL_MINUTES_PER_USER: u64 = 4;
/// Automated onboarding estimate per user, in minutes.
pub const AUTOMATED_MINUTES_PER_USER: u64 = 1;

/// User as created by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreatedUser {
    pub user_id: String,
    pub email: String,
    pub created_at: String,
    pub status: String,
}

/// User as returned by an email lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserLookup {
    pub id: String,
    pub email: String,
    pub firstname: String,
    pub lastname: String,
    pub status: String,
    pub created_at: String,
}

/// Snapshot of client state for reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApiStats {
    pub authenticated: bool,
    pub token_valid: bool,
    pub base_url: String,
    pub region: String,
    pub subdomain: String,
    pub demo_mode: bool,
}

/// Fixed linear time-savings estimate for a bulk create.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeSavings {
    pub traditional_time_minutes: u64,
    pub automated_time_minutes: u64,
    pub time_saved_minutes: u64,
    pub reduction_percentage: f64,
}

impl TimeSavings {
    pub fn for_users(count: usize) -> Self {
        let count = count as u64;
        let traditional = count * MANUAL_MINUTES_PER_USER;
        let automated = count * AUTOMATED_MINUTES_PER_USER;
        let saved = traditional - automated;
        let reduction = if traditional > 0 {
            round_to(saved as f64 / traditional as f64 * 100.0, 1)
        } else {
            0.0
        };

        Self {
            traditional_time_minutes: traditional,
            automated_time_minutes: automated,
            time_saved_minutes: saved,
            reduction_percentage: reduction,
        }
    }
}

/// Aggregate outcome of [`IdentityApi::provision_users_bulk`].
#[derive(Debug, Clone, Serialize)]
pub struct BulkCreateResult {
    /// False only when authentication failed before any user was attempted.
    pub success: bool,
    pub total_users: usize,
    pub successful: usize,
    pub failed: usize,
    pub created_users: Vec<CreatedUser>,
    pub errors: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics: Option<TimeSavings>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Operations an identity provider backend must offer.
///
/// The orchestrator only talks to this trait, so a networked client can
/// replace the simulated one without touching provisioning code.
pub trait IdentityApi: Send + Sync {
    /// Obtain a fresh access token. Returns false when the provider refuses.
    fn authenticate(&self) -> bool;

    /// Whether a non-expired token is currently held.
    fn is_authenticated(&self) -> bool;

    /// Create one user.
    fn create_user(&self, user: &MappedUser) -> HarnessResult<CreatedUser>;

    /// Look a user up by email. `None` when authentication fails.
    fn get_user_by_email(&self, email: &str) -> Option<UserLookup>;

    /// Push attribute changes for a user.
    fn sync_user_attributes(&self, user_id: &str, attributes: &BTreeMap<String, String>) -> bool;

    /// State snapshot for reporting.
    fn get_api_stats(&self) -> ApiStats;

    /// Authenticate if needed, returning false only on refusal.
    fn ensure_authenticated(&self) -> bool {
        self.is_authenticated() || self.authenticate()
    }

    /// Create users one after another, continuing past failures.
    fn provision_users_bulk(&self, users: &[MappedUser]) -> BulkCreateResult {
        if !self.ensure_authenticated() {
            return BulkCreateResult {
                success: false,
                total_users: users.len(),
                successful: 0,
                failed: 0,
                created_users: Vec::new(),
                errors: Vec::new(),
                metrics: None,
                error: Some("Authentication failed".to_string()),
            };
        }

        let mut created_users = Vec::new();
        let mut errors = Vec::new();

        for user in users {
            match self.create_user(user) {
                Ok(created) => created_users.push(created),
                Err(_) => errors.push(format!("Failed to create {}", user.email)),
            }
        }

        let result = BulkCreateResult {
            success: true,
            total_users: users.len(),
            successful: created_users.len(),
            failed: errors.len(),
            created_users,
            errors,
            metrics: Some(TimeSavings::for_users(users.len())),
            error: None,
        };

        info!(
            successful = result.successful,
            total = result.total_users,
            "Bulk provisioning complete"
        );
        result
    }
}
