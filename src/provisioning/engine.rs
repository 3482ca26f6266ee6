//! Provisioning engine.
//!
//! Drives users through identity creation and SSO session setup, keeps the
//! running counters, and exports reports.

use chrono::Utc;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;
use tracing::{debug, error, info, warn};

use super::metrics::{BatchMetrics, ProvisioningStats};
use super::report::{
    default_report_filename, write_report, BatchResult, ConfigurationSummary, ProvisioningResult,
    SystemStats,
};
use super::users;
use crate::config::{ApplicationConfig, Settings};
use crate::error::HarnessResult;
use crate::identity::{DemoIdentityClient, IdentityApi, SimulatedFaults};
use crate::saml::SsoSessionManager;
use crate::user::{MappedUser, UserRecord};

/// Error reported when the identity provider refuses a user.
const REMOTE_CREATE_FAILED: &str = "OneLogin user creation failed";

/// Orchestrates identity creation and SSO sessions for batches of users.
pub struct ProvisioningEngine {
    settings: Arc<Settings>,
    identity: Box<dyn IdentityApi>,
    sso: SsoSessionManager,
    stats: Mutex<ProvisioningStats>,
    report_dir: PathBuf,
}

impl ProvisioningEngine {
    /// Create an engine backed by the simulated identity API.
    pub fn new(settings: Arc<Settings>) -> Self {
        Self::with_faults(settings, SimulatedFaults::default())
    }

    /// Create an engine whose simulated identity API fails on demand.
    pub fn with_faults(settings: Arc<Settings>, faults: SimulatedFaults) -> Self {
        let identity = DemoIdentityClient::with_faults(&settings.onelogin, faults);
        let sso = SsoSessionManager::new(&settings);
        Self::with_components(settings, Box::new(identity), sso)
    }

    /// Create an engine over caller-supplied components.
    pub fn with_components(
        settings: Arc<Settings>,
        identity: Box<dyn IdentityApi>,
        sso: SsoSessionManager,
    ) -> Self {
        let report_dir = settings.logs_dir();
        info!(report_dir = %report_dir.display(), "Provisioning engine initialized");

        Self {
            settings,
            identity,
            sso,
            stats: Mutex::new(ProvisioningStats::default()),
            report_dir,
        }
    }

    /// Write reports to `dir` instead of the configured logs directory.
    pub fn with_report_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.report_dir = dir.into();
        self
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn identity(&self) -> &dyn IdentityApi {
        self.identity.as_ref()
    }

    pub fn sso(&self) -> &SsoSessionManager {
        &self.sso
    }

    pub fn report_dir(&self) -> &Path {
        &self.report_dir
    }

    /// Snapshot of the running counters.
    pub fn stats(&self) -> ProvisioningStats {
        self.lock_stats().clone()
    }

    /// Counters stay consistent after a panic elsewhere, so a poisoned lock
    /// is recovered rather than reported.
    fn lock_stats(&self) -> MutexGuard<'_, ProvisioningStats> {
        self.stats.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Generate `count` deterministic test users.
    pub fn generate_test_users(&self, count: usize) -> Vec<UserRecord> {
        users::generate_test_users(count)
    }

    /// Project a raw record into the identity API's schema.
    pub fn map_user_attributes(&self, user: &UserRecord) -> MappedUser {
        MappedUser::from_record(user, Utc::now())
    }

    /// Create one user remotely and open an SSO session for them.
    ///
    /// Every call counts once toward `total_processed` and exactly once
    /// toward either `successful_provisions` or `failed_provisions`.
    pub fn provision_single_user(&self, user: &UserRecord) -> ProvisioningResult {
        let mapped = self.map_user_attributes(user);
        let email = mapped.email.clone();
        debug!(email = %email, "Provisioning user");

        let result = match self.try_provision(mapped) {
            Ok(result) => {
                info!(email = %email, "Provisioned user");
                result
            }
            Err(e) => {
                error!(email = %email, error = %e, "Error provisioning user");
                ProvisioningResult::failed(email, e.to_string())
            }
        };

        self.lock_stats().record(result.success);
        result
    }

    fn try_provision(&self, mapped: MappedUser) -> HarnessResult<ProvisioningResult> {
        let created = match self.identity.create_user(&mapped) {
            Ok(created) => created,
            Err(e) => {
                warn!(email = %mapped.email, error = %e, "Identity provider rejected user");
                return Ok(ProvisioningResult::failed(mapped.email, REMOTE_CREATE_FAILED));
            }
        };

        let session_id = self.sso.create_user_session(mapped.to_attributes())?;
        Ok(ProvisioningResult::succeeded(mapped, created.user_id, session_id))
    }

    /// Provision `users` in order, continuing past failures.
    pub fn provision_users_bulk(&self, users: &[UserRecord]) -> BatchResult {
        info!(count = users.len(), "Starting bulk provisioning");
        self.lock_stats().start_time = Some(Utc::now());
        let started = Instant::now();

        let mut batch = BatchResult {
            total_users: users.len(),
            ..Default::default()
        };

        for user in users {
            let result = self.provision_single_user(user);
            if result.success {
                batch.successful += 1;
            } else {
                batch.failed += 1;
                batch
                    .errors
                    .push(result.error.clone().unwrap_or_else(|| "Unknown error".to_string()));
            }
            batch.results.push(result);
        }

        let elapsed = started.elapsed();
        self.lock_stats().end_time = Some(Utc::now());
        batch.performance_metrics = BatchMetrics::compute(users.len(), elapsed);

        info!(
            successful = batch.successful,
            total = batch.total_users,
            seconds = batch.performance_metrics.processing_time_seconds,
            "Bulk provisioning complete"
        );
        batch
    }

    /// Connect the session to every enabled application.
    ///
    /// Keys are application names; a failed connection is recorded as `false`.
    pub fn provision_applications(&self, session_id: &str) -> BTreeMap<String, bool> {
        self.settings
            .enabled_applications()
            .into_iter()
            .map(|(key, app)| {
                let connected = match self.connect_application(app, session_id) {
                    Ok(()) => {
                        info!(app = %key, name = %app.name, "Provisioned application");
                        true
                    }
                    Err(e) => {
                        error!(app = %key, error = %e, "Failed to provision application");
                        false
                    }
                };
                (app.name.clone(), connected)
            })
            .collect()
    }

    // Applications accept any session; there is no remote call yet.
    fn connect_application(&self, app: &ApplicationConfig, session_id: &str) -> HarnessResult<()> {
        debug!(url = %app.url, session_id, "Connecting application");
        Ok(())
    }

    /// Export `batch` as a JSON report. `filename` defaults to a timestamped name.
    pub fn export_provisioning_report(
        &self,
        batch: &BatchResult,
        filename: Option<&str>,
    ) -> HarnessResult<PathBuf> {
        let filename = match filename {
            Some(name) => name.to_string(),
            None => default_report_filename(Utc::now()),
        };
        write_report(&self.report_dir, &filename, batch, &self.get_system_stats())
    }

    /// State of every component.
    pub fn get_system_stats(&self) -> SystemStats {
        SystemStats {
            provisioning_engine: self.stats(),
            onelogin_connector: self.identity.get_api_stats(),
            saml_handler: self.sso.get_session_stats(),
            configuration: ConfigurationSummary {
                enabled_applications: self.settings.enabled_applications().len(),
                configured: self.settings.is_configured(),
            },
        }
    }

    /// Zero the counters. Tokens and sessions are left alone.
    pub fn reset_stats(&self) {
        *self.lock_stats() = ProvisioningStats::default();
        info!("Provisioning statistics reset");
    }
}
