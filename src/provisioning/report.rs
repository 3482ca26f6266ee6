//! Provisioning run results and the JSON report written from them.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use super::metrics::{BatchMetrics, ProvisioningStats};
use crate::error::HarnessResult;
use crate::identity::ApiStats;
use crate::saml::SessionStats;
use crate::session::SessionId;
use crate::user::MappedUser;
use crate::util::round_to;

/// Outcome of provisioning one user.
#[derive(Debug, Clone, Serialize)]
pub struct ProvisioningResult {
    pub success: bool,
    pub user_email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub onelogin_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<SessionId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attributes: Option<MappedUser>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ProvisioningResult {
    pub fn succeeded(user: MappedUser, onelogin_id: String, session_id: SessionId) -> Self {
        Self {
            success: true,
            user_email: user.email.clone(),
            onelogin_id: Some(onelogin_id),
            session_id: Some(session_id),
            attributes: Some(user),
            timestamp: Some(Utc::now()),
            error: None,
        }
    }

    pub fn failed(user_email: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            success: false,
            user_email: user_email.into(),
            onelogin_id: None,
            session_id: None,
            attributes: None,
            timestamp: None,
            error: Some(error.into()),
        }
    }
}

/// Aggregate outcome of a bulk provisioning run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchResult {
    pub total_users: usize,
    pub successful: usize,
    pub failed: usize,
    pub results: Vec<ProvisioningResult>,
    pub errors: Vec<String>,
    pub performance_metrics: BatchMetrics,
}

impl BatchResult {
    /// Successful share of the batch in percent, 0 for an empty batch.
    pub fn success_rate_percentage(&self) -> f64 {
        round_to(
            self.successful as f64 / self.total_users.max(1) as f64 * 100.0,
            2,
        )
    }
}

/// Configuration part of [`SystemStats`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfigurationSummary {
    pub enabled_applications: usize,
    pub configured: bool,
}

/// Combined state of every component.
#[derive(Debug, Clone, Serialize)]
pub struct SystemStats {
    pub provisioning_engine: ProvisioningStats,
    pub onelogin_connector: ApiStats,
    pub saml_handler: SessionStats,
    pub configuration: ConfigurationSummary,
}

#[derive(Debug, Serialize)]
struct ReportSummary {
    total_users: usize,
    successful: usize,
    failed: usize,
    success_rate_percentage: f64,
}

#[derive(Debug, Serialize)]
struct ProvisioningReport<'a> {
    summary: ReportSummary,
    performance_metrics: &'a BatchMetrics,
    detailed_results: &'a [ProvisioningResult],
    errors: &'a [String],
    generated_at: DateTime<Utc>,
    system_stats: &'a SystemStats,
}

/// File name used when the caller does not pick one.
pub fn default_report_filename(now: DateTime<Utc>) -> String {
    format!("provisioning_report_{}.json", now.format("%Y%m%d_%H%M%S"))
}

/// Write `batch` as a pretty-printed JSON report to `dir/filename`,
/// creating `dir` if needed.
pub fn write_report(
    dir: &Path,
    filename: &str,
    batch: &BatchResult,
    system_stats: &SystemStats,
) -> HarnessResult<PathBuf> {
    let report = ProvisioningReport {
        summary: ReportSummary {
            total_users: batch.total_users,
            successful: batch.successful,
            failed: batch.failed,
            success_rate_percentage: batch.success_rate_percentage(),
        },
        performance_metrics: &batch.performance_metrics,
        detailed_results: &batch.results,
        errors: &batch.errors,
        generated_at: Utc::now(),
        system_stats,
    };

    fs::create_dir_all(dir)?;
    let path = dir.join(filename);
    fs::write(&path, serde_json::to_string_pretty(&report)?)?;

    info!(path = %path.display(), "Provisioning report exported");
    Ok(path)
}
