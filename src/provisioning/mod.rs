//! User provisioning orchestration.
//!
//! Generates test users, runs them through the identity API and the SSO
//! session manager, and reports on the outcome.

mod engine;
mod metrics;
mod report;
mod users;

pub use engine::ProvisioningEngine;
pub use metrics::{BatchMetrics, ProvisioningStats};
pub use report::{
    default_report_filename, write_report, BatchResult, ConfigurationSummary, ProvisioningResult,
    SystemStats,
};
pub use users::{generate_test_users, DEPARTMENTS, ROLES};
