//! Provisioning counters and batch performance metrics.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;

use crate::identity::MANUAL_MINUTES_PER_USER;
use crate::util::round_to;

/// Running counters kept by the provisioning engine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProvisioningStats {
    pub total_processed: usize,
    pub successful_provisions: usize,
    pub failed_provisions: usize,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
}

impl ProvisioningStats {
    /// Count one provisioning attempt.
    pub fn record(&mut self, success: bool) {
        self.total_processed += 1;
        if success {
            self.successful_provisions += 1;
        } else {
            self.failed_provisions += 1;
        }
    }
}

/// Timing summary for one bulk run, compared against manual onboarding.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchMetrics {
    pub processing_time_seconds: f64,
    pub processing_time_minutes: f64,
    pub traditional_time_minutes: f64,
    pub time_saved_minutes: f64,
    pub efficiency_gain_percentage: f64,
    pub users_per_minute: f64,
}

impl BatchMetrics {
    /// Metrics for `user_count` users processed in `elapsed`.
    ///
    /// Empty batches and zero elapsed time yield zero rates.
    pub fn compute(user_count: usize, elapsed: Duration) -> Self {
        let processing_secs = elapsed.as_secs_f64();
        let traditional_secs = (user_count as u64 * MANUAL_MINUTES_PER_USER * 60) as f64;

        let efficiency_gain = if traditional_secs > 0.0 {
            round_to((traditional_secs - processing_secs) / traditional_secs * 100.0, 1)
        } else {
            0.0
        };

        let users_per_minute = if processing_secs > 0.0 {
            round_to(user_count as f64 / (processing_secs / 60.0), 2)
        } else {
            0.0
        };

        let time_saved = if user_count > 0 {
            round_to((traditional_secs - processing_secs) / 60.0, 2)
        } else {
            0.0
        };

        Self {
            processing_time_seconds: round_to(processing_secs, 2),
            processing_time_minutes: round_to(processing_secs / 60.0, 2),
            traditional_time_minutes: traditional_secs / 60.0,
            time_saved_minutes: time_saved,
            efficiency_gain_percentage: efficiency_gain,
            users_per_minute,
        }
    }
}
