//! Retention of the check history.
//!
//! Checks older than the configured number of days are deleted
//! periodically as a background task. Zero days keeps everything.

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::Retention;
use crate::database::LibsqlRepository;

/// How long check results are kept
#[derive(Debug, Clone)]
pub struct RetentionPolicy {
    /// Days to keep check results, 0 disables cleanup
    pub check_result_days: u32,
    /// Time between two cleanup runs
    pub cleanup_interval: Duration,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self { check_result_days: 30, cleanup_interval: Duration::from_secs(3600) }
    }
}

impl From<&Retention> for RetentionPolicy {
    fn from(config: &Retention) -> Self {
        Self {
            check_result_days: config.check_result_days,
            cleanup_interval: Duration::from_secs(config.cleanup_interval_seconds),
        }
    }
}

impl RetentionPolicy {
    fn retention(&self) -> Option<chrono::Duration> {
        (self.check_result_days > 0).then(|| chrono::Duration::days(i64::from(self.check_result_days)))
    }
}

/// Cleanup manager for expired checks
pub struct RetentionCleanup {
    repository: Arc<LibsqlRepository>,
    policy: RetentionPolicy,
}

impl RetentionCleanup {
    pub fn new(repository: Arc<LibsqlRepository>, policy: RetentionPolicy) -> Self {
        Self { repository, policy }
    }

    /// Delete checks past the retention window, returning how many were removed
    pub async fn cleanup_expired_checks(&self) -> Result<u64> {
        let Some(retention) = self.policy.retention() else {
            debug!("Check retention disabled, skipping cleanup");
            return Ok(0);
        };

        let cutoff = chrono::Utc::now() - retention;
        debug!("Cleaning up checks older than {} days (cutoff: {})", self.policy.check_result_days, cutoff);

        let deleted = self.repository.delete_checks_before(cutoff).await?;
        info!("Retention cleanup completed: {} checks deleted", deleted);
        Ok(deleted)
    }

    /// Start background cleanup task
    pub fn start_periodic_cleanup(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(self.policy.cleanup_interval);

            loop {
                interval.tick().await;

                if let Err(e) = self.cleanup_expired_checks().await {
                    warn!("Periodic check cleanup failed: {}", e);
                }
            }
        })
    }
}
