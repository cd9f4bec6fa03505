use thiserror::Error;

/// Failure reported by the registry, the check store or the user directory
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Record not found: {0}")]
    NotFound(String),
    #[error("Storage backend error: {0:#}")]
    Backend(#[from] anyhow::Error),
}

/// Failure reported by a notification gateway
#[derive(Debug, Error)]
pub enum NotifyError {
    /// No credentials were supplied, delivery is disabled
    #[error("Notification gateway is not configured")]
    Unconfigured,
    #[error("Failed to deliver notification: {0}")]
    Delivery(String),
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
}

impl NotifyError {
    pub fn is_unconfigured(&self) -> bool {
        matches!(self, NotifyError::Unconfigured)
    }
}

/// Failure that aborts a whole check cycle
#[derive(Debug, Error)]
pub enum CycleError {
    #[error("Failed to read active targets: {0}")]
    Registry(#[source] StoreError),
}
