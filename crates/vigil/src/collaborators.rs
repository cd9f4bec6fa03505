//! Narrow contracts the engine consumes.
//!
//! Implementations are shared across concurrently running probe units and
//! must tolerate concurrent calls.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::{NotifyError, StoreError};
use crate::types::{CheckResult, MonitoredTarget, User};

/// Source of the targets to check and sink for their status changes
#[async_trait]
pub trait TargetRegistry: Send + Sync {
    /// Snapshot of every target with `active = true`
    async fn list_active(&self) -> Result<Vec<MonitoredTarget>, StoreError>;

    /// Persist the new up/down status of a target
    ///
    /// Writing the status a target already has must be harmless.
    async fn update_status(&self, target_id: Uuid, success: bool) -> Result<(), StoreError>;
}

/// Append-only history of check results
#[async_trait]
pub trait CheckStore: Send + Sync {
    async fn append(&self, result: &CheckResult) -> Result<(), StoreError>;
}

/// Read-only lookup of target owners
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Returns [`StoreError::NotFound`] when no such user exists
    async fn find_by_id(&self, user_id: Uuid) -> Result<User, StoreError>;
}

/// Delivers human readable messages to a destination address
#[async_trait]
pub trait NotificationGateway: Send + Sync {
    /// Returns [`NotifyError::Unconfigured`] when delivery is disabled
    async fn send(&self, destination: &str, subject: &str, body: &str) -> Result<(), NotifyError>;
}
