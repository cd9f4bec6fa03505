use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::collaborators::{NotificationGateway, TargetRegistry, UserDirectory};
use crate::error::{NotifyError, StoreError};
use crate::types::{CheckResult, MonitoredTarget, NotificationIntent, TargetStatus};

/// What happened to the notification of a transition
#[derive(Debug)]
pub enum NotificationOutcome {
    Sent,
    /// The owner could not be looked up, nothing was sent
    Skipped(StoreError),
    /// The gateway refused or failed, including the unconfigured case
    Failed(NotifyError),
}

impl NotificationOutcome {
    pub fn is_sent(&self) -> bool {
        matches!(self, NotificationOutcome::Sent)
    }
}

/// Result of comparing a fresh check result with the stored status
#[derive(Debug)]
pub enum Observation {
    Unchanged,
    Transitioned {
        from: TargetStatus,
        to: TargetStatus,
        notification: NotificationOutcome,
        status_persisted: bool,
    },
}

impl Observation {
    pub fn is_transition(&self) -> bool {
        matches!(self, Observation::Transitioned { .. })
    }
}

/// Detects up/down transitions and reacts to them
///
/// The comparison is made against the status captured in the cycle
/// snapshot. A single differing result flips the state.
pub struct TransitionDetector {
    registry: Arc<dyn TargetRegistry>,
    directory: Arc<dyn UserDirectory>,
    gateway: Arc<dyn NotificationGateway>,
}

impl TransitionDetector {
    pub fn new(
        registry: Arc<dyn TargetRegistry>,
        directory: Arc<dyn UserDirectory>,
        gateway: Arc<dyn NotificationGateway>,
    ) -> Self {
        Self { registry, directory, gateway }
    }

    /// Compare `result` with `target.status`, notify the owner and persist
    /// the new status when they differ
    pub async fn observe(&self, target: &MonitoredTarget, result: &CheckResult) -> Observation {
        let from = target.status;
        let to = result.status();

        if from == to {
            return Observation::Unchanged;
        }

        match to {
            TargetStatus::Down => warn!(
                target_id = %target.id,
                url = %target.url,
                status_code = result.status_code,
                "STATUS CHANGE: {} is now {}", target.name, to
            ),
            TargetStatus::Up => info!(
                target_id = %target.id,
                url = %target.url,
                "STATUS CHANGE: {} is now {}", target.name, to
            ),
        }

        // Notify before writing, so a failed write never loses the alert
        let notification = self.notify_owner(target, to).await;

        let status_persisted = match self.registry.update_status(target.id, result.success).await {
            Ok(()) => true,
            Err(e) => {
                error!(target_id = %target.id, url = %target.url, "Error updating target status: {}", e);
                false
            }
        };

        Observation::Transitioned { from, to, notification, status_persisted }
    }

    async fn notify_owner(&self, target: &MonitoredTarget, status: TargetStatus) -> NotificationOutcome {
        let owner = match self.directory.find_by_id(target.owner_id).await {
            Ok(owner) => owner,
            Err(e) => {
                warn!(
                    target_id = %target.id,
                    owner_id = %target.owner_id,
                    "Could not find owner to alert for {}: {}", target.name, e
                );
                return NotificationOutcome::Skipped(e);
            }
        };

        let intent = NotificationIntent::for_transition(target, status, owner.email);

        match self.gateway.send(&intent.destination, &intent.subject, &intent.body).await {
            Ok(()) => {
                debug!(target_id = %target.id, destination = %intent.destination, "Notification sent");
                NotificationOutcome::Sent
            }
            Err(NotifyError::Unconfigured) => {
                debug!(target_id = %target.id, "Notification gateway unconfigured, alert not delivered");
                NotificationOutcome::Failed(NotifyError::Unconfigured)
            }
            Err(e) => {
                error!(
                    target_id = %target.id,
                    destination = %intent.destination,
                    "Error sending notification: {}", e
                );
                NotificationOutcome::Failed(e)
            }
        }
    }
}
