use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Up/down classification of a monitored target
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetStatus {
    #[default]
    Up,
    Down,
}

impl TargetStatus {
    /// Map a probe's success flag onto a status
    pub fn from_success(success: bool) -> Self {
        if success { TargetStatus::Up } else { TargetStatus::Down }
    }

    pub fn is_up(self) -> bool {
        self == TargetStatus::Up
    }
}

impl std::fmt::Display for TargetStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TargetStatus::Up => write!(f, "UP"),
            TargetStatus::Down => write!(f, "DOWN"),
        }
    }
}

/// An externally owned endpoint that is checked every cycle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitoredTarget {
    /// Opaque target identity
    pub id: Uuid,

    /// User that owns the target and receives its alerts
    pub owner_id: Uuid,

    /// Address probed every cycle
    pub url: String,

    /// Human readable name used in notifications
    pub name: String,

    /// Last persisted status, the reference for transition detection
    pub status: TargetStatus,

    /// Inactive targets are never probed
    pub active: bool,
}

impl MonitoredTarget {
    /// Create a new active target, assumed up until a probe says otherwise
    pub fn new(owner_id: Uuid, name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner_id,
            url: url.into(),
            name: name.into(),
            status: TargetStatus::Up,
            active: true,
        }
    }

    pub fn with_status(mut self, status: TargetStatus) -> Self {
        self.status = status;
        self
    }

    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }
}

/// Outcome of a single probe against a target
///
/// Created once per target per cycle and never modified afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckResult {
    pub target_id: Uuid,

    /// Denormalized owner reference, used to route notifications
    pub owner_id: Uuid,

    /// When the probe finished
    pub checked_at: DateTime<Utc>,

    pub success: bool,

    /// HTTP status code, 0 when no response was obtained
    pub status_code: u16,

    /// End-to-end latency of the attempt
    pub latency_ms: u64,
}

impl CheckResult {
    /// Result of a probe that received a response
    pub fn responded(target: &MonitoredTarget, status_code: u16, latency_ms: u64) -> Self {
        Self {
            target_id: target.id,
            owner_id: target.owner_id,
            checked_at: Utc::now(),
            success: (200..300).contains(&status_code),
            status_code,
            latency_ms,
        }
    }

    /// Result of a probe that never got a response (timeout, DNS, refused, TLS)
    pub fn unreachable(target: &MonitoredTarget, latency_ms: u64) -> Self {
        Self {
            target_id: target.id,
            owner_id: target.owner_id,
            checked_at: Utc::now(),
            success: false,
            status_code: 0,
            latency_ms,
        }
    }

    pub fn status(&self) -> TargetStatus {
        TargetStatus::from_success(self.success)
    }
}

/// Owner of monitored targets
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    /// Notification address
    pub email: String,
}

/// Message composed on a status transition, handed to the notification gateway
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationIntent {
    pub destination: String,
    pub subject: String,
    pub body: String,
}

impl NotificationIntent {
    /// Compose the alert or recovery message for `target` entering `status`
    pub fn for_transition(
        target: &MonitoredTarget,
        status: TargetStatus,
        destination: impl Into<String>,
    ) -> Self {
        let (subject, body) = match status {
            TargetStatus::Up => (
                format!("✅ Resolved: Your site '{}' is back up!", target.name),
                format!(
                    "Good news! Your monitored URL '{}' ({}) has recovered and is now back online.",
                    target.name, target.url
                ),
            ),
            TargetStatus::Down => (
                format!("🔴 Alert: Your site '{}' is down!", target.name),
                format!(
                    "This is an automated alert to inform you that your monitored URL '{}' ({}) \
                     is currently down.",
                    target.name, target.url
                ),
            ),
        };

        Self { destination: destination.into(), subject, body }
    }
}
