//! In-process collaborators backed by plain collections.
//!
//! They keep a log of every call so embedders and tests can inspect what the
//! engine did, and can be told to fail on demand.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use uuid::Uuid;

use crate::collaborators::{CheckStore, NotificationGateway, TargetRegistry, UserDirectory};
use crate::error::{NotifyError, StoreError};
use crate::types::{CheckResult, MonitoredTarget, NotificationIntent, TargetStatus, User};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Default)]
pub struct MemoryRegistry {
    targets: Mutex<Vec<MonitoredTarget>>,
    status_updates: Mutex<Vec<(Uuid, bool)>>,
    list_calls: AtomicUsize,
    fail_reads: AtomicBool,
    fail_updates: AtomicBool,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a target
    pub fn insert(&self, target: MonitoredTarget) {
        let mut targets = lock(&self.targets);
        match targets.iter_mut().find(|t| t.id == target.id) {
            Some(existing) => *existing = target,
            None => targets.push(target),
        }
    }

    pub fn remove(&self, target_id: Uuid) -> Option<MonitoredTarget> {
        let mut targets = lock(&self.targets);
        let index = targets.iter().position(|t| t.id == target_id)?;
        Some(targets.remove(index))
    }

    pub fn get(&self, target_id: Uuid) -> Option<MonitoredTarget> {
        lock(&self.targets).iter().find(|t| t.id == target_id).cloned()
    }

    pub fn set_active(&self, target_id: Uuid, active: bool) {
        if let Some(target) = lock(&self.targets).iter_mut().find(|t| t.id == target_id) {
            target.active = active;
        }
    }

    /// Every `update_status` call received, in order
    pub fn status_updates(&self) -> Vec<(Uuid, bool)> {
        lock(&self.status_updates).clone()
    }

    /// Number of `list_active` calls received
    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_updates(&self, fail: bool) {
        self.fail_updates.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl TargetRegistry for MemoryRegistry {
    async fn list_active(&self) -> Result<Vec<MonitoredTarget>, StoreError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StoreError::Backend(anyhow::anyhow!("registry unavailable")));
        }

        Ok(lock(&self.targets).iter().filter(|t| t.active).cloned().collect())
    }

    async fn update_status(&self, target_id: Uuid, success: bool) -> Result<(), StoreError> {
        lock(&self.status_updates).push((target_id, success));
        if self.fail_updates.load(Ordering::SeqCst) {
            return Err(StoreError::Backend(anyhow::anyhow!("registry write rejected")));
        }

        // Deleted mid-cycle: nothing to update
        if let Some(target) = lock(&self.targets).iter_mut().find(|t| t.id == target_id) {
            target.status = TargetStatus::from_success(success);
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryCheckStore {
    results: Mutex<Vec<CheckResult>>,
    failing_targets: Mutex<Vec<Uuid>>,
}

impl MemoryCheckStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every appended result, in append order
    pub fn results(&self) -> Vec<CheckResult> {
        lock(&self.results).clone()
    }

    pub fn results_for(&self, target_id: Uuid) -> Vec<CheckResult> {
        lock(&self.results).iter().filter(|r| r.target_id == target_id).cloned().collect()
    }

    /// Reject appends for `target_id`
    pub fn fail_for(&self, target_id: Uuid) {
        lock(&self.failing_targets).push(target_id);
    }
}

#[async_trait]
impl CheckStore for MemoryCheckStore {
    async fn append(&self, result: &CheckResult) -> Result<(), StoreError> {
        if lock(&self.failing_targets).contains(&result.target_id) {
            return Err(StoreError::Backend(anyhow::anyhow!("check store rejected append")));
        }
        lock(&self.results).push(result.clone());
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryDirectory {
    users: Mutex<HashMap<Uuid, User>>,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, user: User) {
        lock(&self.users).insert(user.id, user);
    }

    pub fn get(&self, user_id: Uuid) -> Option<User> {
        lock(&self.users).get(&user_id).cloned()
    }
}

#[async_trait]
impl UserDirectory for MemoryDirectory {
    async fn find_by_id(&self, user_id: Uuid) -> Result<User, StoreError> {
        self.get(user_id).ok_or_else(|| StoreError::NotFound(format!("user {}", user_id)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GatewayMode {
    Deliver,
    Unconfigured,
    Failing,
}

/// Gateway that keeps delivered messages in memory
pub struct RecordingGateway {
    mode: GatewayMode,
    sent: Mutex<Vec<NotificationIntent>>,
    attempts: AtomicUsize,
}

impl RecordingGateway {
    pub fn new() -> Self {
        Self::with_mode(GatewayMode::Deliver)
    }

    /// Gateway without credentials, every send returns [`NotifyError::Unconfigured`]
    pub fn unconfigured() -> Self {
        Self::with_mode(GatewayMode::Unconfigured)
    }

    /// Gateway whose deliveries always fail
    pub fn failing() -> Self {
        Self::with_mode(GatewayMode::Failing)
    }

    fn with_mode(mode: GatewayMode) -> Self {
        Self { mode, sent: Mutex::new(Vec::new()), attempts: AtomicUsize::new(0) }
    }

    /// Successfully delivered messages
    pub fn sent(&self) -> Vec<NotificationIntent> {
        lock(&self.sent).clone()
    }

    /// Number of send calls, delivered or not
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

impl Default for RecordingGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NotificationGateway for RecordingGateway {
    async fn send(&self, destination: &str, subject: &str, body: &str) -> Result<(), NotifyError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        match self.mode {
            GatewayMode::Unconfigured => Err(NotifyError::Unconfigured),
            GatewayMode::Failing => Err(NotifyError::Delivery("relay rejected message".to_string())),
            GatewayMode::Deliver => {
                lock(&self.sent).push(NotificationIntent {
                    destination: destination.to_string(),
                    subject: subject.to_string(),
                    body: body.to_string(),
                });
                Ok(())
            }
        }
    }
}
