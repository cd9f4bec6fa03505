use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::sync::Semaphore;
use tokio::time::{Instant, timeout};
use tracing::{debug, error, info, warn};

use crate::collaborators::{CheckStore, NotificationGateway, TargetRegistry, UserDirectory};
use crate::detector::TransitionDetector;
use crate::error::CycleError;
use crate::probe::{DEFAULT_PROBE_TIMEOUT, Probe};
use crate::types::{CheckResult, MonitoredTarget};

/// Summary of one check cycle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Targets in the cycle snapshot
    pub targets: usize,
    /// Results appended to the check store
    pub stored: usize,
    pub store_failures: usize,
    pub up: usize,
    pub down: usize,
    pub transitions: usize,
    /// Probe units that panicked before producing a result
    pub lost: usize,
    pub elapsed: Duration,
}

impl CycleReport {
    fn record(&mut self, unit: UnitOutcome) {
        if unit.success {
            self.up += 1;
        } else {
            self.down += 1;
        }
        if unit.stored {
            self.stored += 1;
        } else {
            self.store_failures += 1;
        }
        if unit.transitioned {
            self.transitions += 1;
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct UnitOutcome {
    success: bool,
    stored: bool,
    transitioned: bool,
}

/// Runs one probe per active target concurrently and reconciles the results
///
/// Cloning is cheap, every clone shares the same collaborators.
#[derive(Clone)]
pub struct CycleExecutor {
    registry: Arc<dyn TargetRegistry>,
    store: Arc<dyn CheckStore>,
    probe: Arc<dyn Probe>,
    detector: Arc<TransitionDetector>,
    probe_timeout: Duration,
    limiter: Option<Arc<Semaphore>>,
}

impl CycleExecutor {
    pub fn new(
        registry: Arc<dyn TargetRegistry>,
        store: Arc<dyn CheckStore>,
        directory: Arc<dyn UserDirectory>,
        gateway: Arc<dyn NotificationGateway>,
        probe: Arc<dyn Probe>,
    ) -> Self {
        let detector = Arc::new(TransitionDetector::new(registry.clone(), directory, gateway));

        Self {
            registry,
            store,
            probe,
            detector,
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
            limiter: None,
        }
    }

    /// Upper bound for a single probe, enforced independently per target
    pub fn with_probe_timeout(mut self, probe_timeout: Duration) -> Self {
        self.probe_timeout = probe_timeout;
        self
    }

    /// Cap the number of probes running at once. `None` or zero means unbounded.
    pub fn with_max_concurrent_probes(mut self, max: Option<usize>) -> Self {
        self.limiter = max.filter(|&n| n > 0).map(|n| Arc::new(Semaphore::new(n)));
        self
    }

    pub fn probe_timeout(&self) -> Duration {
        self.probe_timeout
    }

    /// Run one check cycle
    ///
    /// Takes a snapshot of the active targets, probes all of them concurrently
    /// and returns once every probe unit has finished. Only a registry read
    /// failure fails the cycle; it happens before any probe is launched.
    pub async fn run_cycle(&self) -> Result<CycleReport, CycleError> {
        let started = Instant::now();
        let targets = self.registry.list_active().await.map_err(CycleError::Registry)?;

        info!(targets = targets.len(), "Running uptime checks...");

        let handles: Vec<_> = targets
            .into_iter()
            .map(|target| {
                let executor = self.clone();
                tokio::spawn(async move { executor.check_target(target).await })
            })
            .collect();

        let mut report = CycleReport { targets: handles.len(), ..CycleReport::default() };

        for outcome in join_all(handles).await {
            match outcome {
                Ok(unit) => report.record(unit),
                Err(e) => {
                    error!("Probe task failed: {}", e);
                    report.lost += 1;
                }
            }
        }

        report.elapsed = started.elapsed();
        info!(
            targets = report.targets,
            up = report.up,
            down = report.down,
            transitions = report.transitions,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "Uptime checks finished."
        );

        Ok(report)
    }

    /// Probe, persist and reconcile a single target
    async fn check_target(&self, target: MonitoredTarget) -> UnitOutcome {
        let _permit = match &self.limiter {
            Some(limiter) => limiter.clone().acquire_owned().await.ok(),
            None => None,
        };

        let result = self.probe_with_timeout(&target).await;

        let stored = match self.store.append(&result).await {
            Ok(()) => true,
            Err(e) => {
                error!(target_id = %target.id, url = %target.url, "Error saving check result: {}", e);
                false
            }
        };

        let observation = self.detector.observe(&target, &result).await;

        UnitOutcome { success: result.success, stored, transitioned: observation.is_transition() }
    }

    async fn probe_with_timeout(&self, target: &MonitoredTarget) -> CheckResult {
        let started = Instant::now();

        match timeout(self.probe_timeout, self.probe.check(target)).await {
            Ok(result) => {
                debug!(
                    target_id = %target.id,
                    success = result.success,
                    status_code = result.status_code,
                    latency_ms = result.latency_ms,
                    "Probe completed"
                );
                result
            }
            Err(_) => {
                warn!(target_id = %target.id, url = %target.url, "Probe timed out");
                CheckResult::unreachable(target, started.elapsed().as_millis() as u64)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{MemoryCheckStore, MemoryDirectory, MemoryRegistry, RecordingGateway};
    use crate::types::{TargetStatus, User};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use uuid::Uuid;

    /// Answers from a table keyed by URL, after an optional delay
    #[derive(Default)]
    struct ScriptedProbe {
        answers: HashMap<String, (Duration, Option<u16>)>,
        running: AtomicUsize,
        peak: AtomicUsize,
    }

    impl ScriptedProbe {
        fn answer(mut self, url: &str, delay: Duration, status: Option<u16>) -> Self {
            self.answers.insert(url.to_string(), (delay, status));
            self
        }
    }

    #[async_trait::async_trait]
    impl Probe for ScriptedProbe {
        async fn check(&self, target: &MonitoredTarget) -> CheckResult {
            let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);

            let (delay, status) = self.answers.get(&target.url).copied().unwrap_or((Duration::ZERO, Some(200)));
            tokio::time::sleep(delay).await;
            self.running.fetch_sub(1, Ordering::SeqCst);

            match status {
                Some(code) => CheckResult::responded(target, code, delay.as_millis() as u64),
                None => CheckResult::unreachable(target, delay.as_millis() as u64),
            }
        }
    }

    struct Fixture {
        registry: Arc<MemoryRegistry>,
        store: Arc<MemoryCheckStore>,
        directory: Arc<MemoryDirectory>,
        gateway: Arc<RecordingGateway>,
        owner: User,
    }

    impl Fixture {
        fn new() -> Self {
            let owner = User { id: Uuid::new_v4(), name: "Ops".to_string(), email: "ops@example.com".to_string() };
            let directory = Arc::new(MemoryDirectory::new());
            directory.insert(owner.clone());

            Self {
                registry: Arc::new(MemoryRegistry::new()),
                store: Arc::new(MemoryCheckStore::new()),
                directory,
                gateway: Arc::new(RecordingGateway::new()),
                owner,
            }
        }

        fn executor(&self, probe: Arc<ScriptedProbe>) -> CycleExecutor {
            CycleExecutor::new(
                self.registry.clone(),
                self.store.clone(),
                self.directory.clone(),
                self.gateway.clone(),
                probe,
            )
        }
    }

    #[tokio::test]
    async fn test_cycle_probes_only_active_targets() {
        let f = Fixture::new();
        let active = MonitoredTarget::new(f.owner.id, "a", "http://a");
        let inactive = MonitoredTarget::new(f.owner.id, "b", "http://b").inactive();
        f.registry.insert(active.clone());
        f.registry.insert(inactive.clone());

        let executor = f.executor(Arc::new(ScriptedProbe::default()));
        let report = executor.run_cycle().await.unwrap();

        assert_eq!(report.targets, 1);
        assert_eq!(report.stored, 1);
        assert_eq!(f.store.results_for(active.id).len(), 1);
        assert!(f.store.results_for(inactive.id).is_empty());
    }

    #[test]
    fn test_default_probe_timeout() {
        let f = Fixture::new();
        let executor = f.executor(Arc::new(ScriptedProbe::default()));
        assert_eq!(executor.probe_timeout(), DEFAULT_PROBE_TIMEOUT);
    }

    #[tokio::test]
    async fn test_registry_failure_aborts_cycle() {
        let f = Fixture::new();
        f.registry.insert(MonitoredTarget::new(f.owner.id, "a", "http://a"));
        f.registry.fail_reads(true);

        let probe = Arc::new(ScriptedProbe::default());
        let executor = f.executor(probe.clone());

        let err = executor.run_cycle().await.unwrap_err();
        assert!(matches!(err, CycleError::Registry(_)));
        assert!(f.store.results().is_empty());
        assert_eq!(probe.peak.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hanging_probe_is_cut_at_timeout() {
        let f = Fixture::new();
        let hanging = MonitoredTarget::new(f.owner.id, "hang", "http://hang");
        f.registry.insert(hanging.clone());

        let probe = Arc::new(ScriptedProbe::default().answer("http://hang", Duration::from_secs(3600), Some(200)));
        let executor = f.executor(probe).with_probe_timeout(Duration::from_secs(10));
        assert_eq!(executor.probe_timeout(), Duration::from_secs(10));

        let started = Instant::now();
        let report = executor.run_cycle().await.unwrap();

        assert!(started.elapsed() < Duration::from_secs(11));
        assert_eq!(report.down, 1);
        let results = f.store.results_for(hanging.id);
        assert_eq!(results[0].status_code, 0);
        assert!(!results[0].success);
        assert_eq!(f.registry.status_updates(), vec![(hanging.id, false)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrency_cap_limits_parallel_probes() {
        let f = Fixture::new();
        let mut probe = ScriptedProbe::default();
        for i in 0..6 {
            let url = format!("http://t{}", i);
            f.registry.insert(MonitoredTarget::new(f.owner.id, format!("t{}", i), url.clone()));
            probe = probe.answer(&url, Duration::from_secs(1), Some(200));
        }
        let probe = Arc::new(probe);

        let executor = f
            .executor(probe.clone())
            .with_max_concurrent_probes(Some(2));
        let report = executor.run_cycle().await.unwrap();

        assert_eq!(report.stored, 6);
        assert_eq!(probe.peak.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unbounded_by_default() {
        let f = Fixture::new();
        let mut probe = ScriptedProbe::default();
        for i in 0..5 {
            let url = format!("http://u{}", i);
            f.registry.insert(MonitoredTarget::new(f.owner.id, format!("u{}", i), url.clone()));
            probe = probe.answer(&url, Duration::from_secs(1), Some(200));
        }
        let probe = Arc::new(probe);

        let executor = f.executor(probe.clone());
        executor.run_cycle().await.unwrap();

        assert_eq!(probe.peak.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn test_store_failure_does_not_block_transition() {
        let f = Fixture::new();
        let target = MonitoredTarget::new(f.owner.id, "a", "http://a").with_status(TargetStatus::Down);
        f.registry.insert(target.clone());
        f.store.fail_for(target.id);

        let executor = f.executor(Arc::new(ScriptedProbe::default()));
        let report = executor.run_cycle().await.unwrap();

        assert_eq!(report.store_failures, 1);
        assert_eq!(report.transitions, 1);
        assert_eq!(f.gateway.sent().len(), 1);
        assert_eq!(f.registry.status_updates(), vec![(target.id, true)]);
    }
}
