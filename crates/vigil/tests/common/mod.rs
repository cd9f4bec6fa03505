//! Shared fixtures for the integration tests

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Once};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use uuid::Uuid;
use vigil::memory::{MemoryCheckStore, MemoryDirectory, MemoryRegistry, RecordingGateway};
use vigil::{CheckResult, CycleExecutor, MonitoredTarget, Probe, TargetStatus, User};

/// Route engine logs through the shared subscriber, `RUST_LOG=debug` to see them
pub fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(|| logger::init_with_level(logger::LevelFilter::WARN));
}

/// What a scripted probe does for one URL
#[derive(Debug, Clone, Copy)]
pub enum Answer {
    Status(u16),
    Unreachable,
}

/// Probe answering from a table keyed by URL after a per-URL delay
#[derive(Default)]
pub struct ScriptedProbe {
    answers: HashMap<String, (Duration, Answer)>,
    calls: std::sync::Mutex<Vec<String>>,
    running: AtomicUsize,
    peak: AtomicUsize,
}

impl ScriptedProbe {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn answer(mut self, url: &str, answer: Answer) -> Self {
        self.answers.insert(url.to_string(), (Duration::ZERO, answer));
        self
    }

    pub fn answer_after(mut self, url: &str, delay: Duration, answer: Answer) -> Self {
        self.answers.insert(url.to_string(), (delay, answer));
        self
    }

    /// URLs probed so far
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Highest number of probes observed running at once
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl Probe for ScriptedProbe {
    async fn check(&self, target: &MonitoredTarget) -> CheckResult {
        self.calls.lock().unwrap().push(target.url.clone());
        let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        let (delay, answer) = self
            .answers
            .get(&target.url)
            .copied()
            .unwrap_or((Duration::ZERO, Answer::Status(200)));
        tokio::time::sleep(delay).await;
        self.running.fetch_sub(1, Ordering::SeqCst);

        let latency_ms = delay.as_millis() as u64;
        match answer {
            Answer::Status(code) => CheckResult::responded(target, code, latency_ms),
            Answer::Unreachable => CheckResult::unreachable(target, latency_ms),
        }
    }
}

/// In-memory collaborators plus one registered owner
pub struct Fixture {
    pub registry: Arc<MemoryRegistry>,
    pub store: Arc<MemoryCheckStore>,
    pub directory: Arc<MemoryDirectory>,
    pub gateway: Arc<RecordingGateway>,
    pub owner: User,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_gateway(RecordingGateway::new())
    }

    pub fn with_gateway(gateway: RecordingGateway) -> Self {
        init_logging();
        let owner = User {
            id: Uuid::new_v4(),
            name: "Grace".to_string(),
            email: "grace@example.com".to_string(),
        };
        let directory = Arc::new(MemoryDirectory::new());
        directory.insert(owner.clone());

        Self {
            registry: Arc::new(MemoryRegistry::new()),
            store: Arc::new(MemoryCheckStore::new()),
            directory,
            gateway: Arc::new(gateway),
            owner,
        }
    }

    /// Register an active target owned by the fixture owner
    pub fn add_target(&self, name: &str, url: &str, status: TargetStatus) -> MonitoredTarget {
        let target = MonitoredTarget::new(self.owner.id, name, url).with_status(status);
        self.registry.insert(target.clone());
        target
    }

    pub fn executor(&self, probe: Arc<dyn Probe>) -> CycleExecutor {
        CycleExecutor::new(
            self.registry.clone(),
            self.store.clone(),
            self.directory.clone(),
            self.gateway.clone(),
            probe,
        )
    }
}
