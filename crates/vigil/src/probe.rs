use std::time::{Duration, Instant};

use tracing::debug;

use crate::types::{CheckResult, MonitoredTarget};

/// Default time a single probe may take before it counts as failed
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Reachability check against a single target
///
/// A probe never fails: transport errors are folded into the returned
/// [`CheckResult`].
#[async_trait::async_trait]
pub trait Probe: Send + Sync {
    async fn check(&self, target: &MonitoredTarget) -> CheckResult;
}

/// HTTP GET probe, successful on a 2xx response
pub struct HttpProbe {
    client: reqwest::Client,
}

impl HttpProbe {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("vigil/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { client })
    }
}

#[async_trait::async_trait]
impl Probe for HttpProbe {
    async fn check(&self, target: &MonitoredTarget) -> CheckResult {
        let start = Instant::now();

        match self.client.get(&target.url).send().await {
            Ok(response) => {
                let latency_ms = start.elapsed().as_millis() as u64;
                let status_code = response.status().as_u16();
                debug!(target_id = %target.id, url = %target.url, status_code, latency_ms, "Probe answered");
                CheckResult::responded(target, status_code, latency_ms)
            }
            Err(e) => {
                let latency_ms = start.elapsed().as_millis() as u64;
                debug!(target_id = %target.id, url = %target.url, latency_ms, "Probe failed: {}", e);
                CheckResult::unreachable(target, latency_ms)
            }
        }
    }
}
