//! Check cycle behavior against in-memory collaborators

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{Answer, Fixture, ScriptedProbe};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::time::Instant;
use vigil::memory::RecordingGateway;
use vigil::{HttpProbe, MonitoredTarget, TargetStatus};

#[tokio::test]
async fn test_inactive_targets_are_never_probed() {
    let f = Fixture::new();
    f.add_target("live", "http://live", TargetStatus::Up);
    let paused = MonitoredTarget::new(f.owner.id, "paused", "http://paused").inactive();
    f.registry.insert(paused.clone());

    let probe = Arc::new(ScriptedProbe::new());
    f.executor(probe.clone()).run_cycle().await.unwrap();

    assert_eq!(probe.calls(), vec!["http://live".to_string()]);
    assert!(f.store.results_for(paused.id).is_empty());
}

#[tokio::test]
async fn test_deactivated_target_is_skipped_from_the_next_cycle() {
    let f = Fixture::new();
    let site = f.add_target("site", "http://site", TargetStatus::Up);
    f.add_target("other", "http://other", TargetStatus::Up);

    let probe = Arc::new(ScriptedProbe::new());
    let executor = f.executor(probe.clone());
    executor.run_cycle().await.unwrap();

    f.registry.set_active(site.id, false);
    let report = executor.run_cycle().await.unwrap();

    assert_eq!(report.targets, 1);
    assert_eq!(f.store.results_for(site.id).len(), 1);
    assert_eq!(probe.calls().iter().filter(|url| *url == "http://site").count(), 1);
}

#[tokio::test]
async fn test_one_result_per_active_target() {
    let f = Fixture::new();
    for i in 0..8 {
        f.add_target(&format!("site-{}", i), &format!("http://site-{}", i), TargetStatus::Up);
    }

    let report = f.executor(Arc::new(ScriptedProbe::new())).run_cycle().await.unwrap();

    assert_eq!(report.targets, 8);
    assert_eq!(report.stored, 8);
    assert_eq!(f.store.results().len(), 8);
}

#[tokio::test]
async fn test_unchanged_status_sends_nothing() {
    let f = Fixture::new();
    f.add_target("up", "http://up", TargetStatus::Up);
    f.add_target("down", "http://down", TargetStatus::Down);

    let probe = Arc::new(ScriptedProbe::new().answer("http://down", Answer::Status(502)));
    let report = f.executor(probe).run_cycle().await.unwrap();

    assert_eq!(report.transitions, 0);
    assert_eq!(f.gateway.attempts(), 0);
    assert!(f.registry.status_updates().is_empty());
}

#[tokio::test]
async fn test_replaying_a_cycle_does_not_repeat_the_transition() {
    let f = Fixture::new();
    let target = f.add_target("flaky", "http://flaky", TargetStatus::Up);
    let executor = f.executor(Arc::new(ScriptedProbe::new().answer("http://flaky", Answer::Unreachable)));

    let first = executor.run_cycle().await.unwrap();
    let second = executor.run_cycle().await.unwrap();

    assert_eq!(first.transitions, 1);
    assert_eq!(second.transitions, 0);
    assert_eq!(f.gateway.sent().len(), 1);
    assert_eq!(f.registry.status_updates(), vec![(target.id, false)]);
    assert_eq!(f.store.results_for(target.id).len(), 2);
}

#[tokio::test]
async fn test_single_failure_flips_state_without_debounce() {
    let f = Fixture::new();
    let target = f.add_target("edge", "http://edge", TargetStatus::Up);

    f.executor(Arc::new(ScriptedProbe::new().answer("http://edge", Answer::Status(500))))
        .run_cycle()
        .await
        .unwrap();
    f.executor(Arc::new(ScriptedProbe::new().answer("http://edge", Answer::Status(200))))
        .run_cycle()
        .await
        .unwrap();

    let subjects: Vec<String> = f.gateway.sent().into_iter().map(|n| n.subject).collect();
    assert_eq!(subjects.len(), 2);
    assert!(subjects[0].contains("is down"));
    assert!(subjects[1].contains("back up"));
    assert_eq!(f.registry.status_updates(), vec![(target.id, false), (target.id, true)]);
    assert_eq!(f.registry.get(target.id).unwrap().status, TargetStatus::Up);
}

#[tokio::test(start_paused = true)]
async fn test_scenario_timeout_marks_target_down() {
    let f = Fixture::new();
    let target = f.add_target("slow", "http://slow", TargetStatus::Up);
    let probe = ScriptedProbe::new().answer_after("http://slow", Duration::from_secs(120), Answer::Status(200));

    let report = f
        .executor(Arc::new(probe))
        .with_probe_timeout(Duration::from_secs(10))
        .run_cycle()
        .await
        .unwrap();

    assert_eq!(report.transitions, 1);
    let results = f.store.results_for(target.id);
    assert_eq!(results.len(), 1);
    assert!(!results[0].success);
    assert_eq!(results[0].status_code, 0);

    let sent = f.gateway.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].destination, "grace@example.com");
    assert_eq!(sent[0].subject, "🔴 Alert: Your site 'slow' is down!");
    assert_eq!(f.registry.status_updates(), vec![(target.id, false)]);
}

#[tokio::test]
async fn test_scenario_recovery_on_200() {
    let f = Fixture::new();
    let target = f.add_target("shop", "http://shop", TargetStatus::Down);

    f.executor(Arc::new(ScriptedProbe::new().answer("http://shop", Answer::Status(200))))
        .run_cycle()
        .await
        .unwrap();

    let results = f.store.results_for(target.id);
    assert!(results[0].success);
    assert_eq!(results[0].status_code, 200);

    let sent = f.gateway.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].subject, "✅ Resolved: Your site 'shop' is back up!");
    assert!(sent[0].body.contains("(http://shop)"));
    assert_eq!(f.registry.status_updates(), vec![(target.id, true)]);
}

#[tokio::test]
async fn test_scenario_server_error_alerts() {
    let f = Fixture::new();
    let target = f.add_target("api", "http://api", TargetStatus::Up);

    f.executor(Arc::new(ScriptedProbe::new().answer("http://api", Answer::Status(500))))
        .run_cycle()
        .await
        .unwrap();

    let results = f.store.results_for(target.id);
    assert!(!results[0].success);
    assert_eq!(results[0].status_code, 500);
    assert_eq!(f.gateway.sent().len(), 1);
    assert_eq!(f.registry.status_updates(), vec![(target.id, false)]);
}

#[tokio::test]
async fn test_scenario_unconfigured_gateway_still_updates_status() {
    let f = Fixture::with_gateway(RecordingGateway::unconfigured());
    let target = f.add_target("blog", "http://blog", TargetStatus::Up);

    let report = f
        .executor(Arc::new(ScriptedProbe::new().answer("http://blog", Answer::Unreachable)))
        .run_cycle()
        .await
        .unwrap();

    assert_eq!(report.transitions, 1);
    assert_eq!(f.gateway.attempts(), 1);
    assert!(f.gateway.sent().is_empty());
    assert_eq!(f.registry.status_updates(), vec![(target.id, false)]);
}

#[tokio::test]
async fn test_failing_gateway_does_not_affect_other_targets() {
    let f = Fixture::with_gateway(RecordingGateway::failing());
    let broken = f.add_target("broken", "http://broken", TargetStatus::Up);
    let steady = f.add_target("steady", "http://steady", TargetStatus::Up);

    let report = f
        .executor(Arc::new(ScriptedProbe::new().answer("http://broken", Answer::Unreachable)))
        .run_cycle()
        .await
        .unwrap();

    assert_eq!(report.stored, 2);
    assert_eq!(f.registry.status_updates(), vec![(broken.id, false)]);
    assert!(f.store.results_for(steady.id)[0].success);
}

#[tokio::test(start_paused = true)]
async fn test_scenario_cycle_time_is_max_not_sum() {
    let f = Fixture::new();
    f.add_target("slow", "http://slow", TargetStatus::Up);
    f.add_target("fast", "http://fast", TargetStatus::Up);
    let probe = ScriptedProbe::new()
        .answer_after("http://slow", Duration::from_secs(9), Answer::Status(200))
        .answer_after("http://fast", Duration::from_millis(100), Answer::Status(200));

    let started = Instant::now();
    let report = f.executor(Arc::new(probe)).run_cycle().await.unwrap();
    let elapsed = started.elapsed();

    assert_eq!(report.stored, 2);
    assert!(elapsed >= Duration::from_secs(9));
    assert!(elapsed < Duration::from_millis(9_100));
}

#[tokio::test(start_paused = true)]
async fn test_timeout_on_one_target_does_not_fail_another() {
    let f = Fixture::new();
    let hanging = f.add_target("hanging", "http://hanging", TargetStatus::Up);
    let healthy = f.add_target("healthy", "http://healthy", TargetStatus::Up);
    let probe = ScriptedProbe::new()
        .answer_after("http://hanging", Duration::from_secs(3600), Answer::Status(200))
        .answer_after("http://healthy", Duration::from_millis(50), Answer::Status(204));

    let started = Instant::now();
    f.executor(Arc::new(probe))
        .with_probe_timeout(Duration::from_secs(10))
        .run_cycle()
        .await
        .unwrap();

    assert!(started.elapsed() < Duration::from_secs(11));
    let healthy_result = &f.store.results_for(healthy.id)[0];
    assert!(healthy_result.success);
    assert_eq!(healthy_result.status_code, 204);
    assert_eq!(healthy_result.latency_ms, 50);
    assert_eq!(f.store.results_for(hanging.id)[0].status_code, 0);
}

#[tokio::test]
async fn test_registry_failure_launches_no_probes() {
    let f = Fixture::new();
    f.add_target("a", "http://a", TargetStatus::Up);
    f.registry.fail_reads(true);

    let probe = Arc::new(ScriptedProbe::new());
    let result = f.executor(probe.clone()).run_cycle().await;

    assert!(result.is_err());
    assert!(probe.calls().is_empty());
    assert!(f.store.results().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_target_removed_mid_cycle_is_tolerated() {
    let f = Fixture::new();
    let target = f.add_target("gone", "http://gone", TargetStatus::Up);
    let probe = ScriptedProbe::new().answer_after("http://gone", Duration::from_secs(5), Answer::Unreachable);

    let executor = f.executor(Arc::new(probe));
    let cycle = tokio::spawn(async move { executor.run_cycle().await });

    // Snapshot already taken; the target disappears while its probe is running
    tokio::time::sleep(Duration::from_secs(1)).await;
    f.registry.remove(target.id);

    let report = cycle.await.unwrap().unwrap();

    assert_eq!(report.transitions, 1);
    assert_eq!(f.store.results_for(target.id).len(), 1);
    assert_eq!(f.registry.status_updates(), vec![(target.id, false)]);
    assert!(f.registry.get(target.id).is_none());
}

#[tokio::test]
async fn test_http_probe_end_to_end() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let mut buf = [0u8; 1024];
                let _ = socket.read(&mut buf).await;
                let _ = socket
                    .write_all(b"HTTP/1.1 503 Service Unavailable\r\ncontent-length: 0\r\nconnection: close\r\n\r\n")
                    .await;
                let _ = socket.shutdown().await;
            });
        }
    });

    let f = Fixture::new();
    let target = f.add_target("local", &format!("http://{}/", addr), TargetStatus::Up);
    let probe = Arc::new(HttpProbe::new(Duration::from_secs(5)).unwrap());

    let report = f.executor(probe).run_cycle().await.unwrap();

    assert_eq!(report.down, 1);
    assert_eq!(f.store.results_for(target.id)[0].status_code, 503);
    assert_eq!(f.gateway.sent().len(), 1);
}
