use std::sync::Arc;
use std::time::Duration;

use node_cycler::cycling::config::{PollPolicy, RetryPolicy, RunConfig};
use node_cycler::cycling::orchestrator::CyclingOrchestrator;
use node_cycler::domain::clock::FixedClock;
use node_cycler::domain::node::Role;
use node_cycler::error::Error;
use node_cycler::gateway::cluster::DrainOutcome;
use node_cycler::gateway::simulated::{SimCall, SimulatedCloud};

const TAG_TIME: i64 = 1_700_000_000;

fn fast_config() -> RunConfig {
    let mut config = RunConfig::new("test-context", "acme");
    config.retry = RetryPolicy { max_attempts: 12, delay: Duration::ZERO };
    config.poll = PollPolicy { interval: Duration::ZERO, deadline: Some(Duration::from_secs(10)) };
    config
}

fn orchestrator(cloud: &Arc<SimulatedCloud>, config: RunConfig) -> CyclingOrchestrator {
    CyclingOrchestrator::new(cloud.clone(), cloud.clone(), Arc::new(FixedClock::new(TAG_TIME)), config)
}

fn worker(i: usize) -> String {
    format!("worker-{:03}.c.acme.internal", i)
}

#[tokio::test]
async fn three_workers_are_replaced_end_to_end() {
    let cloud = Arc::new(SimulatedCloud::new(Role::Worker, 3, &["europe-west1-b", "europe-west1-c", "europe-west1-d"]));

    let report = orchestrator(&cloud, fast_config()).cycle(Role::Worker).await.unwrap();

    assert_eq!(report.tag.as_str(), "1700000000");
    assert_eq!(
        report.states,
        vec!["Idle", "Labeling", "ResolvingGroup", "Scaling", "AwaitingScaleUp", "ZoneBalanceCheck", "Draining", "Terminating", "AwaitingScaleDown", "Done"]
    );
    assert_eq!(cloud.calls_of("resize"), vec![SimCall::Resize(6)]);
    assert_eq!(cloud.calls_of("delete_instances"), vec![SimCall::DeleteInstances(vec!["worker-000".into(), "worker-001".into(), "worker-002".into()])]);
    assert_eq!(cloud.calls_of("wait_until_stable").len(), 1);

    assert_eq!(cloud.desired_size(), 3);
    assert_eq!(cloud.node_names(), vec![worker(3), worker(4), worker(5)]);
    assert!(cloud.nodes().iter().all(|n| n.ready && n.retiring.is_none()));
    assert_eq!(report.drains.len(), 3);
    assert_eq!(report.forced_drains(), 0);
    assert_eq!(report.target.as_ref().map(|t| t.original_size), Some(3));
}

#[tokio::test]
async fn every_old_node_is_labeled_and_cordoned_before_scaling() {
    let cloud = Arc::new(SimulatedCloud::new(Role::Master, 3, &["a", "b", "c"]));

    orchestrator(&cloud, fast_config()).cycle(Role::Master).await.unwrap();

    let calls = cloud.calls();
    let resize_at = calls.iter().position(|c| matches!(c, SimCall::Resize(_))).unwrap();
    let labeled: Vec<usize> = calls.iter().enumerate().filter(|(_, c)| matches!(c, SimCall::LabelAndCordon(_))).map(|(i, _)| i).collect();
    assert_eq!(labeled.len(), 3);
    assert!(labeled.iter().all(|i| *i < resize_at));
}

#[tokio::test]
async fn drains_happen_one_node_at_a_time_in_batch_order() {
    let cloud = Arc::new(SimulatedCloud::new(Role::Worker, 3, &["a", "b", "c"]));

    orchestrator(&cloud, fast_config()).cycle(Role::Worker).await.unwrap();

    assert_eq!(cloud.calls_of("drain"), (0..3).map(|i| SimCall::Drain(worker(i))).collect::<Vec<_>>());
}

#[tokio::test]
async fn seven_node_batch_is_deleted_in_one_call() {
    let cloud = Arc::new(SimulatedCloud::new(Role::Worker, 7, &["europe-west1-b"]));
    let mut config = fast_config();
    config.required_zones = 1;

    let report = orchestrator(&cloud, config).cycle(Role::Worker).await.unwrap();

    let deletes = cloud.calls_of("delete_instances");
    assert_eq!(deletes.len(), 1);
    assert!(matches!(&deletes[0], SimCall::DeleteInstances(ids) if ids.len() == 7));
    assert_eq!(report.deleted_instances.len(), 7);
    assert_eq!(cloud.desired_size(), 7);
}

#[tokio::test]
async fn very_large_batches_are_split_into_delete_chunks() {
    let cloud = Arc::new(SimulatedCloud::new(Role::Worker, 101, &["europe-west1-b"]));
    let mut config = fast_config();
    config.required_zones = 1;

    orchestrator(&cloud, config).cycle(Role::Worker).await.unwrap();

    let sizes: Vec<usize> = cloud
        .calls_of("delete_instances")
        .iter()
        .map(|c| match c {
            SimCall::DeleteInstances(ids) => ids.len(),
            _ => 0,
        })
        .collect();
    assert_eq!(sizes, vec![100, 1]);
    assert_eq!(cloud.node_names().len(), 101);
}

#[tokio::test]
async fn zone_imbalance_aborts_before_any_drain() {
    let cloud = Arc::new(SimulatedCloud::new(Role::Worker, 4, &["a", "b"]));

    let err = orchestrator(&cloud, fast_config()).cycle(Role::Worker).await.unwrap_err();

    assert!(matches!(err, Error::ZoneImbalance { required: 3, ref distribution } if distribution == "{a:2, b:2}"));
    assert!(cloud.calls_of("drain").is_empty());
    assert!(cloud.calls_of("delete_instances").is_empty());
    assert!(cloud.is_cordoned(&worker(0)));
}

#[tokio::test]
async fn a_transient_failure_streak_below_the_limit_is_absorbed() {
    let cloud = Arc::new(SimulatedCloud::new(Role::Worker, 3, &["a", "b", "c"]));
    cloud.fail_times("resize", 11);

    orchestrator(&cloud, fast_config()).cycle(Role::Worker).await.unwrap();

    assert_eq!(cloud.calls_of("resize").len(), 12);
    assert_eq!(cloud.desired_size(), 3);
}

#[tokio::test]
async fn twelve_consecutive_failures_abort_the_run() {
    let cloud = Arc::new(SimulatedCloud::new(Role::Worker, 3, &["a", "b", "c"]));
    cloud.fail_times("resize", 12);

    let err = orchestrator(&cloud, fast_config()).cycle(Role::Worker).await.unwrap_err();

    assert!(matches!(err, Error::RetriesExhausted { attempts: 12, .. }));
    assert_eq!(cloud.calls_of("resize").len(), 12);
    assert!(cloud.calls_of("drain").is_empty());
}

#[tokio::test]
async fn stuck_and_failing_drains_fall_back_to_forced_deletion() {
    let cloud = Arc::new(SimulatedCloud::new(Role::Worker, 3, &["a", "b", "c"]));
    cloud.set_drain_outcome(&worker(1), DrainOutcome::TimedOut);
    cloud.set_drain_outcome(&worker(2), DrainOutcome::Errored("PodDisruptionBudget violated".into()));

    let report = orchestrator(&cloud, fast_config()).cycle(Role::Worker).await.unwrap();

    assert_eq!(report.forced_drains(), 2);
    assert_eq!(cloud.calls_of("force_delete_pods"), vec![SimCall::ForceDeletePods(worker(1)), SimCall::ForceDeletePods(worker(2))]);
    assert_eq!(report.deleted_instances.len(), 3);
}

#[tokio::test]
async fn unusable_target_size_stops_before_resizing() {
    for size in [0, -2] {
        let cloud = Arc::new(SimulatedCloud::new(Role::Worker, 3, &["a", "b", "c"]));
        cloud.set_target_size(size);

        let err = orchestrator(&cloud, fast_config()).cycle(Role::Worker).await.unwrap_err();

        assert!(matches!(err, Error::InvalidTargetSize { .. }), "size {}: {}", size, err);
        assert!(cloud.calls_of("resize").is_empty());
    }
}

#[tokio::test]
async fn labeling_waits_for_nodes_to_be_listed() {
    let cloud = Arc::new(SimulatedCloud::new(Role::Worker, 3, &["a", "b", "c"]));
    cloud.set_empty_listings(2);

    let report = orchestrator(&cloud, fast_config()).cycle(Role::Worker).await.unwrap();

    assert_eq!(report.drains.len(), 3);
    assert_eq!(cloud.calls_of("label_and_cordon").len(), 3);
}

#[tokio::test]
async fn scale_up_that_never_converges_hits_the_deadline() {
    let cloud = Arc::new(SimulatedCloud::new(Role::Worker, 3, &["a", "b", "c"]).with_ready_after_listings(u32::MAX));
    let mut config = fast_config();
    config.poll = PollPolicy { interval: Duration::from_millis(1), deadline: Some(Duration::from_millis(20)) };

    let err = orchestrator(&cloud, config).cycle(Role::Worker).await.unwrap_err();

    assert!(matches!(err, Error::ConvergenceTimeout { .. }));
    assert!(cloud.calls_of("drain").is_empty());
}
